/// Router Module Index
///
/// Routes grouped by who may reach them. Grouping is organisational: every
/// handler still asks `policy::authorize` itself, so a route placed in the
/// wrong group cannot widen access.

/// Routes open to anonymous visitors. Handlers only ever show published posts.
pub mod public;

/// Routes that take the `AuthUser` extractor and redirect to `/login` without a session.
pub mod authenticated;

/// Routes restricted to the admin role.
pub mod admin;
