use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    flash::{self, Flash},
    models::{Account, RegisterForm, Role},
    policy::{Actor, Denial},
    repository::{Repository, RepositoryState},
};

/// Name of the cookie holding the opaque server-side session token.
pub const SESSION_COOKIE: &str = "session_id";

// --- Credentials ---

/// Hash a password with Argon2 and a fresh random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored hash. A malformed stored hash never matches.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Opaque session token: a random UUID v4, meaningless outside the sessions table.
pub fn new_session_token() -> String {
    Uuid::new_v4().to_string()
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

// --- Registration ---

/// A registration that passed validation, ready to be hashed and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// validate_registration
///
/// Field checks in the order the form reports them. The requested role is
/// honoured only when `allow_role_selection` is set; otherwise every
/// self-registration is a viewer.
pub fn validate_registration(
    form: RegisterForm,
    allow_role_selection: bool,
) -> Result<Registration, &'static str> {
    if form.username.is_empty() || form.password.is_empty() {
        return Err("Please fill in all fields.");
    }
    if form.password != form.confirm_password {
        return Err("Password and confirmation do not match.");
    }

    let role = match form.role.as_deref() {
        Some(requested) if allow_role_selection => {
            requested.parse::<Role>().map_err(|_| "Invalid role.")?
        }
        _ => Role::Viewer,
    };

    Ok(Registration {
        username: form.username,
        password: form.password,
        role,
    })
}

// --- Login ---

/// LoginOutcome
///
/// Result of checking credentials. `InvalidCredentials` covers both an unknown
/// username and a wrong password so the response never tells them apart.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success(Account),
    InvalidCredentials,
    Blocked { reason: String },
}

impl LoginOutcome {
    pub fn message(&self) -> String {
        match self {
            LoginOutcome::Success(_) => "Logged in successfully.".to_string(),
            LoginOutcome::InvalidCredentials => "Invalid username or password.".to_string(),
            LoginOutcome::Blocked { reason } => {
                format!("Your account has been blocked. Reason: {reason}")
            }
        }
    }
}

/// authenticate
///
/// Looks the account up by exact username and checks the password. The block
/// flag is consulted only once the password matched, so a wrong password on a
/// blocked account still reads as invalid credentials.
pub async fn authenticate(
    repo: &dyn Repository,
    username: &str,
    password: &str,
) -> Result<LoginOutcome, AppError> {
    let Some(account) = repo.find_account_by_username(username).await? else {
        return Ok(LoginOutcome::InvalidCredentials);
    };

    if !verify_password(password, &account.password_hash) {
        return Ok(LoginOutcome::InvalidCredentials);
    }

    if account.blocked {
        return Ok(LoginOutcome::Blocked {
            reason: account.block_reason,
        });
    }

    Ok(LoginOutcome::Success(account))
}

// --- Session Context Extractors ---

async fn resolve_account<S>(parts: &Parts, state: &S) -> Result<Option<Account>, AppError>
where
    RepositoryState: FromRef<S>,
{
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    let repo = RepositoryState::from_ref(state);
    Ok(repo.resolve_session(cookie.value()).await?)
}

/// CurrentUser
///
/// Request-scoped session resolution for pages that work with or without a
/// login. An unknown or stale token resolves to `None`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Account>);

impl CurrentUser {
    pub fn actor(&self) -> Option<Actor> {
        self.0.as_ref().map(|account| Actor {
            id: account.id,
            role: account.role,
        })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(resolve_account(parts, state).await?))
    }
}

/// AuthUser
///
/// The resolved identity of a request that requires a session. Handlers take it
/// as an argument; without a valid session the request never reaches them and
/// is redirected to the login page instead.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account: Account,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.account.id
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.account.id,
            role: self.account.role,
        }
    }
}

/// Rejection of the `AuthUser` extractor.
#[derive(Debug)]
pub enum AuthRejection {
    LoginRequired,
    Store(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::LoginRequired => flash::redirect(
                CookieJar::new(),
                Denial::LoginRequired.fallback(),
                Flash::danger(Denial::LoginRequired.message()),
            ),
            AuthRejection::Store(e) => e.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match resolve_account(parts, state).await {
            Ok(Some(account)) => Ok(AuthUser { account }),
            Ok(None) => Err(AuthRejection::LoginRequired),
            Err(e) => Err(AuthRejection::Store(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, password: &str, confirm: &str, role: Option<&str>) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn hash_is_salted_and_verifies() {
        let first = hash_password("pw1").unwrap();
        let second = hash_password("pw1").unwrap();
        assert_ne!(first, second);
        assert_ne!(first, "pw1");
        assert!(verify_password("pw1", &first));
        assert!(!verify_password("pw2", &first));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("pw1", "pw1"));
    }

    #[test]
    fn session_tokens_are_unique() {
        assert_ne!(new_session_token(), new_session_token());
    }

    #[test]
    fn registration_requires_all_fields() {
        assert_eq!(
            validate_registration(form("", "pw", "pw", None), true),
            Err("Please fill in all fields.")
        );
        assert_eq!(
            validate_registration(form("alice", "", "", None), true),
            Err("Please fill in all fields.")
        );
    }

    #[test]
    fn registration_rejects_mismatched_confirmation() {
        assert_eq!(
            validate_registration(form("alice", "pw1", "pw2", None), true),
            Err("Password and confirmation do not match.")
        );
    }

    #[test]
    fn registration_role_defaults_to_viewer() {
        let reg = validate_registration(form("alice", "pw1", "pw1", None), true).unwrap();
        assert_eq!(reg.role, Role::Viewer);
    }

    #[test]
    fn registration_honours_requested_role_when_allowed() {
        let reg =
            validate_registration(form("alice", "pw1", "pw1", Some("collaborator")), true).unwrap();
        assert_eq!(reg.role, Role::Collaborator);

        assert_eq!(
            validate_registration(form("alice", "pw1", "pw1", Some("superuser")), true),
            Err("Invalid role.")
        );
    }

    #[test]
    fn registration_forces_viewer_when_selection_disabled() {
        let reg = validate_registration(form("alice", "pw1", "pw1", Some("admin")), false).unwrap();
        assert_eq!(reg.role, Role::Viewer);
    }

    #[test]
    fn blocked_message_carries_reason_verbatim() {
        let outcome = LoginOutcome::Blocked {
            reason: "Spam: 3 reports".to_string(),
        };
        assert_eq!(
            outcome.message(),
            "Your account has been blocked. Reason: Spam: 3 reports"
        );
    }
}
