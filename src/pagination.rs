/// Fixed number of posts per listing page.
pub const PAGE_SIZE: i64 = 10;

/// PageWindow
///
/// A validated, 1-based window over the published posts. The listing is
/// ordered by descending id, so page 1 always holds the newest posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Page does not exist.")]
pub struct PageOutOfRange {
    pub requested: i64,
    pub total_pages: i64,
}

/// `ceil(total / PAGE_SIZE)`, never less than one so an empty site still has a page 1.
pub fn total_pages(total_items: i64) -> i64 {
    let pages = (total_items.max(0) + PAGE_SIZE - 1) / PAGE_SIZE;
    pages.max(1)
}

impl PageWindow {
    /// resolve
    ///
    /// Out-of-range requests are an error, never clamped: the caller redirects
    /// to page 1 with a message.
    pub fn resolve(requested: i64, total_items: i64) -> Result<Self, PageOutOfRange> {
        let total_pages = total_pages(total_items);
        if requested < 1 || requested > total_pages {
            return Err(PageOutOfRange {
                requested,
                total_pages,
            });
        }
        Ok(Self {
            page: requested,
            total_pages,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * PAGE_SIZE
    }

    pub fn limit(&self) -> i64 {
        PAGE_SIZE
    }
}
