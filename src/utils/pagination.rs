use serde::Serialize;

/// Page bookkeeping for list endpoints.
///
/// Requests past the last page are clamped to it, requests below 1 go to page 1.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Paginator {
    pub pages: i64,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: Option<i64>,
    pub next: Option<i64>,
}

impl Paginator {
    pub fn new(total: i64, per_page: i64, requested_page: i64) -> Self {
        let per_page = per_page.max(1);
        let pages = ((total + per_page - 1) / per_page).max(1);
        let page = requested_page.clamp(1, pages);
        Self {
            pages,
            page,
            per_page,
            total,
            has_previous: page > 1,
            has_next: page < pages,
            previous: (page > 1).then_some(page - 1),
            next: (page < pages).then_some(page + 1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// Parses a page query value; anything unparsable means page 1.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.parse().ok()).unwrap_or(1)
}
