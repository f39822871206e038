// 📄 Pagination Builder - page metadata → navigable links
// Derived fresh from every listing response, nothing is kept

use serde::{Deserialize, Serialize};

use crate::query::ListingUrl;

/// `meta` block of a listing response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_count: u64,
    pub limit: u64,
    pub offset: u64,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLinkKind {
    Previous,
    Page(u64),
    Next,
}

/// One navigation control. `url` is `None` exactly when `disabled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub kind: PageLinkKind,
    pub label: String,
    pub url: Option<String>,
    pub active: bool,
    pub disabled: bool,
}

impl PageLink {
    fn control(kind: PageLinkKind, label: &str, url: Option<&str>) -> Self {
        PageLink {
            kind,
            label: label.to_string(),
            url: url.map(str::to_string),
            active: false,
            disabled: url.is_none(),
        }
    }
}

/// Upper bound on generated page links; a larger server count is clamped
pub const MAX_PAGE_LINKS: u64 = 10_000;

pub fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Build previous / page 1..n / next links.
///
/// Page targets are the current listing URL with only `limit` and `offset`
/// rewritten, so ordering and filter parameters carry over untouched.
pub fn build_page_links(
    total: u64,
    page_size: u64,
    offset: u64,
    previous_url: Option<&str>,
    next_url: Option<&str>,
    current_url: &str,
) -> Vec<PageLink> {
    let pages = page_count(total, page_size);
    if pages > MAX_PAGE_LINKS {
        tracing::warn!(pages, max = MAX_PAGE_LINKS, "page count clamped");
    }
    let pages = pages.min(MAX_PAGE_LINKS);
    let mut links = Vec::with_capacity(usize::try_from(pages).unwrap_or(0).saturating_add(2));

    links.push(PageLink::control(PageLinkKind::Previous, "«", previous_url));

    let base = ListingUrl::parse(current_url);
    for page in 1..=pages {
        let page_offset = (page - 1) * page_size;
        let mut url = base.clone();
        url.set("limit", &page_size.to_string());
        url.set("offset", &page_offset.to_string());

        links.push(PageLink {
            kind: PageLinkKind::Page(page),
            label: page.to_string(),
            url: Some(url.to_string()),
            active: page_offset == offset,
            disabled: false,
        });
    }

    links.push(PageLink::control(PageLinkKind::Next, "»", next_url));
    links
}

/// Links for a listing response's `meta`
pub fn links_for(meta: &PaginationMeta, current_url: &str) -> Vec<PageLink> {
    build_page_links(
        meta.total_count,
        meta.limit,
        meta.offset,
        meta.previous.as_deref(),
        meta.next.as_deref(),
        current_url,
    )
}

/// e.g. "Showing 51–75 of 95"
pub fn page_summary(meta: &PaginationMeta) -> String {
    if meta.total_count == 0 || meta.offset >= meta.total_count {
        return "No results".to_string();
    }
    let last = if meta.limit == 0 {
        meta.total_count
    } else {
        meta.offset.saturating_add(meta.limit).min(meta.total_count)
    };
    format!("Showing {}–{} of {}", meta.offset.saturating_add(1), last, meta.total_count)
}
