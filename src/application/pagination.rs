//! Offset pagination helpers for listings and their navigation controls.

use serde::Serialize;

/// Number of contiguous page numbers shown around the current page.
const NAV_WINDOW: u32 = 5;

/// A clamped page position within a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl PageWindow {
    /// Index of the first item on the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Apply the window to an already materialised list.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset())
            .unwrap_or(usize::MAX)
            .min(items.len());
        let end = start.saturating_add(self.page_size as usize).min(items.len());
        &items[start..end]
    }
}

/// Compute the window for `current_page`, clamping it into `[1, max(total_pages, 1)]`.
///
/// `page_size` is a positive constant per listing type; zero is treated as one.
pub fn compute_page_window(current_page: u32, total_items: u64, page_size: u32) -> PageWindow {
    let page_size = page_size.max(1);
    let total_pages = u32::try_from(total_items.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);
    let current_page = current_page.clamp(1, total_pages.max(1));
    PageWindow {
        current_page,
        total_pages,
        page_size,
        total_items,
    }
}

/// One slot of a pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "page")]
pub enum PageMarker {
    Page(u32),
    Ellipsis,
}

/// Page numbers for a navigation control.
///
/// Always includes the first and last page plus up to five contiguous pages around the
/// current one; a single ellipsis stands in for every run of omitted pages.
pub fn compute_page_numbers(current_page: u32, total_pages: u32) -> Vec<PageMarker> {
    if total_pages == 0 {
        return Vec::new();
    }
    if total_pages <= NAV_WINDOW {
        return (1..=total_pages).map(PageMarker::Page).collect();
    }

    let current = current_page.clamp(1, total_pages);
    let half = NAV_WINDOW / 2;
    let start = current
        .saturating_sub(half)
        .clamp(1, total_pages - NAV_WINDOW + 1);
    let end = start + NAV_WINDOW - 1;

    let mut pages = Vec::with_capacity(NAV_WINDOW as usize + 2);
    if start > 1 {
        pages.push(1);
    }
    pages.extend(start..=end);
    if end < total_pages {
        pages.push(total_pages);
    }

    let mut markers = Vec::with_capacity(pages.len() + 2);
    let mut previous: Option<u32> = None;
    for page in pages {
        if let Some(prev) = previous {
            if page - prev > 1 {
                markers.push(PageMarker::Ellipsis);
            }
        }
        markers.push(PageMarker::Page(page));
        previous = Some(page);
    }
    markers
}
