//! Page-by-page walk over one search window

use crate::github::client::ApiError;
use crate::github::search::{RepoItem, SearchClient};
use crate::window::DateWindow;
use std::collections::VecDeque;

/// Walks every result page of a window whose count fits the cap
///
/// Page 1 reveals the total count; the walk then covers
/// `ceil(min(total, cap) / per_page)` pages, pausing for the configured page
/// delay before each page after the first. Items come out in API order.
/// Each page costs one request, so a walker is consumed once and not restarted.
///
/// Use either [`next_page`](Self::next_page) or [`next_item`](Self::next_item)
/// to drain a walker.
pub struct PageWalker<'a> {
    search: &'a SearchClient,
    window: DateWindow,
    next_page: u32,
    total_pages: Option<u32>,
    total_count: Option<u64>,
    pages_fetched: u32,
    buffered: VecDeque<RepoItem>,
}

impl<'a> PageWalker<'a> {
    pub fn new(search: &'a SearchClient, window: DateWindow) -> Self {
        Self {
            search,
            window,
            next_page: 1,
            total_pages: None,
            total_count: None,
            pages_fetched: 0,
            buffered: VecDeque::new(),
        }
    }

    pub fn window(&self) -> DateWindow {
        self.window
    }

    /// Total count reported by page 1, once fetched
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Number of pages the walk covers, once page 1 is fetched
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Pages requested so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Returns the items of the next page, or `None` when the walk is over
    pub async fn next_page(&mut self) -> Result<Option<Vec<RepoItem>>, ApiError> {
        if !self.buffered.is_empty() {
            return Ok(Some(self.buffered.drain(..).collect()));
        }

        if let Some(total_pages) = self.total_pages {
            if self.next_page > total_pages {
                return Ok(None);
            }
        }

        if self.next_page > 1 {
            let delay = self.search.page_delay();
            tracing::debug!("Waiting {:?} before page {}", delay, self.next_page);
            self.search.client().pause(delay).await;
        }

        let page = self.next_page;
        let result = self.search.search_page(&self.window, page).await?;
        self.pages_fetched += 1;
        self.next_page += 1;

        if self.total_pages.is_none() {
            let total_pages = pages_for(result.total_count, self.search.cap(), self.search.per_page());
            tracing::info!(
                "Window {} -> total_count={}, pages={}",
                self.window,
                result.total_count,
                total_pages
            );
            self.total_count = Some(result.total_count);
            self.total_pages = Some(total_pages);
        }

        tracing::info!(
            "Window {}: page {}/{} ({} items)",
            self.window,
            page,
            self.total_pages.unwrap_or(page).max(page),
            result.items.len()
        );

        Ok(Some(result.items))
    }

    /// Returns the next item across pages, or `None` when the walk is over
    pub async fn next_item(&mut self) -> Result<Option<RepoItem>, ApiError> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Ok(Some(item));
            }

            match self.next_page().await? {
                Some(items) => self.buffered.extend(items),
                None => return Ok(None),
            }
        }
    }
}

/// Number of pages needed to reach every reachable result
pub fn pages_for(total_count: u64, cap: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    let reachable = total_count.min(cap);
    let pages = reachable.div_ceil(per_page);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
