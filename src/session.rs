//! Bookkeeping for page-change driven extraction.
//!
//! A viewer starts an extraction whenever the visible page changes. Results
//! of an extraction that was overtaken by a newer page change must be dropped
//! rather than merged with the current page's results.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::media::MediaAsset;

/// Handle for one extraction request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageTicket {
    generation: u64,
    pub page_index: usize,
}

/// Issues tickets and decides whether a finished extraction is still wanted.
///
/// Shareable across threads; only the most recently issued ticket is current.
#[derive(Debug, Default)]
pub struct PageRequestTracker {
    latest: AtomicU64,
}

impl PageRequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `page_index`, superseding every earlier ticket.
    pub fn begin(&self, page_index: usize) -> PageTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        PageTicket { generation, page_index }
    }

    pub fn is_current(&self, ticket: &PageTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.generation
    }

    /// Hand back `assets` if `ticket` is still current, otherwise drop them.
    pub fn complete(&self, ticket: PageTicket, assets: Vec<MediaAsset>) -> Option<Vec<MediaAsset>> {
        if self.is_current(&ticket) {
            Some(assets)
        } else {
            debug!(
                page = ticket.page_index,
                dropped = assets.len(),
                "discarding superseded page extraction"
            );
            None
        }
    }
}
