//! Resolves delivered work items into concrete asset ids.

use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use fauna_core::defaults::PAGE_SIZE;
use fauna_core::{AssetRepository, Result, WorkItem};

/// Expands a [`WorkItem`] into the assets it covers.
///
/// Page membership is looked up when the item is processed, never taken from
/// a snapshot, so it reflects the qualifying set at that moment.
#[derive(Clone)]
pub struct ChunkDispatcher {
    assets: Arc<dyn AssetRepository>,
    page_size: u32,
}

impl ChunkDispatcher {
    pub fn new(assets: Arc<dyn AssetRepository>) -> Self {
        Self {
            assets,
            page_size: PAGE_SIZE,
        }
    }

    /// Set the page size. Must match the size the enqueuer counted pages with.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Asset ids covered by `item`.
    pub async fn resolve(&self, item: &WorkItem) -> Result<Vec<Uuid>> {
        let ids = match *item {
            WorkItem::SingleAsset { id } => vec![id],
            WorkItem::Page { number } => {
                self.assets.page_detectable(number, self.page_size).await?
            }
        };
        trace!(
            subsystem = "jobs",
            component = "dispatcher",
            ?item,
            asset_count = ids.len(),
            "Resolved work item"
        );
        Ok(ids)
    }
}
