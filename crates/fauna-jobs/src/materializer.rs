//! Tag materialization: upsert owner-scoped tags and make them the asset's
//! only links under the animal tag root.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use fauna_core::defaults::ANIMAL_TAG_ROOT;
use fauna_core::{Result, Tag, TagRepository};

/// Turns tag names into persisted tags linked to an asset.
#[derive(Clone)]
pub struct TagMaterializer {
    tags: Arc<dyn TagRepository>,
}

impl TagMaterializer {
    pub fn new(tags: Arc<dyn TagRepository>) -> Self {
        Self { tags }
    }

    /// Upsert `names` for `owner_id`, link each resulting tag to `asset_id`
    /// and drop the asset's other links under `Animals`.
    ///
    /// Afterwards the asset's animal links are exactly `names`, whatever an
    /// earlier detection left. Every step is idempotent, so a redelivered job
    /// converges on the same links.
    pub async fn materialize(
        &self,
        owner_id: Uuid,
        asset_id: Uuid,
        names: &[String],
    ) -> Result<Vec<Tag>> {
        let tags = self.tags.upsert_tags(owner_id, names).await?;

        let mut linked = 0;
        for tag in &tags {
            linked += self.tags.link_assets(tag.id, &[asset_id]).await?;
        }

        let keep: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
        let unlinked = self
            .tags
            .unlink_asset_under(asset_id, ANIMAL_TAG_ROOT, &keep)
            .await?;

        debug!(
            subsystem = "jobs",
            component = "materializer",
            %asset_id,
            %owner_id,
            tag_count = tags.len(),
            new_links = linked,
            removed_links = unlinked,
            "Materialized tags"
        );

        Ok(tags)
    }
}
