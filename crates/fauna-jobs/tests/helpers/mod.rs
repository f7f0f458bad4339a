//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing_subscriber::fmt::MakeWriter;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use uuid::Uuid;

use fauna_core::{
    parent_tag_value, tag_lineage, AnimalDetectionConfig, AssetRepository, AssetVisibility,
    ConfigProvider, DetectableAsset, Error, JobQueue, PreviewFile, Result, StatusRepository, Tag,
    TagRepository, WorkItem,
};

/// Preview path the fixtures give to `asset`.
pub fn preview_path(asset_id: Uuid) -> String {
    format!("/thumbs/{}.jpeg", asset_id)
}

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub asset: DetectableAsset,
    pub deleted: bool,
}

/// Asset table plus the shared recognition markers.
#[derive(Clone, Default)]
pub struct InMemoryAssets {
    assets: Arc<Mutex<BTreeMap<Uuid, StoredAsset>>>,
    status: InMemoryStatus,
}

impl InMemoryAssets {
    pub fn new(status: InMemoryStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Insert a visible asset with one preview.
    pub fn add(&self, owner_id: Uuid) -> Uuid {
        self.add_with(owner_id, AssetVisibility::Timeline, true)
    }

    pub fn add_many(&self, owner_id: Uuid, count: usize) -> Vec<Uuid> {
        (0..count).map(|_| self.add(owner_id)).collect()
    }

    pub fn add_with(&self, owner_id: Uuid, visibility: AssetVisibility, preview: bool) -> Uuid {
        let id = Uuid::new_v4();
        let preview_files = if preview {
            vec![PreviewFile {
                id: Uuid::new_v4(),
                asset_id: id,
                path: preview_path(id),
            }]
        } else {
            vec![]
        };
        self.assets.lock().unwrap().insert(
            id,
            StoredAsset {
                asset: DetectableAsset {
                    id,
                    owner_id,
                    visibility,
                    preview_files,
                },
                deleted: false,
            },
        );
        id
    }

    pub fn delete(&self, asset_id: Uuid) {
        if let Some(stored) = self.assets.lock().unwrap().get_mut(&asset_id) {
            stored.deleted = true;
        }
    }

    fn detectable_ids(&self) -> Vec<Uuid> {
        self.assets
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                !s.deleted && s.asset.visibility.is_detectable() && !s.asset.preview_files.is_empty()
            })
            .map(|s| s.asset.id)
            .collect()
    }
}

#[async_trait]
impl AssetRepository for InMemoryAssets {
    fn stream_eligible(&self, force: bool) -> BoxStream<'_, Result<Uuid>> {
        let ids: Vec<Uuid> = self
            .detectable_ids()
            .into_iter()
            .filter(|id| force || !self.status.is_marked(*id))
            .collect();
        stream::iter(ids.into_iter().map(Ok)).boxed()
    }

    async fn count_detectable(&self) -> Result<u64> {
        Ok(self.detectable_ids().len() as u64)
    }

    async fn page_detectable(&self, page: u32, page_size: u32) -> Result<Vec<Uuid>> {
        // BTreeMap iteration is ordered by id.
        Ok(self
            .detectable_ids()
            .into_iter()
            .skip(page as usize * page_size as usize)
            .take(page_size as usize)
            .collect())
    }

    async fn get_detectable(&self, asset_id: Uuid) -> Result<Option<DetectableAsset>> {
        Ok(self
            .assets
            .lock()
            .unwrap()
            .get(&asset_id)
            .filter(|s| !s.deleted)
            .map(|s| s.asset.clone()))
    }
}

/// `animals_recognized_at` markers.
#[derive(Clone, Default)]
pub struct InMemoryStatus {
    marks: Arc<Mutex<HashMap<Uuid, DateTime<Utc>>>>,
}

impl InMemoryStatus {
    pub fn is_marked(&self, asset_id: Uuid) -> bool {
        self.marks.lock().unwrap().contains_key(&asset_id)
    }

    pub fn marked_count(&self) -> usize {
        self.marks.lock().unwrap().len()
    }
}

#[async_trait]
impl StatusRepository for InMemoryStatus {
    async fn mark_animals_recognized(&self, asset_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.marks.lock().unwrap().insert(asset_id, at);
        Ok(())
    }

    async fn animals_recognized_at(&self, asset_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        Ok(self.marks.lock().unwrap().get(&asset_id).copied())
    }
}

#[derive(Default)]
struct TagState {
    /// (owner, value) -> tag
    tags: HashMap<(Uuid, String), Tag>,
    links: HashSet<(Uuid, Uuid)>,
}

/// Tag table and asset links with the same uniqueness rules as the database.
#[derive(Clone, Default)]
pub struct InMemoryTags {
    state: Arc<Mutex<TagState>>,
    known_owners: Arc<Mutex<Option<HashSet<Uuid>>>>,
}

impl InMemoryTags {
    /// Reject upserts for owners outside `owners`.
    pub fn with_known_owners(self, owners: &[Uuid]) -> Self {
        *self.known_owners.lock().unwrap() = Some(owners.iter().copied().collect());
        self
    }

    pub fn tag_count(&self, owner_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .tags
            .keys()
            .filter(|(owner, _)| *owner == owner_id)
            .count()
    }

    pub fn get(&self, owner_id: Uuid, value: &str) -> Option<Tag> {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(&(owner_id, value.to_string()))
            .cloned()
    }

    /// Link `value` to `asset_id` outside the pipeline, as a user would.
    pub fn tag_manually(&self, owner_id: Uuid, asset_id: Uuid, value: &str) {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let tag_id = state
            .tags
            .entry((owner_id, value.to_string()))
            .or_insert_with(|| Tag {
                id: Uuid::new_v4(),
                user_id: owner_id,
                value: value.to_string(),
                parent_id: None,
                created_at: now,
                updated_at: now,
            })
            .id;
        state.links.insert((tag_id, asset_id));
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }

    /// Tag values linked to `asset_id`, sorted.
    pub fn values_for(&self, asset_id: Uuid) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut values: Vec<String> = state
            .tags
            .values()
            .filter(|t| state.links.contains(&(t.id, asset_id)))
            .map(|t| t.value.clone())
            .collect();
        values.sort();
        values
    }
}

#[async_trait]
impl TagRepository for InMemoryTags {
    async fn upsert_tags(&self, owner_id: Uuid, names: &[String]) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(known) = self.known_owners.lock().unwrap().as_ref() {
            if !known.contains(&owner_id) {
                return Err(Error::UserNotFound(owner_id));
            }
        }

        let mut state = self.state.lock().unwrap();
        let mut requested = Vec::new();
        for name in names {
            for value in tag_lineage(name) {
                let key = (owner_id, value.to_string());
                if !state.tags.contains_key(&key) {
                    let parent_id = parent_tag_value(value)
                        .and_then(|p| state.tags.get(&(owner_id, p.to_string())))
                        .map(|t| t.id);
                    let now = Utc::now();
                    state.tags.insert(
                        key.clone(),
                        Tag {
                            id: Uuid::new_v4(),
                            user_id: owner_id,
                            value: value.to_string(),
                            parent_id,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                }
            }
            requested.push(name.clone());
        }
        // Same order as the database implementation.
        requested.sort();
        requested.dedup();

        Ok(requested
            .iter()
            .filter_map(|name| state.tags.get(&(owner_id, name.clone())).cloned())
            .collect())
    }

    async fn link_assets(&self, tag_id: Uuid, asset_ids: &[Uuid]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        Ok(asset_ids
            .iter()
            .filter(|asset_id| state.links.insert((tag_id, **asset_id)))
            .count() as u64)
    }

    async fn unlink_asset_under(&self, asset_id: Uuid, root: &str, keep: &[Uuid]) -> Result<u64> {
        let prefix = format!("{}/", root);
        let mut state = self.state.lock().unwrap();
        let under_root: HashSet<Uuid> = state
            .tags
            .values()
            .filter(|t| t.value == root || t.value.starts_with(&prefix))
            .map(|t| t.id)
            .filter(|id| !keep.contains(id))
            .collect();
        let before = state.links.len();
        state
            .links
            .retain(|(tag_id, linked)| *linked != asset_id || !under_root.contains(tag_id));
        Ok((before - state.links.len()) as u64)
    }

    async fn get_for_asset(&self, asset_id: Uuid) -> Result<Vec<Tag>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .values()
            .filter(|t| state.links.contains(&(t.id, asset_id)))
            .cloned()
            .collect())
    }
}

/// Records every submission instead of persisting it.
#[derive(Clone, Default)]
pub struct RecordingQueue {
    batches: Arc<Mutex<Vec<Vec<WorkItem>>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingQueue {
    pub fn failing() -> Self {
        let queue = Self::default();
        queue.fail.store(true, Ordering::SeqCst);
        queue
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn items(&self) -> Vec<WorkItem> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn submit_batch(&self, items: &[WorkItem]) -> Result<usize> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Job("queue unavailable".to_string()));
        }
        self.batches.lock().unwrap().push(items.to_vec());
        Ok(items.len())
    }
}

/// Configuration that tests can change between calls.
#[derive(Clone, Default)]
pub struct StaticConfig {
    config: Arc<Mutex<AnimalDetectionConfig>>,
}

impl StaticConfig {
    pub fn new(config: AnimalDetectionConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(AnimalDetectionConfig {
            enabled: false,
            ..Default::default()
        })
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.lock().unwrap().enabled = enabled;
    }
}

#[async_trait]
impl ConfigProvider for StaticConfig {
    async fn animal_detection_config(&self) -> Result<AnimalDetectionConfig> {
        Ok(self.config.lock().unwrap().clone())
    }
}

/// Every collaborator of the pipeline, wired together.
pub struct Fixture {
    pub owner_id: Uuid,
    pub status: InMemoryStatus,
    pub assets: InMemoryAssets,
    pub tags: InMemoryTags,
    pub queue: RecordingQueue,
    pub config: StaticConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let owner_id = Uuid::new_v4();
        let status = InMemoryStatus::default();
        Self {
            owner_id,
            assets: InMemoryAssets::new(status.clone()),
            status,
            tags: InMemoryTags::default().with_known_owners(&[owner_id]),
            queue: RecordingQueue::default(),
            config: StaticConfig::default(),
        }
    }
}

/// Formatted log output collected for assertions.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Plain-text subscriber writing WARN and above into this buffer.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
