//! Integration tests for the animal detection repositories.
//!
//! Run against a migrated database with `cargo test -p fauna-db -- --ignored`.

use std::collections::HashSet;

use chrono::Utc;
use futures::TryStreamExt;
use uuid::Uuid;

use fauna_db::test_fixtures::{TestAsset, TestDatabase};
use fauna_db::{
    AnimalDetectionConfig, AssetRepository, AssetVisibility, ConfigProvider, Error, JobQueue,
    JobStatus, JobType, StatusRepository, TagRepository, WorkItem,
};

async fn eligible_ids(test_db: &TestDatabase, force: bool) -> HashSet<Uuid> {
    test_db
        .db
        .assets
        .stream_eligible(force)
        .try_collect::<HashSet<_>>()
        .await
        .expect("stream eligible assets")
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_stream_eligible_filters_hidden_deleted_and_previewless() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;

    let visible = test_db.seed_asset(TestAsset::new(owner)).await;
    let archived = test_db
        .seed_asset(TestAsset::new(owner).visibility(AssetVisibility::Archive))
        .await;
    let hidden = test_db
        .seed_asset(TestAsset::new(owner).visibility(AssetVisibility::Hidden))
        .await;
    let no_preview = test_db.seed_asset(TestAsset::new(owner).without_preview()).await;
    let deleted = test_db.seed_asset(TestAsset::new(owner).deleted()).await;
    let processed = test_db.seed_asset(TestAsset::new(owner)).await;
    test_db
        .db
        .status
        .mark_animals_recognized(processed, Utc::now())
        .await
        .unwrap();

    let natural = eligible_ids(&test_db, false).await;
    assert!(natural.contains(&visible));
    assert!(natural.contains(&archived));
    assert!(!natural.contains(&hidden));
    assert!(!natural.contains(&no_preview));
    assert!(!natural.contains(&deleted));
    assert!(!natural.contains(&processed));

    let forced = eligible_ids(&test_db, true).await;
    assert!(forced.contains(&visible));
    assert!(forced.contains(&processed));
    assert!(!forced.contains(&hidden));
    assert!(!forced.contains(&no_preview));

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_stream_eligible_yields_each_asset_once() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let asset = test_db.seed_asset(TestAsset::new(owner)).await;
    test_db.add_preview(asset, "/thumbs/second.jpeg").await;
    test_db.db.status.mark_animals_recognized(asset, Utc::now()).await.unwrap();

    let yielded: Vec<Uuid> = test_db
        .db
        .assets
        .stream_eligible(true)
        .try_filter(|id| futures::future::ready(*id == asset))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(yielded, vec![asset]);

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_get_detectable_returns_preview_and_visibility() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let id = test_db
        .seed_asset(TestAsset::new(owner).visibility(AssetVisibility::Locked))
        .await;

    let asset = test_db.db.assets.get_detectable(id).await.unwrap().unwrap();
    assert_eq!(asset.owner_id, owner);
    assert_eq!(asset.visibility, AssetVisibility::Locked);
    assert!(asset.preview_path().is_some());

    assert!(test_db
        .db
        .assets
        .get_detectable(Uuid::new_v4())
        .await
        .unwrap()
        .is_none());

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_page_detectable_covers_count() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    for _ in 0..3 {
        test_db.seed_asset(TestAsset::new(owner)).await;
    }

    let count = test_db.db.assets.count_detectable().await.unwrap();
    assert!(count >= 3);

    let page_size = 2;
    let pages = count.div_ceil(page_size as u64) as u32;
    let mut seen = HashSet::new();
    for page in 0..pages {
        let ids = test_db
            .db
            .assets
            .page_detectable(page, page_size)
            .await
            .unwrap();
        assert!(ids.len() <= page_size as usize);
        seen.extend(ids);
    }
    // Other tests may add assets concurrently, so pages can shift slightly.
    assert!(seen.len() as u64 >= count.saturating_sub(page_size as u64));
    assert!(test_db
        .db
        .assets
        .page_detectable(pages + 1_000_000, page_size)
        .await
        .unwrap()
        .is_empty());

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_mark_animals_recognized_last_write_wins() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let id = test_db.seed_asset(TestAsset::new(owner)).await;

    assert!(test_db
        .db
        .status
        .animals_recognized_at(id)
        .await
        .unwrap()
        .is_none());

    let first = Utc::now() - chrono::Duration::hours(1);
    let second = Utc::now();
    test_db.db.status.mark_animals_recognized(id, first).await.unwrap();
    test_db.db.status.mark_animals_recognized(id, second).await.unwrap();

    let stored = test_db.db.status.animals_recognized_at(id).await.unwrap().unwrap();
    assert_eq!(stored.timestamp_micros(), second.timestamp_micros());

    test_db.reset_animals_recognized(id).await;
    assert!(eligible_ids(&test_db, false).await.contains(&id));

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_upsert_tags_creates_hierarchy_once() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let names = vec!["Animals/Dog".to_string(), "Animals/Cat".to_string()];

    let first = test_db.db.tags.upsert_tags(owner, &names).await.unwrap();
    let second = test_db.db.tags.upsert_tags(owner, &names).await.unwrap();

    let values: Vec<_> = first.iter().map(|t| t.value.as_str()).collect();
    assert_eq!(values, vec!["Animals/Cat", "Animals/Dog"]);
    assert_eq!(
        first.iter().map(|t| t.id).collect::<Vec<_>>(),
        second.iter().map(|t| t.id).collect::<Vec<_>>()
    );

    assert_eq!(test_db.count_tags(owner, "Animals").await, 1);
    let parent_ids: HashSet<_> = first.iter().map(|t| t.parent_id).collect();
    assert_eq!(parent_ids.len(), 1);
    assert!(first[0].parent_id.is_some());

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_concurrent_upserts_resolve_to_one_tag() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let names = vec!["Animals/Dog".to_string()];

    let mut handles = Vec::new();
    for _ in 0..8 {
        let tags = test_db.db.tags.clone();
        let names = names.clone();
        handles.push(tokio::spawn(async move {
            tags.upsert_tags(owner, &names).await
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let tags = handle.await.unwrap().unwrap();
        ids.insert(tags[0].id);
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(
        test_db.count_tags(owner, "Animals/Dog").await,
        1
    );

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_upsert_leaves_existing_root_untouched() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let tags = &test_db.db.tags;

    tags.upsert_tags(owner, &["Animals/Dog".to_string()]).await.unwrap();
    let root_before = tags.upsert_tags(owner, &["Animals".to_string()]).await.unwrap();
    let cat = tags.upsert_tags(owner, &["Animals/Cat".to_string()]).await.unwrap();
    let root_after = tags.upsert_tags(owner, &["Animals".to_string()]).await.unwrap();

    assert_eq!(root_before[0].id, root_after[0].id);
    assert_eq!(root_before[0].updated_at, root_after[0].updated_at);
    assert_eq!(cat[0].parent_id, Some(root_after[0].id));

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_upsert_tags_unknown_owner() {
    let test_db = TestDatabase::new().await;
    let missing = Uuid::new_v4();
    let result = test_db
        .db
        .tags
        .upsert_tags(missing, &["Animals/Dog".to_string()])
        .await;
    assert!(matches!(result, Err(Error::UserNotFound(id)) if id == missing));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_link_assets_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let asset = test_db.seed_asset(TestAsset::new(owner)).await;
    let tags = test_db
        .db
        .tags
        .upsert_tags(owner, &["Animals/Dog".to_string()])
        .await
        .unwrap();

    assert_eq!(test_db.db.tags.link_assets(tags[0].id, &[asset]).await.unwrap(), 1);
    assert_eq!(test_db.db.tags.link_assets(tags[0].id, &[asset]).await.unwrap(), 0);

    let linked = test_db.db.tags.get_for_asset(asset).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].value, "Animals/Dog");

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_unlink_asset_under_keeps_new_and_unrelated_links() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let asset = test_db.seed_asset(TestAsset::new(owner)).await;
    let other = test_db.seed_asset(TestAsset::new(owner)).await;
    let tags = &test_db.db.tags;

    let dog = tags.upsert_tags(owner, &["Animals/Dog".to_string()]).await.unwrap();
    let holiday = tags.upsert_tags(owner, &["Holiday".to_string()]).await.unwrap();
    // Shares the prefix but not the root segment.
    let lookalike = tags.upsert_tags(owner, &["Animalsx".to_string()]).await.unwrap();
    for tag in dog.iter().chain(&holiday).chain(&lookalike) {
        tags.link_assets(tag.id, &[asset]).await.unwrap();
    }
    tags.link_assets(dog[0].id, &[other]).await.unwrap();

    // Dog -> Cat
    let cat = tags.upsert_tags(owner, &["Animals/Cat".to_string()]).await.unwrap();
    tags.link_assets(cat[0].id, &[asset]).await.unwrap();
    let removed = tags
        .unlink_asset_under(asset, "Animals", &[cat[0].id])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let values: Vec<String> = tags
        .get_for_asset(asset)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.value)
        .collect();
    assert_eq!(values, vec!["Animals/Cat", "Animalsx", "Holiday"]);

    // Cat -> nothing
    let removed = tags.unlink_asset_under(asset, "Animals", &[]).await.unwrap();
    assert_eq!(removed, 1);
    let values: Vec<String> = tags
        .get_for_asset(asset)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.value)
        .collect();
    assert_eq!(values, vec!["Animalsx", "Holiday"]);

    // Other assets keep their links.
    assert_eq!(tags.get_for_asset(other).await.unwrap().len(), 1);

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_submit_batch_and_claim() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_user().await;
    let asset = test_db.seed_asset(TestAsset::new(owner)).await;

    let queued = test_db
        .db
        .jobs
        .submit_batch(&[WorkItem::asset(asset)])
        .await
        .unwrap();
    assert_eq!(queued, 1);
    assert!(test_db.db.jobs.pending_count().await.unwrap() >= 1);

    // Claim until we find ours; other tests may share the queue.
    let mut found = None;
    while let Some(job) = test_db
        .db
        .jobs
        .claim_next_for_types(&[JobType::AnimalDetection])
        .await
        .unwrap()
    {
        assert_eq!(job.status, JobStatus::Running);
        if job.asset_id == Some(asset) {
            found = Some(job);
            break;
        }
        test_db.db.jobs.complete(job.id, None).await.unwrap();
    }

    let job = found.expect("submitted job should be claimable");
    let item: WorkItem = serde_json::from_value(job.payload.clone().unwrap()).unwrap();
    assert_eq!(item, WorkItem::asset(asset));

    test_db.db.jobs.complete(job.id, None).await.unwrap();
    let stored = test_db.db.jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);

    test_db.remove_user(owner).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_fail_retries_until_budget_exhausted() {
    let test_db = TestDatabase::new().await;
    let jobs = test_db.db.jobs.clone().with_max_retries(1);

    let id = jobs
        .queue(JobType::AnimalDetection, None, Some(serde_json::json!({"kind": "page", "number": 0})))
        .await
        .unwrap();

    jobs.fail(id, "first").await.unwrap();
    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);

    jobs.fail(id, "second").await.unwrap();
    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("second"));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_abandon_skips_retries() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;

    let id = jobs
        .queue(JobType::AnimalDetection, None, Some(serde_json::json!({"kind": "bogus"})))
        .await
        .unwrap();
    jobs.abandon(id, "invalid work item").await.unwrap();

    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 0);
    assert!(job.completed_at.is_some());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_requeue_stale_consumes_retry_budget() {
    let test_db = TestDatabase::new().await;
    let jobs = test_db.db.jobs.clone().with_max_retries(1);
    let id = jobs
        .queue(JobType::AnimalDetection, None, Some(serde_json::json!({"kind": "page", "number": 0})))
        .await
        .unwrap();

    test_db.backdate_running_job(id, chrono::Duration::hours(2)).await;
    assert!(jobs.requeue_stale(chrono::Duration::hours(1)).await.unwrap() >= 1);
    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);
    assert!(job.started_at.is_none());

    // A second crash exhausts the budget.
    test_db.backdate_running_job(id, chrono::Duration::hours(2)).await;
    jobs.requeue_stale(chrono::Duration::hours(1)).await.unwrap();
    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 1);
    assert!(job.completed_at.is_some());
    assert_eq!(job.error_message.as_deref(), Some(fauna_db::jobs::STALE_JOB_ERROR));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_requeue_stale_ignores_recent_jobs() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;
    let id = jobs
        .queue(JobType::AnimalDetection, None, Some(serde_json::json!({"kind": "page", "number": 0})))
        .await
        .unwrap();

    test_db.backdate_running_job(id, chrono::Duration::seconds(5)).await;
    jobs.requeue_stale(chrono::Duration::hours(1)).await.unwrap();

    let job = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.retry_count, 0);
    jobs.complete(id, None).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_system_config_round_trip() {
    let test_db = TestDatabase::new().await;
    let config = AnimalDetectionConfig {
        enabled: false,
        min_score: 0.7,
        ..Default::default()
    };
    test_db
        .db
        .config
        .set_animal_detection_config(&config)
        .await
        .unwrap();
    assert_eq!(test_db.db.config.animal_detection_config().await.unwrap(), config);

    test_db
        .db
        .config
        .set_animal_detection_config(&AnimalDetectionConfig::default())
        .await
        .unwrap();
}
