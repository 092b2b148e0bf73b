use std::sync::Arc;

use bridge_core::model::{
    Activity, ActivityId, CourseId, CourseOutline, EnrolleeId, ModuleId, ModuleOutline,
    StateBlob, SuccessThreshold,
};
use bridge_core::normalizer::CanonicalResult;
use bridge_core::origin::Origin;
use bridge_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{CatalogRepository, ProgressRepository, StateStore};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn activity(id: u64, module: u64, origins: Vec<Origin>) -> Activity {
    Activity::new(
        ActivityId::new(id),
        ModuleId::new(module),
        CourseId::new(1),
        SuccessThreshold::new(0.8).unwrap(),
        origins,
    )
}

fn outline(modules: Vec<(u64, Vec<u64>)>) -> CourseOutline {
    let modules = modules
        .into_iter()
        .map(|(module, ids)| {
            let activities = ids.into_iter().map(|id| activity(id, module, Vec::new())).collect();
            ModuleOutline::new(ModuleId::new(module), activities)
        })
        .collect();
    CourseOutline::new(CourseId::new(1), modules).unwrap()
}

fn result(score: f64, completed: bool, success: bool, progress: f64) -> CanonicalResult {
    CanonicalResult {
        score,
        completed,
        success,
        progress_percent: progress,
    }
}

#[tokio::test]
async fn state_blob_round_trips_byte_for_byte() {
    let repo = connect("memdb_state_roundtrip").await;
    let (enrollee, activity) = (EnrolleeId::new(7), ActivityId::new(11));

    assert_eq!(repo.load_state(enrollee, activity).await.unwrap(), None);

    let raw = r#"{ "scoreText": "3/4",  "answers": {"q1": [1, 2.50]} }"#;
    let blob = StateBlob::from_raw(raw).unwrap();
    repo.save_state(enrollee, activity, &blob, fixed_now())
        .await
        .unwrap();

    let loaded = repo.load_state(enrollee, activity).await.unwrap().unwrap();
    assert_eq!(loaded.as_str(), raw);

    let replacement = StateBlob::from_raw("[]").unwrap();
    repo.save_state(enrollee, activity, &replacement, fixed_now())
        .await
        .unwrap();
    assert_eq!(
        repo.load_state(enrollee, activity).await.unwrap(),
        Some(replacement)
    );
}

#[tokio::test]
async fn merge_keeps_the_best_of_each_field() {
    let repo = connect("memdb_merge_best").await;
    let (enrollee, activity) = (EnrolleeId::new(1), ActivityId::new(1));
    let first = fixed_now();
    let later = first + Duration::minutes(5);

    let row = repo
        .merge_result(enrollee, activity, &result(100.0, true, true, 50.0), first)
        .await
        .unwrap();
    assert_eq!(row.score(), Some(100.0));
    assert_eq!(row.attempts(), 1);

    let row = repo
        .merge_result(enrollee, activity, &result(40.0, false, false, 75.0), later)
        .await
        .unwrap();
    assert_eq!(row.score(), Some(100.0));
    assert!(row.is_complete());
    assert!(row.is_success());
    assert_eq!(row.progress_percent(), 75.0);
    assert_eq!(row.attempts(), 2);
    assert_eq!(row.last_accessed(), Some(later));
}

#[tokio::test]
async fn saving_state_does_not_touch_scores() {
    let repo = connect("memdb_state_scores").await;
    let (enrollee, activity) = (EnrolleeId::new(2), ActivityId::new(3));

    repo.merge_result(enrollee, activity, &result(60.0, false, false, 60.0), fixed_now())
        .await
        .unwrap();
    repo.save_state(enrollee, activity, &StateBlob::from_raw("{}").unwrap(), fixed_now())
        .await
        .unwrap();

    let row = repo.get_progress(enrollee, activity).await.unwrap().unwrap();
    assert_eq!(row.score(), Some(60.0));
    assert_eq!(row.attempts(), 1);
    assert!(row.state().is_some());
}

#[tokio::test]
async fn state_only_row_has_no_score() {
    let repo = connect("memdb_state_only").await;
    let (enrollee, activity) = (EnrolleeId::new(2), ActivityId::new(4));

    repo.save_state(enrollee, activity, &StateBlob::from_raw("1").unwrap(), fixed_now())
        .await
        .unwrap();

    let row = repo.get_progress(enrollee, activity).await.unwrap().unwrap();
    assert_eq!(row.score(), None);
    assert!(!row.is_complete());
    assert_eq!(row.attempts(), 0);
}

#[tokio::test]
async fn catalog_round_trips_and_drops_stale_entries() {
    let repo = connect("memdb_catalog").await;
    let origin = Origin::parse("https://content.example.org").unwrap();

    let first = CourseOutline::new(
        CourseId::new(1),
        vec![
            ModuleOutline::new(
                ModuleId::new(10),
                vec![activity(100, 10, vec![origin.clone()]), activity(101, 10, Vec::new())],
            ),
            ModuleOutline::new(ModuleId::new(20), vec![activity(200, 20, Vec::new())]),
        ],
    )
    .unwrap();
    repo.upsert_course(&first).await.unwrap();

    let loaded = repo.get_course(CourseId::new(1)).await.unwrap().unwrap();
    assert_eq!(loaded, first);

    let fetched = repo.get_activity(ActivityId::new(100)).await.unwrap().unwrap();
    assert_eq!(fetched.allowed_origins(), &[origin]);
    assert_eq!(fetched.success_threshold().value(), 0.8);

    // Module 20 and activity 101 go away; 200 moves into module 10.
    let second = outline(vec![(10, vec![200, 100])]);
    repo.upsert_course(&second).await.unwrap();

    let loaded = repo.get_course(CourseId::new(1)).await.unwrap().unwrap();
    assert_eq!(loaded.modules().len(), 1);
    let ids: Vec<u64> = loaded.activities().map(|a| a.id().value()).collect();
    assert_eq!(ids, vec![200, 100]);
    assert!(repo.get_activity(ActivityId::new(101)).await.unwrap().is_none());
    assert!(repo.get_course(CourseId::new(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn list_progress_follows_course_order() {
    let repo = connect("memdb_list_progress").await;
    repo.upsert_course(&outline(vec![(1, vec![3, 1]), (2, vec![2])]))
        .await
        .unwrap();
    let enrollee = EnrolleeId::new(9);

    for id in [2, 1, 3, 99] {
        repo.merge_result(
            enrollee,
            ActivityId::new(id),
            &result(50.0, false, false, 0.0),
            fixed_now(),
        )
        .await
        .unwrap();
    }

    let rows = repo.list_progress(enrollee, CourseId::new(1)).await.unwrap();
    let ids: Vec<u64> = rows.iter().map(|r| r.activity_id().value()).collect();
    assert_eq!(ids, vec![3, 1, 2]);

    assert!(
        repo.list_progress(EnrolleeId::new(10), CourseId::new(1))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn concurrent_merges_lose_no_maximum() {
    let repo = Arc::new(connect("memdb_concurrent").await);
    let (enrollee, activity) = (EnrolleeId::new(1), ActivityId::new(1));

    let mut handles = Vec::new();
    for score in [10.0, 90.0, 30.0, 70.0, 50.0, 20.0, 80.0, 40.0] {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.merge_result(
                enrollee,
                activity,
                &result(score, false, score >= 70.0, score),
                fixed_now(),
            )
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let row = repo.get_progress(enrollee, activity).await.unwrap().unwrap();
    assert_eq!(row.score(), Some(90.0));
    assert_eq!(row.progress_percent(), 90.0);
    assert!(row.is_success());
    assert_eq!(row.attempts(), 8);
}
