//! Local (SurrealKV) persistence through `SurrealHandle::local`.

use gradebook_state::storage_traits::*;
use gradebook_state::SurrealHandle;

#[tokio::test]
async fn local_database_is_created_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("db");
    let path_str = path.to_str().expect("utf-8 path").to_string();

    let handle = SurrealHandle::local(&path_str).await.expect("open local db");
    assert!(path.exists(), "database directory should be created");

    let mut scores = Scores::new();
    scores.insert("code".to_string(), 9);
    let evaluation = handle
        .create_evaluation(NewEvaluation {
            project_id: 1,
            participant_id: 2,
            evaluator_id: 3,
            scores,
            comment: Some("persisted".to_string()),
            total_score: 9,
        })
        .await
        .unwrap();

    let reader = handle.clone();
    let fetched = reader.get_evaluation(evaluation.id).await.unwrap().unwrap();
    assert_eq!(fetched.total_score, 9);
    assert_eq!(fetched.comment.as_deref(), Some("persisted"));
    assert_eq!(fetched.created_at, evaluation.created_at);
}
