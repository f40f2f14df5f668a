// tests/storage_file.rs
//
// The JSON file store survives a restart and reports clean errors.

use factflow_backend::analyze::Analysis;
use factflow_backend::scoring::{TrustLabel, TrustScore};
use factflow_backend::storage::{
    article_id_for, ArticleRecord, FileStore, Store, StoreError, UserRecord, VoteRecord,
};

fn analysis() -> Analysis {
    Analysis {
        trust: TrustScore::neutral(),
        explanation: "Text too short for reliable analysis".into(),
        api_available: true,
        main_topic: None,
        model_details: None,
    }
}

#[tokio::test]
async fn documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("factflow.json");

    let text = "Short one";
    let id = article_id_for(text);
    let user = UserRecord::new("ana", "ana@example.com", "hash");
    {
        let store = FileStore::open(&path).unwrap();
        store
            .save_article(ArticleRecord::from_analysis(&id, text, &analysis()))
            .await
            .unwrap();
        store.create_user(user.clone()).await.unwrap();
        store
            .save_vote(VoteRecord::new(&id, &user.user_id, 1))
            .await
            .unwrap();
    }

    let reopened = FileStore::open(&path).unwrap();
    let article = reopened.get_article(&id).await.unwrap().expect("article persisted");
    assert_eq!(article.ai_label, TrustLabel::Yellow);
    assert_eq!(article.text, text);

    let tally = reopened.get_votes(&id).await.unwrap();
    assert_eq!((tally.positive, tally.negative, tally.total), (1, 0, 1));

    let found = reopened
        .find_user_by_email("ANA@example.com")
        .await
        .unwrap()
        .expect("user persisted");
    assert_eq!(found.user_id, user.user_id);
    assert_eq!(reopened.get_user_vote_count(&user.user_id).await.unwrap(), 1);
}

#[tokio::test]
async fn corrupt_file_is_an_encoding_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(FileStore::open(&path), Err(StoreError::Encoding(_))));
}

#[tokio::test]
async fn conflicts_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    let store = FileStore::open(&path).unwrap();

    store
        .create_user(UserRecord::new("ana", "ana@example.com", "h"))
        .await
        .unwrap();
    let dup = store
        .create_user(UserRecord::new("Ana", "other@example.com", "h"))
        .await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));

    let reopened = FileStore::open(&path).unwrap();
    assert!(reopened
        .find_user_by_email("other@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_flush_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docs.json");
    let store = FileStore::open(&path).unwrap();

    // a directory at the target makes the final rename fail
    std::fs::create_dir(&path).unwrap();
    let first = store
        .create_user(UserRecord::new("ana", "ana@example.com", "h"))
        .await;
    assert!(matches!(first, Err(StoreError::Io(_))));
    assert!(store
        .find_user_by_email("ana@example.com")
        .await
        .unwrap()
        .is_none());

    std::fs::remove_dir(&path).unwrap();
    store
        .create_user(UserRecord::new("ana", "ana@example.com", "h"))
        .await
        .unwrap();

    let reopened = FileStore::open(&path).unwrap();
    assert!(reopened
        .find_user_by_email("ana@example.com")
        .await
        .unwrap()
        .is_some());
}
