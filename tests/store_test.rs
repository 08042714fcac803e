//! Integration tests for the conversation store lifecycle

use gondola::db::Database;
use gondola::gateway::Role;
use tempfile::TempDir;

#[tokio::test]
async fn test_creates_database_and_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("dir").join("chat.db");

    let db = Database::new(&db_path).await.unwrap();
    assert!(db_path.exists());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_messages_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("chat.db");

    {
        let db = Database::new(&db_path).await.unwrap();
        let repo = db.messages();
        repo.append("s1", Role::User, "persisted").await.unwrap();
        db.flush_wal().await.unwrap();
        db.close().await.unwrap();
    }

    let db = Database::new(&db_path).await.unwrap();
    let messages = db.messages().recent("s1", 10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "persisted");
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_migration_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("chat.db");

    // Opening twice must not fail or wipe data.
    let db = Database::new(&db_path).await.unwrap();
    db.messages()
        .append("s1", Role::User, "before reopen")
        .await
        .unwrap();
    db.close().await.unwrap();

    let db = Database::new(&db_path).await.unwrap();
    assert_eq!(db.messages().recent("s1", 10).await.unwrap().len(), 1);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_created_at_is_recent_unix_seconds() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("chat.db")).await.unwrap();

    let before = chrono::Utc::now().timestamp();
    db.messages().append("s1", Role::User, "now").await.unwrap();
    let after = chrono::Utc::now().timestamp();

    let messages = db.messages().recent("s1", 1).await.unwrap();
    assert!(messages[0].created_at >= before);
    assert!(messages[0].created_at <= after);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_sessions_interleave_independently() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("chat.db")).await.unwrap();
    let repo = db.messages();

    repo.append("a", Role::User, "a1").await.unwrap();
    repo.append("b", Role::User, "b1").await.unwrap();
    repo.append("a", Role::Assistant, "a2").await.unwrap();

    let a = repo.recent("a", 10).await.unwrap();
    let b = repo.recent("b", 10).await.unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a[0].content, "a1");
    assert_eq!(a[1].content, "a2");
    assert_eq!(b.len(), 1);

    db.close().await.unwrap();
}
