use super::*;
use crate::identity::test_doubles::dummy_session;

fn test_store() -> HttpTodoStore {
    // Unroutable on purpose: these tests never leave the process.
    let config = ProviderConfig::new("https://provider.invalid", "anon-key", "https://app.example.com/auth/callback");
    HttpTodoStore::new(&config, &dummy_session("a@b.com")).unwrap()
}

const ROW: &str = r#"{
    "id": 7,
    "user_id": "7c2f84f6-3b53-4b17-a1a0-6a2a8f3a9a01",
    "task": "Book viewing",
    "is_complete": false,
    "inserted_at": "2025-03-01T12:00:00Z"
}"#;

#[test]
fn parse_todos_reads_rows() {
    let rows = parse_todos(&format!("[{ROW}]")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 7);
    assert_eq!(rows[0].task, "Book viewing");
    assert!(!rows[0].is_complete);
}

#[test]
fn parse_todos_accepts_empty_list() {
    assert!(parse_todos("[]").unwrap().is_empty());
}

#[test]
fn parse_single_requires_exactly_one_row() {
    assert!(parse_single(&format!("[{ROW}]")).is_ok());
    assert!(matches!(parse_single("[]"), Err(ProviderError::ApiParse(_))));
    assert!(matches!(parse_single(&format!("[{ROW},{ROW}]")), Err(ProviderError::ApiParse(_))));
}

#[test]
fn todo_serde_round_trip() {
    let rows = parse_todos(&format!("[{ROW}]")).unwrap();
    let json = serde_json::to_string(&rows[0]).unwrap();
    let restored: Todo = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, rows[0]);
}

#[tokio::test]
async fn insert_rejects_blank_task_without_network() {
    let store = test_store();
    assert!(matches!(store.insert_own("").await, Err(TodoError::EmptyTask)));
    assert!(matches!(store.insert_own("   ").await, Err(TodoError::EmptyTask)));
}
