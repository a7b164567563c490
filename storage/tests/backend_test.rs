use storage::{Backend, BackendError, DirectoryBackend, GroupBackend, MemoryBackend, StoredDocument};

fn readable(documents: &[StoredDocument]) -> Vec<&str> {
    documents
        .iter()
        .map(|entry| entry.document.as_deref().expect("Document should be readable"))
        .collect()
}

#[tokio::test]
async fn test_directory_backend_write_through() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let folder = dir.path().join("appState");

    let backend = DirectoryBackend::open(&folder)
        .await
        .expect("Failed to open directory backend");
    assert!(folder.is_dir());

    backend
        .save("g1", r#"{"name":"Pets","id":"g1","members":[]}"#.to_string())
        .await
        .expect("Failed to save document");
    backend
        .save("g2", r#"{"name":"Kids","id":"g2","members":[]}"#.to_string())
        .await
        .expect("Failed to save document");
    assert!(folder.join("g1.json").is_file());

    // A second instance plays the part of a freshly started process.
    let reopened = DirectoryBackend::open(&folder)
        .await
        .expect("Failed to reopen directory backend");
    let documents = reopened.load_all().await.expect("Failed to load documents");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id, "g1");
    assert!(readable(&documents)[0].contains("Pets"));
    assert!(readable(&documents)[1].contains("Kids"));
    assert!(!folder.join("g1.json.tmp").exists());

    backend
        .save("g1", r#"{"name":"Cats","id":"g1","members":[]}"#.to_string())
        .await
        .expect("Failed to overwrite document");
    let documents = reopened.load_all().await.expect("Failed to load documents");
    assert_eq!(documents.len(), 2);
    assert!(readable(&documents)[0].contains("Cats"));
}

#[tokio::test]
async fn test_directory_backend_delete() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let backend = DirectoryBackend::open(dir.path())
        .await
        .expect("Failed to open directory backend");

    backend
        .save("g1", "{}".to_string())
        .await
        .expect("Failed to save document");
    backend.delete("g1").await.expect("Failed to delete document");
    assert!(!dir.path().join("g1.json").exists());

    // Deleting twice is fine
    backend.delete("g1").await.expect("Second delete should succeed");
    assert!(backend.load_all().await.expect("Failed to load").is_empty());
}

#[tokio::test]
async fn test_directory_backend_ignores_foreign_files() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("notes.txt"), "hello").expect("Failed to write file");
    std::fs::create_dir(dir.path().join("nested.json")).expect("Failed to create dir");

    let backend = DirectoryBackend::open(dir.path())
        .await
        .expect("Failed to open directory backend");
    backend
        .save("g1", "{}".to_string())
        .await
        .expect("Failed to save document");

    let documents = backend.load_all().await.expect("Failed to load documents");
    assert_eq!(readable(&documents), vec!["{}"]);
}

#[tokio::test]
async fn test_directory_backend_reports_unreadable_entry_alone() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let backend = DirectoryBackend::open(dir.path())
        .await
        .expect("Failed to open directory backend");
    backend
        .save("g1", "{}".to_string())
        .await
        .expect("Failed to save document");
    std::fs::write(dir.path().join("broken.json"), [0xff, 0xfe, 0x00])
        .expect("Failed to write file");

    let documents = backend.load_all().await.expect("Listing should succeed");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id, "broken");
    assert!(matches!(documents[0].document, Err(BackendError::NotUtf8(_))));
    assert_eq!(documents[1].id, "g1");
    assert_eq!(documents[1].document.as_deref().ok(), Some("{}"));
}

#[tokio::test]
async fn test_directory_backend_rejects_path_ids() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let backend = DirectoryBackend::open(dir.path())
        .await
        .expect("Failed to open directory backend");

    let result = backend.save("../escape", "{}".to_string()).await;
    assert!(matches!(result, Err(BackendError::InvalidId(_))));
    let result = backend.delete("").await;
    assert!(matches!(result, Err(BackendError::InvalidId(_))));
}

#[tokio::test]
async fn test_memory_backend_shared_handle() {
    let memory = MemoryBackend::new();
    let backend = Backend::from(memory.clone());
    assert_eq!(backend.kind(), "memory");

    backend
        .save("g1", "doc".to_string())
        .await
        .expect("Failed to save document");
    assert_eq!(memory.get("g1").expect("lock"), Some("doc".to_string()));
    assert_eq!(memory.len().expect("lock"), 1);

    backend.delete("g1").await.expect("Failed to delete document");
    assert!(!memory.contains("g1").expect("lock"));
    assert!(memory.is_empty().expect("lock"));
}
