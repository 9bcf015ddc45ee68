mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{wait_for_status, FakeExtractor, InMemoryDatabase};
use study_assistant_core::ingestion::IngestionOutcome;
use study_assistant_core::{
    DocumentStatus, IngestionPipeline, IngestionQueue, QueueConfig, SubmitOutcome, TextChunker,
};

fn words(count: usize) -> String {
    (0..count).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
}

fn pipeline(db: Arc<InMemoryDatabase>, extractor: Arc<FakeExtractor>) -> Arc<IngestionPipeline> {
    let chunker = TextChunker::new(10, 2).unwrap();
    Arc::new(IngestionPipeline::new(db, extractor, chunker))
}

#[tokio::test]
async fn test_pipeline_stores_text_and_chunks() {
    let db = InMemoryDatabase::new();
    let document = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let text = words(25);
    let extractor = FakeExtractor::returning(&text, Some(3));

    let outcome = pipeline(db.clone(), extractor)
        .process(document.id, Path::new("/tmp/cells.pdf"))
        .await;

    // 25 words, step 8: windows start at 0, 8, 16, 24.
    assert_eq!(outcome, IngestionOutcome::Ready { chunk_count: 4 });
    let stored = db.document(document.id).await.unwrap();
    assert_eq!(stored.status, DocumentStatus::Ready);
    assert_eq!(stored.extracted_text.as_deref(), Some(text.as_str()));

    let chunks = db.chunks(document.id).await;
    let indexes: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
    assert!(chunks.iter().all(|c| (1..=3).contains(&c.page_number)));
    assert_eq!(chunks[0].page_number, 1);
}

#[tokio::test]
async fn test_extraction_failure_marks_document_failed() {
    let db = InMemoryDatabase::new();
    let document = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let extractor = FakeExtractor::failing("corrupt xref table");

    let outcome = pipeline(db.clone(), extractor)
        .process(document.id, Path::new("/tmp/broken.pdf"))
        .await;

    assert_eq!(outcome, IngestionOutcome::Failed);
    assert_eq!(
        db.document(document.id).await.unwrap().status,
        DocumentStatus::Failed
    );
    assert!(db.chunks(document.id).await.is_empty());
}

#[tokio::test]
async fn test_blank_extraction_marks_document_failed() {
    let db = InMemoryDatabase::new();
    let document = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let extractor = FakeExtractor::returning("  \n\t ", Some(1));

    let outcome = pipeline(db.clone(), extractor)
        .process(document.id, Path::new("/tmp/scanned.pdf"))
        .await;

    assert_eq!(outcome, IngestionOutcome::Failed);
    assert_eq!(db.ingestion_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ready_document_is_not_processed_again() {
    let db = InMemoryDatabase::new();
    let document = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Ready, Some("already done"))
        .await;
    let extractor = FakeExtractor::returning("new text", Some(1));

    let outcome = pipeline(db.clone(), extractor.clone())
        .process(document.id, Path::new("/tmp/cells.pdf"))
        .await;

    assert_eq!(outcome, IngestionOutcome::Skipped);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(db.ingestion_writes.load(Ordering::SeqCst), 0);
    assert_eq!(
        db.document(document.id).await.unwrap().extracted_text.as_deref(),
        Some("already done")
    );
}

#[tokio::test]
async fn test_queue_processes_submitted_document() {
    let db = InMemoryDatabase::new();
    let document = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let extractor = FakeExtractor::returning(&words(30), Some(2));
    let shutdown = CancellationToken::new();
    let (queue, handle) = IngestionQueue::start(
        pipeline(db.clone(), extractor),
        QueueConfig::default(),
        shutdown.clone(),
    );

    let outcome = queue
        .submit(document.id, PathBuf::from("/tmp/cells.pdf"))
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Accepted);
    assert_eq!(wait_for_status(&db, document.id).await, DocumentStatus::Ready);
    assert!(!db.chunks(document.id).await.is_empty());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker should stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_submission_is_ignored_while_in_flight() {
    let db = InMemoryDatabase::new();
    let document = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let gate = Arc::new(Notify::new());
    let extractor = FakeExtractor::gated(&words(12), gate.clone());
    let (queue, _handle) = IngestionQueue::start(
        pipeline(db.clone(), extractor.clone()),
        QueueConfig::default(),
        CancellationToken::new(),
    );
    let path = PathBuf::from("/tmp/cells.pdf");

    assert_eq!(
        queue.submit(document.id, path.clone()).unwrap(),
        SubmitOutcome::Accepted
    );
    assert!(queue.is_in_flight(document.id));
    assert_eq!(
        queue.submit(document.id, path.clone()).unwrap(),
        SubmitOutcome::AlreadyInFlight
    );
    assert_eq!(queue.in_flight_count(), 1);

    gate.notify_one();
    assert_eq!(wait_for_status(&db, document.id).await, DocumentStatus::Ready);

    for _ in 0..100 {
        if !queue.is_in_flight(document.id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!queue.is_in_flight(document.id));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(db.ingestion_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_submit_fails_after_worker_has_stopped() {
    let db = InMemoryDatabase::new();
    let extractor = FakeExtractor::returning("text", Some(1));
    let shutdown = CancellationToken::new();
    let (queue, handle) = IngestionQueue::start(
        pipeline(db, extractor),
        QueueConfig::default(),
        shutdown.clone(),
    );

    shutdown.cancel();
    handle.await.unwrap();

    let document_id = Uuid::new_v4();
    assert!(queue
        .submit(document_id, PathBuf::from("/tmp/late.pdf"))
        .is_err());
    assert!(!queue.is_in_flight(document_id));
}

async fn wait_for_extraction_calls(extractor: &FakeExtractor, calls: usize) {
    for _ in 0..200 {
        if extractor.calls.load(Ordering::SeqCst) >= calls {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("extractor was never called {} times", calls);
}

fn single_slot() -> QueueConfig {
    QueueConfig {
        capacity: 4,
        concurrency: 1,
    }
}

#[tokio::test]
async fn test_shutdown_fails_waiting_jobs_and_finishes_running_ones() {
    let db = InMemoryDatabase::new();
    let running = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let waiting = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let gate = Arc::new(Notify::new());
    let extractor = FakeExtractor::gated(&words(12), gate.clone());
    let shutdown = CancellationToken::new();
    let (queue, handle) = IngestionQueue::start(
        pipeline(db.clone(), extractor.clone()),
        single_slot(),
        shutdown.clone(),
    );

    queue
        .submit(running.id, PathBuf::from("/tmp/a.pdf"))
        .unwrap();
    wait_for_extraction_calls(&extractor, 1).await;
    queue
        .submit(waiting.id, PathBuf::from("/tmp/b.pdf"))
        .unwrap();

    shutdown.cancel();
    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker should stop once running jobs finish")
        .unwrap();

    assert_eq!(
        db.document(running.id).await.unwrap().status,
        DocumentStatus::Ready
    );
    assert_eq!(
        db.document(waiting.id).await.unwrap().status,
        DocumentStatus::Failed
    );
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_submit_reports_a_full_queue_without_waiting() {
    let db = InMemoryDatabase::new();
    let gate = Arc::new(Notify::new());
    let extractor = FakeExtractor::gated(&words(12), gate);
    let (queue, _handle) = IngestionQueue::start(
        pipeline(db.clone(), extractor.clone()),
        QueueConfig {
            capacity: 1,
            concurrency: 1,
        },
        CancellationToken::new(),
    );

    let first = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    queue.submit(first.id, PathBuf::from("/tmp/a.pdf")).unwrap();
    wait_for_extraction_calls(&extractor, 1).await;

    // One job can wait for the busy slot and one can sit in the channel.
    let mut rejected = Vec::new();
    for _ in 0..4 {
        let document_id = db
            .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
            .await
            .id;
        let outcome = queue
            .submit(document_id, PathBuf::from("/tmp/b.pdf"))
            .unwrap();
        if outcome == SubmitOutcome::QueueFull {
            rejected.push(document_id);
        }
    }

    assert!(rejected.len() >= 2);
    assert!(rejected.iter().all(|id| !queue.is_in_flight(*id)));
}

#[tokio::test]
async fn test_stranded_documents_are_resumed() {
    let db = InMemoryDatabase::new();
    let stranded_a = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let stranded_b = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Processing, None)
        .await;
    let done = db
        .insert_document(Uuid::new_v4(), DocumentStatus::Ready, Some("done"))
        .await;
    let extractor = FakeExtractor::returning(&words(20), Some(1));
    let (queue, _handle) = IngestionQueue::start(
        pipeline(db.clone(), extractor.clone()),
        QueueConfig::default(),
        CancellationToken::new(),
    );

    assert_eq!(queue.resume_stranded().await.unwrap(), 2);

    assert_eq!(wait_for_status(&db, stranded_a.id).await, DocumentStatus::Ready);
    assert_eq!(wait_for_status(&db, stranded_b.id).await, DocumentStatus::Ready);
    assert_eq!(
        db.document(done.id).await.unwrap().extracted_text.as_deref(),
        Some("done")
    );
    assert_eq!(db.ingestion_writes.load(Ordering::SeqCst), 2);
}
