//! crates/study_assistant_core/src/ingestion.rs
//!
//! Background document ingestion: text extraction, chunking and persistence.
//!
//! Uploads submit a job keyed by document id and return immediately. A single
//! dispatcher task drains the queue and runs jobs on a bounded number of worker
//! slots. The outcome is only ever visible through the document's status column.
//!
//! On shutdown, jobs that never got a slot are marked `failed` and the dispatcher
//! waits for running jobs before it returns. Documents still `processing` after
//! a crash are picked up again by `IngestionQueue::resume_stranded`.

use dashmap::DashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunker::{TextChunk, TextChunker};
use crate::domain::DocumentStatus;
use crate::error::{StudyError, StudyResult};
use crate::ports::{DatabaseService, PortError, TextExtractionService};

//=========================================================================================
// The Pipeline (one document, start to finish)
//=========================================================================================

/// What happened to a single ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionOutcome {
    Ready { chunk_count: usize },
    /// The document was already `ready`; nothing was written.
    Skipped,
    /// The document has been marked `failed`.
    Failed,
}

pub struct IngestionPipeline {
    db: Arc<dyn DatabaseService>,
    extractor: Arc<dyn TextExtractionService>,
    chunker: TextChunker,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        extractor: Arc<dyn TextExtractionService>,
        chunker: TextChunker,
    ) -> Self {
        Self {
            db,
            extractor,
            chunker,
        }
    }

    /// Runs ingestion for one document to completion.
    ///
    /// Errors are not returned to the caller; they are logged and recorded by
    /// marking the document `failed`.
    pub async fn process(&self, document_id: Uuid, file_path: &Path) -> IngestionOutcome {
        match self.try_process(document_id, file_path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Ingestion of document {} failed: {}", document_id, e);
                self.mark_failed(document_id).await;
                IngestionOutcome::Failed
            }
        }
    }

    /// Records a document as `failed` without running it, e.g. when the queue
    /// shuts down before the job got a worker slot.
    pub async fn mark_failed(&self, document_id: Uuid) {
        if let Err(e) = self
            .db
            .update_document_status(document_id, DocumentStatus::Failed)
            .await
        {
            error!("Could not mark document {} as failed: {}", document_id, e);
        }
    }

    async fn try_process(
        &self,
        document_id: Uuid,
        file_path: &Path,
    ) -> StudyResult<IngestionOutcome> {
        let document = self.db.get_document_by_id(document_id).await?;
        if document.status == DocumentStatus::Ready {
            info!("Document {} is already ready, skipping ingestion.", document_id);
            return Ok(IngestionOutcome::Skipped);
        }

        let extracted = self
            .extractor
            .extract_text(file_path)
            .await
            .map_err(|e| StudyError::Extraction(e.to_string()))?;
        if extracted.text.trim().is_empty() {
            return Err(StudyError::Extraction(format!(
                "no text could be extracted from {}",
                file_path.display()
            )));
        }

        let chunks: Vec<TextChunk> = self
            .chunker
            .chunk_with_pages(&extracted.text, extracted.page_count)
            .collect();

        self.db
            .complete_ingestion(document_id, &extracted.text, &chunks)
            .await?;

        info!(
            "Document {} processed: {} chunks over {:?} pages.",
            document_id,
            chunks.len(),
            extracted.page_count
        );
        Ok(IngestionOutcome::Ready {
            chunk_count: chunks.len(),
        })
    }
}

//=========================================================================================
// The Queue
//=========================================================================================

#[derive(Debug, Clone)]
pub struct IngestionJob {
    pub document_id: Uuid,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// A job for this document is already queued or running; nothing was enqueued.
    AlreadyInFlight,
    /// The queue is at capacity; nothing was enqueued.
    QueueFull,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Jobs that may wait in the channel before `submit` reports `QueueFull`.
    pub capacity: usize,
    /// Jobs that may run at the same time.
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            concurrency: 4,
        }
    }
}

pub struct IngestionQueue {
    sender: mpsc::Sender<IngestionJob>,
    in_flight: Arc<DashSet<Uuid>>,
    pipeline: Arc<IngestionPipeline>,
}

impl IngestionQueue {
    /// Creates the queue and spawns its dispatcher on the current runtime.
    ///
    /// Once `shutdown` is cancelled the dispatcher stops taking jobs, marks the
    /// ones still waiting as `failed`, and resolves after every running job has
    /// finished.
    pub fn start(
        pipeline: Arc<IngestionPipeline>,
        config: QueueConfig,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let in_flight = Arc::new(DashSet::new());

        let worker = IngestionWorker {
            pipeline: pipeline.clone(),
            in_flight: in_flight.clone(),
            slots: Arc::new(Semaphore::new(config.concurrency.max(1))),
            running: TaskTracker::new(),
            shutdown,
        };
        let handle = tokio::spawn(worker.run(receiver));

        let queue = Self {
            sender,
            in_flight,
            pipeline,
        };
        (Arc::new(queue), handle)
    }

    /// Enqueues ingestion for a document unless one is already in flight.
    ///
    /// Never waits for queue space.
    pub fn submit(&self, document_id: Uuid, file_path: PathBuf) -> StudyResult<SubmitOutcome> {
        if !self.in_flight.insert(document_id) {
            warn!(
                "Ingestion for document {} is already in flight; ignoring resubmission.",
                document_id
            );
            return Ok(SubmitOutcome::AlreadyInFlight);
        }

        let job = IngestionJob {
            document_id,
            file_path,
        };
        match self.sender.try_send(job) {
            Ok(()) => {
                info!("Queued ingestion for document {}.", document_id);
                Ok(SubmitOutcome::Accepted)
            }
            Err(TrySendError::Full(_)) => {
                self.in_flight.remove(&document_id);
                warn!("Ingestion queue is full; rejected document {}.", document_id);
                Ok(SubmitOutcome::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.in_flight.remove(&document_id);
                Err(StudyError::Port(PortError::Unexpected(
                    "ingestion queue is no longer accepting jobs".to_string(),
                )))
            }
        }
    }

    /// Re-submits every document left in `processing`, typically by a restart
    /// that interrupted its ingestion. Documents that do not fit in the queue
    /// are marked `failed`. Returns how many were queued.
    pub async fn resume_stranded(&self) -> StudyResult<usize> {
        let stranded = self
            .pipeline
            .db
            .list_documents_by_status(DocumentStatus::Processing)
            .await?;
        let mut queued = 0;
        for document in stranded {
            match self.submit(document.id, document.file_path)? {
                SubmitOutcome::Accepted => queued += 1,
                SubmitOutcome::AlreadyInFlight => {}
                SubmitOutcome::QueueFull => self.pipeline.mark_failed(document.id).await,
            }
        }
        if queued > 0 {
            info!("Resumed ingestion for {} stranded documents.", queued);
        }
        Ok(queued)
    }

    pub fn is_in_flight(&self, document_id: Uuid) -> bool {
        self.in_flight.contains(&document_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

//=========================================================================================
// The Worker
//=========================================================================================

struct IngestionWorker {
    pipeline: Arc<IngestionPipeline>,
    in_flight: Arc<DashSet<Uuid>>,
    slots: Arc<Semaphore>,
    running: TaskTracker,
    shutdown: CancellationToken,
}

/// Releases a document's in-flight entry when its job ends, even by panic.
struct InFlightGuard {
    document_id: Uuid,
    in_flight: Arc<DashSet<Uuid>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.document_id);
    }
}

impl IngestionWorker {
    async fn run(self, mut receiver: mpsc::Receiver<IngestionJob>) {
        info!("Ingestion worker started.");

        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            let guard = self.guard(job.document_id);

            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.abandon(job, guard).await;
                    break;
                }
                permit = self.slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        self.abandon(job, guard).await;
                        break;
                    }
                },
            };

            let pipeline = self.pipeline.clone();
            self.running.spawn(async move {
                let _permit = permit;
                let _guard = guard;
                let outcome = pipeline.process(job.document_id, &job.file_path).await;
                info!("Ingestion job for {} finished: {:?}", job.document_id, outcome);
            });
        }

        receiver.close();
        while let Ok(job) = receiver.try_recv() {
            let guard = self.guard(job.document_id);
            self.abandon(job, guard).await;
        }

        self.running.close();
        info!(
            "Ingestion worker stopping; waiting for {} running jobs.",
            self.running.len()
        );
        self.running.wait().await;
        info!("Ingestion worker stopped.");
    }

    fn guard(&self, document_id: Uuid) -> InFlightGuard {
        InFlightGuard {
            document_id,
            in_flight: self.in_flight.clone(),
        }
    }

    async fn abandon(&self, job: IngestionJob, _guard: InFlightGuard) {
        warn!(
            "Shutting down before document {} was processed; marking it failed.",
            job.document_id
        );
        self.pipeline.mark_failed(job.document_id).await;
    }
}
