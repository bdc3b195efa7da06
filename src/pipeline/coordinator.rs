//! Pipeline coordinator - per-document orchestration
//!
//! This module drives every document of a batch through the stages
//! download → fingerprint → extract → keywords → store, including:
//! - Bounded concurrency across documents
//! - Validated, persisted state transitions per document
//! - Error records for every failed stage
//! - Skipping completed work and reusing results of duplicate content
//! - Cooperative cancellation

use crate::config::{Config, DuplicatePolicy};
use crate::extract::{extract_text, hash_file, rank_keywords, ContentFingerprint, ExtractionError};
use crate::fetcher::{fetch_to_path, FetchPolicy, ReqwestTransport, Transport};
use crate::pipeline::pacer::RequestPacer;
use crate::pipeline::{BatchReport, DocumentOutcome, Manifest, OutcomeKind};
use crate::state::PipelineState;
use crate::storage::{
    ErrorKind, ErrorLog, InitialMetadata, ProcessingResults, Storage, StoreHandle,
};
use crate::url::is_trusted;
use crate::{HarvestError, Result};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Stops a running batch from dispatching further documents
///
/// Documents already in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Main pipeline coordinator structure
pub struct Coordinator {
    context: Arc<PipelineContext>,
    cancel: CancelHandle,
}

/// State shared by every worker task
struct PipelineContext {
    config: Config,
    transport: Arc<dyn Transport>,
    store: StoreHandle,
    errors: ErrorLog,
    pacer: RequestPacer,
    policy: FetchPolicy,
}

/// One document to process
struct Job {
    filename: String,
    /// Present for downloads; absent for files already on disk
    source_url: Option<String>,
    local_path: PathBuf,
}

impl Job {
    fn metadata(&self) -> InitialMetadata {
        InitialMetadata {
            filename: self.filename.clone(),
            source_url: self.source_url.clone(),
            local_path: self.local_path.display().to_string(),
        }
    }
}

/// A failed stage: the error kind to log and a description
struct StageFailure {
    kind: ErrorKind,
    message: String,
}

impl StageFailure {
    fn new(kind: ErrorKind, error: impl Display) -> Self {
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

impl Coordinator {
    /// Creates a coordinator that downloads over HTTP(S)
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `store` - Handle to the opened document store
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to process batches
    /// * `Err(HarvestError)` - The HTTP clients could not be built
    pub fn new(config: Config, store: StoreHandle) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.fetcher)?);
        Ok(Self::with_transport(config, store, transport))
    }

    /// Creates a coordinator using a caller-supplied transport
    pub fn with_transport(
        config: Config,
        store: StoreHandle,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let context = PipelineContext {
            errors: ErrorLog::new(store.clone()),
            pacer: RequestPacer::new(config.fetcher.request_delay()),
            policy: FetchPolicy::from_config(&config.fetcher),
            config,
            transport,
            store,
        };

        Self {
            context: Arc::new(context),
            cancel: CancelHandle::default(),
        }
    }

    /// Handle that cancels batches run by this coordinator
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Downloads and processes every manifest entry
    ///
    /// Files land in the configured download directory, which is created if
    /// absent. A failure in one document never aborts the others.
    pub async fn process_manifest(&self, manifest: &Manifest) -> Result<BatchReport> {
        let download_dir = PathBuf::from(&self.context.config.storage.download_dir);
        tokio::fs::create_dir_all(&download_dir).await?;

        let scheme = self.context.config.pipeline.filename_scheme;
        let jobs = manifest
            .entries()
            .iter()
            .map(|entry| {
                let filename = entry.filename(scheme);
                Job {
                    local_path: download_dir.join(&filename),
                    filename,
                    source_url: Some(entry.url.clone()),
                }
            })
            .collect();

        tracing::info!(
            "Processing {} document(s) from manifest into {}",
            manifest.len(),
            download_dir.display()
        );

        Ok(self.run_batch(jobs).await)
    }

    /// Processes every `*.pdf` file (case-insensitive) directly inside
    /// `directory`, in filename order
    ///
    /// # Returns
    ///
    /// * `Ok(BatchReport)` - Tally of the batch; `{0, 0}` for an empty directory
    /// * `Err(HarvestError::MissingDirectory)` - `directory` does not exist
    pub async fn process_directory(&self, directory: &Path) -> Result<BatchReport> {
        let is_dir = tokio::fs::metadata(directory)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(HarvestError::MissingDirectory(
                directory.display().to_string(),
            ));
        }

        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if !is_pdf {
                continue;
            }

            jobs.push(Job {
                filename: entry.file_name().to_string_lossy().into_owned(),
                source_url: None,
                local_path: path,
            });
        }
        jobs.sort_by(|a, b| a.filename.cmp(&b.filename));

        tracing::info!(
            "Processing {} PDF file(s) in {}",
            jobs.len(),
            directory.display()
        );

        Ok(self.run_batch(jobs).await)
    }

    /// Runs jobs on at most `workers` concurrent tasks
    async fn run_batch(&self, jobs: Vec<Job>) -> BatchReport {
        let workers = self.context.config.pipeline.workers.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut report = BatchReport::default();
        let total = jobs.len();

        for (dispatched, job) in jobs.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.not_started = total - dispatched;
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    report.not_started = total - dispatched;
                    break;
                }
            };

            // Re-checked: cancellation may arrive while waiting for a worker
            if self.cancel.is_cancelled() {
                report.not_started = total - dispatched;
                break;
            }

            let context = Arc::clone(&self.context);
            tasks.spawn(async move {
                let _permit = permit;
                context.process(job).await
            });
        }

        if report.not_started > 0 {
            tracing::warn!(
                "Batch cancelled; {} document(s) not started",
                report.not_started
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        report.outcomes.sort_by(|a, b| a.filename.cmp(&b.filename));

        tracing::info!(
            "Batch finished: {} successful, {} failed, {} skipped",
            report.successful,
            report.failed,
            report.skipped
        );

        report
    }
}

impl PipelineContext {
    /// Processes one document; never returns an error, only an outcome
    async fn process(&self, job: Job) -> DocumentOutcome {
        let document = match self
            .store
            .with(|s| {
                let id = s.upsert_initial(&job.metadata())?;
                s.get_document(id)
            }) {
            Ok(document) => document,
            Err(e) => {
                return self.fail(&job, None, StageFailure::new(ErrorKind::MetadataStorage, e))
            }
        };

        if !document.status.needs_retry() && !self.config.pipeline.reprocess_completed {
            tracing::info!("Skipping {}: already completed", job.filename);
            return DocumentOutcome {
                filename: job.filename,
                kind: OutcomeKind::Skipped,
            };
        }

        let mut tracker = DocumentTracker {
            store: &self.store,
            id: document.id,
            state: PipelineState::from_status(document.status),
        };

        match self.run_stages(&job, &mut tracker).await {
            Ok(kind) => {
                tracing::info!("Processed {}", job.filename);
                DocumentOutcome {
                    filename: job.filename,
                    kind,
                }
            }
            Err(failure) => self.fail(&job, Some(&mut tracker), failure),
        }
    }

    async fn run_stages(
        &self,
        job: &Job,
        tracker: &mut DocumentTracker<'_>,
    ) -> std::result::Result<OutcomeKind, StageFailure> {
        self.store
            .with(|s| s.begin_attempt(tracker.id))
            .map_err(|e| StageFailure::new(ErrorKind::MetadataStorage, e))?;

        if let Some(url) = &job.source_url {
            tracker.advance(PipelineState::Downloading)?;
            self.download(url, &job.local_path).await?;
            tracker.advance(PipelineState::Downloaded)?;
        }

        tracker.advance(PipelineState::Extracting)?;

        let path = job.local_path.clone();
        let fingerprint = run_blocking(move || hash_file(&path))
            .await
            .map_err(|e| StageFailure::new(ErrorKind::Extraction, e))?;
        self.store
            .with(|s| s.record_fingerprint(tracker.id, &fingerprint))
            .map_err(|e| StageFailure::new(ErrorKind::MetadataStorage, e))?;

        if self.config.pipeline.duplicate_policy == DuplicatePolicy::Skip {
            if let Some((original, results)) = self.find_duplicate(tracker.id, &fingerprint)? {
                tracing::info!(
                    "{} has the same content as {}; reusing its results",
                    job.filename,
                    original
                );
                tracker.advance(PipelineState::Extracted)?;
                tracker.advance(PipelineState::Keyworded)?;
                tracker.complete(&results)?;
                return Ok(OutcomeKind::Deduplicated { original });
            }
        }

        let path = job.local_path.clone();
        let extracted = run_blocking(move || extract_text(&path))
            .await
            .map_err(|e| StageFailure::new(ErrorKind::Extraction, e))?;
        tracker.advance(PipelineState::Extracted)?;

        let keywords = rank_keywords(&extracted.text, self.config.pipeline.max_keywords);
        if keywords.is_empty() {
            return Err(StageFailure::new(
                ErrorKind::Extraction,
                ExtractionError::NoText {
                    path: job.local_path.display().to_string(),
                },
            ));
        }
        tracker.advance(PipelineState::Keyworded)?;

        let results = ProcessingResults {
            summary: extracted.summary(self.config.pipeline.summary_chars),
            page_count: extracted.page_count,
            text_length: extracted.text_length() as u64,
            keywords,
        };
        tracker.complete(&results)?;

        Ok(OutcomeKind::Completed {
            page_count: results.page_count,
            keyword_count: results.keywords.len(),
        })
    }

    async fn download(&self, url: &str, destination: &Path) -> std::result::Result<(), StageFailure> {
        self.pacer.wait().await;

        let trusted = is_trusted(url, &self.config.fetcher.trusted_domains);
        let report = fetch_to_path(
            self.transport.as_ref(),
            url,
            destination,
            &self.policy,
            trusted,
        )
        .await
        .map_err(|failure| StageFailure::new(ErrorKind::Download, failure))?;

        if !report.verified {
            tracing::warn!(
                "{} was downloaded without certificate verification",
                url
            );
        }
        tracing::debug!(
            "Downloaded {} to {} ({} bytes, {} attempt(s))",
            url,
            destination.display(),
            report.bytes_written,
            report.attempts
        );

        Ok(())
    }

    /// Finds a different completed document with the same content
    fn find_duplicate(
        &self,
        document_id: i64,
        fingerprint: &ContentFingerprint,
    ) -> std::result::Result<Option<(String, ProcessingResults)>, StageFailure> {
        let candidates = self
            .store
            .with(|s| s.find_by_hash(&fingerprint.hash))
            .map_err(|e| StageFailure::new(ErrorKind::MetadataStorage, e))?;

        Ok(candidates
            .into_iter()
            .filter(|d| d.id != document_id && d.status.is_completed())
            .find_map(|d| ProcessingResults::from_record(&d).map(|r| (d.filename, r))))
    }

    /// Writes the error record, then moves the document to `error`
    ///
    /// A document only enters `error` once its error record is stored. If the
    /// record is dropped the document stays in its in-flight state and the
    /// next run restarts it.
    fn fail(
        &self,
        job: &Job,
        tracker: Option<&mut DocumentTracker<'_>>,
        failure: StageFailure,
    ) -> DocumentOutcome {
        let logged = self
            .errors
            .record(failure.kind, &job.filename, &failure.message);

        if let Some(tracker) = tracker {
            if logged.is_recorded() {
                tracker.fail();
            } else {
                tracing::error!(
                    "No error record stored for {}; leaving it {} for the next run",
                    job.filename,
                    tracker.state.status()
                );
            }
        }

        DocumentOutcome {
            filename: job.filename.clone(),
            kind: OutcomeKind::Failed {
                kind: failure.kind,
                message: failure.message,
            },
        }
    }
}

/// Validates and persists the state transitions of one document
struct DocumentTracker<'a> {
    store: &'a StoreHandle,
    id: i64,
    state: PipelineState,
}

impl DocumentTracker<'_> {
    fn check(&self, next: PipelineState) -> std::result::Result<(), StageFailure> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(StageFailure::new(
                ErrorKind::MetadataStorage,
                HarvestError::InvalidTransition {
                    from: self.state,
                    to: next,
                },
            ))
        }
    }

    fn advance(&mut self, next: PipelineState) -> std::result::Result<(), StageFailure> {
        self.check(next)?;
        let id = self.id;
        self.store
            .with(|s| s.set_state(id, next))
            .map_err(|e| StageFailure::new(ErrorKind::MetadataStorage, e))?;
        self.state = next;
        Ok(())
    }

    fn complete(&mut self, results: &ProcessingResults) -> std::result::Result<(), StageFailure> {
        self.check(PipelineState::Completed)?;
        let id = self.id;
        self.store
            .with(|s| s.record_results(id, results))
            .map_err(|e| StageFailure::new(ErrorKind::ResultsStorage, e))?;
        self.state = PipelineState::Completed;
        Ok(())
    }

    fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let id = self.id;
        match self.store.with(|s| s.set_state(id, PipelineState::Error)) {
            Ok(()) => self.state = PipelineState::Error,
            Err(e) => tracing::error!("Failed to mark document {} as failed: {}", id, e),
        }
    }
}

/// Runs CPU-bound or blocking file work off the async workers
async fn run_blocking<T, F>(f: F) -> std::result::Result<T, ExtractionError>
where
    F: FnOnce() -> std::result::Result<T, ExtractionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))?
}
