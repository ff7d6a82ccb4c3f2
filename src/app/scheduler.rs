use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::driver::RemoteDriver;
use super::error::{AuthenticationError, ExtractError};
use super::extract::ProductExtractor;
use super::session::SessionManager;
use super::types::{ScrapeJob, ScrapeOutcome};

pub const DEFAULT_WORKERS: usize = 15;
const MAX_WORKERS: usize = 256;

pub fn sanitize_worker_count(value: usize) -> usize {
    value.clamp(1, MAX_WORKERS)
}

/// Completed/total counters for the batch in flight, readable from any thread.
pub struct Progress {
    completed: AtomicUsize,
    total: AtomicUsize,
    bar: ProgressBar,
}

impl Progress {
    pub fn terminal() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        if let Ok(style) =
            ProgressStyle::with_template("{msg:>10} [{bar:40.yellow}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self::with_bar(bar)
    }

    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            bar,
        }
    }

    /// `(completed, total)` of the current batch.
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }

    fn start(&self, label: &str, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_message(label.to_string());
    }

    fn tick(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

struct Worker {
    driver: Arc<dyn RemoteDriver>,
    session: Arc<SessionManager>,
    extractor: Arc<ProductExtractor>,
}

impl Worker {
    /// Fetch and extract one page. Only an unrecoverable session loss escapes as `Err`.
    async fn scrape(&self, job: &ScrapeJob) -> Result<ScrapeOutcome, AuthenticationError> {
        let mut relogged = false;
        loop {
            let generation = self.session.generation();
            let html = match self.driver.fetch(&job.url).await {
                Ok(html) => html,
                Err(err) => {
                    debug!(url = %job.url, "fetch failed: {err}");
                    return Ok(failure(job, format!("Product page not found ({err})")));
                }
            };

            match self.extractor.extract(&html, &job.url) {
                Ok(record) => return Ok(ScrapeOutcome::Success(record)),
                Err(ExtractError::SessionExpired) if !relogged => {
                    self.session.relogin(generation).await?;
                    relogged = true;
                }
                Err(ExtractError::SessionExpired) => {
                    return Err(AuthenticationError::SessionLost {
                        url: job.url.clone(),
                    });
                }
                Err(err) => return Ok(failure(job, err.to_string())),
            }
        }
    }
}

fn failure(job: &ScrapeJob, error: String) -> ScrapeOutcome {
    ScrapeOutcome::Failure {
        ean: job.ean.clone(),
        url: job.url.clone(),
        error,
    }
}

/// Bounded pool that fetches and extracts pages, one outcome per job in input order.
pub struct ScrapeScheduler {
    worker: Arc<Worker>,
    workers: usize,
    progress: Arc<Progress>,
}

impl ScrapeScheduler {
    pub fn new(
        driver: Arc<dyn RemoteDriver>,
        session: Arc<SessionManager>,
        extractor: Arc<ProductExtractor>,
        workers: usize,
        progress: Arc<Progress>,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                driver,
                session,
                extractor,
            }),
            workers: sanitize_worker_count(workers),
            progress,
        }
    }

    #[cfg(test)]
    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    pub async fn scrape_all(
        &self,
        label: &str,
        jobs: &[ScrapeJob],
    ) -> Result<Vec<ScrapeOutcome>, AuthenticationError> {
        self.progress.start(label, jobs.len());
        let mut slots: Vec<Option<ScrapeOutcome>> = vec![None; jobs.len()];
        let mut pending = jobs.iter().cloned().enumerate();
        let mut set = JoinSet::new();

        loop {
            while set.len() < self.workers {
                let Some((index, job)) = pending.next() else {
                    break;
                };
                let worker = self.worker.clone();
                set.spawn(async move { (index, worker.scrape(&job).await) });
            }

            let Some(joined) = set.join_next().await else {
                break;
            };
            match joined {
                Ok((index, Ok(outcome))) => slots[index] = Some(outcome),
                Ok((_, Err(err))) => {
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    self.progress.finish();
                    return Err(err);
                }
                Err(err) => error!("scrape worker failed: {err}"),
            }
            self.progress.tick();
        }
        self.progress.finish();
        let (completed, total) = self.progress.snapshot();
        debug!(label, completed, total, "batch finished");

        Ok(slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| failure(job, "scrape worker failed".to_string()))
            })
            .collect())
    }
}
