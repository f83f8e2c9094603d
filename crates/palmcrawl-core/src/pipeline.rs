use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::try_join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::config::CrawlConfig;
use crate::domain::AllowList;
use crate::error::{CrawlError, RejectReason};
use crate::frontier::Frontier;
use crate::models::{Article, FrontierEntry};
use crate::quality::{QualityGate, Verdict};
use crate::text::normalize_text;
use crate::traits::{ArticleStore, CategoryMirror, Fetcher, LanguageDetector, PageParser};

/// Processing stage of a single url.
///
/// A url leaves `Pending` when claimed and ends in `Done` once visited; a
/// url cancelled mid-fetch goes back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Pending,
    Fetching,
    Normalizing,
    Classifying,
    Gating,
    Storing,
    LinkExtraction,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Fetching => "fetching",
            Stage::Normalizing => "normalizing",
            Stage::Classifying => "classifying",
            Stage::Gating => "gating",
            Stage::Storing => "storing",
            Stage::LinkExtraction => "link_extraction",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of the secondary category-store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    Disabled,
    Written(String),
    Failed(String),
}

/// Final outcome of one url.
#[derive(Debug)]
pub enum UrlOutcome {
    Accepted {
        title: String,
        category: String,
        mirror: MirrorStatus,
        links_admitted: usize,
    },
    Rejected(RejectReason),
    FetchFailed(CrawlError),
    /// Already in the visited set when claimed.
    Skipped,
    /// Unexpected error at `stage`; the url is still settled.
    Failed { stage: Stage, error: CrawlError },
}

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    RunStarted {
        run_id: Uuid,
        seeded: usize,
        leases_released: u64,
    },
    WorkerStarted {
        worker: usize,
    },
    Processing {
        worker: usize,
        entry: &'a FrontierEntry,
    },
    StageEntered {
        url: &'a str,
        stage: Stage,
    },
    Settled {
        url: &'a str,
        outcome: &'a UrlOutcome,
    },
    CapReached {
        max_items: usize,
    },
    FrontierExhausted {
        worker: usize,
    },
    Interrupted {
        worker: usize,
        url: Option<&'a str>,
    },
    RunFinished {
        summary: &'a CrawlSummary,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::RunStarted {
                run_id,
                seeded,
                leases_released,
            } => {
                tracing::info!(%run_id, %seeded, %leases_released, "Crawl started");
            }
            CrawlEvent::WorkerStarted { worker } => {
                tracing::debug!(%worker, "Worker started");
            }
            CrawlEvent::Processing { worker, entry } => {
                tracing::info!(%worker, url = %entry.url, depth = entry.depth, "Processing");
            }
            CrawlEvent::StageEntered { url, stage } => {
                tracing::trace!(%url, %stage, "Stage entered");
            }
            CrawlEvent::Settled { url, outcome } => match outcome {
                UrlOutcome::Accepted {
                    title,
                    category,
                    mirror,
                    links_admitted,
                } => {
                    tracing::info!(%url, %title, %category, %links_admitted, "Stored");
                    if let MirrorStatus::Failed(error) = mirror {
                        tracing::warn!(%url, %category, %error, "Category mirror failed");
                    }
                }
                UrlOutcome::Rejected(reason) => {
                    tracing::info!(%url, %reason, "Skipped");
                }
                UrlOutcome::FetchFailed(error) => {
                    tracing::warn!(%url, %error, "Fetch failed");
                }
                UrlOutcome::Skipped => {
                    tracing::debug!(%url, "Already visited");
                }
                UrlOutcome::Failed { stage, error } => {
                    if matches!(error, CrawlError::ConstraintViolation { .. }) {
                        tracing::error!(%url, %stage, %error, "Store rejected article");
                    } else {
                        tracing::warn!(%url, %stage, %error, "Processing failed");
                    }
                }
            },
            CrawlEvent::CapReached { max_items } => {
                tracing::info!(%max_items, "Accepted-item cap reached");
            }
            CrawlEvent::FrontierExhausted { worker } => {
                tracing::debug!(%worker, "Frontier exhausted");
            }
            CrawlEvent::Interrupted { worker, url } => {
                tracing::info!(%worker, url = url.unwrap_or("-"), "Interrupted");
            }
            CrawlEvent::RunFinished { summary } => {
                tracing::info!(
                    run_id = %summary.run_id,
                    accepted = summary.accepted,
                    rejected = summary.rejected_total(),
                    fetch_failures = summary.fetch_failures,
                    errors = summary.errors,
                    constraint_violations = summary.constraint_violations,
                    mirror_failures = summary.mirror_failures,
                    interrupted = summary.interrupted,
                    "Crawl finished"
                );
            }
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub run_id: Uuid,
    pub accepted: usize,
    pub rejected_language: usize,
    pub rejected_duplicate: usize,
    pub rejected_source: usize,
    pub rejected_short: usize,
    pub fetch_failures: usize,
    /// Unexpected per-url errors, constraint violations included.
    pub errors: usize,
    pub constraint_violations: usize,
    pub mirrored: usize,
    pub mirror_failures: usize,
    pub skipped: usize,
    pub links_admitted: usize,
    pub interrupted: bool,
}

impl CrawlSummary {
    pub fn rejected_total(&self) -> usize {
        self.rejected_language + self.rejected_duplicate + self.rejected_source + self.rejected_short
    }

    pub fn rejected(&self, reason: RejectReason) -> usize {
        match reason {
            RejectReason::Language => self.rejected_language,
            RejectReason::Duplicate => self.rejected_duplicate,
            RejectReason::Source => self.rejected_source,
            RejectReason::Short => self.rejected_short,
        }
    }
}

/// Shared counters of a run. Workers run on one task but the pipeline future
/// may be spawned, so these are atomics.
#[derive(Default)]
struct RunStats {
    accepted: AtomicUsize,
    rejected: [AtomicUsize; 4],
    fetch_failures: AtomicUsize,
    errors: AtomicUsize,
    constraint_violations: AtomicUsize,
    mirrored: AtomicUsize,
    mirror_failures: AtomicUsize,
    skipped: AtomicUsize,
    links_admitted: AtomicUsize,
    in_flight: AtomicUsize,
}

impl RunStats {
    fn record(&self, outcome: &UrlOutcome) {
        match outcome {
            UrlOutcome::Accepted {
                mirror,
                links_admitted,
                ..
            } => {
                self.accepted.fetch_add(1, Ordering::SeqCst);
                self.links_admitted
                    .fetch_add(*links_admitted, Ordering::SeqCst);
                match mirror {
                    MirrorStatus::Written(_) => self.mirrored.fetch_add(1, Ordering::SeqCst),
                    MirrorStatus::Failed(_) => self.mirror_failures.fetch_add(1, Ordering::SeqCst),
                    MirrorStatus::Disabled => 0,
                };
            }
            UrlOutcome::Rejected(reason) => {
                self.rejected[Self::reason_index(*reason)].fetch_add(1, Ordering::SeqCst);
            }
            UrlOutcome::FetchFailed(_) => {
                self.fetch_failures.fetch_add(1, Ordering::SeqCst);
            }
            UrlOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
            UrlOutcome::Failed { error, .. } => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                if matches!(error, CrawlError::ConstraintViolation { .. }) {
                    self.constraint_violations.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    fn reason_index(reason: RejectReason) -> usize {
        match reason {
            RejectReason::Language => 0,
            RejectReason::Duplicate => 1,
            RejectReason::Source => 2,
            RejectReason::Short => 3,
        }
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn summary(&self, run_id: Uuid, interrupted: bool) -> CrawlSummary {
        let load = |c: &AtomicUsize| c.load(Ordering::SeqCst);
        CrawlSummary {
            run_id,
            accepted: load(&self.accepted),
            rejected_language: load(&self.rejected[0]),
            rejected_duplicate: load(&self.rejected[1]),
            rejected_source: load(&self.rejected[2]),
            rejected_short: load(&self.rejected[3]),
            fetch_failures: load(&self.fetch_failures),
            errors: load(&self.errors),
            constraint_violations: load(&self.constraint_violations),
            mirrored: load(&self.mirrored),
            mirror_failures: load(&self.mirror_failures),
            skipped: load(&self.skipped),
            links_admitted: load(&self.links_admitted),
            interrupted,
        }
    }
}

/// Loop settings taken from [`CrawlConfig`].
#[derive(Debug, Clone)]
struct PipelineSettings {
    max_depth: u32,
    max_items: Option<usize>,
    workers: usize,
    settle_delay: Duration,
    poll_interval: Duration,
}

/// Drives urls from the frontier through fetch, classification, the quality
/// gate and storage until the frontier is exhausted.
///
/// Generic over every external dependency so tests run without network or
/// database.
pub struct CrawlPipeline<F, P, L, Q, S, M>
where
    F: Fetcher,
    P: PageParser,
    L: LanguageDetector,
    Q: Frontier,
    S: ArticleStore,
    M: CategoryMirror,
{
    fetcher: F,
    parser: P,
    frontier: Q,
    store: S,
    mirror: M,
    classifier: Classifier,
    gate: QualityGate<S, L>,
    settings: PipelineSettings,
}

impl<F, P, L, Q, S, M> CrawlPipeline<F, P, L, Q, S, M>
where
    F: Fetcher,
    P: PageParser,
    L: LanguageDetector,
    Q: Frontier,
    S: ArticleStore,
    M: CategoryMirror,
{
    pub fn new(
        fetcher: F,
        parser: P,
        detector: L,
        frontier: Q,
        store: S,
        mirror: M,
        config: &CrawlConfig,
    ) -> Self {
        let gate = QualityGate::new(
            store.clone(),
            detector,
            AllowList::new(&config.reputable_domains),
            config.target_language.clone(),
            config.min_content_length,
        );
        Self {
            fetcher,
            parser,
            frontier,
            store,
            mirror,
            classifier: Classifier::new(config.categories.clone()),
            gate,
            settings: PipelineSettings {
                max_depth: config.max_depth,
                max_items: config.max_items,
                workers: config.workers.max(1),
                settle_delay: config.settle_delay(),
                poll_interval: config.poll_interval(),
            },
        }
    }

    /// Seed the frontier and crawl until it is exhausted, the accepted cap is
    /// hit, or `cancel_token` fires.
    ///
    /// Leases left by an interrupted earlier run are released first, so the
    /// crawl resumes where it stopped. Only persistence errors end the run
    /// with `Err`.
    pub async fn run<R: CrawlReporter>(
        &self,
        seeds: &[String],
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<CrawlSummary, CrawlError> {
        let run_id = Uuid::new_v4();
        let leases_released = self.frontier.release_leases().await?;
        let seeded = self.frontier.seed(seeds).await?;
        reporter.report(CrawlEvent::RunStarted {
            run_id,
            seeded,
            leases_released,
        });

        let stats = RunStats::default();
        let workers = (0..self.settings.workers)
            .map(|worker| self.worker_loop(worker, &stats, &cancel_token, reporter));
        let result = try_join_all(workers).await;

        // Graceful shutdown: return unsettled urls to the queue
        if let Err(e) = self.frontier.release_leases().await {
            tracing::error!(error = %e, "Failed to release frontier leases");
        }
        self.mirror.close().await;
        result?;

        let summary = stats.summary(run_id, cancel_token.is_cancelled());
        reporter.report(CrawlEvent::RunFinished { summary: &summary });
        Ok(summary)
    }

    fn cap_reached(&self, stats: &RunStats) -> bool {
        self.settings
            .max_items
            .is_some_and(|max| stats.accepted() >= max)
    }

    async fn worker_loop<R: CrawlReporter>(
        &self,
        worker: usize,
        stats: &RunStats,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<(), CrawlError> {
        reporter.report(CrawlEvent::WorkerStarted { worker });

        loop {
            if cancel_token.is_cancelled() {
                reporter.report(CrawlEvent::Interrupted { worker, url: None });
                break;
            }
            if self.cap_reached(stats) {
                if let Some(max_items) = self.settings.max_items {
                    reporter.report(CrawlEvent::CapReached { max_items });
                }
                break;
            }

            // Count this worker as busy before claiming, so a sibling that
            // finds the queue empty waits for links we may still admit.
            stats.in_flight.fetch_add(1, Ordering::SeqCst);
            let entry = match self.frontier.pop().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    let others = stats.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                    if others == 0 {
                        reporter.report(CrawlEvent::FrontierExhausted { worker });
                        break;
                    }
                    tokio::select! {
                        () = tokio::time::sleep(self.settings.poll_interval) => continue,
                        () = cancel_token.cancelled() => continue,
                    }
                }
                Err(e) => {
                    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(e);
                }
            };

            reporter.report(CrawlEvent::Processing {
                worker,
                entry: &entry,
            });
            let result = self.process(&entry, cancel_token, reporter).await;
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);

            let outcome = match result? {
                Some(outcome) => outcome,
                None => {
                    reporter.report(CrawlEvent::Interrupted {
                        worker,
                        url: Some(&entry.url),
                    });
                    break;
                }
            };
            stats.record(&outcome);
            reporter.report(CrawlEvent::Settled {
                url: &entry.url,
                outcome: &outcome,
            });

            if matches!(outcome, UrlOutcome::Accepted { .. })
                && !self.settings.settle_delay.is_zero()
            {
                tokio::select! {
                    () = tokio::time::sleep(self.settings.settle_delay) => {}
                    () = cancel_token.cancelled() => {}
                }
            }
        }

        Ok(())
    }

    /// Take one claimed url to its final outcome and settle it.
    ///
    /// Returns `None` if cancelled mid-fetch; the url is then left leased and
    /// unvisited.
    async fn process<R: CrawlReporter>(
        &self,
        entry: &FrontierEntry,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<Option<UrlOutcome>, CrawlError> {
        let url = entry.url.as_str();
        if self.frontier.is_visited(url).await? {
            self.frontier.mark_visited(url).await?;
            reporter.report(CrawlEvent::StageEntered {
                url,
                stage: Stage::Done,
            });
            return Ok(Some(UrlOutcome::Skipped));
        }

        reporter.report(CrawlEvent::StageEntered {
            url,
            stage: Stage::Fetching,
        });
        let fetched = tokio::select! {
            result = self.fetcher.fetch(url) => result,
            () = cancel_token.cancelled() => {
                reporter.report(CrawlEvent::StageEntered { url, stage: Stage::Pending });
                return Ok(None);
            }
        };

        let outcome = match fetched {
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => UrlOutcome::FetchFailed(e),
            Ok(body) => match self.handle_page(entry, &body, reporter).await {
                Ok(outcome) => outcome,
                Err((_, e)) if e.is_fatal() => return Err(e),
                Err((stage, error)) => UrlOutcome::Failed { stage, error },
            },
        };

        self.frontier.mark_visited(url).await?;
        reporter.report(CrawlEvent::StageEntered {
            url,
            stage: Stage::Done,
        });
        Ok(Some(outcome))
    }

    async fn handle_page<R: CrawlReporter>(
        &self,
        entry: &FrontierEntry,
        body: &str,
        reporter: &R,
    ) -> Result<UrlOutcome, (Stage, CrawlError)> {
        let url = entry.url.as_str();
        let enter = |stage| reporter.report(CrawlEvent::StageEntered { url, stage });

        enter(Stage::Normalizing);
        let page = self
            .parser
            .parse(url, body)
            .map_err(|e| (Stage::Normalizing, e))?;
        let content = normalize_text(&page.text);

        enter(Stage::Classifying);
        let category = self.classifier.classify(&content);

        enter(Stage::Gating);
        let content_hash = match self
            .gate
            .assess(url, &content)
            .await
            .map_err(|e| (Stage::Gating, e))?
        {
            Verdict::Accept { content_hash } => content_hash,
            Verdict::Reject(reason) => return Ok(UrlOutcome::Rejected(reason)),
        };

        enter(Stage::Storing);
        let article = Article::new(url, page.title.trim(), &content, &category, content_hash);
        self.store
            .upsert(&article)
            .await
            .map_err(|e| (Stage::Storing, e))?;

        // Primary write is committed; the mirror may fail on its own
        let mirror = match self.mirror.mirror(&article).await {
            Ok(Some(slug)) => MirrorStatus::Written(slug),
            Ok(None) => MirrorStatus::Disabled,
            Err(e) => MirrorStatus::Failed(e.to_string()),
        };

        enter(Stage::LinkExtraction);
        let links_admitted = self
            .frontier
            .admit_links(&page.links, entry.depth, self.settings.max_depth)
            .await
            .map_err(|e| (Stage::LinkExtraction, e))?;

        Ok(UrlOutcome::Accepted {
            title: article.title,
            category,
            mirror,
            links_admitted,
        })
    }
}
