use crate::config::{default_workers, MinerConfig, DEFAULT_CHECK_INTERVAL};
use crate::error::{CancelReason, Error};
use crate::hash::{Algorithm, HashFunction};
use crate::result::{MiningOutcome, MiningResult};
use crate::strategy::{run_worker, Hit, Partition, WorkerCtx, WorkerExit, WorkerReport};
use crate::target::{DifficultyTarget, DEFAULT_DIFFICULTY_CEILING};
use crate::work::{CancelToken, NonceSource, StopFlag, Watermark};
use derive_builder::Builder;
use flume::RecvTimeoutError;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest the coordinator waits on the hit channel before re-checking deadline and cancellation.
const COORDINATOR_POLL: Duration = Duration::from_millis(5);

/// One search for the smallest nonce whose digest meets the difficulty.
///
/// A session can be run repeatedly; every run restarts from nonce 0 with a
/// fresh watermark. The session's own [`CancelToken`] latches: once it is
/// cancelled, [`MiningSession::run`] reports `Cancelled` straight away, while
/// [`MiningSession::run_with`] searches again under a new token.
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct MiningSession {
    #[builder(setter(into))]
    pub prefix: Vec<u8>,
    pub difficulty: u32,
    #[builder(default = "default_workers()")]
    pub workers: usize,
    #[builder(default)]
    pub partition: Partition,
    #[builder(default = "DEFAULT_CHECK_INTERVAL")]
    pub check_interval: u64,
    #[builder(default = "Arc::new(Algorithm::default())")]
    pub hasher: Arc<dyn HashFunction>,
    #[builder(default, setter(strip_option))]
    pub deadline: Option<Duration>,
    /// Exclusive upper bound on nonces; unbounded (up to `u64::MAX`) when unset.
    #[builder(default, setter(strip_option))]
    pub nonce_limit: Option<u64>,
    #[builder(default = "DEFAULT_DIFFICULTY_CEILING")]
    pub difficulty_ceiling: u32,
    #[builder(default)]
    pub cancel: CancelToken,
    /// Receives the running hash count, updated every `check_interval` hashes.
    #[builder(default, setter(strip_option))]
    pub progress: Option<Arc<AtomicU64>>,
}

impl MiningSessionBuilder {
    fn validate(&self) -> Result<(), Error> {
        if self.prefix.is_none() {
            return Err(Error::InvalidConfig("prefix must be provided".into()));
        }
        if self.difficulty.is_none() {
            return Err(Error::InvalidConfig("difficulty must be provided".into()));
        }
        if self.workers == Some(0) {
            return Err(Error::InvalidConfig("workers must be >= 1".into()));
        }
        if self.check_interval == Some(0) {
            return Err(Error::InvalidConfig("check_interval must be >= 1".into()));
        }
        Ok(())
    }

    pub fn build_validated(self) -> Result<MiningSession, Error> {
        self.validate()?;
        let session = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        session.validate()?;
        Ok(session)
    }
}

impl MiningSession {
    pub fn builder() -> MiningSessionBuilder {
        MiningSessionBuilder::default()
    }

    /// Build a session from shared miner settings.
    pub fn from_config(
        prefix: impl Into<Vec<u8>>,
        difficulty: u32,
        config: &MinerConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let mut builder = Self::builder()
            .prefix(prefix)
            .difficulty(difficulty)
            .workers(config.workers)
            .partition(config.partition)
            .check_interval(config.check_interval)
            .hasher(Arc::new(config.algorithm()?) as Arc<dyn HashFunction>)
            .difficulty_ceiling(config.difficulty_ceiling);
        if let Some(deadline) = config.deadline() {
            builder = builder.deadline(deadline);
        }
        if let Some(limit) = config.nonce_limit {
            builder = builder.nonce_limit(limit);
        }
        builder.build_validated()
    }

    /// Validated acceptance predicate for this session.
    pub fn target(&self) -> Result<DifficultyTarget, Error> {
        let ceiling = self
            .difficulty_ceiling
            .min(u32::try_from(self.hasher.hex_len()).unwrap_or(u32::MAX));
        DifficultyTarget::new(self.difficulty, ceiling)
    }

    fn validate(&self) -> Result<DifficultyTarget, Error> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be >= 1".into()));
        }
        if self.check_interval == 0 {
            return Err(Error::InvalidConfig("check_interval must be >= 1".into()));
        }
        self.partition.validate()?;
        self.hasher.validate()?;
        self.target()
    }

    /// Token that cancels this session's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Search from nonce 0 until the smallest qualifying nonce is established.
    ///
    /// Cancellation and a bounded search without a hit are outcomes, not errors.
    /// With no `nonce_limit` the search has no "not found" result: it runs until
    /// it succeeds or is cancelled.
    pub fn run(&self) -> Result<MiningOutcome, Error> {
        self.run_with(&self.cancel)
    }

    /// Like [`MiningSession::run`], but cancelled through `cancel` instead of the
    /// session's own token.
    pub fn run_with(&self, cancel: &CancelToken) -> Result<MiningOutcome, Error> {
        let target = self.validate()?;
        let end = self.nonce_limit.unwrap_or(u64::MAX);
        let workers = self.workers;
        let partition = self.partition;

        let watermark = Watermark::new();
        let stop = StopFlag::new();
        let source = NonceSource::new(0, end);
        let (tx, rx) = flume::bounded::<Hit>(workers);

        info!(
            difficulty = self.difficulty,
            workers,
            %partition,
            algorithm = self.hasher.name(),
            "mining session started"
        );

        let started = Instant::now();
        let deadline_at = self.deadline.and_then(|d| started.checked_add(d));

        let (best, reports, reason, elapsed) = thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            for index in 0..workers {
                let ctx = WorkerCtx {
                    prefix: &self.prefix,
                    target,
                    hasher: self.hasher.as_ref(),
                    watermark: &watermark,
                    stop: &stop,
                    cancel,
                    source: &source,
                    progress: self.progress.as_deref(),
                    end,
                    check_interval: self.check_interval,
                    tx: tx.clone(),
                };
                let spawned = thread::Builder::new()
                    .name(format!("hexpow-worker-{index}"))
                    .spawn_scoped(s, move || run_worker(&ctx, index, workers, partition));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        warn!(index, error = %err, "worker spawn failed");
                        stop.force_stop();
                        for handle in handles {
                            let _ = handle.join();
                        }
                        return Err(Error::WorkerSpawnFailure { index, source: err });
                    }
                }
                debug!(index, "worker spawned");
            }
            drop(tx);

            let mut best: Option<Hit> = None;
            let mut reason: Option<CancelReason> = None;
            loop {
                let wait = match deadline_at {
                    Some(at) if reason.is_none() => {
                        at.saturating_duration_since(Instant::now()).min(COORDINATOR_POLL)
                    }
                    _ => COORDINATOR_POLL,
                };
                match rx.recv_timeout(wait) {
                    Ok(hit) => {
                        if best.as_ref().map_or(true, |b| hit.nonce < b.nonce) {
                            best = Some(hit);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                if reason.is_none() {
                    if cancel.is_cancelled() {
                        reason = Some(CancelReason::Requested);
                    } else if deadline_at.is_some_and(|at| Instant::now() >= at) {
                        reason = Some(CancelReason::Deadline);
                        stop.force_stop();
                    }
                }
            }
            let elapsed = started.elapsed();

            // The scope re-raises panics of threads left unjoined.
            let mut reports = Vec::with_capacity(workers);
            let mut panicked = None;
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(report) => reports.push(report),
                    Err(_) => {
                        warn!(index, "worker panicked");
                        panicked.get_or_insert(index);
                    }
                }
            }
            match panicked {
                Some(index) => Err(Error::WorkerPanicked { index }),
                None => Ok((best, reports, reason, elapsed)),
            }
        })?;

        let attempts: u64 = reports.iter().map(|r| r.attempts).sum();
        let outcome = self.conclude(
            best, &reports, reason, cancel, &watermark, end, elapsed, attempts,
        );
        match &outcome {
            MiningOutcome::Found(result) => info!(
                nonce = result.nonce,
                attempts,
                elapsed_secs = elapsed.as_secs_f64(),
                "nonce found"
            ),
            MiningOutcome::Cancelled { reason } => warn!(%reason, attempts, "mining cancelled"),
            MiningOutcome::Exhausted { limit } => {
                warn!(limit, attempts, "nonce space exhausted")
            }
        }
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn conclude(
        &self,
        best: Option<Hit>,
        reports: &[WorkerReport],
        reason: Option<CancelReason>,
        cancel: &CancelToken,
        watermark: &Watermark,
        end: u64,
        elapsed: Duration,
        attempts: u64,
    ) -> MiningOutcome {
        if reports.iter().any(|r| r.exit == WorkerExit::Interrupted) {
            let reason = reason.unwrap_or(if cancel.is_cancelled() {
                CancelReason::Requested
            } else {
                CancelReason::Deadline
            });
            return MiningOutcome::Cancelled { reason };
        }
        match best {
            Some(hit) => {
                debug_assert_eq!(watermark.get(), Some(hit.nonce));
                MiningOutcome::Found(MiningResult {
                    nonce: hit.nonce,
                    digest: hex::encode(&hit.digest),
                    elapsed,
                    attempts,
                    difficulty: self.difficulty,
                    workers: self.workers,
                    partition: self.partition,
                    algorithm: self.hasher.name().to_owned(),
                })
            }
            None => MiningOutcome::Exhausted { limit: end },
        }
    }
}

/// Mine `prefix` at `difficulty` with `worker_count` workers and SHA-256.
///
/// Cancellation and exhaustion cannot happen here; any error is a setup failure.
pub fn run(
    prefix: impl Into<Vec<u8>>,
    difficulty: u32,
    worker_count: usize,
) -> Result<MiningResult, Error> {
    MiningSession::builder()
        .prefix(prefix)
        .difficulty(difficulty)
        .workers(worker_count)
        .build_validated()?
        .run()?
        .into_result()
}

/// Mine with every default: SHA-256, all available cores, chunked partition.
pub fn mine(prefix: impl Into<Vec<u8>>, difficulty: u32) -> Result<MiningResult, Error> {
    run(prefix, difficulty, default_workers())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::search_sequential;

    fn session(prefix: &str, difficulty: u32, workers: usize) -> MiningSession {
        MiningSession::builder()
            .prefix(prefix)
            .difficulty(difficulty)
            .workers(workers)
            .build_validated()
            .expect("build session")
    }

    #[test]
    fn difficulty_zero_returns_nonce_zero() {
        let result = session("arthur", 0, 4).run().unwrap().into_result().unwrap();
        assert_eq!(result.nonce, 0);
        assert_eq!(result.digest, Algorithm::Sha2_256.hash_hex(b"arthur0"));
        assert!(result.elapsed < Duration::from_secs(1));
    }

    #[test]
    fn run_matches_sequential_reference() {
        let target = DifficultyTarget::new(3, 16).unwrap();
        let expected = search_sequential(b"session", &target, &Algorithm::Sha2_256, u64::MAX)
            .unwrap()
            .nonce;
        for workers in [1, 2, 8] {
            let result = session("session", 3, workers).run().unwrap().into_result().unwrap();
            assert_eq!(result.nonce, expected, "workers={workers}");
            assert!(result.digest.starts_with("000"));
            assert!(result.attempts > expected / workers as u64);
        }
    }

    #[test]
    fn rerun_restarts_from_zero() {
        let s = session("again", 2, 3);
        let first = s.run().unwrap().into_result().unwrap();
        let second = s.run().unwrap().into_result().unwrap();
        assert_eq!(first.nonce, second.nonce);
        assert_eq!(first.digest, second.digest);
    }

    #[test]
    fn builder_rejects_missing_and_zero_fields() {
        let err = MiningSession::builder().difficulty(1).build_validated().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("prefix")));

        let err = MiningSession::builder()
            .prefix("x")
            .difficulty(1)
            .workers(0)
            .build_validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn difficulty_over_ceiling_is_rejected_before_search() {
        let err = MiningSession::builder()
            .prefix("x")
            .difficulty(9)
            .difficulty_ceiling(8)
            .build_validated()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidDifficulty {
                difficulty: 9,
                ceiling: 8
            }
        ));
    }

    #[test]
    fn difficulty_over_digest_width_is_rejected() {
        let err = MiningSession::builder()
            .prefix("x")
            .difficulty(65)
            .difficulty_ceiling(200)
            .build_validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDifficulty { ceiling: 64, .. }));
    }

    #[test]
    fn pre_cancelled_session_reports_cancelled() {
        let s = MiningSession::builder()
            .prefix("never")
            .difficulty(16)
            .workers(2)
            .build_validated()
            .unwrap();
        s.cancel_token().cancel();
        let outcome = s.run().unwrap();
        assert_eq!(
            outcome,
            MiningOutcome::Cancelled {
                reason: CancelReason::Requested
            }
        );
    }

    #[test]
    fn cancelled_session_stays_cancelled_but_can_run_with_fresh_token() {
        let mut s = session("latch", 16, 2);
        s.cancel_token().cancel();
        assert!(matches!(s.run().unwrap(), MiningOutcome::Cancelled { .. }));

        s.difficulty = 1;
        assert!(matches!(s.run().unwrap(), MiningOutcome::Cancelled { .. }));
        let result = s.run_with(&CancelToken::new()).unwrap().into_result().unwrap();
        assert!(result.digest.starts_with('0'));
    }

    #[test]
    fn run_with_honours_its_own_token() {
        let s = session("external", 16, 2);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            s.run_with(&token).unwrap(),
            MiningOutcome::Cancelled {
                reason: CancelReason::Requested
            }
        );
        assert!(!s.cancel_token().is_cancelled());
    }

    #[test]
    fn unusable_hash_params_fail_before_search() {
        let params = crate::hash::Argon2Params::new(64, 1, 1, Some(64)).unwrap();
        let err = MiningSession::builder()
            .prefix("arthur")
            .difficulty(0)
            .hasher(Arc::new(Algorithm::Argon2id(params)) as Arc<dyn HashFunction>)
            .build_validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("argon2id")));
    }

    #[test]
    fn deadline_cancels_hopeless_search() {
        let s = MiningSession::builder()
            .prefix("never")
            .difficulty(16)
            .workers(2)
            .deadline(Duration::from_millis(30))
            .build_validated()
            .unwrap();
        let started = Instant::now();
        let outcome = s.run().unwrap();
        assert_eq!(
            outcome,
            MiningOutcome::Cancelled {
                reason: CancelReason::Deadline
            }
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn bounded_search_can_exhaust() {
        for partition in [Partition::Striped, Partition::Chunked { chunk_size: 16 }] {
            let s = MiningSession::builder()
                .prefix("bounded")
                .difficulty(8)
                .workers(3)
                .partition(partition)
                .nonce_limit(200)
                .build_validated()
                .unwrap();
            assert_eq!(s.run().unwrap(), MiningOutcome::Exhausted { limit: 200 });
        }
    }

    #[test]
    fn progress_counts_every_hash() {
        let progress = Arc::new(AtomicU64::new(0));
        let s = MiningSession::builder()
            .prefix("progress")
            .difficulty(2)
            .workers(2)
            .check_interval(3)
            .progress(progress.clone())
            .build_validated()
            .unwrap();
        let result = s.run().unwrap().into_result().unwrap();
        assert_eq!(progress.load(std::sync::atomic::Ordering::SeqCst), result.attempts);
    }

    #[test]
    fn from_config_applies_settings() {
        let config = MinerConfig {
            workers: 2,
            partition: Partition::Striped,
            algorithm: "blake3".into(),
            ..MinerConfig::default()
        };
        let s = MiningSession::from_config("cfg", 2, &config).unwrap();
        assert_eq!(s.workers, 2);
        assert_eq!(s.partition, Partition::Striped);
        let result = s.run().unwrap().into_result().unwrap();
        assert_eq!(result.algorithm, "blake3");
        assert!(result.digest.starts_with("00"));
    }
}
