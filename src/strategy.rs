//! Nonce search: the sequential reference and the per-worker loops of the parallel pool.
//!
//! Every worker walks its share of the nonce space in increasing order and only
//! gives up on a nonce once it is at or above the shared [`Watermark`]. When
//! all workers have exited, every nonce below the watermark has been tested,
//! so the watermark is the smallest qualifying nonce regardless of worker
//! count, partition or scheduling.
use crate::candidate::{Candidates, PayloadBuf};
use crate::error::Error;
use crate::hash::HashFunction;
use crate::target::DifficultyTarget;
use crate::work::{CancelToken, NonceSource, StopFlag, Watermark};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

/// How the nonce space is split between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partition {
    /// Worker `i` of `W` tests `i, i+W, i+2W, ...`.
    Striped,
    /// Workers claim increasing contiguous ranges of `chunk_size` nonces.
    Chunked { chunk_size: u64 },
}

impl Default for Partition {
    fn default() -> Self {
        Partition::Chunked {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Partition {
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Partition::Chunked { chunk_size: 0 } => {
                Err(Error::InvalidConfig("chunk_size must be >= 1".into()))
            }
            _ => Ok(()),
        }
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Striped => write!(f, "striped"),
            Partition::Chunked { chunk_size } => write!(f, "chunked({chunk_size})"),
        }
    }
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "striped" => Ok(Partition::Striped),
            "chunked" => Ok(Partition::default()),
            other => Err(Error::InvalidConfig(format!(
                "unknown partition {other:?}, expected striped|chunked"
            ))),
        }
    }
}

/// A qualifying nonce and its raw digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub nonce: u64,
    pub digest: Vec<u8>,
}

/// Sequential reference search over `[0, end)`.
///
/// Returns the first accepted candidate, or `None` if none exists below `end`.
pub fn search_sequential<H: HashFunction + ?Sized>(
    prefix: &[u8],
    target: &DifficultyTarget,
    hasher: &H,
    end: u64,
) -> Option<Hit> {
    Candidates::new(prefix, hasher)
        .take_while(|c| c.nonce < end)
        .find(|c| target.accepts_bytes(&c.digest))
        .map(|c| Hit {
            nonce: c.nonce,
            digest: c.digest,
        })
}

/// How a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Its share below the watermark (or the space end) is fully tested.
    Settled,
    /// Stopped early by cancellation or a session stop.
    Interrupted,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerReport {
    pub exit: WorkerExit,
    pub attempts: u64,
}

/// Everything a worker reads; all of it is borrowed from the running session.
pub(crate) struct WorkerCtx<'a> {
    pub prefix: &'a [u8],
    pub target: DifficultyTarget,
    pub hasher: &'a dyn HashFunction,
    pub watermark: &'a Watermark,
    pub stop: &'a StopFlag,
    pub cancel: &'a CancelToken,
    pub source: &'a NonceSource,
    pub progress: Option<&'a AtomicU64>,
    pub end: u64,
    pub check_interval: u64,
    pub tx: flume::Sender<Hit>,
}

impl WorkerCtx<'_> {
    #[inline]
    fn interrupted(&self) -> bool {
        self.stop.should_stop() || self.cancel.is_cancelled()
    }

    #[inline]
    fn bound(&self) -> u64 {
        self.watermark.bound().min(self.end)
    }

    fn publish(&self, index: usize, nonce: u64, digest: Vec<u8>) {
        let lowered = self.watermark.offer(nonce);
        trace!(worker = index, nonce, lowered, "hit");
        // The coordinator drains until every sender is gone; a closed channel
        // only means the run is being torn down.
        let _ = self.tx.send(Hit { nonce, digest });
    }

    fn flush_progress(&self, pending: &mut u64) {
        if let Some(progress) = self.progress {
            progress.fetch_add(*pending, Ordering::Relaxed);
        }
        *pending = 0;
    }
}

/// Run worker `index` of `workers` under `partition` until it settles or is interrupted.
pub(crate) fn run_worker(
    ctx: &WorkerCtx<'_>,
    index: usize,
    workers: usize,
    partition: Partition,
) -> WorkerReport {
    match partition {
        Partition::Striped => striped(ctx, index, workers),
        Partition::Chunked { chunk_size } => chunked(ctx, index, chunk_size),
    }
}

fn striped(ctx: &WorkerCtx<'_>, index: usize, workers: usize) -> WorkerReport {
    let step = workers.max(1) as u64;
    let mut payload = PayloadBuf::new(ctx.prefix);
    let mut attempts = 0u64;
    let mut pending = 0u64;
    let mut bound = ctx.bound();
    let mut since_check = ctx.check_interval;
    let mut nonce = index as u64;

    while nonce < bound {
        if since_check >= ctx.check_interval {
            since_check = 0;
            ctx.flush_progress(&mut pending);
            if ctx.interrupted() {
                return WorkerReport {
                    exit: WorkerExit::Interrupted,
                    attempts,
                };
            }
            bound = ctx.bound();
            if nonce >= bound {
                break;
            }
        }
        since_check += 1;
        attempts += 1;
        pending += 1;

        let digest = ctx.hasher.hash(payload.payload(nonce));
        if ctx.target.accepts_bytes(&digest) {
            ctx.publish(index, nonce, digest);
            break;
        }
        match nonce.checked_add(step) {
            Some(next) => nonce = next,
            None => break,
        }
    }

    ctx.flush_progress(&mut pending);
    WorkerReport {
        exit: WorkerExit::Settled,
        attempts,
    }
}

fn chunked(ctx: &WorkerCtx<'_>, index: usize, chunk_size: u64) -> WorkerReport {
    let mut payload = PayloadBuf::new(ctx.prefix);
    let mut attempts = 0u64;
    let mut pending = 0u64;
    let mut since_check = 0u64;

    'claims: loop {
        ctx.flush_progress(&mut pending);
        if ctx.interrupted() {
            return WorkerReport {
                exit: WorkerExit::Interrupted,
                attempts,
            };
        }
        let mut bound = ctx.bound();
        let Some(range) = ctx.source.claim(chunk_size) else {
            break;
        };
        // Claims only grow, so every later range is above the watermark too.
        if range.start >= bound {
            break;
        }
        trace!(worker = index, start = range.start, end = range.end, "claimed");

        for nonce in range {
            if since_check >= ctx.check_interval {
                since_check = 0;
                ctx.flush_progress(&mut pending);
                if ctx.interrupted() {
                    return WorkerReport {
                        exit: WorkerExit::Interrupted,
                        attempts,
                    };
                }
                bound = ctx.bound();
            }
            if nonce >= bound {
                break 'claims;
            }
            since_check += 1;
            attempts += 1;
            pending += 1;

            let digest = ctx.hasher.hash(payload.payload(nonce));
            if ctx.target.accepts_bytes(&digest) {
                ctx.publish(index, nonce, digest);
                break 'claims;
            }
        }
    }

    ctx.flush_progress(&mut pending);
    WorkerReport {
        exit: WorkerExit::Settled,
        attempts,
    }
}
