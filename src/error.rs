use std::fmt::{Display, Formatter};

/// Why a run stopped before settling on a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// A [`CancelToken`](crate::CancelToken) was triggered.
    Requested,
    /// The session deadline elapsed.
    Deadline,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "cancel requested"),
            CancelReason::Deadline => write!(f, "deadline elapsed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("digest does not match hash(prefix || nonce)")]
    DigestMismatch,
    #[error("digest does not meet difficulty")]
    InsufficientDifficulty,
    #[error("nonce is not minimal: {smaller} also qualifies")]
    NotMinimal { smaller: u64 },
    #[error("malformed digest")]
    Malformed,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid difficulty {difficulty}: must be between 0 and {ceiling}")]
    InvalidDifficulty { difficulty: i64, ceiling: u32 },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawnFailure {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {index} panicked")]
    WorkerPanicked { index: usize },
    #[error("search cancelled: {0}")]
    Cancelled(CancelReason),
    #[error("no qualifying nonce below {limit}")]
    Exhausted { limit: u64 },
    #[error("failed to serialize outcome: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error stems from cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}
