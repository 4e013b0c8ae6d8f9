use crate::error::{CancelReason, Error};
use crate::strategy::Partition;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The winning candidate of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningResult {
    pub nonce: u64,
    /// Lowercase hex digest of `prefix || nonce`.
    pub digest: String,
    #[serde(rename = "elapsed_secs", with = "secs_f64")]
    pub elapsed: Duration,
    /// Hashes computed across all workers, including work past the winner.
    pub attempts: u64,
    pub difficulty: u32,
    pub workers: usize,
    pub partition: Partition,
    pub algorithm: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MiningOutcome {
    Found(MiningResult),
    Cancelled { reason: CancelReason },
    /// A bounded search covered `[0, limit)` without a qualifying nonce.
    Exhausted { limit: u64 },
}

impl MiningOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, MiningOutcome::Found(_))
    }

    pub fn result(&self) -> Option<&MiningResult> {
        match self {
            MiningOutcome::Found(result) => Some(result),
            _ => None,
        }
    }

    /// Fold cancellation and exhaustion into [`Error`].
    pub fn into_result(self) -> Result<MiningResult, Error> {
        match self {
            MiningOutcome::Found(result) => Ok(result),
            MiningOutcome::Cancelled { reason } => Err(Error::Cancelled(reason)),
            MiningOutcome::Exhausted { limit } => Err(Error::Exhausted { limit }),
        }
    }
}

mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MiningResult {
        MiningResult {
            nonce: 42,
            digest: "00ab".into(),
            elapsed: Duration::from_millis(1500),
            attempts: 43,
            difficulty: 2,
            workers: 4,
            partition: Partition::Striped,
            algorithm: "sha2_256".into(),
        }
    }

    #[test]
    fn into_result_maps_outcomes() {
        assert_eq!(MiningOutcome::Found(sample()).into_result().unwrap().nonce, 42);

        let err = MiningOutcome::Cancelled {
            reason: CancelReason::Deadline,
        }
        .into_result()
        .unwrap_err();
        assert!(err.is_cancelled());

        let err = MiningOutcome::Exhausted { limit: 10 }.into_result().unwrap_err();
        assert!(matches!(err, Error::Exhausted { limit: 10 }));
    }

    #[test]
    fn serde_uses_seconds_for_elapsed() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["elapsed_secs"], 1.5);
        assert_eq!(json["partition"]["kind"], "striped");
        let back: MiningResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn outcome_is_tagged() {
        let json = serde_json::to_value(MiningOutcome::Cancelled {
            reason: CancelReason::Requested,
        })
        .unwrap();
        assert_eq!(json["outcome"], "cancelled");
        assert_eq!(json["reason"], "requested");
    }
}
