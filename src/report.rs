use crate::error::Error;
use crate::result::{MiningOutcome, MiningResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Output format of the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Json,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(Error::InvalidConfig(format!(
                "unknown format {other:?}, expected text|json"
            ))),
        }
    }
}

/// Three lines: `nonce=`, `hash=`, `elapsed=` with four decimals.
impl Display for MiningResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "nonce={}", self.nonce)?;
        writeln!(f, "hash={}", self.digest)?;
        write!(f, "elapsed={:.4}s", self.elapsed.as_secs_f64())
    }
}

/// Render an outcome for humans or machines.
pub fn render(outcome: &MiningOutcome, format: Format) -> Result<String, Error> {
    match format {
        Format::Json => Ok(serde_json::to_string(outcome)?),
        Format::Text => Ok(match outcome {
            MiningOutcome::Found(result) => result.to_string(),
            MiningOutcome::Cancelled { reason } => format!("cancelled: {reason}"),
            MiningOutcome::Exhausted { limit } => format!("exhausted: no nonce below {limit}"),
        }),
    }
}
