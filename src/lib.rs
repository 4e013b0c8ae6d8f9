//! Hex-prefix proof of work.
//!
//! Find the smallest nonce such that `hash(prefix || decimal(nonce))`, rendered
//! as lowercase hex, starts with `difficulty` zeros. The search runs on a fixed
//! pool of worker threads and always reports the numerically smallest
//! qualifying nonce, the same one a sequential scan from 0 would find.
//!
//! ```no_run
//! let result = hexpow::run("arthur", 4, 4)?;
//! println!("{result}");
//! # Ok::<(), hexpow::Error>(())
//! ```
pub mod candidate;
pub mod config;
pub mod error;
pub mod hash;
pub mod report;
pub mod result;
pub mod session;
pub mod strategy;
pub mod target;
pub mod verify;
pub mod work;

pub use candidate::{Candidate, Candidates, PayloadBuf};
pub use config::{default_workers, MinerConfig, DEFAULT_CHECK_INTERVAL};
pub use error::{CancelReason, Error, VerifyError};
pub use hash::{Algorithm, Argon2Params, HashFunction, ScryptParams};
pub use report::{render, Format};
pub use result::{MiningOutcome, MiningResult};
pub use session::{mine, run, MiningSession, MiningSessionBuilder};
pub use strategy::{search_sequential, Hit, Partition, DEFAULT_CHUNK_SIZE};
pub use target::{DifficultyTarget, DEFAULT_DIFFICULTY_CEILING};
pub use verify::{verify_minimal, verify_result};
pub use work::CancelToken;
