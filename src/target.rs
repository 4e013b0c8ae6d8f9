use crate::error::Error;

/// Highest difficulty accepted unless a session configures otherwise.
///
/// Sixteen leading hex zeros is 2^64 expected attempts, already far outside a
/// single machine's reach.
pub const DEFAULT_DIFFICULTY_CEILING: u32 = 16;

/// Acceptance predicate: the digest's hex form starts with `difficulty` zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DifficultyTarget {
    difficulty: u32,
}

impl DifficultyTarget {
    /// Build a target, rejecting difficulties above `ceiling`.
    pub fn new(difficulty: u32, ceiling: u32) -> Result<Self, Error> {
        if difficulty > ceiling {
            return Err(Error::InvalidDifficulty {
                difficulty: difficulty.into(),
                ceiling,
            });
        }
        Ok(Self { difficulty })
    }

    /// Validate a signed difficulty as it arrives from user input.
    pub fn from_signed(difficulty: i64, ceiling: u32) -> Result<Self, Error> {
        let checked = u32::try_from(difficulty)
            .ok()
            .filter(|d| *d <= ceiling)
            .ok_or(Error::InvalidDifficulty {
                difficulty,
                ceiling,
            })?;
        Ok(Self {
            difficulty: checked,
        })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// True iff the first `difficulty` characters of `digest` are all `'0'`.
    ///
    /// A digest shorter than the difficulty is rejected.
    pub fn accepts(&self, digest: &str) -> bool {
        let n = self.difficulty as usize;
        digest
            .as_bytes()
            .get(..n)
            .is_some_and(|head| head.iter().all(|c| *c == b'0'))
    }

    /// Same predicate as [`accepts`](Self::accepts), evaluated on raw digest bytes.
    ///
    /// Each byte carries two hex characters, high nibble first.
    #[inline]
    pub fn accepts_bytes(&self, digest: &[u8]) -> bool {
        let n = self.difficulty as usize;
        let full = n / 2;
        let Some(head) = digest.get(..full) else {
            return false;
        };
        if head.iter().any(|b| *b != 0) {
            return false;
        }
        if n % 2 == 1 {
            return digest.get(full).is_some_and(|b| b >> 4 == 0);
        }
        true
    }

    /// Expected number of attempts for a uniformly random digest: 16^difficulty.
    pub fn expected_attempts(&self) -> f64 {
        16f64.powi(self.difficulty as i32)
    }
}
