use crate::candidate::Candidates;
use crate::error::VerifyError;
use crate::hash::HashFunction;
use crate::target::DifficultyTarget;

/// Check that `digest_hex` is `hash(prefix || nonce)` and meets `target`.
pub fn verify_result<H: HashFunction + ?Sized>(
    prefix: &[u8],
    target: &DifficultyTarget,
    nonce: u64,
    digest_hex: &str,
    hasher: &H,
) -> Result<(), VerifyError> {
    let claimed = hex::decode(digest_hex).map_err(|_| VerifyError::Malformed)?;
    if claimed.len() != hasher.output_len() {
        return Err(VerifyError::Malformed);
    }
    let candidate = Candidates::starting_at(prefix, hasher, nonce)
        .next()
        .ok_or(VerifyError::Malformed)?;
    if candidate.digest != claimed {
        return Err(VerifyError::DigestMismatch);
    }
    if !target.accepts(digest_hex) {
        return Err(VerifyError::InsufficientDifficulty);
    }
    Ok(())
}

/// [`verify_result`] plus an exhaustive check that no nonce in `[0, nonce)` qualifies.
///
/// Costs `nonce` hashes.
pub fn verify_minimal<H: HashFunction + ?Sized>(
    prefix: &[u8],
    target: &DifficultyTarget,
    nonce: u64,
    digest_hex: &str,
    hasher: &H,
) -> Result<(), VerifyError> {
    verify_result(prefix, target, nonce, digest_hex, hasher)?;
    match Candidates::new(prefix, hasher)
        .take_while(|c| c.nonce < nonce)
        .find(|c| target.accepts_bytes(&c.digest))
    {
        Some(smaller) => Err(VerifyError::NotMinimal {
            smaller: smaller.nonce,
        }),
        None => Ok(()),
    }
}
