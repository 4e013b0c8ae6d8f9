//! Payload construction and the lazy `(nonce, digest)` sequence.
use crate::hash::HashFunction;
use std::io::Write;

/// Reusable `prefix || decimal(nonce)` buffer.
///
/// The prefix bytes are written once; each call to [`payload`](Self::payload)
/// only rewrites the decimal suffix.
#[derive(Debug, Clone)]
pub struct PayloadBuf {
    buf: Vec<u8>,
    prefix_len: usize,
}

impl PayloadBuf {
    pub fn new(prefix: &[u8]) -> Self {
        // u64::MAX has 20 decimal digits.
        let mut buf = Vec::with_capacity(prefix.len() + 20);
        buf.extend_from_slice(prefix);
        Self {
            buf,
            prefix_len: prefix.len(),
        }
    }

    /// Payload bytes for `nonce`: the prefix followed by the nonce in base 10.
    #[inline]
    pub fn payload(&mut self, nonce: u64) -> &[u8] {
        self.buf.truncate(self.prefix_len);
        // Writing into a Vec cannot fail.
        let _ = write!(self.buf, "{nonce}");
        &self.buf
    }
}

/// One evaluated nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub nonce: u64,
    pub digest: Vec<u8>,
}

impl Candidate {
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

/// Lazy sequence of candidates `start, start+1, ...`, ending only at `u64::MAX`.
///
/// Nothing is accumulated: each `next` hashes one payload and hands it out.
pub struct Candidates<'a, H: HashFunction + ?Sized> {
    hasher: &'a H,
    payload: PayloadBuf,
    next: Option<u64>,
}

impl<'a, H: HashFunction + ?Sized> Candidates<'a, H> {
    /// Candidates starting at nonce 0.
    pub fn new(prefix: &[u8], hasher: &'a H) -> Self {
        Self::starting_at(prefix, hasher, 0)
    }

    pub fn starting_at(prefix: &[u8], hasher: &'a H, start: u64) -> Self {
        Self {
            hasher,
            payload: PayloadBuf::new(prefix),
            next: Some(start),
        }
    }
}

impl<H: HashFunction + ?Sized> Iterator for Candidates<'_, H> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        let nonce = self.next?;
        self.next = nonce.checked_add(1);
        let digest = self.hasher.hash(self.payload.payload(nonce));
        Some(Candidate { nonce, digest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Algorithm;

    #[test]
    fn payload_appends_decimal_nonce() {
        let mut buf = PayloadBuf::new(b"arthur");
        assert_eq!(buf.payload(0), b"arthur0");
        assert_eq!(buf.payload(12345), b"arthur12345");
        assert_eq!(buf.payload(7), b"arthur7");
        assert_eq!(buf.payload(u64::MAX), b"arthur18446744073709551615");
    }

    #[test]
    fn empty_prefix_is_just_the_nonce() {
        let mut buf = PayloadBuf::new(b"");
        assert_eq!(buf.payload(42), b"42");
    }

    #[test]
    fn candidates_are_sequential_from_zero() {
        let algo = Algorithm::Sha2_256;
        let nonces: Vec<u64> = Candidates::new(b"arthur", &algo)
            .take(5)
            .map(|c| c.nonce)
            .collect();
        assert_eq!(nonces, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn candidate_digest_matches_direct_hash() {
        let algo = Algorithm::Sha2_256;
        let c = Candidates::starting_at(b"arthur", &algo, 99).next().unwrap();
        assert_eq!(c.nonce, 99);
        assert_eq!(c.digest_hex(), algo.hash_hex(b"arthur99"));
    }

    #[test]
    fn sequence_ends_at_u64_max_without_wrapping() {
        let algo = Algorithm::Blake3;
        let tail: Vec<u64> = Candidates::starting_at(b"x", &algo, u64::MAX - 1)
            .map(|c| c.nonce)
            .collect();
        assert_eq!(tail, vec![u64::MAX - 1, u64::MAX]);
    }
}
