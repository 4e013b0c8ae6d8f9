//! Pluggable hash functions applied to `prefix || decimal(nonce)` payloads.
use crate::error::Error;
use argon2::{Algorithm as Argon2Variant, Argon2, Version};
use ripemd::Ripemd320;
use sha2::{Digest, Sha256, Sha512};
use std::fmt::Debug;

pub use argon2::Params as Argon2Params;
pub use scrypt::Params as ScryptParams;

/// Fixed salt for the memory-hard variants; the nonce already lives in the payload.
const MEMORY_HARD_SALT: &[u8] = b"hexpow:v1:salt";

/// A pure function from payload bytes to a fixed-width digest.
pub trait HashFunction: Send + Sync + Debug {
    /// Hash `payload` and return the raw digest bytes.
    ///
    /// Only called after [`HashFunction::validate`] succeeded.
    fn hash(&self, payload: &[u8]) -> Vec<u8>;

    /// Reject parameters under which `hash` cannot produce an `output_len` digest.
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Digest width in bytes.
    fn output_len(&self) -> usize;

    /// Stable lowercase name, as accepted by [`Algorithm::from_name`].
    fn name(&self) -> &'static str;

    /// Digest rendered as lowercase hexadecimal.
    fn hash_hex(&self, payload: &[u8]) -> String {
        hex::encode(self.hash(payload))
    }

    /// Number of hex characters in a rendered digest.
    fn hex_len(&self) -> usize {
        self.output_len() * 2
    }
}

/// Built-in hash functions. `Sha2_256` is the reference behaviour.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Default)]
pub enum Algorithm {
    #[default]
    Sha2_256,
    Sha2_512,
    Ripemd320,
    Blake3,
    Scrypt(ScryptParams),
    Argon2id(Argon2Params),
}

impl Algorithm {
    /// Names accepted by [`Algorithm::from_name`].
    pub const NAMES: [&'static str; 6] = [
        "sha2_256",
        "sha2_512",
        "ripemd_320",
        "blake3",
        "scrypt",
        "argon2id",
    ];

    /// Parse an algorithm name. Memory-hard variants get light default parameters.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "sha2_256" | "sha256" => Ok(Self::Sha2_256),
            "sha2_512" | "sha512" => Ok(Self::Sha2_512),
            "ripemd_320" | "ripemd320" => Ok(Self::Ripemd320),
            "blake3" => Ok(Self::Blake3),
            "scrypt" => ScryptParams::new(10, 8, 1, 32)
                .map(Self::Scrypt)
                .map_err(|e| Error::InvalidConfig(format!("scrypt params: {e}"))),
            "argon2id" => Argon2Params::new(64, 1, 1, Some(32))
                .map(Self::Argon2id)
                .map_err(|e| Error::InvalidConfig(format!("argon2 params: {e}"))),
            other => Err(Error::InvalidConfig(format!(
                "unknown algorithm {other:?}, expected one of {}",
                Self::NAMES.join("|")
            ))),
        }
    }

    pub fn sha2_256(payload: &[u8]) -> Vec<u8> {
        Sha256::digest(payload).to_vec()
    }

    pub fn sha2_512(payload: &[u8]) -> Vec<u8> {
        Sha512::digest(payload).to_vec()
    }

    pub fn ripemd_320(payload: &[u8]) -> Vec<u8> {
        Ripemd320::digest(payload).to_vec()
    }

    pub fn blake3(payload: &[u8]) -> Vec<u8> {
        blake3::hash(payload).as_bytes().to_vec()
    }

    pub fn scrypt(payload: &[u8], params: &ScryptParams) -> Result<Vec<u8>, Error> {
        let mut output = vec![0; 32];
        scrypt::scrypt(payload, MEMORY_HARD_SALT, params, &mut output)
            .map_err(|e| Error::InvalidConfig(format!("scrypt: {e}")))?;
        Ok(output)
    }

    pub fn argon2id(payload: &[u8], params: &Argon2Params) -> Result<Vec<u8>, Error> {
        let mut output = vec![0; 32];
        Argon2::new(Argon2Variant::Argon2id, Version::V0x13, params.clone())
            .hash_password_into(payload, MEMORY_HARD_SALT, &mut output)
            .map_err(|e| Error::InvalidConfig(format!("argon2id: {e}")))?;
        Ok(output)
    }
}

impl HashFunction for Algorithm {
    fn hash(&self, payload: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha2_256 => Self::sha2_256(payload),
            Self::Sha2_512 => Self::sha2_512(payload),
            Self::Ripemd320 => Self::ripemd_320(payload),
            Self::Blake3 => Self::blake3(payload),
            Self::Scrypt(params) => Self::scrypt(payload, params)
                .unwrap_or_else(|e| panic!("unvalidated scrypt params: {e}")),
            Self::Argon2id(params) => Self::argon2id(payload, params)
                .unwrap_or_else(|e| panic!("unvalidated argon2id params: {e}")),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Argon2id(params) => match params.output_len() {
                None | Some(32) => Ok(()),
                Some(len) => Err(Error::InvalidConfig(format!(
                    "argon2id output length must be 32, got {len}"
                ))),
            },
            _ => Ok(()),
        }
    }

    fn output_len(&self) -> usize {
        match self {
            Self::Sha2_256 | Self::Blake3 | Self::Scrypt(_) | Self::Argon2id(_) => 32,
            Self::Sha2_512 => 64,
            Self::Ripemd320 => 40,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sha2_256 => "sha2_256",
            Self::Sha2_512 => "sha2_512",
            Self::Ripemd320 => "ripemd_320",
            Self::Blake3 => "blake3",
            Self::Scrypt(_) => "scrypt",
            Self::Argon2id(_) => "argon2id",
        }
    }
}
