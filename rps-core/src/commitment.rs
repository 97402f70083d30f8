//! Move commitments: `SHA-256(move byte || 32-byte salt)`.
//!
//! The same encoding is used when a client builds its commitment and when the
//! house checks a reveal against it.

use crate::error::{HouseError, Result};
use crate::game::Move;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte digest binding a hidden move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CommitHash([u8; 32]);

impl CommitHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for CommitHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for CommitHash {
    type Err = HouseError;

    fn from_str(s: &str) -> Result<Self> {
        decode_32(s).map(Self).map_err(HouseError::InvalidHash)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitHash({})", self)
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for CommitHash {
    type Error = HouseError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Secret mixed into a commitment so the move cannot be guessed from the hash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; 32]);

impl Salt {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// UTF-8 text right-padded with zeros, as wallets encode short strings into bytes32.
    /// Text longer than 31 bytes is rejected so the result always ends in a zero byte.
    pub fn from_text(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return Err(HouseError::InvalidSalt("salt text is empty".to_string()));
        }
        if bytes.len() > 31 {
            return Err(HouseError::InvalidSalt(format!(
                "salt text is {} bytes, at most 31 allowed",
                bytes.len()
            )));
        }

        let mut salt = [0u8; 32];
        salt[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(salt))
    }
}

impl From<[u8; 32]> for Salt {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Salt {
    type Err = HouseError;

    /// Parses 32 hex-encoded bytes, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        decode_32(s).map(Self).map_err(HouseError::InvalidSalt)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

fn decode_32(s: &str) -> std::result::Result<[u8; 32], String> {
    let s = s.trim();
    let body = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(body).map_err(|e| e.to_string())?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))
}

/// Commitment over a move and salt.
pub fn commit_move(mv: Move, salt: &Salt) -> CommitHash {
    let mut hasher = Sha256::new();
    hasher.update([mv.as_u8()]);
    hasher.update(salt.as_bytes());
    CommitHash(hasher.finalize().into())
}

/// Checks a revealed move and salt against an earlier commitment.
pub fn verify_move(hash: &CommitHash, mv: Move, salt: &Salt) -> bool {
    commit_move(mv, salt) == *hash
}

/// Random salt for a new commitment.
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    Salt(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_and_verify() {
        let salt = generate_salt();
        let hash = commit_move(Move::Paper, &salt);

        assert!(verify_move(&hash, Move::Paper, &salt));
        assert!(!verify_move(&hash, Move::Rock, &salt));
        assert!(!verify_move(&hash, Move::Paper, &generate_salt()));
    }

    #[test]
    fn test_encoding_is_move_byte_then_salt() {
        let salt = Salt::from([0x11; 32]);
        let mut preimage = vec![3u8];
        preimage.extend_from_slice(&[0x11; 32]);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();

        assert_eq!(commit_move(Move::Scissors, &salt).as_bytes(), &expected);
    }

    #[test]
    fn test_salt_from_text() {
        let salt = Salt::from_text("hunter2").unwrap();
        assert_eq!(&salt.as_bytes()[..7], b"hunter2");
        assert!(salt.as_bytes()[7..].iter().all(|b| *b == 0));

        assert!(Salt::from_text("").is_err());
        assert!(Salt::from_text(&"x".repeat(32)).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let salt = generate_salt();
        let parsed: Salt = format!("0x{}", salt.to_hex()).parse().unwrap();
        assert_eq!(parsed, salt);

        let hash = commit_move(Move::Rock, &salt);
        assert_eq!(hash.to_string().parse::<CommitHash>().unwrap(), hash);
        assert!("0xdead".parse::<Salt>().is_err());
    }
}
