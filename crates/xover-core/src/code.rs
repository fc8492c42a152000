//! Short human-shareable session codes.

use crate::board::Mark;
use crate::signaling::Role;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters a code is drawn from
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every code
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("Session code must be 6 characters")]
    WrongLength,

    #[error("Session code may only contain letters and digits")]
    InvalidCharacter,
}

/// A validated 6-character rendezvous code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Draw a fresh code, each character uniformly from [`CODE_ALPHABET`].
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        SessionCode(code)
    }

    /// Normalize user input (trim, upper-case) and validate it.
    pub fn parse(input: &str) -> Result<Self, CodeError> {
        let code = input.trim().to_ascii_uppercase();
        if code.chars().count() != CODE_LENGTH {
            return Err(CodeError::WrongLength);
        }
        if !code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
            return Err(CodeError::InvalidCharacter);
        }
        Ok(SessionCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mark played by `role` in a match on this code.
    ///
    /// A coin flip seeded by the code: both peers compute it independently and
    /// always end up with complementary marks, whichever role hosts.
    pub fn mark_for(&self, role: Role) -> Mark {
        // FNV-1a, stable across builds and platforms
        let hash = self
            .0
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
                (acc ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
            });
        let host_mark = if (hash >> 32) & 1 == 0 { Mark::X } else { Mark::O };
        match role {
            Role::Host => host_mark,
            Role::Joiner => host_mark.opponent(),
        }
    }
}

impl std::fmt::Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}
