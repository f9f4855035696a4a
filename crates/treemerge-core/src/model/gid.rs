//! Identity types: [`Gid`], [`ChangesetId`], and [`ContentHash`].
//!
//! A [`Gid`] is a 128-bit random identifier assigned to a versioned item
//! when it is first created. It never changes across renames, moves, or
//! content edits, which is what lets the merge engine join snapshots by
//! identity instead of by path.
//!
//! | Operation | `Gid` | Name / parent |
//! |-----------|-------|---------------|
//! | Create    | new (random) | new |
//! | Rename    | unchanged | name changes |
//! | Move      | unchanged | parent changes |
//! | Edit      | unchanged | unchanged |
//! | Delete    | moves to the delete set | removed |
//!
//! All three types serialize as plain strings for canonical JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Gid
// ---------------------------------------------------------------------------

/// Stable identity of one versioned item for its entire lifetime.
///
/// Stored as a `u128`, rendered as a 32-character lowercase hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gid(u128);

impl Gid {
    /// Create a `Gid` from a raw `u128`.
    #[must_use]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    /// Allocate a fresh random identity.
    ///
    /// Merge never calls this; it exists for callers building brand-new
    /// entries before invoking a merge.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u128>())
    }

    /// Return the inner `u128` value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Parse a `Gid` from a 32-character lowercase hex string.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 32 lowercase hex digits.
    pub fn from_hex(s: &str) -> Result<Self, GidError> {
        if s.len() != 32 {
            return Err(GidError {
                value: s.to_owned(),
                reason: format!("expected 32 hex characters, got {}", s.len()),
            });
        }
        if !is_lower_hex(s) {
            return Err(GidError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        let n = u128::from_str_radix(s, 16).map_err(|e| GidError {
            value: s.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self(n))
    }

    /// Return the 32-character lowercase hex form.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }

    /// Short form for log lines and hints (last 8 hex digits).
    #[must_use]
    pub fn short(self) -> String {
        let hex = self.to_hex();
        hex[24..].to_owned()
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for Gid {
    type Err = GidError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Gid {
    type Error = GidError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Gid> for String {
    fn from(id: Gid) -> Self {
        id.to_hex()
    }
}

/// Error returned when a `Gid` string is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GidError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for GidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid gid {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for GidError {}

// ---------------------------------------------------------------------------
// ChangesetId
// ---------------------------------------------------------------------------

/// Identifier of one changeset in the history DAG.
///
/// Storage backends use content hashes; fixtures and tests use short labels.
/// Either way the id must be 1–128 characters of ASCII alphanumerics, `-`,
/// `_`, or `.`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChangesetId(String);

impl ChangesetId {
    /// The maximum length of a changeset id.
    pub const MAX_LEN: usize = 128;

    /// Create a new `ChangesetId`, validating format.
    ///
    /// # Errors
    /// Returns an error if the id is empty, too long, or contains invalid characters.
    pub fn new(s: &str) -> Result<Self, ChangesetIdError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ChangesetIdError> {
        if s.is_empty() {
            return Err(ChangesetIdError {
                value: s.to_owned(),
                reason: "changeset id must not be empty".to_owned(),
            });
        }
        if s.len() > Self::MAX_LEN {
            return Err(ChangesetIdError {
                value: s.to_owned(),
                reason: format!(
                    "changeset id must be at most {} characters, got {}",
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ChangesetIdError {
                value: s.to_owned(),
                reason: "changeset id may contain only ASCII letters, digits, '-', '_' and '.'"
                    .to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChangesetId {
    type Err = ChangesetIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChangesetId {
    type Error = ChangesetIdError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<ChangesetId> for String {
    fn from(id: ChangesetId) -> Self {
        id.0
    }
}

/// Error returned when a `ChangesetId` is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangesetIdError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ChangesetIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid changeset id {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for ChangesetIdError {}

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// Digest naming the content of a file, a symlink target, or a submodule
/// reference.
///
/// Any even-length lowercase hex string of 8–128 characters is accepted, so
/// both SHA-1 and SHA-256 object names fit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new `ContentHash`, validating format.
    ///
    /// # Errors
    /// Returns an error if the value is not lowercase hex of a valid length.
    pub fn new(s: &str) -> Result<Self, ContentHashError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// SHA-256 digest of `bytes`.
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Return the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ContentHashError> {
        if s.len() < 8 || s.len() > 128 || s.len() % 2 != 0 {
            return Err(ContentHashError {
                value: s.to_owned(),
                reason: format!(
                    "expected an even number of hex characters between 8 and 128, got {}",
                    s.len()
                ),
            });
        }
        if !is_lower_hex(s) {
            return Err(ContentHashError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ContentHashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ContentHashError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Error returned when a `ContentHash` is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHashError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ContentHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid content hash {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for ContentHashError {}

fn is_lower_hex(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
