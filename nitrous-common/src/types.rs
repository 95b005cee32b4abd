//! # Shared Types
//!
//! Reply literals and the key set accepted by multi-key operations.

/// Status reply returned by a successful write or QUIT.
pub const STATUS_OK: &str = "OK";

/// Reply returned by a healthy PING.
pub const PONG: &str = "PONG";

/// Pattern matching every key.
pub const ALL_KEYS: &str = "*";

/// TTL reply for a key without expiration.
pub const TTL_NO_EXPIRY: i64 = -1;

/// TTL reply for a missing key.
pub const TTL_MISSING: i64 = -2;

/// One or more keys, normalized to an owned sequence.
///
/// `delete` accepts a single key or many; both shapes convert into `Keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keys(Vec<String>);

impl Keys {
    pub fn new(keys: Vec<String>) -> Self {
        Keys(keys)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Keys {
    fn from(key: &str) -> Self {
        Keys(vec![key.to_string()])
    }
}

impl From<String> for Keys {
    fn from(key: String) -> Self {
        Keys(vec![key])
    }
}

impl From<Vec<String>> for Keys {
    fn from(keys: Vec<String>) -> Self {
        Keys(keys)
    }
}

impl From<&[&str]> for Keys {
    fn from(keys: &[&str]) -> Self {
        Keys(keys.iter().map(|key| key.to_string()).collect())
    }
}

impl From<Vec<&str>> for Keys {
    fn from(keys: Vec<&str>) -> Self {
        Keys::from(keys.as_slice())
    }
}

impl<const N: usize> From<[&str; N]> for Keys {
    fn from(keys: [&str; N]) -> Self {
        Keys::from(&keys[..])
    }
}

impl FromIterator<String> for Keys {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Keys(iter.into_iter().collect())
    }
}
