//! Core type definitions for AgentDB identifiers and timestamps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pattern identifier.
///
/// Assigned by the store in strictly increasing order starting at 0 and
/// never reused, including across a save/reload cycle. The value doubles as
/// the data id inside the HNSW graph.
///
/// # Example
/// ```
/// use agentdb::PatternId;
///
/// let id = PatternId::new(7);
/// assert_eq!(id.as_u64(), 7);
/// assert_eq!(id.next(), PatternId::new(8));
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PatternId(pub u64);

impl PatternId {
    /// Wraps a raw identifier.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the identifier that follows this one.
    #[inline]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the identifier as an HNSW data id.
    #[inline]
    pub(crate) fn as_index_id(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PatternId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unix timestamp in milliseconds.
///
/// Using i64 allows representing dates far into the future and past.
/// Millisecond precision is sufficient for automation steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch (should never happen
    /// in practice), returns a timestamp of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedding vector type alias.
///
/// Always L2-normalized and exactly `Config::dimension()` long.
pub type Embedding = Vec<f32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_id_ordering() {
        let a = PatternId::new(1);
        let b = a.next();
        assert!(a < b);
        assert_eq!(b.as_u64(), 2);
    }

    #[test]
    fn test_pattern_id_display() {
        assert_eq!(PatternId::new(42).to_string(), "42");
    }

    #[test]
    fn test_timestamp_now_is_after_epoch() {
        let now = Timestamp::now();
        assert!(now.as_millis() > 0);
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
    }

    #[test]
    fn test_timestamp_serialization() {
        let ts = Timestamp::from_millis(1_700_000_000_000);
        let bytes = bincode::serialize(&ts).unwrap();
        let restored: Timestamp = bincode::deserialize(&bytes).unwrap();
        assert_eq!(ts, restored);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000000");
    }
}
