//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a descriptor id
//! where a thread id is expected, and make function signatures more expressive.

use std::fmt;

use scopetrace_common::{BLOCK_TYPE_BLOCK, BLOCK_TYPE_EVENT};

/// Thread ID
///
/// Opaque id of an instrumented thread, unique among concurrently live
/// threads. Not guaranteed stable after the thread exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Descriptor ID
///
/// Dense index into the descriptor table, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub u32);

impl DescriptorId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Desc#{}", self.0)
    }
}

/// Kind of a recorded block
///
/// A `Block` has an open phase between begin and end; an `Event` is an
/// instant marker recorded at begin with no duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockType {
    #[default]
    Block,
    Event,
}

impl BlockType {
    /// Wire tag for this type
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            BlockType::Block => BLOCK_TYPE_BLOCK,
            BlockType::Event => BLOCK_TYPE_EVENT,
        }
    }

    /// Parse a wire tag, `None` for unknown tags
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            BLOCK_TYPE_BLOCK => Some(BlockType::Block),
            BLOCK_TYPE_EVENT => Some(BlockType::Event),
            _ => None,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::Block => write!(f, "block"),
            BlockType::Event => write!(f, "event"),
        }
    }
}

/// Timestamp in nanoseconds
///
/// Represents an absolute point on the monotonic clock (nanoseconds since boot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds (u64)
    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0 / 1_000
    }

    /// Duration elapsed from `earlier` to `self`, saturating at zero
    #[must_use]
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_seconds())
    }
}

/// Duration in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// Convert to milliseconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds (u64)
    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0 / 1_000
    }
}

impl std::ops::Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms >= 1000.0 {
            write!(f, "{:.2}s", self.as_seconds())
        } else if ms >= 0.01 {
            write!(f, "{ms:.2}ms")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_display() {
        assert_eq!(ThreadId(42).to_string(), "TID:42");
    }

    #[test]
    fn test_block_type_tags() {
        assert_eq!(BlockType::from_tag(BlockType::Block.tag()), Some(BlockType::Block));
        assert_eq!(BlockType::from_tag(BlockType::Event.tag()), Some(BlockType::Event));
        assert_eq!(BlockType::from_tag(9), None);
    }

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp(1_500_000_000); // 1.5 seconds
        assert_eq!(ts.as_seconds(), 1.5);
        assert_eq!(ts.as_micros(), 1_500_000);
        assert_eq!(ts.since(Timestamp(500_000_000)), Duration(1_000_000_000));
        assert_eq!(Timestamp(1).since(Timestamp(5)), Duration(0));
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(Duration(5_000_000).to_string(), "5.00ms");
        assert_eq!(Duration(1_500_000_000).to_string(), "1.50s");
        assert_eq!(Duration(250).to_string(), "250ns");
    }
}
