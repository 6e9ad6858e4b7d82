//! Timeout - bound for blocking channel primitives

use std::fmt;
use std::time::Duration;

/// Wait bound for a blocking send/receive
///
/// Configured as signed milliseconds: `0` tries once, a positive value waits
/// up to that long, a negative value waits until the operation completes or
/// the channel is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Try once, never wait
    Immediate,
    /// Wait up to the given duration
    After(Duration),
    /// Wait until the operation completes or the channel closes
    Indefinite,
}

impl Timeout {
    /// Map signed milliseconds onto a timeout
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            0 => Self::Immediate,
            m if m < 0 => Self::Indefinite,
            m => Self::After(Duration::from_millis(m.unsigned_abs())),
        }
    }

    /// Signed milliseconds (inverse of [`Timeout::from_millis`])
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Immediate => 0,
            Self::After(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            Self::Indefinite => -1,
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::After(Duration::from_millis(1000))
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediate"),
            Self::After(d) => write!(f, "{}ms", d.as_millis()),
            Self::Indefinite => f.write_str("indefinite"),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        if value.is_zero() {
            Self::Immediate
        } else {
            Self::After(value)
        }
    }
}
