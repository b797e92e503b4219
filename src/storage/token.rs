use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Value embedded in an object key so that two writes never share a key.
///
/// Tokens are microseconds since the Unix epoch. Larger tokens were issued
/// later, which is what the aggregator relies on to keep the most recently
/// ingested copy of a duplicated observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniquenessToken(pub u64);

impl fmt::Display for UniquenessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UniquenessToken {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(UniquenessToken)
    }
}

/// Issues strictly increasing tokens based on the wall clock.
///
/// Two calls within the same microsecond, or a clock that steps backwards,
/// still yield increasing tokens.
#[derive(Debug, Default)]
pub struct TokenGenerator {
    last: AtomicU64,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> UniquenessToken {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return UniquenessToken(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}
