//! Canonical trading symbol.
//!
//! Exchange wire formats are adapted to and from this canonical form at
//! the exchange-adapter boundary only (see `exchange::ExchangeAdapter`).
//! Every other component works with `Symbol` exclusively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An uppercase, slash-free trading pair identifier (e.g. `BTCUSDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Canonicalise a raw string: uppercase, reject anything containing a
    /// slash or whitespace, reject empty input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains(char::is_whitespace) {
            return None;
        }
        Some(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalises_case() {
        assert_eq!(Symbol::parse("btcusdt").unwrap().as_str(), "BTCUSDT");
    }

    #[test]
    fn rejects_slash_and_whitespace() {
        assert!(Symbol::parse("XBT/USDT").is_none());
        assert!(Symbol::parse("BTC USDT").is_none());
        assert!(Symbol::parse("").is_none());
    }
}
