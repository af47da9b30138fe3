//! Market identity and pool mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// An equity market served by the proxy pool.
///
/// `original_source/` represents markets as free-form strings validated ad
/// hoc at each call site; the Rust rendition closes the set so unknown
/// codes are rejected once, at the HTTP boundary, rather than deep inside
/// business logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Cn,
    Hk,
    Us,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Cn, Market::Hk, Market::Us];

    pub fn as_str(self) -> &'static str {
        match self {
            Market::Cn => "cn",
            Market::Hk => "hk",
            Market::Us => "us",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cn" => Ok(Market::Cn),
            "hk" => Ok(Market::Hk),
            "us" => Ok(Market::Us),
            other => Err(PoolError::InvalidArgument(format!("unknown market code: {other}"))),
        }
    }
}

/// Whether a pool instance serves live request traffic or runs in
/// developer/operator-driven backfill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PoolMode {
    Live,
    Backfill,
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolMode::Live => f.write_str("LIVE"),
            PoolMode::Backfill => f.write_str("BACKFILL"),
        }
    }
}

impl FromStr for PoolMode {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIVE" => Ok(PoolMode::Live),
            "BACKFILL" => Ok(PoolMode::Backfill),
            other => Err(PoolError::InvalidArgument(format!("unknown pool mode: {other}"))),
        }
    }
}

/// `(market, mode)` — the identity of one `PoolInstance` in a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolIdentity {
    pub market: Market,
    pub mode: PoolMode,
}

impl PoolIdentity {
    pub fn new(market: Market, mode: PoolMode) -> Self {
        Self { market, mode }
    }
}

impl fmt::Display for PoolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_round_trips_through_str() {
        for m in Market::ALL {
            assert_eq!(m.as_str().parse::<Market>().unwrap(), m);
        }
    }

    #[test]
    fn market_parse_is_case_insensitive_and_trims() {
        assert_eq!(" Hk ".parse::<Market>().unwrap(), Market::Hk);
        assert_eq!("US".parse::<Market>().unwrap(), Market::Us);
    }

    #[test]
    fn unknown_market_code_rejected() {
        assert!("zz".parse::<Market>().is_err());
    }

    #[test]
    fn pool_mode_parse_round_trips() {
        assert_eq!("LIVE".parse::<PoolMode>().unwrap(), PoolMode::Live);
        assert_eq!("backfill".parse::<PoolMode>().unwrap(), PoolMode::Backfill);
        assert!("neither".parse::<PoolMode>().is_err());
    }

    #[test]
    fn identity_display_is_market_colon_mode() {
        let id = PoolIdentity::new(Market::Cn, PoolMode::Live);
        assert_eq!(id.to_string(), "cn:LIVE");
    }
}
