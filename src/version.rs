//! Protocol API versions that gate planner behaviour.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A protocol API version, ordered by `(major, minor)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    /// First version where a multichannel may use rows A and B of 384-well plates.
    pub const MULTICHANNEL_384_ROWS: ApiVersion = ApiVersion::new(2, 2);
    /// First version where zero-volume sub-transfers are skipped entirely.
    pub const SKIP_ZERO_VOLUME: ApiVersion = ApiVersion::new(2, 8);
    /// Version assumed when a request does not specify one.
    pub const LATEST: ApiVersion = ApiVersion::new(2, 8);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
