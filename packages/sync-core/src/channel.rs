//! Logical channels multiplexed over one physical stream

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a logical event stream sharing a physical connection
///
/// Channels are opaque: any string is a valid channel, and the four
/// constructors below name the ones this core consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(Cow<'static, str>);

impl Channel {
    pub const CONNECTION: Channel = Channel(Cow::Borrowed("connection"));
    pub const ERROR: Channel = Channel(Cow::Borrowed("error"));
    /// Carries both wallet and integration events, told apart by `type` prefix
    pub const CRYPTO_SYNC: Channel = Channel(Cow::Borrowed("crypto_sync"));
    pub const BANKING_SYNC: Channel = Channel(Cow::Borrowed("banking_sync"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
