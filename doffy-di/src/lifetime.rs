//! Service lifetimes

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Policy governing instance reuse inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// One instance per container that registered the provider,
    /// created lazily on first successful resolution
    #[default]
    Singleton,

    /// A new instance on every resolution
    Transient,

    /// One instance per scope.
    ///
    /// Within a module container it behaves as a singleton of that module,
    /// within a request container it is constructed on every resolution
    /// since the request itself is the scope.
    Scoped,
}

impl Lifetime {
    /// Returns the lowercase name of the lifetime
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
        }
    }
}

impl fmt::Display for Lifetime {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifetime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(Lifetime::Singleton),
            "transient" => Ok(Lifetime::Transient),
            "scoped" => Ok(Lifetime::Scoped),
            _ => Err(Error::UnknownLifetime(s.into())),
        }
    }
}

impl TryFrom<u8> for Lifetime {
    type Error = Error;

    #[inline]
    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Lifetime::Singleton),
            1 => Ok(Lifetime::Transient),
            2 => Ok(Lifetime::Scoped),
            _ => Err(Error::UnknownLifetime(tag.to_string())),
        }
    }
}
