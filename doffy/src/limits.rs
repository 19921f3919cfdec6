//! Concurrency limits.
//!
//! A [`Limit`] states whether a bound uses the built-in default, an explicit
//! value or is switched off entirely.
//!
//! ```no_run
//! use doffy::{App, Limit};
//!
//! let app = App::new().with_max_concurrency(Limit::Limited(4));
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Number of asynchronous providers constructed in parallel by default
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Represents a configurable resource limit.
///
/// Disabling a limit with [`Limit::Unlimited`] removes backpressure and should
/// only be done when the amount of work is known to be small.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Limit<T> {
    /// Use the built-in default.
    #[default]
    Default,

    /// Enforce an explicit upper bound.
    Limited(T),

    /// Disable the limit entirely.
    Unlimited,
}

impl<T> Limit<T> {
    /// Returns `true` if this limit is disabled.
    #[inline(always)]
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// Returns `true` if this limit enforces an explicit bound.
    #[inline(always)]
    pub fn is_limited(&self) -> bool {
        matches!(self, Limit::Limited(_))
    }
}

impl Limit<usize> {
    /// Returns the number of semaphore permits this limit allows.
    ///
    /// An explicit bound of zero is raised to one so that work still progresses.
    pub fn permits(&self) -> usize {
        match *self {
            Limit::Default => DEFAULT_MAX_CONCURRENCY,
            Limit::Limited(n) => n.clamp(1, Semaphore::MAX_PERMITS),
            Limit::Unlimited => Semaphore::MAX_PERMITS,
        }
    }
}
