//! Encapsulation policy for cross-module service access

use crate::error::Error;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
    sync::Arc,
};

/// How unexported cross-module accesses are treated
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncapsulationMode {
    /// No checks at all
    #[default]
    Disabled,
    /// Violations are logged and then allowed
    Warn,
    /// Violations are rejected with [`Error::AccessDenied`]
    Enforce,
}

impl EncapsulationMode {
    /// Returns the lowercase name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Warn => "warn",
            Self::Enforce => "enforce",
        }
    }
}

impl Display for EncapsulationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncapsulationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "warn" => Ok(Self::Warn),
            "enforce" => Ok(Self::Enforce),
            _ => Err(Error::UnknownMode(s.into())),
        }
    }
}

/// An access to a provider that the owning module does not export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Requesting module
    pub from_module: String,
    /// Module that owns the provider
    pub to_module: String,
    /// Provider name
    pub service: String,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "module '{}' cannot access unexported provider '{}' from module '{}'",
            self.from_module, self.service, self.to_module
        )
    }
}

impl From<Violation> for Error {
    #[inline]
    fn from(v: Violation) -> Self {
        Self::AccessDenied {
            from: v.from_module,
            to: v.to_module,
            service: v.service,
        }
    }
}

/// Receives violations tolerated in [`EncapsulationMode::Warn`]
pub trait ViolationSink: Send + Sync {
    /// Reports a tolerated violation
    fn warn(&self, violation: &Violation);
}

/// Reports violations as `tracing` warnings
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ViolationSink for TracingSink {
    fn warn(&self, violation: &Violation) {
        tracing::warn!(
            from = %violation.from_module,
            to = %violation.to_module,
            service = %violation.service,
            "encapsulation violation: {violation}"
        );
    }
}

struct PolicyState {
    mode: EncapsulationMode,
    sink: Arc<dyn ViolationSink>,
}

/// Decides whether a module may resolve an unexported provider of another module.
///
/// One policy is shared by every module container of an application and its mode
/// can be switched at runtime. Separate applications own separate policies.
pub struct EncapsulationPolicy {
    state: RwLock<PolicyState>,
}

impl Debug for EncapsulationPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncapsulationPolicy")
            .field("mode", &self.mode())
            .finish()
    }
}

impl Default for EncapsulationPolicy {
    #[inline]
    fn default() -> Self {
        Self::new(EncapsulationMode::default())
    }
}

impl EncapsulationPolicy {
    /// Creates a policy that reports warnings through `tracing`
    pub fn new(mode: EncapsulationMode) -> Self {
        Self::with_sink(mode, TracingSink)
    }

    /// Creates a policy with a custom warning sink
    pub fn with_sink(mode: EncapsulationMode, sink: impl ViolationSink + 'static) -> Self {
        Self {
            state: RwLock::new(PolicyState {
                mode,
                sink: Arc::new(sink),
            }),
        }
    }

    /// Switches the enforcement mode
    pub fn set_mode(&self, mode: EncapsulationMode) {
        self.state.write().mode = mode;
    }

    /// Returns the current enforcement mode
    pub fn mode(&self) -> EncapsulationMode {
        self.state.read().mode
    }

    /// Replaces the sink used in [`EncapsulationMode::Warn`]
    pub fn set_sink(&self, sink: impl ViolationSink + 'static) {
        self.state.write().sink = Arc::new(sink);
    }

    /// Checks an access of `service` owned by `to_module` from `from_module`.
    ///
    /// The caller has already established that the service is not exported.
    pub fn check_violation(&self, from_module: &str, to_module: &str, service: &str) -> Result<(), Error> {
        let (mode, sink) = {
            let state = self.state.read();
            (state.mode, state.sink.clone())
        };

        if mode == EncapsulationMode::Disabled {
            return Ok(());
        }

        let violation = Violation {
            from_module: from_module.into(),
            to_module: to_module.into(),
            service: service.into(),
        };

        match mode {
            EncapsulationMode::Warn => {
                sink.warn(&violation);
                Ok(())
            }
            _ => Err(violation.into()),
        }
    }
}
