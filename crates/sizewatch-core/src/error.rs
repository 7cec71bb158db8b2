#![forbid(unsafe_code)]

//! Error types surfaced synchronously to the immediate caller.
//!
//! Nothing in the observation pipeline is retried. Configuration errors are
//! fatal to the detector being built; lifecycle errors indicate a caller bug.
//! A missing rendering surface is not an error at all (detectors degrade to an
//! inert handle instead).

use crate::geometry::ElementId;
use crate::native::MechanismKind;

/// A requested native mechanism cannot be used in this environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The host has a rendering surface but lacks the mechanism.
    MechanismUnavailable(MechanismKind),
}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MechanismUnavailable(kind) => {
                write!(f, "native {kind} mechanism is not available in this environment")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Misuse of an observation session's attach/detach lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// `detach` called with no active attachment.
    NotAttached,
    /// `attach` called while another element is still attached.
    AlreadyAttached {
        current: ElementId,
        requested: ElementId,
    },
}

impl core::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAttached => write!(f, "detach called but no element is attached"),
            Self::AlreadyAttached { current, requested } => write!(
                f,
                "cannot attach {requested}: {current} is still attached (detach it first)"
            ),
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Any error produced by sizewatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Configuration(ConfigurationError),
    Lifecycle(LifecycleError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {err}"),
            Self::Lifecycle(err) => write!(f, "lifecycle error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Lifecycle(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl From<LifecycleError> for Error {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(err)
    }
}
