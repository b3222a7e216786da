//! # Error Kinds
//!
//! Classifies failures the way callers need to react to them — validation
//! errors never retry, upstream failures surface, transport failures are
//! recovered locally and never reach the caller.
//!
//! ## Design Principles
//! 1. **Flat Enum**: One error type for the whole read/write path keeps
//!    call sites simple (`Result<T, CacheError>` everywhere).
//! 2. **Recoverable vs Fatal**: `Transport` variants are always handled
//!    internally (logged, then falls back to a local load); they should
//!    never be the error a `Group::get` caller observes.

use std::fmt;

/// Result alias used across the cache engine and its collaborators.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error kinds surfaced to callers of the cache engine.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Empty key, duplicate group name, double peer registration, or a
    /// write attempted without a registered setter.
    #[error("validation error: {0}")]
    Validation(String),

    /// The origin reported the key does not exist.
    #[error("key not found")]
    NotFound,

    /// The origin loader, central store, or peer all failed and there was
    /// no further fallback.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A peer RPC failed. This kind is recovered internally (the caller
    /// falls back to a local load) and must never escape `Group::get`.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl CacheError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CacheError::Validation(msg.into())
    }

    pub fn upstream(msg: impl fmt::Display) -> Self {
        CacheError::Upstream(msg.to_string())
    }

    pub fn transport(msg: impl fmt::Display) -> Self {
        CacheError::Transport(msg.to_string())
    }

    /// True for errors that must never be surfaced to a `Group` caller —
    /// they are always handled by falling back to the next tier.
    pub fn is_transport(&self) -> bool {
        matches!(self, CacheError::Transport(_))
    }
}
