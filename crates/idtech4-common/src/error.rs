// error.rs -- Failure taxonomy for the native/module boundary
//
// Placeholder entry points are not errors: they log and return an inert
// default. Everything else that can go wrong while crossing the boundary
// lands in one of these variants.

use thiserror::Error;

/// Errors raised while marshaling, loading the game module, or touching a
/// released handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    /// A value could not be converted for the other side of the boundary.
    #[error("marshaling {what} failed: {reason}")]
    Marshal { what: &'static str, reason: String },

    /// A managed string contained a NUL byte and cannot become a C string.
    #[error("string contains an interior NUL at byte {position}")]
    InteriorNul { position: usize },

    /// A scoped pointer was dereferenced after it was released or disposed.
    #[error("disposed object accessed")]
    Disposed,

    #[error("game module not found: {path}")]
    ModuleNotFound { path: String },

    #[error("failed to open game module '{path}': {reason}")]
    ModuleOpen { path: String, reason: String },

    #[error("entry point '{symbol}' not found in '{path}'")]
    EntryPointMissing { path: String, symbol: String },

    #[error("game module '{path}' has API version {found} (expected {expected})")]
    ApiVersion { path: String, expected: i32, found: i32 },

    #[error("game module '{path}' does not provide type '{expected}' (found '{found}')")]
    TypeNotFound {
        path: String,
        expected: String,
        found: String,
    },

    #[error("game module '{path}' returned a null instance")]
    NullInstance { path: String },

    #[error("game module already loaded")]
    AlreadyLoaded,

    #[error("game module not loaded")]
    NotLoaded,

    #[error("game services are missing the {name} subsystem")]
    MissingService { name: &'static str },

    #[error("engine import version {found} does not match game API version {expected}")]
    ImportVersion { expected: i32, found: i32 },
}

pub type BoundaryResult<T> = Result<T, BoundaryError>;

impl BoundaryError {
    /// True for failures that happen while resolving the game module at
    /// startup. These are fatal for the session.
    pub fn is_load_fault(&self) -> bool {
        matches!(
            self,
            BoundaryError::ModuleNotFound { .. }
                | BoundaryError::ModuleOpen { .. }
                | BoundaryError::EntryPointMissing { .. }
                | BoundaryError::ApiVersion { .. }
                | BoundaryError::TypeNotFound { .. }
                | BoundaryError::NullInstance { .. }
                | BoundaryError::ImportVersion { .. }
                | BoundaryError::MissingService { .. }
        )
    }
}
