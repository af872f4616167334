// idtech4-common -- Shared primitives for the engine/game-module boundary

pub mod bitmsg;
pub mod common;
pub mod completion;
pub mod cvar;
pub mod dict;
pub mod error;
pub mod host;
pub mod lang;
pub mod mapfile;
pub mod marshal;
pub mod native;
pub mod scoped_ptr;
pub mod version;

pub use error::{BoundaryError, BoundaryResult};
