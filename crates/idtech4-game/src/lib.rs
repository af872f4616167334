// idtech4-game -- The managed side of the game-module boundary
//
// Safe wrappers over engine objects, the subsystem facades handed to a game
// module, the `Game`/`GameEdit` traits a module implements and the exported
// factory convention hosts use to find it.

pub mod facades;
pub mod game;
pub mod handles;
pub mod module;
pub mod services;

pub use game::{AfMesh, Game, GameEdit, GameReturn, UserCommand};
pub use module::{GameModuleExport, GAME_ENTRY_SYMBOL, GAME_TYPE_NAME};
pub use services::{GameServices, GameServicesBuilder};

pub use idtech4_common;
