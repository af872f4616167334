// idtech4-proxy -- The engine-facing side of the game-module boundary
//
// The engine talks to `GameInterface`/`GameEditInterface` in native types.
// `GameLocal` and `GameEditLocal` forward those calls into a game module
// resolved by the loader, and keep faults from crossing back.

pub mod api;
pub mod game_local;
pub mod interface;
pub mod loader;

pub use api::{get_game_api, publish_game_api, release_game_api, with_game_api, GameExport, GameImport};
pub use game_local::{GameEditLocal, GameLocal};
pub use interface::{GameEditInterface, GameInterface};
pub use loader::{LoadedModule, LoaderConfig, ModuleSlot, ModuleSource};
