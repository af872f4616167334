// module.rs -- Exported factory convention for game modules
//
// A game module exports one C symbol, `idtech4_game_entry`, returning a
// pointer to a static `GameModuleExport`. The export names the API version
// and the type the module provides, and carries factories for the game and
// (optionally) the editor interface. Instances cross as thin pointers to a
// boxed trait object.

use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use idtech4_common::scoped_ptr::ScopedPtr;

use crate::game::{Game, GameEdit};

pub use idtech4_common::native::GAME_API_VERSION;

/// Symbol every game module exports.
pub const GAME_ENTRY_SYMBOL: &str = "idtech4_game_entry";

/// Type a module must provide to be accepted as the game.
pub const GAME_TYPE_NAME: &str = "idTech4.Game.idGameLocal";

/// Opaque owner of a game instance created by a module.
pub struct GameModuleHandle {
    game: Box<dyn Game>,
}

/// Opaque owner of an editor instance created by a module.
pub struct GameEditModuleHandle {
    edit: Box<dyn GameEdit>,
}

pub type GameCreateFn = unsafe extern "C" fn() -> *mut GameModuleHandle;
pub type GameEditCreateFn = unsafe extern "C" fn() -> *mut GameEditModuleHandle;
pub type GameModuleEntryFn = unsafe extern "C" fn() -> *const GameModuleExport;

#[repr(C)]
pub struct GameModuleExport {
    pub api_version: i32,
    /// NUL-terminated, static.
    pub type_name: *const c_char,
    pub create: GameCreateFn,
    pub create_edit: Option<GameEditCreateFn>,
}

// The export is immutable static data.
unsafe impl Sync for GameModuleExport {}

impl GameModuleExport {
    pub fn type_name(&self) -> String {
        if self.type_name.is_null() {
            return String::new();
        }
        // SAFETY: modules point `type_name` at a static C string.
        unsafe { CStr::from_ptr(self.type_name) }
            .to_string_lossy()
            .into_owned()
    }
}

impl GameModuleHandle {
    pub fn into_raw(game: Box<dyn Game>) -> *mut GameModuleHandle {
        Box::into_raw(Box::new(GameModuleHandle { game }))
    }

    /// Take ownership of an instance returned by a module factory.
    ///
    /// # Safety
    /// `raw` must be null or come from `GameModuleHandle::into_raw`, and must
    /// not be used again afterwards.
    pub unsafe fn from_raw(raw: *mut GameModuleHandle) -> Option<Box<dyn Game>> {
        let mut owner = ScopedPtr::new();
        owner.reset_raw(raw);
        owner.release().map(|handle| handle.game)
    }
}

impl GameEditModuleHandle {
    pub fn into_raw(edit: Box<dyn GameEdit>) -> *mut GameEditModuleHandle {
        Box::into_raw(Box::new(GameEditModuleHandle { edit }))
    }

    /// # Safety
    /// Same contract as `GameModuleHandle::from_raw`.
    pub unsafe fn from_raw(raw: *mut GameEditModuleHandle) -> Option<Box<dyn GameEdit>> {
        let mut owner = ScopedPtr::new();
        owner.reset_raw(raw);
        owner.release().map(|handle| handle.edit)
    }
}

/// Run a game constructor for a module factory. A panic yields null
/// instead of unwinding into the host.
pub fn new_game_instance<G: Game + 'static>(create: impl FnOnce() -> G) -> *mut GameModuleHandle {
    match catch_unwind(AssertUnwindSafe(create)) {
        Ok(game) => GameModuleHandle::into_raw(Box::new(game)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Editor counterpart of `new_game_instance`.
pub fn new_edit_instance<E: GameEdit + 'static>(create: impl FnOnce() -> E) -> *mut GameEditModuleHandle {
    match catch_unwind(AssertUnwindSafe(create)) {
        Ok(edit) => GameEditModuleHandle::into_raw(Box::new(edit)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Export a game module.
///
/// ```ignore
/// declare_game_module!(MyGame::new);
/// declare_game_module!(MyGame::new, MyEditor::new);
/// ```
///
/// Emits the `idtech4_game_entry` symbol and a `GAME_MODULE_EXPORT` static
/// that hosts linking the module statically can hand to the loader.
#[macro_export]
macro_rules! declare_game_module {
    (@emit $create:expr, $edit:expr) => {
        unsafe extern "C" fn __idtech4_create_game() -> *mut $crate::module::GameModuleHandle {
            $crate::module::new_game_instance(|| ($create)())
        }

        pub static GAME_MODULE_EXPORT: $crate::module::GameModuleExport =
            $crate::module::GameModuleExport {
                api_version: $crate::module::GAME_API_VERSION,
                type_name: c"idTech4.Game.idGameLocal".as_ptr(),
                create: __idtech4_create_game,
                create_edit: $edit,
            };

        #[no_mangle]
        pub extern "C" fn idtech4_game_entry() -> *const $crate::module::GameModuleExport {
            &GAME_MODULE_EXPORT
        }
    };
    ($create:expr) => {
        $crate::declare_game_module!(@emit $create, None);
    };
    ($create:expr, $create_edit:expr) => {
        $crate::declare_game_module!(@emit $create, {
            unsafe extern "C" fn __idtech4_create_edit() -> *mut $crate::module::GameEditModuleHandle {
                $crate::module::new_edit_instance(|| ($create_edit)())
            }
            Some(__idtech4_create_edit as $crate::module::GameEditCreateFn)
        });
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameReturn, UserCommand};
    use crate::handles::{RenderWorld, SoundWorld, UserInterface};
    use crate::services::GameServices;
    use idtech4_common::dict::Dict;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        frames: i32,
    }

    impl Game for Counter {
        fn init(&mut self, _services: Arc<GameServices>) {}
        fn init_from_new_map(
            &mut self,
            _map_name: &str,
            _render_world: Option<RenderWorld>,
            _sound_world: Option<SoundWorld>,
            _is_server: bool,
            _is_client: bool,
            _random_seed: i32,
        ) {
        }
        fn run_frame(&mut self, _cmds: &[UserCommand]) -> GameReturn {
            self.frames += 1;
            GameReturn {
                health: self.frames,
                ..GameReturn::default()
            }
        }
        fn draw(&mut self, _client: i32) -> bool {
            true
        }
        fn cache_dictionary_media(&mut self, _dict: &Dict) {}
        fn handle_main_menu_commands(&mut self, _command: &str, _gui: Option<UserInterface>) {}
        fn get_map_loading_gui(&mut self, default_gui: &str) -> String {
            default_gui.to_string()
        }
        fn get_best_game_type(&mut self, _map: &str, game_type: &str) -> String {
            game_type.to_string()
        }
        fn set_local_client(&mut self, _client: i32) {}
        fn set_server_info(&mut self, _server_info: &Dict) {}
        fn set_user_info(&mut self, _client: i32, _info: &Dict, _is_client: bool, _can_modify: bool) -> Option<Dict> {
            None
        }
        fn server_client_connect(&mut self, _client: i32, _guid: &str) {}
        fn server_client_begin(&mut self, _client: i32) {}
    }

    struct Editor;
    impl GameEdit for Editor {
        fn player_is_valid(&mut self) -> Option<bool> {
            Some(true)
        }
    }

    mod exported {
        use super::{Counter, Editor};
        crate::declare_game_module!(Counter::default, || Editor);
    }

    #[test]
    fn test_export_describes_module() {
        let export = unsafe { &*exported::idtech4_game_entry() };
        assert_eq!(export.api_version, GAME_API_VERSION);
        assert_eq!(export.type_name(), GAME_TYPE_NAME);
        assert!(export.create_edit.is_some());
    }

    #[test]
    fn test_factory_round_trip() {
        let export = &exported::GAME_MODULE_EXPORT;
        let mut game = unsafe { GameModuleHandle::from_raw((export.create)()) }.unwrap();
        assert_eq!(game.run_frame(&[]).health, 1);
        assert_eq!(game.run_frame(&[]).health, 2);

        let create_edit = export.create_edit.unwrap();
        let mut edit = unsafe { GameEditModuleHandle::from_raw(create_edit()) }.unwrap();
        assert_eq!(edit.player_is_valid(), Some(true));
        assert!(edit.trigger_selected().is_none());

        assert!(unsafe { GameModuleHandle::from_raw(std::ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_panicking_constructors_yield_null() {
        let edit = new_edit_instance(|| -> Editor { panic!("editor refused to start") });
        assert!(edit.is_null());
        assert!(unsafe { GameEditModuleHandle::from_raw(edit) }.is_none());

        let game = new_game_instance(|| -> Counter { panic!("game refused to start") });
        assert!(game.is_null());

        let game = new_game_instance(Counter::default);
        assert!(unsafe { GameModuleHandle::from_raw(game) }.is_some());
    }
}
