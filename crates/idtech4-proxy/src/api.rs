// api.rs -- GetGameAPI handshake
//
// The engine hands over its subsystems once, in a `GameImport`, and gets the
// game and editor interfaces back in a `GameExport`. The module itself is
// not loaded until the engine calls `GameInterface::init`.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use idtech4_common::common::com_dprintf;
use idtech4_common::native::{
    NativeCmdSystem, NativeCollisionModelManager, NativeCommon, NativeCvarSystem,
    NativeDeclManager, NativeFileSystem, NativeLangDict, NativeMapFileSource,
    NativeNetworkSystem, NativeRenderModelManager, NativeUiManager, GAME_API_VERSION,
};
use idtech4_common::{BoundaryError, BoundaryResult};
use idtech4_game::{GameServices, GameServicesBuilder};

use crate::game_local::{GameEditLocal, GameLocal};
use crate::loader::ModuleSource;

/// Engine subsystems passed to the game.
#[derive(Clone)]
pub struct GameImport {
    pub version: i32,
    pub common: Arc<dyn NativeCommon>,
    pub cvar_system: Arc<dyn NativeCvarSystem>,
    pub cmd_system: Arc<dyn NativeCmdSystem>,
    pub file_system: Arc<dyn NativeFileSystem>,
    pub decl_manager: Arc<dyn NativeDeclManager>,
    pub ui_manager: Arc<dyn NativeUiManager>,
    pub collision_model_manager: Arc<dyn NativeCollisionModelManager>,
    pub render_model_manager: Arc<dyn NativeRenderModelManager>,
    pub network_system: Arc<dyn NativeNetworkSystem>,
    pub lang_dict: Arc<dyn NativeLangDict>,
    pub map_files: Arc<dyn NativeMapFileSource>,
}

impl GameImport {
    fn services(&self) -> BoundaryResult<Arc<GameServices>> {
        GameServicesBuilder::default()
            .common(self.common.clone())
            .cvar_system(self.cvar_system.clone())
            .cmd_system(self.cmd_system.clone())
            .file_system(self.file_system.clone())
            .decl_manager(self.decl_manager.clone())
            .ui_manager(self.ui_manager.clone())
            .collision_model_manager(self.collision_model_manager.clone())
            .render_model_manager(self.render_model_manager.clone())
            .network_system(self.network_system.clone())
            .lang_dict(self.lang_dict.clone())
            .map_files(self.map_files.clone())
            .build()
    }
}

/// Interfaces the game hands back to the engine.
pub struct GameExport {
    pub version: i32,
    pub game: GameLocal,
    pub game_edit: GameEditLocal,
}

pub fn get_game_api(import: &GameImport, source: ModuleSource) -> BoundaryResult<GameExport> {
    if import.version != GAME_API_VERSION {
        return Err(BoundaryError::ImportVersion {
            expected: GAME_API_VERSION,
            found: import.version,
        });
    }

    let services = import.services()?;
    com_dprintf(
        import.common.as_ref(),
        &format!("GetGameAPI: game module from {}\n", source.describe()),
    );

    let game = GameLocal::new(services, source);
    let game_edit = game.edit_interface();
    Ok(GameExport {
        version: GAME_API_VERSION,
        game,
        game_edit,
    })
}

// ============================================================
// Process-wide export
// ============================================================

static GAME_API: OnceLock<Mutex<Option<GameExport>>> = OnceLock::new();

fn game_api_slot() -> &'static Mutex<Option<GameExport>> {
    GAME_API.get_or_init(|| Mutex::new(None))
}

/// Run the handshake and keep the result for hosts that reach the game
/// through `with_game_api`. Replaces any earlier export.
pub fn publish_game_api(import: &GameImport, source: ModuleSource) -> BoundaryResult<()> {
    let export = get_game_api(import, source)?;
    *game_api_slot().lock() = Some(export);
    Ok(())
}

/// `None` when nothing has been published.
pub fn with_game_api<R>(f: impl FnOnce(&mut GameExport) -> R) -> Option<R> {
    game_api_slot().lock().as_mut().map(f)
}

/// Drop the published export, unloading the module with it.
pub fn release_game_api() -> Option<GameExport> {
    game_api_slot().lock().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtech4_common::host::InProcessHost;
    use idtech4_common::marshal::read_fixed;
    use idtech4_common::native::MAX_STRING_CHARS;
    use std::os::raw::c_char;

    use crate::interface::{GameEditInterface, GameInterface};

    fn import_for(host: &InProcessHost) -> GameImport {
        GameImport {
            version: GAME_API_VERSION,
            common: host.common.clone(),
            cvar_system: host.cvars.clone(),
            cmd_system: host.commands.clone(),
            file_system: host.files.clone(),
            decl_manager: host.decls.clone(),
            ui_manager: host.guis.clone(),
            collision_model_manager: host.collision.clone(),
            render_model_manager: host.models.clone(),
            network_system: host.network.clone(),
            lang_dict: host.lang.clone(),
            map_files: host.map_files.clone(),
        }
    }

    fn host(tag: &str) -> InProcessHost {
        InProcessHost::new(std::env::temp_dir().join(format!("idtech4-api-{}-{}", tag, std::process::id())))
    }

    #[test]
    fn test_version_mismatch_is_refused() {
        let host = host("version");
        let mut import = import_for(&host);
        import.version = GAME_API_VERSION - 1;
        let err = match get_game_api(&import, ModuleSource::Static(&idgame::GAME_MODULE_EXPORT)) {
            Ok(_) => panic!("expected failure"),
            Err(e) => e,
        };
        assert_eq!(
            err,
            BoundaryError::ImportVersion {
                expected: GAME_API_VERSION,
                found: GAME_API_VERSION - 1
            }
        );
        assert!(err.is_load_fault());
    }

    #[test]
    fn test_handshake_defers_loading_to_init() {
        let host = host("handshake");
        let import = import_for(&host);
        let mut export = get_game_api(&import, ModuleSource::Static(&idgame::GAME_MODULE_EXPORT)).unwrap();
        assert_eq!(export.version, GAME_API_VERSION);
        assert!(!export.game.is_loaded());

        export.game.init();
        assert!(export.game.is_loaded());
        assert!(!export.game_edit.player_is_valid());

        let mut buf = [0 as c_char; MAX_STRING_CHARS];
        export.game.get_best_game_type(c"unknown_map", c"Tourney", &mut buf);
        assert_eq!(read_fixed(&buf), "deathmatch");
    }

    #[test]
    fn test_published_export_is_reachable() {
        let host = host("publish");
        let import = import_for(&host);
        publish_game_api(&import, ModuleSource::Static(&idgame::GAME_MODULE_EXPORT)).unwrap();
        assert_eq!(with_game_api(|api| api.version), Some(GAME_API_VERSION));
        assert!(release_game_api().is_some());
        assert!(with_game_api(|api| api.version).is_none());
    }
}
