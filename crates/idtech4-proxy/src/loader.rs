// loader.rs -- Game module resolution
//
// Finds the game module under the mod directory, resolves its exported
// factory, checks the API version and the type it provides, and keeps the
// library mapped for as long as anything it created is alive. A module can
// also be linked in statically and registered by its export.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};

use idtech4_common::common::{com_dprintf, com_printf};
use idtech4_common::marshal::from_native;
use idtech4_common::native::{NativeCommon, NativeCvarSystem, GAME_API_VERSION};
use idtech4_common::{BoundaryError, BoundaryResult};
use idtech4_game::module::{
    GameEditModuleHandle, GameModuleEntryFn, GameModuleExport, GameModuleHandle,
    GAME_ENTRY_SYMBOL, GAME_TYPE_NAME,
};
use idtech4_game::{Game, GameEdit, GameServices};

pub const BASE_GAME_DIR: &str = "base";
pub const DEFAULT_LIBRARY_STEM: &str = "idgame";

/// Where to look for the game module and what it must export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub base_path: PathBuf,
    pub mod_dir: String,
    pub library_stem: String,
    pub entry_symbol: String,
    pub type_name: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new(BASE_GAME_DIR)
    }
}

impl LoaderConfig {
    pub fn new(mod_dir: &str) -> Self {
        Self {
            base_path: PathBuf::from("."),
            mod_dir: mod_dir.to_string(),
            library_stem: DEFAULT_LIBRARY_STEM.to_string(),
            entry_symbol: GAME_ENTRY_SYMBOL.to_string(),
            type_name: GAME_TYPE_NAME.to_string(),
        }
    }

    /// Mod directory from `fs_game` (empty selects `base`), base path from
    /// `fs_basepath` (empty selects the working directory).
    pub fn from_cvars(cvars: &dyn NativeCvarSystem) -> Self {
        let mod_dir = from_native(&cvars.get_cvar_string(c"fs_game"));
        let base_path = from_native(&cvars.get_cvar_string(c"fs_basepath"));

        let mut config = Self::new(if mod_dir.is_empty() { BASE_GAME_DIR } else { &mod_dir });
        if !base_path.is_empty() {
            config.base_path = PathBuf::from(base_path);
        }
        config
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// `idgame.dll`, `libidgame.so` or `libidgame.dylib`.
    pub fn library_file_name(&self) -> String {
        format!("{}{}{}", DLL_PREFIX, self.library_stem, DLL_SUFFIX)
    }

    pub fn library_path(&self) -> PathBuf {
        self.base_path.join(&self.mod_dir).join(self.library_file_name())
    }
}

/// How the game module is provided.
#[derive(Clone)]
pub enum ModuleSource {
    /// A shared library resolved at startup.
    Dynamic(LoaderConfig),
    /// A module linked into the host, registered by its export.
    Static(&'static GameModuleExport),
}

impl ModuleSource {
    pub fn describe(&self) -> String {
        match self {
            ModuleSource::Dynamic(config) => config.library_path().display().to_string(),
            ModuleSource::Static(_) => "<static>".to_string(),
        }
    }
}

// ============================================================
// Loaded module
// ============================================================

/// A game instance, its optional editor, and the library they came from.
pub struct LoadedModule {
    // Instances are declared before the library so they are dropped first.
    game: Box<dyn Game>,
    edit: Option<Box<dyn GameEdit>>,
    path: String,
    type_name: String,
    api_version: i32,
    _library: Option<Library>,
}

impl LoadedModule {
    pub fn game(&mut self) -> &mut dyn Game {
        self.game.as_mut()
    }

    pub fn edit(&mut self) -> Option<&mut dyn GameEdit> {
        match self.edit.as_mut() {
            Some(edit) => Some(edit.as_mut()),
            None => None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn api_version(&self) -> i32 {
        self.api_version
    }

    pub fn is_dynamic(&self) -> bool {
        self._library.is_some()
    }
}

/// Check an export and create the instances it describes.
fn instantiate(
    export: &GameModuleExport,
    path: &str,
    expected_type: &str,
    library: Option<Library>,
) -> BoundaryResult<LoadedModule> {
    if export.api_version != GAME_API_VERSION {
        return Err(BoundaryError::ApiVersion {
            path: path.to_string(),
            expected: GAME_API_VERSION,
            found: export.api_version,
        });
    }

    let type_name = export.type_name();
    if type_name != expected_type {
        return Err(BoundaryError::TypeNotFound {
            path: path.to_string(),
            expected: expected_type.to_string(),
            found: type_name,
        });
    }

    // SAFETY: the factories come from a checked export and hand back
    // pointers made by `into_raw`, or null.
    let game = unsafe { GameModuleHandle::from_raw((export.create)()) }.ok_or_else(|| {
        BoundaryError::NullInstance {
            path: path.to_string(),
        }
    })?;
    let edit = match export.create_edit {
        Some(create_edit) => unsafe { GameEditModuleHandle::from_raw(create_edit()) },
        None => None,
    };

    Ok(LoadedModule {
        game,
        edit,
        path: path.to_string(),
        type_name,
        api_version: export.api_version,
        _library: library,
    })
}

fn load_library(config: &LoaderConfig, path: &Path) -> BoundaryResult<LoadedModule> {
    let display = path.display().to_string();

    if !path.exists() {
        return Err(BoundaryError::ModuleNotFound { path: display });
    }

    // SAFETY: loading runs the library's initializers; the game module is
    // trusted code from the mod directory.
    let library = unsafe { Library::new(path) }.map_err(|e| BoundaryError::ModuleOpen {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    let export = {
        // SAFETY: the symbol is declared by `declare_game_module!` with this
        // exact signature.
        let entry: Symbol<GameModuleEntryFn> = unsafe { library.get(config.entry_symbol.as_bytes()) }
            .map_err(|_| BoundaryError::EntryPointMissing {
                path: display.clone(),
                symbol: config.entry_symbol.clone(),
            })?;
        unsafe { entry() }
    };

    if export.is_null() {
        return Err(BoundaryError::TypeNotFound {
            path: display,
            expected: config.type_name.clone(),
            found: String::new(),
        });
    }

    // SAFETY: the export is static data of the library, and the library is
    // moved into the module it describes.
    let export = unsafe { &*export };
    instantiate(export, &display, &config.type_name, Some(library))
}

/// Resolve `source` and create its instances. Nothing is initialized yet.
pub fn load_module(source: &ModuleSource, common: &dyn NativeCommon) -> BoundaryResult<LoadedModule> {
    com_dprintf(
        common,
        &format!("Attempting to load game module '{}'...\n", source.describe()),
    );

    let module = match source {
        ModuleSource::Dynamic(config) => load_library(config, &config.library_path())?,
        ModuleSource::Static(export) => instantiate(export, "<static>", GAME_TYPE_NAME, None)?,
    };

    com_printf(
        common,
        &format!(
            "Loaded game module '{}': {} (API version {})\n",
            module.path, module.type_name, module.api_version
        ),
    );
    Ok(module)
}

// ============================================================
// Module slot
// ============================================================

/// Holds the one game module of the session.
#[derive(Default)]
pub struct ModuleSlot {
    module: Option<LoadedModule>,
}

impl ModuleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the module and initialize it once with `services`.
    ///
    /// A second load fails with `AlreadyLoaded` and leaves the current
    /// module untouched.
    pub fn load(&mut self, source: &ModuleSource, services: &Arc<GameServices>) -> BoundaryResult<&mut LoadedModule> {
        if self.module.is_some() {
            return Err(BoundaryError::AlreadyLoaded);
        }

        let mut module = load_module(source, services.console().native().as_ref())?;
        module.game.init(Arc::clone(services));
        Ok(self.module.insert(module))
    }

    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    pub fn module(&mut self) -> BoundaryResult<&mut LoadedModule> {
        self.module.as_mut().ok_or(BoundaryError::NotLoaded)
    }

    pub fn game(&mut self) -> BoundaryResult<&mut dyn Game> {
        Ok(self.module()?.game())
    }

    /// `Ok(None)` when the module has no editor interface.
    pub fn edit(&mut self) -> BoundaryResult<Option<&mut dyn GameEdit>> {
        Ok(self.module()?.edit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtech4_common::host::InProcessHost;
    use idtech4_game::GameServicesBuilder;

    fn services(tag: &str) -> (InProcessHost, Arc<GameServices>) {
        let root = std::env::temp_dir().join(format!("idtech4-loader-{}-{}", tag, std::process::id()));
        let host = InProcessHost::new(&root);
        let services = GameServicesBuilder::in_process(&host).build().unwrap();
        (host, services)
    }

    #[test]
    fn test_config_from_cvars() {
        let (host, _) = services("cfg");
        let config = LoaderConfig::from_cvars(host.cvars.as_ref());
        assert_eq!(config.mod_dir, "base");
        assert_eq!(config.base_path, PathBuf::from("."));

        host.cvars.set("fs_game", "mymod");
        host.cvars.set("fs_basepath", "/opt/doom");
        let config = LoaderConfig::from_cvars(host.cvars.as_ref());
        assert_eq!(config.mod_dir, "mymod");
        assert_eq!(
            config.library_path(),
            Path::new("/opt/doom/mymod").join(config.library_file_name())
        );
        assert_eq!(config.entry_symbol, GAME_ENTRY_SYMBOL);
        assert_eq!(config.type_name, GAME_TYPE_NAME);
    }

    #[test]
    fn test_library_file_name_follows_platform() {
        let name = LoaderConfig::default().library_file_name();
        if cfg!(windows) {
            assert_eq!(name, "idgame.dll");
        } else if cfg!(target_os = "macos") {
            assert_eq!(name, "libidgame.dylib");
        } else {
            assert_eq!(name, "libidgame.so");
        }
    }

    #[test]
    fn test_missing_library_is_diagnosed() {
        let (host, services) = services("missing");
        let config = LoaderConfig::new("nomod").with_base_path(host.files.base_path());
        let mut slot = ModuleSlot::new();
        let err = match slot.load(&ModuleSource::Dynamic(config.clone()), &services) {
            Ok(_) => panic!("load should fail"),
            Err(e) => e,
        };
        assert_eq!(
            err,
            BoundaryError::ModuleNotFound {
                path: config.library_path().display().to_string()
            }
        );
        assert!(err.is_load_fault());
        assert!(!slot.is_loaded());
        assert_eq!(slot.game().err(), Some(BoundaryError::NotLoaded));
    }

    #[test]
    fn test_unloadable_library_is_diagnosed() {
        let (host, services) = services("garbage");
        let config = LoaderConfig::new("junk").with_base_path(host.files.base_path());
        std::fs::create_dir_all(config.library_path().parent().unwrap()).unwrap();
        std::fs::write(config.library_path(), b"not a shared library").unwrap();

        let mut slot = ModuleSlot::new();
        match slot.load(&ModuleSource::Dynamic(config), &services) {
            Err(BoundaryError::ModuleOpen { .. }) => {}
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_static_module_loads_once() {
        let (_host, services) = services("static");
        let source = ModuleSource::Static(&idgame::GAME_MODULE_EXPORT);
        let mut slot = ModuleSlot::new();

        let module = slot.load(&source, &services).unwrap();
        assert_eq!(module.type_name(), GAME_TYPE_NAME);
        assert_eq!(module.api_version(), GAME_API_VERSION);
        assert!(!module.is_dynamic());
        assert!(!module.game().draw(0));

        assert_eq!(slot.load(&source, &services).err(), Some(BoundaryError::AlreadyLoaded));
        assert!(slot.is_loaded());
    }

    mod wrong_version {
        use super::*;
        use idtech4_game::module::GameCreateFn;

        unsafe extern "C" fn never() -> *mut GameModuleHandle {
            std::ptr::null_mut()
        }

        pub static OLD: GameModuleExport = GameModuleExport {
            api_version: GAME_API_VERSION - 1,
            type_name: c"idTech4.Game.idGameLocal".as_ptr(),
            create: never as GameCreateFn,
            create_edit: None,
        };

        pub static OTHER_TYPE: GameModuleExport = GameModuleExport {
            api_version: GAME_API_VERSION,
            type_name: c"Mod.Game".as_ptr(),
            create: never as GameCreateFn,
            create_edit: None,
        };

        pub static NULL_INSTANCE: GameModuleExport = GameModuleExport {
            api_version: GAME_API_VERSION,
            type_name: c"idTech4.Game.idGameLocal".as_ptr(),
            create: never as GameCreateFn,
            create_edit: None,
        };
    }

    #[test]
    fn test_bad_exports_fail_fast() {
        let (_host, services) = services("bad");
        let mut slot = ModuleSlot::new();

        let err = slot.load(&ModuleSource::Static(&wrong_version::OLD), &services).err();
        assert_eq!(
            err,
            Some(BoundaryError::ApiVersion {
                path: "<static>".to_string(),
                expected: GAME_API_VERSION,
                found: GAME_API_VERSION - 1,
            })
        );

        let err = slot.load(&ModuleSource::Static(&wrong_version::OTHER_TYPE), &services).err();
        assert_eq!(
            err,
            Some(BoundaryError::TypeNotFound {
                path: "<static>".to_string(),
                expected: GAME_TYPE_NAME.to_string(),
                found: "Mod.Game".to_string(),
            })
        );

        let err = slot.load(&ModuleSource::Static(&wrong_version::NULL_INSTANCE), &services).err();
        assert_eq!(
            err,
            Some(BoundaryError::NullInstance {
                path: "<static>".to_string()
            })
        );
        assert!(!slot.is_loaded());
    }
}
