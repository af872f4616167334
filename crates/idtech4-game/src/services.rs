// services.rs -- The engine subsystems a game module may use
//
// Built once when the module is loaded and handed to `Game::init` as an
// `Arc`. Nothing in here can be swapped afterwards.

use std::sync::Arc;

use idtech4_common::host::InProcessHost;
use idtech4_common::native::{
    NativeCmdSystem, NativeCollisionModelManager, NativeCommon, NativeCvarSystem,
    NativeDeclManager, NativeFileSystem, NativeLangDict, NativeMapFileSource,
    NativeNetworkSystem, NativeRenderModelManager, NativeUiManager,
};
use idtech4_common::version::BuildInfo;
use idtech4_common::{BoundaryError, BoundaryResult};

use crate::facades::{
    CmdSystem, CollisionModelManager, Console, CvarSystem, DeclManager, FileSystem, LangDict,
    MapFiles, NetworkSystem, RenderModelManager, UiManager,
};

pub struct GameServices {
    console: Console,
    cvars: CvarSystem,
    cmds: CmdSystem,
    files: FileSystem,
    decls: DeclManager,
    uis: UiManager,
    collision: CollisionModelManager,
    models: RenderModelManager,
    network: NetworkSystem,
    lang: LangDict,
    map_files: MapFiles,
    build: BuildInfo,
}

impl GameServices {
    pub fn builder() -> GameServicesBuilder {
        GameServicesBuilder::default()
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn cvars(&self) -> &CvarSystem {
        &self.cvars
    }

    pub fn cmds(&self) -> &CmdSystem {
        &self.cmds
    }

    pub fn files(&self) -> &FileSystem {
        &self.files
    }

    pub fn decls(&self) -> &DeclManager {
        &self.decls
    }

    pub fn uis(&self) -> &UiManager {
        &self.uis
    }

    pub fn collision(&self) -> &CollisionModelManager {
        &self.collision
    }

    pub fn models(&self) -> &RenderModelManager {
        &self.models
    }

    pub fn network(&self) -> &NetworkSystem {
        &self.network
    }

    pub fn lang(&self) -> &LangDict {
        &self.lang
    }

    pub fn map_files(&self) -> &MapFiles {
        &self.map_files
    }

    pub fn build(&self) -> &BuildInfo {
        &self.build
    }
}

/// Collects the native subsystems. Every one of them is required.
#[derive(Default)]
pub struct GameServicesBuilder {
    common: Option<Arc<dyn NativeCommon>>,
    cvars: Option<Arc<dyn NativeCvarSystem>>,
    cmds: Option<Arc<dyn NativeCmdSystem>>,
    files: Option<Arc<dyn NativeFileSystem>>,
    decls: Option<Arc<dyn NativeDeclManager>>,
    uis: Option<Arc<dyn NativeUiManager>>,
    collision: Option<Arc<dyn NativeCollisionModelManager>>,
    models: Option<Arc<dyn NativeRenderModelManager>>,
    network: Option<Arc<dyn NativeNetworkSystem>>,
    lang: Option<Arc<dyn NativeLangDict>>,
    map_files: Option<Arc<dyn NativeMapFileSource>>,
    build: Option<BuildInfo>,
}

impl GameServicesBuilder {
    /// Every subsystem from an in-process host.
    pub fn in_process(host: &InProcessHost) -> Self {
        Self::default()
            .common(host.common.clone())
            .cvar_system(host.cvars.clone())
            .cmd_system(host.commands.clone())
            .file_system(host.files.clone())
            .decl_manager(host.decls.clone())
            .ui_manager(host.guis.clone())
            .collision_model_manager(host.collision.clone())
            .render_model_manager(host.models.clone())
            .network_system(host.network.clone())
            .lang_dict(host.lang.clone())
            .map_files(host.map_files.clone())
    }

    pub fn common(mut self, v: Arc<dyn NativeCommon>) -> Self {
        self.common = Some(v);
        self
    }

    pub fn cvar_system(mut self, v: Arc<dyn NativeCvarSystem>) -> Self {
        self.cvars = Some(v);
        self
    }

    pub fn cmd_system(mut self, v: Arc<dyn NativeCmdSystem>) -> Self {
        self.cmds = Some(v);
        self
    }

    pub fn file_system(mut self, v: Arc<dyn NativeFileSystem>) -> Self {
        self.files = Some(v);
        self
    }

    pub fn decl_manager(mut self, v: Arc<dyn NativeDeclManager>) -> Self {
        self.decls = Some(v);
        self
    }

    pub fn ui_manager(mut self, v: Arc<dyn NativeUiManager>) -> Self {
        self.uis = Some(v);
        self
    }

    pub fn collision_model_manager(mut self, v: Arc<dyn NativeCollisionModelManager>) -> Self {
        self.collision = Some(v);
        self
    }

    pub fn render_model_manager(mut self, v: Arc<dyn NativeRenderModelManager>) -> Self {
        self.models = Some(v);
        self
    }

    pub fn network_system(mut self, v: Arc<dyn NativeNetworkSystem>) -> Self {
        self.network = Some(v);
        self
    }

    pub fn lang_dict(mut self, v: Arc<dyn NativeLangDict>) -> Self {
        self.lang = Some(v);
        self
    }

    pub fn map_files(mut self, v: Arc<dyn NativeMapFileSource>) -> Self {
        self.map_files = Some(v);
        self
    }

    /// Defaults to `BuildInfo::current()`.
    pub fn build_info(mut self, v: BuildInfo) -> Self {
        self.build = Some(v);
        self
    }

    pub fn build(self) -> BoundaryResult<Arc<GameServices>> {
        fn need<T>(v: Option<T>, name: &'static str) -> BoundaryResult<T> {
            v.ok_or(BoundaryError::MissingService { name })
        }

        Ok(Arc::new(GameServices {
            console: Console::new(need(self.common, "common")?),
            cvars: CvarSystem::new(need(self.cvars, "cvar system")?),
            cmds: CmdSystem::new(need(self.cmds, "command system")?),
            files: FileSystem::new(need(self.files, "file system")?),
            decls: DeclManager::new(need(self.decls, "decl manager")?),
            uis: UiManager::new(need(self.uis, "ui manager")?),
            collision: CollisionModelManager::new(need(self.collision, "collision model manager")?),
            models: RenderModelManager::new(need(self.models, "render model manager")?),
            network: NetworkSystem::new(need(self.network, "network system")?),
            lang: LangDict::new(need(self.lang, "language dictionary")?),
            map_files: MapFiles::new(need(self.map_files, "map file source")?),
            build: self.build.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtech4_common::version::ENGINE_VERSION;

    #[test]
    fn test_in_process_services() {
        let root = std::env::temp_dir().join(format!("idtech4-services-{}", std::process::id()));
        let host = InProcessHost::new(&root);
        host.cvars.set("fs_game", "mymod");
        let services = GameServicesBuilder::in_process(&host).build().unwrap();
        assert_eq!(services.cvars().get_string("fs_game").unwrap(), "mymod");
        assert_eq!(services.build().engine_version, ENGINE_VERSION);
        assert!(services.models().find_model(None).unwrap().is_none());
    }

    #[test]
    fn test_missing_service_is_named() {
        let root = std::env::temp_dir().join(format!("idtech4-services-m-{}", std::process::id()));
        let host = InProcessHost::new(&root);
        let partial = GameServices::builder()
            .common(host.common.clone())
            .cvar_system(host.cvars.clone());
        let err = match partial.build() {
            Ok(_) => panic!("expected failure"),
            Err(e) => e,
        };
        assert_eq!(err, BoundaryError::MissingService { name: "command system" });
        assert!(err.is_load_fault());
    }
}
