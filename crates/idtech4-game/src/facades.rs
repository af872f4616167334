// facades.rs -- Module-side access to engine subsystems
//
// Each facade marshals its own arguments and makes a single call into the
// native subsystem. Strings with an interior NUL are rejected with
// `InteriorNul` before anything reaches the engine.

use std::sync::Arc;

use idtech4_common::bitmsg::BitMsg;
use idtech4_common::common::{com_dprintf, com_dwarning, com_error, com_printf, com_warning};
use idtech4_common::completion::{ArgCompletion, CmdArgs, CompletionRegistration};
use idtech4_common::cvar::CvarDescriptor;
use idtech4_common::lang::renumber_placeholders;
use idtech4_common::marshal::{from_native, to_native_opt, with_native, with_native2};
use idtech4_common::native::{
    DeclType, NativeCmdSystem, NativeCollisionModelManager, NativeCommon, NativeCvarSystem,
    NativeDeclManager, NativeFileSystem, NativeLangDict, NativeMapFileSource,
    NativeNetworkSystem, NativeRenderModelManager, NativeUiManager,
};
use idtech4_common::BoundaryResult;

use crate::handles::{
    Decl, DeclEntityDef, DeclSkin, FileHandle, MapFile, Material, RenderModel, UserInterface,
};

// ============================================================
// Console
// ============================================================

#[derive(Clone)]
pub struct Console {
    native: Arc<dyn NativeCommon>,
}

impl Console {
    pub fn new(native: Arc<dyn NativeCommon>) -> Self {
        Self { native }
    }

    pub fn native(&self) -> &Arc<dyn NativeCommon> {
        &self.native
    }

    pub fn write(&self, msg: &str) {
        com_printf(self.native.as_ref(), msg);
    }

    pub fn write_line(&self, msg: &str) {
        com_printf(self.native.as_ref(), &format!("{}\n", msg));
    }

    /// Developer-only output.
    pub fn dwrite(&self, msg: &str) {
        com_dprintf(self.native.as_ref(), msg);
    }

    pub fn dwrite_line(&self, msg: &str) {
        com_dprintf(self.native.as_ref(), &format!("{}\n", msg));
    }

    pub fn warning(&self, msg: &str) {
        com_warning(self.native.as_ref(), msg);
    }

    pub fn dwarning(&self, msg: &str) {
        com_dwarning(self.native.as_ref(), msg);
    }

    /// Drops the current game on the engine side.
    pub fn error(&self, msg: &str) {
        com_error(self.native.as_ref(), msg);
    }
}

// ============================================================
// Cvars and commands
// ============================================================

#[derive(Clone)]
pub struct CvarSystem {
    native: Arc<dyn NativeCvarSystem>,
}

impl CvarSystem {
    pub fn new(native: Arc<dyn NativeCvarSystem>) -> Self {
        Self { native }
    }

    pub fn get_string(&self, name: &str) -> BoundaryResult<String> {
        with_native(name, |n| from_native(&self.native.get_cvar_string(n)))
    }

    pub fn get_bool(&self, name: &str) -> BoundaryResult<bool> {
        with_native(name, |n| self.native.get_cvar_bool(n))
    }

    pub fn get_integer(&self, name: &str) -> BoundaryResult<i32> {
        with_native(name, |n| self.native.get_cvar_integer(n))
    }

    pub fn get_float(&self, name: &str) -> BoundaryResult<f32> {
        with_native(name, |n| self.native.get_cvar_float(n))
    }

    pub fn set_string(&self, name: &str, value: &str) -> BoundaryResult<()> {
        with_native2(name, value, |n, v| self.native.set_cvar_string(n, v))
    }

    pub fn set_bool(&self, name: &str, value: bool) -> BoundaryResult<()> {
        with_native(name, |n| self.native.set_cvar_bool(n, value))
    }

    pub fn set_integer(&self, name: &str, value: i32) -> BoundaryResult<()> {
        with_native(name, |n| self.native.set_cvar_integer(n, value))
    }

    pub fn set_float(&self, name: &str, value: f32) -> BoundaryResult<()> {
        with_native(name, |n| self.native.set_cvar_float(n, value))
    }

    pub fn register(&self, cvar: CvarDescriptor) {
        self.native.register(cvar);
    }
}

#[derive(Clone)]
pub struct CmdSystem {
    native: Arc<dyn NativeCmdSystem>,
}

impl CmdSystem {
    pub fn new(native: Arc<dyn NativeCmdSystem>) -> Self {
        Self { native }
    }

    /// Append text to the engine's command buffer.
    pub fn buffer_command_text(&self, text: &str) -> BoundaryResult<()> {
        with_native(text, |t| self.native.buffer_command_text(t))
    }

    pub fn execute_command_buffer(&self) {
        self.native.execute_command_buffer();
    }

    pub fn map_name_candidates(&self, line: &str) -> Vec<String> {
        ArgCompletion::MapName.candidates(&CmdArgs::tokenize(line), Some(self.native.as_ref()))
    }

    /// Wrap a completion for registration with the engine. Map-name
    /// completion is routed to this command system.
    pub fn registration(&self, completion: ArgCompletion) -> CompletionRegistration {
        CompletionRegistration::new(completion).with_cmd_system(self.native.clone())
    }
}

// ============================================================
// Declarations
// ============================================================

#[derive(Clone)]
pub struct DeclManager {
    native: Arc<dyn NativeDeclManager>,
}

impl DeclManager {
    pub fn new(native: Arc<dyn NativeDeclManager>) -> Self {
        Self { native }
    }

    pub fn decl_type_count(&self) -> i32 {
        self.native.num_decl_types()
    }

    pub fn decl_count(&self, decl_type: DeclType) -> i32 {
        self.native.num_decls(decl_type)
    }

    /// `None` for an empty name, or when the decl is missing and
    /// `make_default` is off.
    pub fn find_type(
        &self,
        decl_type: DeclType,
        name: &str,
        make_default: bool,
    ) -> BoundaryResult<Option<Decl>> {
        if name.is_empty() {
            return Ok(None);
        }
        with_native(name, |n| {
            self.native
                .find_type(decl_type, n, make_default)
                .map(Decl::new)
        })
    }

    pub fn find_material(&self, name: &str, make_default: bool) -> BoundaryResult<Option<Material>> {
        Ok(self
            .find_type(DeclType::Material, name, make_default)?
            .map(Material))
    }

    pub fn find_skin(&self, name: &str, make_default: bool) -> BoundaryResult<Option<DeclSkin>> {
        Ok(self.find_type(DeclType::Skin, name, make_default)?.map(DeclSkin))
    }

    pub fn find_entity_def(
        &self,
        name: &str,
        make_default: bool,
    ) -> BoundaryResult<Option<DeclEntityDef>> {
        Ok(self
            .find_type(DeclType::EntityDef, name, make_default)?
            .map(DeclEntityDef::new))
    }

    pub fn decl_by_index(&self, decl_type: DeclType, index: i32, force_parse: bool) -> Option<Decl> {
        self.native
            .decl_by_index(decl_type, index, force_parse)
            .map(Decl::new)
    }

    pub fn register_decl_folder(
        &self,
        folder: &str,
        extension: &str,
        default_type: DeclType,
    ) -> BoundaryResult<()> {
        with_native2(folder, extension, |f, e| {
            self.native.register_decl_folder(f, e, default_type)
        })
    }

    /// Print one line of the media list.
    pub fn media_print(&self, msg: &str) -> BoundaryResult<()> {
        with_native(&format!("{}\n", msg), |m| self.native.media_print(m))
    }
}

// ============================================================
// Files
// ============================================================

#[derive(Clone)]
pub struct FileSystem {
    native: Arc<dyn NativeFileSystem>,
}

impl FileSystem {
    pub fn new(native: Arc<dyn NativeFileSystem>) -> Self {
        Self { native }
    }

    /// Open for reading. A `None` game dir searches the default path.
    pub fn open_file_read(
        &self,
        relative_path: &str,
        allow_copy_files: bool,
        game_dir: Option<&str>,
    ) -> BoundaryResult<Option<FileHandle>> {
        let game_dir = to_native_opt(game_dir)?;
        with_native(relative_path, |p| {
            self.native
                .open_file_read(p, allow_copy_files, game_dir.as_deref())
                .map(FileHandle::from_owned)
        })
    }

    /// Hand the file back to the engine. Closing twice, or closing a file
    /// the engine owns, does nothing.
    pub fn close_file(&self, file: &mut FileHandle) {
        if let Some(native) = file.release() {
            self.native.close_file(native);
        }
    }
}

// ============================================================
// User interfaces
// ============================================================

#[derive(Clone)]
pub struct UiManager {
    native: Arc<dyn NativeUiManager>,
}

impl UiManager {
    pub fn new(native: Arc<dyn NativeUiManager>) -> Self {
        Self { native }
    }

    pub fn alloc(&self) -> Option<UserInterface> {
        self.native.alloc().map(UserInterface::new)
    }

    pub fn dealloc(&self, gui: UserInterface) {
        self.native.dealloc(gui.native());
    }

    /// The engine defaults are `auto_load = true`, `need_unique = false`,
    /// `force_unique = false`; see `find_gui_default`.
    pub fn find_gui(
        &self,
        qpath: &str,
        auto_load: bool,
        need_unique: bool,
        force_unique: bool,
    ) -> BoundaryResult<Option<UserInterface>> {
        with_native(qpath, |q| {
            self.native
                .find_gui(q, auto_load, need_unique, force_unique)
                .map(UserInterface::new)
        })
    }

    pub fn find_gui_default(&self, qpath: &str) -> BoundaryResult<Option<UserInterface>> {
        self.find_gui(qpath, true, false, false)
    }
}

// ============================================================
// Models, collision, maps
// ============================================================

#[derive(Clone)]
pub struct RenderModelManager {
    native: Arc<dyn NativeRenderModelManager>,
}

impl RenderModelManager {
    pub fn new(native: Arc<dyn NativeRenderModelManager>) -> Self {
        Self { native }
    }

    /// `None` or an empty name never reaches the engine.
    pub fn find_model(&self, name: Option<&str>) -> BoundaryResult<Option<RenderModel>> {
        match name {
            None | Some("") => Ok(None),
            Some(name) => with_native(name, |n| self.native.find_model(n).map(RenderModel::new)),
        }
    }
}

#[derive(Clone)]
pub struct CollisionModelManager {
    native: Arc<dyn NativeCollisionModelManager>,
}

impl CollisionModelManager {
    pub fn new(native: Arc<dyn NativeCollisionModelManager>) -> Self {
        Self { native }
    }

    pub fn load_map(&self, map: &MapFile) -> BoundaryResult<()> {
        self.native.load_map(map.native()?);
        Ok(())
    }

    /// Collision model handle for `name`.
    pub fn load_model(&self, name: &str, precache: bool) -> BoundaryResult<i32> {
        with_native(name, |n| self.native.load_model(n, precache))
    }
}

#[derive(Clone)]
pub struct MapFiles {
    native: Arc<dyn NativeMapFileSource>,
}

impl MapFiles {
    pub fn new(native: Arc<dyn NativeMapFileSource>) -> Self {
        Self { native }
    }

    /// A fresh, empty map file owned by the caller.
    pub fn alloc(&self) -> MapFile {
        MapFile::new(self.native.as_ref())
    }

    /// Allocate and parse in one step. `None` when parsing fails.
    pub fn load(&self, name: &str) -> BoundaryResult<Option<MapFile>> {
        let mut map = self.alloc();
        Ok(map.parse(name, false, false)?.then_some(map))
    }
}

// ============================================================
// Network and localization
// ============================================================

#[derive(Clone)]
pub struct NetworkSystem {
    native: Arc<dyn NativeNetworkSystem>,
}

impl NetworkSystem {
    pub fn new(native: Arc<dyn NativeNetworkSystem>) -> Self {
        Self { native }
    }

    pub fn server_send_reliable_message(&self, client: i32, msg: &BitMsg) {
        self.native.server_send_reliable_message(client, msg);
    }

    pub fn client_send_reliable_message(&self, msg: &BitMsg) {
        self.native.client_send_reliable_message(msg);
    }

    /// Ping in milliseconds, -1 when unknown.
    pub fn server_get_client_ping(&self, client: i32) -> i32 {
        self.native.server_get_client_ping(client)
    }
}

#[derive(Clone)]
pub struct LangDict {
    native: Arc<dyn NativeLangDict>,
}

impl LangDict {
    pub fn new(native: Arc<dyn NativeLangDict>) -> Self {
        Self { native }
    }

    /// The localized string with `%s`/`%d`/`%x` turned into `{0}`, `{1}`, ...
    pub fn get_string(&self, key: &str) -> BoundaryResult<String> {
        with_native(key, |k| {
            renumber_placeholders(&from_native(&self.native.get_string(k)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtech4_common::cvar::{CvarFlags, CvarTable};
    use idtech4_common::dict::Dict;
    use idtech4_common::host::InProcessHost;
    use idtech4_common::lang::LangTable;
    use idtech4_common::BoundaryError;
    use std::path::PathBuf;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("idtech4-facades-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("base/maps")).unwrap();
        root
    }

    #[test]
    fn test_cvar_facade() {
        let table = Arc::new(CvarTable::new());
        let cvars = CvarSystem::new(table.clone());
        cvars.register(
            CvarDescriptor::new("g_gravity", "1066", "gravity", CvarFlags::GAME | CvarFlags::FLOAT)
                .unwrap(),
        );
        assert_eq!(cvars.get_float("g_gravity").unwrap(), 1066.0);
        cvars.set_integer("g_gravity", 800).unwrap();
        assert_eq!(cvars.get_string("g_gravity").unwrap(), "800");
        cvars.set_bool("g_nightmare", true).unwrap();
        assert!(cvars.get_bool("g_nightmare").unwrap());
        assert_eq!(
            cvars.set_string("g_\0x", "1").unwrap_err(),
            BoundaryError::InteriorNul { position: 2 }
        );
        assert!(!table.contains("g_"));
    }

    #[test]
    fn test_decl_lookups() {
        let host = InProcessHost::new(temp_root("decls"));
        let mut args = Dict::new();
        args.set("model", "models/monsters/imp.md5mesh");
        host.decls.define_entity("monster_demon_imp", args);
        host.decls.define(DeclType::Skin, "skins/imp/red");

        let decls = DeclManager::new(host.decls.clone());
        let def = decls.find_entity_def("monster_demon_imp", false).unwrap().unwrap();
        assert_eq!(def.dict().get_string("model", ""), "models/monsters/imp.md5mesh");
        assert!(decls.find_skin("skins/imp/red", false).unwrap().is_some());
        assert!(decls.find_material("textures/missing", false).unwrap().is_none());

        let implicit = decls.find_material("textures/missing", true).unwrap().unwrap();
        assert!(implicit.0.is_implicit());
        assert!(decls.find_type(DeclType::Table, "", true).unwrap().is_none());
        assert_eq!(decls.decl_count(DeclType::Material), 1);
        assert_eq!(
            decls.decl_by_index(DeclType::Skin, 0, false).unwrap().name(),
            "skins/imp/red"
        );

        decls.media_print("imp").unwrap();
        assert_eq!(host.decls.media_lines(), vec!["imp\n".to_string()]);
        decls.register_decl_folder("def", ".def", DeclType::EntityDef).unwrap();
        assert_eq!(host.decls.folders()[0].0, "def");
    }

    #[test]
    fn test_file_open_and_close() {
        let root = temp_root("files");
        std::fs::write(root.join("base/readme.txt"), "hello").unwrap();
        let host = InProcessHost::new(&root);
        let fs = FileSystem::new(host.files.clone());

        let mut file = fs.open_file_read("readme.txt", true, None).unwrap().unwrap();
        assert_eq!(host.files.open_file_count(), 1);
        assert_eq!(file.read_to_end().unwrap(), b"hello");
        fs.close_file(&mut file);
        fs.close_file(&mut file);
        assert_eq!(host.files.open_file_count(), 0);
        assert!(file.is_closed());

        assert!(fs.open_file_read("missing.txt", true, None).unwrap().is_none());
        assert!(fs.open_file_read("readme.txt", true, Some("othermod")).unwrap().is_none());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_model_lookup_skips_empty_names() {
        let host = InProcessHost::new(temp_root("models"));
        host.models.define("models/mapobjects/chair.lwo");
        let models = RenderModelManager::new(host.models.clone());
        assert!(models.find_model(None).unwrap().is_none());
        assert!(models.find_model(Some("")).unwrap().is_none());
        let chair = models.find_model(Some("models/mapobjects/chair.lwo")).unwrap().unwrap();
        assert!(!chair.is_default_model());
        let missing = models.find_model(Some("models/none.lwo")).unwrap().unwrap();
        assert!(missing.is_default_model());
    }

    #[test]
    fn test_lang_renumbers_placeholders() {
        let mut lang = LangTable::new();
        lang.insert("#str_02048", "%s killed %s with %d shots");
        let dict = LangDict::new(Arc::new(lang));
        assert_eq!(dict.get_string("#str_02048").unwrap(), "{0} killed {1} with {2} shots");
        assert_eq!(dict.get_string("#str_missing").unwrap(), "#str_missing");
    }

    #[test]
    fn test_gui_lookup() {
        let host = InProcessHost::new(temp_root("guis"));
        let uis = UiManager::new(host.guis.clone());
        let a = uis.find_gui_default("guis/mainmenu.gui").unwrap().unwrap();
        let b = uis.find_gui_default("guis/mainmenu.gui").unwrap().unwrap();
        assert!(a.same_as(&b));
        let unique = uis.find_gui("guis/mainmenu.gui", true, true, false).unwrap().unwrap();
        assert!(!unique.same_as(&a));
        assert!(uis.find_gui("guis/none.gui", false, false, false).unwrap().is_none());

        let scratch = uis.alloc().unwrap();
        let live = host.guis.live_count();
        uis.dealloc(scratch);
        assert_eq!(host.guis.live_count(), live - 1);
    }

    #[test]
    fn test_collision_and_maps() {
        let root = temp_root("maps");
        std::fs::write(root.join("base/maps/box.map"), "{\n\"classname\" \"worldspawn\"\n}\n").unwrap();
        let host = InProcessHost::new(&root);
        let maps = MapFiles::new(host.map_files.clone());
        let cm = CollisionModelManager::new(host.collision.clone());

        let map = maps.load("maps/box").unwrap().unwrap();
        cm.load_map(&map).unwrap();
        assert_eq!(host.collision.loaded_maps(), vec!["maps/box.map".to_string()]);
        assert!(maps.load("maps/missing").unwrap().is_none());

        assert_eq!(cm.load_model("models/a.lwo", true).unwrap(), 0);
        assert_eq!(cm.load_model("models/b.lwo", true).unwrap(), 1);
        assert_eq!(cm.load_model("models/a.lwo", false).unwrap(), 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_commands_and_network() {
        let host = InProcessHost::new(temp_root("cmds"));
        host.commands.set_maps(&["game/mp/d3dm1"]);
        let cmds = CmdSystem::new(host.commands.clone());
        cmds.buffer_command_text("map game/mp/d3dm1; si_pure 0\n").unwrap();
        cmds.execute_command_buffer();
        assert_eq!(host.commands.executed(), vec!["map game/mp/d3dm1", "si_pure 0"]);
        assert_eq!(cmds.map_name_candidates("map"), vec!["map game/mp/d3dm1"]);

        let net = NetworkSystem::new(host.network.clone());
        let mut msg = BitMsg::init_game();
        msg.write_byte(7);
        net.server_send_reliable_message(2, &msg);
        assert_eq!(host.network.take_server_messages(), vec![(2, vec![7u8])]);
        assert_eq!(net.server_get_client_ping(2), -1);
        host.network.set_ping(2, 45);
        assert_eq!(net.server_get_client_ping(2), 45);
    }
}
