// host.rs -- In-process engine subsystems
//
// Small implementations of the native subsystem traits for hosts that run a
// game module without the full engine (tools, dedicated test harnesses).
// Objects handed out as `NativeRef`s are boxed and never removed, so their
// addresses stay valid for the lifetime of the owning table.

use std::ffi::{CStr, CString};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;

use crate::bitmsg::BitMsg;
use crate::common::{com_dprintf, StdCommon};
use crate::completion::CmdArgs;
use crate::cvar::CvarTable;
use crate::dict::Dict;
use crate::lang::LangTable;
use crate::mapfile::HostMapSource;
use crate::marshal::{from_native, to_native_lossy};
use crate::native::*;

fn native_string(s: &str) -> CString {
    to_native_lossy(s)
}

// ============================================================
// File system
// ============================================================

/// A file read fully into memory.
pub struct MemoryFile {
    name: String,
    full_path: String,
    data: Vec<u8>,
    timestamp: u32,
    pos: AtomicUsize,
}

impl MemoryFile {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            full_path: name.to_string(),
            data,
            timestamp: 0,
            pos: AtomicUsize::new(0),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl NativeFile for MemoryFile {
    fn name(&self) -> CString {
        native_string(&self.name)
    }

    fn full_path(&self) -> CString {
        native_string(&self.full_path)
    }

    fn length(&self) -> i32 {
        self.data.len() as i32
    }

    fn timestamp(&self) -> u32 {
        self.timestamp
    }

    fn read(&self, buf: &mut [u8]) -> i32 {
        let pos = self.pos.load(Ordering::Relaxed);
        let n = buf.len().min(self.data.len().saturating_sub(pos));
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        self.pos.store(pos + n, Ordering::Relaxed);
        n as i32
    }
}

/// Directory-tree file system: `<base_path>/<game dir>/<relative path>`.
///
/// Without an explicit game dir the active game dir is searched first, then
/// `base`.
pub struct DiskFileSystem {
    base_path: PathBuf,
    game_dir: Mutex<String>,
    open_files: AtomicI32,
    common: Option<Arc<dyn NativeCommon>>,
}

pub const BASE_GAME_DIR: &str = "base";

impl DiskFileSystem {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            game_dir: Mutex::new(BASE_GAME_DIR.to_string()),
            open_files: AtomicI32::new(0),
            common: None,
        }
    }

    /// Print search diagnostics through `common` (developer only).
    pub fn with_console(mut self, common: Arc<dyn NativeCommon>) -> Self {
        self.common = Some(common);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn game_dir(&self) -> String {
        self.game_dir.lock().clone()
    }

    /// An empty name resets to `base`.
    pub fn set_game_dir(&self, dir: &str) {
        *self.game_dir.lock() = if dir.is_empty() {
            BASE_GAME_DIR.to_string()
        } else {
            dir.to_string()
        };
    }

    /// Files opened and not yet closed.
    pub fn open_file_count(&self) -> i32 {
        self.open_files.load(Ordering::Relaxed)
    }

    fn dprintf(&self, msg: &str) {
        if let Some(common) = &self.common {
            com_dprintf(common.as_ref(), msg);
        }
    }

    /// Relative paths only, no parent-directory components.
    fn is_safe_relative(path: &Path) -> bool {
        path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }

    fn search_dirs(&self, game_dir: Option<&str>) -> Vec<String> {
        match game_dir {
            Some(dir) => vec![dir.to_string()],
            None => {
                let current = self.game_dir();
                if current.eq_ignore_ascii_case(BASE_GAME_DIR) {
                    vec![current]
                } else {
                    vec![current, BASE_GAME_DIR.to_string()]
                }
            }
        }
    }

    /// Locate `relative` along the search path.
    pub fn find_file(&self, relative: &str, game_dir: Option<&str>) -> Option<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty() || !Self::is_safe_relative(rel) {
            self.dprintf(&format!("FindFile: rejected path {}\n", relative));
            return None;
        }
        for dir in self.search_dirs(game_dir) {
            let netpath = self.base_path.join(&dir).join(rel);
            if netpath.is_file() {
                self.dprintf(&format!("FindFile: {}\n", netpath.display()));
                return Some(netpath);
            }
        }
        self.dprintf(&format!("FindFile: can't find {}\n", relative));
        None
    }

    /// Load a whole file. Returns `None` if not found or unreadable.
    pub fn load_file(&self, relative: &str, game_dir: Option<&str>) -> Option<Vec<u8>> {
        let path = self.find_file(relative, game_dir)?;
        match fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                self.dprintf(&format!("LoadFile: read error {}: {}\n", path.display(), e));
                None
            }
        }
    }

    /// Modification time of a file along the search path, in seconds.
    pub fn file_timestamp(&self, relative: &str) -> Option<u32> {
        let path = self.find_file(relative, None)?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        modified
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() as u32)
    }
}

impl NativeFileSystem for DiskFileSystem {
    fn open_file_read(
        &self,
        relative_path: &CStr,
        _allow_copy_files: bool,
        game_dir: Option<&CStr>,
    ) -> Option<Box<dyn NativeFile>> {
        let relative = from_native(relative_path);
        let game_dir = game_dir.map(from_native);
        let path = self.find_file(&relative, game_dir.as_deref())?;
        let data = fs::read(&path).ok()?;
        let timestamp = self.file_timestamp(&relative).unwrap_or(0);

        self.open_files.fetch_add(1, Ordering::Relaxed);
        Some(Box::new(MemoryFile {
            name: relative,
            full_path: path.display().to_string(),
            data,
            timestamp,
            pos: AtomicUsize::new(0),
        }))
    }

    fn close_file(&self, file: Box<dyn NativeFile>) {
        self.open_files.fetch_sub(1, Ordering::Relaxed);
        drop(file);
    }
}

// ============================================================
// Declarations
// ============================================================

pub struct HostDecl {
    name: String,
    decl_type: DeclType,
    index: i32,
    implicit: bool,
    dict: Option<Dict>,
}

impl NativeDecl for HostDecl {
    fn name(&self) -> CString {
        native_string(&self.name)
    }

    fn decl_type(&self) -> DeclType {
        self.decl_type
    }

    fn is_implicit(&self) -> bool {
        self.implicit
    }

    fn index(&self) -> i32 {
        self.index
    }

    fn entity_dict(&self) -> Option<&Dict> {
        self.dict.as_ref()
    }
}

/// Declarations registered by the host, indexed per type.
#[derive(Default)]
pub struct DeclTable {
    decls: Mutex<Vec<Box<HostDecl>>>,
    folders: Mutex<Vec<(String, String, DeclType)>>,
    media: Mutex<Vec<String>>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, decl_type: DeclType, name: &str, implicit: bool, dict: Option<Dict>) -> usize {
        let mut decls = self.decls.lock();
        let index = decls.iter().filter(|d| d.decl_type == decl_type).count() as i32;
        decls.push(Box::new(HostDecl {
            name: name.to_string(),
            decl_type,
            index,
            implicit,
            dict,
        }));
        decls.len() - 1
    }

    /// Register an explicit declaration.
    pub fn define(&self, decl_type: DeclType, name: &str) {
        self.add(decl_type, name, false, None);
    }

    /// Register an entityDef with its spawn args.
    pub fn define_entity(&self, name: &str, spawn_args: Dict) {
        self.add(DeclType::EntityDef, name, false, Some(spawn_args));
    }

    /// Register a mapDef; `keys` lists the game types the map supports.
    pub fn define_map(&self, name: &str, keys: Dict) {
        self.add(DeclType::MapDef, name, false, Some(keys));
    }

    /// Folders registered through `register_decl_folder`, in order.
    pub fn folders(&self) -> Vec<(String, String, DeclType)> {
        self.folders.lock().clone()
    }

    pub fn media_lines(&self) -> Vec<String> {
        self.media.lock().clone()
    }

    fn view(decl: &HostDecl) -> NativeRef<dyn NativeDecl> {
        // SAFETY: decls are boxed and never removed from the table.
        unsafe { NativeRef::from_ref(decl as &dyn NativeDecl) }
    }
}

impl NativeDeclManager for DeclTable {
    fn num_decl_types(&self) -> i32 {
        DeclType::MapDef as i32 + 1
    }

    fn num_decls(&self, decl_type: DeclType) -> i32 {
        self.decls
            .lock()
            .iter()
            .filter(|d| d.decl_type == decl_type)
            .count() as i32
    }

    fn find_type(
        &self,
        decl_type: DeclType,
        name: &CStr,
        make_default: bool,
    ) -> Option<NativeRef<dyn NativeDecl>> {
        let name = from_native(name);
        if name.is_empty() {
            return None;
        }
        {
            let decls = self.decls.lock();
            if let Some(found) = decls
                .iter()
                .find(|d| d.decl_type == decl_type && d.name.eq_ignore_ascii_case(&name))
            {
                return Some(Self::view(found));
            }
        }
        if !make_default {
            return None;
        }
        let idx = self.add(decl_type, &name, true, None);
        let decls = self.decls.lock();
        Some(Self::view(&decls[idx]))
    }

    fn decl_by_index(
        &self,
        decl_type: DeclType,
        index: i32,
        _force_parse: bool,
    ) -> Option<NativeRef<dyn NativeDecl>> {
        let decls = self.decls.lock();
        decls
            .iter()
            .find(|d| d.decl_type == decl_type && d.index == index)
            .map(|d| Self::view(d))
    }

    fn register_decl_folder(&self, folder: &CStr, extension: &CStr, default_type: DeclType) {
        self.folders
            .lock()
            .push((from_native(folder), from_native(extension), default_type));
    }

    fn media_print(&self, msg: &CStr) {
        self.media.lock().push(from_native(msg));
    }
}

// ============================================================
// User interfaces
// ============================================================

pub struct HostGui {
    path: Mutex<String>,
    unique: bool,
    state: Mutex<Dict>,
    active: AtomicBool,
    freed: AtomicBool,
    redraws: AtomicI32,
}

impl HostGui {
    fn new(path: &str, unique: bool) -> Self {
        Self {
            path: Mutex::new(path.to_string()),
            unique,
            state: Mutex::new(Dict::new()),
            active: AtomicBool::new(false),
            freed: AtomicBool::new(false),
            redraws: AtomicI32::new(0),
        }
    }

    pub fn path(&self) -> String {
        self.path.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> Dict {
        self.state.lock().clone()
    }

    pub fn state_changes(&self) -> i32 {
        self.redraws.load(Ordering::Relaxed)
    }
}

impl NativeUserInterface for HostGui {
    /// Returns the gui's `activateCommand` state key, usually empty.
    fn activate(&self, activate: bool, _time: i32) -> CString {
        self.active.store(activate, Ordering::Relaxed);
        native_string(self.state.lock().get_string("activateCommand", ""))
    }

    fn init_from_file(&self, qpath: &CStr, _rebuild: bool, _cache: bool) -> bool {
        let qpath = from_native(qpath);
        let ok = qpath.to_ascii_lowercase().ends_with(".gui");
        if ok {
            *self.path.lock() = qpath;
        }
        ok
    }

    fn state_string(&self, key: &CStr) -> CString {
        native_string(self.state.lock().get_string(&from_native(key), ""))
    }

    fn set_state_string(&self, key: &CStr, value: &CStr) {
        self.state.lock().set(&from_native(key), &from_native(value));
    }

    fn set_state_bool(&self, key: &CStr, value: bool) {
        self.state.lock().set_bool(&from_native(key), value);
    }

    fn set_state_int(&self, key: &CStr, value: i32) {
        self.state.lock().set_int(&from_native(key), value);
    }

    fn set_state_float(&self, key: &CStr, value: f32) {
        self.state.lock().set_float(&from_native(key), value);
    }

    fn state_changed(&self, _time: i32, _redraw: bool) {
        self.redraws.fetch_add(1, Ordering::Relaxed);
    }
}

/// User interfaces keyed by path.
#[derive(Default)]
pub struct GuiTable {
    guis: Mutex<Vec<Box<HostGui>>>,
}

impl GuiTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn view(gui: &HostGui) -> NativeRef<dyn NativeUserInterface> {
        // SAFETY: guis are boxed and never removed from the table.
        unsafe { NativeRef::from_ref(gui as &dyn NativeUserInterface) }
    }

    fn push(&self, path: &str, unique: bool) -> NativeRef<dyn NativeUserInterface> {
        let mut guis = self.guis.lock();
        guis.push(Box::new(HostGui::new(path, unique)));
        Self::view(&guis[guis.len() - 1])
    }

    /// Live (not deallocated) interfaces.
    pub fn live_count(&self) -> usize {
        self.guis
            .lock()
            .iter()
            .filter(|g| !g.freed.load(Ordering::Relaxed))
            .count()
    }

    /// Run `f` on the shared interface loaded from `path`.
    pub fn with_gui<R>(&self, path: &str, f: impl FnOnce(&HostGui) -> R) -> Option<R> {
        let guis = self.guis.lock();
        guis.iter()
            .find(|g| !g.freed.load(Ordering::Relaxed) && g.path().eq_ignore_ascii_case(path))
            .map(|g| f(&**g))
    }
}

impl NativeUiManager for GuiTable {
    fn alloc(&self) -> Option<NativeRef<dyn NativeUserInterface>> {
        Some(self.push("", true))
    }

    fn dealloc(&self, gui: NativeRef<dyn NativeUserInterface>) {
        let guis = self.guis.lock();
        if let Some(found) = guis
            .iter()
            .find(|g| std::ptr::addr_eq(&***g as *const HostGui, gui.as_ptr()))
        {
            found.freed.store(true, Ordering::Relaxed);
        }
    }

    fn find_gui(
        &self,
        qpath: &CStr,
        auto_load: bool,
        need_unique: bool,
        force_unique: bool,
    ) -> Option<NativeRef<dyn NativeUserInterface>> {
        let qpath = from_native(qpath);
        if !force_unique {
            let guis = self.guis.lock();
            if let Some(found) = guis.iter().find(|g| {
                !g.unique
                    && !g.freed.load(Ordering::Relaxed)
                    && g.path().eq_ignore_ascii_case(&qpath)
            }) {
                if !need_unique {
                    return Some(Self::view(found));
                }
            }
        }
        if !auto_load && !need_unique && !force_unique {
            return None;
        }
        Some(self.push(&qpath, need_unique || force_unique))
    }
}

// ============================================================
// Render models
// ============================================================

pub struct HostModel {
    name: String,
    default_model: bool,
}

impl NativeRenderModel for HostModel {
    fn name(&self) -> CString {
        native_string(&self.name)
    }

    fn is_default_model(&self) -> bool {
        self.default_model
    }
}

/// Known render models. Unknown names get a default model, the way the
/// engine substitutes its placeholder mesh.
#[derive(Default)]
pub struct ModelTable {
    models: Mutex<Vec<Box<HostModel>>>,
}

impl ModelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, name: &str) {
        self.models.lock().push(Box::new(HostModel {
            name: name.to_string(),
            default_model: false,
        }));
    }
}

impl NativeRenderModelManager for ModelTable {
    fn find_model(&self, name: &CStr) -> Option<NativeRef<dyn NativeRenderModel>> {
        let name = from_native(name);
        if name.is_empty() {
            return None;
        }
        let mut models = self.models.lock();
        let idx = match models.iter().position(|m| m.name.eq_ignore_ascii_case(&name)) {
            Some(idx) => idx,
            None => {
                models.push(Box::new(HostModel {
                    name,
                    default_model: true,
                }));
                models.len() - 1
            }
        };
        let model: &HostModel = &models[idx];
        // SAFETY: models are boxed and never removed from the table.
        Some(unsafe { NativeRef::from_ref(model as &dyn NativeRenderModel) })
    }
}

// ============================================================
// Collision, network, commands
// ============================================================

/// Records what the game asked the collision system to load.
#[derive(Default)]
pub struct CollisionRecorder {
    maps: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
}

impl CollisionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_maps(&self) -> Vec<String> {
        self.maps.lock().clone()
    }

    pub fn loaded_models(&self) -> Vec<String> {
        self.models.lock().clone()
    }
}

impl NativeCollisionModelManager for CollisionRecorder {
    fn load_map(&self, map_file: &dyn NativeMapFile) {
        self.maps.lock().push(from_native(&map_file.name()));
    }

    fn load_model(&self, model_name: &CStr, _precache: bool) -> i32 {
        let name = from_native(model_name);
        let mut models = self.models.lock();
        match models.iter().position(|m| m.eq_ignore_ascii_case(&name)) {
            Some(i) => i as i32,
            None => {
                models.push(name);
                models.len() as i32 - 1
            }
        }
    }
}

/// Queues reliable messages instead of sending them.
#[derive(Default)]
pub struct LoopbackNetwork {
    server_messages: Mutex<Vec<(i32, Vec<u8>)>>,
    client_messages: Mutex<Vec<Vec<u8>>>,
    pings: Mutex<Vec<(i32, i32)>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ping(&self, client: i32, ping: i32) {
        let mut pings = self.pings.lock();
        pings.retain(|(c, _)| *c != client);
        pings.push((client, ping));
    }

    /// Drain messages sent to clients: `(client, bytes)`.
    pub fn take_server_messages(&self) -> Vec<(i32, Vec<u8>)> {
        std::mem::take(&mut *self.server_messages.lock())
    }

    pub fn take_client_messages(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.client_messages.lock())
    }
}

impl NativeNetworkSystem for LoopbackNetwork {
    fn server_send_reliable_message(&self, client: i32, msg: &BitMsg) {
        self.server_messages
            .lock()
            .push((client, msg.as_bytes().to_vec()));
    }

    fn client_send_reliable_message(&self, msg: &BitMsg) {
        self.client_messages.lock().push(msg.as_bytes().to_vec());
    }

    fn server_get_client_ping(&self, client: i32) -> i32 {
        self.pings
            .lock()
            .iter()
            .find(|(c, _)| *c == client)
            .map(|(_, p)| *p)
            .unwrap_or(-1)
    }
}

/// Command text buffer. Executing splits the buffer on `;` and newlines.
#[derive(Default)]
pub struct CommandBuffer {
    text: Mutex<String>,
    executed: Mutex<Vec<String>>,
    maps: Mutex<Vec<String>>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map names offered by map-name completion.
    pub fn set_maps(&self, maps: &[&str]) {
        *self.maps.lock() = maps.iter().map(|m| m.to_string()).collect();
    }

    pub fn pending(&self) -> String {
        self.text.lock().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl NativeCmdSystem for CommandBuffer {
    fn arg_completion_map_name(&self, args: &CmdArgs, callback: &mut dyn FnMut(&CStr)) {
        for map in self.maps.lock().iter() {
            callback(&native_string(&format!("{} {}", args.argv(0), map)));
        }
    }

    fn buffer_command_text(&self, text: &CStr) {
        self.text.lock().push_str(&from_native(text));
    }

    fn execute_command_buffer(&self) {
        let text = std::mem::take(&mut *self.text.lock());
        let mut executed = self.executed.lock();
        for cmd in text.split([';', '\n']) {
            let cmd = cmd.trim();
            if !cmd.is_empty() {
                executed.push(cmd.to_string());
            }
        }
    }
}

// ============================================================
// All of the above
// ============================================================

/// One of every in-process subsystem, sharing a single game directory.
pub struct InProcessHost {
    pub common: Arc<StdCommon>,
    pub cvars: Arc<CvarTable>,
    pub files: Arc<DiskFileSystem>,
    pub decls: Arc<DeclTable>,
    pub guis: Arc<GuiTable>,
    pub models: Arc<ModelTable>,
    pub collision: Arc<CollisionRecorder>,
    pub network: Arc<LoopbackNetwork>,
    pub lang: Arc<LangTable>,
    pub commands: Arc<CommandBuffer>,
    pub map_files: Arc<HostMapSource>,
}

impl InProcessHost {
    /// Subsystems rooted at `base_path`, with `fs_game` (if set) selecting
    /// the active game directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_lang(base_path, LangTable::new())
    }

    pub fn with_lang(base_path: impl Into<PathBuf>, lang: LangTable) -> Self {
        let cvars = Arc::new(CvarTable::new());
        let common = Arc::new(StdCommon::new(Some(cvars.clone() as Arc<dyn NativeCvarSystem>)));
        let files = Arc::new(
            DiskFileSystem::new(base_path).with_console(common.clone() as Arc<dyn NativeCommon>),
        );
        Self {
            map_files: Arc::new(HostMapSource::new(files.clone())),
            common,
            cvars,
            files,
            decls: Arc::new(DeclTable::new()),
            guis: Arc::new(GuiTable::new()),
            models: Arc::new(ModelTable::new()),
            collision: Arc::new(CollisionRecorder::new()),
            network: Arc::new(LoopbackNetwork::new()),
            lang: Arc::new(lang),
            commands: Arc::new(CommandBuffer::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn temp_tree(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("idtech4-host-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("base/maps")).unwrap();
        fs::create_dir_all(root.join("mymod")).unwrap();
        fs::write(root.join("base/default.cfg"), b"seta g_skill 1\n").unwrap();
        fs::write(root.join("mymod/default.cfg"), b"seta g_skill 3\n").unwrap();
        fs::write(root.join("base/only_base.txt"), b"base").unwrap();
        root
    }

    #[test]
    fn test_file_search_order() {
        let root = temp_tree("order");
        let fs_ = DiskFileSystem::new(&root);
        assert_eq!(fs_.load_file("default.cfg", None).unwrap(), b"seta g_skill 1\n");

        fs_.set_game_dir("mymod");
        assert_eq!(fs_.load_file("default.cfg", None).unwrap(), b"seta g_skill 3\n");
        assert_eq!(fs_.load_file("only_base.txt", None).unwrap(), b"base");
        assert_eq!(fs_.load_file("default.cfg", Some("base")).unwrap(), b"seta g_skill 1\n");
        assert!(fs_.load_file("only_base.txt", Some("mymod")).is_none());
        assert!(fs_.load_file("../outside.txt", None).is_none());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_open_read_close() {
        let root = temp_tree("open");
        let fs_ = DiskFileSystem::new(&root);
        let file = fs_.open_file_read(&cs("only_base.txt"), true, None).unwrap();
        assert_eq!(fs_.open_file_count(), 1);
        assert_eq!(file.length(), 4);
        let mut buf = [0u8; 3];
        assert_eq!(file.read(&mut buf), 3);
        assert_eq!(&buf, b"bas");
        assert_eq!(file.read(&mut buf), 1);
        assert_eq!(file.read(&mut buf), 0);
        fs_.close_file(file);
        assert_eq!(fs_.open_file_count(), 0);
        assert!(fs_.open_file_read(&cs("missing.txt"), true, None).is_none());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_decl_table() {
        let decls = DeclTable::new();
        decls.define(DeclType::Material, "textures/base_wall/lfwall27");
        let mut args = Dict::new();
        args.set("model", "models/monsters/zombie.md5mesh");
        decls.define_entity("monster_zombie", args);

        let mat = decls
            .find_type(DeclType::Material, &cs("TEXTURES/base_wall/lfwall27"), false)
            .unwrap();
        assert!(!mat.get().is_implicit());
        assert_eq!(mat.get().index(), 0);

        assert!(decls.find_type(DeclType::Skin, &cs("skins/none"), false).is_none());
        let skin = decls.find_type(DeclType::Skin, &cs("skins/none"), true).unwrap();
        assert!(skin.get().is_implicit());
        assert_eq!(decls.num_decls(DeclType::Skin), 1);

        let ent = decls.decl_by_index(DeclType::EntityDef, 0, true).unwrap();
        assert_eq!(
            ent.get().entity_dict().unwrap().get_string("model", ""),
            "models/monsters/zombie.md5mesh"
        );
    }

    #[test]
    fn test_gui_table_sharing() {
        let guis = GuiTable::new();
        let path = cs("guis/mainmenu.gui");
        assert!(guis.find_gui(&path, false, false, false).is_none());
        let a = guis.find_gui(&path, true, false, false).unwrap();
        let b = guis.find_gui(&path, true, false, false).unwrap();
        assert!(a.same_object(&b));
        let unique = guis.find_gui(&path, true, true, false).unwrap();
        assert!(!unique.same_object(&a));

        a.get().set_state_int(&cs("gameDraw"), 1);
        assert_eq!(guis.with_gui("guis/mainmenu.gui", |g| g.state().get_int("gameDraw", "0")), Some(1));

        assert_eq!(guis.live_count(), 2);
        guis.dealloc(unique);
        assert_eq!(guis.live_count(), 1);
    }

    #[test]
    fn test_models_and_network_and_commands() {
        let models = ModelTable::new();
        models.define("models/items/medkit.lwo");
        assert!(!models.find_model(&cs("models/items/medkit.lwo")).unwrap().get().is_default_model());
        assert!(models.find_model(&cs("nope.lwo")).unwrap().get().is_default_model());
        assert!(models.find_model(&cs("")).is_none());

        let net = LoopbackNetwork::new();
        let mut msg = BitMsg::init_game();
        msg.write_byte(7);
        net.server_send_reliable_message(-1, &msg);
        assert_eq!(net.take_server_messages(), vec![(-1, vec![7u8])]);
        assert_eq!(net.server_get_client_ping(3), -1);
        net.set_ping(3, 42);
        assert_eq!(net.server_get_client_ping(3), 42);

        let cmds = CommandBuffer::new();
        cmds.buffer_command_text(&cs("disconnect; map d3dm1\n"));
        cmds.execute_command_buffer();
        assert_eq!(cmds.executed(), vec!["disconnect", "map d3dm1"]);
        assert_eq!(cmds.pending(), "");
    }
}
