// native.rs -- The engine side of the boundary
//
// C-compatible snapshot structs passed through the game interface, and the
// traits the engine's subsystems implement. Subsystem methods take native
// (`CStr`) strings; the facades in idtech4-game marshal module-side strings
// before forwarding.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr::NonNull;

use crate::bitmsg::BitMsg;
use crate::completion::CmdArgs;
use crate::cvar::CvarDescriptor;
use crate::dict::Dict;
use crate::marshal::{Mat3, Vec3, MAT3_IDENTITY};

// ============================================================
// Constants
// ============================================================

/// Game API version - must match between engine and game module
pub const GAME_API_VERSION: i32 = 8;

pub const MAX_STRING_CHARS: usize = 1024;
pub const MAX_ASYNC_CLIENTS: usize = 32;
pub const MAX_ENTITY_SHADER_PARMS: usize = 12;
pub const MAX_GLOBAL_SHADER_PARMS: usize = 12;

// ============================================================
// Native references
// ============================================================

/// A non-owning view of an engine object.
///
/// The engine owns the object; the view is only valid while the engine keeps
/// it alive. Nothing here can detect a dangling view, so construction is
/// `unsafe` and the caller vouches for the engine's call discipline.
pub struct NativeRef<T: ?Sized> {
    ptr: NonNull<T>,
}

impl<T: ?Sized> NativeRef<T> {
    /// # Safety
    /// `ptr` must be null or point to a live object that outlives every use
    /// of the returned view.
    pub unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// # Safety
    /// `value` must outlive every use of the returned view, including copies.
    pub unsafe fn from_ref(value: &T) -> Self {
        Self {
            ptr: NonNull::from(value),
        }
    }

    pub fn get(&self) -> &T {
        // SAFETY: liveness was vouched for at construction.
        unsafe { self.ptr.as_ref() }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// True when both views refer to the same engine object.
    pub fn same_object(&self, other: &NativeRef<T>) -> bool {
        std::ptr::addr_eq(self.ptr.as_ptr(), other.ptr.as_ptr())
    }
}

impl<T: ?Sized> Clone for NativeRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for NativeRef<T> {}

impl<T: ?Sized> std::fmt::Debug for NativeRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeRef({:p})", self.ptr.as_ptr() as *const ())
    }
}

// The engine objects behind these views are accessed from the engine's main
// thread only; the views themselves carry no thread affinity.
unsafe impl<T: ?Sized + Sync> Send for NativeRef<T> {}
unsafe impl<T: ?Sized + Sync> Sync for NativeRef<T> {}

// ============================================================
// Snapshot structs
// ============================================================

/// C-compatible per-client input for one game frame
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct usercmd_t {
    pub gameFrame: i32,
    pub gameTime: i32,
    pub duplicateCount: i32,
    pub buttons: u8,
    pub forwardmove: i8,
    pub rightmove: i8,
    pub upmove: i8,
    pub angles: [i16; 3],
    pub mx: i16,
    pub my: i16,
    pub impulse: i8,
    pub flags: u8,
    pub sequence: i32,
}

/// C-compatible per-frame game status handed back to the engine
#[repr(C)]
#[derive(Clone, Copy)]
pub struct gameReturn_t {
    pub sessionCommand: [c_char; MAX_STRING_CHARS],
    pub consistencyHash: i32,
    pub health: i32,
    pub heartRate: i32,
    pub stamina: i32,
    pub combat: i32,
    pub syncNextGameFrame: bool,
}

impl Default for gameReturn_t {
    fn default() -> Self {
        Self {
            sessionCommand: [0; MAX_STRING_CHARS],
            consistencyHash: 0,
            health: 0,
            heartRate: 0,
            stamina: 0,
            combat: 0,
            syncNextGameFrame: false,
        }
    }
}

impl std::fmt::Debug for gameReturn_t {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("gameReturn_t")
            .field("sessionCommand", &crate::marshal::read_fixed(&self.sessionCommand))
            .field("consistencyHash", &self.consistencyHash)
            .field("health", &self.health)
            .field("heartRate", &self.heartRate)
            .field("stamina", &self.stamina)
            .field("combat", &self.combat)
            .field("syncNextGameFrame", &self.syncNextGameFrame)
            .finish()
    }
}

/// What the engine should do after the player pressed escape.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscReply {
    Ignore = 0,
    Main = 1,
    Gui = 2,
}

/// Answer to a client asking to join the server.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReply {
    Yes = 0,
    BadPass = 1,
    NotYet = 2,
    No = 3,
}

/// Declaration types known to the decl manager.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclType {
    Table = 0,
    Material,
    Skin,
    Sound,
    EntityDef,
    ModelDef,
    Fx,
    Particle,
    Af,
    Pda,
    Video,
    Audio,
    Email,
    ModelExport,
    MapDef,
}

impl DeclType {
    pub const MAX_TYPES: i32 = 32;

    pub fn from_i32(v: i32) -> Option<Self> {
        use DeclType::*;
        const ALL: [DeclType; 15] = [
            Table, Material, Skin, Sound, EntityDef, ModelDef, Fx, Particle, Af, Pda, Video,
            Audio, Email, ModelExport, MapDef,
        ];
        usize::try_from(v).ok().and_then(|i| ALL.get(i).copied())
    }
}

/// Render view parameters set on a render world
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderViewDef {
    pub view_id: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub fov_x: f32,
    pub fov_y: f32,
    pub vieworg: Vec3,
    pub viewaxis: Mat3,
    pub cram_z_near: bool,
    pub force_update: bool,
    pub time: i32,
    pub shader_parms: [f32; MAX_GLOBAL_SHADER_PARMS],
}

impl Default for RenderViewDef {
    fn default() -> Self {
        Self {
            view_id: 0,
            x: 0,
            y: 0,
            width: 640,
            height: 480,
            fov_x: 90.0,
            fov_y: 90.0,
            vieworg: [0.0; 3],
            viewaxis: MAT3_IDENTITY,
            cram_z_near: false,
            force_update: false,
            time: 0,
            shader_parms: [0.0; MAX_GLOBAL_SHADER_PARMS],
        }
    }
}

/// Copy of a render entity's parameters
#[derive(Debug, Clone, Copy)]
pub struct RenderEntityDef {
    pub entity_num: i32,
    pub suppress_surface_in_view_id: i32,
    pub suppress_shadow_in_view_id: i32,
    pub suppress_shadow_in_light_id: i32,
    pub allow_surface_in_view_id: i32,
    pub custom_shader: Option<NativeRef<dyn NativeDecl>>,
    pub reference_shader: Option<NativeRef<dyn NativeDecl>>,
    pub custom_skin: Option<NativeRef<dyn NativeDecl>>,
    pub no_self_shadow: bool,
    pub no_shadow: bool,
    pub no_dynamic_interactions: bool,
    pub origin: Vec3,
    pub axis: Mat3,
    pub shader_parms: [f32; MAX_ENTITY_SHADER_PARMS],
}

impl Default for RenderEntityDef {
    fn default() -> Self {
        Self {
            entity_num: 0,
            suppress_surface_in_view_id: 0,
            suppress_shadow_in_view_id: 0,
            suppress_shadow_in_light_id: 0,
            allow_surface_in_view_id: 0,
            custom_shader: None,
            reference_shader: None,
            custom_skin: None,
            no_self_shadow: false,
            no_shadow: false,
            no_dynamic_interactions: false,
            origin: [0.0; 3],
            axis: MAT3_IDENTITY,
            shader_parms: [0.0; MAX_ENTITY_SHADER_PARMS],
        }
    }
}

/// Light parameters parsed from spawn args.
#[derive(Debug, Clone, Copy)]
pub struct RenderLightDef {
    pub origin: Vec3,
    pub axis: Mat3,
    pub light_radius: Vec3,
    pub light_center: Vec3,
    pub point_light: bool,
    pub parallel: bool,
    pub no_shadows: bool,
    pub no_specular: bool,
    pub shader: Option<NativeRef<dyn NativeDecl>>,
    pub shader_parms: [f32; MAX_ENTITY_SHADER_PARMS],
}

impl Default for RenderLightDef {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            axis: MAT3_IDENTITY,
            light_radius: [300.0; 3],
            light_center: [0.0; 3],
            point_light: true,
            parallel: false,
            no_shadows: false,
            no_specular: false,
            shader: None,
            shader_parms: [0.0; MAX_ENTITY_SHADER_PARMS],
        }
    }
}

/// Sound emitter parameters parsed from spawn args.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefSoundDef {
    pub origin: Vec3,
    pub listener_id: i32,
    pub shader: Option<NativeRef<dyn NativeDecl>>,
    pub min_distance: f32,
    pub max_distance: f32,
    pub volume: f32,
    pub shakes: f32,
    pub sound_class: i32,
    pub wait_for_trigger: bool,
}

/// Opaque editor reference to a spawned game entity.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u32);

/// Opaque editor reference to a loaded animation.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimHandle(pub u32);

/// A 3x4 joint transform, row major, translation in the last column.
pub type JointMat = [f32; 12];

// ============================================================
// Subsystem traits
// ============================================================

/// Engine console output.
pub trait NativeCommon: Send + Sync {
    fn printf(&self, msg: &CStr);
    /// Developer-only print.
    fn dprintf(&self, msg: &CStr);
    fn warning(&self, msg: &CStr);
    fn dwarning(&self, msg: &CStr);
    /// Drops the current game session. Does not exit the process.
    fn error(&self, msg: &CStr);
}

pub trait NativeCvarSystem: Send + Sync {
    fn get_cvar_string(&self, name: &CStr) -> CString;
    fn get_cvar_bool(&self, name: &CStr) -> bool;
    fn get_cvar_integer(&self, name: &CStr) -> i32;
    fn get_cvar_float(&self, name: &CStr) -> f32;
    fn set_cvar_string(&self, name: &CStr, value: &CStr);
    fn set_cvar_bool(&self, name: &CStr, value: bool);
    fn set_cvar_integer(&self, name: &CStr, value: i32);
    fn set_cvar_float(&self, name: &CStr, value: f32);
    /// Register a cvar. The system keeps the descriptor (and its completion
    /// callback) alive for as long as the cvar exists.
    fn register(&self, cvar: CvarDescriptor);
}

pub trait NativeCmdSystem: Send + Sync {
    /// The engine's own map-name argument completion.
    fn arg_completion_map_name(&self, args: &CmdArgs, callback: &mut dyn FnMut(&CStr));
    fn buffer_command_text(&self, text: &CStr);
    fn execute_command_buffer(&self);
}

/// An open engine file. Dropping it closes it.
pub trait NativeFile: Send + Sync {
    fn name(&self) -> CString;
    fn full_path(&self) -> CString;
    fn length(&self) -> i32;
    fn timestamp(&self) -> u32;
    /// Read into `buf` from the current position, returning the number of
    /// bytes read.
    fn read(&self, buf: &mut [u8]) -> i32;
}

pub trait NativeFileSystem: Send + Sync {
    /// `game_dir` of `None` searches the default paths.
    fn open_file_read(
        &self,
        relative_path: &CStr,
        allow_copy_files: bool,
        game_dir: Option<&CStr>,
    ) -> Option<Box<dyn NativeFile>>;
    fn close_file(&self, file: Box<dyn NativeFile>);
}

pub trait NativeDecl: Send + Sync {
    fn name(&self) -> CString;
    fn decl_type(&self) -> DeclType;
    fn is_implicit(&self) -> bool;
    fn index(&self) -> i32;
    /// Spawn arguments of an entityDef declaration.
    fn entity_dict(&self) -> Option<&Dict> {
        None
    }
}

pub trait NativeDeclManager: Send + Sync {
    fn num_decl_types(&self) -> i32;
    fn num_decls(&self, decl_type: DeclType) -> i32;
    fn find_type(
        &self,
        decl_type: DeclType,
        name: &CStr,
        make_default: bool,
    ) -> Option<NativeRef<dyn NativeDecl>>;
    fn decl_by_index(
        &self,
        decl_type: DeclType,
        index: i32,
        force_parse: bool,
    ) -> Option<NativeRef<dyn NativeDecl>>;
    fn register_decl_folder(&self, folder: &CStr, extension: &CStr, default_type: DeclType);
    fn media_print(&self, msg: &CStr);
}

pub trait NativeUserInterface: Send + Sync {
    fn activate(&self, activate: bool, time: i32) -> CString;
    fn init_from_file(&self, qpath: &CStr, rebuild: bool, cache: bool) -> bool;
    fn state_string(&self, key: &CStr) -> CString;
    fn set_state_string(&self, key: &CStr, value: &CStr);
    fn set_state_bool(&self, key: &CStr, value: bool);
    fn set_state_int(&self, key: &CStr, value: i32);
    fn set_state_float(&self, key: &CStr, value: f32);
    fn state_changed(&self, time: i32, redraw: bool);
}

pub trait NativeUiManager: Send + Sync {
    fn alloc(&self) -> Option<NativeRef<dyn NativeUserInterface>>;
    fn dealloc(&self, gui: NativeRef<dyn NativeUserInterface>);
    fn find_gui(
        &self,
        qpath: &CStr,
        auto_load: bool,
        need_unique: bool,
        force_unique: bool,
    ) -> Option<NativeRef<dyn NativeUserInterface>>;
}

pub trait NativeRenderWorld: Send + Sync {
    fn set_render_view(&self, view: &RenderViewDef);
    fn debug_clear_lines(&self, time: i32);
    fn debug_clear_polygons(&self, time: i32);
    /// Copy of the render entity behind `handle`, if one is allocated.
    fn get_render_entity(&self, handle: i32) -> Option<RenderEntityDef>;
}

pub trait NativeSoundWorld: Send + Sync {
    fn clear_all_sound_emitters(&self);
}

pub trait NativeRenderModel: Send + Sync {
    fn name(&self) -> CString;
    fn is_default_model(&self) -> bool;
}

pub trait NativeRenderModelManager: Send + Sync {
    fn find_model(&self, name: &CStr) -> Option<NativeRef<dyn NativeRenderModel>>;
}

pub trait NativeMapEntity: Send + Sync {
    fn epairs(&self) -> &Dict;
}

/// A parsed .map file, owned by whoever allocated it.
pub trait NativeMapFile: Send + Sync {
    fn parse(&mut self, filename: &CStr, ignore_region: bool, os_path: bool) -> bool;
    fn remove_primitive_data(&mut self);
    fn num_entities(&self) -> i32;
    fn entity(&self, index: i32) -> Option<&dyn NativeMapEntity>;
    fn needs_reload(&self) -> bool;
    fn name(&self) -> CString;
}

pub trait NativeMapFileSource: Send + Sync {
    fn alloc_map_file(&self) -> Box<dyn NativeMapFile>;
}

pub trait NativeCollisionModelManager: Send + Sync {
    fn load_map(&self, map_file: &dyn NativeMapFile);
    /// Returns the collision model handle.
    fn load_model(&self, model_name: &CStr, precache: bool) -> i32;
}

pub trait NativeNetworkSystem: Send + Sync {
    /// `client` of -1 sends to every client.
    fn server_send_reliable_message(&self, client: i32, msg: &BitMsg);
    fn client_send_reliable_message(&self, msg: &BitMsg);
    fn server_get_client_ping(&self, client: i32) -> i32;
}

pub trait NativeLangDict: Send + Sync {
    fn get_string(&self, key: &CStr) -> CString;
}
