// handles.rs -- Module-side wrappers around engine objects
//
// Engine-owned objects (worlds, guis, decls, models) are wrapped as views:
// the wrapper never frees them. Objects the module owns (opened files,
// render entity copies, map files) are held in a `ScopedPtr` and released
// exactly once.

use idtech4_common::dict::Dict;
use idtech4_common::marshal::{
    from_native, mat3_to_matrix, matrix_to_mat3, vec3_to_vector3, vector3_to_vec3, with_native,
    with_native2, Matrix, Vector3,
};
use idtech4_common::native::{
    DeclType, NativeDecl, NativeFile, NativeMapEntity, NativeMapFile, NativeMapFileSource,
    NativeRenderModel, NativeRenderWorld, NativeSoundWorld, NativeUserInterface, RenderEntityDef,
    RenderViewDef, MAX_ENTITY_SHADER_PARMS, MAX_GLOBAL_SHADER_PARMS,
};
use idtech4_common::scoped_ptr::ScopedPtr;
use idtech4_common::{BoundaryError, BoundaryResult};

pub use idtech4_common::native::NativeRef;

// ============================================================
// Files
// ============================================================

enum FileInner {
    /// Opened by the module; closing hands it back to the file system.
    Owned(ScopedPtr<dyn NativeFile>),
    /// Owned by the engine (save games); never closed from here.
    Borrowed(NativeRef<dyn NativeFile>),
}

pub struct FileHandle {
    inner: FileInner,
}

impl FileHandle {
    pub fn from_owned(file: Box<dyn NativeFile>) -> Self {
        Self {
            inner: FileInner::Owned(ScopedPtr::from_box(file)),
        }
    }

    pub fn from_engine(file: NativeRef<dyn NativeFile>) -> Self {
        Self {
            inner: FileInner::Borrowed(file),
        }
    }

    fn native(&self) -> BoundaryResult<&dyn NativeFile> {
        match &self.inner {
            FileInner::Owned(ptr) => ptr.get().map(|f| f as &dyn NativeFile),
            FileInner::Borrowed(view) => Ok(view.get()),
        }
    }

    pub fn name(&self) -> BoundaryResult<String> {
        Ok(from_native(&self.native()?.name()))
    }

    pub fn full_path(&self) -> BoundaryResult<String> {
        Ok(from_native(&self.native()?.full_path()))
    }

    pub fn length(&self) -> BoundaryResult<i32> {
        Ok(self.native()?.length())
    }

    pub fn timestamp(&self) -> BoundaryResult<u32> {
        Ok(self.native()?.timestamp())
    }

    pub fn read(&self, buf: &mut [u8]) -> BoundaryResult<i32> {
        Ok(self.native()?.read(buf))
    }

    /// Read everything from the current position on.
    pub fn read_to_end(&self) -> BoundaryResult<Vec<u8>> {
        let file = self.native()?;
        let mut out = Vec::with_capacity(file.length().max(0) as usize);
        let mut chunk = [0u8; 4096];
        loop {
            let n = file.read(&mut chunk);
            if n <= 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n as usize]);
        }
        Ok(out)
    }

    /// True once the file was handed back to the file system.
    pub fn is_closed(&self) -> bool {
        matches!(&self.inner, FileInner::Owned(ptr) if ptr.is_empty())
    }

    /// Take the owned file out. Engine-owned files stay where they are.
    pub(crate) fn release(&mut self) -> Option<Box<dyn NativeFile>> {
        match &mut self.inner {
            FileInner::Owned(ptr) => ptr.release(),
            FileInner::Borrowed(_) => None,
        }
    }
}

// ============================================================
// Worlds
// ============================================================

#[derive(Clone, Copy, Debug)]
pub struct RenderWorld {
    native: NativeRef<dyn NativeRenderWorld>,
}

impl RenderWorld {
    pub fn new(native: NativeRef<dyn NativeRenderWorld>) -> Self {
        Self { native }
    }

    pub fn native(&self) -> NativeRef<dyn NativeRenderWorld> {
        self.native
    }

    pub fn set_render_view(&self, view: &RenderView) {
        self.native.get().set_render_view(&view.to_native());
    }

    pub fn debug_clear_lines(&self, time: i32) {
        self.native.get().debug_clear_lines(time);
    }

    pub fn debug_clear_polygons(&self, time: i32) {
        self.native.get().debug_clear_polygons(time);
    }

    /// A copy of the render entity behind `handle`. Changing the copy does
    /// not change the world.
    pub fn get_render_entity(&self, handle: i32) -> Option<RenderEntity> {
        self.native
            .get()
            .get_render_entity(handle)
            .map(RenderEntity::from_def)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SoundWorld {
    native: NativeRef<dyn NativeSoundWorld>,
}

impl SoundWorld {
    pub fn new(native: NativeRef<dyn NativeSoundWorld>) -> Self {
        Self { native }
    }

    pub fn native(&self) -> NativeRef<dyn NativeSoundWorld> {
        self.native
    }

    pub fn clear_all_sound_emitters(&self) {
        self.native.get().clear_all_sound_emitters();
    }
}

// ============================================================
// User interfaces
// ============================================================

#[derive(Clone, Copy, Debug)]
pub struct UserInterface {
    native: NativeRef<dyn NativeUserInterface>,
}

impl UserInterface {
    pub fn new(native: NativeRef<dyn NativeUserInterface>) -> Self {
        Self { native }
    }

    pub fn native(&self) -> NativeRef<dyn NativeUserInterface> {
        self.native
    }

    pub fn same_as(&self, other: &UserInterface) -> bool {
        self.native.same_object(&other.native)
    }

    /// Returns the command the gui wants run, often empty.
    pub fn activate(&self, activate: bool, time: i32) -> String {
        from_native(&self.native.get().activate(activate, time))
    }

    pub fn init_from_file(&self, qpath: &str, rebuild: bool, cache: bool) -> BoundaryResult<bool> {
        with_native(qpath, |q| self.native.get().init_from_file(q, rebuild, cache))
    }

    pub fn state_string(&self, key: &str) -> BoundaryResult<String> {
        with_native(key, |k| from_native(&self.native.get().state_string(k)))
    }

    pub fn set_state_string(&self, key: &str, value: &str) -> BoundaryResult<()> {
        with_native2(key, value, |k, v| self.native.get().set_state_string(k, v))
    }

    pub fn set_state_bool(&self, key: &str, value: bool) -> BoundaryResult<()> {
        with_native(key, |k| self.native.get().set_state_bool(k, value))
    }

    pub fn set_state_int(&self, key: &str, value: i32) -> BoundaryResult<()> {
        with_native(key, |k| self.native.get().set_state_int(k, value))
    }

    pub fn set_state_float(&self, key: &str, value: f32) -> BoundaryResult<()> {
        with_native(key, |k| self.native.get().set_state_float(k, value))
    }

    pub fn state_changed(&self, time: i32, redraw: bool) {
        self.native.get().state_changed(time, redraw);
    }
}

// ============================================================
// Models and declarations
// ============================================================

#[derive(Clone, Copy, Debug)]
pub struct RenderModel {
    native: NativeRef<dyn NativeRenderModel>,
}

impl RenderModel {
    pub fn new(native: NativeRef<dyn NativeRenderModel>) -> Self {
        Self { native }
    }

    pub fn native(&self) -> NativeRef<dyn NativeRenderModel> {
        self.native
    }

    pub fn name(&self) -> String {
        from_native(&self.native.get().name())
    }

    pub fn is_default_model(&self) -> bool {
        self.native.get().is_default_model()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Decl {
    native: NativeRef<dyn NativeDecl>,
}

impl Decl {
    pub fn new(native: NativeRef<dyn NativeDecl>) -> Self {
        Self { native }
    }

    pub fn native(&self) -> NativeRef<dyn NativeDecl> {
        self.native
    }

    pub fn name(&self) -> String {
        from_native(&self.native.get().name())
    }

    pub fn decl_type(&self) -> DeclType {
        self.native.get().decl_type()
    }

    pub fn is_implicit(&self) -> bool {
        self.native.get().is_implicit()
    }

    pub fn index(&self) -> i32 {
        self.native.get().index()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Material(pub Decl);

#[derive(Clone, Copy, Debug)]
pub struct DeclSkin(pub Decl);

/// An entityDef declaration with a snapshot of its spawn args.
#[derive(Clone, Debug)]
pub struct DeclEntityDef {
    decl: Decl,
    dict: Dict,
}

impl DeclEntityDef {
    pub fn new(decl: Decl) -> Self {
        let dict = decl
            .native()
            .get()
            .entity_dict()
            .cloned()
            .unwrap_or_default();
        Self { decl, dict }
    }

    pub fn decl(&self) -> &Decl {
        &self.decl
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }
}

/// A declaration resolved to its most specific wrapper.
#[derive(Clone, Debug)]
pub enum TypedDecl {
    Material(Material),
    Skin(DeclSkin),
    EntityDef(DeclEntityDef),
    Other(Decl),
}

impl TypedDecl {
    pub fn from_decl(decl: Decl) -> Self {
        match decl.decl_type() {
            DeclType::Material => TypedDecl::Material(Material(decl)),
            DeclType::Skin => TypedDecl::Skin(DeclSkin(decl)),
            DeclType::EntityDef => TypedDecl::EntityDef(DeclEntityDef::new(decl)),
            _ => TypedDecl::Other(decl),
        }
    }

    pub fn decl(&self) -> &Decl {
        match self {
            TypedDecl::Material(m) => &m.0,
            TypedDecl::Skin(s) => &s.0,
            TypedDecl::EntityDef(e) => e.decl(),
            TypedDecl::Other(d) => d,
        }
    }
}

// ============================================================
// Render views and entities
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderView {
    pub view_id: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub fov_x: f32,
    pub fov_y: f32,
    pub origin: Vector3,
    pub axis: Matrix,
    pub time: i32,
    pub shader_parms: [f32; MAX_GLOBAL_SHADER_PARMS],
}

impl RenderView {
    pub fn from_native(def: &RenderViewDef) -> Self {
        Self {
            view_id: def.view_id,
            x: def.x,
            y: def.y,
            width: def.width,
            height: def.height,
            fov_x: def.fov_x,
            fov_y: def.fov_y,
            origin: vec3_to_vector3(&def.vieworg),
            axis: mat3_to_matrix(&def.viewaxis),
            time: def.time,
            shader_parms: def.shader_parms,
        }
    }

    pub fn to_native(&self) -> RenderViewDef {
        RenderViewDef {
            view_id: self.view_id,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            fov_x: self.fov_x,
            fov_y: self.fov_y,
            vieworg: vector3_to_vec3(&self.origin),
            viewaxis: matrix_to_mat3(&self.axis),
            time: self.time,
            shader_parms: self.shader_parms,
            ..RenderViewDef::default()
        }
    }
}

impl Default for RenderView {
    fn default() -> Self {
        Self::from_native(&RenderViewDef::default())
    }
}

/// An owned copy of a render entity's parameters.
///
/// Every accessor fails with `Disposed` after `dispose`.
#[derive(Debug)]
pub struct RenderEntity {
    inner: ScopedPtr<RenderEntityDef>,
}

impl RenderEntity {
    pub fn new() -> Self {
        Self::from_def(RenderEntityDef::default())
    }

    pub fn from_def(def: RenderEntityDef) -> Self {
        Self {
            inner: ScopedPtr::from(def),
        }
    }

    pub fn def(&self) -> BoundaryResult<&RenderEntityDef> {
        self.inner.get()
    }

    fn def_mut(&mut self) -> BoundaryResult<&mut RenderEntityDef> {
        self.inner.get_mut()
    }

    pub fn dispose(&mut self) {
        self.inner.dispose();
    }

    pub fn entity_num(&self) -> BoundaryResult<i32> {
        Ok(self.def()?.entity_num)
    }

    pub fn set_entity_num(&mut self, v: i32) -> BoundaryResult<()> {
        self.def_mut()?.entity_num = v;
        Ok(())
    }

    pub fn suppress_surface_in_view_id(&self) -> BoundaryResult<i32> {
        Ok(self.def()?.suppress_surface_in_view_id)
    }

    pub fn set_suppress_surface_in_view_id(&mut self, v: i32) -> BoundaryResult<()> {
        self.def_mut()?.suppress_surface_in_view_id = v;
        Ok(())
    }

    pub fn suppress_shadow_in_view_id(&self) -> BoundaryResult<i32> {
        Ok(self.def()?.suppress_shadow_in_view_id)
    }

    pub fn set_suppress_shadow_in_view_id(&mut self, v: i32) -> BoundaryResult<()> {
        self.def_mut()?.suppress_shadow_in_view_id = v;
        Ok(())
    }

    pub fn suppress_shadow_in_light_id(&self) -> BoundaryResult<i32> {
        Ok(self.def()?.suppress_shadow_in_light_id)
    }

    pub fn set_suppress_shadow_in_light_id(&mut self, v: i32) -> BoundaryResult<()> {
        self.def_mut()?.suppress_shadow_in_light_id = v;
        Ok(())
    }

    pub fn allow_surface_in_view_id(&self) -> BoundaryResult<i32> {
        Ok(self.def()?.allow_surface_in_view_id)
    }

    pub fn set_allow_surface_in_view_id(&mut self, v: i32) -> BoundaryResult<()> {
        self.def_mut()?.allow_surface_in_view_id = v;
        Ok(())
    }

    pub fn custom_shader(&self) -> BoundaryResult<Option<Material>> {
        Ok(self.def()?.custom_shader.map(|d| Material(Decl::new(d))))
    }

    /// `None` clears the shader.
    pub fn set_custom_shader(&mut self, v: Option<&Material>) -> BoundaryResult<()> {
        self.def_mut()?.custom_shader = v.map(|m| m.0.native());
        Ok(())
    }

    pub fn reference_shader(&self) -> BoundaryResult<Option<Material>> {
        Ok(self.def()?.reference_shader.map(|d| Material(Decl::new(d))))
    }

    pub fn set_reference_shader(&mut self, v: Option<&Material>) -> BoundaryResult<()> {
        self.def_mut()?.reference_shader = v.map(|m| m.0.native());
        Ok(())
    }

    pub fn custom_skin(&self) -> BoundaryResult<Option<DeclSkin>> {
        Ok(self.def()?.custom_skin.map(|d| DeclSkin(Decl::new(d))))
    }

    pub fn set_custom_skin(&mut self, v: Option<&DeclSkin>) -> BoundaryResult<()> {
        self.def_mut()?.custom_skin = v.map(|s| s.0.native());
        Ok(())
    }

    pub fn no_self_shadow(&self) -> BoundaryResult<bool> {
        Ok(self.def()?.no_self_shadow)
    }

    pub fn set_no_self_shadow(&mut self, v: bool) -> BoundaryResult<()> {
        self.def_mut()?.no_self_shadow = v;
        Ok(())
    }

    pub fn no_shadow(&self) -> BoundaryResult<bool> {
        Ok(self.def()?.no_shadow)
    }

    pub fn set_no_shadow(&mut self, v: bool) -> BoundaryResult<()> {
        self.def_mut()?.no_shadow = v;
        Ok(())
    }

    pub fn no_dynamic_interactions(&self) -> BoundaryResult<bool> {
        Ok(self.def()?.no_dynamic_interactions)
    }

    pub fn set_no_dynamic_interactions(&mut self, v: bool) -> BoundaryResult<()> {
        self.def_mut()?.no_dynamic_interactions = v;
        Ok(())
    }

    pub fn origin(&self) -> BoundaryResult<Vector3> {
        Ok(vec3_to_vector3(&self.def()?.origin))
    }

    pub fn set_origin(&mut self, v: Vector3) -> BoundaryResult<()> {
        self.def_mut()?.origin = vector3_to_vec3(&v);
        Ok(())
    }

    pub fn axis(&self) -> BoundaryResult<Matrix> {
        Ok(mat3_to_matrix(&self.def()?.axis))
    }

    pub fn set_axis(&mut self, v: &Matrix) -> BoundaryResult<()> {
        self.def_mut()?.axis = matrix_to_mat3(v);
        Ok(())
    }

    pub fn shader_parm(&self, index: usize) -> BoundaryResult<f32> {
        self.def()?
            .shader_parms
            .get(index)
            .copied()
            .ok_or_else(|| shader_parm_range(index))
    }

    pub fn set_shader_parm(&mut self, index: usize, v: f32) -> BoundaryResult<()> {
        let slot = self
            .def_mut()?
            .shader_parms
            .get_mut(index)
            .ok_or_else(|| shader_parm_range(index))?;
        *slot = v;
        Ok(())
    }
}

impl Default for RenderEntity {
    fn default() -> Self {
        Self::new()
    }
}

fn shader_parm_range(index: usize) -> BoundaryError {
    BoundaryError::Marshal {
        what: "shader parm",
        reason: format!("index {} out of range 0..{}", index, MAX_ENTITY_SHADER_PARMS),
    }
}

// ============================================================
// Map files
// ============================================================

/// A map file owned by the module.
pub struct MapFile {
    inner: ScopedPtr<dyn NativeMapFile>,
}

impl MapFile {
    pub fn new(source: &dyn NativeMapFileSource) -> Self {
        Self {
            inner: ScopedPtr::from_box(source.alloc_map_file()),
        }
    }

    pub fn native(&self) -> BoundaryResult<&dyn NativeMapFile> {
        self.inner.get().map(|m| m as &dyn NativeMapFile)
    }

    /// `file_name` without an extension gets `.map` appended.
    pub fn parse(&mut self, file_name: &str, ignore_region: bool, os_path: bool) -> BoundaryResult<bool> {
        let map = self.inner.get_mut()?;
        with_native(file_name, |f| map.parse(f, ignore_region, os_path))
    }

    pub fn remove_primitive_data(&mut self) -> BoundaryResult<()> {
        self.inner.get_mut()?.remove_primitive_data();
        Ok(())
    }

    pub fn entity_count(&self) -> BoundaryResult<i32> {
        Ok(self.native()?.num_entities())
    }

    pub fn entity(&self, index: i32) -> BoundaryResult<Option<MapEntity<'_>>> {
        Ok(self.native()?.entity(index).map(|native| MapEntity { native }))
    }

    pub fn needs_reload(&self) -> BoundaryResult<bool> {
        Ok(self.native()?.needs_reload())
    }

    pub fn name(&self) -> BoundaryResult<String> {
        Ok(from_native(&self.native()?.name()))
    }

    pub fn dispose(&mut self) {
        self.inner.dispose();
    }
}

/// One entity of a map file, borrowed from it.
#[derive(Clone, Copy)]
pub struct MapEntity<'a> {
    native: &'a dyn NativeMapEntity,
}

impl MapEntity<'_> {
    /// A copy of the entity's key/value pairs.
    pub fn dict(&self) -> Dict {
        self.native.epairs().clone()
    }

    pub fn get_string(&self, key: &str) -> String {
        self.native.epairs().get_string(key, "").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtech4_common::host::{DiskFileSystem, GuiTable, MemoryFile};
    use idtech4_common::mapfile::HostMapSource;
    use idtech4_common::native::NativeUiManager;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct World {
        last_view: Mutex<Option<RenderViewDef>>,
        entity: RenderEntityDef,
    }

    impl NativeRenderWorld for World {
        fn set_render_view(&self, view: &RenderViewDef) {
            *self.last_view.lock() = Some(*view);
        }
        fn debug_clear_lines(&self, _time: i32) {}
        fn debug_clear_polygons(&self, _time: i32) {}
        fn get_render_entity(&self, handle: i32) -> Option<RenderEntityDef> {
            (handle == 1).then_some(self.entity)
        }
    }

    #[test]
    fn test_render_entity_copy_is_independent() {
        let mut def = RenderEntityDef::default();
        def.entity_num = 5;
        let world = World {
            last_view: Mutex::new(None),
            entity: def,
        };
        let rw = RenderWorld::new(unsafe { NativeRef::from_ref(&world as &dyn NativeRenderWorld) });

        let mut ent = rw.get_render_entity(1).unwrap();
        assert!(rw.get_render_entity(2).is_none());
        assert_eq!(ent.entity_num().unwrap(), 5);
        ent.set_entity_num(9).unwrap();
        ent.set_origin(Vector3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(world.entity.entity_num, 5);
        assert_eq!(ent.origin().unwrap(), Vector3::new(1.0, 2.0, 3.0));

        ent.dispose();
        assert_eq!(ent.entity_num().unwrap_err(), BoundaryError::Disposed);
        assert_eq!(ent.set_no_shadow(true).unwrap_err(), BoundaryError::Disposed);
    }

    #[test]
    fn test_render_view_round_trip_to_world() {
        let world = World {
            last_view: Mutex::new(None),
            entity: RenderEntityDef::default(),
        };
        let rw = RenderWorld::new(unsafe { NativeRef::from_ref(&world as &dyn NativeRenderWorld) });
        let mut view = RenderView::default();
        view.fov_x = 110.0;
        view.origin = Vector3::new(0.0, 0.0, 64.0);
        rw.set_render_view(&view);
        let sent = (*world.last_view.lock()).unwrap();
        assert_eq!(sent.fov_x, 110.0);
        assert_eq!(sent.vieworg, [0.0, 0.0, 64.0]);
        assert_eq!(RenderView::from_native(&sent), view);
    }

    #[test]
    fn test_shader_setters_store_and_clear() {
        let decls = idtech4_common::host::DeclTable::new();
        decls.define(DeclType::Material, "textures/common/nodraw");
        let mat = Material(Decl::new(
            idtech4_common::native::NativeDeclManager::find_type(
                &decls,
                DeclType::Material,
                c"textures/common/nodraw",
                false,
            )
            .unwrap(),
        ));

        let mut ent = RenderEntity::new();
        ent.set_custom_shader(Some(&mat)).unwrap();
        assert_eq!(ent.custom_shader().unwrap().unwrap().0.name(), "textures/common/nodraw");
        ent.set_custom_shader(None).unwrap();
        assert!(ent.custom_shader().unwrap().is_none());

        ent.set_shader_parm(3, 0.5).unwrap();
        assert_eq!(ent.shader_parm(3).unwrap(), 0.5);
        assert!(ent.set_shader_parm(MAX_ENTITY_SHADER_PARMS, 1.0).is_err());
    }

    #[test]
    fn test_gui_wrapper_marshals_state() {
        let guis = GuiTable::new();
        let gui = UserInterface::new(guis.alloc().unwrap());
        assert!(gui.init_from_file("guis/mainmenu.gui", false, true).unwrap());
        gui.set_state_string("title", "Main").unwrap();
        gui.set_state_bool("visible", true).unwrap();
        assert_eq!(gui.state_string("title").unwrap(), "Main");
        assert_eq!(gui.state_string("visible").unwrap(), "1");
        assert_eq!(
            gui.set_state_string("bad\0key", "x").unwrap_err(),
            BoundaryError::InteriorNul { position: 3 }
        );
    }

    #[test]
    fn test_file_handles() {
        let mut owned = FileHandle::from_owned(Box::new(MemoryFile::new("a.txt", b"abc".to_vec())));
        assert_eq!(owned.read_to_end().unwrap(), b"abc");
        assert!(!owned.is_closed());
        assert!(owned.release().is_some());
        assert!(owned.is_closed());
        assert_eq!(owned.length().unwrap_err(), BoundaryError::Disposed);

        let engine_file = MemoryFile::new("save.sav", vec![1, 2]);
        let mut borrowed =
            FileHandle::from_engine(unsafe { NativeRef::from_ref(&engine_file as &dyn NativeFile) });
        assert_eq!(borrowed.length().unwrap(), 2);
        assert!(borrowed.release().is_none());
        assert!(!borrowed.is_closed());
    }

    #[test]
    fn test_map_file_wrapper() {
        let root = std::env::temp_dir().join(format!("idtech4-game-map-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("base/maps")).unwrap();
        std::fs::write(
            root.join("base/maps/box.map"),
            "Version 2\n{\n\"classname\" \"worldspawn\"\n}\n{\n\"classname\" \"info_player_start\"\n\"origin\" \"0 0 8\"\n}\n",
        )
        .unwrap();

        let source = HostMapSource::new(Arc::new(DiskFileSystem::new(&root)));
        let mut map = MapFile::new(&source);
        assert!(map.parse("maps/box", false, false).unwrap());
        assert_eq!(map.entity_count().unwrap(), 2);
        let start = map.entity(1).unwrap().unwrap();
        assert_eq!(start.get_string("classname"), "info_player_start");
        let mut copy = start.dict();
        copy.set("origin", "1 1 1");
        assert_eq!(map.entity(1).unwrap().unwrap().get_string("origin"), "0 0 8");

        map.dispose();
        assert_eq!(map.entity_count().unwrap_err(), BoundaryError::Disposed);
        let _ = std::fs::remove_dir_all(&root);
    }
}
