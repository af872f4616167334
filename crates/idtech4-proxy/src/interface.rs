// interface.rs -- What the engine calls
//
// `GameInterface` and `GameEditInterface` are the engine-facing contracts,
// expressed in native types: C strings, engine views, fixed output buffers
// and the repr(C) snapshot structs. References returned from these methods
// stay valid until the next call on the same object.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use idtech4_common::bitmsg::BitMsg;
use idtech4_common::dict::Dict;
use idtech4_common::marshal::{Angles, Mat3, Vec3};
use idtech4_common::native::{
    gameReturn_t, usercmd_t, AllowReply, AnimHandle, EntityHandle, EscReply, JointMat, NativeFile,
    NativeRef, NativeRenderModel, NativeRenderWorld, NativeSoundWorld, NativeUserInterface,
    RefSoundDef, RenderEntityDef, RenderLightDef, MAX_STRING_CHARS,
};

pub type RenderWorldRef = NativeRef<dyn NativeRenderWorld>;
pub type SoundWorldRef = NativeRef<dyn NativeSoundWorld>;
pub type GuiRef = NativeRef<dyn NativeUserInterface>;
pub type FileRef = NativeRef<dyn NativeFile>;
pub type RenderModelRef = NativeRef<dyn NativeRenderModel>;

/// A fixed `char[MAX_STRING_CHARS]` output buffer.
pub type StringBuf = [c_char; MAX_STRING_CHARS];

// ============================================================
// idGame
// ============================================================

pub trait GameInterface {
    /// Called once at startup, not on each level load.
    fn init(&mut self);
    fn shutdown(&mut self);

    fn save_game(&mut self, save_file: FileRef);
    fn get_persistent_player_info(&mut self, client: i32) -> &Dict;
    fn set_persistent_player_info(&mut self, client: i32, player_info: &Dict);

    fn set_local_client(&mut self, client: i32);
    /// Returns the corrected user info, if the game changed it.
    fn set_user_info(
        &mut self,
        client: i32,
        user_info: &Dict,
        is_client: bool,
        can_modify: bool,
    ) -> Option<&Dict>;
    fn get_user_info(&mut self, client: i32) -> Option<&Dict>;
    fn set_server_info(&mut self, server_info: &Dict);

    fn init_from_new_map(
        &mut self,
        map_name: &CStr,
        render_world: Option<RenderWorldRef>,
        sound_world: Option<SoundWorldRef>,
        is_server: bool,
        is_client: bool,
        random_seed: i32,
    );
    fn init_from_save_game(
        &mut self,
        map_name: &CStr,
        render_world: Option<RenderWorldRef>,
        sound_world: Option<SoundWorldRef>,
        save_file: FileRef,
    ) -> bool;
    fn map_shutdown(&mut self);
    fn cache_dictionary_media(&mut self, dict: &Dict);
    fn spawn_player(&mut self, client: i32);

    /// `client_cmds` has one entry per client slot.
    fn run_frame(&mut self, client_cmds: &[usercmd_t]) -> gameReturn_t;
    fn draw(&mut self, client: i32) -> bool;

    /// `gui` receives the gui to show for `EscReply::Gui`.
    fn handle_esc(&mut self, gui: &mut Option<GuiRef>) -> EscReply;
    fn start_menu(&mut self) -> Option<GuiRef>;
    fn handle_gui_commands(&mut self, menu_command: &CStr) -> Option<&CStr>;
    fn handle_main_menu_commands(&mut self, menu_command: &CStr, gui: Option<GuiRef>);

    fn throttle_user_info(&mut self);
    fn select_time_group(&mut self, time_group: i32);
    fn get_time_group_time(&mut self, time_group: i32) -> i32;
    fn get_best_game_type(&mut self, map: &CStr, game_type: &CStr, buf: &mut StringBuf);
    fn get_client_stats(&mut self, client: i32, data: &mut [c_char]);
    fn switch_team(&mut self, client: i32, team: i32);
    /// `gui` holds the default on entry and the chosen gui on return.
    fn get_map_loading_gui(&mut self, gui: &mut StringBuf);

    fn client_apply_snapshot(&mut self, client: i32, sequence: i32) -> bool;
    #[allow(clippy::too_many_arguments)]
    fn client_read_snapshot(
        &mut self,
        client: i32,
        sequence: i32,
        game_frame: i32,
        game_time: i32,
        dupe_usercmds: i32,
        ahead_of_server: i32,
        msg: &BitMsg,
    );
    fn client_process_reliable_message(&mut self, client: i32, msg: &BitMsg);
    fn client_prediction(
        &mut self,
        client: i32,
        client_cmds: &[usercmd_t],
        last_predict_frame: bool,
    ) -> gameReturn_t;
    fn download_request(&mut self, ip: &CStr, guid: &CStr, paks: &CStr, urls: &mut StringBuf) -> bool;

    fn server_allow_client(
        &mut self,
        num_clients: i32,
        ip: &CStr,
        guid: &CStr,
        password: &CStr,
        reason: &mut StringBuf,
    ) -> AllowReply;
    fn server_client_connect(&mut self, client: i32, guid: &CStr);
    fn server_client_begin(&mut self, client: i32);
    fn server_client_disconnect(&mut self, client: i32);
    fn server_apply_snapshot(&mut self, client: i32, sequence: i32) -> bool;
    fn server_write_initial_reliable_messages(&mut self, client: i32);
    fn server_write_snapshot(&mut self, client: i32, sequence: i32, msg: &mut BitMsg, clients_in_pvs: &[u8]);
    fn server_process_reliable_message(&mut self, client: i32, msg: &BitMsg);
}

// ============================================================
// idGameEdit
// ============================================================

pub trait GameEditInterface {
    /// Fills `list` and returns how many entries were written.
    fn get_selected_entities(&mut self, list: &mut [EntityHandle]) -> i32;
    fn trigger_selected(&mut self);
    fn clear_entity_selection(&mut self);
    fn add_selected_entity(&mut self, ent: EntityHandle);

    fn find_entity_def_dict(&mut self, name: &CStr, make_default: bool) -> Option<&Dict>;
    fn spawn_entity_def(&mut self, args: &Dict) -> Option<EntityHandle>;
    fn find_entity(&mut self, name: &CStr) -> Option<EntityHandle>;
    fn get_unique_entity_name(&mut self, classname: &CStr) -> Option<&CStr>;

    fn entity_get_origin(&mut self, ent: EntityHandle, org: &mut Vec3);
    fn entity_get_axis(&mut self, ent: EntityHandle, axis: &mut Mat3);
    fn entity_set_origin(&mut self, ent: EntityHandle, org: &Vec3);
    fn entity_set_axis(&mut self, ent: EntityHandle, axis: &Mat3);
    fn entity_set_color(&mut self, ent: EntityHandle, color: &Vec3);
    fn entity_translate(&mut self, ent: EntityHandle, org: &Vec3);
    fn entity_get_spawn_args(&mut self, ent: EntityHandle) -> Option<&Dict>;
    fn entity_update_changeable_spawn_args(&mut self, ent: EntityHandle, dict: Option<&Dict>);
    fn entity_change_spawn_args(&mut self, ent: EntityHandle, new_args: &Dict);
    fn entity_update_visuals(&mut self, ent: EntityHandle);
    fn entity_set_model(&mut self, ent: EntityHandle, model: &CStr);
    fn entity_stop_sound(&mut self, ent: EntityHandle);
    fn entity_delete(&mut self, ent: EntityHandle);

    fn player_is_valid(&mut self) -> bool;
    fn player_get_origin(&mut self, org: &mut Vec3);
    fn player_get_axis(&mut self, axis: &mut Mat3);
    fn player_get_view_angles(&mut self, angles: &mut Angles);
    fn player_get_eye_position(&mut self, org: &mut Vec3);

    fn map_get_entity_dict(&mut self, name: &CStr) -> Option<&Dict>;
    fn map_save(&mut self, path: Option<&CStr>);
    fn map_set_entity_key_val(&mut self, name: &CStr, key: &CStr, val: &CStr);
    fn map_copy_dict_to_entity(&mut self, name: &CStr, dict: &Dict);
    fn map_get_unique_matching_key_vals(&mut self, key: &CStr, max: usize) -> &[CString];
    fn map_add_entity(&mut self, dict: &Dict);
    fn map_remove_entity(&mut self, name: &CStr);
    fn map_get_entities_matching_class_with_string(
        &mut self,
        classname: &CStr,
        matching: &CStr,
        max: usize,
    ) -> &[CString];
    fn map_entity_translate(&mut self, name: &CStr, v: &Vec3);

    fn af_spawn_entity(&mut self, file_name: &CStr) -> bool;
    fn af_update_entities(&mut self, file_name: &CStr);
    fn af_undo_changes(&mut self);
    fn af_create_mesh(
        &mut self,
        args: &Dict,
        mesh_origin: &mut Vec3,
        mesh_axis: &mut Mat3,
        pose_is_set: &mut bool,
    ) -> Option<RenderModelRef>;

    fn anim_get_model_from_entity_def(&mut self, classname: &CStr) -> Option<RenderModelRef>;
    fn anim_get_model_offset_from_entity_def(&mut self, classname: &CStr) -> Vec3;
    fn anim_get_model_from_entity_def_args(&mut self, args: &Dict) -> Option<RenderModelRef>;
    fn anim_get_model_from_name(&mut self, model_name: &CStr) -> Option<RenderModelRef>;
    fn anim_get_anim_from_entity_def(&mut self, classname: &CStr, anim_name: &CStr) -> Option<AnimHandle>;
    fn anim_get_num_anims_from_entity_def(&mut self, args: &Dict) -> i32;
    fn anim_get_anim_name_from_entity_def(&mut self, args: &Dict, anim_num: i32) -> Option<&CStr>;
    fn anim_get_anim(&mut self, file_name: &CStr) -> Option<AnimHandle>;
    fn anim_get_length(&mut self, anim: Option<AnimHandle>) -> i32;
    fn anim_get_num_frames(&mut self, anim: Option<AnimHandle>) -> i32;
    /// Writes one transform per entry of `frame`.
    fn anim_create_anim_frame(
        &mut self,
        model: RenderModelRef,
        anim: Option<AnimHandle>,
        frame: &mut [JointMat],
        time: i32,
        offset: &Vec3,
        remove_origin_offset: bool,
    );
    fn anim_create_mesh_for_anim(
        &mut self,
        model: RenderModelRef,
        classname: &CStr,
        anim_name: &CStr,
        frame: i32,
        remove_origin_offset: bool,
    ) -> Option<RenderModelRef>;

    fn parse_spawn_args_to_render_light(&mut self, args: &Dict, render_light: &mut RenderLightDef);
    fn parse_spawn_args_to_render_entity(&mut self, args: &Dict, render_entity: &mut RenderEntityDef);
    fn parse_spawn_args_to_ref_sound(&mut self, args: &Dict, ref_sound: &mut RefSoundDef);
}
