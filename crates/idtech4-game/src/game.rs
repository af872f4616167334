// game.rs -- The contract a game module implements
//
// `Game` is what the engine's idGame entry points are forwarded to. The
// thirteen required methods are the ones every module must handle; the
// remaining entry points are provided methods returning `None`, which tells
// the proxy to take its logged placeholder path. `GameEdit` covers the
// editor interface the same way, with every method optional.

use std::sync::Arc;

use idtech4_common::bitmsg::BitMsg;
use idtech4_common::dict::Dict;
use idtech4_common::marshal::{copy_to_fixed, Angles, Matrix, Vector3};
use idtech4_common::native::{gameReturn_t, usercmd_t, RefSoundDef, RenderLightDef};

use crate::handles::{FileHandle, RenderEntity, RenderModel, RenderWorld, SoundWorld, UserInterface};
use crate::services::GameServices;

pub use idtech4_common::native::{AllowReply, AnimHandle, EntityHandle, EscReply, JointMat};

// ============================================================
// Frame snapshots
// ============================================================

/// One client's input for a game frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCommand {
    pub game_frame: i32,
    pub game_time: i32,
    pub duplicate_count: i32,
    pub buttons: u8,
    pub forward_move: i8,
    pub right_move: i8,
    pub up_move: i8,
    pub angles: [i16; 3],
    pub mx: i16,
    pub my: i16,
    pub impulse: i8,
    pub flags: u8,
    pub sequence: i32,
}

impl From<&usercmd_t> for UserCommand {
    fn from(cmd: &usercmd_t) -> Self {
        Self {
            game_frame: cmd.gameFrame,
            game_time: cmd.gameTime,
            duplicate_count: cmd.duplicateCount,
            buttons: cmd.buttons,
            forward_move: cmd.forwardmove,
            right_move: cmd.rightmove,
            up_move: cmd.upmove,
            angles: cmd.angles,
            mx: cmd.mx,
            my: cmd.my,
            impulse: cmd.impulse,
            flags: cmd.flags,
            sequence: cmd.sequence,
        }
    }
}

/// What the game reports back after a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameReturn {
    /// Session command for the engine ("endOfGame", "map ..."), if any.
    pub session_command: Option<String>,
    pub consistency_hash: i32,
    pub health: i32,
    pub heart_rate: i32,
    pub stamina: i32,
    pub combat: i32,
    pub sync_next_game_frame: bool,
}

impl GameReturn {
    /// Fill the native struct. The session command is truncated to fit.
    pub fn to_native(&self) -> gameReturn_t {
        let mut ret = gameReturn_t::default();
        if let Some(cmd) = &self.session_command {
            copy_to_fixed(&mut ret.sessionCommand, cmd);
        }
        ret.consistencyHash = self.consistency_hash;
        ret.health = self.health;
        ret.heartRate = self.heart_rate;
        ret.stamina = self.stamina;
        ret.combat = self.combat;
        ret.syncNextGameFrame = self.sync_next_game_frame;
        ret
    }
}

// ============================================================
// idGame
// ============================================================

pub trait Game: Send {
    /// Called once, right after the module is instantiated.
    fn init(&mut self, services: Arc<GameServices>);

    fn init_from_new_map(
        &mut self,
        map_name: &str,
        render_world: Option<RenderWorld>,
        sound_world: Option<SoundWorld>,
        is_server: bool,
        is_client: bool,
        random_seed: i32,
    );

    /// `cmds` holds one command per client slot.
    fn run_frame(&mut self, cmds: &[UserCommand]) -> GameReturn;

    /// Returns false when nothing was drawn for `client`.
    fn draw(&mut self, client: i32) -> bool;

    fn cache_dictionary_media(&mut self, dict: &Dict);

    fn handle_main_menu_commands(&mut self, command: &str, gui: Option<UserInterface>);

    /// `default_gui` is the gui the engine would use otherwise.
    fn get_map_loading_gui(&mut self, default_gui: &str) -> String;

    fn get_best_game_type(&mut self, map: &str, game_type: &str) -> String;

    fn set_local_client(&mut self, client: i32);

    fn set_server_info(&mut self, server_info: &Dict);

    /// Returns the corrected user info when the game changed it.
    fn set_user_info(
        &mut self,
        client: i32,
        user_info: &Dict,
        is_client: bool,
        can_modify: bool,
    ) -> Option<Dict>;

    fn server_client_connect(&mut self, client: i32, guid: &str);

    fn server_client_begin(&mut self, client: i32);

    // ---- optional entry points, `None` = not handled ----

    fn shutdown(&mut self) -> Option<()> {
        None
    }

    fn throttle_user_info(&mut self) -> Option<()> {
        None
    }

    /// `Some(None)` means the client slot has no user info.
    fn get_user_info(&mut self, _client: i32) -> Option<Option<Dict>> {
        None
    }

    fn get_persistent_player_info(&mut self, _client: i32) -> Option<Dict> {
        None
    }

    fn set_persistent_player_info(&mut self, _client: i32, _info: &Dict) -> Option<()> {
        None
    }

    fn init_from_save_game(
        &mut self,
        _map_name: &str,
        _render_world: Option<RenderWorld>,
        _sound_world: Option<SoundWorld>,
        _save_file: &mut FileHandle,
    ) -> Option<bool> {
        None
    }

    fn save_game(&mut self, _save_file: &mut FileHandle) -> Option<()> {
        None
    }

    fn map_shutdown(&mut self) -> Option<()> {
        None
    }

    fn spawn_player(&mut self, _client: i32) -> Option<()> {
        None
    }

    /// The reply, plus the gui to show for `EscReply::Gui`.
    fn handle_esc(&mut self) -> Option<(EscReply, Option<UserInterface>)> {
        None
    }

    fn start_menu(&mut self) -> Option<Option<UserInterface>> {
        None
    }

    /// Command for the engine to run after a gui event, if any.
    fn handle_gui_commands(&mut self, _command: &str) -> Option<Option<String>> {
        None
    }

    /// The reply and, on refusal, the reason shown to the client.
    fn server_allow_client(
        &mut self,
        _num_clients: i32,
        _ip: &str,
        _guid: &str,
        _password: &str,
    ) -> Option<(AllowReply, String)> {
        None
    }

    fn server_client_disconnect(&mut self, _client: i32) -> Option<()> {
        None
    }

    fn server_write_initial_reliable_messages(&mut self, _client: i32) -> Option<()> {
        None
    }

    /// `clients_in_pvs` is a bit field of the clients the snapshot's owner
    /// can see.
    fn server_write_snapshot(
        &mut self,
        _client: i32,
        _sequence: i32,
        _msg: &mut BitMsg,
        _clients_in_pvs: &[u8],
    ) -> Option<()> {
        None
    }

    fn server_apply_snapshot(&mut self, _client: i32, _sequence: i32) -> Option<bool> {
        None
    }

    fn server_process_reliable_message(&mut self, _client: i32, _msg: &BitMsg) -> Option<()> {
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn client_read_snapshot(
        &mut self,
        _client: i32,
        _sequence: i32,
        _game_frame: i32,
        _game_time: i32,
        _dupe_usercmds: i32,
        _ahead_of_server: i32,
        _msg: &BitMsg,
    ) -> Option<()> {
        None
    }

    fn client_apply_snapshot(&mut self, _client: i32, _sequence: i32) -> Option<bool> {
        None
    }

    fn client_process_reliable_message(&mut self, _client: i32, _msg: &BitMsg) -> Option<()> {
        None
    }

    fn client_prediction(
        &mut self,
        _client: i32,
        _cmds: &[UserCommand],
        _last_predict_frame: bool,
    ) -> Option<GameReturn> {
        None
    }

    /// Scoreboard text for `client`; the proxy truncates it to `max_len`.
    fn get_client_stats(&mut self, _client: i32, _max_len: usize) -> Option<String> {
        None
    }

    fn switch_team(&mut self, _client: i32, _team: i32) -> Option<()> {
        None
    }

    /// Whether the client may download `paks`, and the url list to send.
    fn download_request(&mut self, _ip: &str, _guid: &str, _paks: &str) -> Option<(bool, String)> {
        None
    }

    fn select_time_group(&mut self, _time_group: i32) -> Option<()> {
        None
    }

    fn get_time_group_time(&mut self, _time_group: i32) -> Option<i32> {
        None
    }
}

// ============================================================
// idGameEdit
// ============================================================

/// Mesh built for an articulated figure.
#[derive(Debug, Clone, Copy)]
pub struct AfMesh {
    pub model: Option<RenderModel>,
    pub origin: Vector3,
    pub axis: Matrix,
    pub pose_is_set: bool,
}

/// Editor entry points. Everything is optional; `None` makes the proxy log
/// the call and return the inert default.
pub trait GameEdit: Send {
    fn get_selected_entities(&mut self, _max: usize) -> Option<Vec<EntityHandle>> {
        None
    }

    fn trigger_selected(&mut self) -> Option<()> {
        None
    }

    fn clear_entity_selection(&mut self) -> Option<()> {
        None
    }

    fn add_selected_entity(&mut self, _ent: EntityHandle) -> Option<()> {
        None
    }

    fn find_entity_def_dict(&mut self, _name: &str, _make_default: bool) -> Option<Dict> {
        None
    }

    fn spawn_entity_def(&mut self, _args: &Dict) -> Option<EntityHandle> {
        None
    }

    fn find_entity(&mut self, _name: &str) -> Option<EntityHandle> {
        None
    }

    fn get_unique_entity_name(&mut self, _classname: &str) -> Option<String> {
        None
    }

    // ---- entities ----

    fn entity_get_origin(&mut self, _ent: EntityHandle) -> Option<Vector3> {
        None
    }

    fn entity_get_axis(&mut self, _ent: EntityHandle) -> Option<Matrix> {
        None
    }

    fn entity_set_origin(&mut self, _ent: EntityHandle, _origin: Vector3) -> Option<()> {
        None
    }

    fn entity_set_axis(&mut self, _ent: EntityHandle, _axis: &Matrix) -> Option<()> {
        None
    }

    fn entity_set_color(&mut self, _ent: EntityHandle, _color: Vector3) -> Option<()> {
        None
    }

    fn entity_translate(&mut self, _ent: EntityHandle, _offset: Vector3) -> Option<()> {
        None
    }

    fn entity_get_spawn_args(&mut self, _ent: EntityHandle) -> Option<Dict> {
        None
    }

    fn entity_update_changeable_spawn_args(
        &mut self,
        _ent: EntityHandle,
        _dict: Option<&Dict>,
    ) -> Option<()> {
        None
    }

    fn entity_change_spawn_args(&mut self, _ent: EntityHandle, _new_args: &Dict) -> Option<()> {
        None
    }

    fn entity_update_visuals(&mut self, _ent: EntityHandle) -> Option<()> {
        None
    }

    fn entity_set_model(&mut self, _ent: EntityHandle, _model: &str) -> Option<()> {
        None
    }

    fn entity_stop_sound(&mut self, _ent: EntityHandle) -> Option<()> {
        None
    }

    fn entity_delete(&mut self, _ent: EntityHandle) -> Option<()> {
        None
    }

    // ---- local player ----

    fn player_is_valid(&mut self) -> Option<bool> {
        None
    }

    fn player_get_origin(&mut self) -> Option<Vector3> {
        None
    }

    fn player_get_axis(&mut self) -> Option<Matrix> {
        None
    }

    fn player_get_view_angles(&mut self) -> Option<Angles> {
        None
    }

    fn player_get_eye_position(&mut self) -> Option<Vector3> {
        None
    }

    // ---- map entities ----

    fn map_get_entity_dict(&mut self, _name: &str) -> Option<Dict> {
        None
    }

    /// `None` saves over the loaded map.
    fn map_save(&mut self, _path: Option<&str>) -> Option<()> {
        None
    }

    fn map_set_entity_key_val(&mut self, _name: &str, _key: &str, _value: &str) -> Option<()> {
        None
    }

    fn map_copy_dict_to_entity(&mut self, _name: &str, _dict: &Dict) -> Option<()> {
        None
    }

    fn map_get_unique_matching_key_vals(&mut self, _key: &str, _max: usize) -> Option<Vec<String>> {
        None
    }

    fn map_add_entity(&mut self, _dict: &Dict) -> Option<()> {
        None
    }

    fn map_remove_entity(&mut self, _name: &str) -> Option<()> {
        None
    }

    fn map_get_entities_matching_class_with_string(
        &mut self,
        _classname: &str,
        _matching: &str,
        _max: usize,
    ) -> Option<Vec<String>> {
        None
    }

    fn map_entity_translate(&mut self, _name: &str, _offset: Vector3) -> Option<()> {
        None
    }

    // ---- articulated figures ----

    fn af_spawn_entity(&mut self, _file_name: &str) -> Option<bool> {
        None
    }

    fn af_update_entities(&mut self, _file_name: &str) -> Option<()> {
        None
    }

    fn af_undo_changes(&mut self) -> Option<()> {
        None
    }

    fn af_create_mesh(&mut self, _args: &Dict) -> Option<AfMesh> {
        None
    }

    // ---- animation ----

    fn anim_get_model_from_entity_def(&mut self, _classname: &str) -> Option<RenderModel> {
        None
    }

    fn anim_get_model_offset_from_entity_def(&mut self, _classname: &str) -> Option<Vector3> {
        None
    }

    fn anim_get_model_from_entity_def_args(&mut self, _args: &Dict) -> Option<RenderModel> {
        None
    }

    fn anim_get_model_from_name(&mut self, _model_name: &str) -> Option<RenderModel> {
        None
    }

    fn anim_get_anim_from_entity_def(&mut self, _classname: &str, _anim_name: &str) -> Option<AnimHandle> {
        None
    }

    fn anim_get_num_anims_from_entity_def(&mut self, _args: &Dict) -> Option<i32> {
        None
    }

    fn anim_get_anim_name_from_entity_def(&mut self, _args: &Dict, _anim_num: i32) -> Option<String> {
        None
    }

    fn anim_get_anim(&mut self, _file_name: &str) -> Option<AnimHandle> {
        None
    }

    /// Length in milliseconds.
    fn anim_get_length(&mut self, _anim: AnimHandle) -> Option<i32> {
        None
    }

    fn anim_get_num_frames(&mut self, _anim: AnimHandle) -> Option<i32> {
        None
    }

    /// Joint transforms for `anim` at `time`, at most `num_joints` of them.
    fn anim_create_anim_frame(
        &mut self,
        _model: RenderModel,
        _anim: AnimHandle,
        _num_joints: usize,
        _time: i32,
        _offset: Vector3,
        _remove_origin_offset: bool,
    ) -> Option<Vec<JointMat>> {
        None
    }

    fn anim_create_mesh_for_anim(
        &mut self,
        _model: RenderModel,
        _classname: &str,
        _anim_name: &str,
        _frame: i32,
        _remove_origin_offset: bool,
    ) -> Option<RenderModel> {
        None
    }

    // ---- spawn arg parsing ----

    fn parse_spawn_args_to_render_light(&mut self, _args: &Dict) -> Option<RenderLightDef> {
        None
    }

    fn parse_spawn_args_to_render_entity(&mut self, _args: &Dict) -> Option<RenderEntity> {
        None
    }

    fn parse_spawn_args_to_ref_sound(&mut self, _args: &Dict) -> Option<RefSoundDef> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idtech4_common::marshal::read_fixed;
    use idtech4_common::native::MAX_STRING_CHARS;

    #[test]
    fn test_user_command_from_native() {
        let native = usercmd_t {
            gameFrame: 10,
            gameTime: 160,
            buttons: 1,
            forwardmove: 127,
            rightmove: -127,
            angles: [100, -200, 0],
            impulse: 3,
            sequence: 42,
            ..usercmd_t::default()
        };
        let cmd = UserCommand::from(&native);
        assert_eq!(cmd.game_frame, 10);
        assert_eq!(cmd.forward_move, 127);
        assert_eq!(cmd.right_move, -127);
        assert_eq!(cmd.angles, [100, -200, 0]);
        assert_eq!(cmd.sequence, 42);
    }

    #[test]
    fn test_game_return_to_native() {
        let ret = GameReturn {
            session_command: Some("endOfGame".to_string()),
            consistency_hash: 0x1234,
            health: 75,
            sync_next_game_frame: true,
            ..GameReturn::default()
        };
        let native = ret.to_native();
        assert_eq!(read_fixed(&native.sessionCommand), "endOfGame");
        assert_eq!(native.consistencyHash, 0x1234);
        assert_eq!(native.health, 75);
        assert!(native.syncNextGameFrame);

        assert_eq!(read_fixed(&GameReturn::default().to_native().sessionCommand), "");
    }

    #[test]
    fn test_long_session_command_is_truncated() {
        let ret = GameReturn {
            session_command: Some("x".repeat(MAX_STRING_CHARS * 2)),
            ..GameReturn::default()
        };
        let native = ret.to_native();
        assert_eq!(read_fixed(&native.sessionCommand).len(), MAX_STRING_CHARS - 1);
        assert_eq!(native.sessionCommand[MAX_STRING_CHARS - 1], 0);
    }

    struct NoEdit;
    impl GameEdit for NoEdit {}

    #[test]
    fn test_game_edit_defaults_are_unhandled() {
        let mut edit = NoEdit;
        assert!(edit.get_selected_entities(8).is_none());
        assert!(edit.player_is_valid().is_none());
        assert!(edit.map_get_entity_dict("light_1").is_none());
        assert!(edit.anim_get_length(AnimHandle(1)).is_none());
        assert!(edit.parse_spawn_args_to_ref_sound(&Dict::new()).is_none());
    }
}
