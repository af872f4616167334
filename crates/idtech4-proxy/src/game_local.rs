// game_local.rs -- The engine's view of the game module
//
// `GameLocal` and `GameEditLocal` implement the engine-facing interfaces by
// marshaling each call into the loaded module. Entry points the module does
// not handle log "PROXY - <class>::<Name>()" on the developer console and
// return an inert default. Panics and boundary faults never reach the
// engine: they are reported as warnings and the inert default is returned.

use std::any::Any;
use std::ffi::{CStr, CString};
use std::fmt::Display;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use idtech4_common::bitmsg::BitMsg;
use idtech4_common::common::{com_dprintf, com_error, com_warning};
use idtech4_common::dict::Dict;
use idtech4_common::marshal::{
    copy_to_fixed, from_native, mat3_to_matrix, matrix_to_mat3, read_fixed, to_native,
    vec3_to_vector3, vector3_to_vec3, Angles, Mat3, Vec3,
};
use idtech4_common::native::{
    gameReturn_t, usercmd_t, AllowReply, AnimHandle, EntityHandle, EscReply, JointMat,
    NativeCommon, RefSoundDef, RenderEntityDef, RenderLightDef,
};
use idtech4_common::BoundaryResult;
use idtech4_game::handles::{FileHandle, RenderModel, RenderWorld, SoundWorld, UserInterface};
use idtech4_game::{Game, GameEdit, GameServices, UserCommand};

use crate::interface::{
    FileRef, GameEditInterface, GameInterface, GuiRef, RenderModelRef, RenderWorldRef,
    SoundWorldRef, StringBuf,
};
use crate::loader::{ModuleSlot, ModuleSource};

// ============================================================
// Dispatch
// ============================================================

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("game module panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("game module panicked: {}", s)
    } else {
        "game module panicked".to_string()
    }
}

/// Runs calls against the module slot on behalf of one engine interface.
struct Dispatch {
    class: &'static str,
    slot: Arc<Mutex<ModuleSlot>>,
    common: Arc<dyn NativeCommon>,
}

impl Dispatch {
    fn placeholder(&self, name: &str) {
        com_dprintf(self.common.as_ref(), &format!("PROXY - {}::{}()\n", self.class, name));
    }

    fn fault(&self, name: &str, err: &dyn Display) {
        com_warning(self.common.as_ref(), &format!("{}::{}: {}\n", self.class, name, err));
    }

    fn run<T>(
        &self,
        name: &str,
        default: T,
        call: impl FnOnce(&mut ModuleSlot) -> BoundaryResult<Option<T>>,
    ) -> T {
        let mut slot = self.slot.lock();
        match panic::catch_unwind(AssertUnwindSafe(|| call(&mut *slot))) {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => {
                self.placeholder(name);
                default
            }
            Ok(Err(err)) => {
                self.fault(name, &err);
                default
            }
            Err(payload) => {
                self.fault(name, &panic_message(payload.as_ref()));
                default
            }
        }
    }

    fn game<T>(&self, name: &str, default: T, call: impl FnOnce(&mut dyn Game) -> Option<T>) -> T {
        self.run(name, default, |slot| Ok(call(slot.game()?)))
    }

    fn edit<T>(&self, name: &str, default: T, call: impl FnOnce(&mut dyn GameEdit) -> Option<T>) -> T {
        self.run(name, default, |slot| {
            Ok(match slot.edit()? {
                Some(edit) => call(edit),
                None => None,
            })
        })
    }

    /// Marshal a string result, reporting a fault instead of returning it
    /// when it cannot cross.
    fn c_string(&self, name: &str, s: &str) -> Option<CString> {
        match to_native(s) {
            Ok(c) => Some(c),
            Err(err) => {
                self.fault(name, &err);
                None
            }
        }
    }

    /// At most `max` strings, dropping any that cannot cross.
    fn c_strings(&self, name: &str, list: Vec<String>, max: usize) -> Vec<CString> {
        list.iter()
            .take(max)
            .filter_map(|s| self.c_string(name, s))
            .collect()
    }
}

fn user_commands(cmds: &[usercmd_t]) -> Vec<UserCommand> {
    cmds.iter().map(UserCommand::from).collect()
}

// ============================================================
// idGameLocal
// ============================================================

pub struct GameLocal {
    dispatch: Dispatch,
    services: Arc<GameServices>,
    source: ModuleSource,
    persistent_info: Dict,
    new_info: Dict,
    user_info: Dict,
    gui_command: CString,
}

impl GameLocal {
    /// A proxy that loads its module from `source` on `init`.
    pub fn new(services: Arc<GameServices>, source: ModuleSource) -> Self {
        Self {
            dispatch: Dispatch {
                class: "idGameLocal",
                slot: Arc::new(Mutex::new(ModuleSlot::new())),
                common: Arc::clone(services.console().native()),
            },
            services,
            source,
            persistent_info: Dict::new(),
            new_info: Dict::new(),
            user_info: Dict::new(),
            gui_command: CString::default(),
        }
    }

    /// The editor interface of the same module.
    pub fn edit_interface(&self) -> GameEditLocal {
        GameEditLocal::new(
            Arc::clone(&self.dispatch.slot),
            Arc::clone(&self.dispatch.common),
        )
    }

    pub fn services(&self) -> &Arc<GameServices> {
        &self.services
    }

    pub fn is_loaded(&self) -> bool {
        self.dispatch.slot.lock().is_loaded()
    }

    /// Load the module and initialize it. Fails with `AlreadyLoaded` when
    /// called twice.
    pub fn try_init(&mut self) -> BoundaryResult<()> {
        let mut slot = self.dispatch.slot.lock();
        slot.load(&self.source, &self.services).map(|_| ())
    }
}

impl GameInterface for GameLocal {
    fn init(&mut self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.try_init()));
        let message = match result {
            Ok(Ok(())) => return,
            Ok(Err(err)) => format!("Game module failed to load: {}", err),
            Err(payload) => format!("Game module failed to initialize: {}", panic_message(payload.as_ref())),
        };
        com_error(self.dispatch.common.as_ref(), &message);
    }

    fn shutdown(&mut self) {
        self.dispatch.game("Shutdown", (), |g| g.shutdown())
    }

    fn save_game(&mut self, save_file: FileRef) {
        self.dispatch.game("SaveGame", (), |g| {
            let mut file = FileHandle::from_engine(save_file);
            g.save_game(&mut file)
        })
    }

    fn get_persistent_player_info(&mut self, client: i32) -> &Dict {
        self.persistent_info = self.dispatch.game("GetPersistentPlayerInfo", Dict::new(), |g| {
            g.get_persistent_player_info(client)
        });
        &self.persistent_info
    }

    fn set_persistent_player_info(&mut self, client: i32, player_info: &Dict) {
        self.dispatch.game("SetPersistentPlayerInfo", (), |g| {
            g.set_persistent_player_info(client, player_info)
        })
    }

    fn set_local_client(&mut self, client: i32) {
        self.dispatch.game("SetLocalClient", (), |g| {
            g.set_local_client(client);
            Some(())
        })
    }

    fn set_user_info(
        &mut self,
        client: i32,
        user_info: &Dict,
        is_client: bool,
        can_modify: bool,
    ) -> Option<&Dict> {
        let changed = self.dispatch.game("SetUserInfo", None, |g| {
            Some(g.set_user_info(client, user_info, is_client, can_modify))
        })?;
        self.new_info = changed;
        Some(&self.new_info)
    }

    fn get_user_info(&mut self, client: i32) -> Option<&Dict> {
        let info = self.dispatch.game("GetUserInfo", None, |g| g.get_user_info(client))?;
        self.user_info = info;
        Some(&self.user_info)
    }

    fn set_server_info(&mut self, server_info: &Dict) {
        self.dispatch.game("SetServerInfo", (), |g| {
            g.set_server_info(server_info);
            Some(())
        })
    }

    fn init_from_new_map(
        &mut self,
        map_name: &CStr,
        render_world: Option<RenderWorldRef>,
        sound_world: Option<SoundWorldRef>,
        is_server: bool,
        is_client: bool,
        random_seed: i32,
    ) {
        let map_name = from_native(map_name);
        self.dispatch.game("InitFromNewMap", (), |g| {
            g.init_from_new_map(
                &map_name,
                render_world.map(RenderWorld::new),
                sound_world.map(SoundWorld::new),
                is_server,
                is_client,
                random_seed,
            );
            Some(())
        })
    }

    fn init_from_save_game(
        &mut self,
        map_name: &CStr,
        render_world: Option<RenderWorldRef>,
        sound_world: Option<SoundWorldRef>,
        save_file: FileRef,
    ) -> bool {
        let map_name = from_native(map_name);
        self.dispatch.game("InitFromSaveGame", false, |g| {
            let mut file = FileHandle::from_engine(save_file);
            g.init_from_save_game(
                &map_name,
                render_world.map(RenderWorld::new),
                sound_world.map(SoundWorld::new),
                &mut file,
            )
        })
    }

    fn map_shutdown(&mut self) {
        self.dispatch.game("MapShutdown", (), |g| g.map_shutdown())
    }

    fn cache_dictionary_media(&mut self, dict: &Dict) {
        self.dispatch.game("CacheDictionaryMedia", (), |g| {
            g.cache_dictionary_media(dict);
            Some(())
        })
    }

    fn spawn_player(&mut self, client: i32) {
        self.dispatch.game("SpawnPlayer", (), |g| g.spawn_player(client))
    }

    fn run_frame(&mut self, client_cmds: &[usercmd_t]) -> gameReturn_t {
        let cmds = user_commands(client_cmds);
        self.dispatch.game("RunFrame", gameReturn_t::default(), |g| {
            Some(g.run_frame(&cmds).to_native())
        })
    }

    fn draw(&mut self, client: i32) -> bool {
        self.dispatch.game("Draw", false, |g| Some(g.draw(client)))
    }

    fn handle_esc(&mut self, gui: &mut Option<GuiRef>) -> EscReply {
        let (reply, shown) = self.dispatch.game("HandleESC", (EscReply::Main, None), |g| g.handle_esc());
        if let Some(shown) = shown {
            *gui = Some(shown.native());
        }
        reply
    }

    fn start_menu(&mut self) -> Option<GuiRef> {
        self.dispatch
            .game("StartMenu", None, |g| g.start_menu())
            .map(|gui| gui.native())
    }

    fn handle_gui_commands(&mut self, menu_command: &CStr) -> Option<&CStr> {
        let command = from_native(menu_command);
        let reply = self
            .dispatch
            .game("HandleGuiCommands", None, |g| g.handle_gui_commands(&command))?;
        self.gui_command = self.dispatch.c_string("HandleGuiCommands", &reply)?;
        Some(self.gui_command.as_c_str())
    }

    fn handle_main_menu_commands(&mut self, menu_command: &CStr, gui: Option<GuiRef>) {
        let command = from_native(menu_command);
        self.dispatch.game("HandleMainMenuCommands", (), |g| {
            g.handle_main_menu_commands(&command, gui.map(UserInterface::new));
            Some(())
        })
    }

    fn throttle_user_info(&mut self) {
        self.dispatch.game("ThrottleUserInfo", (), |g| g.throttle_user_info())
    }

    fn select_time_group(&mut self, time_group: i32) {
        self.dispatch.game("SelectTimeGroup", (), |g| g.select_time_group(time_group))
    }

    fn get_time_group_time(&mut self, time_group: i32) -> i32 {
        self.dispatch.game("GetTimeGroupTime", 0, |g| g.get_time_group_time(time_group))
    }

    fn get_best_game_type(&mut self, map: &CStr, game_type: &CStr, buf: &mut StringBuf) {
        let map = from_native(map);
        let game_type = from_native(game_type);
        let best = self.dispatch.game("GetBestGameType", None, |g| {
            Some(Some(g.get_best_game_type(&map, &game_type)))
        });
        if let Some(best) = best {
            copy_to_fixed(buf, &best);
        }
    }

    fn get_client_stats(&mut self, client: i32, data: &mut [c_char]) {
        let max_len = data.len().saturating_sub(1);
        let stats = self.dispatch.game("GetClientStats", None, |g| {
            g.get_client_stats(client, max_len).map(Some)
        });
        if let Some(stats) = stats {
            copy_to_fixed(data, &stats);
        }
    }

    fn switch_team(&mut self, client: i32, team: i32) {
        self.dispatch.game("SwitchTeam", (), |g| g.switch_team(client, team))
    }

    fn get_map_loading_gui(&mut self, gui: &mut StringBuf) {
        let default_gui = read_fixed(gui);
        let chosen = self.dispatch.game("GetMapLoadingGUI", None, |g| {
            Some(Some(g.get_map_loading_gui(&default_gui)))
        });
        if let Some(chosen) = chosen {
            copy_to_fixed(gui, &chosen);
        }
    }

    fn client_apply_snapshot(&mut self, client: i32, sequence: i32) -> bool {
        self.dispatch.game("ClientApplySnapshot", false, |g| {
            g.client_apply_snapshot(client, sequence)
        })
    }

    fn client_read_snapshot(
        &mut self,
        client: i32,
        sequence: i32,
        game_frame: i32,
        game_time: i32,
        dupe_usercmds: i32,
        ahead_of_server: i32,
        msg: &BitMsg,
    ) {
        self.dispatch.game("ClientReadSnapshot", (), |g| {
            g.client_read_snapshot(
                client,
                sequence,
                game_frame,
                game_time,
                dupe_usercmds,
                ahead_of_server,
                msg,
            )
        })
    }

    fn client_process_reliable_message(&mut self, client: i32, msg: &BitMsg) {
        self.dispatch.game("ClientProcessReliableMessage", (), |g| {
            g.client_process_reliable_message(client, msg)
        })
    }

    fn client_prediction(
        &mut self,
        client: i32,
        client_cmds: &[usercmd_t],
        last_predict_frame: bool,
    ) -> gameReturn_t {
        let cmds = user_commands(client_cmds);
        self.dispatch.game("ClientPrediction", gameReturn_t::default(), |g| {
            g.client_prediction(client, &cmds, last_predict_frame)
                .map(|ret| ret.to_native())
        })
    }

    fn download_request(&mut self, ip: &CStr, guid: &CStr, paks: &CStr, urls: &mut StringBuf) -> bool {
        let (ip, guid, paks) = (from_native(ip), from_native(guid), from_native(paks));
        let reply = self.dispatch.game("DownloadRequest", None, |g| {
            g.download_request(&ip, &guid, &paks).map(Some)
        });
        match reply {
            Some((allowed, list)) => {
                copy_to_fixed(urls, &list);
                allowed
            }
            None => false,
        }
    }

    fn server_allow_client(
        &mut self,
        num_clients: i32,
        ip: &CStr,
        guid: &CStr,
        password: &CStr,
        reason: &mut StringBuf,
    ) -> AllowReply {
        let (ip, guid, password) = (from_native(ip), from_native(guid), from_native(password));
        let reply = self.dispatch.game("ServerAllowClient", None, |g| {
            g.server_allow_client(num_clients, &ip, &guid, &password).map(Some)
        });
        match reply {
            Some((allow, why)) => {
                copy_to_fixed(reason, &why);
                allow
            }
            None => AllowReply::No,
        }
    }

    fn server_client_connect(&mut self, client: i32, guid: &CStr) {
        let guid = from_native(guid);
        self.dispatch.game("ServerClientConnect", (), |g| {
            g.server_client_connect(client, &guid);
            Some(())
        })
    }

    fn server_client_begin(&mut self, client: i32) {
        self.dispatch.game("ServerClientBegin", (), |g| {
            g.server_client_begin(client);
            Some(())
        })
    }

    fn server_client_disconnect(&mut self, client: i32) {
        self.dispatch.game("ServerClientDisconnect", (), |g| g.server_client_disconnect(client))
    }

    fn server_apply_snapshot(&mut self, client: i32, sequence: i32) -> bool {
        self.dispatch.game("ServerApplySnapshot", false, |g| {
            g.server_apply_snapshot(client, sequence)
        })
    }

    fn server_write_initial_reliable_messages(&mut self, client: i32) {
        self.dispatch.game("ServerWriteInitialReliableMessages", (), |g| {
            g.server_write_initial_reliable_messages(client)
        })
    }

    fn server_write_snapshot(&mut self, client: i32, sequence: i32, msg: &mut BitMsg, clients_in_pvs: &[u8]) {
        self.dispatch.game("ServerWriteSnapshot", (), |g| {
            g.server_write_snapshot(client, sequence, msg, clients_in_pvs)
        })
    }

    fn server_process_reliable_message(&mut self, client: i32, msg: &BitMsg) {
        self.dispatch.game("ServerProcessReliableMessage", (), |g| {
            g.server_process_reliable_message(client, msg)
        })
    }
}

// ============================================================
// idGameEdit
// ============================================================

pub struct GameEditLocal {
    dispatch: Dispatch,
    entity_def: Dict,
    spawn_args: Dict,
    map_entity: Dict,
    unique_name: CString,
    anim_name: CString,
    key_vals: Vec<CString>,
    matching: Vec<CString>,
}

impl GameEditLocal {
    fn new(slot: Arc<Mutex<ModuleSlot>>, common: Arc<dyn NativeCommon>) -> Self {
        Self {
            dispatch: Dispatch {
                class: "idGameEdit",
                slot,
                common,
            },
            entity_def: Dict::new(),
            spawn_args: Dict::new(),
            map_entity: Dict::new(),
            unique_name: CString::default(),
            anim_name: CString::default(),
            key_vals: Vec::new(),
            matching: Vec::new(),
        }
    }
}

impl GameEditInterface for GameEditLocal {
    fn get_selected_entities(&mut self, list: &mut [EntityHandle]) -> i32 {
        let max = list.len();
        let selected = self.dispatch.edit("GetSelectedEntities", Vec::new(), |e| {
            e.get_selected_entities(max)
        });
        let n = selected.len().min(max);
        list[..n].copy_from_slice(&selected[..n]);
        n as i32
    }

    fn trigger_selected(&mut self) {
        self.dispatch.edit("TriggerSelected", (), |e| e.trigger_selected())
    }

    fn clear_entity_selection(&mut self) {
        self.dispatch.edit("ClearEntitySelection", (), |e| e.clear_entity_selection())
    }

    fn add_selected_entity(&mut self, ent: EntityHandle) {
        self.dispatch.edit("AddSelectedEntity", (), |e| e.add_selected_entity(ent))
    }

    fn find_entity_def_dict(&mut self, name: &CStr, make_default: bool) -> Option<&Dict> {
        let name = from_native(name);
        let dict = self.dispatch.edit("FindEntityDefDict", None, |e| {
            e.find_entity_def_dict(&name, make_default).map(Some)
        })?;
        self.entity_def = dict;
        Some(&self.entity_def)
    }

    fn spawn_entity_def(&mut self, args: &Dict) -> Option<EntityHandle> {
        self.dispatch.edit("SpawnEntityDef", None, |e| e.spawn_entity_def(args).map(Some))
    }

    fn find_entity(&mut self, name: &CStr) -> Option<EntityHandle> {
        let name = from_native(name);
        self.dispatch.edit("FindEntity", None, |e| e.find_entity(&name).map(Some))
    }

    fn get_unique_entity_name(&mut self, classname: &CStr) -> Option<&CStr> {
        let classname = from_native(classname);
        let name = self.dispatch.edit("GetUniqueEntityName", None, |e| {
            e.get_unique_entity_name(&classname).map(Some)
        })?;
        self.unique_name = self.dispatch.c_string("GetUniqueEntityName", &name)?;
        Some(self.unique_name.as_c_str())
    }

    fn entity_get_origin(&mut self, ent: EntityHandle, org: &mut Vec3) {
        let origin = self.dispatch.edit("EntityGetOrigin", None, |e| e.entity_get_origin(ent).map(Some));
        if let Some(origin) = origin {
            *org = vector3_to_vec3(&origin);
        }
    }

    fn entity_get_axis(&mut self, ent: EntityHandle, axis: &mut Mat3) {
        let m = self.dispatch.edit("EntityGetAxis", None, |e| e.entity_get_axis(ent).map(Some));
        if let Some(m) = m {
            *axis = matrix_to_mat3(&m);
        }
    }

    fn entity_set_origin(&mut self, ent: EntityHandle, org: &Vec3) {
        let origin = vec3_to_vector3(org);
        self.dispatch.edit("EntitySetOrigin", (), |e| e.entity_set_origin(ent, origin))
    }

    fn entity_set_axis(&mut self, ent: EntityHandle, axis: &Mat3) {
        let m = mat3_to_matrix(axis);
        self.dispatch.edit("EntitySetAxis", (), |e| e.entity_set_axis(ent, &m))
    }

    fn entity_set_color(&mut self, ent: EntityHandle, color: &Vec3) {
        let color = vec3_to_vector3(color);
        self.dispatch.edit("EntitySetColor", (), |e| e.entity_set_color(ent, color))
    }

    fn entity_translate(&mut self, ent: EntityHandle, org: &Vec3) {
        let offset = vec3_to_vector3(org);
        self.dispatch.edit("EntityTranslate", (), |e| e.entity_translate(ent, offset))
    }

    fn entity_get_spawn_args(&mut self, ent: EntityHandle) -> Option<&Dict> {
        let args = self.dispatch.edit("EntityGetSpawnArgs", None, |e| {
            e.entity_get_spawn_args(ent).map(Some)
        })?;
        self.spawn_args = args;
        Some(&self.spawn_args)
    }

    fn entity_update_changeable_spawn_args(&mut self, ent: EntityHandle, dict: Option<&Dict>) {
        self.dispatch.edit("EntityUpdateChangeableSpawnArgs", (), |e| {
            e.entity_update_changeable_spawn_args(ent, dict)
        })
    }

    fn entity_change_spawn_args(&mut self, ent: EntityHandle, new_args: &Dict) {
        self.dispatch.edit("EntityChangeSpawnArgs", (), |e| e.entity_change_spawn_args(ent, new_args))
    }

    fn entity_update_visuals(&mut self, ent: EntityHandle) {
        self.dispatch.edit("EntityUpdateVisuals", (), |e| e.entity_update_visuals(ent))
    }

    fn entity_set_model(&mut self, ent: EntityHandle, model: &CStr) {
        let model = from_native(model);
        self.dispatch.edit("EntitySetModel", (), |e| e.entity_set_model(ent, &model))
    }

    fn entity_stop_sound(&mut self, ent: EntityHandle) {
        self.dispatch.edit("EntityStopSound", (), |e| e.entity_stop_sound(ent))
    }

    fn entity_delete(&mut self, ent: EntityHandle) {
        self.dispatch.edit("EntityDelete", (), |e| e.entity_delete(ent))
    }

    fn player_is_valid(&mut self) -> bool {
        self.dispatch.edit("PlayerIsValid", false, |e| e.player_is_valid())
    }

    fn player_get_origin(&mut self, org: &mut Vec3) {
        if let Some(origin) = self.dispatch.edit("PlayerGetOrigin", None, |e| e.player_get_origin().map(Some)) {
            *org = vector3_to_vec3(&origin);
        }
    }

    fn player_get_axis(&mut self, axis: &mut Mat3) {
        if let Some(m) = self.dispatch.edit("PlayerGetAxis", None, |e| e.player_get_axis().map(Some)) {
            *axis = matrix_to_mat3(&m);
        }
    }

    fn player_get_view_angles(&mut self, angles: &mut Angles) {
        if let Some(a) = self.dispatch.edit("PlayerGetViewAngles", None, |e| e.player_get_view_angles().map(Some)) {
            *angles = a;
        }
    }

    fn player_get_eye_position(&mut self, org: &mut Vec3) {
        if let Some(eye) = self.dispatch.edit("PlayerGetEyePosition", None, |e| e.player_get_eye_position().map(Some)) {
            *org = vector3_to_vec3(&eye);
        }
    }

    fn map_get_entity_dict(&mut self, name: &CStr) -> Option<&Dict> {
        let name = from_native(name);
        let dict = self.dispatch.edit("MapGetEntityDict", None, |e| e.map_get_entity_dict(&name).map(Some))?;
        self.map_entity = dict;
        Some(&self.map_entity)
    }

    fn map_save(&mut self, path: Option<&CStr>) {
        let path = path.map(from_native);
        self.dispatch.edit("MapSave", (), |e| e.map_save(path.as_deref()))
    }

    fn map_set_entity_key_val(&mut self, name: &CStr, key: &CStr, val: &CStr) {
        let (name, key, val) = (from_native(name), from_native(key), from_native(val));
        self.dispatch.edit("MapSetEntityKeyVal", (), |e| e.map_set_entity_key_val(&name, &key, &val))
    }

    fn map_copy_dict_to_entity(&mut self, name: &CStr, dict: &Dict) {
        let name = from_native(name);
        self.dispatch.edit("MapCopyDictToEntity", (), |e| e.map_copy_dict_to_entity(&name, dict))
    }

    fn map_get_unique_matching_key_vals(&mut self, key: &CStr, max: usize) -> &[CString] {
        let key = from_native(key);
        let vals = self.dispatch.edit("MapGetUniqueMatchingKeyVals", Vec::new(), |e| {
            e.map_get_unique_matching_key_vals(&key, max)
        });
        self.key_vals = self.dispatch.c_strings("MapGetUniqueMatchingKeyVals", vals, max);
        &self.key_vals
    }

    fn map_add_entity(&mut self, dict: &Dict) {
        self.dispatch.edit("MapAddEntity", (), |e| e.map_add_entity(dict))
    }

    fn map_remove_entity(&mut self, name: &CStr) {
        let name = from_native(name);
        self.dispatch.edit("MapRemoveEntity", (), |e| e.map_remove_entity(&name))
    }

    fn map_get_entities_matching_class_with_string(
        &mut self,
        classname: &CStr,
        matching: &CStr,
        max: usize,
    ) -> &[CString] {
        let (classname, matching) = (from_native(classname), from_native(matching));
        let names = self.dispatch.edit("MapGetEntitiesMatchingClassWithString", Vec::new(), |e| {
            e.map_get_entities_matching_class_with_string(&classname, &matching, max)
        });
        self.matching = self
            .dispatch
            .c_strings("MapGetEntitiesMatchingClassWithString", names, max);
        &self.matching
    }

    fn map_entity_translate(&mut self, name: &CStr, v: &Vec3) {
        let name = from_native(name);
        let offset = vec3_to_vector3(v);
        self.dispatch.edit("MapEntityTranslate", (), |e| e.map_entity_translate(&name, offset))
    }

    fn af_spawn_entity(&mut self, file_name: &CStr) -> bool {
        let file_name = from_native(file_name);
        self.dispatch.edit("AF_SpawnEntity", false, |e| e.af_spawn_entity(&file_name))
    }

    fn af_update_entities(&mut self, file_name: &CStr) {
        let file_name = from_native(file_name);
        self.dispatch.edit("AF_UpdateEntities", (), |e| e.af_update_entities(&file_name))
    }

    fn af_undo_changes(&mut self) {
        self.dispatch.edit("AF_UndoChanges", (), |e| e.af_undo_changes())
    }

    fn af_create_mesh(
        &mut self,
        args: &Dict,
        mesh_origin: &mut Vec3,
        mesh_axis: &mut Mat3,
        pose_is_set: &mut bool,
    ) -> Option<RenderModelRef> {
        let mesh = self.dispatch.edit("AF_CreateMesh", None, |e| e.af_create_mesh(args).map(Some))?;
        *mesh_origin = vector3_to_vec3(&mesh.origin);
        *mesh_axis = matrix_to_mat3(&mesh.axis);
        *pose_is_set = mesh.pose_is_set;
        mesh.model.map(|m| m.native())
    }

    fn anim_get_model_from_entity_def(&mut self, classname: &CStr) -> Option<RenderModelRef> {
        let classname = from_native(classname);
        self.dispatch
            .edit("ANIM_GetModelFromEntityDef", None, |e| {
                e.anim_get_model_from_entity_def(&classname).map(Some)
            })
            .map(|m| m.native())
    }

    fn anim_get_model_offset_from_entity_def(&mut self, classname: &CStr) -> Vec3 {
        let classname = from_native(classname);
        let offset = self.dispatch.edit("ANIM_GetModelOffsetFromEntityDef", Default::default(), |e| {
            e.anim_get_model_offset_from_entity_def(&classname)
        });
        vector3_to_vec3(&offset)
    }

    fn anim_get_model_from_entity_def_args(&mut self, args: &Dict) -> Option<RenderModelRef> {
        self.dispatch
            .edit("ANIM_GetModelFromEntityDef", None, |e| {
                e.anim_get_model_from_entity_def_args(args).map(Some)
            })
            .map(|m| m.native())
    }

    fn anim_get_model_from_name(&mut self, model_name: &CStr) -> Option<RenderModelRef> {
        let model_name = from_native(model_name);
        self.dispatch
            .edit("ANIM_GetModelFromName", None, |e| {
                e.anim_get_model_from_name(&model_name).map(Some)
            })
            .map(|m| m.native())
    }

    fn anim_get_anim_from_entity_def(&mut self, classname: &CStr, anim_name: &CStr) -> Option<AnimHandle> {
        let (classname, anim_name) = (from_native(classname), from_native(anim_name));
        self.dispatch.edit("ANIM_GetAnimFromEntityDef", None, |e| {
            e.anim_get_anim_from_entity_def(&classname, &anim_name).map(Some)
        })
    }

    fn anim_get_num_anims_from_entity_def(&mut self, args: &Dict) -> i32 {
        self.dispatch.edit("ANIM_GetNumAnimsFromEntityDef", 0, |e| {
            e.anim_get_num_anims_from_entity_def(args)
        })
    }

    fn anim_get_anim_name_from_entity_def(&mut self, args: &Dict, anim_num: i32) -> Option<&CStr> {
        let name = self.dispatch.edit("ANIM_GetAnimNameFromEntityDef", None, |e| {
            e.anim_get_anim_name_from_entity_def(args, anim_num).map(Some)
        })?;
        self.anim_name = self.dispatch.c_string("ANIM_GetAnimNameFromEntityDef", &name)?;
        Some(self.anim_name.as_c_str())
    }

    fn anim_get_anim(&mut self, file_name: &CStr) -> Option<AnimHandle> {
        let file_name = from_native(file_name);
        self.dispatch.edit("ANIM_GetAnim", None, |e| e.anim_get_anim(&file_name).map(Some))
    }

    fn anim_get_length(&mut self, anim: Option<AnimHandle>) -> i32 {
        self.dispatch.edit("ANIM_GetLength", 0, |e| anim.and_then(|a| e.anim_get_length(a)))
    }

    fn anim_get_num_frames(&mut self, anim: Option<AnimHandle>) -> i32 {
        self.dispatch.edit("ANIM_GetNumFrames", 0, |e| anim.and_then(|a| e.anim_get_num_frames(a)))
    }

    fn anim_create_anim_frame(
        &mut self,
        model: RenderModelRef,
        anim: Option<AnimHandle>,
        frame: &mut [JointMat],
        time: i32,
        offset: &Vec3,
        remove_origin_offset: bool,
    ) {
        let num_joints = frame.len();
        let offset = vec3_to_vector3(offset);
        let joints = self.dispatch.edit("ANIM_CreateAnimFrame", Vec::new(), |e| {
            anim.and_then(|a| {
                e.anim_create_anim_frame(
                    RenderModel::new(model),
                    a,
                    num_joints,
                    time,
                    offset,
                    remove_origin_offset,
                )
            })
        });
        for (dst, src) in frame.iter_mut().zip(joints.iter()) {
            *dst = *src;
        }
    }

    fn anim_create_mesh_for_anim(
        &mut self,
        model: RenderModelRef,
        classname: &CStr,
        anim_name: &CStr,
        frame: i32,
        remove_origin_offset: bool,
    ) -> Option<RenderModelRef> {
        let (classname, anim_name) = (from_native(classname), from_native(anim_name));
        self.dispatch
            .edit("ANIM_CreateMeshForAnim", None, |e| {
                e.anim_create_mesh_for_anim(
                    RenderModel::new(model),
                    &classname,
                    &anim_name,
                    frame,
                    remove_origin_offset,
                )
                .map(Some)
            })
            .map(|m| m.native())
    }

    fn parse_spawn_args_to_render_light(&mut self, args: &Dict, render_light: &mut RenderLightDef) {
        let light = self.dispatch.edit("ParseSpawnArgsToRenderLight", None, |e| {
            e.parse_spawn_args_to_render_light(args).map(Some)
        });
        if let Some(light) = light {
            *render_light = light;
        }
    }

    fn parse_spawn_args_to_render_entity(&mut self, args: &Dict, render_entity: &mut RenderEntityDef) {
        let entity = self.dispatch.edit("ParseSpawnArgsToRenderEntity", None, |e| {
            e.parse_spawn_args_to_render_entity(args).map(Some)
        });
        if let Some(entity) = entity {
            match entity.def() {
                Ok(def) => *render_entity = *def,
                Err(err) => self.dispatch.fault("ParseSpawnArgsToRenderEntity", &err),
            }
        }
    }

    fn parse_spawn_args_to_ref_sound(&mut self, args: &Dict, ref_sound: &mut RefSoundDef) {
        let sound = self.dispatch.edit("ParseSpawnArgsToRefSound", None, |e| {
            e.parse_spawn_args_to_ref_sound(args).map(Some)
        });
        if let Some(sound) = sound {
            *ref_sound = sound;
        }
    }
}
