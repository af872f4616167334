// idtech4-game-dll -- Reference game module (idgame) built from Rust
//
// `BaseGame` handles the entry points every module must provide and a
// handful of optional ones: client bookkeeping, map load/unload and the
// menu helpers. Everything else falls through to the proxy's placeholder
// path. The crate builds as a cdylib exporting `idtech4_game_entry` and as
// an rlib whose `GAME_MODULE_EXPORT` hosts can register statically.

use std::sync::Arc;

use idtech4_common::dict::Dict;
use idtech4_common::native::{AllowReply, DeclType};
use idtech4_common::version::{GAME_VERSION, MAX_CLIENTS};
use idtech4_common::BoundaryResult;
use idtech4_game::handles::{RenderView, RenderWorld, SoundWorld, UserInterface};
use idtech4_game::{declare_game_module, Game, GameReturn, GameServices, UserCommand};

/// Game time advanced per frame, in milliseconds.
pub const USERCMD_MSEC: i32 = 16;

/// Best game type when the map does not list the requested one.
pub const DEFAULT_GAME_TYPE: &str = "deathmatch";

/// Impulse the local player sends to leave the game.
pub const IMPULSE_EXIT: i8 = 40;

/// Name given to clients whose `ui_name` is blank.
pub const DEFAULT_PLAYER_NAME: &str = "player";

const DECL_FOLDERS: [(&str, &str, DeclType); 3] = [
    ("def", ".def", DeclType::EntityDef),
    ("particles", ".prt", DeclType::Particle),
    ("newpdas", ".pda", DeclType::Pda),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Uninitialized,
    NoMap,
    Startup,
    Active,
    Shutdown,
}

#[derive(Debug, Clone, Default)]
struct Client {
    connected: bool,
    in_game: bool,
    guid: String,
    user_info: Dict,
    persistent_info: Dict,
}

pub struct BaseGame {
    services: Option<Arc<GameServices>>,
    state: GameState,
    clients: Vec<Client>,
    client_count: usize,
    local_client: i32,
    server_info: Dict,
    is_server: bool,
    is_client: bool,
    map_name: String,
    map_entities: i32,
    render_world: Option<RenderWorld>,
    sound_world: Option<SoundWorld>,
    frame: i32,
    time: i32,
    cached_media: usize,
}

impl Default for BaseGame {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseGame {
    pub fn new() -> Self {
        Self {
            services: None,
            state: GameState::Uninitialized,
            clients: vec![Client::default(); MAX_CLIENTS],
            client_count: 0,
            local_client: 0,
            server_info: Dict::new(),
            is_server: false,
            is_client: false,
            map_name: String::new(),
            map_entities: 0,
            render_world: None,
            sound_world: None,
            frame: 0,
            time: 0,
            cached_media: 0,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn is_multiplayer(&self) -> bool {
        self.is_server || self.is_client
    }

    /// Media found by `cache_dictionary_media` so far.
    pub fn cached_media(&self) -> usize {
        self.cached_media
    }

    pub fn client_guid(&self, client: i32) -> Option<&str> {
        self.client(client)
            .filter(|c| c.connected)
            .map(|c| c.guid.as_str())
    }

    fn client(&self, client: i32) -> Option<&Client> {
        usize::try_from(client).ok().and_then(|i| self.clients.get(i))
    }

    fn client_mut(&mut self, client: i32) -> Option<&mut Client> {
        usize::try_from(client).ok().and_then(|i| self.clients.get_mut(i))
    }

    fn print(&self, msg: &str) {
        if let Some(services) = &self.services {
            services.console().write_line(msg);
        }
    }

    fn warn_on_fault<T>(&self, what: &str, result: BoundaryResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(err) => {
                if let Some(services) = &self.services {
                    services.console().warning(&format!("{}: {}\n", what, err));
                }
                None
            }
        }
    }

    /// Apply the server's naming rules to `info`. Returns true when the
    /// dictionary changed.
    fn sanitize_user_info(&self, client: i32, info: &mut Dict) -> bool {
        let mut modified = false;
        let mut name = info.get_string("ui_name", "").trim().to_string();
        if name.is_empty() {
            name = DEFAULT_PLAYER_NAME.to_string();
        }

        // numeric names would collide with client numbers in kick/ban
        if name.parse::<i64>().is_ok() {
            name.push('_');
        }

        loop {
            let taken = self.clients.iter().enumerate().any(|(i, other)| {
                i as i32 != client
                    && other.in_game
                    && other.user_info.get_string("ui_name", "").eq_ignore_ascii_case(&name)
            });
            if !taken {
                break;
            }
            name.push('_');
        }

        if info.get_string("ui_name", "") != name {
            info.set("ui_name", &name);
            modified = true;
        }
        modified
    }

    fn map_stem(map: &str) -> &str {
        let file = map.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(map);
        match file.rfind('.') {
            Some(dot) => &file[..dot],
            None => file,
        }
    }

    fn clear_map(&mut self) {
        self.map_name.clear();
        self.map_entities = 0;
        self.render_world = None;
        self.sound_world = None;
        self.frame = 0;
        self.time = 0;
        for client in &mut self.clients {
            client.in_game = false;
        }
        self.client_count = 0;
    }
}

impl Game for BaseGame {
    fn init(&mut self, services: Arc<GameServices>) {
        self.services = Some(services.clone());

        self.print("--------- Initializing Game ----------");
        self.print(&format!("gamename: {}", GAME_VERSION));
        self.print(&format!("gamedate: {}", services.build().build_date));

        for (folder, extension, decl_type) in DECL_FOLDERS {
            let result = services.decls().register_decl_folder(folder, extension, decl_type);
            self.warn_on_fault("RegisterDeclFolder", result);
        }

        self.state = GameState::NoMap;
        self.print("game initialized.");
        self.print("--------------------------------------");
    }

    fn shutdown(&mut self) -> Option<()> {
        self.print("------------ Game Shutdown -----------");
        self.clear_map();
        self.state = GameState::Shutdown;
        self.print("--------------------------------------");
        Some(())
    }

    fn init_from_new_map(
        &mut self,
        map_name: &str,
        render_world: Option<RenderWorld>,
        sound_world: Option<SoundWorld>,
        is_server: bool,
        is_client: bool,
        _random_seed: i32,
    ) {
        if !self.map_name.is_empty() {
            self.map_shutdown();
        }

        self.print("----------- Game Map Init ------------");
        self.state = GameState::Startup;
        self.is_server = is_server;
        self.is_client = is_client;
        self.render_world = render_world;
        self.sound_world = sound_world;
        self.map_name = map_name.to_string();

        if let Some(services) = self.services.clone() {
            let loaded = self.warn_on_fault("LoadMap", services.map_files().load(map_name)).flatten();
            match loaded {
                Some(map) => {
                    self.map_entities = map.entity_count().unwrap_or(0);
                    let result = services.collision().load_map(&map);
                    self.warn_on_fault("LoadMap", result);
                }
                None => services
                    .console()
                    .warning(&format!("Couldn't load map '{}'\n", map_name)),
            }
        }

        self.state = GameState::Active;
        self.print("--------------------------------------");
    }

    fn map_shutdown(&mut self) -> Option<()> {
        self.print("--------- Game Map Shutdown ----------");
        if let Some(sound_world) = self.sound_world {
            sound_world.clear_all_sound_emitters();
        }
        self.clear_map();
        self.state = GameState::NoMap;
        self.print("--------------------------------------");
        Some(())
    }

    fn run_frame(&mut self, cmds: &[UserCommand]) -> GameReturn {
        if self.state != GameState::Active {
            return GameReturn::default();
        }
        self.frame += 1;
        self.time += USERCMD_MSEC;

        let local = self.client(self.local_client);
        let local_in_game = local.map_or(false, |c| c.in_game);
        let local_cmd = usize::try_from(self.local_client)
            .ok()
            .and_then(|i| cmds.get(i));
        let exit_requested = local_cmd.map_or(false, |c| c.impulse == IMPULSE_EXIT);

        GameReturn {
            session_command: exit_requested.then(|| "endOfGame".to_string()),
            consistency_hash: self.server_info.checksum() as i32,
            health: if local_in_game { 100 } else { 0 },
            stamina: if local_in_game { 100 } else { 0 },
            ..GameReturn::default()
        }
    }

    fn draw(&mut self, client: i32) -> bool {
        if self.state != GameState::Active || self.client(client).is_none() {
            return false;
        }
        match self.render_world {
            Some(world) => {
                let view = RenderView {
                    time: self.time,
                    ..RenderView::default()
                };
                world.set_render_view(&view);
                true
            }
            None => false,
        }
    }

    fn cache_dictionary_media(&mut self, dict: &Dict) {
        let Some(services) = self.services.clone() else {
            return;
        };
        let mut kv = dict.match_prefix("model", None);
        while let Some(pair) = kv {
            if let Some(Some(_)) = self.warn_on_fault("CacheDictionaryMedia", services.models().find_model(Some(pair.value()))) {
                self.cached_media += 1;
            }
            kv = dict.match_prefix("model", Some(pair));
        }
        let mut kv = dict.match_prefix("skin", None);
        while let Some(pair) = kv {
            if let Some(Some(_)) = self.warn_on_fault("CacheDictionaryMedia", services.decls().find_skin(pair.value(), true)) {
                self.cached_media += 1;
            }
            kv = dict.match_prefix("skin", Some(pair));
        }
        let mut kv = dict.match_prefix("gui", None);
        while let Some(pair) = kv {
            if let Some(Some(_)) = self.warn_on_fault("CacheDictionaryMedia", services.uis().find_gui_default(pair.value())) {
                self.cached_media += 1;
            }
            kv = dict.match_prefix("gui", Some(pair));
        }
    }

    fn handle_main_menu_commands(&mut self, command: &str, gui: Option<UserInterface>) {
        let Some(services) = self.services.clone() else {
            return;
        };
        let mut words = command.split_whitespace();
        match words.next() {
            Some("quit") => {
                let result = services.cmds().buffer_command_text("quit\n");
                self.warn_on_fault("HandleMainMenuCommands", result);
            }
            Some("startMap") => {
                if let Some(map) = words.next() {
                    let result = services.cmds().buffer_command_text(&format!("map {}\n", map));
                    self.warn_on_fault("HandleMainMenuCommands", result);
                }
            }
            _ => {}
        }
        if let Some(gui) = gui {
            let result = gui.set_state_string("lastMenuCommand", command);
            self.warn_on_fault("HandleMainMenuCommands", result);
            gui.state_changed(self.time, false);
        }
    }

    fn get_map_loading_gui(&mut self, default_gui: &str) -> String {
        let Some(services) = self.services.clone() else {
            return default_gui.to_string();
        };
        let map = if self.map_name.is_empty() {
            services.cvars().get_string("si_map").unwrap_or_default()
        } else {
            self.map_name.clone()
        };
        if map.is_empty() {
            return default_gui.to_string();
        }

        let candidate = format!("guis/map/{}.gui", Self::map_stem(&map));
        match services.files().open_file_read(&candidate, true, None) {
            Ok(Some(mut file)) => {
                services.files().close_file(&mut file);
                candidate
            }
            _ => default_gui.to_string(),
        }
    }

    fn get_best_game_type(&mut self, map: &str, game_type: &str) -> String {
        let supported = self.services.as_ref().map_or(false, |services| {
            match services.decls().find_type(DeclType::MapDef, map, false) {
                Ok(Some(decl)) => decl
                    .native()
                    .get()
                    .entity_dict()
                    .map_or(false, |keys| keys.get_bool(game_type, "0")),
                _ => false,
            }
        });
        if supported {
            game_type.to_string()
        } else {
            DEFAULT_GAME_TYPE.to_string()
        }
    }

    fn set_local_client(&mut self, client: i32) {
        self.local_client = client;
    }

    fn set_server_info(&mut self, server_info: &Dict) {
        self.server_info = server_info.clone();
    }

    fn set_user_info(&mut self, client: i32, user_info: &Dict, is_client: bool, can_modify: bool) -> Option<Dict> {
        self.is_client = is_client;
        self.client(client)?;

        let mut info = user_info.clone();
        let modified = can_modify && self.sanitize_user_info(client, &mut info);
        let slot = self.client_mut(client)?;
        slot.user_info = info;
        modified.then(|| slot.user_info.clone())
    }

    fn get_user_info(&mut self, client: i32) -> Option<Option<Dict>> {
        Some(
            self.client(client)
                .filter(|c| c.connected)
                .map(|c| c.user_info.clone()),
        )
    }

    fn get_persistent_player_info(&mut self, client: i32) -> Option<Dict> {
        Some(self.client(client).map(|c| c.persistent_info.clone()).unwrap_or_default())
    }

    fn set_persistent_player_info(&mut self, client: i32, info: &Dict) -> Option<()> {
        if let Some(slot) = self.client_mut(client) {
            slot.persistent_info = info.clone();
        }
        Some(())
    }

    fn server_client_connect(&mut self, client: i32, guid: &str) {
        let Some(slot) = self.client_mut(client) else {
            return;
        };
        *slot = Client {
            connected: true,
            guid: guid.to_string(),
            ..Client::default()
        };
        self.print(&format!("client {} connected.", client));
    }

    fn server_client_begin(&mut self, client: i32) {
        if self.client(client).map_or(false, |c| c.connected) {
            self.spawn_player(client);
        }
    }

    fn spawn_player(&mut self, client: i32) -> Option<()> {
        self.print(&format!("SpawnPlayer: {}", client));
        let slot = self.client_mut(client)?;
        if !slot.in_game {
            slot.in_game = true;
            self.client_count += 1;
        }
        Some(())
    }

    fn server_client_disconnect(&mut self, client: i32) -> Option<()> {
        if let Some(slot) = self.client_mut(client) {
            let was_in_game = slot.in_game;
            *slot = Client::default();
            if was_in_game {
                self.client_count -= 1;
            }
        }
        Some(())
    }

    fn server_allow_client(
        &mut self,
        num_clients: i32,
        _ip: &str,
        _guid: &str,
        password: &str,
    ) -> Option<(AllowReply, String)> {
        let max_players = self.server_info.get_int("si_maxPlayers", "4");
        if num_clients >= max_players {
            return Some((AllowReply::NotYet, "server is full".to_string()));
        }
        if self.server_info.get_bool("si_usePass", "0") {
            let expected = self
                .services
                .as_ref()
                .and_then(|s| s.cvars().get_string("g_password").ok())
                .unwrap_or_default();
            if expected.is_empty() || password != expected {
                return Some((AllowReply::BadPass, "incorrect password".to_string()));
            }
        }
        Some((AllowReply::Yes, String::new()))
    }

    fn get_time_group_time(&mut self, _time_group: i32) -> Option<i32> {
        Some(self.time)
    }
}

declare_game_module!(BaseGame::new);
