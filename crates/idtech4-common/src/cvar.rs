// cvar.rs -- Console variable flags, registration records and an in-process
// cvar table
//
// `CvarTable` implements `NativeCvarSystem` for hosts that have no engine cvar
// system of their own, and for tests.

use std::collections::HashMap;
use std::ffi::{CStr, CString};

use parking_lot::Mutex;

use crate::completion::{ArgCompletion, CmdArgs, CompletionRegistration, CompletionSink};
use crate::dict::{atof, atoi};
use crate::error::BoundaryResult;
use crate::marshal::{from_native, to_native, to_native_lossy};
use crate::native::NativeCvarSystem;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CvarFlags: i32 {
        const ALL         = -1;
        const BOOL        = 1 << 0;
        const INTEGER     = 1 << 1;
        const FLOAT       = 1 << 2;
        const SYSTEM      = 1 << 3;
        const RENDERER    = 1 << 4;
        const SOUND       = 1 << 5;
        const GUI         = 1 << 6;
        const GAME        = 1 << 7;
        const TOOL        = 1 << 8;
        const USERINFO    = 1 << 9;
        const SERVERINFO  = 1 << 10;
        const NETWORKSYNC = 1 << 11;
        const STATIC      = 1 << 12;
        const CHEAT       = 1 << 13;
        const NOCHEAT     = 1 << 14;
        const INIT        = 1 << 15;
        /// Read-only.
        const ROM         = 1 << 16;
        const ARCHIVE     = 1 << 17;
        const MODIFIED    = 1 << 18;
    }
}

/// A cvar registration, already marshaled to native strings.
#[derive(Debug)]
pub struct CvarDescriptor {
    pub name: CString,
    pub value: CString,
    pub description: CString,
    pub flags: CvarFlags,
    pub range: Option<(f32, f32)>,
    pub value_strings: Option<Vec<CString>>,
    pub completion: Option<CompletionRegistration>,
}

impl CvarDescriptor {
    pub fn new(name: &str, value: &str, description: &str, flags: CvarFlags) -> BoundaryResult<Self> {
        Ok(Self {
            name: to_native(name)?,
            value: to_native(value)?,
            description: to_native(description)?,
            flags,
            range: None,
            value_strings: None,
            completion: None,
        })
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn with_value_strings(mut self, values: &[&str]) -> BoundaryResult<Self> {
        let values = values
            .iter()
            .map(|v| to_native(v))
            .collect::<BoundaryResult<Vec<_>>>()?;
        self.value_strings = Some(values);
        Ok(self)
    }

    pub fn with_completion(mut self, completion: ArgCompletion) -> Self {
        self.completion = Some(CompletionRegistration::new(completion));
        self
    }
}

// ============================================================
// In-process cvar table
// ============================================================

/// One console variable.
#[derive(Debug)]
pub struct Cvar {
    pub name: String,
    pub value: String,
    pub reset_value: String,
    pub description: String,
    pub flags: CvarFlags,
    pub range: Option<(f32, f32)>,
    pub value_strings: Option<Vec<String>>,
    completion: Option<CompletionRegistration>,
}

impl Cvar {
    fn user_created(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            reset_value: value.to_string(),
            description: String::new(),
            flags: CvarFlags::empty(),
            range: None,
            value_strings: None,
            completion: None,
        }
    }

    /// The range, unless it is empty, inverted or NaN.
    fn usable_range(&self) -> Option<(f32, f32)> {
        self.range.filter(|(min, max)| min < max)
    }

    /// Coerce `value` into this cvar's type, range and allowed strings.
    fn validate(&self, value: &str) -> String {
        if let Some(allowed) = &self.value_strings {
            return allowed
                .iter()
                .find(|a| a.eq_ignore_ascii_case(value))
                .or_else(|| allowed.first())
                .cloned()
                .unwrap_or_else(|| value.to_string());
        }

        if self.flags.contains(CvarFlags::BOOL) {
            return if atoi(value) != 0 { "1" } else { "0" }.to_string();
        }

        if self.flags.contains(CvarFlags::INTEGER) {
            let mut v = atoi(value);
            if let Some((min, max)) = self.usable_range() {
                if (v as f32) < min {
                    v = min as i32;
                } else if (v as f32) > max {
                    v = max as i32;
                }
            }
            return v.to_string();
        }

        if self.flags.contains(CvarFlags::FLOAT) || self.range.is_some() {
            let mut v = atof(value);
            if let Some((min, max)) = self.usable_range() {
                if v < min {
                    v = min;
                } else if v > max {
                    v = max;
                }
            }
            return format_float(v);
        }

        value.to_string()
    }
}

/// Shortest decimal form, without a trailing ".0".
fn format_float(v: f32) -> String {
    let s = v.to_string();
    match s.strip_suffix(".0") {
        Some(int) => int.to_string(),
        None => s,
    }
}

#[derive(Default)]
struct CvarState {
    vars: Vec<Cvar>,
    /// Lowercased name -> index in `vars`.
    index: HashMap<String, usize>,
}

impl CvarState {
    fn find(&self, name: &str) -> Option<&Cvar> {
        self.index.get(&name.to_ascii_lowercase()).map(|&i| &self.vars[i])
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        match self.index.get(&name.to_ascii_lowercase()) {
            Some(&i) => Some(&mut self.vars[i]),
            None => None,
        }
    }

    fn insert(&mut self, var: Cvar) -> usize {
        let idx = self.vars.len();
        self.index.insert(var.name.to_ascii_lowercase(), idx);
        self.vars.push(var);
        idx
    }

    fn set(&mut self, name: &str, value: &str, force: bool) {
        match self.find_mut(name) {
            Some(var) => {
                if !force && var.flags.intersects(CvarFlags::ROM | CvarFlags::INIT) {
                    return;
                }
                let value = var.validate(value);
                if var.value != value {
                    var.value = value;
                    var.flags |= CvarFlags::MODIFIED;
                }
            }
            None => {
                let mut var = Cvar::user_created(name, value);
                var.flags |= CvarFlags::MODIFIED;
                self.insert(var);
            }
        }
    }
}

/// Console variables keyed case-insensitively.
pub struct CvarTable {
    state: Mutex<CvarState>,
}

impl CvarTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CvarState::default()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().find(name).is_some()
    }

    /// String value of a cvar. Returns "" if not found.
    pub fn string(&self, name: &str) -> String {
        self.state
            .lock()
            .find(name)
            .map(|v| v.value.clone())
            .unwrap_or_default()
    }

    pub fn integer(&self, name: &str) -> i32 {
        atoi(&self.string(name))
    }

    pub fn float(&self, name: &str) -> f32 {
        atof(&self.string(name))
    }

    pub fn flags(&self, name: &str) -> Option<CvarFlags> {
        self.state.lock().find(name).map(|v| v.flags)
    }

    pub fn description(&self, name: &str) -> Option<String> {
        self.state.lock().find(name).map(|v| v.description.clone())
    }

    /// Set a cvar, creating it if needed. ROM and INIT cvars keep their value.
    pub fn set(&self, name: &str, value: &str) {
        self.state.lock().set(name, value, false);
    }

    /// Set a cvar even when it is ROM or INIT.
    pub fn force_set(&self, name: &str, value: &str) {
        self.state.lock().set(name, value, true);
    }

    /// Restore the registered default.
    pub fn reset(&self, name: &str) {
        let reset = self.state.lock().find(name).map(|v| v.reset_value.clone());
        if let Some(reset) = reset {
            self.force_set(name, &reset);
        }
    }

    pub fn is_modified(&self, name: &str) -> bool {
        self.flags(name)
            .is_some_and(|f| f.contains(CvarFlags::MODIFIED))
    }

    pub fn clear_modified(&self, name: &str) {
        if let Some(var) = self.state.lock().find_mut(name) {
            var.flags.remove(CvarFlags::MODIFIED);
        }
    }

    /// Names of every cvar carrying any of `flags`, in registration order.
    pub fn names_with_flags(&self, flags: CvarFlags) -> Vec<String> {
        self.state
            .lock()
            .vars
            .iter()
            .filter(|v| flags == CvarFlags::ALL || v.flags.intersects(flags))
            .map(|v| v.name.clone())
            .collect()
    }

    /// Names starting with `partial`, case-insensitive.
    pub fn complete_name(&self, partial: &str) -> Vec<String> {
        let partial = partial.to_ascii_lowercase();
        self.state
            .lock()
            .vars
            .iter()
            .filter(|v| v.name.to_ascii_lowercase().starts_with(&partial))
            .map(|v| v.name.clone())
            .collect()
    }

    /// Run the value completion registered for `args.argv(0)`. Returns false
    /// when the cvar does not exist or has no completion.
    pub fn complete_value(&self, args: &CmdArgs, sink: &mut CompletionSink<'_>) -> bool {
        let (completion, cmd_system) = {
            let state = self.state.lock();
            match state.find(args.argv(0)).and_then(|v| v.completion.as_ref()) {
                Some(reg) => (reg.completion().clone(), reg.cmd_system()),
                None => return false,
            }
        };
        // Unlocked: completions and sinks may read cvars.
        completion.complete(args, cmd_system.as_deref(), sink);
        true
    }

    /// Write `seta name "value"` for every archived cvar.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        let state = self.state.lock();
        for var in state.vars.iter().filter(|v| v.flags.contains(CvarFlags::ARCHIVE)) {
            writeln!(writer, "seta {} \"{}\"", var.name, var.value)?;
        }
        Ok(())
    }
}

impl Default for CvarTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeCvarSystem for CvarTable {
    fn get_cvar_string(&self, name: &CStr) -> CString {
        let value = self.string(&from_native(name));
        to_native_lossy(&value)
    }

    fn get_cvar_bool(&self, name: &CStr) -> bool {
        self.integer(&from_native(name)) != 0
    }

    fn get_cvar_integer(&self, name: &CStr) -> i32 {
        self.integer(&from_native(name))
    }

    fn get_cvar_float(&self, name: &CStr) -> f32 {
        self.float(&from_native(name))
    }

    fn set_cvar_string(&self, name: &CStr, value: &CStr) {
        self.set(&from_native(name), &from_native(value));
    }

    fn set_cvar_bool(&self, name: &CStr, value: bool) {
        self.set(&from_native(name), if value { "1" } else { "0" });
    }

    fn set_cvar_integer(&self, name: &CStr, value: i32) {
        self.set(&from_native(name), &value.to_string());
    }

    fn set_cvar_float(&self, name: &CStr, value: f32) {
        self.set(&from_native(name), &format_float(value));
    }

    fn register(&self, cvar: CvarDescriptor) {
        let name = from_native(&cvar.name);
        let default = from_native(&cvar.value);

        let mut var = Cvar {
            name: name.clone(),
            value: default.clone(),
            reset_value: default.clone(),
            description: from_native(&cvar.description),
            flags: cvar.flags,
            range: cvar.range,
            value_strings: cvar
                .value_strings
                .as_ref()
                .map(|list| list.iter().map(|v| from_native(v)).collect()),
            completion: cvar.completion,
        };

        let mut state = self.state.lock();
        // A value set before registration (command line, config) survives.
        let current = state.find(&name).map(|v| v.value.clone());
        var.value = var.validate(current.as_deref().unwrap_or(&default));
        var.reset_value = var.validate(&default);

        match state.index.get(&name.to_ascii_lowercase()) {
            Some(&i) => state.vars[i] = var,
            None => {
                state.insert(var);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let table = CvarTable::new();
        table.register(
            CvarDescriptor::new("g_gravity", "1066", "gravity", CvarFlags::GAME | CvarFlags::FLOAT).unwrap(),
        );
        assert_eq!(table.float("g_gravity"), 1066.0);
        assert_eq!(table.get_cvar_string(&cs("G_GRAVITY")).as_bytes(), b"1066");
        assert_eq!(table.description("g_gravity").as_deref(), Some("gravity"));
    }

    #[test]
    fn test_not_found() {
        let table = CvarTable::new();
        assert_eq!(table.string("nonexistent"), "");
        assert_eq!(table.integer("nonexistent"), 0);
        assert!(!table.get_cvar_bool(&cs("nonexistent")));
    }

    #[test]
    fn test_rom_and_init_reject_set() {
        let table = CvarTable::new();
        table.register(CvarDescriptor::new("si_version", "1.3", "", CvarFlags::ROM).unwrap());
        table.register(CvarDescriptor::new("fs_game", "base", "", CvarFlags::INIT).unwrap());
        table.set("si_version", "9");
        table.set_cvar_string(&cs("fs_game"), &cs("mymod"));
        assert_eq!(table.string("si_version"), "1.3");
        assert_eq!(table.string("fs_game"), "base");

        table.force_set("fs_game", "mymod");
        assert_eq!(table.string("fs_game"), "mymod");
    }

    #[test]
    fn test_range_clamps() {
        let table = CvarTable::new();
        table.register(
            CvarDescriptor::new("si_fragLimit", "10", "", CvarFlags::INTEGER)
                .unwrap()
                .with_range(1.0, 100.0),
        );
        table.set("si_fragLimit", "500");
        assert_eq!(table.integer("si_fragLimit"), 100);
        table.set_cvar_integer(&cs("si_fragLimit"), -3);
        assert_eq!(table.integer("si_fragLimit"), 1);

        table.register(
            CvarDescriptor::new("g_fov", "90", "", CvarFlags::FLOAT)
                .unwrap()
                .with_range(1.0, 179.0),
        );
        table.set_cvar_float(&cs("g_fov"), 200.5);
        assert_eq!(table.float("g_fov"), 179.0);
    }

    #[test]
    fn test_inverted_or_nan_range_is_ignored() {
        let table = CvarTable::new();
        table.register(
            CvarDescriptor::new("si_timeLimit", "5", "", CvarFlags::INTEGER)
                .unwrap()
                .with_range(10.0, 1.0),
        );
        assert_eq!(table.integer("si_timeLimit"), 5);
        table.set("si_timeLimit", "42");
        assert_eq!(table.integer("si_timeLimit"), 42);

        table.register(
            CvarDescriptor::new("g_gravity", "1066", "", CvarFlags::FLOAT)
                .unwrap()
                .with_range(f32::NAN, 1.0),
        );
        assert_eq!(table.float("g_gravity"), 1066.0);
        table.set_cvar_float(&cs("g_gravity"), -3.5);
        assert_eq!(table.float("g_gravity"), -3.5);
    }

    #[test]
    fn test_bool_and_value_strings() {
        let table = CvarTable::new();
        table.register(CvarDescriptor::new("g_cheats", "0", "", CvarFlags::BOOL).unwrap());
        table.set("g_cheats", "7");
        assert_eq!(table.string("g_cheats"), "1");

        table.register(
            CvarDescriptor::new("si_gameType", "singleplayer", "", CvarFlags::empty())
                .unwrap()
                .with_value_strings(&["singleplayer", "deathmatch", "Tourney"])
                .unwrap(),
        );
        table.set("si_gameType", "tourney");
        assert_eq!(table.string("si_gameType"), "Tourney");
        table.set("si_gameType", "bogus");
        assert_eq!(table.string("si_gameType"), "singleplayer");
    }

    #[test]
    fn test_modified_flag() {
        let table = CvarTable::new();
        table.register(CvarDescriptor::new("g_skill", "1", "", CvarFlags::INTEGER).unwrap());
        assert!(!table.is_modified("g_skill"));
        table.set("g_skill", "1");
        assert!(!table.is_modified("g_skill"));
        table.set("g_skill", "2");
        assert!(table.is_modified("g_skill"));
        table.clear_modified("g_skill");
        assert!(!table.is_modified("g_skill"));
        table.reset("g_skill");
        assert_eq!(table.integer("g_skill"), 1);
    }

    #[test]
    fn test_value_set_before_register_survives() {
        let table = CvarTable::new();
        table.set("fs_game", "mymod");
        table.register(CvarDescriptor::new("fs_game", "", "mod directory", CvarFlags::INIT).unwrap());
        assert_eq!(table.string("fs_game"), "mymod");
        assert_eq!(table.flags("fs_game"), Some(CvarFlags::INIT));
    }

    #[test]
    fn test_complete_value_uses_registration() {
        let table = CvarTable::new();
        table.register(
            CvarDescriptor::new("foo", "1", "", CvarFlags::INTEGER)
                .unwrap()
                .with_completion(ArgCompletion::Integer { min: 1, max: 3 }),
        );
        let mut got = Vec::new();
        assert!(table.complete_value(&CmdArgs::tokenize("foo"), &mut |s| got.push(s.to_string())));
        assert_eq!(got, vec!["foo 1", "foo 2", "foo 3"]);
        assert!(!table.complete_value(&CmdArgs::tokenize("bar"), &mut |_| {}));
    }

    #[test]
    fn test_complete_value_sink_can_read_cvars() {
        let table = CvarTable::new();
        table.register(
            CvarDescriptor::new("g_skill", "2", "", CvarFlags::INTEGER)
                .unwrap()
                .with_completion(ArgCompletion::strings(["easy", "hard"])),
        );
        let mut got = Vec::new();
        assert!(table.complete_value(&CmdArgs::tokenize("g_skill"), &mut |s| {
            got.push(format!("{} ({})", s, table.string("g_skill")));
        }));
        assert_eq!(got, vec!["g_skill easy (2)", "g_skill hard (2)"]);
    }

    #[test]
    fn test_names_and_archive() {
        let table = CvarTable::new();
        table.register(CvarDescriptor::new("ui_name", "Player", "", CvarFlags::USERINFO | CvarFlags::ARCHIVE).unwrap());
        table.register(CvarDescriptor::new("ui_team", "Red", "", CvarFlags::USERINFO).unwrap());
        table.register(CvarDescriptor::new("si_map", "d3dm1", "", CvarFlags::SERVERINFO).unwrap());

        assert_eq!(table.names_with_flags(CvarFlags::USERINFO), vec!["ui_name", "ui_team"]);
        assert_eq!(table.names_with_flags(CvarFlags::ALL).len(), 3);
        assert_eq!(table.complete_name("UI_"), vec!["ui_name", "ui_team"]);

        let mut buf = Vec::new();
        table.write_variables(&mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("seta ui_name \"Player\""));
        assert!(!output.contains("ui_team"));
    }
}
