// dict.rs -- Key/value property bag (spawn args, user info, server info)
//
// Keys compare case-insensitively and keep insertion order. Cloning makes a
// deep copy: a dictionary handed across the boundary never aliases the one
// it was copied from.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::marshal::{Mat3, Vec3, MAT3_IDENTITY, VEC3_ORIGIN};

const DICT_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dict {
    args: Vec<KeyValue>,
}

impl Dict {
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn clear(&mut self) {
        self.args.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.args.iter()
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.args.iter().position(|kv| kv.key.eq_ignore_ascii_case(key))
    }

    // ---- setters ----

    /// Empty keys are ignored; they cannot be told apart from the end of a
    /// serialized dictionary.
    pub fn set(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        match self.index_of(key) {
            Some(i) => self.args[i].value = value.to_string(),
            None => self.args.push(KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "1" } else { "0" });
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set(key, &value.to_string());
    }

    pub fn set_float(&mut self, key: &str, value: f32) {
        self.set(key, &format!("{:.6}", value));
    }

    pub fn set_vector(&mut self, key: &str, v: &Vec3) {
        self.set(key, &float_array_to_string(v));
    }

    pub fn set_matrix(&mut self, key: &str, m: &Mat3) {
        let flat: Vec<f32> = m.iter().flatten().copied().collect();
        self.set(key, &float_array_to_string(&flat));
    }

    /// Remove a key. Returns true if it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.index_of(key) {
            Some(i) => {
                self.args.remove(i);
                true
            }
            None => false,
        }
    }

    // ---- getters ----

    pub fn find_key(&self, key: &str) -> Option<&KeyValue> {
        self.index_of(key).map(|i| &self.args[i])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index_of(key).is_some()
    }

    pub fn get_string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.find_key(key).map(|kv| kv.value.as_str()).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: &str) -> i32 {
        atoi(self.get_string(key, default))
    }

    pub fn get_float(&self, key: &str, default: &str) -> f32 {
        atof(self.get_string(key, default))
    }

    /// Any non-zero integer value reads as true.
    pub fn get_bool(&self, key: &str, default: &str) -> bool {
        atoi(self.get_string(key, default)) != 0
    }

    pub fn get_vector(&self, key: &str, default: Option<&str>) -> Vec3 {
        let text = self.get_string(key, default.unwrap_or("0 0 0"));
        let mut out = VEC3_ORIGIN;
        scan_floats(text, &mut out);
        out
    }

    pub fn get_matrix(&self, key: &str, default: Option<&str>) -> Mat3 {
        let text = self.get_string(key, default.unwrap_or("1 0 0 0 1 0 0 0 1"));
        let mut flat = [0.0f32; 9];
        if scan_floats(text, &mut flat) < 9 {
            return MAT3_IDENTITY;
        }
        [
            [flat[0], flat[1], flat[2]],
            [flat[3], flat[4], flat[5]],
            [flat[6], flat[7], flat[8]],
        ]
    }

    /// Next pair whose key starts with `prefix` (case-insensitive), after
    /// `last` when given. Walk every match by feeding each result back in.
    pub fn match_prefix(&self, prefix: &str, last: Option<&KeyValue>) -> Option<&KeyValue> {
        let start = match last {
            Some(prev) => self.args.iter().position(|kv| std::ptr::eq(kv, prev))? + 1,
            None => 0,
        };
        self.args[start..].iter().find(|kv| {
            kv.key.len() >= prefix.len()
                && kv.key.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        })
    }

    // ---- whole-dictionary operations ----

    /// Add every pair from `other` whose key is missing here.
    pub fn set_defaults(&mut self, other: &Dict) {
        for kv in &other.args {
            if !self.contains_key(&kv.key) {
                self.args.push(kv.clone());
            }
        }
    }

    /// Overwrite or insert every pair from `other`.
    pub fn copy_from(&mut self, other: &Dict) {
        for kv in &other.args {
            self.set(&kv.key, &kv.value);
        }
    }

    /// Replace this dictionary's contents with `other`'s, leaving `other`
    /// empty.
    pub fn transfer_key_values(&mut self, other: &mut Dict) {
        self.args = std::mem::take(&mut other.args);
    }

    /// Order-independent CRC over every key and value.
    pub fn checksum(&self) -> u32 {
        let mut sorted: Vec<&KeyValue> = self.args.iter().collect();
        sorted.sort_by_key(|kv| kv.key.to_ascii_lowercase());

        let mut digest = DICT_CRC.digest();
        for kv in sorted {
            digest.update(kv.key.to_ascii_lowercase().as_bytes());
            digest.update(kv.value.as_bytes());
        }
        digest.finalize()
    }
}

// ============================================================
// Lenient numeric parsing (atoi/atof/sscanf semantics)
// ============================================================

/// Leading integer of `s`, 0 when there is none.
pub fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    s[..end].parse::<i64>().map(|v| v as i32).unwrap_or(0)
}

/// Leading float of `s`, 0.0 when there is none.
pub fn atof(s: &str) -> f32 {
    let token = s.split_whitespace().next().unwrap_or("");
    let mut end = token.len();
    while end > 0 {
        if let Ok(v) = token[..end].parse::<f32>() {
            return v;
        }
        end -= 1;
        while end > 0 && !token.is_char_boundary(end) {
            end -= 1;
        }
    }
    0.0
}

/// Fill `out` from whitespace-separated floats; returns how many parsed.
fn scan_floats(text: &str, out: &mut [f32]) -> usize {
    let mut count = 0;
    for (slot, token) in out.iter_mut().zip(text.split_whitespace()) {
        match token.parse::<f32>() {
            Ok(v) => {
                *slot = v;
                count += 1;
            }
            Err(_) => break,
        }
    }
    count
}

/// Two decimals, trailing zeros and a trailing dot stripped.
fn float_array_to_string(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| {
            let s = format!("{:.2}", v);
            let s = s.trim_end_matches('0').trim_end_matches('.');
            if s == "-0" { "0".to_string() } else { s.to_string() }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_set_and_get() {
        let mut d = Dict::new();
        d.set("Name", "player");
        d.set("name", "doomguy");
        assert_eq!(d.len(), 1);
        assert_eq!(d.get_string("NAME", ""), "doomguy");
        assert_eq!(d.get_string("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_empty_key_is_ignored() {
        let mut d = Dict::new();
        d.set("", "lost");
        d.set("name", "player");
        assert_eq!(d.len(), 1);
        assert!(!d.contains_key(""));
    }

    #[test]
    fn test_typed_getters() {
        let mut d = Dict::new();
        d.set_int("health", 100);
        d.set_bool("cheats", true);
        d.set_float("gravity", 1066.0);
        d.set("rate", "16000 bps");
        assert_eq!(d.get_int("health", "0"), 100);
        assert!(d.get_bool("cheats", "0"));
        assert!(!d.get_bool("missing", "0"));
        assert_eq!(d.get_float("gravity", "0"), 1066.0);
        assert_eq!(d.get_int("rate", "0"), 16000);
        assert_eq!(d.get_int("missing", "7"), 7);
    }

    #[test]
    fn test_vector_and_matrix() {
        let mut d = Dict::new();
        d.set_vector("origin", &[1.5, -2.0, 0.25]);
        assert_eq!(d.get_string("origin", ""), "1.5 -2 0.25");
        assert_eq!(d.get_vector("origin", None), [1.5, -2.0, 0.25]);
        assert_eq!(d.get_vector("missing", None), VEC3_ORIGIN);
        assert_eq!(d.get_matrix("rotation", None), MAT3_IDENTITY);

        d.set("rotation", "0 1 0 -1 0 0 0 0 1");
        assert_eq!(
            d.get_matrix("rotation", None),
            [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_copy_is_independent() {
        let mut native = Dict::new();
        native.set("classname", "info_player_start");

        let mut copy = native.clone();
        copy.set("classname", "monster_zombie");
        copy.set("extra", "1");
        assert_eq!(native.get_string("classname", ""), "info_player_start");
        assert!(!native.contains_key("extra"));

        native.set("classname", "light");
        assert_eq!(copy.get_string("classname", ""), "monster_zombie");
    }

    #[test]
    fn test_match_prefix_walks_all() {
        let mut d = Dict::new();
        d.set("def_weapon0", "pistol");
        d.set("name", "x");
        d.set("DEF_weapon1", "shotgun");

        let mut found = Vec::new();
        let mut kv = d.match_prefix("def_", None);
        while let Some(cur) = kv {
            found.push(cur.value().to_string());
            kv = d.match_prefix("def_", Some(cur));
        }
        assert_eq!(found, vec!["pistol", "shotgun"]);
    }

    #[test]
    fn test_defaults_copy_transfer() {
        let mut a = Dict::new();
        a.set("a", "1");
        let mut b = Dict::new();
        b.set("a", "2");
        b.set("b", "3");

        let mut defaults = a.clone();
        defaults.set_defaults(&b);
        assert_eq!(defaults.get_string("a", ""), "1");
        assert_eq!(defaults.get_string("b", ""), "3");

        let mut copied = a.clone();
        copied.copy_from(&b);
        assert_eq!(copied.get_string("a", ""), "2");

        let mut target = Dict::new();
        target.transfer_key_values(&mut b);
        assert!(b.is_empty());
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_checksum_ignores_order() {
        let mut a = Dict::new();
        a.set("si_map", "game/mp/d3dm1");
        a.set("si_gameType", "deathmatch");
        let mut b = Dict::new();
        b.set("si_gametype", "deathmatch");
        b.set("si_map", "game/mp/d3dm1");
        assert_eq!(a.checksum(), b.checksum());
        b.set("si_map", "game/mp/d3dm2");
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_atoi_atof() {
        assert_eq!(atoi("  42abc"), 42);
        assert_eq!(atoi("-3"), -3);
        assert_eq!(atoi("x"), 0);
        assert_eq!(atof("2.5 3"), 2.5);
        assert_eq!(atof("1.5e"), 1.5);
        assert_eq!(atof(""), 0.0);
    }
}
