// bitmsg.rs -- Byte message buffer for reliable messages and snapshots
//
// Integers are little-endian, strings are NUL-terminated. Writing past the
// end sets `overflowed` and drops the write; reading past the end returns -1
// (or an empty string), the same way the engine's message readers behave.

use crate::dict::Dict;

/// Size of a game reliable-message buffer.
pub const MAX_GAME_MESSAGE_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct BitMsg {
    data: Vec<u8>,
    cursize: usize,
    readcount: usize,
    overflowed: bool,
    allow_overflow: bool,
}

impl BitMsg {
    pub fn new(maxsize: usize) -> Self {
        Self {
            data: vec![0u8; maxsize],
            cursize: 0,
            readcount: 0,
            overflowed: false,
            allow_overflow: false,
        }
    }

    /// A message sized for game reliable messages.
    pub fn init_game() -> Self {
        Self::new(MAX_GAME_MESSAGE_SIZE)
    }

    /// Wrap received bytes for reading.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut msg = Self::new(bytes.len());
        msg.data.copy_from_slice(bytes);
        msg.cursize = bytes.len();
        msg
    }

    pub fn set_allow_overflow(&mut self, allow: bool) {
        self.allow_overflow = allow;
    }

    pub fn max_size(&self) -> usize {
        self.data.len()
    }

    pub fn size(&self) -> usize {
        self.cursize
    }

    pub fn read_count(&self) -> usize {
        self.readcount
    }

    pub fn remaining_data(&self) -> usize {
        self.cursize.saturating_sub(self.readcount)
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.cursize]
    }

    // ============================================================
    // Writing
    // ============================================================

    pub fn begin_writing(&mut self) {
        self.cursize = 0;
        self.readcount = 0;
        self.overflowed = false;
    }

    fn get_space(&mut self, length: usize) -> Option<usize> {
        if self.cursize + length > self.data.len() {
            if !self.allow_overflow {
                self.overflowed = true;
                return None;
            }
            if length > self.data.len() {
                self.overflowed = true;
                return None;
            }
            // Overflow allowed: wrap to the start and flag it.
            self.begin_writing();
            self.overflowed = true;
        }
        let start = self.cursize;
        self.cursize += length;
        Some(start)
    }

    pub fn write_data(&mut self, bytes: &[u8]) {
        if let Some(start) = self.get_space(bytes.len()) {
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
        }
    }

    pub fn write_byte(&mut self, c: i32) {
        if let Some(start) = self.get_space(1) {
            self.data[start] = c as u8;
        }
    }

    pub fn write_short(&mut self, c: i32) {
        self.write_data(&(c as i16).to_le_bytes());
    }

    pub fn write_long(&mut self, c: i32) {
        self.write_data(&c.to_le_bytes());
    }

    pub fn write_float(&mut self, f: f32) {
        self.write_data(&f.to_le_bytes());
    }

    /// Write a NUL-terminated string. `max_length` < 0 means no limit;
    /// `make_7bit` replaces bytes above 127 and '%' with '.'.
    pub fn write_string(&mut self, s: &str, max_length: i32, make_7bit: bool) {
        let mut bytes: Vec<u8> = s.bytes().take_while(|&b| b != 0).collect();
        if max_length >= 0 && bytes.len() > max_length as usize {
            bytes.truncate(max_length as usize);
        }
        if make_7bit {
            for b in bytes.iter_mut() {
                if *b > 127 || *b == b'%' {
                    *b = b'.';
                }
            }
        }
        bytes.push(0);
        self.write_data(&bytes);
    }

    /// Write the keys of `dict` that differ from `base` (all of them when no
    /// base is given), then the keys of `base` that `dict` dropped.
    ///
    /// Returns true when anything changed.
    pub fn write_delta_dict(&mut self, dict: &Dict, base: Option<&Dict>) -> bool {
        let mut changed = false;

        for kv in dict.iter() {
            let unchanged = base
                .and_then(|b| b.find_key(kv.key()))
                .map(|old| old.value() == kv.value())
                .unwrap_or(false);
            if !unchanged {
                self.write_string(kv.key(), -1, false);
                self.write_string(kv.value(), -1, false);
                changed = true;
            }
        }
        self.write_string("", -1, false);

        if let Some(base) = base {
            for kv in base.iter() {
                if !dict.contains_key(kv.key()) {
                    self.write_string(kv.key(), -1, false);
                    changed = true;
                }
            }
        }
        self.write_string("", -1, false);

        changed
    }

    // ============================================================
    // Reading
    // ============================================================

    pub fn begin_reading(&mut self) {
        self.readcount = 0;
    }

    fn read_bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        let rc = self.readcount;
        self.readcount += N;
        if rc + N > self.cursize {
            None
        } else {
            let mut out = [0u8; N];
            out.copy_from_slice(&self.data[rc..rc + N]);
            Some(out)
        }
    }

    pub fn read_byte(&mut self) -> i32 {
        self.read_bytes::<1>().map(|b| b[0] as i32).unwrap_or(-1)
    }

    pub fn read_short(&mut self) -> i32 {
        self.read_bytes::<2>()
            .map(|b| i16::from_le_bytes(b) as i32)
            .unwrap_or(-1)
    }

    pub fn read_long(&mut self) -> i32 {
        self.read_bytes::<4>().map(i32::from_le_bytes).unwrap_or(-1)
    }

    pub fn read_float(&mut self) -> f32 {
        self.read_bytes::<4>().map(f32::from_le_bytes).unwrap_or(-1.0)
    }

    /// Read a NUL-terminated string, keeping at most `max_len - 1` bytes.
    pub fn read_string(&mut self, max_len: usize) -> String {
        let mut out = Vec::new();
        loop {
            let c = self.read_byte();
            if c <= 0 {
                break;
            }
            if out.len() + 1 < max_len {
                out.push(c as u8);
            }
        }
        String::from_utf8(out)
            .unwrap_or_else(|e| e.into_bytes().iter().map(|&b| b as char).collect())
    }

    /// Apply a delta written by `write_delta_dict` on top of `base`.
    pub fn read_delta_dict(&mut self, base: Option<&Dict>) -> Dict {
        let mut dict = base.cloned().unwrap_or_default();

        loop {
            let key = self.read_string(crate::native::MAX_STRING_CHARS);
            if key.is_empty() {
                break;
            }
            let value = self.read_string(crate::native::MAX_STRING_CHARS);
            dict.set(&key, &value);
        }

        loop {
            let key = self.read_string(crate::native::MAX_STRING_CHARS);
            if key.is_empty() {
                break;
            }
            dict.delete(&key);
        }

        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_primitives() {
        let mut msg = BitMsg::init_game();
        msg.begin_writing();
        msg.write_byte(200);
        msg.write_short(-2);
        msg.write_long(123456);
        msg.write_string("hello", -1, true);

        let mut rd = BitMsg::from_bytes(msg.as_bytes());
        assert_eq!(rd.read_byte(), 200);
        assert_eq!(rd.read_short(), -2);
        assert_eq!(rd.read_long(), 123456);
        assert_eq!(rd.read_string(64), "hello");
        assert_eq!(rd.remaining_data(), 0);
        assert_eq!(rd.read_byte(), -1);
    }

    #[test]
    fn test_string_limits_and_7bit() {
        let mut msg = BitMsg::new(64);
        msg.write_string("r\u{e9}d 5%", -1, true);
        msg.write_string("truncated", 5, false);
        let mut rd = BitMsg::from_bytes(msg.as_bytes());
        assert_eq!(rd.read_string(64), "r..d 5.");
        assert_eq!(rd.read_string(64), "trunc");
    }

    #[test]
    fn test_overflow_sets_flag() {
        let mut msg = BitMsg::new(4);
        msg.write_long(1);
        assert!(!msg.overflowed());
        msg.write_byte(1);
        assert!(msg.overflowed());
        assert_eq!(msg.size(), 4);
    }

    #[test]
    fn test_delta_dict_changes_and_removals() {
        let mut base = Dict::new();
        base.set("name", "player");
        base.set("team", "red");

        let mut next = Dict::new();
        next.set("name", "doomguy");
        next.set("ui_ready", "1");

        let mut msg = BitMsg::init_game();
        assert!(msg.write_delta_dict(&next, Some(&base)));

        let mut rd = BitMsg::from_bytes(msg.as_bytes());
        let rebuilt = rd.read_delta_dict(Some(&base));
        assert_eq!(rebuilt.get_string("name", ""), "doomguy");
        assert_eq!(rebuilt.get_string("ui_ready", ""), "1");
        assert!(!rebuilt.contains_key("team"));
    }

    #[test]
    fn test_delta_dict_keeps_entries_after_rejected_key() {
        let mut dict = Dict::new();
        dict.set("", "ignored");
        dict.set("si_map", "game/mars_city1");
        dict.set("si_gameType", "singleplayer");

        let mut msg = BitMsg::init_game();
        assert!(msg.write_delta_dict(&dict, None));

        let mut rd = BitMsg::from_bytes(msg.as_bytes());
        let rebuilt = rd.read_delta_dict(None);
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.get_string("si_map", ""), "game/mars_city1");
        assert_eq!(rebuilt.get_string("si_gameType", ""), "singleplayer");
    }

    #[test]
    fn test_delta_dict_unchanged() {
        let mut base = Dict::new();
        base.set("name", "player");
        let mut msg = BitMsg::init_game();
        assert!(!msg.write_delta_dict(&base.clone(), Some(&base)));
    }
}
