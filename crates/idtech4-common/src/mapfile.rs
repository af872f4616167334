// mapfile.rs -- .map file parsing for in-process hosts
//
// Only entity key/value pairs are kept. Brush and patch primitives are
// counted and skipped; `remove_primitive_data` drops even the counts.

use std::ffi::{CStr, CString};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::dict::Dict;
use crate::host::DiskFileSystem;
use crate::marshal::{from_native, to_native_lossy};
use crate::native::{NativeMapEntity, NativeMapFile, NativeMapFileSource};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Quoted(String),
    Word(String),
}

/// Split map text into tokens, dropping `//` and `/* */` comments.
fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c <= b' ' {
            i += 1;
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i += 2;
        } else if c == b'"' {
            let start = i + 1;
            i = start;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            tokens.push(Token::Quoted(lossy(&bytes[start..i.min(bytes.len())])));
            i += 1;
        } else if c == b'{' || c == b'}' || c == b'(' || c == b')' {
            tokens.push(Token::Word((c as char).to_string()));
            i += 1;
        } else {
            let start = i;
            while i < bytes.len()
                && bytes[i] > b' '
                && !matches!(bytes[i], b'"' | b'{' | b'}' | b'(' | b')')
            {
                i += 1;
            }
            tokens.push(Token::Word(lossy(&bytes[start..i])));
        }
    }
    tokens
}

fn lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn is_word(token: Option<&Token>, word: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w == word)
}

/// One parsed entity: its key/value pairs and how many primitives it had.
#[derive(Debug, Clone, Default)]
pub struct HostMapEntity {
    epairs: Dict,
    primitives: usize,
}

impl HostMapEntity {
    pub fn primitive_count(&self) -> usize {
        self.primitives
    }
}

impl NativeMapEntity for HostMapEntity {
    fn epairs(&self) -> &Dict {
        &self.epairs
    }
}

/// Parse the text of a .map file. Returns `None` on malformed input.
pub fn parse_map_text(text: &str) -> Option<Vec<HostMapEntity>> {
    let tokens = tokenize(text);
    let mut pos = 0;

    if is_word(tokens.first(), "Version") {
        pos = 2;
    }

    let mut entities = Vec::new();
    while pos < tokens.len() {
        if !is_word(tokens.get(pos), "{") {
            return None;
        }
        pos += 1;

        let mut entity = HostMapEntity::default();
        loop {
            match tokens.get(pos)? {
                Token::Word(w) if w == "}" => {
                    pos += 1;
                    break;
                }
                Token::Word(w) if w == "{" => {
                    // primitive: skip to the matching brace
                    let mut depth = 0usize;
                    loop {
                        match tokens.get(pos)? {
                            Token::Word(w) if w == "{" => depth += 1,
                            Token::Word(w) if w == "}" => {
                                depth -= 1;
                                if depth == 0 {
                                    pos += 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                        pos += 1;
                    }
                    entity.primitives += 1;
                }
                Token::Quoted(key) => {
                    let Token::Quoted(value) = tokens.get(pos + 1)? else {
                        return None;
                    };
                    entity.epairs.set(key, value);
                    pos += 2;
                }
                Token::Word(_) => return None,
            }
        }
        entities.push(entity);
    }
    Some(entities)
}

/// A map file loaded through the host file system (or straight from disk
/// for OS paths).
pub struct HostMapFile {
    fs: Arc<DiskFileSystem>,
    name: String,
    os_path: bool,
    entities: Vec<HostMapEntity>,
    timestamp: Option<u32>,
}

impl HostMapFile {
    pub fn new(fs: Arc<DiskFileSystem>) -> Self {
        Self {
            fs,
            name: String::new(),
            os_path: false,
            entities: Vec::new(),
            timestamp: None,
        }
    }

    fn current_timestamp(&self) -> Option<u32> {
        if self.os_path {
            let modified = fs::metadata(&self.name).and_then(|m| m.modified()).ok()?;
            modified
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_secs() as u32)
        } else {
            self.fs.file_timestamp(&self.name)
        }
    }
}

impl NativeMapFile for HostMapFile {
    fn parse(&mut self, filename: &CStr, _ignore_region: bool, os_path: bool) -> bool {
        let mut name = from_native(filename);
        if Path::new(&name).extension().is_none() {
            name.push_str(".map");
        }
        self.name = name;
        self.os_path = os_path;
        self.entities.clear();

        let data = if os_path {
            fs::read(&self.name).ok()
        } else {
            self.fs.load_file(&self.name, None)
        };
        let Some(data) = data else {
            return false;
        };

        match parse_map_text(&lossy(&data)) {
            Some(entities) => {
                self.entities = entities;
                self.timestamp = self.current_timestamp();
                true
            }
            None => false,
        }
    }

    fn remove_primitive_data(&mut self) {
        for entity in &mut self.entities {
            entity.primitives = 0;
        }
    }

    fn num_entities(&self) -> i32 {
        self.entities.len() as i32
    }

    fn entity(&self, index: i32) -> Option<&dyn NativeMapEntity> {
        let index = usize::try_from(index).ok()?;
        self.entities.get(index).map(|e| e as &dyn NativeMapEntity)
    }

    fn needs_reload(&self) -> bool {
        self.name.is_empty() || self.current_timestamp() != self.timestamp
    }

    fn name(&self) -> CString {
        to_native_lossy(&self.name)
    }
}

/// Allocates `HostMapFile`s over a shared file system.
pub struct HostMapSource {
    fs: Arc<DiskFileSystem>,
}

impl HostMapSource {
    pub fn new(fs: Arc<DiskFileSystem>) -> Self {
        Self { fs }
    }
}

impl NativeMapFileSource for HostMapSource {
    fn alloc_map_file(&self) -> Box<dyn NativeMapFile> {
        Box::new(HostMapFile::new(self.fs.clone()))
    }
}
