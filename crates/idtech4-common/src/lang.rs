// lang.rs -- Localized string tables
//
// Engine strings use printf placeholders; module-side strings use numbered
// `{n}` placeholders. `renumber_placeholders` converts one to the other.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::OnceLock;

use regex::Regex;

use crate::marshal::{from_native, to_native_lossy};
use crate::native::NativeLangDict;

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new("%s|%d|%x").ok()).as_ref()
}

/// Replace each `%s`, `%d` and `%x`, left to right, with `{0}`, `{1}`, ...
/// Other `%` sequences are left alone. The count restarts on every call.
pub fn renumber_placeholders(text: &str) -> String {
    let Some(re) = placeholder_regex() else {
        return text.to_string();
    };
    let mut index = 0;
    re.replace_all(text, |_: &regex::Captures| {
        let out = format!("{{{}}}", index);
        index += 1;
        out
    })
    .into_owned()
}

/// In-process language dictionary keyed by `#str_` ids.
#[derive(Debug, Default)]
pub struct LangTable {
    strings: HashMap<String, String>,
}

impl LangTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.strings.insert(key.to_ascii_lowercase(), value.to_string());
    }

    /// Parse `"#str_NNNNN" "text"` lines, the body of a .lang file.
    pub fn load(&mut self, text: &str) -> usize {
        let mut count = 0;
        for line in text.lines() {
            let quoted: Vec<&str> = line.split('"').collect();
            // `"key" "value"` splits into ["", key, " ", value, ""]
            if quoted.len() >= 5 && quoted[1].starts_with('#') {
                self.insert(quoted[1], quoted[3]);
                count += 1;
            }
        }
        count
    }

    /// Unknown keys come back unchanged.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.strings
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or(key)
    }
}

impl NativeLangDict for LangTable {
    fn get_string(&self, key: &CStr) -> CString {
        let key = from_native(key);
        to_native_lossy(&self.get(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renumber_placeholders() {
        assert_eq!(
            renumber_placeholders("%s killed %s with %d shots"),
            "{0} killed {1} with {2} shots"
        );
        assert_eq!(renumber_placeholders("0x%x"), "0x{0}");
        assert_eq!(renumber_placeholders("100% done %f"), "100% done %f");
        // Numbering restarts per call.
        assert_eq!(renumber_placeholders("%d"), "{0}");
    }

    #[test]
    fn test_lang_table() {
        let mut table = LangTable::new();
        let n = table.load(
            "{\n\t\"#str_02047\"\t\"Deathmatch\"\n\t\"#str_04101\"\t\"%s joined\"\n}\n",
        );
        assert_eq!(n, 2);
        assert_eq!(table.get("#STR_02047"), "Deathmatch");
        assert_eq!(table.get("#str_99999"), "#str_99999");

        let key = CString::new("#str_04101").unwrap();
        assert_eq!(table.get_string(&key).as_bytes(), b"%s joined");
    }
}
