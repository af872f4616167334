// common.rs -- Console printing
//
// `com_*` helpers print module-side strings through a native console.
// `StdCommon` is a console for hosts without an engine: it prints to
// stdout/stderr and can redirect everything into a buffer.

use std::ffi::{CStr, CString};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::marshal::{from_native, to_native_lossy};
use crate::native::{NativeCommon, NativeCvarSystem};

/// Console text with interior NULs dropped, so a print never fails.
fn console_text(msg: &str) -> CString {
    to_native_lossy(msg)
}

pub fn com_printf(common: &dyn NativeCommon, msg: &str) {
    common.printf(&console_text(msg));
}

/// Developer-only print.
pub fn com_dprintf(common: &dyn NativeCommon, msg: &str) {
    common.dprintf(&console_text(msg));
}

pub fn com_warning(common: &dyn NativeCommon, msg: &str) {
    common.warning(&console_text(msg));
}

pub fn com_dwarning(common: &dyn NativeCommon, msg: &str) {
    common.dwarning(&console_text(msg));
}

/// Drop the current game with an error message.
pub fn com_error(common: &dyn NativeCommon, msg: &str) {
    common.error(&console_text(msg));
}

// ============================================================
// Stand-alone console
// ============================================================

pub struct StdCommon {
    /// Queried for "developer" on every developer print.
    cvars: Option<Arc<dyn NativeCvarSystem>>,
    redirect: Mutex<Option<String>>,
}

impl StdCommon {
    /// A console whose developer prints are always enabled when `cvars` is
    /// `None`.
    pub fn new(cvars: Option<Arc<dyn NativeCvarSystem>>) -> Self {
        Self {
            cvars,
            redirect: Mutex::new(None),
        }
    }

    fn developer(&self) -> bool {
        match &self.cvars {
            Some(cvars) => cvars.get_cvar_bool(c"developer"),
            None => true,
        }
    }

    /// Start collecting output instead of printing it.
    pub fn begin_redirect(&self) {
        *self.redirect.lock() = Some(String::new());
    }

    /// Stop collecting and return what was collected.
    pub fn end_redirect(&self) -> String {
        self.redirect.lock().take().unwrap_or_default()
    }

    /// Output collected so far, without ending the redirect.
    pub fn redirected(&self) -> String {
        self.redirect.lock().clone().unwrap_or_default()
    }

    fn emit(&self, text: &str, to_stderr: bool) {
        {
            let mut buf = self.redirect.lock();
            if let Some(ref mut s) = *buf {
                s.push_str(text);
                return;
            }
        }
        if to_stderr {
            eprint!("{}", text);
        } else {
            print!("{}", text);
        }
    }
}

impl Default for StdCommon {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NativeCommon for StdCommon {
    fn printf(&self, msg: &CStr) {
        self.emit(&from_native(msg), false);
    }

    fn dprintf(&self, msg: &CStr) {
        if !self.developer() {
            return;
        }
        self.printf(msg);
    }

    fn warning(&self, msg: &CStr) {
        self.emit(&format!("WARNING: {}\n", from_native(msg)), true);
    }

    fn dwarning(&self, msg: &CStr) {
        if !self.developer() {
            return;
        }
        self.warning(msg);
    }

    fn error(&self, msg: &CStr) {
        self.emit(
            &format!(
                "********************\nERROR: {}\n********************\n",
                from_native(msg)
            ),
            true,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvar::CvarTable;

    #[test]
    fn test_redirect_collects_output() {
        let common = StdCommon::default();
        common.begin_redirect();
        com_printf(&common, "hello ");
        com_dprintf(&common, "dev\n");
        com_warning(&common, "careful");
        assert_eq!(common.end_redirect(), "hello dev\nWARNING: careful\n");
        assert_eq!(common.end_redirect(), "");
    }

    #[test]
    fn test_developer_gate() {
        let cvars = Arc::new(CvarTable::new());
        let common = StdCommon::new(Some(cvars.clone()));
        common.begin_redirect();
        com_dprintf(&common, "hidden\n");
        com_dwarning(&common, "hidden");
        cvars.set("developer", "1");
        com_dprintf(&common, "shown\n");
        assert_eq!(common.end_redirect(), "shown\n");
    }

    #[test]
    fn test_interior_nul_does_not_fail() {
        let common = StdCommon::default();
        common.begin_redirect();
        com_printf(&common, "a\0b");
        com_error(&common, "boom");
        assert_eq!(
            common.end_redirect(),
            "ab********************\nERROR: boom\n********************\n"
        );
    }
}
