// completion.rs -- Console argument completion
//
// Completions are plain Rust values. When a native cvar or command system
// needs a C callback, a `CompletionRegistration` owns the completion on the
// heap and hands out an `extern "C"` trampoline plus a user pointer that
// stays valid for exactly as long as the registration lives.

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::marshal::{from_native, from_native_ptr, to_native};
use crate::native::NativeCmdSystem;

/// Receives one completion candidate at a time.
pub type CompletionSink<'a> = dyn FnMut(&str) + 'a;

/// Native callback the engine passes to a completion routine.
pub type NativeCompletionCallback = unsafe extern "C" fn(candidate: *const c_char);

/// C form of a completion routine: `user` is the registration's user pointer,
/// `line` the partial command line.
pub type NativeArgCompletion = unsafe extern "C" fn(
    user: *mut c_void,
    line: *const c_char,
    callback: NativeCompletionCallback,
);

// ============================================================
// Tokenized command line
// ============================================================

/// A tokenized command line. Whitespace separates tokens; double quotes
/// group a token containing spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdArgs {
    argv: Vec<String>,
}

impl CmdArgs {
    pub fn tokenize(text: &str) -> Self {
        let mut argv = Vec::new();
        let mut chars = text.chars().peekable();

        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            let Some(&first) = chars.peek() else { break };

            let mut token = String::new();
            if first == '"' {
                chars.next();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    token.push(c);
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
            }
            argv.push(token);
        }

        Self { argv }
    }

    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// Token `i`, or "" past the end.
    pub fn argv(&self, i: usize) -> &str {
        self.argv.get(i).map(String::as_str).unwrap_or("")
    }

    /// Tokens from `start` on, joined by single spaces.
    pub fn args(&self, start: usize) -> String {
        self.argv.get(start..).map(|a| a.join(" ")).unwrap_or_default()
    }
}

// ============================================================
// Completion variants
// ============================================================

pub type CustomCompletion = dyn Fn(&CmdArgs, &mut CompletionSink<'_>) + Send + Sync;

#[derive(Clone)]
pub enum ArgCompletion {
    /// The engine's own map-name completion.
    MapName,
    /// `"<argv0> <n>"` for every n in `min..=max`, ascending.
    Integer { min: i32, max: i32 },
    /// `"<argv0> <entry>"` for every entry, in order.
    Strings(Vec<String>),
    Custom(Arc<CustomCompletion>),
}

impl ArgCompletion {
    pub fn strings<I, S>(list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgCompletion::Strings(list.into_iter().map(Into::into).collect())
    }

    pub fn custom(f: impl Fn(&CmdArgs, &mut CompletionSink<'_>) + Send + Sync + 'static) -> Self {
        ArgCompletion::Custom(Arc::new(f))
    }

    /// Emit every candidate for `args`. Map-name completion needs the
    /// engine's command system and produces nothing without one.
    pub fn complete(
        &self,
        args: &CmdArgs,
        cmd_system: Option<&dyn NativeCmdSystem>,
        sink: &mut CompletionSink<'_>,
    ) {
        match self {
            ArgCompletion::MapName => {
                if let Some(cmd) = cmd_system {
                    cmd.arg_completion_map_name(args, &mut |s: &CStr| sink(&from_native(s)));
                }
            }
            ArgCompletion::Integer { min, max } => {
                for i in *min..=*max {
                    sink(&format!("{} {}", args.argv(0), i));
                }
            }
            ArgCompletion::Strings(list) => {
                for entry in list {
                    sink(&format!("{} {}", args.argv(0), entry));
                }
            }
            ArgCompletion::Custom(f) => f(args, sink),
        }
    }

    /// Collect every candidate into a vector.
    pub fn candidates(&self, args: &CmdArgs, cmd_system: Option<&dyn NativeCmdSystem>) -> Vec<String> {
        let mut out = Vec::new();
        self.complete(args, cmd_system, &mut |s| out.push(s.to_string()));
        out
    }
}

impl std::fmt::Debug for ArgCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgCompletion::MapName => f.write_str("MapName"),
            ArgCompletion::Integer { min, max } => {
                f.debug_struct("Integer").field("min", min).field("max", max).finish()
            }
            ArgCompletion::Strings(list) => f.debug_tuple("Strings").field(list).finish(),
            ArgCompletion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ============================================================
// Native registration
// ============================================================

struct RegisteredCompletion {
    completion: ArgCompletion,
    cmd_system: Option<Arc<dyn NativeCmdSystem>>,
}

/// Owns a completion for as long as a native system may call it.
pub struct CompletionRegistration {
    inner: Box<RegisteredCompletion>,
}

impl CompletionRegistration {
    pub fn new(completion: ArgCompletion) -> Self {
        Self {
            inner: Box::new(RegisteredCompletion {
                completion,
                cmd_system: None,
            }),
        }
    }

    /// Attach the command system used for map-name completion.
    pub fn with_cmd_system(mut self, cmd_system: Arc<dyn NativeCmdSystem>) -> Self {
        self.inner.cmd_system = Some(cmd_system);
        self
    }

    pub fn completion(&self) -> &ArgCompletion {
        &self.inner.completion
    }

    pub fn cmd_system(&self) -> Option<Arc<dyn NativeCmdSystem>> {
        self.inner.cmd_system.clone()
    }

    /// Run the completion from Rust.
    pub fn complete(&self, args: &CmdArgs, sink: &mut CompletionSink<'_>) {
        self.inner
            .completion
            .complete(args, self.inner.cmd_system.as_deref(), sink);
    }

    /// The C trampoline and its user pointer. Both are valid until this
    /// registration is dropped.
    pub fn native_callback(&self) -> (NativeArgCompletion, *mut c_void) {
        let user = &*self.inner as *const RegisteredCompletion as *mut c_void;
        (completion_trampoline, user)
    }
}

impl std::fmt::Debug for CompletionRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRegistration")
            .field("completion", &self.inner.completion)
            .finish()
    }
}

unsafe extern "C" fn completion_trampoline(
    user: *mut c_void,
    line: *const c_char,
    callback: NativeCompletionCallback,
) {
    if user.is_null() {
        return;
    }
    let Some(line) = from_native_ptr(line) else {
        return;
    };
    let registered = &*(user as *const RegisteredCompletion);
    let args = CmdArgs::tokenize(&line);

    // Unwinding across the C boundary aborts; swallow panics here.
    let _ = catch_unwind(AssertUnwindSafe(|| {
        registered.completion.complete(
            &args,
            registered.cmd_system.as_deref(),
            &mut |candidate| {
                if let Ok(native) = to_native(candidate) {
                    callback(native.as_ptr());
                }
            },
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::CString;

    #[test]
    fn test_tokenize() {
        let args = CmdArgs::tokenize("  map \"game/mp/d3dm1\"  extra ");
        assert_eq!(args.argc(), 3);
        assert_eq!(args.argv(0), "map");
        assert_eq!(args.argv(1), "game/mp/d3dm1");
        assert_eq!(args.argv(9), "");
        assert_eq!(args.args(1), "game/mp/d3dm1 extra");
        assert_eq!(args.args(5), "");
    }

    #[test]
    fn test_integer_completion() {
        let args = CmdArgs::tokenize("foo");
        let got = ArgCompletion::Integer { min: 1, max: 3 }.candidates(&args, None);
        assert_eq!(got, vec!["foo 1", "foo 2", "foo 3"]);
    }

    #[test]
    fn test_integer_completion_empty_range() {
        let args = CmdArgs::tokenize("foo");
        assert!(ArgCompletion::Integer { min: 3, max: 1 }.candidates(&args, None).is_empty());
    }

    #[test]
    fn test_string_completion() {
        let args = CmdArgs::tokenize("color");
        let got = ArgCompletion::strings(["red", "green"]).candidates(&args, None);
        assert_eq!(got, vec!["color red", "color green"]);
    }

    struct MapNames;

    impl NativeCmdSystem for MapNames {
        fn arg_completion_map_name(&self, args: &CmdArgs, callback: &mut dyn FnMut(&CStr)) {
            for map in ["d3dm1", "d3dm2"] {
                let line = CString::new(format!("{} {}", args.argv(0), map)).unwrap();
                callback(&line);
            }
        }
        fn buffer_command_text(&self, _text: &CStr) {}
        fn execute_command_buffer(&self) {}
    }

    #[test]
    fn test_map_name_delegates_to_engine() {
        let args = CmdArgs::tokenize("map");
        assert!(ArgCompletion::MapName.candidates(&args, None).is_empty());
        assert_eq!(
            ArgCompletion::MapName.candidates(&args, Some(&MapNames)),
            vec!["map d3dm1", "map d3dm2"]
        );
    }

    thread_local! {
        static RECEIVED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn record(candidate: *const c_char) {
        let s = from_native(CStr::from_ptr(candidate));
        RECEIVED.with(|r| r.borrow_mut().push(s));
    }

    #[test]
    fn test_trampoline_reaches_completion() {
        let reg = CompletionRegistration::new(ArgCompletion::Integer { min: 0, max: 1 });
        let (func, user) = reg.native_callback();
        let line = CString::new("si_fragLimit").unwrap();
        unsafe { func(user, line.as_ptr(), record) };
        RECEIVED.with(|r| {
            assert_eq!(*r.borrow(), vec!["si_fragLimit 0", "si_fragLimit 1"]);
        });
    }

    #[test]
    fn test_trampoline_contains_panics() {
        let reg = CompletionRegistration::new(ArgCompletion::custom(|_, _| panic!("bad completion")));
        let (func, user) = reg.native_callback();
        let line = CString::new("x").unwrap();
        unsafe { func(user, line.as_ptr(), record) };
    }

    #[test]
    fn test_custom_with_map_cmd_system() {
        let reg = CompletionRegistration::new(ArgCompletion::MapName)
            .with_cmd_system(Arc::new(MapNames));
        let mut got = Vec::new();
        reg.complete(&CmdArgs::tokenize("devmap"), &mut |s| got.push(s.to_string()));
        assert_eq!(got, vec!["devmap d3dm1", "devmap d3dm2"]);
    }
}
