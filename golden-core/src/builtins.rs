//! Builtins and allowlisted package functions.
//!
//! This module maps Go-level names onto the Odin procedures that implement
//! them, either from Odin's core library or from the `golden` runtime
//! package. It does not translate arguments itself; the call translator
//! uses the descriptor's kind to decide how to lower a call.

use crate::types::SyncPrimitive;

/// How a builtin call is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// Call the target with the arguments translated as usual.
    Rename,
    /// `append(s, xs...)`: the target takes the slice by address.
    Append,
    /// `make(T, ...)`: the first argument is a type.
    Make,
    /// `delete(m, k)`: the target takes the map by address.
    DeleteKey,
    /// `new(T)`: the argument is a type.
    New,
    /// `fmt.Errorf(format, ...)`: the target formats the message and the
    /// runtime wraps it in an error value.
    ErrorFormat,
}

/// Metadata about a single builtin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    /// Go-level name, package-qualified for library functions
    /// (e.g., `fmt.Println`).
    pub name: &'static str,

    /// Odin procedure the call turns into.
    pub target: &'static str,

    pub kind: BuiltinKind,
}

const fn builtin(name: &'static str, target: &'static str, kind: BuiltinKind) -> BuiltinDescriptor {
    BuiltinDescriptor { name, target, kind }
}

/// Every builtin the translator knows.
///
/// New call lowering should refer to this table instead of hard-coding
/// names.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    builtin("fmt.Println", "fmt.println", BuiltinKind::Rename),
    builtin("fmt.Printf", "fmt.printf", BuiltinKind::Rename),
    builtin("fmt.Sprintf", "fmt.tprintf", BuiltinKind::Rename),
    builtin("fmt.Sprint", "fmt.tprint", BuiltinKind::Rename),
    builtin("fmt.Sprintln", "fmt.tprintln", BuiltinKind::Rename),
    builtin("fmt.Errorf", "fmt.tprintf", BuiltinKind::ErrorFormat),
    builtin("fmt.Print", "fmt.print", BuiltinKind::Rename),
    builtin("fmt.Fprintf", "fmt.fprintf", BuiltinKind::Rename),
    builtin("fmt.Fprintln", "fmt.fprintln", BuiltinKind::Rename),
    builtin("errors.New", "golden.error_new", BuiltinKind::Rename),
    builtin("len", "len", BuiltinKind::Rename),
    builtin("cap", "cap", BuiltinKind::Rename),
    builtin("panic", "panic", BuiltinKind::Rename),
    builtin("make", "make", BuiltinKind::Make),
    builtin("append", "append", BuiltinKind::Append),
    builtin("delete", "delete_key", BuiltinKind::DeleteKey),
    builtin("new", "new", BuiltinKind::New),
];

/// Look up a builtin by its Go-level name.
///
/// The search is linear over `BUILTINS` because the table is small.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Identifiers that never refer to a user variable.
pub fn is_predeclared(name: &str) -> bool {
    matches!(name, "true" | "false" | "nil" | "iota" | "_")
        || find_builtin(name).is_some()
        || crate::types::map_primitive(name).is_some()
}

/// Runtime procedure behind a method call on a `sync` primitive.
pub fn sync_method(primitive: SyncPrimitive, method: &str) -> Option<&'static str> {
    let target = match (primitive, method) {
        (SyncPrimitive::WaitGroup, "Add") => "golden.wg_add",
        (SyncPrimitive::WaitGroup, "Done") => "golden.wg_done",
        (SyncPrimitive::WaitGroup, "Wait") => "golden.wg_wait",
        (SyncPrimitive::Mutex, "Lock") => "sync.mutex_lock",
        (SyncPrimitive::Mutex, "Unlock") => "sync.mutex_unlock",
        (SyncPrimitive::RwMutex, "Lock") => "sync.rw_mutex_lock",
        (SyncPrimitive::RwMutex, "Unlock") => "sync.rw_mutex_unlock",
        (SyncPrimitive::RwMutex, "RLock") => "sync.rw_mutex_shared_lock",
        (SyncPrimitive::RwMutex, "RUnlock") => "sync.rw_mutex_shared_unlock",
        (SyncPrimitive::Once, "Do") => "sync.once_do",
        _ => return None,
    };
    Some(target)
}

/// Name of an `os` function in the `golden_os` facade: `ReadFile` becomes
/// `read_file`.
pub fn os_function(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() && index > 0 {
            snake.push('_');
        }
        snake.push(ch.to_ascii_lowercase());
    }
    format!("golden_os.{snake}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_library_and_builtin_functions() {
        assert_eq!(
            find_builtin("fmt.Sprintf").map(|b| b.target),
            Some("fmt.tprintf")
        );
        assert_eq!(
            find_builtin("errors.New").map(|b| b.target),
            Some("golden.error_new")
        );
        assert_eq!(
            find_builtin("delete").map(|b| b.kind),
            Some(BuiltinKind::DeleteKey)
        );
        assert_eq!(
            find_builtin("fmt.Sprintln").map(|b| b.target),
            Some("fmt.tprintln")
        );
        assert_eq!(
            find_builtin("fmt.Errorf").map(|b| b.kind),
            Some(BuiltinKind::ErrorFormat)
        );
        assert!(find_builtin("strings.Split").is_none());
    }

    #[test]
    fn predeclared_names_include_types_and_literals() {
        for name in ["nil", "true", "len", "float64", "_"] {
            assert!(is_predeclared(name), "{name}");
        }
        assert!(!is_predeclared("wg"));
    }

    #[test]
    fn maps_sync_methods() {
        assert_eq!(
            sync_method(SyncPrimitive::WaitGroup, "Done"),
            Some("golden.wg_done")
        );
        assert_eq!(
            sync_method(SyncPrimitive::Mutex, "Lock"),
            Some("sync.mutex_lock")
        );
        assert_eq!(sync_method(SyncPrimitive::Mutex, "Wait"), None);
    }

    #[test]
    fn snake_cases_os_functions() {
        assert_eq!(os_function("ReadFile"), "golden_os.read_file");
        assert_eq!(os_function("Exit"), "golden_os.exit");
        assert_eq!(os_function("Getenv"), "golden_os.getenv");
    }
}
