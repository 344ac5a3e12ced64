//! Source type expressions mapped onto Odin target types.
//!
//! `map_type` is total: any shape golden does not model degrades to
//! `rawptr` instead of failing the run.

use std::fmt;

use crate::ast::{Expr, LitKind, TypeExpr};

/// Concurrency primitives from the `sync` package that get special
/// treatment (captured by address, runtime-provided operations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPrimitive {
    WaitGroup,
    Mutex,
    RwMutex,
    Once,
}

impl SyncPrimitive {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "WaitGroup" => Some(SyncPrimitive::WaitGroup),
            "Mutex" => Some(SyncPrimitive::Mutex),
            "RWMutex" => Some(SyncPrimitive::RwMutex),
            "Once" => Some(SyncPrimitive::Once),
            _ => None,
        }
    }

    fn target_name(self) -> &'static str {
        match self {
            SyncPrimitive::WaitGroup => "golden.WaitGroup",
            SyncPrimitive::Mutex => "sync.Mutex",
            SyncPrimitive::RwMutex => "sync.RW_Mutex",
            SyncPrimitive::Once => "sync.Once",
        }
    }
}

static STRING_ELEMENT: TargetType = TargetType::Primitive("byte");

/// An Odin type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetType {
    Primitive(&'static str),
    /// The opaque error handle behind Go's `error`.
    Error,
    /// A user-declared type, referred to by name.
    Named(String),
    /// `pkg.Name` for packages golden does not model.
    Qualified { package: String, name: String },
    Sync(SyncPrimitive),
    Pointer(Box<TargetType>),
    DynamicArray(Box<TargetType>),
    FixedArray { len: String, elem: Box<TargetType> },
    Map { key: Box<TargetType>, value: Box<TargetType> },
    Channel(Box<TargetType>),
    /// The runtime's reference-counted wrapper around a payload.
    RefCounted(Box<TargetType>),
    Variadic(Box<TargetType>),
    RawPtr,
}

impl TargetType {
    pub fn named(name: impl Into<String>) -> Self {
        TargetType::Named(name.into())
    }

    pub fn pointer_to(inner: TargetType) -> Self {
        TargetType::Pointer(Box::new(inner))
    }

    pub fn ref_counted(inner: TargetType) -> Self {
        TargetType::RefCounted(Box::new(inner))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TargetType::Pointer(_))
    }

    pub fn is_sync_primitive(&self) -> bool {
        matches!(self, TargetType::Sync(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TargetType::Error)
    }

    /// Name of the struct behind pointers and ref-counted wrappers.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            TargetType::Named(name) => Some(name),
            TargetType::Pointer(inner) | TargetType::RefCounted(inner) => inner.struct_name(),
            _ => None,
        }
    }

    /// Element type produced by indexing, ranging or receiving.
    pub fn element(&self) -> Option<&TargetType> {
        match self {
            TargetType::DynamicArray(elem)
            | TargetType::FixedArray { elem, .. }
            | TargetType::Variadic(elem)
            | TargetType::Channel(elem) => Some(elem),
            TargetType::Map { value, .. } => Some(value),
            TargetType::Pointer(inner) => inner.element(),
            TargetType::Primitive("string") => Some(&STRING_ELEMENT),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Primitive(name) => f.write_str(name),
            TargetType::Error => f.write_str("golden.Error"),
            TargetType::Named(name) => f.write_str(name),
            TargetType::Qualified { package, name } => write!(f, "{package}.{name}"),
            TargetType::Sync(primitive) => f.write_str(primitive.target_name()),
            TargetType::Pointer(inner) => write!(f, "^{inner}"),
            TargetType::DynamicArray(elem) => write!(f, "[dynamic]{elem}"),
            TargetType::FixedArray { len, elem } => write!(f, "[{len}]{elem}"),
            TargetType::Map { key, value } => write!(f, "map[{key}]{value}"),
            TargetType::Channel(elem) => write!(f, "^golden.Channel({elem})"),
            TargetType::RefCounted(inner) => write!(f, "golden.Arc({inner})"),
            TargetType::Variadic(elem) => write!(f, "..{elem}"),
            TargetType::RawPtr => f.write_str("rawptr"),
        }
    }
}

/// Map a primitive Go type name onto its fixed-width Odin counterpart.
pub fn map_primitive(name: &str) -> Option<TargetType> {
    let target = match name {
        "int" => "int",
        "int8" => "i8",
        "int16" => "i16",
        "int32" => "i32",
        "int64" => "i64",
        "uint" => "uint",
        "uint8" => "u8",
        "uint16" => "u16",
        "uint32" => "u32",
        "uint64" => "u64",
        "uintptr" => "uintptr",
        "float32" => "f32",
        "float64" => "f64",
        "string" => "string",
        "bool" => "b8",
        "byte" => "byte",
        "rune" => "rune",
        "error" => return Some(TargetType::Error),
        _ => return None,
    };
    Some(TargetType::Primitive(target))
}

/// Default type of an untyped literal.
pub fn literal_type(kind: LitKind) -> TargetType {
    TargetType::Primitive(match kind {
        LitKind::Int => "int",
        LitKind::Float => "f64",
        LitKind::String => "string",
        LitKind::Char => "rune",
    })
}

pub fn map_type(ty: &TypeExpr) -> TargetType {
    match ty {
        TypeExpr::Name(name) => map_primitive(name).unwrap_or_else(|| TargetType::named(name)),
        TypeExpr::Qualified { package, name } => {
            if package == "sync" {
                if let Some(primitive) = SyncPrimitive::from_name(name) {
                    return TargetType::Sync(primitive);
                }
            }
            TargetType::Qualified {
                package: package.clone(),
                name: name.clone(),
            }
        }
        TypeExpr::Pointer(inner) => TargetType::pointer_to(map_type(inner)),
        TypeExpr::Slice(elem) => TargetType::DynamicArray(Box::new(map_type(elem))),
        TypeExpr::Array { len, elem } => TargetType::FixedArray {
            len: array_len_text(len),
            elem: Box::new(map_type(elem)),
        },
        TypeExpr::Map { key, value } => TargetType::Map {
            key: Box::new(map_type(key)),
            value: Box::new(map_type(value)),
        },
        TypeExpr::Chan(elem) => TargetType::Channel(Box::new(map_type(elem))),
        TypeExpr::Variadic(elem) => TargetType::Variadic(Box::new(map_type(elem))),
        TypeExpr::Struct(_) | TypeExpr::Interface | TypeExpr::Func { .. } => TargetType::RawPtr,
    }
}

fn array_len_text(len: &Expr) -> String {
    match len {
        Expr::Lit { value, .. } => value.clone(),
        // `[...]T{...}` lets the compiler count; Odin spells that `?`.
        Expr::Ident(name) if name == "..." => "?".to_string(),
        other => other.dotted_name().unwrap_or_else(|| "?".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Box<TypeExpr> {
        Box::new(TypeExpr::Name(n.to_string()))
    }

    #[test]
    fn maps_primitives_to_fixed_width_types() {
        for (go, odin) in [
            ("int32", "i32"),
            ("int64", "i64"),
            ("bool", "b8"),
            ("float64", "f64"),
            ("string", "string"),
            ("error", "golden.Error"),
        ] {
            assert_eq!(map_type(&TypeExpr::Name(go.into())).to_string(), odin);
        }
    }

    #[test]
    fn maps_composite_shapes_structurally() {
        let ptr = TypeExpr::Pointer(name("User"));
        assert_eq!(map_type(&ptr).to_string(), "^User");

        let slice = TypeExpr::Slice(Box::new(TypeExpr::Pointer(name("User"))));
        assert_eq!(map_type(&slice).to_string(), "[dynamic]^User");

        let array = TypeExpr::Array {
            len: Box::new(Expr::Lit {
                kind: LitKind::Int,
                value: "4".into(),
            }),
            elem: name("int32"),
        };
        assert_eq!(map_type(&array).to_string(), "[4]i32");

        let map = TypeExpr::Map {
            key: name("string"),
            value: Box::new(TypeExpr::Slice(name("int"))),
        };
        assert_eq!(map_type(&map).to_string(), "map[string][dynamic]int");

        let chan = TypeExpr::Chan(name("int"));
        assert_eq!(map_type(&chan).to_string(), "^golden.Channel(int)");
    }

    #[test]
    fn special_cases_sync_package() {
        let wg = TypeExpr::Qualified {
            package: "sync".into(),
            name: "WaitGroup".into(),
        };
        let mapped = map_type(&wg);
        assert!(mapped.is_sync_primitive());
        assert_eq!(mapped.to_string(), "golden.WaitGroup");

        let rw = TypeExpr::Qualified {
            package: "sync".into(),
            name: "RWMutex".into(),
        };
        assert_eq!(map_type(&rw).to_string(), "sync.RW_Mutex");

        let other = TypeExpr::Qualified {
            package: "time".into(),
            name: "Duration".into(),
        };
        assert_eq!(map_type(&other).to_string(), "time.Duration");
    }

    #[test]
    fn unknown_shapes_degrade_to_rawptr() {
        assert_eq!(map_type(&TypeExpr::Interface), TargetType::RawPtr);
        assert_eq!(map_type(&TypeExpr::Struct(Vec::new())).to_string(), "rawptr");
    }

    #[test]
    fn finds_struct_and_element_types() {
        let arc = TargetType::ref_counted(TargetType::named("User"));
        assert_eq!(arc.to_string(), "golden.Arc(User)");
        assert_eq!(arc.struct_name(), Some("User"));

        let chan = map_type(&TypeExpr::Chan(name("float64")));
        assert_eq!(chan.element(), Some(&TargetType::Primitive("f64")));
    }
}
