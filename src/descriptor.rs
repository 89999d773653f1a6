//! Type descriptors: the shape of a Rust type as the reflection engine sees it.
//!
//! Rust has no runtime reflection, so a type opts in by implementing
//! [`Reflect`], returning a [`TypeDesc`] that names its kind, its element or
//! field types, and where it was declared. Nested types are held behind a
//! [`TypeRef`] that is only expanded on demand, which is what lets a recursive
//! type graph be described at all.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::schema::Schema;

// ------------------------------- Reflect ---------------------------------- //

/// A type that can describe its own shape.
pub trait Reflect: 'static {
    fn type_desc() -> TypeDesc;

    /// Adjust the schema generated for this type, after structural reflection
    /// and after the global per-type hook.
    fn customize_schema(_schema: &mut Schema) {}
}

// -------------------------------- Types ----------------------------------- //

#[derive(Clone, Debug)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Slice(TypeRef),
    Array(TypeRef, usize),
    Map { key: TypeRef, value: TypeRef },
    Struct(Vec<FieldDesc>),
    /// Nullable indirection (`Option<T>`).
    Pointer(TypeRef),
    /// Any JSON value.
    Interface,
    /// Something with no JSON shape; always rejected by the engine.
    Opaque(&'static str),
}

impl Kind {
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Slice(_) => "slice",
            Kind::Array(..) => "array",
            Kind::Map { .. } => "map",
            Kind::Struct(_) => "struct",
            Kind::Pointer(_) => "pointer",
            Kind::Interface => "interface",
            Kind::Opaque(what) => *what,
        }
    }
}

/// Handle to a nested type, expanded lazily.
#[derive(Clone)]
pub enum TypeRef {
    Lazy(fn() -> TypeDesc),
    Eager(Arc<TypeDesc>),
}

impl TypeRef {
    pub fn of<T: Reflect>() -> Self {
        TypeRef::Lazy(TypeDesc::of::<T>)
    }

    pub fn resolve(&self) -> TypeDesc {
        match self {
            TypeRef::Lazy(describe) => describe(),
            TypeRef::Eager(desc) => (**desc).clone(),
        }
    }
}

impl From<TypeDesc> for TypeRef {
    fn from(desc: TypeDesc) -> Self {
        TypeRef::Eager(Arc::new(desc))
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Lazy(_) => f.write_str("TypeRef::Lazy(..)"),
            TypeRef::Eager(desc) => f.debug_tuple("TypeRef::Eager").field(&desc.type_string()).finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypeDesc {
    pub kind: Kind,
    /// Declaring module path; empty for built-in and anonymous types.
    pub pkg_path: String,
    /// Declared name; empty for anonymous types.
    pub name: String,
    /// Identity used by the known-type table.
    pub type_id: Option<TypeId>,
    pub customizer: Option<fn(&mut Schema)>,
}

#[derive(Clone, Debug)]
pub struct FieldDesc {
    /// Declared field identifier, also the comment lookup key.
    pub ident: String,
    pub rename: Option<String>,
    pub omit_empty: bool,
    /// Flattened into the parent instead of referenced.
    pub embedded: bool,
    pub exported: bool,
    pub ty: TypeRef,
}

// ---------------------------- Construction -------------------------------- //

impl TypeDesc {
    /// Describe `T`, stamping its identity and its own schema customizer.
    pub fn of<T: Reflect>() -> Self {
        let mut desc = T::type_desc();
        desc.type_id = Some(TypeId::of::<T>());
        desc.customizer = Some(T::customize_schema as fn(&mut Schema));
        desc
    }

    pub fn new(kind: Kind) -> Self {
        Self { kind, pkg_path: String::new(), name: String::new(), type_id: None, customizer: None }
    }

    pub fn named(kind: Kind, pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self { pkg_path: pkg_path.into(), name: name.into(), ..Self::new(kind) }
    }

    pub fn primitive(kind: Kind, name: &str) -> Self {
        Self::named(kind, "", name)
    }

    pub fn structure(pkg_path: impl Into<String>, name: impl Into<String>, fields: Vec<FieldDesc>) -> Self {
        Self::named(Kind::Struct(fields), pkg_path, name)
    }

    /// A struct with no declared name, e.g. an ad-hoc request body.
    pub fn anonymous_struct(fields: Vec<FieldDesc>) -> Self {
        Self::new(Kind::Struct(fields))
    }

    pub fn slice(elem: impl Into<TypeRef>) -> Self {
        Self::new(Kind::Slice(elem.into()))
    }

    pub fn array(elem: impl Into<TypeRef>, len: usize) -> Self {
        Self::new(Kind::Array(elem.into(), len))
    }

    pub fn map(key: impl Into<TypeRef>, value: impl Into<TypeRef>) -> Self {
        Self::new(Kind::Map { key: key.into(), value: value.into() })
    }

    pub fn pointer(elem: impl Into<TypeRef>) -> Self {
        Self::new(Kind::Pointer(elem.into()))
    }

    pub fn interface() -> Self {
        Self::new(Kind::Interface)
    }

    pub fn opaque(pkg_path: impl Into<String>, name: impl Into<String>, what: &'static str) -> Self {
        Self::named(Kind::Opaque(what), pkg_path, name)
    }

    /// Name of a generic instantiation, e.g. `Body[demo.Topic]`.
    pub fn generic_name(base: &str, args: &[TypeDesc]) -> String {
        let args: Vec<String> = args.iter().map(TypeDesc::type_string).collect();
        format!("{base}[{}]", args.join(","))
    }
}

// ------------------------------ Inspection -------------------------------- //

impl TypeDesc {
    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, Kind::Pointer(_))
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Declared name without generic arguments: `Body[demo.Topic]` → `Body`.
    pub fn base_name(&self) -> &str {
        self.name.split('[').next().unwrap_or_default()
    }

    /// Type expression used as identity and inside generic names.
    pub fn type_string(&self) -> String {
        match &self.kind {
            _ if !self.name.is_empty() => {
                if self.pkg_path.is_empty() {
                    self.name.clone()
                } else {
                    format!("{}.{}", self.pkg_path, self.name)
                }
            }
            Kind::Pointer(elem) => format!("*{}", elem.resolve().type_string()),
            Kind::Slice(elem) => format!("[]{}", elem.resolve().type_string()),
            Kind::Array(elem, len) => format!("[{len}]{}", elem.resolve().type_string()),
            Kind::Map { key, value } => {
                format!("map[{}]{}", key.resolve().type_string(), value.resolve().type_string())
            }
            Kind::Interface => "interface {}".to_string(),
            Kind::Struct(fields) if fields.is_empty() => "struct {}".to_string(),
            Kind::Struct(fields) => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} {}", f.ident, f.ty.resolve().type_string()))
                    .collect();
                format!("struct {{ {} }}", fields.join("; "))
            }
            other => other.label().to_string(),
        }
    }
}

impl FieldDesc {
    pub fn new<T: Reflect>(ident: impl Into<String>) -> Self {
        Self::of_type(ident, TypeRef::of::<T>())
    }

    pub fn of_type(ident: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            ident: ident.into(),
            rename: None,
            omit_empty: false,
            embedded: false,
            exported: true,
            ty: ty.into(),
        }
    }

    /// Apply a JSON-tag style annotation: `"name,omitempty"`.
    pub fn tag(mut self, tag: &str) -> Self {
        let mut parts = tag.split(',');
        match parts.next() {
            Some(name) if !name.is_empty() => self.rename = Some(name.to_string()),
            _ => {}
        }
        if parts.any(|opt| opt.trim() == "omitempty") {
            self.omit_empty = true;
        }
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    pub fn embed(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.exported = false;
        self
    }

    pub fn serialized_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.ident)
    }
}

// ------------------------------ Std impls --------------------------------- //

macro_rules! reflect_primitive {
    ($($ty:ty => $kind:expr, $name:literal;)*) => {
        $(
            impl Reflect for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::primitive($kind, $name)
                }
            }
        )*
    };
}

reflect_primitive! {
    bool => Kind::Bool, "bool";
    i8 => Kind::Int, "i8";
    i16 => Kind::Int, "i16";
    i32 => Kind::Int, "i32";
    i64 => Kind::Int, "i64";
    i128 => Kind::Int, "i128";
    isize => Kind::Int, "isize";
    u8 => Kind::Uint, "u8";
    u16 => Kind::Uint, "u16";
    u32 => Kind::Uint, "u32";
    u64 => Kind::Uint, "u64";
    u128 => Kind::Uint, "u128";
    usize => Kind::Uint, "usize";
    f32 => Kind::Float, "f32";
    f64 => Kind::Float, "f64";
    char => Kind::String, "char";
    String => Kind::String, "String";
    &'static str => Kind::String, "str";
}

impl Reflect for () {
    fn type_desc() -> TypeDesc {
        TypeDesc::opaque("", "()", "unit")
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::slice(TypeRef::of::<T>())
    }
}

impl<T: Reflect> Reflect for VecDeque<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::slice(TypeRef::of::<T>())
    }
}

impl<T: Reflect, S: 'static> Reflect for HashSet<T, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::slice(TypeRef::of::<T>())
    }
}

impl<T: Reflect> Reflect for BTreeSet<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::slice(TypeRef::of::<T>())
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn type_desc() -> TypeDesc {
        TypeDesc::array(TypeRef::of::<T>(), N)
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::pointer(TypeRef::of::<T>())
    }
}

// Boxes and Arcs serialize as their contents.
impl<T: Reflect> Reflect for Box<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::of::<T>()
    }

    fn customize_schema(schema: &mut Schema) {
        T::customize_schema(schema)
    }
}

impl<T: Reflect> Reflect for Arc<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::of::<T>()
    }

    fn customize_schema(schema: &mut Schema) {
        T::customize_schema(schema)
    }
}

impl<K: Reflect, V: Reflect, S: 'static> Reflect for HashMap<K, V, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(TypeRef::of::<K>(), TypeRef::of::<V>())
    }
}

impl<K: Reflect, V: Reflect> Reflect for BTreeMap<K, V> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(TypeRef::of::<K>(), TypeRef::of::<V>())
    }
}

impl<K: Reflect, V: Reflect, S: 'static> Reflect for IndexMap<K, V, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(TypeRef::of::<K>(), TypeRef::of::<V>())
    }
}

impl Reflect for serde_json::Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::interface()
    }
}

impl Reflect for serde_json::Map<String, serde_json::Value> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(TypeRef::of::<String>(), TypeRef::of::<serde_json::Value>())
    }
}

// Resolved through the known-type table; the struct shape is only a fallback.
impl Reflect for DateTime<Utc> {
    fn type_desc() -> TypeDesc {
        TypeDesc::structure("chrono", "DateTime<Utc>", Vec::new())
    }
}

// ------------------------------- Tests ------------------------------------ //
