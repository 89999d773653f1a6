//! Component naming: turns a declaring module path and type name into a name
//! that is legal under `components.schemas`.
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::descriptor::{Kind, TypeDesc};

/// Name used when a type has no declared name and no better fallback.
pub const ANONYMOUS_TYPE: &str = "AnonymousType";

const ANONYMOUS_STRUCT_PREFIX: &str = "Struct_";

/// `Body[struct { .. }]`: a generic instantiated with an inline struct.
static GENERIC_ANONYMOUS_STRUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\[struct\s*\{.*\}\]").expect("static regex"));

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Process-unique token: UTC microseconds plus a sequence number, so two
/// calls inside the same microsecond still differ.
pub fn unique_token() -> String {
    let micros = Utc::now().timestamp_micros();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{micros}_{seq}")
}

#[derive(Debug, Clone, Default)]
pub struct Namer {
    strip_pkg_paths: Vec<String>,
}

impl Namer {
    pub fn new(strip_pkg_paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { strip_pkg_paths: strip_pkg_paths.into_iter().map(Into::into).collect() }
    }

    pub fn strip_pkg_paths(&self) -> &[String] {
        &self.strip_pkg_paths
    }

    /// Name under which a resolved model would be registered.
    ///
    /// Pointers take their pointee's name. Anonymous structs get a fresh
    /// `Struct_<token>` on every call, so their names are unique within a
    /// process but not reproducible across runs.
    pub fn model_name(&self, desc: &TypeDesc) -> String {
        if let Kind::Pointer(elem) = &desc.kind {
            return self.model_name(&elem.resolve());
        }
        let (pkg_path, type_name) = match &desc.kind {
            Kind::Struct(_) if desc.is_anonymous() => {
                (String::new(), format!("{ANONYMOUS_STRUCT_PREFIX}{}", unique_token()))
            }
            Kind::Map { key, value } if desc.is_anonymous() => {
                let key = key.resolve().type_string();
                let value = value.resolve().type_string();
                (String::new(), format!("map[{key}]{value}"))
            }
            _ => (desc.pkg_path.clone(), desc.name.clone()),
        };
        if type_name.is_empty() {
            return ANONYMOUS_TYPE.to_string();
        }
        self.component_name(&pkg_path, &type_name)
    }

    /// Deterministic for identical input, except that generics instantiated
    /// with an inline struct get a unique suffix.
    pub fn component_name(&self, pkg_path: &str, name: &str) -> String {
        let omit_package = pkg_path.is_empty()
            || self.strip_pkg_paths.iter().any(|prefix| pkg_path.starts_with(prefix.as_str()));

        let name = if GENERIC_ANONYMOUS_STRUCT.is_match(name) {
            let token = unique_token();
            GENERIC_ANONYMOUS_STRUCT
                .replace_all(name, |caps: &regex::Captures| format!("{}[struct_{token}]", &caps[1]))
                .into_owned()
        } else {
            name.to_string()
        };

        let qualified = if omit_package { name } else { format!("{pkg_path}/{name}") };
        let normalized = normalize(&qualified);
        let trimmed = normalized.strip_suffix('_').unwrap_or(normalized.as_str());
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return ANONYMOUS_TYPE.to_string();
        }
        trimmed.to_string()
    }
}

/// Rewrite separators to `_` and drop every other character that is not
/// legal in a component name. `·` is kept as a dot.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                }
                out.push('_');
            }
            '/' | '.' | '[' | ']' | '-' | '<' | '>' | ',' => out.push('_'),
            '·' => out.push('.'),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            _ => {}
        }
    }
    out
}

// ------------------------------- Tests ------------------------------------ //
