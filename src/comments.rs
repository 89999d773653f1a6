//! Doc-comment lookup for types and fields, cached per package.
//!
//! Identity keys are `"pkg.Type"` for a type and `"pkg.Type.field"` for one of
//! its fields. A source is consulted at most once per package for the lifetime
//! of a [`CommentStore`]; a failed lookup is not cached.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use syn::ext::IdentExt;
use syn::{Attribute, Expr, ExprLit, Fields, Item, Lit, LitStr, Meta};
use thiserror::Error;

use crate::error::{Error, Result};

pub type PackageComments = HashMap<String, String>;

const DEPRECATED_MARKER: &str = "Deprecated:";

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("no source files are mapped to package {0:?}")]
    UnknownPackage(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },
}

/// Where comments come from.
pub trait CommentSource: Send + Sync {
    fn package_comments(&self, package: &str) -> std::result::Result<PackageComments, CommentError>;
}

/// True iff some line of the comment starts with `Deprecated:` once trimmed.
pub fn is_marked_deprecated(comment: &str) -> bool {
    comment.lines().any(|line| line.trim().starts_with(DEPRECATED_MARKER))
}

// ------------------------------- Sources ---------------------------------- //

/// Every package is known and has no comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComments;

impl CommentSource for NoComments {
    fn package_comments(&self, _package: &str) -> std::result::Result<PackageComments, CommentError> {
        Ok(PackageComments::new())
    }
}

/// Comments supplied in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticComments {
    packages: HashMap<String, PackageComments>,
}

impl StaticComments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_comment(mut self, package: &str, type_name: &str, text: impl Into<String>) -> Self {
        self.packages
            .entry(package.to_string())
            .or_default()
            .insert(format!("{package}.{type_name}"), text.into());
        self
    }

    pub fn with_field_comment(
        mut self,
        package: &str,
        type_name: &str,
        field: &str,
        text: impl Into<String>,
    ) -> Self {
        self.packages
            .entry(package.to_string())
            .or_default()
            .insert(format!("{package}.{type_name}.{field}"), text.into());
        self
    }
}

impl CommentSource for StaticComments {
    fn package_comments(&self, package: &str) -> std::result::Result<PackageComments, CommentError> {
        Ok(self.packages.get(package).cloned().unwrap_or_default())
    }
}

/// Reads `///` comments out of Rust source files mapped to each package.
#[derive(Debug, Clone, Default)]
pub struct RustSourceComments {
    files: HashMap<String, Vec<PathBuf>>,
}

impl RustSourceComments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: impl Into<String>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.files.entry(package.into()).or_default().extend(files);
        self
    }

    pub fn add_file(&mut self, package: impl Into<String>, file: impl Into<PathBuf>) {
        self.files.entry(package.into()).or_default().push(file.into());
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl CommentSource for RustSourceComments {
    fn package_comments(&self, package: &str) -> std::result::Result<PackageComments, CommentError> {
        let files = self
            .files
            .get(package)
            .ok_or_else(|| CommentError::UnknownPackage(package.to_string()))?;
        let mut comments = PackageComments::new();
        for path in files {
            comments.extend(read_source_comments(package, path)?);
        }
        Ok(comments)
    }
}

pub fn read_source_comments(package: &str, path: &Path) -> std::result::Result<PackageComments, CommentError> {
    let source = std::fs::read_to_string(path)
        .map_err(|source| CommentError::Read { path: path.to_path_buf(), source })?;
    parse_source_comments(package, &source)
        .map_err(|source| CommentError::Parse { path: path.to_path_buf(), source })
}

/// Collect doc comments on structs, enums, type aliases and named struct
/// fields of one source file.
pub fn parse_source_comments(package: &str, source: &str) -> syn::Result<PackageComments> {
    let file = syn::parse_file(source)?;
    let mut comments = PackageComments::new();
    for item in &file.items {
        let (ident, attrs) = match item {
            Item::Struct(item) => {
                if let Fields::Named(fields) = &item.fields {
                    for field in &fields.named {
                        let Some(field_ident) = &field.ident else { continue };
                        insert_comment(
                            &mut comments,
                            format!("{package}.{}.{}", item.ident.unraw(), field_ident.unraw()),
                            &field.attrs,
                        );
                    }
                }
                (&item.ident, &item.attrs)
            }
            Item::Enum(item) => (&item.ident, &item.attrs),
            Item::Type(item) => (&item.ident, &item.attrs),
            _ => continue,
        };
        insert_comment(&mut comments, format!("{package}.{}", ident.unraw()), attrs);
    }
    Ok(comments)
}

fn insert_comment(comments: &mut PackageComments, key: String, attrs: &[Attribute]) {
    let text = doc_text(attrs);
    if !text.is_empty() {
        comments.insert(key, text);
    }
}

fn doc_text(attrs: &[Attribute]) -> String {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => lit_str(&nv.value),
            _ => None,
        })
        .flat_map(|doc| {
            doc.split('\n')
                .map(|line| line.strip_prefix(' ').unwrap_or(line).trim_end().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    let mut text = lines.join("\n").trim().to_string();

    if let Some(note) = attrs.iter().find_map(deprecation_note) {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(DEPRECATED_MARKER);
        if !note.is_empty() {
            text.push(' ');
            text.push_str(&note);
        }
    }
    text
}

fn lit_str(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => Some(s.value()),
        _ => None,
    }
}

/// `Some(note)` for `#[deprecated]`, `#[deprecated = ".."]` and
/// `#[deprecated(note = "..")]`; the note may be empty.
fn deprecation_note(attr: &Attribute) -> Option<String> {
    if !attr.path().is_ident("deprecated") {
        return None;
    }
    match &attr.meta {
        Meta::Path(_) => Some(String::new()),
        Meta::NameValue(nv) => Some(lit_str(&nv.value).unwrap_or_default()),
        Meta::List(_) => {
            let mut note = String::new();
            let parsed = attr.parse_nested_meta(|meta| {
                let value: LitStr = meta.value()?.parse()?;
                if meta.path.is_ident("note") {
                    note = value.value();
                }
                Ok(())
            });
            if parsed.is_err() {
                note.clear();
            }
            Some(note)
        }
    }
}

// -------------------------------- Store ----------------------------------- //

/// Comment text for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub deprecated: bool,
}

impl Comment {
    fn from_text(text: Option<&String>) -> Self {
        let text = text.cloned().unwrap_or_default();
        let deprecated = is_marked_deprecated(&text);
        Self { text, deprecated }
    }
}

pub struct CommentStore {
    source: Box<dyn CommentSource>,
    cache: HashMap<String, PackageComments>,
}

impl CommentStore {
    pub fn new(source: Box<dyn CommentSource>) -> Self {
        Self { source, cache: HashMap::new() }
    }

    pub fn package(&mut self, package: &str) -> Result<&PackageComments> {
        if !self.cache.contains_key(package) {
            let comments = self
                .source
                .package_comments(package)
                .map_err(|source| Error::CommentLookup { package: package.to_string(), source })?;
            tracing::trace!(package, count = comments.len(), "loaded package comments");
            self.cache.insert(package.to_string(), comments);
        }
        Ok(&self.cache[package])
    }

    /// Generic arguments are dropped from `type_name` before lookup.
    pub fn type_comment(&mut self, package: &str, type_name: &str) -> Result<Comment> {
        let key = format!("{package}.{}", base_type_name(type_name));
        Ok(Comment::from_text(self.package(package)?.get(&key)))
    }

    pub fn field_comment(&mut self, package: &str, type_name: &str, field: &str) -> Result<Comment> {
        let key = format!("{package}.{}.{field}", base_type_name(type_name));
        Ok(Comment::from_text(self.package(package)?.get(&key)))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for CommentStore {
    fn default() -> Self {
        Self::new(Box::new(NoComments))
    }
}

impl fmt::Debug for CommentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut packages: Vec<&String> = self.cache.keys().collect();
        packages.sort();
        f.debug_struct("CommentStore").field("cached_packages", &packages).finish()
    }
}

fn base_type_name(type_name: &str) -> &str {
    type_name.split('[').next().unwrap_or(type_name)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SOURCE: &str = r#"
        /// A discussion topic.
        ///
        /// Topics are grouped by namespace.
        pub struct Topic {
            /// Namespace the topic belongs to.
            pub namespace: String,
            /// Old numeric position.
            /// Deprecated: use `namespace` ordering instead.
            pub position: i64,
            #[deprecated(since = "1.2", note = "use tags")]
            pub labels: Vec<String>,
            pub r#type: String,
            undocumented: bool,
        }

        /// Response envelope.
        #[deprecated]
        pub struct Body<T> { pub data: T }

        /// Visibility of a topic.
        pub enum Visibility { Public, Private }

        fn not_collected() {}
    "#;

    #[test]
    fn parses_type_and_field_comments() {
        let comments = parse_source_comments("demo", SOURCE).unwrap();
        assert_eq!(comments["demo.Topic"], "A discussion topic.\n\nTopics are grouped by namespace.");
        assert_eq!(comments["demo.Topic.namespace"], "Namespace the topic belongs to.");
        assert_eq!(comments["demo.Topic.labels"], "Deprecated: use tags");
        assert_eq!(comments["demo.Body"], "Response envelope.\n\nDeprecated:");
        assert_eq!(comments["demo.Visibility"], "Visibility of a topic.");
        assert!(!comments.contains_key("demo.Topic.type"));
        assert!(!comments.contains_key("demo.Topic.undocumented"));
    }

    #[test]
    fn deprecation_is_a_paragraph_marker() {
        assert!(is_marked_deprecated("Old position.\n  Deprecated: use ordering"));
        assert!(!is_marked_deprecated("This is not Deprecated: at all"));
        assert!(!is_marked_deprecated(""));
    }

    #[test]
    fn store_strips_generic_arguments() {
        let source = StaticComments::new()
            .with_type_comment("demo", "Body", "Response envelope.")
            .with_field_comment("demo", "Body", "data", "Deprecated: read `items`.");
        let mut store = CommentStore::new(Box::new(source));
        let comment = store.type_comment("demo", "Body[demo.Topic]").unwrap();
        assert_eq!(comment, Comment { text: "Response envelope.".into(), deprecated: false });
        let comment = store.field_comment("demo", "Body[demo.Topic]", "data").unwrap();
        assert!(comment.deprecated);
        assert_eq!(store.field_comment("demo", "Body", "missing").unwrap(), Comment::default());
    }

    struct CountingSource(Arc<AtomicUsize>);

    impl CommentSource for CountingSource {
        fn package_comments(&self, _package: &str) -> std::result::Result<PackageComments, CommentError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(PackageComments::new())
        }
    }

    #[test]
    fn packages_are_fetched_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = CommentStore::new(Box::new(CountingSource(calls.clone())));
        store.type_comment("demo", "Topic").unwrap();
        store.field_comment("demo", "Topic", "namespace").unwrap();
        store.type_comment("other", "Thing").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        store.clear();
        store.type_comment("demo", "Topic").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unmapped_packages_fail_the_lookup() {
        let mut store = CommentStore::new(Box::new(RustSourceComments::new()));
        let err = store.type_comment("nowhere", "Topic").unwrap_err();
        assert!(matches!(err, Error::CommentLookup { ref package, source: CommentError::UnknownPackage(_) } if package == "nowhere"));
    }

    #[test]
    fn source_files_are_read_and_merged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCE.as_bytes()).unwrap();
        let source = RustSourceComments::new().with_package("demo", [file.path().to_path_buf()]);
        let comments = source.package_comments("demo").unwrap();
        assert_eq!(comments["demo.Topic.namespace"], "Namespace the topic belongs to.");

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        broken.write_all(b"pub struct {").unwrap();
        let source = RustSourceComments::new().with_package("demo", [broken.path().to_path_buf()]);
        assert!(matches!(source.package_comments("demo"), Err(CommentError::Parse { .. })));
    }
}
