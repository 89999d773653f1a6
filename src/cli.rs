//! Minimal CLI: generate the demo document, or dump the comments a source file carries.
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use openapi_reflect::comments::{RustSourceComments, read_source_comments};
use openapi_reflect::demo;
use openapi_reflect::{Api, Document, Server};
use tracing_subscriber::EnvFilter;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate OpenAPI 3.0 documents from reflected Rust types
#[derive(Parser, Debug)]
#[command(version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate the document of the bundled "messages" API
    Spec(SpecOut),
    /// print the doc comments found in Rust sources, keyed as schema descriptions
    Comments(CommentsOut),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum Format {
    #[default]
    Json,
    Yaml,
}

#[derive(Args, Debug, Clone)]
struct DocumentSettings {
    /// override info.title (defaults to the API name)
    #[arg(long)]
    title: Option<String>,

    /// override info.version
    #[arg(long)]
    api_version: Option<String>,

    /// extra server URL, may be repeated
    #[arg(long)]
    server: Vec<String>,

    /// module path prefix left out of component names, may be repeated
    #[arg(long)]
    strip_pkg_path: Vec<String>,

    /// read descriptions for a module from Rust sources: MODULE=PATH_OR_GLOB
    #[arg(long, value_parser = parse_comment_mapping)]
    comments: Vec<(String, String)>,
}

#[derive(clap::Parser, Debug)]
struct SpecOut {
    #[command(flatten)]
    document_settings: DocumentSettings,

    #[arg(long, value_enum, default_value_t)]
    format: Format,

    /// indent JSON output
    #[arg(long)]
    pretty: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CommentsOut {
    /// module path the sources belong to
    #[arg(long)]
    package: String,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl DocumentSettings {
    fn build_api(&self) -> anyhow::Result<Api> {
        let mut options = demo::default_options();
        options.strip_pkg_paths.extend(self.strip_pkg_path.iter().cloned());
        if let Some(title) = &self.title {
            options.info.title = title.clone();
        }
        if let Some(version) = &self.api_version {
            options.info.version = version.clone();
        }
        options.servers.extend(self.server.iter().map(Server::new));

        if !self.comments.is_empty() {
            let mut source = RustSourceComments::new();
            for (package, pattern) in &self.comments {
                let files = resolve_file_path_patterns([pattern])
                    .with_context(|| format!("failed to resolve comment sources for {package}"))?;
                source = source.with_package(package.clone(), files);
            }
            options = options.with_comments(source);
        }
        Ok(demo::messages_api(options))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        init_tracing();
        match &self.cmd {
            Command::Spec(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let mut api = target.document_settings.build_api()?;
                let doc = api.spec().context("failed to generate the document")?;
                api.clear_comments();
                let rendered = render(&doc, target.format, target.pretty)?;
                write_output(target.out.as_deref(), &rendered)
            }
            Command::Comments(target) => {
                let source_paths =
                    resolve_file_path_patterns(&target.input).context("failed to resolve input file paths")?;
                let mut comments = std::collections::BTreeMap::new();
                for source_path in source_paths {
                    let found = read_source_comments(&target.package, &source_path)?;
                    tracing::debug!(path = %source_path.display(), entries = found.len(), "read comments");
                    comments.extend(found);
                }
                let rendered = serde_json::to_string_pretty(&comments)?;
                write_output(target.out.as_deref(), &rendered)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Log to stderr, `warn` unless `RUST_LOG` says otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn render(doc: &Document, format: Format, pretty: bool) -> anyhow::Result<String> {
    let rendered = match (format, pretty) {
        (Format::Json, false) => doc.to_json()?,
        (Format::Json, true) => doc.to_json_pretty()?,
        (Format::Yaml, _) => doc.to_yaml()?,
    };
    Ok(rendered)
}

fn write_output(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn parse_comment_mapping(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((package, pattern)) if !package.is_empty() && !pattern.is_empty() => {
            Ok((package.to_string(), pattern.to_string()))
        }
        _ => Err(format!("expected MODULE=PATH_OR_GLOB, got {raw:?}")),
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
