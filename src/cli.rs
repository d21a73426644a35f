//! Minimal CLI: parse one spec, or build a catalog from documentation files.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use doc_typereg::{emit, BlockParser, Channel, Config, Node, TypeCatalog, TypeRef};
use tracing::{debug, info};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build a cross-referenced type catalog from `name : spec` documentation blocks
#[derive(Parser, Debug)]
#[command(name = "doc-typereg", version)]
pub struct CommandLineInterface {
    /// log merge and resolution steps
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// parse a single declaration (`type, qualifiers…`) and print its JSON form
    Parse(ParseOut),
    /// parse documentation files, merge declarations and print the catalog
    Catalog(CatalogOut),
}

#[derive(Args, Debug, Clone)]
struct CatalogSettings {
    /// JSON settings file (aliases, comment_marker, custom_types)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more documentation files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// Files of `Name : spec` definitions, loaded as provisional types first
    #[arg(long, num_args = 1..)]
    extension: Vec<String>,

    /// channel every input block is declared under
    #[arg(long, default_value = "unscoped")]
    channel: Channel,

    /// read a lone type name between blank lines as a declaration
    #[arg(long, default_value_t = false)]
    eager: bool,
}

#[derive(clap::Parser, Debug)]
struct ParseOut {
    /// the declaration, e.g. "list(int), optional"
    spec: String,

    #[command(flatten)]
    catalog_settings: CatalogSettings,
}

#[derive(clap::Parser, Debug)]
struct CatalogOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CatalogSettings {
    fn catalog(&self) -> Result<TypeCatalog> {
        let Some(path) = self.config.as_ref() else { return Ok(TypeCatalog::new()) };
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Config::from_json_str(&source)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(TypeCatalog::with_config(&config)?)
    }
}

impl InputSettings {
    fn load_extensions(&self, catalog: &mut TypeCatalog) -> Result<()> {
        for path in resolve_file_path_patterns(&self.extension)? {
            let source = read_source(&path)?;
            let label = path.to_string_lossy().to_string();
            let ids = catalog
                .load_extension_text(&source, Some(&label))
                .with_context(|| format!("failed to load extension file ({label})"))?;
            debug!(file = %label, types = ids.len(), "loaded extension file");
        }
        Ok(())
    }

    fn load_process(&self, catalog: &mut TypeCatalog) -> Result<Vec<Node>> {
        let mut roots = Vec::new();
        for path in resolve_file_path_patterns(&self.input)? {
            let source = read_source(&path)?;
            let label = path.to_string_lossy().to_string();
            let entries = BlockParser::new(catalog, self.channel)
                .eager(self.eager)
                .parse_multi(&source)
                .with_context(|| format!("failed to parse documentation file ({label})"))?;
            info!(file = %label, entries = entries.len(), channel = %self.channel, "parsed input");
            roots.extend(entries.into_iter().filter_map(|e| e.node));
        }
        Ok(roots)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Parse(target) => {
                let mut catalog = target.catalog_settings.catalog()?;
                let (id, params) = catalog.parse_declaration(&target.spec)?;
                let node = Node::Ref(TypeRef::new(id).with_params(params));
                let out = serde_json::json!({
                    "spec": catalog.render(&node),
                    "type": emit::node_json(&catalog, &node),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                Ok(())
            }
            Command::Catalog(target) => {
                // 1) build state
                let mut catalog = target.catalog_settings.catalog()?;
                target.input_settings.load_extensions(&mut catalog)?;
                let mut roots = target.input_settings.load_process(&mut catalog)?;

                // 2) merge & resolve
                catalog.merge_pending().context("failed to merge declarations")?;
                for root in &mut roots {
                    catalog.dereference(root)?;
                }

                // 3) emit
                let dump = emit::catalog_json(&catalog);
                let dump_src = serde_json::to_string_pretty(&dump)?;
                match target.out.as_ref() {
                    Some(out) => write_output(out, &dump_src)?,
                    None => println!("{dump_src}"),
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read source file {}", path.display()))
}

fn write_output(out: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
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
            let mut matched = glob::glob(pattern)?.collect::<std::result::Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                bail!("glob pattern matched no files: {pattern}");
            }
            matched.sort();
            out.extend(matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
