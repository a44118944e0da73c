//! `jdom` CLI: read, edit and tidy JSON documents from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Print the node at a path (stdin → stdout)
//! echo '{"user":{"tags":["a","b"]}}' | jdom get 'user.tags[1]'
//!
//! # Coerce the node to a scalar kind
//! jdom get -i order.json total --as decimal
//!
//! # Write a value at a path, creating intermediate objects
//! jdom set -i config.json -o config.json server.port 8080
//!
//! # Re-render a document with two-space indentation
//! jdom fmt --indented -i data.json
//!
//! # Inline every `$ref`, reading relative files next to the input
//! jdom refs -i schema.json
//!
//! # List the keys of the object at a path
//! jdom keys -i data.json user
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::{Path as FsPath, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jdom_core::error::BoxError;
use jdom_core::path;
use jdom_core::{
    resolve_ref, Coercion, Node, NodeRef, ObjectNode, Path, RefContext, RefTarget, RenderStyle,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jdom", version, about = "Inspect and edit JSON documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log library decisions to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct Io {
    /// Input file (reads from stdin if omitted)
    #[arg(short, long)]
    input: Option<String>,
    /// Output file (writes to stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,
    /// Render with two-space indentation instead of minified
    #[arg(long)]
    indented: bool,
}

impl Io {
    fn style(&self) -> RenderStyle {
        if self.indented {
            RenderStyle::Indented
        } else {
            RenderStyle::Minified
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node at a path
    Get {
        /// Path such as `a.b[0]` or `['odd.key']`
        path: String,
        /// Coerce the node to a scalar kind before printing
        #[arg(long = "as", value_enum)]
        kind: Option<Kind>,
        /// Refuse lossy coercions (null to zero, fractional to integer)
        #[arg(long)]
        strict: bool,
        #[command(flatten)]
        io: Io,
    },
    /// Write a JSON value at a path, creating missing objects
    Set {
        path: String,
        /// JSON text of the new value
        value: String,
        /// Store VALUE as a plain string instead of parsing it
        #[arg(long)]
        raw: bool,
        #[command(flatten)]
        io: Io,
    },
    /// Re-render a document
    Fmt {
        #[command(flatten)]
        io: Io,
    },
    /// Replace every `$ref` with the value it points at
    Refs {
        /// Directory for relative file references (defaults to the input's)
        #[arg(long)]
        base: Option<PathBuf>,
        /// Limit on in-document references followed per resolution
        #[arg(long, default_value_t = 16)]
        max_hops: usize,
        #[command(flatten)]
        io: Io,
    },
    /// List the keys of the object at a path (the root if omitted)
    Keys {
        path: Option<String>,
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Bool,
    Int,
    Float,
    Decimal,
    String,
    Date,
    Uuid,
    Uri,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Get {
            path,
            kind,
            strict,
            io,
        } => {
            let doc = parse_document(&read_input(io.input.as_deref())?)?;
            let path: Path = path.parse().context("Invalid path")?;
            let found = path::resolve(doc.view(), &path)
                .with_context(|| format!("Nothing at '{path}'"))?;
            let text = match kind {
                Some(kind) => {
                    let rules = if strict {
                        Coercion::STRICT
                    } else {
                        Coercion::LENIENT
                    };
                    coerce_to_text(found.view(), kind, &rules)
                        .with_context(|| format!("Cannot read '{path}' as {}", kind.name()))?
                }
                None => found.into_node().render(io.style()),
            };
            write_output(io.output.as_deref(), &format!("{text}\n"))?;
        }
        Commands::Set {
            path,
            value,
            raw,
            io,
        } => {
            let mut doc = parse_object(&read_input(io.input.as_deref())?)?;
            let path: Path = path.parse().context("Invalid path")?;
            let value = if raw {
                Node::from(value)
            } else {
                Node::parse(&value).context("VALUE is not valid JSON (use --raw for text)")?
            };
            doc.set_path(&path, value)
                .with_context(|| format!("Cannot write at '{path}'"))?;
            write_output(io.output.as_deref(), &format!("{}\n", doc.render(io.style())))?;
        }
        Commands::Fmt { io } => {
            let doc = parse_document(&read_input(io.input.as_deref())?)?;
            write_output(io.output.as_deref(), &format!("{}\n", doc.render(io.style())))?;
        }
        Commands::Refs {
            base,
            max_hops,
            io,
        } => {
            let original = parse_object(&read_input(io.input.as_deref())?)?;
            let base = base.unwrap_or_else(|| input_dir(io.input.as_deref()));
            let files = FsResolver { base };
            let ctx = RefContext::new()
                .with_root(&original)
                .with_files(&files)
                .max_hops(max_hops);

            let mut doc = Node::Object(original.clone());
            let replaced = inline_refs(&mut doc, &original, &ctx)?;
            debug!(replaced, "references inlined");
            write_output(io.output.as_deref(), &format!("{}\n", doc.render(io.style())))?;
        }
        Commands::Keys { path, input } => {
            let doc = parse_document(&read_input(input.as_deref())?)?;
            let path: Path = match path {
                Some(p) => p.parse().context("Invalid path")?,
                None => Path::root(),
            };
            let found = path::resolve(doc.view(), &path)
                .with_context(|| format!("Nothing at '{path}'"))?;
            let Some(obj) = found.as_object() else {
                bail!("'{path}' is {}, not an object", found.kind());
            };
            let mut out = String::new();
            for key in obj.keys() {
                out.push_str(key);
                out.push('\n');
            }
            print!("{out}");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Decimal => "decimal",
            Kind::String => "string",
            Kind::Date => "date",
            Kind::Uuid => "uuid",
            Kind::Uri => "uri",
        }
    }
}

fn coerce_to_text(node: NodeRef<'_>, kind: Kind, rules: &Coercion) -> Result<String> {
    let text = match kind {
        Kind::Bool => node.coerce_with::<bool>(rules)?.to_string(),
        Kind::Int => node.coerce_with::<i64>(rules)?.to_string(),
        Kind::Float => format!("{:?}", node.coerce_with::<f64>(rules)?),
        Kind::Decimal => node.coerce_with::<Decimal>(rules)?.to_string(),
        Kind::String => node.coerce_with::<String>(rules)?,
        Kind::Date => node
            .coerce_with::<DateTime<Utc>>(rules)?
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Kind::Uuid => node.coerce_with::<uuid::Uuid>(rules)?.to_string(),
        Kind::Uri => node.coerce_with::<http::Uri>(rules)?.to_string(),
    };
    Ok(text)
}

/// Reads relative `$ref` targets from a base directory.
struct FsResolver {
    base: PathBuf,
}

impl jdom_core::FileResolver for FsResolver {
    fn read(&self, path: &FsPath) -> std::result::Result<ObjectNode, BoxError> {
        let full = self.base.join(path);
        debug!(path = %full.display(), "loading referenced file");
        let text = fs::read_to_string(&full)
            .map_err(|e| format!("cannot read {}: {e}", full.display()))?;
        Ok(ObjectNode::parse(&text)?)
    }
}

fn input_dir(input: Option<&str>) -> PathBuf {
    input
        .and_then(|p| FsPath::new(p).parent())
        .map(FsPath::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Replace references below `node` in one pass. Values pulled in by a
/// replacement are not scanned again, so reference cycles cannot loop.
fn inline_refs(node: &mut Node, root: &ObjectNode, ctx: &RefContext<'_>) -> Result<usize> {
    match node {
        Node::Object(obj) => match obj.ref_target().map(RefTarget::classify) {
            Some(RefTarget::File(_) | RefTarget::Url(_)) => {
                let target = obj.ref_target().unwrap_or_default().to_string();
                if obj.inline_ref(ctx)? {
                    Ok(1)
                } else {
                    warn!(reference = %target, "no resolver for reference, left in place");
                    Ok(0)
                }
            }
            None | Some(RefTarget::SelfRef) => inline_children(obj, root, ctx),
            Some(_) => {
                let reference = obj.clone();
                let resolved = resolve_ref(root, &reference, ctx)?;
                if resolved.as_object().and_then(ObjectNode::ref_target).is_some() {
                    warn!(reference = ?reference.ref_target(), "reference cycle left in place");
                    return Ok(0);
                }
                *node = resolved.into_node();
                Ok(1)
            }
        },
        Node::Array(items) => items.iter_mut().try_fold(0, |n, item| {
            Ok(n + inline_refs(item, root, ctx)?)
        }),
        _ => Ok(0),
    }
}

fn inline_children(obj: &mut ObjectNode, root: &ObjectNode, ctx: &RefContext<'_>) -> Result<usize> {
    let keys: Vec<String> = obj.keys().map(str::to_owned).collect();
    let mut replaced = 0;
    for key in keys {
        if let Some(child) = obj.get_mut(&key) {
            replaced += inline_refs(child, root, ctx)?;
        }
    }
    Ok(replaced)
}

fn parse_document(text: &str) -> Result<Node> {
    Node::parse(text).context("Input is not valid JSON")
}

fn parse_object(text: &str) -> Result<ObjectNode> {
    ObjectNode::parse(text).context("Input is not a JSON object")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
