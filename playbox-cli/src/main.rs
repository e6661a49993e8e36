use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use playbox_core::bundle::load_bundle;
use playbox_core::{
    Archive, ArchiveResolver, DirTransport, HttpTransport, PlaygroundConfig, ProgramSegment,
    Transport, link,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Links a compiled entry archive with its dependencies into one program.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Entry archive (`*.a.js`); read from stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long)]
    output: PathBuf,

    /// Archive server root; archives are fetched from `<url>/pkg/<path>.a.js`.
    #[arg(long, value_name = "URL", conflicts_with = "mirror")]
    base_url: Option<String>,

    /// Local directory laid out like the archive server.
    #[arg(long, value_name = "DIR")]
    mirror: Option<PathBuf>,

    /// Directory of archives to preload before resolving.
    #[arg(long, value_name = "DIR")]
    bundle: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Emit::Program)]
    emit: Emit,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The runnable program blob.
    Program,
    /// JSON description of the linked packages.
    Manifest,
}

#[derive(Serialize)]
struct Manifest<'a> {
    packages: &'a [ProgramSegment],
    hits: u64,
    fetches: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let bytes = match &cli.input {
        Some(path) => {
            fs::read(path).with_context(|| format!("failed to read input file {}", path.display()))?
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };
    let entry = Archive::from_slice(&bytes)
        .map_err(|reason| anyhow::anyhow!("input is not a valid archive: {reason}"))?;

    let resolver = ArchiveResolver::new(transport(&cli));
    if let Some(root) = &cli.bundle {
        let archives = load_bundle(root)
            .with_context(|| format!("failed to load bundle {}", root.display()))?;
        let loaded = resolver.preload(archives)?;
        info!(loaded, bundle = %root.display(), "bundle preloaded");
    }

    let program = link(&resolver, &entry)
        .with_context(|| format!("failed to link {}", entry.import_path))?;
    let stats = resolver.stats();
    info!(
        packages = program.segments.len(),
        hits = stats.hits,
        fetches = stats.fetches,
        "program linked"
    );

    match cli.emit {
        Emit::Program => write_output(&cli.output, program.code.as_bytes())?,
        Emit::Manifest => {
            let manifest = Manifest {
                packages: &program.segments,
                hits: stats.hits,
                fetches: stats.fetches,
            };
            let json = serde_json::to_string_pretty(&manifest)?;
            write_output(&cli.output, json.as_bytes())?;
        }
    }
    Ok(())
}

fn transport(cli: &Cli) -> Arc<dyn Transport> {
    if let Some(root) = &cli.mirror {
        return Arc::new(DirTransport::new(root));
    }
    let mut config = PlaygroundConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    Arc::new(HttpTransport::new(
        &config.base_url,
        config.fetch_timeout,
        config.connect_timeout,
    ))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
