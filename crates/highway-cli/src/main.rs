use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use highway_core::{MemorySystem, SegmenterBackend, export_json, import_json};
use highway_store::{HighwayConfig, StorageBackend, Store, build_system};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const VECTOR_DIM_KEY: &str = "vector_dim";

#[derive(Parser)]
#[command(name = "highway", about = "Crystalline highway textual memory engine")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the configured storage)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Seed for placement jitter; random when omitted
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Segmenter backend: simple, char or jieba (overrides the config)
    #[arg(long, global = true)]
    segmenter: Option<SegmenterBackend>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write text as one sequence of words
    Write {
        /// Text to write
        text: String,
    },

    /// Rehearse text at every granularity until it converges
    Recite {
        /// Text to recite
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Retrieve memories related to the text
    Query {
        /// Text to query
        text: String,
    },

    /// Show table statistics
    Stats,

    /// Export the tables to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Replace the tables with a JSON export
    Import {
        /// Input file path
        path: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Engine plus the store it was loaded from.
struct Session {
    config: HighwayConfig,
    store: Option<Store>,
    system: MemorySystem,
    rng: SmallRng,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let mut config =
            HighwayConfig::load(cli.config.as_deref()).context("failed to load config")?;
        if let Some(db) = &cli.db {
            config.storage.backend = StorageBackend::Sqlite;
            config.storage.path = db.clone();
        }
        if let Some(segmenter) = cli.segmenter {
            config.assets.segmenter = segmenter;
        }

        let mut system = build_system(&config).context("failed to load assets")?;

        let store = match config.storage.backend {
            StorageBackend::Memory => None,
            StorageBackend::Sqlite => Some(open_store(&config.storage.path)?),
        };

        if let Some(store) = &store {
            check_vector_dim(store, system.config().vector_dim)?;
            let tables = store.load_tables().context("failed to load tables")?;
            system
                .restore(tables)
                .context("stored tables are inconsistent")?;
            tracing::info!(
                path = %config.storage.path.display(),
                metas = system.stats().metas,
                "loaded tables"
            );
        }

        let rng = match cli.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        Ok(Self {
            config,
            store,
            system,
            rng,
        })
    }

    /// Persist the tables if the storage is configured to auto-save.
    fn save(&self) -> Result<()> {
        if self.config.storage.auto_save {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store
            .save_tables(&self.system.snapshot())
            .context("failed to save tables")?;
        store
            .set_metadata(VECTOR_DIM_KEY, &self.system.config().vector_dim.to_string())
            .context("failed to save metadata")?;
        Ok(())
    }
}

fn open_store(path: &Path) -> Result<Store> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Store::open(path).with_context(|| format!("failed to open store {}", path.display()))
}

/// Positions stored under one dimension are meaningless under another.
fn check_vector_dim(store: &Store, dim: usize) -> Result<()> {
    let stored = store
        .get_metadata(VECTOR_DIM_KEY)
        .context("failed to read metadata")?;
    if let Some(stored) = stored
        && stored != dim.to_string()
    {
        bail!("database was written with vector_dim {stored}, but the configuration gives {dim}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Write { text } => cmd_write(&cli, text),
        Commands::Recite { text, file } => cmd_recite(&cli, text.as_deref(), file.as_deref()),
        Commands::Query { text } => cmd_query(&cli, text),
        Commands::Stats => cmd_stats(&cli),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

fn cmd_write(cli: &Cli, text: &str) -> Result<()> {
    let mut session = Session::open(cli)?;
    let ids = session
        .system
        .write_text(text, &mut session.rng)
        .context("failed to write text")?;
    session.save()?;

    let stats = session.system.stats();
    println!(
        "wrote {} units. metas={}, instances={}, edges={}",
        ids.len(),
        stats.metas,
        stats.instances,
        stats.edges
    );
    Ok(())
}

fn cmd_recite(cli: &Cli, text: Option<&str>, file: Option<&Path>) -> Result<()> {
    let text = match (text, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => bail!("nothing to recite"),
    };

    let mut session = Session::open(cli)?;
    let report = session
        .system
        .recite_text(&text, &mut session.rng)
        .context("failed to recite text")?;
    session.save()?;

    println!(
        "recited {} units in {} rounds (converged={}, forced={})",
        report.units, report.rounds, report.converged, report.forced
    );
    Ok(())
}

fn cmd_query(cli: &Cli, text: &str) -> Result<()> {
    let session = Session::open(cli)?;
    let result = session
        .system
        .retrieve_text(text)
        .context("failed to retrieve")?;

    if result.is_empty() {
        println!("(no memories found)");
        return Ok(());
    }
    for hit in &result.hits {
        println!("{:<18} {}  (light={})", hit.bucket.as_str(), hit.text, hit.light);
    }
    if cli.verbose {
        eprintln!("--- hits: {} ---", result.len());
    }
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let session = Session::open(cli)?;
    let stats = session.system.stats();

    println!("metas:        {}", stats.metas);
    println!("instances:    {}", stats.instances);
    println!("edges:        {}", stats.edges);
    println!("crystallized: {}", stats.crystallized_metas);
    println!("max_level:    {}", stats.max_level);
    println!("vector_dim:   {}", session.system.config().vector_dim);
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let session = Session::open(cli)?;
    let json = export_json(&session.system.snapshot()).context("failed to serialize tables")?;
    std::fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;

    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let mut session = Session::open(cli)?;
    let tables = match &session.store {
        Some(store) => store
            .import_json_file(path)
            .context("failed to import JSON")?,
        None => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            import_json(&json).context("failed to parse JSON")?
        }
    };
    session
        .system
        .restore(tables)
        .context("imported tables are inconsistent")?;
    session.persist()?;

    let stats = session.system.stats();
    println!(
        "imported from {}. metas={}, instances={}, edges={}",
        path.display(),
        stats.metas,
        stats.instances,
        stats.edges
    );
    Ok(())
}
