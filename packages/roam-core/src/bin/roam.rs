//! Thin CLI demoing three commands over an on-disk store: `index`,
//! `deps`, `health`, with global `--json`/`--detail`/`--budget` flags
//! layered over a `clap`-derived subcommand dispatch.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use roam_core::command::{Command, CommandContext, DepsCommand, HealthCommand, IndexCommand};
use roam_core::config::RoamConfig;
use roam_core::query::envelope::EnvelopeMode;
use roam_storage::Store;

#[derive(Parser)]
#[command(name = "roam", about = "Code-intelligence graph over an indexed project", version)]
struct Cli {
    /// Path to the project root being indexed.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Path to the SQLite store. Defaults to `<root>/.roam/index.db`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit the full JSON envelope instead of a short text summary.
    #[arg(long, global = true)]
    json: bool,

    /// Skip summary truncation (top-5 lists, etc).
    #[arg(long, global = true)]
    detail: bool,

    /// Truncate array fields until the envelope fits roughly this many
    /// tokens. `0` disables truncation.
    #[arg(long, global = true, default_value_t = 0)]
    budget: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, parse, and resolve the project, updating the store.
    Index {
        /// Re-parse every file regardless of content hash.
        #[arg(long)]
        force: bool,
    },
    /// Show what a file imports and what imports it.
    Deps {
        /// File path, absolute or relative to the project root.
        path: String,
    },
    /// Compute and persist a point-in-time health snapshot.
    Health {
        /// Optional label stored alongside the snapshot.
        #[arg(long)]
        tag: Option<String>,
    },
}

fn db_path(cli: &Cli) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| cli.root.join(".roam").join("index.db"))
}

fn load_config(root: &std::path::Path) -> RoamConfig {
    for name in [".roam.yaml", "roam.yaml"] {
        let candidate = root.join(name);
        if let Ok(text) = std::fs::read_to_string(&candidate) {
            match RoamConfig::load_from_str(&text) {
                Ok(cfg) => return cfg.with_env_plugin_modules(),
                Err(e) => tracing::warn!(path = %candidate.display(), error = %e, "ignoring unreadable config file"),
            }
        }
    }
    RoamConfig::default().with_env_plugin_modules()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = db_path(&cli);
    if let Some(parent) = db.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("error: could not create {}: {e}", parent.display());
            return ExitCode::from(1);
        }
    }

    let store = match Store::open(&db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: could not open store at {}: {e}", db.display());
            return ExitCode::from(1);
        }
    };

    let config = load_config(&cli.root);
    let ctx = CommandContext { store: &store, root: cli.root.clone(), config, json_mode: cli.json, detail: cli.detail, budget_tokens: cli.budget };

    let result = match &cli.command {
        Commands::Index { force } => IndexCommand { force: *force }.run(&ctx),
        Commands::Deps { path } => DepsCommand { path: path.clone() }.run(&ctx),
        Commands::Health { tag } => HealthCommand { tag: tag.clone() }.run(&ctx),
    };

    match result {
        Ok(envelope) => {
            let mode = if cli.json { EnvelopeMode::Full } else { EnvelopeMode::Agent };
            println!("{}", envelope.render(mode));
            ExitCode::from(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
