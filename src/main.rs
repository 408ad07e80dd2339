//! Declindex CLI - build and query an incremental declaration index

use anyhow::Context;
use clap::{Parser, Subcommand};
use declindex::adapter;
use declindex::config::{self, DeclindexConfig};
use declindex::{Finder, Index, IndexUpdater, Match, INDEX_FORMAT_VERSION};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "declindex")]
#[command(version)]
#[command(about = "Incremental declaration index - classes, traits and functions kept in sync with your sources")]
#[command(long_about = r#"
Declindex keeps a queryable index of the declarations in a source tree and
re-extracts only files that changed since the last run.

Example usage:
  declindex init --include 'src/**.php'
  declindex index
  declindex query '//class[use/@name="App\Greets"]/@name'
  declindex query --first --default - '/files/file[class/@name="App\User"]/@path'
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a declindex.toml and ignore the index directory in git
    Init {
        /// Directory to index
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Include globs (default: **.php)
        #[arg(short, long)]
        include: Vec<String>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Bring the index up to date with the filesystem
    Index {
        /// Directory to index
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Path to the index file
        #[arg(long)]
        index: Option<PathBuf>,

        /// Include globs, matched against paths relative to the directory
        #[arg(short, long)]
        include: Vec<String>,

        /// Exclude globs
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Skip files ignored by .gitignore
        #[arg(long)]
        gitignore: bool,
    },

    /// Evaluate a path expression against the index
    Query {
        /// Path expression, e.g. //class[@name="App\User"]/method/@name
        expr: String,

        /// Path to the index file
        #[arg(long)]
        index: Option<PathBuf>,

        /// Print only the first match
        #[arg(long)]
        first: bool,

        /// Value printed when nothing matches (implies --first)
        #[arg(long)]
        default: Option<String>,
    },

    /// Show statistics about the index
    Stats {
        /// Path to the index file
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Init { path, include, force } => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| path.join(config::CONFIG_FILE));
            let new_config = DeclindexConfig {
                include: if include.is_empty() {
                    vec!["**.php".to_string()]
                } else {
                    include
                },
                ..Default::default()
            };

            config::write_config(&config_path, &new_config, force)?;
            config::ensure_gitignore(&path)?;
            println!("✅ Wrote {}", config_path.display());
        }

        Commands::Index {
            path,
            index,
            include,
            exclude,
            gitignore,
        } => {
            let root = path.unwrap_or_else(|| config.root_dir());
            let index_path = index
                .or_else(|| config.index.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| config::default_index_path_in(&root));

            let mut finder = Finder::new(&root);
            for pattern in if include.is_empty() { &config.include } else { &include } {
                finder.add_include(pattern)?;
            }
            for pattern in config.exclude.iter().chain(&exclude) {
                finder.add_exclude(pattern)?;
            }
            finder.respect_gitignore(gitignore || config.respect_gitignore);

            tracing::info!("Indexing {} into {}", root.display(), index_path.display());
            let files = finder
                .find()
                .with_context(|| format!("failed to enumerate {}", root.display()))?;

            let updater = IndexUpdater::new(INDEX_FORMAT_VERSION, adapter::default_registry());
            let stats = updater.update(&index_path, files)?;
            println!("{}", stats);
        }

        Commands::Query {
            expr,
            index,
            first,
            default,
        } => {
            let index = Index::open(&index.unwrap_or_else(|| config.index_path()))?;

            if first || default.is_some() {
                println!("{}", index.query_first(&expr, default.as_deref())?);
                return Ok(());
            }

            let doc = index.document();
            for m in &index.query(&expr)? {
                match m {
                    Match::Attribute { .. } => println!("{}", doc.string_value(m)),
                    Match::Node(node) => {
                        let attrs: Vec<String> = doc
                            .attributes(*node)
                            .iter()
                            .map(|(k, v)| format!("{}={:?}", k, v))
                            .collect();
                        println!("{} {}", doc.label(*node), attrs.join(" "));
                    }
                }
            }
        }

        Commands::Stats { index } => {
            let index_path = index.unwrap_or_else(|| config.index_path());
            let index = Index::open(&index_path)?;

            println!("📊 Declindex Statistics ({})", index_path.display());
            println!("------------------------------------");
            println!("  Version: {}", index.version().unwrap_or("(none)"));
            println!("  Files: {}", index.file_count());
            for label in ["class", "interface", "trait", "function", "method", "property"] {
                let count = index.query(&format!("//{}", label))?.len();
                println!("  {}: {}", label, count);
            }
            let composed = index.query("//class/*[@fromTrait]")?.len();
            println!("  composed from traits: {}", composed);
        }
    }

    Ok(())
}
