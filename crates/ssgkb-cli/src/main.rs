//! `ssgkb`: build and browse an SSG knowledge base.
//!
//! - `import` walks a content tree (tables, guides, manifests, data streams)
//!   into the SQLite store and links the results.
//! - `parse` runs one parser on one file without touching the store.
//! - `guides`, `tree`, `benchmark-tree`, `rules`, `ds-rules` and `related`
//!   query an existing store.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ssgkb_model::{LinkType, ObjectType, Severity};
use ssgkb_storage::{PageRequest, Store};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod browse;
mod config;
mod import;

use config::{AppConfig, Overrides};

#[derive(Parser)]
#[command(name = "ssgkb")]
#[command(author, version, about = "SSG knowledge base: import, browse and link security content")]
struct Cli {
    /// JSON configuration file (store, source, importer sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides `store.db_path`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a content tree into the store.
    Import {
        /// Root of the content tree (overrides `source.root`)
        #[arg(long)]
        source: Option<PathBuf>,
        /// Run id; a UUID is generated when omitted
        #[arg(long)]
        run_id: Option<String>,
        /// Per-file timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Skip the cross-reference closure after the last file
        #[arg(long)]
        no_closure: bool,
    },

    /// Parse one file and print what was found.
    Parse {
        /// Print the full parse result instead of a summary
        #[arg(long)]
        full: bool,
        #[command(subcommand)]
        command: ParseCommands,
    },

    /// List imported guides.
    Guides {
        #[arg(long)]
        product: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Print a guide's group/rule tree.
    Tree { guide_id: String },

    /// Print a data-stream benchmark's group/rule tree.
    BenchmarkTree { benchmark_id: String },

    /// List guide rules.
    Rules {
        #[command(flatten)]
        filter: RuleArgs,
        #[command(flatten)]
        page: PageArgs,
    },

    /// List data-stream rules.
    DsRules {
        #[command(flatten)]
        filter: DsRuleArgs,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Cross-references touching an object.
    Related {
        /// guide, table, manifest, datastream, rule, profile, product or cce
        object_type: ObjectType,
        object_id: String,
        /// rule_id, cce, product or profile_id
        #[arg(long)]
        link_type: Option<LinkType>,
        /// 0 returns every edge
        #[arg(long, default_value_t = 0)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a guide with its groups, rules and references.
    DeleteGuide { guide_id: String },
}

#[derive(Subcommand)]
pub(crate) enum ParseCommands {
    /// ssg-<product>-guide-<profile>.html
    Guide { input: PathBuf },
    /// table-<product>-<type>.html
    Table { input: PathBuf },
    /// manifest-<product>.json
    Manifest { input: PathBuf },
    /// ssg-<product>-ds.xml
    Datastream { input: PathBuf },
}

#[derive(Args)]
struct PageArgs {
    #[arg(long, default_value_t = 0)]
    offset: i64,
    /// Non-positive values fall back to 100
    #[arg(long, default_value_t = 100)]
    limit: i64,
}

impl PageArgs {
    fn request(&self) -> PageRequest {
        PageRequest::new(self.offset, self.limit)
    }
}

#[derive(Args)]
pub(crate) struct RuleArgs {
    #[arg(long)]
    pub guide: Option<String>,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub severity: Option<Severity>,
    /// Full XCCDF profile id or its short form
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Args)]
pub(crate) struct DsRuleArgs {
    #[arg(long)]
    pub benchmark: Option<String>,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub severity: Option<Severity>,
    #[arg(long)]
    pub profile: Option<String>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn,ssgkb=info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut overrides = Overrides {
        db_path: cli.db.clone(),
        ..Overrides::default()
    };
    if let Commands::Import {
        source,
        timeout,
        no_closure,
        ..
    } = &cli.command
    {
        overrides.source_root = source.clone();
        overrides.file_timeout_secs = *timeout;
        overrides.skip_cross_references = *no_closure;
    }
    let config = AppConfig::load(cli.config.as_deref())?.apply(&overrides);
    tracing::debug!(?config, "configuration resolved");
    let json = cli.json;

    match cli.command {
        Commands::Import { run_id, .. } => import::cmd_import(&config, run_id, json),
        Commands::Parse { full, command } => browse::cmd_parse(command, full),
        Commands::Guides { product, page } => {
            browse::cmd_guides(&Store::open(&config.store)?, product, page.request(), json)
        }
        Commands::Tree { guide_id } => browse::cmd_tree(&Store::open(&config.store)?, &guide_id, json),
        Commands::BenchmarkTree { benchmark_id } => {
            browse::cmd_benchmark_tree(&Store::open(&config.store)?, &benchmark_id, json)
        }
        Commands::Rules { filter, page } => {
            browse::cmd_rules(&Store::open(&config.store)?, filter, page.request(), json)
        }
        Commands::DsRules { filter, page } => {
            browse::cmd_ds_rules(&Store::open(&config.store)?, filter, page.request(), json)
        }
        Commands::Related {
            object_type,
            object_id,
            link_type,
            limit,
            offset,
        } => browse::cmd_related(
            &Store::open(&config.store)?,
            object_type,
            &object_id,
            link_type,
            limit,
            offset,
            json,
        ),
        Commands::DeleteGuide { guide_id } => {
            browse::cmd_delete_guide(&Store::open(&config.store)?, &guide_id)
        }
    }
}
