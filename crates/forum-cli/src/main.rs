use clap::{Parser, Subcommand};
use forum_cli::{
    commands::{
        config::{self, ConfigAction},
        mods::{self, ModsAction},
        schema,
    },
    common, GlobalOpts,
};
use forum_logger as logger;

#[derive(Parser)]
#[command(name = "forum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Forum mod system",
    long_about = "forum inspects the forum's configuration, its mods and the entity schema they compose."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the configuration
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Inspect the mods in the mod directory
    Mods {
        #[command(subcommand)]
        action: ModsAction,
    },
    /// Print the composed extendable objects
    Schema {
        /// Only print this object (e.g. Topic)
        entity: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init(cli.global.verbosity_level()) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    common::init_tracing();

    let result = match cli.command {
        Commands::Config { action } => config::handle_config(action, &cli.global),
        Commands::Mods { action } => mods::handle_mods(action, &cli.global),
        Commands::Schema { entity, json } => schema::handle_schema(entity, json, &cli.global),
    };

    if let Err(e) = result {
        logger::error(&e);
        if let Some(path) = logger::log_path() {
            eprintln!("Log file: {}", path.display());
        }
        std::process::exit(1);
    }
}
