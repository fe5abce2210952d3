use clap::Parser;
use psnap_lib::{Config, SnapshotMode};
use tracing_subscriber::EnvFilter;

mod config;
mod naming;
mod process;

use config::{cli_to_config, merge_configs, read_config_file, read_env};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective project snapshot tool", long_about = None)]
pub struct Cli {
    /// Source root to snapshot (defaults to the current directory)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Destination directory, or archive path in zip mode (can be defined via config/env)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Snapshot mode [copy|zip], inferred from the output when omitted
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// File to include, relative to the source (can be specified multiple times)
    #[arg(short = 'f', long = "file")]
    pub files: Vec<String>,

    /// Directory to include recursively (can be specified multiple times)
    #[arg(short = 'd', long = "dir")]
    pub dirs: Vec<String>,

    /// Patterns to skip (can be specified multiple times)
    #[arg(short = 'x', long)]
    pub skip: Vec<String>,

    /// Store archive entries without compression
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub store: bool,

    /// Dry run (just list files and parameters)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Step 1: Read environment
    let env_config = read_env();

    // Step 2: Read config file (if exists)
    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = read_config_file(&path)?;
    }

    // Step 3: Merge configs: env < file < CLI
    let mut merged = merge_configs(env_config, file_config, cli_to_config(&cli));

    if merged.source.is_none() {
        merged.source = Some(".".to_string());
    }

    // Generate YAML config if requested
    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(&merged)?;
        println!("{yaml}");
        return Ok(());
    }

    let output = match merged.output.as_deref() {
        Some(output) if !output.is_empty() => output.to_string(),
        _ => {
            eprintln!("Error: output path (--output or config:output or PSNAP_OUTPUT) is required");
            std::process::exit(2);
        }
    };

    let mode = match merged.mode.as_deref() {
        Some(mode) => match mode.parse::<SnapshotMode>() {
            Ok(mode) => mode,
            Err(e) => {
                eprintln!("Error: {e} (expected copy or zip)");
                std::process::exit(3);
            }
        },
        None => SnapshotMode::infer(&output),
    };

    process::run(&merged, mode, &output)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
