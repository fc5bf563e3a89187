mod doctor_commands;
mod run_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    gotify_slack_bridge::SlackBridgePlugin,
    gotify_slack_config::AppConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "gotify-slack", about = "Slack push notifications for Gotify", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (overrides discovery of ./gotify-slack.toml and friends).
    #[arg(long, global = true, env = "GOTIFY_SLACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream Slack messages to Gotify (default when no subcommand is provided).
    Run,
    /// Validate the Slack token and print the plugin status.
    Check,
    /// Config validation and connectivity report.
    Doctor {
        /// Show informational diagnostics too.
        #[arg(long)]
        verbose: bool,
        /// Skip checks that talk to Slack.
        #[arg(long)]
        offline: bool,
    },
    /// Print plugin metadata.
    Info,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => gotify_slack_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(gotify_slack_config::discover_and_load()),
    }
}

fn print_info() {
    let info = SlackBridgePlugin::info();
    println!("Name:        {}", info.name);
    println!("Description: {}", info.description);
    println!("Version:     {}", info.version);
    println!("License:     {}", info.license);
    println!("Website:     {}", info.website);
    println!("Module:      {}", info.module_path);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "gotify-slack starting");

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(cli.config.as_deref())?;
            run_commands::handle_run(config).await
        },
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref())?;
            run_commands::handle_check(config).await
        },
        Some(Commands::Doctor { verbose, offline }) => {
            doctor_commands::handle_doctor(cli.config.as_deref(), verbose, offline).await
        },
        Some(Commands::Info) => {
            print_info();
            Ok(())
        },
    }
}
