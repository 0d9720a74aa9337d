mod bundle;
mod run;
mod serve;
mod validate;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// NFV network service orchestrator.
#[derive(Parser)]
#[command(name = "nfvo", version, about = "NFV network service orchestrator")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress logging and non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the NSDs, VNFDs and NS instance configs of a bundle
    Validate {
        /// Path to the descriptor bundle JSON file
        bundle: PathBuf,
    },

    /// Instantiate every NS instance of a bundle on a simulated cloud
    Run {
        /// Path to the descriptor bundle JSON file
        bundle: PathBuf,
        /// Orchestrator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Make every VM of this VDU id fail (repeatable)
        #[arg(long = "fail-vdu")]
        fail_vdu: Vec<String>,
        /// Seconds to wait for each NS to settle
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Start the HTTP API over a simulated cloud
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Orchestrator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Descriptor bundles to pre-load
        #[arg()]
        bundles: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { bundle } => {
            validate::cmd_validate(&bundle, cli.output, cli.quiet);
        }
        Commands::Run {
            bundle,
            config,
            fail_vdu,
            timeout,
        } => {
            run::cmd_run(run::RunOptions {
                bundle: &bundle,
                config: config.as_deref(),
                fail_vdu: &fail_vdu,
                timeout_secs: timeout,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Serve {
            port,
            config,
            bundles,
        } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => fail(&format!("failed to create tokio runtime: {}", e), cli.output, false),
            };
            if let Err(e) = rt.block_on(serve::start_server(port, config, bundles, cli.quiet)) {
                fail(&format!("server error: {}", e), cli.output, false);
            }
        }
    }
}

/// Print an error in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}

/// Report `msg` and exit with status 1.
pub(crate) fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}
