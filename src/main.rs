//! s3deploy - main entry point
//!
//! Parses the CLI, installs logging and signal forwarding, and maps the
//! pipeline result to the process exit status.

use std::process::ExitCode;

use anyhow::{Context, Result};
use s3deploy::cli::{Cli, Commands};
use s3deploy::commands::build::BuildMode;
use s3deploy::policy::BucketPolicy;
use s3deploy::{Deployer, SystemRunner, process_guard};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the logger; RUST_LOG overrides the level chosen by `--verbose`
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match process_guard::received_signal() {
            // The run stopped because we were told to; report that, not the fallout
            Some(sig) => {
                eprintln!("❌ Interrupted by {}", process_guard::signal_name(sig));
                ExitCode::from(process_guard::exit_status(sig))
            }
            None => {
                eprintln!("❌ Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.target.to_config();

    match cli.command {
        Some(Commands::Policy) => {
            let policy = BucketPolicy::public_read(config.bucket_name());
            println!("{}", policy.to_json_pretty()?);
        }
        Some(Commands::Url) => {
            println!("{}", config.website_url());
        }
        Some(Commands::Deploy { build_mode }) => deploy(&config, build_mode, cli.dry_run)?,
        None => deploy(&config, BuildMode::default(), cli.dry_run)?,
    }

    Ok(())
}

fn deploy(config: &s3deploy::DeployConfig, build_mode: BuildMode, dry_run: bool) -> Result<()> {
    // Forward SIGINT/SIGTERM/SIGHUP to the running aws/flutter process group
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    info!(
        "Deploying {} to bucket {} in {}",
        config.build_dir().display(),
        config.bucket_name(),
        config.region()
    );

    let mut runner = SystemRunner::new(dry_run);
    let mut deployer =
        Deployer::new(config, &mut runner, std::io::stdout()).with_build_mode(build_mode);

    let report = deployer
        .run()
        .with_context(|| format!("deployment to bucket {} failed", config.bucket_name()))?;

    debug!("Deploy report: {:?}", report);
    Ok(())
}
