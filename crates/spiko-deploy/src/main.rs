//! spiko-deploy - Deploy the Spiko edge function to Supabase

mod cli;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, Parser, Subcommand};
use spiko_deploy_core::models::{DeployConfig, SecretSet, ROUTES};
use spiko_deploy_core::parsers::{ConfigParser, EnvFile};
use spiko_deploy_core::scaffold::{scaffold, ScaffoldOptions};
use spiko_deploy_core::{
    provision_secrets, CommandRunner, CoreError, DeployOptions, DeployStep, Deployer, LoadReport,
    ProvisionOptions, RecordingRunner, SecretResolver, SupabaseCli, SystemRunner,
};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "spiko-deploy",
    version,
    about = "Deploy the Spiko edge function and provision its secrets on Supabase",
    long_about = "Drives the Supabase CLI to log in, link the project, deploy the\n\
                  spiko-api edge function and set its five runtime secrets.\n\
                  \n\
                  Secret values are read from the process environment first, then\n\
                  from the env file (default: .env). Credentials have no default.\n\
                  \n\
                  Examples:\n\
                    spiko-deploy provision                 # Set the five secrets\n\
                    spiko-deploy provision --dry-run       # Print the commands instead\n\
                    spiko-deploy deploy --skip-login       # Link, deploy, set secrets\n\
                    spiko-deploy secrets                   # Show resolved values (masked)\n\
                    spiko-deploy routes --json             # Documented API routes\n\
                    spiko-deploy scaffold                  # supabase/config.toml + guide\n\
                  \n\
                  Config files (later wins):\n\
                    ~/.config/spiko-deploy/config.toml     # Global\n\
                    ./spiko-deploy.toml                    # Project\n\
                    --config FILE                          # Explicit\n\
                  \n\
                  Environment Variables:\n\
                    SPIKO_DEPLOY_CONFIG                    # Explicit config file\n\
                    SPIKO_DEPLOY_CLI                       # Supabase CLI program\n\
                    SPIKO_DEPLOY_NO_COLOR                  # Disable ANSI colors\n\
                    SPIKO_DEPLOY_LOG                       # Log filter (e.g. debug)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Explicit config file (must exist)
    #[arg(long, global = true, env = "SPIKO_DEPLOY_CONFIG")]
    config: Option<PathBuf>,

    /// Project directory holding spiko-deploy.toml and .env (default: cwd)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Supabase CLI program to run
    #[arg(long, global = true, env = "SPIKO_DEPLOY_CLI", value_parser = NonEmptyStringValueParser::new())]
    cli: Option<String>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, global = true, env = "SPIKO_DEPLOY_NO_COLOR")]
    no_color: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Set the five function secrets on the project
    Provision {
        /// Dotenv file with secret values (must exist when given)
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// Try every secret even after one fails
        #[arg(long)]
        keep_going: bool,
        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Login, link, deploy the function, then set its secrets
    Deploy {
        /// Dotenv file with secret values (must exist when given)
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// Assume an existing Supabase session
        #[arg(long)]
        skip_login: bool,
        /// Install the Supabase CLI through npm when missing
        #[arg(long)]
        install_cli: bool,
        /// Try every secret even after one fails
        #[arg(long)]
        keep_going: bool,
        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show versions of the Supabase CLI, node and npm
    Check,
    /// Show resolved secrets and where each value came from
    Secrets {
        /// Dotenv file with secret values (must exist when given)
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the HTTP routes served by the deployed function
    Routes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write supabase/config.toml and SUPABASE_DEPLOYMENT.md
    Scaffold {
        /// Output directory (default: project directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    match run(cli).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("❌ {:#}", err);
            let core = err.downcast_ref::<CoreError>();
            if let Some(suggestion) = core.and_then(CoreError::suggestion) {
                eprintln!("💡 {}", suggestion);
            }
            std::process::exit(core.map_or(1, CoreError::exit_code));
        }
    }
}

fn init_tracing(verbose: u8, no_color: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("SPIKO_DEPLOY_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!no_color)
        .init();
}

/// Returns the process exit code
async fn run(cli: Cli) -> Result<i32> {
    let project_dir = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Could not determine current directory")?,
    };

    let mut report = LoadReport::new();
    let mut config = ConfigParser::new()
        .load_merged(&project_dir, cli.config.as_deref(), &mut report)
        .await?;
    if let Some(program) = cli.cli {
        config.cli = program;
    }

    debug!(layers = ?report.layers_loaded, project_ref = %config.project_ref, "Config loaded");
    for warning in &report.errors {
        eprintln!("⚠️  {}: {}", warning.source, warning.message);
    }

    let no_color = cli.no_color;

    match cli.command {
        Command::Provision {
            env_file,
            keep_going,
            dry_run,
            json,
        } => run_provision(&config, env_file, keep_going, dry_run, json, no_color).await,
        Command::Deploy {
            env_file,
            skip_login,
            install_cli,
            keep_going,
            dry_run,
        } => {
            let options = DeployOptions {
                skip_login,
                install_cli,
                provision: ProvisionOptions { keep_going },
            };
            run_deploy(&config, env_file, options, dry_run, no_color).await
        }
        Command::Check => run_check(&config, no_color).await,
        Command::Secrets { env_file, json } => {
            run_secrets(&config, env_file, json, no_color).await
        }
        Command::Routes { json } => {
            run_routes(&config, json, no_color);
            Ok(0)
        }
        Command::Scaffold { dir, force } => {
            let root = dir.unwrap_or(project_dir);
            run_scaffold(&config, root, force).await
        }
    }
}

// ============================================================================
// Secret Loading
// ============================================================================

fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

async fn resolve_secrets(
    config: &DeployConfig,
    env_file_override: Option<PathBuf>,
) -> Result<SecretSet, CoreError> {
    let env_file = EnvFile::load_for(config, env_file_override.as_deref()).await?;
    if let Some(env) = &env_file {
        debug!(path = %env.path.display(), entries = env.len(), "Using env file");
    }

    SecretResolver::new(config)
        .with_env_file(env_file.as_ref())
        .with_process_env(process_env())
        .resolve()
}

fn print_dry_run(recorder: &RecordingRunner) {
    println!();
    println!("Dry run, nothing was executed. Commands:");
    println!("{}", cli::format_invocations(&recorder.calls()));
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn run_provision(
    config: &DeployConfig,
    env_file: Option<PathBuf>,
    keep_going: bool,
    dry_run: bool,
    json: bool,
    no_color: bool,
) -> Result<i32> {
    // Resolved before any external command runs
    let secrets = resolve_secrets(config, env_file).await?;

    let recorder = RecordingRunner::new();
    let runner: &dyn CommandRunner = if dry_run { &recorder } else { &SystemRunner };
    let supabase = SupabaseCli::new(runner, config.cli.clone());

    if !json {
        println!(
            "🔐 Setting {} secrets on project {}",
            secrets.len(),
            config.project_ref
        );
    }

    let report = provision_secrets(&supabase, &secrets, ProvisionOptions { keep_going }).await?;

    println!(
        "{}",
        cli::format_provision_report(&report, json, no_color)
    );

    if json {
        return Ok(report.exit_code);
    }
    if dry_run {
        print_dry_run(&recorder);
    }

    println!();
    if report.is_success() {
        println!("✅ All secrets set");
    } else {
        println!("❌ {} secret(s) not set", secrets.len() - report.set_count());
    }
    println!("💡 Verify with: {}", supabase.list_secrets_invocation());

    Ok(report.exit_code)
}

async fn run_deploy(
    config: &DeployConfig,
    env_file: Option<PathBuf>,
    options: DeployOptions,
    dry_run: bool,
    no_color: bool,
) -> Result<i32> {
    let secrets = resolve_secrets(config, env_file).await?;

    let recorder = RecordingRunner::new();
    let runner: &dyn CommandRunner = if dry_run { &recorder } else { &SystemRunner };

    println!(
        "🚀 Deploying {} to project {}",
        config.function_name, config.project_ref
    );

    let observer = |step: DeployStep| println!("▶ {}...", step);
    let deployer = Deployer::new(runner, config).with_observer(&observer);
    let outcome = deployer.run(&secrets, options).await?;

    println!("   Supabase CLI {}", outcome.cli_version);
    println!(
        "{}",
        cli::format_provision_report(&outcome.provision, false, no_color)
    );

    if dry_run {
        print_dry_run(&recorder);
    }

    println!();
    if outcome.provision.is_success() {
        println!("✅ Deployment complete");
    } else {
        println!("❌ Function deployed, but some secrets were not set");
    }
    println!("🌐 API base URL: {}", outcome.api_base_url);
    println!(
        "💡 Verify with: {}",
        deployer.cli().list_secrets_invocation()
    );

    Ok(outcome.provision.exit_code)
}

async fn run_check(config: &DeployConfig, no_color: bool) -> Result<i32> {
    let deployer = Deployer::new(&SystemRunner, config);
    let versions = deployer.tool_versions().await;

    println!(
        "{}",
        cli::format_tool_versions(&versions, &config.cli, no_color)
    );

    if versions.supabase.is_none() {
        return Err(CoreError::CliNotFound {
            program: config.cli.clone(),
        }
        .into());
    }
    println!("✅ Supabase CLI available");
    Ok(0)
}

async fn run_secrets(
    config: &DeployConfig,
    env_file: Option<PathBuf>,
    json: bool,
    no_color: bool,
) -> Result<i32> {
    let secrets = resolve_secrets(config, env_file).await?;
    println!("{}", cli::format_secret_table(&secrets, json, no_color));
    Ok(0)
}

fn run_routes(config: &DeployConfig, json: bool, no_color: bool) {
    let base = config.function_base_url();
    if !json {
        println!("API base URL: {}", config.api_base_url());
    }
    println!("{}", cli::format_route_table(ROUTES, &base, json, no_color));
}

async fn run_scaffold(config: &DeployConfig, root: PathBuf, force: bool) -> Result<i32> {
    let options = ScaffoldOptions { root, force };
    let report = scaffold(config, &options, chrono::Utc::now()).await?;

    for path in &report.written {
        println!("✅ Wrote {}", display_relative(path, &options.root));
    }
    for path in &report.skipped {
        println!(
            "⏭  Kept existing {} (use --force to overwrite)",
            display_relative(path, &options.root)
        );
    }
    Ok(0)
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
