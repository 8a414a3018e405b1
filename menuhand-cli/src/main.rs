//! Menuhand CLI
//!
//! Runs portal jobs against a real browser.
//!
//! Usage:
//!   menuhand run --job job.yaml --config portal.yaml
//!   menuhand health --target main-content --target user-menu
//!   menuhand baseline --restaurant <guid> --save baseline.json
//!   menuhand baseline --restaurant <guid> --against baseline.json
//!   menuhand totp --secret JBSWY3DPEHPK3PXP
//!   menuhand locators

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use menuhand::auth::{current_totp, TotpCodeProvider};
use menuhand::cdp::{BrowserLauncher, BrowserProcess, CdpPage, DevToolsEndpoint};
use menuhand::health::HealthStatus;
use menuhand::health::default_baseline_pages;
use menuhand::{
    capture_baseline, check_portal_health, compare_baseline, Credentials, LocatorRegistry,
    PageBaseline, PortalAutomation, PortalConfig, Target, WorkflowJob,
};

mod files;
mod local;

use local::{DirScreenshotSink, LocalExecutor};

const DEFAULT_HEALTH_TARGETS: &[Target] = &[
    Target::MainContent,
    Target::UserMenu,
    Target::RestaurantSwitcher,
];

#[derive(Parser)]
#[command(name = "menuhand")]
#[command(about = "Automate restaurant back-office portal configuration")]
struct Cli {
    /// Portal configuration file (JSON or YAML)
    #[arg(long, short, global = true, env = "MENUHAND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct PortalArgs {
    #[arg(long, env = "PORTAL_USERNAME")]
    username: String,

    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: String,

    /// Base32 secret for generating two-factor codes
    #[arg(long, env = "PORTAL_TOTP_SECRET", hide_env_values = true)]
    totp_secret: Option<String>,

    /// Launch this browser executable when none is listening
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Job file (JSON or YAML)
    #[arg(long)]
    job: PathBuf,

    #[command(flatten)]
    portal: PortalArgs,
}

#[derive(Args, Debug)]
struct HealthArgs {
    /// Targets to probe (repeatable); defaults to the portal shell
    #[arg(long = "target")]
    targets: Vec<String>,

    #[command(flatten)]
    portal: PortalArgs,
}

#[derive(Args, Debug)]
struct BaselineArgs {
    /// Restaurant whose pages are captured
    #[arg(long)]
    restaurant: String,

    /// Write a fresh capture to this file
    #[arg(long, conflicts_with = "against", required_unless_present = "against")]
    save: Option<PathBuf>,

    /// Compare the live portal against a capture stored in this file
    #[arg(long)]
    against: Option<PathBuf>,

    #[command(flatten)]
    portal: PortalArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one job and print its result as JSON
    Run(RunArgs),
    /// Log in and check which locators still match
    Health(HealthArgs),
    /// Capture page baselines, or compare the portal against stored ones
    Baseline(BaselineArgs),
    /// Print the current one-time code for a secret
    Totp {
        #[arg(long, env = "PORTAL_TOTP_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Print the locator registry, overrides applied, as JSON
    Locators,
}

fn init_logging() {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `.env` values feed the `env` fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging();

    let config = match &cli.config {
        Some(path) => files::load::<PortalConfig>(path)?,
        None => PortalConfig::default(),
    };

    match cli.command {
        Commands::Run(args) => run_job(config, args).await,
        Commands::Health(args) => run_health(config, args).await,
        Commands::Baseline(args) => run_baseline(config, args).await,
        Commands::Totp { secret } => print_totp(&secret),
        Commands::Locators => print_locators(&config),
    }
}

/// A live page plus the browser we launched for it, if any.
struct Browser {
    page: Arc<CdpPage>,
    process: Option<BrowserProcess>,
}

impl Browser {
    async fn open(config: &PortalConfig, chrome: Option<&str>) -> Result<Self> {
        let endpoint = DevToolsEndpoint::new(config.debug_port);
        let process = if endpoint.is_available().await {
            info!("Reusing browser on port {}", config.debug_port);
            None
        } else {
            let mut launcher = BrowserLauncher::new();
            if let Some(path) = chrome {
                launcher = launcher.with_executable(path);
            }
            Some(launcher.launch(config).await.context("Failed to launch browser")?)
        };
        let page = CdpPage::connect(config)
            .await
            .context("Failed to attach to the browser")?;
        Ok(Self {
            page: Arc::new(page),
            process,
        })
    }

    async fn close(self) {
        drop(self.page);
        if let Some(process) = self.process {
            if let Err(e) = process.shutdown().await {
                warn!("{}", e);
            }
        }
    }
}

fn automation(
    config: PortalConfig,
    portal: &PortalArgs,
    browser: &Browser,
) -> Result<PortalAutomation> {
    let screenshot_dir = config.screenshot_dir.clone();
    let mut builder = PortalAutomation::builder(
        browser.page.clone(),
        config,
        Credentials::new(portal.username.clone(), portal.password.clone()),
    );
    if let Some(secret) = &portal.totp_secret {
        builder = builder.code_provider(Arc::new(TotpCodeProvider::new(secret.clone())?));
    }
    if let Some(dir) = screenshot_dir {
        builder = builder.screenshot_sink(Arc::new(DirScreenshotSink::new(dir)));
    }
    Ok(builder.build()?)
}

async fn run_job(config: PortalConfig, args: RunArgs) -> Result<()> {
    let mut job: WorkflowJob = files::load(&args.job)?;
    job.payload
        .validate()
        .with_context(|| format!("Invalid job in {}", args.job.display()))?;

    let browser = Browser::open(&config, args.portal.chrome.as_deref()).await?;
    let portal = automation(config, &args.portal, &browser)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling job after the current step");
            on_signal.cancel();
        }
    });

    let result = portal
        .orchestrator
        .execute_with_executor(&mut job, Arc::new(LocalExecutor), cancel)
        .await;
    drop(portal);
    browser.close().await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_health(config: PortalConfig, args: HealthArgs) -> Result<()> {
    let targets: Vec<Target> = if args.targets.is_empty() {
        DEFAULT_HEALTH_TARGETS.to_vec()
    } else {
        args.targets
            .iter()
            .map(|t| t.parse::<Target>())
            .collect::<Result<_, _>>()?
    };

    let browser = Browser::open(&config, args.portal.chrome.as_deref()).await?;
    let portal = automation(config, &args.portal, &browser)?;
    let health = check_portal_health(&portal.session, &portal.auth, &portal.resolver, &targets).await;
    drop(portal);
    browser.close().await;

    println!("{}", serde_json::to_string_pretty(&health)?);
    if health.status == HealthStatus::Unhealthy {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_baseline(config: PortalConfig, args: BaselineArgs) -> Result<()> {
    let stored: Option<Vec<PageBaseline>> = match &args.against {
        Some(path) => Some(files::load(path)?),
        None => None,
    };

    let browser = Browser::open(&config, args.portal.chrome.as_deref()).await?;
    let portal = automation(config, &args.portal, &browser)?;
    portal
        .session
        .set_restaurant_context(Some(args.restaurant.clone()));
    let pages = default_baseline_pages();
    let outcome = match &stored {
        Some(baselines) => compare_baseline(
            &portal.session,
            &portal.auth,
            &portal.navigator,
            &portal.resolver,
            &pages,
            baselines,
        )
        .await
        .map(|comparisons| {
            let unchanged = comparisons.iter().all(|c| c.matches);
            (serde_json::to_string_pretty(&comparisons), unchanged)
        }),
        None => capture_baseline(
            &portal.session,
            &portal.auth,
            &portal.navigator,
            &portal.resolver,
            &pages,
        )
        .await
        .map(|baselines| (serde_json::to_string_pretty(&baselines), true)),
    };
    drop(portal);
    browser.close().await;

    let (json, unchanged) = outcome.context("Baseline run failed")?;
    let json = json?;
    match &args.save {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Baselines written to {}", path.display());
        }
        None => println!("{json}"),
    }
    if !unchanged {
        std::process::exit(3);
    }
    Ok(())
}

fn print_totp(secret: &str) -> Result<()> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before 1970")?
        .as_secs();
    let code = current_totp(secret)?;
    println!("{code}");
    eprintln!(
        "valid for {}s",
        menuhand::auth::totp::seconds_remaining(now)
    );
    Ok(())
}

fn print_locators(config: &PortalConfig) -> Result<()> {
    let registry = LocatorRegistry::global();
    registry.apply_overrides(&config.locator_overrides)?;
    println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);
    Ok(())
}
