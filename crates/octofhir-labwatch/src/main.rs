use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use octofhir_auth::KeyStore;
use octofhir_labwatch::cli::{Cli, Commands};
use octofhir_labwatch::config::AppConfig;
use octofhir_labwatch::config::loader::{load_config_with_default_path, load_unvalidated};
use octofhir_labwatch::scheduler::CronScheduler;
use octofhir_labwatch::server::{serve_jwks, shutdown_signal};
use octofhir_labwatch::workflow::{CycleOutcome, LabReportJob};
use octofhir_labwatch::{WorkflowError, observability};
use octofhir_notifications::{EmailAdapter, Notifier};

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{e:#}"), "labwatch failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::CheckConfig { print } => {
            let cfg = load_or_exit(config_path);
            check_config(&cfg)?;
            if print {
                let rendered =
                    toml::to_string_pretty(&cfg).context("Failed to render configuration")?;
                println!("\n{rendered}");
            }
            Ok(())
        }
        Commands::ServeJwks => {
            let cfg = match load_unvalidated(config_path.map(|p| p.to_string_lossy()).as_deref())
                .and_then(|cfg| cfg.validate_serving().map(|_| cfg))
            {
                Ok(cfg) => cfg,
                Err(e) => config_error(&e),
            };
            observability::apply_logging(&cfg.logging);
            let key_store = load_key_store(&cfg)?;
            let addr = cfg.jwks.addr().map_err(anyhow::Error::msg)?;
            serve_jwks(addr, key_store, shutdown_signal())
                .await
                .context("JWKS server failed")
        }
        Commands::Once => {
            let cfg = load_or_exit(config_path);
            let job = build_job(&cfg)?;
            match job.run_once().await {
                Ok(CycleOutcome::Sent {
                    patients,
                    observations,
                    abnormal,
                }) => {
                    println!(
                        "Report sent: {observations} observations for {patients} patients, {abnormal} not normal"
                    );
                    Ok(())
                }
                Ok(CycleOutcome::Skipped(reason)) => {
                    println!("No report sent: {reason}");
                    Ok(())
                }
                Err(e) => Err(cycle_failed(e)),
            }
        }
        Commands::Run => {
            let cfg = load_or_exit(config_path);
            run_scheduler(cfg).await
        }
    }
}

async fn run_scheduler(cfg: AppConfig) -> Result<()> {
    let key_store = load_key_store(&cfg)?;
    let notifier = build_notifier(&cfg)?;
    let job = LabReportJob::from_config(&cfg, key_store.clone(), notifier)?;
    let scheduler = CronScheduler::new(&cfg.schedule, Arc::new(job)).map_err(anyhow::Error::msg)?;

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let jwks_task = if cfg.jwks.enabled {
        let addr = cfg.jwks.addr().map_err(anyhow::Error::msg)?;
        let mut rx = stop_rx.clone();
        Some(tokio::spawn(async move {
            let stop = async move {
                let _ = rx.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = serve_jwks(addr, key_store, stop).await {
                tracing::error!(error = %e, "JWKS server failed");
            }
        }))
    } else {
        None
    };

    let (scheduler_stop, scheduler_task) = scheduler.start();

    shutdown_signal().await;
    let _ = scheduler_stop.send(true);
    let _ = stop_tx.send(true);

    scheduler_task.await.context("scheduler task panicked")?;
    if let Some(task) = jwks_task {
        task.await.context("JWKS task panicked")?;
    }
    Ok(())
}

fn check_config(cfg: &AppConfig) -> Result<()> {
    let key_store = load_key_store(cfg)?;
    let next_run = croner::Cron::new(&cfg.schedule.cron)
        .parse()
        .ok()
        .and_then(|cron| cron.find_next_occurrence(&chrono::Utc::now(), false).ok());

    println!("Configuration OK");
    println!("  client_id:      {}", cfg.auth.client_id);
    println!("  token_endpoint: {}", cfg.auth.token_endpoint);
    println!(
        "  signing keys:   {} (default kid {})",
        key_store.len(),
        key_store.default_kid()
    );
    println!("  fhir_base_url:  {}", cfg.export.fhir_base_url);
    println!("  group_id:       {}", cfg.export.group_id);
    println!("  types:          {}", cfg.export.types.join(","));
    println!("  recipients:     {}", cfg.email.to.join(", "));
    match next_run {
        Some(next) => println!("  schedule:       {} (next run {next})", cfg.schedule.cron),
        None => println!("  schedule:       {}", cfg.schedule.cron),
    }
    if cfg.jwks.enabled {
        println!("  jwks:           http://{}/jwks", cfg.jwks.bind);
    }
    Ok(())
}

fn load_or_exit(path: Option<&Path>) -> AppConfig {
    match load_config_with_default_path(path) {
        Ok(cfg) => {
            observability::apply_logging(&cfg.logging);
            tracing::info!(
                path = %path.map_or("labwatch.toml".into(), |p| p.display().to_string()),
                "Configuration loaded"
            );
            cfg
        }
        Err(e) => config_error(&e),
    }
}

fn config_error(e: &str) -> ! {
    eprintln!("Configuration error: {e}");
    std::process::exit(2);
}

fn load_key_store(cfg: &AppConfig) -> Result<Arc<KeyStore>> {
    let mut store = KeyStore::from_file(&cfg.auth.jwks_path)
        .with_context(|| format!("Failed to load keys from {}", cfg.auth.jwks_path.display()))?;
    if let Some(kid) = &cfg.auth.key_id {
        store = store.with_default_key(kid)?;
    }
    Ok(Arc::new(store))
}

fn build_notifier(cfg: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let adapter = EmailAdapter::from_config(&cfg.email).context("Failed to set up SMTP")?;
    Ok(Arc::new(adapter))
}

fn build_job(cfg: &AppConfig) -> Result<LabReportJob> {
    let key_store = load_key_store(cfg)?;
    let notifier = build_notifier(cfg)?;
    Ok(LabReportJob::from_config(cfg, key_store, notifier)?)
}

fn cycle_failed(e: WorkflowError) -> anyhow::Error {
    tracing::error!(category = %e.category(), error = %e, "Lab report cycle failed");
    anyhow::Error::new(e).context("Lab report cycle failed")
}
