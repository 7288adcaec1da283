//! sideload - install and refresh sideloaded apps
//!
//! The CLI wires the concrete collaborators into an `AppManager` and renders
//! its events and results.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod presenter;
mod setup;

use crate::cli::{Cli, Commands};
use crate::display::{AppResult, CommandOutput, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::presenter::ConsolePresenter;
use crate::setup::SystemSetup;
use clap::Parser;
use sideload_config::Config;
use sideload_errors::OpsError;
use sideload_events::{EventEmitter, EventReceiver, EventSender, ProgressTracker};
use sideload_platform::{InstallVerifier, Presenter};
use sideload_types::ColorChoice;
use std::future::Future;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tracing::{error, info};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug, cli.global.config.as_deref()).await;

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting sideload v{}", env!("CARGO_PKG_VERSION"));

    // defaults < file < environment < flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    if let Some(helper) = &cli.global.helper {
        config
            .prefer_helper(helper)
            .map_err(|_| CliError::InvalidArguments(format!("invalid helper address {helper}")))?;
    }

    let color = cli.global.color.unwrap_or(config.general.color);
    let colors_enabled = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stdout().features().colors_supported(),
    };

    let (event_sender, event_receiver) = sideload_events::channel();
    let setup = SystemSetup::initialize(config, event_sender.clone()).await?;
    let renderer = OutputRenderer::new(cli.global.json, colors_enabled);
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.debug, cli.global.json);

    let output = execute_command_with_events(
        execute_command(cli.command, &setup, event_sender),
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render(&output)?;
    if let Some((failed, total)) = output.failures() {
        return Err(CliError::Incomplete { failed, total });
    }

    info!("Command completed successfully");
    Ok(())
}

/// Drive the command while rendering its events
async fn execute_command_with_events(
    command: impl Future<Output = Result<CommandOutput, CliError>>,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandOutput, CliError> {
    let mut command_future = Box::pin(command);

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }
        }
    }
}

async fn execute_command(
    command: Commands,
    setup: &SystemSetup,
    tx: EventSender,
) -> Result<CommandOutput, CliError> {
    let manager = setup.manager();
    let presenter: Arc<dyn Presenter> = Arc::new(ConsolePresenter);

    match command {
        Commands::Apps => Ok(CommandOutput::Apps(manager.fetch_apps().await?)),

        Commands::Install { identifier } => {
            let app = manager
                .fetch_apps()
                .await?
                .into_iter()
                .find(|app| app.identifier == identifier)
                .ok_or_else(|| OpsError::AppNotInCatalog {
                    identifier: identifier.clone(),
                })
                .map_err(sideload_errors::Error::from)?;

            let handle = manager.install(app, Some(presenter)).await;
            let label = format!("installing {identifier}");
            let result = with_progress(handle.progress(), label, &tx, handle.wait()).await;

            Ok(CommandOutput::Results(vec![AppResult::new(
                &identifier,
                &result,
            )]))
        }

        Commands::Refresh { identifiers } => {
            let mut records = manager.installed_apps().await?;
            if !identifiers.is_empty() {
                if let Some(missing) = identifiers
                    .iter()
                    .find(|id| !records.iter().any(|record| &record.identifier == *id))
                {
                    return Err(sideload_errors::Error::from(OpsError::AppNotInstalled {
                        identifier: missing.clone(),
                    })
                    .into());
                }
                records.retain(|record| identifiers.contains(&record.identifier));
            }

            let group = manager.refresh(&records, Some(presenter), None).await;
            let label = format!("refreshing {} app(s)", group.expected_count());
            let outcome = with_progress(group.progress(), label, &tx, group.wait()).await;

            Ok(CommandOutput::Results(AppResult::from_results(&outcome?)))
        }

        Commands::Installed => Ok(CommandOutput::Installed(manager.installed_apps().await?)),

        Commands::SignIn { reset } => {
            if reset {
                setup.state().reset().await?;
                return Ok(CommandOutput::Message("Signed out".to_string()));
            }
            // A stored account is reused; the prompt only appears without one
            let credential = manager.authenticate(Some(presenter)).await?;
            Ok(CommandOutput::Message(format!(
                "Signed in as {} (team {})",
                credential.account.email, credential.account.team_identifier
            )))
        }

        Commands::Update => {
            let verifier = setup.verifier().await;
            let report = manager
                .update(verifier.as_ref().map(|v| v as &dyn InstallVerifier))
                .await?;
            Ok(CommandOutput::Reconciled(report))
        }
    }
}

/// Run `work` while publishing the tracker's fraction at a fixed interval
async fn with_progress<F: Future>(
    tracker: &ProgressTracker,
    label: String,
    tx: &EventSender,
    work: F,
) -> F::Output {
    tx.emit_progress_started(tracker, label);
    let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
    tokio::pin!(work);
    let output = loop {
        select! {
            output = &mut work => break output,
            _ = interval.tick() => tx.emit_progress_updated(tracker),
        }
    };
    tx.emit_progress_completed(tracker);
    output
}

async fn init_tracing(json_mode: bool, debug_flag: bool, config_path: Option<&Path>) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_flag;
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,sideload=debug,sideload_ops=info")
        })
    };

    if debug_enabled {
        // Structured JSON logs go to a file so they never mix with output
        let logs_dir = Config::load_or_default(config_path)
            .await
            .unwrap_or_default()
            .logs_dir();
        let log_file = logs_dir.join(format!(
            "sideload-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));
        let file = std::fs::create_dir_all(&logs_dir).and_then(|()| std::fs::File::create(&log_file));
        match file {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(filter())
                    .init();
                if !json_mode {
                    eprintln!("Debug logging to: {}", log_file.display());
                }
                return;
            }
            Err(e) if !json_mode => {
                eprintln!("Warning: Failed to create log file: {e}");
            }
            Err(_) => {}
        }
    }

    if json_mode {
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            // Events are already rendered by the event handler
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn,sideload=off"))
            .with_target(false)
            .init();
    }
}
