//! GIL - Generic Integration Layer
//!
//! CLI entry point for running and inspecting the simulated integration.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use gil::cli::{Cli, Command, OutputFormat, generate_after_help};
use gil::config::Config;
use gil::domain::{AdapterDescriptor, StageDescriptor, Statistics, SystemSnapshot, SystemState};
use gil::executive::IntegrationExecutive;
use gil::sim::SimulatedIntegration;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging is not initialised yet, so nothing in here can be logged
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gil")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("gil.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run { duration_secs }) => {
            debug!(?duration_secs, "main: matched Run command");
            cmd_run(&config, duration_secs).await
        }
        Some(Command::Describe { format }) => {
            debug!(%format, "main: matched Describe command");
            cmd_describe(&config, format)
        }
        Some(Command::Config) => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
        None => {
            debug!("main: no command specified, running until Ctrl-C");
            cmd_run(&config, None).await
        }
    }
}

/// Run the simulated integration, printing a status line every second
async fn cmd_run(config: &Config, duration_secs: Option<u64>) -> Result<()> {
    let duration_secs = duration_secs.unwrap_or(config.simulation.duration_secs);
    debug!(duration_secs, "cmd_run: called");

    let sim = SimulatedIntegration::from_config(&config.simulation);
    let executive = sim.executive(config.executive.clone());
    executive.start().await.context("Failed to start integration executive")?;
    println!(
        "{} Integration started: {} <-> {}",
        "✓".green(),
        executive.external_system_adapter().type_name.cyan(),
        executive.process_model_adapter().type_name.cyan()
    );
    if duration_secs == 0 {
        println!("Press Ctrl-C to stop");
    }

    let deadline = async {
        match duration_secs {
            0 => std::future::pending().await,
            secs => tokio::time::sleep(Duration::from_secs(secs)).await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => print_status(&executive),
            _ = &mut deadline => {
                debug!("cmd_run: duration elapsed");
                break;
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "cmd_run: failed to listen for Ctrl-C");
                }
                println!("Interrupted");
                break;
            }
        }
    }

    let stopped = executive.stop().await;
    print_status(&executive);
    stopped.context("Failed to stop integration executive")?;
    println!("{} Integration stopped", "✓".green());
    Ok(())
}

fn paint_state(snapshot: &SystemSnapshot) -> ColoredString {
    let text = snapshot.state.to_string();
    match snapshot.state {
        SystemState::Running => text.green(),
        SystemState::Error | SystemState::NotAvailable => text.red(),
        _ => text.yellow(),
    }
}

fn format_statistics(stats: &Statistics) -> String {
    format!(
        "dropped {} cmd-fail {} write-fail {} read-fail {}",
        stats.dropped_frames, stats.command_failures, stats.data_write_failures, stats.data_read_failures
    )
}

fn print_status(executive: &IntegrationExecutive) {
    let es = executive.external_system_snapshot();
    let pm = executive.process_model_snapshot();
    let pm_progress = executive.process_model_progress();
    println!(
        "ES {:<10} {} [{}] | PM {:<10} {} ({}% {}) [{}]",
        paint_state(&es),
        es.status.message.dimmed(),
        format_statistics(&executive.external_system_statistics()),
        paint_state(&pm),
        pm.status.message.dimmed(),
        pm_progress.percent_complete,
        pm_progress.message,
        format_statistics(&executive.process_model_statistics()),
    );
    for (side, state) in [
        ("external system", executive.external_system_loop_state()),
        ("process model", executive.process_model_loop_state()),
    ] {
        if !state.is_running() {
            println!("  {} {} loop {}", "!".red(), side, state);
        }
    }
}

#[derive(Serialize)]
struct Catalog<'a> {
    external_system: &'a AdapterDescriptor,
    process_model: &'a AdapterDescriptor,
    pipeline: Vec<StageDescriptor>,
}

/// Print the adapter and pipeline stage catalogs of the simulated integration
fn cmd_describe(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_describe: called");
    let sim = SimulatedIntegration::from_config(&config.simulation);
    let executive = sim.executive(config.executive.clone());
    let catalog = Catalog {
        external_system: executive.external_system_adapter(),
        process_model: executive.process_model_adapter(),
        pipeline: executive
            .transfer_pipeline_stages()
            .context("Failed to describe pipeline stages")?,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        OutputFormat::Text => {
            for (title, adapter) in [
                ("External system", catalog.external_system),
                ("Process model", catalog.process_model),
            ] {
                println!("{}: {}", title.bold(), adapter.type_name.cyan());
                for command in &adapter.commands {
                    println!("  {:<14} {}", command.id.yellow(), command.description);
                }
            }
            println!("{}:", "Pipeline".bold());
            for stage in &catalog.pipeline {
                println!("  [{}] {}", stage.index, stage.type_name.cyan());
                for command in &stage.commands {
                    println!("      {:<12} {}", command.id.yellow(), command.description);
                }
            }
        }
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}
