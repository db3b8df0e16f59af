use std::fs::File;
use std::sync::Mutex;

use anyhow::{ Context, Result };
use clap::Parser;
use font_autoencoder::cli::{ run_eval, run_inspect, run_train, Cli, Command };
use tracing_subscriber::EnvFilter;

const DASHBOARD_LOG: &str = "font-autoencoder.log";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_to_file = matches!(&cli.command, Command::Train(args) if args.dashboard);
    init_tracing(log_to_file)?;

    match cli.command {
        Command::Train(args) => {
            let report = run_train(args)?;
            tracing::info!(
                checkpoint = %report.checkpoint.display(),
                epochs = report.history.train.len(),
                "done"
            );
        }
        Command::Eval(args) => {
            run_eval(args)?;
        }
        Command::Inspect(args) => run_inspect(args)?,
    }
    Ok(())
}

/// Logs go to stderr, or to a file while the dashboard owns the terminal.
fn init_tracing(log_to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_to_file {
        let file = File::create(DASHBOARD_LOG).with_context(||
            format!("failed to create {}", DASHBOARD_LOG)
        )?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
    Ok(())
}
