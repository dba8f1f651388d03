// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, dispatch.
// - Any error ends the process with a non-zero status and, for login
//   failures, the matching hint.

use clap::Parser;
use cloudrive_cli::cli::{AuthCommand, Cli, Command, LoginArgs};
use cloudrive_cli::config::AuthConfig;
use cloudrive_cli::error::LoginError;
use cloudrive_cli::oauth::LoginMode;
use cloudrive_cli::store::CredentialStore;
use cloudrive_cli::ui;
use std::process::ExitCode;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let store = CredentialStore::from_env()?;
    let config = AuthConfig::from_env()?;

    match cli.command {
        Command::Auth(AuthCommand::Login(LoginArgs {
            no_browser,
            timeout,
        })) => {
            let mode = if no_browser {
                LoginMode::Headless
            } else {
                LoginMode::Browser
            };
            let config = config.with_max_wait(timeout.map(Duration::from_secs));
            ui::login(&store, &config, mode)
        }
        Command::Auth(AuthCommand::Status) => ui::status(&store),
        Command::Auth(AuthCommand::Refresh) => ui::refresh(&store, &config),
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<LoginError>() {
        Some(LoginError::Cancelled) => ui::print_warning("Authentication cancelled."),
        Some(login_err) => {
            ui::print_error(&format!("Authentication failed: {login_err}"));
            if let Some(hint) = login_err.remediation() {
                ui::print_info(&hint);
            }
        }
        None => ui::print_error(&format!("{err:#}")),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
