// Command-line surface. Only the `auth` command group exists; everything
// else the storage client does is outside this crate.

use clap::{ArgAction, Args, Parser, Subcommand};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "cloudrive",
    about = "Command-line client for cloud storage",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage authentication
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authenticate in the browser and store tokens
    Login(LoginArgs),
    /// Show authentication status
    Status,
    /// Replace the stored access token using the refresh token
    Refresh,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Do not start a local server or open a browser; paste the redirected URL instead
    #[arg(long)]
    pub no_browser: bool,

    /// Give up waiting for the browser callback after this many seconds
    #[arg(
        long,
        value_name = "SECS",
        env = "CLOUDRIVE_LOGIN_TIMEOUT_SECS",
        value_parser = parse_positive_u64
    )]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_defaults_to_browser_mode() {
        let cli = Cli::try_parse_from(["cloudrive", "auth", "login"]).expect("parse");
        match cli.command {
            Command::Auth(AuthCommand::Login(args)) => assert!(!args.no_browser),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_browser_flag_selects_headless() {
        let cli =
            Cli::try_parse_from(["cloudrive", "auth", "login", "--no-browser"]).expect("parse");
        match cli.command {
            Command::Auth(AuthCommand::Login(args)) => assert!(args.no_browser),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn timeout_must_be_positive() {
        assert!(
            Cli::try_parse_from(["cloudrive", "auth", "login", "--timeout", "0"]).is_err()
        );
        let cli = Cli::try_parse_from(["cloudrive", "-vv", "auth", "login", "--timeout", "90"])
            .expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Auth(AuthCommand::Login(args)) => assert_eq!(args.timeout, Some(90)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn status_and_refresh_parse() {
        assert!(matches!(
            Cli::try_parse_from(["cloudrive", "auth", "status"])
                .expect("parse")
                .command,
            Command::Auth(AuthCommand::Status)
        ));
        assert!(matches!(
            Cli::try_parse_from(["cloudrive", "auth", "refresh"])
                .expect("parse")
                .command,
            Command::Auth(AuthCommand::Refresh)
        ));
    }
}
