// UI layer: the terminal side of the auth commands. Prompts use `dialoguer`,
// the callback wait shows an `indicatif` spinner, and status lines get a
// coloured prefix through `crossterm`.

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;
use tracing::debug;

use crate::api::ApiClient;
use crate::config::AuthConfig;
use crate::error::LoginError;
use crate::oauth::{
    LoginEvent, LoginMode, LoginOrchestrator, LoginTerminal, SystemBrowser, TokenExchanger,
};
use crate::store::{ClientCredentials, CredentialStore};

const TOKEN_PREVIEW_CHARS: usize = 20;

pub fn print_success(message: &str) {
    println!("{} {}", "[+]".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "[!]".red(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "[!]".yellow(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "[i]".blue(), message);
}

pub fn print_step(message: &str) {
    println!("{} {}", "[*]".cyan(), message);
}

pub fn print_header(title: &str) {
    println!("\n{}", title.bold());
}

fn input_err(err: std::io::Error) -> LoginError {
    LoginError::Input(err.to_string())
}

/// One line of pasted input. End of input reads as an empty answer.
fn read_pasted_line(reader: &mut impl BufRead) -> Result<String, LoginError> {
    let mut line = String::new();
    reader.read_line(&mut line).map_err(input_err)?;
    Ok(line.trim().to_string())
}

/// Interactive terminal used by the login orchestrator.
#[derive(Default)]
pub struct ConsoleTerminal {
    spinner: Option<ProgressBar>,
}

impl ConsoleTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_spinner(&mut self, message: &'static str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for ConsoleTerminal {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}

impl LoginTerminal for ConsoleTerminal {
    fn confirm_ready(&mut self, authorization_url: &str) -> Result<bool, LoginError> {
        print_warning("First, authenticate in your web browser.");
        println!("If the browser does not open, visit this URL manually:\n\n{authorization_url}\n");
        Confirm::new()
            .with_prompt("Open the authorization page in your browser now?")
            .default(true)
            .interact()
            .map_err(input_err)
    }

    fn read_redirect_url(&mut self, authorization_url: &str) -> Result<String, LoginError> {
        print_warning("Running in headless mode. Please follow the instructions below.");
        println!();
        print_info("1. Open the following URL in your browser:");
        println!("{authorization_url}\n");
        print_info("2. After authenticating, the browser is sent to a localhost URL containing '?code=...'.");
        print_info("   The page will not load; that is expected.");
        print_info("3. Copy the entire redirected URL from the address bar and paste it below.");
        println!();
        if io::stdin().is_terminal() && io::stderr().is_terminal() {
            return Input::<String>::new()
                .with_prompt("Enter the redirected URL")
                .allow_empty(true)
                .interact_text()
                .map_err(input_err);
        }
        // dialoguer returns an empty answer without a terminal; read the pipe.
        print!("Enter the redirected URL: ");
        io::stdout().flush().map_err(input_err)?;
        read_pasted_line(&mut io::stdin().lock())
    }

    fn notify(&mut self, event: LoginEvent) {
        match event {
            LoginEvent::SshSessionDetected { port } => {
                println!();
                print_warning("It looks like you're running in an SSH session.");
                print_info(&format!(
                    "For browser authentication to work, forward port {port} from your local machine:"
                ));
                println!("  {} ssh -L {port}:localhost:{port} user@your_server", "$".cyan());
                print_info("If that is not possible, exit and run 'cloudrive auth login --no-browser'.");
                println!();
            }
            LoginEvent::ServerStarting { port } => {
                print_step(&format!("Starting local server on port {port}..."));
            }
            LoginEvent::OpeningBrowser => println!("{} Opening browser...", "[>]".green()),
            LoginEvent::BrowserLaunchFailed { reason } => {
                debug!(%reason, "browser launch failed");
                print_warning(
                    "Could not open a browser automatically. Paste the URL above into your browser.",
                );
            }
            LoginEvent::WaitingForCallback => {
                self.start_spinner("Waiting for authentication callback...")
            }
            LoginEvent::CallbackFinished => self.stop_spinner(),
            LoginEvent::CodeReceived => print_success("Authorization code received"),
            LoginEvent::ExchangingToken => {
                println!(
                    "{} Exchanging authorization code for access tokens...",
                    "[>]".blue()
                )
            }
        }
    }
}

/// Ask for client credentials when none are stored yet.
pub fn setup_client_credentials(
    store: &CredentialStore,
    config: &AuthConfig,
) -> Result<ClientCredentials, LoginError> {
    let items = [
        "I have OAuth2 credentials (client_id and client_secret)",
        "I need help setting up OAuth2 credentials",
        "Exit",
    ];
    let selection = Select::new()
        .with_prompt("How would you like to authenticate?")
        .items(&items)
        .default(0)
        .interact_opt()
        .map_err(input_err)?;

    match selection {
        Some(0) => {
            let client_id: String = Input::new()
                .with_prompt("Client ID")
                .interact_text()
                .map_err(input_err)?;
            let client_secret: String = Password::new()
                .with_prompt("Client Secret")
                .interact()
                .map_err(input_err)?;
            let creds = ClientCredentials::new(&client_id, &client_secret);
            creds.validate()?;
            store.save_client_credentials(&creds)?;
            print_success("Credentials saved successfully!");
            Ok(creds)
        }
        Some(1) => {
            print_setup_help(&config.redirect_uri());
            Err(LoginError::Cancelled)
        }
        _ => Err(LoginError::Cancelled),
    }
}

fn print_setup_help(redirect_uri: &str) {
    println!();
    print_info("Setting up OAuth2 credentials:");
    println!();
    println!("1. Go to: {}", "https://console.cloud.google.com/".blue());
    println!("2. Create a new project or select an existing one");
    println!("3. Enable the Google Drive API (APIs & Services > Library)");
    println!("4. Create credentials: APIs & Services > Credentials > 'OAuth 2.0 Client IDs'");
    println!("   - Application type: 'Desktop application'");
    println!("   - Authorized redirect URI: {}", redirect_uri.yellow());
    println!("5. Download the credentials JSON and note 'client_id' and 'client_secret'");
    println!();
    println!("After setup, run {} again.", "'cloudrive auth login'".yellow());
}

/// `auth login`: resolve client credentials, run the handshake, greet the user.
pub fn login(store: &CredentialStore, config: &AuthConfig, mode: LoginMode) -> Result<()> {
    print_header("Cloud Storage Authentication");
    store.ensure_dir().map_err(LoginError::from)?;

    let creds = match store.load_client_credentials().map_err(LoginError::from)? {
        Some(creds) => creds,
        None => setup_client_credentials(store, config)?,
    };
    creds.validate()?;
    print_success("Client credentials loaded successfully");

    let exchanger = TokenExchanger::new(config.token_url.clone()).map_err(LoginError::from)?;
    let mut terminal = ConsoleTerminal::new();
    let browser = SystemBrowser;
    let tokens = LoginOrchestrator::new(config, &creds, store, &exchanger, &mut terminal, &browser)
        .run(mode)?;

    println!();
    print_success("Authentication complete.");

    let mut api = ApiClient::new()?;
    api.set_token(&tokens.access_token);
    match api.account_name(&config.userinfo_url) {
        Ok(name) => println!("{} Logged in as {}.", "[+]".green(), name.bold()),
        Err(err) => {
            debug!(error = %err, "account lookup failed");
            print_success("Logged in.");
        }
    }
    Ok(())
}

/// `auth status`: report whether a token set is stored.
pub fn status(store: &CredentialStore) -> Result<()> {
    let tokens = store
        .load_tokens()
        .with_context(|| format!("Reading {}", store.token_path().display()))?;
    match tokens {
        Some(tokens) if !tokens.access_token.is_empty() => {
            print_success("Authenticated and ready to use.");
            println!("Access token: {}", token_preview(&tokens.access_token));
            Ok(())
        }
        _ => anyhow::bail!("Not authenticated. Run 'cloudrive auth login' first."),
    }
}

/// `auth refresh`: replace the stored token set using its refresh token.
pub fn refresh(store: &CredentialStore, config: &AuthConfig) -> Result<()> {
    let creds = store
        .load_client_credentials()
        .map_err(LoginError::from)?
        .context("No client credentials stored. Run 'cloudrive auth login' first.")?;
    let current = store
        .load_tokens()
        .map_err(LoginError::from)?
        .context("Not authenticated. Run 'cloudrive auth login' first.")?;

    let exchanger = TokenExchanger::new(config.token_url.clone()).map_err(LoginError::from)?;
    let refreshed = exchanger
        .refresh(&current, &creds)
        .map_err(LoginError::from)?;
    store.save_tokens(&refreshed).map_err(LoginError::from)?;
    print_success("Token refreshed successfully");
    Ok(())
}

fn token_preview(token: &str) -> String {
    if token.chars().count() > TOKEN_PREVIEW_CHARS {
        let head: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        token.to_string()
    }
}
