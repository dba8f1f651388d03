// Login orchestration: the state machine that turns "user wants to log in"
// into a saved `TokenSet`.
//
// In browser mode the redirect listener is bound first, then served on one
// worker thread while the main thread opens the browser and shows progress;
// the worker is joined before the token exchange. Headless mode prints the
// URL and reads the redirected URL back from the terminal instead.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info};

use super::authorize::{AuthorizationRequest, CapturedCode};
use super::browser::BrowserLauncher;
use super::exchange::TokenExchanger;
use super::listener::{CancelToken, RedirectListener};
use crate::config::AuthConfig;
use crate::error::LoginError;
use crate::store::{ClientCredentials, CredentialStore, TokenSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// Local redirect listener plus a launched browser.
    Browser,
    /// No listener; the user pastes the redirected URL.
    Headless,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    AwaitingUserAcknowledgement,
    ServerStarting,
    WaitingForCallback,
    CodeReceived,
    ExchangingToken,
    Done,
    Cancelled,
    Failed(String),
}

impl LoginState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoginState::Done | LoginState::Cancelled | LoginState::Failed(_)
        )
    }

    pub fn can_advance_to(&self, next: &LoginState) -> bool {
        use LoginState::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Cancelled | Failed(_)) => true,
            (Idle, AwaitingUserAcknowledgement)
            | (AwaitingUserAcknowledgement, ServerStarting)
            | (AwaitingUserAcknowledgement, CodeReceived)
            | (ServerStarting, WaitingForCallback)
            | (WaitingForCallback, CodeReceived)
            | (CodeReceived, ExchangingToken)
            | (ExchangingToken, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::Failed(reason) => write!(f, "Failed({reason})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Progress notifications for whoever is driving the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEvent {
    SshSessionDetected { port: u16 },
    ServerStarting { port: u16 },
    OpeningBrowser,
    BrowserLaunchFailed { reason: String },
    WaitingForCallback,
    CallbackFinished,
    CodeReceived,
    ExchangingToken,
}

/// Terminal capability the orchestrator needs: two questions and a way to
/// report progress.
pub trait LoginTerminal {
    /// Show the consent URL and ask whether to start. `false` cancels.
    fn confirm_ready(&mut self, authorization_url: &str) -> Result<bool, LoginError>;

    /// Show the consent URL and read back the URL the browser landed on.
    fn read_redirect_url(&mut self, authorization_url: &str) -> Result<String, LoginError>;

    fn notify(&mut self, event: LoginEvent);
}

pub struct LoginOrchestrator<'a> {
    config: &'a AuthConfig,
    credentials: &'a ClientCredentials,
    store: &'a CredentialStore,
    exchanger: &'a TokenExchanger,
    terminal: &'a mut dyn LoginTerminal,
    browser: &'a dyn BrowserLauncher,
    cancel: CancelToken,
    history: Vec<LoginState>,
}

impl<'a> LoginOrchestrator<'a> {
    pub fn new(
        config: &'a AuthConfig,
        credentials: &'a ClientCredentials,
        store: &'a CredentialStore,
        exchanger: &'a TokenExchanger,
        terminal: &'a mut dyn LoginTerminal,
        browser: &'a dyn BrowserLauncher,
    ) -> Self {
        LoginOrchestrator {
            config,
            credentials,
            store,
            exchanger,
            terminal,
            browser,
            cancel: CancelToken::new(),
            history: vec![LoginState::Idle],
        }
    }

    /// Share a cancellation token with the caller so it can abort the wait
    /// for the callback.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> &LoginState {
        // history always holds at least Idle
        self.history.last().unwrap_or(&LoginState::Idle)
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[LoginState] {
        &self.history
    }

    /// Run one login attempt to a terminal state. The token set is saved
    /// before `Ok` is returned.
    pub fn run(&mut self, mode: LoginMode) -> Result<TokenSet, LoginError> {
        let result = self.drive(mode);
        if let Err(err) = &result {
            let terminal = match err {
                LoginError::Cancelled => LoginState::Cancelled,
                other => LoginState::Failed(other.to_string()),
            };
            if self.state().can_advance_to(&terminal) {
                self.enter(terminal);
            }
        }
        result
    }

    fn drive(&mut self, mode: LoginMode) -> Result<TokenSet, LoginError> {
        let request = AuthorizationRequest::new(self.config, &self.credentials.client_id);
        self.advance(LoginState::AwaitingUserAcknowledgement)?;

        let code = match mode {
            LoginMode::Headless => self.capture_pasted(&request)?,
            LoginMode::Browser => self.capture_from_listener(&request)?,
        };
        self.advance(LoginState::CodeReceived)?;
        self.terminal.notify(LoginEvent::CodeReceived);
        debug!(captured_at = %code.captured_at, "authorization code received");

        self.advance(LoginState::ExchangingToken)?;
        self.terminal.notify(LoginEvent::ExchangingToken);
        let tokens =
            self.exchanger
                .exchange(&code.value, &self.config.redirect_uri(), self.credentials)?;
        self.store.save_tokens(&tokens)?;
        self.advance(LoginState::Done)?;
        info!("login complete");
        Ok(tokens)
    }

    fn capture_pasted(&mut self, request: &AuthorizationRequest) -> Result<CapturedCode, LoginError> {
        let pasted = self.terminal.read_redirect_url(&request.authorization_url)?;
        CapturedCode::capture(pasted.trim()).ok_or(LoginError::NoCodeInCallback)
    }

    fn capture_from_listener(
        &mut self,
        request: &AuthorizationRequest,
    ) -> Result<CapturedCode, LoginError> {
        let port = request.redirect_port;
        if is_ssh_session() {
            self.terminal.notify(LoginEvent::SshSessionDetected { port });
        }
        if !self.terminal.confirm_ready(&request.authorization_url)? {
            return Err(LoginError::Cancelled);
        }

        self.advance(LoginState::ServerStarting)?;
        self.terminal.notify(LoginEvent::ServerStarting { port });
        let bound = RedirectListener::start(port)?;
        self.advance(LoginState::WaitingForCallback)?;

        let deadline = self.config.max_wait.map(|wait| Instant::now() + wait);
        // The handle cancels and joins the worker if dropped before `wait`.
        let handle = bound.spawn(self.cancel.clone(), deadline);

        self.terminal.notify(LoginEvent::OpeningBrowser);
        if let Err(err) = self.browser.open(&request.authorization_url) {
            debug!(error = %err, "browser launch failed; waiting for manual navigation");
            self.terminal.notify(LoginEvent::BrowserLaunchFailed {
                reason: err.to_string(),
            });
        }

        self.terminal.notify(LoginEvent::WaitingForCallback);
        let outcome = handle.wait();
        self.terminal.notify(LoginEvent::CallbackFinished);
        outcome.into_code()
    }

    fn advance(&mut self, next: LoginState) -> Result<(), LoginError> {
        if !self.state().can_advance_to(&next) {
            return Err(LoginError::IllegalTransition {
                from: self.state().to_string(),
                to: next.to_string(),
            });
        }
        self.enter(next);
        Ok(())
    }

    fn enter(&mut self, next: LoginState) {
        debug!(from = %self.state(), to = %next, "login state transition");
        self.history.push(next);
    }
}

/// Remote shells need the callback port forwarded to reach the browser.
fn is_ssh_session() -> bool {
    ["SSH_CLIENT", "SSH_CONNECTION"]
        .iter()
        .any(|name| std::env::var_os(name).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoginState::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        let path = [
            Idle,
            AwaitingUserAcknowledgement,
            ServerStarting,
            WaitingForCallback,
            CodeReceived,
            ExchangingToken,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn headless_skips_the_server_states() {
        assert!(AwaitingUserAcknowledgement.can_advance_to(&CodeReceived));
    }

    #[test]
    fn failure_and_cancel_reachable_from_every_non_terminal_state() {
        for state in [
            Idle,
            AwaitingUserAcknowledgement,
            ServerStarting,
            WaitingForCallback,
            CodeReceived,
            ExchangingToken,
        ] {
            assert!(state.can_advance_to(&Cancelled), "{state}");
            assert!(state.can_advance_to(&Failed("x".to_string())), "{state}");
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for state in [Done, Cancelled, Failed("x".to_string())] {
            assert!(state.is_terminal());
            assert!(!state.can_advance_to(&Idle));
            assert!(!state.can_advance_to(&Failed("y".to_string())));
        }
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        assert!(!Idle.can_advance_to(&WaitingForCallback));
        assert!(!ServerStarting.can_advance_to(&CodeReceived));
        assert!(!CodeReceived.can_advance_to(&Done));
        assert!(!WaitingForCallback.can_advance_to(&ServerStarting));
    }

    #[test]
    fn failed_state_displays_reason() {
        assert_eq!(
            Failed("port 8080 is already in use".to_string()).to_string(),
            "Failed(port 8080 is already in use)"
        );
        assert_eq!(WaitingForCallback.to_string(), "WaitingForCallback");
    }
}
