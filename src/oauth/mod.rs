// OAuth2 authorization-code login over a loopback redirect.

pub mod authorize;
pub mod browser;
pub mod exchange;
pub mod listener;
pub mod login;

pub use authorize::{extract_code, AuthorizationRequest, CapturedCode};
pub use browser::{BrowserLauncher, SystemBrowser};
pub use exchange::TokenExchanger;
pub use listener::{BoundListener, CancelToken, ListenerHandle, ListenerOutcome, RedirectListener};
pub use login::{LoginEvent, LoginMode, LoginOrchestrator, LoginState, LoginTerminal};
