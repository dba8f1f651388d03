// Browser launching. Best effort only: the URL is always printed as well.

use tracing::debug;

use crate::error::LoginError;

/// Something that can show the consent page to the user.
pub trait BrowserLauncher {
    fn open(&self, url: &str) -> Result<(), LoginError>;
}

/// Opens the platform default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), LoginError> {
        debug!("opening system browser");
        opener::open_browser(url).map_err(|err| LoginError::BrowserLaunchFailed(err.to_string()))
    }
}
