// Credential store: the client application identity and the token set live
// as two small JSON files in a per-user config directory. The directory is
// created owner-only and both files are written owner-only through a temp
// file + rename, so a reader never sees a half-written token record.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::error::LoginError;

pub const CONFIG_DIR_NAME: &str = ".cloudrive";
pub const CLIENT_CREDENTIALS_FILE: &str = "client_id.json";
pub const TOKEN_FILE: &str = "token.json";

const MIN_CREDENTIAL_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create config directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// OAuth client identity as downloaded from the provider console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        ClientCredentials {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        }
    }

    /// Reject obviously truncated or empty values before they reach the provider.
    pub fn validate(&self) -> Result<(), LoginError> {
        if self.client_id.len() < MIN_CREDENTIAL_LEN {
            return Err(LoginError::InvalidCredentials(format!(
                "client_id must be at least {MIN_CREDENTIAL_LEN} characters (got {})",
                self.client_id.len()
            )));
        }
        if self.client_secret.len() < MIN_CREDENTIAL_LEN {
            return Err(LoginError::InvalidCredentials(format!(
                "client_secret must be at least {MIN_CREDENTIAL_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Access/refresh token bundle returned by the token endpoint. Replaced as a
/// whole on login and refresh, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
}

/// Handle on the config directory holding `client_id.json` and `token.json`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CredentialStore { dir: dir.into() }
    }

    /// Use `CLOUDRIVE_CONFIG_DIR` when set, otherwise `~/.cloudrive`.
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os("CLOUDRIVE_CONFIG_DIR").filter(|v| !v.is_empty()) {
            return Ok(CredentialStore::new(PathBuf::from(dir)));
        }
        let home = dirs::home_dir().context("Unable to determine home directory")?;
        Ok(CredentialStore::new(home.join(CONFIG_DIR_NAME)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn client_credentials_path(&self) -> PathBuf {
        self.dir.join(CLIENT_CREDENTIALS_FILE)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Create the config directory (owner-only on unix) if it is missing.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        if self.dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)).map_err(
                |source| StoreError::CreateDir {
                    path: self.dir.clone(),
                    source,
                },
            )?;
        }
        debug!(dir = %self.dir.display(), "created config directory");
        Ok(())
    }

    pub fn load_client_credentials(&self) -> Result<Option<ClientCredentials>, StoreError> {
        read_json(&self.client_credentials_path())
    }

    pub fn save_client_credentials(&self, creds: &ClientCredentials) -> Result<(), StoreError> {
        self.ensure_dir()?;
        write_json_private(&self.client_credentials_path(), creds)
    }

    pub fn load_tokens(&self) -> Result<Option<TokenSet>, StoreError> {
        read_json(&self.token_path())
    }

    /// Overwrite the stored token set wholesale.
    pub fn save_tokens(&self, tokens: &TokenSet) -> Result<(), StoreError> {
        self.ensure_dir()?;
        write_json_private(&self.token_path(), tokens)?;
        debug!(path = %self.token_path().display(), "saved token set");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json_private<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let data = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let temp_path = path.with_extension("tmp");

    replace_via_temp(&temp_path, path, data.as_bytes()).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StoreError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn replace_via_temp(temp_path: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp_path, fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(data)?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)
}
