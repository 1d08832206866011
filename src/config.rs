// Credentials for the messaging platform. All three are required; a run
// never starts probing without them.

use crate::error::{Result, TelegrabError};
use std::path::PathBuf;

pub const API_ID_VAR: &str = "API_ID";
pub const API_KEY_VAR: &str = "API_KEY";
pub const PHONE_VAR: &str = "YOUR_PHONE";

/// File name of the persisted session inside the home directory.
pub const SESSION_FILE: &str = ".telegrab_session";

#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    /// The operator's own phone number, used for sign-in.
    pub phone: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone", &self.phone)
            .finish()
    }
}

impl Credentials {
    /// Read `API_ID`, `API_KEY` and `YOUR_PHONE` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from any variable source. Every missing or blank
    /// variable is reported at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let api_id = read(API_ID_VAR);
        let api_hash = read(API_KEY_VAR);
        let phone = read(PHONE_VAR);

        let (api_id, api_hash, phone) = match (api_id, api_hash, phone) {
            (Some(id), Some(hash), Some(phone)) => (id, hash, phone),
            (id, hash, phone) => {
                let missing = [
                    (API_ID_VAR, id.is_none()),
                    (API_KEY_VAR, hash.is_none()),
                    (PHONE_VAR, phone.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                return Err(TelegrabError::MissingConfiguration(missing));
            }
        };

        let api_id = api_id
            .parse::<i32>()
            .map_err(|e| TelegrabError::InvalidConfiguration {
                name: API_ID_VAR,
                reason: e.to_string(),
            })?;

        Ok(Credentials {
            api_id,
            api_hash,
            phone,
        })
    }
}

/// Default location of the persisted session: `~/.telegrab_session`, or the
/// working directory when no home directory is known.
pub fn default_session_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(SESSION_FILE)
}
