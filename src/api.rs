// API client module: a small blocking client for the messaging platform's
// remote-procedure gateway. The gateway owns the real protocol (transport,
// encryption, session keys); this module only speaks its JSON envelope and
// maps platform errors onto `RpcError` so the rest of the crate can match
// on them.

use crate::config::Credentials;
use crate::phone::PhoneNumber;
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8081";

const API_ID_HEADER: &str = "x-api-id";
const API_HASH_HEADER: &str = "x-api-hash";

/// Errors reported by the platform or by the transport underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("A wait of {seconds} seconds is required (FLOOD_WAIT)")]
    FloodWait { seconds: u64 },

    #[error("The phone number is invalid")]
    PhoneNumberInvalid,

    #[error("The verification code is invalid or expired ({0})")]
    CodeInvalid(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        RpcError::Transport(e.to_string())
    }
}

/// Map a platform error (`error_code`, `error_message`) onto `RpcError`.
pub fn classify(code: i32, message: &str) -> RpcError {
    if let Some(seconds) = message.strip_prefix("FLOOD_WAIT_") {
        return RpcError::FloodWait {
            seconds: seconds.parse().unwrap_or(0),
        };
    }
    match message {
        "PHONE_NUMBER_INVALID" => RpcError::PhoneNumberInvalid,
        "PHONE_CODE_INVALID" | "PHONE_CODE_EXPIRED" | "PHONE_CODE_EMPTY" => {
            RpcError::CodeInvalid(message.to_string())
        }
        _ if code == 420 => RpcError::FloodWait { seconds: 0 },
        _ => RpcError::Rpc {
            code,
            message: message.to_string(),
        },
    }
}

/// Response envelope used by every gateway method.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i32>,
    error_message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self, method: &str, http_status: u16) -> Result<T, RpcError> {
        if self.ok {
            return self.result.ok_or_else(|| RpcError::Rpc {
                code: i32::from(http_status),
                message: format!("{method} returned no result"),
            });
        }
        let code = self.error_code.unwrap_or(i32::from(http_status));
        let message = self.error_message.unwrap_or_else(|| "UNKNOWN".into());
        Err(classify(code, &message))
    }
}

/// A user as returned by contact import, phone resolution or full-user
/// requests.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RawUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

/// Presence information, tagged the way the platform tags it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "_")]
pub enum UserStatus {
    #[serde(rename = "userStatusOnline")]
    Online { expires: i64 },
    #[serde(rename = "userStatusOffline")]
    Offline { was_online: i64 },
    #[serde(rename = "userStatusRecently")]
    Recently {},
    #[serde(rename = "userStatusLastWeek")]
    LastWeek {},
    #[serde(rename = "userStatusLastMonth")]
    LastMonth {},
    #[serde(rename = "userStatusEmpty")]
    Empty {},
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UsersResult {
    #[serde(default)]
    pub users: Vec<RawUser>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UserFull {
    #[serde(default)]
    pub about: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FullUser {
    #[serde(default)]
    pub full_user: UserFull,
    #[serde(default)]
    pub users: Vec<RawUser>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SentCode {
    pub phone_code_hash: String,
}

#[derive(Deserialize, Debug)]
struct Authorization {
    session: String,
}

#[derive(Serialize, Debug)]
struct InputPhoneContact<'a> {
    client_id: i64,
    phone: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

/// The remote procedures the prober needs from the platform. `GatewayClient`
/// is the production implementation; tests script their own.
pub trait MessagingApi {
    fn is_authorized(&self) -> Result<bool, RpcError>;
    fn send_code(&self, phone: &str) -> Result<SentCode, RpcError>;
    fn sign_in(&mut self, phone: &str, phone_code_hash: &str, code: &str) -> Result<(), RpcError>;
    /// Import a single transient contact. A non-empty result means the
    /// contact now exists and must be deleted again.
    fn import_contact(&self, phone: &PhoneNumber) -> Result<Vec<RawUser>, RpcError>;
    fn resolve_phone(&self, phone: &PhoneNumber) -> Result<Vec<RawUser>, RpcError>;
    fn get_full_user(&self, user_id: i64) -> Result<FullUser, RpcError>;
    fn delete_contact(&self, user_id: i64) -> Result<(), RpcError>;
    fn disconnect(&self) -> Result<(), RpcError>;
}

/// Blocking gateway client holding the HTTP client, the gateway base URL,
/// the application credentials and the session token once signed in.
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_id: i32,
    api_hash: String,
    session_path: PathBuf,
    token: Option<String>,
}

impl GatewayClient {
    /// Build a client for `base_url`, reusing the session persisted at
    /// `session_path` when there is one.
    pub fn connect(
        base_url: &str,
        credentials: &Credentials,
        session_path: &Path,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("telegrab/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let token = load_token(session_path).ok();
        if token.is_some() {
            debug!(path = %session_path.display(), "reusing persisted session");
        }
        Ok(GatewayClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            session_path: session_path.to_path_buf(),
            token,
        })
    }

    /// Store a session token for subsequent calls.
    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn headers(&self) -> Result<HeaderMap, RpcError> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_ID_HEADER), HeaderValue::from(self.api_id));
        let hash = HeaderValue::from_str(&self.api_hash)
            .map_err(|e| RpcError::Transport(format!("invalid API_KEY header: {e}")))?;
        headers.insert(HeaderName::from_static(API_HASH_HEADER), hash);
        if let Some(t) = &self.token {
            let val = HeaderValue::from_str(&format!("Bearer {t}"))
                .map_err(|e| RpcError::Transport(format!("invalid session token: {e}")))?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    fn call<B, T>(&self, method: &str, body: &B) -> Result<T, RpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        debug!(%method, "gateway call");
        let res = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()?;
        let status = res.status().as_u16();
        let text = res.text()?;
        debug!(%method, status, body = %text, "gateway response");
        let envelope: Envelope<T> = serde_json::from_str(&text)
            .map_err(|e| RpcError::Transport(format!("Parsing {method} response: {e}")))?;
        envelope.into_result(method, status)
    }
}

impl MessagingApi for GatewayClient {
    fn is_authorized(&self) -> Result<bool, RpcError> {
        if !self.has_token() {
            return Ok(false);
        }
        self.call("auth.isAuthorized", &serde_json::json!({}))
    }

    fn send_code(&self, phone: &str) -> Result<SentCode, RpcError> {
        self.call(
            "auth.sendCode",
            &serde_json::json!({
                "phone_number": phone,
                "api_id": self.api_id,
                "api_hash": self.api_hash,
            }),
        )
    }

    fn sign_in(&mut self, phone: &str, phone_code_hash: &str, code: &str) -> Result<(), RpcError> {
        let auth: Authorization = self.call(
            "auth.signIn",
            &serde_json::json!({
                "phone_number": phone,
                "phone_code_hash": phone_code_hash,
                "phone_code": code,
            }),
        )?;
        self.set_token(&auth.session);
        // A failed write only costs a fresh sign-in next run.
        if let Err(e) = persist_token(&self.session_path, &auth.session) {
            warn!(path = %self.session_path.display(), error = %e, "could not persist session");
        }
        Ok(())
    }

    fn import_contact(&self, phone: &PhoneNumber) -> Result<Vec<RawUser>, RpcError> {
        let contact = InputPhoneContact {
            client_id: 0,
            phone: phone.as_str(),
            first_name: "",
            last_name: "",
        };
        let imported: UsersResult = self.call(
            "contacts.importContacts",
            &serde_json::json!({ "contacts": [contact] }),
        )?;
        Ok(imported.users)
    }

    fn resolve_phone(&self, phone: &PhoneNumber) -> Result<Vec<RawUser>, RpcError> {
        let resolved: UsersResult = self.call(
            "contacts.resolvePhone",
            &serde_json::json!({ "phone": phone.as_str() }),
        )?;
        Ok(resolved.users)
    }

    fn get_full_user(&self, user_id: i64) -> Result<FullUser, RpcError> {
        self.call("users.getFullUser", &serde_json::json!({ "id": user_id }))
    }

    fn delete_contact(&self, user_id: i64) -> Result<(), RpcError> {
        let _: serde_json::Value = self.call(
            "contacts.deleteContacts",
            &serde_json::json!({ "id": [user_id] }),
        )?;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), RpcError> {
        let _: serde_json::Value = self.call("disconnect", &serde_json::json!({}))?;
        Ok(())
    }
}

/// Persist the session token so the next run skips sign-in.
pub fn persist_token(path: &Path, token: &str) -> std::io::Result<()> {
    std::fs::write(path, token)
}

/// Load a previously persisted session token.
pub fn load_token(path: &Path) -> anyhow::Result<String> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Reading session file {}", path.display()))?;
    let token = data.trim().to_string();
    anyhow::ensure!(!token.is_empty(), "Session file {} is empty", path.display());
    Ok(token)
}
