// Profile assembly: folds the imported user, the optional full-user lookup
// and the presence status into the row shown for a registered number.

use crate::api::{FullUser, RawUser, UserStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// When the account was last active, as far as the platform discloses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum LastSeen {
    At(DateTime<Utc>),
    Online,
    Recently,
    LastWeek,
    LastMonth,
    LongAgo,
    Never,
}

impl LastSeen {
    pub fn from_status(status: Option<&UserStatus>) -> Self {
        match status {
            Some(UserStatus::Offline { was_online }) => DateTime::<Utc>::from_timestamp(*was_online, 0)
                .map(LastSeen::At)
                .unwrap_or(LastSeen::Never),
            Some(UserStatus::Online { .. }) => LastSeen::Online,
            Some(UserStatus::Recently {}) => LastSeen::Recently,
            Some(UserStatus::LastWeek {}) => LastSeen::LastWeek,
            Some(UserStatus::LastMonth {}) => LastSeen::LastMonth,
            Some(UserStatus::Empty {}) => LastSeen::LongAgo,
            None => LastSeen::Never,
        }
    }
}

impl fmt::Display for LastSeen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastSeen::At(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            LastSeen::Online => f.write_str("Online"),
            LastSeen::Recently => f.write_str("Last seen recently"),
            LastSeen::LastWeek => f.write_str("Last seen in the last week"),
            LastSeen::LastMonth => f.write_str("Last seen in the last month"),
            LastSeen::LongAgo => f.write_str("Last seen a long time ago"),
            LastSeen::Never => f.write_str("Never"),
        }
    }
}

/// Best-effort enrichment fetched after the account has been resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedProfile {
    pub bio: Option<String>,
    pub status: Option<UserStatus>,
}

impl ExtendedProfile {
    pub fn from_full_user(user_id: i64, full: FullUser) -> Self {
        let bio = full.full_user.about.filter(|about| !about.trim().is_empty());
        let status = full
            .users
            .into_iter()
            .find(|u| u.id == user_id)
            .and_then(|u| u.status);
        ExtendedProfile { bio, status }
    }
}

/// What a probe reports about a registered account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub is_bot: bool,
    pub last_seen: LastSeen,
}

impl Profile {
    /// Combine the resolved user with whatever enrichment succeeded. The
    /// extended status wins over the one seen during import.
    pub fn build(user: RawUser, extended: Option<ExtendedProfile>) -> Self {
        let extended = extended.unwrap_or_default();
        let status = extended.status.as_ref().or(user.status.as_ref());
        let last_seen = LastSeen::from_status(status);
        Profile {
            id: user.id,
            username: user.username.filter(|u| !u.is_empty()),
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            bio: extended.bio,
            is_bot: user.bot,
            last_seen,
        }
    }
}
