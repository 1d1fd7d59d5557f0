use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// The signed-in account.
///
/// Profiles are never patched field by field; a refresh replaces the whole
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accept RFC 3339 or a bare `YYYY-MM-DD` date; anything else is `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(raw) = value.as_ref().and_then(|v| v.as_str()) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(midnight.and_utc()));
    }

    debug!(value = raw, "Ignoring unparseable createdAt");
    Ok(None)
}

impl UserProfile {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            created_at: None,
        }
    }

    /// Get display name for the account, e.g. "ada <ada@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.username, self.email)
    }
}

/// Result of a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub user: UserProfile,
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Account record returned by the legacy `GET /users?email=` lookup.
///
/// Carries the stored password, which is why the lookup sign-in mode only
/// exists for mock backends.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl Account {
    pub fn password_matches(&self, password: &str) -> bool {
        self.password.as_deref() == Some(password)
    }
}
