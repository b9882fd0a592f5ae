use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a provider token, in minutes.
pub const PROVIDER_TOKEN_LIFETIME_MINUTES: i64 = 28_800;

/// Token issued after a successful SAML login. It cannot be refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProviderToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewProviderToken {
    /// Token created now, expiring after the fixed lifetime.
    pub fn new(token: impl Into<String>) -> Self {
        Self::issued_at(token, Utc::now())
    }

    pub fn issued_at(token: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            created_at,
            expires_at: created_at + Duration::minutes(PROVIDER_TOKEN_LIFETIME_MINUTES),
        }
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }
}

/// Token pair handed to refresh operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationTokens {
    pub user_id: i64,
    pub provider_token: NewProviderToken,
    pub provider_refresh_token: Option<NewProviderToken>,
}
