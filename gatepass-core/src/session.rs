use chrono::{DateTime, Utc};
use gatepass_shared::Session;
use jsonwebtoken::dangerous::insecure_decode;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::{CoreError, CoreResult};

/// Persisted login, the equivalent of browser local storage
pub trait SessionStore: Send + Sync {
    fn load(&self) -> CoreResult<Option<Session>>;

    fn save(&self, session: &Session) -> CoreResult<()>;

    fn clear(&self) -> CoreResult<()>;
}

/// Claims readable from the bearer token without verifying it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<serde_json::Value>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload only. The signature is the backend's concern.
    pub fn peek(token: &str) -> CoreResult<Self> {
        insecure_decode::<TokenClaims>(token)
            .map(|data| data.claims)
            .map_err(|e| CoreError::InvalidToken(e.to_string()))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| at <= now).unwrap_or(false)
    }
}

/// Load the stored session, dropping it if its token has expired
pub fn active_session(store: &dyn SessionStore, clock: &dyn Clock) -> CoreResult<Option<Session>> {
    let Some(session) = store.load()? else {
        return Ok(None);
    };

    match TokenClaims::peek(&session.token) {
        Ok(claims) if claims.is_expired(clock.now()) => {
            info!("Stored session for {} has expired, clearing it", session.user.email);
            store.clear()?;
            Ok(None)
        }
        Ok(_) => Ok(Some(session)),
        Err(e) => {
            // Opaque tokens are still sent; the backend decides.
            warn!("Could not read session token claims: {}", e);
            Ok(Some(session))
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> CoreResult<Option<Session>> {
        self.session
            .lock()
            .map(|s| s.clone())
            .map_err(|e| CoreError::Storage(e.to_string()))
    }

    fn save(&self, session: &Session) -> CoreResult<()> {
        let mut guard = self.session.lock().map_err(|e| CoreError::Storage(e.to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        let mut guard = self.session.lock().map_err(|e| CoreError::Storage(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use gatepass_shared::UserProfile;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_expiring_at(exp: DateTime<Utc>) -> String {
        let claims = TokenClaims {
            sub: Some(serde_json::json!(42)),
            exp: Some(exp.timestamp()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"backend-secret")).unwrap()
    }

    fn session(token: String) -> Session {
        Session {
            token,
            user: UserProfile {
                id: 42,
                name: "Rina".to_string(),
                email: "rina@example.com".to_string(),
                role: Some("customer".to_string()),
                points: 20_000,
                referral_code: None,
            },
        }
    }

    #[test]
    fn test_peek_reads_exp_without_secret() {
        let exp = Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap();
        let claims = TokenClaims::peek(&token_expiring_at(exp)).unwrap();
        assert_eq!(claims.expires_at(), Some(exp));
        assert!(claims.is_expired(exp));
        assert!(!claims.is_expired(exp - Duration::seconds(1)));
    }

    #[test]
    fn test_expired_session_is_cleared() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let store = MemorySessionStore::with_session(session(token_expiring_at(now - Duration::hours(1))));

        assert!(active_session(&store, &clock).unwrap().is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_valid_and_opaque_tokens_are_kept() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let clock = ManualClock::new(now);

        let store = MemorySessionStore::with_session(session(token_expiring_at(now + Duration::hours(1))));
        assert!(active_session(&store, &clock).unwrap().is_some());

        let opaque = MemorySessionStore::with_session(session("not-a-jwt".to_string()));
        assert!(active_session(&opaque, &clock).unwrap().is_some());
    }
}
