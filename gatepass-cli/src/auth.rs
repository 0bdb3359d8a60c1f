use gatepass_core::session::active_session;
use gatepass_core::BackendError;
use gatepass_shared::{LoginRequest, RegisterRequest, Session, UserProfile};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<Session, AppError> {
    let auth = state
        .backend
        .login(&LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        })
        .await?;

    let session = Session::from(auth);
    state.sessions.save(&session)?;
    info!("Session stored for {}", session.user.email);
    Ok(session)
}

/// Create an account. The new user still has to log in.
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    referral_code: Option<String>,
) -> Result<UserProfile, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Usage("name must not be empty".to_string()));
    }
    let profile = state
        .backend
        .register(&RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            referral_code: referral_code.filter(|c| !c.trim().is_empty()),
        })
        .await?;
    info!("Registered {}", profile.email);
    Ok(profile)
}

/// Returns whether a session was stored
pub fn logout(state: &AppState) -> Result<bool, AppError> {
    let had_session = state.sessions.load()?.is_some();
    state.sessions.clear()?;
    Ok(had_session)
}

pub fn current_session(state: &AppState) -> Result<Option<Session>, AppError> {
    Ok(active_session(state.sessions.as_ref(), state.clock.as_ref())?)
}

pub fn require_session(state: &AppState) -> Result<Session, AppError> {
    current_session(state)?
        .ok_or_else(|| AppError::Backend(BackendError::Unauthorized("no active session".to_string())))
}
