use async_trait::async_trait;
use gatepass_core::session::active_session;
use gatepass_core::{BackendError, BackendResult, Clock, SessionStore, StorefrontBackend};
use gatepass_shared::{
    ApiEnvelope, AuthResponse, CreateTransactionRequest, DiscountQuote, Event, EventQuery, Location,
    LoginRequest, NewReview, Organizer, ProofUpload, RegisterRequest, Review, Section, Ticket,
    Transaction, UserProfile,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app_config::BackendConfig;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// REST client for the storefront backend
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl HttpBackend {
    pub fn new(
        config: &BackendConfig,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("gatepass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sessions,
            clock,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the stored bearer token, failing fast when there is none
    fn authorized(&self, req: RequestBuilder) -> BackendResult<RequestBuilder> {
        match active_session(self.sessions.as_ref(), self.clock.as_ref()) {
            Ok(Some(session)) => Ok(req.bearer_auth(session.token)),
            Ok(None) => Err(BackendError::Unauthorized("no active session".to_string())),
            Err(e) => Err(BackendError::Unauthorized(e.to_string())),
        }
    }

    /// Attach the bearer token if one is stored
    fn maybe_authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match active_session(self.sessions.as_ref(), self.clock.as_ref()) {
            Ok(Some(session)) => req.bearer_auth(session.token),
            _ => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> BackendResult<T> {
        let resp = req.send().await.map_err(|e| {
            error!("Request for {} failed: {}", what, e);
            BackendError::Transport(e.to_string())
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            error!("Reading response for {} failed: {}", what, e);
            BackendError::Transport(e.to_string())
        })?;

        if status.is_success() {
            debug!("{} -> {}", what, status);
            let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
                .map_err(|e| BackendError::Decode(format!("{}: {}", what, e)))?;
            return Ok(envelope.data);
        }

        let err = error_from_status(status, &body, what);
        warn!("{} rejected with {}: {}", what, status, err);
        Err(err)
    }
}

fn error_from_status(status: StatusCode, body: &str, what: &str) -> BackendError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(what.to_string()),
        _ => BackendError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl StorefrontBackend for HttpBackend {
    async fn get_event(&self, event_id: i64) -> BackendResult<Event> {
        let req = self.client.get(self.url(&format!("/events/{}", event_id)));
        self.send(req, &format!("Event {}", event_id)).await
    }

    async fn search_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>> {
        let req = self.client.get(self.url("/events/search")).query(query);
        self.send(req, "Event search").await
    }

    async fn filter_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>> {
        let req = self.client.get(self.url("/events/filter")).query(query);
        self.send(req, "Event filter").await
    }

    async fn past_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>> {
        let req = self.client.get(self.url("/events/past")).query(query);
        self.send(req, "Past events").await
    }

    async fn login(&self, req: &LoginRequest) -> BackendResult<AuthResponse> {
        let http = self.client.post(self.url("/auth/login")).json(req);
        // A 401 here means bad credentials, not a stale session
        let auth: AuthResponse = self.send(http, "Login").await.map_err(|e| match e {
            BackendError::Unauthorized(message) => BackendError::Rejected { status: 401, message },
            other => other,
        })?;
        info!("Logged in as {}", auth.user.email);
        Ok(auth)
    }

    async fn register(&self, req: &RegisterRequest) -> BackendResult<UserProfile> {
        let http = self.client.post(self.url("/auth/register")).json(req);
        self.send(http, "Registration").await
    }

    async fn get_transaction(&self, transaction_id: i64) -> BackendResult<Transaction> {
        let req = self.authorized(self.client.get(self.url(&format!("/transactions/{}", transaction_id))))?;
        self.send(req, &format!("Transaction {}", transaction_id)).await
    }

    async fn create_transaction(
        &self,
        req: &CreateTransactionRequest,
        idempotency_key: Uuid,
    ) -> BackendResult<Transaction> {
        let http = self.authorized(
            self.client
                .post(self.url("/transactions"))
                .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
                .json(req),
        )?;
        let tx: Transaction = self.send(http, "Transaction creation").await?;
        info!("Created transaction {} for event {} ({})", tx.id, tx.event_id, tx.status);
        Ok(tx)
    }

    async fn upload_payment_proof(
        &self,
        transaction_id: i64,
        proof: &ProofUpload,
    ) -> BackendResult<Transaction> {
        let part = Part::bytes(proof.bytes.clone())
            .file_name(proof.file_name.clone())
            .mime_str(&proof.content_type)
            .map_err(|e| BackendError::Decode(format!("invalid content type: {}", e)))?;
        let form = Form::new().part("payment_proof", part);

        let req = self.authorized(
            self.client
                .post(self.url(&format!("/transactions/{}/payment", transaction_id)))
                .multipart(form),
        )?;
        self.send(req, &format!("Payment proof for transaction {}", transaction_id)).await
    }

    async fn generate_free_tickets(&self, transaction_id: i64) -> BackendResult<Vec<Ticket>> {
        let req = self.authorized(
            self.client
                .post(self.url(&format!("/transactions/{}/generate-free-tickets", transaction_id))),
        )?;
        self.send(req, &format!("Free tickets for transaction {}", transaction_id)).await
    }

    async fn list_tickets(&self) -> BackendResult<Vec<Ticket>> {
        let req = self.authorized(self.client.get(self.url("/transactions/tickets")))?;
        self.send(req, "Tickets").await
    }

    async fn check_voucher(&self, code: &str, event_id: i64) -> BackendResult<DiscountQuote> {
        let req = self.authorized(
            self.client
                .get(self.url("/vouchers/check"))
                .query(&[("code", code.to_string()), ("event_id", event_id.to_string())]),
        )?;
        self.send(req, "Voucher").await
    }

    async fn check_coupon(&self, code: &str) -> BackendResult<DiscountQuote> {
        let req = self.authorized(self.client.get(self.url("/coupon/check")).query(&[("code", code)]))?;
        self.send(req, "Coupon").await
    }

    async fn get_organizer(&self, organizer_id: i64) -> BackendResult<Organizer> {
        let req = self.maybe_authorized(self.client.get(self.url(&format!("/admin/organizers/{}", organizer_id))));
        self.send(req, &format!("Organizer {}", organizer_id)).await
    }

    async fn list_locations(&self) -> BackendResult<Vec<Location>> {
        let req = self.maybe_authorized(self.client.get(self.url("/admin/locations")));
        self.send(req, "Locations").await
    }

    async fn list_sections(&self) -> BackendResult<Vec<Section>> {
        let req = self.maybe_authorized(self.client.get(self.url("/admin/sections")));
        self.send(req, "Sections").await
    }

    async fn create_review(&self, review: &NewReview) -> BackendResult<Review> {
        let req = self.authorized(self.client.post(self.url("/reviews")).json(review))?;
        self.send(req, "Review").await
    }
}
