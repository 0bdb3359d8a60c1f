use async_trait::async_trait;
use gatepass_shared::{
    AuthResponse, CreateTransactionRequest, DiscountQuote, Event, EventQuery, Location, LoginRequest,
    NewReview, Organizer, ProofUpload, RegisterRequest, Review, Section, Ticket, Transaction,
    UserProfile,
};
use uuid::Uuid;

/// Failure talking to the storefront backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Business-rule rejection, e.g. invalid voucher or insufficient seats
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Transport(_))
    }

    /// Message fit for showing the user as-is
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Transport(_) => "Could not reach the server, please try again".to_string(),
            BackendError::Unauthorized(_) => "Please log in to continue".to_string(),
            BackendError::NotFound(what) => format!("{} was not found", what),
            BackendError::Rejected { message, .. } => message.clone(),
            BackendError::Decode(_) => "The server sent an unexpected response".to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The backend REST API the storefront is a client of
#[async_trait]
pub trait StorefrontBackend: Send + Sync {
    async fn get_event(&self, event_id: i64) -> BackendResult<Event>;

    async fn search_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>>;

    async fn filter_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>>;

    async fn past_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>>;

    async fn login(&self, req: &LoginRequest) -> BackendResult<AuthResponse>;

    async fn register(&self, req: &RegisterRequest) -> BackendResult<UserProfile>;

    async fn get_transaction(&self, transaction_id: i64) -> BackendResult<Transaction>;

    /// Create a transaction; `idempotency_key` is forwarded as a header
    async fn create_transaction(
        &self,
        req: &CreateTransactionRequest,
        idempotency_key: Uuid,
    ) -> BackendResult<Transaction>;

    async fn upload_payment_proof(
        &self,
        transaction_id: i64,
        proof: &ProofUpload,
    ) -> BackendResult<Transaction>;

    async fn generate_free_tickets(&self, transaction_id: i64) -> BackendResult<Vec<Ticket>>;

    async fn list_tickets(&self) -> BackendResult<Vec<Ticket>>;

    async fn check_voucher(&self, code: &str, event_id: i64) -> BackendResult<DiscountQuote>;

    async fn check_coupon(&self, code: &str) -> BackendResult<DiscountQuote>;

    async fn get_organizer(&self, organizer_id: i64) -> BackendResult<Organizer>;

    async fn list_locations(&self) -> BackendResult<Vec<Location>>;

    async fn list_sections(&self) -> BackendResult<Vec<Section>>;

    async fn create_review(&self, review: &NewReview) -> BackendResult<Review>;
}
