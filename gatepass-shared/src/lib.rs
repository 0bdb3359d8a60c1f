pub mod models;

pub use models::ApiEnvelope;

pub use models::checkout::{CheckoutState, PriceBreakdown};
pub use models::event::{Event, EventQuery};
pub use models::events::{Route, StatusChangedEvent};
pub use models::reference::{Location, Organizer, Section};
pub use models::review::{NewReview, Review};
pub use models::transaction::{
    CreateTransactionRequest, PaymentMethod, ProofUpload, Ticket, Transaction, TransactionStatus,
};
pub use models::user::{AuthResponse, DiscountQuote, LoginRequest, RegisterRequest, Session, UserProfile};
