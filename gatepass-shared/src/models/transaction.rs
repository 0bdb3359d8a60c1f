use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction status as reported by the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    WaitingForPayment,
    WaitingForAdminConfirmation,
    Confirmed,
    Rejected,
    Expired,
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::WaitingForPayment => "waiting_for_payment",
            TransactionStatus::WaitingForAdminConfirmation => "waiting_for_admin_confirmation",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Canceled => "canceled",
        }
    }

    /// No further transition is expected from the backend
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed
                | TransactionStatus::Rejected
                | TransactionStatus::Expired
                | TransactionStatus::Canceled
        )
    }

    pub fn accepts_payment_proof(&self) -> bool {
        *self == TransactionStatus::WaitingForPayment
    }

    /// Position along the happy path, `None` for failure states
    pub fn progress_rank(&self) -> Option<u8> {
        match self {
            TransactionStatus::WaitingForPayment => Some(0),
            TransactionStatus::WaitingForAdminConfirmation => Some(1),
            TransactionStatus::Confirmed => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    EWallet,
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::CreditCard => "credit_card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bank_transfer" | "bank" => Ok(PaymentMethod::BankTransfer),
            "e_wallet" | "ewallet" => Ok(PaymentMethod::EWallet),
            "credit_card" | "card" => Ok(PaymentMethod::CreditCard),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// Server-owned purchase record, cached client-side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub quantity: u32,
    pub attend_date: NaiveDate,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub voucher_code: Option<String>,
    #[serde(default)]
    pub voucher_discount: i64,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub coupon_discount: i64,
    #[serde(default)]
    pub points_used: i64,
    pub total_pay_amount: i64,
    pub status: TransactionStatus,
    #[serde(default)]
    pub payment_proof_url: Option<String>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_free(&self) -> bool {
        self.total_pay_amount == 0
    }

    /// Free, confirmed and still without issued tickets
    pub fn needs_free_tickets(&self) -> bool {
        self.is_free() && self.tickets.is_empty() && self.status == TransactionStatus::Confirmed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub transaction_id: i64,
    pub event_id: i64,
    pub code: String,
    #[serde(default)]
    pub attend_date: Option<NaiveDate>,
    #[serde(default)]
    pub event_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTransactionRequest {
    pub event_id: i64,
    pub quantity: u32,
    pub attend_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub points_used: i64,
}

/// Proof-of-payment file sent as a multipart part
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProofUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the content type from the file extension
    pub fn from_file_name(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let lower = file_name.to_ascii_lowercase();
        let content_type = if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            "image/jpeg"
        } else if lower.ends_with(".pdf") {
            "application/pdf"
        } else {
            "application/octet-stream"
        };
        Self::new(file_name, content_type, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let status: TransactionStatus =
            serde_json::from_str("\"waiting_for_admin_confirmation\"").unwrap();
        assert_eq!(status, TransactionStatus::WaitingForAdminConfirmation);
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Canceled).unwrap(),
            "\"canceled\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TransactionStatus::WaitingForPayment.is_terminal());
        assert!(!TransactionStatus::WaitingForAdminConfirmation.is_terminal());
        assert!(TransactionStatus::Confirmed.is_terminal());
        assert!(TransactionStatus::Expired.is_terminal());
        assert!(TransactionStatus::WaitingForPayment.accepts_payment_proof());
        assert!(!TransactionStatus::WaitingForAdminConfirmation.accepts_payment_proof());
    }

    #[test]
    fn test_transaction_defaults_missing_fields() {
        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "id": 7,
            "event_id": 3,
            "user_id": 1,
            "quantity": 2,
            "attend_date": "2026-11-01",
            "total_pay_amount": 0,
            "status": "confirmed",
            "created_at": "2026-10-14T08:00:00Z",
            "updated_at": "2026-10-14T08:00:00Z"
        }))
        .unwrap();

        assert!(tx.tickets.is_empty());
        assert_eq!(tx.voucher_discount, 0);
        assert!(tx.needs_free_tickets());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("bank-transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
        assert_eq!("ewallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert!("cash".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_proof_content_type() {
        let proof = ProofUpload::from_file_name("receipt.JPG", vec![1, 2, 3]);
        assert_eq!(proof.content_type, "image/jpeg");
    }
}
