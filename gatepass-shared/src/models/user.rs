use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Redeemable loyalty points balance
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// Bearer token and minimal profile kept between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

impl From<AuthResponse> for Session {
    fn from(resp: AuthResponse) -> Self {
        Session {
            token: resp.token,
            user: resp.user,
        }
    }
}

/// Discount amount granted by a voucher or coupon check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountQuote {
    pub code: String,
    pub discount: i64,
}
