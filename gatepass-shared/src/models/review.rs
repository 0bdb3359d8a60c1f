use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReview {
    pub event_id: i64,
    pub rating: u8,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.rating) {
            return Err(format!("rating must be between 1 and 5, got {}", self.rating));
        }
        if self.comment.trim().is_empty() {
            return Err("comment must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_validation() {
        let mut review = NewReview { event_id: 1, rating: 5, comment: "Great show".to_string() };
        assert!(review.validate().is_ok());

        review.rating = 0;
        assert!(review.validate().is_err());

        review.rating = 4;
        review.comment = "   ".to_string();
        assert!(review.validate().is_err());
    }
}
