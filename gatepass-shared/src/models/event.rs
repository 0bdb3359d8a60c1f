use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A ticketed event as listed by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Per-ticket price in whole currency units
    pub price: i64,
    pub total_seats: i64,
    pub remaining_seats: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub organizer_id: Option<i64>,
    #[serde(default)]
    pub section_id: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Event {
    pub fn is_sold_out(&self) -> bool {
        self.remaining_seats <= 0
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }

    /// First and last calendar day a ticket can be used on
    pub fn attend_window(&self) -> (NaiveDate, NaiveDate) {
        (self.start_date.date_naive(), self.end_date.date_naive())
    }

    pub fn accepts_attend_date(&self, date: NaiveDate) -> bool {
        let (first, last) = self.attend_window();
        date >= first && date <= last
    }
}

/// Search and filter parameters for event listings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl EventQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Default::default()
        }
    }
}
