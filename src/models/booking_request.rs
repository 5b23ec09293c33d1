use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub id: String,
    pub booking_id: String,
    pub business_id: String,
    pub status: BookingRequestStatus,
    pub price: Option<f64>,
    pub notes: Option<String>,
    pub user_response: Option<String>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingRequestStatus {
    Pending,
    Accepted,
    Declined,
    Confirmed,
    Rejected,
}

impl BookingRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingRequestStatus::Pending => "PENDING",
            BookingRequestStatus::Accepted => "ACCEPTED",
            BookingRequestStatus::Declined => "DECLINED",
            BookingRequestStatus::Confirmed => "CONFIRMED",
            BookingRequestStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(BookingRequestStatus::Pending),
            "ACCEPTED" => Some(BookingRequestStatus::Accepted),
            "DECLINED" => Some(BookingRequestStatus::Declined),
            "CONFIRMED" => Some(BookingRequestStatus::Confirmed),
            "REJECTED" => Some(BookingRequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BookingRequestStatus) -> bool {
        use BookingRequestStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Declined) | (Accepted, Confirmed) | (Accepted, Rejected)
        )
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self,
            BookingRequestStatus::Pending
                | BookingRequestStatus::Accepted
                | BookingRequestStatus::Confirmed
        )
    }
}
