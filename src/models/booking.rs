use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub service_type: String,
    pub date_time: NaiveDateTime,
    pub zip_code: String,
    pub status: BookingStatus,
    pub selected_request_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "ACCEPTED" => Some(BookingStatus::Accepted),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimePreference {
    Asap,
    Between,
    After,
}

impl TimePreference {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asap" => Some(TimePreference::Asap),
            "between" => Some(TimePreference::Between),
            "after" => Some(TimePreference::After),
            _ => None,
        }
    }

    pub fn resolve(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today_at = |hour: u32| {
            NaiveTime::from_hms_opt(hour, 0, 0)
                .map(|t| now.date().and_time(t))
                .unwrap_or(now)
        };

        match self {
            TimePreference::Asap => now + Duration::hours(1),
            TimePreference::Between => today_at(9).max(now),
            TimePreference::After => today_at(12).max(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_asap_is_one_hour_out() {
        let now = dt("2025-06-16 10:15");
        assert_eq!(TimePreference::Asap.resolve(now), dt("2025-06-16 11:15"));
    }

    #[test]
    fn test_between_clamps_to_nine_or_now() {
        assert_eq!(
            TimePreference::Between.resolve(dt("2025-06-16 07:30")),
            dt("2025-06-16 09:00")
        );
        assert_eq!(
            TimePreference::Between.resolve(dt("2025-06-16 10:30")),
            dt("2025-06-16 10:30")
        );
    }

    #[test]
    fn test_after_clamps_to_noon_or_now() {
        assert_eq!(
            TimePreference::After.resolve(dt("2025-06-16 08:00")),
            dt("2025-06-16 12:00")
        );
        assert_eq!(
            TimePreference::After.resolve(dt("2025-06-16 15:45")),
            dt("2025-06-16 15:45")
        );
    }

    #[test]
    fn test_unknown_preference_rejected() {
        assert_eq!(TimePreference::parse(" ASAP "), Some(TimePreference::Asap));
        assert_eq!(TimePreference::parse("tomorrow"), None);
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("cancelled"), Some(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::parse("done"), None);
    }
}
