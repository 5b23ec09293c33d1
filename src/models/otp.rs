use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Signup,
    Login,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::Login => "login",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(OtpPurpose::Signup),
            "login" => Some(OtpPurpose::Login),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: String,
    pub email: String,
    pub otp: String,
    pub purpose: OtpPurpose,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub attempts: i64,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}
