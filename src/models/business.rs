use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: String,
    pub name: String,
    pub email: String,
    pub contact_person: String,
    pub phone: String,
    pub zip_code: String,
    pub created_at: NaiveDateTime,
}
