use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::clock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: AdminRole,
    #[serde(with = "clock::timestamp")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Admin,
    Superadmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Admin => "admin",
            AdminRole::Superadmin => "superadmin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "superadmin" => AdminRole::Superadmin,
            _ => AdminRole::Admin,
        }
    }
}
