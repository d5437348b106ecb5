use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One resolution event. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: i64,
    pub short_code: String,
    pub ip_address: String,
    pub user_agent: String,
    pub accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessLog {
    pub short_code: String,
    pub ip_address: String,
    pub user_agent: String,
}

/// Who followed a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor {
    pub ip_address: String,
    pub user_agent: String,
}

impl Visitor {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn access_to(&self, short_code: &str) -> NewAccessLog {
        NewAccessLog {
            short_code: short_code.to_string(),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessLogQueryParams {
    pub short_code: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueVisitorsDto {
    pub short_code: String,
    pub unique_visitors: i64,
}
