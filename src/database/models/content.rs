use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Guestbook entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub message: String,
    pub is_approved: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub name: String,
    pub email: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageApproval {
    pub is_approved: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub approved: Option<bool>,
}

/// Timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Memory {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub memory_content: Option<String>,
    pub date: Option<NaiveDate>,
    pub images: Option<Vec<String>>,
    pub comment: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Body of memory create and update requests.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryInput {
    pub title: String,
    pub description: Option<String>,
    pub memory_content: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub images: Vec<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: i32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub visit_date: Option<NaiveDateTime>,
    pub page_url: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVisit {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub page_url: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitFilter {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(rename = "start_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "end_date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageCount {
    pub page_url: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitTotals {
    pub total: i64,
    pub recent: i64,
    pub unique: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    pub stats: VisitTotals,
    pub daily: Vec<DailyCount>,
    pub top_pages: Vec<PageCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_visits: i64,
    pub today_visits: i64,
    pub unique_visitors: i64,
    pub total_messages: i64,
    pub pending_messages: i64,
    pub total_memories: i64,
    pub total_users: i64,
}
