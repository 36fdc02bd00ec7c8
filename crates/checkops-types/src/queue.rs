use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Queue {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QueueAssignment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub queue_id: Uuid,
    pub user_id: Uuid,
    pub can_review: bool,
    pub can_approve: bool,
    pub max_concurrent_items: Option<i32>,
}
