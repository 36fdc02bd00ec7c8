use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of a reviewer's viewing session on a check item —
/// used for audit-packet reconstruction and reviewer-diligence review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub view_started_at: DateTime<Utc>,
    pub view_ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub interactions: ViewInteractions,
    pub interaction_summary: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewInteractions {
    pub front_image_viewed: bool,
    pub back_image_viewed: bool,
    pub zoom_used: bool,
    pub magnifier_used: bool,
    pub history_compared: bool,
    pub ai_assists_viewed: bool,
    pub context_panel_viewed: bool,
}
