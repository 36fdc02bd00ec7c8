use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    New,
    InReview,
    PendingDualControl,
    Escalated,
    Approved,
    Returned,
    Rejected,
    Closed,
}

impl CheckStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Returned | Self::Rejected | Self::Closed)
    }

    /// Valid next states for this status. The workflow state machine of
    /// §4.7: new -> in_review -> {approved,returned,rejected,escalated} |
    /// pending_dual_control -> {approved,returned,rejected,escalated};
    /// escalated -> in_review|pending_dual_control|approved|returned|rejected.
    /// There is no separate "start review" operation in the API — the
    /// first decision posted against a `new` item *is* the review, so
    /// `new` accepts every outcome `in_review` does.
    pub fn allowed_transitions(self) -> &'static [CheckStatus] {
        use CheckStatus::*;
        match self {
            New | InReview => &[InReview, Approved, Returned, Rejected, Escalated, PendingDualControl],
            PendingDualControl => &[Approved, Returned, Rejected, Escalated],
            Escalated => &[InReview, PendingDualControl, Approved, Returned, Rejected],
            Approved | Returned | Rejected | Closed => &[],
        }
    }

    pub fn can_transition_to(self, next: CheckStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn validate_transition(self, next: CheckStatus) -> Result<(), AppError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Consumer,
    Business,
    Commercial,
    NonProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Drawn on the processing institution's own customer.
    OnUs,
    /// Drawn on a different institution.
    Transit,
}

/// A presented check item, scoped to a tenant via `(tenant_id, external_item_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub external_item_id: String,
    pub source_system: String,

    pub amount: Decimal,
    pub currency: String,
    pub account_id: String,
    pub account_number_masked: String,
    pub account_type: AccountType,
    pub routing_number: Option<String>,
    pub check_number: Option<String>,
    pub payee_name: Option<String>,
    pub memo: Option<String>,

    pub presented_date: NaiveDate,
    pub check_date: Option<NaiveDate>,
    pub process_date: Option<NaiveDate>,

    pub micr_line: Option<String>,
    pub micr_account: Option<String>,
    pub micr_routing: Option<String>,
    pub micr_check_number: Option<String>,

    pub item_type: ItemType,
    pub status: CheckStatus,
    pub risk_level: RiskLevel,
    pub priority: i32,

    pub context: AccountContext,
    pub advisory: AdvisoryFields,

    pub assigned_reviewer_id: Option<Uuid>,
    pub assigned_approver_id: Option<Uuid>,
    pub queue_id: Option<Uuid>,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub sla_breached: bool,

    pub requires_dual_control: bool,
    pub pending_dual_control_decision_id: Option<Uuid>,
    pub dual_control_reason: Option<String>,
    pub policy_version_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived account-context snapshot captured at ingest time; used by the
/// policy engine and the risk advisor. All fields are optional because
/// the upstream core-banking feed may not supply every statistic for
/// every account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountContext {
    pub account_tenure_days: Option<i32>,
    pub current_balance: Option<Decimal>,
    pub average_balance_30d: Option<Decimal>,
    pub avg_check_amount_30d: Option<Decimal>,
    pub avg_check_amount_90d: Option<Decimal>,
    pub avg_check_amount_365d: Option<Decimal>,
    pub check_std_dev_30d: Option<Decimal>,
    pub max_check_amount_90d: Option<Decimal>,
    pub check_frequency_30d: Option<i32>,
    pub check_count_7d: Option<i32>,
    pub check_count_14d: Option<i32>,
    pub total_check_amount_7d: Option<Decimal>,
    pub total_check_amount_14d: Option<Decimal>,
    pub returned_item_count_90d: Option<i32>,
    pub exception_count_90d: Option<i32>,
    pub overdraft_count_30d: Option<i32>,
    pub overdraft_count_90d: Option<i32>,
    pub nsf_count_90d: Option<i32>,
    pub last_overdraft_date: Option<NaiveDate>,
    pub relationship_tenure_years: Option<Decimal>,
    pub is_payroll_account: Option<bool>,
    pub has_direct_deposit: Option<bool>,
    pub deposit_regularity_score: Option<Decimal>,
    pub last_check_number_used: Option<i64>,
    pub check_number_gap: Option<i32>,
    pub is_duplicate_check_number: Option<bool>,
    pub is_out_of_sequence: Option<bool>,
    pub check_age_days: Option<i32>,
    pub is_stale_dated: Option<bool>,
    pub is_post_dated: Option<bool>,
    pub has_micr_anomaly: Option<bool>,
    pub micr_confidence_score: Option<Decimal>,
    pub has_alteration_flag: Option<bool>,
    pub signature_match_score: Option<Decimal>,
    pub prior_review_count: Option<i32>,
    pub prior_approval_count: Option<i32>,
    pub prior_rejection_count: Option<i32>,
    pub last_review_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisoryFields {
    pub has_ai_flags: bool,
    pub ai_risk_score: Option<Decimal>,
    pub risk_flags: Vec<String>,
    pub upstream_flags: Vec<String>,
    pub ai_model_id: Option<String>,
    pub ai_model_version: Option<String>,
    pub ai_analyzed_at: Option<DateTime<Utc>>,
    pub ai_recommendation: Option<String>,
    pub ai_confidence: Option<f64>,
    pub ai_explanation: Option<String>,
    pub ai_risk_factors: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Front,
    Back,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckImage {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Uuid,
    pub image_type: ImageType,
    pub external_image_id: String,
    pub storage_path: String,
    pub content_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub dpi: Option<i32>,
    pub thumbnail_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Prior cleared/returned item on the same account, used for duplicate
/// check-number and signature/stock comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckHistory {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: String,
    pub check_number: Option<String>,
    pub amount: Decimal,
    pub cleared_date: Option<NaiveDate>,
    pub signature_hash: Option<String>,
    pub check_stock_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Pagination + predicate for listing and adjacent-item navigation.
/// Ordering is always `(priority desc, presented_date asc, id asc)`.
#[derive(Debug, Clone, Default)]
pub struct CheckItemFilter {
    pub status: Option<Vec<CheckStatus>>,
    pub risk_level: Option<Vec<RiskLevel>>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub queue_id: Option<Uuid>,
    pub assigned_reviewer_id: Option<Uuid>,
    pub assigned_approver_id: Option<Uuid>,
    pub has_ai_flags: Option<bool>,
    pub sla_breached: Option<bool>,
    pub presented_date_from: Option<NaiveDate>,
    pub presented_date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, page_size: 50 }
    }
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.page_size.max(1)
    }
}
