use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::check_item::{AccountType, CheckItem, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub status: PolicyStatus,
    pub is_default: bool,
    pub applies_to_account_types: Option<Vec<AccountType>>,
}

#[derive(Debug, Clone)]
pub struct PolicyVersion {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub effective_date: DateTime<Utc>,
    pub is_current: bool,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Threshold,
    DualControl,
    Escalation,
    Routing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    In,
    NotIn,
    Contains,
    Between,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    RequireDualControl,
    SetRiskLevel { level: RiskLevel },
    RouteToQueue { queue_id: Uuid },
    RequireReason { category: String },
    AddFlag { flag: String },
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub id: Uuid,
    pub name: String,
    pub rule_type: RuleType,
    pub priority: i32,
    pub is_enabled: bool,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub amount_threshold: Option<rust_decimal::Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Result of evaluating a policy version's rules against a CheckItem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyEvaluationResult {
    pub policy_id: Option<Uuid>,
    pub policy_version_id: Option<Uuid>,
    pub rules_triggered: Vec<String>,
    pub requires_dual_control: bool,
    pub risk_level: Option<RiskLevel>,
    pub routing_queue_id: Option<Uuid>,
    pub required_reason_categories: Vec<String>,
    pub flags: Vec<String>,
}

/// Flattened, read-only view of a CheckItem exposed to condition
/// evaluation, including the four computed ratio fields. Building this
/// once per evaluation keeps the field lookup in `evaluate_condition`
/// a simple match rather than repeated optional-chaining on the item.
#[derive(Debug, Clone)]
pub struct PolicyFieldView {
    pub amount: f64,
    pub account_type: AccountType,
    pub item_type_is_on_us: bool,
    pub account_tenure_days: Option<f64>,
    pub current_balance: Option<f64>,
    pub avg_check_amount_30d: Option<f64>,
    pub avg_check_amount_90d: Option<f64>,
    pub max_check_amount_90d: Option<f64>,
    pub total_check_amount_7d: Option<f64>,
    pub returned_item_count_90d: Option<f64>,
    pub exception_count_90d: Option<f64>,
    pub overdraft_count_90d: Option<f64>,
    pub nsf_count_90d: Option<f64>,
    pub is_duplicate_check_number: Option<bool>,
    pub is_out_of_sequence: Option<bool>,
    pub is_stale_dated: Option<bool>,
    pub is_post_dated: Option<bool>,
    pub has_micr_anomaly: Option<bool>,
    pub has_alteration_flag: Option<bool>,
    pub payee_name: Option<String>,
    pub memo: Option<String>,

    /// `amount / avg_check_amount_30d`; NULL when the denominator is
    /// absent or zero.
    pub amount_vs_avg_ratio: Option<f64>,
    /// `amount / max_check_amount_90d`.
    pub amount_vs_max_ratio: Option<f64>,
    /// `amount / current_balance`.
    pub amount_vs_balance_ratio: Option<f64>,
    /// `amount / total_check_amount_7d`.
    pub velocity_7d_ratio: Option<f64>,
}

fn ratio(numerator: f64, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(d) if d != 0.0 => Some(numerator / d),
        _ => None,
    }
}

impl PolicyFieldView {
    pub fn from_item(item: &CheckItem) -> Self {
        use rust_decimal::prelude::ToPrimitive;
        let amount = item.amount.to_f64().unwrap_or(0.0);
        let ctx = &item.context;
        let current_balance = ctx.current_balance.and_then(|d| d.to_f64());
        let avg_30 = ctx.avg_check_amount_30d.and_then(|d| d.to_f64());
        let max_90 = ctx.max_check_amount_90d.and_then(|d| d.to_f64());
        let total_7d = ctx.total_check_amount_7d.and_then(|d| d.to_f64());

        Self {
            amount,
            account_type: item.account_type,
            item_type_is_on_us: matches!(item.item_type, crate::check_item::ItemType::OnUs),
            account_tenure_days: ctx.account_tenure_days.map(|v| v as f64),
            current_balance,
            avg_check_amount_30d: avg_30,
            avg_check_amount_90d: ctx.avg_check_amount_90d.and_then(|d| d.to_f64()),
            max_check_amount_90d: max_90,
            total_check_amount_7d: total_7d,
            returned_item_count_90d: ctx.returned_item_count_90d.map(|v| v as f64),
            exception_count_90d: ctx.exception_count_90d.map(|v| v as f64),
            overdraft_count_90d: ctx.overdraft_count_90d.map(|v| v as f64),
            nsf_count_90d: ctx.nsf_count_90d.map(|v| v as f64),
            is_duplicate_check_number: ctx.is_duplicate_check_number,
            is_out_of_sequence: ctx.is_out_of_sequence,
            is_stale_dated: ctx.is_stale_dated,
            is_post_dated: ctx.is_post_dated,
            has_micr_anomaly: ctx.has_micr_anomaly,
            has_alteration_flag: ctx.has_alteration_flag,
            payee_name: item.payee_name.clone(),
            memo: item.memo.clone(),
            amount_vs_avg_ratio: ratio(amount, avg_30),
            amount_vs_max_ratio: ratio(amount, max_90),
            amount_vs_balance_ratio: ratio(amount, current_balance),
            velocity_7d_ratio: ratio(amount, total_7d),
        }
    }

    /// Looks up a condition field by name. Numeric fields return `None`
    /// when the underlying statistic is absent, which `evaluate_condition`
    /// treats as the condition being false (never a panic, never a
    /// default-zero substitution).
    fn numeric_field(&self, field: &str) -> Option<f64> {
        match field {
            "amount" => Some(self.amount),
            "account_tenure_days" => self.account_tenure_days,
            "current_balance" => self.current_balance,
            "avg_check_amount_30d" => self.avg_check_amount_30d,
            "avg_check_amount_90d" => self.avg_check_amount_90d,
            "max_check_amount_90d" => self.max_check_amount_90d,
            "total_check_amount_7d" => self.total_check_amount_7d,
            "returned_item_count_90d" => self.returned_item_count_90d,
            "exception_count_90d" => self.exception_count_90d,
            "overdraft_count_90d" => self.overdraft_count_90d,
            "nsf_count_90d" => self.nsf_count_90d,
            "amount_vs_avg_ratio" => self.amount_vs_avg_ratio,
            "amount_vs_max_ratio" => self.amount_vs_max_ratio,
            "amount_vs_balance_ratio" => self.amount_vs_balance_ratio,
            "velocity_7d_ratio" => self.velocity_7d_ratio,
            _ => None,
        }
    }

    fn string_field(&self, field: &str) -> Option<String> {
        match field {
            "account_type" => Some(self.account_type.to_string()),
            "payee_name" => self.payee_name.clone(),
            "memo" => self.memo.clone(),
            _ => None,
        }
    }

    fn bool_field(&self, field: &str) -> Option<bool> {
        match field {
            "is_duplicate_check_number" => self.is_duplicate_check_number,
            "is_out_of_sequence" => self.is_out_of_sequence,
            "is_stale_dated" => self.is_stale_dated,
            "is_post_dated" => self.is_post_dated,
            "has_micr_anomaly" => self.has_micr_anomaly,
            "has_alteration_flag" => self.has_alteration_flag,
            "item_type_is_on_us" => Some(self.item_type_is_on_us),
            _ => None,
        }
    }
}

/// Evaluates one condition against a field view. Numeric comparisons are
/// always performed in `f64` (currency values are upcast from
/// `rust_decimal::Decimal`) — this operates on ratios and thresholds, not
/// exact cents, so the precision loss is intentional.
pub fn evaluate_condition(view: &PolicyFieldView, cond: &RuleCondition) -> bool {
    use Operator::*;
    match cond.operator {
        Equals | NotEquals | Contains => {
            let lhs = view
                .string_field(&cond.field)
                .or_else(|| view.bool_field(&cond.field).map(|b| b.to_string()))
                .or_else(|| view.numeric_field(&cond.field).map(|n| n.to_string()));
            let Some(lhs) = lhs else { return false };
            let rhs = match cond.value.as_str() {
                Some(s) => s.to_string(),
                None => cond.value.to_string(),
            };
            match cond.operator {
                Equals => lhs == rhs,
                NotEquals => lhs != rhs,
                Contains => lhs.to_lowercase().contains(&rhs.to_lowercase()),
                _ => unreachable!(),
            }
        }
        In | NotIn => {
            let lhs = view
                .string_field(&cond.field)
                .or_else(|| view.numeric_field(&cond.field).map(|n| n.to_string()));
            let Some(lhs) = lhs else { return false };
            let list: Vec<String> = match cond.value.as_array() {
                Some(arr) => arr
                    .iter()
                    .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
                    .collect(),
                None => return false,
            };
            let present = list.iter().any(|v| v == &lhs);
            if matches!(cond.operator, In) { present } else { !present }
        }
        GreaterThan | LessThan | GreaterOrEqual | LessOrEqual => {
            let Some(lhs) = view.numeric_field(&cond.field) else { return false };
            let Some(rhs) = cond.value.as_f64() else { return false };
            match cond.operator {
                GreaterThan => lhs > rhs,
                LessThan => lhs < rhs,
                GreaterOrEqual => lhs >= rhs,
                LessOrEqual => lhs <= rhs,
                _ => unreachable!(),
            }
        }
        Between => {
            let Some(lhs) = view.numeric_field(&cond.field) else { return false };
            let Some(bounds) = cond.value.as_array() else { return false };
            if bounds.len() != 2 {
                return false;
            }
            let (Some(lo), Some(hi)) = (bounds[0].as_f64(), bounds[1].as_f64()) else { return false };
            lhs >= lo && lhs <= hi
        }
    }
}

fn severity_rank(level: RiskLevel) -> u8 {
    match level {
        RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High => 2,
        RiskLevel::Critical => 3,
    }
}

/// Evaluates every enabled rule in a version (stable order
/// `priority desc, created_at asc`) against the item, conjunctively
/// within a rule, independently across rules (no short-circuit), and
/// folds the triggered actions into one result.
///
/// `set_risk_level` uses severity-max across all triggering rules — a
/// deliberate strengthening of the looser last-write-wins behavior found
/// in the reference implementation this was distilled from (see
/// DESIGN.md).
pub fn evaluate_policy_version(version: &PolicyVersion, item: &CheckItem) -> PolicyEvaluationResult {
    let view = PolicyFieldView::from_item(item);
    let mut rules: Vec<&PolicyRule> = version.rules.iter().filter(|r| r.is_enabled).collect();
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));

    let mut result = PolicyEvaluationResult {
        policy_id: None,
        policy_version_id: Some(version.id),
        ..Default::default()
    };

    for rule in rules {
        if !rule.conditions.iter().all(|c| evaluate_condition(&view, c)) {
            continue;
        }
        result.rules_triggered.push(rule.name.clone());
        for action in &rule.actions {
            match action {
                RuleAction::RequireDualControl => result.requires_dual_control = true,
                RuleAction::SetRiskLevel { level } => {
                    result.risk_level = Some(match result.risk_level {
                        Some(existing) if severity_rank(existing) >= severity_rank(*level) => existing,
                        _ => *level,
                    });
                }
                RuleAction::RouteToQueue { queue_id } => result.routing_queue_id = Some(*queue_id),
                RuleAction::RequireReason { category } => {
                    if !result.required_reason_categories.contains(category) {
                        result.required_reason_categories.push(category.clone());
                    }
                }
                RuleAction::AddFlag { flag } => {
                    if !result.flags.contains(flag) {
                        result.flags.push(flag.clone());
                    }
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_is_inclusive_on_both_bounds() {
        let view = PolicyFieldView {
            amount: 100.0,
            account_type: AccountType::Consumer,
            item_type_is_on_us: true,
            account_tenure_days: None,
            current_balance: None,
            avg_check_amount_30d: None,
            avg_check_amount_90d: None,
            max_check_amount_90d: None,
            total_check_amount_7d: None,
            returned_item_count_90d: None,
            exception_count_90d: None,
            overdraft_count_90d: None,
            nsf_count_90d: None,
            is_duplicate_check_number: None,
            is_out_of_sequence: None,
            is_stale_dated: None,
            is_post_dated: None,
            has_micr_anomaly: None,
            has_alteration_flag: None,
            payee_name: None,
            memo: None,
            amount_vs_avg_ratio: None,
            amount_vs_max_ratio: None,
            amount_vs_balance_ratio: None,
            velocity_7d_ratio: None,
        };
        let cond = RuleCondition {
            field: "amount".into(),
            operator: Operator::Between,
            value: serde_json::json!([100.0, 200.0]),
        };
        assert!(evaluate_condition(&view, &cond));
        let cond_hi = RuleCondition {
            field: "amount".into(),
            operator: Operator::Between,
            value: serde_json::json!([0.0, 100.0]),
        };
        assert!(evaluate_condition(&view, &cond_hi));
    }

    #[test]
    fn missing_denominator_evaluates_false() {
        let view = PolicyFieldView {
            amount: 100.0,
            account_type: AccountType::Consumer,
            item_type_is_on_us: true,
            account_tenure_days: None,
            current_balance: None,
            avg_check_amount_30d: None,
            avg_check_amount_90d: None,
            max_check_amount_90d: None,
            total_check_amount_7d: None,
            returned_item_count_90d: None,
            exception_count_90d: None,
            overdraft_count_90d: None,
            nsf_count_90d: None,
            is_duplicate_check_number: None,
            is_out_of_sequence: None,
            is_stale_dated: None,
            is_post_dated: None,
            has_micr_anomaly: None,
            has_alteration_flag: None,
            payee_name: None,
            memo: None,
            amount_vs_avg_ratio: None,
            amount_vs_max_ratio: None,
            amount_vs_balance_ratio: None,
            velocity_7d_ratio: None,
        };
        let cond = RuleCondition {
            field: "amount_vs_avg_ratio".into(),
            operator: Operator::GreaterThan,
            value: serde_json::json!(3.0),
        };
        assert!(!evaluate_condition(&view, &cond));
    }

    #[test]
    fn severity_max_wins_across_rules() {
        let now = Utc::now();
        let make_rule = |name: &str, level: RiskLevel, priority: i32| PolicyRule {
            id: Uuid::new_v4(),
            name: name.into(),
            rule_type: RuleType::Escalation,
            priority,
            is_enabled: true,
            conditions: vec![],
            actions: vec![RuleAction::SetRiskLevel { level }],
            amount_threshold: None,
            created_at: now,
        };
        let version = PolicyVersion {
            id: Uuid::new_v4(),
            policy_id: Uuid::new_v4(),
            effective_date: now,
            is_current: true,
            rules: vec![
                make_rule("low-first", RiskLevel::Low, 100),
                make_rule("high-second", RiskLevel::High, 50),
            ],
        };
        let item = test_item();
        let result = evaluate_policy_version(&version, &item);
        assert_eq!(result.risk_level, Some(RiskLevel::High));
    }

    fn test_item() -> CheckItem {
        use crate::check_item::*;
        CheckItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            external_item_id: "EXT-1".into(),
            source_system: "core".into(),
            amount: rust_decimal::Decimal::new(10000, 2),
            currency: "USD".into(),
            account_id: "A1".into(),
            account_number_masked: "****1234".into(),
            account_type: AccountType::Consumer,
            routing_number: None,
            check_number: None,
            payee_name: None,
            memo: None,
            presented_date: chrono::Utc::now().date_naive(),
            check_date: None,
            process_date: None,
            micr_line: None,
            micr_account: None,
            micr_routing: None,
            micr_check_number: None,
            item_type: ItemType::OnUs,
            status: CheckStatus::New,
            risk_level: RiskLevel::Low,
            priority: 0,
            context: AccountContext::default(),
            advisory: AdvisoryFields::default(),
            assigned_reviewer_id: None,
            assigned_approver_id: None,
            queue_id: None,
            sla_due_at: None,
            sla_breached: false,
            requires_dual_control: false,
            pending_dual_control_decision_id: None,
            dual_control_reason: None,
            policy_version_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
