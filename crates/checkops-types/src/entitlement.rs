use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::check_item::{AccountType, CheckItem, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntitlementType {
    Review,
    Approve,
    Override,
}

#[derive(Debug, Clone)]
pub struct ApprovalEntitlement {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub entitlement_type: EntitlementType,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub allowed_account_types: Option<Vec<AccountType>>,
    pub allowed_queue_ids: Option<Vec<Uuid>>,
    pub allowed_risk_levels: Option<Vec<RiskLevel>>,
    pub allowed_business_lines: Option<Vec<String>>,
    pub is_active: bool,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct EntitlementCheckResult {
    pub allowed: bool,
    pub entitlement_id: Option<Uuid>,
    pub denial_reason: Option<String>,
}

impl EntitlementCheckResult {
    fn denied(reason: impl Into<String>) -> Self {
        Self { allowed: false, entitlement_id: None, denial_reason: Some(reason.into()) }
    }

    fn allowed(entitlement_id: Uuid) -> Self {
        Self { allowed: true, entitlement_id: Some(entitlement_id), denial_reason: None }
    }
}

/// Checks one entitlement against an item. Order mirrors the reference
/// implementation's field-by-field narrowing: amount bounds, account
/// type, queue, risk level, then tenant. The tenant comparison is
/// enforced here (the source this was distilled from stubbed it out);
/// it is always available because entitlements are only ever resolved
/// and compared within a single tenant's `TenantContext`.
fn check_single_entitlement(ent: &ApprovalEntitlement, item: &CheckItem) -> Result<(), String> {
    if let Some(min) = ent.min_amount {
        if item.amount < min {
            return Err(format!("amount {} is below minimum {}", item.amount, min));
        }
    }
    if let Some(max) = ent.max_amount {
        if item.amount > max {
            return Err(format!("amount {} exceeds maximum {}", item.amount, max));
        }
    }
    if let Some(types) = &ent.allowed_account_types {
        if !types.contains(&item.account_type) {
            return Err(format!("account type {} not covered", item.account_type));
        }
    }
    if let Some(queues) = &ent.allowed_queue_ids {
        match item.queue_id {
            Some(q) if queues.contains(&q) => {}
            _ => return Err("queue not covered".into()),
        }
    }
    if let Some(levels) = &ent.allowed_risk_levels {
        if !levels.contains(&item.risk_level) {
            return Err(format!("risk level {} not covered", item.risk_level));
        }
    }
    if ent.tenant_id != item.tenant_id {
        return Err("entitlement does not apply to this tenant".into());
    }
    Ok(())
}

fn check_against_item(entitlements: &[ApprovalEntitlement], item: &CheckItem, action_type: &str) -> EntitlementCheckResult {
    let mut reasons: Vec<String> = Vec::new();
    for ent in entitlements {
        match check_single_entitlement(ent, item) {
            Ok(()) => return EntitlementCheckResult::allowed(ent.id),
            Err(reason) => {
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
            }
        }
    }
    EntitlementCheckResult::denied(format!(
        "No {action_type} entitlement covers this item: {}",
        reasons.join("; ")
    ))
}

/// `review` has a default-allow fallback when the caller holds a
/// `check_item:review` permission and has no explicit entitlements at
/// all; `approve` and `override` are explicit-only — an empty
/// entitlement list always denies.
pub fn check_review_entitlement(entitlements: &[ApprovalEntitlement], item: &CheckItem, has_review_permission: bool) -> EntitlementCheckResult {
    if entitlements.is_empty() {
        return if has_review_permission {
            EntitlementCheckResult { allowed: true, entitlement_id: None, denial_reason: None }
        } else {
            EntitlementCheckResult::denied("No review entitlement found")
        };
    }
    check_against_item(entitlements, item, "review")
}

pub fn check_approval_entitlement(entitlements: &[ApprovalEntitlement], item: &CheckItem) -> EntitlementCheckResult {
    if entitlements.is_empty() {
        return EntitlementCheckResult::denied("No approval entitlement found");
    }
    check_against_item(entitlements, item, "approve")
}

pub fn check_override_entitlement(entitlements: &[ApprovalEntitlement], item: &CheckItem) -> EntitlementCheckResult {
    if entitlements.is_empty() {
        return EntitlementCheckResult::denied("No override entitlement found");
    }
    check_against_item(entitlements, item, "override")
}

/// Highest cap across the user's active approval entitlements, or `None`
/// if any entitlement is unbounded (no `max_amount`).
pub fn max_approval_amount(entitlements: &[ApprovalEntitlement]) -> Option<Decimal> {
    if entitlements.iter().any(|e| e.max_amount.is_none()) {
        return None;
    }
    entitlements.iter().filter_map(|e| e.max_amount).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_item::*;

    fn item(amount: Decimal, tenant_id: Uuid) -> CheckItem {
        CheckItem {
            id: Uuid::new_v4(),
            tenant_id,
            external_item_id: "X".into(),
            source_system: "core".into(),
            amount,
            currency: "USD".into(),
            account_id: "A".into(),
            account_number_masked: "****1".into(),
            account_type: AccountType::Consumer,
            routing_number: None,
            check_number: None,
            payee_name: None,
            memo: None,
            presented_date: Utc::now().date_naive(),
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

    #[test]
    fn approve_denies_on_empty_entitlements() {
        let t = Uuid::new_v4();
        let result = check_approval_entitlement(&[], &item(Decimal::new(100, 0), t));
        assert!(!result.allowed);
    }

    #[test]
    fn cross_tenant_entitlement_denies() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let ent = ApprovalEntitlement {
            id: Uuid::new_v4(),
            tenant_id: t2,
            user_id: Some(Uuid::new_v4()),
            role_id: None,
            entitlement_type: EntitlementType::Approve,
            min_amount: None,
            max_amount: None,
            allowed_account_types: None,
            allowed_queue_ids: None,
            allowed_risk_levels: None,
            allowed_business_lines: None,
            is_active: true,
            effective_from: Utc::now(),
            effective_until: None,
        };
        let result = check_approval_entitlement(&[ent], &item(Decimal::new(100, 0), t1));
        assert!(!result.allowed);
    }

    #[test]
    fn first_allowing_entitlement_wins() {
        let t = Uuid::new_v4();
        let narrow = ApprovalEntitlement {
            id: Uuid::new_v4(),
            tenant_id: t,
            user_id: Some(Uuid::new_v4()),
            role_id: None,
            entitlement_type: EntitlementType::Approve,
            min_amount: None,
            max_amount: Some(Decimal::new(50, 0)),
            allowed_account_types: None,
            allowed_queue_ids: None,
            allowed_risk_levels: None,
            allowed_business_lines: None,
            is_active: true,
            effective_from: Utc::now(),
            effective_until: None,
        };
        let wide = ApprovalEntitlement { max_amount: None, ..narrow.clone_for_test() };
        let result = check_approval_entitlement(&[narrow, wide], &item(Decimal::new(1000, 0), t));
        assert!(result.allowed);
    }

    impl ApprovalEntitlement {
        fn clone_for_test(&self) -> Self {
            Self {
                id: Uuid::new_v4(),
                tenant_id: self.tenant_id,
                user_id: self.user_id,
                role_id: self.role_id,
                entitlement_type: self.entitlement_type,
                min_amount: self.min_amount,
                max_amount: self.max_amount,
                allowed_account_types: self.allowed_account_types.clone(),
                allowed_queue_ids: self.allowed_queue_ids.clone(),
                allowed_risk_levels: self.allowed_risk_levels.clone(),
                allowed_business_lines: self.allowed_business_lines.clone(),
                is_active: self.is_active,
                effective_from: self.effective_from,
                effective_until: self.effective_until,
            }
        }
    }
}
