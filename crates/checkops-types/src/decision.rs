use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::check_item::CheckStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    ReviewRecommendation,
    ApprovalDecision,
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Return,
    Reject,
    Escalate,
    Hold,
    NeedsMoreInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Uuid,
    pub decision_type: DecisionType,
    pub action: DecisionAction,
    pub user_id: Uuid,
    pub previous_status: CheckStatus,
    pub new_status: CheckStatus,
    pub is_dual_control_required: bool,
    pub dual_control_approver_id: Option<Uuid>,
    pub notes: Option<String>,
    pub reason_codes: Vec<String>,
    pub ai_assisted: bool,
    pub ai_flags_reviewed: Vec<String>,
    pub evidence_snapshot: EvidenceSnapshot,
    pub created_at: DateTime<Utc>,
}

/// Sealed evidence record attached to a decision, hash-chained to the
/// previous decision made on the same item. The seal covers every field
/// except the four seal fields themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    pub item_snapshot: serde_json::Value,
    pub policy_version_id: Option<Uuid>,
    pub rules_triggered: Vec<String>,
    pub ai_analysis_ref: Option<Uuid>,
    pub notes: Option<String>,
    pub reason_codes: Vec<String>,

    pub previous_evidence_hash: Option<String>,
    pub seal_version: String,
    pub evidence_hash: String,
    pub seal_timestamp: DateTime<Utc>,
}

const SEAL_VERSION: &str = "sha256-v1";

/// Recursively sorts a JSON value's object keys so canonicalization is
/// deterministic regardless of construction order.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Fields present in a snapshot before sealing — everything the seal
/// covers, i.e. everything in `EvidenceSnapshot` except the four seal
/// fields themselves.
#[derive(Serialize)]
struct UnsealedSnapshot<'a> {
    item_snapshot: &'a serde_json::Value,
    policy_version_id: &'a Option<Uuid>,
    rules_triggered: &'a Vec<String>,
    ai_analysis_ref: &'a Option<Uuid>,
    notes: &'a Option<String>,
    reason_codes: &'a Vec<String>,
}

fn compute_evidence_hash(unsealed: &UnsealedSnapshot) -> String {
    let value = serde_json::to_value(unsealed).expect("evidence snapshot always serializes");
    let canonical = canonicalize(&value);
    let bytes = serde_json::to_vec(&canonical).expect("canonicalized value always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Seals a decision's evidence: computes the canonical-JSON SHA-256 hash
/// and links it to the previous decision's hash (`None` for the first
/// decision on an item).
pub fn seal_evidence(
    item_snapshot: serde_json::Value,
    policy_version_id: Option<Uuid>,
    rules_triggered: Vec<String>,
    ai_analysis_ref: Option<Uuid>,
    notes: Option<String>,
    reason_codes: Vec<String>,
    previous_evidence_hash: Option<String>,
    seal_timestamp: DateTime<Utc>,
) -> EvidenceSnapshot {
    let unsealed = UnsealedSnapshot {
        item_snapshot: &item_snapshot,
        policy_version_id: &policy_version_id,
        rules_triggered: &rules_triggered,
        ai_analysis_ref: &ai_analysis_ref,
        notes: &notes,
        reason_codes: &reason_codes,
    };
    let evidence_hash = compute_evidence_hash(&unsealed);
    EvidenceSnapshot {
        item_snapshot,
        policy_version_id,
        rules_triggered,
        ai_analysis_ref,
        notes,
        reason_codes,
        previous_evidence_hash,
        seal_version: SEAL_VERSION.to_string(),
        evidence_hash,
        seal_timestamp,
    }
}

/// Recomputes a snapshot's hash and compares it to the stored value.
pub fn verify_evidence_hash(snapshot: &EvidenceSnapshot) -> bool {
    let unsealed = UnsealedSnapshot {
        item_snapshot: &snapshot.item_snapshot,
        policy_version_id: &snapshot.policy_version_id,
        rules_triggered: &snapshot.rules_triggered,
        ai_analysis_ref: &snapshot.ai_analysis_ref,
        notes: &snapshot.notes,
        reason_codes: &snapshot.reason_codes,
    };
    compute_evidence_hash(&unsealed) == snapshot.evidence_hash
}

/// Verifies an ordered chain of decisions on one item: each snapshot's
/// hash recomputes correctly, and each links to its predecessor. Returns
/// `Ok(())` or the index of the first broken link.
pub fn verify_evidence_chain(decisions: &[Decision]) -> Result<(), usize> {
    for (i, d) in decisions.iter().enumerate() {
        if !verify_evidence_hash(&d.evidence_snapshot) {
            return Err(i);
        }
        let expected_prev = if i == 0 { None } else { Some(decisions[i - 1].evidence_snapshot.evidence_hash.clone()) };
        if d.evidence_snapshot.previous_evidence_hash != expected_prev {
            return Err(i);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_round_trips() {
        let snap = seal_evidence(serde_json::json!({"amount": 100}), None, vec!["r1".into()], None, None, vec![], None, Utc::now());
        assert!(verify_evidence_hash(&snap));
    }

    #[test]
    fn tamper_breaks_verification() {
        let mut snap = seal_evidence(serde_json::json!({"amount": 100}), None, vec![], None, None, vec![], None, Utc::now());
        snap.item_snapshot = serde_json::json!({"amount": 999});
        assert!(!verify_evidence_hash(&snap));
    }

    #[test]
    fn chain_links_to_predecessor() {
        let snap1 = seal_evidence(serde_json::json!({"n": 1}), None, vec![], None, None, vec![], None, Utc::now());
        let snap2 = seal_evidence(serde_json::json!({"n": 2}), None, vec![], None, None, vec![], Some(snap1.evidence_hash.clone()), Utc::now());
        let base = Decision {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            check_item_id: Uuid::new_v4(),
            decision_type: DecisionType::ReviewRecommendation,
            action: DecisionAction::Approve,
            user_id: Uuid::new_v4(),
            previous_status: CheckStatus::New,
            new_status: CheckStatus::InReview,
            is_dual_control_required: false,
            dual_control_approver_id: None,
            notes: None,
            reason_codes: vec![],
            ai_assisted: false,
            ai_flags_reviewed: vec![],
            evidence_snapshot: snap1,
            created_at: Utc::now(),
        };
        let d2 = Decision { evidence_snapshot: snap2, id: Uuid::new_v4(), ..clone_decision(&base) };
        assert!(verify_evidence_chain(&[base, d2]).is_ok());
    }

    fn clone_decision(d: &Decision) -> Decision {
        Decision {
            id: d.id,
            tenant_id: d.tenant_id,
            check_item_id: d.check_item_id,
            decision_type: d.decision_type,
            action: d.action,
            user_id: d.user_id,
            previous_status: d.previous_status,
            new_status: d.new_status,
            is_dual_control_required: d.is_dual_control_required,
            dual_control_approver_id: d.dual_control_approver_id,
            notes: d.notes.clone(),
            reason_codes: d.reason_codes.clone(),
            ai_assisted: d.ai_assisted,
            ai_flags_reviewed: d.ai_flags_reviewed.clone(),
            evidence_snapshot: d.evidence_snapshot.clone(),
            created_at: d.created_at,
        }
    }
}
