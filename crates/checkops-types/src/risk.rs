use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::check_item::AccountContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AiRecommendation {
    LikelyLegitimate,
    NeedsReview,
    HighRisk,
    AnomalyDetected,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub weight: f64,
    pub description: String,
    pub value: serde_json::Value,
}

/// Advisory AI analysis result. `is_advisory` and `requires_human_review`
/// are hardcoded `true` by the only constructor (`AiAnalysisResult::new`)
/// and have no setter — the invariant that this system's AI output can
/// never be authoritative is a type-level guarantee, not a runtime check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysisResult {
    pub model_id: String,
    pub model_version: String,
    pub analyzed_at: DateTime<Utc>,
    pub recommendation: AiRecommendation,
    pub confidence: f64,
    pub risk_score: Decimal,
    pub risk_factors: Vec<RiskFactor>,
    pub flags: Vec<String>,
    pub explanation: String,
    is_advisory: bool,
    requires_human_review: bool,
    pub confidence_by_category: ConfidenceByCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceByCategory {
    pub amount_pattern: f64,
    pub account_history: f64,
    pub balance_coverage: f64,
}

impl AiAnalysisResult {
    #[allow(clippy::too_many_arguments)]
    fn new(
        model_id: String,
        model_version: String,
        analyzed_at: DateTime<Utc>,
        recommendation: AiRecommendation,
        confidence: f64,
        risk_score: Decimal,
        risk_factors: Vec<RiskFactor>,
        flags: Vec<String>,
        explanation: String,
        confidence_by_category: ConfidenceByCategory,
    ) -> Self {
        Self {
            model_id,
            model_version,
            analyzed_at,
            recommendation,
            confidence,
            risk_score,
            risk_factors,
            flags,
            explanation,
            is_advisory: true,
            requires_human_review: true,
            confidence_by_category,
        }
    }

    pub fn is_advisory(&self) -> bool {
        true
    }

    pub fn requires_human_review(&self) -> bool {
        true
    }
}

pub const MODEL_ID: &str = "check-risk-analyzer";
pub const MODEL_VERSION: &str = "1.0.0";

/// Deterministic advisory scorer. Never mutates workflow state; callers
/// must persist the result and require explicit reviewer acknowledgment
/// before it can influence a decision (see `validate_ai_acknowledgment`).
pub fn analyze_check(amount: Decimal, ctx: &AccountContext, analyzed_at: DateTime<Utc>) -> AiAnalysisResult {
    let mut risk_score = Decimal::ZERO;
    let mut risk_factors = Vec::new();
    let mut flags = Vec::new();

    if let Some(avg_30) = ctx.avg_check_amount_30d {
        if avg_30 > Decimal::ZERO {
            let ratio = amount / avg_30;
            if ratio > Decimal::new(3, 0) {
                risk_score += Decimal::new(25, 2);
                risk_factors.push(RiskFactor {
                    factor: "amount_anomaly".into(),
                    weight: 0.25,
                    description: format!("Amount is {:.1}x the 30-day average", ratio),
                    value: serde_json::json!(ratio.to_string()),
                });
                flags.push("Amount significantly above average".to_string());
            }
        }
    }

    if let Some(tenure) = ctx.account_tenure_days {
        if tenure < 90 {
            let tenure_risk = if tenure < 30 { Decimal::new(15, 2) } else { Decimal::new(75, 3) };
            risk_score += tenure_risk;
            risk_factors.push(RiskFactor {
                factor: "new_account".into(),
                weight: tenure_risk.to_f64().unwrap_or(0.0),
                description: format!("Account is only {tenure} days old"),
                value: serde_json::json!(tenure),
            });
            flags.push(format!("New account ({tenure} days)"));
        }
    }

    if let Some(returns) = ctx.returned_item_count_90d {
        if returns > 0 {
            let return_risk = std::cmp::min(Decimal::new(30, 2), Decimal::new(returns as i64 * 10, 2));
            risk_score += return_risk;
            risk_factors.push(RiskFactor {
                factor: "return_history".into(),
                weight: return_risk.to_f64().unwrap_or(0.0),
                description: format!("{returns} returned items in last 90 days"),
                value: serde_json::json!(returns),
            });
            flags.push(format!("Return history ({returns} in 90d)"));
        }
    }

    if let Some(balance) = ctx.current_balance {
        if amount > balance {
            let coverage_risk = Decimal::new(20, 2);
            risk_score += coverage_risk;
            risk_factors.push(RiskFactor {
                factor: "insufficient_balance".into(),
                weight: 0.20,
                description: "Check amount exceeds current balance".into(),
                value: serde_json::json!(balance.to_string()),
            });
            flags.push("Amount exceeds current balance".to_string());
        }
    }

    risk_score = std::cmp::min(risk_score, Decimal::ONE);

    let (mut recommendation, mut confidence) = if risk_score < Decimal::new(20, 2) {
        (AiRecommendation::LikelyLegitimate, 0.85)
    } else if risk_score < Decimal::new(40, 2) {
        (AiRecommendation::NeedsReview, 0.75)
    } else if risk_score < Decimal::new(70, 2) {
        (AiRecommendation::HighRisk, 0.80)
    } else {
        (AiRecommendation::AnomalyDetected, 0.70)
    };

    if ctx.avg_check_amount_30d.is_none() && ctx.account_tenure_days.is_none() {
        recommendation = AiRecommendation::InsufficientData;
        confidence = 0.40;
    }

    let explanation = if !risk_factors.is_empty() {
        let descs: Vec<&str> = risk_factors.iter().take(3).map(|f| f.description.as_str()).collect();
        format!("ADVISORY: Risk score {:.2}%. Key factors: {}", risk_score * Decimal::new(100, 0), descs.join(", "))
    } else {
        "ADVISORY: No significant risk factors detected. Standard review recommended.".to_string()
    };

    AiAnalysisResult::new(
        MODEL_ID.to_string(),
        MODEL_VERSION.to_string(),
        analyzed_at,
        recommendation,
        confidence,
        risk_score,
        risk_factors,
        flags,
        explanation,
        ConfidenceByCategory {
            amount_pattern: if ctx.avg_check_amount_30d.is_some() { 0.85 } else { 0.30 },
            account_history: if ctx.account_tenure_days.is_some() { 0.80 } else { 0.30 },
            balance_coverage: if ctx.current_balance.is_some() { 0.90 } else { 0.30 },
        },
    )
}

/// Applies the upstream-flags factor, which lives on `CheckItem.advisory`
/// rather than `AccountContext` — called by the service layer after
/// `analyze_check`, which only sees the account statistics.
pub fn apply_upstream_flags(mut result: AiAnalysisResult, upstream_flags: &[String]) -> AiAnalysisResult {
    if upstream_flags.is_empty() {
        return result;
    }
    let upstream_risk = std::cmp::min(Decimal::new(20, 2), Decimal::new(upstream_flags.len() as i64 * 5, 2));
    result.risk_score = std::cmp::min(result.risk_score + upstream_risk, Decimal::ONE);
    result.risk_factors.push(RiskFactor {
        factor: "upstream_flags".into(),
        weight: upstream_risk.to_f64().unwrap_or(0.0),
        description: format!("{} flags from source system", upstream_flags.len()),
        value: serde_json::json!(upstream_flags),
    });
    for flag in upstream_flags.iter().take(3) {
        result.flags.push(format!("Upstream: {flag}"));
    }
    result
}

/// GUARDRAIL: if the reviewer marked `ai_assisted`, an analysis must
/// exist; if the analysis raised flags, they must have been reviewed.
pub fn validate_ai_acknowledgment(
    ai_assisted: bool,
    ai_flags_reviewed: &[String],
    ai_analysis: Option<&AiAnalysisResult>,
) -> Result<(), String> {
    let Some(analysis) = ai_analysis else {
        return if ai_assisted {
            Err("AI assisted marked but no AI analysis found".into())
        } else {
            Ok(())
        };
    };
    if !ai_assisted {
        return Err("AI analysis was performed but not acknowledged. Set ai_assisted=true to proceed.".into());
    }
    if !analysis.flags.is_empty() && ai_flags_reviewed.is_empty() {
        return Err(format!(
            "AI generated {} flags that must be reviewed before decision",
            analysis.flags.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_when_both_primary_inputs_absent() {
        let ctx = AccountContext::default();
        let result = analyze_check(Decimal::new(50000, 2), &ctx, Utc::now());
        assert_eq!(result.recommendation, AiRecommendation::InsufficientData);
        assert_eq!(result.confidence, 0.40);
        assert!(result.is_advisory());
        assert!(result.requires_human_review());
    }

    #[test]
    fn amount_anomaly_contributes_quarter_weight() {
        let mut ctx = AccountContext::default();
        ctx.avg_check_amount_30d = Some(Decimal::new(10000, 2));
        ctx.account_tenure_days = Some(1000);
        let result = analyze_check(Decimal::new(400000, 2), &ctx, Utc::now());
        assert!(result.risk_factors.iter().any(|f| f.factor == "amount_anomaly"));
    }

    #[test]
    fn acknowledgment_required_when_flags_present() {
        let mut ctx = AccountContext::default();
        ctx.avg_check_amount_30d = Some(Decimal::new(10000, 2));
        let result = analyze_check(Decimal::new(400000, 2), &ctx, Utc::now());
        assert!(validate_ai_acknowledgment(true, &[], Some(&result)).is_err());
        assert!(validate_ai_acknowledgment(true, &["Amount significantly above average".into()], Some(&result)).is_ok());
    }
}
