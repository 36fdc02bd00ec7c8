use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const BUSINESS_SUFFIXES: &[&str] = &["LLC", "INC", "CORP", "CO", "LTD", "LP", "LLP", "PC", "PLC", "DBA", "AKA"];

/// Strips everything but ASCII digits.
fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalizes a routing number: must be exactly 9 digits, else rejected.
pub fn normalize_routing_number(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    if digits.len() == 9 {
        Some(digits)
    } else {
        None
    }
}

/// Normalizes a payee name: NFKD-decompose + strip combining marks,
/// upper-case, punctuation stripped to spaces, business suffixes removed
/// as whole words, whitespace collapsed. Rejects (returns `None`) on an
/// empty result.
pub fn normalize_payee_name(raw: &str) -> Option<String> {
    use unicode_normalization::UnicodeNormalization;
    let decomposed: String = raw.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let upper = decomposed.to_uppercase();
    let depunctuated: String = upper
        .chars()
        .map(|c| if ".,;:'\"!?()[]{}<>@#$%^&*+=|\\/_-".contains(c) { ' ' } else { c })
        .collect();

    let mut words: Vec<&str> = depunctuated.split_whitespace().collect();
    words.retain(|w| !BUSINESS_SUFFIXES.contains(w));
    let normalized = words.join(" ").trim().to_string();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

/// Normalizes an account number to a privacy-preserving partial form
/// `L{len}-{last4}`. Rejects if fewer than 4 digits remain.
pub fn normalize_account_number(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    if digits.len() < 4 {
        return None;
    }
    let last4 = &digits[digits.len() - 4..];
    Some(format!("L{}-{}", digits.len(), last4))
}

/// Normalizes a check number: strips non-digits, strips leading zeros but
/// preserves `"0"` for all-zero input. Rejects if no digits at all.
pub fn normalize_check_number(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    if digits.is_empty() {
        return None;
    }
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        Some("0".to_string())
    } else {
        Some(stripped.to_string())
    }
}

fn hmac_hex(pepper: &str, prefixed_value: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes()).expect("HMAC accepts any key length");
    mac.update(prefixed_value.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn hash_routing_number(pepper: &str, normalized_routing: &str) -> String {
    hmac_hex(pepper, &format!("routing:{normalized_routing}"))
}

pub fn hash_payee_name(pepper: &str, normalized_payee: &str) -> String {
    hmac_hex(pepper, &format!("payee:{normalized_payee}"))
}

pub fn hash_account_number(pepper: &str, normalized_account: &str) -> String {
    hmac_hex(pepper, &format!("account:{normalized_account}"))
}

/// Bucketed components used to compose a check fingerprint.
pub struct FingerprintInputs<'a> {
    pub routing_number: &'a str,
    pub amount_bucket: &'a str,
    pub date_bucket: NaiveDate,
    pub check_number: Option<&'a str>,
}

/// Composite fingerprint over sorted, prefixed, `|`-joined components.
/// Routing number is mandatory; check number is included only if present.
pub fn check_fingerprint(pepper: &str, inputs: &FingerprintInputs) -> Option<String> {
    let routing = normalize_routing_number(inputs.routing_number)?;
    let mut components = vec![
        format!("routing:{routing}"),
        format!("amount:{}", inputs.amount_bucket),
        format!("date:{}", inputs.date_bucket.format("%Y-%m")),
    ];
    if let Some(check) = inputs.check_number {
        if let Some(normalized) = normalize_check_number(check) {
            components.push(format!("check:{normalized}"));
        }
    }
    components.sort();
    let joined = components.join("|");
    Some(hmac_hex(pepper, &format!("fingerprint:{joined}")))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FraudIndicators {
    pub routing_hash: Option<String>,
    pub payee_hash: Option<String>,
    pub micr_routing_hash: Option<String>,
    pub check_fingerprint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndicatorSourceFields<'a> {
    pub routing_number: Option<&'a str>,
    pub payee_name: Option<&'a str>,
    pub micr_routing: Option<&'a str>,
    pub amount_bucket: Option<&'a str>,
    pub date_bucket: Option<NaiveDate>,
    pub check_number: Option<&'a str>,
}

pub fn generate_indicators(pepper: &str, fields: &IndicatorSourceFields) -> FraudIndicators {
    let routing_hash = fields.routing_number.and_then(normalize_routing_number).map(|r| hash_routing_number(pepper, &r));
    let payee_hash = fields.payee_name.and_then(normalize_payee_name).map(|p| hash_payee_name(pepper, &p));
    let micr_routing_hash = fields.micr_routing.and_then(normalize_routing_number).map(|r| hash_routing_number(pepper, &r));
    let check_fingerprint = match (fields.routing_number, fields.amount_bucket, fields.date_bucket) {
        (Some(routing), Some(amount_bucket), Some(date_bucket)) => check_fingerprint(
            pepper,
            &FingerprintInputs { routing_number: routing, amount_bucket, date_bucket, check_number: fields.check_number },
        ),
        _ => None,
    };
    FraudIndicators { routing_hash, payee_hash, micr_routing_hash, check_fingerprint }
}

/// Pepper configuration supporting rotation: the current pepper always
/// hashes; the prior pepper is only active when both a prior pepper
/// string and a prior version greater than zero are configured.
#[derive(Debug, Clone)]
pub struct PepperConfig {
    pub current: String,
    pub current_version: i32,
    pub prior: Option<String>,
    pub prior_version: i32,
}

impl PepperConfig {
    pub fn has_prior_pepper(&self) -> bool {
        self.prior.is_some() && self.prior_version > 0
    }
}

/// Indicators keyed by pepper version, for matching across a rotation
/// window: the current pepper's indicators plus (if configured) the
/// prior pepper's indicators.
pub fn generate_indicators_for_matching(pepper: &PepperConfig, fields: &IndicatorSourceFields) -> Vec<(i32, FraudIndicators)> {
    let mut out = vec![(pepper.current_version, generate_indicators(&pepper.current, fields))];
    if pepper.has_prior_pepper() {
        out.push((pepper.prior_version, generate_indicators(pepper.prior.as_ref().unwrap(), fields)));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SharingLevel {
    Private = 0,
    Aggregate = 1,
    NetworkMatch = 2,
}

/// Full-detail fraud event, private to the reporting tenant — never
/// shared across tenant boundaries.
#[derive(Debug, Clone)]
pub struct FraudEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Option<Uuid>,
    pub fraud_type: String,
    pub channel: String,
    pub reported_by_user_id: Uuid,
    pub reported_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Hashed indicators plus coarse context shared cross-tenant when the
/// reporting tenant has opted in.
#[derive(Debug, Clone)]
pub struct FraudSharedArtifact {
    pub id: Uuid,
    pub source_fraud_event_id: Uuid,
    pub indicators: FraudIndicators,
    pub pepper_version: i32,
    pub month_bucket: String,
    pub amount_bucket: String,
    pub fraud_type: String,
    pub channel: String,
    pub sharing_level: SharingLevel,
    pub created_at: DateTime<Utc>,
}

/// Per-tenant view of a cross-tenant match: aggregate reasons and counts
/// only, never the matched artifact's tenant or raw identifiers.
#[derive(Debug, Clone)]
pub struct NetworkMatchAlert {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Option<Uuid>,
    pub match_reasons: Vec<String>,
    pub distinct_institution_count: i32,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TenantFraudConfig {
    pub tenant_id: Uuid,
    pub sharing_enabled: bool,
    pub eligible_pepper_versions: Vec<i32>,
}

/// Aggregate statistics are only disclosed when the underlying count
/// meets the configured privacy threshold (default 3 distinct
/// contributing institutions), to prevent re-identification from a
/// single-institution match.
pub fn meets_privacy_threshold(distinct_institution_count: i32, threshold: i32) -> bool {
    distinct_institution_count >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_number_must_be_nine_digits() {
        assert_eq!(normalize_routing_number("123456789"), Some("123456789".to_string()));
        assert_eq!(normalize_routing_number("12345"), None);
        assert_eq!(normalize_routing_number("123-456-789"), Some("123456789".to_string()));
    }

    #[test]
    fn payee_name_strips_suffix_and_punctuation() {
        assert_eq!(normalize_payee_name("Acme Corp, LLC."), Some("ACME CORP".to_string()));
        assert_eq!(normalize_payee_name("LLC"), None);
    }

    #[test]
    fn check_number_preserves_single_zero() {
        assert_eq!(normalize_check_number("0000"), Some("0".to_string()));
        assert_eq!(normalize_check_number("0042"), Some("42".to_string()));
        assert_eq!(normalize_check_number("abc"), None);
    }

    #[test]
    fn account_number_rejects_short_digit_runs() {
        assert_eq!(normalize_account_number("123"), None);
        assert_eq!(normalize_account_number("1234567"), Some("L7-4567".to_string()));
    }

    #[test]
    fn hashing_is_deterministic_for_semantically_equal_input() {
        let pepper = "test-pepper-value-1234567890123456";
        let a = normalize_payee_name("ACME Corp LLC").unwrap();
        let b = normalize_payee_name("acme   corp,  llc.").unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_payee_name(pepper, &a), hash_payee_name(pepper, &b));
    }

    #[test]
    fn prior_pepper_only_active_with_version() {
        let cfg = PepperConfig { current: "cur".into(), current_version: 2, prior: Some("old".into()), prior_version: 0 };
        assert!(!cfg.has_prior_pepper());
        let cfg2 = PepperConfig { current: "cur".into(), current_version: 2, prior: Some("old".into()), prior_version: 1 };
        assert!(cfg2.has_prior_pepper());
    }
}
