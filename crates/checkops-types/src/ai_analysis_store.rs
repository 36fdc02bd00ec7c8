//! In-memory store for the most recent AI analysis run against a check
//! item, keyed by `(tenant_id, check_item_id)`. `analyze_item` writes the
//! result here; `make_decision` reads it back to enforce the
//! AI-acknowledgment guardrail (`risk::validate_ai_acknowledgment`). No
//! persistence beyond process lifetime — the analysis is advisory and
//! re-derivable, so losing it on restart just means a reviewer re-runs
//! `/checks/{id}/analyze` before deciding.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::risk::AiAnalysisResult;

#[derive(Default)]
pub struct AiAnalysisStore {
    results: RwLock<HashMap<(Uuid, Uuid), AiAnalysisResult>>,
}

impl AiAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store_latest(&self, tenant_id: Uuid, check_item_id: Uuid, result: AiAnalysisResult) {
        self.results.write().await.insert((tenant_id, check_item_id), result);
    }

    pub async fn latest_for_item(&self, tenant_id: Uuid, check_item_id: Uuid) -> Option<AiAnalysisResult> {
        self.results.read().await.get(&(tenant_id, check_item_id)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_item::AccountContext;
    use crate::risk::analyze_check;
    use chrono::Utc;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn stores_and_returns_latest_result() {
        let store = AiAnalysisStore::new();
        let tenant_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        assert!(store.latest_for_item(tenant_id, item_id).await.is_none());

        let result = analyze_check(Decimal::new(1000, 0), &AccountContext::default(), Utc::now());
        store.store_latest(tenant_id, item_id, result.clone()).await;
        let fetched = store.latest_for_item(tenant_id, item_id).await.unwrap();
        assert_eq!(fetched.recommendation, result.recommendation);
    }
}
