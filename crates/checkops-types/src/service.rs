//! Domain service: orchestrates C1-C11 over the port traits. Every method
//! takes its caller/tenant context explicitly, never implicitly — mirrors
//! the `Arc<dyn PortTrait>`-holding, explicit-`&Principal`-everywhere shape
//! this codebase has always used for its central service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::ai_analysis_store::AiAnalysisStore;
use crate::audit::{build_audit_entry, AuditAction, AuditEntryInput, GENESIS_HASH};
use crate::check_item::{CheckItem, CheckItemFilter, CheckStatus, Page};
use crate::decision::{seal_evidence, Decision, DecisionAction, DecisionType};
use crate::entitlement::{check_approval_entitlement, check_override_entitlement, check_review_entitlement, EntitlementType};
use crate::error::{AppError, AppResult};
use crate::image_token::{ConsumeOutcome, ImageAccessToken};
use crate::policy::evaluate_policy_version;
use crate::ports::{
    AuditStore, CheckItemProvider, CheckItemStore, DecisionStore, EntitlementStore, ImageStore,
    ImageTokenStore, PolicyStore, ProviderCheckItem,
};
use crate::principal::CallerContext;
use crate::risk::{analyze_check, apply_upstream_flags, validate_ai_acknowledgment, AiAnalysisResult};
use crate::tenant::TenantContext;

pub type Result<T> = AppResult<T>;

/// `DecisionAction` has no `Override` variant — an override is marked by
/// `decision_type: Override` instead, so this derives the closest-fitting
/// action from the status the override lands on.
fn action_for_status(status: CheckStatus) -> DecisionAction {
    match status {
        CheckStatus::Approved => DecisionAction::Approve,
        CheckStatus::Returned => DecisionAction::Return,
        CheckStatus::Rejected => DecisionAction::Reject,
        CheckStatus::Escalated => DecisionAction::Escalate,
        _ => DecisionAction::Hold,
    }
}

#[derive(Debug, Clone)]
pub struct MakeDecisionInput {
    pub check_item_id: Uuid,
    pub action: DecisionAction,
    pub notes: Option<String>,
    pub reason_codes: Vec<String>,
    pub ai_assisted: bool,
    pub ai_flags_reviewed: Vec<String>,
}

#[async_trait]
pub trait CheckOpsService: Send + Sync {
    async fn ingest_item(&self, ctx: &TenantContext, provider_item: ProviderCheckItem) -> Result<CheckItem>;
    async fn get_item(&self, caller: &CallerContext, ctx: &TenantContext, item_id: Uuid) -> Result<CheckItem>;
    async fn list_items(&self, ctx: &TenantContext, filter: &CheckItemFilter, page: &Page) -> Result<(Vec<CheckItem>, i64)>;
    async fn adjacent_items(&self, ctx: &TenantContext, item_id: Uuid, filter: &CheckItemFilter) -> Result<(Option<Uuid>, Option<Uuid>)>;

    async fn analyze_item(&self, caller: &CallerContext, ctx: &TenantContext, item_id: Uuid) -> Result<AiAnalysisResult>;

    async fn make_decision(&self, caller: &CallerContext, ctx: &TenantContext, input: MakeDecisionInput) -> Result<Decision>;
    async fn approve_dual_control(&self, caller: &CallerContext, ctx: &TenantContext, pending_decision_id: Uuid, notes: Option<String>, reason_codes: Vec<String>) -> Result<Decision>;
    async fn override_decision(&self, caller: &CallerContext, ctx: &TenantContext, check_item_id: Uuid, new_status: CheckStatus, justification: String) -> Result<Decision>;

    async fn mint_image_tokens(&self, caller: &CallerContext, ctx: &TenantContext, image_ids: Vec<Uuid>, ttl_seconds: i64) -> Result<Vec<ImageAccessToken>>;
    async fn consume_image_token(&self, token_id: Uuid, used_by_ip: Option<String>, used_by_user_agent: Option<String>) -> Result<Vec<u8>>;

    async fn audit_chain_status(&self, tenant_id: Uuid) -> Result<std::result::Result<(), usize>>;
}

pub struct CheckOpsServiceImpl {
    pub check_items: Arc<dyn CheckItemStore>,
    pub decisions: Arc<dyn DecisionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub policies: Arc<dyn PolicyStore>,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub images: Arc<dyn ImageStore>,
    pub image_tokens: Arc<dyn ImageTokenStore>,
    pub provider: Option<Arc<dyn CheckItemProvider>>,
    pub dual_control_threshold: rust_decimal::Decimal,
    pub ai_analysis: AiAnalysisStore,
}

impl CheckOpsServiceImpl {
    pub fn new(
        check_items: Arc<dyn CheckItemStore>,
        decisions: Arc<dyn DecisionStore>,
        audit: Arc<dyn AuditStore>,
        policies: Arc<dyn PolicyStore>,
        entitlements: Arc<dyn EntitlementStore>,
        images: Arc<dyn ImageStore>,
        image_tokens: Arc<dyn ImageTokenStore>,
        dual_control_threshold: rust_decimal::Decimal,
    ) -> Self {
        Self {
            check_items,
            decisions,
            audit,
            policies,
            entitlements,
            images,
            image_tokens,
            provider: None,
            dual_control_threshold,
            ai_analysis: AiAnalysisStore::new(),
        }
    }

    /// Sets the upstream core-banking feed (builder pattern).
    pub fn with_provider(mut self, provider: Arc<dyn CheckItemProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    async fn append_audit(&self, tenant_id: Option<Uuid>, action: AuditAction, resource_type: &str, input: AuditEntryInput) -> Result<()> {
        self.audit.lock_tenant_chain(tenant_id).await?;
        let previous_hash = self.audit.latest_hash(tenant_id).await?.unwrap_or_else(|| GENESIS_HASH.to_string());
        let record = build_audit_entry(action, resource_type, previous_hash, Utc::now(), input);
        self.audit.append(record).await?;
        Ok(())
    }

    /// Writes a `DECISION_FAILED` record even when the triggering write was
    /// rolled back, so rejected attempts are never silently dropped from
    /// the trail.
    async fn record_decision_failure(&self, tenant_id: Uuid, item_id: Uuid, user_id: Uuid, reason: &str) {
        let _ = self
            .append_audit(
                Some(tenant_id),
                AuditAction::DecisionFailed,
                "check_item",
                AuditEntryInput {
                    tenant_id: Some(tenant_id),
                    user_id: Some(user_id),
                    resource_id: Some(item_id.to_string()),
                    description: Some(reason.to_string()),
                    ..Default::default()
                },
            )
            .await;
    }

    fn item_snapshot_json(item: &CheckItem) -> serde_json::Value {
        serde_json::json!({
            "id": item.id,
            "amount": item.amount.to_string(),
            "account_type": item.account_type.to_string(),
            "status": item.status.to_string(),
            "risk_level": item.risk_level.to_string(),
            "requires_dual_control": item.requires_dual_control,
        })
    }

    async fn make_decision_inner(&self, caller: &CallerContext, ctx: &TenantContext, item: &CheckItem, input: MakeDecisionInput) -> Result<Decision> {
        let next_status = match (input.action, item.requires_dual_control && !item.status.is_terminal()) {
            (DecisionAction::Approve, true) if item.status != CheckStatus::PendingDualControl => CheckStatus::PendingDualControl,
            (DecisionAction::Approve, _) => CheckStatus::Approved,
            (DecisionAction::Return, _) => CheckStatus::Returned,
            (DecisionAction::Reject, _) => CheckStatus::Rejected,
            (DecisionAction::Escalate, _) => CheckStatus::Escalated,
            (DecisionAction::Hold | DecisionAction::NeedsMoreInfo, _) => item.status,
        };
        item.status.validate_transition(next_status)?;

        let ai_analysis = self.ai_analysis.latest_for_item(ctx.tenant_id, item.id).await;
        validate_ai_acknowledgment(input.ai_assisted, &input.ai_flags_reviewed, ai_analysis.as_ref())
            .map_err(|_| AppError::AiFlagsNotAcknowledged)?;

        let decision_type = if next_status == CheckStatus::PendingDualControl {
            DecisionType::ReviewRecommendation
        } else {
            DecisionType::ApprovalDecision
        };

        if decision_type == DecisionType::ApprovalDecision {
            let approve_entitlements = self
                .entitlements
                .active_entitlements_for_user(ctx.tenant_id, caller.user_id, &caller.role_ids, EntitlementType::Approve, Utc::now())
                .await?;
            let approve_check = check_approval_entitlement(&approve_entitlements, item);
            if !approve_check.allowed {
                if item.requires_dual_control {
                    return Err(AppError::EntitlementDenied(approve_check.denial_reason.unwrap_or_default()));
                }
                let review_entitlements = self
                    .entitlements
                    .active_entitlements_for_user(ctx.tenant_id, caller.user_id, &caller.role_ids, EntitlementType::Review, Utc::now())
                    .await?;
                let review_check = check_review_entitlement(&review_entitlements, item, caller.has_permission("check_item", "review"));
                if !review_check.allowed {
                    return Err(AppError::EntitlementDenied(review_check.denial_reason.unwrap_or_default()));
                }
            }
        }

        let previous_decision = self.decisions.latest_for_item(ctx.tenant_id, item.id).await?;
        let previous_hash = previous_decision.as_ref().map(|d| d.evidence_snapshot.evidence_hash.clone());

        let snapshot = seal_evidence(
            Self::item_snapshot_json(item),
            item.policy_version_id,
            vec![],
            None,
            input.notes.clone(),
            input.reason_codes.clone(),
            previous_hash,
            Utc::now(),
        );

        let pending_id = if next_status == CheckStatus::PendingDualControl { Some(Uuid::new_v4()) } else { None };

        let decision = Decision {
            id: pending_id.unwrap_or_else(Uuid::new_v4),
            tenant_id: ctx.tenant_id,
            check_item_id: item.id,
            decision_type,
            action: input.action,
            user_id: caller.user_id,
            previous_status: item.status,
            new_status: next_status,
            is_dual_control_required: item.requires_dual_control,
            dual_control_approver_id: None,
            notes: input.notes,
            reason_codes: input.reason_codes,
            ai_assisted: input.ai_assisted,
            ai_flags_reviewed: input.ai_flags_reviewed,
            evidence_snapshot: snapshot,
            created_at: Utc::now(),
        };

        let (stored, _item) = self.decisions.record_decision(decision, next_status, pending_id).await?;

        let audit_action = match next_status {
            CheckStatus::PendingDualControl => AuditAction::DualControlRequired,
            CheckStatus::Approved => AuditAction::DecisionApproved,
            CheckStatus::Rejected => AuditAction::DecisionRejected,
            _ => AuditAction::DecisionMade,
        };
        self.append_audit(
            Some(ctx.tenant_id),
            audit_action,
            "check_item",
            AuditEntryInput { tenant_id: Some(ctx.tenant_id), user_id: Some(caller.user_id), resource_id: Some(item.id.to_string()), ..Default::default() },
        )
        .await?;

        Ok(stored)
    }
}

#[async_trait]
impl CheckOpsService for CheckOpsServiceImpl {
    async fn ingest_item(&self, ctx: &TenantContext, provider_item: ProviderCheckItem) -> Result<CheckItem> {
        let account_type = provider_item.account_type;
        let version = self
            .policies
            .get_active_policy_version(ctx.tenant_id, account_type, Utc::now())
            .await?
            .map(|(_policy, version)| version);

        let now = Utc::now();
        let mut item = CheckItem {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            external_item_id: provider_item.external_item_id,
            source_system: provider_item.source_system,
            amount: provider_item.amount,
            currency: provider_item.currency,
            account_id: provider_item.account_id,
            account_number_masked: provider_item.account_number_masked,
            account_type,
            routing_number: provider_item.routing_number,
            check_number: provider_item.check_number,
            payee_name: provider_item.payee_name,
            memo: provider_item.memo,
            presented_date: provider_item.presented_date,
            check_date: provider_item.check_date,
            process_date: None,
            micr_line: None,
            micr_account: None,
            micr_routing: None,
            micr_check_number: None,
            item_type: provider_item.item_type,
            status: CheckStatus::New,
            risk_level: crate::check_item::RiskLevel::Low,
            priority: 0,
            context: provider_item.context,
            advisory: crate::check_item::AdvisoryFields {
                upstream_flags: provider_item.upstream_flags,
                ..Default::default()
            },
            assigned_reviewer_id: None,
            assigned_approver_id: None,
            queue_id: None,
            sla_due_at: None,
            sla_breached: false,
            requires_dual_control: false,
            pending_dual_control_decision_id: None,
            dual_control_reason: None,
            policy_version_id: version.as_ref().map(|v| v.id),
            created_at: now,
            updated_at: now,
        };

        if let Some(version) = &version {
            let eval = evaluate_policy_version(version, &item);
            item.requires_dual_control = eval.requires_dual_control || item.amount >= self.dual_control_threshold;
            if let Some(level) = eval.risk_level {
                item.risk_level = level;
            }
            if let Some(queue_id) = eval.routing_queue_id {
                item.queue_id = Some(queue_id);
            }
            item.advisory.risk_flags = eval.flags;
        } else {
            item.requires_dual_control = item.amount >= self.dual_control_threshold;
        }

        self.check_items.upsert_from_provider(item).await
    }

    async fn get_item(&self, caller: &CallerContext, ctx: &TenantContext, item_id: Uuid) -> Result<CheckItem> {
        let item = self.check_items.get(ctx.tenant_id, item_id).await?.ok_or_else(|| AppError::NotFound("check_item".into()))?;
        ctx.check(item.tenant_id)?;
        self.append_audit(
            Some(ctx.tenant_id),
            AuditAction::ItemViewed,
            "check_item",
            AuditEntryInput { tenant_id: Some(ctx.tenant_id), user_id: Some(caller.user_id), resource_id: Some(item_id.to_string()), ..Default::default() },
        )
        .await?;
        Ok(item)
    }

    async fn list_items(&self, ctx: &TenantContext, filter: &CheckItemFilter, page: &Page) -> Result<(Vec<CheckItem>, i64)> {
        self.check_items.list(ctx.tenant_id, filter, page).await
    }

    async fn adjacent_items(&self, ctx: &TenantContext, item_id: Uuid, filter: &CheckItemFilter) -> Result<(Option<Uuid>, Option<Uuid>)> {
        self.check_items.adjacent(ctx.tenant_id, item_id, filter).await
    }

    async fn analyze_item(&self, caller: &CallerContext, ctx: &TenantContext, item_id: Uuid) -> Result<AiAnalysisResult> {
        let item = self.check_items.get(ctx.tenant_id, item_id).await?.ok_or_else(|| AppError::NotFound("check_item".into()))?;
        ctx.check(item.tenant_id)?;
        let result = analyze_check(item.amount, &item.context, Utc::now());
        let result = apply_upstream_flags(result, &item.advisory.upstream_flags);
        self.append_audit(
            Some(ctx.tenant_id),
            AuditAction::AiInferenceCompleted,
            "check_item",
            AuditEntryInput {
                tenant_id: Some(ctx.tenant_id),
                user_id: Some(caller.user_id),
                resource_id: Some(item_id.to_string()),
                extra_data: Some(serde_json::json!({"recommendation": result.recommendation.to_string(), "confidence": result.confidence})),
                ..Default::default()
            },
        )
        .await?;
        self.ai_analysis.store_latest(ctx.tenant_id, item_id, result.clone()).await;
        Ok(result)
    }

    async fn make_decision(&self, caller: &CallerContext, ctx: &TenantContext, input: MakeDecisionInput) -> Result<Decision> {
        let item = self
            .check_items
            .get_for_update(ctx.tenant_id, input.check_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("check_item".into()))?;
        ctx.check(item.tenant_id)?;

        let item_id = item.id;
        let result = self.make_decision_inner(caller, ctx, &item, input).await;
        if let Err(e) = &result {
            self.record_decision_failure(ctx.tenant_id, item_id, caller.user_id, &e.to_string()).await;
        }
        result
    }

    async fn approve_dual_control(&self, caller: &CallerContext, ctx: &TenantContext, pending_decision_id: Uuid, notes: Option<String>, reason_codes: Vec<String>) -> Result<Decision> {
        let history = self.decisions.history_for_item(ctx.tenant_id, pending_decision_id).await.unwrap_or_default();
        let prior = history
            .into_iter()
            .find(|d| d.id == pending_decision_id)
            .ok_or_else(|| AppError::NotFound("decision".into()))?;

        if prior.user_id == caller.user_id {
            return Err(AppError::SelfApprovalDenied);
        }

        let item = self
            .check_items
            .get_for_update(ctx.tenant_id, prior.check_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("check_item".into()))?;
        ctx.check(item.tenant_id)?;
        item.status.validate_transition(CheckStatus::Approved)?;

        let entitlements = self
            .entitlements
            .active_entitlements_for_user(ctx.tenant_id, caller.user_id, &caller.role_ids, EntitlementType::Approve, Utc::now())
            .await?;
        let check = check_approval_entitlement(&entitlements, &item);
        if !check.allowed {
            return Err(AppError::EntitlementDenied(check.denial_reason.unwrap_or_default()));
        }

        let snapshot = seal_evidence(
            Self::item_snapshot_json(&item),
            item.policy_version_id,
            vec![],
            None,
            notes.clone(),
            reason_codes.clone(),
            Some(prior.evidence_snapshot.evidence_hash.clone()),
            Utc::now(),
        );

        let decision = Decision {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            check_item_id: item.id,
            decision_type: DecisionType::ApprovalDecision,
            action: DecisionAction::Approve,
            user_id: caller.user_id,
            previous_status: item.status,
            new_status: CheckStatus::Approved,
            is_dual_control_required: true,
            dual_control_approver_id: Some(caller.user_id),
            notes,
            reason_codes,
            ai_assisted: false,
            ai_flags_reviewed: vec![],
            evidence_snapshot: snapshot,
            created_at: Utc::now(),
        };

        let (stored, _item) = self.decisions.record_decision(decision, CheckStatus::Approved, None).await?;
        self.append_audit(
            Some(ctx.tenant_id),
            AuditAction::DualControlApproved,
            "check_item",
            AuditEntryInput { tenant_id: Some(ctx.tenant_id), user_id: Some(caller.user_id), resource_id: Some(item.id.to_string()), ..Default::default() },
        )
        .await?;
        Ok(stored)
    }

    async fn override_decision(&self, caller: &CallerContext, ctx: &TenantContext, check_item_id: Uuid, new_status: CheckStatus, justification: String) -> Result<Decision> {
        if justification.trim().is_empty() {
            return Err(AppError::MissingField("justification".into()));
        }

        let item = self
            .check_items
            .get_for_update(ctx.tenant_id, check_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("check_item".into()))?;
        ctx.check(item.tenant_id)?;
        item.status.validate_transition(new_status)?;

        let entitlements = self
            .entitlements
            .active_entitlements_for_user(ctx.tenant_id, caller.user_id, &caller.role_ids, EntitlementType::Override, Utc::now())
            .await?;
        let check = check_override_entitlement(&entitlements, &item);
        if !check.allowed {
            return Err(AppError::EntitlementDenied(check.denial_reason.unwrap_or_default()));
        }

        let previous_decision = self.decisions.latest_for_item(ctx.tenant_id, item.id).await?;
        let previous_hash = previous_decision.as_ref().map(|d| d.evidence_snapshot.evidence_hash.clone());

        let snapshot = seal_evidence(
            Self::item_snapshot_json(&item),
            item.policy_version_id,
            vec![],
            None,
            Some(justification.clone()),
            vec![],
            previous_hash,
            Utc::now(),
        );

        let decision = Decision {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            check_item_id: item.id,
            decision_type: DecisionType::Override,
            action: action_for_status(new_status),
            user_id: caller.user_id,
            previous_status: item.status,
            new_status,
            is_dual_control_required: item.requires_dual_control,
            dual_control_approver_id: None,
            notes: Some(justification),
            reason_codes: vec![],
            ai_assisted: false,
            ai_flags_reviewed: vec![],
            evidence_snapshot: snapshot,
            created_at: Utc::now(),
        };

        let (stored, _item) = self.decisions.record_decision(decision, new_status, None).await?;
        self.append_audit(
            Some(ctx.tenant_id),
            AuditAction::DecisionOverridden,
            "check_item",
            AuditEntryInput { tenant_id: Some(ctx.tenant_id), user_id: Some(caller.user_id), resource_id: Some(item.id.to_string()), ..Default::default() },
        )
        .await?;
        Ok(stored)
    }

    async fn mint_image_tokens(&self, caller: &CallerContext, ctx: &TenantContext, image_ids: Vec<Uuid>, ttl_seconds: i64) -> Result<Vec<ImageAccessToken>> {
        let now = Utc::now();
        let tokens: Vec<ImageAccessToken> = image_ids
            .iter()
            .map(|&image_id| ImageAccessToken {
                id: Uuid::new_v4(),
                tenant_id: ctx.tenant_id,
                image_id,
                created_by_user_id: caller.user_id,
                created_at: now,
                expires_at: now + chrono::Duration::seconds(ttl_seconds),
                used_at: None,
                used_by_ip: None,
                used_by_user_agent: None,
            })
            .collect();
        let minted = self.image_tokens.mint_batch(tokens).await?;
        for image_id in &image_ids {
            self.append_audit(
                Some(ctx.tenant_id),
                AuditAction::ImageTokenCreated,
                "check_image",
                AuditEntryInput { tenant_id: Some(ctx.tenant_id), user_id: Some(caller.user_id), resource_id: Some(image_id.to_string()), ..Default::default() },
            )
            .await?;
        }
        Ok(minted)
    }

    async fn consume_image_token(&self, token_id: Uuid, used_by_ip: Option<String>, used_by_user_agent: Option<String>) -> Result<Vec<u8>> {
        let now = Utc::now();
        let Some(token) = self.image_tokens.get(token_id).await? else {
            return Err(AppError::NotFound("image token".into()));
        };
        match token.consume_outcome(now) {
            ConsumeOutcome::NotFound => return Err(AppError::NotFound("image token".into())),
            ConsumeOutcome::Expired => {
                self.append_audit(Some(token.tenant_id), AuditAction::ImageTokenExpired, "image_token", AuditEntryInput { tenant_id: Some(token.tenant_id), resource_id: Some(token_id.to_string()), ..Default::default() }).await?;
                return Err(AppError::Expired("image token".into()));
            }
            ConsumeOutcome::AlreadyUsed => {
                self.append_audit(Some(token.tenant_id), AuditAction::ImageTokenInvalid, "image_token", AuditEntryInput { tenant_id: Some(token.tenant_id), resource_id: Some(token_id.to_string()), ..Default::default() }).await?;
                return Err(AppError::Expired("image token".into()));
            }
            ConsumeOutcome::Served => {}
        }

        let Some(consumed) = self.image_tokens.try_consume(token_id, used_by_ip, used_by_user_agent, now).await? else {
            self.append_audit(Some(token.tenant_id), AuditAction::ImageTokenInvalid, "image_token", AuditEntryInput { tenant_id: Some(token.tenant_id), resource_id: Some(token_id.to_string()), ..Default::default() }).await?;
            return Err(AppError::Expired("image token".into()));
        };

        self.append_audit(
            Some(consumed.tenant_id),
            AuditAction::ImageTokenUsed,
            "image_token",
            AuditEntryInput { tenant_id: Some(consumed.tenant_id), resource_id: Some(token_id.to_string()), ..Default::default() },
        )
        .await?;

        let images = self.check_items.images_for_item(consumed.tenant_id, consumed.image_id).await?;
        let image = images.into_iter().find(|i| i.id == consumed.image_id).ok_or_else(|| AppError::NotFound("check_image".into()))?;
        self.images.fetch_bytes(consumed.tenant_id, &image).await
    }

    async fn audit_chain_status(&self, tenant_id: Uuid) -> Result<std::result::Result<(), usize>> {
        let page = Page { page: 1, page_size: 100_000 };
        let (records, _total) = self.audit.list(tenant_id, None, None, None, &page).await?;
        Ok(crate::audit::verify_chain(&records))
    }
}
