//! Maker-checker workflow around payment requests.
//!
//! Non-privileged makers queue requests; a different user with review rights
//! approves (which disburses) or rejects. Privileged actors pay out directly.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::disbursement::DisbursementExecutor;
use crate::error::AppError;
use crate::model::payment_request::{
    DisbursementSummary, PaymentRequest, PaymentStatus, PaymentTarget,
};
use crate::model::role::Actor;
use crate::store::PayrollStore;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// Saved as `pending`, waiting for a checker.
    Queued { request: PaymentRequest },
    /// Paid out immediately by a privileged actor. Nothing was queued.
    Disbursed { summary: DisbursementSummary },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BulkApprovalItem {
    pub id: String,
    pub success: bool,
    pub status: Option<PaymentStatus>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct BulkApprovalReport {
    pub success_count: usize,
    pub total_count: usize,
    pub results: Vec<BulkApprovalItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentRequest {
    #[serde(flatten)]
    pub target: PaymentTarget,
    pub justification: Option<String>,
}

pub struct PaymentWorkflow {
    store: Arc<dyn PayrollStore>,
    executor: Arc<DisbursementExecutor>,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a request as being worked on until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

impl PaymentWorkflow {
    pub fn new(store: Arc<dyn PayrollStore>, executor: Arc<DisbursementExecutor>) -> Self {
        Self {
            store,
            executor,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, id: &str) -> Result<InFlight<'_>, AppError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| AppError::Persistence("in-flight registry poisoned".to_string()))?;
        if !set.insert(id.to_string()) {
            return Err(AppError::Conflict(format!(
                "Payment request {id} is already being processed"
            )));
        }
        Ok(InFlight {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    async fn load(&self, id: &str) -> Result<PaymentRequest, AppError> {
        self.store
            .get_payment_request(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment request {id} not found")))
    }

    pub async fn get(&self, id: &str) -> Result<PaymentRequest, AppError> {
        self.load(id).await
    }

    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<PaymentRequest>, AppError> {
        self.store.list_payment_requests(status).await
    }

    /// Queues the request, or pays out directly when the actor is privileged.
    pub async fn create(
        &self,
        actor: &Actor,
        new: NewPaymentRequest,
    ) -> Result<CreateOutcome, AppError> {
        if !actor.role.can_create_payments() {
            return Err(AppError::forbidden("Not allowed to create payment requests"));
        }
        new.target.validate()?;

        if actor.role.is_privileged() {
            info!(
                audit = true,
                actor = %actor.username,
                role = %actor.role,
                kind = new.target.kind(),
                total_amount = new.target.total_amount(),
                "Direct disbursement without approval"
            );
            let summary = self.executor.execute(&new.target).await?;
            return Ok(CreateOutcome::Disbursed { summary });
        }

        let justification = new
            .justification
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty())
            .ok_or_else(|| AppError::validation("A justification is required"))?;

        let request = PaymentRequest::new(
            uuid::Uuid::new_v4().to_string(),
            new.target,
            Some(justification),
            actor.username.clone(),
            Utc::now(),
        );
        self.store.insert_payment_request(&request).await?;
        info!(
            request_id = %request.id,
            actor = %request.created_by,
            status = %request.status,
            kind = request.target.kind(),
            total_amount = request.total_amount,
            "Payment request queued"
        );
        Ok(CreateOutcome::Queued { request })
    }

    fn ensure_reviewer(actor: &Actor, request: &PaymentRequest) -> Result<(), AppError> {
        if !actor.role.can_review_payments() {
            return Err(AppError::forbidden("Not allowed to review payment requests"));
        }
        if request.created_by == actor.username {
            return Err(AppError::forbidden(
                "You cannot review a payment request you created",
            ));
        }
        Ok(())
    }

    /// Approves a pending request and disburses it. The approval is stored
    /// before any money moves; the final status records the outcome.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: &str,
        comment: Option<String>,
    ) -> Result<PaymentRequest, AppError> {
        if !actor.role.can_review_payments() {
            return Err(AppError::forbidden("Not allowed to review payment requests"));
        }
        let _guard = self.claim(id)?;
        let mut request = self.load(id).await?;
        Self::ensure_reviewer(actor, &request)?;

        request.approve(&actor.username, Utc::now(), comment)?;
        if !self.store.transition(PaymentStatus::Pending, &request).await? {
            return Err(AppError::Conflict(format!(
                "Payment request {id} was already processed"
            )));
        }
        info!(request_id = %id, actor = %actor.username, status = %request.status, "Payment request approved");

        let at = Utc::now();
        match self.executor.execute(&request.target).await {
            Ok(summary) if summary.all_succeeded() => request.complete(at, summary)?,
            Ok(summary) => {
                let reason = summary.describe();
                request.fail(at, reason, Some(summary))?
            }
            Err(e) => {
                let reason = e.to_string();
                let summary = DisbursementSummary::all_failed(request.target.disbursees(), &reason);
                request.fail(at, reason, Some(summary))?
            }
        }

        if !self.store.transition(PaymentStatus::Approved, &request).await? {
            error!(request_id = %id, status = %request.status, "Approved request changed underneath disbursement");
            return Err(AppError::Conflict(format!(
                "Payment request {id} changed during disbursement"
            )));
        }
        match request.status {
            PaymentStatus::Completed => {
                info!(request_id = %id, actor = %actor.username, status = %request.status, "Payment request completed")
            }
            _ => warn!(
                request_id = %id,
                actor = %actor.username,
                status = %request.status,
                reason = request.failure_reason.as_deref().unwrap_or("-"),
                "Payment request failed"
            ),
        }
        Ok(request)
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: &str,
        reason: &str,
    ) -> Result<PaymentRequest, AppError> {
        if !actor.role.can_review_payments() {
            return Err(AppError::forbidden("Not allowed to review payment requests"));
        }
        let _guard = self.claim(id)?;
        let mut request = self.load(id).await?;
        Self::ensure_reviewer(actor, &request)?;

        request.reject(&actor.username, Utc::now(), reason)?;
        if !self.store.transition(PaymentStatus::Pending, &request).await? {
            return Err(AppError::Conflict(format!(
                "Payment request {id} was already processed"
            )));
        }
        info!(request_id = %id, actor = %actor.username, status = %request.status, "Payment request rejected");
        Ok(request)
    }

    /// Approves each id in turn. Individual failures are reported, not raised.
    pub async fn bulk_approve(
        &self,
        actor: &Actor,
        ids: &[String],
        comment: Option<String>,
    ) -> Result<BulkApprovalReport, AppError> {
        if !actor.role.can_review_payments() {
            return Err(AppError::forbidden("Not allowed to review payment requests"));
        }
        if ids.is_empty() {
            return Err(AppError::validation("No payment requests selected"));
        }

        let mut report = BulkApprovalReport {
            total_count: ids.len(),
            ..BulkApprovalReport::default()
        };
        for id in ids {
            let item = match self.approve(actor, id, comment.clone()).await {
                Ok(request) => BulkApprovalItem {
                    id: id.clone(),
                    success: request.status == PaymentStatus::Completed,
                    status: Some(request.status),
                    error: request.failure_reason,
                },
                Err(e) => BulkApprovalItem {
                    id: id.clone(),
                    success: false,
                    status: None,
                    error: Some(e.to_string()),
                },
            };
            if item.success {
                report.success_count += 1;
            }
            report.results.push(item);
        }
        Ok(report)
    }

    /// Deletes every pending request. Irreversible, so it must be confirmed.
    pub async fn clear_queue(&self, actor: &Actor, confirmed: bool) -> Result<u64, AppError> {
        if !actor.role.is_privileged() {
            return Err(AppError::forbidden("Not allowed to clear the payment queue"));
        }
        if !confirmed {
            return Err(AppError::validation(
                "Clearing pending payment requests must be confirmed",
            ));
        }
        let deleted = self.store.delete_pending().await?;
        warn!(deleted, actor = %actor.username, "Pending payment requests cleared");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::store::MemoryStore;
    use crate::testing::{FakePaymentGateway, actor, executor, payee};

    struct Harness {
        store: Arc<MemoryStore>,
        gateway: Arc<FakePaymentGateway>,
        workflow: PaymentWorkflow,
    }

    fn harness(gateway: FakePaymentGateway) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(gateway);
        let workflow = PaymentWorkflow::new(store.clone(), Arc::new(executor(gateway.clone())));
        Harness {
            store,
            gateway,
            workflow,
        }
    }

    fn single(number: &str) -> NewPaymentRequest {
        NewPaymentRequest {
            target: PaymentTarget::Single {
                employee_data: payee(number, "0712345678", 27639.75),
            },
            justification: Some("March salary".into()),
        }
    }

    async fn queue(h: &Harness, new: NewPaymentRequest) -> PaymentRequest {
        match h.workflow.create(&actor("maker", Role::Hr), new).await.unwrap() {
            CreateOutcome::Queued { request } => request,
            other => panic!("expected queued, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn maker_request_is_queued_without_payment() {
        let h = harness(FakePaymentGateway::default());
        let request = queue(&h, single("EMP-1")).await;

        assert_eq!(request.status, PaymentStatus::Pending);
        assert_eq!(request.total_amount, 27639.75);
        assert!(h.gateway.calls().is_empty());
        assert_eq!(h.workflow.list(Some(PaymentStatus::Pending)).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn maker_must_justify() {
        let h = harness(FakePaymentGateway::default());
        let mut new = single("EMP-1");
        new.justification = Some("  ".into());
        assert!(matches!(
            h.workflow.create(&actor("maker", Role::Hr), new).await,
            Err(AppError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn employees_cannot_create_requests() {
        let h = harness(FakePaymentGateway::default());
        assert!(matches!(
            h.workflow
                .create(&actor("staff", Role::Employee), single("EMP-1"))
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[actix_web::test]
    async fn privileged_actor_pays_directly() {
        let h = harness(FakePaymentGateway::default());
        let mut new = single("EMP-1");
        new.justification = None;
        let outcome = h
            .workflow
            .create(&actor("officer", Role::DisbursementOfficer), new)
            .await
            .unwrap();

        match outcome {
            CreateOutcome::Disbursed { summary } => assert!(summary.all_succeeded()),
            other => panic!("expected disbursed, got {other:?}"),
        }
        assert_eq!(h.gateway.calls().len(), 1);
        assert!(h.workflow.list(None).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn approval_completes_the_request() {
        let h = harness(FakePaymentGateway::default());
        let request = queue(&h, single("EMP-1")).await;

        let done = h
            .workflow
            .approve(&actor("checker", Role::Checker), &request.id, Some("ok".into()))
            .await
            .unwrap();

        assert_eq!(done.status, PaymentStatus::Completed);
        assert_eq!(done.approved_by.as_deref(), Some("checker"));
        assert!(done.completed_at.is_some());
        assert_eq!(h.gateway.calls().len(), 1);

        let stored = h.store.get_payment_request(&request.id).await.unwrap().unwrap();
        assert_eq!(stored, done);
    }

    #[actix_web::test]
    async fn approval_after_gateway_error_fails_with_its_message() {
        let h = harness(FakePaymentGateway::failing_for(&["EMP-1"]));
        let request = queue(&h, single("EMP-1")).await;

        let failed = h
            .workflow
            .approve(&actor("checker", Role::Checker), &request.id, None)
            .await
            .unwrap();

        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(failed.approved_by.as_deref(), Some("checker"));
        assert_eq!(
            failed.failure_reason.as_deref(),
            Some("Insufficient float for EMP-1")
        );
    }

    #[actix_web::test]
    async fn partial_bulk_is_marked_failed_with_tally() {
        let h = harness(FakePaymentGateway::failing_for(&["EMP-2"]));
        let request = queue(
            &h,
            NewPaymentRequest {
                target: PaymentTarget::Bulk {
                    employees_data: vec![
                        payee("EMP-1", "0712345678", 100.0),
                        payee("EMP-2", "0712345679", 200.0),
                    ],
                },
                justification: Some("bonus".into()),
            },
        )
        .await;

        let done = h
            .workflow
            .approve(&actor("checker", Role::Checker), &request.id, None)
            .await
            .unwrap();
        assert_eq!(done.status, PaymentStatus::Failed);
        let summary = done.disbursement.unwrap();
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.total_count, 2);
        assert_eq!(done.failure_reason.as_deref(), Some("1 of 2 payments succeeded"));
    }

    #[actix_web::test]
    async fn second_approval_is_rejected_and_pays_nothing() {
        let h = harness(FakePaymentGateway::default());
        let request = queue(&h, single("EMP-1")).await;
        let checker = actor("checker", Role::Checker);

        h.workflow.approve(&checker, &request.id, None).await.unwrap();
        let again = h.workflow.approve(&checker, &request.id, None).await;

        assert!(matches!(again, Err(AppError::InvalidTransition { .. })));
        assert_eq!(h.gateway.calls().len(), 1);
    }

    #[actix_web::test]
    async fn rejected_request_cannot_be_approved() {
        let h = harness(FakePaymentGateway::default());
        let request = queue(&h, single("EMP-1")).await;
        let checker = actor("checker", Role::Checker);

        let rejected = h
            .workflow
            .reject(&checker, &request.id, "duplicate")
            .await
            .unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("duplicate"));

        assert!(h.workflow.approve(&checker, &request.id, None).await.is_err());
        assert!(h.gateway.calls().is_empty());
    }

    #[actix_web::test]
    async fn makers_cannot_review_their_own_requests() {
        let h = harness(FakePaymentGateway::default());
        let request = queue(&h, single("EMP-1")).await;
        let maker_as_admin = actor("maker", Role::Admin);

        assert!(matches!(
            h.workflow.approve(&maker_as_admin, &request.id, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.workflow.reject(&maker_as_admin, &request.id, "no").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.workflow
                .approve(&actor("other", Role::Hr), &request.id, None)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[actix_web::test]
    async fn unknown_request_is_not_found() {
        let h = harness(FakePaymentGateway::default());
        assert!(matches!(
            h.workflow
                .approve(&actor("checker", Role::Checker), "missing", None)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn busy_request_cannot_be_claimed_twice() {
        let h = harness(FakePaymentGateway::default());
        let first = h.workflow.claim("a").unwrap();
        assert!(matches!(h.workflow.claim("a"), Err(AppError::Conflict(_))));
        drop(first);
        assert!(h.workflow.claim("a").is_ok());
    }

    #[actix_web::test]
    async fn bulk_approve_reports_each_id() {
        let h = harness(FakePaymentGateway::failing_for(&["EMP-2"]));
        let a = queue(&h, single("EMP-1")).await;
        let b = queue(&h, single("EMP-2")).await;
        let ids = vec![a.id.clone(), b.id.clone(), "missing".to_string()];

        let report = h
            .workflow
            .bulk_approve(&actor("checker", Role::Checker), &ids, None)
            .await
            .unwrap();

        assert_eq!(report.total_count, 3);
        assert_eq!(report.success_count, 1);
        assert_eq!(report.results[0].status, Some(PaymentStatus::Completed));
        assert_eq!(report.results[1].status, Some(PaymentStatus::Failed));
        assert_eq!(report.results[2].status, None);
    }

    #[actix_web::test]
    async fn clearing_the_queue_needs_privilege_and_confirmation() {
        let h = harness(FakePaymentGateway::default());
        let a = queue(&h, single("EMP-1")).await;
        queue(&h, single("EMP-2")).await;
        h.workflow
            .reject(&actor("checker", Role::Checker), &a.id, "dup")
            .await
            .unwrap();

        let admin = actor("admin", Role::Admin);
        assert!(matches!(
            h.workflow.clear_queue(&actor("checker", Role::Checker), true).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.workflow.clear_queue(&admin, false).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(h.workflow.clear_queue(&admin, true).await.unwrap(), 1);
        assert_eq!(h.workflow.list(None).await.unwrap().len(), 1);
    }
}
