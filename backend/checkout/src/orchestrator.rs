//! Checkout orchestrator: drives one donation attempt from plan selection to
//! a terminal status.
//!
//! ## Locking
//!
//! The session sits behind a [`tokio::sync::Mutex`] that is never held across
//! a network call. Every entry point checks and sets the status under the
//! lock, releases it for the round trip, then re-locks to commit. A second
//! `initiate_checkout` racing the first therefore sees `initiating` and is
//! rejected without reaching the Order Service.
//!
//! ## Trust
//!
//! Widget callbacks are forwarded verbatim to the Verification Service. The
//! local session is never advanced to `succeeded` on the callback alone, and
//! the collected amount is only ever learnt by re-fetching the campaign.

use std::sync::Arc;
use std::time::Duration;

use crowdfund::{Amount, Campaign, CheckoutStatus, FundingPlan};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::errors::{CheckoutError, GENERIC_FAILURE};
use crate::gateway::{GatewayEvent, PaymentCallback, PaymentGateway, WidgetSession};
use crate::identity::AuthenticatedUser;
use crate::services::{
    CampaignApi, OrderDescriptor, OrderRequest, OrderService, VerificationRequest,
    VerificationService,
};

/// The external services one orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderService>,
    pub verifier: Arc<dyn VerificationService>,
    pub campaigns: Arc<dyn CampaignApi>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// State of the single checkout attempt owned by an orchestrator.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub status: CheckoutStatus,
    pub user_id: Option<String>,
    pub campaign_id: Option<String>,
    pub plan_id: Option<String>,
    pub amount: Option<Amount>,
    pub order_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub last_error: Option<CheckoutError>,
    pub opened_at: Option<Instant>,
    pub last_activity: Instant,
    /// Terminal snapshots not yet written to the attempt log.
    unrecorded: Vec<SessionSnapshot>,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self {
            status: CheckoutStatus::Idle,
            user_id: None,
            campaign_id: None,
            plan_id: None,
            amount: None,
            order_id: None,
            gateway_order_id: None,
            last_error: None,
            opened_at: None,
            last_activity: Instant::now(),
            unrecorded: Vec::new(),
        }
    }
}

impl CheckoutSession {
    fn set_status(&mut self, next: CheckoutStatus) {
        if !self.status.can_transition_to(next) {
            error!(from = %self.status, to = %next, "unexpected checkout transition");
        }
        self.status = next;
        self.last_activity = Instant::now();
    }

    fn fail(&mut self, err: CheckoutError) {
        self.set_status(CheckoutStatus::Failed);
        self.opened_at = None;
        self.last_error = Some(err);
        self.park();
    }

    fn park(&mut self) {
        let snapshot = self.snapshot();
        self.unrecorded.push(snapshot);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            user_id: self.user_id.clone(),
            campaign_id: self.campaign_id.clone(),
            plan_id: self.plan_id.clone(),
            amount: self.amount,
            gateway_order_id: self.gateway_order_id.clone(),
            failure: self.last_error.as_ref().map(FailureView::from),
        }
    }
}

/// Serializable view of a session for the browser and the attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: CheckoutStatus,
    pub user_id: Option<String>,
    pub campaign_id: Option<String>,
    pub plan_id: Option<String>,
    pub amount: Option<Amount>,
    pub gateway_order_id: Option<String>,
    pub failure: Option<FailureView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureView {
    pub kind: &'static str,
    pub message: String,
}

impl From<&CheckoutError> for FailureView {
    fn from(err: &CheckoutError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Returned by a successful `initiate_checkout`: what the browser needs to
/// open the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutTicket {
    pub status: CheckoutStatus,
    pub order: OrderDescriptor,
    pub widget: WidgetSession,
}

/// Result of a verified payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentOutcome {
    pub status: CheckoutStatus,
    pub gateway_payment_id: String,
    /// Authoritative campaign totals after the donation, when the re-fetch
    /// succeeded.
    pub campaign: Option<Campaign>,
}

pub struct CheckoutOrchestrator {
    services: Collaborators,
    session: Mutex<CheckoutSession>,
}

impl CheckoutOrchestrator {
    pub fn new(services: Collaborators) -> Self {
        Self {
            services,
            session: Mutex::new(CheckoutSession::default()),
        }
    }

    pub async fn status(&self) -> CheckoutStatus {
        self.session.lock().await.status
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Start a donation attempt for `plan` on `campaign`.
    pub async fn initiate_checkout(
        &self,
        user: Option<&AuthenticatedUser>,
        campaign: &Campaign,
        plan: &FundingPlan,
    ) -> Result<CheckoutTicket, CheckoutError> {
        let user = user.ok_or(CheckoutError::AuthenticationRequired)?;
        if !plan.belongs_to(campaign) {
            return Err(CheckoutError::PlanNotInCampaign {
                plan_id: plan.id.clone(),
                campaign_id: campaign.id.clone(),
            });
        }
        plan.validate()
            .map_err(|_| CheckoutError::InvalidPlan(plan.id.clone()))?;

        {
            let mut session = self.session.lock().await;
            if session.status.is_active() {
                warn!(
                    user = %user.user_id,
                    status = %session.status,
                    "checkout already in progress, ignoring new request"
                );
                return Err(CheckoutError::CheckoutInProgress);
            }
            let previous = session.status;
            *session = CheckoutSession {
                status: previous,
                user_id: Some(user.user_id.clone()),
                campaign_id: Some(campaign.id.clone()),
                plan_id: Some(plan.id.clone()),
                amount: Some(plan.amount),
                unrecorded: std::mem::take(&mut session.unrecorded),
                ..CheckoutSession::default()
            };
            session.set_status(CheckoutStatus::Initiating);
        }

        info!(
            user = %user.user_id,
            campaign = %campaign.id,
            plan = %plan.id,
            amount = %plan.amount,
            "creating payment order"
        );

        let request = OrderRequest {
            user_id: user.user_id.clone(),
            campaign_id: campaign.id.clone(),
            plan_id: plan.id.clone(),
            amount: plan.amount,
        };

        let order = match self.services.orders.create_order(&request).await {
            Ok(order) => order,
            Err(e) => {
                error!(user = %user.user_id, campaign = %campaign.id, "order creation failed: {e}");
                return Err(self.fail(CheckoutError::order_failed(&e)).await);
            }
        };

        if order.amount != plan.amount {
            error!(
                order = %order.gateway_order_id,
                expected = %plan.amount,
                got = %order.amount,
                "order amount does not match funding plan"
            );
            return Err(self
                .fail(CheckoutError::OrderCreationFailed(GENERIC_FAILURE.to_string()))
                .await);
        }

        let widget = self.services.gateway.create_session(&order, campaign, plan);
        if let Err(e) = self.services.gateway.open(&widget).await {
            error!(order = %order.gateway_order_id, "could not open payment widget: {e}");
            return Err(self
                .fail(CheckoutError::OrderCreationFailed(GENERIC_FAILURE.to_string()))
                .await);
        }

        let mut session = self.session.lock().await;
        session.order_id = Some(order.order_id.clone());
        session.gateway_order_id = Some(order.gateway_order_id.clone());
        session.opened_at = Some(Instant::now());
        session.set_status(CheckoutStatus::AwaitingPayment);
        info!(
            user = %user.user_id,
            order = %order.gateway_order_id,
            "awaiting payment"
        );

        Ok(CheckoutTicket {
            status: session.status,
            order,
            widget,
        })
    }

    /// Verify a success callback from the widget.
    pub async fn handle_payment_callback(
        &self,
        callback: PaymentCallback,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let (order_id, user_id, campaign_id) = {
            let mut session = self.session.lock().await;
            if session.status != CheckoutStatus::AwaitingPayment {
                warn!(
                    status = %session.status,
                    gateway_order = %callback.gateway_order_id,
                    "payment callback without a pending payment"
                );
                return Err(CheckoutError::NoPendingPayment);
            }
            session.set_status(CheckoutStatus::Verifying);
            (
                session.order_id.clone().unwrap_or_default(),
                session.user_id.clone().unwrap_or_default(),
                session.campaign_id.clone().unwrap_or_default(),
            )
        };

        info!(
            user = %user_id,
            gateway_order = %callback.gateway_order_id,
            payment = %callback.gateway_payment_id,
            "verifying payment"
        );

        let request = VerificationRequest::forward(&callback, &order_id, &user_id);
        let failure = match self.services.verifier.verify_payment(&request).await {
            Ok(resp) if resp.verified => None,
            Ok(resp) => Some(CheckoutError::verification_failed(Some(&resp.message))),
            Err(e) => {
                error!(gateway_order = %callback.gateway_order_id, "verification call failed: {e}");
                Some(CheckoutError::verification_failed(e.user_message()))
            }
        };

        if let Some(err) = failure {
            warn!(
                user = %user_id,
                gateway_order = %callback.gateway_order_id,
                "payment verification rejected"
            );
            return Err(self.fail(err).await);
        }

        {
            let mut session = self.session.lock().await;
            session.opened_at = None;
            session.set_status(CheckoutStatus::Succeeded);
            session.park();
        }
        info!(user = %user_id, campaign = %campaign_id, "donation verified");

        let campaign = match self.services.campaigns.get_campaign(&campaign_id).await {
            Ok(campaign) => Some(campaign),
            Err(e) => {
                warn!(campaign = %campaign_id, "could not refresh campaign after payment: {e}");
                None
            }
        };

        Ok(PaymentOutcome {
            status: CheckoutStatus::Succeeded,
            gateway_payment_id: callback.gateway_payment_id,
            campaign,
        })
    }

    /// The payer closed the widget without paying.
    pub async fn handle_dismiss(&self) -> Result<CheckoutStatus, CheckoutError> {
        let mut session = self.session.lock().await;
        if session.status != CheckoutStatus::AwaitingPayment {
            return Err(CheckoutError::NoPendingPayment);
        }
        info!(
            user = ?session.user_id,
            gateway_order = ?session.gateway_order_id,
            "payment widget dismissed"
        );
        Self::cancel(&mut session);
        session.park();
        Ok(session.status)
    }

    pub async fn on_gateway_event(&self, event: GatewayEvent) -> Result<CheckoutStatus, CheckoutError> {
        match event {
            GatewayEvent::PaymentSucceeded(callback) => self
                .handle_payment_callback(callback)
                .await
                .map(|outcome| outcome.status),
            GatewayEvent::Dismissed => self.handle_dismiss().await,
        }
    }

    /// Cancel a session that has waited for payment longer than `ttl`.
    /// Returns the cancelled session, if any.
    pub async fn expire_if_stale(&self, ttl: Duration) -> Option<SessionSnapshot> {
        let mut session = self.session.lock().await;
        let opened_at = session.opened_at?;
        if session.status != CheckoutStatus::AwaitingPayment || opened_at.elapsed() < ttl {
            return None;
        }
        info!(
            user = ?session.user_id,
            gateway_order = ?session.gateway_order_id,
            "expiring abandoned checkout"
        );
        Self::cancel(&mut session);
        Some(session.snapshot())
    }

    /// Drain the terminal snapshots produced by `initiate_checkout`,
    /// `handle_payment_callback` and `handle_dismiss` since the last call.
    /// Each is taken under the same lock as its transition, so a new attempt
    /// started in the meantime cannot hide it. Expiry is reported by
    /// [`Self::expire_if_stale`] instead.
    pub async fn take_unrecorded(&self) -> Vec<SessionSnapshot> {
        std::mem::take(&mut self.session.lock().await.unrecorded)
    }

    /// No attempt in flight and nothing has happened for `ttl`.
    pub async fn is_dormant(&self, ttl: Duration) -> bool {
        let session = self.session.lock().await;
        !session.status.is_active() && session.last_activity.elapsed() >= ttl
    }

    async fn fail(&self, err: CheckoutError) -> CheckoutError {
        let mut session = self.session.lock().await;
        session.fail(err.clone());
        err
    }

    fn cancel(session: &mut CheckoutSession) {
        session.set_status(CheckoutStatus::Cancelled);
        session.opened_at = None;
        session.last_error = Some(CheckoutError::UserCancelled);
    }
}
