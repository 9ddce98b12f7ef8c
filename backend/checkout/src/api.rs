//! Axum storefront API.
//!
//! Every checkout route requires `Authorization: Bearer <token>` with a token
//! issued by `/auth/login` or `/auth/register`. Failures are rendered as
//! `{"error": ..., "kind": ...}`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use crowdfund::{Campaign, CheckoutStatus, FundingPlan, FundingProgress};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error};

use crate::db::{self, AttemptRecord};
use crate::errors::{AppError, CheckoutError, ServiceError, GENERIC_FAILURE};
use crate::gateway::PaymentCallback;
use crate::identity::{bearer_token, AuthenticatedUser, TokenSigner};
use crate::orchestrator::{CheckoutOrchestrator, CheckoutSession, CheckoutTicket, SessionSnapshot};
use crate::registry::SessionRegistry;
use crate::services::{AuthApi, AuthUser, CampaignApi, FundingPlanApi, LoginRequest, RegisterRequest};

pub struct ApiState {
    pub pool: SqlitePool,
    pub registry: Arc<SessionRegistry>,
    pub auth: Arc<dyn AuthApi>,
    pub campaigns: Arc<dyn CampaignApi>,
    pub plans: Arc<dyn FundingPlanApi>,
    pub signer: TokenSigner,
    pub currency: String,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(get_campaign))
        .route("/checkout", get(checkout_status).post(start_checkout))
        .route("/checkout/callback", post(payment_callback))
        .route("/checkout/dismiss", post(dismiss_checkout))
        .route("/checkout/attempts", get(checkout_attempts))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Upstream(#[from] ServiceError),

    #[error(transparent)]
    Internal(#[from] AppError),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Checkout(err) => {
                let status = match err {
                    CheckoutError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
                    CheckoutError::CheckoutInProgress
                    | CheckoutError::NoPendingPayment
                    | CheckoutError::UserCancelled => StatusCode::CONFLICT,
                    CheckoutError::PlanNotInCampaign { .. } | CheckoutError::InvalidPlan(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    CheckoutError::OrderCreationFailed(_) => StatusCode::BAD_GATEWAY,
                    CheckoutError::VerificationFailed(_) => StatusCode::PAYMENT_REQUIRED,
                };
                (status, err.kind(), err.to_string())
            }
            ApiError::Upstream(ServiceError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
            ApiError::Upstream(ServiceError::Rejected { status, message })
                if (400..500).contains(&status) && !message.is_empty() =>
            {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
                (status, "rejected", message)
            }
            ApiError::Upstream(e) => {
                error!("upstream call failed: {e}");
                (StatusCode::BAD_GATEWAY, "upstream_unavailable", GENERIC_FAILURE.to_string())
            }
            ApiError::Internal(e) => {
                error!("internal error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", GENERIC_FAILURE.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message, kind })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: AuthUser,
}

/// A campaign with its funding progress and display amounts.
#[derive(Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub progress: FundingProgress,
    pub raised_display: String,
    pub goal_display: String,
}

impl CampaignView {
    fn new(campaign: Campaign, currency: &str) -> Self {
        Self {
            progress: campaign.progress(),
            raised_display: campaign.collected.format_major(currency),
            goal_display: campaign.goal.format_major(currency),
            campaign,
        }
    }
}

#[derive(Serialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: FundingPlan,
    pub amount_display: String,
}

#[derive(Serialize)]
pub struct CampaignsResponse {
    pub count: usize,
    pub campaigns: Vec<CampaignView>,
}

#[derive(Serialize)]
pub struct CampaignDetailResponse {
    #[serde(flatten)]
    pub campaign: CampaignView,
    pub plans: Vec<PlanView>,
}

#[derive(Debug, Deserialize)]
pub struct StartCheckout {
    pub campaign_id: String,
    pub plan_id: String,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub status: CheckoutStatus,
    pub gateway_payment_id: String,
    pub campaign: Option<CampaignView>,
}

#[derive(Serialize)]
pub struct AttemptsResponse {
    pub count: usize,
    pub attempts: Vec<AttemptRecord>,
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<AuthenticatedUser, CheckoutError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(CheckoutError::AuthenticationRequired)?;

    state.signer.verify(token, Utc::now()).map_err(|e| {
        debug!("rejected identity token: {e}");
        CheckoutError::AuthenticationRequired
    })
}

/// Append the attempts this orchestrator finished to the attempt log. A
/// failed write is logged and does not change the response.
async fn record(state: &ApiState, orchestrator: &CheckoutOrchestrator) {
    for snapshot in orchestrator.take_unrecorded().await {
        if let Err(e) = db::record_attempt(&state.pool, &snapshot).await {
            error!(
                user = ?snapshot.user_id,
                gateway_order = ?snapshot.gateway_order_id,
                "Failed to record checkout attempt: {e}"
            );
        }
    }
}

fn token_response(state: &ApiState, user: AuthUser) -> TokenResponse {
    TokenResponse {
        token: state.signer.issue(&user.id, Utc::now()),
        user,
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<TokenResponse> {
    let user = state.auth.register(&body).await?;
    Ok(Json(token_response(&state, user)))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let user = state.auth.login(&body).await?;
    Ok(Json(token_response(&state, user)))
}

/// `GET /campaigns`
pub async fn list_campaigns(State(state): State<Arc<ApiState>>) -> ApiResult<CampaignsResponse> {
    let campaigns: Vec<_> = state
        .campaigns
        .list_campaigns()
        .await?
        .into_iter()
        .map(|c| CampaignView::new(c, &state.currency))
        .collect();

    Ok(Json(CampaignsResponse {
        count: campaigns.len(),
        campaigns,
    }))
}

/// `GET /campaigns/:id`
///
/// The campaign, its progress, and the funding plans it offers.
pub async fn get_campaign(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<CampaignDetailResponse> {
    let campaign = state.campaigns.get_campaign(&id).await?;
    let plans = state
        .plans
        .plans_for_campaign(&campaign.id)
        .await?
        .into_iter()
        .map(|plan| PlanView {
            amount_display: plan.amount.format_major(&state.currency),
            plan,
        })
        .collect();

    Ok(Json(CampaignDetailResponse {
        campaign: CampaignView::new(campaign, &state.currency),
        plans,
    }))
}

/// `POST /checkout`
///
/// Creates an order and returns what the browser needs to open the widget.
pub async fn start_checkout(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<StartCheckout>,
) -> ApiResult<CheckoutTicket> {
    let user = authenticate(&state, &headers)?;

    let campaign = state.campaigns.get_campaign(&body.campaign_id).await?;
    let plan = state
        .plans
        .plans_for_campaign(&campaign.id)
        .await?
        .into_iter()
        .find(|p| p.id == body.plan_id)
        .ok_or_else(|| CheckoutError::PlanNotInCampaign {
            plan_id: body.plan_id.clone(),
            campaign_id: campaign.id.clone(),
        })?;

    let orchestrator = state.registry.for_user(&user.user_id).await;
    let result = orchestrator.initiate_checkout(Some(&user), &campaign, &plan).await;
    record(&state, &orchestrator).await;
    Ok(Json(result?))
}

/// `POST /checkout/callback`
///
/// Success payload from the widget; forwarded for server-side verification.
pub async fn payment_callback(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(callback): Json<PaymentCallback>,
) -> ApiResult<PaymentResponse> {
    let user = authenticate(&state, &headers)?;
    let orchestrator = state
        .registry
        .get(&user.user_id)
        .await
        .ok_or(CheckoutError::NoPendingPayment)?;

    let result = orchestrator.handle_payment_callback(callback).await;
    record(&state, &orchestrator).await;
    let outcome = result?;

    Ok(Json(PaymentResponse {
        status: outcome.status,
        gateway_payment_id: outcome.gateway_payment_id,
        campaign: outcome
            .campaign
            .map(|c| CampaignView::new(c, &state.currency)),
    }))
}

/// `POST /checkout/dismiss`
pub async fn dismiss_checkout(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> ApiResult<SessionSnapshot> {
    let user = authenticate(&state, &headers)?;
    let orchestrator = state
        .registry
        .get(&user.user_id)
        .await
        .ok_or(CheckoutError::NoPendingPayment)?;

    orchestrator.handle_dismiss().await?;
    let snapshot = orchestrator.snapshot().await;
    record(&state, &orchestrator).await;
    Ok(Json(snapshot))
}

/// `GET /checkout`
pub async fn checkout_status(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> ApiResult<SessionSnapshot> {
    let user = authenticate(&state, &headers)?;
    let snapshot = match state.registry.get(&user.user_id).await {
        Some(orchestrator) => orchestrator.snapshot().await,
        None => CheckoutSession::default().snapshot(),
    };
    Ok(Json(snapshot))
}

/// `GET /checkout/attempts`
pub async fn checkout_attempts(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> ApiResult<AttemptsResponse> {
    let user = authenticate(&state, &headers)?;
    let attempts = db::attempts_for_user(&state.pool, &user.user_id).await?;
    Ok(Json(AttemptsResponse {
        count: attempts.len(),
        attempts,
    }))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
