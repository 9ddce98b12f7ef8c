//! HTTP client for the upstream `/api/*` backend.
//!
//! ## Resilience
//!
//! * Catalogue reads (campaigns, funding plans) are idempotent and are retried
//!   with exponential back-off on connect/timeout errors and `429` responses,
//!   up to `read_retries` attempts.
//! * Payment calls (`/api/payment/create`, `/api/payment/verify`) and auth
//!   calls are sent exactly once. There is no idempotency key upstream, so a
//!   retry could create a second order.

use std::time::Duration;

use async_trait::async_trait;
use crowdfund::{Amount, Campaign, FundingPlan};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::services::{
    AuthApi, AuthUser, CampaignApi, FundingPlanApi, LoginRequest, OrderDescriptor, OrderRequest,
    OrderService, RegisterRequest, VerificationRequest, VerificationResponse,
    VerificationService,
};

const INITIAL_BACKOFF_MS: u64 = 200;
const MAX_BACKOFF_MS: u64 = 2_000;

// ─────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    order_id: String,
    #[serde(alias = "razorpayOrder")]
    gateway_order: GatewayOrder,
}

#[derive(Debug, Deserialize)]
struct GatewayOrder {
    id: String,
    amount: Amount,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: AuthUser,
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    currency: String,
    read_retries: u32,
}

impl HttpBackend {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        currency: impl Into<String>,
        read_retries: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            currency: currency.into(),
            read_retries: read_retries.max(1),
        }
    }

    /// `base_url` extended by `segments`, each percent-encoded as one path
    /// segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, ServiceError> {
        let path = url.path().to_string();
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut attempt = 1;

        loop {
            match self.client.get(url.clone()).query(query).send().await {
                Err(e) if attempt < self.read_retries && (e.is_connect() || e.is_timeout()) => {
                    warn!("GET {path} failed (attempt {attempt}, retry in {backoff}ms): {e}");
                }
                Err(e) => return Err(e.into()),
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS
                    && attempt < self.read_retries =>
                {
                    warn!("GET {path} rate-limited (attempt {attempt}, retry in {backoff}ms)");
                }
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    return Err(ServiceError::NotFound(what.to_string()));
                }
                Ok(resp) => return decode(resp).await,
            }

            tokio::time::sleep(Duration::from_millis(backoff)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF_MS);
            attempt += 1;
        }
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ServiceError> {
        let resp = self.client.post(self.url(segments)?).json(body).send().await?;
        decode(resp).await
    }
}

/// Turn a response into `T`, or into `Rejected` carrying the backend's message.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_default();
        debug!("backend answered {status}: {message}");
        return Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}

#[async_trait]
impl OrderService for HttpBackend {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderDescriptor, ServiceError> {
        let resp: CreateOrderResponse = self.post_json(&["api", "payment", "create"], request).await?;
        Ok(OrderDescriptor {
            order_id: resp.order_id,
            gateway_order_id: resp.gateway_order.id,
            amount: resp.gateway_order.amount,
            currency: resp
                .gateway_order
                .currency
                .unwrap_or_else(|| self.currency.clone()),
        })
    }
}

#[async_trait]
impl VerificationService for HttpBackend {
    async fn verify_payment(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResponse, ServiceError> {
        self.post_json(&["api", "payment", "verify"], request).await
    }
}

#[async_trait]
impl CampaignApi for HttpBackend {
    async fn get_campaign(&self, id: &str) -> Result<Campaign, ServiceError> {
        let url = self.url(&["api", "campaigns", id])?;
        self.get_json(url, &[], &format!("campaign {id}")).await
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, ServiceError> {
        let url = self.url(&["api", "campaigns"])?;
        self.get_json(url, &[], "campaigns").await
    }
}

#[async_trait]
impl FundingPlanApi for HttpBackend {
    async fn plans_for_campaign(&self, campaign_id: &str) -> Result<Vec<FundingPlan>, ServiceError> {
        let url = self.url(&["api", "funding-plans"])?;
        let mut plans: Vec<FundingPlan> = self
            .get_json(
                url,
                &[("campaign_id", campaign_id)],
                &format!("funding plans for campaign {campaign_id}"),
            )
            .await?;
        for plan in plans.iter_mut().filter(|p| p.campaign_id.is_empty()) {
            plan.campaign_id = campaign_id.to_string();
        }
        Ok(plans)
    }
}

#[async_trait]
impl AuthApi for HttpBackend {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthUser, ServiceError> {
        let resp: AuthResponse = self.post_json(&["api", "auth", "register"], request).await?;
        Ok(resp.user)
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthUser, ServiceError> {
        let resp: AuthResponse = self.post_json(&["api", "auth", "login"], request).await?;
        Ok(resp.user)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
