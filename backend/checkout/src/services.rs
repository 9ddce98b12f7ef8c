//! Collaborator interfaces the orchestrator is written against.
//!
//! Production uses [`crate::backend::HttpBackend`] for all of them; tests
//! plug in fakes.

use async_trait::async_trait;
use crowdfund::{Amount, Campaign, FundingPlan};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::gateway::PaymentCallback;

/// Body of `POST /api/payment/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: String,
    pub campaign_id: String,
    #[serde(rename = "fundingPlanId")]
    pub plan_id: String,
    #[serde(rename = "totalAmount")]
    pub amount: Amount,
}

/// Gateway-issued reference to a pending payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescriptor {
    /// Backend's own order record, echoed back on verification.
    pub order_id: String,
    pub gateway_order_id: String,
    pub amount: Amount,
    pub currency: String,
}

/// Body of `POST /api/payment/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl VerificationRequest {
    /// Wrap a widget callback without touching any of its fields.
    pub fn forward(callback: &PaymentCallback, order_id: &str, user_id: &str) -> Self {
        Self {
            gateway_order_id: callback.gateway_order_id.clone(),
            gateway_payment_id: callback.gateway_payment_id.clone(),
            signature: callback.signature.clone(),
            order_id: order_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub verified: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User record returned by the upstream auth routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderDescriptor, ServiceError>;
}

#[async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify_payment(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResponse, ServiceError>;
}

#[async_trait]
pub trait CampaignApi: Send + Sync {
    async fn get_campaign(&self, id: &str) -> Result<Campaign, ServiceError>;

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, ServiceError>;
}

#[async_trait]
pub trait FundingPlanApi: Send + Sync {
    async fn plans_for_campaign(&self, campaign_id: &str) -> Result<Vec<FundingPlan>, ServiceError>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthUser, ServiceError>;

    async fn login(&self, request: &LoginRequest) -> Result<AuthUser, ServiceError>;
}
