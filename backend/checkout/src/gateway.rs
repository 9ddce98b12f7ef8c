//! Payment gateway client interface and the hosted-widget implementation.
//!
//! The gateway's checkout widget runs in the browser. The orchestrator only
//! ever sees it through [`PaymentGateway`]: a widget session is created from
//! an order, opened once, and its outcome comes back as a [`GatewayEvent`].

use std::time::Duration;

use async_trait::async_trait;
use crowdfund::{Amount, Campaign, FundingPlan};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::services::OrderDescriptor;

type HmacSha256 = Hmac<Sha256>;

/// Success callback produced by the widget. Untrusted until verified
/// server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Outcome reported by an open widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentSucceeded(PaymentCallback),
    Dismissed,
}

/// Everything the browser needs to open the vendor widget for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSession {
    pub key: String,
    pub amount: Amount,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub theme_color: String,
    /// Seconds after which the widget closes itself.
    pub timeout: u64,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment widget unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn create_session(
        &self,
        order: &OrderDescriptor,
        campaign: &Campaign,
        plan: &FundingPlan,
    ) -> WidgetSession;

    async fn open(&self, session: &WidgetSession) -> Result<(), GatewayError>;
}

const DEFAULT_CHECKOUT_TTL: Duration = Duration::from_secs(900);
const MAX_CLOSE_MARGIN_SECS: u64 = 60;

/// Widget lifetime for a session that the server expires after
/// `checkout_ttl`. Always shorter than the TTL (for TTLs of two seconds or
/// more), so a payment finished just before the widget closes still finds
/// its session awaiting it.
pub fn widget_timeout_secs(checkout_ttl: Duration) -> u64 {
    let ttl = checkout_ttl.as_secs();
    ttl.saturating_sub((ttl / 2).clamp(1, MAX_CLOSE_MARGIN_SECS))
}

/// Widget rendered by the browser from the returned [`WidgetSession`].
#[derive(Debug, Clone)]
pub struct HostedWidget {
    pub key_id: String,
    pub merchant_name: String,
    pub theme_color: String,
    pub timeout_secs: u64,
}

impl HostedWidget {
    pub fn new(key_id: impl Into<String>, merchant_name: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            merchant_name: merchant_name.into(),
            theme_color: "#4F46E5".to_string(),
            timeout_secs: widget_timeout_secs(DEFAULT_CHECKOUT_TTL),
        }
    }

    /// Close widgets before the sweeper expires their sessions.
    pub fn with_checkout_ttl(mut self, checkout_ttl: Duration) -> Self {
        self.timeout_secs = widget_timeout_secs(checkout_ttl);
        self
    }
}

#[async_trait]
impl PaymentGateway for HostedWidget {
    fn create_session(
        &self,
        order: &OrderDescriptor,
        campaign: &Campaign,
        plan: &FundingPlan,
    ) -> WidgetSession {
        WidgetSession {
            key: self.key_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            name: self.merchant_name.clone(),
            description: format!("Donation for {} ({})", campaign.title, plan.title),
            order_id: order.gateway_order_id.clone(),
            theme_color: self.theme_color.clone(),
            timeout: self.timeout_secs,
        }
    }

    async fn open(&self, session: &WidgetSession) -> Result<(), GatewayError> {
        if self.key_id.is_empty() {
            return Err(GatewayError::Unavailable("no gateway key configured".to_string()));
        }
        debug!(order = %session.order_id, "widget session handed to browser");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Callback signatures
// ─────────────────────────────────────────────────────────

/// Signature the gateway attaches to a genuine callback:
/// `hex(hmac_sha256(secret, "{order_id}|{payment_id}"))`.
pub fn expected_signature(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a callback's signature.
pub fn verify_signature(secret: &str, callback: &PaymentCallback) -> bool {
    let Ok(provided) = hex::decode(&callback.signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(callback.gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(callback.gateway_payment_id.as_bytes());
    mac.verify_slice(&provided).is_ok()
}
