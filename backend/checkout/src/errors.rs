//! Application-wide error types.
//!
//! [`AppError`] covers infrastructure (database, HTTP, config).
//! [`ServiceError`] is what the upstream collaborators return.
//! [`CheckoutError`] is the only error kind that reaches the browser from the
//! checkout flow; the orchestrator converts everything else into it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure reported by an upstream REST collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status. `message` is the
    /// backend's own human-readable explanation when it sent one.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl ServiceError {
    /// Message that may be shown to the user as-is, if any. Only client
    /// errors qualify; a 5xx body may carry internals.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { status, message }
                if (400..500).contains(status) && !message.is_empty() =>
            {
                Some(message)
            }
            _ => None,
        }
    }
}

pub const GENERIC_FAILURE: &str = "Something went wrong. Try again later.";
pub const CONTACT_SUPPORT: &str = "Payment verification failed. Please contact support.";

/// Checkout failures as the browser sees them.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Please log in before donating.")]
    AuthenticationRequired,

    #[error("{0}")]
    OrderCreationFailed(String),

    #[error("{0}")]
    VerificationFailed(String),

    #[error("Payment cancelled.")]
    UserCancelled,

    #[error("A checkout is already in progress.")]
    CheckoutInProgress,

    #[error("No payment is awaiting confirmation.")]
    NoPendingPayment,

    #[error("Funding plan {plan_id} is not offered by campaign {campaign_id}.")]
    PlanNotInCampaign {
        plan_id: String,
        campaign_id: String,
    },

    #[error("Funding plan {0} is not valid for payment.")]
    InvalidPlan(String),
}

impl CheckoutError {
    /// Stable identifier for API payloads and the attempt log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::OrderCreationFailed(_) => "order_creation_failed",
            Self::VerificationFailed(_) => "verification_failed",
            Self::UserCancelled => "user_cancelled",
            Self::CheckoutInProgress => "checkout_in_progress",
            Self::NoPendingPayment => "no_pending_payment",
            Self::PlanNotInCampaign { .. } => "plan_not_in_campaign",
            Self::InvalidPlan(_) => "invalid_plan",
        }
    }

    /// Cancellation ends an attempt without being an error worth showing.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::UserCancelled)
    }

    pub(crate) fn order_failed(err: &ServiceError) -> Self {
        let message = err.user_message().unwrap_or(GENERIC_FAILURE);
        Self::OrderCreationFailed(message.to_string())
    }

    pub(crate) fn verification_failed(message: Option<&str>) -> Self {
        match message {
            Some(m) if !m.is_empty() => {
                Self::VerificationFailed(format!("Payment verification failed: {m}"))
            }
            _ => Self::VerificationFailed(CONTACT_SUPPORT.to_string()),
        }
    }
}
