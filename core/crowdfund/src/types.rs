//! # Types
//!
//! Shared data structures used by every layer of the checkout flow.
//!
//! ## Design decisions
//!
//! ### Minor units everywhere
//!
//! [`Amount`] always holds minor currency units (paise for INR). The upstream
//! wire field `amount_cents` is read as minor units as well; the only place an
//! amount is divided by 100 is [`Amount::format_major`], which is display code.
//!
//! ### Checkout status as a Finite-State Machine
//!
//! [`CheckoutStatus`] enforces the donation lifecycle:
//!
//! ```text
//! Idle ──► Initiating ──► AwaitingPayment ──► Verifying ──► Succeeded
//!               │                │                 │
//!               └──► Failed ◄────┼─────────────────┘
//!                                └──► Cancelled
//! ```
//!
//! `Succeeded`, `Failed` and `Cancelled` are terminal for one attempt. A new
//! attempt may start from any terminal state (or `Idle`); nothing else may
//! move back to `Initiating`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A monetary amount in minor currency units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn minor_units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Render as major units with a currency prefix, e.g. `₹500.00`.
    pub fn format_major(self, currency: &str) -> String {
        let symbol = match currency {
            "INR" => "₹".to_string(),
            "USD" => "$".to_string(),
            "EUR" => "€".to_string(),
            other => format!("{other} "),
        };
        format!("{symbol}{self}")
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value)
    }
}

/// A fundraising effort run by an NGO.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "goal_amount")]
    pub goal: Amount,
    #[serde(rename = "collected_amount", default)]
    pub collected: Amount,
    #[serde(rename = "ngo_name", default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Campaign {
    /// Funding progress derived from the goal and the collected total.
    pub fn progress(&self) -> FundingProgress {
        FundingProgress::new(self.goal, self.collected)
    }
}

/// A selectable donation tier attached to one campaign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingPlan {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Not sent by the plan listing; filled in from the query by the client.
    #[serde(default)]
    pub campaign_id: String,
    pub title: String,
    #[serde(rename = "amount_cents")]
    pub amount: Amount,
    /// Recurrence label as configured upstream (`one-time`, `monthly`, ...).
    pub interval: String,
    #[serde(rename = "ps_provider_plan_id", default)]
    pub provider_plan_id: String,
}

impl FundingPlan {
    pub fn belongs_to(&self, campaign: &Campaign) -> bool {
        self.campaign_id == campaign.id
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.amount.is_zero() {
            return Err(Error::NonPositiveAmount(self.id.clone()));
        }
        Ok(())
    }
}

/// Funding percentages for a campaign.
///
/// `percent` is the raw rounded value and may exceed 100 for over-funded
/// campaigns; `progress_percent` is clamped for progress bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingProgress {
    pub goal: Amount,
    pub raised: Amount,
    pub percent: u64,
    pub progress_percent: u8,
}

impl FundingProgress {
    pub fn new(goal: Amount, raised: Amount) -> Self {
        let percent = percent_funded(goal, raised);
        Self {
            goal,
            raised,
            percent,
            progress_percent: percent.min(100) as u8,
        }
    }

    pub fn is_fully_funded(&self) -> bool {
        self.percent >= 100
    }
}

/// `round(raised / goal * 100)` with half-up rounding. A zero goal yields 0.
pub fn percent_funded(goal: Amount, raised: Amount) -> u64 {
    if goal.is_zero() {
        return 0;
    }
    let goal = u128::from(goal.0);
    let scaled = u128::from(raised.0) * 100;
    let rounded = (scaled + goal / 2) / goal;
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// Lifecycle status of one checkout attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckoutStatus {
    /// No attempt in flight.
    #[default]
    Idle,
    /// Order creation requested from the backend.
    Initiating,
    /// Gateway widget is open; waiting for the payer.
    AwaitingPayment,
    /// Payment callback forwarded for signature verification.
    Verifying,
    /// Donation verified and committed.
    Succeeded,
    /// Order creation or verification failed.
    Failed,
    /// Payer dismissed the widget.
    Cancelled,
}

impl CheckoutStatus {
    /// An attempt is in flight and must not be restarted.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Initiating | Self::AwaitingPayment | Self::Verifying
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: CheckoutStatus) -> bool {
        use CheckoutStatus::*;
        matches!(
            (self, next),
            (Idle | Succeeded | Failed | Cancelled, Initiating)
                | (Initiating, AwaitingPayment)
                | (Initiating, Failed)
                | (AwaitingPayment, Verifying)
                | (AwaitingPayment, Cancelled)
                | (Verifying, Succeeded)
                | (Verifying, Failed)
        )
    }

    /// Checked transition; returns the new status or the rejected edge.
    pub fn transition(self, next: CheckoutStatus) -> Result<CheckoutStatus, Error> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initiating => "initiating",
            Self::AwaitingPayment => "awaiting-payment",
            Self::Verifying => "verifying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
