//! # Crowdfund
//!
//! Domain crate for the NGO crowdfunding checkout. It carries no I/O: the
//! HTTP clients, the orchestrator and the storefront server live in
//! `backend/checkout` and build on the types exported here.
//!
//! | Concern          | Item(s)                                        |
//! |------------------|------------------------------------------------|
//! | Money            | [`Amount`]                                     |
//! | Catalogue        | [`Campaign`], [`FundingPlan`]                  |
//! | Progress display | [`FundingProgress`], [`percent_funded`]        |
//! | Checkout FSM     | [`CheckoutStatus`]                             |
//!
//! Enable the `testutils` feature to get the [`invariants`] assertion
//! helpers in downstream test suites.

mod types;

#[cfg(any(test, feature = "testutils"))]
pub mod invariants;

#[cfg(test)]
mod test_funding;

pub use types::{percent_funded, Amount, Campaign, CheckoutStatus, FundingPlan, FundingProgress};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid checkout transition from {from} to {to}")]
    InvalidTransition {
        from: CheckoutStatus,
        to: CheckoutStatus,
    },

    #[error("funding plan {0} has a non-positive amount")]
    NonPositiveAmount(String),
}
