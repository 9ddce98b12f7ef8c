//! Donation checkout for the NGO crowdfunding marketplace.
//!
//! The [`orchestrator`] drives one donation attempt per user through order
//! creation, the hosted payment widget and server-side verification. The
//! [`api`] module exposes it to the browser; [`backend`] talks to the upstream
//! REST services; [`db`] keeps an append-only log of finished attempts.

pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod errors;
pub mod gateway;
pub mod identity;
pub mod orchestrator;
pub mod registry;
pub mod services;

#[cfg(test)]
mod test_support;
