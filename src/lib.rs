//! Tender lifecycle and bidding backend for a home-improvement marketplace.
//!
//! The [`engine`] owns every rule about tenders, invitations, bids,
//! selection and progress. The HTTP layer in [`routes`] is a thin shell
//! around it.

pub mod api;
pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;
