//! Slated: schedule media posts for future publication.
//!
//! Accounts sign up with email + 5-digit verification or via Google
//! OAuth, link a TikTok creator account, and queue content that a
//! timer-driven scheduler publishes at the requested moment, with
//! bounded retries and a grace window for downtime.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod mailer;
pub mod platform;
pub mod scheduler;
pub mod server;
pub mod tokens;
