//! Portal Leads → CRM Webhook Library
//!
//! Receives lead notifications from real-estate listing portals and forwards
//! them to the CRM, as a new lead or as an activity on the lead that already
//! owns the contact's phone or email.
//!
//! # Modules
//!
//! - `api`: API-layer namespace.
//! - `core`: Business logic namespace.
//! - `integrations`: External service namespace.
//! - `config`: Configuration management.
//! - `crm_client`: CRM webhook RPC client and duplicate lookup.
//! - `dispatch`: Duplicate decision and lead/activity creation.
//! - `errors`: Error handling types.
//! - `handlers`: Shared state and health check.
//! - `normalizer`: Payload parsing and normalization.
//! - `portal_handler`: Portal webhook handler.
//! - `portal_models`: Inbound payload and response models.
//! - `server`: Router and middleware.

pub mod api;
pub mod core;
pub mod integrations;

pub mod config;
pub mod crm_client;
pub mod dispatch;
pub mod errors;
pub mod handlers;
pub mod normalizer;
pub mod portal_handler;
pub mod portal_models;
pub mod server;
