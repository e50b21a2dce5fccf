//! briefmatch library crate
//!
//! Matches a new marketing brief against a library of past campaign ideas
//! and case studies by delegating the conceptual ranking to a hosted model,
//! then validating and reconciling the answer locally. Budget-aware mode
//! adds a deterministic budget scaler on top.

pub mod budget;
pub mod client;
pub mod config;
pub mod error;
pub mod library;
pub mod matcher;
pub mod record;
pub mod request;
pub mod response;
