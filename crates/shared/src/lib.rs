//! Shared types and configuration for Entitle.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The closed `BalanceType` vocabulary and per-type policy data
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, LedgerConfig, SweepConfig};
