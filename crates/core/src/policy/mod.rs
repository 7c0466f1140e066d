//! Per-balance-type policy.
//!
//! - `registry` - configuration-driven metadata (priority, expiry, pools)
//! - `engine` - the external decision seam consulted before reserving

pub mod engine;
pub mod registry;

pub use engine::{ConsumptionRequest, PassThroughPolicy, PolicyDecision, PolicyEngine};
pub use registry::PolicyRegistry;
