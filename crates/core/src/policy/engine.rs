//! Policy engine seam.
//!
//! The engine owns business rules the ledger does not know about (working-day
//! calendars, hour conversions, who may overdraw). It turns a raw consumption
//! request into the amount, balance type and override flag to reserve.

use std::future::Future;

use chrono::{DateTime, Utc};
use entitle_shared::types::{BalanceType, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerError, ReferenceType};

/// A request to consume entitlement, as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRequest {
    /// Whose balance is consumed.
    pub subject_id: SubjectId,
    /// Balance type requested.
    pub balance_type: BalanceType,
    /// Amount requested.
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id; one reservation per id.
    pub reference_id: String,
    /// Whether the caller asks to overdraw.
    #[serde(default)]
    pub allow_negative: bool,
    /// Explicit reservation deadline; the configured TTL applies otherwise.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Who submitted the request.
    #[serde(default)]
    pub created_by: Option<UserId>,
}

/// What the policy engine decided for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Balance type to reserve against.
    pub balance_type: BalanceType,
    /// Amount to reserve.
    pub amount: Decimal,
    /// Whether the reservation may overdraw.
    pub allow_negative: bool,
}

/// External policy engine.
pub trait PolicyEngine: Send + Sync {
    /// Evaluates a consumption request.
    fn evaluate(
        &self,
        request: &ConsumptionRequest,
    ) -> impl Future<Output = Result<PolicyDecision, LedgerError>> + Send;
}

/// Policy engine that trusts the request as submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughPolicy;

impl PolicyEngine for PassThroughPolicy {
    async fn evaluate(&self, request: &ConsumptionRequest) -> Result<PolicyDecision, LedgerError> {
        Ok(PolicyDecision {
            balance_type: request.balance_type,
            amount: request.amount,
            allow_negative: request.allow_negative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_pass_through_copies_request() {
        let request = ConsumptionRequest {
            subject_id: SubjectId::new(),
            balance_type: BalanceType::Rol,
            amount: dec!(4),
            reference_type: ReferenceType::LeaveRequest,
            reference_id: "LR-1".to_string(),
            allow_negative: true,
            expires_at: None,
            created_by: None,
        };
        let decision = PassThroughPolicy.evaluate(&request).await.unwrap();
        assert_eq!(
            decision,
            PolicyDecision {
                balance_type: BalanceType::Rol,
                amount: dec!(4),
                allow_negative: true,
            }
        );
    }
}
