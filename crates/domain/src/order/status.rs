//! Order lifecycle state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed
///    │            │
///    └────────────┴──► Cancelled
/// ```
///
/// Stock is reserved when an order is created and restored when it is
/// cancelled. Confirmation has no stock side effect, so cancelling a
/// confirmed order (a void) restores exactly what a pending cancel would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Stock is reserved, sale not yet finalized.
    #[default]
    Pending,

    /// Sale finalized by an administrator.
    Confirmed,

    /// Order withdrawn and its stock returned (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be confirmed in this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if the order still holds reserved stock.
    pub fn holds_stock(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}
