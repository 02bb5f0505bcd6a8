//! Order entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, Principal, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

use super::{NewOrderItem, OrderItem, OrderStatus};

/// An order and its fixed set of lines.
///
/// Items are fixed at creation; the status is the only thing that
/// changes afterwards. Orders are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    owner: String,
    status: OrderStatus,
    /// Lines in submission order.
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new pending order from checkout lines.
    ///
    /// Fails if there are no lines or any line has a non-positive
    /// quantity. Duplicate products are kept as separate lines.
    pub fn place(owner: impl Into<String>, lines: &[NewOrderItem]) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let id = OrderId::new();
        let items = lines
            .iter()
            .map(|line| {
                Ok(OrderItem {
                    id: OrderItemId::new(),
                    order_id: id,
                    product_id: line.product_id,
                    quantity: line.validated_quantity()?,
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        let now = Utc::now();
        Ok(Self {
            id,
            owner: owner.into(),
            status: OrderStatus::Pending,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an order from persisted parts.
    pub fn from_parts(
        id: OrderId,
        owner: String,
        status: OrderStatus,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            status,
            items,
            created_at,
            updated_at,
        }
    }

    /// Moves a pending order to confirmed.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if !self.status.can_confirm() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "confirm",
            });
        }
        self.transition(OrderStatus::Confirmed);
        Ok(())
    }

    /// Checks that the order may be cancelled without changing it.
    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::AlreadyCancelled(self.id));
        }
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "cancel",
            });
        }
        Ok(())
    }

    /// Moves a pending or confirmed order to cancelled.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.ensure_cancellable()?;
        self.transition(OrderStatus::Cancelled);
        Ok(())
    }

    fn transition(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the owning email address.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the lines in submission order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the total quantity requested per distinct product.
    ///
    /// Keys are ordered, which gives every caller the same lock
    /// acquisition order for a given set of products.
    pub fn demand(&self) -> BTreeMap<ProductId, i64> {
        let mut demand = BTreeMap::new();
        for item in &self.items {
            *demand.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
        }
        demand
    }

    /// Returns true if the principal placed this order.
    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        self.owner.eq_ignore_ascii_case(&principal.email)
    }

    /// Returns true if the principal may read or cancel this order.
    pub fn is_accessible_by(&self, principal: &Principal) -> bool {
        principal.is_admin() || self.is_owned_by(principal)
    }
}
