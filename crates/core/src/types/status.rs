//! Status enums for orders, payments and profiles.

use serde::{Deserialize, Serialize};

/// Order status stored on the Supabase `orders` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Snap token issued, waiting for the customer.
    #[default]
    Pending,
    /// Payment settled (or card captured).
    Paid,
    /// Payment denied by the gateway.
    Failed,
    /// Cancelled by the customer or merchant.
    Cancelled,
    /// Payment window expired.
    Expired,
    /// Refunded after payment.
    Refunded,
    /// Handed to the courier.
    Shipped,
    /// Delivered to the recipient.
    Completed,
}

impl OrderStatus {
    /// Map a Midtrans `transaction_status` (and `fraud_status` for card
    /// captures) to an order status.
    ///
    /// Returns `None` for statuses that do not change the order, such as
    /// `authorize`.
    #[must_use]
    pub fn from_midtrans(transaction_status: &str, fraud_status: Option<&str>) -> Option<Self> {
        match transaction_status {
            "capture" => match fraud_status {
                Some("challenge") => Some(Self::Pending),
                Some("deny") => Some(Self::Failed),
                _ => Some(Self::Paid),
            },
            "settlement" => Some(Self::Paid),
            "pending" => Some(Self::Pending),
            "deny" | "failure" => Some(Self::Failed),
            "cancel" => Some(Self::Cancelled),
            "expire" => Some(Self::Expired),
            "refund" | "partial_refund" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Whether the order can no longer be paid.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Value stored in the database column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Profile role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper.
    #[default]
    Customer,
    /// Sells products through the vendor dashboard.
    Vendor,
    /// Full access to the admin dashboard.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" | "user" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midtrans_mapping() {
        assert_eq!(OrderStatus::from_midtrans("settlement", None), Some(OrderStatus::Paid));
        assert_eq!(
            OrderStatus::from_midtrans("capture", Some("accept")),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            OrderStatus::from_midtrans("capture", Some("challenge")),
            Some(OrderStatus::Pending)
        );
        assert_eq!(OrderStatus::from_midtrans("expire", None), Some(OrderStatus::Expired));
        assert_eq!(OrderStatus::from_midtrans("authorize", None), None);
    }

    #[test]
    fn test_order_status_roundtrip_str() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Shipped] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_role_parse_accepts_legacy_user() {
        assert_eq!("user".parse::<Role>(), Ok(Role::Customer));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }
}
