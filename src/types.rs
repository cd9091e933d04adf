/// Shared enums used by models, services and handlers

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// User roles, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Manager,
    Admin,
}

text_enum!(Role, "role", {
    Viewer => "viewer",
    Manager => "manager",
    Admin => "admin",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }

    /// Statuses whose reserved stock is still held by the order
    pub fn holds_stock(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierOrderStatus {
    Pending,
    Ordered,
    Received,
    Cancelled,
}

text_enum!(SupplierOrderStatus, "supplier order status", {
    Pending => "pending",
    Ordered => "ordered",
    Received => "received",
    Cancelled => "cancelled",
});

impl SupplierOrderStatus {
    pub fn can_transition_to(&self, next: SupplierOrderStatus) -> bool {
        use SupplierOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Ordered) | (Ordered, Received) | (Pending, Cancelled) | (Ordered, Cancelled)
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SupplierOrderStatus::Pending | SupplierOrderStatus::Ordered)
    }
}

/// Actions recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    StatusChange,
    StockAdjust,
    Login,
    LoginFailed,
    Logout,
    TokenReuse,
    PasswordChange,
    SettingsChange,
}

text_enum!(AuditAction, "audit action", {
    Create => "create",
    Update => "update",
    Delete => "delete",
    StatusChange => "status_change",
    StockAdjust => "stock_adjust",
    Login => "login",
    LoginFailed => "login_failed",
    Logout => "logout",
    TokenReuse => "token_reuse",
    PasswordChange => "password_change",
    SettingsChange => "settings_change",
});

impl AuditAction {
    /// Authentication events are recorded even when audit logging is off
    pub fn is_security_event(&self) -> bool {
        use AuditAction::*;
        matches!(self, Login | LoginFailed | Logout | TokenReuse | PasswordChange)
    }
}
