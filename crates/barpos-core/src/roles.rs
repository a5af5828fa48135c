//! # Roles & Capabilities
//!
//! Closed set of staff roles, each mapped to a fixed capability set.
//! The order and cash logic never consults this; the API layer does,
//! before calling in.
//!
//! | Capability      | Admin | Manager | Attendant | Cashier |
//! |-----------------|:-----:|:-------:|:---------:|:-------:|
//! | users:read      |   ✓   |    ✓    |           |         |
//! | users:write     |   ✓   |         |           |         |
//! | tables:read     |   ✓   |    ✓    |     ✓     |    ✓    |
//! | tables:write    |   ✓   |    ✓    |           |         |
//! | products:read   |   ✓   |    ✓    |     ✓     |         |
//! | products:write  |   ✓   |    ✓    |           |         |
//! | orders:read     |   ✓   |    ✓    |     ✓     |    ✓    |
//! | orders:write    |   ✓   |    ✓    |     ✓     |         |
//! | orders:close    |   ✓   |    ✓    |           |    ✓    |
//! | cash:read       |   ✓   |    ✓    |           |    ✓    |
//! | cash:write      |   ✓   |    ✓    |           |    ✓    |
//! | reports:read    |   ✓   |    ✓    |           |    ✓    |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Attendant,
    Cashier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Capability {
    #[serde(rename = "users:read")]
    UsersRead,
    #[serde(rename = "users:write")]
    UsersWrite,
    #[serde(rename = "tables:read")]
    TablesRead,
    #[serde(rename = "tables:write")]
    TablesWrite,
    #[serde(rename = "products:read")]
    ProductsRead,
    #[serde(rename = "products:write")]
    ProductsWrite,
    #[serde(rename = "orders:read")]
    OrdersRead,
    #[serde(rename = "orders:write")]
    OrdersWrite,
    #[serde(rename = "orders:close")]
    OrdersClose,
    #[serde(rename = "cash:read")]
    CashRead,
    #[serde(rename = "cash:write")]
    CashWrite,
    #[serde(rename = "reports:read")]
    ReportsRead,
}

use Capability::*;

const ADMIN: &[Capability] = &[
    UsersRead,
    UsersWrite,
    TablesRead,
    TablesWrite,
    ProductsRead,
    ProductsWrite,
    OrdersRead,
    OrdersWrite,
    OrdersClose,
    CashRead,
    CashWrite,
    ReportsRead,
];

const MANAGER: &[Capability] = &[
    UsersRead,
    TablesRead,
    TablesWrite,
    ProductsRead,
    ProductsWrite,
    OrdersRead,
    OrdersWrite,
    OrdersClose,
    CashRead,
    CashWrite,
    ReportsRead,
];

const ATTENDANT: &[Capability] = &[TablesRead, ProductsRead, OrdersRead, OrdersWrite];

const CASHIER: &[Capability] = &[
    TablesRead,
    OrdersRead,
    OrdersClose,
    CashRead,
    CashWrite,
    ReportsRead,
];

impl Role {
    /// The full capability set of this role.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin => ADMIN,
            Role::Manager => MANAGER,
            Role::Attendant => ATTENDANT,
            Role::Cashier => CASHIER,
        }
    }

    /// Capability-set membership check.
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        assert!(ADMIN.iter().all(|c| Role::Admin.can(*c)));
        assert_eq!(Role::Admin.capabilities().len(), 12);
    }

    #[test]
    fn test_attendant_cannot_touch_cash() {
        assert!(Role::Attendant.can(OrdersWrite));
        assert!(!Role::Attendant.can(OrdersClose));
        assert!(!Role::Attendant.can(CashWrite));
    }

    #[test]
    fn test_cashier_closes_but_does_not_edit() {
        assert!(Role::Cashier.can(OrdersClose));
        assert!(Role::Cashier.can(CashWrite));
        assert!(!Role::Cashier.can(OrdersWrite));
        assert!(!Role::Cashier.can(ProductsRead));
    }

    #[test]
    fn test_manager_cannot_write_users() {
        assert!(Role::Manager.can(UsersRead));
        assert!(!Role::Manager.can(UsersWrite));
    }

    #[test]
    fn test_capability_serialization() {
        assert_eq!(serde_json::to_string(&OrdersClose).unwrap(), "\"orders:close\"");
        assert_eq!(serde_json::to_string(&Role::Cashier).unwrap(), "\"CASHIER\"");
    }
}
