use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier in `resource.action` form (e.g. `products.write`).
///
/// `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const PRODUCTS_READ: Permission = Permission(Cow::Borrowed("products.read"));
    pub const PRODUCTS_WRITE: Permission = Permission(Cow::Borrowed("products.write"));
    pub const PRODUCTS_DELETE: Permission = Permission(Cow::Borrowed("products.delete"));
    pub const STOCK_ADJUST: Permission = Permission(Cow::Borrowed("stock.adjust"));
    pub const CATEGORIES_READ: Permission = Permission(Cow::Borrowed("categories.read"));
    pub const CATEGORIES_WRITE: Permission = Permission(Cow::Borrowed("categories.write"));
    pub const CATEGORIES_DELETE: Permission = Permission(Cow::Borrowed("categories.delete"));
    pub const MOVEMENTS_READ: Permission = Permission(Cow::Borrowed("movements.read"));
    pub const REPORTS_READ: Permission = Permission(Cow::Borrowed("reports.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
