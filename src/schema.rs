//! Canonical column identifiers for the three source tables and the rename
//! tables that map raw source identifiers onto them.

use serde::{Deserialize, Serialize};

pub const HSHD_NUM: &str = "HSHD_NUM";
pub const BASKET_NUM: &str = "BASKET_NUM";
pub const PURCHASE_DATE: &str = "PURCHASE_DATE";
pub const PRODUCT_NUM: &str = "PRODUCT_NUM";
pub const SPEND: &str = "SPEND";
pub const DEPARTMENT: &str = "DEPARTMENT";
pub const COMMODITY: &str = "COMMODITY";
pub const HH_SIZE: &str = "HH_SIZE";

/// Columns the join reads by name; every other column passes through.
pub const CANONICAL_COLUMNS: &[&str] = &[
    HSHD_NUM,
    BASKET_NUM,
    PURCHASE_DATE,
    PRODUCT_NUM,
    SPEND,
    DEPARTMENT,
    COMMODITY,
    HH_SIZE,
];

/// Raw identifiers used by the relational source.
pub const DATABASE_RENAMES: &[(&str, &str)] = &[
    ("HSHD_NU", HSHD_NUM),
    ("BASKET_N", BASKET_NUM),
    ("PURCHASE_", PURCHASE_DATE),
    ("PRODUCT_", PRODUCT_NUM),
];

/// Delimited files already use canonical names apart from this legacy header.
pub const FILE_RENAMES: &[(&str, &str)] = &[("PURCHASE_", PURCHASE_DATE)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Transactions,
    Households,
    Products,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [
        TableKind::Transactions,
        TableKind::Households,
        TableKind::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Transactions => "transactions",
            TableKind::Households => "households",
            TableKind::Products => "products",
        }
    }

    /// Columns the join reads besides the join keys.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Transactions => &[BASKET_NUM, PURCHASE_DATE, SPEND],
            TableKind::Households => &[HH_SIZE],
            TableKind::Products => &[DEPARTMENT, COMMODITY],
        }
    }

    pub fn join_keys(&self) -> &'static [&'static str] {
        match self {
            TableKind::Transactions => &[HSHD_NUM, PRODUCT_NUM],
            TableKind::Households => &[HSHD_NUM],
            TableKind::Products => &[PRODUCT_NUM],
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a canonical column is typed once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Identifier,
    Spend,
    HouseholdSize,
    Text,
}

pub fn column_kind(name: &str) -> ColumnKind {
    match name {
        HSHD_NUM | BASKET_NUM | PRODUCT_NUM => ColumnKind::Identifier,
        SPEND => ColumnKind::Spend,
        HH_SIZE => ColumnKind::HouseholdSize,
        _ => ColumnKind::Text,
    }
}
