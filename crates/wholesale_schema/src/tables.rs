//! The eight TPC-H source relations and their declared contracts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::contract::{Check, DataType, ForeignKey, LockedColumn, LockedSchema};

pub const ORDER_STATUSES: &[&str] = &["F", "O", "P"];
pub const MARKET_SEGMENTS: &[&str] = &[
    "AUTOMOBILE",
    "BUILDING",
    "FURNITURE",
    "HOUSEHOLD",
    "MACHINERY",
];
pub const RETURN_FLAGS: &[&str] = &["A", "N", "R"];
pub const LINE_STATUSES: &[&str] = &["F", "O"];

/// A source relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableName {
    Region,
    Nation,
    Part,
    Supplier,
    Partsupp,
    Customer,
    Orders,
    Lineitem,
}

impl TableName {
    /// All tables, parents before children.
    pub fn all() -> [TableName; 8] {
        [
            TableName::Region,
            TableName::Nation,
            TableName::Part,
            TableName::Supplier,
            TableName::Partsupp,
            TableName::Customer,
            TableName::Orders,
            TableName::Lineitem,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Region => "region",
            TableName::Nation => "nation",
            TableName::Part => "part",
            TableName::Supplier => "supplier",
            TableName::Partsupp => "partsupp",
            TableName::Customer => "customer",
            TableName::Orders => "orders",
            TableName::Lineitem => "lineitem",
        }
    }

    /// Input file name with the given extension, e.g. `lineitem.tbl`.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.as_str(), extension)
    }

    /// The declared contract for this table.
    pub fn schema(&self) -> LockedSchema {
        schema_for(*self)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        TableName::all()
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "Unknown table '{}'. Expected one of: {}",
                    s,
                    TableName::all()
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

fn key(name: &str) -> LockedColumn {
    LockedColumn::required(name, DataType::Int64)
}

fn money(name: &str) -> LockedColumn {
    LockedColumn::required(name, DataType::money())
}

fn text(name: &str) -> LockedColumn {
    LockedColumn::required(name, DataType::String)
}

fn comment(name: &str) -> LockedColumn {
    LockedColumn::optional(name, DataType::String)
}

fn date(name: &str) -> LockedColumn {
    LockedColumn::required(name, DataType::Date)
}

/// Declared contract for `table`, columns in dbgen file order.
pub fn schema_for(table: TableName) -> LockedSchema {
    match table {
        TableName::Region => LockedSchema::new(
            "region",
            vec![key("r_regionkey"), text("r_name"), comment("r_comment")],
        )
        .with_primary_key(&["r_regionkey"]),

        TableName::Nation => LockedSchema::new(
            "nation",
            vec![
                key("n_nationkey"),
                text("n_name"),
                key("n_regionkey"),
                comment("n_comment"),
            ],
        )
        .with_primary_key(&["n_nationkey"])
        .with_foreign_key(ForeignKey::new(&["n_regionkey"], "region", &["r_regionkey"])),

        TableName::Part => LockedSchema::new(
            "part",
            vec![
                key("p_partkey"),
                text("p_name"),
                text("p_mfgr"),
                text("p_brand"),
                text("p_type"),
                LockedColumn::required("p_size", DataType::Int64).with_check(Check::Positive),
                text("p_container"),
                money("p_retailprice").with_check(Check::NonNegative),
                comment("p_comment"),
            ],
        )
        .with_primary_key(&["p_partkey"]),

        TableName::Supplier => LockedSchema::new(
            "supplier",
            vec![
                key("s_suppkey"),
                text("s_name"),
                text("s_address"),
                key("s_nationkey"),
                text("s_phone"),
                money("s_acctbal"),
                comment("s_comment"),
            ],
        )
        .with_primary_key(&["s_suppkey"])
        .with_foreign_key(ForeignKey::new(&["s_nationkey"], "nation", &["n_nationkey"])),

        TableName::Partsupp => LockedSchema::new(
            "partsupp",
            vec![
                key("ps_partkey"),
                key("ps_suppkey"),
                LockedColumn::required("ps_availqty", DataType::Int64)
                    .with_check(Check::NonNegative),
                money("ps_supplycost").with_check(Check::NonNegative),
                comment("ps_comment"),
            ],
        )
        .with_primary_key(&["ps_partkey", "ps_suppkey"])
        .with_foreign_key(ForeignKey::new(&["ps_partkey"], "part", &["p_partkey"]))
        .with_foreign_key(ForeignKey::new(&["ps_suppkey"], "supplier", &["s_suppkey"])),

        TableName::Customer => LockedSchema::new(
            "customer",
            vec![
                key("c_custkey"),
                text("c_name"),
                text("c_address"),
                key("c_nationkey"),
                text("c_phone"),
                money("c_acctbal"),
                text("c_mktsegment").with_check(Check::one_of(MARKET_SEGMENTS)),
                comment("c_comment"),
            ],
        )
        .with_primary_key(&["c_custkey"])
        .with_foreign_key(ForeignKey::new(&["c_nationkey"], "nation", &["n_nationkey"])),

        TableName::Orders => LockedSchema::new(
            "orders",
            vec![
                key("o_orderkey"),
                key("o_custkey"),
                text("o_orderstatus").with_check(Check::one_of(ORDER_STATUSES)),
                money("o_totalprice"),
                date("o_orderdate"),
                text("o_orderpriority"),
                text("o_clerk"),
                LockedColumn::required("o_shippriority", DataType::Int64),
                comment("o_comment"),
            ],
        )
        .with_primary_key(&["o_orderkey"])
        .with_foreign_key(ForeignKey::new(&["o_custkey"], "customer", &["c_custkey"])),

        TableName::Lineitem => LockedSchema::new(
            "lineitem",
            vec![
                key("l_orderkey"),
                key("l_partkey"),
                key("l_suppkey"),
                key("l_linenumber"),
                money("l_quantity").with_check(Check::Positive),
                money("l_extendedprice"),
                money("l_discount").with_check(Check::between(0, 1)),
                money("l_tax").with_check(Check::between(0, 1)),
                text("l_returnflag").with_check(Check::one_of(RETURN_FLAGS)),
                text("l_linestatus").with_check(Check::one_of(LINE_STATUSES)),
                date("l_shipdate"),
                date("l_commitdate"),
                date("l_receiptdate"),
                text("l_shipinstruct"),
                text("l_shipmode"),
                comment("l_comment"),
            ],
        )
        .with_primary_key(&["l_orderkey", "l_linenumber"])
        .with_foreign_key(ForeignKey::new(&["l_orderkey"], "orders", &["o_orderkey"]))
        .with_foreign_key(ForeignKey::new(&["l_partkey"], "part", &["p_partkey"]))
        .with_foreign_key(ForeignKey::new(&["l_suppkey"], "supplier", &["s_suppkey"]))
        .with_foreign_key(ForeignKey::new(
            &["l_partkey", "l_suppkey"],
            "partsupp",
            &["ps_partkey", "ps_suppkey"],
        )),
    }
}
