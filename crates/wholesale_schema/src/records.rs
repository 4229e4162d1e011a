//! Typed views over validated relations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::contract::{LockedSchema, SchemaViolation, ViolationType};
use crate::loader::Relation;
use crate::tables::TableName;
use crate::value::Value;

/// Named access into one validated row.
pub struct RowView<'a> {
    schema: &'a LockedSchema,
    row: &'a [Value],
}

impl<'a> RowView<'a> {
    pub fn new(schema: &'a LockedSchema, row: &'a [Value]) -> Self {
        Self { schema, row }
    }

    fn get(&self, column: &str) -> Result<&'a Value, SchemaViolation> {
        self.schema
            .column_index(column)
            .and_then(|idx| self.row.get(idx))
            .ok_or_else(|| SchemaViolation {
                table: self.schema.name.clone(),
                line: None,
                column: Some(column.to_string()),
                expected: "declared column".to_string(),
                got: "missing".to_string(),
                violation_type: ViolationType::ColumnCountMismatch,
            })
    }

    fn mismatch(&self, column: &str, expected: &str, got: &Value) -> SchemaViolation {
        SchemaViolation {
            table: self.schema.name.clone(),
            line: None,
            column: Some(column.to_string()),
            expected: expected.to_string(),
            got: got.to_string(),
            violation_type: ViolationType::TypeMismatch,
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, SchemaViolation> {
        let v = self.get(column)?;
        v.as_i64().ok_or_else(|| self.mismatch(column, "int64", v))
    }

    pub fn decimal(&self, column: &str) -> Result<Decimal, SchemaViolation> {
        let v = self.get(column)?;
        match v {
            Value::Decimal(d) => Ok(*d),
            _ => Err(self.mismatch(column, "decimal", v)),
        }
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate, SchemaViolation> {
        let v = self.get(column)?;
        v.as_date().ok_or_else(|| self.mismatch(column, "date", v))
    }

    pub fn string(&self, column: &str) -> Result<String, SchemaViolation> {
        let v = self.get(column)?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(column, "string", v))
    }

    pub fn opt_string(&self, column: &str) -> Result<Option<String>, SchemaViolation> {
        let v = self.get(column)?;
        match v {
            Value::Null => Ok(None),
            Value::Str(s) => Ok(Some(s.clone())),
            _ => Err(self.mismatch(column, "string", v)),
        }
    }
}

/// A record type backed by one of the source relations.
pub trait TableRecord: Sized {
    const TABLE: TableName;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation>;

    /// Convert every row of a relation.
    fn from_relation(relation: &Relation) -> Result<Vec<Self>, SchemaViolation> {
        relation
            .rows
            .iter()
            .map(|row| Self::from_row(&RowView::new(&relation.schema, row)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub region_key: i64,
    pub name: String,
}

impl TableRecord for Region {
    const TABLE: TableName = TableName::Region;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            region_key: row.int("r_regionkey")?,
            name: row.string("r_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nation {
    pub nation_key: i64,
    pub name: String,
    pub region_key: i64,
}

impl TableRecord for Nation {
    const TABLE: TableName = TableName::Nation;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            nation_key: row.int("n_nationkey")?,
            name: row.string("n_name")?,
            region_key: row.int("n_regionkey")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub part_key: i64,
    pub name: String,
    pub mfgr: String,
    pub brand: String,
    pub part_type: String,
    pub size: i64,
    pub container: String,
    pub retail_price: Decimal,
}

impl TableRecord for Part {
    const TABLE: TableName = TableName::Part;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            part_key: row.int("p_partkey")?,
            name: row.string("p_name")?,
            mfgr: row.string("p_mfgr")?,
            brand: row.string("p_brand")?,
            part_type: row.string("p_type")?,
            size: row.int("p_size")?,
            container: row.string("p_container")?,
            retail_price: row.decimal("p_retailprice")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Supplier {
    pub supp_key: i64,
    pub name: String,
    pub address: String,
    pub nation_key: i64,
    pub phone: String,
    pub acct_bal: Decimal,
}

impl TableRecord for Supplier {
    const TABLE: TableName = TableName::Supplier;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            supp_key: row.int("s_suppkey")?,
            name: row.string("s_name")?,
            address: row.string("s_address")?,
            nation_key: row.int("s_nationkey")?,
            phone: row.string("s_phone")?,
            acct_bal: row.decimal("s_acctbal")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSupp {
    pub part_key: i64,
    pub supp_key: i64,
    pub avail_qty: i64,
    pub supply_cost: Decimal,
}

impl TableRecord for PartSupp {
    const TABLE: TableName = TableName::Partsupp;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            part_key: row.int("ps_partkey")?,
            supp_key: row.int("ps_suppkey")?,
            avail_qty: row.int("ps_availqty")?,
            supply_cost: row.decimal("ps_supplycost")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub cust_key: i64,
    pub name: String,
    pub address: String,
    pub nation_key: i64,
    pub phone: String,
    pub acct_bal: Decimal,
    pub mkt_segment: String,
}

impl TableRecord for Customer {
    const TABLE: TableName = TableName::Customer;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            cust_key: row.int("c_custkey")?,
            name: row.string("c_name")?,
            address: row.string("c_address")?,
            nation_key: row.int("c_nationkey")?,
            phone: row.string("c_phone")?,
            acct_bal: row.decimal("c_acctbal")?,
            mkt_segment: row.string("c_mktsegment")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_key: i64,
    pub cust_key: i64,
    pub status: String,
    pub total_price: Decimal,
    pub order_date: NaiveDate,
    pub priority: String,
    pub clerk: String,
    pub ship_priority: i64,
}

impl TableRecord for Order {
    const TABLE: TableName = TableName::Orders;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            order_key: row.int("o_orderkey")?,
            cust_key: row.int("o_custkey")?,
            status: row.string("o_orderstatus")?,
            total_price: row.decimal("o_totalprice")?,
            order_date: row.date("o_orderdate")?,
            priority: row.string("o_orderpriority")?,
            clerk: row.string("o_clerk")?,
            ship_priority: row.int("o_shippriority")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub order_key: i64,
    pub part_key: i64,
    pub supp_key: i64,
    pub line_number: i64,
    pub quantity: Decimal,
    pub extended_price: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub return_flag: String,
    pub line_status: String,
    pub ship_date: NaiveDate,
    pub commit_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub ship_instruct: String,
    pub ship_mode: String,
}

impl TableRecord for LineItem {
    const TABLE: TableName = TableName::Lineitem;

    fn from_row(row: &RowView<'_>) -> Result<Self, SchemaViolation> {
        Ok(Self {
            order_key: row.int("l_orderkey")?,
            part_key: row.int("l_partkey")?,
            supp_key: row.int("l_suppkey")?,
            line_number: row.int("l_linenumber")?,
            quantity: row.decimal("l_quantity")?,
            extended_price: row.decimal("l_extendedprice")?,
            discount: row.decimal("l_discount")?,
            tax: row.decimal("l_tax")?,
            return_flag: row.string("l_returnflag")?,
            line_status: row.string("l_linestatus")?,
            ship_date: row.date("l_shipdate")?,
            commit_date: row.date("l_commitdate")?,
            receipt_date: row.date("l_receiptdate")?,
            ship_instruct: row.string("l_shipinstruct")?,
            ship_mode: row.string("l_shipmode")?,
        })
    }
}
