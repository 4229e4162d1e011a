//! Fact-table denormalization.
//!
//! Join plan (fixed order):
//! 1. `cust_geo       = customer LEFT JOIN nation_mapped LEFT JOIN region`
//! 2. `supp_geo       = supplier LEFT JOIN nation_mapped LEFT JOIN region`
//! 3. `order_lineitem = lineitem INNER JOIN orders ON order_key`
//! 4. `part_partsupp  = part INNER JOIN partsupp ON part_key`
//! 5. `fact_table     = order_lineitem LEFT JOIN cust_geo ON cust_key
//!                      LEFT JOIN supp_geo ON supp_key
//!                      INNER JOIN part_partsupp ON (part_key, supp_key)`
//!
//! Left joins add geography and never drop a row. Inner joins drop rows
//! whose key does not resolve; the drop counts are reported, not raised.
//! Every output is sorted by its key.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use wholesale_schema::{
    Customer, DataType, Dataset, LineItem, LockedColumn, LockedSchema, Order, Part, PartSupp, Region,
    Supplier, Value,
};

use crate::convert::{opt_int, opt_str, text, Tabular};
use crate::geo::NationMapped;

/// Geography resolved through nation_mapped and region.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Geo {
    pub nation_name: Option<String>,
    pub nation_iso3: Option<String>,
    pub region_key: Option<i64>,
    pub region_name: Option<String>,
}

struct GeoIndex<'a> {
    nations: HashMap<i64, &'a NationMapped>,
    regions: HashMap<i64, &'a Region>,
}

impl<'a> GeoIndex<'a> {
    fn new(nations: &'a [NationMapped], regions: &'a [Region]) -> Self {
        Self {
            nations: nations.iter().map(|n| (n.nation_key, n)).collect(),
            regions: regions.iter().map(|r| (r.region_key, r)).collect(),
        }
    }

    fn resolve(&self, nation_key: i64) -> Geo {
        let Some(nation) = self.nations.get(&nation_key) else {
            return Geo::default();
        };
        let region = self.regions.get(&nation.region_key);
        Geo {
            nation_name: Some(nation.name.clone()),
            nation_iso3: nation.iso3_code.clone(),
            region_key: Some(nation.region_key),
            region_name: region.map(|r| r.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustGeo {
    pub cust_key: i64,
    pub name: String,
    pub nation_key: i64,
    pub acct_bal: Decimal,
    pub mkt_segment: String,
    #[serde(flatten)]
    pub geo: Geo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuppGeo {
    pub supp_key: i64,
    pub name: String,
    pub nation_key: i64,
    pub acct_bal: Decimal,
    #[serde(flatten)]
    pub geo: Geo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineitem {
    pub order_key: i64,
    pub line_number: i64,
    pub part_key: i64,
    pub supp_key: i64,
    pub cust_key: i64,
    pub order_date: NaiveDate,
    pub order_status: String,
    pub order_priority: String,
    pub total_price: Decimal,
    pub quantity: Decimal,
    pub extended_price: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub return_flag: String,
    pub line_status: String,
    pub ship_date: NaiveDate,
    pub commit_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub ship_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartPartsupp {
    pub part_key: i64,
    pub supp_key: i64,
    pub part_name: String,
    pub brand: String,
    pub part_type: String,
    pub size: i64,
    pub retail_price: Decimal,
    pub avail_qty: i64,
    pub supply_cost: Decimal,
}

/// One row of the fact table: a sale line with its order, customer and
/// supplier geography, and part/supply terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRow {
    #[serde(flatten)]
    pub line: OrderLineitem,
    pub customer_name: Option<String>,
    pub customer_segment: Option<String>,
    pub customer_geo: Geo,
    pub supplier_name: Option<String>,
    pub supplier_geo: Geo,
    pub part_name: String,
    pub brand: String,
    pub part_type: String,
    pub size: i64,
    pub retail_price: Decimal,
    pub avail_qty: i64,
    pub supply_cost: Decimal,
}

/// Rows removed by each inner join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinDrops {
    /// Lineitems whose order_key has no order
    pub lineitems_without_order: usize,
    /// Parts with no partsupp row
    pub parts_without_supply: usize,
    /// Partsupp rows whose part_key has no part
    pub partsupps_without_part: usize,
    /// order_lineitem rows whose (part_key, supp_key) is not a supply relationship
    pub lines_without_supply: usize,
}

/// All intermediate relations plus the fact table.
#[derive(Debug, Clone, Default)]
pub struct Denormalized {
    pub cust_geo: Vec<CustGeo>,
    pub supp_geo: Vec<SuppGeo>,
    pub order_lineitem: Vec<OrderLineitem>,
    pub part_partsupp: Vec<PartPartsupp>,
    pub fact_table: Vec<FactRow>,
    pub drops: JoinDrops,
}

pub fn build_cust_geo(
    customers: &[Customer],
    nations: &[NationMapped],
    regions: &[Region],
) -> Vec<CustGeo> {
    let index = GeoIndex::new(nations, regions);
    let mut rows: Vec<CustGeo> = customers
        .iter()
        .map(|c| CustGeo {
            cust_key: c.cust_key,
            name: c.name.clone(),
            nation_key: c.nation_key,
            acct_bal: c.acct_bal,
            mkt_segment: c.mkt_segment.clone(),
            geo: index.resolve(c.nation_key),
        })
        .collect();
    rows.sort_by_key(|r| r.cust_key);
    rows
}

pub fn build_supp_geo(
    suppliers: &[Supplier],
    nations: &[NationMapped],
    regions: &[Region],
) -> Vec<SuppGeo> {
    let index = GeoIndex::new(nations, regions);
    let mut rows: Vec<SuppGeo> = suppliers
        .iter()
        .map(|s| SuppGeo {
            supp_key: s.supp_key,
            name: s.name.clone(),
            nation_key: s.nation_key,
            acct_bal: s.acct_bal,
            geo: index.resolve(s.nation_key),
        })
        .collect();
    rows.sort_by_key(|r| r.supp_key);
    rows
}

/// Inner join; returns the joined rows and the number of dropped lineitems.
pub fn build_order_lineitem(lineitems: &[LineItem], orders: &[Order]) -> (Vec<OrderLineitem>, usize) {
    let by_key: HashMap<i64, &Order> = orders.iter().map(|o| (o.order_key, o)).collect();
    let mut dropped = 0;
    let mut rows = Vec::with_capacity(lineitems.len());

    for l in lineitems {
        let Some(o) = by_key.get(&l.order_key) else {
            dropped += 1;
            continue;
        };
        rows.push(OrderLineitem {
            order_key: l.order_key,
            line_number: l.line_number,
            part_key: l.part_key,
            supp_key: l.supp_key,
            cust_key: o.cust_key,
            order_date: o.order_date,
            order_status: o.status.clone(),
            order_priority: o.priority.clone(),
            total_price: o.total_price,
            quantity: l.quantity,
            extended_price: l.extended_price,
            discount: l.discount,
            tax: l.tax,
            return_flag: l.return_flag.clone(),
            line_status: l.line_status.clone(),
            ship_date: l.ship_date,
            commit_date: l.commit_date,
            receipt_date: l.receipt_date,
            ship_mode: l.ship_mode.clone(),
        });
    }
    rows.sort_by_key(|r| (r.order_key, r.line_number));
    (rows, dropped)
}

/// Inner join; returns the joined rows, parts without supply and partsupps
/// without a part.
pub fn build_part_partsupp(parts: &[Part], partsupps: &[PartSupp]) -> (Vec<PartPartsupp>, usize, usize) {
    let by_key: HashMap<i64, &Part> = parts.iter().map(|p| (p.part_key, p)).collect();
    let mut supplied: HashSet<i64> = HashSet::new();
    let mut orphans = 0;
    let mut rows = Vec::with_capacity(partsupps.len());

    for ps in partsupps {
        let Some(p) = by_key.get(&ps.part_key) else {
            orphans += 1;
            continue;
        };
        supplied.insert(p.part_key);
        rows.push(PartPartsupp {
            part_key: ps.part_key,
            supp_key: ps.supp_key,
            part_name: p.name.clone(),
            brand: p.brand.clone(),
            part_type: p.part_type.clone(),
            size: p.size,
            retail_price: p.retail_price,
            avail_qty: ps.avail_qty,
            supply_cost: ps.supply_cost,
        });
    }
    rows.sort_by_key(|r| (r.part_key, r.supp_key));
    let unsupplied = parts.len() - supplied.len();
    (rows, unsupplied, orphans)
}

/// Final join; returns fact rows sorted by (order_key, line_number) and the
/// number of order lines with no matching supply relationship.
pub fn build_fact_table(
    order_lineitem: &[OrderLineitem],
    cust_geo: &[CustGeo],
    supp_geo: &[SuppGeo],
    part_partsupp: &[PartPartsupp],
) -> (Vec<FactRow>, usize) {
    let customers: HashMap<i64, &CustGeo> = cust_geo.iter().map(|c| (c.cust_key, c)).collect();
    let suppliers: HashMap<i64, &SuppGeo> = supp_geo.iter().map(|s| (s.supp_key, s)).collect();
    let supply: HashMap<(i64, i64), &PartPartsupp> = part_partsupp
        .iter()
        .map(|p| ((p.part_key, p.supp_key), p))
        .collect();

    let mut dropped = 0;
    let mut rows = Vec::with_capacity(order_lineitem.len());
    for line in order_lineitem {
        let Some(pps) = supply.get(&(line.part_key, line.supp_key)) else {
            dropped += 1;
            continue;
        };
        let customer = customers.get(&line.cust_key);
        let supplier = suppliers.get(&line.supp_key);
        rows.push(FactRow {
            line: line.clone(),
            customer_name: customer.map(|c| c.name.clone()),
            customer_segment: customer.map(|c| c.mkt_segment.clone()),
            customer_geo: customer.map(|c| c.geo.clone()).unwrap_or_default(),
            supplier_name: supplier.map(|s| s.name.clone()),
            supplier_geo: supplier.map(|s| s.geo.clone()).unwrap_or_default(),
            part_name: pps.part_name.clone(),
            brand: pps.brand.clone(),
            part_type: pps.part_type.clone(),
            size: pps.size,
            retail_price: pps.retail_price,
            avail_qty: pps.avail_qty,
            supply_cost: pps.supply_cost,
        });
    }
    rows.sort_by_key(|r| (r.line.order_key, r.line.line_number));
    (rows, dropped)
}

/// Run the full join plan over a loaded dataset and its enriched nations.
pub fn denormalize(dataset: &Dataset, nation_mapped: &[NationMapped]) -> Denormalized {
    let cust_geo = build_cust_geo(&dataset.customers, nation_mapped, &dataset.regions);
    let supp_geo = build_supp_geo(&dataset.suppliers, nation_mapped, &dataset.regions);
    let (order_lineitem, lineitems_without_order) =
        build_order_lineitem(&dataset.lineitems, &dataset.orders);
    let (part_partsupp, parts_without_supply, partsupps_without_part) =
        build_part_partsupp(&dataset.parts, &dataset.partsupps);
    let (fact_table, lines_without_supply) =
        build_fact_table(&order_lineitem, &cust_geo, &supp_geo, &part_partsupp);

    let drops = JoinDrops {
        lineitems_without_order,
        parts_without_supply,
        partsupps_without_part,
        lines_without_supply,
    };
    if drops.lineitems_without_order > 0 || drops.lines_without_supply > 0 {
        warn!(
            lineitems_without_order = drops.lineitems_without_order,
            lines_without_supply = drops.lines_without_supply,
            "Inner joins dropped sale lines"
        );
    }
    info!(
        cust_geo = cust_geo.len(),
        supp_geo = supp_geo.len(),
        order_lineitem = order_lineitem.len(),
        part_partsupp = part_partsupp.len(),
        fact_table = fact_table.len(),
        "Built fact table"
    );

    Denormalized {
        cust_geo,
        supp_geo,
        order_lineitem,
        part_partsupp,
        fact_table,
        drops,
    }
}

fn geo_columns(prefix: &str) -> Vec<LockedColumn> {
    vec![
        LockedColumn::optional(format!("{}nation_name", prefix), DataType::String),
        LockedColumn::optional(format!("{}nation_iso3", prefix), DataType::String),
        LockedColumn::optional(format!("{}region_key", prefix), DataType::Int64),
        LockedColumn::optional(format!("{}region_name", prefix), DataType::String),
    ]
}

fn geo_values(geo: &Geo) -> [Value; 4] {
    [
        opt_str(&geo.nation_name),
        opt_str(&geo.nation_iso3),
        opt_int(geo.region_key),
        opt_str(&geo.region_name),
    ]
}

impl Tabular for CustGeo {
    fn contract() -> LockedSchema {
        let mut columns = vec![
            LockedColumn::required("cust_key", DataType::Int64),
            LockedColumn::required("name", DataType::String),
            LockedColumn::required("nation_key", DataType::Int64),
            LockedColumn::required("acct_bal", DataType::money()),
            LockedColumn::required("mkt_segment", DataType::String),
        ];
        columns.extend(geo_columns(""));
        LockedSchema::new("cust_geo", columns).with_primary_key(&["cust_key"])
    }

    fn values(&self) -> Vec<Value> {
        let mut values = vec![
            Value::Int(self.cust_key),
            text(&self.name),
            Value::Int(self.nation_key),
            Value::Decimal(self.acct_bal),
            text(&self.mkt_segment),
        ];
        values.extend(geo_values(&self.geo));
        values
    }
}

impl Tabular for SuppGeo {
    fn contract() -> LockedSchema {
        let mut columns = vec![
            LockedColumn::required("supp_key", DataType::Int64),
            LockedColumn::required("name", DataType::String),
            LockedColumn::required("nation_key", DataType::Int64),
            LockedColumn::required("acct_bal", DataType::money()),
        ];
        columns.extend(geo_columns(""));
        LockedSchema::new("supp_geo", columns).with_primary_key(&["supp_key"])
    }

    fn values(&self) -> Vec<Value> {
        let mut values = vec![
            Value::Int(self.supp_key),
            text(&self.name),
            Value::Int(self.nation_key),
            Value::Decimal(self.acct_bal),
        ];
        values.extend(geo_values(&self.geo));
        values
    }
}

fn order_lineitem_columns() -> Vec<LockedColumn> {
    vec![
        LockedColumn::required("order_key", DataType::Int64),
        LockedColumn::required("line_number", DataType::Int64),
        LockedColumn::required("part_key", DataType::Int64),
        LockedColumn::required("supp_key", DataType::Int64),
        LockedColumn::required("cust_key", DataType::Int64),
        LockedColumn::required("order_date", DataType::Date),
        LockedColumn::required("order_status", DataType::String),
        LockedColumn::required("order_priority", DataType::String),
        LockedColumn::required("total_price", DataType::money()),
        LockedColumn::required("quantity", DataType::money()),
        LockedColumn::required("extended_price", DataType::money()),
        LockedColumn::required("discount", DataType::money()),
        LockedColumn::required("tax", DataType::money()),
        LockedColumn::required("return_flag", DataType::String),
        LockedColumn::required("line_status", DataType::String),
        LockedColumn::required("ship_date", DataType::Date),
        LockedColumn::required("commit_date", DataType::Date),
        LockedColumn::required("receipt_date", DataType::Date),
        LockedColumn::required("ship_mode", DataType::String),
    ]
}

impl Tabular for OrderLineitem {
    fn contract() -> LockedSchema {
        LockedSchema::new("order_lineitem", order_lineitem_columns())
            .with_primary_key(&["order_key", "line_number"])
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.order_key),
            Value::Int(self.line_number),
            Value::Int(self.part_key),
            Value::Int(self.supp_key),
            Value::Int(self.cust_key),
            Value::Date(self.order_date),
            text(&self.order_status),
            text(&self.order_priority),
            Value::Decimal(self.total_price),
            Value::Decimal(self.quantity),
            Value::Decimal(self.extended_price),
            Value::Decimal(self.discount),
            Value::Decimal(self.tax),
            text(&self.return_flag),
            text(&self.line_status),
            Value::Date(self.ship_date),
            Value::Date(self.commit_date),
            Value::Date(self.receipt_date),
            text(&self.ship_mode),
        ]
    }
}

fn supply_columns() -> Vec<LockedColumn> {
    vec![
        LockedColumn::required("part_name", DataType::String),
        LockedColumn::required("brand", DataType::String),
        LockedColumn::required("part_type", DataType::String),
        LockedColumn::required("size", DataType::Int64),
        LockedColumn::required("retail_price", DataType::money()),
        LockedColumn::required("avail_qty", DataType::Int64),
        LockedColumn::required("supply_cost", DataType::money()),
    ]
}

impl Tabular for PartPartsupp {
    fn contract() -> LockedSchema {
        let mut columns = vec![
            LockedColumn::required("part_key", DataType::Int64),
            LockedColumn::required("supp_key", DataType::Int64),
        ];
        columns.extend(supply_columns());
        LockedSchema::new("part_partsupp", columns).with_primary_key(&["part_key", "supp_key"])
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.part_key),
            Value::Int(self.supp_key),
            text(&self.part_name),
            text(&self.brand),
            text(&self.part_type),
            Value::Int(self.size),
            Value::Decimal(self.retail_price),
            Value::Int(self.avail_qty),
            Value::Decimal(self.supply_cost),
        ]
    }
}

impl Tabular for FactRow {
    fn contract() -> LockedSchema {
        let mut columns = order_lineitem_columns();
        columns.push(LockedColumn::optional("customer_name", DataType::String));
        columns.push(LockedColumn::optional("customer_segment", DataType::String));
        columns.extend(geo_columns("customer_"));
        columns.push(LockedColumn::optional("supplier_name", DataType::String));
        columns.extend(geo_columns("supplier_"));
        columns.extend(supply_columns());
        LockedSchema::new("fact_table", columns).with_primary_key(&["order_key", "line_number"])
    }

    fn values(&self) -> Vec<Value> {
        let mut values = self.line.values();
        values.push(opt_str(&self.customer_name));
        values.push(opt_str(&self.customer_segment));
        values.extend(geo_values(&self.customer_geo));
        values.push(opt_str(&self.supplier_name));
        values.extend(geo_values(&self.supplier_geo));
        values.extend([
            text(&self.part_name),
            text(&self.brand),
            text(&self.part_type),
            Value::Int(self.size),
            Value::Decimal(self.retail_price),
            Value::Int(self.avail_qty),
            Value::Decimal(self.supply_cost),
        ]);
        values
    }
}
