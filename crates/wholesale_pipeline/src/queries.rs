//! The three analytical queries. All are pure functions of their inputs with
//! total orderings, so repeated runs return identical results.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use wholesale_schema::{
    Customer, DataType, LockedColumn, LockedSchema, Nation, Order, PartSupp, Supplier, Value,
};

use crate::config::QueryConfig;
use crate::convert::{opt_str, text, Tabular};

/// Which analytical query to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    ActiveCustomers,
    TopSuppliers,
    CheapestSuppliers,
}

impl QueryKind {
    pub fn all() -> [QueryKind; 3] {
        [
            QueryKind::ActiveCustomers,
            QueryKind::TopSuppliers,
            QueryKind::CheapestSuppliers,
        ]
    }

    /// Name of the stored result table.
    pub fn table_name(&self) -> &'static str {
        match self {
            QueryKind::ActiveCustomers => "top_active_customers",
            QueryKind::TopSuppliers => "top_suppliers_by_balance",
            QueryKind::CheapestSuppliers => "cheapest_suppliers_per_part",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveCustomer {
    pub cust_key: i64,
    /// Null when the order's customer key does not resolve
    pub name: Option<String>,
    pub order_count: u64,
}

/// Customers ranked by distinct orders placed in the trailing window ending
/// at the latest order date in `orders` (inclusive on both ends). Ties go to
/// the lower cust_key.
pub fn top_active_customers(
    orders: &[Order],
    customers: &[Customer],
    window_days: u32,
    limit: usize,
) -> Vec<ActiveCustomer> {
    let Some(max_date) = orders.iter().map(|o| o.order_date).max() else {
        return Vec::new();
    };
    let start = max_date
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);

    let mut per_customer: HashMap<i64, HashSet<i64>> = HashMap::new();
    for order in orders.iter().filter(|o| o.order_date >= start) {
        per_customer
            .entry(order.cust_key)
            .or_default()
            .insert(order.order_key);
    }

    let names: HashMap<i64, &str> = customers
        .iter()
        .map(|c| (c.cust_key, c.name.as_str()))
        .collect();

    let mut ranked: Vec<ActiveCustomer> = per_customer
        .into_iter()
        .map(|(cust_key, keys)| ActiveCustomer {
            cust_key,
            name: names.get(&cust_key).map(|n| n.to_string()),
            order_count: keys.len() as u64,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then(a.cust_key.cmp(&b.cust_key))
    });
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSupplier {
    pub supp_key: i64,
    pub name: String,
    pub nation: Option<String>,
    pub acct_bal: Decimal,
}

/// Suppliers by account balance, highest first. Ties go to the lower supp_key.
pub fn top_suppliers_by_balance(
    suppliers: &[Supplier],
    nations: &[Nation],
    limit: usize,
) -> Vec<TopSupplier> {
    let nation_names: HashMap<i64, &str> = nations
        .iter()
        .map(|n| (n.nation_key, n.name.as_str()))
        .collect();

    let mut ranked: Vec<&Supplier> = suppliers.iter().collect();
    ranked.sort_by(|a, b| b.acct_bal.cmp(&a.acct_bal).then(a.supp_key.cmp(&b.supp_key)));

    ranked
        .into_iter()
        .take(limit)
        .map(|s| TopSupplier {
            supp_key: s.supp_key,
            name: s.name.clone(),
            nation: nation_names.get(&s.nation_key).map(|n| n.to_string()),
            acct_bal: s.acct_bal,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheapestSupplier {
    pub part_key: i64,
    pub supp_key: i64,
    pub supply_cost: Decimal,
    /// 1-based position within the part after ordering by (supply_cost, supp_key)
    pub rank: u32,
}

/// For every part, the `per_part` suppliers with the lowest supply cost.
/// Equal costs are ranked by supp_key so ranks are always distinct. Output is
/// ordered by (part_key, rank).
pub fn cheapest_suppliers_per_part(partsupps: &[PartSupp], per_part: usize) -> Vec<CheapestSupplier> {
    let mut by_part: BTreeMap<i64, Vec<(Decimal, i64)>> = BTreeMap::new();
    for ps in partsupps {
        by_part
            .entry(ps.part_key)
            .or_default()
            .push((ps.supply_cost, ps.supp_key));
    }

    let mut out = Vec::new();
    for (part_key, mut offers) in by_part {
        offers.sort();
        for (idx, (supply_cost, supp_key)) in offers.into_iter().take(per_part).enumerate() {
            out.push(CheapestSupplier {
                part_key,
                supp_key,
                supply_cost,
                rank: idx as u32 + 1,
            });
        }
    }
    out
}

impl Tabular for ActiveCustomer {
    fn contract() -> LockedSchema {
        LockedSchema::new(
            QueryKind::ActiveCustomers.table_name(),
            vec![
                LockedColumn::required("cust_key", DataType::Int64),
                LockedColumn::optional("name", DataType::String),
                LockedColumn::required("order_count", DataType::Int64),
            ],
        )
        .with_primary_key(&["cust_key"])
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.cust_key),
            opt_str(&self.name),
            Value::Int(i64::try_from(self.order_count).unwrap_or(i64::MAX)),
        ]
    }
}

impl Tabular for TopSupplier {
    fn contract() -> LockedSchema {
        LockedSchema::new(
            QueryKind::TopSuppliers.table_name(),
            vec![
                LockedColumn::required("supp_key", DataType::Int64),
                LockedColumn::required("name", DataType::String),
                LockedColumn::optional("nation", DataType::String),
                LockedColumn::required("acct_bal", DataType::money()),
            ],
        )
        .with_primary_key(&["supp_key"])
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.supp_key),
            text(&self.name),
            opt_str(&self.nation),
            Value::Decimal(self.acct_bal),
        ]
    }
}

impl Tabular for CheapestSupplier {
    fn contract() -> LockedSchema {
        LockedSchema::new(
            QueryKind::CheapestSuppliers.table_name(),
            vec![
                LockedColumn::required("part_key", DataType::Int64),
                LockedColumn::required("supp_key", DataType::Int64),
                LockedColumn::required("supply_cost", DataType::money()),
                LockedColumn::required("rank", DataType::Int64),
            ],
        )
        .with_primary_key(&["part_key", "rank"])
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.part_key),
            Value::Int(self.supp_key),
            Value::Decimal(self.supply_cost),
            Value::Int(i64::from(self.rank)),
        ]
    }
}

/// Results of all three queries for one dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResults {
    pub active_customers: Vec<ActiveCustomer>,
    pub top_suppliers: Vec<TopSupplier>,
    pub cheapest_suppliers: Vec<CheapestSupplier>,
}

pub fn run_queries(
    orders: &[Order],
    customers: &[Customer],
    suppliers: &[Supplier],
    nations: &[Nation],
    partsupps: &[PartSupp],
    config: &QueryConfig,
) -> QueryResults {
    let results = QueryResults {
        active_customers: top_active_customers(
            orders,
            customers,
            config.active_window_days,
            config.top_customers,
        ),
        top_suppliers: top_suppliers_by_balance(suppliers, nations, config.top_suppliers),
        cheapest_suppliers: cheapest_suppliers_per_part(partsupps, config.cheapest_per_part),
    };
    info!(
        active_customers = results.active_customers.len(),
        top_suppliers = results.top_suppliers.len(),
        cheapest_suppliers = results.cheapest_suppliers.len(),
        "Ran analytical queries"
    );
    results
}
