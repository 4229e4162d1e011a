//! End-to-end loader tests: a directory of dbgen-style files in, typed
//! relations out.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wholesale_schema::{
    ConstraintKind, Dataset, LoadError, LoadOptions, TableName, ViolationType,
};

const REGION: &str = "0|AFRICA|lar deposits|\n1|AMERICA|hs use ironic|\n";
const NATION: &str = "0|ALGERIA|0|haggle|\n1|ARGENTINA|1|al foxes|\n";
const PART: &str = "1|goldenrod lavender spring|Manufacturer#1|Brand#13|PROMO BURNISHED COPPER|7|JUMBO PKG|901.00|ly. slyly ironi|\n2|blush thistle blue|Manufacturer#1|Brand#13|LARGE BRUSHED BRASS|1|LG CASE|902.00|lar accounts|\n";
const SUPPLIER: &str = "1|Supplier#000000001| N kD4on9OM Ipw3|0|27-918-335-1736|5755.94|each slyly above|\n2|Supplier#000000002|89eJ5ksX3Imx|1|15-679-861-2259|4032.68| slyly bold|\n";
const PARTSUPP: &str = "1|1|3325|771.64|final theodolites|\n1|2|8076|993.49|ven ideas|\n2|2|3956|337.09|after the fluffily|\n";
const CUSTOMER: &str = "1|Customer#000000001|IVhzIApeRb|0|25-989-741-2988|711.56|BUILDING|to the even|\n2|Customer#000000002|XSTf4,NCwDVaW|1|23-768-687-3665|121.65|AUTOMOBILE|l accounts|\n";
const ORDERS: &str = "1|1|O|173665.47|1996-01-02|5-LOW|Clerk#000000951|0|nstructions sleep|\n2|2|F|46929.18|1996-12-01|1-URGENT|Clerk#000000880|0| foxes|\n";
const LINEITEM: &str = "1|1|1|1|17|21168.23|0.04|0.02|N|O|1996-03-13|1996-02-12|1996-03-22|DELIVER IN PERSON|TRUCK|egular courts|\n1|2|2|2|36|45983.16|0.09|0.06|N|O|1996-04-12|1996-02-28|1996-04-20|TAKE BACK RETURN|MAIL|ly final|\n2|1|2|1|38|44694.46|0.00|0.05|N|O|1997-01-28|1997-01-14|1997-02-02|TAKE BACK RETURN|RAIL|ven requests|\n";

fn write_tables(dir: &Path, lineitem: &str) {
    let files = [
        ("region.tbl", REGION),
        ("nation.tbl", NATION),
        ("part.tbl", PART),
        ("supplier.tbl", SUPPLIER),
        ("partsupp.tbl", PARTSUPP),
        ("customer.tbl", CUSTOMER),
        ("orders.tbl", ORDERS),
        ("lineitem.tbl", lineitem),
    ];
    for (name, body) in files {
        fs::write(dir.join(name), body).unwrap();
    }
}

#[test]
fn test_load_dir_types_every_table() {
    let dir = TempDir::new().unwrap();
    write_tables(dir.path(), LINEITEM);

    let dataset = Dataset::load_dir(dir.path(), &LoadOptions::default()).unwrap();

    let counts: Vec<usize> = dataset.row_counts().into_iter().map(|(_, n)| n).collect();
    assert_eq!(counts, vec![2, 2, 2, 2, 3, 2, 2, 3]);
    assert_eq!(dataset.relations.len(), 8);
    assert_eq!(dataset.orders[1].order_date.to_string(), "1996-12-01");
    assert_eq!(dataset.lineitems[2].discount.to_string(), "0.00");
    assert_eq!(dataset.customers[1].mkt_segment, "AUTOMOBILE");
}

#[test]
fn test_load_dir_rejects_out_of_range_discount() {
    let dir = TempDir::new().unwrap();
    let bad = LINEITEM.replace("|0.09|0.06|", "|1.09|0.06|");
    write_tables(dir.path(), &bad);

    let err = Dataset::load_dir(dir.path(), &LoadOptions::default()).unwrap_err();
    match err {
        LoadError::Constraint(v) => {
            assert_eq!(v.kind, ConstraintKind::CheckFailed);
            assert_eq!(v.table, "lineitem");
            assert_eq!(v.column, "l_discount");
            assert_eq!(v.line, Some(2));
            assert_eq!(v.value, "1.09");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_load_dir_rejects_zero_quantity() {
    let dir = TempDir::new().unwrap();
    let bad = LINEITEM.replace("|38|44694.46|", "|0|44694.46|");
    write_tables(dir.path(), &bad);

    let err = Dataset::load_dir(dir.path(), &LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), "constraint_violation");
    assert_eq!(err.table(), Some("lineitem"));
    assert!(err.to_string().contains("l_quantity"));
}

#[test]
fn test_load_dir_rejects_bad_date() {
    let dir = TempDir::new().unwrap();
    let bad = LINEITEM.replace("1997-01-28", "1997-13-28");
    write_tables(dir.path(), &bad);

    match Dataset::load_dir(dir.path(), &LoadOptions::default()).unwrap_err() {
        LoadError::Schema(v) => {
            assert_eq!(v.violation_type, ViolationType::TypeMismatch);
            assert_eq!(v.column.as_deref(), Some("l_shipdate"));
            assert_eq!(v.line, Some(3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    write_tables(dir.path(), LINEITEM);
    fs::remove_file(dir.path().join("partsupp.tbl")).unwrap();

    let err = Dataset::load_dir(dir.path(), &LoadOptions::default()).unwrap_err();
    match err {
        LoadError::Io { path, .. } => assert!(path.ends_with("partsupp.tbl")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_custom_delimiter_and_file_name() {
    let dir = TempDir::new().unwrap();
    write_tables(dir.path(), LINEITEM);
    for table in TableName::all() {
        let path = dir.path().join(table.file_name("tbl"));
        let body = fs::read_to_string(&path).unwrap().replace('|', "\t");
        fs::remove_file(&path).unwrap();
        fs::write(dir.path().join(table.file_name("tsv")), body).unwrap();
    }
    fs::rename(dir.path().join("orders.tsv"), dir.path().join("ORDERS_2024.tsv")).unwrap();

    let mut options = LoadOptions {
        delimiter: b'\t',
        extension: "tsv".to_string(),
        ..LoadOptions::default()
    };
    options
        .file_names
        .insert(TableName::Orders, "ORDERS_2024.tsv".to_string());

    let dataset = Dataset::load_dir(dir.path(), &options).unwrap();
    assert_eq!(dataset.orders.len(), 2);
    assert_eq!(dataset.lineitems.len(), 3);
}
