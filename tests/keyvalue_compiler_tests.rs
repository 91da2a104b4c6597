//! Key-value request generation against the Northwind catalog

use pretty_assertions::assert_eq;
use rql::backend::{Backend, KeyValueBackend, KeyValueOperation, KeyValueRequest, Value};
use rql::config::CompilerConfig;
use rql::error::{RqlError, RqlResult};
use rql::metadata::northwind;
use rql::query::Query;

fn compile_on(collection: &str, query_string: &str) -> RqlResult<KeyValueRequest> {
    let catalog = northwind::catalog();
    let collection = catalog.require(collection)?;
    let query = Query::from_query_string(collection, query_string)?;
    KeyValueBackend::new(CompilerConfig::default()).compile(&query, &catalog)
}

fn compile(query_string: &str) -> RqlResult<KeyValueRequest> {
    compile_on("orders", query_string)
}

fn names(request: &KeyValueRequest) -> Vec<(&str, &str)> {
    request
        .expression_attribute_names
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

// ==================== Query vs Scan Tests ====================

#[test]
fn test_scan_when_no_key_condition() {
    let request = compile("shipCountry=France&freight=gt=10&limit=20").unwrap();
    assert_eq!(request.operation, KeyValueOperation::Scan);
    assert_eq!(request.table_name, "Orders");
    assert_eq!(request.key_condition_expression, None);
    assert_eq!(
        request.filter_expression.as_deref(),
        Some("#name1 = :val1 AND #name2 > :val2")
    );
    assert_eq!(names(&request), vec![("#name1", "ShipCountry"), ("#name2", "Freight")]);
    assert_eq!(request.expression_attribute_values[":val2"], Value::Float(10.0));
    assert_eq!(request.limit, 20);
}

#[test]
fn test_primary_key_query() {
    let request = compile_on("customers", "customerId=ALFKI").unwrap();
    assert_eq!(request.operation, KeyValueOperation::Query);
    assert_eq!(request.index_name, None);
    assert_eq!(request.key_condition_expression.as_deref(), Some("#name1 = :val1"));
    assert_eq!(request.filter_expression, None);
}

#[test]
fn test_secondary_index_with_sort_key_prefix() {
    let request = compile("customerId=VINET&sw(orderDate,1996)&sort(orderDate)").unwrap();
    assert_eq!(request.index_name.as_deref(), Some("customerIndex"));
    assert_eq!(
        request.key_condition_expression.as_deref(),
        Some("#name1 = :val1 AND begins_with(#name2, :val2)")
    );
    assert_eq!(request.scan_index_forward, Some(true));
}

#[test]
fn test_wildcard_on_hash_column_scans() {
    let request = compile("customerId=VI*").unwrap();
    assert_eq!(request.operation, KeyValueOperation::Scan);
    assert_eq!(
        request.filter_expression.as_deref(),
        Some("begins_with(#name1, :val1)")
    );
}

// ==================== Filter Tests ====================

#[test]
fn test_names_are_reused() {
    let request = compile("or(lt(freight,5),gt(freight,100))").unwrap();
    assert_eq!(
        request.filter_expression.as_deref(),
        Some("(#name1 < :val1 OR #name1 > :val2)")
    );
    assert_eq!(names(&request), vec![("#name1", "Freight")]);
}

#[test]
fn test_existence_functions() {
    let request = compile("n(shippedDate)&nn(shipRegion)&emp(shipName)").unwrap();
    assert_eq!(
        request.filter_expression.as_deref(),
        Some("attribute_not_exists(#name1) AND attribute_exists(#name2) AND (attribute_not_exists(#name3) OR #name3 = :val1)")
    );
    assert_eq!(request.expression_attribute_values[":val1"], Value::text(""));
}

#[test]
fn test_contains_and_membership() {
    let request = compile("w(shipName,Chop)&wo(shipName,Suey)&out(shipVia,1,2)").unwrap();
    assert_eq!(
        request.filter_expression.as_deref(),
        Some("contains(#name1, :val1) AND NOT contains(#name1, :val2) AND NOT (#name2 IN (:val3, :val4))")
    );
}

#[test]
fn test_projection() {
    let request = compile("includes(orderId,shipCity)").unwrap();
    assert_eq!(request.projection_expression.as_deref(), Some("#name1, #name2"));
    assert_eq!(names(&request), vec![("#name1", "OrderID"), ("#name2", "ShipCity")]);
}

// ==================== Paging Tests ====================

#[test]
fn test_exclusive_start_key_and_count() {
    let request = compile_on("orderDetails", "after(10248,11)&rowcount").unwrap();
    let key = request.exclusive_start_key.unwrap();
    assert_eq!(key["OrderID"], Value::Int(10248));
    assert_eq!(key["ProductID"], Value::Int(11));
    assert!(request.select_count);
}

#[test]
fn test_offset_is_reported() {
    let request = compile("pageNum=2&pageSize=10").unwrap();
    assert_eq!(request.offset, 10);
    assert_eq!(request.limit, 10);
}

// ==================== Unsupported Tests ====================

#[test]
fn test_unsupported_features() {
    for qs in [
        "ew(shipCity,ville)",
        "like(shipName,*Carnes)",
        "aggregate(count,shipCountry)",
        "group(shipCountry)",
        "includes(shipCountry)&distinct",
        "if(eq(shipCountry,France),gt(freight,1),lt(freight,1))",
        "customer.country=Germany",
        "sort(freight)",
        "customerId=VINET&sort(freight)",
    ] {
        assert!(
            matches!(compile(qs), Err(RqlError::UnsupportedFeature { .. })),
            "{qs}"
        );
    }
}
