//! SQL generation across dialects against the Northwind catalog

use pretty_assertions::assert_eq;
use rql::backend::{Backend, SqlBackend, SqlDialect, SqlStatement, Value};
use rql::config::{BindStyle, CompilerConfig};
use rql::error::{RqlError, RqlResult};
use rql::metadata::northwind;
use rql::query::Query;

fn compile_with(
    collection: &str,
    query_string: &str,
    dialect: SqlDialect,
    config: CompilerConfig,
) -> RqlResult<SqlStatement> {
    let catalog = northwind::catalog();
    let collection = catalog.require(collection)?;
    let query = Query::from_query_string(collection, query_string)?;
    SqlBackend::new(dialect, config).compile(&query, &catalog)
}

fn postgres(collection: &str, query_string: &str) -> SqlStatement {
    compile_with(collection, query_string, SqlDialect::Postgres, CompilerConfig::default()).unwrap()
}

fn values(statement: &SqlStatement) -> Vec<Value> {
    statement.values.values().into_iter().cloned().collect()
}

// ==================== Basic Tests ====================

#[test]
fn test_nested_multi_value_eq() {
    let statement = postgres("orders", "or(eq(shipCountry,France,Spain),n(shippedDate))");
    assert!(
        statement.sql.contains(r#"(t0."ShipCountry" IN (?, ?) OR t0."ShippedDate" IS NULL)"#),
        "{}",
        statement.sql
    );
    assert_eq!(values(&statement), vec![Value::text("France"), Value::text("Spain")]);
}

#[test]
fn test_filter_sort_and_page() {
    let statement = postgres("orders", "shipCountry=France&sort(-orderDate)&limit=10&offset=20");
    assert_eq!(
        statement.sql,
        "SELECT t0.*\nFROM \"Orders\" t0\nWHERE t0.\"ShipCountry\" = ?\nORDER BY t0.\"OrderDate\" DESC\nLIMIT 10 OFFSET 20"
    );
    assert_eq!(values(&statement), vec![Value::text("France")]);
    assert_eq!(statement.values.get(0), Some(("shipCountry", &Value::text("France"))));
}

#[test]
fn test_numbered_placeholders_follow_emission_order() {
    let config = CompilerConfig::default().with_bind_style(BindStyle::Numbered);
    let statement = compile_with(
        "orders",
        "freight=gt=10&shipVia=in=1,2",
        SqlDialect::Postgres,
        config,
    )
    .unwrap();
    assert_eq!(
        statement.sql,
        "SELECT t0.*\nFROM \"Orders\" t0\nWHERE t0.\"Freight\" > $1 AND t0.\"ShipVia\" IN ($2, $3)\nLIMIT 100"
    );
    assert_eq!(
        values(&statement),
        vec![Value::Float(10.0), Value::Int(1), Value::Int(2)]
    );
}

#[test]
fn test_null_comparisons() {
    let statement = postgres("orders", "shippedDate=null&ne(shipRegion,null)&nemp(shipName)");
    assert_eq!(
        statement.sql,
        "SELECT t0.*\nFROM \"Orders\" t0\nWHERE t0.\"ShippedDate\" IS NULL AND t0.\"ShipRegion\" IS NOT NULL AND (t0.\"ShipName\" IS NOT NULL AND t0.\"ShipName\" <> '')\nLIMIT 100"
    );
    assert!(statement.values.is_empty());
}

#[test]
fn test_quoted_null_is_text() {
    let statement = postgres("orders", "shipRegion='null'");
    assert_eq!(values(&statement), vec![Value::text("null")]);
}

#[test]
fn test_or_and_not() {
    let statement = postgres("orders", "or(eq(shipCountry,France),not(lt(freight,5)))");
    assert_eq!(
        statement.sql,
        "SELECT t0.*\nFROM \"Orders\" t0\nWHERE (t0.\"ShipCountry\" = ? OR NOT (t0.\"Freight\" < ?))\nLIMIT 100"
    );
}

// ==================== Text Matching Tests ====================

#[test]
fn test_text_matching_patterns() {
    let statement = postgres(
        "orders",
        "sw(shipName,Han)&ew(shipCity,ville)&w(shipAddress,50%)&wo(shipName,Chop,Suey)",
    );
    assert_eq!(
        values(&statement),
        vec![
            Value::text("Han%"),
            Value::text("%ville"),
            Value::text("%50\\%%"),
            Value::text("%Chop%"),
            Value::text("%Suey%"),
        ]
    );
    assert!(statement
        .sql
        .contains("(t0.\"ShipName\" NOT LIKE ? AND t0.\"ShipName\" NOT LIKE ?)"));
}

#[test]
fn test_wildcard_eq_is_like() {
    let statement = postgres("orders", "shipName=*Chop*");
    assert!(statement.sql.contains("t0.\"ShipName\" LIKE ?"));
    assert_eq!(values(&statement), vec![Value::text("%Chop%")]);
}

#[test]
fn test_escape_clause_per_dialect() {
    let sqlite =
        compile_with("orders", "sw(shipName,Han)", SqlDialect::Sqlite, CompilerConfig::default())
            .unwrap();
    assert!(sqlite.sql.contains("LIKE ? ESCAPE '\\'"));

    let mysql =
        compile_with("orders", "sw(shipName,Han)", SqlDialect::MySql, CompilerConfig::default())
            .unwrap();
    assert!(!mysql.sql.contains("ESCAPE"));
}

// ==================== Join Tests ====================

#[test]
fn test_many_to_one_join_and_aliases() {
    let statement = postgres(
        "orders",
        "customer.country=Germany&includes(orderId,customer.companyName)",
    );
    assert_eq!(
        statement.sql,
        "SELECT t0.\"OrderID\" AS \"orderId\", t1.\"CompanyName\" AS \"customer.companyName\"\nFROM \"Orders\" t0\nLEFT JOIN \"Customers\" t1 ON t0.\"CustomerID\" = t1.\"CustomerID\"\nWHERE t1.\"Country\" = ?\nLIMIT 100"
    );
}

#[test]
fn test_join_is_reused() {
    let statement = postgres("orders", "customer.country=Germany&customer.city=Berlin");
    assert_eq!(statement.sql.matches("LEFT JOIN").count(), 1);
}

#[test]
fn test_many_to_many_forces_distinct() {
    let statement = postgres("employees", "territories.regionId=1");
    assert_eq!(
        statement.sql,
        "SELECT DISTINCT t0.*\nFROM \"Employees\" t0\nLEFT JOIN \"EmployeeTerritories\" t1 ON t0.\"EmployeeID\" = t1.\"EmployeeID\"\nLEFT JOIN \"Territories\" t2 ON t1.\"TerritoryID\" = t2.\"TerritoryID\"\nWHERE t2.\"RegionID\" = ?\nLIMIT 100"
    );
}

#[test]
fn test_self_join() {
    let statement = postgres("employees", "reportsTo.lastName=Fuller");
    assert!(statement
        .sql
        .contains("LEFT JOIN \"Employees\" t1 ON t0.\"ReportsTo\" = t1.\"EmployeeID\""));
}

#[test]
fn test_relationship_depth_limit() {
    let config = CompilerConfig {
        max_relationship_depth: 1,
        ..CompilerConfig::default()
    };
    let result = compile_with(
        "orders",
        "customer.orders.shipCity=Berlin",
        SqlDialect::Postgres,
        config,
    );
    assert!(matches!(result, Err(RqlError::Grammar(_))));
}

// ==================== Aggregate Tests ====================

#[test]
fn test_aggregate_with_group_and_alias_sort() {
    let statement = postgres("orders", "aggregate(count,shipCountry,total)&sort(-total)");
    assert_eq!(
        statement.sql,
        "SELECT t0.\"ShipCountry\" AS \"shipCountry\", COUNT(t0.\"ShipCountry\") AS \"total\"\nFROM \"Orders\" t0\nGROUP BY t0.\"ShipCountry\"\nORDER BY \"total\" DESC\nLIMIT 100"
    );
}

#[test]
fn test_anonymous_count() {
    let statement = postgres("orders", "count(*)");
    assert_eq!(
        statement.sql,
        "SELECT COUNT(*) AS \"count(*)\"\nFROM \"Orders\" t0\nLIMIT 100"
    );
}

#[test]
fn test_count_as_column() {
    let statement = postgres("orders", "countascol(shipCountry,France,Spain)");
    assert_eq!(
        statement.sql,
        "SELECT SUM(CASE WHEN t0.\"ShipCountry\" = ? THEN 1 ELSE 0 END) AS \"France\", SUM(CASE WHEN t0.\"ShipCountry\" = ? THEN 1 ELSE 0 END) AS \"Spain\"\nFROM \"Orders\" t0\nWHERE t0.\"ShipCountry\" IN (?, ?)\nLIMIT 100"
    );
    assert_eq!(
        values(&statement),
        vec![
            Value::text("France"),
            Value::text("Spain"),
            Value::text("France"),
            Value::text("Spain"),
        ]
    );
}

#[test]
fn test_where_if_binds_condition_twice() {
    let statement = postgres(
        "orders",
        "if(eq(shipCountry,France),gt(freight,10),lt(freight,5))",
    );
    assert!(statement.sql.contains(
        "((t0.\"ShipCountry\" = ? AND t0.\"Freight\" > ?) OR (NOT (t0.\"ShipCountry\" = ?) AND t0.\"Freight\" < ?))"
    ));
    assert_eq!(
        values(&statement),
        vec![
            Value::text("France"),
            Value::Float(10.0),
            Value::text("France"),
            Value::Float(5.0),
        ]
    );
}

// ==================== Paging Tests ====================

#[test]
fn test_paging_per_dialect() {
    let qs = "pageNum=3&pageSize=7";
    let mysql = compile_with("orders", qs, SqlDialect::MySql, CompilerConfig::default()).unwrap();
    assert_eq!(mysql.sql, "SELECT t0.*\nFROM `Orders` t0\nLIMIT 14, 7");

    let mssql =
        compile_with("orders", qs, SqlDialect::SqlServer, CompilerConfig::default()).unwrap();
    assert_eq!(
        mssql.sql,
        "SELECT t0.*\nFROM [Orders] t0\nORDER BY (SELECT NULL)\nOFFSET 14 ROWS FETCH NEXT 7 ROWS ONLY"
    );
    assert_eq!(mssql.window.offset, 14);
    assert_eq!(mssql.window.limit, 7);
}

#[test]
fn test_row_count_uses_unpaged_statement() {
    let statement = postgres("orders", "shipCountry=France&rowcount&sort(freight)&limit=5");
    assert_eq!(
        statement.count_sql.as_deref(),
        Some("SELECT COUNT(*) FROM (SELECT t0.*\nFROM \"Orders\" t0\nWHERE t0.\"ShipCountry\" = ?) rc")
    );
    assert!(postgres("orders", "limit=5").count_sql.is_none());
}

// ==================== Error Tests ====================

#[test]
fn test_after_is_unsupported() {
    let result = compile_with("orders", "after(10250)", SqlDialect::Postgres, CompilerConfig::default());
    assert!(matches!(
        result,
        Err(RqlError::UnsupportedFeature { ref function, .. }) if function == "after"
    ));
}

#[test]
fn test_bad_values_name_the_column() {
    let err = compile_with("orders", "freight=lots", SqlDialect::Postgres, CompilerConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("freight"));
}

#[test]
fn test_unknown_column() {
    let err = compile_with("orders", "colour=red", SqlDialect::Postgres, CompilerConfig::default())
        .unwrap_err();
    assert!(matches!(err, RqlError::Metadata(_)));
}
