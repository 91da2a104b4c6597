//! Northwind sample catalog
//!
//! A small slice of the classic Northwind database: orders, their line items,
//! customers, employees (with a many-to-many to territories) and products.

use super::{
    Cardinality, Catalog, Collection, Index, IndexKind, KeyPair, Property, PropertyType,
    Relationship,
};

/// Create the sample catalog
pub fn catalog() -> Catalog {
    let mut catalog = Catalog::new();

    catalog.add_collection(create_orders());
    catalog.add_collection(create_order_details());
    catalog.add_collection(create_customers());
    catalog.add_collection(create_employees());
    catalog.add_collection(create_territories());
    catalog.add_collection(create_products());

    catalog
}

fn prop(name: &str, column: &str, property_type: PropertyType) -> Property {
    Property::new(name, property_type).with_column(column)
}

fn create_orders() -> Collection {
    let mut orders = Collection::new("orders").with_table("Orders");

    orders.add_property(prop("orderId", "OrderID", PropertyType::Integer).with_nullable(false));
    orders.add_property(prop("customerId", "CustomerID", PropertyType::String));
    orders.add_property(prop("employeeId", "EmployeeID", PropertyType::Integer));
    orders.add_property(prop("orderDate", "OrderDate", PropertyType::Timestamp));
    orders.add_property(prop("requiredDate", "RequiredDate", PropertyType::Timestamp));
    orders.add_property(prop("shippedDate", "ShippedDate", PropertyType::Timestamp));
    orders.add_property(prop("shipVia", "ShipVia", PropertyType::Integer));
    orders.add_property(prop("freight", "Freight", PropertyType::Decimal));
    orders.add_property(prop("shipName", "ShipName", PropertyType::String));
    orders.add_property(prop("shipAddress", "ShipAddress", PropertyType::String));
    orders.add_property(prop("shipCity", "ShipCity", PropertyType::String));
    orders.add_property(prop("shipRegion", "ShipRegion", PropertyType::String));
    orders.add_property(prop("shipPostalCode", "ShipPostalCode", PropertyType::String));
    orders.add_property(prop("shipCountry", "ShipCountry", PropertyType::String));

    orders.add_index(Index::new("primaryIndex", IndexKind::Primary, ["orderId"]));
    orders.add_index(Index::new(
        "customerIndex",
        IndexKind::Secondary,
        ["customerId", "orderDate"],
    ));
    orders.add_index(Index::new("partitionKey", IndexKind::Partition, ["customerId"]));

    orders.add_relationship(Relationship::new(
        "customer",
        Cardinality::ManyToOne,
        "customers",
        vec![KeyPair::new("CustomerID", "CustomerID")],
    ));
    orders.add_relationship(Relationship::new(
        "employee",
        Cardinality::ManyToOne,
        "employees",
        vec![KeyPair::new("EmployeeID", "EmployeeID")],
    ));
    orders.add_relationship(Relationship::new(
        "orderDetails",
        Cardinality::OneToMany,
        "orderDetails",
        vec![KeyPair::new("OrderID", "OrderID")],
    ));

    orders
}

fn create_order_details() -> Collection {
    let mut details = Collection::new("orderDetails").with_table("OrderDetails");

    details.add_property(prop("orderId", "OrderID", PropertyType::Integer).with_nullable(false));
    details.add_property(prop("productId", "ProductID", PropertyType::Integer).with_nullable(false));
    details.add_property(prop("unitPrice", "UnitPrice", PropertyType::Decimal));
    details.add_property(prop("quantity", "Quantity", PropertyType::Integer));
    details.add_property(prop("discount", "Discount", PropertyType::Decimal));

    // composite key: `_key(primaryIndex,10248~11)`
    details.add_index(Index::new(
        "primaryIndex",
        IndexKind::Primary,
        ["orderId", "productId"],
    ));

    details.add_relationship(Relationship::new(
        "order",
        Cardinality::ManyToOne,
        "orders",
        vec![KeyPair::new("OrderID", "OrderID")],
    ));
    details.add_relationship(Relationship::new(
        "product",
        Cardinality::ManyToOne,
        "products",
        vec![KeyPair::new("ProductID", "ProductID")],
    ));

    details
}

fn create_customers() -> Collection {
    let mut customers = Collection::new("customers").with_table("Customers");

    customers.add_property(prop("customerId", "CustomerID", PropertyType::String).with_nullable(false));
    customers.add_property(prop("companyName", "CompanyName", PropertyType::String));
    customers.add_property(prop("contactName", "ContactName", PropertyType::String));
    customers.add_property(prop("city", "City", PropertyType::String));
    customers.add_property(prop("country", "Country", PropertyType::String));

    customers.add_index(Index::new("primaryIndex", IndexKind::Primary, ["customerId"]));

    customers.add_relationship(Relationship::new(
        "orders",
        Cardinality::OneToMany,
        "orders",
        vec![KeyPair::new("CustomerID", "CustomerID")],
    ));

    customers
}

fn create_employees() -> Collection {
    let mut employees = Collection::new("employees").with_table("Employees");

    employees.add_property(prop("employeeId", "EmployeeID", PropertyType::Integer).with_nullable(false));
    employees.add_property(prop("lastName", "LastName", PropertyType::String));
    employees.add_property(prop("firstName", "FirstName", PropertyType::String));
    employees.add_property(prop("title", "Title", PropertyType::String));
    employees.add_property(prop("city", "City", PropertyType::String));
    employees.add_property(prop("country", "Country", PropertyType::String));
    employees.add_property(prop("reportsTo", "ReportsTo", PropertyType::Integer));

    employees.add_index(Index::new("primaryIndex", IndexKind::Primary, ["employeeId"]));

    employees.add_relationship(Relationship::new(
        "reportsTo",
        Cardinality::ManyToOne,
        "employees",
        vec![KeyPair::new("ReportsTo", "EmployeeID")],
    ));
    employees.add_relationship(
        Relationship::new(
            "territories",
            Cardinality::ManyToMany,
            "territories",
            vec![KeyPair::new("EmployeeID", "EmployeeID")],
        )
        .through(
            "EmployeeTerritories",
            vec![KeyPair::new("TerritoryID", "TerritoryID")],
        ),
    );

    employees
}

fn create_territories() -> Collection {
    let mut territories = Collection::new("territories").with_table("Territories");

    territories.add_property(prop("territoryId", "TerritoryID", PropertyType::String).with_nullable(false));
    territories.add_property(prop(
        "territoryDescription",
        "TerritoryDescription",
        PropertyType::String,
    ));
    territories.add_property(prop("regionId", "RegionID", PropertyType::Integer));

    territories.add_index(Index::new("primaryIndex", IndexKind::Primary, ["territoryId"]));

    territories
}

fn create_products() -> Collection {
    let mut products = Collection::new("products").with_table("Products");

    products.add_property(prop("productId", "ProductID", PropertyType::Integer).with_nullable(false));
    products.add_property(prop("productName", "ProductName", PropertyType::String));
    products.add_property(prop("unitPrice", "UnitPrice", PropertyType::Decimal));
    products.add_property(prop("unitsInStock", "UnitsInStock", PropertyType::Integer));
    products.add_property(prop("discontinued", "Discontinued", PropertyType::Boolean));

    products.add_index(Index::new("primaryIndex", IndexKind::Primary, ["productId"]));

    products
}
