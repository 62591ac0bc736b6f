//! Schemas shared by the integration tests, with matching DDL.

use kiln::{schema::app::Cascade, Schema, Type};

/// Departments, their employees and projects, and tasks with generated
/// identifiers.
pub fn company() -> Schema {
    Schema::builder()
        .entity("Department", |m| {
            m.id("id", Type::I64);
            m.basic("name", Type::String);
            m.version("version");
            m.one_to_many("employees", "Employee", "department")
                .cascade(Cascade::ALL);
            m.one_to_many("projects", "Project", "department");
        })
        .entity("Employee", |m| {
            m.id("id", Type::I64);
            m.basic("name", Type::String);
            m.basic("salary", Type::I64);
            m.embedded("address", "Address");
            m.many_to_one("department", "Department").lazy();
            m.batch_size(5);
        })
        .embeddable("Address", |m| {
            m.basic("street", Type::String);
            m.basic("city", Type::String);
        })
        .entity("Project", |m| {
            m.id("id", Type::I64);
            m.basic("name", Type::String);
            m.many_to_one("department", "Department").lazy();
        })
        .entity("Task", |m| {
            m.id_generated("id", Type::I64);
            m.basic("title", Type::String);
            m.many_to_one("assignee", "Employee").lazy();
        })
        .build()
        .unwrap()
}

pub const COMPANY_DDL: &str = "
    CREATE TABLE department (id INTEGER PRIMARY KEY, name TEXT, version INTEGER NOT NULL);
    CREATE TABLE employee (
        id INTEGER PRIMARY KEY,
        name TEXT,
        salary INTEGER,
        street TEXT,
        city TEXT,
        department_id INTEGER REFERENCES department (id)
    );
    CREATE TABLE project (id INTEGER PRIMARY KEY, name TEXT, department_id INTEGER);
    CREATE TABLE task (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, assignee_id INTEGER);
";

/// `INSERT` statements for employees `1..=count`, named `e{id}`, without
/// a department.
pub fn employees(count: i64) -> String {
    (1..=count)
        .map(|id| {
            format!(
                "INSERT INTO employee (id, name, salary, street, city) \
                 VALUES ({id}, 'e{id}', {}, 'Main St', 'Oslo');\n",
                id * 100
            )
        })
        .collect()
}

/// Shipments keyed by a (region, number) composite identifier.
pub fn shipping() -> Schema {
    Schema::builder()
        .entity("Shipment", |m| {
            m.embedded_id("key", "ShipmentKey");
            m.basic("weight", Type::F64);
            m.one_to_many("parcels", "Parcel", "shipment").set();
        })
        .embeddable("ShipmentKey", |m| {
            m.basic("region", Type::String);
            m.basic("number", Type::I64);
        })
        .entity("Parcel", |m| {
            m.id("id", Type::I64);
            m.basic("label", Type::String);
            m.many_to_one("shipment", "Shipment").lazy();
        })
        .build()
        .unwrap()
}

pub const SHIPPING_DDL: &str = "
    CREATE TABLE shipment (region TEXT, number INTEGER, weight REAL, PRIMARY KEY (region, number));
    CREATE TABLE parcel (
        id INTEGER PRIMARY KEY,
        label TEXT,
        shipment_region TEXT,
        shipment_number INTEGER
    );
";

/// One entity with an attribute per supported type.
pub fn samples() -> Schema {
    Schema::builder()
        .entity("Sample", |m| {
            m.id("id", Type::I64);
            m.basic("flag", Type::Bool);
            m.basic("small", Type::I32);
            m.basic("ratio", Type::F64);
            m.basic("label", Type::String);
            m.basic("data", Type::Bytes);
            m.basic("token", Type::Uuid);
            m.basic("day", Type::Date);
            m.basic("at", Type::Timestamp);
            m.basic("at_millis", Type::Timestamp).precision(3);
        })
        .build()
        .unwrap()
}

pub const SAMPLES_DDL: &str = "
    CREATE TABLE sample (
        id INTEGER PRIMARY KEY,
        flag INTEGER,
        small INTEGER,
        ratio REAL,
        label TEXT,
        data BLOB,
        token TEXT,
        day TEXT,
        at TEXT,
        at_millis TEXT
    );
";
