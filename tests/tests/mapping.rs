use chrono::NaiveDate;
use kiln::{Composite, Object, Value};
use pretty_assertions::assert_eq;
use tests::{assert_err, assert_some, models, DbTest};
use uuid::Uuid;

const COMPANY_SEED: &str = "
    INSERT INTO department (id, name, version) VALUES (1, 'R&D', 0);
    INSERT INTO employee (id, name, salary, street, city, department_id)
        VALUES (1, 'Ada', 100, 'Main St', 'Oslo', 1);
    INSERT INTO employee (id, name, salary, street, city, department_id)
        VALUES (2, 'Grace', 200, NULL, NULL, 1);
    INSERT INTO project (id, name, department_id) VALUES (1, 'Compiler', 1);
";

fn company() -> DbTest {
    let ddl = format!("{}{}", models::COMPANY_DDL, COMPANY_SEED);
    let mut test = DbTest::new(models::company(), &ddl);
    test.log().clear();
    test
}

#[test]
fn embedded_values() {
    let test = company();
    let mut session = test.db.open_session().unwrap();

    let ada = assert_some!(session.find("Employee", 1i64));
    let address = ada.composite("address").unwrap().unwrap();
    assert_eq!(address.get("street").unwrap(), Value::from("Main St"));
    assert_eq!(address.get("city").unwrap(), Value::from("Oslo"));

    // Every column null reads as no value at all
    let grace = assert_some!(session.find("Employee", 2i64));
    assert!(grace.composite("address").unwrap().is_none());
}

#[test]
fn replacing_an_embedded_value_updates_its_columns() {
    let mut test = company();
    let mut session = test.db.open_session().unwrap();

    let grace = assert_some!(session.find("Employee", 2i64));
    let mut address = Composite::new(session.schema(), "Address").unwrap();
    address.set("street", "Harbour Rd").unwrap();
    address.set("city", "Bergen").unwrap();
    grace.set_composite("address", Some(address)).unwrap();
    test.log().clear();

    session.flush().unwrap();
    assert_eq!(test.log().updates(), 1);

    let city = session
        .create_query("select e.address.city from Employee e where e.id = 2")
        .unwrap()
        .unique_result()
        .unwrap();
    assert_eq!(city, Some(Object::Value(Value::from("Bergen"))));
}

#[test]
fn fetching_two_bags_is_rejected() {
    let test = company();
    let mut session = test.db.open_session().unwrap();

    let err = session
        .create_query("select d from Department d join fetch d.employees join fetch d.projects")
        .unwrap()
        .list()
        .unwrap_err();
    assert!(err.is_multiple_bag_fetch());
    assert_eq!(
        err.bag_roles().unwrap(),
        ["Department.employees", "Department.projects"]
    );
}

#[test]
fn fetched_collections_are_initialized_by_the_query() {
    let mut test = company();
    let mut session = test.db.open_session().unwrap();

    let departments = session
        .create_query("select d from Department d join fetch d.employees")
        .unwrap()
        .list()
        .unwrap();

    // One department per row of the join, collapsed to one result
    assert_eq!(departments.len(), 1);
    let department = departments[0].as_entity().unwrap();
    let employees = department.collection("employees").unwrap();
    assert!(employees.is_initialized());
    assert_eq!(employees.len().unwrap(), 2);
    assert_eq!(test.log().selects(), 1);

    // The other association is still lazy
    assert!(!department.collection("projects").unwrap().is_initialized());
    let projects = session.collection(department, "projects").unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(test.log().selects(), 2);
}

#[test]
fn joined_associations_in_predicates() {
    let test = company();
    let mut session = test.db.open_session().unwrap();

    let names = session
        .create_query(
            "select e.name from Employee e join e.department d \
             where d.name = :department and e.address is not null",
        )
        .unwrap()
        .set_parameter("department", "R&D")
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(names, [Object::Value(Value::from("Ada"))]);
}

#[test]
fn composite_identifiers() {
    let ddl = format!(
        "{}{}",
        models::SHIPPING_DDL,
        "
        INSERT INTO shipment (region, number, weight) VALUES ('eu', 1, 2.5);
        INSERT INTO shipment (region, number, weight) VALUES ('eu', 2, 1.0);
        INSERT INTO parcel (id, label, shipment_region, shipment_number) VALUES (1, 'a', 'eu', 1);
        INSERT INTO parcel (id, label, shipment_region, shipment_number) VALUES (2, 'b', 'eu', 1);
        INSERT INTO parcel (id, label, shipment_region, shipment_number) VALUES (3, 'c', 'eu', 2);
        "
    );
    let test = DbTest::new(models::shipping(), &ddl);
    let mut session = test.db.open_session().unwrap();

    let key = Value::record_from_vec(vec![Value::from("eu"), Value::I64(1)]);
    let shipment = session.find("Shipment", key.clone()).unwrap().unwrap();
    assert_eq!(shipment.id(), key);
    assert_eq!(shipment.get("weight").unwrap(), Value::F64(2.5));

    let id = shipment.composite("key").unwrap().unwrap();
    assert_eq!(id.get("region").unwrap(), Value::from("eu"));
    assert_eq!(id.get("number").unwrap(), Value::I64(1));

    let parcels = session.collection(&shipment, "parcels").unwrap();
    let mut labels: Vec<_> = parcels
        .iter()
        .map(|parcel| parcel.get("label").unwrap())
        .collect();
    labels.sort_by_key(|label| label.to_string());
    assert_eq!(labels, [Value::from("a"), Value::from("b")]);
    assert!(parcels
        .iter()
        .all(|parcel| parcel.to_one("shipment").unwrap().unwrap().ptr_eq(&shipment)));

    let parcel = assert_some!(session.find("Parcel", 3i64));
    let owner = parcel.to_one("shipment").unwrap().unwrap();
    assert_eq!(
        owner.id(),
        Value::record_from_vec(vec![Value::from("eu"), Value::I64(2)])
    );
}

#[test]
fn values_keep_their_types() {
    let test = DbTest::new(models::samples(), models::SAMPLES_DDL);
    let mut session = test.db.open_session().unwrap();

    let token = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let at = day.and_hms_nano_opt(13, 5, 9, 123_456_789).unwrap();

    let sample = session.instantiate("Sample").unwrap();
    sample.set("id", 1i64).unwrap();
    sample.set("flag", true).unwrap();
    sample.set("small", 7i32).unwrap();
    sample.set("ratio", 0.25).unwrap();
    sample.set("label", "hello").unwrap();
    sample.set("data", vec![0u8, 1, 2]).unwrap();
    sample.set("token", token).unwrap();
    sample.set("day", day).unwrap();
    sample.set("at", at).unwrap();
    sample.set("at_millis", at).unwrap();
    session.persist(&sample).unwrap();
    session.flush().unwrap();

    // Stored precision is not a modification
    assert!(!session.is_dirty());

    session.clear();
    let loaded = assert_some!(session.find("Sample", 1i64));
    assert_eq!(loaded.get("flag").unwrap(), Value::Bool(true));
    assert_eq!(loaded.get("small").unwrap(), Value::I32(7));
    assert_eq!(loaded.get("ratio").unwrap(), Value::F64(0.25));
    assert_eq!(loaded.get("label").unwrap(), Value::from("hello"));
    assert_eq!(loaded.get("data").unwrap(), Value::Bytes(vec![0, 1, 2]));
    assert_eq!(loaded.get("token").unwrap(), Value::Uuid(token));
    assert_eq!(loaded.get("day").unwrap(), Value::Date(day));
    assert_eq!(
        loaded.get("at").unwrap(),
        Value::Timestamp(day.and_hms_micro_opt(13, 5, 9, 123_456).unwrap())
    );
    assert_eq!(
        loaded.get("at_millis").unwrap(),
        Value::Timestamp(day.and_hms_milli_opt(13, 5, 9, 123).unwrap())
    );
}

#[test]
fn mismatched_values_are_rejected() {
    let test = DbTest::new(models::samples(), models::SAMPLES_DDL);
    let session = test.db.open_session().unwrap();

    let sample = session.instantiate("Sample").unwrap();
    assert_err!(sample.set("small", i64::MAX), is_type_conversion);
    assert!(sample.set("token", "not a uuid").is_err());
    assert!(sample.set("nothing", 1i64).is_err());
}
