use kiln::{MultiLoadOptions, Value};
use pretty_assertions::assert_eq;
use tests::{assert_some, models, DbTest};

fn setup(count: i64) -> DbTest {
    let ddl = format!("{}{}", models::COMPANY_DDL, models::employees(count));
    let mut test = DbTest::new(models::company(), &ddl);
    test.log().clear();
    test
}

fn batch(size: usize) -> MultiLoadOptions {
    MultiLoadOptions {
        batch_size: Some(size),
        ..MultiLoadOptions::default()
    }
}

#[test]
fn loads_in_batches_of_in_restrictions() {
    let mut test = setup(60);
    let mut session = test.db.open_session().unwrap();

    let loaded = session.multi_load("Employee", 1..=60i64, batch(5)).unwrap();
    assert_eq!(loaded.len(), 60);

    for (i, employee) in loaded.iter().enumerate() {
        let employee = employee.as_ref().unwrap();
        assert_eq!(employee.id(), Value::I64(i as i64 + 1));
        assert_eq!(employee.get("name").unwrap(), Value::from(format!("e{}", i + 1)));
    }

    let sql = test.log().sql();
    assert_eq!(sql.len(), 12);
    assert!(sql
        .iter()
        .all(|sql| sql.ends_with("WHERE e1_0.id IN (?1, ?2, ?3, ?4, ?5)")));
}

#[test]
fn managed_ids_issue_no_sql() {
    let mut test = setup(60);
    let mut session = test.db.open_session().unwrap();

    let first = session.multi_load("Employee", 1..=60i64, batch(5)).unwrap();
    test.log().clear();

    let second = session.multi_load("Employee", 1..=60i64, batch(5)).unwrap();
    assert!(test.log().is_empty());

    for (a, b) in first.iter().zip(&second) {
        assert!(a.as_ref().unwrap().ptr_eq(b.as_ref().unwrap()));
    }
}

#[test]
fn results_follow_request_order() {
    let mut test = setup(10);
    let mut session = test.db.open_session().unwrap();

    let loaded = session
        .multi_load("Employee", [5i64, 3, 99, 1], MultiLoadOptions::default())
        .unwrap();

    let ids: Vec<_> = loaded
        .iter()
        .map(|employee| employee.as_ref().map(|e| e.id()))
        .collect();
    assert_eq!(
        ids,
        [Some(Value::I64(5)), Some(Value::I64(3)), None, Some(Value::I64(1))]
    );

    let unordered = session
        .multi_load(
            "Employee",
            [5i64, 99, 1],
            MultiLoadOptions {
                ordered: false,
                ..MultiLoadOptions::default()
            },
        )
        .unwrap();
    assert_eq!(unordered.len(), 2);
}

#[test]
fn duplicate_ids_resolve_to_one_instance() {
    let mut test = setup(3);
    let mut session = test.db.open_session().unwrap();

    let loaded = session
        .multi_load("Employee", [1i64, 2, 3, 2, 2], MultiLoadOptions::default())
        .unwrap();
    assert_eq!(loaded.len(), 5);
    assert_eq!(test.log().selects(), 1);

    let two = loaded[1].as_ref().unwrap();
    assert!(two.ptr_eq(loaded[3].as_ref().unwrap()));
    assert!(two.ptr_eq(loaded[4].as_ref().unwrap()));
    assert!(!two.ptr_eq(loaded[0].as_ref().unwrap()));
}

#[test]
fn removed_instances_keep_their_slot() {
    let mut test = setup(60);
    let mut session = test.db.open_session().unwrap();

    let loaded = session.multi_load("Employee", 1..=60i64, batch(5)).unwrap();
    session.remove(loaded[10].as_ref().unwrap()).unwrap();
    test.log().clear();

    let again = session.multi_load("Employee", 1..=60i64, batch(5)).unwrap();
    assert_eq!(again.len(), 60);
    assert!(again[10].is_none());
    assert!(test.log().is_empty());

    let with_deleted = session
        .multi_load(
            "Employee",
            1..=60i64,
            MultiLoadOptions {
                return_deleted: true,
                ..batch(5)
            },
        )
        .unwrap();
    assert!(with_deleted[10]
        .as_ref()
        .unwrap()
        .ptr_eq(loaded[10].as_ref().unwrap()));
}

#[test]
fn queued_proxies_join_the_batch() {
    let mut test = setup(10);
    let mut session = test.db.open_session().unwrap();

    let proxies: Vec<_> = (1..=4i64)
        .map(|id| session.get_reference("Employee", id).unwrap())
        .collect();
    assert!(proxies.iter().all(|proxy| !proxy.is_initialized()));
    assert!(test.log().is_empty());

    // Employee batches 5 keys: the requested one and the queued proxies
    session.initialize(&proxies[2]).unwrap();
    assert!(proxies.iter().all(|proxy| proxy.is_initialized()));
    assert_eq!(test.log().selects(), 1);

    let found = assert_some!(session.find("Employee", 1i64));
    assert!(found.ptr_eq(&proxies[0]));
    assert_eq!(test.log().selects(), 1);
}

#[test]
fn loaded_keys_leave_the_batch_queue() {
    let mut test = setup(10);
    let mut session = test.db.open_session().unwrap();

    let proxies: Vec<_> = (1..=4i64)
        .map(|id| session.get_reference("Employee", id).unwrap())
        .collect();

    session
        .multi_load("Employee", [1i64, 2], MultiLoadOptions::default())
        .unwrap();
    assert!(proxies[0].is_initialized() && proxies[1].is_initialized());
    test.log().clear();

    session.initialize(&proxies[2]).unwrap();
    assert!(proxies[3].is_initialized());

    let statement = test.log().pop().unwrap();
    assert!(test.log().is_empty());
    assert_eq!(statement.params.len(), 5);
    assert!(statement.params.contains(&Value::I64(3)));
    assert!(statement.params.contains(&Value::I64(4)));
    assert!(statement
        .params
        .iter()
        .all(|param| matches!(param, Value::I64(3 | 4) | Value::Null)));
}
