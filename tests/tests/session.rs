use kiln::{Object, Value};
use pretty_assertions::assert_eq;
use tests::{assert_err, assert_none, assert_some, models, DbTest};

const SEED: &str = "
    INSERT INTO department (id, name, version) VALUES (1, 'R&D', 0);
    INSERT INTO employee (id, name, salary, street, city, department_id)
        VALUES (1, 'Ada', 100, 'Main St', 'Oslo', 1);
    INSERT INTO employee (id, name, salary, street, city, department_id)
        VALUES (2, 'Grace', 200, NULL, NULL, 1);
    INSERT INTO project (id, name, department_id) VALUES (1, 'Compiler', 1);
";

fn setup() -> DbTest {
    let ddl = format!("{}{}", models::COMPANY_DDL, SEED);
    let mut test = DbTest::new(models::company(), &ddl);
    test.log().clear();
    test
}

#[test]
fn one_instance_per_row() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let ada = assert_some!(session.find("Employee", 1i64));
    let again = assert_some!(session.find("Employee", 1i64));
    assert!(ada.ptr_eq(&again));
    assert_eq!(test.log().selects(), 1);

    let queried = session
        .create_query("from Employee e where e.id = :id")
        .unwrap()
        .set_parameter("id", 1i64)
        .unwrap()
        .unique_result()
        .unwrap()
        .and_then(Object::into_entity)
        .unwrap();
    assert!(queried.ptr_eq(&ada));
}

#[test]
fn lazy_associations_share_the_managed_instance() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let ada = assert_some!(session.find("Employee", 1i64));
    let grace = assert_some!(session.find("Employee", 2i64));

    let department = ada.to_one("department").unwrap().unwrap();
    assert!(!department.is_initialized());
    assert!(department.ptr_eq(&grace.to_one("department").unwrap().unwrap()));
    test.log().clear();

    let found = assert_some!(session.find("Department", 1i64));
    assert!(found.ptr_eq(&department));
    assert!(department.is_initialized());
    assert_eq!(department.get("name").unwrap(), Value::from("R&D"));
    assert_eq!(test.log().selects(), 1);

    let employees = session.collection(&department, "employees").unwrap();
    assert_eq!(employees.len(), 2);
    assert!(employees.iter().any(|employee| employee.ptr_eq(&ada)));
    assert!(employees.iter().any(|employee| employee.ptr_eq(&grace)));
}

#[test]
fn proxies_fail_after_the_session_closes() {
    let test = setup();
    let mut session = test.db.open_session().unwrap();

    let ada = assert_some!(session.find("Employee", 1i64));
    let department = ada.to_one("department").unwrap().unwrap();
    session.close().unwrap();

    assert_eq!(department.id(), Value::I64(1));
    assert_err!(department.get("name"), is_lazy_initialization);
}

#[test]
fn missing_rows() {
    let test = setup();
    let mut session = test.db.open_session().unwrap();

    assert_none!(session.find("Employee", 42i64));

    let proxy = session.get_reference("Employee", 42i64).unwrap();
    assert_err!(session.initialize(&proxy), is_object_not_found);
}

#[test]
fn persist_inserts_at_commit() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();
    session.begin().unwrap();

    let sales = session.instantiate("Department").unwrap();
    sales.set("id", 2i64).unwrap();
    sales.set("name", "Sales").unwrap();

    let linus = session.instantiate("Employee").unwrap();
    linus.set("id", 3i64).unwrap();
    linus.set("name", "Linus").unwrap();
    linus.set_to_one("department", Some(&sales)).unwrap();
    sales.add_to("employees", &linus).unwrap();

    // Employees cascade from their department
    session.persist(&sales).unwrap();
    assert!(session.contains(&sales));
    assert!(session.contains(&linus));
    assert_eq!(sales.get("version").unwrap(), Value::I64(0));
    assert!(test.log().is_empty());

    session.commit().unwrap();
    assert_eq!(
        test.log().sql(),
        [
            "INSERT INTO department (id, name, version) VALUES (?1, ?2, ?3)",
            "INSERT INTO employee (id, name, salary, street, city, department_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        ]
    );

    let department = test.log().pop().unwrap();
    assert_eq!(
        department.params,
        [Value::I64(2), Value::from("Sales"), Value::I64(0)]
    );
}

#[test]
fn dirty_instances_are_updated_with_a_new_version() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let department = assert_some!(session.find("Department", 1i64));
    assert!(!session.is_dirty());

    department.set("name", "Research").unwrap();
    assert!(session.is_dirty());
    test.log().clear();

    session.flush().unwrap();
    assert_eq!(test.log().updates(), 1);
    assert_eq!(department.get("version").unwrap(), Value::I64(1));
    assert!(!session.is_dirty());

    session.clear();
    let reloaded = assert_some!(session.find("Department", 1i64));
    assert!(!reloaded.ptr_eq(&department));
    assert_eq!(reloaded.get("name").unwrap(), Value::from("Research"));
    assert_eq!(reloaded.get("version").unwrap(), Value::I64(1));
}

#[test]
fn concurrent_version_changes_are_detected() {
    let test = setup();
    let mut session = test.db.open_session().unwrap();
    session.begin().unwrap();

    let department = assert_some!(session.find("Department", 1i64));

    // Bypasses the persistence context, as another writer would
    let count = session
        .create_query("update Department d set d.version = d.version + 1 where d.id = 1")
        .unwrap()
        .execute_update()
        .unwrap();
    assert_eq!(count, 1);

    department.set("name", "Research").unwrap();
    assert_err!(session.flush(), is_stale_state);

    session.rollback().unwrap();
    assert!(!session.contains(&department));
}

#[test]
fn remove_deletes_at_flush() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let ada = assert_some!(session.find("Employee", 1i64));
    session.remove(&ada).unwrap();
    assert!(!session.contains(&ada));
    assert_none!(session.find("Employee", 1i64));
    test.log().clear();

    session.flush().unwrap();
    assert_eq!(test.log().deletes(), 1);

    session.clear();
    assert_none!(session.find("Employee", 1i64));
}

#[test]
fn removing_unflushed_instances_cancels_the_insert() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let project = session.instantiate("Project").unwrap();
    project.set("id", 9i64).unwrap();
    session.persist(&project).unwrap();
    session.remove(&project).unwrap();

    session.flush().unwrap();
    assert!(test.log().is_empty());
}

#[test]
fn identity_ids_insert_immediately() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let first = session.instantiate("Task").unwrap();
    first.set("title", "write docs").unwrap();
    session.persist(&first).unwrap();
    assert_eq!(test.log().inserts(), 1);
    assert_eq!(first.id(), Value::I64(1));

    let second = session.instantiate("Task").unwrap();
    second.set("title", "review").unwrap();
    session.persist(&second).unwrap();
    assert_eq!(second.id(), Value::I64(2));

    let found = assert_some!(session.find("Task", 2i64));
    assert!(found.ptr_eq(&second));
    assert_eq!(test.log().selects(), 0);
}

#[test]
fn transient_references_are_rejected() {
    let test = setup();
    let mut session = test.db.open_session().unwrap();

    let department = session.instantiate("Department").unwrap();

    let project = session.instantiate("Project").unwrap();
    project.set("id", 5i64).unwrap();
    project.set_to_one("department", Some(&department)).unwrap();

    // Projects do not cascade to their department
    session.persist(&project).unwrap();
    assert!(session.flush().is_err());
}

#[test]
fn rollback_discards_pending_work() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();
    session.begin().unwrap();

    let project = session.instantiate("Project").unwrap();
    project.set("id", 2i64).unwrap();
    project.set("name", "Linker").unwrap();
    session.persist(&project).unwrap();
    session.flush().unwrap();
    assert_eq!(test.log().inserts(), 1);

    session.rollback().unwrap();
    assert!(!session.contains(&project));
    assert_none!(session.find("Project", 2i64));
}

#[test]
fn queries_flush_pending_changes_first() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();
    session.begin().unwrap();

    let project = session.instantiate("Project").unwrap();
    project.set("id", 2i64).unwrap();
    project.set("name", "Linker").unwrap();
    session.persist(&project).unwrap();

    // Employees do not share a table with the pending insert
    session
        .create_query("from Employee e")
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(test.log().inserts(), 0);

    let projects = session
        .create_query("from Project p order by p.id")
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(test.log().inserts(), 1);
    assert_eq!(projects.len(), 2);
    assert!(projects[1].as_entity().unwrap().ptr_eq(&project));

    session.commit().unwrap();
}

#[test]
fn read_only_instances_are_not_dirty_checked() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    let department = assert_some!(session.find("Department", 1i64));
    session.set_read_only(&department, true).unwrap();
    assert!(session.is_read_only(&department));

    department.set("name", "Ignored").unwrap();
    assert!(!session.is_dirty());
    test.log().clear();

    session.flush().unwrap();
    assert!(test.log().is_empty());

    // Switching back snapshots the current state
    session.set_read_only(&department, false).unwrap();
    assert!(!session.is_dirty());
}

#[test]
fn evicted_instances_are_detached() {
    let test = setup();
    let mut session = test.db.open_session().unwrap();

    let ada = assert_some!(session.find("Employee", 1i64));
    session.evict(&ada);
    assert!(!session.contains(&ada));

    let reloaded = assert_some!(session.find("Employee", 1i64));
    assert!(!reloaded.ptr_eq(&ada));
}

#[test]
fn transactions_do_not_nest() {
    let test = setup();
    let mut session = test.db.open_session().unwrap();

    assert_err!(session.commit(), is_transaction);
    session.begin().unwrap();
    assert_err!(session.begin(), is_transaction);
    assert!(session.is_transaction_active());
    session.rollback().unwrap();
    assert!(!session.is_transaction_active());
}
