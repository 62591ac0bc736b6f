use kiln::{InMemoryRegion, Object, Value};
use pretty_assertions::assert_eq;
use tests::{assert_some, models, DbTest};

fn setup() -> DbTest {
    let ddl = format!("{}{}", models::COMPANY_DDL, models::employees(3));
    let mut test = DbTest::with_builder(models::company(), &ddl, |builder| {
        builder.query_cache(InMemoryRegion::new());
    });
    test.log().clear();
    test
}

const NAMES: &str = "select e.name from Employee e where e.salary >= :min order by e.id";

fn names(test: &DbTest, min: i64) -> Vec<Object> {
    let mut session = test.db.open_session().unwrap();
    let mut query = session.create_query(NAMES).unwrap();
    query.set_parameter("min", min).unwrap().set_cacheable(true);
    query.list().unwrap()
}

#[test]
fn repeated_executions_hit_the_cache() {
    let mut test = setup();

    let first = names(&test, 200);
    assert_eq!(test.log().selects(), 1);

    // Cached results are shared by every session
    let second = names(&test, 200);
    assert_eq!(second, first);
    assert_eq!(test.log().selects(), 1);

    // Bound values are part of the key
    let other = names(&test, 300);
    assert_eq!(other, [Object::Value(Value::from("e3"))]);
    assert_eq!(test.log().selects(), 2);
}

#[test]
fn uncached_queries_always_run() {
    let mut test = setup();
    let mut session = test.db.open_session().unwrap();

    for _ in 0..2 {
        session
            .create_query(NAMES)
            .unwrap()
            .set_parameter("min", 100i64)
            .unwrap()
            .list()
            .unwrap();
    }
    assert_eq!(test.log().selects(), 2);
}

#[test]
fn writes_to_a_queried_table_invalidate_results() {
    let mut test = setup();
    names(&test, 100);

    {
        let mut session = test.db.open_session().unwrap();
        let employee = session.instantiate("Employee").unwrap();
        employee.set("id", 4i64).unwrap();
        employee.set("name", "e4").unwrap();
        employee.set("salary", 400i64).unwrap();
        session.persist(&employee).unwrap();
        session.flush().unwrap();
    }
    test.log().clear();

    let refreshed = names(&test, 100);
    assert_eq!(refreshed.len(), 4);
    assert_eq!(test.log().selects(), 1);

    // Bulk statements invalidate as well
    {
        let mut session = test.db.open_session().unwrap();
        session
            .create_query("delete from Employee e where e.id = 4")
            .unwrap()
            .execute_update()
            .unwrap();
    }
    assert_eq!(names(&test, 100).len(), 3);
    assert_eq!(test.log().selects(), 2);
}

#[test]
fn writes_to_other_tables_keep_results() {
    let mut test = setup();
    names(&test, 100);

    {
        let mut session = test.db.open_session().unwrap();
        let project = session.instantiate("Project").unwrap();
        project.set("id", 1i64).unwrap();
        session.persist(&project).unwrap();
        session.flush().unwrap();
    }
    test.log().clear();

    names(&test, 100);
    assert!(test.log().is_empty());
}

#[test]
fn uncommitted_writes_bypass_the_cache() {
    let mut test = setup();
    let committed = names(&test, 100);

    {
        let mut session = test.db.open_session().unwrap();
        session.begin().unwrap();
        let employee = assert_some!(session.find("Employee", 1i64));
        employee.set("name", "uncommitted").unwrap();
        session.flush().unwrap();
        test.log().clear();

        // The cached result predates the write and is not served
        let seen = {
            let mut query = session.create_query(NAMES).unwrap();
            query.set_parameter("min", 100i64).unwrap().set_cacheable(true);
            query.list().unwrap()
        };
        assert_eq!(seen[0], Object::Value(Value::from("uncommitted")));
        assert_eq!(test.log().selects(), 1);

        session.rollback().unwrap();
    }
    test.log().clear();

    // Nothing read inside the transaction outlives it
    assert_eq!(names(&test, 100), committed);
    assert_eq!(test.log().selects(), 1);
    assert_eq!(names(&test, 100), committed);
    assert_eq!(test.log().selects(), 1);
}

#[test]
fn evicting_the_cache() {
    let mut test = setup();
    names(&test, 100);
    test.db.evict_query_cache();

    names(&test, 100);
    assert_eq!(test.log().selects(), 2);
}
