use kiln::{Object, Value};
use pretty_assertions::assert_eq;
use std::ops::ControlFlow;
use tests::{models, DbTest};

fn setup(count: i64) -> DbTest {
    let ddl = format!("{}{}", models::COMPANY_DDL, models::employees(count));
    let mut test = DbTest::new(models::company(), &ddl);
    test.log().clear();
    test
}

fn ids(results: &[Object]) -> Vec<Value> {
    results
        .iter()
        .map(|result| result.as_entity().unwrap().id())
        .collect()
}

fn longs(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
    values.into_iter().map(Value::I64).collect()
}

#[test]
fn named_and_positional_parameters() {
    let test = setup(10);
    let mut session = test.db.open_session().unwrap();

    let named = session
        .create_query("from Employee e where e.salary > :min order by e.id")
        .unwrap()
        .set_parameter("min", 500i64)
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(ids(&named), longs(6..=10));

    let positional = session
        .create_query("from Employee e where e.salary > ?1 and e.salary < ?2 order by e.id")
        .unwrap()
        .set_parameter(1u32, 200i64)
        .unwrap()
        .set_parameter("?2", 500i64)
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(ids(&positional), longs(3..=4));
}

#[test]
fn parameter_lists_expand() {
    let mut test = setup(10);
    let mut session = test.db.open_session().unwrap();

    let results = session
        .create_query("from Employee e where e.id in (:ids) order by e.id")
        .unwrap()
        .set_parameter_list("ids", [7i64, 2, 9])
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(ids(&results), longs([2, 7, 9]));

    let statement = test.log().pop().unwrap();
    assert!(statement.sql.contains("IN (?1, ?2, ?3)"));
}

#[test]
fn binding_errors() {
    let test = setup(1);
    let mut session = test.db.open_session().unwrap();

    let mut query = session
        .create_query("from Employee e where e.name = :name")
        .unwrap();
    assert!(query
        .set_parameter("missing", 1i64)
        .unwrap_err()
        .is_parameter_binding());
    assert!(query
        .set_parameter_list("name", ["a", "b"])
        .unwrap_err()
        .is_parameter_binding());

    // Unbound parameters are reported when the query runs
    assert!(query.list().unwrap_err().is_parameter_binding());
}

#[test]
fn syntax_and_semantic_errors() {
    let test = setup(1);
    let mut session = test.db.open_session().unwrap();

    let err = session.create_query("from Employee e where").unwrap_err();
    assert!(err.is_query_syntax());

    let err = session.create_query("from Employee e where e.nickname = 'x'").unwrap_err();
    assert!(err.is_semantic());

    let err = session.create_query("from Nobody n").unwrap_err();
    assert!(err.is_semantic());
}

#[test]
fn pagination() {
    let test = setup(10);
    let mut session = test.db.open_session().unwrap();

    let page = session
        .create_query("from Employee e order by e.id")
        .unwrap()
        .set_first_result(2)
        .set_max_results(3)
        .list()
        .unwrap();
    assert_eq!(ids(&page), longs(3..=5));

    let limited = session
        .create_query("from Employee e order by e.id desc limit 2")
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(ids(&limited), longs([10, 9]));
}

#[test]
fn scalar_and_tuple_results() {
    let test = setup(4);
    let mut session = test.db.open_session().unwrap();

    let count = session
        .create_query("select count(e.id) from Employee e")
        .unwrap()
        .unique_result()
        .unwrap();
    assert_eq!(count, Some(Object::Value(Value::I64(4))));

    let rows = session
        .create_query("select e.name, e.salary from Employee e where e.id <= 2 order by e.id")
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(
        rows,
        [
            Object::Tuple(vec![
                Object::Value(Value::from("e1")),
                Object::Value(Value::I64(100))
            ]),
            Object::Tuple(vec![
                Object::Value(Value::from("e2")),
                Object::Value(Value::I64(200))
            ]),
        ]
    );
}

#[test]
fn unique_results() {
    let test = setup(3);
    let mut session = test.db.open_session().unwrap();

    let none = session
        .create_query("from Employee e where e.id = 42")
        .unwrap()
        .unique_result()
        .unwrap();
    assert!(none.is_none());

    let err = session
        .create_query("from Employee e")
        .unwrap()
        .unique_result()
        .unwrap_err();
    assert!(err.is_non_unique_result());

    // Repeated rows of one result count once
    let city = session
        .create_query("select e.address.city from Employee e")
        .unwrap()
        .unique_result()
        .unwrap();
    assert_eq!(city, Some(Object::Value(Value::from("Oslo"))));
}

#[test]
fn streams_read_rows_as_they_are_consumed() {
    let mut test = setup(6);
    let mut session = test.db.open_session().unwrap();

    let mut query = session
        .create_query("from Employee e order by e.id")
        .unwrap();
    let mut streamed = vec![];
    query
        .stream(|object| {
            streamed.push(object);
            Ok(if streamed.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
    assert_eq!(ids(&streamed), longs(1..=2));

    // Rows past the last consumed result are never read
    let statement = test.log().pop().unwrap();
    assert_eq!(statement.rows, 2);

    let mut everything = vec![];
    query
        .stream(|object| {
            everything.push(object);
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();
    assert_eq!(everything.len(), 6);
    assert!(everything[0]
        .as_entity()
        .unwrap()
        .ptr_eq(streamed[0].as_entity().unwrap()));
}

#[test]
fn stream_errors_stop_the_read() {
    let mut test = setup(4);
    let mut session = test.db.open_session().unwrap();

    let mut seen = 0;
    let err = session
        .create_query("select e.name from Employee e order by e.id")
        .unwrap()
        .stream(|_| {
            seen += 1;
            Err(kiln::Error::from_args(format_args!("rejected")))
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "rejected");
    assert_eq!(seen, 1);
    assert_eq!(test.log().pop().unwrap().rows, 1);
}

#[test]
fn streamed_fetches_complete_each_collection() {
    let ddl = format!(
        "{}{}",
        models::COMPANY_DDL,
        "
        INSERT INTO department (id, name, version) VALUES (1, 'R&D', 0);
        INSERT INTO department (id, name, version) VALUES (2, 'Sales', 0);
        INSERT INTO employee (id, name, salary, department_id) VALUES (1, 'a', 1, 1);
        INSERT INTO employee (id, name, salary, department_id) VALUES (2, 'b', 1, 1);
        INSERT INTO employee (id, name, salary, department_id) VALUES (3, 'c', 1, 1);
        INSERT INTO employee (id, name, salary, department_id) VALUES (4, 'd', 1, 2);
        "
    );
    let test = DbTest::new(models::company(), &ddl);
    let mut session = test.db.open_session().unwrap();

    let mut departments = vec![];
    session
        .create_query("select d from Department d join fetch d.employees e order by d.id, e.id")
        .unwrap()
        .stream(|object| {
            departments.push(object);
            Ok(ControlFlow::Break(()))
        })
        .unwrap();

    assert_eq!(departments.len(), 1);
    let department = departments[0].as_entity().unwrap();
    assert_eq!(department.id(), Value::I64(1));
    let employees = department.collection("employees").unwrap();
    assert!(employees.is_initialized());
    assert_eq!(employees.len().unwrap(), 3);
}

#[test]
fn scrolling_moves_both_ways() {
    let test = setup(5);
    let mut session = test.db.open_session().unwrap();

    let mut results = session
        .create_query("select e.id from Employee e order by e.id")
        .unwrap()
        .scroll()
        .unwrap();
    assert_eq!(results.len(), 5);

    assert!(results.last());
    assert_eq!(results.get(), Some(&Object::Value(Value::I64(5))));
    assert!(results.previous());
    assert_eq!(results.get(), Some(&Object::Value(Value::I64(4))));
    assert!(results.scroll(-3));
    assert_eq!(results.row_number(), Some(0));
    assert!(!results.previous());
}

#[test]
fn transformers_shape_rows() {
    let test = setup(2);
    let mut session = test.db.open_session().unwrap();

    let rows = session
        .create_query("select e.name as name, e.salary as pay from Employee e order by e.id")
        .unwrap()
        .set_row_transformer(|row: Vec<Object>, aliases: &[Option<String>]| {
            let labels = aliases
                .iter()
                .zip(&row)
                .map(|(alias, item)| {
                    let value = item.as_value().cloned().unwrap_or(Value::Null);
                    format!("{}={value}", alias.as_deref().unwrap_or("?"))
                })
                .collect::<Vec<_>>();
            Ok(Object::Value(Value::from(labels.join(","))))
        })
        .list()
        .unwrap();

    assert_eq!(
        rows,
        [
            Object::Value(Value::from("name=e1,pay=100")),
            Object::Value(Value::from("name=e2,pay=200")),
        ]
    );
}

#[test]
fn bulk_statements_bypass_the_session() {
    let mut test = setup(5);
    let mut session = test.db.open_session().unwrap();

    let first = session.find("Employee", 1i64).unwrap().unwrap();

    let count = session
        .create_query("update Employee e set e.salary = e.salary * 2 where e.id <= :max")
        .unwrap()
        .set_parameter("max", 3i64)
        .unwrap()
        .execute_update()
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(first.get("salary").unwrap(), Value::I64(100));
    test.log().clear();

    let salaries = session
        .create_query("select e.salary from Employee e order by e.id")
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(
        salaries,
        longs([200, 400, 600, 400, 500])
            .into_iter()
            .map(Object::Value)
            .collect::<Vec<_>>()
    );

    let deleted = session
        .create_query("delete from Employee e where e.salary >= 500")
        .unwrap()
        .execute_update()
        .unwrap();
    assert_eq!(deleted, 2);

    let err = session
        .create_query("from Employee e")
        .unwrap()
        .execute_update()
        .unwrap_err();
    assert!(!err.is_sql());
}
