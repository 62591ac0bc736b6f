use kiln::{Db, Value};
use tests::{assert_err, assert_none, assert_some, models, DbTest};

#[test]
fn sessions_share_the_in_memory_database() {
    let test = DbTest::new(models::company(), models::COMPANY_DDL);

    {
        let mut session = test.db.open_session().unwrap();
        let project = session.instantiate("Project").unwrap();
        project.set("id", 1i64).unwrap();
        project.set("name", "Linker").unwrap();
        session.persist(&project).unwrap();
        session.flush().unwrap();
    }

    let mut session = test.db.open_session().unwrap();
    let project = assert_some!(session.find("Project", 1i64));
    assert_eq!(project.get("name").unwrap(), Value::from("Linker"));
}

#[test]
fn exhausted_pools_fail_fast() {
    let test = DbTest::new(models::company(), models::COMPANY_DDL);

    let session = test.db.open_session().unwrap();
    assert_err!(test.db.open_session(), is_connection_pool);

    drop(session);
    assert!(test.db.open_session().is_ok());
}

#[test]
fn closed_factories_refuse_sessions() {
    let test = DbTest::new(models::company(), models::COMPANY_DDL);
    test.db.close();
    assert_err!(test.db.open_session(), is_connection_pool);
}

#[test]
fn closing_sessions_roll_back() {
    let test = DbTest::new(models::company(), models::COMPANY_DDL);
    let mut session = test.db.open_session().unwrap();
    session.begin().unwrap();

    let project = session.instantiate("Project").unwrap();
    project.set("id", 1i64).unwrap();
    session.persist(&project).unwrap();
    session.flush().unwrap();
    assert!(session.is_open());

    // Closing rolls back the open transaction
    session.close().unwrap();

    let mut session = test.db.open_session().unwrap();
    assert_none!(session.find("Project", 1i64));
}

#[test]
fn connect_by_url() {
    let db = Db::builder()
        .schema(models::company())
        .connect("sqlite::memory:")
        .unwrap();
    db.execute_script(models::COMPANY_DDL).unwrap();

    let mut session = db.open_session().unwrap();
    assert_none!(session.find("Department", 1i64));

    assert!(Db::builder()
        .schema(models::company())
        .connect("postgres://localhost/kiln")
        .is_err());
}
