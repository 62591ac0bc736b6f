use kiln_core::{
    schema::{app::ModelId, Schema},
    stmt::{Assignment, Delete, Expr, Insert, JdbcParameterId, Statement, Type, Update},
};
use kiln_sql::Serializer;
use pretty_assertions::assert_eq;

const PERSON: ModelId = ModelId(0);

fn schema() -> Schema {
    Schema::builder()
        .entity("Person", |m| {
            m.id_generated("id", Type::I64);
            m.basic("name", Type::String);
            m.version("version");
        })
        .build()
        .unwrap()
}

#[test]
fn insert_update_delete() {
    let schema = schema();
    let table = schema.table_for(PERSON);
    let [id, name, version] = [0, 1, 2].map(|i| table.columns[i].id);
    let serializer = Serializer::sqlite(&schema.db);

    let insert = Statement::Insert(Insert {
        table: table.id,
        columns: vec![name, version],
        values: vec![
            Expr::param(JdbcParameterId(0)),
            Expr::param(JdbcParameterId(1)),
        ],
    });
    assert_eq!(
        serializer.serialize(&insert, &mut vec![]),
        "INSERT INTO person (name, version) VALUES (?1, ?2)"
    );

    let update = Statement::Update(Update {
        table: table.id,
        assignments: vec![
            Assignment {
                column: name,
                value: Expr::param(JdbcParameterId(0)),
            },
            Assignment {
                column: version,
                value: Expr::param(JdbcParameterId(1)),
            },
        ],
        filter: Expr::and_from_vec(vec![
            Expr::eq(Expr::column("person", id), Expr::param(JdbcParameterId(2))),
            Expr::eq(
                Expr::column("person", version),
                Expr::param(JdbcParameterId(3)),
            ),
        ]),
    });
    assert_eq!(
        serializer.serialize(&update, &mut vec![]),
        "UPDATE person SET name = ?1, version = ?2 WHERE person.id = ?3 AND person.version = ?4"
    );

    let delete = Statement::Delete(Delete {
        table: table.id,
        filter: None,
    });
    assert_eq!(serializer.serialize(&delete, &mut vec![]), "DELETE FROM person");
}

#[test]
fn insert_without_columns() {
    let schema = schema();
    let insert = Statement::Insert(Insert {
        table: schema.table_id_for(PERSON),
        columns: vec![],
        values: vec![],
    });

    assert_eq!(
        Serializer::sqlite(&schema.db).serialize(&insert, &mut vec![]),
        "INSERT INTO person DEFAULT VALUES"
    );
    assert_eq!(
        Serializer::mysql(&schema.db).serialize(&insert, &mut vec![]),
        "INSERT INTO person () VALUES ()"
    );
}
