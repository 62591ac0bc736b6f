use kiln_core::{
    schema::{app::ModelId, Schema},
    stmt::{
        Direction, Expr, Join, JoinKind, JdbcParameterId, Limit, NullPrecedence, OrderByExpr,
        Select, Statement, TableRef, TableWithJoins, Type, Value,
    },
};
use kiln_sql::{ParameterBinder, Serializer};
use pretty_assertions::assert_eq;

const ORDER: ModelId = ModelId(0);
const LINE: ModelId = ModelId(2);

fn schema() -> Schema {
    Schema::builder()
        .entity("Order", |m| {
            m.embedded_id("key", "OrderKey");
            m.basic("placed", Type::Timestamp);
            m.one_to_many("lines", "Line", "order");
        })
        .embeddable("OrderKey", |m| {
            m.basic("region", Type::String);
            m.basic("number", Type::I64);
        })
        .entity("Line", |m| {
            m.id("id", Type::I64);
            m.many_to_one("order", "Order");
        })
        .build()
        .unwrap()
}

fn col(schema: &Schema, model: ModelId, alias: &str, name: &str) -> Expr {
    let column = schema.table_for(model).column_by_name(name).unwrap();
    Expr::column(alias, column.id)
}

#[test]
fn reserved_table_names_are_quoted() {
    let schema = schema();
    let mut select = Select::new(TableRef::new(schema.table_id_for(ORDER), "o1_0"));
    select.projection.push(col(&schema, ORDER, "o1_0", "placed"));

    let mut params = vec![];
    let sql = Serializer::sqlite(&schema.db).serialize(&Statement::Select(select), &mut params);
    assert_eq!(sql, r#"SELECT o1_0.placed FROM "order" o1_0"#);
    assert!(params.is_empty());
}

#[test]
fn composite_key_restriction_is_or_of_ands() {
    let schema = schema();
    let mut select = Select::new(TableRef::new(schema.table_id_for(ORDER), "o1_0"));
    select.projection.push(col(&schema, ORDER, "o1_0", "placed"));

    let mut next = 0;
    let mut param = || {
        next += 1;
        Expr::param(JdbcParameterId(next - 1))
    };

    let rows = (0..2)
        .map(|_| {
            Expr::and_from_vec(vec![
                Expr::eq(col(&schema, ORDER, "o1_0", "region"), param()),
                Expr::eq(col(&schema, ORDER, "o1_0", "number"), param()),
            ])
            .unwrap()
        })
        .collect();
    select.filter = Expr::or_from_vec(rows);

    let mut params = vec![];
    let sql = Serializer::sqlite(&schema.db).serialize(&Statement::Select(select), &mut params);
    assert_eq!(
        sql,
        r#"SELECT o1_0.placed FROM "order" o1_0 WHERE ((o1_0.region = ?1 AND o1_0.number = ?2) OR (o1_0.region = ?3 AND o1_0.number = ?4))"#
    );
    assert_eq!(
        params,
        (0..4)
            .map(|i| ParameterBinder::Parameter(JdbcParameterId(i)))
            .collect::<Vec<_>>()
    );
}

#[test]
fn placeholders_per_dialect() {
    let schema = schema();
    let mut select = Select::new(TableRef::new(schema.table_id_for(LINE), "l1_0"));
    select.projection.push(col(&schema, LINE, "l1_0", "id"));
    select.filter = Some(Expr::in_list(
        col(&schema, LINE, "l1_0", "id"),
        vec![
            Expr::param(JdbcParameterId(0)),
            Expr::param(JdbcParameterId(1)),
        ],
    ));
    let stmt = Statement::Select(select);

    let mut params = vec![];
    assert_eq!(
        Serializer::postgresql(&schema.db).serialize(&stmt, &mut params),
        "SELECT l1_0.id FROM line l1_0 WHERE l1_0.id IN ($1, $2)"
    );

    let mut params = vec![];
    assert_eq!(
        Serializer::mysql(&schema.db).serialize(&stmt, &mut params),
        "SELECT l1_0.id FROM line l1_0 WHERE l1_0.id IN (?, ?)"
    );
}

#[test]
fn join_order_and_offset_only_limit() {
    let schema = schema();
    let mut from = TableWithJoins::new(TableRef::new(schema.table_id_for(ORDER), "o1_0"));
    from.joins.push(Join {
        table: TableRef::new(schema.table_id_for(LINE), "l1_0"),
        kind: JoinKind::Left,
        on: Expr::and_from_vec(vec![
            Expr::eq(
                col(&schema, LINE, "l1_0", "order_region"),
                col(&schema, ORDER, "o1_0", "region"),
            ),
            Expr::eq(
                col(&schema, LINE, "l1_0", "order_number"),
                col(&schema, ORDER, "o1_0", "number"),
            ),
        ])
        .unwrap(),
    });

    let mut select = Select::new(from);
    select.projection.push(col(&schema, LINE, "l1_0", "id"));
    select.order_by.push(OrderByExpr {
        expr: col(&schema, ORDER, "o1_0", "placed"),
        direction: Some(Direction::Desc),
        nulls: Some(NullPrecedence::Last),
    });
    select.limit = Some(Limit {
        limit: None,
        offset: Some(Expr::Value(Value::I64(10))),
    });

    let mut params = vec![];
    let sql = Serializer::sqlite(&schema.db).serialize(&Statement::Select(select), &mut params);
    assert_eq!(
        sql,
        r#"SELECT l1_0.id FROM "order" o1_0 LEFT JOIN line l1_0 ON l1_0.order_region = o1_0.region AND l1_0.order_number = o1_0.number ORDER BY o1_0.placed DESC NULLS LAST LIMIT -1 OFFSET ?1"#
    );
    assert_eq!(params, [ParameterBinder::Literal(Value::I64(10))]);
}
