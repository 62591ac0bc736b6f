#![allow(unused_variables)]

use super::{
    Assignment, Delete, Expr, ExprAnd, ExprAny, ExprArithmetic, ExprBetween, ExprBinaryOp,
    ExprColumn, ExprExists, ExprFunc, ExprInList, ExprInSubquery, ExprIsNull, ExprLike, ExprOr,
    ExprRecord, Insert, JdbcParameterId, Join, Limit, OrderByExpr, Select, Statement, TableRef,
    TableWithJoins, Update, Value,
};

/// Read-only walker over the SQL syntax tree.
///
/// Every method defaults to the matching free function, which visits the
/// node's children. Override a method to observe a node; call the free
/// function from the override to keep descending.
pub trait Visit {
    fn visit_assignment(&mut self, i: &Assignment) {
        visit_assignment(self, i);
    }

    fn visit_expr(&mut self, i: &Expr) {
        visit_expr(self, i);
    }

    fn visit_expr_and(&mut self, i: &ExprAnd) {
        visit_expr_and(self, i);
    }

    fn visit_expr_any(&mut self, i: &ExprAny) {
        visit_expr_any(self, i);
    }

    fn visit_expr_arithmetic(&mut self, i: &ExprArithmetic) {
        visit_expr_arithmetic(self, i);
    }

    fn visit_expr_between(&mut self, i: &ExprBetween) {
        visit_expr_between(self, i);
    }

    fn visit_expr_binary_op(&mut self, i: &ExprBinaryOp) {
        visit_expr_binary_op(self, i);
    }

    fn visit_expr_column(&mut self, i: &ExprColumn) {
        visit_expr_column(self, i);
    }

    fn visit_expr_exists(&mut self, i: &ExprExists) {
        visit_expr_exists(self, i);
    }

    fn visit_expr_func(&mut self, i: &ExprFunc) {
        visit_expr_func(self, i);
    }

    fn visit_expr_in_list(&mut self, i: &ExprInList) {
        visit_expr_in_list(self, i);
    }

    fn visit_expr_in_subquery(&mut self, i: &ExprInSubquery) {
        visit_expr_in_subquery(self, i);
    }

    fn visit_expr_is_null(&mut self, i: &ExprIsNull) {
        visit_expr_is_null(self, i);
    }

    fn visit_expr_like(&mut self, i: &ExprLike) {
        visit_expr_like(self, i);
    }

    fn visit_expr_or(&mut self, i: &ExprOr) {
        visit_expr_or(self, i);
    }

    fn visit_expr_record(&mut self, i: &ExprRecord) {
        visit_expr_record(self, i);
    }

    fn visit_join(&mut self, i: &Join) {
        visit_join(self, i);
    }

    fn visit_limit(&mut self, i: &Limit) {
        visit_limit(self, i);
    }

    fn visit_order_by_expr(&mut self, i: &OrderByExpr) {
        visit_order_by_expr(self, i);
    }

    fn visit_param(&mut self, i: JdbcParameterId) {}

    fn visit_stmt(&mut self, i: &Statement) {
        visit_stmt(self, i);
    }

    fn visit_stmt_delete(&mut self, i: &Delete) {
        visit_stmt_delete(self, i);
    }

    fn visit_stmt_insert(&mut self, i: &Insert) {
        visit_stmt_insert(self, i);
    }

    fn visit_stmt_select(&mut self, i: &Select) {
        visit_stmt_select(self, i);
    }

    fn visit_stmt_update(&mut self, i: &Update) {
        visit_stmt_update(self, i);
    }

    fn visit_table_ref(&mut self, i: &TableRef) {}

    fn visit_table_with_joins(&mut self, i: &TableWithJoins) {
        visit_table_with_joins(self, i);
    }

    fn visit_value(&mut self, i: &Value) {}
}

impl<V: Visit> Visit for &mut V {
    fn visit_assignment(&mut self, i: &Assignment) {
        Visit::visit_assignment(&mut **self, i);
    }

    fn visit_expr(&mut self, i: &Expr) {
        Visit::visit_expr(&mut **self, i);
    }

    fn visit_expr_column(&mut self, i: &ExprColumn) {
        Visit::visit_expr_column(&mut **self, i);
    }

    fn visit_param(&mut self, i: JdbcParameterId) {
        Visit::visit_param(&mut **self, i);
    }

    fn visit_stmt(&mut self, i: &Statement) {
        Visit::visit_stmt(&mut **self, i);
    }

    fn visit_stmt_select(&mut self, i: &Select) {
        Visit::visit_stmt_select(&mut **self, i);
    }

    fn visit_table_ref(&mut self, i: &TableRef) {
        Visit::visit_table_ref(&mut **self, i);
    }

    fn visit_value(&mut self, i: &Value) {
        Visit::visit_value(&mut **self, i);
    }
}

pub fn visit_assignment<V>(v: &mut V, node: &Assignment)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.value);
}

pub fn visit_expr<V>(v: &mut V, node: &Expr)
where
    V: Visit + ?Sized,
{
    match node {
        Expr::And(expr) => v.visit_expr_and(expr),
        Expr::Any(expr) => v.visit_expr_any(expr),
        Expr::Arithmetic(expr) => v.visit_expr_arithmetic(expr),
        Expr::Between(expr) => v.visit_expr_between(expr),
        Expr::BinaryOp(expr) => v.visit_expr_binary_op(expr),
        Expr::Column(expr) => v.visit_expr_column(expr),
        Expr::CountStar => {}
        Expr::Exists(expr) => v.visit_expr_exists(expr),
        Expr::Func(expr) => v.visit_expr_func(expr),
        Expr::InList(expr) => v.visit_expr_in_list(expr),
        Expr::InSubquery(expr) => v.visit_expr_in_subquery(expr),
        Expr::IsNull(expr) => v.visit_expr_is_null(expr),
        Expr::Like(expr) => v.visit_expr_like(expr),
        Expr::Negate(expr) | Expr::Not(expr) => v.visit_expr(expr),
        Expr::Or(expr) => v.visit_expr_or(expr),
        Expr::Param(id) => v.visit_param(*id),
        Expr::Record(expr) => v.visit_expr_record(expr),
        Expr::Subquery(select) => v.visit_stmt_select(select),
        Expr::Value(value) => v.visit_value(value),
    }
}

pub fn visit_expr_and<V>(v: &mut V, node: &ExprAnd)
where
    V: Visit + ?Sized,
{
    for expr in &node.operands {
        v.visit_expr(expr);
    }
}

pub fn visit_expr_any<V>(v: &mut V, node: &ExprAny)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
    v.visit_expr(&node.array);
}

pub fn visit_expr_arithmetic<V>(v: &mut V, node: &ExprArithmetic)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.lhs);
    v.visit_expr(&node.rhs);
}

pub fn visit_expr_between<V>(v: &mut V, node: &ExprBetween)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
    v.visit_expr(&node.low);
    v.visit_expr(&node.high);
}

pub fn visit_expr_binary_op<V>(v: &mut V, node: &ExprBinaryOp)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.lhs);
    v.visit_expr(&node.rhs);
}

pub fn visit_expr_column<V>(v: &mut V, node: &ExprColumn)
where
    V: Visit + ?Sized,
{
}

pub fn visit_expr_exists<V>(v: &mut V, node: &ExprExists)
where
    V: Visit + ?Sized,
{
    v.visit_stmt_select(&node.query);
}

pub fn visit_expr_func<V>(v: &mut V, node: &ExprFunc)
where
    V: Visit + ?Sized,
{
    for arg in &node.args {
        v.visit_expr(arg);
    }
}

pub fn visit_expr_in_list<V>(v: &mut V, node: &ExprInList)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
    for item in &node.list {
        v.visit_expr(item);
    }
}

pub fn visit_expr_in_subquery<V>(v: &mut V, node: &ExprInSubquery)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
    v.visit_stmt_select(&node.query);
}

pub fn visit_expr_is_null<V>(v: &mut V, node: &ExprIsNull)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
}

pub fn visit_expr_like<V>(v: &mut V, node: &ExprLike)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
    v.visit_expr(&node.pattern);
    if let Some(escape) = &node.escape {
        v.visit_expr(escape);
    }
}

pub fn visit_expr_or<V>(v: &mut V, node: &ExprOr)
where
    V: Visit + ?Sized,
{
    for expr in &node.operands {
        v.visit_expr(expr);
    }
}

pub fn visit_expr_record<V>(v: &mut V, node: &ExprRecord)
where
    V: Visit + ?Sized,
{
    for expr in &node.fields {
        v.visit_expr(expr);
    }
}

pub fn visit_join<V>(v: &mut V, node: &Join)
where
    V: Visit + ?Sized,
{
    v.visit_table_ref(&node.table);
    v.visit_expr(&node.on);
}

pub fn visit_limit<V>(v: &mut V, node: &Limit)
where
    V: Visit + ?Sized,
{
    if let Some(limit) = &node.limit {
        v.visit_expr(limit);
    }
    if let Some(offset) = &node.offset {
        v.visit_expr(offset);
    }
}

pub fn visit_order_by_expr<V>(v: &mut V, node: &OrderByExpr)
where
    V: Visit + ?Sized,
{
    v.visit_expr(&node.expr);
}

pub fn visit_stmt<V>(v: &mut V, node: &Statement)
where
    V: Visit + ?Sized,
{
    match node {
        Statement::Select(stmt) => v.visit_stmt_select(stmt),
        Statement::Insert(stmt) => v.visit_stmt_insert(stmt),
        Statement::Update(stmt) => v.visit_stmt_update(stmt),
        Statement::Delete(stmt) => v.visit_stmt_delete(stmt),
    }
}

pub fn visit_stmt_delete<V>(v: &mut V, node: &Delete)
where
    V: Visit + ?Sized,
{
    if let Some(filter) = &node.filter {
        v.visit_expr(filter);
    }
}

pub fn visit_stmt_insert<V>(v: &mut V, node: &Insert)
where
    V: Visit + ?Sized,
{
    for value in &node.values {
        v.visit_expr(value);
    }
}

/// Visits clauses in rendering order so parameters are seen in the order
/// their placeholders appear in SQL text.
pub fn visit_stmt_select<V>(v: &mut V, node: &Select)
where
    V: Visit + ?Sized,
{
    for expr in &node.projection {
        v.visit_expr(expr);
    }
    for from in &node.from {
        v.visit_table_with_joins(from);
    }
    if let Some(filter) = &node.filter {
        v.visit_expr(filter);
    }
    for expr in &node.group_by {
        v.visit_expr(expr);
    }
    if let Some(having) = &node.having {
        v.visit_expr(having);
    }
    for order_by in &node.order_by {
        v.visit_order_by_expr(order_by);
    }
    if let Some(limit) = &node.limit {
        v.visit_limit(limit);
    }
}

pub fn visit_stmt_update<V>(v: &mut V, node: &Update)
where
    V: Visit + ?Sized,
{
    for assignment in &node.assignments {
        v.visit_assignment(assignment);
    }
    if let Some(filter) = &node.filter {
        v.visit_expr(filter);
    }
}

pub fn visit_table_with_joins<V>(v: &mut V, node: &TableWithJoins)
where
    V: Visit + ?Sized,
{
    v.visit_table_ref(&node.table);
    for join in &node.joins {
        v.visit_join(join);
    }
}

/// Calls `f` for every table reference in the statement.
pub fn for_each_table_ref<F>(stmt: &Statement, f: F)
where
    F: FnMut(&TableRef),
{
    struct ForEach<F> {
        f: F,
    }

    impl<F: FnMut(&TableRef)> Visit for ForEach<F> {
        fn visit_table_ref(&mut self, i: &TableRef) {
            (self.f)(i);
        }
    }

    ForEach { f }.visit_stmt(stmt);
}

/// Calls `f` for every JDBC parameter in the statement, in rendering order.
pub fn for_each_param<F>(stmt: &Statement, f: F)
where
    F: FnMut(JdbcParameterId),
{
    struct ForEach<F> {
        f: F,
    }

    impl<F: FnMut(JdbcParameterId)> Visit for ForEach<F> {
        fn visit_param(&mut self, i: JdbcParameterId) {
            (self.f)(i);
        }
    }

    ForEach { f }.visit_stmt(stmt);
}
