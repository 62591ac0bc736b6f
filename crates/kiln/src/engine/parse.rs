//! HQL text to syntax tree.

mod ast;
pub(crate) use ast::*;

mod lexer;
use lexer::{
    describe, keyword, named_param, number, positional_param, string, symbol, word, ws,
    Expected, PResult, SyntaxError,
};

use kiln_core::{
    stmt::{BinaryOp, Direction, NullPrecedence, Value},
    Error, Result,
};
use nom::{
    branch::alt,
    combinator::{cut, map, opt, value, verify},
    error::context,
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    Parser,
};
use std::iter;

/// Words that end an alias position.
const RESERVED: &[&str] = &[
    "and", "as", "asc", "between", "by", "delete", "desc", "distinct", "escape", "exists",
    "fetch", "from", "full", "group", "having", "in", "inner", "is", "join", "left", "like",
    "limit", "not", "null", "nulls", "offset", "on", "or", "order", "outer", "select", "set",
    "update", "where", "with",
];

pub(crate) fn parse(query: &str) -> Result<Statement> {
    let grammar = Grammar { query };
    let parsed = terminated(|i| grammar.statement(i), end_of_query).parse(query);

    match parsed {
        Ok((_, stmt)) => Ok(stmt),
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(grammar.error(err)),
        Err(nom::Err::Incomplete(_)) => Err(Error::query_syntax(
            query,
            query.len(),
            "incomplete query",
        )),
    }
}

/// Statement grammar over the query text. Nodes record the byte offset they
/// start at, for error reporting after resolution.
struct Grammar<'q> {
    query: &'q str,
}

impl<'q> Grammar<'q> {
    fn statement(&self, input: &'q str) -> PResult<'q, Statement> {
        context(
            "SELECT, FROM, UPDATE or DELETE",
            alt((
                map(|i| self.select(i), Statement::Select),
                map(
                    preceded(keyword("update"), cut(|i| self.update(i))),
                    Statement::Update,
                ),
                map(
                    preceded(keyword("delete"), cut(|i| self.delete(i))),
                    Statement::Delete,
                ),
            )),
        )
        .parse(input)
    }

    fn select(&self, input: &'q str) -> PResult<'q, Select> {
        let (input, head) = opt(preceded(
            keyword("select"),
            cut(pair(
                map(opt(keyword("distinct")), |distinct| distinct.is_some()),
                |i| list1(symbol(","), |i| self.selection(i), i),
            )),
        ))
        .parse(input)?;
        let (distinct, selections) = head.unwrap_or_default();

        let (input, from) = preceded(
            keyword("from"),
            cut(|i| list1(symbol(","), |i| self.from_element(i), i)),
        )
        .parse(input)?;

        let (input, filter) = self.filter(input)?;

        let (input, group_by) = opt(preceded(
            pair(keyword("group"), cut(keyword("by"))),
            cut(|i| list1(symbol(","), |i| self.additive(i), i)),
        ))
        .parse(input)?;

        let (input, having) =
            opt(preceded(keyword("having"), cut(|i| self.predicate(i)))).parse(input)?;

        let (input, order_by) = opt(preceded(
            pair(keyword("order"), cut(keyword("by"))),
            cut(|i| list1(symbol(","), |i| self.sort_spec(i), i)),
        ))
        .parse(input)?;

        let (input, limit) =
            opt(preceded(keyword("limit"), cut(|i| self.additive(i)))).parse(input)?;
        let (input, offset) =
            opt(preceded(keyword("offset"), cut(|i| self.additive(i)))).parse(input)?;

        Ok((
            input,
            Select {
                distinct,
                selections,
                from,
                filter,
                group_by: group_by.unwrap_or_default(),
                having,
                order_by: order_by.unwrap_or_default(),
                limit,
                offset,
            },
        ))
    }

    fn selection(&self, input: &'q str) -> PResult<'q, Selection> {
        let (input, expr) = self.predicate(input)?;
        let (input, alias) = alias(input)?;
        Ok((input, Selection { expr, alias }))
    }

    fn from_element(&self, input: &'q str) -> PResult<'q, FromElement> {
        let (input, _) = ws(input)?;
        let position = self.offset(input);

        let (input, mut segments) = dotted(input)?;
        let source = if segments.len() == 1 {
            RootSource::Entity(segments.remove(0))
        } else {
            RootSource::Path(segments)
        };

        let (input, alias) = alias(input)?;
        let (input, joins) = many0(|i| self.join(i)).parse(input)?;

        let root = Root {
            source,
            alias,
            position,
        };
        Ok((input, FromElement { root, joins }))
    }

    fn join(&self, input: &'q str) -> PResult<'q, Join> {
        let (input, _) = ws(input)?;
        let position = self.offset(input);

        let (input, kind) = alt((
            value(JoinKind::Inner, keyword("join")),
            value(
                JoinKind::Inner,
                preceded(keyword("inner"), cut(keyword("join"))),
            ),
            value(
                JoinKind::Left,
                preceded(
                    pair(keyword("left"), opt(keyword("outer"))),
                    cut(keyword("join")),
                ),
            ),
        ))
        .parse(input)?;

        let (input, fetch) = opt(keyword("fetch")).parse(input)?;
        let (input, path) = cut(dotted).parse(input)?;
        let (input, alias) = alias(input)?;
        let (input, on) = opt(preceded(
            alt((keyword("on"), keyword("with"))),
            cut(|i| self.predicate(i)),
        ))
        .parse(input)?;

        Ok((
            input,
            Join {
                kind,
                fetch: fetch.is_some(),
                path,
                alias,
                on,
                position,
            },
        ))
    }

    fn sort_spec(&self, input: &'q str) -> PResult<'q, SortSpec> {
        let (input, expr) = self.additive(input)?;

        let (input, direction) = opt(alt((
            value(Direction::Asc, keyword("asc")),
            value(Direction::Desc, keyword("desc")),
        )))
        .parse(input)?;

        let (input, nulls) = opt(preceded(
            keyword("nulls"),
            cut(context(
                "FIRST or LAST",
                alt((
                    value(NullPrecedence::First, keyword("first")),
                    value(NullPrecedence::Last, keyword("last")),
                )),
            )),
        ))
        .parse(input)?;

        Ok((
            input,
            SortSpec {
                expr,
                direction,
                nulls,
            },
        ))
    }

    /// Everything after `UPDATE`.
    fn update(&self, input: &'q str) -> PResult<'q, Update> {
        let (input, entity) = word(input)?;
        let (input, alias) = alias(input)?;
        let (input, _) = keyword("set")(input)?;
        let (input, assignments) = list1(symbol(","), |i| self.assignment(i), input)?;
        let (input, filter) = self.filter(input)?;

        Ok((
            input,
            Update {
                entity: entity.to_string(),
                alias,
                assignments,
                filter,
            },
        ))
    }

    fn assignment(&self, input: &'q str) -> PResult<'q, Assignment> {
        let (input, (path, value)) = separated_pair(
            dotted,
            cut(symbol("=")),
            cut(|i| self.additive(i)),
        )
        .parse(input)?;
        Ok((input, Assignment { path, value }))
    }

    /// Everything after `DELETE`.
    fn delete(&self, input: &'q str) -> PResult<'q, Delete> {
        let (input, _) = opt(keyword("from")).parse(input)?;
        let (input, entity) = word(input)?;
        let (input, alias) = alias(input)?;
        let (input, filter) = self.filter(input)?;

        Ok((
            input,
            Delete {
                entity: entity.to_string(),
                alias,
                filter,
            },
        ))
    }

    fn filter(&self, input: &'q str) -> PResult<'q, Option<Expr>> {
        opt(preceded(keyword("where"), cut(|i| self.predicate(i)))).parse(input)
    }

    fn predicate(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, operands) = list1(keyword("or"), |i| self.conjunction(i), input)?;
        Ok((input, junction(operands, Expr::Or)))
    }

    fn conjunction(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, operands) = list1(keyword("and"), |i| self.negation(i), input)?;
        Ok((input, junction(operands, Expr::And)))
    }

    fn negation(&self, input: &'q str) -> PResult<'q, Expr> {
        alt((
            map(
                preceded(
                    pair(keyword("not"), keyword("exists")),
                    cut(|i| self.parenthesized_select(i)),
                ),
                |query| Expr::Exists {
                    query: Box::new(query),
                    negate: true,
                },
            ),
            map(preceded(keyword("not"), cut(|i| self.negation(i))), |expr| {
                Expr::Not(Box::new(expr))
            }),
            |i| self.comparison(i),
        ))
        .parse(input)
    }

    fn comparison(&self, input: &'q str) -> PResult<'q, Expr> {
        alt((
            map(
                preceded(keyword("exists"), cut(|i| self.parenthesized_select(i))),
                |query| Expr::Exists {
                    query: Box::new(query),
                    negate: false,
                },
            ),
            |i| self.operand_predicate(i),
        ))
        .parse(input)
    }

    /// An operand followed by whatever predicate applies to it, if any.
    fn operand_predicate(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, lhs) = self.additive(input)?;

        let (input, op) = opt(comparison_operator).parse(input)?;
        if let Some(op) = op {
            let (input, rhs) = cut(|i| self.additive(i)).parse(input)?;
            return Ok((input, Expr::Compare(Box::new(lhs), op, Box::new(rhs))));
        }

        let (input, is_null) = opt(preceded(
            keyword("is"),
            cut(terminated(opt(keyword("not")), keyword("null"))),
        ))
        .parse(input)?;
        if let Some(not) = is_null {
            return Ok((
                input,
                Expr::IsNull {
                    expr: Box::new(lhs),
                    negate: not.is_some(),
                },
            ));
        }

        let (after_not, not) = opt(keyword("not")).parse(input)?;
        let negate = not.is_some();

        if let Ok((input, ())) = keyword("in")(after_not) {
            return self.in_predicate(input, lhs, negate);
        }

        if let Ok((input, ())) = keyword("like")(after_not) {
            let (input, pattern) = cut(|i| self.additive(i)).parse(input)?;
            let (input, escape) =
                opt(preceded(keyword("escape"), cut(|i| self.additive(i)))).parse(input)?;
            return Ok((
                input,
                Expr::Like {
                    expr: Box::new(lhs),
                    pattern: Box::new(pattern),
                    escape: escape.map(Box::new),
                    negate,
                },
            ));
        }

        if let Ok((input, ())) = keyword("between")(after_not) {
            let (input, (low, high)) = cut(separated_pair(
                |i| self.additive(i),
                keyword("and"),
                |i| self.additive(i),
            ))
            .parse(input)?;
            return Ok((
                input,
                Expr::Between {
                    expr: Box::new(lhs),
                    low: Box::new(low),
                    high: Box::new(high),
                    negate,
                },
            ));
        }

        if negate {
            return Err(nom::Err::Failure(SyntaxError::expected(
                after_not,
                Expected::Label("IN, LIKE or BETWEEN"),
            )));
        }

        Ok((input, lhs))
    }

    /// Everything after `IN`.
    fn in_predicate(&self, input: &'q str, lhs: Expr, negate: bool) -> PResult<'q, Expr> {
        let expr = Box::new(lhs);

        // `IN :ids` binds a whole list to one parameter
        let (input, param) = opt(param).parse(input)?;
        if let Some(param) = param {
            return Ok((
                input,
                Expr::InList {
                    expr,
                    list: vec![param],
                    negate,
                },
            ));
        }

        let (input, _) = cut(symbol("(")).parse(input)?;

        if starts_query(input) {
            let (input, query) =
                cut(terminated(|i| self.select(i), symbol(")"))).parse(input)?;
            return Ok((
                input,
                Expr::InSubquery {
                    expr,
                    query: Box::new(query),
                    negate,
                },
            ));
        }

        let (input, list) = cut(terminated(
            separated_list0(symbol(","), |i| self.additive(i)),
            symbol(")"),
        ))
        .parse(input)?;

        Ok((input, Expr::InList { expr, list, negate }))
    }

    fn parenthesized_select(&self, input: &'q str) -> PResult<'q, Select> {
        delimited(symbol("("), |i| self.select(i), symbol(")")).parse(input)
    }

    fn additive(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, lhs) = self.multiplicative(input)?;
        let (input, rest) = many0(pair(
            alt((
                value(ArithmeticOp::Add, symbol("+")),
                value(ArithmeticOp::Sub, symbol("-")),
                value(ArithmeticOp::Concat, symbol("||")),
            )),
            cut(|i| self.multiplicative(i)),
        ))
        .parse(input)?;
        Ok((input, arithmetic(lhs, rest)))
    }

    fn multiplicative(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, lhs) = self.unary(input)?;
        let (input, rest) = many0(pair(
            alt((
                value(ArithmeticOp::Mul, symbol("*")),
                value(ArithmeticOp::Div, symbol("/")),
                value(ArithmeticOp::Mod, symbol("%")),
            )),
            cut(|i| self.unary(i)),
        ))
        .parse(input)?;
        Ok((input, arithmetic(lhs, rest)))
    }

    fn unary(&self, input: &'q str) -> PResult<'q, Expr> {
        alt((
            map(preceded(symbol("-"), cut(|i| self.unary(i))), negate),
            preceded(symbol("+"), cut(|i| self.unary(i))),
            |i| self.primary(i),
        ))
        .parse(input)
    }

    fn primary(&self, input: &'q str) -> PResult<'q, Expr> {
        context(
            "an expression",
            alt((
                map(number, Expr::Literal),
                map(string, |v| Expr::Literal(Value::String(v))),
                param,
                |i| self.parenthesized(i),
                |i| self.word_expr(i),
            )),
        )
        .parse(input)
    }

    /// A parenthesized predicate or subquery.
    fn parenthesized(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, _) = symbol("(")(input)?;

        let (input, expr) = if starts_query(input) {
            cut(map(|i| self.select(i), |query| Expr::Subquery(Box::new(query))))
                .parse(input)?
        } else {
            cut(|i| self.predicate(i)).parse(input)?
        };

        let (input, _) = cut(symbol(")")).parse(input)?;
        Ok((input, expr))
    }

    /// Word literals, function calls and paths.
    fn word_expr(&self, input: &'q str) -> PResult<'q, Expr> {
        let (input, _) = ws(input)?;
        let position = self.offset(input);
        let (input, ident) = word(input)?;
        let called = symbol("(")(input);

        match ident.to_ascii_lowercase().as_str() {
            "true" => return Ok((input, Expr::Literal(Value::Bool(true)))),
            "false" => return Ok((input, Expr::Literal(Value::Bool(false)))),
            "null" => return Ok((input, Expr::Literal(Value::Null))),
            name @ ("current_date" | "current_timestamp") if called.is_err() => {
                return Ok((
                    input,
                    Expr::Func(Func {
                        name: name.to_string(),
                        args: vec![],
                        distinct: false,
                        position,
                    }),
                ));
            }
            _ => {}
        }

        if let Ok((input, ())) = called {
            return self.call(input, ident, position);
        }

        let (input, more) = many0(preceded(symbol("."), cut(word))).parse(input)?;
        let segments = iter::once(ident).chain(more).map(str::to_string).collect();
        Ok((input, Expr::Path(Path { segments, position })))
    }

    /// Function call arguments, after the opening parenthesis.
    fn call(&self, input: &'q str, name: &str, position: usize) -> PResult<'q, Expr> {
        if name.eq_ignore_ascii_case("count") {
            if let Ok((input, ())) = symbol("*")(input) {
                let (input, _) = cut(symbol(")")).parse(input)?;
                return Ok((input, Expr::CountStar));
            }
        }

        let (input, distinct) = opt(keyword("distinct")).parse(input)?;
        let (input, args) = cut(terminated(
            separated_list0(symbol(","), |i| self.predicate(i)),
            symbol(")"),
        ))
        .parse(input)?;

        Ok((
            input,
            Expr::Func(Func {
                name: name.to_ascii_lowercase(),
                args,
                distinct: distinct.is_some(),
                position,
            }),
        ))
    }

    /// Byte offset of the next token.
    fn offset(&self, input: &str) -> usize {
        self.query.len() - input.trim_start().len()
    }

    fn error(&self, err: SyntaxError<'_>) -> Error {
        let message = match err.message {
            Some(message) => message.to_string(),
            None => format!(
                "expected {}, found {}",
                err.expected.unwrap_or(Expected::Label("more of the query")),
                describe(err.input),
            ),
        };
        Error::query_syntax(self.query, self.offset(err.input), message)
    }
}

/// `item (separator item)*`, where an item must follow every separator.
fn list1<'q, O>(
    mut separator: impl Parser<&'q str, Output = (), Error = SyntaxError<'q>>,
    mut item: impl FnMut(&'q str) -> PResult<'q, O>,
    input: &'q str,
) -> PResult<'q, Vec<O>> {
    let (mut input, first) = item(input)?;
    let mut items = vec![first];

    while let Ok((rest, ())) = separator.parse(input) {
        let (rest, next) = cut(&mut item).parse(rest)?;
        items.push(next);
        input = rest;
    }

    Ok((input, items))
}

/// `a.b.c`
fn dotted<'q>(input: &'q str) -> PResult<'q, Vec<String>> {
    let (input, (first, more)) =
        pair(word, many0(preceded(symbol("."), cut(word)))).parse(input)?;
    let segments = iter::once(first).chain(more).map(str::to_string).collect();
    Ok((input, segments))
}

/// `[AS] alias`, where the bare form must not be a reserved word.
fn alias<'q>(input: &'q str) -> PResult<'q, Option<String>> {
    let (input, alias) = opt(alt((
        preceded(keyword("as"), cut(word)),
        verify(word, |ident: &str| !is_reserved(ident)),
    )))
    .parse(input)?;
    Ok((input, alias.map(str::to_string)))
}

fn param<'q>(input: &'q str) -> PResult<'q, Expr> {
    alt((
        map(named_param, Expr::NamedParam),
        map(positional_param, Expr::PositionalParam),
    ))
    .parse(input)
}

fn comparison_operator<'q>(input: &'q str) -> PResult<'q, BinaryOp> {
    alt((
        value(BinaryOp::Ne, symbol("<>")),
        value(BinaryOp::Ne, symbol("!=")),
        value(BinaryOp::Le, symbol("<=")),
        value(BinaryOp::Ge, symbol(">=")),
        value(BinaryOp::Eq, symbol("=")),
        value(BinaryOp::Lt, symbol("<")),
        value(BinaryOp::Gt, symbol(">")),
    ))
    .parse(input)
}

fn end_of_query<'q>(input: &'q str) -> PResult<'q, ()> {
    let (input, _) = ws(input)?;
    if input.is_empty() {
        Ok((input, ()))
    } else {
        Err(nom::Err::Error(SyntaxError::expected(
            input,
            Expected::Label("end of query"),
        )))
    }
}

/// Whether a subquery starts here.
fn starts_query(input: &str) -> bool {
    keyword("select")(input).is_ok() || keyword("from")(input).is_ok()
}

fn junction(mut operands: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        combine(operands)
    }
}

fn arithmetic(lhs: Expr, rest: Vec<(ArithmeticOp, Expr)>) -> Expr {
    rest.into_iter().fold(lhs, |lhs, (op, rhs)| {
        Expr::Arithmetic(Box::new(lhs), op, Box::new(rhs))
    })
}

/// Folds the sign into numeric literals.
fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Literal(Value::I32(v)) => Expr::Literal(Value::I32(-v)),
        Expr::Literal(Value::I64(v)) => Expr::Literal(Value::I64(-v)),
        Expr::Literal(Value::F64(v)) => Expr::Literal(Value::F64(-v)),
        expr => Expr::Negate(Box::new(expr)),
    }
}

fn is_reserved(ident: &str) -> bool {
    RESERVED
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(ident))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str], position: usize) -> Expr {
        Expr::Path(Path {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            position,
        })
    }

    fn select(query: &str) -> Select {
        match parse(query).unwrap() {
            Statement::Select(select) => select,
            stmt => panic!("expected select; actual={stmt:#?}"),
        }
    }

    #[test]
    fn from_only_query() {
        let select = select("from Person");
        assert!(select.selections.is_empty());
        assert_eq!(
            select.from[0].root.source,
            RootSource::Entity("Person".into())
        );
        assert_eq!(select.from[0].root.alias, None);
    }

    #[test]
    fn joins_and_aliases() {
        let select = select(
            "select distinct p from Person as p left join fetch p.children c inner join p.employer e with e.name = 'x'",
        );
        assert!(select.distinct);
        assert_eq!(select.from[0].root.alias.as_deref(), Some("p"));

        let joins = &select.from[0].joins;
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[0].kind, JoinKind::Left);
        assert!(joins[0].fetch);
        assert_eq!(joins[0].path, ["p", "children"]);
        assert_eq!(joins[0].alias.as_deref(), Some("c"));
        assert_eq!(joins[1].kind, JoinKind::Inner);
        assert!(!joins[1].fetch);
        assert!(joins[1].on.is_some());
    }

    #[test]
    fn predicate_precedence() {
        let select = select("from Person p where p.a = 1 or p.b = 2 and not p.c is null");
        let Some(Expr::Or(operands)) = select.filter else {
            panic!("expected OR");
        };
        assert_eq!(operands.len(), 2);
        let Expr::And(and) = &operands[1] else {
            panic!("expected AND");
        };
        assert!(matches!(&and[1], Expr::Not(inner) if matches!(**inner, Expr::IsNull { negate: false, .. })));
    }

    #[test]
    fn in_forms() {
        let select = select(
            "from Person p where p.id in :ids and p.id not in (1, 2) and p.id in (select c.id from Child c)",
        );
        let Some(Expr::And(operands)) = select.filter else {
            panic!("expected AND");
        };
        assert_eq!(
            operands[0],
            Expr::InList {
                expr: Box::new(path(&["p", "id"], 20)),
                list: vec![Expr::NamedParam("ids".into())],
                negate: false,
            }
        );
        assert!(matches!(&operands[1], Expr::InList { negate: true, list, .. } if list.len() == 2));
        assert!(matches!(&operands[2], Expr::InSubquery { negate: false, .. }));
    }

    #[test]
    fn arithmetic_precedence() {
        let select = select("select p.a + p.b * 2 from Person p");
        let Expr::Arithmetic(_, ArithmeticOp::Add, rhs) = &select.selections[0].expr else {
            panic!("expected addition");
        };
        assert!(matches!(**rhs, Expr::Arithmetic(_, ArithmeticOp::Mul, _)));
    }

    #[test]
    fn functions_and_ordering() {
        let select = select(
            "select count(distinct p.name), count(*) from Person p group by p.city order by p.city desc nulls last limit 10 offset ?1",
        );
        assert!(matches!(
            &select.selections[0].expr,
            Expr::Func(Func { name, distinct: true, .. }) if name == "count"
        ));
        assert_eq!(select.selections[1].expr, Expr::CountStar);
        assert_eq!(select.order_by[0].direction, Some(Direction::Desc));
        assert_eq!(select.order_by[0].nulls, Some(NullPrecedence::Last));
        assert_eq!(select.limit, Some(Expr::Literal(Value::I32(10))));
        assert_eq!(select.offset, Some(Expr::PositionalParam(1)));
    }

    #[test]
    fn bulk_statements() {
        let Statement::Update(update) =
            parse("update Person p set p.name = :name, p.age = p.age + 1 where p.id = 1").unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(update.alias.as_deref(), Some("p"));
        assert_eq!(update.assignments.len(), 2);

        let Statement::Delete(delete) = parse("delete from Person").unwrap() else {
            panic!("expected delete");
        };
        assert_eq!(delete.entity, "Person");
        assert!(delete.filter.is_none());
    }

    #[test]
    fn syntax_errors_carry_the_query() {
        let err = parse("from Person p where").unwrap_err();
        assert!(err.is_query_syntax());
        assert!(err.to_string().contains("[from Person p where]"));

        let err = parse("select p from Person p p2").unwrap_err();
        assert!(err.is_query_syntax());
        assert!(err.to_string().contains("expected end of query, found `p2`"));
    }

    #[test]
    fn syntax_errors_point_at_the_offending_token() {
        let err = parse("from Person p where p.name = 'abc").unwrap_err();
        assert!(err.to_string().contains("position 29"));
        assert!(err.to_string().contains("unterminated string literal"));

        let err = parse("from Person p where").unwrap_err();
        assert!(err
            .to_string()
            .contains("expected an expression, found end of query"));

        let err = parse("select p from Person p order p.name").unwrap_err();
        assert!(err.to_string().contains("position 29"));
        assert!(err.to_string().contains("expected BY, found `p`"));

        let err = parse("hello world").unwrap_err();
        assert!(err
            .to_string()
            .contains("expected SELECT, FROM, UPDATE or DELETE, found `hello`"));

        let err = parse("from Person p where p.name not null").unwrap_err();
        assert!(err
            .to_string()
            .contains("expected IN, LIKE or BETWEEN, found `null`"));

        let err = parse("select p form Person p").unwrap_err();
        assert!(err.to_string().contains("expected FROM, found `Person`"));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let select = select("SELECT P.Name FROM Person P WHERE P.age BETWEEN 1 AND 2 ORDER BY P.Name");
        assert_eq!(select.from[0].root.alias.as_deref(), Some("P"));
        assert!(matches!(select.filter, Some(Expr::Between { negate: false, .. })));
        assert_eq!(select.order_by.len(), 1);
    }
}
