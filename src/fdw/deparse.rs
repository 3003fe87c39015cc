//! Remote SQL synthesis for pushed-down scans.
//!
//! The remote protocol is text-query based, so quoting and escaping here
//! are the only barrier against malformed or injectable query text:
//! identifiers are backtick-quoted and string literals are single-quoted
//! with backslash escaping, per the remote dialect.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::error::{FdwError, Result};
use crate::expr::{BoolOp, Expr, Literal, Restriction};
use crate::host::RelationDesc;
use crate::types::AttrNum;

/// Maps a host operator name to its remote rendering.
pub(crate) fn remote_operator(name: &str) -> Option<&'static str> {
    Some(match name {
        "=" => "=",
        "<>" | "!=" => "<>",
        "<" => "<",
        "<=" => "<=",
        ">" => ">",
        ">=" => ">=",
        "+" => "+",
        "-" => "-",
        "*" => "*",
        "/" => "/",
        "%" => "%",
        "~~" => "LIKE",
        _ => return None,
    })
}

/// Maps a host function name to its remote counterpart.
pub(crate) fn remote_function(name: &str) -> Option<&'static str> {
    Some(match name {
        "abs" => "abs",
        "ceil" | "ceiling" => "ceil",
        "floor" => "floor",
        "round" => "round",
        "sqrt" => "sqrt",
        "upper" => "upper",
        "lower" => "lower",
        "length" => "length",
        "trim" => "btrim",
        _ => return None,
    })
}

/// A synthesized remote query together with its side tables.
#[derive(Clone, Debug)]
pub struct DeparsedQuery {
    /// Executable remote query text.
    pub sql: String,
    /// Nth remote result column -> local attribute number, in the exact
    /// order columns were appended to the projection list.
    pub retrieved_attrs: Vec<AttrNum>,
    /// Expressions rendered as placeholders, in placeholder order.
    pub params: Vec<Expr>,
}

/// Builds the remote SELECT for one scan: projection over the needed
/// attributes in ascending attribute-number order, plus a WHERE clause for
/// the remote-safe restrictions.
pub fn deparse_select(
    table: &str,
    rel: &RelationDesc,
    attrs: &BTreeSet<AttrNum>,
    remote_conds: &[Restriction],
) -> Result<DeparsedQuery> {
    let mut sql = String::from("SELECT ");
    let mut retrieved_attrs = Vec::with_capacity(attrs.len());
    if attrs.is_empty() {
        // Zero-column scans still need a well-formed projection.
        sql.push('1');
    } else {
        for (i, &num) in attrs.iter().enumerate() {
            let attr = rel
                .attr(num)
                .ok_or(FdwError::Invalid("needed attribute missing from relation"))?;
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&quote_identifier(&attr.name));
            retrieved_attrs.push(num);
        }
    }
    sql.push_str(" FROM ");
    sql.push_str(&quote_identifier(table));

    let mut params = Vec::new();
    if !remote_conds.is_empty() {
        sql.push_str(" WHERE ");
        for (i, cond) in remote_conds.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            deparse_expr(&cond.expr, rel, &mut sql, &mut params)?;
        }
    }

    Ok(DeparsedQuery {
        sql,
        retrieved_attrs,
        params,
    })
}

fn deparse_expr(
    expr: &Expr,
    rel: &RelationDesc,
    sql: &mut String,
    params: &mut Vec<Expr>,
) -> Result<()> {
    match expr {
        Expr::Column(num) => {
            let attr = rel
                .attr(*num)
                .ok_or(FdwError::Invalid("column reference outside the relation"))?;
            sql.push_str(&quote_identifier(&attr.name));
        }
        Expr::Literal(literal) => deparse_literal(literal, sql)?,
        Expr::Param { .. } => {
            sql.push('?');
            params.push(expr.clone());
        }
        Expr::Op { name, args } => {
            let op = remote_operator(name)
                .ok_or(FdwError::Invalid("operator has no remote rendering"))?;
            match args.as_slice() {
                [only] => {
                    sql.push('(');
                    sql.push_str(op);
                    sql.push(' ');
                    deparse_expr(only, rel, sql, params)?;
                    sql.push(')');
                }
                [left, right] => {
                    sql.push('(');
                    deparse_expr(left, rel, sql, params)?;
                    sql.push(' ');
                    sql.push_str(op);
                    sql.push(' ');
                    deparse_expr(right, rel, sql, params)?;
                    sql.push(')');
                }
                _ => return Err(FdwError::Invalid("operator arity not deparsable")),
            }
        }
        Expr::Func { name, args, .. } => {
            let func = remote_function(name)
                .ok_or(FdwError::Invalid("function has no remote rendering"))?;
            sql.push_str(func);
            sql.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                deparse_expr(arg, rel, sql, params)?;
            }
            sql.push(')');
        }
        Expr::Bool { op, args } => match op {
            BoolOp::Not => {
                let [arg] = args.as_slice() else {
                    return Err(FdwError::Invalid("NOT takes exactly one argument"));
                };
                sql.push_str("(NOT ");
                deparse_expr(arg, rel, sql, params)?;
                sql.push(')');
            }
            BoolOp::And | BoolOp::Or => {
                if args.is_empty() {
                    return Err(FdwError::Invalid("empty boolean connective"));
                }
                let joiner = if *op == BoolOp::And { " AND " } else { " OR " };
                sql.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(joiner);
                    }
                    deparse_expr(arg, rel, sql, params)?;
                }
                sql.push(')');
            }
        },
        Expr::NullTest { arg, negated } => {
            sql.push('(');
            deparse_expr(arg, rel, sql, params)?;
            sql.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            sql.push(')');
        }
        Expr::Cast { .. } => return Err(FdwError::Invalid("cast has no remote rendering")),
    }
    Ok(())
}

fn deparse_literal(literal: &Literal, sql: &mut String) -> Result<()> {
    match literal {
        Literal::Null => sql.push_str("NULL"),
        Literal::Bool(true) => sql.push_str("TRUE"),
        Literal::Bool(false) => sql.push_str("FALSE"),
        Literal::Int(value) => {
            let _ = write!(sql, "{value}");
        }
        Literal::Float(value) => {
            if !value.is_finite() {
                return Err(FdwError::Invalid("non-finite float has no remote rendering"));
            }
            let _ = write!(sql, "{value}");
        }
        Literal::String(value) => sql.push_str(&quote_string_literal(value)),
    }
    Ok(())
}

/// Backtick-quotes an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push('`');
        }
        out.push(ch);
    }
    out.push('`');
    out
}

/// Single-quotes a string literal, backslash-escaping quotes and
/// backslashes.
pub fn quote_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::AttrDesc;
    use crate::value::LocalType;
    use proptest::prelude::*;

    fn rel() -> RelationDesc {
        RelationDesc::new(
            1,
            "people",
            vec![
                AttrDesc::new(1, "name", LocalType::Text),
                AttrDesc::new(2, "age", LocalType::Int4),
                AttrDesc::new(3, "city", LocalType::Text),
                AttrDesc::new(4, "score", LocalType::Float8),
            ],
        )
    }

    fn attrs(nums: &[u16]) -> BTreeSet<AttrNum> {
        nums.iter().copied().map(AttrNum).collect()
    }

    #[test]
    fn projection_follows_attribute_number_order() {
        let query = deparse_select("people", &rel(), &attrs(&[3, 1, 4]), &[]).unwrap();
        assert_eq!(query.sql, "SELECT `name`, `city`, `score` FROM `people`");
        assert_eq!(
            query.retrieved_attrs,
            vec![AttrNum(1), AttrNum(3), AttrNum(4)]
        );
    }

    #[test]
    fn where_clause_renders_remote_conditions() {
        let cond = Restriction::new(Expr::op(">", Expr::col(2), Expr::lit(30_i64)));
        let query = deparse_select("people", &rel(), &attrs(&[1, 2]), &[cond]).unwrap();
        assert_eq!(
            query.sql,
            "SELECT `name`, `age` FROM `people` WHERE (`age` > 30)"
        );
        assert_eq!(query.retrieved_attrs, vec![AttrNum(1), AttrNum(2)]);
    }

    #[test]
    fn multiple_conditions_join_with_and() {
        let conds = vec![
            Restriction::new(Expr::op(">", Expr::col(2), Expr::lit(30_i64))),
            Restriction::new(Expr::op("~~", Expr::col(1), Expr::lit("a%"))),
        ];
        let query = deparse_select("people", &rel(), &attrs(&[1]), &conds).unwrap();
        assert_eq!(
            query.sql,
            "SELECT `name` FROM `people` WHERE (`age` > 30) AND (`name` LIKE 'a%')"
        );
    }

    #[test]
    fn zero_attribute_scans_project_a_constant() {
        let query = deparse_select("people", &rel(), &attrs(&[]), &[]).unwrap();
        assert_eq!(query.sql, "SELECT 1 FROM `people`");
        assert!(query.retrieved_attrs.is_empty());
    }

    #[test]
    fn params_follow_placeholder_order() {
        let cond = Restriction::new(Expr::Bool {
            op: BoolOp::And,
            args: vec![
                Expr::op(">", Expr::col(2), Expr::Param { index: 1 }),
                Expr::op("=", Expr::col(1), Expr::Param { index: 0 }),
            ],
        });
        let query = deparse_select("people", &rel(), &attrs(&[1]), &[cond]).unwrap();
        assert_eq!(
            query.sql,
            "SELECT `name` FROM `people` WHERE ((`age` > ?) AND (`name` = ?))"
        );
        assert_eq!(
            query.params,
            vec![Expr::Param { index: 1 }, Expr::Param { index: 0 }]
        );
    }

    #[test]
    fn null_tests_and_functions_render() {
        let cond = Restriction::new(Expr::Bool {
            op: BoolOp::Not,
            args: vec![Expr::NullTest {
                arg: Box::new(Expr::func("lower", vec![Expr::col(3)])),
                negated: false,
            }],
        });
        let query = deparse_select("people", &rel(), &attrs(&[3]), &[cond]).unwrap();
        assert_eq!(
            query.sql,
            "SELECT `city` FROM `people` WHERE (NOT (lower(`city`) IS NULL))"
        );
    }

    #[test]
    fn string_literals_are_escaped() {
        let cond = Restriction::new(Expr::op("=", Expr::col(1), Expr::lit("O'Hara \\ Co")));
        let query = deparse_select("people", &rel(), &attrs(&[1]), &[cond]).unwrap();
        assert_eq!(
            query.sql,
            "SELECT `name` FROM `people` WHERE (`name` = 'O\\'Hara \\\\ Co')"
        );
    }

    #[test]
    fn identifiers_with_backticks_are_doubled() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn every_supported_operator_renders_against_every_literal_kind() {
        use crate::fdw::classify::is_remote_safe;

        let operators = ["=", "<>", "<", "<=", ">", ">=", "+", "-", "*", "/", "%", "~~"];
        let literals = [
            (Literal::Null, "NULL"),
            (Literal::Bool(true), "TRUE"),
            (Literal::Int(-3), "-3"),
            (Literal::Float(2.5), "2.5"),
            (Literal::String("x".into()), "'x'"),
        ];
        for op in operators {
            for (literal, rendered) in &literals {
                let cond = Restriction::new(Expr::Op {
                    name: op.into(),
                    args: vec![Expr::col(2), Expr::Literal(literal.clone())],
                });
                assert!(is_remote_safe(&cond.expr), "{op} {rendered}");
                let query = deparse_select("people", &rel(), &attrs(&[2]), &[cond]).unwrap();
                let token = remote_operator(op).unwrap();
                let expected =
                    format!("SELECT `age` FROM `people` WHERE (`age` {token} {rendered})");
                assert_eq!(query.sql, expected);
            }
        }
    }

    fn unescape_string_literal(quoted: &str) -> Option<String> {
        let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\'' {
                // An unescaped quote inside the body would terminate the
                // literal early.
                return None;
            }
            if ch == '\\' {
                out.push(chars.next()?);
            } else {
                out.push(ch);
            }
        }
        Some(out)
    }

    proptest! {
        #[test]
        fn quoted_string_literals_round_trip(value in ".*") {
            let quoted = quote_string_literal(&value);
            prop_assert_eq!(unescape_string_literal(&quoted), Some(value));
        }

        #[test]
        fn quoted_identifiers_stay_delimited(name in ".*") {
            let quoted = quote_identifier(&name);
            prop_assert!(quoted.starts_with('`') && quoted.ends_with('`'));
            // Every backtick in the body comes in pairs.
            let body = &quoted[1..quoted.len() - 1];
            let mut run = 0usize;
            for ch in body.chars() {
                if ch == '`' {
                    run += 1;
                } else {
                    prop_assert_eq!(run % 2, 0);
                    run = 0;
                }
            }
            prop_assert_eq!(run % 2, 0);
        }
    }
}
