//! Predicate trees and their rendering to parameterized SQL.

use std::fmt;

use super::{check_identifier, Value};
use crate::error::{Result, TaipanError};

/// Binary comparison operators usable in a [`Expr::Compare`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Op {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "LIKE",
        }
    }

    /// Parses a comparison token such as `>=` or `LIKE`.
    pub fn parse(token: &str) -> Option<Op> {
        match token.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Some(Op::Eq),
            "!=" | "<>" => Some(Op::Ne),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Le),
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Ge),
            "LIKE" => Some(Op::Like),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One `WHEN column op value THEN result` arm of a [`CaseCondition`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub column: String,
    pub op: Op,
    pub value: Value,
    pub result: Value,
}

impl CaseBranch {
    pub fn new(
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
        result: impl Into<Value>,
    ) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
            result: result.into(),
        }
    }
}

/// Compares a column against a CASE expression:
/// `column op (CASE WHEN .. THEN .. ELSE default END)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseCondition {
    pub column: String,
    pub op: Op,
    pub branches: Vec<CaseBranch>,
    pub default: Value,
}

/// Predicate tree rendered to SQL in one place.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: String,
        op: Op,
        value: Value,
    },
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Case(CaseCondition),
}

/// Rendered SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Expr {
    pub fn compare(column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Expr::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Op::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Op::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Op::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Op::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Op::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Op::Ge, value)
    }

    pub fn in_list<V, I>(column: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Expr::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V, I>(column: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Expr::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Expr::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    pub fn case(condition: CaseCondition) -> Self {
        Expr::Case(condition)
    }

    /// Conjunction of `self` and `other`, flattening nested ANDs.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut terms) => {
                terms.push(other);
                Expr::And(terms)
            }
            first => Expr::And(vec![first, other]),
        }
    }

    /// Disjunction of `self` and `other`, flattening nested ORs.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut terms) => {
                terms.push(other);
                Expr::Or(terms)
            }
            first => Expr::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn all(terms: impl IntoIterator<Item = Expr>) -> Self {
        Expr::And(terms.into_iter().collect())
    }

    pub fn any(terms: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Or(terms.into_iter().collect())
    }

    /// Every column name referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Compare { column, .. }
            | Expr::InList { column, .. }
            | Expr::IsNull { column, .. } => out.push(column),
            Expr::And(terms) | Expr::Or(terms) => {
                terms.iter().for_each(|t| t.collect_columns(out));
            }
            Expr::Not(inner) => inner.collect_columns(out),
            Expr::Case(case) => {
                out.push(&case.column);
                out.extend(case.branches.iter().map(|b| b.column.as_str()));
            }
        }
    }

    /// Renders the tree with bare column names.
    pub fn render(&self) -> Result<SqlFragment> {
        let mut params = Vec::new();
        let sql = self.render_with(
            &|column: &str| {
                check_identifier(column)?;
                Ok(column.to_string())
            },
            &mut params,
        )?;
        Ok(SqlFragment { sql, params })
    }

    /// Renders the tree, mapping every column through `resolve` (used to
    /// qualify names in joins and `UPDATE .. FROM`).
    pub(crate) fn render_with(
        &self,
        resolve: &dyn Fn(&str) -> Result<String>,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        match self {
            Expr::Compare { column, op, value } => {
                let column = resolve(column)?;
                match (value, op) {
                    (Value::Null, Op::Eq) => Ok(format!("{column} IS NULL")),
                    (Value::Null, Op::Ne) => Ok(format!("{column} IS NOT NULL")),
                    (Value::Null, _) => Err(TaipanError::invalid_condition(format!(
                        "operator {op} cannot compare {column} with NULL"
                    ))),
                    (value, op) => {
                        params.push(value.clone());
                        Ok(format!("{column} {op} ?"))
                    }
                }
            }
            Expr::InList {
                column,
                values,
                negated,
            } => {
                let column = resolve(column)?;
                if values.is_empty() {
                    // x IN () is always false, x NOT IN () always true
                    return Ok(if *negated { "1" } else { "0" }.to_string());
                }
                params.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                let keyword = if *negated { "NOT IN" } else { "IN" };
                Ok(format!("{column} {keyword} ({placeholders})"))
            }
            Expr::IsNull { column, negated } => {
                let column = resolve(column)?;
                Ok(if *negated {
                    format!("{column} IS NOT NULL")
                } else {
                    format!("{column} IS NULL")
                })
            }
            Expr::And(terms) => Self::render_joined(terms, " AND ", "1", resolve, params),
            Expr::Or(terms) => Self::render_joined(terms, " OR ", "0", resolve, params),
            Expr::Not(inner) => Ok(format!("NOT ({})", inner.render_with(resolve, params)?)),
            Expr::Case(case) => Self::render_case(case, resolve, params),
        }
    }

    fn render_joined(
        terms: &[Expr],
        separator: &str,
        empty: &str,
        resolve: &dyn Fn(&str) -> Result<String>,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        if terms.is_empty() {
            return Ok(empty.to_string());
        }
        if let [single] = terms {
            return single.render_with(resolve, params);
        }
        let parts = terms
            .iter()
            .map(|term| {
                let sql = term.render_with(resolve, params)?;
                Ok(if term.is_compound() {
                    format!("({sql})")
                } else {
                    sql
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(separator))
    }

    fn render_case(
        case: &CaseCondition,
        resolve: &dyn Fn(&str) -> Result<String>,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        if case.branches.is_empty() {
            return Err(TaipanError::invalid_condition(format!(
                "CASE comparison on {} has no branches",
                case.column
            )));
        }
        let column = resolve(&case.column)?;
        let mut sql = format!("{column} {} (CASE", case.op);
        for branch in &case.branches {
            let branch_column = resolve(&branch.column)?;
            if branch.value.is_null() {
                sql.push_str(&format!(" WHEN {branch_column} IS NULL THEN ?"));
            } else {
                sql.push_str(&format!(" WHEN {branch_column} {} ? THEN ?", branch.op));
                params.push(branch.value.clone());
            }
            params.push(branch.result.clone());
        }
        sql.push_str(" ELSE ? END)");
        params.push(case.default.clone());
        Ok(sql)
    }

    fn is_compound(&self) -> bool {
        matches!(self, Expr::And(terms) | Expr::Or(terms) if terms.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let fragment = Expr::gt("priority", 5).render().unwrap();
        assert_eq!(fragment.sql, "priority > ?");
        assert_eq!(fragment.params, vec![Value::Int(5)]);
    }

    #[test]
    fn test_and_of_two_predicates() {
        let expr = Expr::gt("priority", 5).and(Expr::eq("is_active", true));
        let fragment = expr.render().unwrap();
        assert_eq!(fragment.sql, "priority > ? AND is_active = ?");
        assert_eq!(fragment.params, vec![Value::Int(5), Value::Bool(true)]);
    }

    #[test]
    fn test_nested_or_is_bracketed() {
        let expr = Expr::any([Expr::eq("a", 1), Expr::eq("b", 2)]).and(Expr::eq("c", 3));
        assert_eq!(expr.render().unwrap().sql, "(a = ? OR b = ?) AND c = ?");
    }

    #[test]
    fn test_null_comparisons_render_is_null() {
        assert_eq!(
            Expr::eq("done", Value::Null).render().unwrap().sql,
            "done IS NULL"
        );
        assert_eq!(
            Expr::ne("done", Value::Null).render().unwrap().sql,
            "done IS NOT NULL"
        );
        assert!(Expr::gt("done", Value::Null).render().is_err());
    }

    #[test]
    fn test_in_list_and_empty_list() {
        let fragment = Expr::in_list("field_id", [1_i64, 2, 3]).render().unwrap();
        assert_eq!(fragment.sql, "field_id IN (?, ?, ?)");
        assert_eq!(fragment.params.len(), 3);

        let empty = Expr::in_list("field_id", Vec::<i64>::new()).render().unwrap();
        assert_eq!(empty.sql, "0");
        let negated = Expr::not_in("field_id", Vec::<i64>::new()).render().unwrap();
        assert_eq!(negated.sql, "1");
    }

    #[test]
    fn test_case_condition() {
        let expr = Expr::case(CaseCondition {
            column: "priority".into(),
            op: Op::Ge,
            branches: vec![
                CaseBranch::new("is_h0_target", Op::Eq, true, 8),
                CaseBranch::new("is_lowz_target", Op::Eq, true, 6),
            ],
            default: Value::Int(2),
        });
        let fragment = expr.render().unwrap();
        assert_eq!(
            fragment.sql,
            "priority >= (CASE WHEN is_h0_target = ? THEN ? WHEN is_lowz_target = ? THEN ? ELSE ? END)"
        );
        assert_eq!(fragment.params.len(), 5);
        assert_eq!(fragment.params[4], Value::Int(2));
    }

    #[test]
    fn test_case_without_branches_is_rejected() {
        let expr = Expr::case(CaseCondition {
            column: "priority".into(),
            op: Op::Eq,
            branches: vec![],
            default: Value::Int(0),
        });
        assert!(matches!(
            expr.render(),
            Err(TaipanError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let expr = Expr::eq("ra; DROP TABLE field", 1);
        assert!(expr.render().is_err());
    }

    #[test]
    fn test_columns_lists_every_reference() {
        let expr = Expr::eq("a", 1).and(Expr::is_null("b").not());
        assert_eq!(expr.columns(), vec!["a", "b"]);
    }

    #[test]
    fn test_op_parse() {
        assert_eq!(Op::parse("<>"), Some(Op::Ne));
        assert_eq!(Op::parse("like"), Some(Op::Like));
        assert_eq!(Op::parse("~"), None);
    }
}
