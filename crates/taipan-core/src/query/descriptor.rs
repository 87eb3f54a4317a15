//! Flat condition descriptors combined with AND/OR tokens.
//!
//! Ingestion and maintenance scripts describe filters as a list of
//! `(column, operator, value)` triples, optionally wrapped in grouping tokens
//! (`("(", column, operator, value, ")")`), plus a parallel list of
//! combinators. [`from_descriptors`] parses that flat form into an [`Expr`]
//! honouring SQL precedence: AND binds tighter than OR and brackets override.

use std::str::FromStr;

use super::{Expr, Op, Value};
use crate::error::{Result, TaipanError};

/// Boolean combinator placed between two consecutive descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl FromStr for Combinator {
    type Err = TaipanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Combinator::And),
            "OR" => Ok(Combinator::Or),
            other => Err(TaipanError::invalid_condition(format!(
                "unknown combinator '{other}'"
            ))),
        }
    }
}

/// Right-hand side of a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::List(values)
    }
}

/// One condition descriptor with optional leading/trailing brackets.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub open: usize,
    pub column: String,
    pub op: String,
    pub operand: Operand,
    pub close: usize,
}

impl Descriptor {
    /// Plain `(column, operator, value)` triple.
    pub fn new(column: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_operand(column, op, Operand::Value(value.into()))
    }

    /// `(column, IN | NOT IN, [values])` triple.
    pub fn list(column: impl Into<String>, op: impl Into<String>, values: Vec<Value>) -> Self {
        Self::with_operand(column, op, Operand::List(values))
    }

    fn with_operand(column: impl Into<String>, op: impl Into<String>, operand: Operand) -> Self {
        Self {
            open: 0,
            column: column.into(),
            op: op.into(),
            operand,
            close: 0,
        }
    }

    /// Five-part descriptor; `open` may only hold `(` characters and `close`
    /// only `)` characters (either may be empty).
    pub fn grouped(
        open: &str,
        column: impl Into<String>,
        op: impl Into<String>,
        operand: impl Into<Operand>,
        close: &str,
    ) -> Result<Self> {
        let mut descriptor = Self::with_operand(column, op, operand.into());
        descriptor.open = count_brackets(open, '(')?;
        descriptor.close = count_brackets(close, ')')?;
        Ok(descriptor)
    }

    /// Builds a descriptor from its loose parts: exactly three
    /// (`column, op, value`) or five (`open, column, op, value, close`).
    pub fn from_parts(parts: Vec<Value>) -> Result<Self> {
        let text = |value: &Value, what: &str| {
            value.as_str().map(str::to_string).ok_or_else(|| {
                TaipanError::invalid_condition(format!("descriptor {what} must be text, got {value}"))
            })
        };
        match parts.as_slice() {
            [column, op, value] => Ok(Self::new(
                text(column, "column")?,
                text(op, "operator")?,
                value.clone(),
            )),
            [open, column, op, value, close] => Self::grouped(
                &text(open, "opening token")?,
                text(column, "column")?,
                text(op, "operator")?,
                Operand::Value(value.clone()),
                &text(close, "closing token")?,
            ),
            other => Err(TaipanError::invalid_condition(format!(
                "condition descriptors take 3 or 5 parts, got {}",
                other.len()
            ))),
        }
    }

    /// Converts the descriptor itself (ignoring brackets) into a leaf node.
    pub fn to_expr(&self) -> Result<Expr> {
        let op = self.op.trim().to_ascii_uppercase();
        let op = op.split_whitespace().collect::<Vec<_>>().join(" ");
        match (op.as_str(), &self.operand) {
            ("IS", Operand::Value(v)) if is_null_token(v) => Ok(Expr::is_null(&self.column)),
            ("IS NOT", Operand::Value(v)) if is_null_token(v) => {
                Ok(Expr::is_not_null(&self.column))
            }
            ("IN", Operand::List(values)) => Ok(Expr::in_list(&self.column, values.clone())),
            ("NOT IN", Operand::List(values)) => Ok(Expr::not_in(&self.column, values.clone())),
            (token, Operand::Value(value)) => match Op::parse(token) {
                Some(op) => Ok(Expr::compare(&self.column, op, value.clone())),
                None => Err(TaipanError::invalid_condition(format!(
                    "operator '{}' is not usable with a single value on {}",
                    self.op, self.column
                ))),
            },
            (_, Operand::List(_)) => Err(TaipanError::invalid_condition(format!(
                "operator '{}' cannot take a list on {}",
                self.op, self.column
            ))),
        }
    }
}

fn is_null_token(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.eq_ignore_ascii_case("NULL"),
        _ => false,
    }
}

fn count_brackets(token: &str, bracket: char) -> Result<usize> {
    let token = token.trim();
    if token.chars().all(|c| c == bracket) {
        Ok(token.len())
    } else {
        Err(TaipanError::invalid_condition(format!(
            "grouping token '{token}' may only contain '{bracket}'"
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Open,
    Close,
    Leaf(usize),
    Join(Combinator),
}

/// Parses descriptors and combinators into a single predicate tree.
///
/// `combinators.len()` must equal `descriptors.len() - 1` and brackets must
/// balance.
pub fn from_descriptors(descriptors: &[Descriptor], combinators: &[Combinator]) -> Result<Expr> {
    if descriptors.is_empty() {
        return Err(TaipanError::invalid_condition("no condition descriptors given"));
    }
    if combinators.len() != descriptors.len() - 1 {
        return Err(TaipanError::invalid_condition(format!(
            "{} descriptors need {} combinators, got {}",
            descriptors.len(),
            descriptors.len() - 1,
            combinators.len()
        )));
    }

    let mut tokens = Vec::new();
    for (i, descriptor) in descriptors.iter().enumerate() {
        tokens.extend(std::iter::repeat(Token::Open).take(descriptor.open));
        tokens.push(Token::Leaf(i));
        tokens.extend(std::iter::repeat(Token::Close).take(descriptor.close));
        if let Some(combinator) = combinators.get(i) {
            tokens.push(Token::Join(*combinator));
        }
    }

    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
        descriptors,
    };
    let expr = parser.parse_or()?;
    if parser.position != tokens.len() {
        return Err(TaipanError::invalid_condition(
            "unbalanced closing bracket in condition descriptors",
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    descriptors: &'a [Descriptor],
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(Token::Join(Combinator::Or)) {
            self.position += 1;
            terms.push(self.parse_and()?);
        }
        Ok(collapse(terms, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_atom()?];
        while self.peek() == Some(Token::Join(Combinator::And)) {
            self.position += 1;
            terms.push(self.parse_atom()?);
        }
        Ok(collapse(terms, Expr::And))
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Open) => {
                self.position += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(Token::Close) {
                    return Err(TaipanError::invalid_condition(
                        "unbalanced opening bracket in condition descriptors",
                    ));
                }
                self.position += 1;
                Ok(inner)
            }
            Some(Token::Leaf(index)) => {
                self.position += 1;
                self.descriptors[index].to_expr()
            }
            _ => Err(TaipanError::invalid_condition(
                "misplaced bracket in condition descriptors",
            )),
        }
    }
}

fn collapse(mut terms: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_triples_with_and() {
        let expr = from_descriptors(
            &[
                Descriptor::new("priority", ">", 5),
                Descriptor::new("is_active", "=", true),
            ],
            &[Combinator::And],
        )
        .unwrap();
        assert_eq!(expr, Expr::gt("priority", 5).and(Expr::eq("is_active", true)));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = from_descriptors(
            &[
                Descriptor::new("a", "=", 1),
                Descriptor::new("b", "=", 2),
                Descriptor::new("c", "=", 3),
            ],
            &[Combinator::Or, Combinator::And],
        )
        .unwrap();
        assert_eq!(expr.render().unwrap().sql, "a = ? OR (b = ? AND c = ?)");
    }

    #[test]
    fn test_grouped_descriptors_override_precedence() {
        let expr = from_descriptors(
            &[
                Descriptor::grouped("(", "a", "=", Value::from(1), "").unwrap(),
                Descriptor::grouped("", "b", "=", Value::from(2), ")").unwrap(),
                Descriptor::new("c", "=", 3),
            ],
            &[Combinator::Or, Combinator::And],
        )
        .unwrap();
        assert_eq!(expr.render().unwrap().sql, "(a = ? OR b = ?) AND c = ?");
    }

    #[test]
    fn test_null_and_list_operators() {
        let expr = from_descriptors(
            &[
                Descriptor::new("done", "IS", "NULL"),
                Descriptor::list("field_id", "IN", vec![1.into(), 2.into()]),
                Descriptor::new("success", "is not", Value::Null),
            ],
            &[Combinator::And, Combinator::And],
        )
        .unwrap();
        assert_eq!(
            expr.render().unwrap().sql,
            "done IS NULL AND field_id IN (?, ?) AND success IS NOT NULL"
        );
    }

    #[test]
    fn test_combinator_count_mismatch() {
        let result = from_descriptors(
            &[Descriptor::new("a", "=", 1), Descriptor::new("b", "=", 2)],
            &[],
        );
        assert!(matches!(result, Err(TaipanError::InvalidCondition { .. })));
    }

    #[test]
    fn test_unbalanced_brackets() {
        let result = from_descriptors(
            &[
                Descriptor::grouped("((", "a", "=", Value::from(1), "").unwrap(),
                Descriptor::grouped("", "b", "=", Value::from(2), ")").unwrap(),
            ],
            &[Combinator::And],
        );
        assert!(matches!(result, Err(TaipanError::InvalidCondition { .. })));

        let result = from_descriptors(
            &[Descriptor::grouped("", "a", "=", Value::from(1), ")").unwrap()],
            &[],
        );
        assert!(matches!(result, Err(TaipanError::InvalidCondition { .. })));
    }

    #[test]
    fn test_from_parts_length_checked() {
        let four = vec!["(".into(), "a".into(), "=".into(), 1.into()];
        assert!(matches!(
            Descriptor::from_parts(four),
            Err(TaipanError::InvalidCondition { .. })
        ));

        let five = vec!["(".into(), "a".into(), "=".into(), 1.into(), ")".into()];
        let descriptor = Descriptor::from_parts(five).unwrap();
        assert_eq!((descriptor.open, descriptor.close), (1, 1));
    }

    #[test]
    fn test_bad_grouping_token() {
        assert!(Descriptor::grouped("[", "a", "=", Value::from(1), "").is_err());
    }

    #[test]
    fn test_list_with_comparison_operator_rejected() {
        let descriptor = Descriptor::list("a", ">", vec![1.into()]);
        assert!(descriptor.to_expr().is_err());
    }

    #[test]
    fn test_combinator_parse() {
        assert_eq!("and".parse::<Combinator>().unwrap(), Combinator::And);
        assert!("xor".parse::<Combinator>().is_err());
    }
}
