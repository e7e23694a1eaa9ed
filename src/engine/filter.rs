//! Rule filter expressions such as `[NAME] = 'France' and [POP] > 1000`.

use super::datasource::{Feature, Value};
use super::error::{Error, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, map_res, not, opt, value},
    multi::many0,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated},
};
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Attribute(String),
    Literal(Value),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate to a boolean against `feature`.
    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Expr::Not(e) => !e.matches(feature),
            Expr::And(a, b) => a.matches(feature) && b.matches(feature),
            Expr::Or(a, b) => a.matches(feature) || b.matches(feature),
            Expr::Compare(op, a, b) => compare(*op, &a.value(feature), &b.value(feature)),
            other => other.value(feature).is_truthy(),
        }
    }

    fn value(&self, feature: &Feature) -> Value {
        match self {
            Expr::Attribute(name) => feature.get(name).clone(),
            Expr::Literal(v) => v.clone(),
            other => Value::Bool(other.matches(feature)),
        }
    }
}

fn compare(op: CompareOp, a: &Value, b: &Value) -> bool {
    let ordering = match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => Some(a.to_string().cmp(&b.to_string())),
        },
    };
    match (op, ordering) {
        (CompareOp::Ne, None) => true,
        (_, None) => false,
        (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
        (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Ge, Some(o)) => o != Ordering::Less,
    }
}

impl FromStr for Expr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let error = |message: String| Error::Filter {
            expr: s.to_string(),
            message,
        };
        match or_expr(s.trim()) {
            Ok(("", expr)) => Ok(expr),
            Ok((rem, _)) => Err(error(format!("unexpected trailing input '{rem}'"))),
            Err(e) => Err(error(e.to_string())),
        }
    }
}

// --- Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that does not run into a following word.
fn keyword<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag_no_case(kw), not(satisfy(is_word_char)))
}

fn fold_binary(first: Expr, rest: Vec<Expr>, op: fn(Box<Expr>, Box<Expr>) -> Expr) -> Expr {
    rest.into_iter()
        .fold(first, |lhs, rhs| op(Box::new(lhs), Box::new(rhs)))
}

// --- Operators ---

fn or_op(input: &str) -> IResult<&str, &str> {
    alt((keyword("or"), tag("||"))).parse(input)
}

fn and_op(input: &str) -> IResult<&str, &str> {
    alt((keyword("and"), tag("&&"))).parse(input)
}

fn not_op(input: &str) -> IResult<&str, &str> {
    alt((keyword("not"), terminated(tag("!"), not(char('='))))).parse(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Eq, alt((tag("=="), tag("="), keyword("eq")))),
        value(CompareOp::Ne, alt((tag("!="), tag("<>"), keyword("neq"), keyword("ne")))),
        value(CompareOp::Le, alt((tag("<="), keyword("le")))),
        value(CompareOp::Ge, alt((tag(">="), keyword("ge")))),
        value(CompareOp::Lt, alt((tag("<"), keyword("lt")))),
        value(CompareOp::Gt, alt((tag(">"), keyword("gt")))),
    ))
    .parse(input)
}

// --- Expressions, loosest binding first ---

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(or_op), and_expr)).parse(input)?;
    Ok((input, fold_binary(first, rest, Expr::Or)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(ws(and_op), not_expr)).parse(input)?;
    Ok((input, fold_binary(first, rest, Expr::And)))
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(not_op), not_expr), |e| Expr::Not(Box::new(e))),
        comparison,
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = primary(input)?;
    let (input, rhs) = opt(pair(ws(compare_op), primary)).parse(input)?;
    Ok(match rhs {
        Some((op, rhs)) => (input, Expr::Compare(op, Box::new(lhs), Box::new(rhs))),
        None => (input, lhs),
    })
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), or_expr, char(')')),
        map(attribute, |name: &str| Expr::Attribute(name.to_string())),
        map(string_literal, |s: &str| Expr::Literal(Value::String(s.to_string()))),
        map(number, |n| Expr::Literal(Value::Number(n))),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
    )))
    .parse(input)
}

fn attribute(input: &str) -> IResult<&str, &str> {
    delimited(char('['), take_until("]"), char(']')).parse(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_until("'"), char('\'')),
        delimited(char('"'), take_until("\""), char('"')),
    ))
    .parse(input)
}

/// Signed decimal with optional fraction and exponent (`-2.5e-3`).
fn number(input: &str) -> IResult<&str, f64> {
    map_res(recognize_float, str::parse::<f64>).parse(input)
}
