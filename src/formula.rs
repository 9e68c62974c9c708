//! Parsing and evaluation of model formulas.
//!
//! Fit models are written as algebraic strings over the variable `x` and
//! indexed parameters `[n]`, for example
//! `[1]*exp(-0.5*((x-[2])/[0])^2) + [3] + [4]*x`. A [`Formula`] parses such a
//! string once and evaluates it for any `x` and parameter vector.

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0},
    number::complete::double,
    IResult, Parser,
};
use std::fmt;
use thiserror::Error;

/// Error that can occur during formula parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Failed to parse formula: {message}")]
    Parse { message: String },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("{name}() requires {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Parameter [{index}] requested but only {len} supplied")]
    MissingParameter { index: usize, len: usize },

    #[error("Division by zero")]
    DivisionByZero,
}

type FormulaResult<T> = Result<T, FormulaError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Function {
    Exp,
    Sqrt,
    Abs,
    Log,
    Pow,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "exp" => Some(Self::Exp),
            "sqrt" => Some(Self::Sqrt),
            "abs" => Some(Self::Abs),
            "log" => Some(Self::Log),
            "pow" => Some(Self::Pow),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Pow => 2,
            _ => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Log => "log",
            Self::Pow => "pow",
        }
    }
}

/// Formula AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(f64),
    /// The independent variable `x`.
    X,
    /// Parameter reference `[n]`.
    Parameter(usize),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    fn evaluate(&self, x: f64, params: &[f64]) -> FormulaResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::X => Ok(x),
            Self::Parameter(index) => {
                params
                    .get(*index)
                    .copied()
                    .ok_or(FormulaError::MissingParameter {
                        index: *index,
                        len: params.len(),
                    })
            }
            Self::Neg(inner) => Ok(-inner.evaluate(x, params)?),
            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(x, params)?;
                let rhs = right.evaluate(x, params)?;
                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(FormulaError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(power(lhs, rhs)),
                }
            }
            Self::Call(function, args) => {
                let a = args[0].evaluate(x, params)?;
                Ok(match function {
                    Function::Exp => a.exp(),
                    Function::Sqrt => a.sqrt(),
                    Function::Abs => a.abs(),
                    Function::Log => a.ln(),
                    Function::Pow => power(a, args[1].evaluate(x, params)?),
                })
            }
        }
    }

    fn max_parameter(&self) -> Option<usize> {
        match self {
            Self::Number(_) | Self::X => None,
            Self::Parameter(index) => Some(*index),
            Self::Neg(inner) => inner.max_parameter(),
            Self::Binary(_, left, right) => left.max_parameter().max(right.max_parameter()),
            Self::Call(_, args) => args.iter().filter_map(Node::max_parameter).max(),
        }
    }
}

/// Integer exponents are evaluated with `powi` so negative bases stay real.
fn power(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

/// A parsed model formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    root: Node,
    parameter_count: usize,
}

impl Formula {
    /// Parse a formula string.
    ///
    /// ```
    /// use spectrum_fitter::Formula;
    ///
    /// let f = Formula::parse("[0] + [1]*x^2").unwrap();
    /// assert_eq!(f.parameter_count(), 2);
    /// assert_eq!(f.evaluate(3.0, &[1.0, 2.0]).unwrap(), 19.0);
    /// ```
    pub fn parse(input: &str) -> FormulaResult<Self> {
        let (remainder, root) = expression(input).map_err(|e| match e {
            nom::Err::Failure(err) if err.code == nom::error::ErrorKind::Verify => {
                classify_failure(err.input)
            }
            other => FormulaError::Parse {
                message: format!("{:?}", other),
            },
        })?;
        if !remainder.trim().is_empty() {
            return Err(FormulaError::Parse {
                message: format!("Unexpected trailing characters: '{}'", remainder.trim()),
            });
        }
        let parameter_count = root.max_parameter().map_or(0, |m| m + 1);
        Ok(Self {
            source: input.to_string(),
            root,
            parameter_count,
        })
    }

    pub fn evaluate(&self, x: f64, params: &[f64]) -> FormulaResult<f64> {
        self.root.evaluate(x, params)
    }

    /// Highest referenced parameter index plus one.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Turns a verify failure raised on an identifier back into a typed error.
fn classify_failure(at: &str) -> FormulaError {
    let name: String = at
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let rest = at[name.len()..].trim_start();
    if let Some(function) = Function::lookup(&name) {
        let found = if rest.starts_with('(') {
            count_arguments(rest)
        } else {
            0
        };
        return FormulaError::Arity {
            name: function.name().to_string(),
            expected: function.arity(),
            found,
        };
    }
    if rest.starts_with('(') {
        FormulaError::UnknownFunction { name }
    } else {
        FormulaError::UnknownVariable { name }
    }
}

fn count_arguments(call: &str) -> usize {
    let mut depth = 0usize;
    let mut count = 1usize;
    for c in call.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => count += 1,
            _ => {}
        }
    }
    count
}

// Parser functions using nom

fn failure(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    ))
}

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Skip whitespace, then match a single character.
fn symbol(input: &str, c: char) -> IResult<&str, char> {
    let (input, _) = ws(input)?;
    char(c).parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    let (rest, name) =
        take_while1::<_, &str, nom::error::Error<&str>>(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)?;
    if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        Ok((rest, name))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )))
    }
}

/// `[n]`
fn parameter(input: &str) -> IResult<&str, Node> {
    let (input, _) = symbol(input, '[')?;
    let (input, _) = ws(input)?;
    let (rest, digits) = digit1::<&str, nom::error::Error<&str>>(input)?;
    let index = digits.parse::<usize>().map_err(|_| failure(input))?;
    let (rest, _) = symbol(rest, ']')?;
    Ok((rest, Node::Parameter(index)))
}

fn number(input: &str) -> IResult<&str, Node> {
    let (input, value) = double::<&str, nom::error::Error<&str>>(input)?;
    Ok((input, Node::Number(value)))
}

/// An identifier: `x`, or a function call.
fn named(input: &str) -> IResult<&str, Node> {
    let (rest, name) = identifier(input)?;
    if let Ok((after_paren, _)) = symbol(rest, '(') {
        let function = Function::lookup(name).ok_or_else(|| failure(input))?;
        let (mut remainder, first) = expression(after_paren)?;
        let mut args = vec![first];
        while let Ok((after_comma, _)) = symbol(remainder, ',') {
            let (after_arg, arg) = expression(after_comma)?;
            args.push(arg);
            remainder = after_arg;
        }
        let (remainder, _) = symbol(remainder, ')')?;
        if args.len() != function.arity() {
            return Err(failure(input));
        }
        return Ok((remainder, Node::Call(function, args)));
    }
    match name {
        "x" => Ok((rest, Node::X)),
        _ => Err(failure(input)),
    }
}

fn parens(input: &str) -> IResult<&str, Node> {
    let (input, _) = symbol(input, '(')?;
    let (input, inner) = expression(input)?;
    let (input, _) = symbol(input, ')')?;
    Ok((input, inner))
}

fn primary(input: &str) -> IResult<&str, Node> {
    let (input, _) = ws(input)?;
    if input.starts_with('[') {
        return parameter(input);
    }
    if input.starts_with('(') {
        return parens(input);
    }
    if input.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return named(input);
    }
    number(input)
}

/// `-unary` or a power expression.
fn unary(input: &str) -> IResult<&str, Node> {
    if let Ok((rest, _)) = symbol(input, '-') {
        let (rest, inner) = unary(rest)?;
        return Ok((rest, Node::Neg(Box::new(inner))));
    }
    power_expr(input)
}

/// `primary (^|**) unary`, right-associative.
fn power_expr(input: &str) -> IResult<&str, Node> {
    let (input, base) = primary(input)?;
    let (after_ws, _) = ws(input)?;
    let after_op = if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>("**").parse(after_ws)
    {
        rest
    } else if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('^').parse(after_ws) {
        rest
    } else {
        return Ok((input, base));
    };
    let (rest, exponent) = unary(after_op)?;
    Ok((
        rest,
        Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
    ))
}

/// `unary ((*|/) unary)*`, left-associative.
fn term(input: &str) -> IResult<&str, Node> {
    let (mut input, mut left) = unary(input)?;
    loop {
        let op = if let Ok((rest, _)) = symbol(input, '*') {
            (rest, BinaryOp::Mul)
        } else if let Ok((rest, _)) = symbol(input, '/') {
            (rest, BinaryOp::Div)
        } else {
            return Ok((input, left));
        };
        let (rest, right) = unary(op.0)?;
        left = Node::Binary(op.1, Box::new(left), Box::new(right));
        input = rest;
    }
}

/// `term ((+|-) term)*`, left-associative.
fn expression(input: &str) -> IResult<&str, Node> {
    let (mut input, mut left) = term(input)?;
    loop {
        let op = if let Ok((rest, _)) = symbol(input, '+') {
            (rest, BinaryOp::Add)
        } else if let Ok((rest, _)) = symbol(input, '-') {
            (rest, BinaryOp::Sub)
        } else {
            return Ok((input, left));
        };
        let (rest, right) = term(op.0)?;
        left = Node::Binary(op.1, Box::new(left), Box::new(right));
        input = rest;
    }
}
