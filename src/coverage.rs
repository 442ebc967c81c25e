//! Coverage computation over tallied fault statuses.
//!
//! Formulae are arbitrary user text, so they are evaluated by a dedicated
//! recursive-descent arithmetic evaluator (`+ - * / ** ( )` plus symbol
//! substitution) rather than any host interpreter.

use std::collections::BTreeMap;

use crate::error::CoverageError;
use crate::fault_report::{Fault, FaultReport, StatusGroup};

/// How faults of one equivalence class contribute to a status tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Each class counts once, through its prime.
    #[default]
    Prime,
    /// Each class counts its full size, through the prime's `equivalent_faults`.
    Total,
}

/// Tally of faults per status code.
pub fn status_tally(faults: &[Fault], aggregation: Aggregation) -> BTreeMap<String, u64> {
    let mut tally: BTreeMap<String, u64> = BTreeMap::new();
    for fault in faults.iter().filter(|f| f.is_prime()) {
        let weight = match aggregation {
            Aggregation::Prime => 1,
            Aggregation::Total => fault.equivalent_faults.unwrap_or(1) as u64,
        };
        *tally.entry(fault.fault_status.clone()).or_default() += weight;
    }
    tally
}

/// Sum of a group's member-status tallies; absent members count zero.
pub fn group_aggregate(group: &StatusGroup, tally: &BTreeMap<String, u64>) -> u64 {
    group
        .members
        .iter()
        .map(|code| tally.get(code).copied().unwrap_or(0))
        .sum()
}

impl FaultReport {
    /// Evaluates the named coverage formula against the prime-aggregated
    /// fault tallies, rounded to `precision` decimal places.
    pub fn compute_coverage(&self, formula: &str, precision: u32) -> Result<f64, CoverageError> {
        self.compute_coverage_with(formula, precision, Aggregation::default())
    }

    pub fn compute_coverage_with(
        &self,
        formula: &str,
        precision: u32,
        aggregation: Aggregation,
    ) -> Result<f64, CoverageError> {
        let expr = self
            .formulas
            .iter()
            .find(|f| f.name == formula)
            .map(|f| f.expr.as_str())
            .ok_or_else(|| CoverageError::UnknownFormula(formula.to_string()))?;

        let tally = status_tally(&self.faults, aggregation);
        let value = eval_expr(expr, |symbol| {
            if let Some(group) = self.groups.iter().find(|g| g.name == symbol) {
                return Some(group_aggregate(group, &tally) as f64);
            }
            // A bare status code is a valid symbol: tallied count, or zero
            // when the code is declared in some group but currently unseen.
            if let Some(count) = tally.get(symbol) {
                return Some(*count as f64);
            }
            self.groups
                .iter()
                .any(|g| g.members.iter().any(|m| m == symbol))
                .then_some(0.0)
        })?;

        let scale = 10f64.powi(precision as i32);
        Ok((value * scale).round() / scale)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Symbol(String),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

fn lex(expr: &str) -> Result<Vec<Token>, CoverageError> {
    let bad = |message: String| CoverageError::BadExpression {
        expr: expr.to_string(),
        message,
    };

    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Pow);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| bad(format!("bad numeric literal '{literal}'")))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Symbol(chars[start..i].iter().collect()));
            }
            other => return Err(bad(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Evaluator<'a, F> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    lookup: F,
}

impl<'a, F: Fn(&str) -> Option<f64>> Evaluator<'a, F> {
    fn bad(&self, message: impl Into<String>) -> CoverageError {
        CoverageError::BadExpression {
            expr: self.expr.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CoverageError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, CoverageError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    value /= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // unary := '-' unary | power
    fn unary(&mut self) -> Result<f64, CoverageError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.power()
    }

    // power := atom ('**' unary)?   -- right-associative
    fn power(&mut self) -> Result<f64, CoverageError> {
        let base = self.atom()?;
        if matches!(self.peek(), Some(Token::Pow)) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, CoverageError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Symbol(name)) => (self.lookup)(&name)
                .ok_or_else(|| CoverageError::UnknownSymbol(name)),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(self.bad("missing closing parenthesis")),
                }
            }
            Some(other) => Err(self.bad(format!("unexpected token {other:?}"))),
            None => Err(self.bad("unexpected end of expression")),
        }
    }
}

/// Evaluates an arithmetic expression, resolving symbols via `lookup`.
pub fn eval_expr<F>(expr: &str, lookup: F) -> Result<f64, CoverageError>
where
    F: Fn(&str) -> Option<f64>,
{
    let tokens = lex(expr)?;
    let mut evaluator = Evaluator {
        expr,
        tokens,
        pos: 0,
        lookup,
    };
    let value = evaluator.expr()?;
    if evaluator.pos != evaluator.tokens.len() {
        return Err(evaluator.bad("trailing tokens after expression"));
    }
    Ok(value)
}
