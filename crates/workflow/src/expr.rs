// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency expression parser and evaluator.
//!
//! Grammar (case-sensitive keywords):
//!
//! ```text
//! expr    := or
//! or      := and  (("OR"  | "||") and)*
//! and     := unary (("AND" | "&&") unary)*
//! unary   := "NOT" unary | primary
//! primary := "(" expr ")" | comparison
//! comparison := job "==" status
//!             | job "!=" status
//!             | job "IN" "(" status ("," status)* ")"
//!             | job "NOT_IN" "(" status ("," status)* ")"
//!             | job                    (shorthand for job == COMPLETED)
//! ```
//!
//! Evaluation is three-valued: a clause whose referenced job could still
//! change outcome reports [`Outcome::Pending`], and becomes definite as
//! soon as the job's fate is fixed. Short-circuiting follows Kleene logic,
//! so `a OR b` is `True` the moment either side is, regardless of the
//! other side still being pending.

use joblet_core::JobStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown status literal {0:?}")]
    UnknownStatus(String),
    #[error("trailing input after expression: {0:?}")]
    TrailingInput(String),
}

/// Three-valued evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    True,
    False,
    /// Not decidable yet; a referenced job is still in flight.
    Pending,
}

impl Outcome {
    fn and(self, other: Outcome) -> Outcome {
        use Outcome::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Pending,
        }
    }

    fn or(self, other: Outcome) -> Outcome {
        use Outcome::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (False, False) => False,
            _ => Pending,
        }
    }

    fn not(self) -> Outcome {
        match self {
            Outcome::True => Outcome::False,
            Outcome::False => Outcome::True,
            Outcome::Pending => Outcome::Pending,
        }
    }
}

/// Parsed dependency expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `job == status`, `job IN (…)`, and their negations.
    Compare {
        job: String,
        negated: bool,
        statuses: Vec<JobStatus>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    In,
    NotIn,
    Eq,
    Neq,
    LParen,
    RParen,
    Comma,
}

fn lex(raw: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Neq);
                i += 2;
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word = &raw[start..i];
                tokens.push(match word {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "IN" => Token::In,
                    "NOT_IN" => Token::NotIn,
                    _ => Token::Ident(word.to_string()),
                });
            }
            other => return Err(ExprError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
}

fn parse_status(word: &str) -> Result<JobStatus, ExprError> {
    match word {
        "SCHEDULED" => Ok(JobStatus::Scheduled),
        "PENDING" => Ok(JobStatus::Pending),
        "RUNNING" => Ok(JobStatus::Running),
        "COMPLETED" => Ok(JobStatus::Completed),
        "FAILED" => Ok(JobStatus::Failed),
        "CANCELED" => Ok(JobStatus::Canceled),
        "STOPPED" => Ok(JobStatus::Stopped),
        other => Err(ExprError::UnknownStatus(other.to_string())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ExprError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.next();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(job)) => self.parse_comparison(job),
            Some(token) => Err(ExprError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_comparison(&mut self, job: String) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Eq) | Some(Token::Neq) => {
                let negated = matches!(self.next(), Some(Token::Neq));
                match self.next() {
                    Some(Token::Ident(word)) => Ok(Expr::Compare {
                        job,
                        negated,
                        statuses: vec![parse_status(&word)?],
                    }),
                    Some(token) => Err(ExprError::UnexpectedToken(format!("{:?}", token))),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(Token::In) | Some(Token::NotIn) => {
                let negated = matches!(self.next(), Some(Token::NotIn));
                self.expect(Token::LParen)?;
                let mut statuses = Vec::new();
                loop {
                    match self.next() {
                        Some(Token::Ident(word)) => statuses.push(parse_status(&word)?),
                        Some(token) => {
                            return Err(ExprError::UnexpectedToken(format!("{:?}", token)))
                        }
                        None => return Err(ExprError::UnexpectedEnd),
                    }
                    match self.next() {
                        Some(Token::Comma) => continue,
                        Some(Token::RParen) => break,
                        Some(token) => {
                            return Err(ExprError::UnexpectedToken(format!("{:?}", token)))
                        }
                        None => return Err(ExprError::UnexpectedEnd),
                    }
                }
                Ok(Expr::Compare {
                    job,
                    negated,
                    statuses,
                })
            }
            // Bare job name: shorthand for successful completion.
            _ => Ok(Expr::Compare {
                job,
                negated: false,
                statuses: vec![JobStatus::Completed],
            }),
        }
    }
}

impl Expr {
    pub fn parse(raw: &str) -> Result<Self, ExprError> {
        let tokens = lex(raw)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(ExprError::TrailingInput(format!("{:?}", token)));
        }
        Ok(expr)
    }

    /// Evaluate against current job statuses.
    ///
    /// `lookup` returns a job's current status, or `None` for jobs that
    /// have not started (treated as `PENDING`). A positive comparison is
    /// `True` the moment the status matches; it only becomes `False` once
    /// the job is terminal and cannot match anymore. Negated comparisons
    /// stay `Pending` until the job settles, so a gate like
    /// `a NOT_IN (FAILED)` cannot fire while `a` might still fail.
    pub fn evaluate(&self, lookup: &dyn Fn(&str) -> Option<JobStatus>) -> Outcome {
        match self {
            Expr::Compare {
                job,
                negated,
                statuses,
            } => {
                let current = lookup(job).unwrap_or(JobStatus::Pending);
                let matches = statuses.contains(&current);
                if *negated {
                    if current.is_terminal() {
                        if matches {
                            Outcome::False
                        } else {
                            Outcome::True
                        }
                    } else {
                        Outcome::Pending
                    }
                } else if matches {
                    Outcome::True
                } else if current.is_terminal() {
                    Outcome::False
                } else {
                    Outcome::Pending
                }
            }
            Expr::And(left, right) => left.evaluate(lookup).and(right.evaluate(lookup)),
            Expr::Or(left, right) => left.evaluate(lookup).or(right.evaluate(lookup)),
            Expr::Not(inner) => inner.evaluate(lookup).not(),
        }
    }

    /// Job names referenced anywhere in the expression, in first-seen order.
    pub fn referenced_jobs(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_jobs(&mut names);
        names
    }

    fn collect_jobs(&self, names: &mut Vec<String>) {
        match self {
            Expr::Compare { job, .. } => {
                if !names.contains(job) {
                    names.push(job.clone());
                }
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_jobs(names);
                right.collect_jobs(names);
            }
            Expr::Not(inner) => inner.collect_jobs(names),
        }
    }
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
