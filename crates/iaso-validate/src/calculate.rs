//! Calculated-column evaluation.
//!
//! Forms may declare `calculate` questions whose value derives from sibling
//! fields, e.g. `round(${consumed} div ${received} * 100, 0)`. When the
//! input file does not carry such a column, the importer computes it so the
//! generated document is complete. Supported: `${field}` references, numeric
//! literals, `+ - * /`, the XLSForm `div` operator, parentheses, and the
//! `round`, `abs` and `coalesce` functions. Anything else fills the column
//! with 0 and logs.

use tracing::warn;

use iaso_model::{CellValue, FormVersion, QuestionType, Row, RowSet};

/// Parsed calculation expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    Field(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Round(Box<Expr>),
    Abs(Box<Expr>),
    Coalesce(Vec<Expr>),
}

impl Expr {
    pub fn parse(input: &str) -> Option<Expr> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        parser.at_end().then_some(expr)
    }

    /// Evaluate against a row; `None` means null (missing operand).
    pub fn eval(&self, row: &Row) -> Option<f64> {
        match self {
            Expr::Number(value) => Some(*value),
            Expr::Field(name) => row.get(name).and_then(CellValue::as_float),
            Expr::Neg(inner) => inner.eval(row).map(|value| -value),
            Expr::Add(lhs, rhs) => Some(lhs.eval(row)? + rhs.eval(row)?),
            Expr::Sub(lhs, rhs) => Some(lhs.eval(row)? - rhs.eval(row)?),
            Expr::Mul(lhs, rhs) => Some(lhs.eval(row)? * rhs.eval(row)?),
            Expr::Div(lhs, rhs) => {
                let denominator = rhs.eval(row)?;
                if denominator == 0.0 {
                    return None;
                }
                Some(lhs.eval(row)? / denominator)
            }
            Expr::Round(inner) => inner.eval(row).map(f64::round),
            Expr::Abs(inner) => inner.eval(row).map(f64::abs),
            Expr::Coalesce(options) => options.iter().find_map(|option| option.eval(row)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Field(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            ch if ch.is_whitespace() => {}
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => tokens.push(Token::Star),
            '/' => tokens.push(Token::Slash),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '$' => {
                // ${field}
                if chars.next().map(|(_, c)| c) != Some('{') {
                    return None;
                }
                let mut name = String::new();
                loop {
                    let (_, c) = chars.next()?;
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                tokens.push(Token::Field(name));
            }
            ch if ch.is_ascii_digit() || ch == '.' => {
                let start = idx;
                let mut end = idx + ch.len_utf8();
                while let Some((next_idx, next)) = chars.peek().copied() {
                    if next.is_ascii_digit() || next == '.' {
                        end = next_idx + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(input[start..end].parse().ok()?));
            }
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let start = idx;
                let mut end = idx + ch.len_utf8();
                while let Some((next_idx, next)) = chars.peek().copied() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = next_idx + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..end].to_string()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn expect(&mut self, token: &Token) -> Option<()> {
        (self.bump().as_ref() == Some(token)).then_some(())
    }

    fn expr(&mut self) -> Option<Expr> {
        let mut lhs = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.bump();
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Token::Minus => {
                    self.bump();
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn term(&mut self) -> Option<Expr> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.unary()?));
                }
                Some(Token::Slash) => {
                    self.bump();
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.unary()?));
                }
                Some(Token::Ident(name)) if name == "div" => {
                    self.bump();
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.unary()?));
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<Expr> {
        if self.peek() == Some(&Token::Minus) {
            self.bump();
            return Some(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Option<Expr> {
        match self.bump()? {
            Token::Number(value) => Some(Expr::Number(value)),
            Token::Field(name) => Some(Expr::Field(name)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Some(inner)
            }
            Token::Ident(name) => {
                self.expect(&Token::LParen)?;
                let args = self.args()?;
                match (name.as_str(), args.len()) {
                    // round(x) and round(x, 0) both round to whole numbers.
                    ("round", 1 | 2) => Some(Expr::Round(Box::new(args.into_iter().next()?))),
                    ("abs", 1) => Some(Expr::Abs(Box::new(args.into_iter().next()?))),
                    ("coalesce", n) if n >= 1 => Some(Expr::Coalesce(args)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn args(&mut self) -> Option<Vec<Expr>> {
        let mut args = vec![self.expr()?];
        loop {
            match self.peek() {
                Some(Token::Comma) => {
                    self.bump();
                    args.push(self.expr()?);
                }
                Some(Token::RParen) => {
                    self.bump();
                    return Some(args);
                }
                _ => return None,
            }
        }
    }
}

/// Fill in calculate-question columns absent from the input, producing a new
/// table. Columns already present in the file are left untouched.
pub fn fill_calculated_columns(rows: &RowSet, version: &FormVersion) -> RowSet {
    let mut out = rows.clone();
    for question in &version.questions {
        if question.qtype != QuestionType::Calculate || out.has_column(&question.name) {
            continue;
        }
        let Some(calculation) = question.calculation.as_deref() else {
            continue;
        };
        let filled: Vec<Row> = match Expr::parse(calculation) {
            Some(expr) => out
                .rows
                .iter()
                .map(|row| {
                    let value = expr.eval(row).map_or(CellValue::Null, number_cell);
                    row.with_cell(&question.name, value)
                })
                .collect(),
            None => {
                warn!(
                    column = %question.name,
                    calculation = %calculation,
                    "unsupported calculation, filling column with 0"
                );
                out.rows
                    .iter()
                    .map(|row| row.with_cell(&question.name, CellValue::Integer(0)))
                    .collect()
            }
        };
        out.rows = filled;
        out.columns.push(question.name.clone());
    }
    out
}

fn number_cell(value: f64) -> CellValue {
    if value.fract() == 0.0 {
        CellValue::Integer(value as i64)
    } else {
        CellValue::Float(value)
    }
}
