//! Spread formula parser.
//!
//! Recursive descent over the grammar
//!
//! ```text
//! expr    := term (('+'|'-') term)*
//! term    := unary (('*'|'/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | SYMBOL | CALL | '(' expr ')'
//! CALL    := ('SMA'|'EMA') '(' expr ',' INTEGER ')'
//! ```
//!
//! Errors carry the byte offset of the offending token.

use crate::domain::error::ParseError;
use crate::domain::formula::{BinaryOp, Expr, IndicatorKind};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn describe_next(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn parse_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        if start == self.pos {
            return Err(ParseError {
                message: format!("expected integer, found {}", self.describe_next()),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", num_str),
            position: start,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        if self.peek() == Some('-') {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.parse_number().map(Expr::Number),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.parse_name(),
            _ => Err(ParseError {
                message: format!(
                    "expected number, symbol or '(', found {}",
                    self.describe_next()
                ),
                position: self.pos,
            }),
        }
    }

    fn parse_name(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        let name = self.parse_identifier();

        // Only an identifier directly followed by '(' is a call.
        if self.peek() != Some('(') {
            return Ok(Expr::Symbol(name.to_string()));
        }

        let kind = match name {
            "SMA" => IndicatorKind::Sma,
            "EMA" => IndicatorKind::Ema,
            other => {
                return Err(ParseError {
                    message: format!("unknown function '{}', expected SMA or EMA", other),
                    position: start,
                });
            }
        };

        self.expect_char('(')?;
        let arg = self.parse_expr()?;
        self.expect_char(',')?;
        self.skip_whitespace();
        let period_pos = self.pos;
        let period = self.parse_integer()?;
        if period == 0 {
            return Err(ParseError {
                message: format!("{} period must be at least 1", kind),
                position: period_pos,
            });
        }
        self.expect_char(')')?;

        Ok(Expr::Indicator {
            kind,
            arg: Box::new(arg),
            period,
        })
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(ParseError {
                message: "empty formula".to_string(),
                position: self.pos,
            });
        }
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        if self.peek().is_some() {
            return Err(ParseError {
                message: format!("unexpected {} after expression", self.describe_next()),
                position: self.pos,
            });
        }
        Ok(expr)
    }
}

/// Parse a formula string into an expression tree.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
