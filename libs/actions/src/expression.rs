//! Boolean conditions of `iterate`, `repeat-until-true` and `conditional`
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or         := and ("or" and)*
//! and        := comparison ("and" comparison)*
//! comparison := operand (op operand)?
//! op         := lt | lt= | gt | gt= | < | <= | > | >= | =
//! operand    := integer | true | false | "(" or ")"
//! ```

use crate::ActionError;
use regex::Regex;
use types::TestContext;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Bool(bool),
    Op(Comparison),
    And,
    Or,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Int(i64),
    Bool(bool),
}

/// Evaluate a fully resolved expression
pub fn evaluate(expression: &str) -> Result<bool, ActionError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        position: 0,
    };

    let value = parser.or()?;
    if parser.position != parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    match value {
        Operand::Bool(result) => Ok(result),
        Operand::Int(_) => Err(parser.error("expression does not evaluate to a boolean")),
    }
}

/// Resolve `${var}` references and the iteration index, then evaluate
pub fn evaluate_condition(
    condition: &str,
    context: &TestContext,
    index: Option<(&str, i64)>,
) -> Result<bool, ActionError> {
    let mut resolved = context.replace_dynamic_content(condition)?;

    if let Some((index_name, value)) = index {
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(index_name)))
            .map_err(|err| ActionError::configuration(format!("Invalid index name: {}", err)))?;
        resolved = pattern
            .replace_all(&resolved, value.to_string().as_str())
            .into_owned();
    }

    evaluate(&resolved)
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ActionError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '<' | '>' => {
                let or_equal = chars.get(i + 1) == Some(&'=');
                tokens.push(Token::Op(match (c, or_equal) {
                    ('<', false) => Comparison::Lt,
                    ('<', true) => Comparison::Le,
                    ('>', false) => Comparison::Gt,
                    _ => Comparison::Ge,
                }));
                i += if or_equal { 2 } else { 1 };
            }
            '=' => {
                tokens.push(Token::Op(Comparison::Eq));
                i += 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal.parse::<i64>().map_err(|err| {
                    malformed(expression, format!("invalid integer '{}': {}", literal, err))
                })?;
                tokens.push(Token::Int(value));
            }
            c if c.is_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
                let or_equal = chars.get(i) == Some(&'=');
                let token = match word.as_str() {
                    "lt" | "gt" if or_equal => {
                        i += 1;
                        Token::Op(if word == "lt" {
                            Comparison::Le
                        } else {
                            Comparison::Ge
                        })
                    }
                    "lt" => Token::Op(Comparison::Lt),
                    "gt" => Token::Op(Comparison::Gt),
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => {
                        return Err(malformed(expression, format!("unknown token '{}'", word)));
                    }
                };
                tokens.push(token);
            }
            other => {
                return Err(malformed(
                    expression,
                    format!("unexpected character '{}'", other),
                ));
            }
        }
    }

    Ok(tokens)
}

fn malformed(expression: &str, reason: String) -> ActionError {
    ActionError::runtime(format!(
        "Failed to evaluate boolean expression '{}': {}",
        expression, reason
    ))
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> ActionError {
        malformed(self.expression, reason.to_string())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn or(&mut self) -> Result<Operand, ActionError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.position += 1;
            let right = self.and()?;
            left = Operand::Bool(self.as_bool(left)? | self.as_bool(right)?);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Operand, ActionError> {
        let mut left = self.comparison()?;
        while self.peek() == Some(&Token::And) {
            self.position += 1;
            let right = self.comparison()?;
            left = Operand::Bool(self.as_bool(left)? & self.as_bool(right)?);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Operand, ActionError> {
        let left = self.operand()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => return Ok(left),
        };
        self.position += 1;
        let right = self.operand()?;

        let result = match (left, right) {
            (Operand::Int(l), Operand::Int(r)) => match op {
                Comparison::Lt => l < r,
                Comparison::Le => l <= r,
                Comparison::Gt => l > r,
                Comparison::Ge => l >= r,
                Comparison::Eq => l == r,
            },
            (Operand::Bool(l), Operand::Bool(r)) if op == Comparison::Eq => l == r,
            _ => return Err(self.error("incompatible operands")),
        };
        Ok(Operand::Bool(result))
    }

    fn operand(&mut self) -> Result<Operand, ActionError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error("unexpected end of expression"))?;
        self.position += 1;

        match token {
            Token::Int(value) => Ok(Operand::Int(value)),
            Token::Bool(value) => Ok(Operand::Bool(value)),
            Token::Open => {
                let inner = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("missing closing parenthesis"));
                }
                self.position += 1;
                Ok(inner)
            }
            _ => Err(self.error("expected operand")),
        }
    }

    fn as_bool(&self, operand: Operand) -> Result<bool, ActionError> {
        match operand {
            Operand::Bool(value) => Ok(value),
            Operand::Int(_) => Err(self.error("expected boolean operand")),
        }
    }
}
