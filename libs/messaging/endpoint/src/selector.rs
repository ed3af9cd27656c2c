//! Header selectors of the form `name = 'value' AND other = 'value'`

use crate::EndpointError;
use std::fmt;
use types::Message;

/// Conjunction of header equality conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSelector {
    conditions: Vec<(String, String)>,
}

impl MessageSelector {
    /// Parse a selector expression; an empty expression matches every message
    pub fn parse(expression: &str) -> Result<Self, EndpointError> {
        let mut parser = Parser {
            input: expression,
            position: 0,
        };
        let mut conditions = Vec::new();

        parser.skip_whitespace();
        if parser.at_end() {
            return Ok(Self { conditions });
        }

        loop {
            let name = parser.identifier()?;
            parser.expect('=')?;
            let value = parser.value()?;
            conditions.push((name, value));

            parser.skip_whitespace();
            if parser.at_end() {
                break;
            }
            parser.keyword("AND")?;
        }

        Ok(Self { conditions })
    }

    /// Selector matching a single header value
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            conditions: vec![(name.into(), value.into())],
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.conditions
            .iter()
            .all(|(name, value)| message.header_str(name).as_deref() == Some(value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }
}

impl fmt::Display for MessageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .conditions
            .iter()
            .map(|(name, value)| format!("{} = '{}'", name, value))
            .collect();
        f.write_str(&rendered.join(" AND "))
    }
}

struct Parser<'a> {
    input: &'a str,
    position: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.input[self.position..]
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn error(&self, reason: impl Into<String>) -> EndpointError {
        EndpointError::InvalidSelector {
            selector: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.position = self.input.len() - trimmed.len();
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> &str {
        let start = self.position;
        let len: usize = self
            .rest()
            .chars()
            .take_while(|c| predicate(*c))
            .map(char::len_utf8)
            .sum();
        self.position += len;
        &self.input[start..self.position]
    }

    fn identifier(&mut self) -> Result<String, EndpointError> {
        self.skip_whitespace();
        let name = self.take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if name.is_empty() {
            return Err(self.error(format!("expected header name at position {}", self.position)));
        }
        Ok(name.to_string())
    }

    fn expect(&mut self, expected: char) -> Result<(), EndpointError> {
        self.skip_whitespace();
        if self.rest().starts_with(expected) {
            self.position += expected.len_utf8();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}' at position {}", expected, self.position)))
        }
    }

    fn value(&mut self) -> Result<String, EndpointError> {
        self.skip_whitespace();
        match self.rest().chars().next() {
            Some(quote @ ('\'' | '"')) => {
                self.position += 1;
                let value = self.take_while(|c| c != quote).to_string();
                if self.at_end() {
                    return Err(self.error("unterminated quoted value"));
                }
                self.position += 1;
                Ok(value)
            }
            Some(_) => {
                let value = self.take_while(|c| !c.is_whitespace());
                Ok(value.to_string())
            }
            None => Err(self.error("missing value")),
        }
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), EndpointError> {
        let rest = self.rest();
        let matched = rest
            .get(..keyword.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(keyword));
        let bounded = rest[keyword.len().min(rest.len())..]
            .chars()
            .next()
            .map_or(false, char::is_whitespace);

        if matched && bounded {
            self.position += keyword.len();
            Ok(())
        } else {
            Err(self.error(format!("expected {} at position {}", keyword, self.position)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_match() {
        let selector = MessageSelector::parse("operation = 'foo' and id = \"123\"").unwrap();
        assert_eq!(selector.conditions().len(), 2);

        let matching = Message::new("")
            .with_header("operation", "foo")
            .with_header("id", 123);
        let other = Message::new("").with_header("operation", "foo");

        assert!(selector.matches(&matching));
        assert!(!selector.matches(&other));
        assert_eq!(selector.to_string(), "operation = 'foo' AND id = '123'");
    }

    #[test]
    fn test_empty_selector_matches_all() {
        let selector = MessageSelector::parse("   ").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&Message::new("anything")));
    }

    #[test]
    fn test_unquoted_value_and_reserved_header() {
        let message = Message::new("");
        let expression = format!("trellis_message_id = {}", message.id());
        let selector = MessageSelector::parse(&expression).unwrap();

        assert!(selector.matches(&message));
        assert!(!selector.matches(&Message::new("")));
    }

    #[test]
    fn test_invalid_selectors() {
        for expression in ["= 'x'", "a 'x'", "a = 'x", "a = 'x' OR b = 'y'", "a = 'x' ANDb = 'y'"] {
            assert!(
                matches!(
                    MessageSelector::parse(expression),
                    Err(EndpointError::InvalidSelector { .. })
                ),
                "{} should be rejected",
                expression
            );
        }
    }
}
