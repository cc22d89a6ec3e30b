use anyhow::Result;
use serde_json::Value;

use crate::register_toolbelt;

const ALLOWED: &str = "0123456789+-*/.() ";

/// Deepest nesting of parentheses and unary signs accepted.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("Invalid characters in expression")]
    InvalidCharacters,
    #[error("expression is empty")]
    Empty,
    #[error("division by zero")]
    DivisionByZero,
    #[error("unexpected '{0}' at position {1}")]
    Unexpected(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("malformed number '{0}'")]
    BadNumber(String),
    #[error("expression is nested more than 64 levels deep")]
    TooDeep,
    #[error("result is not a finite number")]
    OutOfRange,
}

#[derive(Debug, Default)]
pub struct Calculator;

register_toolbelt! {
    Calculator {
        name: "Calculator",
        description: "Arithmetic on plain numeric expressions",
        tools: {
            "calculate" => calculate {
                description: "Safely evaluate a mathematical expression using + - * / ** (power) // (floor division) and parentheses, e.g. '15 * 7 + 23'. Returns only the result.",
                params: ["expression": "string" => "Arithmetic expression to evaluate"]
            }
        }
    }
}

impl Calculator {
    async fn calculate(&self, args: &Value) -> Result<String> {
        let expression = args["expression"].as_str().unwrap_or("");
        if expression.trim().is_empty() {
            return Ok("Error: expression cannot be empty".to_string());
        }

        Ok(match evaluate(expression) {
            Ok(value) => format_number(value),
            Err(CalcError::InvalidCharacters) => CalcError::InvalidCharacters.to_string(),
            Err(e) => format!("Calculation error: {}", e),
        })
    }
}

/// Evaluates `+ - * / // **` with unary signs, parentheses and decimals.
///
/// `**` binds tighter than unary minus on its left and is right-associative,
/// so `-2 ** 2` is `-4` and `2 ** 3 ** 2` is `512`.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    if !expression
        .chars()
        .all(|c| ALLOWED.contains(c) || c.is_whitespace())
    {
        return Err(CalcError::InvalidCharacters);
    }

    let tokens: Vec<(usize, char)> = expression
        .char_indices()
        .filter(|(_, c)| !c.is_whitespace())
        .collect();
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some((at, c)) = parser.peek() {
        return Err(CalcError::Unexpected(c, at));
    }
    if !value.is_finite() {
        return Err(CalcError::OutOfRange);
    }
    Ok(value)
}

/// Integral results print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

struct Parser {
    tokens: Vec<(usize, char)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, char)> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<(usize, char)> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    /// True when the next two characters are `op op` with nothing between them.
    fn doubled(&self, op: char) -> bool {
        match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
            (Some(&(a, first)), Some(&(b, second))) => {
                first == op && second == op && b == a + 1
            }
            _ => false,
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, CalcError>,
    ) -> Result<T, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some((_, op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            let floor = self.doubled('/');
            match self.peek() {
                Some((_, '*')) if !self.doubled('*') => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some((_, '/')) => {
                    self.pos += if floor { 2 } else { 1 };
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value = if floor { (value / rhs).floor() } else { value / rhs };
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some((_, '-')) => {
                self.pos += 1;
                self.nested(|p| p.unary()).map(|v| -v)
            }
            Some((_, '+')) => {
                self.pos += 1;
                self.nested(|p| p.unary())
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if !self.doubled('*') {
            return Ok(base);
        }
        self.pos += 2;
        let exponent = self.nested(|p| p.unary())?;
        if base == 0.0 && exponent < 0.0 {
            return Err(CalcError::DivisionByZero);
        }
        Ok(base.powf(exponent))
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some((_, '(')) => {
                let value = self.nested(|p| p.expression())?;
                match self.next() {
                    Some((_, ')')) => Ok(value),
                    Some((at, c)) => Err(CalcError::Unexpected(c, at)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some((_, c)) if c.is_ascii_digit() || c == '.' => {
                self.pos -= 1;
                self.number()
            }
            Some((at, c)) => Err(CalcError::Unexpected(c, at)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let mut literal = String::new();
        let mut last_index = None;

        while let Some((at, c)) = self.peek() {
            let adjacent = last_index.is_none_or(|prev| at == prev + 1);
            if !(c.is_ascii_digit() || c == '.') || !adjacent {
                break;
            }
            literal.push(c);
            last_index = Some(at);
            self.pos += 1;
        }

        literal
            .parse::<f64>()
            .map_err(|_| CalcError::BadNumber(literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolBelt;
    use serde_json::json;

    #[test]
    fn respects_precedence_and_parentheses() {
        assert_eq!(evaluate("15 * 7 + 23").unwrap(), 128.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("-(2 + 3) * 2").unwrap(), -10.0);
        assert_eq!(evaluate("7 / 2").unwrap(), 3.5);
    }

    #[test]
    fn power_and_floor_division() {
        assert_eq!(evaluate("2 ** 3").unwrap(), 8.0);
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ** 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 ** -1").unwrap(), 0.5);
        assert_eq!(evaluate("7 // 2").unwrap(), 3.0);
        assert_eq!(evaluate("-7 // 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 * 3 ** 2 // 4").unwrap(), 4.0);
        assert_eq!(evaluate("7 // 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("0 ** -1"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("2 * * 3"), Err(CalcError::Unexpected('*', 4)));
        assert_eq!(evaluate("10 ** 400"), Err(CalcError::OutOfRange));
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let parens = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        assert_eq!(evaluate(&parens), Err(CalcError::TooDeep));

        let signs = format!("{}1", "-".repeat(5_000));
        assert_eq!(evaluate(&signs), Err(CalcError::TooDeep));

        let ok = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(evaluate(&ok).unwrap(), 1.0);
    }

    #[test]
    fn rejects_foreign_characters() {
        assert_eq!(evaluate("__import__('os')"), Err(CalcError::InvalidCharacters));
        assert_eq!(evaluate("2 ** x"), Err(CalcError::InvalidCharacters));
    }

    #[test]
    fn reports_malformed_input() {
        assert_eq!(evaluate("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("(1 + 2"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("1 2"), Err(CalcError::Unexpected('2', 2)));
        assert_eq!(evaluate("1.2.3"), Err(CalcError::BadNumber("1.2.3".to_string())));
        assert_eq!(evaluate("   "), Err(CalcError::Empty));
    }

    #[test]
    fn formats_integral_results_without_fraction() {
        assert_eq!(format_number(128.0), "128");
        assert_eq!(format_number(-10.0), "-10");
        assert_eq!(format_number(3.5), "3.5");
    }

    #[tokio::test]
    async fn tool_returns_observation_strings() {
        let calc = Calculator;

        let result = calc
            .use_tool("calculate", &json!({ "expression": "15 * 7 + 23" }))
            .await
            .unwrap();
        assert_eq!(result, "128");

        let result = calc
            .use_tool("calculate", &json!({ "expression": "rm -rf /" }))
            .await
            .unwrap();
        assert_eq!(result, "Invalid characters in expression");

        let result = calc
            .use_tool("calculate", &json!({ "expression": "4 / 0" }))
            .await
            .unwrap();
        assert_eq!(result, "Calculation error: division by zero");

        let result = calc
            .use_tool("calculate", &json!({ "expression": "(".repeat(1_000) }))
            .await
            .unwrap();
        assert_eq!(result, "Calculation error: expression is nested more than 64 levels deep");
    }
}
