//! Restricted expression language for tool bodies supplied as text.
//!
//! A script is a single expression over the call's arguments. There are no
//! statements, imports, attribute access or assignment; only the functions in
//! [`Function`] can be called. Compilation rejects anything else, and
//! evaluation is bounded by [`SandboxLimits`].
//!
//! ```
//! use mcp_toolkit::sandbox::Script;
//!
//! let script = Script::compile("'The weather in ' + city + ' is sunny'").unwrap();
//! let args = serde_json::json!({ "city": "Paris" });
//! let value = script.evaluate(args.as_object().unwrap()).unwrap();
//! assert_eq!(value, "The weather in Paris is sunny");
//! ```

mod eval;
mod lexer;
mod parser;

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use eval::Evaluator;
use parser::{Expr, Parser};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SandboxError {
    #[error("script is {len} characters, limit is {max}")]
    SourceTooLong { len: usize, max: usize },
    #[error("character {0:?} is not allowed")]
    ForbiddenCharacter(char),
    #[error("identifier '{0}' is not allowed")]
    ForbiddenIdentifier(String),
    #[error("{0} is not allowed")]
    Forbidden(String),
    #[error("unexpected character {ch:?} at {position}")]
    UnexpectedChar { ch: char, position: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of script")]
    UnexpectedEnd,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{function} expects {expected} argument(s), got {got}")]
    WrongArgCount {
        function: String,
        expected: String,
        got: usize,
    },
    #[error("nesting deeper than {max}")]
    TooDeep { max: usize },
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("evaluation exceeded {steps} steps")]
    BudgetExhausted { steps: usize },
    #[error("string result longer than {max} bytes")]
    OutputTooLarge { max: usize },
}

/// Bounds applied at compile and evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub max_source_len: usize,
    pub max_depth: usize,
    pub max_steps: usize,
    pub max_string_len: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_source_len: 4096,
            max_depth: 64,
            max_steps: 10_000,
            max_string_len: 64 * 1024,
        }
    }
}

/// Functions a script may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Function {
    Len,
    Upper,
    Lower,
    Trim,
    Str,
    Num,
    Round,
    Abs,
    Min,
    Max,
    Contains,
    Concat,
    If,
    /// `default(value, fallback)`: fallback when value is null or absent.
    #[strum(serialize = "default")]
    Coalesce,
}

impl Function {
    fn check_arity(self, got: usize) -> Result<(), SandboxError> {
        let (ok, expected) = match self {
            Self::Len | Self::Upper | Self::Lower | Self::Trim | Self::Str | Self::Num | Self::Abs => {
                (got == 1, "1")
            }
            Self::Round => ((1..=2).contains(&got), "1 or 2"),
            Self::Min | Self::Max => (got >= 1, "at least 1"),
            Self::Contains | Self::Coalesce => (got == 2, "2"),
            Self::If => (got == 3, "3"),
            Self::Concat => (true, "any number of"),
        };
        if ok {
            Ok(())
        } else {
            Err(SandboxError::WrongArgCount {
                function: self.to_string(),
                expected: expected.into(),
                got,
            })
        }
    }
}

/// A compiled script, ready to run against call arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    source: String,
    expr: Expr,
    limits: SandboxLimits,
}

impl Script {
    pub fn compile(source: &str) -> Result<Self, SandboxError> {
        Self::compile_with(source, SandboxLimits::default())
    }

    pub fn compile_with(source: &str, limits: SandboxLimits) -> Result<Self, SandboxError> {
        let len = source.chars().count();
        if len > limits.max_source_len {
            return Err(SandboxError::SourceTooLong {
                len,
                max: limits.max_source_len,
            });
        }
        let tokens = lexer::tokenize(source)?;
        let expr = Parser::new(tokens, limits.max_depth).parse()?;
        Ok(Self {
            source: source.to_string(),
            expr,
            limits,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Argument names the script reads.
    pub fn variables(&self) -> BTreeSet<String> {
        self.expr.variables()
    }

    /// Argument names the script fails without; the rest only feed `default()`.
    pub fn required_variables(&self) -> BTreeSet<String> {
        self.expr.required_variables()
    }

    pub fn evaluate(&self, args: &Map<String, Value>) -> Result<Value, SandboxError> {
        Evaluator::new(args, &self.limits).eval(&self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(source: &str, args: Value) -> Result<Value, SandboxError> {
        let args = args.as_object().cloned().unwrap_or_default();
        Script::compile(source)?.evaluate(&args)
    }

    #[test]
    fn weather_template_renders_from_arguments() {
        let value = run(
            "'The weather in ' + city + ' is sunny, temperature ' + temp + 'C'",
            json!({ "city": "Paris", "temp": 25 }),
        )
        .expect("script should run");
        assert_eq!(value, json!("The weather in Paris is sunny, temperature 25C"));
    }

    #[test]
    fn arithmetic_keeps_integers_integral() {
        assert_eq!(run("(a + b) * 2", json!({ "a": 1, "b": 2 })), Ok(json!(6)));
        assert_eq!(run("7 / 2", json!({})), Ok(json!(3.5)));
        assert_eq!(run("round(2.346, 2)", json!({})), Ok(json!(2.35)));
        assert_eq!(run("1 / 0", json!({})), Err(SandboxError::DivisionByZero));
        assert_eq!(run("7 % 0", json!({})), Err(SandboxError::DivisionByZero));
        assert!(matches!(
            run("label % 2", json!({ "label": "x" })),
            Err(SandboxError::TypeMismatch(message)) if message.starts_with("%:")
        ));
    }

    #[test]
    fn functions_and_logic() {
        assert_eq!(run("upper(name)", json!({ "name": "ada" })), Ok(json!("ADA")));
        assert_eq!(run("len(items)", json!({ "items": [1, 2, 3] })), Ok(json!(3)));
        assert_eq!(run("if(n > 10, 'big', 'small')", json!({ "n": 3 })), Ok(json!("small")));
        assert_eq!(run("default(missing, 'n/a')", json!({})), Ok(json!("n/a")));
        assert_eq!(run("contains(tags, 'rust') and not false", json!({ "tags": ["rust"] })), Ok(json!(true)));
        assert_eq!(run("max(1, x, 3)", json!({ "x": 9 })), Ok(json!(9)));
    }

    #[test]
    fn missing_variable_is_reported() {
        assert_eq!(run("city", json!({})), Err(SandboxError::UnknownVariable("city".into())));
    }

    #[test]
    fn variables_are_reported_for_schema_derivation() {
        let script = Script::compile("if(args.units == 'f', temp * 9 / 5 + 32, temp)")
            .expect("script should compile");
        assert_eq!(
            script.variables().into_iter().collect::<Vec<_>>(),
            vec!["temp".to_string(), "units".to_string()]
        );
    }

    #[test]
    fn limits_bound_source_steps_and_output() {
        let limits = SandboxLimits {
            max_source_len: 8,
            ..SandboxLimits::default()
        };
        assert!(matches!(
            Script::compile_with("1 + 2 + 3 + 4", limits),
            Err(SandboxError::SourceTooLong { len: 13, max: 8 })
        ));

        let limits = SandboxLimits {
            max_steps: 5,
            ..SandboxLimits::default()
        };
        let script = Script::compile_with("1 + 1 + 1 + 1 + 1", limits).expect("script should compile");
        assert_eq!(script.evaluate(&Map::new()), Err(SandboxError::BudgetExhausted { steps: 5 }));

        let limits = SandboxLimits {
            max_string_len: 4,
            ..SandboxLimits::default()
        };
        let script = Script::compile_with("concat(s, s)", limits).expect("script should compile");
        let args = json!({ "s": "abc" });
        assert_eq!(
            script.evaluate(args.as_object().expect("object")),
            Err(SandboxError::OutputTooLarge { max: 4 })
        );
    }
}
