//! Tree-walking evaluator with a step budget and output caps.

use serde_json::{Map, Value};

use super::parser::{BinaryOp, Expr};
use super::{Function, SandboxError, SandboxLimits};

pub(super) struct Evaluator<'a> {
    args: &'a Map<String, Value>,
    limits: &'a SandboxLimits,
    steps: usize,
}

impl<'a> Evaluator<'a> {
    pub(super) fn new(args: &'a Map<String, Value>, limits: &'a SandboxLimits) -> Self {
        Self {
            args,
            limits,
            steps: 0,
        }
    }

    pub(super) fn eval(&mut self, expr: &Expr) -> Result<Value, SandboxError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(SandboxError::BudgetExhausted {
                steps: self.limits.max_steps,
            });
        }

        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => self
                .args
                .get(name)
                .cloned()
                .ok_or_else(|| SandboxError::UnknownVariable(name.clone())),
            Expr::Neg(inner) => {
                let value = self.eval(inner)?;
                Ok(number(-as_number(&value, "unary minus")?))
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?))),
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if !truthy(&left) {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if truthy(&left) {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right)
            }
            Expr::Call { function, args } => self.call(*function, args),
        }
    }

    fn binary(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value, SandboxError> {
        match op {
            BinaryOp::Add if left.is_string() || right.is_string() => {
                self.string(format!("{}{}", display(&left), display(&right)))
            }
            BinaryOp::Add => Ok(number(as_number(&left, "+")? + as_number(&right, "+")?)),
            BinaryOp::Sub => Ok(number(as_number(&left, "-")? - as_number(&right, "-")?)),
            BinaryOp::Mul => Ok(number(as_number(&left, "*")? * as_number(&right, "*")?)),
            BinaryOp::Div | BinaryOp::Rem => {
                let symbol = if op == BinaryOp::Div { "/" } else { "%" };
                let l = as_number(&left, symbol)?;
                let r = as_number(&right, symbol)?;
                if r == 0.0 {
                    return Err(SandboxError::DivisionByZero);
                }
                Ok(number(if op == BinaryOp::Div { l / r } else { l % r }))
            }
            BinaryOp::Eq => Ok(Value::Bool(loosely_equal(&left, &right))),
            BinaryOp::Ne => Ok(Value::Bool(!loosely_equal(&left, &right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::String(l), Value::String(r)) => l.partial_cmp(r),
                    _ => as_number(&left, "comparison")?.partial_cmp(&as_number(&right, "comparison")?),
                };
                let Some(ordering) = ordering else {
                    return Ok(Value::Bool(false));
                };
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
        }
    }

    fn call(&mut self, function: Function, args: &[Expr]) -> Result<Value, SandboxError> {
        // `if` and `default` only evaluate the branch they return.
        match function {
            Function::If => {
                let condition = self.eval(&args[0])?;
                return self.eval(if truthy(&condition) { &args[1] } else { &args[2] });
            }
            Function::Coalesce => {
                let value = self.eval(&args[0]);
                return match value {
                    Ok(Value::Null) | Err(SandboxError::UnknownVariable(_)) => self.eval(&args[1]),
                    other => other,
                };
            }
            _ => {}
        }

        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match function {
            Function::Len => {
                let len = match &values[0] {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    other => return Err(type_mismatch("len", other)),
                };
                Ok(Value::from(len))
            }
            Function::Upper => self.string(as_str(&values[0], "upper")?.to_uppercase()),
            Function::Lower => self.string(as_str(&values[0], "lower")?.to_lowercase()),
            Function::Trim => self.string(as_str(&values[0], "trim")?.trim().to_string()),
            Function::Str => self.string(display(&values[0])),
            Function::Num => match &values[0] {
                Value::Number(_) => Ok(values[0].clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(number)
                    .map_err(|_| SandboxError::TypeMismatch(format!("num: '{s}' is not a number"))),
                Value::Bool(b) => Ok(Value::from(u8::from(*b))),
                other => Err(type_mismatch("num", other)),
            },
            Function::Round => {
                let value = as_number(&values[0], "round")?;
                let digits = match values.get(1) {
                    Some(d) => as_number(d, "round")?.clamp(0.0, 10.0) as i32,
                    None => 0,
                };
                let factor = 10f64.powi(digits);
                Ok(number((value * factor).round() / factor))
            }
            Function::Abs => Ok(number(as_number(&values[0], "abs")?.abs())),
            Function::Min | Function::Max => {
                let mut numbers = Vec::with_capacity(values.len());
                for value in &values {
                    numbers.push(as_number(value, "min/max")?);
                }
                let folded = if function == Function::Min {
                    numbers.into_iter().fold(f64::INFINITY, f64::min)
                } else {
                    numbers.into_iter().fold(f64::NEG_INFINITY, f64::max)
                };
                Ok(number(folded))
            }
            Function::Contains => match (&values[0], &values[1]) {
                (Value::String(haystack), needle) => Ok(Value::Bool(haystack.contains(&display(needle)))),
                (Value::Array(items), needle) => Ok(Value::Bool(items.contains(needle))),
                (Value::Object(map), needle) => Ok(Value::Bool(map.contains_key(&display(needle)))),
                (other, _) => Err(type_mismatch("contains", other)),
            },
            Function::Concat => self.string(values.iter().map(display).collect()),
            Function::If | Function::Coalesce => Ok(Value::Null),
        }
    }

    fn string(&self, text: String) -> Result<Value, SandboxError> {
        if text.len() > self.limits.max_string_len {
            return Err(SandboxError::OutputTooLarge {
                max: self.limits.max_string_len,
            });
        }
        Ok(Value::String(text))
    }
}

/// JSON number, using an integer when the value is integral.
pub(super) fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn as_number(value: &Value, context: &str) -> Result<f64, SandboxError> {
    value.as_f64().ok_or_else(|| type_mismatch(context, value))
}

fn as_str<'v>(value: &'v Value, context: &str) -> Result<&'v str, SandboxError> {
    value.as_str().ok_or_else(|| type_mismatch(context, value))
}

fn type_mismatch(context: &str, value: &Value) -> SandboxError {
    SandboxError::TypeMismatch(format!("{context}: unsupported operand {value}"))
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

pub(super) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text form used by string concatenation and `str()`.
pub(super) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        other => other.to_string(),
    }
}
