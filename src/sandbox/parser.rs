//! Recursive-descent parser producing the sandbox AST.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / %`, unary `-`, primaries.

use std::collections::BTreeSet;

use super::lexer::Token;
use super::{Function, SandboxError};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(serde_json::Value),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Expr {
    /// Names of the call arguments the expression reads.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    /// Names the expression cannot run without. A variable read only inside
    /// the first argument of `default()` may be omitted.
    pub fn required_variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect(&mut names, true);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        self.collect(names, false);
    }

    fn collect(&self, names: &mut BTreeSet<String>, required_only: bool) {
        match self {
            Expr::Literal(_) => {}
            Expr::Var(name) => {
                names.insert(name.clone());
            }
            Expr::Neg(inner) | Expr::Not(inner) => inner.collect(names, required_only),
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect(names, required_only);
                right.collect(names, required_only);
            }
            Expr::Binary { left, right, .. } => {
                left.collect(names, required_only);
                right.collect(names, required_only);
            }
            Expr::Call {
                function: Function::Coalesce,
                args,
            } if required_only => args
                .iter()
                .skip(1)
                .for_each(|arg| arg.collect(names, required_only)),
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect(names, required_only)),
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Parse a single expression that must consume every token.
    pub fn parse(&mut self) -> Result<Expr, SandboxError> {
        if self.tokens.is_empty() {
            return Err(SandboxError::UnexpectedEnd);
        }
        let expr = self.parse_or()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(SandboxError::UnexpectedToken(format!("{token:?}"))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), SandboxError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(SandboxError::UnexpectedToken(format!("{token:?}"))),
            None => Err(SandboxError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), SandboxError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SandboxError::TooDeep { max: self.max_depth });
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, SandboxError> {
        self.enter()?;
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth -= 1;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SandboxError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SandboxError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SandboxError> {
        let mut left = self.parse_additive()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, SandboxError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SandboxError> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SandboxError> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, SandboxError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(super::eval::number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(serde_json::Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(serde_json::Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(serde_json::Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(serde_json::Value::Null)),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => self.parse_identifier(name),
            Some(token) => Err(SandboxError::UnexpectedToken(format!("{token:?}"))),
            None => Err(SandboxError::UnexpectedEnd),
        }
    }

    fn parse_identifier(&mut self, name: String) -> Result<Expr, SandboxError> {
        match self.peek() {
            Some(Token::LParen) => {
                let function: Function = name
                    .parse()
                    .map_err(|_| SandboxError::UnknownFunction(name.clone()))?;
                self.advance();
                let args = self.parse_call_args()?;
                function.check_arity(args.len())?;
                Ok(Expr::Call { function, args })
            }
            Some(Token::Dot) if name == "args" => {
                self.advance();
                match self.advance() {
                    Some(Token::Ident(field)) => {
                        if self.peek() == Some(&Token::Dot) {
                            return Err(SandboxError::Forbidden("attribute access".into()));
                        }
                        Ok(Expr::Var(field))
                    }
                    Some(token) => Err(SandboxError::UnexpectedToken(format!("{token:?}"))),
                    None => Err(SandboxError::UnexpectedEnd),
                }
            }
            Some(Token::Dot) => Err(SandboxError::Forbidden("attribute access".into())),
            _ => Ok(Expr::Var(name)),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, SandboxError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        args.push(self.parse_or()?);
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            args.push(self.parse_or()?);
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::lexer::tokenize;
    use serde_json::json;

    fn parse(source: &str) -> Result<Expr, SandboxError> {
        Parser::new(tokenize(source)?, 16).parse()
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").expect("expression should parse");
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Literal(json!(1))),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(Expr::Literal(json!(2))),
                    right: Box::new(Expr::Literal(json!(3))),
                }),
            }
        );
    }

    #[test]
    fn args_prefix_reads_the_same_variable() {
        let expr = parse("args.city + ' / ' + city").expect("expression should parse");
        assert_eq!(expr.variables().into_iter().collect::<Vec<_>>(), vec!["city".to_string()]);
    }

    #[test]
    fn default_fallback_variables_are_not_required() {
        let expr = parse("'Hello ' + default(name, greeting) + default(upper(title), '')")
            .expect("expression should parse");
        assert_eq!(
            expr.variables().into_iter().collect::<Vec<_>>(),
            vec!["greeting".to_string(), "name".to_string(), "title".to_string()]
        );
        assert_eq!(
            expr.required_variables().into_iter().collect::<Vec<_>>(),
            vec!["greeting".to_string()]
        );

        let expr = parse("name + default(name, '')").expect("expression should parse");
        assert!(expr.required_variables().contains("name"));
    }

    #[test]
    fn rejects_attribute_access_unknown_functions_and_trailing_tokens() {
        assert_eq!(parse("os.system"), Err(SandboxError::Forbidden("attribute access".into())));
        assert_eq!(parse("exec('1')"), Err(SandboxError::UnknownFunction("exec".into())));
        assert!(matches!(parse("1 2"), Err(SandboxError::UnexpectedToken(_))));
        assert_eq!(parse("(1"), Err(SandboxError::UnexpectedEnd));
        assert_eq!(parse(""), Err(SandboxError::UnexpectedEnd));
    }

    #[test]
    fn arity_is_checked_at_parse_time() {
        assert!(matches!(parse("if(true, 1)"), Err(SandboxError::WrongArgCount { .. })));
    }

    #[test]
    fn nesting_beyond_limit_is_rejected() {
        let source = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse(&source), Err(SandboxError::TooDeep { max: 16 }));
    }
}
