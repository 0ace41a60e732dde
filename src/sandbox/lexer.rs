//! Tokenizer for sandbox expressions.

use super::SandboxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Dot,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Printable ASCII plus the usual whitespace.
fn is_allowed_char(c: char) -> bool {
    matches!(c, ' '..='~' | '\n' | '\r' | '\t')
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, SandboxError> {
    if let Some(c) = source.chars().find(|c| !is_allowed_char(*c)) {
        return Err(SandboxError::ForbiddenCharacter(c));
    }

    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let raw: String = chars[start..i].iter().collect();
            let number = raw
                .parse::<f64>()
                .map_err(|_| SandboxError::InvalidNumber(raw.clone()))?;
            tokens.push(Token::Number(number));
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(text));
            i = next;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            tokens.push(match ident.as_str() {
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ if ident.starts_with("__") => return Err(SandboxError::ForbiddenIdentifier(ident)),
                _ => Token::Ident(ident),
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('=', _) => return Err(SandboxError::Forbidden("assignment".into())),
            (';', _) => return Err(SandboxError::Forbidden("statements".into())),
            _ => return Err(SandboxError::UnexpectedChar { ch: c, position: i }),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), SandboxError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((text, i + 1)),
            '\\' => {
                let escaped = chars.get(i + 1).ok_or(SandboxError::UnterminatedString)?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(SandboxError::UnterminatedString)
}
