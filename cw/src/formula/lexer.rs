//! Tokenizer for formulas.

use super::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
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
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Int(n) => n.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Str(s) => format!("'{s}'"),
            Token::Name(name) => name.clone(),
            Token::Eof => "end of input".to_string(),
            other => format!("{other:?}"),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word {
        "true" | "True" => Some(Token::True),
        "false" | "False" => Some(Token::False),
        "null" | "None" => Some(Token::Null),
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        _ => None,
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn number(&mut self, start: usize, mut is_float: bool) -> Result<Token, FormulaError> {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.chars.next();
            } else if c == '.' && !is_float {
                is_float = true;
                self.chars.next();
            } else if c == 'e' || c == 'E' {
                is_float = true;
                self.chars.next();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.chars.next();
                }
            } else {
                break;
            }
        }
        let end = self.offset();
        let text = self.src[start..end].replace('_', "");
        let parsed = if is_float {
            text.parse::<f64>().ok().map(Token::Float)
        } else {
            text.parse::<i64>().ok().map(Token::Int)
        };
        parsed.ok_or_else(|| FormulaError::syntax(start, format!("invalid number '{text}'")))
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, FormulaError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(Token::Str(out)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, c)) => out.push(c),
                    None => break,
                },
                Some((_, c)) => out.push(c),
                None => break,
            }
        }
        Err(FormulaError::syntax(start, "unterminated string"))
    }

    fn backquoted(&mut self, start: usize) -> Result<Token, FormulaError> {
        let mut name = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == '`' {
                return Ok(Token::Name(name));
            }
            name.push(c);
        }
        Err(FormulaError::syntax(start, "unterminated backquoted name"))
    }

    fn word(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.offset();
        let word = &self.src[start..end];
        keyword(word).unwrap_or_else(|| Token::Name(word.to_string()))
    }
}

/// Split `src` into tokens paired with their byte offsets, ending with `Eof`.
pub fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    while let Some((pos, c)) = lexer.chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '0'..='9' => lexer.number(pos, false)?,
            '.' if lexer.peek().is_some_and(|c| c.is_ascii_digit()) => lexer.number(pos, true)?,
            '\'' | '"' => lexer.string(pos, c)?,
            '`' => lexer.backquoted(pos)?,
            c if c.is_alphabetic() || c == '_' => lexer.word(pos),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' if lexer.eat('/') => Token::DoubleSlash,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' if lexer.eat('=') => Token::EqEq,
            '=' => Token::Assign,
            '!' if lexer.eat('=') => Token::NotEq,
            '<' if lexer.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if lexer.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            other => return Err(FormulaError::syntax(pos, format!("unexpected character '{other}'"))),
        };
        tokens.push((token, pos));
    }
    tokens.push((Token::Eof, src.len()));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a // 2 == b != c <= d"),
            vec![
                Token::Name("a".to_string()),
                Token::DoubleSlash,
                Token::Int(2),
                Token::EqEq,
                Token::Name("b".to_string()),
                Token::NotEq,
                Token::Name("c".to_string()),
                Token::Le,
                Token::Name("d".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"1_000 2.5 .5 1e3 'it\'s' "x" True null"#),
            vec![
                Token::Int(1000),
                Token::Float(2.5),
                Token::Float(0.5),
                Token::Float(1000.0),
                Token::Str("it's".to_string()),
                Token::Str("x".to_string()),
                Token::True,
                Token::Null,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_backquoted_name() {
        assert_eq!(
            kinds("sum(`_unit price`)"),
            vec![
                Token::Name("sum".to_string()),
                Token::LParen,
                Token::Name("_unit price".to_string()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_offsets_and_errors() {
        let tokens = tokenize("ab + 1").unwrap();
        assert_eq!(tokens[1], (Token::Plus, 3));
        assert_eq!(tokens[3], (Token::Eof, 6));
        assert_eq!(
            tokenize("a $ b").unwrap_err(),
            FormulaError::syntax(2, "unexpected character '$'")
        );
        assert!(tokenize("'open").is_err());
    }
}
