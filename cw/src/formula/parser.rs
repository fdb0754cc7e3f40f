//! Recursive-descent parser.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary `-`, subscripts, then literals, names, calls and
//! parentheses.
//!
//! Nesting deeper than [`MAX_NESTING`] is a syntax error.

use super::FormulaError;
use super::lexer::{Token, tokenize};
use crate::value::Value;

/// Deepest nesting of parentheses, calls, subscripts and unary operators.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Len,
    Count,
    Sum,
    Min,
    Max,
    Avg,
    First,
    Last,
    Distinct,
    Join,
    Round,
    Abs,
    Int,
    Float,
    Str,
    If,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Function::Len,
            "count" => Function::Count,
            "sum" => Function::Sum,
            "min" => Function::Min,
            "max" => Function::Max,
            "avg" | "mean" => Function::Avg,
            "first" => Function::First,
            "last" => Function::Last,
            "distinct" => Function::Distinct,
            "join" => Function::Join,
            "round" => Function::Round,
            "abs" => Function::Abs,
            "int" => Function::Int,
            "float" => Function::Float,
            "str" => Function::Str,
            "if" => Function::If,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Len => "len",
            Function::Count => "count",
            Function::Sum => "sum",
            Function::Min => "min",
            Function::Max => "max",
            Function::Avg => "avg",
            Function::First => "first",
            Function::Last => "last",
            Function::Distinct => "distinct",
            Function::Join => "join",
            Function::Round => "round",
            Function::Abs => "abs",
            Function::Int => "int",
            Function::Float => "float",
            Function::Str => "str",
            Function::If => "if",
        }
    }

    /// Accepted argument counts, as `(min, max, description)`.
    fn arity(self) -> (usize, usize, &'static str) {
        match self {
            Function::Min | Function::Max => (1, usize::MAX, "1 or more"),
            Function::Join => (1, 2, "1 or 2"),
            Function::Round => (1, 2, "1 or 2"),
            Function::If => (3, 3, "3"),
            _ => (1, 1, "1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
    /// `container[index]`
    Index(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, FormulaError> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
            depth: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map_or(0, |&(_, pos)| pos)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), FormulaError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {}", token.describe())))
        }
    }

    fn unexpected(&self, context: &str) -> FormulaError {
        FormulaError::syntax(
            self.offset(),
            format!("{context}, found {}", self.peek().describe()),
        )
    }

    /// Run `f` one level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, FormulaError>) -> Result<T, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::syntax(self.offset(), "formula nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        self.nested(Self::or)
    }

    fn or(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, FormulaError> {
        if self.eat(&Token::Not) {
            let operand = self.nested(Self::not)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.eat(&Token::Minus) {
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.eat(&Token::Plus) {
            return self.nested(Self::unary);
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.expression()?;
            self.expect(Token::RBracket)?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let start = self.offset();
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Name(name) if self.peek() == &Token::LParen => self.call(name),
            Token::Name(name) => Ok(Expr::Name(name)),
            other => Err(FormulaError::syntax(
                start,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr, FormulaError> {
        let function = Function::from_name(&name).ok_or(FormulaError::UnknownFunction(name))?;
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }
        let (min, max, expected) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(FormulaError::Arity {
                function: function.name(),
                expected,
                found: args.len(),
            });
        }
        Ok(Expr::Call(function, args))
    }

    fn finish(&self) -> Result<(), FormulaError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("expected end of formula")),
        }
    }
}

/// Parse a single expression.
pub fn parse(src: &str) -> Result<Expr, FormulaError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse `NAME = EXPR; NAME = EXPR; ...`, in order.
pub fn parse_bindings(src: &str) -> Result<Vec<(String, Expr)>, FormulaError> {
    let mut parser = Parser::new(src)?;
    let mut bindings = Vec::new();
    loop {
        while parser.eat(&Token::Semicolon) {}
        let name = match parser.advance() {
            Token::Eof => return Ok(bindings),
            Token::Name(name) => name,
            _ => {
                parser.pos -= 1;
                return Err(parser.unexpected("expected a name to bind"));
            }
        };
        parser.expect(Token::Assign)?;
        let expr = parser.expression()?;
        bindings.push((name, expr));
        if !parser.eat(&Token::Semicolon) {
            parser.finish()?;
            return Ok(bindings);
        }
    }
}
