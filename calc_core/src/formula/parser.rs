//! Tokenizer, recursive-descent parser and evaluator for custom formulas.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('**' unary)?          right-associative
//! primary := number | '%' digits | ident | ident '(' args ')' | '(' expr ')'
//! ```
//!
//! Identifiers may carry a `Math.` prefix (`Math.max`, `Math.PI`). Variables
//! are resolved at evaluation time through a [`Scope`], so one parsed
//! expression can be evaluated against different symbol tables.

use super::FormulaError;

/// Maximum nesting of parentheses, unary operators and calls.
pub const MAX_DEPTH: usize = 64;

/// Maximum number of binary operators in one formula. Flat chains such as
/// `1+1+...` nest to the left, so this bounds the tree depth too.
pub const MAX_OPERATORS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// `%n`, 1-based
    Placeholder(usize),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Placeholder(n) => format!("%{}", n),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Power => "**".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Split `src` into tokens.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, FormulaError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = single {
            chars.next();
            tokens.push(Spanned { token, start, end: start + 1 });
            continue;
        }

        if c == '*' {
            chars.next();
            if bytes.get(start + 1) == Some(&b'*') {
                chars.next();
                tokens.push(Spanned { token: Token::Power, start, end: start + 2 });
            } else {
                tokens.push(Spanned { token: Token::Star, start, end: start + 1 });
            }
            continue;
        }

        if c == '%' {
            chars.next();
            let mut end = start + 1;
            while bytes.get(end).map_or(false, u8::is_ascii_digit) {
                chars.next();
                end += 1;
            }
            if end == start + 1 {
                return Err(FormulaError::UnexpectedCharacter { ch: '%', offset: start });
            }
            let slot = src[start + 1..end]
                .parse::<usize>()
                .map_err(|_| FormulaError::InvalidNumber { text: src[start..end].to_string(), offset: start })?;
            tokens.push(Spanned { token: Token::Placeholder(slot), start, end });
            continue;
        }

        let starts_number = c.is_ascii_digit()
            || (c == '.' && bytes.get(start + 1).map_or(false, u8::is_ascii_digit));
        if starts_number {
            let mut end = start;
            while bytes.get(end).map_or(false, |b| b.is_ascii_digit() || *b == b'.') {
                end += 1;
            }
            // exponent: e, E, optionally signed
            if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
                let mut probe = end + 1;
                if matches!(bytes.get(probe), Some(b'+') | Some(b'-')) {
                    probe += 1;
                }
                if bytes.get(probe).map_or(false, u8::is_ascii_digit) {
                    end = probe;
                    while bytes.get(end).map_or(false, u8::is_ascii_digit) {
                        end += 1;
                    }
                }
            }
            while chars.peek().map_or(false, |&(i, _)| i < end) {
                chars.next();
            }
            let text = &src[start..end];
            let value = text
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber { text: text.to_string(), offset: start })?;
            tokens.push(Spanned { token: Token::Number(value), start, end });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            loop {
                while bytes.get(end).map_or(false, |b| b.is_ascii_alphanumeric() || *b == b'_') {
                    end += 1;
                }
                // dotted member access, e.g. Math.max
                let continues = bytes.get(end) == Some(&b'.')
                    && bytes.get(end + 1).map_or(false, |b| b.is_ascii_alphabetic() || *b == b'_');
                if continues {
                    end += 1;
                } else {
                    break;
                }
            }
            while chars.peek().map_or(false, |&(i, _)| i < end) {
                chars.next();
            }
            tokens.push(Spanned {
                token: Token::Ident(src[start..end].to_string()),
                start,
                end,
            });
            continue;
        }

        return Err(FormulaError::UnexpectedCharacter { ch: c, offset: start });
    }

    Ok(tokens)
}

/// Whitelisted math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Max,
    Min,
    Round,
    Ceil,
    Floor,
    Pow,
    Sqrt,
    Abs,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::Max,
        Function::Min,
        Function::Round,
        Function::Ceil,
        Function::Floor,
        Function::Pow,
        Function::Sqrt,
        Function::Abs,
    ];

    /// Resolve a bare or `Math.`-prefixed function name.
    pub fn lookup(name: &str) -> Option<Function> {
        let bare = name.strip_prefix("Math.").unwrap_or(name);
        Function::ALL.iter().copied().find(|f| f.name() == bare)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Max => "max",
            Function::Min => "min",
            Function::Round => "round",
            Function::Ceil => "ceil",
            Function::Floor => "floor",
            Function::Pow => "pow",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Function::Max => "取较大值",
            Function::Min => "取较小值",
            Function::Round => "四舍五入",
            Function::Ceil => "向上取整",
            Function::Floor => "向下取整",
            Function::Pow => "乘方",
            Function::Sqrt => "平方根",
            Function::Abs => "绝对值",
        }
    }

    fn check_arity(self, found: usize) -> Result<(), FormulaError> {
        let ok = match self {
            Function::Max | Function::Min => found >= 1,
            Function::Pow => found == 2,
            _ => found == 1,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Function::Max | Function::Min => "at least 1",
            Function::Pow => "2",
            _ => "1",
        };
        Err(FormulaError::ArityMismatch {
            function: self.name().to_string(),
            expected: expected.to_string(),
            found,
        })
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Function::Max => extreme(args, f64::max),
            Function::Min => extreme(args, f64::min),
            Function::Round => round_half_up(args[0]),
            Function::Ceil => args[0].ceil(),
            Function::Floor => args[0].floor(),
            Function::Pow => args[0].powf(args[1]),
            Function::Sqrt => args[0].sqrt(),
            Function::Abs => args[0].abs(),
        }
    }
}

/// Nearest integer with exact .5 ties toward +∞: round(-2.5) == -2.
fn round_half_up(x: f64) -> f64 {
    let nearest = x.round();
    if (nearest - x).abs() == 0.5 {
        x.floor() + 1.0
    } else {
        nearest
    }
}

/// max/min where any NaN argument poisons the result.
fn extreme(args: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
    if args.iter().any(|a| a.is_nan()) {
        return f64::NAN;
    }
    args.iter().copied().reduce(pick).unwrap_or(f64::NAN)
}

/// Constants reachable as `Math.PI` / `Math.E`.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "Math.PI" => Some(std::f64::consts::PI),
        "Math.E" => Some(std::f64::consts::E),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Placeholder(usize),
    Variable(String),
    Neg(Box<Expr>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { function: Function, args: Vec<Expr> },
}

/// Symbol table consulted during evaluation.
pub trait Scope {
    /// Value bound to `%slot` (1-based).
    fn placeholder(&self, slot: usize) -> Option<f64>;
    /// Value of a named variable.
    fn variable(&self, name: &str) -> Option<f64>;
}

impl Expr {
    /// Evaluate against `scope`. Non-finite intermediates are allowed; callers
    /// decide what to do with a non-finite result.
    pub fn eval(&self, scope: &dyn Scope) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Placeholder(slot) => scope
                .placeholder(*slot)
                .ok_or_else(|| FormulaError::UnresolvedVariable { name: format!("%{}", slot) }),
            Expr::Variable(name) => scope
                .variable(name)
                .ok_or_else(|| FormulaError::UnresolvedVariable { name: name.clone() }),
            Expr::Neg(inner) => Ok(-inner.eval(scope)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(scope)?;
                let b = rhs.eval(scope)?;
                Ok(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                })
            }
            Expr::Call { function, args } => {
                let values = args.iter().map(|a| a.eval(scope)).collect::<Result<Vec<_>, _>>()?;
                Ok(function.apply(&values))
            }
        }
    }
}

/// Parse a complete formula.
pub fn parse(src: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(src)?;
    parse_tokens(&tokens)
}

/// Parse an already tokenized formula.
pub fn parse_tokens(tokens: &[Spanned]) -> Result<Expr, FormulaError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        operators: 0,
    };
    let expr = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(FormulaError::UnexpectedToken {
            found: extra.token.describe(),
            offset: extra.start,
        }),
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    operators: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let next = self.tokens.get(self.pos);
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
        match self.advance() {
            Some(s) if s.token == expected => Ok(()),
            Some(s) => Err(FormulaError::UnexpectedToken {
                found: s.token.describe(),
                offset: s.start,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, FormulaError>) -> Result<T, FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::NestingTooDeep { limit: MAX_DEPTH });
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Result<Expr, FormulaError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(FormulaError::TooManyOperators { limit: MAX_OPERATORS });
        }
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let inner = self.nested(Self::unary)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            let exponent = self.nested(Self::unary)?;
            return self.binary(BinOp::Pow, base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(spanned) = self.advance() else {
            return Err(FormulaError::UnexpectedEnd);
        };
        match &spanned.token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Placeholder(slot) => Ok(Expr::Placeholder(*slot)),
            Token::LParen => {
                let inner = self.nested(Self::expr)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    return self.nested(|p| p.call(name));
                }
                if let Some(value) = constant(name) {
                    return Ok(Expr::Number(value));
                }
                Ok(Expr::Variable(name.clone()))
            }
            other => Err(FormulaError::UnexpectedToken {
                found: other.describe(),
                offset: spanned.start,
            }),
        }
    }

    /// Argument list after `name(`.
    fn call(&mut self, name: &str) -> Result<Expr, FormulaError> {
        let function = Function::lookup(name).ok_or_else(|| FormulaError::UnknownFunction { name: name.to_string() })?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.expr()?);
                match self.advance() {
                    Some(Spanned { token: Token::Comma, .. }) => continue,
                    Some(Spanned { token: Token::RParen, .. }) => break,
                    Some(s) => {
                        return Err(FormulaError::UnexpectedToken {
                            found: s.token.describe(),
                            offset: s.start,
                        })
                    }
                    None => return Err(FormulaError::UnexpectedEnd),
                }
            }
        }
        function.check_arity(args.len())?;
        Ok(Expr::Call { function, args })
    }
}
