//! Sandboxed rule-expression evaluator.
//!
//! User-supplied betting rules ("home_points > away_points and
//! home_win_odds < 2.5") are compiled once into a small closed AST and
//! evaluated per match against a plain value environment. The grammar is a
//! strict allowlist: literals, variables, arithmetic, comparisons, boolean
//! logic, and calls to six pure numeric functions. Everything else —
//! attribute access, indexing, assignment, unknown callees, any character
//! outside the grammar — is rejected at compile time with
//! `SimError::UnsafeExpression`. The compiled form sees nothing but the
//! environment it is handed: no I/O, no host, no ambient state.

use std::collections::HashMap;
use std::fmt;

use crate::types::SimError;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A runtime value inside a rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Truthiness: zero, the empty string, and false are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    /// Numeric coercion; booleans count as 0/1, strings fail.
    fn as_num(&self) -> Result<f64, EvalError> {
        match self {
            Value::Num(n) => Ok(*n),
            Value::Bool(true) => Ok(1.0),
            Value::Bool(false) => Ok(0.0),
            Value::Str(_) => Err(EvalError::Type("expected a number, got a string".into())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Runtime failure while evaluating a compiled rule. Never fatal: the rule
/// strategy maps any of these to "decline to bet".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{func}() expects {expected} argument(s), got {got}")]
    Arity { func: &'static str, expected: &'static str, got: usize },
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicalOp {
    And,
    Or,
}

/// The fixed call whitelist. Adding a function means adding a variant here
/// and an arm in `call()` — nothing is looked up dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    Min,
    Max,
    Round,
    Floor,
    Ceil,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        match name {
            "abs" => Some(Func::Abs),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "round" => Some(Func::Round),
            "floor" => Some(Func::Floor),
            "ceil" => Some(Func::Ceil),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Abs => "abs",
            Func::Min => "min",
            Func::Max => "max",
            Func::Round => "round",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Compare { op: CompareOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Logical { op: LogicalOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: Func, args: Vec<Expr> },
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    And,
    Or,
    Not,
    True,
    False,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::StarStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::LtE => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtE => write!(f, ">="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

fn unsafe_expr(msg: impl Into<String>) -> SimError {
    SimError::UnsafeExpression(msg.into())
}

fn tokenize(src: &str) -> Result<Vec<Token>, SimError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::StarStar);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(unsafe_expr("assignment is not allowed"));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    return Err(unsafe_expr("unexpected character '!'"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::LtE);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::GtE);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(unsafe_expr("unterminated string literal"));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '.' => return Err(unsafe_expr("attribute access is not allowed")),
            '[' | ']' => return Err(unsafe_expr("subscript access is not allowed")),
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '.' {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                if i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    return Err(unsafe_expr(format!("invalid number literal '{literal}…'")));
                }
                let num = literal
                    .parse::<f64>()
                    .map_err(|_| unsafe_expr(format!("invalid number literal '{literal}'")))?;
                tokens.push(Token::Num(num));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" | "True" => Token::True,
                    "false" | "False" => Token::False,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(unsafe_expr(format!("unexpected character '{c}'"))),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Recursive-descent parser over the token stream. Precedence, loosest
/// first: or, and, not, comparisons, +/-, * / %, unary +/-, ** (right-
/// associative). Comparisons do not chain: `a < b < c` compares a boolean
/// to a number and fails at evaluation time.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<Expr, SimError> {
        let expr = self.or_expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(unsafe_expr(format!("unexpected token '{token}'"))),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, SimError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Logical { op: LogicalOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, SimError> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::Logical { op: LogicalOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, SimError> {
        if self.eat(&Token::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SimError> {
        let mut lhs = self.arith()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::LtE) => CompareOp::LtE,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::GtE) => CompareOp::GtE,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.arith()?;
            lhs = Expr::Compare { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn arith(&mut self) -> Result<Expr, SimError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, SimError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, SimError> {
        if self.eat(&Token::Minus) {
            let operand = self.factor()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) });
        }
        if self.eat(&Token::Plus) {
            let operand = self.factor()?;
            return Ok(Expr::Unary { op: UnaryOp::Pos, operand: Box::new(operand) });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, SimError> {
        let base = self.primary()?;
        if self.eat(&Token::StarStar) {
            // Right-associative; the exponent may carry its own unary sign.
            let exponent = self.factor()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, SimError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(unsafe_expr("expected ')'"));
                }
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let func = Func::from_name(&name)
                        .ok_or_else(|| unsafe_expr(format!("function '{name}' is not allowed")))?;
                    self.pos += 1;
                    let args = self.call_args()?;
                    return Ok(Expr::Call { func, args });
                }
                Ok(Expr::Var(name))
            }
            Some(token) => Err(unsafe_expr(format!("unexpected token '{token}'"))),
            None => Err(unsafe_expr("unexpected end of expression")),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, SimError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.or_expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            return Err(unsafe_expr("expected ',' or ')' in argument list"));
        }
    }
}

// ---------------------------------------------------------------------------
// Compiled rule
// ---------------------------------------------------------------------------

/// A rule expression compiled to a closed AST. Evaluation touches nothing
/// but the environment passed in.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    source: String,
    ast: Expr,
}

/// Compile a rule expression, rejecting anything outside the allowlisted
/// grammar with `SimError::UnsafeExpression`.
pub fn compile(source: &str) -> Result<CompiledRule, SimError> {
    if source.trim().is_empty() {
        return Err(unsafe_expr("empty expression"));
    }
    let tokens = tokenize(source)?;
    let ast = Parser::new(tokens).parse()?;
    Ok(CompiledRule { source: source.to_string(), ast })
}

impl CompiledRule {
    /// The original expression text, for logging.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a variable environment.
    pub fn eval(&self, env: &HashMap<String, Value>) -> Result<Value, EvalError> {
        eval_node(&self.ast, env)
    }

    /// Evaluate and coerce the result to a boolean.
    pub fn eval_truthy(&self, env: &HashMap<String, Value>) -> Result<bool, EvalError> {
        Ok(self.eval(env)?.is_truthy())
    }
}

fn eval_node(expr: &Expr, env: &HashMap<String, Value>) -> Result<Value, EvalError> {
    match expr {
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Expr::Unary { op, operand } => {
            let value = eval_node(operand, env)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => Ok(Value::Num(-value.as_num()?)),
                UnaryOp::Pos => Ok(Value::Num(value.as_num()?)),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let left = eval_node(lhs, env)?.as_num()?;
            let right = eval_node(rhs, env)?.as_num()?;
            let result = match op {
                BinaryOp::Add => left + right,
                BinaryOp::Sub => left - right,
                BinaryOp::Mul => left * right,
                BinaryOp::Div => {
                    if right == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    left / right
                }
                BinaryOp::Mod => {
                    if right == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    left % right
                }
                BinaryOp::Pow => left.powf(right),
            };
            Ok(Value::Num(result))
        }
        Expr::Compare { op, lhs, rhs } => {
            let left = eval_node(lhs, env)?;
            let right = eval_node(rhs, env)?;
            Ok(Value::Bool(compare(*op, &left, &right)?))
        }
        Expr::Logical { op, lhs, rhs } => {
            // Short-circuit with operand-value semantics: the result is
            // whichever operand decided the outcome.
            let left = eval_node(lhs, env)?;
            match op {
                LogicalOp::And => {
                    if left.is_truthy() {
                        eval_node(rhs, env)
                    } else {
                        Ok(left)
                    }
                }
                LogicalOp::Or => {
                    if left.is_truthy() {
                        Ok(left)
                    } else {
                        eval_node(rhs, env)
                    }
                }
            }
        }
        Expr::Call { func, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_node(arg, env)?.as_num()?);
            }
            call(*func, &values)
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    // Equality across mismatched types is false, never an error.
    if matches!(op, CompareOp::Eq | CompareOp::NotEq) {
        let equal = match (left, right) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Str(_), _) | (_, Value::Str(_)) => false,
            _ => left.as_num()? == right.as_num()?,
        };
        return Ok(if op == CompareOp::Eq { equal } else { !equal });
    }

    // Ordering: strings compare with strings, everything else numerically.
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            return Err(EvalError::Type(
                "cannot order a string against a number".into(),
            ))
        }
        _ => left.as_num()?.partial_cmp(&right.as_num()?),
    };
    let Some(ordering) = ordering else {
        return Err(EvalError::Type("unordered comparison".into()));
    };

    Ok(match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::LtE => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::GtE => ordering.is_ge(),
        CompareOp::Eq | CompareOp::NotEq => unreachable!("handled above"),
    })
}

fn call(func: Func, args: &[f64]) -> Result<Value, EvalError> {
    let unary = |expected: &'static str| -> Result<f64, EvalError> {
        if args.len() == 1 {
            Ok(args[0])
        } else {
            Err(EvalError::Arity { func: func.name(), expected, got: args.len() })
        }
    };

    let result = match func {
        Func::Abs => unary("1")?.abs(),
        Func::Round => unary("1")?.round(),
        Func::Floor => unary("1")?.floor(),
        Func::Ceil => unary("1")?.ceil(),
        Func::Min | Func::Max => {
            if args.is_empty() {
                return Err(EvalError::Arity {
                    func: func.name(),
                    expected: "at least 1",
                    got: 0,
                });
            }
            let fold: fn(f64, f64) -> f64 =
                if func == Func::Min { f64::min } else { f64::max };
            args.iter().copied().reduce(fold).unwrap_or(0.0)
        }
    };

    Ok(Value::Num(result))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
