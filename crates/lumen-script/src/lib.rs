//! LumenScript: the small expression language embedded in the lumen shell.
//!
//! The shell treats this crate as an opaque evaluator: feed it source text
//! and a sink, get printed output back. Globals persist across `evaluate`
//! calls so a REPL session can build up state line by line. All output goes
//! through the caller's sink; the engine never touches process stdout.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use lumen_types::{LumenError, Result};

/// Builtin function names, sorted, for the shell's function completion.
pub const FUNCTION_NAMES: &[&str] = &[
    "abs", "ceil", "contains", "floor", "int", "len", "lower", "max", "min", "pow", "print",
    "replace", "sqrt", "str", "trim", "upper",
];

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Unit => write!(f, "()"),
        }
    }
}

/// The evaluator. Cheap to construct; holds the global variable table.
pub struct Engine {
    globals: RefCell<HashMap<String, Value>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            globals: RefCell::new(HashMap::new()),
        }
    }

    /// Engine identification for the shell's version commands.
    pub fn version(&self) -> String {
        format!("LumenScript {}", env!("CARGO_PKG_VERSION"))
    }

    /// Builtin function names, sorted, for completion.
    pub fn function_names(&self) -> &'static [&'static str] {
        FUNCTION_NAMES
    }

    /// Evaluate a script: statements separated by `;` or newlines.
    ///
    /// Bare expression statements echo their value to the sink, REPL-style.
    /// `print(...)` writes explicitly. Assignments and `let` are silent.
    pub fn evaluate(&self, src: &str, out: &mut dyn Write) -> Result<()> {
        let tokens = lex(src)?;
        let stmts = Parser::new(tokens).parse_program()?;
        for stmt in &stmts {
            match stmt {
                Stmt::Let(name, expr) | Stmt::Assign(name, expr) => {
                    let value = self.eval(expr, out)?;
                    self.globals.borrow_mut().insert(name.clone(), value);
                },
                Stmt::Expr(expr) => {
                    let value = self.eval(expr, out)?;
                    if value != Value::Unit {
                        writeln!(out, "{value}")?;
                    }
                },
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr, out: &mut dyn Write) -> Result<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(x) => Ok(Value::Float(*x)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => self
                .globals
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| LumenError::Script(format!("undefined variable: {name}"))),
            Expr::Unary(op, inner) => {
                let v = self.eval(inner, out)?;
                eval_unary(*op, v)
            },
            Expr::Binary(op, lhs, rhs) => {
                // Short-circuit the logical operators before evaluating rhs.
                if *op == BinOp::And || *op == BinOp::Or {
                    let l = as_bool(self.eval(lhs, out)?)?;
                    if (*op == BinOp::And && !l) || (*op == BinOp::Or && l) {
                        return Ok(Value::Bool(l));
                    }
                    return Ok(Value::Bool(as_bool(self.eval(rhs, out)?)?));
                }
                let l = self.eval(lhs, out)?;
                let r = self.eval(rhs, out)?;
                eval_binary(*op, l, r)
            },
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, out)?);
                }
                self.call_builtin(name, values, out)
            },
        }
    }

    fn call_builtin(&self, name: &str, args: Vec<Value>, out: &mut dyn Write) -> Result<Value> {
        match name {
            "print" => {
                let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
                writeln!(out, "{}", rendered.join(" "))?;
                Ok(Value::Unit)
            },
            "len" => {
                let s = one_str(name, &args)?;
                Ok(Value::Int(s.chars().count() as i64))
            },
            "upper" => Ok(Value::Str(one_str(name, &args)?.to_uppercase())),
            "lower" => Ok(Value::Str(one_str(name, &args)?.to_lowercase())),
            "trim" => Ok(Value::Str(one_str(name, &args)?.trim().to_string())),
            "str" => {
                arity(name, &args, 1)?;
                Ok(Value::Str(args[0].to_string()))
            },
            "int" => {
                arity(name, &args, 1)?;
                match &args[0] {
                    Value::Int(n) => Ok(Value::Int(*n)),
                    Value::Float(x) => Ok(Value::Int(*x as i64)),
                    Value::Str(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| LumenError::Script(format!("int: cannot parse {s:?}"))),
                    v => Err(LumenError::Script(format!("int: cannot convert {v}"))),
                }
            },
            "abs" => match one_num(name, &args)? {
                Value::Int(n) => Ok(Value::Int(n.abs())),
                Value::Float(x) => Ok(Value::Float(x.abs())),
                _ => unreachable!(),
            },
            "floor" => Ok(Value::Int(as_f64(one_num(name, &args)?).floor() as i64)),
            "ceil" => Ok(Value::Int(as_f64(one_num(name, &args)?).ceil() as i64)),
            "sqrt" => {
                let x = as_f64(one_num(name, &args)?);
                if x < 0.0 {
                    return Err(LumenError::Script("sqrt: negative argument".to_string()));
                }
                Ok(Value::Float(x.sqrt()))
            },
            "pow" => {
                arity(name, &args, 2)?;
                let base = as_f64(num_arg(name, &args[0])?);
                let exp = as_f64(num_arg(name, &args[1])?);
                Ok(Value::Float(base.powf(exp)))
            },
            "min" | "max" => {
                arity(name, &args, 2)?;
                let a = as_f64(num_arg(name, &args[0])?);
                let b = as_f64(num_arg(name, &args[1])?);
                let picked = if (name == "min") == (a <= b) { &args[0] } else { &args[1] };
                Ok(picked.clone())
            },
            "contains" => {
                arity(name, &args, 2)?;
                let hay = str_arg(name, &args[0])?;
                let needle = str_arg(name, &args[1])?;
                Ok(Value::Bool(hay.contains(needle)))
            },
            "replace" => {
                arity(name, &args, 3)?;
                let s = str_arg(name, &args[0])?;
                let from = str_arg(name, &args[1])?;
                let to = str_arg(name, &args[2])?;
                Ok(Value::Str(s.replace(from, to)))
            },
            _ => Err(LumenError::Script(format!("unknown function: {name}"))),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(LumenError::Script(format!(
            "{name}: expected {n} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn one_str<'a>(name: &str, args: &'a [Value]) -> Result<&'a str> {
    arity(name, args, 1)?;
    str_arg(name, &args[0])
}

fn str_arg<'a>(name: &str, v: &'a Value) -> Result<&'a str> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(LumenError::Script(format!("{name}: expected string, got {other}"))),
    }
}

fn one_num(name: &str, args: &[Value]) -> Result<Value> {
    arity(name, args, 1)?;
    num_arg(name, &args[0])
}

fn num_arg(name: &str, v: &Value) -> Result<Value> {
    match v {
        Value::Int(_) | Value::Float(_) => Ok(v.clone()),
        other => Err(LumenError::Script(format!("{name}: expected number, got {other}"))),
    }
}

fn as_f64(v: Value) -> f64 {
    match v {
        Value::Int(n) => n as f64,
        Value::Float(x) => x,
        _ => 0.0,
    }
}

fn as_bool(v: Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(LumenError::Script(format!("expected boolean, got {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Operator evaluation
// ---------------------------------------------------------------------------

fn eval_unary(op: UnOp, v: Value) -> Result<Value> {
    match (op, v) {
        (UnOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, v) => Err(LumenError::Script(format!("cannot apply {op:?} to {v}"))),
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value) -> Result<Value> {
    use BinOp::*;
    // String concatenation: `+` with a string on either side renders both.
    if op == Add && (matches!(l, Value::Str(_)) || matches!(r, Value::Str(_))) {
        return Ok(Value::Str(format!("{l}{r}")));
    }
    match op {
        Add | Sub | Mul | Div | Rem => arith(op, l, r),
        Eq => Ok(Value::Bool(values_eq(&l, &r))),
        Ne => Ok(Value::Bool(!values_eq(&l, &r))),
        Lt | Le | Gt | Ge => compare(op, l, r),
        And | Or => unreachable!("logical ops are short-circuited by the caller"),
    }
}

fn arith(op: BinOp, l: Value, r: Value) -> Result<Value> {
    use BinOp::*;
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => match op {
            Add => Ok(Value::Int(a.wrapping_add(b))),
            Sub => Ok(Value::Int(a.wrapping_sub(b))),
            Mul => Ok(Value::Int(a.wrapping_mul(b))),
            Div => {
                if b == 0 {
                    Err(LumenError::Script("division by zero".to_string()))
                } else {
                    Ok(Value::Int(a / b))
                }
            },
            Rem => {
                if b == 0 {
                    Err(LumenError::Script("division by zero".to_string()))
                } else {
                    Ok(Value::Int(a % b))
                }
            },
            _ => unreachable!(),
        },
        (l @ (Value::Int(_) | Value::Float(_)), r @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = (as_f64(l), as_f64(r));
            match op {
                Add => Ok(Value::Float(a + b)),
                Sub => Ok(Value::Float(a - b)),
                Mul => Ok(Value::Float(a * b)),
                Div => {
                    if b == 0.0 {
                        Err(LumenError::Script("division by zero".to_string()))
                    } else {
                        Ok(Value::Float(a / b))
                    }
                },
                Rem => Ok(Value::Float(a % b)),
                _ => unreachable!(),
            }
        },
        (l, r) => Err(LumenError::Script(format!("cannot apply {op:?} to {l} and {r}"))),
    }
}

fn values_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => l == r,
    }
}

fn compare(op: BinOp, l: Value, r: Value) -> Result<Value> {
    use BinOp::*;
    let ord = match (&l, &r) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (
            l @ (Value::Int(_) | Value::Float(_)),
            r @ (Value::Int(_) | Value::Float(_)),
        ) => as_f64(l.clone()).partial_cmp(&as_f64(r.clone())),
        _ => None,
    };
    let Some(ord) = ord else {
        return Err(LumenError::Script(format!("cannot compare {l} and {r}")));
    };
    let result = match op {
        Lt => ord.is_lt(),
        Le => ord.is_le(),
        Gt => ord.is_gt(),
        Ge => ord.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Stmt {
    Let(String, Expr),
    Assign(String, Expr),
    Expr(Expr),
}

#[derive(Debug, Clone)]
enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
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
    And,
    Or,
}

impl BinOp {
    /// Left binding power; higher binds tighter.
    fn precedence(self) -> u8 {
        use BinOp::*;
        match self {
            Or => 1,
            And => 2,
            Eq | Ne => 3,
            Lt | Le | Gt | Ge => 4,
            Add | Sub => 5,
            Mul | Div | Rem => 6,
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(BinOp),
    Not,
    Assign,
    LParen,
    RParen,
    Comma,
    Semi,
}

fn lex(src: &str) -> Result<Vec<Tok>> {
    let mut toks = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\r' => {
                chars.next();
            },
            '\n' | ';' => {
                chars.next();
                // Collapse runs of separators into one.
                if toks.last() != Some(&Tok::Semi) {
                    toks.push(Tok::Semi);
                }
            },
            '#' => {
                // Comment to end of line.
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                if toks.last() != Some(&Tok::Semi) {
                    toks.push(Tok::Semi);
                }
            },
            '0'..='9' => {
                let mut text = String::new();
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        is_float = true;
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let x: f64 = text
                        .parse()
                        .map_err(|_| LumenError::Script(format!("bad number: {text}")))?;
                    toks.push(Tok::Float(x));
                } else {
                    let n: i64 = text
                        .parse()
                        .map_err(|_| LumenError::Script(format!("bad number: {text}")))?;
                    toks.push(Tok::Int(n));
                }
            },
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\\'
                        && let Some(&next) = chars.peek()
                    {
                        let escaped = match next {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        };
                        text.push(escaped);
                        chars.next();
                        continue;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(LumenError::Script("unterminated string".to_string()));
                }
                toks.push(Tok::Str(text));
            },
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Ident(name));
            },
            '+' => op(&mut chars, &mut toks, BinOp::Add),
            '-' => op(&mut chars, &mut toks, BinOp::Sub),
            '*' => op(&mut chars, &mut toks, BinOp::Mul),
            '/' => op(&mut chars, &mut toks, BinOp::Div),
            '%' => op(&mut chars, &mut toks, BinOp::Rem),
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            },
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            },
            ',' => {
                chars.next();
                toks.push(Tok::Comma);
            },
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op(BinOp::Eq));
                } else {
                    toks.push(Tok::Assign);
                }
            },
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op(BinOp::Ne));
                } else {
                    toks.push(Tok::Not);
                }
            },
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op(BinOp::Le));
                } else {
                    toks.push(Tok::Op(BinOp::Lt));
                }
            },
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Op(BinOp::Ge));
                } else {
                    toks.push(Tok::Op(BinOp::Gt));
                }
            },
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err(LumenError::Script("expected && operator".to_string()));
                }
                toks.push(Tok::Op(BinOp::And));
            },
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err(LumenError::Script("expected || operator".to_string()));
                }
                toks.push(Tok::Op(BinOp::Or));
            },
            other => {
                return Err(LumenError::Script(format!("unexpected character: {other:?}")));
            },
        }
    }
    Ok(toks)
}

fn op(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, toks: &mut Vec<Tok>, o: BinOp) {
    chars.next();
    toks.push(Tok::Op(o));
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(toks: Vec<Tok>) -> Self {
        Self { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_program(mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            if self.peek() == Some(&Tok::Semi) {
                self.next();
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        // `let NAME = expr`
        if let Some(Tok::Ident(kw)) = self.peek()
            && kw == "let"
        {
            self.next();
            let name = match self.next() {
                Some(Tok::Ident(n)) => n,
                _ => return Err(LumenError::Script("let: expected variable name".to_string())),
            };
            if self.next() != Some(Tok::Assign) {
                return Err(LumenError::Script("let: expected `=`".to_string()));
            }
            let expr = self.parse_expr(0)?;
            return Ok(Stmt::Let(name, expr));
        }

        // `NAME = expr` (lookahead for a bare assignment).
        if let Some(Tok::Ident(name)) = self.peek().cloned()
            && self.toks.get(self.pos + 1) == Some(&Tok::Assign)
        {
            self.pos += 2;
            let expr = self.parse_expr(0)?;
            return Ok(Stmt::Assign(name, expr));
        }

        Ok(Stmt::Expr(self.parse_expr(0)?))
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_prefix()?;
        while let Some(Tok::Op(op)) = self.peek() {
            let op = *op;
            if op.precedence() <= min_prec {
                break;
            }
            self.next();
            let rhs = self.parse_expr(op.precedence())?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Tok::Int(n)) => Ok(Expr::Int(n)),
            Some(Tok::Float(x)) => Ok(Expr::Float(x)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::Op(BinOp::Sub)) => {
                let inner = self.parse_prefix()?;
                Ok(Expr::Unary(UnOp::Neg, Box::new(inner)))
            },
            Some(Tok::Not) => {
                let inner = self.parse_prefix()?;
                Ok(Expr::Unary(UnOp::Not, Box::new(inner)))
            },
            Some(Tok::LParen) => {
                let inner = self.parse_expr(0)?;
                if self.next() != Some(Tok::RParen) {
                    return Err(LumenError::Script("expected `)`".to_string()));
                }
                Ok(inner)
            },
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => {
                    if self.peek() == Some(&Tok::LParen) {
                        self.next();
                        let args = self.parse_args()?;
                        Ok(Expr::Call(name, args))
                    } else {
                        Ok(Expr::Var(name))
                    }
                },
            },
            other => Err(LumenError::Script(format!("unexpected token: {other:?}"))),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Tok::RParen) {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(0)?);
            match self.next() {
                Some(Tok::Comma) => continue,
                Some(Tok::RParen) => break,
                _ => return Err(LumenError::Script("expected `,` or `)`".to_string())),
            }
        }
        Ok(args)
    }
}
