//! Boolean/arithmetic selection expressions over scalar event columns.
//!
//! Used for per-histogram local cuts. Supports arithmetic (+, -, *, /),
//! comparisons (==, !=, <, <=, >, >=), boolean operators (&&, ||, !) and a
//! small function set: abs, sqrt, min, max, and bitand for status-word bit
//! tests such as `bitand(Timing0_status, 4) == 0`.

use dq_core::{Error, Result};

use crate::column::EventBatch;

#[derive(Debug, Clone)]
enum Node {
    Const(f64),
    Column(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Builtin, Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Abs,
    Sqrt,
    Min,
    Max,
    BitAnd,
}

impl Builtin {
    fn arity(self) -> usize {
        match self {
            Builtin::Abs | Builtin::Sqrt => 1,
            Builtin::Min | Builtin::Max | Builtin::BitAnd => 2,
        }
    }
}

/// A parsed selection expression.
///
/// Identifiers refer to scalar columns of the batch the expression is
/// evaluated against; truth is "value > 0". Comparisons involving NaN are
/// false, so events with undefined inputs fail the selection rather than
/// poisoning it.
#[derive(Debug, Clone)]
pub struct SelectionExpr {
    root: Node,
    /// Column names referenced, ordered by first occurrence.
    pub columns: Vec<String>,
}

impl SelectionExpr {
    /// Parse an expression string.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = lex(input)?;
        let mut p = Parser { tokens: &tokens, pos: 0, columns: Vec::new() };
        let root = p.or_expr()?;
        if p.pos != p.tokens.len() {
            return Err(Error::Expression(format!(
                "trailing input after expression: {:?}",
                p.tokens[p.pos]
            )));
        }
        Ok(SelectionExpr { root, columns: p.columns })
    }

    /// Evaluate for every event of `batch`, returning a boolean keep-mask.
    ///
    /// Fails if a referenced column is absent or jagged.
    pub fn eval_mask(&self, batch: &EventBatch) -> Result<Vec<bool>> {
        let cols: Vec<&[f64]> = self
            .columns
            .iter()
            .map(|name| {
                batch
                    .column(name)
                    .ok_or_else(|| Error::Expression(format!("unknown column '{name}'")))?
                    .as_scalar()
            })
            .collect::<Result<_>>()?;

        let n = batch.n_events();
        let mut row = vec![0.0; cols.len()];
        let mut mask = Vec::with_capacity(n);
        for i in 0..n {
            for (j, col) in cols.iter().enumerate() {
                row[j] = col[i];
            }
            mask.push(eval(&self.root, &row) > 0.0);
        }
        Ok(mask)
    }

    /// Evaluate against a single row of values (ordered as `columns`).
    #[cfg(test)]
    fn eval_row(&self, values: &[f64]) -> f64 {
        eval(&self.root, values)
    }
}

fn truth(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn eval(node: &Node, row: &[f64]) -> f64 {
    match node {
        Node::Const(c) => *c,
        Node::Column(i) => row[*i],
        Node::Neg(a) => -eval(a, row),
        Node::Not(a) => 1.0 - truth(eval(a, row)),
        Node::Binary(op, a, b) => {
            let l = eval(a, row);
            let r = eval(b, row);
            match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => l / r,
                Op::Eq => truth(if l == r { 1.0 } else { 0.0 }),
                Op::Ne => truth(if l != r { 1.0 } else { 0.0 }),
                Op::Lt => truth(if l < r { 1.0 } else { 0.0 }),
                Op::Le => truth(if l <= r { 1.0 } else { 0.0 }),
                Op::Gt => truth(if l > r { 1.0 } else { 0.0 }),
                Op::Ge => truth(if l >= r { 1.0 } else { 0.0 }),
                Op::And => truth(l) * truth(r),
                Op::Or => truth(truth(l) + truth(r)),
            }
        }
        Node::Call(f, args) => {
            let a = eval(&args[0], row);
            match f {
                Builtin::Abs => a.abs(),
                Builtin::Sqrt => a.sqrt(),
                Builtin::Min => a.min(eval(&args[1], row)),
                Builtin::Max => a.max(eval(&args[1], row)),
                Builtin::BitAnd => {
                    let b = eval(&args[1], row);
                    ((a as i64) & (b as i64)) as f64
                }
            }
        }
    }
}

// ── Lexer ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(Op),
    Not,
    Minus,
    LParen,
    RParen,
    Comma,
}

fn lex(input: &str) -> Result<Vec<Tok>> {
    if !input.is_ascii() {
        return Err(Error::Expression("expressions must be ASCII".into()));
    }
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let two = if i + 1 < bytes.len() { &input[i..i + 2] } else { "" };
        let tok2 = match two {
            "&&" => Some(Tok::Op(Op::And)),
            "||" => Some(Tok::Op(Op::Or)),
            "==" => Some(Tok::Op(Op::Eq)),
            "!=" => Some(Tok::Op(Op::Ne)),
            "<=" => Some(Tok::Op(Op::Le)),
            ">=" => Some(Tok::Op(Op::Ge)),
            _ => None,
        };
        if let Some(t) = tok2 {
            out.push(t);
            i += 2;
            continue;
        }
        match c {
            '+' => out.push(Tok::Op(Op::Add)),
            '-' => out.push(Tok::Minus),
            '*' => out.push(Tok::Op(Op::Mul)),
            '/' => out.push(Tok::Op(Op::Div)),
            '<' => out.push(Tok::Op(Op::Lt)),
            '>' => out.push(Tok::Op(Op::Gt)),
            '!' => out.push(Tok::Not),
            '(' => out.push(Tok::LParen),
            ')' => out.push(Tok::RParen),
            ',' => out.push(Tok::Comma),
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < bytes.len() {
                    let d = bytes[i] as char;
                    let exp_sign = (d == '+' || d == '-')
                        && i > start
                        && matches!(bytes[i - 1] as char, 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text = &input[start..i];
                let n: f64 = text
                    .parse()
                    .map_err(|_| Error::Expression(format!("invalid number '{text}'")))?;
                out.push(Tok::Num(n));
                continue;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                out.push(Tok::Ident(input[start..i].to_string()));
                continue;
            }
            _ => return Err(Error::Expression(format!("unexpected character '{c}'"))),
        }
        i += 1;
    }
    Ok(out)
}

// ── Parser ─────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Tok],
    pos: usize,
    columns: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_op(&mut self, ops: &[Op]) -> Option<Op> {
        if let Some(Tok::Op(op)) = self.peek() {
            if ops.contains(op) {
                let op = *op;
                self.pos += 1;
                return Some(op);
            }
        }
        None
    }

    fn column_index(&mut self, name: &str) -> usize {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        }
    }

    fn or_expr(&mut self) -> Result<Node> {
        let mut lhs = self.and_expr()?;
        while self.eat_op(&[Op::Or]).is_some() {
            let rhs = self.and_expr()?;
            lhs = Node::Binary(Op::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Node> {
        let mut lhs = self.cmp_expr()?;
        while self.eat_op(&[Op::And]).is_some() {
            let rhs = self.cmp_expr()?;
            lhs = Node::Binary(Op::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Node> {
        let lhs = self.add_expr()?;
        if let Some(op) = self.eat_op(&[Op::Eq, Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge]) {
            let rhs = self.add_expr()?;
            return Ok(Node::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Node> {
        let mut lhs = self.mul_expr()?;
        loop {
            if self.eat_op(&[Op::Add]).is_some() {
                let rhs = self.mul_expr()?;
                lhs = Node::Binary(Op::Add, Box::new(lhs), Box::new(rhs));
            } else if matches!(self.peek(), Some(Tok::Minus)) {
                self.pos += 1;
                let rhs = self.mul_expr()?;
                lhs = Node::Binary(Op::Sub, Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Node> {
        let mut lhs = self.unary_expr()?;
        while let Some(op) = self.eat_op(&[Op::Mul, Op::Div]) {
            let rhs = self.unary_expr()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary_expr()?)))
            }
            Some(Tok::Not) => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.unary_expr()?)))
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Node> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(Node::Const(n)),
            Some(Tok::LParen) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Tok::RParen) => Ok(inner),
                    other => Err(Error::Expression(format!("expected ')', got {other:?}"))),
                }
            }
            Some(Tok::Ident(name)) => {
                if matches!(self.peek(), Some(Tok::LParen)) {
                    self.pos += 1;
                    let builtin = match name.as_str() {
                        "abs" => Builtin::Abs,
                        "sqrt" => Builtin::Sqrt,
                        "min" => Builtin::Min,
                        "max" => Builtin::Max,
                        "bitand" => Builtin::BitAnd,
                        _ => {
                            return Err(Error::Expression(format!("unknown function '{name}'")));
                        }
                    };
                    let mut args = vec![self.or_expr()?];
                    while matches!(self.peek(), Some(Tok::Comma)) {
                        self.pos += 1;
                        args.push(self.or_expr()?);
                    }
                    match self.bump() {
                        Some(Tok::RParen) => {}
                        other => {
                            return Err(Error::Expression(format!("expected ')', got {other:?}")));
                        }
                    }
                    if args.len() != builtin.arity() {
                        return Err(Error::Expression(format!(
                            "'{name}' takes {} argument(s), got {}",
                            builtin.arity(),
                            args.len()
                        )));
                    }
                    Ok(Node::Call(builtin, args))
                } else {
                    let idx = self.column_index(&name);
                    Ok(Node::Column(idx))
                }
            }
            other => Err(Error::Expression(format!("expected value, got {other:?}"))),
        }
    }
}
