//! Filter Evaluator (spec §4.3): the boolean/comparison expression language
//! used inside path predicates — `@` for a path relative to the predicate's
//! context node, `$` for a path relative to the document root, string,
//! number, bool, and null literals, `==`/`!=`/`<`/`<=`/`>`/`>=` comparisons,
//! and `&&`/`||` with short-circuit evaluation.

use crate::error::{Error, Result};
use crate::node::{Node, Type};
use crate::path::lexer::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One segment of the simple dot/bracket path grammar a filter expression
/// allows after `@`/`$` (spec §6's `value` production): `.name` or
/// `[index]`, repeated.
#[derive(Debug, Clone)]
pub(crate) enum PathSeg {
    Field(String),
    Index(i64),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    StringLit(String),
    NumberLit(f64),
    BoolLit(bool),
    NullLit,
    /// `@` (current item), optionally followed by `.field`/`[index]` segments.
    ContextPath(Vec<PathSeg>),
    /// `$` (root data), same segment grammar.
    RootPath(Vec<PathSeg>),
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

pub(crate) fn parse(input: &str) -> Result<Expr> {
    let mut cur = Cursor::new(input);
    let expr = parse_or(&mut cur)?;
    cur.skip_ws();
    if !cur.at_end() {
        return Err(Error::PathSyntaxError(format!(
            "unexpected trailing text in predicate {:?}",
            input
        )));
    }
    Ok(expr)
}

fn parse_or(cur: &mut Cursor) -> Result<Expr> {
    let mut left = parse_and(cur)?;
    loop {
        cur.skip_ws();
        if cur.eat_str("||") {
            let right = parse_and(cur)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        } else {
            return Ok(left);
        }
    }
}

fn parse_and(cur: &mut Cursor) -> Result<Expr> {
    let mut left = parse_cmp(cur)?;
    loop {
        cur.skip_ws();
        if cur.eat_str("&&") {
            let right = parse_cmp(cur)?;
            left = Expr::And(Box::new(left), Box::new(right));
        } else {
            return Ok(left);
        }
    }
}

fn parse_cmp(cur: &mut Cursor) -> Result<Expr> {
    let left = parse_unary(cur)?;
    cur.skip_ws();
    let op = if cur.eat_str("==") {
        Some(CmpOp::Eq)
    } else if cur.eat_str("!=") {
        Some(CmpOp::Ne)
    } else if cur.eat_str("<=") {
        Some(CmpOp::Le)
    } else if cur.eat_str(">=") {
        Some(CmpOp::Ge)
    } else if cur.eat_str("<") {
        Some(CmpOp::Lt)
    } else if cur.eat_str(">") {
        Some(CmpOp::Gt)
    } else {
        None
    };
    match op {
        Some(op) => {
            let right = parse_unary(cur)?;
            Ok(Expr::Cmp(Box::new(left), op, Box::new(right)))
        }
        None => Ok(left),
    }
}

fn parse_unary(cur: &mut Cursor) -> Result<Expr> {
    cur.skip_ws();
    if cur.eat('!') {
        return Ok(Expr::Not(Box::new(parse_unary(cur)?)));
    }
    parse_primary(cur)
}

fn parse_primary(cur: &mut Cursor) -> Result<Expr> {
    cur.skip_ws();
    if cur.eat('(') {
        let inner = parse_or(cur)?;
        cur.skip_ws();
        if !cur.eat(')') {
            return Err(Error::PathSyntaxError("unmatched '(' in predicate".into()));
        }
        return Ok(inner);
    }
    if cur.eat('@') {
        return Ok(Expr::ContextPath(read_path_segs(cur)?));
    }
    if cur.eat('$') {
        return Ok(Expr::RootPath(read_path_segs(cur)?));
    }
    match cur.peek() {
        Some('\'') | Some('"') => Ok(Expr::StringLit(cur.read_quoted()?)),
        Some(c) if c.is_ascii_digit() || c == '-' => Ok(Expr::NumberLit(cur.read_number_literal()?)),
        Some(c) if c.is_alphabetic() => {
            let ident = cur.read_ident();
            match ident.as_str() {
                "true" => Ok(Expr::BoolLit(true)),
                "false" => Ok(Expr::BoolLit(false)),
                "null" => Ok(Expr::NullLit),
                other => Err(Error::PathSyntaxError(format!(
                    "unexpected identifier {:?} in predicate",
                    other
                ))),
            }
        }
        other => Err(Error::PathSyntaxError(format!("unexpected {:?} in predicate", other))),
    }
}

/// Reads zero or more `.name`/`[index]` segments following `@`/`$` (spec
/// §6 `value` grammar). No dot, no bracket: the reference is to the whole
/// node (`@` alone, `$` alone).
fn read_path_segs(cur: &mut Cursor) -> Result<Vec<PathSeg>> {
    let mut segs = Vec::new();
    loop {
        if cur.eat('.') {
            let name = cur.read_path_name();
            if name.is_empty() {
                return Err(Error::PathSyntaxError("expected a field name after '.'".into()));
            }
            segs.push(PathSeg::Field(name));
        } else if cur.peek() == Some('[') {
            cur.bump();
            cur.skip_ws();
            let i = cur.read_signed_int()?;
            cur.skip_ws();
            if !cur.eat(']') {
                return Err(Error::PathSyntaxError("expected ']' in path reference".into()));
            }
            segs.push(PathSeg::Index(i));
        } else {
            break;
        }
    }
    Ok(segs)
}

/// Evaluates `expr` to a boolean, with `root` and `ctx` anchoring `$`/`@`
/// path references (spec §4.3). Per-item evaluation errors (a referenced
/// path not existing, a type mismatch) are absorbed as `false` rather than
/// aborting the whole predicate — see SPEC_FULL.md's note on silent
/// per-item failure.
pub(crate) fn eval_bool(expr: &Expr, root: &Node, ctx: &Node) -> bool {
    match expr {
        Expr::And(a, b) => eval_bool(a, root, ctx) && eval_bool(b, root, ctx),
        Expr::Or(a, b) => eval_bool(a, root, ctx) || eval_bool(b, root, ctx),
        Expr::Not(a) => !eval_bool(a, root, ctx),
        Expr::Cmp(a, op, b) => {
            let x = resolve(a, root, ctx);
            let y = resolve(b, root, ctx);
            compare_nodes(*op, &x, &y)
        }
        other => truthy(&resolve(other, root, ctx)),
    }
}

fn resolve(expr: &Expr, root: &Node, ctx: &Node) -> Node {
    match expr {
        Expr::StringLit(s) => Node::from_string(s.clone()),
        Expr::NumberLit(n) => Node::from_number(*n),
        Expr::BoolLit(b) => Node::from_bool(*b),
        Expr::NullLit => Node::null_value(),
        Expr::ContextPath(segs) => apply_segs(ctx, segs),
        Expr::RootPath(segs) => apply_segs(root, segs),
        Expr::And(..) | Expr::Or(..) | Expr::Not(..) | Expr::Cmp(..) => Node::from_bool(eval_bool(expr, root, ctx)),
    }
}

/// Walks `.field`/`[index]` segments off `base` directly through `get`/
/// `index`, short-circuiting on the first invalid result.
fn apply_segs(base: &Node, segs: &[PathSeg]) -> Node {
    let mut cur = base.clone();
    for seg in segs {
        if !cur.is_valid() {
            return cur;
        }
        cur = match seg {
            PathSeg::Field(name) => cur.get(name),
            PathSeg::Index(i) => cur.index(*i),
        };
    }
    cur
}

fn truthy(n: &Node) -> bool {
    if !n.is_valid() {
        return false;
    }
    match n.kind() {
        Type::Null | Type::Invalid => false,
        Type::Bool => n.bool_value().unwrap_or(false),
        Type::Number => n.raw_float() != 0.0,
        Type::String => !n.string_value().unwrap_or_default().is_empty(),
        _ => true,
    }
}

/// Numeric comparison if both sides parse as numbers, then bool, then
/// falls back to string comparison of their rendered text (spec §4.3
/// "numeric-vs-string comparison semantics").
fn compare_nodes(op: CmpOp, a: &Node, b: &Node) -> bool {
    if let (Some(x), Some(y)) = (a.float(), b.float()) {
        return apply_num(op, x, y);
    }
    if a.kind() == Type::Null || b.kind() == Type::Null {
        let eq = a.kind() == Type::Null && b.kind() == Type::Null;
        return match op {
            CmpOp::Eq => eq,
            CmpOp::Ne => !eq,
            _ => false,
        };
    }
    if let (Some(x), Some(y)) = (a.bool_value(), b.bool_value()) {
        let eq = x == y;
        return match op {
            CmpOp::Eq => eq,
            CmpOp::Ne => !eq,
            _ => false,
        };
    }
    let x = a.string_value().unwrap_or_else(|| a.string());
    let y = b.string_value().unwrap_or_else(|| b.string());
    apply_str(op, &x, &y)
}

fn apply_num(op: CmpOp, x: f64, y: f64) -> bool {
    match op {
        CmpOp::Eq => x == y,
        CmpOp::Ne => x != y,
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
    }
}

fn apply_str(op: CmpOp, x: &str, y: &str) -> bool {
    match op {
        CmpOp::Eq => x == y,
        CmpOp::Ne => x != y,
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let e = parse("@.active == true").unwrap();
        assert!(matches!(e, Expr::Cmp(_, CmpOp::Eq, _)));
    }

    #[test]
    fn parses_and_or_precedence() {
        // && should bind tighter than ||, i.e. this parses as (a && b) || c
        let e = parse("@.a == 1 && @.b == 2 || @.c == 3").unwrap();
        match e {
            Expr::Or(lhs, _) => assert!(matches!(*lhs, Expr::And(..))),
            _ => panic!("expected top-level Or"),
        }
    }

    #[test]
    fn parses_bare_context_and_root_refs() {
        // `@` and `$` alone (no segments) refer to the whole node.
        let e = parse("@ == $").unwrap();
        assert!(matches!(e, Expr::Cmp(_, CmpOp::Eq, _)));
    }

    #[test]
    fn parses_index_segment() {
        let e = parse("@.items[0] == 1").unwrap();
        match e {
            Expr::Cmp(lhs, CmpOp::Eq, _) => match *lhs {
                Expr::ContextPath(segs) => {
                    assert!(matches!(segs[0], PathSeg::Field(ref s) if s == "items"));
                    assert!(matches!(segs[1], PathSeg::Index(0)));
                }
                _ => panic!("expected ContextPath"),
            },
            _ => panic!("expected top-level Cmp"),
        }
    }

    #[test]
    fn numeric_comparison_prefers_numbers() {
        let a = Node::from_number(10.0);
        let b = Node::from_number(10.0);
        assert!(compare_nodes(CmpOp::Eq, &a, &b));
        assert!(!compare_nodes(CmpOp::Lt, &a, &b));
    }

    #[test]
    fn truthy_rules() {
        assert!(!truthy(&Node::null_value()));
        assert!(!truthy(&Node::from_bool(false)));
        assert!(truthy(&Node::from_bool(true)));
        assert!(!truthy(&Node::from_string("")));
        assert!(truthy(&Node::from_string("x")));
        assert!(!truthy(&Node::from_number(0.0)));
        assert!(truthy(&Node::from_number(1.0)));
    }
}
