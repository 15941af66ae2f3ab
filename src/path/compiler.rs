//! Path Compiler (spec §4.2): turns a path string into a flat sequence of
//! `Step`s. Navigation (`Child`, `Descendant`, `Wildcard`, `Parent`) and
//! predicates (`Index`, `Slice`, `Function`, `Expression`) are peers in the
//! same list — `/a[0]` compiles to `[Child("a"), Index(0)]`, applied in
//! order by the evaluator.

use crate::error::{Error, Result};

use super::lexer::Cursor;
use super::{CompiledPath, Step};

pub(crate) fn compile(path: &str) -> Result<CompiledPath> {
    let mut cur = Cursor::new(path);
    let mut steps = Vec::new();

    // Predicates may sit directly after the root with no leading '/',
    // e.g. `['user.profile']/name` (spec §4.2 lexical rules).
    cur.skip_ws();
    parse_predicates(&mut cur, &mut steps)?;

    // A bare name at path start, with no leading '/', is also a valid
    // first step (spec §4.2: "Child(name) — `/name` or bare name at
    // start").
    cur.skip_ws();
    if !cur.at_end() && cur.peek() != Some('/') && cur.peek() != Some('[') {
        if matches!(cur.peek(), Some('\'') | Some('"')) {
            let name = cur.read_quoted()?;
            steps.push(Step::Child(name));
        } else {
            let name = cur.read_bare_name();
            if name.is_empty() {
                return Err(Error::PathSyntaxError(format!(
                    "expected a step name in path {:?}",
                    path
                )));
            }
            steps.push(Step::Child(name));
        }
        parse_predicates(&mut cur, &mut steps)?;
    }

    loop {
        cur.skip_ws();
        if cur.at_end() {
            break;
        }
        if !cur.eat('/') {
            return Err(Error::PathSyntaxError(format!(
                "expected '/' at {:?} in path {:?}",
                remaining(&mut cur),
                path
            )));
        }
        let descendant = cur.eat('/');
        cur.skip_ws();

        if cur.peek() == Some('[') {
            if descendant {
                steps.push(Step::Descendant(None));
            }
            parse_predicates(&mut cur, &mut steps)?;
            continue;
        }

        if cur.eat('*') {
            steps.push(if descendant {
                Step::Descendant(None)
            } else {
                Step::Wildcard
            });
        } else if cur.peek() == Some('.') && cur.peek2() == Some('.') {
            cur.bump();
            cur.bump();
            steps.push(Step::Parent);
        } else if matches!(cur.peek(), Some('\'') | Some('"')) {
            let name = cur.read_quoted()?;
            push_named(&mut steps, descendant, name);
        } else {
            let name = cur.read_bare_name();
            if name.is_empty() {
                return Err(Error::PathSyntaxError(format!(
                    "expected a step name in path {:?}",
                    path
                )));
            }
            push_named(&mut steps, descendant, name);
        }
        parse_predicates(&mut cur, &mut steps)?;
    }

    Ok(CompiledPath { steps })
}

fn push_named(steps: &mut Vec<Step>, descendant: bool, name: String) {
    if descendant {
        steps.push(Step::Descendant(Some(name)));
    } else {
        steps.push(Step::Child(name));
    }
}

fn parse_predicates(cur: &mut Cursor, steps: &mut Vec<Step>) -> Result<()> {
    while cur.peek() == Some('[') {
        cur.bump();
        let body = read_bracket_body(cur)?;
        steps.push(classify_predicate(&body)?);
    }
    Ok(())
}

/// Reads up to (and consuming) the matching `]`, respecting nested
/// brackets and quoted strings so a filter expression's own `[...]` or
/// string literals containing `]` don't terminate the predicate early.
fn read_bracket_body(cur: &mut Cursor) -> Result<String> {
    let mut depth = 1;
    let mut out = String::new();
    loop {
        match cur.bump() {
            None => return Err(Error::PathSyntaxError("unterminated predicate".into())),
            Some('[') => {
                depth += 1;
                out.push('[');
            }
            Some(']') => {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
                out.push(']');
            }
            Some(q @ ('\'' | '"')) => {
                out.push(q);
                loop {
                    match cur.bump() {
                        None => return Err(Error::PathSyntaxError("unterminated string in predicate".into())),
                        Some('\\') => {
                            out.push('\\');
                            if let Some(n) = cur.bump() {
                                out.push(n);
                            }
                        }
                        Some(c) if c == q => {
                            out.push(c);
                            break;
                        }
                        Some(c) => out.push(c),
                    }
                }
            }
            Some(c) => out.push(c),
        }
    }
}

fn classify_predicate(body: &str) -> Result<Step> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::PathSyntaxError("empty predicate `[]`".into()));
    }
    // A bracket whose entire body is one quoted string is an alternate
    // spelling for a step name, used when the name itself contains `/`,
    // `.`, spaces, or quotes (spec §4.2: `['a"key']`, `["a'key"]`).
    if is_fully_quoted(trimmed) {
        let name = Cursor::new(trimmed).read_quoted()?;
        return Ok(Step::Child(name));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Step::Index(i));
    }
    if let Some(step) = try_parse_slice(trimmed) {
        return Ok(step);
    }
    // `[@name]` with nothing else invokes a registered function; anything
    // more than a bare identifier after `@` (a dotted path, a comparison)
    // is a filter expression instead (spec §4.2/§4.3).
    if let Some(rest) = trimmed.strip_prefix('@') {
        if !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Ok(Step::Function(rest.to_string()));
        }
    }
    let expr = crate::filter::parse(trimmed)?;
    Ok(Step::Expression(expr))
}

fn is_fully_quoted(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2
        && ((bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"'))
}

fn try_parse_slice(s: &str) -> Option<Step> {
    let (lo_str, hi_str) = s.split_once(':')?;
    let lo_str = lo_str.trim();
    let hi_str = hi_str.trim();
    let lo = if lo_str.is_empty() {
        None
    } else {
        Some(lo_str.parse::<i64>().ok()?)
    };
    let hi = if hi_str.is_empty() {
        None
    } else {
        Some(hi_str.parse::<i64>().ok()?)
    };
    Some(Step::Slice(lo, hi))
}

fn remaining(cur: &mut Cursor) -> String {
    let mut out = String::new();
    while let Some(c) = cur.peek() {
        out.push(c);
        cur.bump();
        if out.len() > 32 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_child_path() {
        let p = compile("/a/b").unwrap();
        assert_eq!(p.steps.len(), 2);
        assert!(matches!(p.steps[0], Step::Child(ref s) if s == "a"));
        assert!(matches!(p.steps[1], Step::Child(ref s) if s == "b"));
    }

    #[test]
    fn compiles_index_and_wildcard() {
        let p = compile("/items[0]/*").unwrap();
        assert!(matches!(p.steps[0], Step::Child(ref s) if s == "items"));
        assert!(matches!(p.steps[1], Step::Index(0)));
        assert!(matches!(p.steps[2], Step::Wildcard));
    }

    #[test]
    fn compiles_descendant_and_slice() {
        let p = compile("//name[1:3]").unwrap();
        assert!(matches!(p.steps[0], Step::Descendant(Some(ref s)) if s == "name"));
        assert!(matches!(p.steps[1], Step::Slice(Some(1), Some(3))));
    }

    #[test]
    fn compiles_quoted_step_name() {
        let p = compile("/'weird name'").unwrap();
        assert!(matches!(p.steps[0], Step::Child(ref s) if s == "weird name"));
    }

    #[test]
    fn compiles_function_predicate() {
        let p = compile("/books[@cheap]").unwrap();
        assert!(matches!(p.steps[0], Step::Child(ref s) if s == "books"));
        assert!(matches!(p.steps[1], Step::Function(ref s) if s == "cheap"));
    }

    #[test]
    fn compiles_expression_predicate() {
        let p = compile("/items[@active == true]").unwrap();
        assert!(matches!(p.steps[1], Step::Expression(_)));
    }

    #[test]
    fn compiles_bracket_quoted_name_directly_on_root() {
        let p = compile("['user.profile']/name").unwrap();
        assert!(matches!(p.steps[0], Step::Child(ref s) if s == "user.profile"));
        assert!(matches!(p.steps[1], Step::Child(ref s) if s == "name"));
    }

    #[test]
    fn bare_name_at_start_is_a_valid_child_step() {
        let p = compile("a/b").unwrap();
        assert!(matches!(p.steps[0], Step::Child(ref s) if s == "a"));
        assert!(matches!(p.steps[1], Step::Child(ref s) if s == "b"));
    }

    #[test]
    fn rejects_path_missing_a_step_name() {
        assert!(compile("/a//").is_err());
    }
}
