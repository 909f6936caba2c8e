//! Compiler from cut-expression strings to [`Filter`] trees.
//!
//! Supports comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`) and two-sided
//! ranges over declared variables, boolean operators (`&&`, `||`, `!`),
//! parentheses, and references to previously defined selections by name.
//!
//! Boolean operators carry no precedence: the first `&&` or `||` at bracket
//! depth zero splits the expression, and recursion handles the rest. For
//! mixed `&&`/`||` without parentheses this can differ from a
//! precedence-climbing parse; the first-operator-wins behavior is the
//! documented contract, so parenthesize when in doubt.

use std::sync::Arc;

use cf_core::{Error, Result, VariableSet};

use crate::filter::{CmpOp, Filter};
use crate::selection::SelectionSet;

/// Compile `expr` into a filter tree.
///
/// `apply_to` restricts the whole selection to the named datasets; events of
/// other datasets then pass unconditionally. `line` is the originating
/// config line used in diagnostics, `label` the name of the selection being
/// built. `prior` holds the selections compiled so far; `expr` may reference
/// any of them by name.
pub fn compile(
    expr: &str,
    apply_to: &[String],
    line: usize,
    label: &str,
    vars: &VariableSet,
    prior: &SelectionSet,
) -> Result<Arc<Filter>> {
    tracing::debug!(label, expr, "building selection");

    check_dangling_operators(expr, line)?;
    check_parentheses(expr, line)?;
    check_boolean_operators(expr, line)?;

    let filter = compile_inner(expr, line, vars, prior)?;
    if apply_to.is_empty() {
        Ok(filter)
    } else {
        Ok(Arc::new(Filter::Scoped { inner: filter, labels: apply_to.to_vec() }))
    }
}

fn compile_inner(
    expr: &str,
    line: usize,
    vars: &VariableSet,
    prior: &SelectionSet,
) -> Result<Arc<Filter>> {
    let cleaned = clean_expression(expr);
    tracing::debug!(expr = %cleaned, "compile");

    // Whole-expression negation.
    if let Some(negated) = strip_negation(&cleaned) {
        return Ok(Arc::new(Filter::Not(compile_inner(&negated, line, vars, prior)?)));
    }

    // First boolean operator at bracket depth zero splits the expression.
    if let Some((lhs, rhs, op)) = split_at_top_level(&cleaned) {
        let l = compile_inner(lhs, line, vars, prior)?;
        let r = compile_inner(rhs, line, vars, prior)?;
        return Ok(Arc::new(match op {
            BoolOp::And => Filter::And(l, r),
            BoolOp::Or => Filter::Or(l, r),
        }));
    }

    // A previously defined selection of this name is reused as-is.
    if let Some(sel) = prior.find(&cleaned) {
        tracing::debug!(name = %cleaned, "reusing selection");
        return Ok(sel.filter());
    }

    parse_cut(&cleaned, line, vars)
}

/// Strip all whitespace, then strip parentheses enclosing the whole
/// expression, one layer at a time.
fn clean_expression(expr: &str) -> String {
    let mut cfg: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    while cfg.starts_with('(') && cfg.ends_with(')') {
        let mut depth = 0usize;
        let mut spans_whole = false;
        for (i, c) in cfg.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth == 0 {
                spans_whole = i + 1 == cfg.len();
                break;
            }
        }
        if !spans_whole {
            break;
        }
        cfg = cfg[1..cfg.len() - 1].to_string();
    }
    cfg
}

/// If a leading `!` negates the entire expression, return the expression
/// with the `!` (and any enclosing parentheses) stripped.
///
/// For a composite expression the `!` only binds when it is followed by a
/// parenthesized group whose matching `)` is the last character; otherwise
/// the `!` belongs to the first sub-expression of a later split.
fn strip_negation(expr: &str) -> Option<String> {
    if !expr.starts_with('!') {
        return None;
    }
    let rest = &expr[1..];
    if expr.contains("&&") || expr.contains("||") {
        if !rest.starts_with('(') || !rest.ends_with(')') {
            return None;
        }
        let mut depth = 0usize;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth == 0 {
                if i + 1 == rest.len() {
                    return Some(clean_expression(rest));
                }
                // The group closes before the end of the expression.
                return None;
            }
        }
        None
    } else {
        Some(clean_expression(rest))
    }
}

#[derive(Debug, Clone, Copy)]
enum BoolOp {
    And,
    Or,
}

/// Find the first `&&` or `||` at bracket depth zero and split there.
fn split_at_top_level(expr: &str) -> Option<(&str, &str, BoolOp)> {
    let bytes = expr.as_bytes();
    let mut depth = 0usize;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'&' | b'|' if depth == 0 => {
                let op = if bytes[i] == b'&' { BoolOp::And } else { BoolOp::Or };
                return Some((&expr[..i], &expr[i + 2..], op));
            }
            _ => {}
        }
    }
    None
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// Parse a leaf comparison or range expression.
fn parse_cut(expr: &str, line: usize, vars: &VariableSet) -> Result<Arc<Filter>> {
    let Some(op) = CmpOp::SEARCH_ORDER.iter().copied().find(|op| expr.contains(op.as_str()))
    else {
        return Err(Error::syntax(
            format!(
                "cut expression '{}' contains none of the valid comparison operators \
                 ('>', '>=', '<', '<=', '==', '!=')",
                expr
            ),
            line,
        ));
    };

    let parts: Vec<&str> = expr.split(op.as_str()).collect();
    match parts.as_slice() {
        [lhs, rhs] => {
            // Canonical form is `variable OP value`; a variable on the right
            // mirrors the operator.
            if let (Some(idx), Some(value)) = (vars.index_of(lhs), parse_number(rhs)) {
                Ok(Arc::new(Filter::Cut { var: lhs.to_string(), idx, op, value }))
            } else if let (Some(idx), Some(value)) = (vars.index_of(rhs), parse_number(lhs)) {
                Ok(Arc::new(Filter::Cut {
                    var: rhs.to_string(),
                    idx,
                    op: op.mirrored(),
                    value,
                }))
            } else {
                let detail = if !vars.exists(lhs) && !vars.exists(rhs) {
                    "no known variable specified"
                } else {
                    "no valid number specified"
                };
                Err(Error::syntax(
                    format!("invalid cut expression '{} {} {}': {}", lhs, op, rhs, detail),
                    line,
                ))
            }
        }
        [v1, var, v2] => {
            if matches!(op, CmpOp::Eq | CmpOp::Ne) {
                return Err(Error::syntax(
                    format!(
                        "invalid cut expression '{}': range bounds must use '<', '<=', '>' or '>='",
                        expr
                    ),
                    line,
                ));
            }
            let idx = vars.index_of(var).ok_or_else(|| {
                Error::syntax(
                    format!("invalid cut expression '{}': variable '{}' does not exist", expr, var),
                    line,
                )
            })?;
            let (Some(a), Some(b)) = (parse_number(v1), parse_number(v2)) else {
                return Err(Error::syntax(
                    format!(
                        "invalid cut expression '{}': '{}' and '{}' are no numbers",
                        expr, v1, v2
                    ),
                    line,
                ));
            };
            // `5 > x > 1` normalizes to the ascending `1 < x < 5` form.
            let closed = matches!(op, CmpOp::Ge | CmpOp::Le);
            let (low, high) = if matches!(op, CmpOp::Gt | CmpOp::Ge) { (b, a) } else { (a, b) };
            Ok(Arc::new(Filter::Range { low, var: var.to_string(), idx, high, closed }))
        }
        _ => Err(Error::syntax(format!("invalid cut expression '{}'", expr), line)),
    }
}

/// The expression must not begin or end with an operator fragment.
fn check_dangling_operators(expr: &str, line: usize) -> Result<()> {
    const OPERATOR_CHARS: &[char] = &['&', '|', '>', '<', '=', '+', '-'];
    let trimmed = expr.trim();
    if trimmed.starts_with(OPERATOR_CHARS) || trimmed.ends_with(OPERATOR_CHARS) {
        return Err(Error::syntax(
            format!("invalid cut expression '{}': dangling operator", expr),
            line,
        ));
    }
    Ok(())
}

/// Parentheses must balance, with the running count never dropping below
/// zero.
fn check_parentheses(expr: &str, line: usize) -> Result<()> {
    let mut depth = 0usize;
    for c in expr.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Err(Error::syntax(
                        format!("mismatching parentheses in cut expression '{}'", expr),
                        line,
                    ));
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(Error::syntax(
            format!("mismatching parentheses in cut expression '{}'", expr),
            line,
        ));
    }
    Ok(())
}

/// Every `&` must be part of `&&`, every `|` part of `||`.
fn check_boolean_operators(expr: &str, line: usize) -> Result<()> {
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'&' || c == b'|' {
            if i + 1 < bytes.len() && bytes[i + 1] == c {
                i += 2;
                continue;
            }
            return Err(Error::syntax(
                format!(
                    "invalid cut expression '{}': contains incomplete boolean operator '&' or '|'",
                    expr
                ),
                line,
            ));
        }
        i += 1;
    }
    Ok(())
}
