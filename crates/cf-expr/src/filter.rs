//! Predicate (filter) trees evaluated per event.

use std::fmt;
use std::sync::Arc;

/// Comparison operator of a leaf cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl CmpOp {
    /// Operators in the order the compiler searches for them. Longest first,
    /// so `>=` is never mis-split into `>` and a dangling `=`.
    pub(crate) const SEARCH_ORDER: [CmpOp; 6] =
        [CmpOp::Ge, CmpOp::Gt, CmpOp::Le, CmpOp::Lt, CmpOp::Eq, CmpOp::Ne];

    /// Source representation of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }

    /// Mirror the comparison for swapped operands, so `5 < x` canonicalizes
    /// to `x > 5`. Equality operators are their own mirror.
    pub fn mirrored(self) -> CmpOp {
        match self {
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            other => other,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the selection predicate tree.
///
/// Sub-trees referenced by several named selections are shared via [`Arc`],
/// never deep-copied; a tree is immutable once built.
#[derive(Debug)]
pub enum Filter {
    /// `var OP value`. `idx` is the variable's schema index, resolved at
    /// compile time so evaluation is an indexed load.
    Cut {
        /// Variable name, kept for display.
        var: String,
        /// Schema index of the variable.
        idx: usize,
        /// Comparison operator, canonicalized to `variable OP value`.
        op: CmpOp,
        /// Threshold literal.
        value: f64,
    },
    /// Double-sided bound, `low < x < high` or `low <= x <= high`. Both
    /// bounds share the same strictness.
    Range {
        /// Lower bound.
        low: f64,
        /// Variable name, kept for display.
        var: String,
        /// Schema index of the variable.
        idx: usize,
        /// Upper bound.
        high: f64,
        /// `true` for `<=` on both sides, `false` for `<`.
        closed: bool,
    },
    /// Short-circuit conjunction.
    And(Arc<Filter>, Arc<Filter>),
    /// Short-circuit disjunction.
    Or(Arc<Filter>, Arc<Filter>),
    /// Logical negation.
    Not(Arc<Filter>),
    /// Applies `inner` only to events of the listed datasets; events of any
    /// other dataset pass unconditionally.
    Scoped {
        /// The restricted filter.
        inner: Arc<Filter>,
        /// Dataset labels the filter applies to.
        labels: Vec<String>,
    },
    /// Accepts every event (identity selection).
    True,
}

impl Filter {
    /// Evaluate against one event's variable values. Pure.
    pub fn passes(&self, values: &[f64], dataset_label: &str) -> bool {
        match self {
            Filter::Cut { idx, op, value, .. } => op.apply(values[*idx], *value),
            Filter::Range { low, idx, high, closed, .. } => {
                let x = values[*idx];
                if *closed {
                    x >= *low && x <= *high
                } else {
                    x > *low && x < *high
                }
            }
            Filter::And(l, r) => l.passes(values, dataset_label) && r.passes(values, dataset_label),
            Filter::Or(l, r) => l.passes(values, dataset_label) || r.passes(values, dataset_label),
            Filter::Not(inner) => !inner.passes(values, dataset_label),
            Filter::Scoped { inner, labels } => {
                if labels.iter().any(|l| l == dataset_label) {
                    inner.passes(values, dataset_label)
                } else {
                    true
                }
            }
            Filter::True => true,
        }
    }

    /// Canonical textual identity, reconstructed compositionally from the
    /// tree. Compiling the same expression twice yields the same uid.
    pub fn uid(&self) -> String {
        match self {
            Filter::Cut { var, op, value, .. } => format!("{} {} {}", var, op, value),
            Filter::Range { low, var, high, closed, .. } => {
                let op = if *closed { "<=" } else { "<" };
                format!("{} {} {} {} {}", low, op, var, op, high)
            }
            Filter::And(l, r) => format!("[{}] AND [{}]", l.uid(), r.uid()),
            Filter::Or(l, r) => format!("[{}] OR [{}]", l.uid(), r.uid()),
            Filter::Not(inner) => format!("NOT[{}]", inner.uid()),
            Filter::Scoped { inner, labels } => {
                format!("[{}] ({})", inner.uid(), labels.join(", "))
            }
            Filter::True => "TRUE".to_string(),
        }
    }

    /// ASCII rendering of the filter tree, one node per line. Used by the
    /// report when a selection asks for its tree to be printed.
    pub fn tree_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_tree_lines("    ", &mut out);
        out
    }

    fn collect_tree_lines(&self, indent: &str, out: &mut Vec<String>) {
        match self {
            Filter::And(l, r) | Filter::Or(l, r) => {
                let name = if matches!(self, Filter::And(..)) { "AND" } else { "OR" };
                out.push(format!("{}|-- {}", indent, name));
                let deeper = format!("{}    ", indent);
                l.collect_tree_lines(&deeper, out);
                r.collect_tree_lines(&deeper, out);
            }
            Filter::Scoped { inner, labels } => {
                out.push(format!("{}({})", indent, labels.join(", ")));
                inner.collect_tree_lines(indent, out);
            }
            other => out.push(format!("{}|-- {}", indent, other.uid())),
        }
    }
}
