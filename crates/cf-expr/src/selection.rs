//! Named selections and their ordered registry.

use std::sync::Arc;

use cf_core::{Error, Result, VariableSet};

use crate::compile;
use crate::filter::Filter;

/// Name of the distinguished identity selection, present in every registry.
pub const UNSELECTED: &str = "unselected";

/// One declared selection, as produced by the config layer: a label, a cut
/// expression, an optional dataset restriction, and the originating config
/// line for diagnostics.
#[derive(Debug, Clone)]
pub struct SelectionDecl {
    /// Selection name; later declarations may reference it in their cuts.
    pub label: String,
    /// Cut expression.
    pub cuts: String,
    /// Dataset labels the selection is restricted to (empty = all).
    pub apply_to: Vec<String>,
    /// Config line of the declaration.
    pub line: usize,
}

/// A named, compiled selection.
#[derive(Debug, Clone)]
pub struct Selection {
    name: String,
    filter: Arc<Filter>,
}

impl Selection {
    /// Selection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the compiled filter tree.
    pub fn filter(&self) -> Arc<Filter> {
        Arc::clone(&self.filter)
    }

    /// Evaluate this selection for one event.
    pub fn passes(&self, values: &[f64], dataset_label: &str) -> bool {
        self.filter.passes(values, dataset_label)
    }
}

/// Ordered registry of named selections.
///
/// Insertion order is significant: a selection may reference any earlier
/// selection by name in its cut expression, never a later one. The registry
/// is built once during setup and read-only afterwards.
#[derive(Debug, Default)]
pub struct SelectionSet {
    selections: Vec<Selection>,
}

impl SelectionSet {
    /// Registry containing only the identity selection.
    pub fn identity() -> Self {
        let mut set = SelectionSet::default();
        set.selections
            .push(Selection { name: UNSELECTED.to_string(), filter: Arc::new(Filter::True) });
        set
    }

    /// Compile all declared selections, in declaration order.
    ///
    /// The identity selection is always registered first, so it exists even
    /// when no selections are declared at all.
    pub fn from_decls(decls: &[SelectionDecl], vars: &VariableSet) -> Result<Self> {
        let mut set = SelectionSet::identity();
        for decl in decls {
            let filter =
                compile::compile(&decl.cuts, &decl.apply_to, decl.line, &decl.label, vars, &set)?;
            set.register(&decl.label, filter)?;
        }
        Ok(set)
    }

    /// Add a compiled selection. Names must be unique.
    pub fn register(&mut self, name: &str, filter: Arc<Filter>) -> Result<()> {
        if self.find(name).is_some() {
            return Err(Error::Validation(format!("a selection named '{}' already exists", name)));
        }
        self.selections.push(Selection { name: name.to_string(), filter });
        Ok(())
    }

    /// Look up a selection by name.
    pub fn find(&self, name: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| s.name == name)
    }

    /// Selections in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter()
    }

    /// Number of registered selections (identity included).
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    /// Whether the registry is empty. A registry built through
    /// [`SelectionSet::identity`] or [`SelectionSet::from_decls`] never is.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Length of the longest selection name, for report column widths.
    pub fn max_name_len(&self) -> usize {
        self.selections.iter().map(|s| s.name.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> VariableSet {
        VariableSet::from_names(["ht", "mht"]).unwrap()
    }

    fn decl(label: &str, cuts: &str, line: usize) -> SelectionDecl {
        SelectionDecl { label: label.to_string(), cuts: cuts.to_string(), apply_to: vec![], line }
    }

    #[test]
    fn identity_selection_always_exists() {
        let set = SelectionSet::from_decls(&[], &vars()).unwrap();
        assert_eq!(set.len(), 1);
        let unselected = set.find(UNSELECTED).unwrap();
        assert!(unselected.passes(&[0.0, 0.0], "any"));
    }

    #[test]
    fn declarations_compile_in_order_and_may_reference_earlier_ones() {
        let decls =
            [decl("baseline", "ht > 500", 10), decl("tight", "baseline && mht > 200", 11)];
        let set = SelectionSet::from_decls(&decls, &vars()).unwrap();
        assert_eq!(set.len(), 3);
        let names: Vec<&str> = set.iter().map(|s| s.name()).collect();
        assert_eq!(names, [UNSELECTED, "baseline", "tight"]);

        let tight = set.find("tight").unwrap();
        assert!(tight.passes(&[600.0, 300.0], "d"));
        assert!(!tight.passes(&[600.0, 100.0], "d"));
        assert_eq!(set.max_name_len(), UNSELECTED.len());
    }

    #[test]
    fn forward_references_do_not_resolve() {
        let decls = [decl("tight", "baseline && mht > 200", 1), decl("baseline", "ht > 500", 2)];
        let err = SelectionSet::from_decls(&decls, &vars()).unwrap_err();
        // 'baseline' is not defined yet, so it parses as a cut and fails.
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let decls = [decl("baseline", "ht > 500", 1), decl("baseline", "mht > 200", 2)];
        let err = SelectionSet::from_decls(&decls, &vars()).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let decls = [decl(UNSELECTED, "ht > 500", 3)];
        let err = SelectionSet::from_decls(&decls, &vars()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
