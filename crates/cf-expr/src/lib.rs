//! # cf-expr
//!
//! Selection-expression compiler and predicate trees for cutflow.
//!
//! A cut expression like `"ht > 500 && (mht > 200 || njets >= 4)"` compiles
//! into a [`Filter`] tree evaluable per event. Compiled selections are
//! collected in an ordered [`SelectionSet`]; later selections may reuse
//! earlier ones by name, sharing the underlying tree.
//!
//! ## Example
//!
//! ```
//! use cf_core::VariableSet;
//! use cf_expr::{SelectionDecl, SelectionSet};
//!
//! let vars = VariableSet::from_names(["ht", "mht"]).unwrap();
//! let decls = [SelectionDecl {
//!     label: "baseline".into(),
//!     cuts: "ht > 500 && mht > 200".into(),
//!     apply_to: vec![],
//!     line: 1,
//! }];
//! let selections = SelectionSet::from_decls(&decls, &vars).unwrap();
//! let baseline = selections.find("baseline").unwrap();
//! assert!(baseline.passes(&[600.0, 250.0], "data"));
//! assert!(!baseline.passes(&[600.0, 150.0], "data"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compile;
pub mod filter;
pub mod selection;

pub use compile::compile;
pub use filter::{CmpOp, Filter};
pub use selection::{Selection, SelectionDecl, SelectionSet, UNSELECTED};
