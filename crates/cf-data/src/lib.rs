//! # cf-data
//!
//! Events, datasets and yield/uncertainty aggregation for cutflow.
//!
//! Events are built once per dataset from columnar input tables; the
//! unselected dataset holds them, and one derived view per registered
//! selection shares them. Every dataset carries a [`YieldSummary`] with the
//! weighted yield, its statistical uncertainty and the propagated
//! systematic uncertainties.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod dataset;
pub mod event;
pub mod table;

pub use builder::{build_events, UncertaintySource, ValueSpec, WeightSpec};
pub use dataset::{DataSet, DataSetKind, DataSetStore, YieldSummary};
pub use event::{Event, TOTAL_UNC_LABEL};
pub use table::ColumnTable;
