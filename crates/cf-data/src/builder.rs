//! Building events from columnar input.

use cf_core::{Error, Result, VariableSet};

use crate::event::Event;
use crate::table::ColumnTable;

/// Event weight: a constant, or read per event from a column.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightSpec {
    /// Same weight for every event.
    Constant(f64),
    /// Per-event weight column.
    Column(String),
}

impl Default for WeightSpec {
    fn default() -> Self {
        WeightSpec::Constant(1.0)
    }
}

/// One side of an uncertainty source: a constant relative size, or the name
/// of a varied-weight column. The column form derives the relative
/// uncertainty from the spread between nominal and varied weight,
/// `|w - w_varied| / w` (0 when `w` is 0).
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    /// Constant relative uncertainty.
    Rel(f64),
    /// Varied-weight column.
    Column(String),
}

/// A labeled systematic uncertainty source of one dataset.
#[derive(Debug, Clone)]
pub struct UncertaintySource {
    /// Source label; [`crate::event::TOTAL_UNC_LABEL`] marks a single
    /// unlabeled total.
    pub label: String,
    /// Downward variation.
    pub down: ValueSpec,
    /// Upward variation.
    pub up: ValueSpec,
}

enum ResolvedWeight<'a> {
    Constant(f64),
    Column(&'a [f64]),
}

impl ResolvedWeight<'_> {
    fn at(&self, row: usize) -> f64 {
        match self {
            ResolvedWeight::Constant(w) => *w,
            ResolvedWeight::Column(col) => col[row],
        }
    }
}

enum ResolvedValue<'a> {
    Rel(f64),
    Column(&'a [f64]),
}

impl ResolvedValue<'_> {
    fn rel_at(&self, w: f64, row: usize) -> f64 {
        match self {
            ResolvedValue::Rel(v) => *v,
            ResolvedValue::Column(col) => {
                if w != 0.0 {
                    (w - col[row]).abs() / w
                } else {
                    0.0
                }
            }
        }
    }
}

fn resolve_value<'a>(
    spec: &ValueSpec,
    table: &'a ColumnTable,
    label: &str,
) -> Result<ResolvedValue<'a>> {
    match spec {
        ValueSpec::Rel(v) => Ok(ResolvedValue::Rel(*v)),
        ValueSpec::Column(name) => {
            table.column(name).map(ResolvedValue::Column).ok_or_else(|| {
                Error::Validation(format!(
                    "varied-weight column '{}' for uncertainty '{}' not found in input table",
                    name, label
                ))
            })
        }
    }
}

/// Build the events of one input table.
///
/// Each event's weight is the weight value times `scale`, and every
/// uncertainty source in `sources` is registered on every event. Declared
/// variables missing from the table are filled with 0.0, with a warning.
pub fn build_events(
    table: &ColumnTable,
    vars: &VariableSet,
    weight: &WeightSpec,
    scale: f64,
    sources: &[UncertaintySource],
) -> Result<Vec<Event>> {
    // A varied-weight column doubling as the nominal weight column has no
    // meaningful relative spread.
    if let WeightSpec::Column(wcol) = weight {
        for src in sources {
            for side in [&src.down, &src.up] {
                if matches!(side, ValueSpec::Column(c) if c == wcol) {
                    return Err(Error::Validation(format!(
                        "column '{}' is used both as weight and as uncertainty variation",
                        wcol
                    )));
                }
            }
        }
    }

    let mut var_cols: Vec<Option<&[f64]>> = Vec::with_capacity(vars.len());
    for name in vars.names() {
        let col = table.column(name);
        if col.is_none() {
            tracing::warn!(variable = %name, "input table has no column for variable, using 0");
        }
        var_cols.push(col);
    }

    let resolved_weight = match weight {
        WeightSpec::Constant(w) => ResolvedWeight::Constant(*w),
        WeightSpec::Column(name) => ResolvedWeight::Column(table.column(name).ok_or_else(
            || Error::Validation(format!("weight column '{}' not found in input table", name)),
        )?),
    };

    let resolved_sources: Vec<(ResolvedValue, ResolvedValue)> = sources
        .iter()
        .map(|src| {
            Ok((
                resolve_value(&src.down, table, &src.label)?,
                resolve_value(&src.up, table, &src.label)?,
            ))
        })
        .collect::<Result<_>>()?;

    let mut events = Vec::with_capacity(table.n_rows());
    for row in 0..table.n_rows() {
        let w = resolved_weight.at(row) * scale;
        let values = var_cols.iter().map(|col| col.map_or(0.0, |c| c[row])).collect();
        let mut evt = Event::new(w, values);
        for (src, (dn, up)) in sources.iter().zip(&resolved_sources) {
            evt.add_rel_unc(&src.label, dn.rel_at(w, row), up.rel_at(w, row))?;
        }
        events.push(evt);
    }
    Ok(events)
}
