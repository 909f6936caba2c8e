//! Cutflow CLI

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use cf_config::{AnalysisSpec, Config, DataSetDecl};
use cf_core::VariableSet;
use cf_data::{build_events, ColumnTable, DataSet, DataSetStore, Event};
use cf_expr::SelectionSet;

mod report;

#[derive(Parser)]
#[command(name = "cutflow")]
#[command(about = "Cutflow - batch event selection and yield aggregation")]
#[command(version)]
struct Cli {
    /// Analysis configuration file
    config: PathBuf,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    let cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to read config '{}'", cli.config.display()))?;
    let spec = AnalysisSpec::from_config(&cfg)?;

    let vars = VariableSet::from_names(spec.variables.iter().cloned())?;
    let selections = SelectionSet::from_decls(&spec.selections, &vars)?;
    tracing::info!(selections = selections.len(), variables = vars.len(), "setup compiled");

    let mut unselected = Vec::with_capacity(spec.datasets.len());
    for decl in &spec.datasets {
        unselected.push(load_dataset(decl, &vars, spec.input_path.as_deref())?);
    }

    let mut store = DataSetStore::default();
    store.init(unselected, &selections)?;

    report::print_setup(&store, &selections, spec.print_filter_trees);
    report::print_cut_flow(&store, &selections)?;
    report::print_yields(&store, &selections);

    Ok(())
}

/// Load one declared dataset: read its input tables, build the events and
/// the unselected dataset.
fn load_dataset(
    decl: &DataSetDecl,
    vars: &VariableSet,
    input_path: Option<&Path>,
) -> Result<DataSet> {
    let mut events: Vec<Event> = Vec::new();
    for (file, scale) in decl.files.iter().zip(&decl.scales) {
        let path = resolve_path(file, input_path);
        let table = ColumnTable::load(&path)
            .with_context(|| format!("failed to read input table '{}'", path.display()))?;
        events.extend(build_events(&table, vars, &decl.weight, *scale, &decl.uncertainties)?);
    }
    tracing::info!(label = %decl.label, kind = %decl.kind, events = events.len(), "dataset loaded");

    let labels: Vec<String> = decl.uncertainties.iter().map(|u| u.label.clone()).collect();
    Ok(DataSet::unselected(decl.kind, decl.label.clone(), events, labels)?)
}

/// Relative dataset files live under the global input path.
fn resolve_path(file: &Path, input_path: Option<&Path>) -> PathBuf {
    match input_path {
        Some(dir) if file.is_relative() => dir.join(file),
        _ => file.to_path_buf(),
    }
}
