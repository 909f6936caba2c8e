//! Plain-text reports: setup overview, cut flow, yield tables.

use anyhow::Result;

use cf_data::{DataSet, DataSetStore};
use cf_expr::{SelectionSet, UNSELECTED};

/// Print the defined datasets and selections.
pub fn print_setup(store: &DataSetStore, selections: &SelectionSet, print_trees: bool) {
    println!("The following datasets are defined:");
    for ds in store.all_unselected() {
        println!("  {} (type '{}'): {} entries", ds.label(), ds.kind(), ds.size());
    }

    println!("\nThe following selections are defined:");
    for sel in selections.iter() {
        if sel.name() == UNSELECTED {
            continue;
        }
        println!("  Selection '{}'", sel.name());
        if print_trees {
            for line in sel.filter().tree_lines() {
                println!("{}", line);
            }
        }
    }
    println!();
}

/// Print the per-selection event counts and yields of every dataset.
pub fn print_cut_flow(store: &DataSetStore, selections: &SelectionSet) -> Result<()> {
    let width = selections.max_name_len().max(12);
    println!("The following number of events (entries) are selected:");
    for ds in store.all_unselected() {
        println!(
            "  {:>width$} ({}) : {:>15.3} ({})",
            ds.label(),
            ds.kind(),
            ds.yield_(),
            ds.size(),
        );
        for selected in store.all_with_label(ds.label(), selections)? {
            if selected.selection() == UNSELECTED {
                continue;
            }
            println!(
                "    {:>width$} : {:>15.3} ({})",
                selected.selection(),
                selected.yield_(),
                selected.size(),
            );
        }
    }
    println!();
    Ok(())
}

/// Print the yield summary of every non-identity selection, with
/// statistical and systematic uncertainties.
pub fn print_yields(store: &DataSetStore, selections: &SelectionSet) {
    for sel in selections.iter() {
        if sel.name() == UNSELECTED {
            continue;
        }
        println!("Event yields for selection '{}':", sel.name());
        for ds in store.all_with_selection(sel.name()) {
            println!("  {}", format_yield_line(ds));
            let summary = ds.summary();
            if summary.syst_labels().len() > 1 {
                for label in summary.syst_labels() {
                    println!(
                        "      {:<12} : -{:.3} +{:.3}",
                        label,
                        summary.syst_dn(label),
                        summary.syst_up(label),
                    );
                }
            }
        }
        println!();
    }
}

fn format_yield_line(ds: &DataSet) -> String {
    let summary = ds.summary();
    let mut line = format!(
        "{} ({}) : {:.3} +/- {:.3} (stat.)",
        ds.label(),
        ds.kind(),
        summary.yield_(),
        summary.stat(),
    );
    if summary.has_syst() {
        line.push_str(&format!(
            " -{:.3} +{:.3} (syst.)",
            summary.tot_syst_dn(),
            summary.tot_syst_up(),
        ));
    }
    line
}
