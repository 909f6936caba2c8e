//! End-to-end pipeline: declared variables and selections, events built
//! from columnar input, datasets derived per selection, yields aggregated.

use std::collections::HashMap;

use cf_core::VariableSet;
use cf_data::{
    build_events, ColumnTable, DataSet, DataSetKind, DataSetStore, UncertaintySource, ValueSpec,
    WeightSpec,
};
use cf_expr::{SelectionDecl, SelectionSet, UNSELECTED};

fn table(entries: &[(&str, &[f64])]) -> ColumnTable {
    let cols: HashMap<String, Vec<f64>> =
        entries.iter().map(|(n, v)| (n.to_string(), v.to_vec())).collect();
    ColumnTable::from_columns(cols).unwrap()
}

fn decl(label: &str, cuts: &str, apply_to: &[&str], line: usize) -> SelectionDecl {
    SelectionDecl {
        label: label.to_string(),
        cuts: cuts.to_string(),
        apply_to: apply_to.iter().map(|s| s.to_string()).collect(),
        line,
    }
}

#[test]
fn cut_flow_over_two_datasets() {
    let vars = VariableSet::from_names(["ht", "mht"]).unwrap();
    let decls = [
        decl("baseline", "ht > 500", &[], 10),
        decl("tight", "baseline && mht > 200", &[], 11),
        decl("blinded", "mht < 150", &["data"], 12),
    ];
    let selections = SelectionSet::from_decls(&decls, &vars).unwrap();

    // Observed data: unit weights.
    let data_table = table(&[
        ("ht", &[400.0, 550.0, 600.0, 700.0]),
        ("mht", &[100.0, 120.0, 250.0, 300.0]),
    ]);
    let data_events =
        build_events(&data_table, &vars, &WeightSpec::Constant(1.0), 1.0, &[]).unwrap();
    let data =
        DataSet::unselected(DataSetKind::Data, "data", data_events, vec![]).unwrap();

    // Simulated background: weighted events with a symmetric systematic.
    let mc_table = table(&[
        ("ht", &[520.0, 560.0, 610.0]),
        ("mht", &[210.0, 90.0, 260.0]),
        ("w", &[2.0, 3.0, 1.0]),
    ]);
    let sources = [UncertaintySource {
        label: "lumi".to_string(),
        down: ValueSpec::Rel(0.1),
        up: ValueSpec::Rel(0.1),
    }];
    let mc_events =
        build_events(&mc_table, &vars, &WeightSpec::Column("w".to_string()), 1.0, &sources)
            .unwrap();
    let labels = sources.iter().map(|s| s.label.clone()).collect();
    let mc = DataSet::unselected(DataSetKind::Mc, "bkg", mc_events, labels).unwrap();

    let mut store = DataSetStore::default();
    store.init(vec![data, mc], &selections).unwrap();

    // One dataset per (label, selection) pair.
    assert_eq!(store.iter().count(), 2 * selections.len());

    // The unselected yield covers literally all loaded events.
    let data_all = store.find("data", UNSELECTED).unwrap();
    assert_eq!(data_all.yield_(), 4.0);
    assert_eq!(data_all.stat(), 2.0);

    let data_baseline = store.find("data", "baseline").unwrap();
    assert_eq!(data_baseline.size(), 3);
    assert_eq!(data_baseline.yield_(), 3.0);

    let data_tight = store.find("data", "tight").unwrap();
    assert_eq!(data_tight.size(), 2);

    // The restricted selection cuts data but exempts the background.
    let data_blinded = store.find("data", "blinded").unwrap();
    assert_eq!(data_blinded.size(), 2);
    let bkg_blinded = store.find("bkg", "blinded").unwrap();
    assert_eq!(bkg_blinded.size(), 3);

    // Background yields with systematics.
    let bkg_tight = store.find("bkg", "tight").unwrap();
    assert_eq!(bkg_tight.size(), 2);
    assert_eq!(bkg_tight.yield_(), 3.0);
    assert!((bkg_tight.stat() - 5.0f64.sqrt()).abs() < 1e-12);
    assert!(bkg_tight.has_syst());
    assert!((bkg_tight.summary().tot_syst_up() - 0.3).abs() < 1e-12);
    assert!((bkg_tight.summary().syst_dn("lumi") - 0.3).abs() < 1e-12);

    // Data carries no systematics.
    assert!(!data_all.has_syst());
}

#[test]
fn selections_may_overlap_or_exclude_events() {
    let vars = VariableSet::from_names(["x"]).unwrap();
    let decls = [decl("low", "x < 10", &[], 1), decl("high", "x > 2", &[], 2)];
    let selections = SelectionSet::from_decls(&decls, &vars).unwrap();

    let t = table(&[("x", &[1.0, 5.0, 20.0])]);
    let events = build_events(&t, &vars, &WeightSpec::Constant(1.0), 1.0, &[]).unwrap();
    let ds = DataSet::unselected(DataSetKind::Mc, "s", events, vec![]).unwrap();

    let mut store = DataSetStore::default();
    store.init(vec![ds], &selections).unwrap();

    let unselected = store.find("s", UNSELECTED).unwrap().yield_();
    let low = store.find("s", "low").unwrap().yield_();
    let high = store.find("s", "high").unwrap().yield_();
    assert_eq!(unselected, 3.0);
    // Overlapping selections: the per-selection yields do not partition the
    // unselected yield.
    assert_eq!(low + high, 4.0);
}
