//! Datasets and their yield / uncertainty summaries.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use cf_core::{Error, Result};
use cf_expr::{Selection, SelectionSet, UNSELECTED};

use crate::event::{Event, TOTAL_UNC_LABEL};

/// Role of a dataset in the analysis.
///
/// The kind drives the statistical-uncertainty formula: observed data gets
/// the Poisson `sqrt(yield)`, everything else the effective-statistics
/// `sqrt(sum of squared weights)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetKind {
    /// Observed data.
    Data,
    /// Simulated background.
    Mc,
    /// Simulation-based background prediction.
    McPrediction,
    /// Data-driven background prediction.
    Prediction,
    /// Simulated signal.
    Signal,
}

impl DataSetKind {
    /// Parse a config type string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Data" | "data" => Ok(DataSetKind::Data),
            "MC" | "mc" => Ok(DataSetKind::Mc),
            "MCPrediction" | "mcprediction" => Ok(DataSetKind::McPrediction),
            "Prediction" | "prediction" => Ok(DataSetKind::Prediction),
            "Signal" | "signal" => Ok(DataSetKind::Signal),
            other => Err(Error::Validation(format!("dataset type '{}' does not exist", other))),
        }
    }

    /// Whether the dataset comes from simulation rather than from data or a
    /// data-driven prediction.
    pub fn is_simulated(self) -> bool {
        !matches!(self, DataSetKind::Data | DataSetKind::Prediction)
    }
}

impl fmt::Display for DataSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataSetKind::Data => "data",
            DataSetKind::Mc => "MC",
            DataSetKind::McPrediction => "MC prediction",
            DataSetKind::Prediction => "prediction",
            DataSetKind::Signal => "signal",
        };
        f.write_str(s)
    }
}

/// Yield and uncertainty summary of one dataset. Computed once when the
/// dataset is constructed, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct YieldSummary {
    yield_: f64,
    stat: f64,
    has_syst: bool,
    tot_syst_dn: f64,
    tot_syst_up: f64,
    syst_labels: Vec<String>,
    syst_dn: BTreeMap<String, f64>,
    syst_up: BTreeMap<String, f64>,
}

impl YieldSummary {
    fn compute(kind: DataSetKind, events: &[Arc<Event>], labels: &[String]) -> YieldSummary {
        let mut yield_ = 0.0;
        let mut sum_w2 = 0.0;
        let mut dn_sum = 0.0;
        let mut up_sum = 0.0;
        let mut dn_by_label = vec![0.0; labels.len()];
        let mut up_by_label = vec![0.0; labels.len()];
        let mut has_syst = false;

        for evt in events {
            let w = evt.weight();
            yield_ += w;
            sum_w2 += w * w;
            if evt.has_unc() {
                has_syst = true;
            }
            dn_sum += w * (1.0 - evt.rel_total_dn());
            up_sum += w * (1.0 + evt.rel_total_up());
            for (i, label) in labels.iter().enumerate() {
                dn_by_label[i] += w * (1.0 - evt.rel_unc_dn(label));
                up_by_label[i] += w * (1.0 + evt.rel_unc_up(label));
            }
        }

        let (tot_syst_dn, tot_syst_up) =
            if has_syst { (yield_ - dn_sum, up_sum - yield_) } else { (0.0, 0.0) };

        let mut syst_dn = BTreeMap::new();
        let mut syst_up = BTreeMap::new();
        if has_syst {
            for (i, label) in labels.iter().enumerate() {
                syst_dn.insert(label.clone(), yield_ - dn_by_label[i]);
                syst_up.insert(label.clone(), up_by_label[i] - yield_);
            }
        }

        let stat = if kind == DataSetKind::Data { yield_.sqrt() } else { sum_w2.sqrt() };

        YieldSummary {
            yield_,
            stat,
            has_syst,
            tot_syst_dn,
            tot_syst_up,
            syst_labels: labels.to_vec(),
            syst_dn,
            syst_up,
        }
    }

    /// Weighted number of events.
    pub fn yield_(&self) -> f64 {
        self.yield_
    }

    /// Statistical uncertainty on the yield.
    pub fn stat(&self) -> f64 {
        self.stat
    }

    /// Whether any event carries systematic uncertainty contributions.
    pub fn has_syst(&self) -> bool {
        self.has_syst
    }

    /// Total downward systematic uncertainty (absolute).
    pub fn tot_syst_dn(&self) -> f64 {
        self.tot_syst_dn
    }

    /// Total upward systematic uncertainty (absolute).
    pub fn tot_syst_up(&self) -> f64 {
        self.tot_syst_up
    }

    /// Downward systematic contribution of one source, 0 when absent.
    pub fn syst_dn(&self, label: &str) -> f64 {
        self.syst_dn.get(label).copied().unwrap_or(0.0)
    }

    /// Upward systematic contribution of one source, 0 when absent.
    pub fn syst_up(&self, label: &str) -> f64 {
        self.syst_up.get(label).copied().unwrap_or(0.0)
    }

    /// Declared uncertainty-source labels, in declaration order.
    pub fn syst_labels(&self) -> &[String] {
        &self.syst_labels
    }
}

/// One dataset: the events of `label` after `selection`, with their yield
/// summary.
///
/// The unselected dataset is built from freshly loaded events; every other
/// dataset for the same label is a filtered view sharing those events via
/// [`Arc`].
#[derive(Debug)]
pub struct DataSet {
    kind: DataSetKind,
    label: String,
    selection: String,
    events: Vec<Arc<Event>>,
    summary: YieldSummary,
}

impl DataSet {
    /// Registry key of a `(label, selection)` pair.
    pub fn uid_of(label: &str, selection: &str) -> String {
        format!("{}:{}", label, selection)
    }

    /// Build the unselected dataset of `label` from freshly loaded events.
    ///
    /// `syst_labels` are the declared uncertainty sources, in declaration
    /// order. A dataset declares either one unlabeled total uncertainty or
    /// several labeled sources; mixing the two is fatal.
    pub fn unselected(
        kind: DataSetKind,
        label: impl Into<String>,
        events: Vec<Event>,
        syst_labels: Vec<String>,
    ) -> Result<DataSet> {
        let label = label.into();
        if syst_labels.len() > 1 && syst_labels.iter().any(|l| l == TOTAL_UNC_LABEL) {
            return Err(Error::Validation(format!(
                "dataset '{}' declares both a total uncertainty and labeled sources; \
                 specify either one total uncertainty or several labeled ones",
                label
            )));
        }
        let events: Vec<Arc<Event>> = events.into_iter().map(Arc::new).collect();
        let summary = YieldSummary::compute(kind, &events, &syst_labels);
        Ok(DataSet { kind, label, selection: UNSELECTED.to_string(), events, summary })
    }

    /// Derive the view of this dataset after `selection`.
    pub fn derive(&self, selection: &Selection) -> DataSet {
        let events: Vec<Arc<Event>> = self
            .events
            .iter()
            .filter(|e| selection.passes(e.values(), &self.label))
            .cloned()
            .collect();
        let summary = YieldSummary::compute(self.kind, &events, self.summary.syst_labels());
        DataSet {
            kind: self.kind,
            label: self.label.clone(),
            selection: selection.name().to_string(),
            events,
            summary,
        }
    }

    /// Registry key, `label:selection`.
    pub fn uid(&self) -> String {
        DataSet::uid_of(&self.label, &self.selection)
    }

    /// Dataset label from the config.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Name of the selection this dataset was derived with.
    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// Dataset kind.
    pub fn kind(&self) -> DataSetKind {
        self.kind
    }

    /// Number of events.
    pub fn size(&self) -> usize {
        self.events.len()
    }

    /// The events, shared with the parent unselected dataset.
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    /// Yield and uncertainty summary.
    pub fn summary(&self) -> &YieldSummary {
        &self.summary
    }

    /// Weighted number of events.
    pub fn yield_(&self) -> f64 {
        self.summary.yield_()
    }

    /// Statistical uncertainty on the yield.
    pub fn stat(&self) -> f64 {
        self.summary.stat()
    }

    /// Whether any event carries systematic uncertainty contributions.
    pub fn has_syst(&self) -> bool {
        self.summary.has_syst()
    }

    /// Total downward systematic uncertainty (absolute).
    pub fn tot_syst_dn(&self) -> f64 {
        self.summary.tot_syst_dn()
    }

    /// Total upward systematic uncertainty (absolute).
    pub fn tot_syst_up(&self) -> f64 {
        self.summary.tot_syst_up()
    }

    /// Downward systematic contribution of one source, 0 when absent.
    pub fn syst_dn(&self, label: &str) -> f64 {
        self.summary.syst_dn(label)
    }

    /// Upward systematic contribution of one source, 0 when absent.
    pub fn syst_up(&self, label: &str) -> f64 {
        self.summary.syst_up(label)
    }
}

/// Registry of all datasets, keyed by `label:selection`.
///
/// Populated exactly once during setup; a second initialization attempt is
/// a warning and a no-op.
#[derive(Debug, Default)]
pub struct DataSetStore {
    datasets: Vec<DataSet>,
    index: HashMap<String, usize>,
    is_init: bool,
}

impl DataSetStore {
    /// Populate the store: every unselected dataset, plus one derived view
    /// per (dataset, non-identity selection) pair.
    pub fn init(&mut self, unselected: Vec<DataSet>, selections: &SelectionSet) -> Result<()> {
        if self.is_init {
            tracing::warn!("datasets already initialized, skipping");
            return Ok(());
        }
        for ds in unselected {
            let views: Vec<DataSet> = selections
                .iter()
                .filter(|sel| sel.name() != UNSELECTED)
                .map(|sel| ds.derive(sel))
                .collect();
            self.insert(ds)?;
            for view in views {
                self.insert(view)?;
            }
        }
        self.is_init = true;
        Ok(())
    }

    /// Whether the store has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.is_init
    }

    /// Add one dataset. The `(label, selection)` pair must be unique.
    pub fn insert(&mut self, ds: DataSet) -> Result<()> {
        let uid = ds.uid();
        if self.index.contains_key(&uid) {
            return Err(Error::Validation(format!(
                "a dataset with label '{}' and selection '{}' already exists",
                ds.label(),
                ds.selection()
            )));
        }
        self.index.insert(uid, self.datasets.len());
        self.datasets.push(ds);
        Ok(())
    }

    /// Look up the dataset of a `(label, selection)` pair. Unknown pairs are
    /// fatal.
    pub fn find(&self, label: &str, selection: &str) -> Result<&DataSet> {
        self.find_uid(&DataSet::uid_of(label, selection))
    }

    /// Look up a dataset by its uid. Unknown uids are fatal.
    pub fn find_uid(&self, uid: &str) -> Result<&DataSet> {
        self.index
            .get(uid)
            .map(|&i| &self.datasets[i])
            .ok_or_else(|| Error::Validation(format!("dataset with uid '{}' does not exist", uid)))
    }

    /// All datasets derived with the named selection, in insertion order.
    pub fn all_with_selection(&self, selection: &str) -> Vec<&DataSet> {
        self.datasets.iter().filter(|ds| ds.selection() == selection).collect()
    }

    /// All unselected datasets, in insertion order.
    pub fn all_unselected(&self) -> Vec<&DataSet> {
        self.all_with_selection(UNSELECTED)
    }

    /// All datasets of one label, in selection-registry order. Every
    /// `(label, selection)` pair must exist.
    pub fn all_with_label(
        &self,
        label: &str,
        selections: &SelectionSet,
    ) -> Result<Vec<&DataSet>> {
        selections.iter().map(|sel| self.find(label, sel.name())).collect()
    }

    /// Whether any dataset carries this label.
    pub fn label_exists(&self, label: &str) -> bool {
        self.datasets.iter().any(|ds| ds.label() == label)
    }

    /// All datasets, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DataSet> {
        self.datasets.iter()
    }
}
