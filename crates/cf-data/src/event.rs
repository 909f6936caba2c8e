//! Per-event weights and uncertainty bookkeeping.

use std::collections::BTreeMap;

use cf_core::{Error, Result};

/// Label under which a single unlabeled total uncertainty is stored. A
/// dataset declares either one total uncertainty or several labeled
/// sources, never both.
pub const TOTAL_UNC_LABEL: &str = "total";

/// One analysis event: a nominal weight, the variable values in schema
/// order, and signed relative uncertainty contributions keyed by source
/// label.
///
/// The quadrature totals are maintained eagerly by [`Event::add_rel_unc`],
/// so they are always consistent with the registered sources.
#[derive(Debug, Clone, Default)]
pub struct Event {
    weight: f64,
    values: Vec<f64>,
    rel_dn: BTreeMap<String, f64>,
    rel_up: BTreeMap<String, f64>,
    rel_total_dn: f64,
    rel_total_up: f64,
}

impl Event {
    /// Create an event with its nominal weight and variable values.
    pub fn new(weight: f64, values: Vec<f64>) -> Self {
        Event { weight, values, ..Default::default() }
    }

    /// Nominal weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Value of the variable at schema index `idx`.
    pub fn value(&self, idx: usize) -> f64 {
        self.values[idx]
    }

    /// All variable values, in schema order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether any uncertainty source is registered on this event.
    pub fn has_unc(&self) -> bool {
        !self.rel_dn.is_empty()
    }

    /// Weight shifted down by the combined relative uncertainty.
    pub fn weight_dn(&self) -> f64 {
        self.weight * (1.0 - self.rel_total_dn)
    }

    /// Weight shifted up by the combined relative uncertainty.
    pub fn weight_up(&self) -> f64 {
        self.weight * (1.0 + self.rel_total_up)
    }

    /// Combined (quadrature) relative downward uncertainty.
    pub fn rel_total_dn(&self) -> f64 {
        self.rel_total_dn
    }

    /// Combined (quadrature) relative upward uncertainty.
    pub fn rel_total_up(&self) -> f64 {
        self.rel_total_up
    }

    /// Relative downward uncertainty of one source, 0 when absent.
    pub fn rel_unc_dn(&self, label: &str) -> f64 {
        self.rel_dn.get(label).copied().unwrap_or(0.0)
    }

    /// Relative upward uncertainty of one source, 0 when absent.
    pub fn rel_unc_up(&self, label: &str) -> f64 {
        self.rel_up.get(label).copied().unwrap_or(0.0)
    }

    /// Register one uncertainty source and fold it into the quadrature
    /// totals immediately. Each label may be registered once per event.
    pub fn add_rel_unc(&mut self, label: &str, dn: f64, up: f64) -> Result<()> {
        if self.rel_dn.contains_key(label) {
            return Err(Error::Validation(format!(
                "uncertainty source '{}' registered twice on one event",
                label
            )));
        }
        self.rel_dn.insert(label.to_string(), dn);
        self.rel_up.insert(label.to_string(), up);
        self.rel_total_dn = (self.rel_total_dn * self.rel_total_dn + dn * dn).sqrt();
        self.rel_total_up = (self.rel_total_up * self.rel_total_up + up * up).sqrt();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_without_uncertainties() {
        let evt = Event::new(2.0, vec![1.0, 2.0]);
        assert!(!evt.has_unc());
        assert_eq!(evt.weight(), 2.0);
        assert_eq!(evt.value(1), 2.0);
        assert_eq!(evt.weight_dn(), 2.0);
        assert_eq!(evt.weight_up(), 2.0);
        assert_eq!(evt.rel_unc_dn("jes"), 0.0);
    }

    #[test]
    fn quadrature_combination_of_sources() {
        let mut evt = Event::new(1.0, vec![]);
        evt.add_rel_unc("a", 0.0, 0.1).unwrap();
        evt.add_rel_unc("b", 0.0, 0.2).unwrap();
        assert!(evt.has_unc());
        let expected = (0.1f64 * 0.1 + 0.2 * 0.2).sqrt();
        assert!((evt.rel_total_up() - expected).abs() < 1e-12);
        assert!((evt.rel_total_up() - 0.2236).abs() < 5e-5);
        assert_eq!(evt.rel_total_dn(), 0.0);
        assert_eq!(evt.rel_unc_up("a"), 0.1);
        assert_eq!(evt.rel_unc_up("b"), 0.2);
    }

    #[test]
    fn shifted_weights() {
        let mut evt = Event::new(10.0, vec![]);
        evt.add_rel_unc("syst", 0.1, 0.3).unwrap();
        assert!((evt.weight_dn() - 9.0).abs() < 1e-12);
        assert!((evt.weight_up() - 13.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_source_label_is_rejected() {
        let mut evt = Event::new(1.0, vec![]);
        evt.add_rel_unc("jes", 0.1, 0.1).unwrap();
        let err = evt.add_rel_unc("jes", 0.2, 0.2).unwrap_err();
        assert!(err.to_string().contains("registered twice"));
        // The failed registration must not disturb the totals.
        assert_eq!(evt.rel_total_up(), 0.1);
    }
}
