//! # cf-config
//!
//! Line-based analysis configuration for cutflow.
//!
//! One declaration per line, in the form
//!
//! ```text
//! key :: name1: value1; name2: value2; ...
//! ```
//!
//! `#` and `//` start comments, blank lines are skipped. The parser keeps
//! line numbers so every diagnostic can point at its declaration. A typed
//! [`AnalysisSpec`] is extracted from the raw key/attribute store.
//!
//! ```text
//! global    :: input path: data/
//!
//! variable  :: name: ht
//! variable  :: name: mht
//!
//! selection :: label: baseline; cuts: ht > 500 && mht > 200
//! selection :: label: blinded; cuts: mht < 150; apply to: data
//!
//! dataset   :: label: data; type: data; files: data.json
//! dataset   :: label: bkg; type: mc; files: bkg.json; weight: w; uncertainty lumi: 0.1
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::path::{Path, PathBuf};

use cf_core::{Error, Result};
use cf_data::{DataSetKind, UncertaintySource, ValueSpec, WeightSpec, TOTAL_UNC_LABEL};
use cf_expr::SelectionDecl;

// ── Raw key/attribute store ────────────────────────────────────

/// The `name: value` pairs of one config line.
#[derive(Debug, Clone)]
pub struct Attributes {
    line: usize,
    values: Vec<(String, String)>,
}

impl Attributes {
    /// Config line this declaration came from.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Value of the attribute `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Whether an attribute of this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All attribute names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    /// Attribute names containing `substr`, in declaration order. Used for
    /// families like `uncertainty` / `uncertainty jes`.
    pub fn names_containing(&self, substr: &str) -> Vec<&str> {
        self.values.iter().map(|(n, _)| n.as_str()).filter(|n| n.contains(substr)).collect()
    }
}

/// Parsed config file: an ordered list of `(key, attributes)` declarations.
#[derive(Debug, Clone, Default)]
pub struct Config {
    blocks: Vec<(String, Attributes)>,
}

fn strip_comment(line: &str) -> &str {
    let cut = match (line.find('#'), line.find("//")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    match cut {
        Some(i) => &line[..i],
        None => line,
    }
}

impl Config {
    /// Parse config text.
    pub fn parse(text: &str) -> Result<Config> {
        let mut blocks = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line_num = i + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let (key, rest) = line.split_once("::").ok_or_else(|| {
                Error::syntax(
                    format!("expected 'key :: name: value; ...', got '{}'", line),
                    line_num,
                )
            })?;
            let mut attrs = Attributes { line: line_num, values: Vec::new() };
            for part in rest.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let (name, value) = part.split_once(':').ok_or_else(|| {
                    Error::syntax(format!("expected 'name: value', got '{}'", part), line_num)
                })?;
                attrs.values.push((name.trim().to_string(), value.trim().to_string()));
            }
            blocks.push((key.trim().to_string(), attrs));
        }
        Ok(Config { blocks })
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Config> {
        Config::parse(&std::fs::read_to_string(path)?)
    }

    /// All declarations with the given key, in file order.
    pub fn section(&self, key: &str) -> Vec<&Attributes> {
        self.blocks.iter().filter(|(k, _)| k == key).map(|(_, a)| a).collect()
    }
}

/// Split a comma-separated value into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

// ── Typed analysis declarations ────────────────────────────────

/// One declared dataset: its input files and how to weight them.
#[derive(Debug, Clone)]
pub struct DataSetDecl {
    /// Dataset label.
    pub label: String,
    /// Dataset kind.
    pub kind: DataSetKind,
    /// Input table files, relative to the global input path unless absolute.
    pub files: Vec<PathBuf>,
    /// Event weight.
    pub weight: WeightSpec,
    /// One scale factor per input file.
    pub scales: Vec<f64>,
    /// Declared systematic uncertainty sources.
    pub uncertainties: Vec<UncertaintySource>,
    /// Config line of the declaration.
    pub line: usize,
}

/// The complete typed analysis configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSpec {
    /// Directory prepended to relative dataset file paths.
    pub input_path: Option<PathBuf>,
    /// Declared variable names, in schema order.
    pub variables: Vec<String>,
    /// Declared selections, in declaration order.
    pub selections: Vec<SelectionDecl>,
    /// Whether to print each selection's filter tree in the report.
    pub print_filter_trees: bool,
    /// Declared datasets, in declaration order.
    pub datasets: Vec<DataSetDecl>,
}

impl AnalysisSpec {
    /// Extract the typed analysis declarations from a parsed config.
    pub fn from_config(cfg: &Config) -> Result<AnalysisSpec> {
        let mut spec = AnalysisSpec::default();

        for attrs in cfg.section("global") {
            if let Some(path) = attrs.get("input path") {
                spec.input_path = Some(PathBuf::from(path));
            }
        }

        for attrs in cfg.section("variable") {
            let name = attrs.get("name").ok_or_else(|| {
                Error::syntax("variable declaration needs 'name: <ident>'", attrs.line())
            })?;
            spec.variables.push(name.to_string());
        }

        for attrs in cfg.section("selection") {
            if let (Some(label), Some(cuts)) = (attrs.get("label"), attrs.get("cuts")) {
                let apply_to = attrs.get("apply to").map(split_list).unwrap_or_default();
                spec.selections.push(SelectionDecl {
                    label: label.to_string(),
                    cuts: cuts.to_string(),
                    apply_to,
                    line: attrs.line(),
                });
            } else if let Some(value) = attrs.get("print") {
                spec.print_filter_trees = parse_bool(value, attrs.line())?;
            } else {
                return Err(Error::syntax(
                    "selection declaration needs 'label: <label>; cuts: <expr>'",
                    attrs.line(),
                ));
            }
        }

        for attrs in cfg.section("dataset") {
            spec.datasets.push(parse_dataset(attrs, &spec.variables)?);
        }

        Ok(spec)
    }
}

fn parse_bool(value: &str, line: usize) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::syntax(
            format!("expected 'true' or 'false', got '{}'", other),
            line,
        )),
    }
}

fn parse_dataset(attrs: &Attributes, variables: &[String]) -> Result<DataSetDecl> {
    let line = attrs.line();
    let (Some(label), Some(kind), Some(files)) =
        (attrs.get("label"), attrs.get("type"), attrs.get("files"))
    else {
        return Err(Error::syntax(
            "dataset declaration needs 'label: <label>; type: <type>; files: <file>[, <file>]'",
            line,
        ));
    };

    let kind = DataSetKind::parse(kind).map_err(|e| Error::syntax(e.to_string(), line))?;
    let files: Vec<PathBuf> = split_list(files).into_iter().map(PathBuf::from).collect();
    if files.is_empty() {
        return Err(Error::syntax("dataset declares no input files", line));
    }

    // The weight is either a float or the name of a declared variable.
    let weight = match attrs.get("weight") {
        None => WeightSpec::default(),
        Some(value) => match value.parse::<f64>() {
            Ok(w) => WeightSpec::Constant(w),
            Err(_) if variables.iter().any(|v| v == value) => {
                WeightSpec::Column(value.to_string())
            }
            Err(_) => {
                return Err(Error::syntax(
                    format!(
                        "weight '{}' is neither a number nor a declared variable",
                        value
                    ),
                    line,
                ));
            }
        },
    };

    // One scale factor for all input files, or one per file.
    let scales = match attrs.get("scales") {
        None => vec![1.0; files.len()],
        Some(value) => {
            let parts = split_list(value);
            let mut scales = Vec::with_capacity(files.len());
            for part in &parts {
                scales.push(part.parse::<f64>().map_err(|_| {
                    Error::syntax(format!("scale factor '{}' is not a number", part), line)
                })?);
            }
            if scales.len() == 1 {
                scales.resize(files.len(), scales[0]);
            }
            if scales.len() != files.len() {
                return Err(Error::syntax(
                    format!(
                        "expected one scale factor or one per input file ({}), got {}",
                        files.len(),
                        scales.len()
                    ),
                    line,
                ));
            }
            scales
        }
    };

    let uncertainties = parse_uncertainties(attrs, variables)?;

    Ok(DataSetDecl {
        label: label.to_string(),
        kind,
        files,
        weight,
        scales,
        uncertainties,
        line,
    })
}

/// Parse the `uncertainty [<label>]` attribute family of one dataset.
fn parse_uncertainties(attrs: &Attributes, variables: &[String]) -> Result<Vec<UncertaintySource>> {
    let line = attrs.line();
    let names: Vec<String> =
        attrs.names_containing("uncertainty").iter().map(|n| n.to_string()).collect();

    let mut sources = Vec::with_capacity(names.len());
    for name in &names {
        let label = name.strip_prefix("uncertainty").map(str::trim).unwrap_or("");
        // An unlabeled uncertainty is the total one; it must then be the
        // only source.
        let label = if label.is_empty() {
            if names.len() > 1 {
                return Err(Error::syntax(
                    "an unlabeled (total) uncertainty cannot be combined with labeled ones",
                    line,
                ));
            }
            TOTAL_UNC_LABEL.to_string()
        } else {
            label.to_string()
        };

        let value = attrs.get(name).unwrap_or_default();
        let parts = split_list(value);
        let (down, up) = match parts.as_slice() {
            [sym] => {
                if sym.starts_with('+') || sym.starts_with('-') {
                    return Err(Error::syntax(
                        format!(
                            "uncertainty '{}': lower and upper variation must be ',' separated",
                            label
                        ),
                        line,
                    ));
                }
                let side = parse_unc_side(sym, &label, variables, line)?;
                (side.clone(), side)
            }
            [a, b] => {
                let (dn, up) = match (a.strip_prefix('-'), b.strip_prefix('+')) {
                    (Some(dn), Some(up)) => (dn, up),
                    _ => match (a.strip_prefix('+'), b.strip_prefix('-')) {
                        (Some(up), Some(dn)) => (dn, up),
                        _ => {
                            return Err(Error::syntax(
                                format!(
                                    "uncertainty '{}': expected '+<up>, -<down>' or \
                                     '-<down>, +<up>', got '{}'",
                                    label, value
                                ),
                                line,
                            ));
                        }
                    },
                };
                (
                    parse_unc_side(dn.trim(), &label, variables, line)?,
                    parse_unc_side(up.trim(), &label, variables, line)?,
                )
            }
            _ => {
                return Err(Error::syntax(
                    format!("invalid uncertainty specification '{}'", value),
                    line,
                ));
            }
        };
        sources.push(UncertaintySource { label, down, up });
    }
    Ok(sources)
}

fn parse_unc_side(
    value: &str,
    label: &str,
    variables: &[String],
    line: usize,
) -> Result<ValueSpec> {
    if let Ok(v) = value.parse::<f64>() {
        return Ok(ValueSpec::Rel(v));
    }
    if variables.iter().any(|v| v == value) {
        return Ok(ValueSpec::Column(value.to_string()));
    }
    Err(Error::syntax(
        format!(
            "uncertainty '{}': '{}' is neither a number nor a declared variable",
            label, value
        ),
        line,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# event yields after the 2012 selections
global    :: input path: data/

variable  :: name: ht
variable  :: name: mht
variable  :: name: w        // nominal event weight
variable  :: name: w_jes_up
variable  :: name: w_jes_dn

selection :: label: baseline; cuts: ht > 500 && mht > 200
selection :: label: blinded; cuts: mht < 150; apply to: data, qcd
selection :: print: true

dataset   :: label: data; type: data; files: data.json
dataset   :: label: bkg; type: mc; files: bkg1.json, bkg2.json; weight: w; scales: 0.5; uncertainty jes: +w_jes_up, -w_jes_dn; uncertainty lumi: 0.026
dataset   :: label: pred; type: prediction; files: pred.json; uncertainty: +0.2, -0.1
";

    #[test]
    fn raw_parsing_keeps_line_numbers() {
        let cfg = Config::parse(SAMPLE).unwrap();
        let sels = cfg.section("selection");
        assert_eq!(sels.len(), 3);
        assert_eq!(sels[0].line(), 10);
        assert_eq!(sels[0].get("label"), Some("baseline"));
        assert_eq!(sels[1].get("apply to"), Some("data, qcd"));
        assert!(sels[2].has("print"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let cfg = Config::parse("# only a comment\n\nvariable :: name: ht // trailing\n").unwrap();
        assert_eq!(cfg.section("variable").len(), 1);
        assert_eq!(cfg.section("variable")[0].get("name"), Some("ht"));
    }

    #[test]
    fn malformed_lines_are_fatal() {
        let err = Config::parse("selection label: x").unwrap_err();
        assert!(err.to_string().contains("line 1"));
        let err = Config::parse("\nselection :: label x").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn typed_extraction() {
        let cfg = Config::parse(SAMPLE).unwrap();
        let spec = AnalysisSpec::from_config(&cfg).unwrap();

        assert_eq!(spec.input_path.as_deref(), Some(Path::new("data/")));
        assert_eq!(spec.variables, ["ht", "mht", "w", "w_jes_up", "w_jes_dn"]);
        assert!(spec.print_filter_trees);

        assert_eq!(spec.selections.len(), 2);
        assert_eq!(spec.selections[0].label, "baseline");
        assert_eq!(spec.selections[0].line, 10);
        assert_eq!(spec.selections[1].apply_to, ["data", "qcd"]);

        assert_eq!(spec.datasets.len(), 3);
        let data = &spec.datasets[0];
        assert_eq!(data.kind, DataSetKind::Data);
        assert_eq!(data.weight, WeightSpec::Constant(1.0));
        assert_eq!(data.scales, [1.0]);

        let bkg = &spec.datasets[1];
        assert_eq!(bkg.kind, DataSetKind::Mc);
        assert_eq!(bkg.files.len(), 2);
        assert_eq!(bkg.weight, WeightSpec::Column("w".to_string()));
        // One scale factor broadcast to all input files.
        assert_eq!(bkg.scales, [0.5, 0.5]);
        assert_eq!(bkg.uncertainties.len(), 2);
        assert_eq!(bkg.uncertainties[0].label, "jes");
        assert_eq!(bkg.uncertainties[0].down, ValueSpec::Column("w_jes_dn".to_string()));
        assert_eq!(bkg.uncertainties[0].up, ValueSpec::Column("w_jes_up".to_string()));
        assert_eq!(bkg.uncertainties[1].label, "lumi");
        assert_eq!(bkg.uncertainties[1].down, ValueSpec::Rel(0.026));

        let pred = &spec.datasets[2];
        assert_eq!(pred.uncertainties.len(), 1);
        assert_eq!(pred.uncertainties[0].label, TOTAL_UNC_LABEL);
        assert_eq!(pred.uncertainties[0].down, ValueSpec::Rel(0.1));
        assert_eq!(pred.uncertainties[0].up, ValueSpec::Rel(0.2));
    }

    #[test]
    fn unlabeled_uncertainty_cannot_join_labeled_ones() {
        let cfg = Config::parse(
            "dataset :: label: b; type: mc; files: b.json; uncertainty: 0.1; uncertainty jes: 0.2",
        )
        .unwrap();
        let err = AnalysisSpec::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn symmetric_uncertainty_must_not_carry_a_sign() {
        let cfg =
            Config::parse("dataset :: label: b; type: mc; files: b.json; uncertainty: +0.1")
                .unwrap();
        let err = AnalysisSpec::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("',' separated"));
    }

    #[test]
    fn unknown_weight_is_fatal() {
        let cfg =
            Config::parse("dataset :: label: b; type: mc; files: b.json; weight: nope").unwrap();
        let err = AnalysisSpec::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("neither a number nor a declared variable"));
    }

    #[test]
    fn scale_count_must_match_files() {
        let cfg = Config::parse(
            "dataset :: label: b; type: mc; files: a.json, b.json; scales: 1.0, 2.0, 3.0",
        )
        .unwrap();
        let err = AnalysisSpec::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("one scale factor"));
    }

    #[test]
    fn unknown_dataset_type_is_fatal() {
        let cfg = Config::parse("dataset :: label: b; type: bogus; files: b.json").unwrap();
        let err = AnalysisSpec::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
