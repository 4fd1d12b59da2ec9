//! Era-dependent schema resolution.
//!
//! Detector field names changed across data-taking eras (veto and
//! calorimeter station renames with new reconstruction tags). The resolver
//! holds a prioritized list of eras; the first era whose predicate matches
//! the run number contributes its canonical-name → raw-name alias table.
//! An alias is only installed for a canonical name that is absent from the
//! batch, so newer data whose files already carry the canonical names is
//! left untouched.

use tracing::info;

use crate::column::EventBatch;

/// One data-taking era: a run predicate plus the alias table to apply.
pub struct Era {
    /// Human-readable era label, used in logs.
    pub name: String,
    applies: Box<dyn Fn(u32) -> bool + Send + Sync>,
    /// Canonical-name → raw-name pairs.
    pub aliases: Vec<(String, String)>,
}

impl Era {
    /// Create an era from a run predicate and alias pairs.
    pub fn new(
        name: impl Into<String>,
        applies: impl Fn(u32) -> bool + Send + Sync + 'static,
        aliases: Vec<(String, String)>,
    ) -> Self {
        Era { name: name.into(), applies: Box::new(applies), aliases }
    }

    /// Whether this era covers the given run.
    pub fn covers(&self, run: u32) -> bool {
        (self.applies)(run)
    }
}

/// Maps era-dependent raw field names onto the canonical schema.
pub struct SchemaResolver {
    eras: Vec<Era>,
}

/// First run with the second upstream veto station installed.
const FIRST_RUN_WITH_VETO11: u32 = 12000;

const VETO_VARIABLES: &[&str] =
    &["charge", "raw_peak", "raw_charge", "baseline", "baseline_rms", "status"];

const CALO_VARIABLES: &[&str] = &[
    "nMIP",
    "E_dep",
    "E_EM",
    "peak",
    "width",
    "charge",
    "raw_peak",
    "raw_charge",
    "baseline",
    "baseline_rms",
    "status",
];

fn prefix_aliases(prefix_map: &[(&str, &str)], variables: &[&str]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (canonical_prefix, raw_prefix) in prefix_map {
        for var in variables {
            out.push((format!("{canonical_prefix}{var}"), format!("{raw_prefix}{var}")));
        }
    }
    out
}

impl SchemaResolver {
    /// Build a resolver from an ordered era list (first match wins).
    pub fn new(eras: Vec<Era>) -> Self {
        SchemaResolver { eras }
    }

    /// The built-in era list for the current reconstruction tags.
    ///
    /// Runs before the second upstream veto station was installed have no
    /// `Veto11_*` fields; their `VetoSt11_*` canonical names fall back to
    /// the primary station `Veto10_*`.
    pub fn standard() -> Self {
        let calo_map = [("Calo0_", "CaloLo0_"), ("Calo1_", "CaloLo1_"), ("Calo2_", "CaloLo2_"), ("Calo3_", "CaloLo3_")];

        let mut with_veto11 = prefix_aliases(
            &[
                ("VetoSt10_", "Veto10_"),
                ("VetoSt11_", "Veto11_"),
                ("VetoSt20_", "Veto20_"),
                ("VetoSt21_", "Veto21_"),
            ],
            VETO_VARIABLES,
        );
        with_veto11.extend(prefix_aliases(&calo_map, CALO_VARIABLES));

        let mut without_veto11 = prefix_aliases(
            &[
                ("VetoSt10_", "Veto10_"),
                ("VetoSt11_", "Veto10_"),
                ("VetoSt20_", "Veto20_"),
                ("VetoSt21_", "Veto21_"),
            ],
            VETO_VARIABLES,
        );
        without_veto11.extend(prefix_aliases(&calo_map, CALO_VARIABLES));

        SchemaResolver::new(vec![
            Era::new("two veto stations", |run| run >= FIRST_RUN_WITH_VETO11, with_veto11),
            Era::new("single veto station", |run| run < FIRST_RUN_WITH_VETO11, without_veto11),
        ])
    }

    /// Resolve the schema of `batch` for `run`.
    ///
    /// Applies the first matching era's alias table: for every canonical
    /// name that is absent from the batch and whose raw name is present,
    /// install the alias. Returns the installed `(canonical, raw)` pairs
    /// for traceability. Never fails: a canonical name that stays
    /// unresolved surfaces later as a missing-column error where it is
    /// actually used.
    pub fn resolve(&self, run: u32, batch: &mut EventBatch) -> Vec<(String, String)> {
        let Some(era) = self.eras.iter().find(|e| e.covers(run)) else {
            return Vec::new();
        };

        let mut installed = Vec::new();
        for (canonical, raw) in &era.aliases {
            if batch.has_column(canonical) || !batch.has_column(raw) {
                continue;
            }
            // cannot fail: raw presence checked above
            let _ = batch.install_alias(canonical, raw);
            info!(era = %era.name, "aliasing {canonical} -> {raw}");
            installed.push((canonical.clone(), raw.clone()));
        }
        installed
    }
}
