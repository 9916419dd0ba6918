use std::path::Path;

use serde::Serialize;

pub const PROTON_MASS: f64 = 1.007276;

/// Scalar calibration values reported alongside a parsed experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Calibration {
    /// Mass tolerance in ppm.
    pub tolerance: f64,
    pub mass_offset: f64,
    pub charge_mass: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            tolerance: 10.0,
            mass_offset: 0.0,
            charge_mass: PROTON_MASS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumRow {
    pub index: usize,
    pub native_id: String,
    pub ms_level: u8,
    pub peak_count: usize,
    /// Scan start time in seconds.
    pub retention_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpectrumTable {
    pub rows: Vec<SpectrumRow>,
}

impl SpectrumTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExperiment {
    pub deconvolved: SpectrumTable,
    pub annotated: SpectrumTable,
    pub calibration: Calibration,
}

/// Turns one annotated/deconvolved file pair into tables. Implementations
/// must not leave partial state behind on error; the caller caches nothing
/// for a pair that fails.
pub trait ExperimentParser {
    fn parse(&self, annotated: &Path, deconvolved: &Path) -> anyhow::Result<ParsedExperiment>;
}
