use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use mzdock_core::{atomic_write_bytes, Bucket, DockError, Result};
use serde::Serialize;

use crate::parser::{Calibration, ParsedExperiment, SpectrumTable};

/// One parsed side of an experiment, keyed in its bucket's cache by the raw
/// filename.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub experiment: String,
    /// Filename of the counterpart in the other bucket.
    pub partner: String,
    pub table: SpectrumTable,
    pub calibration: Calibration,
}

/// Parsed tables for both buckets. Entries are only ever added or removed
/// in pairs.
#[derive(Debug, Clone, Default)]
pub struct ParseCache {
    deconvolved: BTreeMap<String, CacheEntry>,
    annotated: BTreeMap<String, CacheEntry>,
}

impl ParseCache {
    pub fn contains(&self, bucket: Bucket, name: &str) -> bool {
        self.side(bucket).contains_key(name)
    }

    pub fn get(&self, bucket: Bucket, name: &str) -> Option<&CacheEntry> {
        self.side(bucket).get(name)
    }

    pub fn keys(&self, bucket: Bucket) -> impl Iterator<Item = &str> {
        self.side(bucket).keys().map(String::as_str)
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        self.side(bucket).len()
    }

    pub fn is_empty(&self) -> bool {
        self.deconvolved.is_empty() && self.annotated.is_empty()
    }

    pub(crate) fn insert_pair(
        &mut self,
        experiment: &str,
        deconvolved: &str,
        annotated: &str,
        parsed: ParsedExperiment,
    ) {
        self.deconvolved.insert(
            deconvolved.to_string(),
            CacheEntry {
                experiment: experiment.to_string(),
                partner: annotated.to_string(),
                table: parsed.deconvolved,
                calibration: parsed.calibration,
            },
        );
        self.annotated.insert(
            annotated.to_string(),
            CacheEntry {
                experiment: experiment.to_string(),
                partner: deconvolved.to_string(),
                table: parsed.annotated,
                calibration: parsed.calibration,
            },
        );
    }

    pub(crate) fn remove(&mut self, bucket: Bucket, name: &str) -> Option<CacheEntry> {
        match bucket {
            Bucket::Deconvolved => self.deconvolved.remove(name),
            Bucket::Annotated => self.annotated.remove(name),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.deconvolved.clear();
        self.annotated.clear();
    }

    /// Builds the summary from scratch: one row per annotated entry.
    pub fn summary(&self) -> SummaryTable {
        let rows = self
            .annotated
            .iter()
            .map(|(name, entry)| SummaryRow {
                experiment: entry.experiment.clone(),
                deconvolved: entry.partner.clone(),
                annotated: name.clone(),
            })
            .collect();
        SummaryTable { rows }
    }

    fn side(&self, bucket: Bucket) -> &BTreeMap<String, CacheEntry> {
        match bucket {
            Bucket::Deconvolved => &self.deconvolved,
            Bucket::Annotated => &self.annotated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub experiment: String,
    pub deconvolved: String,
    pub annotated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, experiment: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.experiment == experiment)
    }

    pub fn experiments(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.experiment.as_str()).collect()
    }

    /// Drops the rows of the given experiments, keeping the rest in place.
    pub(crate) fn drop_experiments(&mut self, removed: &BTreeSet<&str>) {
        self.rows.retain(|r| !removed.contains(r.experiment.as_str()));
    }

    pub fn write_tsv<W: Write>(&self, out: W) -> csv::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(out);
        writer.write_record(["Experiment Name", "Deconvolved Files", "Annotated Files"])?;
        for row in &self.rows {
            writer.write_record([&row.experiment, &row.deconvolved, &row.annotated])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn export_tsv(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        self.write_tsv(&mut buf)
            .map_err(|e| DockError::io(path, std::io::Error::other(e)))?;
        atomic_write_bytes(path, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed() -> ParsedExperiment {
        ParsedExperiment {
            deconvolved: SpectrumTable::default(),
            annotated: SpectrumTable::default(),
            calibration: Calibration::default(),
        }
    }

    #[test]
    fn summary_follows_annotated_entries() {
        let mut cache = ParseCache::default();
        cache.insert_pair("b", "b_deconv.mzML", "b_annotated.mzML", parsed());
        cache.insert_pair("a", "a_deconv.mzML", "a_annotated.mzML", parsed());
        let table = cache.summary();
        assert_eq!(table.experiments(), vec!["a", "b"]);
        assert_eq!(
            table.find("b").map(|r| r.deconvolved.as_str()),
            Some("b_deconv.mzML")
        );

        cache.remove(Bucket::Annotated, "a_annotated.mzML");
        cache.remove(Bucket::Deconvolved, "a_deconv.mzML");
        assert_eq!(cache.summary().experiments(), vec!["b"]);
    }

    #[test]
    fn tsv_export_has_header_and_rows() {
        let mut cache = ParseCache::default();
        cache.insert_pair("exp1", "exp1_deconv.mzML", "exp1_annotated.mzML", parsed());
        let mut out = Vec::new();
        cache.summary().write_tsv(&mut out).expect("tsv");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "Experiment Name\tDeconvolved Files\tAnnotated Files\nexp1\texp1_deconv.mzML\texp1_annotated.mzML\n"
        );
    }
}
