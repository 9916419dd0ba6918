//! Streaming reader for the mzML files written by the deconvolution tool.
//!
//! Only the spectrum index is extracted: one row per `<spectrum>` with its
//! MS level, peak count and scan start time. The annotated file carries the
//! run's calibration in a `DeconvMassInfo` user parameter of the form
//! `tol=10;massoffset=0.000000;chargemass=1.007276;peaks=...`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use crate::parser::{Calibration, ExperimentParser, ParsedExperiment, SpectrumRow, SpectrumTable};

const MS_LEVEL: &str = "MS:1000511";
const SCAN_START_TIME: &str = "MS:1000016";
const UNIT_MINUTE: &str = "UO:0000031";
const MASS_INFO_PARAM: &str = "DeconvMassInfo";

#[derive(Debug, Clone, Copy, Default)]
pub struct MzmlParser;

impl ExperimentParser for MzmlParser {
    fn parse(&self, annotated: &Path, deconvolved: &Path) -> Result<ParsedExperiment> {
        let anno = scan_file(annotated)
            .with_context(|| format!("reading annotated file {}", annotated.display()))?;
        let deconv = scan_file(deconvolved)
            .with_context(|| format!("reading deconvolved file {}", deconvolved.display()))?;
        let calibration = anno
            .calibration
            .or(deconv.calibration)
            .unwrap_or_default();
        debug!(
            annotated_spectra = anno.table.len(),
            deconvolved_spectra = deconv.table.len(),
            tolerance = calibration.tolerance,
            "parsed mzML pair"
        );
        Ok(ParsedExperiment {
            deconvolved: deconv.table,
            annotated: anno.table,
            calibration,
        })
    }
}

struct ScannedFile {
    table: SpectrumTable,
    calibration: Option<Calibration>,
}

fn scan_file(path: &Path) -> Result<ScannedFile> {
    let mut reader = Reader::from_file(path)?;
    let mut buf = Vec::new();
    let mut rows: Vec<SpectrumRow> = Vec::new();
    let mut current: Option<SpectrumRow> = None;
    let mut calibration = None;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let next_index = rows.len();
                let opened =
                    on_element(&e, &mut current, &mut calibration, &mut saw_root, next_index)?;
                if let Some(row) = opened {
                    current = Some(row);
                }
            }
            Event::Empty(e) => {
                let next_index = rows.len();
                let opened =
                    on_element(&e, &mut current, &mut calibration, &mut saw_root, next_index)?;
                if let Some(row) = opened {
                    rows.push(row);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"spectrum" => {
                if let Some(row) = current.take() {
                    rows.push(row);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        bail!("{} is not an mzML document", path.display());
    }
    Ok(ScannedFile {
        table: SpectrumTable { rows },
        calibration,
    })
}

/// Returns a new row when `e` opens a spectrum; otherwise folds the element
/// into the spectrum being read.
fn on_element(
    e: &BytesStart<'_>,
    current: &mut Option<SpectrumRow>,
    calibration: &mut Option<Calibration>,
    saw_root: &mut bool,
    next_index: usize,
) -> Result<Option<SpectrumRow>> {
    match e.local_name().as_ref() {
        b"mzML" | b"indexedmzML" => *saw_root = true,
        b"spectrum" => {
            let index = attr(e, "index")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(next_index);
            let peak_count = attr(e, "defaultArrayLength")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Ok(Some(SpectrumRow {
                index,
                native_id: attr(e, "id")?.unwrap_or_default(),
                ms_level: 1,
                peak_count,
                retention_time: None,
            }));
        }
        b"cvParam" => {
            if let Some(row) = current.as_mut() {
                match attr(e, "accession")?.as_deref() {
                    Some(MS_LEVEL) => {
                        if let Some(level) = attr(e, "value")?.and_then(|v| v.parse().ok()) {
                            row.ms_level = level;
                        }
                    }
                    Some(SCAN_START_TIME) => {
                        let value: Option<f64> = attr(e, "value")?.and_then(|v| v.parse().ok());
                        let in_minutes = attr(e, "unitAccession")?.as_deref() == Some(UNIT_MINUTE);
                        row.retention_time = value.map(|v| if in_minutes { v * 60.0 } else { v });
                    }
                    _ => {}
                }
            }
        }
        b"userParam" if calibration.is_none() => {
            if attr(e, "name")?.as_deref() == Some(MASS_INFO_PARAM) {
                if let Some(raw) = attr(e, "value")? {
                    *calibration = parse_mass_info(&raw);
                }
            }
        }
        _ => {}
    }
    Ok(None)
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn parse_mass_info(raw: &str) -> Option<Calibration> {
    let mut calibration = Calibration::default();
    let mut found = false;
    for part in raw.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<f64>() else {
            continue;
        };
        match key.trim() {
            "tol" => calibration.tolerance = value,
            "massoffset" => calibration.mass_offset = value,
            "chargemass" => calibration.charge_mass = value,
            _ => continue,
        }
        found = true;
    }
    found.then_some(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use std::path::PathBuf;

    const ANNOTATED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<indexedmzML>
  <mzML version="1.1.0">
    <run id="run1">
      <spectrumList count="2">
        <spectrum index="0" id="scan=1" defaultArrayLength="120">
          <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="1"/>
          <userParam name="DeconvMassInfo" value="tol=5;massoffset=0.5;chargemass=1.007276;peaks=1"/>
          <scanList count="1">
            <scan>
              <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="1.5" unitAccession="UO:0000031"/>
            </scan>
          </scanList>
        </spectrum>
        <spectrum index="1" id="scan=2" defaultArrayLength="40">
          <cvParam cvRef="MS" accession="MS:1000511" name="ms level" value="2"/>
          <scanList count="1">
            <scan>
              <cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="95.0" unitAccession="UO:0000010"/>
            </scan>
          </scanList>
        </spectrum>
      </spectrumList>
    </run>
  </mzML>
</indexedmzML>
"#;

    const DECONVOLVED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<mzML version="1.1.0">
  <run id="run1">
    <spectrumList count="1">
      <spectrum index="0" id="scan=1" defaultArrayLength="7"/>
    </spectrumList>
  </run>
</mzML>
"#;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mzdock_mzml_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn reads_spectra_and_calibration() {
        let dir = scratch("pair");
        let anno = dir.join("exp1_annotated.mzML");
        let deconv = dir.join("exp1_deconv.mzML");
        fs::write(&anno, ANNOTATED).expect("anno");
        fs::write(&deconv, DECONVOLVED).expect("deconv");

        let parsed = MzmlParser.parse(&anno, &deconv).expect("parse");
        assert_eq!(parsed.annotated.len(), 2);
        assert_eq!(parsed.deconvolved.len(), 1);
        let first = &parsed.annotated.rows[0];
        assert_eq!(first.native_id, "scan=1");
        assert_eq!(first.peak_count, 120);
        assert_eq!(first.retention_time, Some(90.0));
        assert_eq!(parsed.annotated.rows[1].ms_level, 2);
        assert_eq!(parsed.annotated.rows[1].retention_time, Some(95.0));
        assert_eq!(parsed.deconvolved.rows[0].peak_count, 7);
        assert_eq!(parsed.calibration.tolerance, 5.0);
        assert_eq!(parsed.calibration.mass_offset, 0.5);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn non_mzml_input_is_rejected() {
        let dir = scratch("bad");
        let anno = dir.join("x_annotated.mzML");
        let deconv = dir.join("x_deconv.mzML");
        fs::write(&anno, "<html><body/></html>").expect("anno");
        fs::write(&deconv, DECONVOLVED).expect("deconv");
        let err = MzmlParser.parse(&anno, &deconv).expect_err("not mzML");
        assert!(format!("{:#}", err).contains("not an mzML document"));

        fs::write(&anno, "<mzML><spectrum></mzML>").expect("anno");
        assert!(MzmlParser.parse(&anno, &deconv).is_err());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn mass_info_falls_back_to_defaults() {
        assert_eq!(parse_mass_info("peaks=3"), None);
        let c = parse_mass_info("tol=20;peaks=3").expect("tol only");
        assert_eq!(c.tolerance, 20.0);
        assert_eq!(c.charge_mass, crate::parser::PROTON_MASS);
    }
}
