//! The pairing cycle: match newly known deconvolved/annotated uploads, parse
//! each complete pair once, and rebuild the summary table from the caches.

use mzdock_core::{Bucket, DockError, PairingConfig, Result};
use tracing::{info, warn};

use crate::cache::SummaryTable;
use crate::parser::ExperimentParser;
use crate::report::{ProgressGuard, Reporter};
use crate::session::SessionContext;

/// Annotated filename up to (excluding) its last underscore.
pub fn experiment_identity(annotated_name: &str) -> &str {
    match annotated_name.rfind('_') {
        Some(idx) => &annotated_name[..idx],
        None => annotated_name,
    }
}

fn deconvolved_identity(deconvolved_name: &str) -> &str {
    deconvolved_name
        .strip_suffix(Bucket::Deconvolved.suffix())
        .unwrap_or(deconvolved_name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Both buckets are empty.
    NothingUploaded,
    /// Every known file was already parsed.
    UpToDate(SummaryTable),
    /// These experiments were parsed during this cycle.
    Parsed {
        experiments: Vec<String>,
        table: SummaryTable,
    },
}

impl CycleOutcome {
    pub fn table(&self) -> Option<&SummaryTable> {
        match self {
            CycleOutcome::NothingUploaded => None,
            CycleOutcome::UpToDate(table) | CycleOutcome::Parsed { table, .. } => Some(table),
        }
    }
}

/// Runs one pairing cycle over the session's workspace.
///
/// Fails closed: when the new uploads cannot be paired nothing is parsed and
/// neither cache changes. A parser failure stops the cycle; pairs parsed
/// before it stay cached and the summary reflects them.
pub fn run_pairing_cycle(
    session: &mut SessionContext,
    parser: &dyn ExperimentParser,
    pairing: &PairingConfig,
    reporter: &mut dyn Reporter,
) -> Result<CycleOutcome> {
    let workspace = session.require_workspace()?.clone();
    let known_deconv = session.registry.known(Bucket::Deconvolved).to_vec();
    let known_anno = session.registry.known(Bucket::Annotated).to_vec();

    if known_deconv.is_empty() && known_anno.is_empty() {
        session.summary = None;
        reporter.info("No mzML added yet!");
        return Ok(CycleOutcome::NothingUploaded);
    }
    for (bucket, known) in [
        (Bucket::Deconvolved, &known_deconv),
        (Bucket::Annotated, &known_anno),
    ] {
        if known.is_empty() {
            let err = DockError::MissingBucket { missing: bucket };
            reporter.error(&err.to_string());
            return Err(err);
        }
    }

    let mut new_deconv: Vec<String> = known_deconv
        .into_iter()
        .filter(|f| !session.cache.contains(Bucket::Deconvolved, f))
        .collect();
    let mut new_anno: Vec<String> = known_anno
        .into_iter()
        .filter(|f| !session.cache.contains(Bucket::Annotated, f))
        .collect();

    if new_deconv.is_empty() && new_anno.is_empty() {
        let table = publish_summary(session, reporter);
        return Ok(CycleOutcome::UpToDate(table));
    }

    if new_deconv.len() != new_anno.len() {
        return Err(report_unpaired(reporter, &new_deconv, &new_anno));
    }

    if pairing.validate_identity {
        // Filename order and experiment order differ once names contain `_`
        // (`x_d_deconv` sorts before `x_deconv`), so align on identity.
        new_deconv.sort_by(|a, b| deconvolved_identity(a).cmp(deconvolved_identity(b)));
        new_anno.sort_by(|a, b| experiment_identity(a).cmp(experiment_identity(b)));
        let disagreeing: Vec<(&String, &String)> = new_deconv
            .iter()
            .zip(new_anno.iter())
            .filter(|(d, a)| deconvolved_identity(d) != experiment_identity(a))
            .collect();
        if !disagreeing.is_empty() {
            for (d, a) in &disagreeing {
                warn!(deconvolved = %d, annotated = %a, "positional pair has mismatched experiment names");
            }
            return Err(report_unpaired(reporter, &new_deconv, &new_anno));
        }
    } else {
        new_deconv.sort();
        new_anno.sort();
    }

    let mut parsed_now = Vec::new();
    for (deconv_f, anno_f) in new_deconv.iter().zip(new_anno.iter()) {
        let experiment = experiment_identity(anno_f).to_string();
        let result = {
            let _progress = ProgressGuard::begin(
                &mut *reporter,
                format!("Parsing the experiment {}...", experiment),
            );
            parser.parse(
                &workspace.file_path(Bucket::Annotated, anno_f),
                &workspace.file_path(Bucket::Deconvolved, deconv_f),
            )
        };
        let parsed = match result {
            Ok(parsed) => parsed,
            Err(source) => {
                let err = DockError::ParseFailure {
                    experiment: experiment.clone(),
                    source: source.into(),
                };
                warn!(experiment = %experiment, error = %err, "parse failed");
                reporter.error(&err.to_string());
                publish_summary(session, reporter);
                return Err(err);
            }
        };
        session
            .cache
            .insert_pair(&experiment, deconv_f, anno_f, parsed);
        info!(workspace = %workspace.name(), experiment = %experiment, "parsed experiment");
        reporter.success(&format!("Done parsing the experiment {}!", experiment));
        parsed_now.push(experiment);
    }

    let table = publish_summary(session, reporter);
    Ok(CycleOutcome::Parsed {
        experiments: parsed_now,
        table,
    })
}

fn publish_summary(session: &mut SessionContext, reporter: &mut dyn Reporter) -> SummaryTable {
    let table = session.cache.summary();
    if !table.is_empty() {
        reporter.table(&table);
    }
    session.summary = Some(table.clone());
    table
}

fn report_unpaired(reporter: &mut dyn Reporter, deconv: &[String], anno: &[String]) -> DockError {
    let unparsed: Vec<String> = deconv.iter().chain(anno.iter()).cloned().collect();
    warn!(files = ?unparsed, "uploads not in pairs, nothing parsed");
    let mut message =
        String::from("Added files are not in pair, so not parsed. Uploaded but not parsed:");
    for name in &unparsed {
        message.push_str("\n- ");
        message.push_str(name);
    }
    reporter.error(&message);
    DockError::PairingMismatch { unparsed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_truncates_at_last_underscore() {
        assert_eq!(experiment_identity("exp1_annotated.mzML"), "exp1");
        assert_eq!(experiment_identity("my_run_2_annotated.mzML"), "my_run_2");
        assert_eq!(experiment_identity("plain.mzML"), "plain.mzML");
        assert_eq!(deconvolved_identity("my_run_2_deconv.mzML"), "my_run_2");
    }
}
