use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use mzdock_core::{reset_directory, Bucket, DockError, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::registry::FileRegistry;
use crate::report::Reporter;
use crate::session::SessionContext;

/// Files deleted for one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedExperiment {
    pub experiment: String,
    pub deconvolved: Option<String>,
    pub annotated: Option<String>,
}

struct Target {
    experiment: String,
    files: Vec<(Bucket, String)>,
}

/// Deletes the files and cache entries of the given experiments.
///
/// An experiment is found through its summary row first. One that was never
/// parsed in this session (an unpaired upload, or a fresh session whose
/// pairing cycle failed) is found by its conventional filenames among the
/// known uploads. Every target is checked before anything is touched: an
/// unknown experiment or a file already missing from disk fails the whole
/// call.
pub fn remove_experiments(
    session: &mut SessionContext,
    experiments: &[String],
    reporter: &mut dyn Reporter,
) -> Result<Vec<RemovedExperiment>> {
    remove_with(session, experiments, reporter, |path| fs::remove_file(path))
}

fn remove_with<F>(
    session: &mut SessionContext,
    experiments: &[String],
    reporter: &mut dyn Reporter,
    mut delete: F,
) -> Result<Vec<RemovedExperiment>>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let workspace = session.require_workspace()?.clone();
    let current = session.cache.summary();
    let requested: BTreeSet<&str> = experiments.iter().map(String::as_str).collect();

    let mut targets = Vec::new();
    for experiment in &requested {
        let files = match current.find(experiment) {
            Some(row) => vec![
                (Bucket::Deconvolved, row.deconvolved.clone()),
                (Bucket::Annotated, row.annotated.clone()),
            ],
            None => conventional_files(&session.registry, experiment),
        };
        if files.is_empty() {
            let err = DockError::not_found("experiment", *experiment);
            reporter.warning(&err.to_string());
            return Err(err);
        }
        for (bucket, name) in &files {
            let path = workspace.file_path(*bucket, name);
            if !path.is_file() {
                let err = DockError::not_found("file", path.display().to_string());
                reporter.warning(&err.to_string());
                return Err(err);
            }
        }
        targets.push(Target {
            experiment: experiment.to_string(),
            files,
        });
    }

    // Disk first; memory is then synced to exactly what was deleted, even
    // when a deletion fails halfway.
    let mut deleted: Vec<(Bucket, String)> = Vec::new();
    let mut touched: BTreeSet<String> = BTreeSet::new();
    let mut failure = None;
    'targets: for target in &targets {
        for (bucket, name) in &target.files {
            let path = workspace.file_path(*bucket, name);
            if let Err(e) = delete(&path) {
                failure = Some(DockError::io(&path, e));
                break 'targets;
            }
            deleted.push((*bucket, name.clone()));
            touched.insert(target.experiment.clone());
        }
        info!(workspace = %workspace.name(), experiment = %target.experiment, "removed experiment");
    }

    for (bucket, name) in &deleted {
        session.registry.remove(*bucket, name);
        if let Some(entry) = session.cache.remove(*bucket, name) {
            session.cache.remove(bucket.partner(), &entry.partner);
            touched.insert(entry.experiment);
        }
    }
    if let Some(summary) = session.summary.as_mut() {
        summary.drop_experiments(&touched.iter().map(String::as_str).collect());
    }

    if let Some(err) = failure {
        warn!(workspace = %workspace.name(), error = %err, "removal stopped early");
        reporter.error(&err.to_string());
        return Err(err);
    }
    reporter.success("Selected mzML files removed!");
    Ok(targets
        .into_iter()
        .map(|target| {
            let named = |bucket: Bucket| {
                target
                    .files
                    .iter()
                    .find(|(b, _)| *b == bucket)
                    .map(|(_, name)| name.clone())
            };
            RemovedExperiment {
                deconvolved: named(Bucket::Deconvolved),
                annotated: named(Bucket::Annotated),
                experiment: target.experiment,
            }
        })
        .collect())
}

fn conventional_files(registry: &FileRegistry, experiment: &str) -> Vec<(Bucket, String)> {
    Bucket::ALL
        .into_iter()
        .map(|bucket| (bucket, bucket.file_name_for(experiment)))
        .filter(|(bucket, name)| registry.contains(*bucket, name))
        .collect()
}

/// Empties both buckets on disk and forgets every parsed experiment.
pub fn reset_all(session: &mut SessionContext, reporter: &mut dyn Reporter) -> Result<()> {
    let workspace = session.require_workspace()?.clone();
    for bucket in Bucket::ALL {
        reset_directory(&workspace.bucket_dir(bucket))?;
        session.registry.clear(bucket);
    }
    session.cache.clear();
    session.summary = None;
    info!(workspace = %workspace.name(), "removed all uploads");
    reporter.success("All mzML files removed!");
    Ok(())
}
