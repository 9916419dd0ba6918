use std::fs;
use std::path::Path;

use mzdock_core::{atomic_write_bytes, Bucket, DockError, Result};
use tracing::{debug, info, warn};

use crate::session::SessionContext;
use crate::workspace::WorkspaceHandle;

/// An upload as handed over by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DockError::not_found("file", path.display().to_string()))?
            .to_string();
        let bytes = fs::read(path).map_err(|e| DockError::io(path, e))?;
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored(Bucket),
    /// Already known in its bucket; nothing written.
    Duplicate(Bucket),
    /// Name matches neither bucket suffix.
    Skipped,
}

/// Known filenames per bucket. The directory decides what exists; this
/// decides what the session knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    deconvolved: Vec<String>,
    annotated: Vec<String>,
}

impl FileRegistry {
    /// Lists both bucket directories, sorted by name.
    pub fn load_from_disk(workspace: &WorkspaceHandle) -> Result<Self> {
        let mut registry = Self::default();
        for bucket in Bucket::ALL {
            let dir = workspace.bucket_dir(bucket);
            if !dir.is_dir() {
                continue;
            }
            let entries = fs::read_dir(&dir).map_err(|e| DockError::io(&dir, e))?;
            let mut names = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| DockError::io(&dir, e))?;
                let name = entry.file_name().to_string_lossy().to_string();
                let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                if is_file && Bucket::classify(&name) == Some(bucket) {
                    names.push(name);
                }
            }
            names.sort();
            *registry.names_mut(bucket) = names;
        }
        Ok(registry)
    }

    pub fn known(&self, bucket: Bucket) -> &[String] {
        match bucket {
            Bucket::Deconvolved => &self.deconvolved,
            Bucket::Annotated => &self.annotated,
        }
    }

    pub fn contains(&self, bucket: Bucket, name: &str) -> bool {
        self.known(bucket).iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.deconvolved.is_empty() && self.annotated.is_empty()
    }

    pub(crate) fn push(&mut self, bucket: Bucket, name: String) {
        self.names_mut(bucket).push(name);
    }

    pub(crate) fn remove(&mut self, bucket: Bucket, name: &str) {
        self.names_mut(bucket).retain(|n| n != name);
    }

    pub(crate) fn clear(&mut self, bucket: Bucket) {
        self.names_mut(bucket).clear();
    }

    fn names_mut(&mut self, bucket: Bucket) -> &mut Vec<String> {
        match bucket {
            Bucket::Deconvolved => &mut self.deconvolved,
            Bucket::Annotated => &mut self.annotated,
        }
    }
}

/// Stores one upload into its bucket unless the name is already known.
pub fn ingest(session: &mut SessionContext, file: &UploadedFile) -> Result<IngestOutcome> {
    let Some(bucket) = Bucket::classify(&file.name) else {
        debug!(file = %file.name, "ignoring upload without a known suffix");
        return Ok(IngestOutcome::Skipped);
    };
    if file.name.contains(['/', '\\']) {
        warn!(file = %file.name, "ignoring upload with a path in its name");
        return Ok(IngestOutcome::Skipped);
    }
    if session.registry.contains(bucket, &file.name) {
        debug!(file = %file.name, bucket = %bucket, "upload already known");
        return Ok(IngestOutcome::Duplicate(bucket));
    }
    let workspace = session.require_workspace()?;
    let target = workspace.file_path(bucket, &file.name);
    atomic_write_bytes(&target, &file.bytes)?;
    info!(file = %file.name, bucket = %bucket, bytes = file.bytes.len(), "stored upload");
    session.registry.push(bucket, file.name.clone());
    Ok(IngestOutcome::Stored(bucket))
}

/// Ingests every matching file directly inside `dir`, in name order.
pub fn import_directory(
    session: &mut SessionContext,
    dir: &Path,
) -> Result<Vec<(String, IngestOutcome)>> {
    if !dir.is_dir() {
        return Err(DockError::not_found("directory", dir.display().to_string()));
    }
    let walker = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    let mut outcomes = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| DockError::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if Bucket::classify(&name).is_none() {
            continue;
        }
        let upload = UploadedFile::from_path(entry.path())?;
        let outcome = ingest(session, &upload)?;
        outcomes.push((name, outcome));
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceManager;
    use chrono::Utc;
    use mzdock_core::AppConfig;

    fn local_session(tag: &str) -> (WorkspaceManager, SessionContext, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!(
            "mzdock_registry_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        let config = AppConfig {
            workspaces_root: root.clone(),
            ..AppConfig::default()
        };
        let manager = WorkspaceManager::new(&config);
        let mut session = manager.open_session();
        manager.resolve_workspace(&mut session).expect("resolve");
        (manager, session, root)
    }

    #[test]
    fn repeated_upload_is_not_rewritten() {
        let (_m, mut session, root) = local_session("idempotent");
        let first = UploadedFile::new("exp1_deconv.mzML", b"original".to_vec());
        let second = UploadedFile::new("exp1_deconv.mzML", b"replacement".to_vec());
        assert_eq!(
            ingest(&mut session, &first).expect("first"),
            IngestOutcome::Stored(Bucket::Deconvolved)
        );
        assert_eq!(
            ingest(&mut session, &second).expect("second"),
            IngestOutcome::Duplicate(Bucket::Deconvolved)
        );
        let ws = session.require_workspace().expect("ws").clone();
        assert_eq!(
            fs::read(ws.file_path(Bucket::Deconvolved, "exp1_deconv.mzML")).expect("read"),
            b"original"
        );
        assert_eq!(session.registry.known(Bucket::Deconvolved).len(), 1);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn unclassified_uploads_are_skipped() {
        let (_m, mut session, root) = local_session("skip");
        for name in ["readme.txt", "exp1.mzML", "../x_deconv.mzML"] {
            let outcome = ingest(&mut session, &UploadedFile::new(name, b"x".to_vec()))
                .expect("ingest");
            assert_eq!(outcome, IngestOutcome::Skipped, "{}", name);
        }
        assert!(session.registry.is_empty());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn registry_reflects_disk_on_rebind() {
        let (manager, mut session, root) = local_session("rebind");
        ingest(&mut session, &UploadedFile::new("b_annotated.mzML", b"x".to_vec())).expect("b");
        ingest(&mut session, &UploadedFile::new("a_annotated.mzML", b"x".to_vec())).expect("a");
        assert_eq!(
            session.registry.known(Bucket::Annotated),
            ["b_annotated.mzML", "a_annotated.mzML"]
        );

        let mut fresh = manager.open_session();
        manager.resolve_workspace(&mut fresh).expect("resolve");
        assert_eq!(
            fresh.registry.known(Bucket::Annotated),
            ["a_annotated.mzML", "b_annotated.mzML"]
        );
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn import_directory_picks_matching_files_only() {
        let (_m, mut session, root) = local_session("import");
        let source = root.join("example-data");
        fs::create_dir_all(&source).expect("source");
        fs::write(source.join("ex_deconv.mzML"), b"d").expect("d");
        fs::write(source.join("ex_annotated.mzML"), b"a").expect("a");
        fs::write(source.join("ex.tsv"), b"t").expect("t");

        let outcomes = import_directory(&mut session, &source).expect("import");
        assert_eq!(outcomes.len(), 2);
        let again = import_directory(&mut session, &source).expect("import again");
        assert!(again
            .iter()
            .all(|(_, o)| matches!(o, IngestOutcome::Duplicate(_))));
        let _ = fs::remove_dir_all(root);
    }
}
