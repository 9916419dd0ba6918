use std::fs;
use std::path::{Path, PathBuf};

use mzdock_core::{ensure_dir, AppConfig, Bucket, DockError, Mode, Result};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::SessionContext;

pub const PARAMS_FILE: &str = "params.json";

/// A bound workspace directory. Cheap to clone; every path inside a
/// workspace is derived from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceHandle {
    name: String,
    path: PathBuf,
}

impl WorkspaceHandle {
    pub fn new(root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: root.join(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bucket_dir(&self, bucket: Bucket) -> PathBuf {
        self.path.join(bucket.dir_name())
    }

    pub fn file_path(&self, bucket: Bucket, file_name: &str) -> PathBuf {
        self.bucket_dir(bucket).join(file_name)
    }

    pub fn params_path(&self) -> PathBuf {
        self.path.join(PARAMS_FILE)
    }
}

/// One-time verification step guarding hosted sessions.
pub trait AccessGate {
    fn check(&self, answer: &str) -> bool;
}

/// Gate that accepts a single shared answer. With no answer configured
/// nothing passes.
#[derive(Debug, Clone, Default)]
pub struct TokenGate {
    expected: Option<String>,
}

impl TokenGate {
    pub fn new(expected: Option<String>) -> Self {
        Self { expected }
    }
}

impl AccessGate for TokenGate {
    fn check(&self, answer: &str) -> bool {
        match self.expected.as_deref() {
            Some(expected) => !answer.is_empty() && answer == expected,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceInfo {
    pub name: String,
    pub path: PathBuf,
    pub mode: &'static str,
    pub deconvolved_files: usize,
    pub annotated_files: usize,
    pub share_notice: Option<String>,
}

pub struct WorkspaceManager {
    root: PathBuf,
    mode: Mode,
    default_name: String,
    gate: Box<dyn AccessGate>,
}

impl WorkspaceManager {
    pub fn new(config: &AppConfig) -> Self {
        if config.mode == Mode::Hosted && config.access_token.is_none() {
            warn!("hosted mode without an access token: no session can pass verification");
        }
        Self {
            root: config.workspaces_root.clone(),
            mode: config.mode,
            default_name: config.default_workspace.clone(),
            gate: Box::new(TokenGate::new(config.access_token.clone())),
        }
    }

    pub fn with_gate(mut self, gate: impl AccessGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Local sessions start verified; hosted ones must pass [`Self::verify`].
    pub fn open_session(&self) -> SessionContext {
        SessionContext::new(self.mode == Mode::Local)
    }

    pub fn verify(&self, session: &mut SessionContext, answer: &str) -> bool {
        if session.is_verified() {
            return true;
        }
        let passed = self.gate.check(answer);
        if passed {
            info!("session verified");
            session.mark_verified();
        } else {
            warn!("session verification failed");
        }
        passed
    }

    fn check_access(&self, session: &SessionContext) -> Result<()> {
        if session.is_verified() {
            Ok(())
        } else {
            Err(DockError::AccessDenied)
        }
    }

    /// Binds a workspace if the session has none yet: a fresh unique one in
    /// hosted mode, the shared default locally.
    pub fn resolve_workspace(&self, session: &mut SessionContext) -> Result<WorkspaceHandle> {
        self.check_access(session)?;
        if let Some(current) = session.workspace() {
            return Ok(current.clone());
        }
        let name = match self.mode {
            Mode::Hosted => Uuid::new_v4().to_string(),
            Mode::Local => self.default_name.clone(),
        };
        let handle = WorkspaceHandle::new(&self.root, &name);
        info!(workspace = %name, mode = self.mode.as_str(), "assigning workspace to session");
        self.bind(session, handle)
    }

    pub fn switch_workspace(
        &self,
        session: &mut SessionContext,
        name: &str,
    ) -> Result<WorkspaceHandle> {
        self.check_access(session)?;
        validate_name(name)?;
        let exists = match self.mode {
            Mode::Hosted => self.root.join(name).is_dir(),
            Mode::Local => self.list_workspaces(session)?.iter().any(|n| n == name),
        };
        if !exists {
            return Err(DockError::not_found("workspace", name));
        }
        info!(workspace = %name, "switching workspace");
        self.bind(session, WorkspaceHandle::new(&self.root, name))
    }

    pub fn create_workspace(
        &self,
        session: &mut SessionContext,
        name: &str,
    ) -> Result<WorkspaceHandle> {
        self.check_access(session)?;
        validate_name(name)?;
        let handle = WorkspaceHandle::new(&self.root, name);
        ensure_dir(handle.path())?;
        info!(workspace = %name, "created workspace");
        self.bind(session, handle)
    }

    /// Removes the whole workspace subtree. Deleting the current workspace
    /// rebinds the session to the default one.
    pub fn delete_workspace(&self, session: &mut SessionContext, name: &str) -> Result<()> {
        self.check_access(session)?;
        validate_name(name)?;
        let path = self.root.join(name);
        if !path.is_dir() {
            return Err(DockError::not_found("workspace", name));
        }
        fs::remove_dir_all(&path).map_err(|e| DockError::io(&path, e))?;
        info!(workspace = %name, "deleted workspace");
        let was_current = session.workspace().map(|w| w.name() == name).unwrap_or(false);
        if was_current {
            let fallback = WorkspaceHandle::new(&self.root, &self.default_name);
            self.bind(session, fallback)?;
        }
        Ok(())
    }

    pub fn list_workspaces(&self, session: &SessionContext) -> Result<Vec<String>> {
        self.check_access(session)?;
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                DockError::io(&path, e.into())
            })?;
            if entry.file_type().is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn info(&self, session: &SessionContext) -> Result<WorkspaceInfo> {
        self.check_access(session)?;
        let workspace = session.require_workspace()?;
        let share_notice = match self.mode {
            Mode::Hosted => Some(format!(
                "Your workspace ID is {}. You can share it with other people; anyone with this ID can access your data!",
                workspace.name()
            )),
            Mode::Local => None,
        };
        Ok(WorkspaceInfo {
            name: workspace.name().to_string(),
            path: workspace.path().to_path_buf(),
            mode: self.mode.as_str(),
            deconvolved_files: session.registry.known(Bucket::Deconvolved).len(),
            annotated_files: session.registry.known(Bucket::Annotated).len(),
            share_notice,
        })
    }

    fn bind(&self, session: &mut SessionContext, handle: WorkspaceHandle) -> Result<WorkspaceHandle> {
        ensure_directories(&handle)?;
        session.bind(handle.clone())?;
        Ok(handle)
    }
}

/// Creates the workspace root (home of `params.json`) and both bucket
/// directories. Safe to call on every interaction.
pub fn ensure_directories(workspace: &WorkspaceHandle) -> Result<()> {
    ensure_dir(workspace.path())?;
    for bucket in Bucket::ALL {
        ensure_dir(&workspace.bucket_dir(bucket))?;
    }
    debug!(workspace = %workspace.name(), "workspace directories ensured");
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(DockError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scratch_config(tag: &str, mode: Mode) -> AppConfig {
        let root = std::env::temp_dir().join(format!(
            "mzdock_ws_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        AppConfig {
            workspaces_root: root,
            mode,
            access_token: Some("letmein".to_string()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn local_sessions_share_the_default_workspace() {
        let config = scratch_config("local", Mode::Local);
        let manager = WorkspaceManager::new(&config);
        let mut first = manager.open_session();
        let mut second = manager.open_session();
        let a = manager.resolve_workspace(&mut first).expect("first");
        let b = manager.resolve_workspace(&mut second).expect("second");
        assert_eq!(a.name(), "default");
        assert_eq!(a, b);
        assert!(a.bucket_dir(Bucket::Deconvolved).is_dir());
        assert!(a.bucket_dir(Bucket::Annotated).is_dir());
        let _ = fs::remove_dir_all(&config.workspaces_root);
    }

    #[test]
    fn hosted_sessions_get_distinct_workspaces_after_verification() {
        let config = scratch_config("hosted", Mode::Hosted);
        let manager = WorkspaceManager::new(&config);
        let mut first = manager.open_session();
        let mut second = manager.open_session();

        let err = manager.resolve_workspace(&mut first).expect_err("gate closed");
        assert!(matches!(err, DockError::AccessDenied));
        assert!(manager.list_workspaces(&first).is_err());
        assert!(!manager.verify(&mut first, "wrong"));

        assert!(manager.verify(&mut first, "letmein"));
        assert!(manager.verify(&mut second, "letmein"));
        let a = manager.resolve_workspace(&mut first).expect("first");
        let b = manager.resolve_workspace(&mut second).expect("second");
        assert_ne!(a.name(), b.name());
        assert_eq!(
            manager.resolve_workspace(&mut first).expect("stable").name(),
            a.name()
        );
        let _ = fs::remove_dir_all(&config.workspaces_root);
    }

    #[test]
    fn switch_requires_existing_workspace() {
        let config = scratch_config("switch", Mode::Hosted);
        let manager = WorkspaceManager::new(&config);
        let mut session = manager.open_session();
        assert!(manager.verify(&mut session, "letmein"));
        manager.resolve_workspace(&mut session).expect("resolve");

        let err = manager
            .switch_workspace(&mut session, "nope")
            .expect_err("missing workspace");
        assert!(matches!(err, DockError::NotFound { kind: "workspace", .. }));

        ensure_dir(&config.workspaces_root.join("shared")).expect("seed");
        let handle = manager
            .switch_workspace(&mut session, "shared")
            .expect("switch");
        assert_eq!(session.workspace(), Some(&handle));
        let _ = fs::remove_dir_all(&config.workspaces_root);
    }

    #[test]
    fn create_is_idempotent_and_delete_falls_back_to_default() {
        let config = scratch_config("lifecycle", Mode::Local);
        let manager = WorkspaceManager::new(&config);
        let mut session = manager.open_session();
        manager.resolve_workspace(&mut session).expect("resolve");

        manager.create_workspace(&mut session, "run-a").expect("create");
        manager.create_workspace(&mut session, "run-a").expect("create again");
        assert_eq!(session.workspace().map(|w| w.name()), Some("run-a"));
        assert_eq!(
            manager.list_workspaces(&session).expect("list"),
            vec!["default".to_string(), "run-a".to_string()]
        );

        manager.delete_workspace(&mut session, "run-a").expect("delete");
        assert!(!config.workspaces_root.join("run-a").exists());
        assert_eq!(session.workspace().map(|w| w.name()), Some("default"));

        let err = manager
            .delete_workspace(&mut session, "run-a")
            .expect_err("already gone");
        assert!(matches!(err, DockError::NotFound { .. }));
        let _ = fs::remove_dir_all(&config.workspaces_root);
    }

    #[test]
    fn names_that_escape_the_root_are_rejected() {
        for bad in ["", "..", "../etc", "a/b", ".hidden", "a b"] {
            assert!(validate_name(bad).is_err(), "{:?} should be rejected", bad);
        }
        assert!(validate_name("4f1c2b7e-aaaa-4bbb-8ccc-123456789abc").is_ok());
    }
}
