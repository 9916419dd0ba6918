use mzdock_core::{DockError, Result};
use tracing::debug;

use crate::cache::{ParseCache, SummaryTable};
use crate::params::ParameterOverrides;
use crate::registry::FileRegistry;
use crate::workspace::WorkspaceHandle;

/// Everything one user session holds in memory.
///
/// Built in a fixed order: the workspace is bound first, the registry is then
/// loaded from that workspace's directories, and the parse caches start
/// empty. Rebinding tears all of it down before loading again, so nothing
/// computed for one workspace leaks into another.
#[derive(Debug, Default)]
pub struct SessionContext {
    workspace: Option<WorkspaceHandle>,
    verified: bool,
    pub registry: FileRegistry,
    pub cache: ParseCache,
    /// Last summary shown to the user; `None` until a pairing cycle ran.
    pub summary: Option<SummaryTable>,
    pub overrides: ParameterOverrides,
}

impl SessionContext {
    pub(crate) fn new(verified: bool) -> Self {
        Self {
            verified,
            ..Self::default()
        }
    }

    pub fn workspace(&self) -> Option<&WorkspaceHandle> {
        self.workspace.as_ref()
    }

    pub fn require_workspace(&self) -> Result<&WorkspaceHandle> {
        self.workspace
            .as_ref()
            .ok_or_else(|| DockError::not_found("workspace", "<unbound session>"))
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verified = true;
    }

    pub(crate) fn bind(&mut self, workspace: WorkspaceHandle) -> Result<()> {
        self.teardown();
        let registry = FileRegistry::load_from_disk(&workspace)?;
        debug!(
            workspace = %workspace.name(),
            deconvolved = registry.known(mzdock_core::Bucket::Deconvolved).len(),
            annotated = registry.known(mzdock_core::Bucket::Annotated).len(),
            "session bound"
        );
        self.registry = registry;
        self.workspace = Some(workspace);
        Ok(())
    }

    fn teardown(&mut self) {
        self.workspace = None;
        self.registry = FileRegistry::default();
        self.cache.clear();
        self.summary = None;
        self.overrides.clear();
    }
}
