//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::services::RefreshService;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::scanner::SourceScanner;
use crate::infrastructure::traits::{FileSystem, RealFileSystem, SnapshotSource};

/// Container holding all application services for one project.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Project directory being scanned
    pub project_dir: PathBuf,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Snapshot producer for the project
    pub scanner: Arc<SourceScanner>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings, project_dir: &Path) -> ApplicationResult<Self> {
        Self::with_deps(settings, project_dir, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        project_dir: &Path,
        fs: Arc<dyn FileSystem>,
    ) -> ApplicationResult<Self> {
        let scanner = Arc::new(SourceScanner::new(
            project_dir,
            settings.project_title(project_dir),
            settings.scan.clone(),
            Arc::clone(&fs),
        )?);
        Ok(Self {
            settings: Arc::new(settings),
            project_dir: project_dir.to_path_buf(),
            fs,
            scanner,
        })
    }

    /// Scanner for another directory with the same settings.
    pub fn scanner_for(&self, dir: &Path) -> ApplicationResult<SourceScanner> {
        SourceScanner::new(
            dir,
            self.settings.project_title(dir),
            self.settings.scan.clone(),
            Arc::clone(&self.fs),
        )
    }

    pub fn snapshot_source(&self) -> Arc<dyn SnapshotSource> {
        self.scanner.clone()
    }

    /// Refresh service whose live tree is a first scan of the project.
    pub fn refresh_service(&self) -> ApplicationResult<Arc<RefreshService>> {
        RefreshService::bootstrap(self.snapshot_source()).map(Arc::new)
    }
}
