//! Per-invocation temporary workspaces.
//!
//! A workspace is a `tempfile` directory created under the uploads root for
//! exactly one pipeline invocation. The invocation calls
//! [`Workspace::release`] once it has consumed everything inside; if it is
//! cancelled before that, dropping the inner `TempDir` removes the directory.

use std::io;
use std::path::Path;

use chrono::Utc;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Exclusively owned temporary directory
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create `<root>/<prefix>-<millis>-<random>`
    pub async fn create(root: &Path, prefix: &str) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", prefix, Utc::now().timestamp_millis()))
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created workspace");

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the directory. Failures are logged, never returned.
    pub async fn release(self) {
        let path = self.dir.path().to_path_buf();

        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed workspace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to clean up workspace"
            ),
        }
    }
}
