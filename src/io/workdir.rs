use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Uniquely named scratch directory owned by one tuning iteration.
/// Removed when dropped, on success and on every error path.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub fn new_in(root: &Path, label: &str) -> std::io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("moortune-{label}-"))
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
