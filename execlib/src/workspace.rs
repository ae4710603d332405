//! Per-job filesystem resources.
//!
//! Each job gets a script file and a result file in the shared scratch
//! directory, both named after the job's random id. A `Workspace` removes its
//! files when released or dropped, whichever comes first.

use crate::errors::{ExecError, Result};
use crate::types::JobId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    scratch_dir: PathBuf,
}

impl WorkspaceManager {
    /// Creates the scratch directory if it does not exist yet.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Result<Self> {
        let scratch_dir = scratch_dir.into();
        fs::create_dir_all(&scratch_dir).map_err(ExecError::Scratch)?;
        Ok(Self { scratch_dir })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Only computes paths. Nothing touches the disk until the harness writes the script.
    pub fn allocate(&self, token: JobId) -> Workspace {
        let token = token.to_string();
        Workspace {
            script_path: self.scratch_dir.join(format!("script_{}.py", token)),
            result_path: self.scratch_dir.join(format!("result_{}.json", token)),
            scratch_dir: self.scratch_dir.clone(),
            released: false,
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    scratch_dir: PathBuf,
    script_path: PathBuf,
    result_path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    /// Best-effort removal of both files. Safe to call any number of times;
    /// failures are logged and never returned.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for path in [&self.script_path, &self.result_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to clean up workspace file"
                    );
                }
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn touch(workspace: &Workspace) {
        fs::write(workspace.script_path(), "def main(): pass\n").unwrap();
        fs::write(workspace.result_path(), "{}").unwrap();
    }

    #[test]
    fn creates_missing_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("nested").join("scratch");
        let manager = WorkspaceManager::new(&scratch).unwrap();
        assert!(scratch.is_dir());
        assert_eq!(manager.scratch_dir(), scratch.as_path());
    }

    #[test]
    fn paths_are_namespaced_by_token() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let id = Uuid::new_v4();
        let workspace = manager.allocate(id);
        let token = id.to_string();
        assert_eq!(
            workspace.script_path(),
            scratch.path().join(format!("script_{}.py", token))
        );
        assert_eq!(
            workspace.result_path(),
            scratch.path().join(format!("result_{}.json", token))
        );
        assert_eq!(workspace.scratch_dir(), scratch.path());
    }

    #[test]
    fn concurrent_allocations_never_share_paths() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let workspaces: Vec<_> = (0..64).map(|_| manager.allocate(Uuid::new_v4())).collect();
        let paths: HashSet<_> = workspaces
            .iter()
            .flat_map(|ws| [ws.script_path().to_owned(), ws.result_path().to_owned()])
            .collect();
        assert_eq!(paths.len(), 128);
    }

    #[test]
    fn release_removes_files_and_is_idempotent() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let mut workspace = manager.allocate(Uuid::new_v4());
        touch(&workspace);

        workspace.release();
        assert!(workspace.released);
        assert!(!workspace.script_path().exists());
        assert!(!workspace.result_path().exists());

        workspace.release();
        assert!(workspace.released);
    }

    #[test]
    fn release_tolerates_files_that_were_never_written() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let mut workspace = manager.allocate(Uuid::new_v4());
        workspace.release();
        assert!(workspace.released);
    }

    #[test]
    fn drop_releases() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let (script, result) = {
            let workspace = manager.allocate(Uuid::new_v4());
            touch(&workspace);
            (
                workspace.script_path().to_owned(),
                workspace.result_path().to_owned(),
            )
        };
        assert!(!script.exists());
        assert!(!result.exists());
    }

    #[test]
    fn release_leaves_other_jobs_alone() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let mut first = manager.allocate(Uuid::new_v4());
        let second = manager.allocate(Uuid::new_v4());
        touch(&first);
        touch(&second);
        first.release();
        assert!(second.script_path().exists());
        assert!(second.result_path().exists());
    }
}
