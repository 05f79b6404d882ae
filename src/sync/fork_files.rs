use super::Operation;
use crate::error::{Result, ResultExt};
use crate::git::Repository;
use crate::github::PullRequestGateway;
use crate::ui;
use std::fs;
use std::io;
use std::path::PathBuf;

const PATCHES_DIR: &str = "openshift/patches";
const APPLY_PATCHES_MESSAGE: &str = ":fire: Apply carried patches";

impl<R: Repository, G: PullRequestGateway> Operation<R, G> {
    /// Replace upstream CI workflows with the fork's own files and commit.
    ///
    /// Workflows are removed before the overlay so overlaid files survive.
    pub(crate) fn add_fork_files(&self) -> Result<()> {
        self.remove_github_workflows()?;

        tracing::info!("- Add fork's files");
        self.repository
            .checkout(&self.config.downstream_remote(), &self.config.branches.main)
            .onto_workspace()?;

        self.commit_changes(&self.config.messages.apply_fork_files)
    }

    pub(crate) fn remove_github_workflows(&self) -> Result<()> {
        tracing::info!("- Remove upstream Github workflows");
        let workflows = self.project.path.join(".github").join("workflows");
        let entries = match fs::read_dir(&workflows) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no {} directory", workflows.display());
                return Ok(());
            }
            Err(e) => return Err(e).local_err(format!("cannot read {}", workflows.display())),
        };

        for entry in entries {
            let entry = entry.local_err(format!("cannot read {}", workflows.display()))?;
            let name = entry.file_name();
            if !self.workflows_glob.matches(&name.to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            tracing::debug!("removing {}", path.display());
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.local_err(format!("cannot remove {}", path.display()))?;
        }
        Ok(())
    }

    /// Apply `openshift/patches/*.patch` in file name order and commit them.
    ///
    /// Patches are applied to the index too, so the hard reset that follows a failed
    /// patch removes the files earlier patches created.
    pub(crate) fn apply_patches(&self) -> Result<()> {
        tracing::info!("- Apply patches if present");
        let patches = match self.find_patches() {
            Some(patches) => patches,
            None => {
                tracing::info!("-- No patches found");
                return Ok(());
            }
        };

        tracing::info!("-- Found {} patch(es)", patches.len());
        for patch in &patches {
            tracing::info!("-- Applying {}", ui::name(patch.display()));
            let path = patch.to_string_lossy().into_owned();
            self.exec
                .run("git", &["apply", "--index", path.as_str()])
                .local_err(format!("cannot apply {}", patch.display()))?;
        }

        self.commit_changes(APPLY_PATCHES_MESSAGE)
    }

    fn find_patches(&self) -> Option<Vec<PathBuf>> {
        let dir = self.project.path.join(PATCHES_DIR);
        let entries = fs::read_dir(dir).ok()?;
        let mut patches: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "patch").unwrap_or(false))
            .collect();
        patches.sort();
        Some(patches)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::git::mock::Call;
    use crate::git::MockRepository;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_removes_matching_workflows_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".github/workflows/knative-go-test.yaml", "x");
        write(&dir, ".github/workflows/knative-verify.yaml", "x");
        write(&dir, ".github/workflows/fork-release.yaml", "x");
        let op = operation(&dir, config(), MockRepository::new());

        op.remove_github_workflows().unwrap();

        let workflows = dir.path().join(".github/workflows");
        assert!(!workflows.join("knative-go-test.yaml").exists());
        assert!(!workflows.join("knative-verify.yaml").exists());
        assert!(workflows.join("fork-release.yaml").exists());
    }

    #[test]
    fn test_missing_workflows_directory_is_fine() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, config(), MockRepository::new());
        assert!(op.remove_github_workflows().is_ok());
    }

    #[test]
    fn test_overlay_survives_workflow_removal() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".github/workflows/knative-go-test.yaml", "upstream");
        let repo = MockRepository::new()
            .with_overlay(dir.path(), &[(".github/workflows/knative-fork.yaml", "fork")]);
        let op = operation(&dir, config(), repo);

        op.add_fork_files().unwrap();

        let workflows = dir.path().join(".github/workflows");
        assert!(!workflows.join("knative-go-test.yaml").exists());
        assert_eq!(
            fs::read_to_string(workflows.join("knative-fork.yaml")).unwrap(),
            "fork"
        );
        assert_eq!(
            op.repository().calls().last(),
            Some(&Call::Commit(":open_file_folder: Apply fork specific files".to_string()))
        );
    }

    #[test]
    fn test_no_patches_directory_skips_commit() {
        let dir = TempDir::new().unwrap();
        let op = operation(&dir, config(), MockRepository::new());

        op.apply_patches().unwrap();
        assert!(op.repository().calls().is_empty());
    }

    #[test]
    fn test_patches_are_found_in_name_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "openshift/patches/002-b.patch", "");
        write(&dir, "openshift/patches/001-a.patch", "");
        write(&dir, "openshift/patches/README.md", "");
        fs::create_dir_all(dir.path().join("openshift/patches/nested.patch")).unwrap();
        let op = operation(&dir, config(), MockRepository::new());

        let names: Vec<String> = op
            .find_patches()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001-a.patch", "002-b.patch"]);
    }

    #[test]
    fn test_empty_patches_directory_commits_nothing_new() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PATCHES_DIR)).unwrap();
        let op = operation(&dir, config(), MockRepository::new().with_clean_tree());

        op.apply_patches().unwrap();
        assert_eq!(
            op.repository().calls(),
            vec![Call::Commit(APPLY_PATCHES_MESSAGE.to_string())]
        );
    }
}
