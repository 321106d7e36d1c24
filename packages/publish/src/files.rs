//! Uploaded project layout on disk.
//!
//! ```text
//! <webRoot>/<uploadsDir>/<projectId>/
//!     index.html, about/team.html ...
//!     .bugence/dve/overlay-<revisionId>.json
//!     .bugence/snapshots/<snapshotId>/
//! ```

use crate::error::PublishResult;
use dve_model::{ProjectId, RevisionId};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const INTERNAL_DIR: &str = ".bugence";

#[derive(Debug, Clone)]
pub struct ProjectFiles {
    web_root: PathBuf,
    uploads_dir: String,
}

impl ProjectFiles {
    pub fn new(web_root: impl Into<PathBuf>, uploads_dir: impl Into<String>) -> Self {
        Self {
            web_root: web_root.into(),
            uploads_dir: uploads_dir.into().trim_matches('/').to_string(),
        }
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    pub fn project_root(&self, project_id: ProjectId) -> PathBuf {
        self.web_root
            .join(&self.uploads_dir)
            .join(project_id.to_string())
    }

    /// A project is known iff its directory exists
    pub fn project_exists(&self, project_id: ProjectId) -> bool {
        project_id > 0 && self.project_root(project_id).is_dir()
    }

    /// File of a normalized page path
    pub fn page_file(&self, project_id: ProjectId, page_path: &str) -> PathBuf {
        page_path
            .split('/')
            .fold(self.project_root(project_id), |path, part| path.join(part))
    }

    pub fn read_page(&self, project_id: ProjectId, page_path: &str) -> PublishResult<Option<String>> {
        let file = self.page_file(project_id, page_path);
        if !file.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(file)?))
    }

    pub fn write_page(&self, project_id: ProjectId, page_path: &str, html: &str) -> PublishResult<()> {
        std::fs::write(self.page_file(project_id, page_path), html)?;
        Ok(())
    }

    /// `.html`/`.htm` pages, relative and `/`-separated, sorted
    pub fn list_pages(&self, project_id: ProjectId) -> Vec<String> {
        let root = self.project_root(project_id);
        let mut pages: Vec<String> = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != INTERNAL_DIR)
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
            })
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&root).ok()?;
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        pages.sort();
        pages
    }

    pub fn internal_dir(&self, project_id: ProjectId) -> PathBuf {
        self.project_root(project_id).join(INTERNAL_DIR)
    }

    pub fn artifact_file_name(revision_id: RevisionId) -> String {
        format!("overlay-{}.json", revision_id)
    }

    pub fn artifact_file(&self, project_id: ProjectId, revision_id: RevisionId) -> PathBuf {
        self.internal_dir(project_id)
            .join("dve")
            .join(Self::artifact_file_name(revision_id))
    }

    /// Web path of a project-relative file: `/<uploadsDir>/<projectId>/<relative>`
    pub fn web_path(&self, project_id: ProjectId, relative: &str) -> String {
        format!(
            "/{}/{}/{}",
            self.uploads_dir,
            project_id,
            relative.trim_start_matches('/')
        )
    }

    pub fn artifact_web_path(&self, project_id: ProjectId, revision_id: RevisionId) -> String {
        self.web_path(
            project_id,
            &format!("{}/dve/{}", INTERNAL_DIR, Self::artifact_file_name(revision_id)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_list_pages_skips_internal_dir() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProjectFiles::new(dir.path(), "Uploads");
        let root = files.project_root(5);
        fs::create_dir_all(root.join("blog")).unwrap();
        fs::create_dir_all(root.join(".bugence/snapshots/1")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("blog/post.HTM"), "").unwrap();
        fs::write(root.join("style.css"), "").unwrap();
        fs::write(root.join(".bugence/snapshots/1/index.html"), "").unwrap();

        assert!(files.project_exists(5));
        assert!(!files.project_exists(6));
        assert_eq!(files.list_pages(5), vec!["blog/post.HTM", "index.html"]);
    }

    #[test]
    fn test_paths() {
        let files = ProjectFiles::new("/srv/www", "/Uploads/");
        assert_eq!(
            files.artifact_web_path(3, 12),
            "/Uploads/3/.bugence/dve/overlay-12.json"
        );
        assert_eq!(
            files.page_file(3, "blog/post.html"),
            PathBuf::from("/srv/www/Uploads/3/blog/post.html")
        );
    }

    #[test]
    fn test_missing_page_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProjectFiles::new(dir.path(), "Uploads");
        assert!(files.read_page(1, "index.html").unwrap().is_none());
    }
}
