// SPDX-License-Identifier: Apache-2.0

//! Git data operations.
//!
//! Builds commits directly from trees so that several paths, including
//! gitlinks that the contents API cannot write, change in one commit. A
//! branch only moves forward: if it advanced since the parent was read, the
//! update fails with [`ApiError::Conflict`].

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::contents::{ContentEntry, ContentKind, ContentsResponse, Repository, encode_path};
use crate::error::ApiError;

const MODE_FILE: &str = "100644";
const MODE_GITLINK: &str = "160000";

/// One path to write in a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    path: String,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl TreeEntry {
    /// A regular file with UTF-8 `content`.
    #[must_use]
    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE,
            kind: "blob",
            sha: None,
            content: Some(content.into()),
        }
    }

    /// A submodule pinned at `commit_sha`.
    #[must_use]
    pub fn gitlink(path: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_GITLINK,
            kind: "commit",
            sha: Some(commit_sha.into()),
            content: None,
        }
    }

    /// Path from the repository root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Deserialize)]
struct RefResponse {
    object: ObjectRef,
}

#[derive(Deserialize)]
struct ObjectRef {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ObjectRef,
}

#[derive(Serialize)]
struct CreateTree<'a> {
    base_tree: &'a str,
    tree: &'a [TreeEntry],
}

#[derive(Serialize)]
struct CreateCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: [&'a str; 1],
}

#[derive(Serialize)]
struct UpdateRef<'a> {
    sha: &'a str,
    force: bool,
}

impl Repository<'_> {
    /// SHA of the commit `branch` points at.
    #[instrument(skip(self), fields(repo = %format!("{}/{}", self.owner(), self.name())))]
    pub async fn branch_head(&self, branch: &str) -> Result<String, ApiError> {
        let path = self.api_path(&format!("/git/ref/heads/{}", encode_path(branch)));
        let head: RefResponse = self.client().get_json(&path, &[]).await?;
        Ok(head.object.sha)
    }

    /// Commit a submodule at `path` is pinned to, at `commit_sha`.
    ///
    /// Returns `None` if `path` does not exist or is not a submodule.
    #[instrument(skip(self))]
    pub async fn submodule_commit(
        &self,
        path: &str,
        commit_sha: &str,
    ) -> Result<Option<String>, ApiError> {
        let resource = self.api_path(&format!("/contents/{}", encode_path(path)));
        let response: Result<ContentsResponse, ApiError> = self
            .client()
            .get_json(&resource, &[("ref", commit_sha)])
            .await;
        match response {
            Ok(ContentsResponse::Single(file)) => {
                let ContentEntry { kind, sha, .. } = file.entry;
                Ok((kind == ContentKind::Submodule).then_some(sha))
            }
            Ok(ContentsResponse::Listing(_)) | Err(ApiError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Commits `entries` on top of `parent` and moves `branch` to the new commit.
    ///
    /// Paths not named in `entries` keep their content from `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Conflict`] if `branch` no longer points at `parent`.
    #[instrument(skip(self, entries), fields(paths = entries.len()))]
    pub async fn commit_tree(
        &self,
        branch: &str,
        parent: &str,
        entries: &[TreeEntry],
        message: &str,
    ) -> Result<String, ApiError> {
        let client = self.client();

        let commit_path = self.api_path(&format!("/git/commits/{parent}"));
        let parent_commit: CommitResponse = client.get_json(&commit_path, &[]).await?;

        let trees = self.api_path("/git/trees");
        let tree: ObjectRef = client
            .send_json(
                client.request(Method::POST, &trees).json(&CreateTree {
                    base_tree: &parent_commit.tree.sha,
                    tree: entries,
                }),
                &trees,
            )
            .await?;

        let commits = self.api_path("/git/commits");
        let commit: CommitResponse = client
            .send_json(
                client.request(Method::POST, &commits).json(&CreateCommit {
                    message,
                    tree: &tree.sha,
                    parents: [parent_commit.sha.as_str()],
                }),
                &commits,
            )
            .await?;

        let ref_path = self.api_path(&format!("/git/refs/heads/{}", encode_path(branch)));
        client
            .send(
                client.request(Method::PATCH, &ref_path).json(&UpdateRef {
                    sha: &commit.sha,
                    force: false,
                }),
                &ref_path,
            )
            .await?;

        debug!(commit = %commit.sha, branch, "Moved branch");
        Ok(commit.sha)
    }
}
