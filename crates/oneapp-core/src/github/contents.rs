// SPDX-License-Identifier: Apache-2.0

//! Repository content operations.
//!
//! Wraps the `/repos/{owner}/{repo}/contents/{path}` endpoints. Reads are
//! retried on transient failures; writes are sent once.
//!
//! Updating a file needs the blob SHA it replaces. [`Repository::put_file`]
//! looks it up first; [`Repository::update_file`] takes the SHA the caller read,
//! so a concurrent writer surfaces as [`ApiError::Conflict`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::client::{GitHubClient, RepositoryRef};
use crate::error::ApiError;

/// Characters escaped inside a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub(crate) fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Kind of a repository content entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link.
    Symlink,
    /// Git submodule.
    Submodule,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// File or directory name.
    pub name: String,
    /// Path from the repository root.
    pub path: String,
    /// Blob (or tree) SHA.
    pub sha: String,
    /// Size in bytes (0 for directories).
    #[serde(default)]
    pub size: u64,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Raw download URL (files only).
    #[serde(default)]
    pub download_url: Option<String>,
}

/// A file read from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Path from the repository root.
    pub path: String,
    /// Blob SHA, needed to update or delete the file.
    pub sha: String,
    /// Decoded content.
    pub content: Vec<u8>,
    /// Raw download URL.
    pub download_url: Option<String>,
}

/// Result of a content write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    /// SHA of the commit that made the change.
    pub commit_sha: String,
    /// SHA of the written blob.
    pub blob_sha: String,
    /// Path that was written.
    pub path: String,
    /// Raw download URL of the written file.
    pub download_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct FileResponse {
    #[serde(flatten)]
    pub(crate) entry: ContentEntry,
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(Box<FileResponse>),
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: Option<ContentEntry>,
    commit: CommitInfo,
}

#[derive(Deserialize)]
struct CommitInfo {
    sha: String,
}

/// Handle on one repository, optionally pinned to a branch.
#[derive(Debug, Clone)]
pub struct Repository<'a> {
    client: &'a GitHubClient,
    owner: String,
    name: String,
    branch: Option<String>,
}

impl GitHubClient {
    /// Returns a handle on `owner/name`.
    #[must_use]
    pub fn repo(&self, owner: impl Into<String>, name: impl Into<String>) -> Repository<'_> {
        Repository {
            client: self,
            owner: owner.into(),
            name: name.into(),
            branch: None,
        }
    }
}

impl<'a> Repository<'a> {
    /// Reads from and writes to `branch` instead of the default branch.
    #[must_use]
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Branch writes go to, if pinned.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub(crate) fn client(&self) -> &'a GitHubClient {
        self.client
    }

    pub(crate) fn api_path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{suffix}", self.owner, self.name)
    }

    fn contents_path(&self, path: &str) -> String {
        self.api_path(&format!("/contents/{}", encode_path(path)))
    }

    async fn get_contents(&self, path: &str) -> Result<ContentsResponse, ApiError> {
        let query: Vec<(&str, &str)> = self.branch.iter().map(|b| ("ref", b.as_str())).collect();
        self.client
            .get_json(&self.contents_path(path), &query)
            .await
    }

    /// Fetches repository metadata.
    #[instrument(skip(self), fields(repo = %format!("{}/{}", self.owner, self.name)))]
    pub async fn info(&self) -> Result<RepositoryRef, ApiError> {
        self.client.get_json(&self.api_path(""), &[]).await
    }

    /// Lists a directory. A path naming a single file yields a one-element list.
    #[instrument(skip(self))]
    pub async fn get_repository_contents(&self, path: &str) -> Result<Vec<ContentEntry>, ApiError> {
        match self.get_contents(path).await? {
            ContentsResponse::Listing(entries) => {
                debug!(count = entries.len(), "Listed directory");
                Ok(entries)
            }
            ContentsResponse::Single(file) => Ok(vec![file.entry]),
        }
    }

    /// Reads and decodes a file. Returns `None` if it does not exist.
    #[instrument(skip(self))]
    pub async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, ApiError> {
        let file = match self.get_contents(path).await {
            Ok(ContentsResponse::Single(file)) => file,
            Ok(ContentsResponse::Listing(_)) => {
                return Err(ApiError::Malformed {
                    message: format!("{path} is a directory"),
                });
            }
            Err(ApiError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let FileResponse {
            entry,
            content,
            encoding,
        } = *file;
        let content = match (content, encoding.as_deref()) {
            (Some(content), Some("base64") | None) => decode_content(path, &content)?,
            (_, encoding) => {
                return Err(ApiError::Malformed {
                    message: format!(
                        "{path}: content not inline (encoding {})",
                        encoding.unwrap_or("none")
                    ),
                });
            }
        };

        Ok(Some(RemoteFile {
            path: entry.path,
            sha: entry.sha,
            content,
            download_url: entry.download_url,
        }))
    }

    /// Returns the blob SHA of a file without decoding its content.
    async fn file_sha(&self, path: &str) -> Result<Option<String>, ApiError> {
        match self.get_contents(path).await {
            Ok(ContentsResponse::Single(file)) => Ok(Some(file.entry.sha)),
            Ok(ContentsResponse::Listing(_)) => Err(ApiError::Malformed {
                message: format!("{path} is a directory"),
            }),
            Err(ApiError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<CommitRef, ApiError> {
        let body = WriteRequest {
            message,
            content: Some(STANDARD.encode(content)),
            sha,
            branch: self.branch.as_deref(),
        };
        let response: WriteResponse = self
            .client
            .send_json(
                self.client
                    .request(Method::PUT, &self.contents_path(path))
                    .json(&body),
                path,
            )
            .await?;

        let entry = response.content.ok_or_else(|| ApiError::Malformed {
            message: format!("{path}: write response has no content"),
        })?;
        debug!(commit = %response.commit.sha, blob = %entry.sha, "Wrote file");
        Ok(CommitRef {
            commit_sha: response.commit.sha,
            blob_sha: entry.sha,
            path: entry.path,
            download_url: entry.download_url,
        })
    }

    /// Creates or replaces a file.
    ///
    /// Looks up the current blob SHA and sends it with the update. If another
    /// writer changes the file in between, fails with [`ApiError::Conflict`].
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<CommitRef, ApiError> {
        let sha = self.file_sha(path).await?;
        self.write(path, content, message, sha.as_deref()).await
    }

    /// Replaces a file whose current SHA the caller already read.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn update_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: &str,
    ) -> Result<CommitRef, ApiError> {
        self.write(path, content, message, Some(sha)).await
    }

    /// Creates a file that must not exist yet.
    ///
    /// Fails with [`ApiError::Conflict`] if it does.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn create_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<CommitRef, ApiError> {
        self.write(path, content, message, None).await
    }

    /// Deletes a file and returns the commit SHA.
    ///
    /// Fails with [`ApiError::NotFound`] if it does not exist.
    #[instrument(skip(self))]
    pub async fn delete_file(&self, path: &str, message: &str) -> Result<String, ApiError> {
        let sha = self.file_sha(path).await?.ok_or_else(|| ApiError::NotFound {
            resource: path.to_string(),
        })?;
        self.delete_file_with_sha(path, message, &sha).await
    }

    /// Deletes a file whose current SHA the caller already read.
    #[instrument(skip(self))]
    pub async fn delete_file_with_sha(
        &self,
        path: &str,
        message: &str,
        sha: &str,
    ) -> Result<String, ApiError> {
        let body = WriteRequest {
            message,
            content: None,
            sha: Some(sha),
            branch: self.branch.as_deref(),
        };
        let response: WriteResponse = self
            .client
            .send_json(
                self.client
                    .request(Method::DELETE, &self.contents_path(path))
                    .json(&body),
                path,
            )
            .await?;
        debug!(commit = %response.commit.sha, "Deleted file");
        Ok(response.commit.sha)
    }
}

fn decode_content(path: &str, content: &str) -> Result<Vec<u8>, ApiError> {
    // GitHub wraps base64 content at 60 columns.
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| ApiError::Malformed {
        message: format!("{path}: invalid base64 content: {e}"),
    })
}
