// SPDX-License-Identifier: Apache-2.0

//! Developer-facing operations on the storage repository.
//!
//! [`DeveloperRepositoryService`] ties the OAuth flow, the token store and the
//! GitHub client together. Every repository operation loads the stored token;
//! read-modify-write updates of `metadata.json` are retried once when another
//! writer got there first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::ExponentialBuilder;
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use crate::auth::TokenStore;
use crate::config::{AppConfig, GitHubConfig};
use crate::error::{ApiError, AuthError, OneAppError};
use crate::github::client::{GitHubClient, RepositoryRef, build_http_client};
use crate::github::contents::{CommitRef, ContentKind, RemoteFile, Repository};
use crate::github::git::TreeEntry;
use crate::github::oauth::{AuthFlow, OAuthClient, UserAgent};
use crate::github::releases::ReleaseRef;
use crate::github::{parse_owner_repo, parse_repo_url};
use crate::gitmodules::{GitModules, SubmoduleLink};
use crate::layout::{self, GITMODULES_FILE, METADATA_FILE};
use crate::model::{AppMetadata, DeveloperProfile, PlatformType, ReleaseChannel};
use crate::retry::retry_backoff;

/// Metadata files fetched concurrently by [`DeveloperRepositoryService::list_apps`].
const LIST_CONCURRENCY: usize = 4;

const REPOSITORY_DESCRIPTION: &str = "Apps published to the OneApp store";

/// App store operations for the signed-in developer.
pub struct DeveloperRepositoryService {
    oauth: OAuthClient,
    store: Arc<dyn TokenStore>,
    github: GitHubConfig,
    http: reqwest::Client,
    backoff: ExponentialBuilder,
}

impl std::fmt::Debug for DeveloperRepositoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeveloperRepositoryService")
            .field("oauth", &self.oauth)
            .field("github", &self.github)
            .finish_non_exhaustive()
    }
}

impl DeveloperRepositoryService {
    /// Creates a service from configuration and a token store.
    ///
    /// # Errors
    ///
    /// Returns `OneAppError::Config` if the configured URLs are invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: &AppConfig, store: Arc<dyn TokenStore>) -> crate::Result<Self> {
        let http = build_http_client(Duration::from_secs(config.github.api_timeout_seconds))?;
        let oauth = OAuthClient::new(&config.oauth, &config.github, http.clone())?;
        Ok(Self {
            oauth,
            store,
            github: config.github.clone(),
            http,
            backoff: retry_backoff(),
        })
    }

    /// Overrides the retry policy for idempotent reads.
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    /// The OAuth client, e.g. to start a flow whose state the caller observes.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// The token store backing this service.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Signs the developer in through `agent` and caches their profile.
    ///
    /// The token is stored only once the profile lookup with it succeeds. A
    /// cancelled or failed flow leaves the store untouched.
    pub async fn authenticate(&self, agent: &dyn UserAgent) -> Result<DeveloperProfile, AuthError> {
        self.authenticate_with(self.oauth.flow(), agent).await
    }

    /// Like [`authenticate`](Self::authenticate), driving a flow the caller
    /// already subscribed to.
    #[instrument(skip_all)]
    pub async fn authenticate_with(
        &self,
        flow: AuthFlow<'_>,
        agent: &dyn UserAgent,
    ) -> Result<DeveloperProfile, AuthError> {
        let token = flow.run(agent).await?;
        let profile = self
            .github_client(token.clone())
            .get_authenticated_user()
            .await
            .map_err(AuthError::Profile)?;

        self.store.save(&token)?;
        self.store.save_profile(&profile)?;

        info!(login = %profile.github_username, "Authenticated");
        Ok(profile)
    }

    /// Returns true if a non-empty token is stored. Does not contact GitHub.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.has_token()
    }

    /// Forgets the token and the cached profile.
    pub fn logout(&self) -> crate::Result<()> {
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// The cached profile, if any.
    pub fn profile(&self) -> crate::Result<Option<DeveloperProfile>> {
        Ok(self.store.load_profile()?)
    }

    /// Fetches the profile from GitHub and replaces the cached copy.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> crate::Result<DeveloperProfile> {
        let profile = self.client()?.get_authenticated_user().await?;
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    /// Replaces the cached profile.
    pub fn save_profile(&self, profile: &DeveloperProfile) -> crate::Result<()> {
        Ok(self.store.save_profile(profile)?)
    }

    /// GitHub client authenticated with the stored token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if no token is stored.
    pub fn client(&self) -> crate::Result<GitHubClient> {
        let token = self
            .store
            .load()?
            .filter(|t| !t.expose_secret().is_empty())
            .ok_or_else(ApiError::not_authenticated)?;
        Ok(self.github_client(token))
    }

    fn github_client(&self, token: SecretString) -> GitHubClient {
        GitHubClient::new(&self.github.api_base_url, token, self.http.clone())
            .with_backoff(self.backoff)
    }

    // ------------------------------------------------------------------
    // Storage repository
    // ------------------------------------------------------------------

    /// `owner/name` of the storage repository.
    ///
    /// Uses `github.repository` when configured, otherwise the developer's
    /// login and `github.default_repo_name`.
    pub async fn storage_repository(&self) -> crate::Result<(String, String)> {
        if let Some(full_name) = &self.github.repository {
            return parse_owner_repo(full_name);
        }
        let profile = match self.store.load_profile()? {
            Some(profile) => profile,
            None => self.refresh_profile().await?,
        };
        Ok((profile.github_username, self.github.default_repo_name.clone()))
    }

    async fn repository<'c>(
        &self,
        client: &'c GitHubClient,
        channel: ReleaseChannel,
    ) -> crate::Result<Repository<'c>> {
        let (owner, name) = self.storage_repository().await?;
        Ok(client
            .repo(owner, name)
            .on_branch(self.github.branch_for(channel)))
    }

    /// Creates the storage repository, or returns it if it already exists.
    #[instrument(skip(self))]
    pub async fn create_developer_repository(&self, private: bool) -> crate::Result<RepositoryRef> {
        let client = self.client()?;
        let (owner, name) = self.storage_repository().await?;
        match client
            .create_repository(&name, REPOSITORY_DESCRIPTION, private)
            .await
        {
            Ok(repo) => {
                info!(full_name = %repo.full_name, "Created storage repository");
                Ok(repo)
            }
            Err(err) if err.is_conflict() => {
                debug!(%owner, %name, "Storage repository already exists");
                Ok(client.repo(owner, name).info().await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Creates the developer's README and the per-channel `apps/` directories.
    ///
    /// Files that already exist are left alone, so running this twice is
    /// harmless. Returns the commits for the files it created.
    #[instrument(skip(self))]
    pub async fn setup_developer_directory_structure(
        &self,
        developer_id: &str,
    ) -> crate::Result<Vec<CommitRef>> {
        let root = layout::developer_dir(developer_id)?;
        let client = self.client()?;

        let mut files = vec![(
            ReleaseChannel::Stable,
            format!("{root}/README.md"),
            readme(developer_id).into_bytes(),
        )];
        for channel in [ReleaseChannel::Stable, ReleaseChannel::Beta] {
            files.push((
                channel,
                format!("{}/.gitkeep", layout::apps_dir(developer_id, channel)?),
                Vec::new(),
            ));
        }

        let mut created = Vec::new();
        for (channel, path, content) in files {
            let repo = self.repository(&client, channel).await?;
            match repo
                .create_file(&path, &content, &format!("Set up {path}"))
                .await
            {
                Ok(commit) => created.push(commit),
                Err(err) if err.is_conflict() => debug!(%path, "Already exists"),
                Err(err) => return Err(err.into()),
            }
        }
        info!(created = created.len(), "Developer directory ready");
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    /// Lists the developer's apps on `channel`.
    ///
    /// App directories without a readable `metadata.json` are skipped. A
    /// developer without an `apps/` directory has no apps.
    #[instrument(skip(self))]
    pub async fn list_apps(
        &self,
        developer_id: &str,
        channel: ReleaseChannel,
    ) -> crate::Result<Vec<AppMetadata>> {
        let dir = layout::apps_dir(developer_id, channel)?;
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;

        let entries = match repo.get_repository_contents(&dir).await {
            Ok(entries) => entries,
            Err(ApiError::NotFound { .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let repo = &repo;
        let apps: Vec<Option<AppMetadata>> = stream::iter(
            entries
                .into_iter()
                .filter(|entry| entry.kind == ContentKind::Dir),
        )
        .map(|entry| async move {
            let path = format!("{}/{METADATA_FILE}", entry.path);
            let Some(file) = repo.get_file(&path).await? else {
                debug!(%path, "No metadata, skipping");
                return Ok::<_, OneAppError>(None);
            };
            match decode_metadata(&file) {
                Ok(app) => Ok(Some(app)),
                Err(err) => {
                    warn!(%path, error = %err, "Unreadable metadata, skipping");
                    Ok(None)
                }
            }
        })
        .buffered(LIST_CONCURRENCY)
        .try_collect()
        .await?;

        Ok(apps.into_iter().flatten().collect())
    }

    /// Reads one app's metadata.
    #[instrument(skip(self))]
    pub async fn get_app(
        &self,
        developer_id: &str,
        app_id: &str,
        channel: ReleaseChannel,
    ) -> crate::Result<Option<AppMetadata>> {
        let path = layout::metadata_path(developer_id, app_id, channel)?;
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;
        repo.get_file(&path)
            .await?
            .map(|file| decode_metadata(&file))
            .transpose()
    }

    /// Publishes metadata for a new app.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Conflict` if the app already exists.
    #[instrument(skip(self, app), fields(app_id = %app.id))]
    pub async fn create_app(
        &self,
        developer_id: &str,
        app: &AppMetadata,
        channel: ReleaseChannel,
    ) -> crate::Result<CommitRef> {
        check_owner(developer_id, app)?;
        let path = layout::metadata_path(developer_id, &app.id, channel)?;
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;
        let commit = repo
            .create_file(&path, &encode_metadata(app)?, &format!("Add {}", app.id))
            .await?;
        info!(%path, "Created app");
        Ok(commit)
    }

    /// Replaces the metadata of an existing app.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the app does not exist.
    #[instrument(skip(self, app), fields(app_id = %app.id))]
    pub async fn update_app(
        &self,
        developer_id: &str,
        app: &AppMetadata,
        channel: ReleaseChannel,
    ) -> crate::Result<CommitRef> {
        check_owner(developer_id, app)?;
        let path = layout::metadata_path(developer_id, &app.id, channel)?;
        let content = encode_metadata(app)?;
        let message = format!("Update {}", app.id);
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;

        let (repo, path, content, message) = (&repo, path.as_str(), &content, message.as_str());
        retry_on_conflict(path, move || async move {
            let file = repo.get_file(path).await?.ok_or_else(|| ApiError::NotFound {
                resource: path.to_string(),
            })?;
            Ok(repo.update_file(path, content, message, &file.sha).await?)
        })
        .await
    }

    /// Removes an app's `metadata.json`. Uploaded packages stay in place.
    #[instrument(skip(self))]
    pub async fn delete_app(
        &self,
        developer_id: &str,
        app_id: &str,
        channel: ReleaseChannel,
    ) -> crate::Result<()> {
        let path = layout::metadata_path(developer_id, app_id, channel)?;
        let message = format!("Remove {app_id}");
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;

        let (repo, path, message) = (&repo, path.as_str(), message.as_str());
        retry_on_conflict(path, move || async move {
            repo.delete_file(path, message).await?;
            Ok(())
        })
        .await?;
        info!(%path, "Deleted app");
        Ok(())
    }

    /// Uploads a package and records it as the app's `platform` entry.
    ///
    /// Returns the download URL of the package.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the app does not exist; nothing is
    /// uploaded in that case.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn upload_package(
        &self,
        developer_id: &str,
        app_id: &str,
        platform: PlatformType,
        file_name: &str,
        bytes: &[u8],
        channel: ReleaseChannel,
    ) -> crate::Result<String> {
        let package = layout::package_path(developer_id, app_id, platform, file_name, channel)?;
        let metadata = layout::metadata_path(developer_id, app_id, channel)?;
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;

        if repo.get_file(&metadata).await?.is_none() {
            return Err(ApiError::NotFound { resource: metadata }.into());
        }

        let commit = repo
            .put_file(
                &package,
                bytes,
                &format!("Upload {platform} package for {app_id}"),
            )
            .await?;
        let url = commit.download_url.ok_or_else(|| ApiError::Malformed {
            message: format!("{package}: upload response has no download URL"),
        })?;

        let size = bytes.len() as u64;
        read_modify_write(
            &repo,
            &metadata,
            &format!("Add {platform} package to {app_id}"),
            |app| app.upsert_platform(platform, &url, size),
        )
        .await?;

        info!(%url, "Uploaded package");
        Ok(url)
    }

    /// Tags a release of the app and records the version in its metadata.
    ///
    /// The tag is `<app_id>-v<version>`, with a `-beta` suffix on the beta
    /// channel.
    #[instrument(skip(self, notes))]
    pub async fn publish_release(
        &self,
        developer_id: &str,
        app_id: &str,
        version: &str,
        notes: &str,
        channel: ReleaseChannel,
    ) -> crate::Result<ReleaseRef> {
        let version = layout::release_version(version)?;
        let tag = layout::release_tag(app_id, version, channel)?;
        let metadata = layout::metadata_path(developer_id, app_id, channel)?;
        let client = self.client()?;
        let repo = self.repository(&client, channel).await?;

        let file = repo
            .get_file(&metadata)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: metadata.clone(),
            })?;
        let app = decode_metadata(&file)?;

        let release = repo
            .create_release(&tag, &format!("{} {version}", app.name), notes, channel)
            .await?;

        let released_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        read_modify_write(
            &repo,
            &metadata,
            &format!("Release {app_id} {version}"),
            |app| {
                app.version = version.to_string();
                app.release_notes = notes.to_string();
                app.release_date.clone_from(&released_at);
            },
        )
        .await?;

        info!(tag = %release.tag_name, "Published release");
        Ok(release)
    }

    // ------------------------------------------------------------------
    // Store index
    // ------------------------------------------------------------------

    /// Links `repo_url` into the store index as the developer's submodule.
    ///
    /// Registers the URL in `.gitmodules` and pins the submodule to the head
    /// of the linked repository's default branch, in one commit. Nothing is
    /// committed if the link is already in place.
    ///
    /// # Errors
    ///
    /// Returns `OneAppError::Config` if `github.store_repository` is not set.
    #[instrument(skip(self))]
    pub async fn add_repository_as_submodule(
        &self,
        developer_id: &str,
        repo_url: &str,
    ) -> crate::Result<SubmoduleLink> {
        let path = layout::submodule_path(developer_id)?;
        let (owner, name) = parse_repo_url(repo_url)?;
        let client = self.client()?;
        let (linked, target) = default_branch_head(&client.repo(owner, name)).await?;
        let url = format!("{}.git", linked.html_url.trim_end_matches('/'));
        let (store, branch) = self.store_index(&client).await?;

        let linked = &*linked.full_name;
        let (store, branch, path, url, target) = (&store, &*branch, &*path, &*url, &*target);
        let link = retry_on_conflict(path, move || async move {
            let head = store.branch_head(branch).await?;
            let mut modules = read_gitmodules(store, &head).await?;
            let registered = modules.upsert(path, url);
            let pinned = store.submodule_commit(path, &head).await?;

            let store_commit = if registered || pinned.as_deref() != Some(target) {
                let mut entries = vec![TreeEntry::gitlink(path, target)];
                if registered {
                    entries.push(TreeEntry::file(GITMODULES_FILE, modules.to_string()));
                }
                let message = format!("Link {path} to {linked}");
                Some(store.commit_tree(branch, &head, &entries, &message).await?)
            } else {
                None
            };
            Ok(SubmoduleLink {
                path: path.to_string(),
                url: url.to_string(),
                pinned_commit: target.to_string(),
                store_commit,
            })
        })
        .await?;

        info!(%path, commit = ?link.store_commit, "Linked developer repository");
        Ok(link)
    }

    /// Moves the developer's submodule to the head of the linked repository's
    /// default branch. Nothing is committed if it already points there.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the developer has no submodule in
    /// `.gitmodules`.
    #[instrument(skip(self))]
    pub async fn update_submodule_reference(
        &self,
        developer_id: &str,
    ) -> crate::Result<SubmoduleLink> {
        let path = layout::submodule_path(developer_id)?;
        let client = self.client()?;
        let (store, branch) = self.store_index(&client).await?;

        let (client, store, branch, path) = (&client, &store, &*branch, &*path);
        let link = retry_on_conflict(path, move || async move {
            let head = store.branch_head(branch).await?;
            let modules = read_gitmodules(store, &head).await?;
            let url = modules.url_of(path).ok_or_else(|| ApiError::NotFound {
                resource: format!("{GITMODULES_FILE}: {path}"),
            })?;
            let (owner, name) = parse_repo_url(url)?;
            let (_, target) = default_branch_head(&client.repo(owner, name)).await?;
            let pinned = store.submodule_commit(path, &head).await?;

            let store_commit = if pinned.as_deref() == Some(target.as_str()) {
                debug!(%path, "Submodule already up to date");
                None
            } else {
                let entries = [TreeEntry::gitlink(path, &*target)];
                let message = format!("Update {path} to {}", short_sha(&target));
                Some(store.commit_tree(branch, &head, &entries, &message).await?)
            };
            Ok(SubmoduleLink {
                path: path.to_string(),
                url: url.to_string(),
                pinned_commit: target,
                store_commit,
            })
        })
        .await?;

        info!(%path, commit = ?link.store_commit, "Updated submodule reference");
        Ok(link)
    }

    /// The store index repository and its default branch.
    async fn store_index<'c>(
        &self,
        client: &'c GitHubClient,
    ) -> crate::Result<(Repository<'c>, String)> {
        let full_name = self
            .github
            .store_repository
            .as_deref()
            .ok_or_else(|| OneAppError::Config {
                message: "github.store_repository is not set".to_string(),
            })?;
        let (owner, name) = parse_owner_repo(full_name)?;
        let repo = client.repo(owner, name);
        let (_, branch) = default_branch(&repo).await?;
        Ok((repo.on_branch(branch.clone()), branch))
    }
}

async fn default_branch(repo: &Repository<'_>) -> crate::Result<(RepositoryRef, String)> {
    let info = repo.info().await?;
    let branch = if info.default_branch.is_empty() {
        "main".to_string()
    } else {
        info.default_branch.clone()
    };
    Ok((info, branch))
}

/// Repository metadata and the commit its default branch points at.
async fn default_branch_head(repo: &Repository<'_>) -> crate::Result<(RepositoryRef, String)> {
    let (info, branch) = default_branch(repo).await?;
    let head = repo.branch_head(&branch).await?;
    Ok((info, head))
}

/// Reads `.gitmodules` as of `commit`; a missing file is an empty registry.
async fn read_gitmodules(repo: &Repository<'_>, commit: &str) -> crate::Result<GitModules> {
    let at_commit = repo.clone().on_branch(commit);
    let Some(file) = at_commit.get_file(GITMODULES_FILE).await? else {
        return Ok(GitModules::default());
    };
    let text = String::from_utf8(file.content).map_err(|e| ApiError::Malformed {
        message: format!("{GITMODULES_FILE}: {e}"),
    })?;
    Ok(GitModules::parse(&text)?)
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn readme(developer_id: &str) -> String {
    format!(
        "# {developer_id}\n\n\
         Apps published to the OneApp store.\n\n\
         - `stable/apps/`: stable releases\n\
         - `beta/apps/`: beta releases\n"
    )
}

fn check_owner(developer_id: &str, app: &AppMetadata) -> crate::Result<()> {
    if app.developer_id == developer_id {
        Ok(())
    } else {
        Err(OneAppError::invalid_input(format!(
            "app '{}' belongs to developer '{}', not '{developer_id}'",
            app.id, app.developer_id
        )))
    }
}

fn decode_metadata(file: &RemoteFile) -> crate::Result<AppMetadata> {
    serde_json::from_slice(&file.content).map_err(|e| {
        ApiError::Malformed {
            message: format!("{}: {e}", file.path),
        }
        .into()
    })
}

fn encode_metadata(app: &AppMetadata) -> crate::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(app)
        .map_err(|e| OneAppError::invalid_input(format!("cannot encode metadata: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Runs `op` and, if it fails with a write conflict, runs it once more.
async fn retry_on_conflict<T, F, Fut>(resource: &str, mut op: F) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    match op().await {
        Err(OneAppError::Api(err)) if err.is_conflict() => {
            warn!(resource, error = %err, "Write conflict, retrying once");
            op().await
        }
        other => other,
    }
}

/// Reads the metadata at `path`, applies `apply`, and writes it back with the
/// SHA that was read.
async fn read_modify_write<F>(
    repo: &Repository<'_>,
    path: &str,
    message: &str,
    apply: F,
) -> crate::Result<AppMetadata>
where
    F: Fn(&mut AppMetadata),
{
    let apply = &apply;
    retry_on_conflict(path, move || async move {
        let file = repo.get_file(path).await?.ok_or_else(|| ApiError::NotFound {
            resource: path.to_string(),
        })?;
        let mut app = decode_metadata(&file)?;
        apply(&mut app);
        repo.update_file(path, &encode_metadata(&app)?, message, &file.sha)
            .await?;
        Ok(app)
    })
    .await
}
