//! Docker Hub: organisation repositories with their latest tags, plus teams
//! and members.
//!
//! Settings (`platforms.dockerhub`):
//! - `org` (or `DOCKERHUB_ORG`): organisation namespace
//! - `token` (secret, or `DOCKERHUB_TOKEN`): organisation access token,
//!   exchanged for a short-lived bearer token at the start of every run
//! - `api_url`: defaults to the public v2 API

use async_trait::async_trait;
use inventoryst_core::config::JobSettings;
use inventoryst_core::contract::{Connector, ConnectorError};
use inventoryst_core::page::{Page, PageMap};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::{authorization, ApiClient, ApiError};
use crate::markdown::{format_bytes, format_date, header, info_block, item, list_item, note};

pub const JOB_ID: &str = "dockerhub";
const DEFAULT_API_URL: &str = "https://hub.docker.com/v2";
pub const TAGS_SHOWN: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub pull_count: u64,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub date_registered: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub storage_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub full_size: Option<u64>,
    #[serde(default)]
    pub tag_last_pushed: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrgMember {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub date_joined: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct GroupMember {
    username: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone)]
pub struct RepositoryInventory {
    pub repository: Repository,
    pub tag_count: u64,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone)]
pub struct TeamInventory {
    pub group: Group,
    pub members: Vec<String>,
}

pub struct DockerHub {
    client: ApiClient,
    api_url: String,
    org: String,
    token: String,
}

impl DockerHub {
    pub fn from_settings(settings: &JobSettings) -> Result<Self, ConnectorError> {
        let org = settings.secret(JOB_ID, "org")?;
        let token = settings.secret(JOB_ID, "token")?;
        let api_url = settings
            .get_str("api_url")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: ApiClient::new(HeaderMap::new())?,
            api_url,
            org,
            token,
        })
    }

    async fn authenticate(&self) -> Result<(), ApiError> {
        let url = format!("{}/auth/token", self.api_url);
        let request = TokenRequest {
            identifier: &self.org,
            secret: &self.token,
        };
        let response: TokenResponse = self.client.post_json(&url, &request).await?;
        self.client.set_default_headers(authorization("Bearer", &response.access_token)?);
        debug!(org = %self.org, "Obtained Docker Hub access token");
        Ok(())
    }

    async fn fetch_repositories(&self) -> Result<(u64, Vec<RepositoryInventory>), ApiError> {
        let client = &self.client;
        let base = format!("{}/namespaces/{}/repositories", self.api_url, self.org);
        let repositories: Listing<Repository> = client
            .get_json(&format!("{base}?page_size=100&ordering=last_updated"))
            .await?;

        let mut inventory = Vec::with_capacity(repositories.results.len());
        for repository in repositories.results {
            let tags: Listing<Tag> = client
                .get_json(&format!(
                    "{base}/{}/tags?page_size={TAGS_SHOWN}",
                    repository.name
                ))
                .await?;
            inventory.push(RepositoryInventory {
                repository,
                tag_count: tags.count,
                tags: tags.results,
            });
        }
        Ok((repositories.count, inventory))
    }

    async fn fetch_teams_and_members(
        &self,
    ) -> Result<(Vec<TeamInventory>, Vec<OrgMember>), ApiError> {
        let client = &self.client;
        let base = format!("{}/orgs/{}", self.api_url, self.org);
        let members: Listing<OrgMember> = client.get_json(&format!("{base}/members")).await?;
        let groups: Listing<Group> = client.get_json(&format!("{base}/groups")).await?;

        let mut teams = Vec::with_capacity(groups.results.len());
        for group in groups.results {
            let group_members: Listing<GroupMember> = client
                .get_json(&format!("{base}/groups/{}/members", group.name))
                .await?;
            teams.push(TeamInventory {
                group,
                members: group_members
                    .results
                    .into_iter()
                    .map(|member| member.username)
                    .collect(),
            });
        }
        Ok((teams, members.results))
    }
}

#[async_trait]
impl Connector for DockerHub {
    async fn produce_pages(&self) -> Result<PageMap, ConnectorError> {
        info!(org = %self.org, "Enumerating Docker Hub");
        self.authenticate().await?;
        let (teams, members) = self.fetch_teams_and_members().await?;
        let (repo_count, repositories) = self.fetch_repositories().await?;

        let mut pages = PageMap::new();
        pages.insert(
            "dockerhub/users_teams.md".to_string(),
            render_users_and_teams(&teams, &members),
        );
        pages.insert(
            "dockerhub/repositories.md".to_string(),
            render_repositories(repo_count, &repositories),
        );
        Ok(pages)
    }

    fn api_call_count(&self) -> u64 {
        self.client.call_count()
    }
}

fn dockerhub_page(body: Vec<String>) -> Page {
    Page::new(body)
        .with_property("platform", "Docker Hub")
        .with_property("tags", vec!["inventory", "dockerhub"])
}

fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "-".to_string(),
    }
}

fn date_or_dash(value: Option<&str>) -> String {
    value.map(format_date).unwrap_or_else(|| "-".to_string())
}

/// First 12 hex characters of a `sha256:...` digest.
pub fn short_digest(digest: &str) -> String {
    let hex = digest.split_once(':').map(|(_, hex)| hex).unwrap_or(digest);
    format!("`{}`", hex.chars().take(12).collect::<String>())
}

pub fn render_repositories(total: u64, repositories: &[RepositoryInventory]) -> Page {
    let mut lines = vec![
        info_block("General information"),
        item("Number of repositories", total),
        String::new(),
    ];

    for entry in repositories {
        let repo = &entry.repository;
        lines.push(header(&repo.name, 2));
        lines.push(item("Status", or_dash(repo.status_description.as_deref())));
        lines.push(item("Description", or_dash(repo.description.as_deref())));
        lines.push(item(
            "Visibility",
            if repo.is_private { "Private" } else { "Public" },
        ));
        lines.push(item("Pulls", repo.pull_count));
        lines.push(item("Registered", date_or_dash(repo.date_registered.as_deref())));
        lines.push(item("Updated", date_or_dash(repo.last_updated.as_deref())));
        let categories: Vec<&str> = repo.categories.iter().map(|c| c.name.as_str()).collect();
        lines.push(item("Categories", or_dash(Some(categories.join(", ").as_str()))));
        lines.push(item(
            "Size",
            repo.storage_size.map(format_bytes).unwrap_or_else(|| "-".to_string()),
        ));

        if !entry.tags.is_empty() {
            let truncated = if entry.tag_count as usize > TAGS_SHOWN {
                format!(" {}", note(&format!("(only showing the latest {TAGS_SHOWN} tags)")))
            } else {
                String::new()
            };
            lines.push(item("Tags", format!("{}{truncated}", entry.tag_count)));
            for tag in &entry.tags {
                lines.push(list_item("Tag", &tag.name, 0));
                lines.push(list_item(
                    "Size",
                    tag.full_size.map(format_bytes).unwrap_or_else(|| "-".to_string()),
                    1,
                ));
                lines.push(list_item("Last push", date_or_dash(tag.tag_last_pushed.as_deref()), 1));
                lines.push(list_item(
                    "Digest",
                    tag.digest
                        .as_deref()
                        .map(short_digest)
                        .unwrap_or_else(|| "-".to_string()),
                    1,
                ));
            }
        }
        lines.push(String::new());
    }

    dockerhub_page(lines)
}

pub fn render_users_and_teams(teams: &[TeamInventory], members: &[OrgMember]) -> Page {
    let mut lines = vec![
        info_block("General information"),
        item("Number of teams", teams.len()),
        item("Number of users", members.len()),
        String::new(),
        header("Teams", 2),
    ];

    for team in teams {
        lines.push(header(&team.group.name, 4));
        lines.push(item("Member count", team.group.member_count));
        lines.push(item("Members", team.members.join(", ")));
    }

    lines.push(String::new());
    lines.push(header("Users", 2));
    for member in members {
        lines.push(header(&member.username, 4));
        lines.push(item("Name", or_dash(member.full_name.as_deref())));
        lines.push(item("Email", or_dash(member.email.as_deref())));
        lines.push(item("Role", or_dash(member.role.as_deref())));
        lines.push(item("Type", or_dash(member.kind.as_deref())));
        lines.push(item("Joined", date_or_dash(member.date_joined.as_deref())));
    }

    dockerhub_page(lines)
}
