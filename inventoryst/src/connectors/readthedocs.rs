//! Read the Docs: projects and the outcome of their most recent build.
//!
//! Settings (`platforms.readthedocs`): `api_key` (secret, or
//! `READTHEDOCS_API_KEY`) and an optional `api_url`.

use async_trait::async_trait;
use inventoryst_core::config::JobSettings;
use inventoryst_core::contract::{Connector, ConnectorError};
use inventoryst_core::page::{Page, PageMap};
use serde::Deserialize;
use tracing::{debug, info};

use crate::http::{authorization, ApiClient, ApiError};
use crate::markdown::{badge, format_date, header, info_block, item, link};

pub const JOB_ID: &str = "readthedocs";
pub const PAGE_PATH: &str = "readthedocs.md";
const DEFAULT_API_URL: &str = "https://readthedocs.org/api/v3";
const PROJECT_LIMIT: u32 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectList {
    pub count: u64,
    pub results: Vec<Project>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
    pub slug: String,
    pub created: String,
    pub modified: String,
    pub repository: Repository,
    pub urls: ProjectUrls,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectUrls {
    pub documentation: String,
    pub home: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildList {
    pub results: Vec<Build>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub finished: Option<String>,
}

/// A project with its latest build, if it was ever built.
#[derive(Debug, Clone)]
pub struct ProjectInventory {
    pub project: Project,
    pub last_build: Option<Build>,
}

pub struct ReadTheDocs {
    client: ApiClient,
    api_url: String,
}

impl ReadTheDocs {
    pub fn from_settings(settings: &JobSettings) -> Result<Self, ConnectorError> {
        let api_key = settings.secret(JOB_ID, "api_key")?;
        let api_url = settings
            .get_str("api_url")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: ApiClient::new(authorization("Token", &api_key)?)?,
            api_url,
        })
    }

    async fn fetch(&self) -> Result<(u64, Vec<ProjectInventory>), ApiError> {
        let projects: ProjectList = self
            .client
            .get_json(&format!("{}/projects/?limit={PROJECT_LIMIT}", self.api_url))
            .await?;
        debug!(count = projects.count, "Fetched Read the Docs projects");

        let mut inventory = Vec::with_capacity(projects.results.len());
        for project in projects.results {
            // Builds come newest first.
            let builds: BuildList = self
                .client
                .get_json(&format!("{}/projects/{}/builds/", self.api_url, project.slug))
                .await?;
            inventory.push(ProjectInventory {
                project,
                last_build: builds.results.into_iter().next(),
            });
        }
        Ok((projects.count, inventory))
    }
}

#[async_trait]
impl Connector for ReadTheDocs {
    async fn produce_pages(&self) -> Result<PageMap, ConnectorError> {
        info!("Enumerating Read the Docs");
        let (count, projects) = self.fetch().await?;
        let mut pages = PageMap::new();
        pages.insert(PAGE_PATH.to_string(), render_projects(count, &projects));
        Ok(pages)
    }

    fn api_call_count(&self) -> u64 {
        self.client.call_count()
    }
}

pub fn render_projects(total: u64, projects: &[ProjectInventory]) -> Page {
    let mut lines = vec![
        info_block("General information"),
        item(
            "Overview",
            link("https://readthedocs.org/dashboard", "dashboard"),
        ),
        item("Number of projects", total),
        String::new(),
    ];

    for entry in projects {
        let project = &entry.project;
        lines.push(header(&link(&project.urls.home, &project.name), 3));
        lines.push(item("Created", format_date(&project.created)));
        lines.push(item("Modified", format_date(&project.modified)));
        lines.push(item("Repository", &project.repository.url));
        lines.push(item("Documentation", &project.urls.documentation));

        let built = match &entry.last_build {
            Some(build) => {
                let finished = build.finished.as_deref().map(format_date).unwrap_or_default();
                let status = if build.success == Some(true) {
                    badge("success", "green")
                } else {
                    badge("failed", "red")
                };
                format!("{finished} {status}").trim_start().to_string()
            }
            None => badge("never built", "grey"),
        };
        lines.push(item("Last built", built));

        let users: Vec<String> = project
            .users
            .iter()
            .map(|user| {
                link(
                    &format!("https://www.github.com/{}", user.username),
                    &user.username,
                )
            })
            .collect();
        lines.push(item("Users", users.join(", ")));
        lines.push(String::new());
    }

    Page::new(lines)
        .with_property("platform", "Read the Docs")
        .with_property("tags", vec!["inventory", "readthedocs"])
}
