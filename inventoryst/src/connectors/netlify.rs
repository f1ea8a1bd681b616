//! Netlify: sites with their recent production deploys, and team members.
//!
//! Settings (`platforms.netlify`):
//! - `team` (required): team slug
//! - `api_key` (secret, or `NETLIFY_API_KEY`)
//! - `api_url`: defaults to the public v1 API
//! - `user_inactive_days`: members idle longer are labelled inactive (default 30)
//! - `last_deploys`: production deploys listed per site (default 5)

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use inventoryst_core::config::JobSettings;
use inventoryst_core::contract::{Connector, ConnectorError};
use inventoryst_core::page::{Page, PageMap};
use serde::Deserialize;
use tracing::{debug, info};

use crate::http::{authorization, ApiClient, ApiError};
use crate::markdown::{format_date, header, highlight, info_block, item, link, parse_date};

pub const JOB_ID: &str = "netlify";
const DEFAULT_API_URL: &str = "https://api.netlify.com/api/v1";
const DEFAULT_INACTIVE_DAYS: u64 = 30;
const DEFAULT_LAST_DEPLOYS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub name: String,
    #[serde(default)]
    pub ssl_url: Option<String>,
    #[serde(default)]
    pub default_domain: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub build_settings: Option<BuildSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSettings {
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvVar {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deploy {
    pub id: String,
    pub state: String,
    pub created_at: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub full_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub mfa_enabled: bool,
    pub role: String,
    #[serde(default)]
    pub site_access: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub last_activity_date: Option<String>,
}

impl Member {
    /// Display name, falling back to the e-mail address.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

/// A site together with everything fetched for it.
#[derive(Debug, Clone)]
pub struct SiteInventory {
    pub site: Site,
    pub env_vars: Vec<String>,
    pub deploys: Vec<Deploy>,
    pub certificate: Option<Certificate>,
}

pub struct Netlify {
    client: ApiClient,
    api_url: String,
    team: String,
    inactive_days: u64,
    last_deploys: u64,
}

impl Netlify {
    pub fn from_settings(settings: &JobSettings) -> Result<Self, ConnectorError> {
        let api_key = settings.secret(JOB_ID, "api_key")?;
        let team = settings.require_str("team")?.to_string();
        let api_url = settings
            .get_str("api_url")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        let client = ApiClient::new(authorization("Bearer", &api_key)?)?;
        Ok(Self {
            client,
            api_url,
            team,
            inactive_days: settings
                .get_u64("user_inactive_days")
                .unwrap_or(DEFAULT_INACTIVE_DAYS),
            last_deploys: settings.get_u64("last_deploys").unwrap_or(DEFAULT_LAST_DEPLOYS),
        })
    }

    async fn fetch_sites(&self) -> Result<Vec<SiteInventory>, ApiError> {
        let sites: Vec<Site> = self
            .client
            .get_json(&format!("{}/{}/sites", self.api_url, self.team))
            .await?;
        debug!(count = sites.len(), "Fetched Netlify sites");

        let mut inventory = Vec::with_capacity(sites.len());
        for site in sites {
            let env: Vec<EnvVar> = self
                .client
                .get_json(&format!(
                    "{}/accounts/{}/env?site_id={}",
                    self.api_url, self.team, site.site_id
                ))
                .await?;
            let mut env_vars: Vec<String> = env.into_iter().map(|var| var.key).collect();
            env_vars.sort();

            let mut deploys: Vec<Deploy> = self
                .client
                .get_json(&format!(
                    "{}/sites/{}/deploys?production=true&per_page={}",
                    self.api_url, site.site_id, self.last_deploys
                ))
                .await?;
            deploys.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            // Sites without a custom certificate answer 404.
            let certificate = match self
                .client
                .get_json::<Certificate>(&format!("{}/sites/{}/ssl", self.api_url, site.site_id))
                .await
            {
                Ok(cert) if cert.expires_at.is_some() => Some(cert),
                Ok(_) => None,
                Err(e) if e.status() == Some(404) => None,
                Err(e) => return Err(e),
            };

            inventory.push(SiteInventory {
                site,
                env_vars,
                deploys,
                certificate,
            });
        }
        Ok(inventory)
    }

    async fn fetch_members(&self) -> Result<Vec<Member>, ApiError> {
        self.client
            .get_json(&format!("{}/{}/members", self.api_url, self.team))
            .await
    }
}

#[async_trait]
impl Connector for Netlify {
    async fn produce_pages(&self) -> Result<PageMap, ConnectorError> {
        info!(team = %self.team, "Enumerating Netlify");
        let sites = self.fetch_sites().await?;
        let members = self.fetch_members().await?;
        let today = Utc::now().date_naive();

        let mut pages = PageMap::new();
        pages.insert("netlify/sites.md".to_string(), render_sites(&self.team, &sites));
        pages.insert(
            "netlify/members.md".to_string(),
            render_members(&self.team, &members, self.inactive_days, today),
        );
        Ok(pages)
    }

    fn api_call_count(&self) -> u64 {
        self.client.call_count()
    }
}

fn netlify_page(body: Vec<String>) -> Page {
    Page::new(body)
        .with_property("platform", "Netlify")
        .with_property("tags", vec!["inventory", "netlify"])
}

fn deploy_label(deploy: &Deploy) -> String {
    match (deploy.state.as_str(), deploy.error_message.as_deref()) {
        ("ready", _) => highlight("Published", "green"),
        ("error", Some("Canceled build")) => highlight("Canceled", "grey"),
        ("error", _) => highlight("Error", "red"),
        (other, _) => highlight(other, "grey"),
    }
}

pub fn render_sites(team: &str, sites: &[SiteInventory]) -> Page {
    let mut lines = vec![
        info_block("General information"),
        item(
            "Overview",
            link(&format!("https://app.netlify.com/teams/{team}/sites"), "Sites"),
        ),
        item("Number of sites", sites.len()),
        String::new(),
    ];

    let mut sorted: Vec<&SiteInventory> = sites.iter().collect();
    sorted.sort_by(|a, b| a.site.name.cmp(&b.site.name));

    for entry in sorted {
        let site = &entry.site;
        let title = link(
            &format!("https://app.netlify.com/sites/{}/overview", site.name),
            &site.name,
        );
        if site.disabled.unwrap_or(false) {
            lines.push(header(&format!("{title} {}", highlight("Disabled", "gray")), 2));
        } else {
            lines.push(header(&title, 2));
        }
        lines.push(item("URL", site.ssl_url.as_deref().unwrap_or("-")));
        lines.push(item(
            "Netlify domain",
            site.default_domain.as_deref().unwrap_or("-"),
        ));
        lines.push(item("ID", format!("`{}`", site.site_id)));
        lines.push(item("Created", format_date(&site.created_at)));
        if let Some(build) = &site.build_settings {
            if let Some(updated) = &build.updated_at {
                lines.push(item("Updated", format_date(updated)));
            }
            if let Some(repo) = &build.repo_url {
                lines.push(item("Repository", repo));
            }
        }

        if entry.env_vars.is_empty() {
            lines.push(item("Env vars", highlight("none", "grey")));
        } else {
            lines.push(item("Env vars", entry.env_vars.join(", ")));
        }

        if !entry.deploys.is_empty() {
            lines.push("**Production deploys:**".to_string());
            for deploy in &entry.deploys {
                let url = format!(
                    "https://app.netlify.com/sites/{}/deploys/{}",
                    site.name, deploy.id
                );
                lines.push(format!(
                    "  * {} {}",
                    link(&url, &format_date(&deploy.created_at)),
                    deploy_label(deploy)
                ));
            }
        }

        if let Some(cert) = &entry.certificate {
            let date = |value: &Option<String>| {
                value.as_deref().map(format_date).unwrap_or_else(|| "-".to_string())
            };
            lines.push("**TLS Certificate:**".to_string());
            lines.push(format!("  * **Created:** {}", date(&cert.created_at)));
            lines.push(format!("  * **Updated:** {}", date(&cert.updated_at)));
            lines.push(format!("  * **Expires:** {}", date(&cert.expires_at)));
        }

        lines.push(String::new());
    }

    netlify_page(lines)
}

pub fn render_members(team: &str, members: &[Member], inactive_days: u64, today: NaiveDate) -> Page {
    let mut lines = vec![
        info_block("General information"),
        item(
            "Overview",
            link(
                &format!("https://app.netlify.com/teams/{team}/members"),
                "Members",
            ),
        ),
        item("Number of members", members.len()),
        String::new(),
    ];

    let threshold = i64::try_from(inactive_days).unwrap_or(i64::MAX);
    let mut sorted: Vec<&Member> = members.iter().collect();
    sorted.sort_by_key(|member| member.display_name().to_lowercase());

    for member in sorted {
        let mfa = if member.mfa_enabled {
            highlight("2FA", "green")
        } else {
            highlight("No 2FA", "orange")
        };
        let last_active = member.last_activity_date.as_deref().and_then(parse_date);
        let activity = match last_active {
            Some(date) if (today - date).num_days() < threshold => {
                highlight("Active", "green")
            }
            Some(_) => highlight("Inactive", "orange"),
            None => highlight("Unknown", "orange"),
        };

        lines.push(header(
            &format!("{} {mfa} {activity}", member.display_name()),
            3,
        ));
        lines.push(item("Email", &member.email));
        lines.push(item("Pending", if member.pending { "Yes" } else { "No" }));
        lines.push(item(
            "Last active",
            member
                .last_activity_date
                .as_deref()
                .map(format_date)
                .unwrap_or_else(|| "Unknown".to_string()),
        ));
        lines.push(item("Role", &member.role));
        lines.push(item(
            "Site access",
            member.site_access.as_deref().unwrap_or("-"),
        ));
        lines.push(String::new());
    }

    netlify_page(lines)
}
