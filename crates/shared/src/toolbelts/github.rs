use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::register_toolbelt;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const MAX_LISTED: usize = 5;

pub struct GitHub {
    client: reqwest::Client,
    api_base: String,
}

impl GitHub {
    pub fn new(api_base: impl Into<String>, token: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        let mut auth = HeaderValue::from_str(&format!("token {}", token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent("errand/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

register_toolbelt! {
    GitHub {
        name: "GitHub",
        description: "Search repositories and read or create issues through the GitHub REST API",
        tools: {
            "search_repositories" => search_repositories {
                description: "Search GitHub repositories by keyword or phrase, e.g. 'LLM agents'. Returns up to five repositories with their URLs.",
                params: ["query": "string" => "Search keywords"]
            },
            "get_repo_details" => get_repo_details {
                description: "Get description, stars, forks and language of a repository. repo_name MUST be in 'owner/repo' format, e.g. 'microsoft/vscode'.",
                params: ["repo_name": "string" => "Repository in 'owner/repo' format"]
            },
            "create_issue" => create_issue {
                description: "Create an issue in a repository. repo_name MUST be in 'owner/repo' format.",
                params: [
                    "repo_name": "string" => "Repository in 'owner/repo' format",
                    "title": "string" => "Issue title"
                ],
                optional: ["body": "string" => "Issue body"]
            },
            "list_issues" => list_issues {
                description: "List up to five open issues of a repository. repo_name MUST be in 'owner/repo' format.",
                params: ["repo_name": "string" => "Repository in 'owner/repo' format"]
            },
        }
    }
}

impl GitHub {
    async fn search_repositories(&self, args: &Value) -> Result<String> {
        let query = args["query"].as_str().unwrap_or("").trim();
        if query.is_empty() {
            return Ok("Error: query cannot be empty".to_string());
        }

        let response = self
            .client
            .get(format!("{}/search/repositories", self.api_base))
            .query(&[("q", query)])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or_default();
        if !status.is_success() {
            return Ok(api_error("searching repositories", status, &body));
        }

        Ok(format_search(query, &body))
    }

    async fn get_repo_details(&self, args: &Value) -> Result<String> {
        let repo_name = args["repo_name"].as_str().unwrap_or("").trim();
        if let Err(message) = check_repo_name(repo_name) {
            return Ok(message);
        }

        let response = self
            .client
            .get(format!("{}/repos/{}", self.api_base, repo_name))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or_default();
        match status {
            s if s.is_success() => Ok(format_repo(&body)),
            StatusCode::NOT_FOUND => Ok(not_found(repo_name)),
            s => Ok(api_error(&format!("fetching details for {}", repo_name), s, &body)),
        }
    }

    async fn create_issue(&self, args: &Value) -> Result<String> {
        let request = match IssueRequest::from_args(args) {
            Ok(request) => request,
            Err(message) => return Ok(message),
        };
        if let Err(message) = check_repo_name(&request.repo_name) {
            return Ok(message);
        }

        let response = self
            .client
            .post(format!("{}/repos/{}/issues", self.api_base, request.repo_name))
            .json(&json!({ "title": request.title, "body": request.body }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or_default();
        if status == StatusCode::CREATED {
            let url = body["html_url"].as_str().unwrap_or("");
            tracing::info!(repo = %request.repo_name, url, "created issue");
            return Ok(format!("Issue created: {}", url));
        }

        Ok(api_error(
            &format!("creating issue in {}", request.repo_name),
            status,
            &body,
        ))
    }

    async fn list_issues(&self, args: &Value) -> Result<String> {
        let repo_name = args["repo_name"].as_str().unwrap_or("").trim();
        if let Err(message) = check_repo_name(repo_name) {
            return Ok(message);
        }

        let response = self
            .client
            .get(format!("{}/repos/{}/issues", self.api_base, repo_name))
            .query(&[("state", "open")])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or_default();
        match status {
            s if s.is_success() => Ok(format_issues(repo_name, &body)),
            StatusCode::NOT_FOUND => Ok(not_found(repo_name)),
            s => Ok(api_error(&format!("listing issues for {}", repo_name), s, &body)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueRequest {
    pub repo_name: String,
    pub title: String,
    pub body: String,
}

impl IssueRequest {
    /// Accepts structured arguments, or the whole request as a JSON string
    /// under `input` (the form single-input agents produce).
    pub fn from_args(args: &Value) -> std::result::Result<Self, String> {
        let parsed;
        let args = match args.get("input").and_then(Value::as_str) {
            Some(raw) => {
                parsed = serde_json::from_str::<Value>(raw).map_err(|_| {
                    "Error: Input should be JSON format like {\"repo_name\": \"owner/repo\", \"title\": \"Issue title\", \"body\": \"Issue body\"}".to_string()
                })?;
                &parsed
            }
            None => args,
        };

        let field = |name: &str| args[name].as_str().unwrap_or("").trim().to_string();
        let (repo_name, title) = (field("repo_name"), field("title"));
        if repo_name.is_empty() {
            return Err("Error: repo_name cannot be empty".to_string());
        }
        if title.is_empty() {
            return Err("Error: title cannot be empty".to_string());
        }

        Ok(Self {
            repo_name,
            title,
            body: args["body"].as_str().unwrap_or("").to_string(),
        })
    }
}

/// `owner/repo` with both halves present.
pub fn check_repo_name(repo_name: &str) -> std::result::Result<(), String> {
    let valid = match repo_name.split_once('/') {
        Some((owner, repo)) => !owner.is_empty() && !repo.is_empty() && !repo.contains('/'),
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(format!(
            "Error: '{}' is not a repository name. Please use the 'owner/repo_name' format.",
            repo_name
        ))
    }
}

fn not_found(repo_name: &str) -> String {
    format!(
        "Error: Repository '{}' not found. Please ensure the format is 'owner/repo_name'.",
        repo_name
    )
}

fn api_error(action: &str, status: StatusCode, body: &Value) -> String {
    let message = body["message"].as_str().unwrap_or("no message");
    format!("Error {}: {} {}", action, status, message)
}

pub fn format_search(query: &str, body: &Value) -> String {
    let repos = body["items"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if repos.is_empty() {
        return format!("No repositories found for query: {}", query);
    }

    repos
        .iter()
        .take(MAX_LISTED)
        .map(|repo| {
            format!(
                "Repo: {}, URL: {}",
                repo["full_name"].as_str().unwrap_or(""),
                repo["html_url"].as_str().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_repo(repo: &Value) -> String {
    let text = |key: &str| repo[key].as_str().unwrap_or("None").to_string();
    let count = |key: &str| repo[key].as_u64().unwrap_or(0);

    format!(
        "Repo: {}\nDescription: {}\nStars: {}\nForks: {}\nLanguage: {}\nURL: {}",
        text("full_name"),
        text("description"),
        count("stargazers_count"),
        count("forks_count"),
        text("language"),
        text("html_url")
    )
}

/// The issues endpoint also returns pull requests; those are skipped.
pub fn format_issues(repo_name: &str, body: &Value) -> String {
    let issues: Vec<String> = body
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter(|issue| issue.get("pull_request").is_none())
        .take(MAX_LISTED)
        .map(|issue| {
            format!(
                "#{}: {} - {}",
                issue["number"].as_u64().unwrap_or(0),
                issue["title"].as_str().unwrap_or(""),
                issue["html_url"].as_str().unwrap_or("")
            )
        })
        .collect();

    if issues.is_empty() {
        format!("No open issues found in {}", repo_name)
    } else {
        issues.join("\n")
    }
}
