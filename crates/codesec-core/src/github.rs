//! GitHub REST API client and run context.
//!
//! Covers the two surfaces the action touches: issue comments on the
//! current pull request (the singleton findings comment) and pull requests
//! (auto-fix branches). The findings comment is identified by a hidden
//! HTML marker so repeated runs update or remove it instead of stacking
//! duplicates.

use crate::error::{CodesecError, Result};
use crate::workflow;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hidden marker appended to the findings comment body.
pub const COMMENT_MARKER: &str = "<!-- codesec-pr-comment -->";

/// Everything about the current run derived from the runner environment.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub server_url: String,
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub sha: String,
    /// Set only when the workflow was triggered by a pull request.
    pub pr_number: Option<u64>,
    /// Head ref of the PR, when in a PR context.
    pub head_ref: Option<String>,
    /// Short ref name of the triggering push.
    pub ref_name: Option<String>,
}

impl RepoContext {
    /// Build the context from the runner's environment.
    pub fn from_env() -> Result<Self> {
        let slug = workflow::required_env("GITHUB_REPOSITORY")?;
        let (owner, repo) = split_repository(&slug)?;
        let pr_number = workflow::optional_env("GITHUB_EVENT_PATH")
            .and_then(|p| pr_number_from_event(Path::new(&p)));
        Ok(Self {
            server_url: workflow::optional_env("GITHUB_SERVER_URL")
                .unwrap_or_else(|| "https://github.com".to_string()),
            api_url: workflow::optional_env("GITHUB_API_URL")
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            owner,
            repo,
            sha: workflow::optional_env("GITHUB_SHA").unwrap_or_default(),
            pr_number,
            head_ref: workflow::optional_env("GITHUB_HEAD_REF"),
            ref_name: workflow::optional_env("GITHUB_REF_NAME"),
        })
    }

    /// The branch the run is analyzing: PR head ref, or the pushed ref.
    pub fn current_branch(&self) -> Result<String> {
        if let Some(head) = &self.head_ref {
            return Ok(head.clone());
        }
        self.ref_name
            .clone()
            .ok_or_else(|| CodesecError::MissingInput("GITHUB_REF_NAME".to_string()))
    }

    /// Templated source link handed to the compare sub-mode.
    pub fn link_template(&self) -> String {
        format!(
            "{}/{}/{}/blob/{}/$FILENAME#L$LINENUMBER",
            self.server_url, self.owner, self.repo, self.sha
        )
    }

    /// Clickable link to a file range at the current commit.
    pub fn blob_url(&self, file: &str, start_line: u64, end_line: Option<u64>) -> String {
        let anchor = match end_line {
            Some(end) => format!("#L{}-L{}", start_line, end),
            None => format!("#L{}", start_line),
        };
        format!(
            "{}/{}/{}/blob/{}/{}{}",
            self.server_url, self.owner, self.repo, self.sha, file, anchor
        )
    }
}

/// Split an `owner/name` repository slug.
fn split_repository(slug: &str) -> Result<(String, String)> {
    match slug.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(CodesecError::MissingInput(format!(
            "GITHUB_REPOSITORY (malformed slug `{}`)",
            slug
        ))),
    }
}

/// Pull-request number from the webhook event payload, if any.
fn pr_number_from_event(event_path: &Path) -> Option<u64> {
    let raw = std::fs::read_to_string(event_path).ok()?;
    let event: serde_json::Value = serde_json::from_str(&raw).ok()?;
    event["pull_request"]["number"].as_u64()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub body: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: PullRequestRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

/// Append the hidden marker that identifies the findings comment.
fn mark_body(body: &str) -> String {
    format!("{}\n\n{}", body, COMMENT_MARKER)
}

/// Pick this action's findings comment out of a PR's comment list.
///
/// The marker decides update-vs-create and what resolve deletes; at most
/// one comment can match because every comment this action writes carries
/// the marker and is found here on the next run instead of being recreated.
fn select_marker_comment(comments: Vec<IssueComment>) -> Option<IssueComment> {
    comments.into_iter().find(|c| {
        c.body
            .as_deref()
            .map(|b| b.contains(COMMENT_MARKER))
            .unwrap_or(false)
    })
}

/// Thin client over the GitHub REST API.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
}

impl GitHubClient {
    pub fn new(token: &str, api_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("codesec-action/0.3.0"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| CodesecError::Api("token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CodesecError::Api(format!("{}: {}", status, body)))
    }

    /// List the comments on a PR (issue) and return the marker comment.
    pub async fn find_marker_comment(
        &self,
        ctx: &RepoContext,
        pr_number: u64,
    ) -> Result<Option<IssueComment>> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, ctx.owner, ctx.repo, pr_number
        );
        let response = self
            .client
            .get(&url)
            .query(&[("per_page", "100")])
            .send()
            .await?;
        let comments: Vec<IssueComment> = Self::check(response).await?.json().await?;
        Ok(select_marker_comment(comments))
    }

    /// Post or refresh the findings comment on the current PR.
    ///
    /// Returns the comment URL, or `None` when the run is not in a PR
    /// context. Idempotent: an existing marker comment is updated in place.
    pub async fn post_comment_if_in_pr(
        &self,
        ctx: &RepoContext,
        body: &str,
    ) -> Result<Option<String>> {
        let Some(pr_number) = ctx.pr_number else {
            workflow::info("Not in a pull request context, skipping comment");
            return Ok(None);
        };
        let marked_body = mark_body(body);

        if let Some(existing) = self.find_marker_comment(ctx, pr_number).await? {
            let url = format!(
                "{}/repos/{}/{}/issues/comments/{}",
                self.api_url, ctx.owner, ctx.repo, existing.id
            );
            let response = self
                .client
                .patch(&url)
                .json(&serde_json::json!({ "body": marked_body }))
                .send()
                .await?;
            let updated: IssueComment = Self::check(response).await?.json().await?;
            return Ok(Some(updated.html_url));
        }

        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, ctx.owner, ctx.repo, pr_number
        );
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "body": marked_body }))
            .send()
            .await?;
        let created: IssueComment = Self::check(response).await?.json().await?;
        Ok(Some(created.html_url))
    }

    /// Remove a previously posted findings comment, no-op when absent.
    pub async fn resolve_existing_comment_if_found(&self, ctx: &RepoContext) -> Result<()> {
        let Some(pr_number) = ctx.pr_number else {
            return Ok(());
        };
        let Some(existing) = self.find_marker_comment(ctx, pr_number).await? else {
            return Ok(());
        };
        let url = format!(
            "{}/repos/{}/{}/issues/comments/{}",
            self.api_url, ctx.owner, ctx.repo, existing.id
        );
        let response = self.client.delete(&url).send().await?;
        Self::check(response).await?;
        workflow::info("Resolved stale findings comment");
        Ok(())
    }

    /// Open PRs whose head is the given branch.
    pub async fn open_prs_for_branch(
        &self,
        ctx: &RepoContext,
        branch: &str,
    ) -> Result<Vec<PullRequest>> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, ctx.owner, ctx.repo);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("state", "open"),
                ("head", &format!("{}:{}", ctx.owner, branch)),
                ("per_page", "100"),
            ])
            .send()
            .await?;
        let prs: Vec<PullRequest> = Self::check(response).await?.json().await?;
        Ok(prs)
    }

    /// Open a pull request from `head` into `base`.
    pub async fn create_pr(
        &self,
        ctx: &RepoContext,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, ctx.owner, ctx.repo);
        let response = self
            .client
            .post(&url)
            .json(&CreatePullRequest { title, body, head, base })
            .send()
            .await?;
        let pr: PullRequest = Self::check(response).await?.json().await?;
        Ok(pr)
    }

    /// Refresh the title of an existing pull request.
    pub async fn update_pr_title(
        &self,
        ctx: &RepoContext,
        pr_number: u64,
        title: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_url, ctx.owner, ctx.repo, pr_number
        );
        let response = self
            .client
            .patch(&url)
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
