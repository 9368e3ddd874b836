//! Remote metadata storage for notes and occurrences.
//!
//! [`MetadataStore`] is the seam between conversion and the network;
//! [`GrafeasClient`] implements it against the container-analysis v1 REST API.

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::models::{Note, Occurrence};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create `projects/{project}/notes/{note_id}`. An existing note is not an error.
    async fn create_note(&self, project: &str, note_id: &str, note: &Note) -> Result<()>;

    /// Create an occurrence and return its server-assigned name.
    async fn create_occurrence(&self, project: &str, occurrence: &Occurrence) -> Result<String>;

    /// One page of occurrences matching `filter`.
    async fn list_occurrences(
        &self,
        project: &str,
        filter: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<OccurrencePage>;

    async fn delete_note(&self, name: &str) -> Result<()>;

    async fn delete_occurrence(&self, name: &str) -> Result<()>;
}

/// Minimal view of a listed occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceRef {
    pub name: String,
    #[serde(default)]
    pub resource_uri: String,
    #[serde(default)]
    pub note_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrencePage {
    #[serde(default)]
    pub occurrences: Vec<OccurrenceRef>,
    /// Empty or absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl OccurrencePage {
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Deserialize)]
struct Created {
    #[serde(default)]
    name: String,
}

pub struct GrafeasClient {
    client: ClientWithMiddleware,
    api_url: String,
    access_token: Option<String>,
}

impl GrafeasClient {
    pub fn new(api_url: impl Into<String>, access_token: Option<String>) -> Result<Self> {
        let raw_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        // 3 retries with exponential backoff on transient failures
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(raw_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_url.clone(), config.access_token.clone())
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.api_url, resource)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Turn a non-success response into [`ConvertError::Api`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ConvertError::api(
            status.as_u16(),
            body.chars().take(200).collect::<String>(),
        ))
    }
}

#[async_trait]
impl MetadataStore for GrafeasClient {
    #[instrument(skip(self, note))]
    async fn create_note(&self, project: &str, note_id: &str, note: &Note) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("projects/{}/notes", project)))
            .query(&[("noteId", note_id)])
            .json(note);
        let response = self.authorize(request).send().await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Note {} already exists", note_id);
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, occurrence), fields(note = %occurrence.note_name))]
    async fn create_occurrence(&self, project: &str, occurrence: &Occurrence) -> Result<String> {
        let request = self
            .client
            .post(self.url(&format!("projects/{}/occurrences", project)))
            .json(occurrence);
        let response = Self::check(self.authorize(request).send().await?).await?;
        let created: Created = response.json().await?;
        Ok(created.name)
    }

    #[instrument(skip(self))]
    async fn list_occurrences(
        &self,
        project: &str,
        filter: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<OccurrencePage> {
        let page_size = page_size.to_string();
        let mut params = vec![("filter", filter), ("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let request = self
            .client
            .get(self.url(&format!("projects/{}/occurrences", project)))
            .query(&params);
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    async fn delete_note(&self, name: &str) -> Result<()> {
        let request = self.client.delete(self.url(name));
        Self::check(self.authorize(request).send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_occurrence(&self, name: &str) -> Result<()> {
        let request = self.client.delete(self.url(name));
        Self::check(self.authorize(request).send().await?).await?;
        Ok(())
    }
}
