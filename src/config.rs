use crate::error::{ConvertError, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

/// Public container-analysis endpoint.
pub const DEFAULT_API_URL: &str = "https://containeranalysis.googleapis.com";

/// Page size used when listing occurrences for cleanup.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project: String,
    pub api_url: String,
    pub access_token: Option<String>,
    pub page_size: u32,
    pub log_to_file: bool,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let project = env::var("ARTIFACT_NOTES__PROJECT")
            .map_err(|_| ConvertError::config("ARTIFACT_NOTES__PROJECT must be set"))?;

        let api_url =
            env::var("ARTIFACT_NOTES__API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let access_token = env::var("ARTIFACT_NOTES__ACCESS_TOKEN").ok();

        let page_size = match env::var("ARTIFACT_NOTES__PAGE_SIZE") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConvertError::config(format!("ARTIFACT_NOTES__PAGE_SIZE is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        let log_to_file = env::var("ARTIFACT_NOTES__LOG_TO_FILE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let log_dir = env::var("ARTIFACT_NOTES__LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        Ok(Self {
            project,
            api_url,
            access_token,
            page_size,
            log_to_file,
            log_dir,
        })
    }

    /// Configuration for a project with every other value defaulted.
    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            log_to_file: false,
            log_dir: "logs".to_string(),
        }
    }
}
