//! Vendor-neutral vulnerability metadata models.
//!
//! These follow the Grafeas v1 resource shapes so a converted collection can be
//! posted to a container-analysis API without further mapping. A [`Note`]
//! describes a vulnerability once; an [`Occurrence`] records one finding of it
//! in a scanned artifact.

use crate::cvss::CvssV3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Converted output keyed by note id.
pub type NoteOccurrencesMap = HashMap<String, NoteOccurrences>;

/// A note and every occurrence of it found during one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteOccurrences {
    pub note: Note,
    /// In source iteration order.
    pub occurrences: Vec<Occurrence>,
}

/// A de-duplicated vulnerability definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Full resource name, `projects/{project}/notes/{note_id}`.
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    #[serde(default)]
    pub related_url: Vec<RelatedUrl>,
    pub vulnerability: VulnerabilityNote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityNote {
    pub cvss_version: CvssVersion,
    pub cvss_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_v3: Option<CvssV3>,
    pub severity: Severity,
    /// Placeholder details; a note never sees the full package list.
    #[serde(default)]
    pub details: Vec<VulnerabilityDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityDetail {
    pub affected_cpe_uri: String,
    pub affected_package: String,
}

impl VulnerabilityDetail {
    /// The "not applicable" detail attached to every converted note.
    pub fn not_applicable() -> Self {
        Self {
            affected_cpe_uri: "N/A".to_string(),
            affected_package: "N/A".to_string(),
        }
    }
}

/// One finding of a note's vulnerability in a scanned artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// Server-assigned resource name. Empty until the occurrence is created.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub resource_uri: String,
    pub note_name: String,
    pub vulnerability: VulnerabilityOccurrence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityOccurrence {
    pub short_description: String,
    pub long_description: String,
    #[serde(default)]
    pub related_urls: Vec<RelatedUrl>,
    pub cvss_version: CvssVersion,
    pub cvss_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvssv3: Option<CvssV3>,
    #[serde(default)]
    pub package_issue: Vec<PackageIssue>,
    pub severity: Severity,
    /// Mirrors `severity` until a source distinguishes the two.
    pub effective_severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageIssue {
    pub affected_cpe_uri: String,
    pub affected_package: String,
    pub affected_version: Version,
    pub fixed_cpe_uri: String,
    pub fixed_package: String,
    pub fixed_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedUrl {
    pub url: String,
    pub label: String,
}

impl RelatedUrl {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub kind: VersionKind,
}

impl Version {
    /// A concrete version.
    pub fn normal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VersionKind::Normal,
        }
    }

    /// Sentinel meaning "no upper bound / unknown fix".
    pub fn maximum() -> Self {
        Self {
            name: String::new(),
            kind: VersionKind::Maximum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionKind {
    #[serde(rename = "VERSION_KIND_UNSPECIFIED")]
    Unspecified,
    Normal,
    Minimum,
    Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvssVersion {
    #[serde(rename = "CVSS_VERSION_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "CVSS_VERSION_2")]
    V2,
    #[serde(rename = "CVSS_VERSION_3")]
    V3,
}

/// Grafeas severity levels.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    #[serde(rename = "SEVERITY_UNSPECIFIED")]
    Unspecified,
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a scanner severity label. Unknown labels are unspecified.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" => Self::Low,
            "minimal" | "none" | "info" | "informational" => Self::Minimal,
            _ => Self::Unspecified,
        }
    }
}
