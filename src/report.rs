//! Typed view of a Snyk `test --json` vulnerability entry.
//!
//! Each raw entry is decoded once through [`crate::extract`] into a
//! [`ScanVulnerability`], so the conversion code works with `Option` fields
//! instead of repeated existence checks on the JSON tree.

use crate::cvss::CvssV3;
use crate::error::{ConvertError, Result};
use crate::extract;
use crate::models::Severity;
use crate::path;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Assigner whose CVSS block is authoritative for conversion.
pub const NVD_ASSIGNER: &str = "NVD";

/// One element of the report's `vulnerabilities` array.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanVulnerability {
    /// `identifiers.CVE`, in report order.
    pub cve_ids: Vec<String>,
    /// `packageName`, e.g. `lodash` or `org.apache.logging.log4j:log4j-core`.
    pub package_name: Option<String>,
    /// `name`, the dependency name as resolved by the scanner.
    pub name: Option<String>,
    pub version: Option<String>,
    pub nvd_severity: Option<Severity>,
    /// `CVSSv3` narrative.
    pub cvss_narrative: Option<String>,
    /// The NVD-assigned `cvssDetails` block. Blocks from other assigners are
    /// never decoded.
    pub nvd_cvss: Option<CvssDetail>,
    pub references: Vec<ReferenceLink>,
}

/// One `cvssDetails` block.
#[derive(Debug, Clone, PartialEq)]
pub struct CvssDetail {
    pub assigner: Option<String>,
    pub base_score: Option<f32>,
    /// Parsed `cvssV3Vector`, carrying `base_score` (or 0 when absent).
    pub vector: Option<CvssV3>,
    pub modification_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLink {
    pub url: Option<String>,
    pub title: Option<String>,
}

impl ScanVulnerability {
    /// Decode a raw entry. Absent fields become `None`/empty; present fields of
    /// the wrong type fail with a type mismatch naming `vulnerabilities.{index}...`.
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let prefix = format!("vulnerabilities.{index}");
        let scoped = |err: ConvertError| scope_error(&prefix, err);

        let cve_ids = match extract::array_at(value, &path!["identifiers", "CVE"]).map_err(scoped)? {
            Some(ids) => ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    extract::to_string(id).ok_or_else(|| {
                        scoped(ConvertError::type_mismatch(
                            format!("identifiers.CVE.{i}"),
                            "string",
                            extract::json_type(id),
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        // When a report lists several NVD blocks, the last wins.
        let nvd_cvss = extract::array_at(value, &path!["cvssDetails"])
            .map_err(scoped)?
            .unwrap_or_default()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, detail)| CvssDetail::assigner_of(detail) == Some(NVD_ASSIGNER))
            .map(|(i, detail)| {
                CvssDetail::from_value(detail)
                    .map_err(|e| scope_error(&format!("{prefix}.cvssDetails.{i}"), e))
            })
            .transpose()?;

        let references = extract::array_at(value, &path!["references"])
            .map_err(scoped)?
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, reference)| {
                ReferenceLink::from_value(reference)
                    .map_err(|e| scope_error(&format!("{prefix}.references.{i}"), e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cve_ids,
            package_name: extract::string_at(value, &path!["packageName"]).map_err(scoped)?,
            name: extract::string_at(value, &path!["name"]).map_err(scoped)?,
            version: extract::string_at(value, &path!["version"]).map_err(scoped)?,
            nvd_severity: extract::severity_at(value, &path!["nvdSeverity"]).map_err(scoped)?,
            cvss_narrative: extract::string_at(value, &path!["CVSSv3"]).map_err(scoped)?,
            nvd_cvss,
            references,
        })
    }

    /// First CVE identifier, if the entry has any.
    pub fn primary_cve(&self) -> Option<&str> {
        self.cve_ids
            .first()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
    }

    pub fn nvd_cvss(&self) -> Option<&CvssDetail> {
        self.nvd_cvss.as_ref()
    }

    /// Package name used for CPE synthesis: `name`, else `packageName`.
    pub fn cpe_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.package_name.as_deref())
            .unwrap_or_default()
    }
}

impl CvssDetail {
    /// `assigner` of a raw block; a missing or non-string value matches nothing.
    fn assigner_of(value: &Value) -> Option<&str> {
        extract::lookup(value, &path!["assigner"]).and_then(Value::as_str)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let base_score = extract::f32_at(value, &path!["cvssV3BaseScore"])?;
        let vector = extract::lookup(value, &path!["cvssV3Vector"])
            .map(|raw| {
                extract::to_cvss_v3(base_score.unwrap_or_default(), raw, &path!["cvssV3Vector"])
            })
            .transpose()?;

        Ok(Self {
            assigner: extract::string_at(value, &path!["assigner"])?,
            base_score,
            vector,
            modification_time: extract::timestamp_at(value, &path!["modificationTime"])?,
        })
    }

    /// Base score, absent counting as zero.
    pub fn score(&self) -> f32 {
        self.base_score.unwrap_or_default()
    }
}

impl ReferenceLink {
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            url: extract::string_at(value, &path!["url"])?,
            title: extract::string_at(value, &path!["title"])?,
        })
    }
}

/// Prefix the path of a type mismatch with the entry's location in the report.
fn scope_error(prefix: &str, err: ConvertError) -> ConvertError {
    match err {
        ConvertError::TypeMismatch {
            path,
            expected,
            found,
        } => ConvertError::TypeMismatch {
            path: format!("{prefix}.{path}"),
            expected,
            found,
        },
        ConvertError::MissingField(path) => ConvertError::MissingField(format!("{prefix}.{path}")),
        other => other,
    }
}
