//! Snyk report to Grafeas note/occurrence conversion.
//!
//! One pass over the report's `vulnerabilities` array produces a
//! [`NoteOccurrencesMap`]: one [`Note`] per CVE and one [`Occurrence`] per
//! affected package entry. Only entries with a non-zero NVD-assigned CVSS v3
//! score are converted; everything else is skipped and recorded in the
//! [`ConversionReport`].

use crate::cpe::make_cpe;
use crate::error::{ConvertError, Result};
use crate::extract;
use crate::models::{
    CvssVersion, Note, NoteOccurrences, NoteOccurrencesMap, Occurrence, PackageIssue, RelatedUrl,
    Severity, Version, VulnerabilityDetail, VulnerabilityNote, VulnerabilityOccurrence,
};
use crate::path;
use crate::report::{CvssDetail, ScanVulnerability};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Prefix applied to every note id produced by this converter.
pub const NOTE_ID_PREFIX: &str = "snyk-";

/// Label of the related URL pointing back at the scanned artifact.
pub const REGISTRY_LABEL: &str = "Registry";

static CVE_REGEX: Lazy<std::result::Result<Regex, regex_lite::Error>> =
    Lazy::new(|| Regex::new(r"(?i)(CVE-\d{4}-\d{4,})"));

/// A parsed scanner report plus the identity of the scanned artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Artifact location without scheme, e.g. `us-docker.pkg.dev/p/r/img@sha256:...`.
    pub uri: String,
    /// Project (namespace) that owns the notes.
    pub project: String,
    pub data: Value,
}

impl Source {
    pub fn new(uri: impl Into<String>, project: impl Into<String>, data: Value) -> Self {
        Self {
            uri: uri.into(),
            project: project.into(),
            data,
        }
    }

    pub fn from_json_str(
        uri: impl Into<String>,
        project: impl Into<String>,
        json: &str,
    ) -> Result<Self> {
        let data = serde_json::from_str(json)
            .map_err(|e| ConvertError::invalid_input(format!("unable to parse report: {e}")))?;
        Ok(Self::new(uri, project, data))
    }

    /// Read and parse a report file.
    pub fn from_path(
        uri: impl Into<String>,
        project: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        debug!("Read {} bytes from {}", json.len(), path.display());
        Self::from_json_str(uri, project, &json)
    }

    /// `projects/{project}/notes/{note_id}`.
    pub fn note_name(&self, note_id: &str) -> String {
        format!("projects/{}/notes/{}", self.project, note_id)
    }

    /// The artifact URI as an occurrence resource URL.
    pub fn resource_uri(&self) -> String {
        format!("https://{}", self.uri)
    }
}

/// Why an entry produced neither a note nor an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `identifiers.CVE` is missing or empty.
    MissingIdentifier,
    /// No `cvssDetails` block assigned by NVD.
    NoNvdScore,
    /// The NVD base score is zero or absent.
    ZeroScore,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentifier => write!(f, "missing CVE identifier"),
            Self::NoNvdScore => write!(f, "no NVD CVSS score"),
            Self::ZeroScore => write!(f, "zero CVSS score"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Position in the report's `vulnerabilities` array.
    pub index: usize,
    pub cve: Option<String>,
    pub reason: SkipReason,
}

/// Counts for one conversion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub total: usize,
    pub converted: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl ConversionReport {
    fn skip(&mut self, index: usize, cve: Option<&str>, reason: SkipReason) {
        self.skipped.push(SkippedEntry {
            index,
            cve: cve.map(str::to_string),
            reason,
        });
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}

/// Canonical note id for a vulnerability identifier.
///
/// CVE identifiers are upper-cased (`cve-2021-1234` and `CVE-2021-1234` share
/// a note); anything else is used as found, trimmed.
pub fn note_id(vulnerability_id: &str) -> String {
    let trimmed = vulnerability_id.trim();
    let canonical = match &*CVE_REGEX {
        Ok(regex) => regex
            .captures(trimmed)
            .map(|caps| caps[1].to_uppercase())
            .unwrap_or_else(|| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    };
    format!("{NOTE_ID_PREFIX}{canonical}")
}

/// Convert a report into notes and occurrences.
pub fn convert(source: &Source) -> Result<NoteOccurrencesMap> {
    convert_with_report(source).map(|(list, _)| list)
}

/// Convert a report and return what was skipped along the way.
#[instrument(skip(source), fields(uri = %source.uri, project = %source.project))]
pub fn convert_with_report(source: &Source) -> Result<(NoteOccurrencesMap, ConversionReport)> {
    if source.data.is_null() {
        return Err(ConvertError::invalid_input("valid source required"));
    }
    if !source.data.is_object() {
        return Err(ConvertError::invalid_input(format!(
            "expected a JSON object, found {}",
            extract::json_type(&source.data)
        )));
    }

    let entries = extract::array_at(&source.data, &path!["vulnerabilities"])?
        .ok_or_else(|| ConvertError::missing_field("vulnerabilities"))?;

    let mut list = NoteOccurrencesMap::new();
    let mut report = ConversionReport {
        total: entries.len(),
        ..ConversionReport::default()
    };

    for (index, raw) in entries.iter().enumerate() {
        let vuln = ScanVulnerability::from_value(index, raw)?;

        let Some(cve) = vuln.primary_cve() else {
            warn!("Skipping vulnerability #{}: no CVE identifier", index);
            report.skip(index, None, SkipReason::MissingIdentifier);
            continue;
        };

        let Some(cvss) = vuln.nvd_cvss() else {
            debug!("Skipping {}: no NVD CVSS details", cve);
            report.skip(index, Some(cve), SkipReason::NoNvdScore);
            continue;
        };

        if cvss.score() == 0.0 {
            debug!("Skipping {}: CVSS score is zero", cve);
            report.skip(index, Some(cve), SkipReason::ZeroScore);
            continue;
        }

        let id = note_id(cve);
        let occurrence = build_occurrence(source, &vuln, cve, &id, cvss);

        list.entry(id.clone())
            .or_insert_with(|| NoteOccurrences {
                note: build_note(source, &vuln, cve, &id, cvss),
                occurrences: Vec::new(),
            })
            .occurrences
            .push(occurrence);
        report.converted += 1;
    }

    info!(
        "Converted {} of {} vulnerabilities into {} notes ({} skipped)",
        report.converted,
        report.total,
        list.len(),
        report.skipped.len()
    );

    Ok((list, report))
}

fn build_note(
    source: &Source,
    vuln: &ScanVulnerability,
    cve: &str,
    note_id: &str,
    cvss: &CvssDetail,
) -> Note {
    Note {
        name: source.note_name(note_id),
        short_description: cve.to_string(),
        long_description: vuln.cvss_narrative.clone().unwrap_or_default(),
        related_url: related_urls(source, vuln),
        vulnerability: VulnerabilityNote {
            cvss_version: CvssVersion::V3,
            cvss_score: cvss.score(),
            cvss_v3: cvss.vector.clone(),
            severity: severity(vuln),
            details: vec![VulnerabilityDetail::not_applicable()],
            source_update_time: cvss.modification_time,
        },
    }
}

fn build_occurrence(
    source: &Source,
    vuln: &ScanVulnerability,
    cve: &str,
    note_id: &str,
    cvss: &CvssDetail,
) -> Occurrence {
    let package = vuln.package_name.clone().unwrap_or_default();
    let cpe = make_cpe(vuln.cpe_name(), vuln.version.as_deref().unwrap_or_default());
    let severity = severity(vuln);

    Occurrence {
        name: String::new(),
        resource_uri: source.resource_uri(),
        note_name: source.note_name(note_id),
        vulnerability: VulnerabilityOccurrence {
            short_description: cve.to_string(),
            long_description: vuln.cvss_narrative.clone().unwrap_or_default(),
            related_urls: related_urls(source, vuln),
            cvss_version: CvssVersion::V3,
            cvss_score: cvss.score(),
            cvssv3: cvss.vector.clone(),
            package_issue: vec![PackageIssue {
                affected_cpe_uri: cpe.clone(),
                affected_package: package.clone(),
                affected_version: Version::normal(vuln.version.clone().unwrap_or_default()),
                fixed_cpe_uri: cpe,
                fixed_package: package,
                fixed_version: Version::maximum(),
            }],
            severity,
            effective_severity: severity,
        },
    }
}

/// The registry link first, then one link per report reference that has a URL.
fn related_urls(source: &Source, vuln: &ScanVulnerability) -> Vec<RelatedUrl> {
    let mut urls = vec![RelatedUrl::new(REGISTRY_LABEL, &source.uri)];
    urls.extend(vuln.references.iter().filter_map(|r| {
        r.url
            .as_ref()
            .map(|url| RelatedUrl::new(r.title.clone().unwrap_or_default(), url))
    }));
    urls
}

fn severity(vuln: &ScanVulnerability) -> Severity {
    vuln.nvd_severity.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvss::{AttackComplexity, AttackVector, Impact, Scope};
    use crate::models::VersionKind;
    use serde_json::json;

    fn entry(cve: &str, package: &str, version: &str, score: f64) -> Value {
        let nvd_url = format!("https://nvd.nist.gov/vuln/detail/{cve}");
        json!({
            "identifiers": { "CVE": [cve] },
            "packageName": package,
            "name": package,
            "version": version,
            "nvdSeverity": "HIGH",
            "CVSSv3": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:H",
            "cvssDetails": [
                {
                    "assigner": "NVD",
                    "cvssV3BaseScore": score,
                    "cvssV3Vector": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:H",
                    "modificationTime": "2021-03-01T00:00:00Z"
                }
            ],
            "references": [
                { "url": nvd_url, "title": "NVD" }
            ]
        })
    }

    fn source(entries: Vec<Value>) -> Source {
        Source::new(
            "registry.example.com/foo",
            "proj1",
            json!({ "vulnerabilities": entries }),
        )
    }

    #[test]
    fn test_single_entry_end_to_end() {
        let src = Source::new(
            "registry.example.com/foo",
            "proj1",
            json!({
                "vulnerabilities": [{
                    "identifiers": { "CVE": ["CVE-2021-1234"] },
                    "packageName": "foo",
                    "version": "1.0.0",
                    "nvdSeverity": "HIGH",
                    "cvssDetails": [{
                        "assigner": "NVD",
                        "cvssV3BaseScore": 7.5,
                        "cvssV3Vector": "AV:N/...",
                        "modificationTime": "2021-03-01T00:00:00Z"
                    }]
                }]
            }),
        );

        let list = convert(&src).unwrap();
        assert_eq!(list.len(), 1);

        let id = note_id("CVE-2021-1234");
        let nocc = &list[&id];
        assert_eq!(nocc.note.vulnerability.cvss_score, 7.5);
        assert_eq!(nocc.note.vulnerability.cvss_version, CvssVersion::V3);
        assert_eq!(nocc.note.vulnerability.severity, Severity::High);
        assert_eq!(nocc.note.short_description, "CVE-2021-1234");
        assert_eq!(nocc.note.name, format!("projects/proj1/notes/{id}"));
        assert_eq!(
            nocc.note.vulnerability.details,
            vec![VulnerabilityDetail::not_applicable()]
        );
        assert!(nocc.note.vulnerability.source_update_time.is_some());

        assert_eq!(nocc.occurrences.len(), 1);
        let occ = &nocc.occurrences[0];
        assert_eq!(occ.resource_uri, "https://registry.example.com/foo");
        assert_eq!(occ.note_name, nocc.note.name);

        let issue = &occ.vulnerability.package_issue[0];
        assert_eq!(issue.affected_package, "foo");
        assert_eq!(issue.affected_version, Version::normal("1.0.0"));
        assert_eq!(issue.affected_cpe_uri, "cpe:2.3:a:foo:foo:1.0.0:*:*:*:*:*:*:*");
        assert_eq!(issue.fixed_package, "foo");
        assert_eq!(issue.fixed_version.kind, VersionKind::Maximum);
        assert_eq!(occ.vulnerability.severity, occ.vulnerability.effective_severity);
    }

    #[test]
    fn test_related_urls_start_with_registry() {
        let list = convert(&source(vec![entry("CVE-2021-1", "foo", "1.0", 5.0)])).unwrap();
        let nocc = &list[&note_id("CVE-2021-1")];

        let urls = &nocc.note.related_url;
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], RelatedUrl::new("Registry", "registry.example.com/foo"));
        assert_eq!(urls[1].label, "NVD");
        assert_eq!(&nocc.occurrences[0].vulnerability.related_urls, urls);
    }

    #[test]
    fn test_references_without_url_are_skipped() {
        let mut e = entry("CVE-2021-1", "foo", "1.0", 5.0);
        e["references"] = json!([
            { "title": "Advisory without link" },
            { "url": null, "title": "Null link" },
            { "url": "https://github.com/foo/foo/pull/12", "title": "Fix PR" }
        ]);
        let list = convert(&source(vec![e])).unwrap();
        let nocc = &list[&note_id("CVE-2021-1")];

        let urls = &nocc.note.related_url;
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].label, "Registry");
        assert_eq!(
            urls[1],
            RelatedUrl::new("Fix PR", "https://github.com/foo/foo/pull/12")
        );
        assert_eq!(nocc.occurrences[0].vulnerability.related_urls.len(), 2);
    }

    #[test]
    fn test_cvss_vector_lands_on_note_and_occurrence() {
        let list = convert(&source(vec![entry("CVE-2021-1", "foo", "1.0", 7.5)])).unwrap();
        let nocc = &list[&note_id("CVE-2021-1")];

        let note_cvss = nocc.note.vulnerability.cvss_v3.as_ref().unwrap();
        assert_eq!(note_cvss.base_score, 7.5);
        assert_eq!(note_cvss.attack_vector, AttackVector::AttackVectorNetwork);
        assert_eq!(note_cvss.attack_complexity, AttackComplexity::AttackComplexityLow);
        assert_eq!(note_cvss.scope, Scope::ScopeUnchanged);
        assert_eq!(note_cvss.confidentiality_impact, Impact::ImpactNone);
        assert_eq!(note_cvss.availability_impact, Impact::ImpactHigh);

        let occ_cvss = nocc.occurrences[0].vulnerability.cvssv3.as_ref().unwrap();
        assert_eq!(occ_cvss, note_cvss);
    }

    #[test]
    fn test_other_assigner_vector_does_not_abort() {
        let mut suse_only = entry("CVE-2021-0001", "foo", "1.0.0", 9.8);
        suse_only["cvssDetails"] = json!([{
            "assigner": "SUSE",
            "cvssV3BaseScore": 9.3,
            "cvssV3Vector": "CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N"
        }]);

        let (list, report) = convert_with_report(&source(vec![
            suse_only,
            entry("CVE-2021-0002", "bar", "2.0.0", 7.5),
        ]))
        .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[&note_id("CVE-2021-0002")].note.vulnerability.cvss_score, 7.5);
        assert_eq!(report.skipped_for(SkipReason::NoNvdScore), 1);
    }

    #[test]
    fn test_non_finite_score_aborts_conversion() {
        let mut nan = entry("CVE-2021-0001", "foo", "1.0.0", 5.0);
        nan["cvssDetails"][0]["cvssV3BaseScore"] = json!("NaN");
        let err = convert(&source(vec![nan])).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::TypeMismatch { ref path, .. }
                if path == "vulnerabilities.0.cvssDetails.0.cvssV3BaseScore"
        ));
    }

    #[test]
    fn test_dedup_by_cve_keeps_source_order() {
        let list = convert(&source(vec![
            entry("CVE-2020-8203", "lodash", "4.17.15", 7.4),
            entry("CVE-2021-0001", "other", "1.0.0", 5.0),
            entry("CVE-2020-8203", "lodash", "4.17.11", 7.4),
        ]))
        .unwrap();

        assert_eq!(list.len(), 2);
        let lodash = &list[&note_id("CVE-2020-8203")];
        assert_eq!(lodash.occurrences.len(), 2);
        let versions: Vec<_> = lodash
            .occurrences
            .iter()
            .map(|o| o.vulnerability.package_issue[0].affected_version.name.as_str())
            .collect();
        assert_eq!(versions, vec!["4.17.15", "4.17.11"]);
    }

    #[test]
    fn test_zero_score_and_missing_nvd_are_dropped() {
        let mut no_nvd = entry("CVE-2021-0002", "bar", "2.0.0", 9.0);
        no_nvd["cvssDetails"][0]["assigner"] = json!("SUSE");
        let mut no_score = entry("CVE-2021-0003", "baz", "3.0.0", 1.0);
        no_score["cvssDetails"][0]
            .as_object_mut()
            .unwrap()
            .remove("cvssV3BaseScore");

        let (list, report) = convert_with_report(&source(vec![
            entry("CVE-2021-0001", "foo", "1.0.0", 0.0),
            no_nvd,
            no_score,
            entry("CVE-2021-0004", "qux", "4.0.0", 6.1),
        ]))
        .unwrap();

        assert_eq!(list.len(), 1);
        assert!(list.contains_key(&note_id("CVE-2021-0004")));
        assert_eq!(report.total, 4);
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped_for(SkipReason::ZeroScore), 2);
        assert_eq!(report.skipped_for(SkipReason::NoNvdScore), 1);
        assert_eq!(report.skipped[1].cve.as_deref(), Some("CVE-2021-0002"));
    }

    #[test]
    fn test_missing_identifier_is_skipped() {
        let mut no_ids = entry("CVE-2021-0001", "foo", "1.0.0", 5.0);
        no_ids["identifiers"]["CVE"] = json!([]);

        let (list, report) = convert_with_report(&source(vec![
            no_ids,
            entry("CVE-2021-0002", "bar", "1.0.0", 5.0),
        ]))
        .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(
            report.skipped,
            vec![SkippedEntry {
                index: 0,
                cve: None,
                reason: SkipReason::MissingIdentifier,
            }]
        );
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let src = source(vec![
            entry("CVE-2021-0001", "foo", "1.0.0", 5.0),
            entry("CVE-2021-0001", "foo", "1.0.1", 5.0),
        ]);
        assert_eq!(convert(&src).unwrap(), convert(&src).unwrap());
    }

    #[test]
    fn test_missing_vulnerabilities_is_invalid_input() {
        let src = Source::new("registry.example.com/foo", "proj1", json!({ "ok": true }));
        let err = convert(&src).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(matches!(err, ConvertError::MissingField(ref f) if f == "vulnerabilities"));
    }

    #[test]
    fn test_null_and_non_object_sources_are_invalid_input() {
        let src = Source::new("r", "p", Value::Null);
        assert!(matches!(convert(&src), Err(ConvertError::InvalidInput(_))));

        let src = Source::new("r", "p", json!([1, 2, 3]));
        assert!(matches!(convert(&src), Err(ConvertError::InvalidInput(_))));
    }

    #[test]
    fn test_non_array_vulnerabilities_is_type_mismatch() {
        let src = Source::new("r", "p", json!({ "vulnerabilities": "none" }));
        assert!(matches!(
            convert(&src),
            Err(ConvertError::TypeMismatch { ref path, .. }) if path == "vulnerabilities"
        ));
    }

    #[test]
    fn test_bad_score_type_aborts_conversion() {
        let mut bad = entry("CVE-2021-0001", "foo", "1.0.0", 5.0);
        bad["cvssDetails"][0]["cvssV3BaseScore"] = json!({ "value": 5.0 });
        assert!(matches!(
            convert(&source(vec![bad])),
            Err(ConvertError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_note_id_canonicalizes_cve() {
        assert_eq!(note_id("CVE-2021-1234"), "snyk-CVE-2021-1234");
        assert_eq!(note_id(" cve-2021-1234 "), "snyk-CVE-2021-1234");
        assert_eq!(note_id("SNYK-JS-LODASH-567746"), "snyk-SNYK-JS-LODASH-567746");
    }

    #[test]
    fn test_source_from_json_str() {
        let src = Source::from_json_str("r", "p", r#"{"vulnerabilities": []}"#).unwrap();
        assert!(convert(&src).unwrap().is_empty());

        let err = Source::from_json_str("r", "p", "{not json").unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_source_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.json");
        let body = json!({ "vulnerabilities": [entry("CVE-2021-0001", "foo", "1.0.0", 5.0)] });
        std::fs::write(&file, body.to_string()).unwrap();

        let src = Source::from_path("registry.example.com/foo", "proj1", &file).unwrap();
        assert_eq!(convert(&src).unwrap().len(), 1);

        let missing = Source::from_path("r", "p", dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, ConvertError::Io(_)));
    }
}
