//! Best-effort CPE 2.3 synthesis.
//!
//! Snyk's open-source scanner does not report CPEs, so one is approximated
//! from the package name and version:
//!
//! ```text
//! cpe:2.3:a:<vendor>:<product>:<version>:<update>:<edition>:<language>:<sw_edition>:<target_sw>:<target_hw>:<other>
//! ```
//!
//! Vendor and product are both the package name and everything after the
//! version is a wildcard. There is no vendor/product disambiguation, escaping
//! or dictionary validation, so the result is a label, not something to match
//! against the NVD CPE dictionary.

/// Build `cpe:2.3:a:{name}:{name}:{version}:*:*:*:*:*:*:*`.
pub fn make_cpe(name: &str, version: &str) -> String {
    format!("cpe:2.3:a:{name}:{name}:{version}:*:*:*:*:*:*:*")
}
