//! Convert vulnerability-scanner reports into Grafeas notes and occurrences.
//!
//! ```
//! use artifact_notes::{Source, convert, convert::note_id};
//! use serde_json::json;
//!
//! let source = Source::new(
//!     "registry.example.com/foo",
//!     "proj1",
//!     json!({
//!         "vulnerabilities": [{
//!             "identifiers": { "CVE": ["CVE-2021-1234"] },
//!             "packageName": "foo",
//!             "version": "1.0.0",
//!             "nvdSeverity": "HIGH",
//!             "cvssDetails": [{ "assigner": "NVD", "cvssV3BaseScore": 7.5 }]
//!         }]
//!     }),
//! );
//!
//! let list = convert(&source).unwrap();
//! let nocc = &list[&note_id("CVE-2021-1234")];
//! assert_eq!(nocc.note.vulnerability.cvss_score, 7.5);
//! assert_eq!(nocc.occurrences[0].resource_uri, "https://registry.example.com/foo");
//! ```

pub mod config;
pub mod convert;
pub mod cpe;
pub mod cvss;
pub mod error;
pub mod extract;
pub mod logging;
pub mod manager;
pub mod models;
pub mod report;
pub mod store;

pub use config::Config;
pub use convert::{ConversionReport, Source, convert, convert_with_report};
pub use error::{ConvertError, Result};
pub use manager::ArtifactAnalysis;
pub use models::{Note, NoteOccurrences, NoteOccurrencesMap, Occurrence};
