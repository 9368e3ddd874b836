//! Convert a Snyk report and optionally publish or purge it.
//!
//! Run with:
//! ```bash
//! ARTIFACT_NOTES__PROJECT=my-project \
//! ARTIFACT_NOTES__ACCESS_TOKEN=$(gcloud auth print-access-token) \
//!   cargo run --example convert_report -- report.json us-docker.pkg.dev/p/r/img [publish|purge]
//! ```

use artifact_notes::{ArtifactAnalysis, Config, Source, convert_with_report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Hold the guard until the end of main
    let _guard = artifact_notes::logging::init_logging(&config);

    let mut args = std::env::args().skip(1);
    let (Some(report), Some(uri)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: convert_report <report.json> <artifact-uri> [publish|purge]");
    };
    let action = args.next();

    let source = Source::from_path(&uri, &config.project, &report)?;
    let (list, summary) = convert_with_report(&source)?;

    println!("=== {} ===", report);
    println!("Entries: {}", summary.total);
    println!("Notes: {}", list.len());
    println!("Occurrences: {}", summary.converted);
    for skipped in &summary.skipped {
        println!(
            "  skipped #{} {}: {}",
            skipped.index,
            skipped.cve.as_deref().unwrap_or("-"),
            skipped.reason
        );
    }

    match action.as_deref() {
        Some("publish") => {
            let manager = ArtifactAnalysis::from_config(&config)?;
            let published = manager.publish(&list).await?;
            println!("{}", serde_json::to_string_pretty(&published)?);
        }
        Some("purge") => {
            let manager = ArtifactAnalysis::from_config(&config)?;
            let purged = manager.purge(&list, &source.resource_uri()).await?;
            println!("{}", serde_json::to_string_pretty(&purged)?);
        }
        Some(other) => anyhow::bail!("unknown action '{}'", other),
        None => println!("{}", serde_json::to_string_pretty(&list)?),
    }

    Ok(())
}
