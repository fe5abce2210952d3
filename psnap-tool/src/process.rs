use std::path::PathBuf;

use anyhow::{Context, Result};
use psnap_lib::{
    Config, SnapshotMode, encode_size, plan_snapshot, snapshot_to_archive,
    snapshot_to_directory,
};
use tracing::info;

use crate::naming::resolve_output;

/// Runs one snapshot described by a fully merged config.
pub fn run(config: &Config, mode: SnapshotMode, output: &str) -> Result<()> {
    let source = PathBuf::from(config.source.as_deref().unwrap_or("."));
    let allowlist = config.allowlist(mode).context("invalid allowlist")?;
    let filter = config.skip_patterns().context("invalid skip patterns")?;
    let destination = resolve_output(output, mode, &source)?;

    if config.dry == Some(true) {
        println!("--- DRY RUN ---");
        println!("{}", serde_yaml::to_string(config)?);
        let plan = plan_snapshot(&source, &allowlist, &filter)
            .with_context(|| format!("listing {}", source.display()))?;
        println!("Mode: {mode}");
        println!("Destination: {}", destination.display());
        println!("Total files: {}", plan.file_count());
        println!("Total size: {}", encode_size(plan.total_size()));
        for entry in plan.files() {
            println!("{}", entry.relative.display());
        }
        return Ok(());
    }

    match mode {
        SnapshotMode::Copy => {
            let report = snapshot_to_directory(&source, &destination, &allowlist, &filter)
                .with_context(|| format!("deploying to {}", destination.display()))?;
            println!("SUCCESS: Project deployed to {} ({report})", destination.display());
            info!("dependency caches were not copied; reinstall them in the destination");
        }
        SnapshotMode::Zip => {
            let report = snapshot_to_archive(
                &source,
                &destination,
                &allowlist,
                &filter,
                config.compressor(),
            )
            .with_context(|| format!("zipping to {}", destination.display()))?;
            println!("Project zipped to {} ({report})", destination.display());
        }
    }
    Ok(())
}
