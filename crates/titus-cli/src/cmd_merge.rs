use anyhow::{Context, Result};
use tracing::debug_span;

use titus_store::{merge, Datastore};

use crate::args::{GlobalArgs, MergeArgs};

pub fn run(_global_args: &GlobalArgs, args: &MergeArgs) -> Result<()> {
    let _span = debug_span!("cmd_merge").entered();

    let mut dest = Datastore::create_or_open(&args.output, -1024 * 1024)
        .with_context(|| format!("Failed to open destination datastore at {}", args.output.display()))?;

    let sources: Vec<&std::path::Path> = args.sources.iter().map(|p| p.as_path()).collect();
    let stats = merge(&sources, &mut dest).context("Failed to merge datastores")?;

    println!(
        "Merged {} source datastore(s) into {}",
        stats.sources_processed,
        args.output.display()
    );
    println!("  {} rules merged", stats.rules_merged);
    println!("  {} blobs newly recorded", stats.blobs_merged);
    println!("  {} provenance entries newly recorded", stats.provenance_merged);
    println!("  {} matches newly recorded", stats.matches_merged);
    println!("  {} findings newly recorded", stats.findings_merged);

    Ok(())
}
