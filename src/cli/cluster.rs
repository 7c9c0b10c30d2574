//! CLI `cluster` command — join projected coordinates with cluster labels.

use std::path::Path;

use anyhow::Result;

use textscape::cluster;
use textscape::config::TextscapeConfig;
use textscape::store;

pub fn run(
    config: &TextscapeConfig,
    input: &Path,
    clusters_file: Option<&Path>,
    k: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let points = match input.extension().and_then(|e| e.to_str()) {
        Some("npy") => store::read_npy_file(input)?,
        _ => store::read_xy_csv(input)?,
    };

    let ordinals = match clusters_file {
        Some(path) => cluster::read_cluster_ordinals(path)?,
        None => {
            let mut clustering = config.clustering.clone();
            if let Some(k) = k {
                clustering.clusters = k;
            }
            if let Some(seed) = seed {
                clustering.seed = Some(seed);
            }
            cluster::kmeans::cluster(&points, &clustering)?
        }
    };

    let joined = cluster::join_clusters(&points, &ordinals)?;

    let output = input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("clustered_points.csv");
    cluster::write_joined_csv(&output, &joined)?;

    println!("Wrote {} labeled points to {}", joined.len(), output.display());
    Ok(())
}
