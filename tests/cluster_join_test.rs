use ndarray::{array, Array2};
use textscape::cluster::{self, kmeans};
use textscape::config::ClusteringConfig;
use textscape::error::PipelineError;
use textscape::store;

#[test]
fn ordinal_label_map_has_no_duplicates() {
    // Ordinals 3 and 4 must map to distinct letters (D and E) — an annotated
    // mapping table with a repeated letter would silently merge two clusters
    // in the plot.
    assert_eq!(cluster::cluster_label(3), "D");
    assert_eq!(cluster::cluster_label(4), "E");

    let labels: Vec<String> = (0..60).map(cluster::cluster_label).collect();
    let unique: std::collections::HashSet<&String> = labels.iter().collect();
    assert_eq!(unique.len(), labels.len());
}

#[test]
fn annotated_file_joins_with_projection() {
    let dir = tempfile::tempdir().unwrap();

    let projected = dir.path().join("tsne_projected.csv");
    store::write_xy_csv(&projected, &array![[0.0f32, 1.0], [2.0, 3.0], [4.0, 5.0]]).unwrap();

    let clusters = dir.path().join("comments_clusters.csv");
    std::fs::write(&clusters, "id,cluster\n10,1\n11,0\n12,2\n").unwrap();

    let points = store::read_xy_csv(&projected).unwrap();
    let ordinals = cluster::read_cluster_ordinals(&clusters).unwrap();
    let joined = cluster::join_clusters(&points, &ordinals).unwrap();

    let output = dir.path().join("clustered_points.csv");
    cluster::write_joined_csv(&output, &joined).unwrap();

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "row,x,y,cluster");
    assert_eq!(lines[1], "0,0,1,B");
    assert_eq!(lines[2], "1,2,3,A");
    assert_eq!(lines[3], "2,4,5,C");
}

#[test]
fn cluster_file_without_cluster_column_is_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clusters.csv");
    std::fs::write(&path, "id,group\n1,0\n").unwrap();

    let err = cluster::read_cluster_ordinals(&path).unwrap_err();
    assert!(matches!(err, PipelineError::SourceSchema { .. }), "{err}");
}

#[test]
fn mismatched_row_counts_refuse_to_join() {
    let points = array![[0.0f32, 1.0], [2.0, 3.0], [4.0, 5.0]];
    let err = cluster::join_clusters(&points, &[0, 1]).unwrap_err();
    assert!(
        matches!(
            err,
            PipelineError::AlignmentViolation {
                left: 3,
                right: 2,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn kmeans_labels_join_in_row_order() {
    // Three tight blobs on the plane.
    let mut rows: Vec<[f32; 2]> = Vec::new();
    for i in 0..6 {
        let jitter = i as f32 * 0.02;
        rows.push([0.0 + jitter, 0.0]);
        rows.push([20.0, 20.0 + jitter]);
        rows.push([-20.0 - jitter, 20.0]);
    }
    let points = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);

    let config = ClusteringConfig {
        clusters: 3,
        max_iterations: 100,
        tolerance: 1e-4,
        seed: Some(7),
    };
    let ordinals = kmeans::cluster(&points, &config).unwrap();
    let joined = cluster::join_clusters(&points, &ordinals).unwrap();

    assert_eq!(joined.len(), points.nrows());
    for (row, point) in joined.iter().enumerate() {
        assert_eq!(point.row, row);
    }

    // Same blob, same letter; different blobs, different letters.
    for i in (0..joined.len()).step_by(3) {
        assert_eq!(joined[i].cluster, joined[0].cluster);
        assert_eq!(joined[i + 1].cluster, joined[1].cluster);
        assert_eq!(joined[i + 2].cluster, joined[2].cluster);
    }
    assert_ne!(joined[0].cluster, joined[1].cluster);
    assert_ne!(joined[1].cluster, joined[2].cluster);
}
