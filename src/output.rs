//! CSV writers for clusters and search results

use crate::csv_source::CsvTable;
use anyhow::Result;
use csv::Writer;
use linkx_core::{Cluster, RecordId};
use linkx_matcher::MatchResult;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Write matched rows of two tables side by side.
///
/// Clusters come from linking `left` against `right`, so every edge runs
/// from a left row to a right row and becomes one output row. With `inner_join == false`, rows of either table that matched
/// nothing follow, padded with empty cells.
pub fn write_linked<W: Write>(
    out: W,
    clusters: &[Cluster],
    left: &CsvTable,
    right: &CsvTable,
    inner_join: bool,
) -> Result<usize> {
    let mut w = Writer::from_writer(out);
    let mut header = vec!["cluster_id".to_string(), "score".to_string()];
    header.extend(left.headers.iter().cloned());
    header.extend(right.headers.iter().cloned());
    w.write_record(&header)?;

    let mut seen_left = BTreeSet::new();
    let mut seen_right = BTreeSet::new();
    let mut written = 0;
    for (cluster_id, cluster) in clusters.iter().enumerate() {
        for edge in &cluster.edges {
            let (Some(l), Some(r)) = (left.row(&edge.a), right.row(&edge.b)) else {
                continue;
            };
            let mut row = vec![cluster_id.to_string(), format!("{:.4}", edge.score)];
            row.extend(l.iter().cloned());
            row.extend(r.iter().cloned());
            w.write_record(&row)?;
            seen_left.insert(edge.a.clone());
            seen_right.insert(edge.b.clone());
            written += 1;
        }
    }

    if !inner_join {
        let pad_left = vec![String::new(); left.headers.len()];
        let pad_right = vec![String::new(); right.headers.len()];
        for (id, raw) in left.ids().zip(&left.rows) {
            if !seen_left.contains(&id) {
                w.write_record(padded(&[], raw, &pad_right))?;
                written += 1;
            }
        }
        for (id, raw) in right.ids().zip(&right.rows) {
            if !seen_right.contains(&id) {
                w.write_record(padded(&pad_left, raw, &[]))?;
                written += 1;
            }
        }
    }

    w.flush()?;
    tracing::info!(rows = written, clusters = clusters.len(), inner_join, "wrote linked output");
    Ok(written)
}

/// Write every row of a deduplicated table with its cluster and confidence.
pub fn write_clusters<W: Write>(out: W, clusters: &[Cluster], table: &CsvTable) -> Result<usize> {
    let mut membership: BTreeMap<&RecordId, (usize, f64)> = BTreeMap::new();
    for (cluster_id, cluster) in clusters.iter().enumerate() {
        let confidence = cluster.confidence();
        for member in &cluster.members {
            membership.insert(member, (cluster_id, confidence));
        }
    }

    let mut w = Writer::from_writer(out);
    let mut header = vec!["cluster_id".to_string(), "confidence".to_string()];
    header.extend(table.headers.iter().cloned());
    w.write_record(&header)?;

    for (id, raw) in table.ids().zip(&table.rows) {
        let (cluster, confidence) = match membership.get(&id) {
            Some((c, conf)) => (c.to_string(), format!("{:.4}", conf)),
            None => (String::new(), String::new()),
        };
        let mut row = vec![cluster, confidence];
        row.extend(raw.iter().cloned());
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(table.rows.len())
}

/// Write gazetteer search results, one row per (query, match).
///
/// Queries without a match get a single row with empty match columns.
pub fn write_search_results<W: Write>(
    out: W,
    results: &BTreeMap<RecordId, MatchResult>,
    queries: &CsvTable,
    reference: &CsvTable,
) -> Result<usize> {
    let mut w = Writer::from_writer(out);
    let mut header = queries.headers.clone();
    header.push("match_rank".to_string());
    header.push("score".to_string());
    header.extend(reference.headers.iter().cloned());
    w.write_record(&header)?;

    let empty_reference = vec![String::new(); reference.headers.len()];
    let mut written = 0;
    for (id, raw) in queries.ids().zip(&queries.rows) {
        let matches = results.get(&id).map(Vec::as_slice).unwrap_or_default();
        if matches.is_empty() {
            let mut row = raw.clone();
            row.extend([String::new(), String::new()]);
            row.extend(empty_reference.iter().cloned());
            w.write_record(&row)?;
            written += 1;
            continue;
        }
        for (rank, (ref_id, score)) in matches.iter().enumerate() {
            let Some(ref_row) = reference.row(ref_id) else {
                continue;
            };
            let mut row = raw.clone();
            row.push((rank + 1).to_string());
            row.push(format!("{:.4}", score));
            row.extend(ref_row.iter().cloned());
            w.write_record(&row)?;
            written += 1;
        }
    }
    w.flush()?;
    tracing::info!(rows = written, queries = queries.rows.len(), "wrote search results");
    Ok(written)
}

fn padded(left: &[String], row: &[String], right: &[String]) -> Vec<String> {
    let mut out = vec![String::new(), String::new()];
    out.extend(left.iter().cloned());
    out.extend(row.iter().cloned());
    out.extend(right.iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkx_core::{connected_components, linked_components, ScoredPair};

    fn table(prefix: &str, rows: &[&str]) -> CsvTable {
        CsvTable {
            prefix: prefix.to_string(),
            headers: vec!["Address".to_string()],
            rows: rows.iter().map(|r| vec![r.to_string()]).collect(),
        }
    }

    fn lines(buf: Vec<u8>) -> Vec<String> {
        String::from_utf8(buf).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn test_inner_and_outer_join() {
        let canonical = table("canonical", &["100 Main St", "200 Oak Ave"]);
        let messy = table("messy", &["100 main street", "9 Elm"]);
        let clusters = linked_components(vec![ScoredPair::linked(
            RecordId::tagged("canonical", 0),
            RecordId::tagged("messy", 0),
            0.9,
        )]);

        let mut buf = Vec::new();
        assert_eq!(write_linked(&mut buf, &clusters, &canonical, &messy, true).unwrap(), 1);
        let out = lines(buf);
        assert_eq!(out[0], "cluster_id,score,Address,Address");
        assert_eq!(out[1], "0,0.9000,100 Main St,100 main street");
        assert_eq!(out.len(), 2);

        let mut buf = Vec::new();
        assert_eq!(write_linked(&mut buf, &clusters, &canonical, &messy, false).unwrap(), 3);
        let out = lines(buf);
        assert_eq!(out[2], ",,200 Oak Ave,");
        assert_eq!(out[3], ",,,9 Elm");
    }

    #[test]
    fn test_linked_rows_with_shared_ids() {
        let canonical = CsvTable {
            prefix: String::new(),
            headers: vec!["Address".to_string()],
            rows: vec![vec!["100 Main St".to_string()]],
        };
        let messy = CsvTable {
            prefix: String::new(),
            headers: vec!["Address".to_string()],
            rows: vec![vec!["100 main street".to_string()]],
        };
        let id = canonical.ids().next().unwrap();
        let clusters = linked_components(vec![ScoredPair::linked(id.clone(), id, 0.9)]);

        let mut buf = Vec::new();
        assert_eq!(write_linked(&mut buf, &clusters, &canonical, &messy, false).unwrap(), 1);
        assert_eq!(lines(buf)[1], "0,0.9000,100 Main St,100 main street");
    }

    #[test]
    fn test_search_results_keep_unmatched_queries() {
        let canonical = table("canonical", &["100 Main St"]);
        let messy = table("messy", &["100 main street", "nowhere"]);
        let mut results = BTreeMap::new();
        results.insert(RecordId::tagged("messy", 0), vec![(RecordId::tagged("canonical", 0), 0.875)]);
        results.insert(RecordId::tagged("messy", 1), Vec::new());

        let mut buf = Vec::new();
        assert_eq!(write_search_results(&mut buf, &results, &messy, &canonical).unwrap(), 2);
        let out = lines(buf);
        assert_eq!(out[0], "Address,match_rank,score,Address");
        assert_eq!(out[1], "100 main street,1,0.8750,100 Main St");
        assert_eq!(out[2], "nowhere,,,");
    }

    #[test]
    fn test_cluster_membership_column() {
        let set = table("rows", &["a", "a.", "b"]);
        let clusters = connected_components(vec![ScoredPair::new(
            RecordId::tagged("rows", 0),
            RecordId::tagged("rows", 1),
            0.8,
        )]);
        let mut buf = Vec::new();
        write_clusters(&mut buf, &clusters, &set).unwrap();
        let out = lines(buf);
        assert_eq!(out[1], "0,0.8000,a");
        assert_eq!(out[2], "0,0.8000,a.");
        assert_eq!(out[3], ",,b");
    }
}
