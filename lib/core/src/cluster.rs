use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::RecordId;

/// A scored edge between two records.
///
/// Within one set the endpoints are ordered so that `a < b`. Between two
/// sets `a` is the left record and `b` the right one, and the two may
/// carry equal IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub a: RecordId,
    pub b: RecordId,
    pub score: f64,
}

impl ScoredPair {
    /// Edge within one set; orders the endpoints so that `a < b`
    pub fn new(x: RecordId, y: RecordId, score: f64) -> Self {
        if x <= y {
            Self { a: x, b: y, score }
        } else {
            Self { a: y, b: x, score }
        }
    }

    /// Edge from a left-set record to a right-set record
    pub fn linked(left: RecordId, right: RecordId, score: f64) -> Self {
        Self {
            a: left,
            b: right,
            score,
        }
    }
}

/// A connected component of matched records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Members in ascending ID order; left-set members when two sets are linked
    pub members: Vec<RecordId>,
    /// Right-set members in ascending ID order, empty within one set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub right_members: Vec<RecordId>,
    /// Edges sorted by `(a, b)`
    pub edges: Vec<ScoredPair>,
}

impl Cluster {
    /// Mean edge score
    pub fn confidence(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        self.edges.iter().map(|e| e.score).sum::<f64>() / self.edges.len() as f64
    }
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

/// Group edges within one set into connected components.
///
/// Output is independent of input order: members ascend, edges are sorted by
/// endpoint IDs and clusters are ordered by their first member. Of repeated
/// edges between the same endpoints the highest score is kept.
pub fn connected_components(edges: Vec<ScoredPair>) -> Vec<Cluster> {
    components(edges, false)
}

/// Group edges between two sets (built with [`ScoredPair::linked`]).
///
/// A left and a right record are distinct nodes even when their IDs are
/// equal.
pub fn linked_components(edges: Vec<ScoredPair>) -> Vec<Cluster> {
    components(edges, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Left,
    Right,
}

fn components(mut edges: Vec<ScoredPair>, two_sided: bool) -> Vec<Cluster> {
    edges.sort_by(|x, y| {
        (&x.a, &x.b)
            .cmp(&(&y.a, &y.b))
            .then_with(|| y.score.total_cmp(&x.score))
    });
    edges.dedup_by(|x, y| x.a == y.a && x.b == y.b);

    let right = if two_sided { Side::Right } else { Side::Left };
    let mut slots: BTreeMap<(Side, RecordId), usize> = BTreeMap::new();
    for edge in &edges {
        let next = slots.len();
        slots.entry((Side::Left, edge.a.clone())).or_insert(next);
        let next = slots.len();
        slots.entry((right, edge.b.clone())).or_insert(next);
    }

    let mut uf = UnionFind::new(slots.len());
    for edge in &edges {
        uf.union(
            slots[&(Side::Left, edge.a.clone())],
            slots[&(right, edge.b.clone())],
        );
    }

    let mut groups: BTreeMap<usize, Cluster> = BTreeMap::new();
    // BTreeMap iteration gives members in ascending order, left side first
    for ((side, id), slot) in &slots {
        let root = uf.find(*slot);
        let cluster = groups.entry(root).or_insert_with(|| Cluster {
            members: Vec::new(),
            right_members: Vec::new(),
            edges: Vec::new(),
        });
        match side {
            Side::Left => cluster.members.push(id.clone()),
            Side::Right => cluster.right_members.push(id.clone()),
        }
    }
    for edge in edges {
        let root = uf.find(slots[&(Side::Left, edge.a.clone())]);
        if let Some(cluster) = groups.get_mut(&root) {
            cluster.edges.push(edge);
        }
    }

    let mut clusters: Vec<Cluster> = groups.into_values().collect();
    clusters.sort_by(|x, y| {
        (x.members.first(), x.right_members.first()).cmp(&(y.members.first(), y.right_members.first()))
    });
    clusters
}
