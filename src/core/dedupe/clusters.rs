//! Groups items into duplicate clusters using transitive relationships.
//!
//! If A matches B and B matches C, then {A, B, C} forms a single cluster
//! even if A doesn't directly match C.

use super::Edge;
use std::collections::HashMap;

/// Union-find over item indices.
///
/// The root of every set is its member with the smallest id, which makes
/// the root the canonical survivor no matter in which order edges arrive.
struct DisjointSet<'a> {
    ids: &'a [&'a str],
    parent: Vec<usize>,
}

impl<'a> DisjointSet<'a> {
    fn new(ids: &'a [&'a str]) -> Self {
        Self {
            ids,
            parent: (0..ids.len()).collect(),
        }
    }

    /// Find root with path compression
    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }

    /// Union two sets; the root with the smaller id wins
    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }

        if self.ids[root_a] < self.ids[root_b] {
            self.parent[root_b] = root_a;
        } else {
            self.parent[root_a] = root_b;
        }
    }
}

/// Disjoint duplicate clusters over one working set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateClusters {
    /// Canonical id for every member of a cluster with two or more items
    canonical: HashMap<String, String>,
    /// Clusters with two or more items, members sorted, ordered by canonical id
    clusters: Vec<Vec<String>>,
    /// Edges at or below the threshold that joined two known items
    qualifying_edges: usize,
    /// Edges that were discarded as unusable
    ignored_edges: usize,
}

impl DuplicateClusters {
    /// Cluster `ids` using every edge with `distance <= threshold`.
    ///
    /// Edges that reference unknown ids, connect an item to itself or carry
    /// a non-finite distance are ignored.
    pub fn from_edges(ids: &[&str], edges: &[Edge], threshold: f64) -> Self {
        let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut set = DisjointSet::new(ids);
        let mut qualifying_edges = 0;
        let mut ignored_edges = 0;

        for edge in edges {
            let endpoints = index.get(edge.a.as_str()).zip(index.get(edge.b.as_str()));
            let (a, b) = match endpoints {
                Some((&a, &b)) if a != b && edge.distance.is_finite() => (a, b),
                _ => {
                    tracing::debug!(a = %edge.a, b = %edge.b, distance = edge.distance, "ignoring unusable edge");
                    ignored_edges += 1;
                    continue;
                }
            };

            if edge.distance <= threshold {
                qualifying_edges += 1;
                set.union(a, b);
            }
        }

        // Group by root; roots are the canonical members
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..ids.len() {
            let root = set.find(i);
            groups.entry(root).or_default().push(i);
        }

        let mut canonical = HashMap::new();
        let mut clusters = Vec::new();
        for (root, members) in groups {
            if members.len() < 2 {
                continue;
            }

            let mut members: Vec<String> = members.iter().map(|&i| ids[i].to_string()).collect();
            members.sort();
            for member in &members {
                canonical.insert(member.clone(), ids[root].to_string());
            }
            clusters.push(members);
        }
        clusters.sort_by(|a, b| a[0].cmp(&b[0]));

        Self {
            canonical,
            clusters,
            qualifying_edges,
            ignored_edges,
        }
    }

    /// Canonical survivor of the cluster containing `id`.
    ///
    /// Returns `None` for items that are not in any multi-item cluster.
    pub fn canonical_of(&self, id: &str) -> Option<&str> {
        self.canonical.get(id).map(String::as_str)
    }

    /// True if `id` survives deduplication
    pub fn is_survivor(&self, id: &str) -> bool {
        self.canonical_of(id).is_none_or(|canonical| canonical == id)
    }

    /// Clusters with two or more members
    pub fn clusters(&self) -> &[Vec<String>] {
        &self.clusters
    }

    /// Number of items that will be dropped as duplicates
    pub fn duplicate_count(&self) -> usize {
        self.clusters.iter().map(|c| c.len() - 1).sum()
    }

    pub fn qualifying_edges(&self) -> usize {
        self.qualifying_edges
    }

    pub fn ignored_edges(&self) -> usize {
        self.ignored_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: &[&str] = &["A", "B", "C", "D", "E"];

    #[test]
    fn no_edges_means_no_clusters() {
        let clusters = DuplicateClusters::from_edges(IDS, &[], 10.0);
        assert!(clusters.clusters().is_empty());
        assert!(IDS.iter().all(|id| clusters.is_survivor(id)));
    }

    #[test]
    fn transitive_edges_form_one_cluster() {
        // A~B and B~C with no A-C edge
        let edges = vec![Edge::new("A", "B", 3.0), Edge::new("B", "C", 5.0)];
        let clusters = DuplicateClusters::from_edges(IDS, &edges, 10.0);

        assert_eq!(clusters.clusters(), &[vec!["A", "B", "C"]]);
        assert_eq!(clusters.canonical_of("C"), Some("A"));
        assert!(clusters.is_survivor("A"));
        assert!(!clusters.is_survivor("B"));
        assert!(!clusters.is_survivor("C"));
    }

    #[test]
    fn edges_above_threshold_do_not_join() {
        let edges = vec![
            Edge::new("A", "B", 3.0),
            Edge::new("B", "C", 5.0),
            Edge::new("C", "D", 20.0),
        ];
        let clusters = DuplicateClusters::from_edges(IDS, &edges, 10.0);

        assert_eq!(clusters.clusters().len(), 1);
        assert!(clusters.is_survivor("D"));
        assert!(clusters.is_survivor("E"));
        assert_eq!(clusters.canonical_of("D"), None);
        assert_eq!(clusters.qualifying_edges(), 2);
    }

    #[test]
    fn threshold_is_inclusive() {
        let edges = vec![Edge::new("D", "E", 10.0)];
        let clusters = DuplicateClusters::from_edges(IDS, &edges, 10.0);
        assert_eq!(clusters.canonical_of("E"), Some("D"));
    }

    #[test]
    fn canonical_is_independent_of_edge_order() {
        let forward = vec![
            Edge::new("E", "D", 1.0),
            Edge::new("D", "B", 1.0),
            Edge::new("C", "A", 1.0),
        ];
        let mut reversed: Vec<Edge> = forward
            .iter()
            .rev()
            .map(|e| Edge::new(e.b.clone(), e.a.clone(), e.distance))
            .collect();

        let first = DuplicateClusters::from_edges(IDS, &forward, 2.0);
        let second = DuplicateClusters::from_edges(IDS, &reversed, 2.0);
        reversed.swap(0, 2);
        let third = DuplicateClusters::from_edges(IDS, &reversed, 2.0);

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(first.clusters(), &[vec!["A", "C"], vec!["B", "D", "E"]]);
        assert_eq!(first.canonical_of("E"), Some("B"));
    }

    #[test]
    fn canonical_is_smallest_id_even_when_not_the_hub() {
        // Z links everything but "apple" sorts first
        let ids = ["zebra", "mango", "apple"];
        let edges = vec![Edge::new("zebra", "mango", 0.0), Edge::new("zebra", "apple", 0.0)];
        let clusters = DuplicateClusters::from_edges(&ids, &edges, 0.0);

        assert_eq!(clusters.canonical_of("zebra"), Some("apple"));
        assert_eq!(clusters.duplicate_count(), 2);
    }

    #[test]
    fn unusable_edges_are_ignored() {
        let edges = vec![
            Edge::new("A", "missing", 0.0),
            Edge::new("B", "B", 0.0),
            Edge::new("C", "D", f64::NAN),
        ];
        let clusters = DuplicateClusters::from_edges(IDS, &edges, 10.0);

        assert!(clusters.clusters().is_empty());
        assert_eq!(clusters.ignored_edges(), 3);
    }

    #[test]
    fn clusters_are_disjoint_and_cover_members_once() {
        let edges = vec![
            Edge::new("A", "B", 1.0),
            Edge::new("C", "D", 1.0),
            Edge::new("B", "A", 1.0),
        ];
        let clusters = DuplicateClusters::from_edges(IDS, &edges, 1.0);

        let mut members: Vec<&String> = clusters.clusters().iter().flatten().collect();
        let total = members.len();
        members.sort();
        members.dedup();
        assert_eq!(members.len(), total);
        assert_eq!(total, 4);
    }
}
