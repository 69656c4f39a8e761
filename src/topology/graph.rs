//! Graph queries over the collapsed device adjacency.
//!
//! All traversals visit neighbours in hostname order, so paths, components
//! and cycles come out the same on every run.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::types::{Hierarchy, Topology};

/// Summary metrics for a topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub nodes: usize,
    /// Distinct adjacent device pairs
    pub edges: usize,
    /// Inferred links, counting parallel links separately
    pub links: usize,
    pub density: f64,
    pub is_connected: bool,
    pub components: usize,
    pub diameter: Option<usize>,
    pub hierarchy: Hierarchy,
}

type EdgeKey = (String, String);

fn edge_key(x: &str, y: &str) -> EdgeKey {
    if x <= y {
        (x.to_string(), y.to_string())
    } else {
        (y.to_string(), x.to_string())
    }
}

impl Topology {
    /// Distinct devices adjacent to `device`
    pub fn neighbors(&self, device: &str) -> Vec<&str> {
        self.adjacency
            .get(device)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn degree(&self, device: &str) -> usize {
        self.adjacency.get(device).map_or(0, BTreeSet::len)
    }

    /// Number of distinct adjacent device pairs
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// degree / (n - 1) for every device
    pub fn degree_centrality(&self) -> BTreeMap<String, f64> {
        let n = self.adjacency.len();
        self.adjacency
            .iter()
            .map(|(name, peers)| {
                let c = if n > 1 {
                    peers.len() as f64 / (n - 1) as f64
                } else {
                    0.0
                };
                (name.clone(), c)
            })
            .collect()
    }

    /// Fewest-hop path from `from` to `to`, both ends included
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        self.bfs_path(from, to, &HashSet::new(), &HashSet::new())
    }

    /// Up to `k` loop-free paths ordered by hop count (Yen's algorithm).
    ///
    /// The first path is always the shortest path.
    pub fn alternative_paths(&self, from: &str, to: &str, k: usize) -> Vec<Vec<String>> {
        let mut accepted: Vec<Vec<String>> = Vec::new();
        if k == 0 {
            return accepted;
        }
        let Some(first) = self.shortest_path(from, to) else {
            return accepted;
        };
        accepted.push(first);

        let mut candidates: Vec<Vec<String>> = Vec::new();
        while accepted.len() < k {
            let previous = accepted[accepted.len() - 1].clone();

            for i in 0..previous.len().saturating_sub(1) {
                let spur = &previous[i];
                let root = &previous[..=i];

                let mut banned_edges: HashSet<EdgeKey> = HashSet::new();
                for path in &accepted {
                    if path.len() > i + 1 && path[..=i] == *root {
                        banned_edges.insert(edge_key(&path[i], &path[i + 1]));
                    }
                }
                let banned_nodes: HashSet<&str> = root[..i].iter().map(String::as_str).collect();

                if let Some(spur_path) = self.bfs_path(spur, to, &banned_nodes, &banned_edges) {
                    let mut total: Vec<String> = root[..i].to_vec();
                    total.extend(spur_path);
                    if !accepted.contains(&total) && !candidates.contains(&total) {
                        candidates.push(total);
                    }
                }
            }

            if candidates.is_empty() {
                break;
            }
            candidates.sort_by(|x, y| x.len().cmp(&y.len()).then_with(|| x.cmp(y)));
            accepted.push(candidates.remove(0));
        }

        accepted
    }

    fn bfs_path(
        &self,
        from: &str,
        to: &str,
        banned_nodes: &HashSet<&str>,
        banned_edges: &HashSet<EdgeKey>,
    ) -> Option<Vec<String>> {
        if !self.adjacency.contains_key(from) || !self.adjacency.contains_key(to) {
            return None;
        }
        if banned_nodes.contains(from) || banned_nodes.contains(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut queue: VecDeque<&str> = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current) {
                if visited.contains(next) || banned_nodes.contains(next) {
                    continue;
                }
                if banned_edges.contains(&edge_key(current, next)) {
                    continue;
                }
                visited.insert(next);
                parent.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(&p) = parent.get(cursor) {
                        path.push(p.to_string());
                        cursor = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Connected components, each sorted, in order of their first member
    pub fn components(&self) -> Vec<Vec<String>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut components = Vec::new();

        for start in self.adjacency.keys() {
            if !seen.insert(start.as_str()) {
                continue;
            }
            let mut members = vec![start.clone()];
            let mut queue: VecDeque<&str> = VecDeque::from([start.as_str()]);
            while let Some(current) = queue.pop_front() {
                for next in self.neighbors(current) {
                    if seen.insert(next) {
                        members.push(next.to_string());
                        queue.push_back(next);
                    }
                }
            }
            members.sort();
            components.push(members);
        }
        components
    }

    pub fn is_connected(&self) -> bool {
        !self.adjacency.is_empty() && self.components().len() == 1
    }

    /// 2E / (N (N - 1)) over distinct device pairs
    pub fn density(&self) -> f64 {
        let n = self.adjacency.len();
        if n < 2 {
            return 0.0;
        }
        2.0 * self.edge_count() as f64 / (n * (n - 1)) as f64
    }

    /// Longest shortest path in hops; `None` when empty or disconnected
    pub fn diameter(&self) -> Option<usize> {
        if !self.is_connected() {
            return None;
        }
        self.adjacency
            .keys()
            .map(|start| self.eccentricity(start))
            .max()
    }

    fn eccentricity(&self, start: &str) -> usize {
        let mut distance: HashMap<&str, usize> = HashMap::from([(start, 0)]);
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        let mut furthest = 0;
        while let Some(current) = queue.pop_front() {
            let d = distance[current];
            furthest = furthest.max(d);
            for next in self.neighbors(current) {
                if !distance.contains_key(next) {
                    distance.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        furthest
    }

    /// Fundamental cycles of a BFS spanning forest.
    ///
    /// Each cycle lists devices in traversal order without repeating the
    /// first device at the end.
    pub fn cycle_basis(&self) -> Vec<Vec<String>> {
        let mut parent: HashMap<&str, Option<&str>> = HashMap::new();
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut tree_edges: HashSet<EdgeKey> = HashSet::new();

        for root in self.adjacency.keys() {
            if parent.contains_key(root.as_str()) {
                continue;
            }
            parent.insert(root, None);
            depth.insert(root, 0);
            let mut queue: VecDeque<&str> = VecDeque::from([root.as_str()]);
            while let Some(current) = queue.pop_front() {
                for next in self.neighbors(current) {
                    if parent.contains_key(next) {
                        continue;
                    }
                    parent.insert(next, Some(current));
                    depth.insert(next, depth[current] + 1);
                    tree_edges.insert(edge_key(current, next));
                    queue.push_back(next);
                }
            }
        }

        let mut cycles = Vec::new();
        for (x, peers) in &self.adjacency {
            for y in peers {
                if x >= y || tree_edges.contains(&edge_key(x, y)) {
                    continue;
                }
                // Walk both ends up to their common ancestor
                let mut left: Vec<&str> = vec![x.as_str()];
                let mut right: Vec<&str> = vec![y.as_str()];
                let (mut u, mut v) = (x.as_str(), y.as_str());
                while depth[u] > depth[v] {
                    u = parent[u].unwrap_or(u);
                    left.push(u);
                }
                while depth[v] > depth[u] {
                    v = parent[v].unwrap_or(v);
                    right.push(v);
                }
                while u != v {
                    u = parent[u].unwrap_or(u);
                    v = parent[v].unwrap_or(v);
                    left.push(u);
                    right.push(v);
                }
                // `left` ends at the ancestor; drop its duplicate from `right`
                right.pop();
                left.reverse();
                let mut cycle: Vec<String> = left.into_iter().map(str::to_string).collect();
                cycle.extend(right.into_iter().map(str::to_string));
                cycles.push(cycle);
            }
        }
        cycles
    }

    pub fn network_info(&self) -> NetworkInfo {
        NetworkInfo {
            nodes: self.nodes.len(),
            edges: self.edge_count(),
            links: self.links.len(),
            density: self.density(),
            is_connected: self.is_connected(),
            components: self.components().len(),
            diameter: self.diameter(),
            hierarchy: self.hierarchy.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceKind;
    use crate::topology::types::{DeviceNode, Link, LinkEndpoint, LinkEvidence, Tier};

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> Topology {
        let nodes = nodes
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    DeviceNode {
                        hostname: n.to_string(),
                        kind: DeviceKind::Router,
                        tier: Tier::Access,
                    },
                )
            })
            .collect();
        let ep = |d: &str| LinkEndpoint {
            device: d.to_string(),
            interface: None,
            address: None,
            mtu: 1500,
            bandwidth_kbps: 1000,
        };
        let links = edges
            .iter()
            .map(|(x, y)| {
                Link::new(
                    ep(*x),
                    ep(*y),
                    LinkEvidence::Description {
                        text: String::new(),
                    },
                )
            })
            .collect();
        Topology::new(nodes, links)
    }

    /// A - B - C - D plus a shortcut A - D and a pendant E off D
    fn ring_with_tail() -> Topology {
        graph(
            &["A", "B", "C", "D", "E"],
            &[("A", "B"), ("B", "C"), ("C", "D"), ("A", "D"), ("D", "E")],
        )
    }

    #[test]
    fn test_shortest_path() {
        let topo = ring_with_tail();
        assert_eq!(topo.shortest_path("A", "E").unwrap(), vec!["A", "D", "E"]);
        assert_eq!(topo.shortest_path("B", "B").unwrap(), vec!["B"]);
        assert!(topo.shortest_path("A", "Z").is_none());
    }

    #[test]
    fn test_alternative_paths() {
        let topo = ring_with_tail();
        let paths = topo.alternative_paths("A", "C", 3);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], vec!["A", "B", "C"]);
        assert_eq!(paths[1], vec!["A", "D", "C"]);

        let paths = topo.alternative_paths("A", "D", 5);
        assert_eq!(paths, vec![vec!["A", "D"], vec!["A", "B", "C", "D"]]);
    }

    #[test]
    fn test_metrics() {
        let topo = ring_with_tail();
        assert_eq!(topo.edge_count(), 5);
        assert!((topo.density() - 0.5).abs() < 1e-9);
        assert!(topo.is_connected());
        assert_eq!(topo.diameter(), Some(3));
        assert_eq!(topo.degree("D"), 3);
        assert!((topo.degree_centrality()["D"] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_components_and_disconnection() {
        let topo = graph(&["A", "B", "C"], &[("A", "B")]);
        assert_eq!(topo.components(), vec![vec!["A", "B"], vec!["C"]]);
        assert!(!topo.is_connected());
        assert_eq!(topo.diameter(), None);
        assert!(!Topology::default().is_connected());
    }

    #[test]
    fn test_cycle_basis() {
        let topo = ring_with_tail();
        let cycles = topo.cycle_basis();
        assert_eq!(cycles.len(), 1);
        let mut members = cycles[0].clone();
        members.sort();
        assert_eq!(members, vec!["A", "B", "C", "D"]);

        let tree = graph(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        assert!(tree.cycle_basis().is_empty());
    }

    #[test]
    fn test_parallel_links_collapse() {
        let topo = graph(&["A", "B"], &[("A", "B"), ("A", "B")]);
        assert_eq!(topo.links.len(), 2);
        assert_eq!(topo.edge_count(), 1);
        assert!(topo.cycle_basis().is_empty());
        let info = topo.network_info();
        assert_eq!(info.links, 2);
        assert_eq!(info.edges, 1);
        assert_eq!(info.diameter, Some(1));
    }
}
