//! Core / distribution / access classification.

use log::info;

use crate::settings::TopologySettings;

use super::types::{Hierarchy, Topology};

/// Rank devices by degree centrality and split them into tiers.
///
/// With `n` devices sorted by centrality (ties by hostname), device `i` is
/// core when `i < n * core_fraction`, distribution when
/// `i < n * distribution_fraction`, access otherwise.
pub fn compute_hierarchy(topology: &Topology, settings: &TopologySettings) -> Hierarchy {
    let centrality = topology.degree_centrality();

    let mut ranked: Vec<(&String, f64)> = centrality.iter().map(|(name, c)| (name, *c)).collect();
    ranked.sort_by(|x, y| {
        y.1.partial_cmp(&x.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.0.cmp(y.0))
    });

    let total = ranked.len() as f64;
    let mut hierarchy = Hierarchy::default();
    for (i, (name, _)) in ranked.into_iter().enumerate() {
        let position = i as f64;
        if position < total * settings.core_fraction {
            hierarchy.core.push(name.clone());
        } else if position < total * settings.distribution_fraction {
            hierarchy.distribution.push(name.clone());
        } else {
            hierarchy.access.push(name.clone());
        }
    }

    info!(
        "Hierarchy - Core: {:?}, Distribution: {:?}, Access: {:?}",
        hierarchy.core, hierarchy.distribution, hierarchy.access
    );
    hierarchy
}
