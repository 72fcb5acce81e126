use std::collections::{BTreeMap, BTreeSet};

use crate::error::GraphError;

/// Group actions into waves: every action's dependencies live in an earlier
/// wave. Within a wave ids are sorted, so flattening the waves gives a
/// deterministic topological order.
pub(crate) fn topo_waves(
    deps: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<Vec<String>>, GraphError> {
    let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for (name, dependency_set) in deps {
        reverse.entry(name.as_str()).or_default();
        in_degree.insert(name.as_str(), dependency_set.len());
        for dep_name in dependency_set {
            if !deps.contains_key(dep_name) {
                return Err(GraphError::UnknownDependency {
                    action_id: name.clone(),
                    dependency: dep_name.clone(),
                });
            }
            reverse
                .entry(dep_name.as_str())
                .or_default()
                .insert(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(name, degree)| (*degree == 0).then_some(*name))
        .collect();
    let mut waves = Vec::new();
    let mut ordered = 0_usize;

    while !ready.is_empty() {
        let wave = std::mem::take(&mut ready);
        for name in &wave {
            if let Some(children) = reverse.get(name) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            ready.insert(*child);
                        }
                    }
                }
            }
        }
        ordered += wave.len();
        waves.push(wave.into_iter().map(str::to_string).collect::<Vec<_>>());
    }

    if ordered != deps.len() {
        let placed: BTreeSet<&str> = waves
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let cycle_nodes = deps
            .keys()
            .filter(|name| !placed.contains(name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        return Err(GraphError::Cycle {
            actions: cycle_nodes,
        });
    }

    Ok(waves)
}
