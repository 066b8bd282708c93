//! Material catalog and crafting recipes.
//!
//! A material with no recipe entry is a farmable leaf. The graph is acyclic in
//! shipped data; [`RecipeGraph::find_cycle`] exists to catch broken bundles at
//! load time.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// A game material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_id: String,
    /// Stage with the best drop efficiency for this material, if any.
    #[serde(default)]
    pub best_stage: Option<String>,
}

/// Material lookup by id.
#[derive(Debug, Clone, Default)]
pub struct MaterialCatalog {
    materials: BTreeMap<String, Material>,
}

impl MaterialCatalog {
    pub fn new(materials: impl IntoIterator<Item = Material>) -> Self {
        Self {
            materials: materials.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Sub-material quantities needed to craft one unit.
pub type Recipe = BTreeMap<String, u64>;

/// Composite material id → recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeGraph {
    recipes: BTreeMap<String, Recipe>,
}

impl RecipeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, K>(&mut self, id: &str, inputs: I)
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        let recipe = inputs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.recipes.insert(id.to_string(), recipe);
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn is_leaf(&self, id: &str) -> bool {
        !self.recipes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// First cycle found, as the path `a -> ... -> a`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        for start in self.recipes.keys() {
            if visited.contains(start.as_str()) {
                continue;
            }
            let mut path = Vec::new();
            if let Some(cycle) = self.dfs_find_cycle(start, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_find_cycle<'a>(
        &'a self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = path.iter().position(|p| *p == id) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Some(cycle);
        }
        if !visited.insert(id) {
            return None;
        }
        path.push(id);
        if let Some(recipe) = self.recipes.get(id) {
            for sub in recipe.keys() {
                if let Some(cycle) = self.dfs_find_cycle(sub, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}
