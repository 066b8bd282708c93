//! Material resolver: nets needs against the depot and expands composites
//! down to farmable leaves.
//!
//! Netting happens exactly once per request: a material asked for `n` times
//! with `k` owned contributes `max(0, n - k)`, and only that remainder is
//! pushed into its recipe. Sub-material requests are netted against the
//! depot again at their own level, never against a decremented copy.
//!
//! Grouped ("pack") materials are farmed directly even when a recipe exists.

use std::collections::{BTreeMap, HashSet};

use farmflow_core::error::{FarmflowError, Result};
use serde::{Deserialize, Serialize};

use crate::inventory::Inventory;
use crate::recipes::{Material, MaterialCatalog, RecipeGraph};

/// Decides which composites are farmed as packs instead of crafted.
#[derive(Debug, Clone, Default)]
pub struct GroupPolicy {
    suffixes: Vec<String>,
    ids: HashSet<String>,
}

impl GroupPolicy {
    pub fn new(suffixes: Vec<String>, ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            suffixes,
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_grouped(&self, material: &Material) -> bool {
        self.ids.contains(&material.id)
            || self
                .suffixes
                .iter()
                .any(|s| !s.is_empty() && material.name.ends_with(s.as_str()))
    }
}

/// One node of the material hierarchy shown alongside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialNode {
    pub id: String,
    pub name: String,
    pub icon_id: String,
    pub needed: u64,
    pub owned: u64,
    pub still_needed: u64,
    /// Obtained by farming (leaf or pack) rather than crafting.
    pub farmable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MaterialNode>,
}

/// Result of one expansion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Farmable material id → quantity still to farm.
    pub leaves: BTreeMap<String, u64>,
    pub hierarchy: Vec<MaterialNode>,
    pub warnings: Vec<String>,
}

impl Expansion {
    fn warn(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            tracing::warn!("⚠️ {message}");
            self.warnings.push(message);
        }
    }
}

/// Recursive bill-of-materials expansion.
pub struct MaterialResolver<'a> {
    catalog: &'a MaterialCatalog,
    recipes: &'a RecipeGraph,
    policy: &'a GroupPolicy,
}

impl<'a> MaterialResolver<'a> {
    pub fn new(
        catalog: &'a MaterialCatalog,
        recipes: &'a RecipeGraph,
        policy: &'a GroupPolicy,
    ) -> Self {
        Self {
            catalog,
            recipes,
            policy,
        }
    }

    /// Expand `needs` into farmable leaves.
    ///
    /// Fails only on a recipe cycle; unknown materials become warnings.
    pub fn expand(
        &self,
        needs: &BTreeMap<String, u64>,
        inventory: &Inventory,
    ) -> Result<Expansion> {
        let mut out = Expansion::default();
        let mut path = Vec::new();
        for (id, needed) in needs {
            if let Some(node) = self.resolve(id, *needed, inventory, &mut path, &mut out)? {
                out.hierarchy.push(node);
            }
        }
        Ok(out)
    }

    fn resolve(
        &self,
        id: &str,
        needed: u64,
        inventory: &Inventory,
        path: &mut Vec<String>,
        out: &mut Expansion,
    ) -> Result<Option<MaterialNode>> {
        if needed == 0 {
            return Ok(None);
        }
        if path.iter().any(|p| p == id) {
            let mut cycle = path.clone();
            cycle.push(id.to_string());
            return Err(FarmflowError::CyclicRecipe(cycle));
        }
        let Some(material) = self.catalog.get(id) else {
            out.warn(format!("unknown material {id}"));
            return Ok(None);
        };

        let owned = inventory.owned(id);
        let still_needed = needed.saturating_sub(owned);
        let grouped = self.policy.is_grouped(material);
        let recipe = if grouped { None } else { self.recipes.recipe(id) };

        let mut node = MaterialNode {
            id: id.to_string(),
            name: material.name.clone(),
            icon_id: material.icon_id.clone(),
            needed,
            owned,
            still_needed,
            farmable: recipe.is_none(),
            children: Vec::new(),
        };
        if still_needed == 0 {
            return Ok(Some(node));
        }

        match recipe {
            Some(recipe) => {
                path.push(id.to_string());
                for (sub, per_unit) in recipe {
                    let child_need = per_unit.saturating_mul(still_needed);
                    if let Some(child) = self.resolve(sub, child_need, inventory, path, out)? {
                        node.children.push(child);
                    }
                }
                path.pop();
            }
            None => {
                *out.leaves.entry(id.to_string()).or_insert(0) += still_needed;
            }
        }
        Ok(Some(node))
    }
}
