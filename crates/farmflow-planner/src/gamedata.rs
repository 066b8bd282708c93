//! Game data bundle: materials, recipes and per-entity rank tables, loaded from one JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use farmflow_core::error::{FarmflowError, Result};
use serde::{Deserialize, Serialize};

use crate::recipes::{Material, MaterialCatalog, RecipeGraph};

/// Cost of reaching `rank` from `rank - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankCost {
    pub rank: u32,
    pub materials: BTreeMap<String, u64>,
}

/// Promotion costs of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRanks {
    #[serde(default)]
    pub name: String,
    pub ranks: Vec<RankCost>,
}

/// Entity id → rank table.
#[derive(Debug, Clone, Default)]
pub struct RankTables {
    entities: BTreeMap<String, EntityRanks>,
}

impl RankTables {
    pub fn new(entities: BTreeMap<String, EntityRanks>) -> Self {
        Self { entities }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityRanks> {
        self.entities.get(entity_id)
    }

    /// Display name, falling back to the id.
    pub fn name_of<'a>(&'a self, entity_id: &'a str) -> &'a str {
        match self.entities.get(entity_id) {
            Some(e) if !e.name.is_empty() => e.name.as_str(),
            _ => entity_id,
        }
    }

    /// Summed cost of every rank in `(current, target]`. `None` if the entity is unknown.
    pub fn cost_between(
        &self,
        entity_id: &str,
        current: u32,
        target: u32,
    ) -> Option<BTreeMap<String, u64>> {
        let entity = self.entities.get(entity_id)?;
        let mut total = BTreeMap::new();
        for step in entity.ranks.iter().filter(|r| r.rank > current && r.rank <= target) {
            for (id, qty) in &step.materials {
                *total.entry(id.clone()).or_insert(0) += *qty;
            }
        }
        Some(total)
    }
}

/// On-disk shape of the bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameData {
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub recipes: RecipeGraph,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityRanks>,
}

impl GameData {
    /// Load and sanity-check a bundle.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FarmflowError::Config(format!("Failed to read game data {}: {e}", path.display()))
        })?;
        let data: Self = serde_json::from_str(&content)
            .map_err(|e| FarmflowError::malformed(&path.display().to_string(), e))?;
        if let Some(cycle) = data.recipes.find_cycle() {
            return Err(FarmflowError::CyclicRecipe(cycle));
        }
        tracing::info!(
            "📚 Game data loaded: {} materials, {} recipes, {} entities",
            data.materials.len(),
            data.recipes.len(),
            data.entities.len()
        );
        Ok(data)
    }

    pub fn into_parts(self) -> (MaterialCatalog, RecipeGraph, RankTables) {
        (
            MaterialCatalog::new(self.materials),
            self.recipes,
            RankTables::new(self.entities),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> RankTables {
        let ranks = vec![
            RankCost { rank: 1, materials: BTreeMap::from([("a".to_string(), 2)]) },
            RankCost {
                rank: 2,
                materials: BTreeMap::from([("a".to_string(), 3), ("b".to_string(), 1)]),
            },
            RankCost { rank: 3, materials: BTreeMap::from([("c".to_string(), 5)]) },
        ];
        RankTables::new(BTreeMap::from([(
            "char_002".to_string(),
            EntityRanks { name: "Amiya".into(), ranks },
        )]))
    }

    #[test]
    fn test_cost_between_sums_range() {
        let cost = tables().cost_between("char_002", 0, 2).unwrap();
        assert_eq!(cost["a"], 5);
        assert_eq!(cost["b"], 1);
        assert!(!cost.contains_key("c"));
    }

    #[test]
    fn test_cost_between_empty_when_reached() {
        let cost = tables().cost_between("char_002", 3, 3).unwrap();
        assert!(cost.is_empty());
    }

    #[test]
    fn test_unknown_entity() {
        let t = tables();
        assert!(t.cost_between("char_999", 0, 1).is_none());
        assert_eq!(t.name_of("char_999"), "char_999");
        assert_eq!(t.name_of("char_002"), "Amiya");
    }

    #[test]
    fn test_load_rejects_cyclic_bundle() {
        let dir = std::env::temp_dir().join("farmflow-test-gamedata");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("cyclic.json");
        std::fs::write(
            &path,
            r#"{"materials": [], "recipes": {"a": {"b": 1}, "b": {"a": 1}}, "entities": {}}"#,
        )
        .unwrap();
        let err = GameData::load_from(&path).unwrap_err();
        assert!(matches!(err, FarmflowError::CyclicRecipe(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_bundle() {
        let dir = std::env::temp_dir().join("farmflow-test-gamedata-ok");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("gamedata.json");
        std::fs::write(
            &path,
            r#"{
                "materials": [{"id": "30012", "name": "Orirock Cube", "bestStage": "1-7"}],
                "recipes": {"30013": {"30012": 3}},
                "entities": {"char_002": {"name": "Amiya", "ranks": [{"rank": 1, "materials": {"30013": 2}}]}}
            }"#,
        )
        .unwrap();
        let (catalog, recipes, ranks) = GameData::load_from(&path).unwrap().into_parts();
        assert_eq!(catalog.len(), 1);
        assert!(!recipes.is_leaf("30013"));
        assert_eq!(ranks.cost_between("char_002", 0, 1).unwrap()["30013"], 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
