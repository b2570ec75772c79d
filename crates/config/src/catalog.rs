//! Store Catalog
//!
//! Mall directory loaded from YAML and consumed read-only by intent
//! detection and response generation. Catalog order is significant: entity
//! matching returns the first store that matches.

use mall_voice_core::Store;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Mall-wide information used when no store is resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MallInfo {
    #[serde(default = "default_mall_name")]
    pub name: String,
    /// Opening hours of the mall
    #[serde(default = "default_mall_hours")]
    pub hours: String,
}

fn default_mall_name() -> String {
    "Mall Central".to_string()
}

fn default_mall_hours() -> String {
    "de lunes a domingo de 10:00 a 21:00".to_string()
}

impl Default for MallInfo {
    fn default() -> Self {
        Self {
            name: default_mall_name(),
            hours: default_mall_hours(),
        }
    }
}

/// Store catalog loaded from catalog.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCatalog {
    #[serde(default)]
    pub mall: MallInfo,
    #[serde(default)]
    pub stores: Vec<Store>,
}

impl StoreCatalog {
    pub fn new(mall: MallInfo, stores: Vec<Store>) -> Self {
        Self { mall, stores }
    }

    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let catalog: StoreCatalog = serde_yaml::from_str(&content)?;
        catalog.validate()?;

        tracing::info!(
            path = %path.display(),
            stores = catalog.stores.len(),
            "Loaded store catalog"
        );
        Ok(catalog)
    }

    /// Load from a YAML file, falling back to the built-in catalog when absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Catalog file missing, using built-in catalog");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Store ids must be unique and non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for (idx, store) in self.stores.iter().enumerate() {
            if store.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("stores[{}].id", idx),
                    message: "Store id cannot be empty".to_string(),
                });
            }
            if store.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("stores[{}].name", idx),
                    message: "Store name cannot be empty".to_string(),
                });
            }
            if !seen.insert(store.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("stores[{}].id", idx),
                    message: format!("Duplicate store id '{}'", store.id),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Stores in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Store> {
        self.stores.iter()
    }

    /// Get store by ID
    pub fn get(&self, store_id: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.id == store_id)
    }

    /// First store, in catalog order, whose name or keyword occurs in the
    /// normalized (lowercased, trimmed) utterance
    pub fn find_match(&self, normalized: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.matches(normalized))
    }
}

impl Default for StoreCatalog {
    fn default() -> Self {
        Self {
            mall: MallInfo::default(),
            stores: vec![
                store(
                    "nike",
                    "Nike",
                    "deportes",
                    "2",
                    "B",
                    "+56 2 2345 1001",
                    "10:00 a 21:00",
                    &["zapatillas", "ropa deportiva"],
                    "Calzado y ropa deportiva",
                ),
                store(
                    "zara",
                    "Zara",
                    "vestuario",
                    "1",
                    "A",
                    "+56 2 2345 1002",
                    "10:00 a 21:00",
                    &["ropa", "moda"],
                    "Moda para mujer, hombre y niños",
                ),
                store(
                    "falabella",
                    "Falabella",
                    "tienda por departamento",
                    "1",
                    "C",
                    "+56 2 2345 1003",
                    "10:00 a 21:30",
                    &["departamento"],
                    "Tienda por departamento",
                ),
                store(
                    "farmacia-cruz-verde",
                    "Cruz Verde",
                    "farmacia",
                    "1",
                    "D",
                    "+56 2 2345 1004",
                    "09:00 a 22:00",
                    &["farmacia", "remedios"],
                    "Farmacia",
                ),
                store(
                    "starbucks",
                    "Starbucks",
                    "cafetería",
                    "3",
                    "Patio de comidas",
                    "",
                    "08:00 a 21:00",
                    &["café", "cafe"],
                    "Cafetería",
                ),
            ],
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn store(
    id: &str,
    name: &str,
    category: &str,
    floor: &str,
    zone: &str,
    phone: &str,
    hours: &str,
    keywords: &[&str],
    description: &str,
) -> Store {
    Store {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        floor: floor.to_string(),
        zone: zone.to_string(),
        phone: phone.to_string(),
        hours: hours.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        description: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog() {
        let catalog = StoreCatalog::default();
        assert!(catalog.validate().is_ok());
        assert!(catalog.get("nike").is_some());
        assert_eq!(catalog.find_match("busco nike").map(|s| s.id.as_str()), Some("nike"));
    }

    #[test]
    fn test_find_match_prefers_catalog_order() {
        let catalog = StoreCatalog::default();
        // "ropa deportiva" (Nike) and "ropa" (Zara) both match; Nike comes first
        let matched = catalog.find_match("quiero ropa deportiva").unwrap();
        assert_eq!(matched.id, "nike");
        assert!(catalog.find_match("busco una ferretería").is_none());
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
mall:
  name: Mall Plaza
  hours: "10:00 a 22:00"
stores:
  - id: adidas
    name: Adidas
    floor: "2"
    zone: C
    keywords: [zapatillas]
"#
        )
        .unwrap();

        let catalog = StoreCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.mall.name, "Mall Plaza");
        assert_eq!(catalog.len(), 1);
        let adidas = catalog.get("adidas").unwrap();
        assert!(!adidas.has_phone());
        assert_eq!(adidas.keywords, vec!["zapatillas"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
stores:
  - {{ id: a, name: A, floor: "1", zone: A }}
  - {{ id: a, name: B, floor: "1", zone: B }}
"#
        )
        .unwrap();

        assert!(matches!(
            StoreCatalog::load(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StoreCatalog::load("/nonexistent/catalog.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
        let catalog = StoreCatalog::load_or_default("/nonexistent/catalog.yaml").unwrap();
        assert_eq!(catalog.len(), StoreCatalog::default().len());
    }
}
