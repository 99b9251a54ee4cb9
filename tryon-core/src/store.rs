//! Keyed persistence of product filter configurations.
//!
//! Stores hand out shared immutable snapshots (`Arc<ProductFilterConfig>`);
//! changing a configuration means cloning it, editing the clone and saving it
//! back. Readers therefore never observe a half-written entry.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::product::{Product, ProductFilterConfig};

const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to serialize filter configurations: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to parse filter configurations: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("unsupported configuration export version {found} (expected {})", EXPORT_VERSION)]
    Version { found: u32 },
    #[error("failed to access configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration store rejected the save for product '{product_id}'")]
    SaveRejected { product_id: String },
}

/// Key-value store of product filter configurations.
pub trait ConfigStore: Send + Sync + std::fmt::Debug {
    fn get(&self, product_id: &str) -> Option<Arc<ProductFilterConfig>>;

    /// Store `config` under `product_id`. Returns `false` when the id does not
    /// match the configuration or the write could not be completed.
    fn save(&self, product_id: &str, config: ProductFilterConfig) -> bool;

    /// Serialize every entry into a stable JSON document.
    fn export(&self) -> Result<String, ConfigError>;

    /// Merge entries from an exported document. Nothing changes unless the
    /// whole document parses.
    fn import(&self, serialized: &str) -> bool;
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportDocument {
    version: u32,
    products: BTreeMap<String, ProductFilterConfig>,
}

type ConfigMap = HashMap<String, Arc<ProductFilterConfig>>;

fn encode(map: &ConfigMap) -> Result<String, ConfigError> {
    let document = ExportDocument {
        version: EXPORT_VERSION,
        products: map
            .iter()
            .map(|(id, config)| (id.clone(), ProductFilterConfig::clone(config)))
            .collect(),
    };
    serde_json::to_string_pretty(&document).map_err(ConfigError::Serialize)
}

fn decode(serialized: &str) -> Result<BTreeMap<String, ProductFilterConfig>, ConfigError> {
    let document: ExportDocument = serde_json::from_str(serialized).map_err(ConfigError::Parse)?;
    if document.version != EXPORT_VERSION {
        return Err(ConfigError::Version {
            found: document.version,
        });
    }
    Ok(document.products)
}

fn id_matches(product_id: &str, config: &ProductFilterConfig) -> bool {
    if product_id == config.product_id() {
        return true;
    }
    warn!(
        target: "tryon::config",
        "refusing to store config for '{}' under key '{}'",
        config.product_id(),
        product_id
    );
    false
}

/// In-memory store guarded by a reader-writer lock.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<ConfigMap>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn replace_all(&self, map: ConfigMap) {
        if let Ok(mut entries) = self.entries.write() {
            *entries = map;
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, product_id: &str) -> Option<Arc<ProductFilterConfig>> {
        self.entries.read().ok()?.get(product_id).cloned()
    }

    fn save(&self, product_id: &str, config: ProductFilterConfig) -> bool {
        if !id_matches(product_id, &config) {
            return false;
        }
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(product_id.to_string(), Arc::new(config));
                true
            }
            Err(_) => false,
        }
    }

    fn export(&self) -> Result<String, ConfigError> {
        match self.entries.read() {
            Ok(entries) => encode(&entries),
            Err(poisoned) => encode(&poisoned.into_inner()),
        }
    }

    fn import(&self, serialized: &str) -> bool {
        let products = match decode(serialized) {
            Ok(products) => products,
            Err(err) => {
                warn!(target: "tryon::config", "import rejected: {err}");
                return false;
            }
        };
        if products.iter().any(|(id, config)| !id_matches(id, config)) {
            return false;
        }
        match self.entries.write() {
            Ok(mut entries) => {
                let count = products.len();
                entries.extend(products.into_iter().map(|(id, config)| (id, Arc::new(config))));
                debug!(target: "tryon::config", "imported {count} filter configurations");
                true
            }
            Err(_) => false,
        }
    }
}

/// JSON-file-backed store. Every successful save rewrites the file through a
/// temporary sibling and a rename, so the file on disk is always a complete
/// export document.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    memory: MemoryConfigStore,
}

impl JsonFileConfigStore {
    /// Open a store at `path`, loading existing entries when the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let memory = MemoryConfigStore::new();
        if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let products = decode(&contents)?;
            memory.replace_all(
                products
                    .into_iter()
                    .map(|(id, config)| (id, Arc::new(config)))
                    .collect(),
            );
            info!(
                target: "tryon::config",
                "loaded {} filter configurations from {}",
                memory.len(),
                path.display()
            );
        }
        Ok(Self { path, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &ConfigMap) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        let payload = encode(map)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, payload).map_err(io_err)?;
        fs::rename(&temp, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// Apply `update` to a copy of the entries, write it out, then publish it.
    fn commit(&self, update: impl FnOnce(&mut ConfigMap)) -> bool {
        let Ok(mut entries) = self.memory.entries.write() else {
            return false;
        };
        let mut next = entries.clone();
        update(&mut next);
        match self.persist(&next) {
            Ok(()) => {
                *entries = next;
                true
            }
            Err(err) => {
                warn!(target: "tryon::config", "{err}");
                false
            }
        }
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get(&self, product_id: &str) -> Option<Arc<ProductFilterConfig>> {
        self.memory.get(product_id)
    }

    fn save(&self, product_id: &str, config: ProductFilterConfig) -> bool {
        if !id_matches(product_id, &config) {
            return false;
        }
        self.commit(|map| {
            map.insert(product_id.to_string(), Arc::new(config));
        })
    }

    fn export(&self) -> Result<String, ConfigError> {
        self.memory.export()
    }

    fn import(&self, serialized: &str) -> bool {
        let products = match decode(serialized) {
            Ok(products) => products,
            Err(err) => {
                warn!(target: "tryon::config", "import rejected: {err}");
                return false;
            }
        };
        if products.iter().any(|(id, config)| !id_matches(id, config)) {
            return false;
        }
        self.commit(|map| {
            map.extend(products.into_iter().map(|(id, config)| (id, Arc::new(config))));
        })
    }
}

/// Get-or-derive access to product configurations.
#[derive(Debug)]
pub struct ProductConfigs<S> {
    store: S,
}

impl<S: ConfigStore> ProductConfigs<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the stored configuration, deriving and saving one on first use.
    pub fn config_for(&self, product: &Product) -> Result<Arc<ProductFilterConfig>, ConfigError> {
        if let Some(existing) = self.store.get(&product.id) {
            return Ok(existing);
        }

        let derived = ProductFilterConfig::derive(product);
        info!(
            target: "tryon::config",
            "derived '{}' filter for product '{}'",
            derived.locked_filter_type(),
            product.id
        );
        if !self.store.save(&product.id, derived.clone()) {
            return Err(ConfigError::SaveRejected {
                product_id: product.id.clone(),
            });
        }
        Ok(self.store.get(&product.id).unwrap_or_else(|| Arc::new(derived)))
    }
}
