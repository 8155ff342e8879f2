//! Collection store for specimens and reference minerals
//!
//! `CollectionStore` is the seam the backup service talks to. The JSON
//! implementation keeps both collections in memory behind `RwLock`s and
//! persists them with atomic writes; a transaction is an in-memory snapshot
//! that is either flushed on commit or restored on rollback.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::config::paths::MineralogPaths;
use crate::error::{MineralogError, MineralogResult};
use crate::models::{normalize_name, Mineral, MineralId, ReferenceMineral, ReferenceMineralId};

use super::file_io::{read_json, write_json_atomic};

/// Persistence operations needed by backup and interchange
pub trait CollectionStore: Send + Sync {
    /// All specimens, sorted by name
    fn all_minerals(&self) -> MineralogResult<Vec<Mineral>>;

    /// Batched lookup; unknown ids are omitted
    fn minerals_by_ids(&self, ids: &[MineralId]) -> MineralogResult<Vec<Mineral>>;

    /// Case-insensitive lookup by trimmed name
    fn find_by_name(&self, name: &str) -> MineralogResult<Option<Mineral>>;

    fn upsert_mineral(&self, mineral: Mineral) -> MineralogResult<()>;

    /// Remove every specimen, returning how many were removed
    fn delete_all_minerals(&self) -> MineralogResult<usize>;

    fn mineral_count(&self) -> MineralogResult<usize>;

    fn all_reference_minerals(&self) -> MineralogResult<Vec<ReferenceMineral>>;

    fn reference_minerals_by_ids(
        &self,
        ids: &[ReferenceMineralId],
    ) -> MineralogResult<Vec<ReferenceMineral>>;

    fn upsert_reference_mineral(&self, mineral: ReferenceMineral) -> MineralogResult<()>;

    fn delete_all_reference_minerals(&self) -> MineralogResult<usize>;

    /// Start a transaction; changes are invisible on disk until `commit`
    fn begin(&self) -> MineralogResult<()>;

    /// Persist the changes made since `begin`
    fn commit(&self) -> MineralogResult<()>;

    /// Discard the changes made since `begin`
    fn rollback(&self) -> MineralogResult<()>;

    /// Directory holding photo files referenced by `Photo::file_name`
    fn media_dir(&self) -> PathBuf;
}

/// Run `f` inside a transaction, rolling back on error
pub fn with_transaction<S, T, F>(store: &S, f: F) -> MineralogResult<T>
where
    S: CollectionStore + ?Sized,
    F: FnOnce(&S) -> MineralogResult<T>,
{
    store.begin()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(err) => {
            store.rollback()?;
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct MineralData {
    minerals: Vec<Mineral>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceData {
    reference_minerals: Vec<ReferenceMineral>,
}

struct Snapshot {
    minerals: HashMap<MineralId, Mineral>,
    references: HashMap<ReferenceMineralId, ReferenceMineral>,
}

/// JSON file implementation of [`CollectionStore`]
pub struct JsonCollectionStore {
    minerals_path: PathBuf,
    references_path: PathBuf,
    media_dir: PathBuf,
    minerals: RwLock<HashMap<MineralId, Mineral>>,
    references: RwLock<HashMap<ReferenceMineralId, ReferenceMineral>>,
    snapshot: Mutex<Option<Snapshot>>,
}

impl JsonCollectionStore {
    /// Create a store rooted at the configured data directory
    pub fn new(paths: &MineralogPaths) -> Self {
        Self {
            minerals_path: paths.minerals_file(),
            references_path: paths.reference_minerals_file(),
            media_dir: paths.media_dir(),
            minerals: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
            snapshot: Mutex::new(None),
        }
    }

    /// Create and load a store in one step
    pub fn open(paths: &MineralogPaths) -> MineralogResult<Self> {
        let store = Self::new(paths);
        store.load()?;
        Ok(store)
    }

    /// Load both collections from disk
    pub fn load(&self) -> MineralogResult<()> {
        let mineral_data: MineralData = read_json(&self.minerals_path)?;
        let reference_data: ReferenceData = read_json(&self.references_path)?;

        let mut minerals = self.write_minerals()?;
        minerals.clear();
        for mineral in mineral_data.minerals {
            minerals.insert(mineral.id, mineral);
        }

        let mut references = self.write_references()?;
        references.clear();
        for reference in reference_data.reference_minerals {
            references.insert(reference.id.clone(), reference);
        }

        debug!(
            minerals = minerals.len(),
            references = references.len(),
            "Loaded collection"
        );
        Ok(())
    }

    /// Save both collections to disk
    pub fn save(&self) -> MineralogResult<()> {
        let mut minerals: Vec<Mineral> = self.read_minerals()?.values().cloned().collect();
        minerals.sort_by(|a, b| a.name_key().cmp(&b.name_key()).then(a.id.cmp(&b.id)));
        write_json_atomic(&self.minerals_path, &MineralData { minerals })?;

        let mut reference_minerals: Vec<ReferenceMineral> =
            self.read_references()?.values().cloned().collect();
        reference_minerals.sort_by(|a, b| a.id.cmp(&b.id));
        write_json_atomic(&self.references_path, &ReferenceData { reference_minerals })
    }

    fn read_minerals(&self) -> MineralogResult<RwLockReadGuard<'_, HashMap<MineralId, Mineral>>> {
        self.minerals.read().map_err(|e| {
            MineralogError::Storage(format!("Failed to acquire read lock: {}", e))
        })
    }

    fn write_minerals(
        &self,
    ) -> MineralogResult<RwLockWriteGuard<'_, HashMap<MineralId, Mineral>>> {
        self.minerals.write().map_err(|e| {
            MineralogError::Storage(format!("Failed to acquire write lock: {}", e))
        })
    }

    fn read_references(
        &self,
    ) -> MineralogResult<RwLockReadGuard<'_, HashMap<ReferenceMineralId, ReferenceMineral>>> {
        self.references.read().map_err(|e| {
            MineralogError::Storage(format!("Failed to acquire read lock: {}", e))
        })
    }

    fn write_references(
        &self,
    ) -> MineralogResult<RwLockWriteGuard<'_, HashMap<ReferenceMineralId, ReferenceMineral>>> {
        self.references.write().map_err(|e| {
            MineralogError::Storage(format!("Failed to acquire write lock: {}", e))
        })
    }

    fn in_transaction(&self) -> MineralogResult<bool> {
        let snapshot = self
            .snapshot
            .lock()
            .map_err(|e| MineralogError::Storage(format!("Failed to acquire lock: {}", e)))?;
        Ok(snapshot.is_some())
    }

    /// Writes outside a transaction go straight to disk
    fn autosave(&self) -> MineralogResult<()> {
        if self.in_transaction()? {
            Ok(())
        } else {
            self.save()
        }
    }
}

impl CollectionStore for JsonCollectionStore {
    fn all_minerals(&self) -> MineralogResult<Vec<Mineral>> {
        let mut minerals: Vec<Mineral> = self.read_minerals()?.values().cloned().collect();
        minerals.sort_by(|a, b| a.name_key().cmp(&b.name_key()).then(a.id.cmp(&b.id)));
        Ok(minerals)
    }

    fn minerals_by_ids(&self, ids: &[MineralId]) -> MineralogResult<Vec<Mineral>> {
        let data = self.read_minerals()?;
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    fn find_by_name(&self, name: &str) -> MineralogResult<Option<Mineral>> {
        let key = normalize_name(name);
        let data = self.read_minerals()?;
        Ok(data.values().find(|m| m.name_key() == key).cloned())
    }

    fn upsert_mineral(&self, mineral: Mineral) -> MineralogResult<()> {
        self.write_minerals()?.insert(mineral.id, mineral);
        self.autosave()
    }

    fn delete_all_minerals(&self) -> MineralogResult<usize> {
        let removed = {
            let mut data = self.write_minerals()?;
            let count = data.len();
            data.clear();
            count
        };
        self.autosave()?;
        Ok(removed)
    }

    fn mineral_count(&self) -> MineralogResult<usize> {
        Ok(self.read_minerals()?.len())
    }

    fn all_reference_minerals(&self) -> MineralogResult<Vec<ReferenceMineral>> {
        let mut references: Vec<ReferenceMineral> =
            self.read_references()?.values().cloned().collect();
        references.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(references)
    }

    fn reference_minerals_by_ids(
        &self,
        ids: &[ReferenceMineralId],
    ) -> MineralogResult<Vec<ReferenceMineral>> {
        let data = self.read_references()?;
        Ok(ids.iter().filter_map(|id| data.get(id).cloned()).collect())
    }

    fn upsert_reference_mineral(&self, mineral: ReferenceMineral) -> MineralogResult<()> {
        self.write_references()?.insert(mineral.id.clone(), mineral);
        self.autosave()
    }

    fn delete_all_reference_minerals(&self) -> MineralogResult<usize> {
        let removed = {
            let mut data = self.write_references()?;
            let count = data.len();
            data.clear();
            count
        };
        self.autosave()?;
        Ok(removed)
    }

    fn begin(&self) -> MineralogResult<()> {
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|e| MineralogError::Storage(format!("Failed to acquire lock: {}", e)))?;

        if snapshot.is_some() {
            return Err(MineralogError::Storage(
                "A transaction is already in progress".to_string(),
            ));
        }

        *snapshot = Some(Snapshot {
            minerals: self.read_minerals()?.clone(),
            references: self.read_references()?.clone(),
        });
        Ok(())
    }

    fn commit(&self) -> MineralogResult<()> {
        let taken = self
            .snapshot
            .lock()
            .map_err(|e| MineralogError::Storage(format!("Failed to acquire lock: {}", e)))?
            .take();

        let Some(snapshot) = taken else {
            return Err(MineralogError::Storage(
                "No transaction in progress".to_string(),
            ));
        };

        if let Err(err) = self.save() {
            // Keep memory consistent with what is still on disk
            *self.write_minerals()? = snapshot.minerals;
            *self.write_references()? = snapshot.references;
            return Err(err);
        }
        Ok(())
    }

    fn rollback(&self) -> MineralogResult<()> {
        let taken = self
            .snapshot
            .lock()
            .map_err(|e| MineralogError::Storage(format!("Failed to acquire lock: {}", e)))?
            .take();

        if let Some(snapshot) = taken {
            *self.write_minerals()? = snapshot.minerals;
            *self.write_references()? = snapshot.references;
            debug!("Rolled back collection transaction");
        }
        Ok(())
    }

    fn media_dir(&self) -> PathBuf {
        self.media_dir.clone()
    }
}
