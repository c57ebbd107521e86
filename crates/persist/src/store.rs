//! File-backed chunk persistence.
//!
//! Layout inside the store directory:
//! ```text
//! store.meta.json        - schema version and chunk count
//! chunks/
//!   <x>.<y>.chunk.cbor.zst - CBOR+zstd compressed chunk snapshots
//! integrity/
//!   manifest.json          - filename -> sha256 map
//! ```
//!
//! Uniform chunks are never written: regenerating them is cheaper than
//! reading them back, so saving one removes any stale file and loading a
//! never-written coordinate answers `None`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use gridfall_common::Catalog;
use gridfall_kernel::Chunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::snapshot::{ChunkSnapshot, SnapshotError};

/// Current snapshot schema version.
const CHUNK_SCHEMA_VERSION: u32 = 2;

/// Errors from file-backed persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {filename}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        filename: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: store has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Grid coordinate of a chunk in the world, the store's addressing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn filename(self) -> String {
        format!("{}.{}.chunk.cbor.zst", self.x, self.y)
    }
}

/// Metadata stored in store.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub chunk_schema_version: u32,
    pub chunk_count: u32,
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
}

/// Integrity manifest tracking the hash of every chunk file. Entries are
/// replaced when a chunk is re-saved; chunks overwrite in place, so there
/// is no hash chain to extend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

impl IntegrityManifest {
    fn upsert(&mut self, filename: &str, sha256: String) {
        match self.entries.iter_mut().find(|e| e.filename == filename) {
            Some(entry) => entry.sha256 = sha256,
            None => self.entries.push(ManifestEntry {
                filename: filename.to_owned(),
                sha256,
            }),
        }
    }

    fn drop_entry(&mut self, filename: &str) {
        self.entries.retain(|e| e.filename != filename);
    }

    fn find(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }
}

/// File-backed chunk store with schema versioning and integrity checking.
pub struct ChunkStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
}

impl ChunkStore {
    /// Open or create a chunk store at the given path. Fails closed on a
    /// schema version this build does not speak.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("chunks"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("store.meta.json");
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.chunk_schema_version != CHUNK_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.chunk_schema_version,
                    expected_version: CHUNK_SCHEMA_VERSION,
                });
            }
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = StoreMeta {
                chunk_schema_version: CHUNK_SCHEMA_VERSION,
                chunk_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Persist a chunk. Uniform chunks are skipped (and any stale file for
    /// the coordinate removed); returns whether a file was written.
    pub fn save(
        &mut self,
        coord: ChunkCoord,
        chunk: &Chunk,
        catalog: &Catalog,
    ) -> Result<bool, StoreError> {
        let filename = coord.filename();
        let path = self.root.join("chunks").join(&filename);

        if chunk.is_uniform() {
            tracing::debug!(x = coord.x, y = coord.y, "uniform chunk, skipping save");
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            self.manifest.drop_entry(&filename);
            self.sync_counts()?;
            return Ok(false);
        }

        let snapshot = ChunkSnapshot::capture(chunk, catalog)?;
        let cbor_bytes = cbor_serialize(&snapshot)?;
        let compressed = zstd_compress(&cbor_bytes)?;
        let hash = sha256_hex(&compressed);

        std::fs::write(&path, &compressed)?;
        self.manifest.upsert(&filename, hash);
        self.sync_counts()?;
        tracing::debug!(
            x = coord.x,
            y = coord.y,
            bytes = compressed.len(),
            "chunk saved"
        );
        Ok(true)
    }

    /// Load a chunk back, applying the legacy rubble/power fix-up when
    /// `legacy` is set. `None` means the coordinate was never written;
    /// the caller regenerates the uniform chunk instead.
    pub fn load(
        &self,
        coord: ChunkCoord,
        catalog: &Catalog,
        legacy: bool,
    ) -> Result<Option<Chunk>, StoreError> {
        let filename = coord.filename();
        let path = self.root.join("chunks").join(&filename);
        if !path.exists() {
            return Ok(None);
        }

        let compressed = std::fs::read(&path)?;
        self.verify_file_hash(&filename, &compressed)?;
        let cbor_bytes = zstd_decompress(&compressed)?;
        let snapshot: ChunkSnapshot = cbor_deserialize(&cbor_bytes)?;
        let chunk = snapshot.restore(catalog, legacy)?;
        tracing::debug!(x = coord.x, y = coord.y, legacy, "chunk loaded");
        Ok(Some(chunk))
    }

    /// Verify every manifest hash against the files on disk.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        for entry in &self.manifest.entries {
            let data = std::fs::read(self.root.join("chunks").join(&entry.filename))?;
            let actual = sha256_hex(&data);
            if actual != entry.sha256 {
                return Err(StoreError::IntegrityMismatch {
                    filename: entry.filename.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), StoreError> {
        let Some(entry) = self.manifest.find(filename) else {
            // A file the manifest has never seen is fine on first contact.
            return Ok(());
        };
        let actual = sha256_hex(data);
        if actual != entry.sha256 {
            return Err(StoreError::IntegrityMismatch {
                filename: filename.to_owned(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn sync_counts(&mut self) -> Result<(), StoreError> {
        self.meta.chunk_count = self.manifest.entries.len() as u32;
        serde_json::to_writer_pretty(
            std::fs::File::create(self.root.join("store.meta.json"))?,
            &self.meta,
        )?;
        serde_json::to_writer_pretty(
            std::fs::File::create(self.root.join("integrity").join("manifest.json"))?,
            &self.manifest,
        )?;
        Ok(())
    }
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridfall_common::{FurnitureDef, TerrainDef, TerrainId, TilePos};
    use gridfall_kernel::{Basecamp, Item, Vehicle};

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.terrain.register("dirt", TerrainDef::new("dirt", 2));
        catalog
            .furniture
            .register("crate", FurnitureDef::new("crate", 4));
        catalog
    }

    fn scarred_chunk(catalog: &Catalog) -> Chunk {
        let mut chunk = Chunk::new();
        let dirt = TerrainId(catalog.terrain.lookup("dirt").unwrap());
        chunk.set_terrain(TilePos::new(4, 4), dirt);
        chunk.add_item(TilePos::new(4, 4), Item::emissive("lamp"));
        chunk.set_graffiti(TilePos::new(0, 0), "dig here");
        chunk.add_vehicle(Vehicle::new("cart", TilePos::new(7, 7)));
        chunk.set_camp(Basecamp::named("forward camp"));
        chunk.set_temperature(8);
        chunk
    }

    #[test]
    fn open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(tmp.path().join("world")).unwrap();
        assert_eq!(store.meta().chunk_count, 0);
        assert!(store.root().join("chunks").is_dir());
        assert!(store.root().join("integrity").is_dir());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = test_catalog();
        let mut store = ChunkStore::open(tmp.path().join("world")).unwrap();
        let chunk = scarred_chunk(&catalog);

        assert!(store.save(ChunkCoord::new(3, -2), &chunk, &catalog).unwrap());

        // Reopen and load.
        let store2 = ChunkStore::open(tmp.path().join("world")).unwrap();
        let loaded = store2
            .load(ChunkCoord::new(3, -2), &catalog, false)
            .unwrap()
            .unwrap();
        assert_eq!(loaded, chunk);
        assert_eq!(store2.meta().chunk_count, 1);
    }

    #[test]
    fn uniform_chunk_is_skipped_and_scrubbed() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = test_catalog();
        let mut store = ChunkStore::open(tmp.path().join("world")).unwrap();
        let coord = ChunkCoord::new(0, 0);

        // Uniform from the start: nothing written, nothing loadable.
        assert!(!store.save(coord, &Chunk::new(), &catalog).unwrap());
        assert!(store.load(coord, &catalog, false).unwrap().is_none());

        // A real file replaced by a uniform save disappears again.
        let chunk = scarred_chunk(&catalog);
        assert!(store.save(coord, &chunk, &catalog).unwrap());
        assert!(store.load(coord, &catalog, false).unwrap().is_some());
        assert!(!store.save(coord, &Chunk::new(), &catalog).unwrap());
        assert!(store.load(coord, &catalog, false).unwrap().is_none());
        assert_eq!(store.meta().chunk_count, 0);
    }

    #[test]
    fn resave_replaces_manifest_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = test_catalog();
        let mut store = ChunkStore::open(tmp.path().join("world")).unwrap();
        let coord = ChunkCoord::new(1, 1);

        let mut chunk = scarred_chunk(&catalog);
        store.save(coord, &chunk, &catalog).unwrap();
        chunk.set_radiation(TilePos::new(2, 2), 40);
        store.save(coord, &chunk, &catalog).unwrap();

        assert_eq!(store.meta().chunk_count, 1);
        store.verify_integrity().unwrap();
        let loaded = store.load(coord, &catalog, false).unwrap().unwrap();
        assert_eq!(loaded.radiation(TilePos::new(2, 2)), 40);
    }

    #[test]
    fn corruption_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = test_catalog();
        let path = tmp.path().join("world");
        let mut store = ChunkStore::open(&path).unwrap();
        let coord = ChunkCoord::new(5, 5);
        store.save(coord, &scarred_chunk(&catalog), &catalog).unwrap();

        let file = path.join("chunks").join("5.5.chunk.cbor.zst");
        let mut data = std::fs::read(&file).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&file, &data).unwrap();

        let store2 = ChunkStore::open(&path).unwrap();
        assert!(store2.verify_integrity().is_err());
        assert!(matches!(
            store2.load(coord, &catalog, false),
            Err(StoreError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn garbage_bytes_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = test_catalog();
        let path = tmp.path().join("world");
        let store = ChunkStore::open(&path).unwrap();

        // A file the manifest never saw, full of junk: the zstd/CBOR layer
        // must reject it rather than conjure a default chunk.
        std::fs::write(path.join("chunks").join("9.9.chunk.cbor.zst"), b"junk").unwrap();
        assert!(store.load(ChunkCoord::new(9, 9), &catalog, false).is_err());
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world");
        let _store = ChunkStore::open(&path).unwrap();

        let meta_path = path.join("store.meta.json");
        let mut meta: StoreMeta =
            serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.chunk_schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match ChunkStore::open(&path) {
            Err(StoreError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, CHUNK_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
