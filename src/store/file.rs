use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CustodyRecord, RecordStore, StoreError, VersionedRecord};
use crate::address::Address;

type Records = BTreeMap<String, VersionedRecord>;

/// Store backed by a single JSON file
///
/// Every write replaces the file through a rename, so a crash leaves either
/// the old or the new contents on disk. Writers within one process are
/// serialized; the file is not meant to be shared between processes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens (lazily) the store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Records, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Records::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &Records) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get(&self, address: &Address) -> Result<Option<VersionedRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&address.to_string()))
    }

    async fn put(&self, address: &Address, record: CustodyRecord) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let key = address.to_string();
        let version = records.get(&key).map_or(1, |current| current.version + 1);
        records.insert(key, VersionedRecord { version, record });
        self.save(&records).await?;
        tracing::debug!(%address, version, path = %self.path.display(), "custody record written");
        Ok(version)
    }

    async fn compare_and_swap(
        &self,
        address: &Address,
        expected_version: u64,
        record: CustodyRecord,
    ) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let key = address.to_string();
        let found = records.get(&key).map(|current| current.version);
        if found != Some(expected_version) {
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                found,
            });
        }

        let version = expected_version + 1;
        records.insert(key, VersionedRecord { version, record });
        self.save(&records).await?;
        tracing::debug!(%address, version, path = %self.path.display(), "custody record replaced");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::EncryptedPrivateKey;
    use crate::codec;
    use crate::domain::{ShareIndex, Threshold};

    fn record(address: Address, tag: u8) -> CustodyRecord {
        let share = codec::create_share(
            &[1, tag],
            Threshold::new(2).unwrap(),
            ShareIndex::new(0).unwrap(),
            [tag; 8],
        )
        .unwrap();
        CustodyRecord::new(
            address,
            &share,
            EncryptedPrivateKey::from_encoded(format!("blob-{tag}")),
        )
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custody.json");
        let address = Address::from_bytes([0x11; 20]);

        let store = FileStore::new(&path);
        store.put(&address, record(address, 1)).await.unwrap();
        store
            .compare_and_swap(&address, 1, record(address, 2))
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::new(&path);
        let loaded = reopened.get(&address).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.record, record(address, 2));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        let address = Address::from_bytes([0x22; 20]);
        assert!(store.get(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custody.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = FileStore::new(&path);
        let err = store
            .get(&Address::from_bytes([0x33; 20]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_stale_compare_and_swap_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("custody.json"));
        let address = Address::from_bytes([0x44; 20]);
        store.put(&address, record(address, 1)).await.unwrap();

        let err = store
            .compare_and_swap(&address, 7, record(address, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { .. }));
        assert_eq!(
            store.get(&address).await.unwrap().unwrap().record,
            record(address, 1)
        );
    }
}
