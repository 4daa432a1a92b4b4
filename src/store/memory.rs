use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CustodyRecord, RecordStore, StoreError, VersionedRecord};
use crate::address::Address;

/// In-process store; records vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Address, VersionedRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, address: &Address) -> Result<Option<VersionedRecord>, StoreError> {
        Ok(self.records.read().await.get(address).cloned())
    }

    async fn put(&self, address: &Address, record: CustodyRecord) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let version = records.get(address).map_or(1, |current| current.version + 1);
        records.insert(*address, VersionedRecord { version, record });
        Ok(version)
    }

    async fn compare_and_swap(
        &self,
        address: &Address,
        expected_version: u64,
        record: CustodyRecord,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let found = records.get(address).map(|current| current.version);
        if found != Some(expected_version) {
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                found,
            });
        }

        let version = expected_version + 1;
        records.insert(*address, VersionedRecord { version, record });
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::EncryptedPrivateKey;
    use crate::codec;
    use crate::domain::{ShareIndex, Threshold};

    fn record(tag: u8) -> CustodyRecord {
        let share = codec::create_share(
            &[1, tag],
            Threshold::new(2).unwrap(),
            ShareIndex::new(0).unwrap(),
            [tag; 8],
        )
        .unwrap();
        CustodyRecord::new(
            address(),
            &share,
            EncryptedPrivateKey::from_encoded(format!("blob-{tag}")),
        )
    }

    fn address() -> Address {
        Address::from_bytes([0xAA; 20])
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        assert!(store.get(&address()).await.unwrap().is_none());

        assert_eq!(store.put(&address(), record(1)).await.unwrap(), 1);
        let loaded = store.get(&address()).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.record, record(1));
    }

    #[tokio::test]
    async fn test_compare_and_swap_advances_version() {
        let store = MemoryStore::new();
        store.put(&address(), record(1)).await.unwrap();

        let version = store.compare_and_swap(&address(), 1, record(2)).await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(store.get(&address()).await.unwrap().unwrap().record, record(2));
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_version() {
        let store = MemoryStore::new();
        store.put(&address(), record(1)).await.unwrap();
        store.compare_and_swap(&address(), 1, record(2)).await.unwrap();

        let err = store
            .compare_and_swap(&address(), 1, record(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                expected: 1,
                found: Some(2)
            }
        ));
        assert_eq!(store.get(&address()).await.unwrap().unwrap().record, record(2));
    }

    #[tokio::test]
    async fn test_compare_and_swap_on_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .compare_and_swap(&address(), 1, record(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { found: None, .. }));
    }
}
