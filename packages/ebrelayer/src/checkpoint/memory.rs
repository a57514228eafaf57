//! In-memory checkpoint store for tests and database-less runs

use async_trait::async_trait;
use bridge_types::ProphecyId;
use eyre::Result;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore, PendingClaim};

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
    pending: RwLock<HashMap<String, BTreeMap<ProphecyId, PendingClaim>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a checkpoint, e.g. from a configured start height
    pub async fn with_checkpoint(self, chain: &str, checkpoint: Checkpoint) -> Self {
        self.checkpoints
            .write()
            .await
            .insert(chain.to_string(), checkpoint);
        self
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, chain: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(chain).copied())
    }

    async fn commit(&self, chain: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(chain.to_string(), *checkpoint);
        Ok(())
    }

    async fn save_pending(&self, chain: &str, pending: &PendingClaim) -> Result<()> {
        self.pending
            .write()
            .await
            .entry(chain.to_string())
            .or_default()
            .insert(pending.claim.prophecy_id, pending.clone());
        Ok(())
    }

    async fn remove_pending(&self, chain: &str, prophecy_id: &ProphecyId) -> Result<()> {
        if let Some(entries) = self.pending.write().await.get_mut(chain) {
            entries.remove(prophecy_id);
        }
        Ok(())
    }

    async fn load_pending(&self, chain: &str) -> Result<Vec<PendingClaim>> {
        Ok(self
            .pending
            .read()
            .await
            .get(chain)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, U256};
    use bridge_types::{EventKind, ProphecyClaimEvent};

    fn pending(id: u8) -> PendingClaim {
        PendingClaim::new(
            ProphecyClaimEvent {
                sender: Bytes::from(vec![1]),
                symbol: "ETH".into(),
                prophecy_id: ProphecyId::from([id; 32]),
                amount: U256::from(1u8),
                destination: Bytes::from(vec![2]),
                validator: "val".into(),
                token: Address::repeat_byte(3),
                kind: EventKind::LockOnEthereum,
            },
            "timeout",
        )
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.load("ethereum").await.unwrap(), None);

        let checkpoint = Checkpoint {
            height: 42,
            last_nonce: Some(U256::from(7u8)),
        };
        store.commit("ethereum", &checkpoint).await.unwrap();
        assert_eq!(store.load("ethereum").await.unwrap(), Some(checkpoint));
        assert_eq!(store.load("cosmos").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pending_replaced_by_prophecy_id() {
        let store = MemoryCheckpointStore::new();
        store.save_pending("ethereum", &pending(1)).await.unwrap();
        let mut again = pending(1);
        again.attempts = 2;
        store.save_pending("ethereum", &again).await.unwrap();
        store.save_pending("ethereum", &pending(2)).await.unwrap();

        let loaded = store.load_pending("ethereum").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].attempts, 2);

        store
            .remove_pending("ethereum", &ProphecyId::from([1; 32]))
            .await
            .unwrap();
        assert_eq!(store.load_pending("ethereum").await.unwrap().len(), 1);
    }
}
