use super::SessionStorage;
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

/// In-memory slot. Clones share the same slot, so a store reopened on a
/// clone sees what the previous store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw contents.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn read_slot(&self) -> Result<Option<String>> {
        let slot = self.slot.lock().map_err(|_| anyhow!("memory slot poisoned"))?;
        Ok(slot.clone())
    }

    fn write_slot(&self, contents: &str) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("memory slot poisoned"))?;
        *slot = Some(contents.to_string());
        Ok(())
    }

    fn clear_slot(&self) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("memory slot poisoned"))?;
        *slot = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "In-memory storage (not persisted)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_slot() {
        let a = MemoryStorage::new();
        let b = a.clone();
        assert_eq!(a.read_slot().unwrap(), None);

        a.write_slot("hello").unwrap();
        assert_eq!(b.read_slot().unwrap().as_deref(), Some("hello"));

        b.clear_slot().unwrap();
        assert_eq!(a.read_slot().unwrap(), None);
    }
}
