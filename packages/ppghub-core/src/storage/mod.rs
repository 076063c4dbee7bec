//! Durable storage for the session slot.
//!
//! The whole session is kept in a single named slot. Storage priority:
//! 1. Platform keyring (if `keyring-storage` feature enabled and available)
//! 2. File-based storage under the user config directory

mod file;
#[cfg(feature = "keyring-storage")]
mod keychain;
mod memory;

pub use file::FileStorage;
pub(crate) use file::get_config_dir;
#[cfg(feature = "keyring-storage")]
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;

use anyhow::Result;

/// Name of the single slot holding the serialized session.
pub const SLOT_NAME: &str = "ppg-hub-auth";

/// Persistence port for the session slot.
///
/// Implementations store an opaque string; encoding is owned by the session
/// store. Only the store's mutators write through this port.
pub trait SessionStorage {
    /// Read the slot, `Ok(None)` when nothing was ever written.
    fn read_slot(&self) -> Result<Option<String>>;

    /// Replace the slot contents in full.
    fn write_slot(&self, contents: &str) -> Result<()>;

    /// Remove the slot entirely.
    fn clear_slot(&self) -> Result<()>;

    /// Human-readable description of where the slot lives.
    fn describe(&self) -> String;
}

impl<T: SessionStorage + ?Sized> SessionStorage for Box<T> {
    fn read_slot(&self) -> Result<Option<String>> {
        (**self).read_slot()
    }

    fn write_slot(&self, contents: &str) -> Result<()> {
        (**self).write_slot(contents)
    }

    fn clear_slot(&self) -> Result<()> {
        (**self).clear_slot()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Storage backend selected by the enabled features.
pub fn default_storage() -> Result<Box<dyn SessionStorage>> {
    let file = FileStorage::default_location()?;

    #[cfg(feature = "keyring-storage")]
    {
        Ok(Box::new(KeyringStorage::with_fallback(file)))
    }

    #[cfg(not(feature = "keyring-storage"))]
    {
        Ok(Box::new(file))
    }
}
