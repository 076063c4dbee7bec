use super::{FileStorage, SLOT_NAME, SessionStorage};
use anyhow::{Context, Result};
use keyring::Entry;

/// Service name used for keyring storage
const KEYRING_SERVICE: &str = "ppg-hub";

/// The keyring operations the slot logic needs.
trait Credential {
    fn get(&self) -> keyring::Result<String>;
    fn set(&self, secret: &str) -> keyring::Result<()>;
    fn delete(&self) -> keyring::Result<()>;
}

impl Credential for Entry {
    fn get(&self) -> keyring::Result<String> {
        self.get_password()
    }

    fn set(&self, secret: &str) -> keyring::Result<()> {
        self.set_password(secret)
    }

    fn delete(&self) -> keyring::Result<()> {
        self.delete_credential()
    }
}

/// Session slot kept in the platform keyring, with a file slot as fallback
/// and backup.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    fallback: FileStorage,
}

impl KeyringStorage {
    pub fn with_fallback(fallback: FileStorage) -> Self {
        Self { fallback }
    }

    fn entry(&self) -> Result<Entry> {
        tracing::trace!(
            "Creating keyring entry for service='{}', user='{}'",
            KEYRING_SERVICE,
            SLOT_NAME
        );

        match Entry::new(KEYRING_SERVICE, SLOT_NAME) {
            Ok(entry) => Ok(entry),
            Err(e) => {
                tracing::error!(
                    "Failed to create keyring entry (service='{}', user='{}'): {}",
                    KEYRING_SERVICE,
                    SLOT_NAME,
                    e
                );
                Err(anyhow::anyhow!("Failed to create keyring entry: {}", e))
            }
        }
    }
}

impl SessionStorage for KeyringStorage {
    fn read_slot(&self) -> Result<Option<String>> {
        match self.entry() {
            Ok(entry) => read_from(&entry, &self.fallback),
            Err(e) => {
                tracing::warn!(
                    "Failed to create keyring entry for reading: {}, trying file fallback",
                    e
                );
                self.fallback.read_slot()
            }
        }
    }

    fn write_slot(&self, contents: &str) -> Result<()> {
        match self.entry() {
            Ok(entry) => write_to(&entry, &self.fallback, contents),
            Err(e) => {
                tracing::warn!(
                    "Failed to create keyring entry for saving: {}, using file storage",
                    e
                );
                self.fallback.write_slot(contents)
            }
        }
    }

    fn clear_slot(&self) -> Result<()> {
        self.fallback.clear_slot()?;
        clear_from(&self.entry()?)
    }

    fn describe(&self) -> String {
        #[cfg(target_os = "windows")]
        let backend = "Windows Credential Manager";
        #[cfg(target_os = "macos")]
        let backend = "macOS Keychain";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let backend = "Linux Secret Service (GNOME Keyring/KWallet)";

        format!(
            "{} (with file fallback: {})",
            backend,
            self.fallback.path().display()
        )
    }
}

fn read_from(credential: &impl Credential, fallback: &FileStorage) -> Result<Option<String>> {
    match credential.get() {
        Ok(contents) => {
            tracing::debug!("Session slot loaded from keyring");
            Ok(Some(contents))
        }
        Err(keyring::Error::NoEntry) => {
            tracing::debug!("No session in keyring, trying file fallback");
            fallback.read_slot()
        }
        Err(e) => {
            tracing::warn!(
                "Failed to load session from keyring: {}, trying file fallback",
                e
            );
            fallback.read_slot()
        }
    }
}

/// Write the keyring copy and the file backup.
///
/// Reads prefer the keyring, so whenever the keyring cannot hold `contents`
/// its old copy is removed and the file slot becomes the one that is read.
fn write_to(credential: &impl Credential, fallback: &FileStorage, contents: &str) -> Result<()> {
    if let Err(e) = credential.set(contents) {
        tracing::warn!("Failed to save session to keyring: {}, using file storage", e);
        discard(credential);
        return fallback.write_slot(contents);
    }

    // Read back: some secret-service backends accept writes they drop.
    match credential.get() {
        Ok(stored) if stored == contents => {
            tracing::debug!("Session verified in keyring after save");
        }
        Ok(_) => {
            tracing::warn!("Session mismatch after save, removing keyring copy");
            discard(credential);
        }
        Err(keyring::Error::NoEntry) => {
            tracing::warn!("Session not found after save, falling back to file storage");
        }
        Err(e) => {
            tracing::warn!("Could not verify session after save: {}", e);
        }
    }

    // Keep the file slot in step so a later keyring outage reads current data.
    fallback
        .write_slot(contents)
        .context("Failed to write backup session file")
}

fn clear_from(credential: &impl Credential) -> Result<()> {
    match credential.delete() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to delete session from keyring: {}",
            e
        )),
    }
}

fn discard(credential: &impl Credential) {
    if let Err(e) = clear_from(credential) {
        tracing::error!("Stale session may remain in keyring: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionStore, UserIdentity};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Keyring double: holds one secret and can refuse or drop writes.
    #[derive(Default)]
    struct FakeCredential {
        secret: Mutex<Option<String>>,
        reject_writes: Mutex<bool>,
        drop_writes: Mutex<bool>,
    }

    impl Credential for FakeCredential {
        fn get(&self) -> keyring::Result<String> {
            self.secret.lock().unwrap().clone().ok_or(keyring::Error::NoEntry)
        }

        fn set(&self, secret: &str) -> keyring::Result<()> {
            if *self.reject_writes.lock().unwrap() {
                return Err(keyring::Error::NoStorageAccess("locked".into()));
            }
            if !*self.drop_writes.lock().unwrap() {
                *self.secret.lock().unwrap() = Some(secret.to_string());
            }
            Ok(())
        }

        fn delete(&self) -> keyring::Result<()> {
            self.secret.lock().unwrap().take().map(|_| ()).ok_or(keyring::Error::NoEntry)
        }
    }

    /// [`KeyringStorage`] with the platform keyring swapped for a double.
    struct FakeKeyringStorage<'a> {
        credential: &'a FakeCredential,
        fallback: FileStorage,
    }

    impl SessionStorage for FakeKeyringStorage<'_> {
        fn read_slot(&self) -> Result<Option<String>> {
            read_from(self.credential, &self.fallback)
        }

        fn write_slot(&self, contents: &str) -> Result<()> {
            write_to(self.credential, &self.fallback, contents)
        }

        fn clear_slot(&self) -> Result<()> {
            self.fallback.clear_slot()?;
            clear_from(self.credential)
        }

        fn describe(&self) -> String {
            "fake keyring".to_string()
        }
    }

    fn ana() -> UserIdentity {
        UserIdentity {
            id: 7,
            display_name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            roles: BTreeSet::new(),
        }
    }

    #[test]
    fn test_write_keeps_keyring_and_file_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = FileStorage::new(dir.path().join(".session"));
        let credential = FakeCredential::default();

        write_to(&credential, &fallback, "A").unwrap();

        assert_eq!(credential.get().unwrap(), "A");
        assert_eq!(fallback.read_slot().unwrap().as_deref(), Some("A"));
        assert_eq!(read_from(&credential, &fallback).unwrap().as_deref(), Some("A"));
    }

    #[test]
    fn test_rejected_write_removes_stale_keyring_copy() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = FileStorage::new(dir.path().join(".session"));
        let credential = FakeCredential::default();

        write_to(&credential, &fallback, "A").unwrap();
        *credential.reject_writes.lock().unwrap() = true;
        write_to(&credential, &fallback, "B").unwrap();

        assert!(matches!(credential.get(), Err(keyring::Error::NoEntry)));
        assert_eq!(read_from(&credential, &fallback).unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn test_dropped_write_removes_stale_keyring_copy() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = FileStorage::new(dir.path().join(".session"));
        let credential = FakeCredential::default();

        write_to(&credential, &fallback, "A").unwrap();
        *credential.drop_writes.lock().unwrap() = true;
        write_to(&credential, &fallback, "B").unwrap();

        assert_eq!(read_from(&credential, &fallback).unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn test_logout_during_keyring_fault_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".session");
        let credential = FakeCredential::default();
        let storage = || FakeKeyringStorage {
            credential: &credential,
            fallback: FileStorage::new(&path),
        };

        let mut store = SessionStore::open(storage());
        store.login("acc1", "ref1", ana()).unwrap();
        *credential.reject_writes.lock().unwrap() = true;
        store.logout();
        drop(store);

        let restarted = SessionStore::open(storage());
        assert!(!restarted.is_authenticated());
        assert_eq!(restarted.access_token(), None);
    }

    #[test]
    fn test_clear_tolerates_missing_entry() {
        let credential = FakeCredential::default();
        clear_from(&credential).unwrap();

        *credential.secret.lock().unwrap() = Some("A".to_string());
        clear_from(&credential).unwrap();
        assert!(matches!(credential.get(), Err(keyring::Error::NoEntry)));
    }
}
