//! Persisted notification settings

use nudge_api::{NotificationSettings, SETTINGS_KEY, SettingsPatch};
use nudge_store::{KeyValueStore, StoreError, StoreResult, get_json, set_json};
use nudge_util::MalformedTimeError;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Result of applying a settings update
#[derive(Debug)]
pub struct SettingsChange {
    pub previous: NotificationSettings,
    pub current: NotificationSettings,
    /// Set when the new value could not be written; memory still holds `current`
    pub storage_error: Option<StoreError>,
}

impl SettingsChange {
    /// The master switch went from off to on
    pub fn was_enabled(&self) -> bool {
        !self.previous.enabled && self.current.enabled
    }
}

/// Single source of truth for `NotificationSettings`
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<NotificationSettings>,
}

impl SettingsStore {
    /// Load settings, creating and persisting `defaults` on first run.
    ///
    /// A stored value that no longer decodes is replaced by `defaults`.
    pub fn load(store: Arc<dyn KeyValueStore>, defaults: &NotificationSettings) -> StoreResult<Self> {
        let current = match get_json::<NotificationSettings>(store.as_ref(), SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                info!("No stored notification settings, writing first-run defaults");
                set_json(store.as_ref(), SETTINGS_KEY, defaults)?;
                defaults.clone()
            }
            Err(StoreError::Serialization(e)) => {
                warn!(error = %e, "Stored notification settings unreadable, resetting to defaults");
                set_json(store.as_ref(), SETTINGS_KEY, defaults)?;
                defaults.clone()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            store,
            current: RwLock::new(current),
        })
    }

    /// Current settings
    pub fn get(&self) -> NotificationSettings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the stored value; returns the new settings if they differ
    pub fn reload(&self) -> StoreResult<Option<NotificationSettings>> {
        let Some(stored) = get_json::<NotificationSettings>(self.store.as_ref(), SETTINGS_KEY)? else {
            return Ok(None);
        };

        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *current == stored {
            return Ok(None);
        }
        *current = stored.clone();
        Ok(Some(stored))
    }

    /// Apply a partial update.
    ///
    /// A malformed time refuses the whole update and leaves settings untouched.
    /// Otherwise the new value replaces the in-memory one before it is written,
    /// so a storage failure is reported without rolling back.
    pub fn update(&self, patch: &SettingsPatch) -> Result<SettingsChange, MalformedTimeError> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let next = patch.apply(&current)?;
        let previous = std::mem::replace(&mut *current, next.clone());

        let storage_error = match set_json(self.store.as_ref(), SETTINGS_KEY, &next) {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Failed to persist notification settings");
                Some(e)
            }
        };

        Ok(SettingsChange {
            previous,
            current: next,
            storage_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_store::MemoryStore;
    use nudge_util::TimeOfDay;

    fn patch_enabled() -> SettingsPatch {
        SettingsPatch {
            enabled: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn first_run_persists_defaults() {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsStore::load(store.clone(), &NotificationSettings::default()).unwrap();

        assert_eq!(settings.get(), NotificationSettings::default());
        assert!(!settings.get().enabled);
        assert!(store.get(SETTINGS_KEY).unwrap().is_some());
    }

    #[test]
    fn load_reads_stored_value() {
        let store = Arc::new(MemoryStore::new());
        let stored = NotificationSettings {
            enabled: true,
            ..Default::default()
        };
        set_json(store.as_ref(), SETTINGS_KEY, &stored).unwrap();

        let settings = SettingsStore::load(store, &NotificationSettings::default()).unwrap();
        assert!(settings.get().enabled);
    }

    #[test]
    fn corrupt_value_resets_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set(SETTINGS_KEY, "{not json").unwrap();

        let settings = SettingsStore::load(store, &NotificationSettings::default()).unwrap();
        assert_eq!(settings.get(), NotificationSettings::default());
    }

    #[test]
    fn update_persists() {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsStore::load(store.clone(), &NotificationSettings::default()).unwrap();

        let change = settings.update(&patch_enabled()).unwrap();
        assert!(change.was_enabled());
        assert!(change.storage_error.is_none());

        let reloaded = SettingsStore::load(store, &NotificationSettings::default()).unwrap();
        assert!(reloaded.get().enabled);
    }

    #[test]
    fn reload_picks_up_external_writes() {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsStore::load(store.clone(), &NotificationSettings::default()).unwrap();
        assert!(settings.reload().unwrap().is_none());

        let other = SettingsStore::load(store, &NotificationSettings::default()).unwrap();
        other.update(&patch_enabled()).unwrap();

        let reloaded = settings.reload().unwrap().unwrap();
        assert!(reloaded.enabled);
        assert!(settings.get().enabled);
        assert!(settings.reload().unwrap().is_none());
    }

    #[test]
    fn malformed_time_refuses_whole_update() {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsStore::load(store, &NotificationSettings::default()).unwrap();

        let patch = SettingsPatch {
            enabled: Some(true),
            morning_time: Some("25:00".into()),
            ..Default::default()
        };
        assert!(settings.update(&patch).is_err());
        assert_eq!(settings.get(), NotificationSettings::default());
    }

    #[test]
    fn storage_failure_keeps_memory_value() {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsStore::load(store.clone(), &NotificationSettings::default()).unwrap();
        store.set_fail_writes(true);

        let patch = SettingsPatch {
            evening_time: Some("21:15".into()),
            ..Default::default()
        };
        let change = settings.update(&patch).unwrap();
        assert!(change.storage_error.is_some());
        assert_eq!(settings.get().evening_time, TimeOfDay::new(21, 15).unwrap());
    }
}
