//! Named profiles, their personal data and the persisted active-profile
//! pointer.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, StoreError, ValidationError};
use crate::paths::{self, ACTIVE_PROFILE_FILE, profile_file};
use crate::persistence::Storage;
use crate::store::FileStore;

/// Contents of `profile_{name}.json`.
///
/// The core never interprets these fields. Unknown keys survive a read and
/// write unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalData {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Accept `"30"`, `30` or `null` for the text fields; older files stored
/// numbers for height, weight and age.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl PersonalData {
    pub fn read<S: FileStore + ?Sized>(store: &S, profile: &str) -> Result<Option<Self>, StoreError> {
        let name = profile_file(profile);
        let Some(bytes) = store.read(&name)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::parse(store.path_of(&name), e))
    }

    pub fn write<S: FileStore + ?Sized>(&self, store: &S, profile: &str) -> Result<(), StoreError> {
        let name = profile_file(profile);
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| StoreError::parse(store.path_of(&name), e))?;
        store.write(&name, &json)
    }
}

/// Which profile is selected, stored in `active_profile.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveProfilePointer {
    pub active_profile: String,
}

impl ActiveProfilePointer {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            active_profile: profile.into(),
        }
    }

    pub fn read<S: FileStore + ?Sized>(store: &S) -> Result<Option<Self>, StoreError> {
        let Some(bytes) = store.read(ACTIVE_PROFILE_FILE)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::parse(store.path_of(ACTIVE_PROFILE_FILE), e))
    }

    pub fn write<S: FileStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::parse(store.path_of(ACTIVE_PROFILE_FILE), e))?;
        store.write(ACTIVE_PROFILE_FILE, &json)
    }
}

/// Creates, lists, renames and deletes profiles and tracks the active one.
///
/// Every operation checks its preconditions before touching any file. The
/// registry does not look at unsaved ledger edits; callers decide whether to
/// save before switching.
#[derive(Debug)]
pub struct ProfileRegistry<S> {
    storage: Storage<S>,
    active: Option<ActiveProfilePointer>,
}

impl<S: FileStore> ProfileRegistry<S> {
    /// Read the active-profile pointer. A pointer that is unreadable or names
    /// a profile that no longer exists is ignored.
    pub fn open(storage: Storage<S>) -> Self {
        let active = match ActiveProfilePointer::read(storage.store()) {
            Ok(Some(pointer)) if storage.store().exists(&profile_file(&pointer.active_profile)) => {
                Some(pointer)
            }
            Ok(Some(pointer)) => {
                log::warn!(
                    "Active profile {:?} no longer exists",
                    pointer.active_profile
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Ignoring active profile pointer: {e}");
                None
            }
        };
        Self { storage, active }
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    pub fn active_profile(&self) -> Option<&str> {
        self.active.as_ref().map(|p| p.active_profile.as_str())
    }

    /// All profile names, sorted.
    pub fn list_profiles(&self) -> Result<Vec<String>, StoreError> {
        self.storage.profile_names()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.storage.store().exists(&profile_file(name))
    }

    /// Create an empty profile and make it active.
    pub fn create_profile(&mut self, name: &str) -> Result<(), ProfileError> {
        self.check_new_name(name)?;
        PersonalData::default().write(self.storage.store(), name)?;
        log::info!("Created profile {name}");
        self.set_active(name)?;
        Ok(())
    }

    /// Make `name` the active profile and persist the choice.
    pub fn switch_profile<'a>(&mut self, name: &'a str) -> Result<&'a str, ProfileError> {
        self.check_exists(name)?;
        self.set_active(name)?;
        log::info!("Switched to profile {name}");
        Ok(name)
    }

    /// Remove a profile's personal data and every one of its ledgers.
    /// Returns the number of ledger files removed.
    pub fn delete_profile(&mut self, name: &str) -> Result<usize, ProfileError> {
        if self.active_profile() == Some(name) {
            return Err(ProfileError::CannotDeleteActiveProfile(name.to_string()));
        }
        self.check_exists(name)?;
        let ledgers = self.storage.ledger_files(name)?;
        for (file, _) in &ledgers {
            self.storage.store().remove(file)?;
        }
        self.storage.store().remove(&profile_file(name))?;
        log::info!("Deleted profile {name} and {} ledgers", ledgers.len());
        Ok(ledgers.len())
    }

    /// Rename every file of `old` to use `new`. Contents are moved, not
    /// rewritten. Follows the active pointer if `old` was active.
    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<(), ProfileError> {
        self.check_exists(old)?;
        self.check_new_name(new)?;
        let ledgers = self.storage.ledger_files(old)?;
        let others: Vec<String> = self
            .list_profiles()?
            .into_iter()
            .filter(|p| p != old)
            .collect();
        let store = self.storage.store();
        for (_, exercise) in &ledgers {
            let target = paths::ledger_file(new, exercise);
            if let Some(owner) = paths::claimed_by_other(new, exercise, &others) {
                return Err(ValidationError::NameClash {
                    file: target,
                    owner: owner.to_string(),
                }
                .into());
            }
            if store.exists(&target) {
                return Err(ProfileError::DuplicateProfile(new.to_string()));
            }
        }
        for (file, exercise) in &ledgers {
            store.rename(file, &paths::ledger_file(new, exercise))?;
        }
        store.rename(&profile_file(old), &profile_file(new))?;
        log::info!("Renamed profile {old} to {new}");
        if self.active_profile() == Some(old) {
            // `old` is gone from disk, so follow the rename in memory even
            // when the pointer file cannot be written
            let pointer = ActiveProfilePointer::new(new);
            let written = pointer.write(self.storage.store());
            self.active = Some(pointer);
            written?;
        }
        Ok(())
    }

    pub fn personal_data(&self, name: &str) -> Result<PersonalData, ProfileError> {
        PersonalData::read(self.storage.store(), name)?
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
    }

    pub fn save_personal_data(&self, name: &str, data: &PersonalData) -> Result<(), ProfileError> {
        self.check_exists(name)?;
        data.write(self.storage.store(), name)?;
        Ok(())
    }

    fn set_active(&mut self, name: &str) -> Result<(), StoreError> {
        let pointer = ActiveProfilePointer::new(name);
        pointer.write(self.storage.store())?;
        self.active = Some(pointer);
        Ok(())
    }

    fn check_exists(&self, name: &str) -> Result<(), ProfileError> {
        if self.exists(name) {
            Ok(())
        } else {
            Err(ProfileError::UnknownProfile(name.to_string()))
        }
    }

    /// A new name must be valid, unused, and must not already match ledger
    /// files that belong to another profile (`A` owning `exercise_A_B_x.json`
    /// blocks creating `A_B`).
    fn check_new_name(&self, name: &str) -> Result<(), ProfileError> {
        if !paths::is_valid_profile_name(name) {
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        if self.list_profiles()?.iter().any(|p| p == name)
            || !self.storage.ledger_files(name)?.is_empty()
        {
            return Err(ProfileError::DuplicateProfile(name.to_string()));
        }
        Ok(())
    }
}
