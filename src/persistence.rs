//! Reading and writing ledger files, plus the one-time move from the
//! unscoped legacy layout to per-profile files.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};
use crate::ledger::Ledger;
use crate::paths::{
    self, ACTIVE_PROFILE_FILE, LEGACY_PROFILE_FILE, exercise_from_file, ledger_file,
    legacy_exercise_from_file, profile_file, profile_from_file,
};
use crate::profiles::{ActiveProfilePointer, PersonalData};
use crate::record::Record;
use crate::store::FileStore;

#[derive(Serialize)]
struct LedgerFileRef<'a> {
    rows: &'a [Record],
}

#[derive(Deserialize)]
struct LedgerFile {
    rows: Vec<Record>,
}

/// Outcome of [`Storage::save_all`].
#[derive(Debug, Default)]
pub struct SaveAllReport {
    pub saved: Vec<String>,
    pub failed: Vec<(String, StoreError)>,
}

impl SaveAllReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What [`Storage::migrate_legacy_if_needed`] carried over.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub profile: String,
    pub ledgers: Vec<String>,
    pub personal_data: bool,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty() && !self.personal_data
    }
}

/// The persistence layer. Owns the file store and knows the on-disk layout.
#[derive(Debug, Clone)]
pub struct Storage<S> {
    store: S,
    max_undo: usize,
}

impl<S: FileStore> Storage<S> {
    pub fn new(store: S, max_undo: usize) -> Self {
        Self { store, max_undo }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Reject names that cannot be stored as `exercise_{profile}_{exercise}`
    /// or whose file would belong to a longer existing profile (`B` saving
    /// `C_Squat` while `B_C` exists).
    pub fn check_ledger_name(&self, profile: &str, exercise: &str) -> Result<(), StoreError> {
        if !paths::is_valid_profile_name(profile) {
            return Err(ValidationError::InvalidName(profile.to_string()).into());
        }
        if !paths::is_valid_exercise_name(exercise) {
            return Err(ValidationError::InvalidName(exercise.to_string()).into());
        }
        let known = self.profile_names()?;
        if let Some(owner) = paths::claimed_by_other(profile, exercise, &known) {
            return Err(ValidationError::NameClash {
                file: ledger_file(profile, exercise),
                owner: owner.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Write the ledger's rows and clear its unsaved-changes flag.
    ///
    /// On failure nothing in the ledger changes, so it stays dirty.
    pub fn save(&self, ledger: &mut Ledger) -> Result<(), StoreError> {
        self.check_ledger_name(ledger.profile(), ledger.exercise())?;
        let name = ledger_file(ledger.profile(), ledger.exercise());
        let json = serde_json::to_vec_pretty(&LedgerFileRef {
            rows: ledger.records(),
        })
        .map_err(|e| StoreError::parse(self.store.path_of(&name), e))?;
        if let Err(e) = self.store.write(&name, &json) {
            log::error!("Failed to save {}: {e}", ledger.exercise());
            return Err(e);
        }
        ledger.mark_saved();
        log::info!(
            "Saved {} rows to {}",
            ledger.len(),
            self.store.path_of(&name).display()
        );
        Ok(())
    }

    /// Save every ledger of `profile` that has unsaved changes. A failure on
    /// one ledger does not stop the others.
    pub fn save_all(&self, profile: &str, ledgers: &mut [Ledger]) -> SaveAllReport {
        let mut report = SaveAllReport::default();
        for ledger in ledgers
            .iter_mut()
            .filter(|l| l.profile() == profile && l.has_unsaved_changes())
        {
            let exercise = ledger.exercise().to_string();
            match self.save(ledger) {
                Ok(()) => report.saved.push(exercise),
                Err(e) => report.failed.push((exercise, e)),
            }
        }
        report
    }

    /// Stored rows, `Ok(None)` when the ledger was never saved.
    pub fn read_rows(
        &self,
        profile: &str,
        exercise: &str,
    ) -> Result<Option<Vec<Record>>, StoreError> {
        self.check_ledger_name(profile, exercise)?;
        let name = ledger_file(profile, exercise);
        let Some(bytes) = self.store.read(&name)? else {
            return Ok(None);
        };
        let file: LedgerFile = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::parse(self.store.path_of(&name), e))?;
        Ok(Some(file.rows))
    }

    /// Load a ledger, failing if the file exists but cannot be read.
    /// A missing file yields an empty ledger.
    pub fn try_load(&self, profile: &str, exercise: &str) -> Result<Ledger, StoreError> {
        let rows = self.read_rows(profile, exercise)?.unwrap_or_default();
        Ok(Ledger::with_records(profile, exercise, rows, self.max_undo))
    }

    /// Load a ledger, falling back to an empty one when the file is
    /// unreadable. The error, if any, is handed back for display.
    pub fn load(&self, profile: &str, exercise: &str) -> (Ledger, Option<StoreError>) {
        match self.try_load(profile, exercise) {
            Ok(ledger) => (ledger, None),
            Err(e) => {
                log::warn!("Starting {profile}/{exercise} empty: {e}");
                (
                    Ledger::with_records(profile, exercise, Vec::new(), self.max_undo),
                    Some(e),
                )
            }
        }
    }

    /// Names of every profile with a personal-data file, sorted.
    pub fn profile_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .store
            .list()?
            .iter()
            .filter_map(|f| profile_from_file(f))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    /// `(file name, exercise)` of every ledger owned by `profile`.
    pub fn ledger_files(&self, profile: &str) -> Result<Vec<(String, String)>, StoreError> {
        let files = self.store.list()?;
        let known: Vec<String> = files
            .iter()
            .filter_map(|f| profile_from_file(f))
            .map(str::to_string)
            .collect();
        let mut owned: Vec<(String, String)> = files
            .iter()
            .filter_map(|f| {
                exercise_from_file(f, profile, &known).map(|ex| (f.clone(), ex.to_string()))
            })
            .collect();
        owned.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(owned)
    }

    /// Exercises with a saved ledger for `profile`, sorted.
    pub fn list_exercises(&self, profile: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .ledger_files(profile)?
            .into_iter()
            .map(|(_, exercise)| exercise)
            .collect())
    }

    /// Copy pre-profile data into `default_profile`'s files.
    ///
    /// Legacy exercise files are copied only while the default profile has no
    /// ledgers of its own, and personal data only while it has no personal
    /// data file, so running this again is a no-op. Legacy files are never
    /// removed.
    pub fn migrate_legacy_if_needed(
        &self,
        default_profile: &str,
    ) -> Result<MigrationReport, StoreError> {
        let mut report = MigrationReport {
            profile: default_profile.to_string(),
            ..Default::default()
        };
        if !paths::is_valid_profile_name(default_profile) {
            log::warn!("Skipping migration, {default_profile:?} is not a valid profile name");
            return Ok(report);
        }

        if self.ledger_files(default_profile)?.is_empty() {
            let known = self.profile_names()?;
            let mut legacy: Vec<(String, String)> = self
                .store
                .list()?
                .into_iter()
                .filter_map(|f| {
                    let exercise = legacy_exercise_from_file(&f, &known)?.to_string();
                    Some((f, exercise))
                })
                .collect();
            legacy.sort();
            for (file, exercise) in legacy {
                self.store
                    .copy(&file, &ledger_file(default_profile, &exercise))?;
                log::info!("Migrated legacy ledger {file} to profile {default_profile}");
                report.ledgers.push(exercise);
            }
        }

        let personal = profile_file(default_profile);
        if !self.store.exists(&personal) {
            if let Some(bytes) = self.store.read(LEGACY_PROFILE_FILE)? {
                if legacy_profile_has_data(&bytes) {
                    self.store.write(&personal, &bytes)?;
                    report.personal_data = true;
                    log::info!("Migrated {LEGACY_PROFILE_FILE} to {personal}");
                }
            }
            if !report.personal_data && !report.ledgers.is_empty() {
                PersonalData::default().write(&self.store, default_profile)?;
            }
        }

        if !report.is_empty() && !self.store.exists(ACTIVE_PROFILE_FILE) {
            ActiveProfilePointer::new(default_profile).write(&self.store)?;
        }
        Ok(report)
    }
}

fn legacy_profile_has_data(bytes: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(bytes) {
        Ok(map) => map.values().any(|v| match v {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            _ => true,
        }),
        Err(e) => {
            log::warn!("Ignoring unreadable {LEGACY_PROFILE_FILE}: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WeightUnit;
    use crate::store::DirStore;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn storage() -> (tempfile::TempDir, Storage<DirStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        (dir, Storage::new(store, 5))
    }

    fn record(sets: u32, weight: f64) -> Record {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        Record::new(sets, 10, 8, weight, WeightUnit::Kg, date).unwrap()
    }

    /// In-memory store whose writes can be switched off, either entirely or
    /// for a single file.
    #[derive(Default)]
    struct FlakyStore {
        files: RefCell<BTreeMap<String, Vec<u8>>>,
        fail_writes: bool,
        fail_file: Option<String>,
    }

    impl FileStore for FlakyStore {
        fn path_of(&self, name: &str) -> PathBuf {
            PathBuf::from(name)
        }

        fn list(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.files.borrow().keys().cloned().collect())
        }

        fn exists(&self, name: &str) -> bool {
            self.files.borrow().contains_key(name)
        }

        fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.files.borrow().get(name).cloned())
        }

        fn write(&self, name: &str, contents: &[u8]) -> Result<(), StoreError> {
            if self.fail_writes || self.fail_file.as_deref() == Some(name) {
                return Err(StoreError::io(
                    name,
                    std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
                ));
            }
            self.files
                .borrow_mut()
                .insert(name.to_string(), contents.to_vec());
            Ok(())
        }

        fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
            let mut files = self.files.borrow_mut();
            let bytes = files.remove(from).ok_or_else(|| {
                StoreError::io(from, std::io::ErrorKind::NotFound.into())
            })?;
            files.insert(to.to_string(), bytes);
            Ok(())
        }

        fn remove(&self, name: &str) -> Result<(), StoreError> {
            self.files.borrow_mut().remove(name);
            Ok(())
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, storage) = storage();
        let mut ledger = Ledger::new("A", "Squat");
        ledger.push(record(4, 50.0));
        ledger.push(record(3, 52.5));
        storage.save(&mut ledger).unwrap();
        assert!(!ledger.has_unsaved_changes());

        let loaded = storage.try_load("A", "Squat").unwrap();
        assert_eq!(loaded.records(), ledger.records());
        assert!(!loaded.has_unsaved_changes());
        assert!(loaded.can_undo());
    }

    #[test]
    fn file_layout_is_pretty_rows() {
        let (dir, storage) = storage();
        let mut ledger = Ledger::new("A", "Squat");
        ledger.push(record(4, 50.0));
        storage.save(&mut ledger).unwrap();
        let text = std::fs::read_to_string(dir.path().join("exercise_A_Squat.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"rows": [["8", "10", "4", "50 Kg", "14/03/2024"]]})
        );
        assert!(text.contains('\n'));
    }

    #[test]
    fn missing_file_is_an_empty_ledger() {
        let (_dir, storage) = storage();
        let (ledger, err) = storage.load("A", "Bench");
        assert!(ledger.is_empty());
        assert!(err.is_none());
        assert!(storage.read_rows("A", "Bench").unwrap().is_none());
    }

    #[test]
    fn corrupt_file_loads_empty_with_error() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("exercise_A_Squat.json"), "{\"rows\": [[").unwrap();
        let (ledger, err) = storage.load("A", "Squat");
        assert!(ledger.is_empty());
        assert!(err.unwrap().is_parse());
        assert!(storage.try_load("A", "Squat").is_err());
    }

    #[test]
    fn failed_save_keeps_dirty_flag() {
        let storage = Storage::new(
            FlakyStore {
                fail_writes: true,
                ..Default::default()
            },
            5,
        );
        let mut ledger = Ledger::new("A", "Squat");
        ledger.push(record(1, 20.0));
        let err = storage.save(&mut ledger).unwrap_err();
        assert!(!err.is_parse());
        assert!(ledger.has_unsaved_changes());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn save_all_only_touches_dirty_ledgers_of_profile() {
        let storage = Storage::new(FlakyStore::default(), 5);
        let mut ledgers = vec![
            Ledger::new("A", "Squat"),
            Ledger::new("A", "Bench"),
            Ledger::new("B", "Squat"),
        ];
        ledgers[0].push(record(1, 20.0));
        ledgers[2].push(record(2, 30.0));

        let report = storage.save_all("A", &mut ledgers);
        assert!(report.is_ok());
        assert_eq!(report.saved, vec!["Squat".to_string()]);
        assert!(!ledgers[0].has_unsaved_changes());
        assert!(ledgers[2].has_unsaved_changes());
        assert!(!storage.store().exists("exercise_A_Bench.json"));
    }

    #[test]
    fn save_all_reports_one_failure_and_saves_the_rest() {
        let storage = Storage::new(
            FlakyStore {
                fail_file: Some("exercise_A_Bench.json".into()),
                ..Default::default()
            },
            5,
        );
        let mut ledgers = vec![
            Ledger::new("A", "Bench"),
            Ledger::new("A", "Deadlift"),
            Ledger::new("A", "Squat"),
        ];
        for ledger in &mut ledgers {
            ledger.push(record(3, 40.0));
        }

        let report = storage.save_all("A", &mut ledgers);
        assert!(!report.is_ok());
        assert_eq!(report.saved, vec!["Deadlift".to_string(), "Squat".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Bench");
        assert!(ledgers[0].has_unsaved_changes());
        assert!(!ledgers[1].has_unsaved_changes());
        assert!(!ledgers[2].has_unsaved_changes());
        assert!(storage.store().exists("exercise_A_Squat.json"));
        assert!(!storage.store().exists("exercise_A_Bench.json"));
    }

    #[test]
    fn loaded_ledgers_use_configured_undo_depth() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(DirStore::open(dir.path()).unwrap(), 2);
        let mut ledger = storage.try_load("A", "Squat").unwrap();
        assert_eq!(ledger.history().max_undo(), 2);
        for n in 1..10 {
            ledger.push(record(n, 20.0));
            assert!(ledger.history().undo_depth() <= 3);
        }
        assert_eq!(ledger.history().undo_depth(), 3);
        let (fallback, _) = storage.load("A", "Bench");
        assert_eq!(fallback.history().max_undo(), 2);
    }

    #[test]
    fn save_into_longer_profiles_file_is_rejected() {
        let (dir, storage) = storage();
        storage.store().write(&profile_file("B"), b"{}").unwrap();
        storage.store().write(&profile_file("B_C"), b"{}").unwrap();
        let mut owner = Ledger::new("B_C", "Squat");
        owner.push(record(5, 100.0));
        storage.save(&mut owner).unwrap();
        let before = std::fs::read(dir.path().join("exercise_B_C_Squat.json")).unwrap();

        let mut intruder = Ledger::new("B", "C_Squat");
        intruder.push(record(1, 5.0));
        let err = storage.save(&mut intruder).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Invalid(ValidationError::NameClash { ref owner, .. }) if owner == "B_C"
        ));
        assert!(intruder.has_unsaved_changes());
        assert_eq!(
            std::fs::read(dir.path().join("exercise_B_C_Squat.json")).unwrap(),
            before
        );

        let (ledger, err) = storage.load("B", "C_Squat");
        assert!(ledger.is_empty());
        assert!(matches!(err, Some(StoreError::Invalid(_))));
        assert_eq!(storage.try_load("B_C", "Squat").unwrap().len(), 1);
    }

    #[test]
    fn unsafe_names_fail_validation_before_io() {
        let (dir, storage) = storage();
        for (profile, exercise) in [("A", "../Squat"), ("A", "x/y"), ("", "Squat"), ("A", " ")] {
            let mut ledger = Ledger::new(profile, exercise);
            ledger.push(record(1, 10.0));
            assert!(matches!(
                storage.save(&mut ledger),
                Err(StoreError::Invalid(ValidationError::InvalidName(_)))
            ));
            assert!(matches!(
                storage.try_load(profile, exercise),
                Err(StoreError::Invalid(ValidationError::InvalidName(_)))
            ));
        }
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn lists_exercises_per_profile() {
        let (_dir, storage) = storage();
        for (p, e) in [("A", "Squat"), ("A", "Bench"), ("A_B", "Squat")] {
            storage.store().write(&profile_file(p), b"{}").unwrap();
            let mut l = Ledger::new(p, e);
            l.push(record(1, 10.0));
            storage.save(&mut l).unwrap();
        }
        assert_eq!(storage.list_exercises("A").unwrap(), vec!["Bench", "Squat"]);
        assert_eq!(storage.list_exercises("A_B").unwrap(), vec!["Squat"]);
        assert_eq!(storage.profile_names().unwrap(), vec!["A", "A_B"]);
    }

    #[test]
    fn migration_copies_legacy_files_once() {
        let (dir, storage) = storage();
        let legacy = r#"{"rows": [["8", "10", "4", "50 Kg", "01/01/2023"]]}"#;
        std::fs::write(dir.path().join("exercise_state_Squat.json"), legacy).unwrap();
        std::fs::write(
            dir.path().join("user_profile.json"),
            r#"{"name": "Dana", "height": "170"}"#,
        )
        .unwrap();

        let report = storage.migrate_legacy_if_needed("default").unwrap();
        assert_eq!(report.ledgers, vec!["Squat".to_string()]);
        assert!(report.personal_data);

        let copied = std::fs::read_to_string(dir.path().join("exercise_default_Squat.json")).unwrap();
        assert_eq!(copied, legacy);
        assert!(dir.path().join("exercise_state_Squat.json").exists());
        assert!(dir.path().join("user_profile.json").exists());
        assert_eq!(
            ActiveProfilePointer::read(storage.store()).unwrap(),
            Some(ActiveProfilePointer::new("default"))
        );

        let again = storage.migrate_legacy_if_needed("default").unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn migration_skips_empty_legacy_profile() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("user_profile.json"), r#"{"name": "", "age": null}"#)
            .unwrap();
        let report = storage.migrate_legacy_if_needed("default").unwrap();
        assert!(report.is_empty());
        assert!(!dir.path().join("profile_default.json").exists());
        assert!(!dir.path().join("active_profile.json").exists());
    }

    #[test]
    fn migration_creates_profile_file_for_orphaned_ledgers() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("exercise_state_Row.json"), r#"{"rows": []}"#).unwrap();
        let report = storage.migrate_legacy_if_needed("default").unwrap();
        assert!(!report.personal_data);
        assert_eq!(storage.profile_names().unwrap(), vec!["default"]);
        assert!(storage.try_load("default", "Row").unwrap().is_empty());
    }

    #[test]
    fn migration_keeps_existing_personal_data() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("exercise_state_Squat.json"), r#"{"rows": []}"#).unwrap();
        std::fs::write(dir.path().join("user_profile.json"), r#"{"name": "Legacy"}"#).unwrap();
        let existing = r#"{"name": "Current", "age": "40"}"#;
        std::fs::write(dir.path().join("profile_default.json"), existing).unwrap();

        let report = storage.migrate_legacy_if_needed("default").unwrap();
        assert_eq!(report.ledgers, vec!["Squat".to_string()]);
        assert!(!report.personal_data);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("profile_default.json")).unwrap(),
            existing
        );
    }

    #[test]
    fn migration_ignores_files_of_state_prefixed_profiles() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("profile_state_x.json"), "{}").unwrap();
        std::fs::write(dir.path().join("exercise_state_x_Squat.json"), r#"{"rows": []}"#).unwrap();
        std::fs::write(dir.path().join("exercise_state_Row.json"), r#"{"rows": []}"#).unwrap();

        let report = storage.migrate_legacy_if_needed("default").unwrap();
        assert_eq!(report.ledgers, vec!["Row".to_string()]);
        assert!(!dir.path().join("exercise_default_x_Squat.json").exists());
    }

    #[test]
    fn migration_leaves_existing_scoped_data_alone() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("exercise_state_Squat.json"), r#"{"rows": []}"#).unwrap();
        std::fs::write(dir.path().join("exercise_default_Bench.json"), r#"{"rows": []}"#).unwrap();
        let report = storage.migrate_legacy_if_needed("default").unwrap();
        assert!(report.ledgers.is_empty());
        assert!(!dir.path().join("exercise_default_Squat.json").exists());
    }
}
