//! Workout record ledgers: per-profile exercise logs with bounded undo/redo,
//! file-backed persistence and derived totals.

pub mod error;
pub mod history;
pub mod ledger;
pub mod paths;
pub mod persistence;
pub mod profiles;
pub mod record;
pub mod settings;
pub mod stats;
pub mod store;

pub use error::{ProfileError, StoreError, ValidationError};
pub use history::{HistoryStep, Snapshot, UndoRedoState};
pub use ledger::Ledger;
pub use persistence::{MigrationReport, SaveAllReport, Storage};
pub use profiles::{ActiveProfilePointer, PersonalData, ProfileRegistry};
pub use record::{Record, WeightUnit};
pub use settings::Settings;
pub use stats::{LedgerSummary, Tier, progression_tier, total_weight};
pub use store::{DirStore, FileStore};
