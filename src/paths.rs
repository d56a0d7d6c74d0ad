//! File naming inside the data directory.
//!
//! ```text
//! exercise_{profile}_{exercise}.json   ledger rows
//! profile_{profile}.json               personal data
//! active_profile.json                  active profile pointer
//! exercise_state_{exercise}.json       legacy, unscoped ledger rows
//! user_profile.json                    legacy, unscoped personal data
//! ```

pub const ACTIVE_PROFILE_FILE: &str = "active_profile.json";
pub const LEGACY_PROFILE_FILE: &str = "user_profile.json";

const LEDGER_PREFIX: &str = "exercise_";
const LEGACY_SEGMENT: &str = "state";
const PROFILE_PREFIX: &str = "profile_";
const EXT: &str = ".json";

pub fn ledger_file(profile: &str, exercise: &str) -> String {
    format!("{LEDGER_PREFIX}{profile}_{exercise}{EXT}")
}

pub fn profile_file(profile: &str) -> String {
    format!("{PROFILE_PREFIX}{profile}{EXT}")
}

pub fn legacy_ledger_file(exercise: &str) -> String {
    ledger_file(LEGACY_SEGMENT, exercise)
}

/// Profile name encoded in a `profile_{name}.json` file name.
pub fn profile_from_file(file: &str) -> Option<&str> {
    file.strip_prefix(PROFILE_PREFIX)?
        .strip_suffix(EXT)
        .filter(|name| !name.is_empty())
}

/// Exercise name encoded in a legacy `exercise_state_{exercise}.json` file.
/// Files that a profile in `known` owns are not legacy files.
pub fn legacy_exercise_from_file<'a>(file: &'a str, known: &[String]) -> Option<&'a str> {
    exercise_from_file(file, LEGACY_SEGMENT, known)
}

/// Exercise name of a ledger file owned by `profile`.
///
/// `A` and `A_B` can both be profiles, so `exercise_A_B_Squat.json` belongs to
/// the longest profile in `known` that prefixes it. Files that a longer known
/// profile claims are rejected here.
pub fn exercise_from_file<'a>(file: &'a str, profile: &str, known: &[String]) -> Option<&'a str> {
    let scoped = file.strip_prefix(LEDGER_PREFIX)?.strip_suffix(EXT)?;
    let exercise = scoped.strip_prefix(profile)?.strip_prefix('_')?;
    if exercise.is_empty() {
        return None;
    }
    claimed_by_other(profile, exercise, known)
        .is_none()
        .then_some(exercise)
}

/// The longer profile in `known` that `ledger_file(profile, exercise)` would
/// be attributed to, if any.
pub fn claimed_by_other<'k>(
    profile: &str,
    exercise: &str,
    known: &'k [String],
) -> Option<&'k str> {
    let scoped = format!("{profile}_{exercise}");
    known
        .iter()
        .filter(|other| other.len() > profile.len())
        .find(|other| {
            scoped
                .strip_prefix(other.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .is_some_and(|rest| !rest.is_empty())
        })
        .map(String::as_str)
}

/// Names end up inside file names, so separators are off limits. `state` and
/// `state_*` would produce files that look like the legacy layout.
pub fn is_valid_profile_name(name: &str) -> bool {
    is_valid_segment(name)
        && name != LEGACY_SEGMENT
        && !name
            .strip_prefix(LEGACY_SEGMENT)
            .is_some_and(|rest| rest.starts_with('_'))
}

pub fn is_valid_exercise_name(name: &str) -> bool {
    is_valid_segment(name)
}

fn is_valid_segment(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}
