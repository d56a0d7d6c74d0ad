//! Command-line front end for the workout ledger.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::info;

use workout_ledger::record::DATE_FORMAT;
use workout_ledger::{
    DirStore, HistoryStep, Ledger, LedgerSummary, ProfileRegistry, Record, Settings, Storage,
    WeightUnit,
};

#[derive(Debug, Parser)]
#[command(name = "workout-ledger", version, about = "Log sets, reps and weight per exercise")]
struct Cli {
    /// Directory holding ledger and profile files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Profile to use instead of the active one
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List profiles, marking the active one
    Profiles,
    /// Create a profile and make it active
    Create { name: String },
    /// Make another profile active
    Switch { name: String },
    /// Rename a profile and all of its ledgers
    Rename { old: String, new: String },
    /// Delete a profile and all of its ledgers
    Delete { name: String },
    /// List exercises with saved ledgers
    Exercises,
    /// Append a row to an exercise ledger
    Log {
        exercise: String,
        sets: String,
        reps: String,
        weight: String,
        /// Reps of the final set, defaults to `reps`
        #[arg(long)]
        last_set_reps: Option<String>,
        /// dd/mm/yyyy, defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Print a ledger and its totals
    Show { exercise: String },
    /// Remove a row (1-based) from a ledger
    Remove { exercise: String, row: usize },
    /// Edit a ledger interactively with undo and redo
    Session { exercise: String },
    /// Copy data from the pre-profile file layout
    Migrate,
}

struct App {
    registry: ProfileRegistry<DirStore>,
    unit: WeightUnit,
    profile_override: Option<String>,
}

impl App {
    fn profile(&self) -> Result<String> {
        if let Some(p) = &self.profile_override {
            if !self.registry.exists(p) {
                bail!("no profile named {p:?}");
            }
            return Ok(p.clone());
        }
        self.registry
            .active_profile()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no active profile, create one with `workout-ledger create NAME`"))
    }

    fn open_ledger(&self, exercise: &str) -> Result<Ledger> {
        let profile = self.profile()?;
        self.registry
            .storage()
            .check_ledger_name(&profile, exercise)
            .with_context(|| format!("cannot open {exercise:?}"))?;
        let (ledger, err) = self.registry.storage().load(&profile, exercise);
        if let Some(e) = err {
            eprintln!("warning: {e}; starting with an empty ledger");
        }
        Ok(ledger)
    }

    fn save(&self, ledger: &mut Ledger) -> Result<()> {
        self.registry
            .storage()
            .save(ledger)
            .with_context(|| format!("could not save {}", ledger.exercise()))
    }

    fn today() -> String {
        Local::now().date_naive().format(DATE_FORMAT).to_string()
    }
}

fn print_ledger(ledger: &Ledger) {
    println!("{} / {}", ledger.profile(), ledger.exercise());
    if ledger.is_empty() {
        println!("  (no rows)");
    }
    for (i, r) in ledger.records().iter().enumerate() {
        println!(
            "  {:>3}. {:>10}  {} x {} (last {})  {}",
            i + 1,
            r.date_text(),
            r.sets_text(),
            r.reps_text(),
            r.last_set_reps_text(),
            r.weight_text()
        );
    }
    print_summary(&LedgerSummary::from_records(ledger.records()));
}

fn print_summary(s: &LedgerSummary) {
    println!(
        "  total {:.1}  avg/set {:.1}  best {}  tier {} ({:.0}%)",
        s.total_weight,
        s.average_weight_per_set,
        s.best_weight
            .map(|w| format!("{w:.1}"))
            .unwrap_or_else(|| "-".into()),
        s.tier.label,
        s.tier.progress
    );
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load();
    let data_dir = cli
        .data_dir
        .or_else(|| settings.resolve_data_dir())
        .ok_or_else(|| anyhow!("no data directory available, pass --data-dir"))?;
    let store = DirStore::open(&data_dir)?;
    info!("Using data directory {}", data_dir.display());

    let storage = Storage::new(store, settings.max_undo);
    let report = storage.migrate_legacy_if_needed(&settings.default_profile)?;
    if !report.is_empty() {
        println!(
            "Migrated {} legacy ledgers into profile {}",
            report.ledgers.len(),
            report.profile
        );
    }

    let mut app = App {
        registry: ProfileRegistry::open(storage),
        unit: settings.weight_unit,
        profile_override: cli.profile,
    };

    match cli.command {
        Command::Profiles => {
            let active = app.registry.active_profile();
            for name in app.registry.list_profiles()? {
                let marker = if Some(name.as_str()) == active { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        Command::Create { name } => {
            app.registry.create_profile(&name)?;
            println!("Created profile {name}");
        }
        Command::Switch { name } => {
            let active = app.registry.switch_profile(&name)?;
            println!("Active profile: {active}");
        }
        Command::Rename { old, new } => {
            app.registry.rename_profile(&old, &new)?;
            println!("Renamed {old} to {new}");
        }
        Command::Delete { name } => {
            let removed = app.registry.delete_profile(&name)?;
            println!("Deleted profile {name} ({removed} ledgers)");
        }
        Command::Exercises => {
            let profile = app.profile()?;
            for exercise in app.registry.storage().list_exercises(&profile)? {
                println!("{exercise}");
            }
        }
        Command::Log {
            exercise,
            sets,
            reps,
            weight,
            last_set_reps,
            date,
        } => {
            let last = last_set_reps.unwrap_or_else(|| reps.clone());
            let date = date.unwrap_or_else(App::today);
            let record = Record::from_input(&sets, &reps, &last, &weight, &date, app.unit)?;
            let mut ledger = app.open_ledger(&exercise)?;
            ledger.push(record);
            app.save(&mut ledger)?;
            print_ledger(&ledger);
        }
        Command::Show { exercise } => {
            let ledger = app.open_ledger(&exercise)?;
            print_ledger(&ledger);
        }
        Command::Remove { exercise, row } => {
            let mut ledger = app.open_ledger(&exercise)?;
            let index = row
                .checked_sub(1)
                .ok_or_else(|| anyhow!("rows are numbered from 1"))?;
            ledger.remove(index)?;
            app.save(&mut ledger)?;
            print_ledger(&ledger);
        }
        Command::Session { exercise } => {
            let ledger = app.open_ledger(&exercise)?;
            session(&mut app, ledger)?;
        }
        Command::Migrate => {
            // already ran at startup; report what exists now
            let profile = &settings.default_profile;
            let exercises = app.registry.storage().list_exercises(profile)?;
            println!("Profile {profile} has {} ledgers", exercises.len());
        }
    }
    Ok(())
}

const SESSION_HELP: &str = "\
commands:
  add SETS REPS LAST WEIGHT [DATE]   append a row
  edit ROW SETS REPS LAST WEIGHT DATE
  rm ROW                             remove a row
  mv FROM TO                         move a row
  clear                              remove all rows
  undo | redo
  show | save | help
  quit                               quit! discards unsaved rows";

/// Line-oriented editor over one ledger.
fn session(app: &mut App, mut ledger: Ledger) -> Result<()> {
    ledger.on_change(|l| print_summary(&LedgerSummary::from_records(l.records())));
    print_ledger(&ledger);
    println!("{SESSION_HELP}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = words.split_first() else {
            continue;
        };
        let outcome: Result<()> = match (cmd, args) {
            ("add", [sets, reps, last, weight, rest @ ..]) if rest.len() <= 1 => {
                let date = rest.first().map(|d| d.to_string()).unwrap_or_else(App::today);
                Record::from_input(sets, reps, last, weight, &date, app.unit)
                    .map(|r| ledger.push(r))
                    .map_err(Into::into)
            }
            ("edit", [row, sets, reps, last, weight, date]) => parse_row(row).and_then(|i| {
                let record = Record::from_input(sets, reps, last, weight, date, app.unit)?;
                ledger.replace(i, record)?;
                Ok(())
            }),
            ("rm", [row]) => parse_row(row).and_then(|i| Ok(ledger.remove(i).map(drop)?)),
            ("mv", [from, to]) => {
                parse_row(from).and_then(|f| Ok(ledger.move_row(f, parse_row(to)?)?))
            }
            ("clear", []) => {
                ledger.clear();
                Ok(())
            }
            ("undo", []) => {
                if ledger.undo() == HistoryStep::NothingToUndo {
                    println!("nothing to undo");
                }
                Ok(())
            }
            ("redo", []) => {
                if ledger.redo() == HistoryStep::NothingToRedo {
                    println!("nothing to redo");
                }
                Ok(())
            }
            ("show", []) => {
                print_ledger(&ledger);
                Ok(())
            }
            ("save", []) => app.save(&mut ledger).map(|_| println!("saved")),
            ("help", []) => {
                println!("{SESSION_HELP}");
                Ok(())
            }
            ("quit", []) if ledger.has_unsaved_changes() => {
                println!("unsaved changes, `save` first or `quit!` to discard");
                Ok(())
            }
            ("quit", []) | ("quit!", []) => break,
            _ => Err(anyhow!("unknown command, try `help`")),
        };
        if let Err(e) = outcome {
            println!("error: {e:#}");
        }
    }
    if ledger.has_unsaved_changes() {
        println!("discarded unsaved changes to {}", ledger.exercise());
    }
    Ok(())
}

fn parse_row(text: &str) -> Result<usize> {
    text.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| anyhow!("{text:?} is not a row number"))
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
