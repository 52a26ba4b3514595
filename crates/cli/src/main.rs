use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;
use store::{ScheduleDb, ScheduleSink};
use timeline::summary::{free_minutes, summarize};
use timeline::timecode::{format_clock, format_duration, format_span, parse_clock};
use timeline::{
    to_snapshot, EditConfig, EditOutcome, Minutes, Schedule, ScheduleCommand, SegmentId,
    SegmentPatch, TimelineError,
};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "dayplan")]
#[command(about = "Plan a 24-hour day as a circle of activities and free time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the local data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Which saved schedule to edit
    #[arg(long, global = true, default_value = store::DEFAULT_KEY)]
    key: String,

    /// JSON file with edit tunables (snap, minimum activity length, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the day, one segment per line
    Show {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Time spent per activity
    Summary,

    /// Insert a short untitled activity after a segment
    InsertAfter {
        id: String,
        /// Minutes to insert (defaults to the configured insert size)
        #[arg(long)]
        minutes: Option<Minutes>,
    },

    /// Click into a gap at a time of day to create an activity there
    Add {
        gap_id: String,
        #[arg(value_parser = parse_clock)]
        at: Minutes,
    },

    /// Drag the boundary after segment INDEX to a time of day
    Resize {
        index: usize,
        #[arg(value_parser = parse_clock)]
        to: Minutes,
    },

    /// Move the start of a segment
    Start {
        id: String,
        #[arg(value_parser = parse_clock)]
        at: Minutes,
    },

    /// Move the end of a segment
    End {
        id: String,
        #[arg(value_parser = parse_clock)]
        at: Minutes,
    },

    /// Rename and/or recolor an activity
    Rename {
        id: String,
        title: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },

    /// Turn a segment into free time
    Delete { id: String },

    /// Replace the whole day with free time
    Clear,

    /// Move a segment to another segment's position
    Move { source: String, target: String },

    /// Apply a JSON array of edit commands from a file
    Apply { file: PathBuf },

    Undo,

    Redo,

    /// Write the day as a JSON snapshot
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete the saved schedule and its history
    Reset,
}

#[derive(Serialize)]
struct Row<'a> {
    index: usize,
    start: String,
    end: String,
    id: &'a str,
    kind: &'a str,
    title: &'a str,
    color: &'a str,
    duration: Minutes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let db_path = cli.db.clone().unwrap_or_else(store::default_db_path);
    debug!("Using schedule database: {:?}", db_path);
    let db = Rc::new(ScheduleDb::open_or_create(&db_path)?);

    let config = load_config(cli.config.as_ref())?;
    let history = db.load_or_init(&cli.key)?;
    let mut schedule = Schedule::from_history(history)
        .with_config(config)
        .with_sink(ScheduleSink::new(db.clone(), cli.key.clone()));

    match cli.command {
        Commands::Show { json } => return show_command(&schedule, json),
        Commands::Summary => return summary_command(&schedule),
        Commands::Export { output } => return export_command(&schedule, output),
        Commands::Undo => history_command(schedule.undo(), "undo"),
        Commands::Redo => history_command(schedule.redo(), "redo"),
        Commands::Apply { file } => apply_command(&mut schedule, file)?,
        Commands::Resize { index, to } => {
            let outcome = schedule.resize_boundary(index, to);
            report(&outcome, &format!("resize boundary {} to {}", index, format_clock(to)))?;
        }
        Commands::Reset => {
            db.clear(&cli.key)?;
            info!("Removed schedule '{}'", cli.key);
            return Ok(());
        }
        command => {
            if let Some((edit, label)) = edit_for(command) {
                let outcome = schedule.apply(edit);
                report(&outcome, &label)?;
            }
        }
    }

    db.save_history(&cli.key, schedule.history())?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EditConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {:?}", path))?;
            Ok(serde_json::from_str(&raw).with_context(|| format!("parsing config {:?}", path))?)
        }
        None => Ok(EditConfig::default()),
    }
}

fn edit_for(command: Commands) -> Option<(ScheduleCommand, String)> {
    let edit = match command {
        Commands::InsertAfter { id, minutes } => (
            ScheduleCommand::InsertAfter {
                after: SegmentId::new(&id),
                duration: minutes,
            },
            format!("insert after {}", id),
        ),
        Commands::Add { gap_id, at } => (
            ScheduleCommand::AddInGap {
                gap_id: SegmentId::new(&gap_id),
                minute: at,
            },
            format!("add in {} at {}", gap_id, format_clock(at)),
        ),
        Commands::Start { id, at } => (
            ScheduleCommand::ChangeStart {
                id: SegmentId::new(&id),
                minute: at,
            },
            format!("start {} at {}", id, format_clock(at)),
        ),
        Commands::End { id, at } => (
            ScheduleCommand::ChangeEnd {
                id: SegmentId::new(&id),
                minute: at,
            },
            format!("end {} at {}", id, format_clock(at)),
        ),
        Commands::Rename { id, title, color } => (
            ScheduleCommand::Update {
                id: SegmentId::new(&id),
                patch: SegmentPatch { title, color },
            },
            format!("update {}", id),
        ),
        Commands::Delete { id } => (
            ScheduleCommand::Delete {
                id: SegmentId::new(&id),
            },
            format!("delete {}", id),
        ),
        Commands::Clear => (ScheduleCommand::ClearAll, "clear".to_string()),
        Commands::Move { source, target } => (
            ScheduleCommand::Reorder {
                source: SegmentId::new(&source),
                target: SegmentId::new(&target),
            },
            format!("move {} to {}", source, target),
        ),
        _ => return None,
    };
    Some(edit)
}

fn report(outcome: &EditOutcome, label: &str) -> Result<()> {
    match outcome {
        EditOutcome::Applied { created } => {
            match created {
                Some(id) => info!("{}: created {}", label, id),
                None => info!("{}: done", label),
            }
            Ok(())
        }
        EditOutcome::Unchanged => {
            info!("{}: nothing changed", label);
            Ok(())
        }
        EditOutcome::Rejected(err) => bail!("{}: {}", label, err),
    }
}

fn history_command(result: Result<(), TimelineError>, label: &str) {
    match result {
        Ok(()) => info!("{}: done", label),
        Err(err) => warn!("{}: {}", label, err),
    }
}

fn apply_command(schedule: &mut Schedule, file: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {:?}", file))?;
    let commands: Vec<ScheduleCommand> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {:?}", file))?;
    info!("Applying {} commands from {:?}", commands.len(), file);

    let mut rejected = 0;
    for (i, command) in commands.into_iter().enumerate() {
        let outcome = schedule.apply(command);
        if let EditOutcome::Rejected(err) = &outcome {
            warn!("command {} rejected: {}", i, err);
            rejected += 1;
        }
    }
    if rejected > 0 {
        warn!("{} commands were rejected", rejected);
    }
    Ok(())
}

fn show_command(schedule: &Schedule, json: bool) -> Result<()> {
    let positioned = schedule.positioned();
    if json {
        let rows: Vec<Row<'_>> = positioned
            .iter()
            .enumerate()
            .map(|(index, p)| Row {
                index,
                start: format_clock(p.start),
                end: format_clock(p.end()),
                id: p.segment.id.as_str(),
                kind: p.segment.kind.as_str(),
                title: &p.segment.title,
                color: &p.segment.color,
                duration: p.segment.duration,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (index, p) in positioned.iter().enumerate() {
        let title = if p.segment.title.is_empty() {
            "(untitled)"
        } else {
            p.segment.title.as_str()
        };
        println!(
            "{:>3}  {}  {:>7}  {:<8}  {:<20}  {}",
            index,
            format_span(p.start, p.segment.duration),
            format_duration(p.segment.duration),
            p.segment.kind,
            title,
            p.segment.id
        );
    }
    let history = schedule.history();
    println!(
        "\n{} free, {} undo / {} redo steps",
        format_duration(free_minutes(schedule.timeline())),
        history.past().len(),
        history.future().len()
    );
    Ok(())
}

fn summary_command(schedule: &Schedule) -> Result<()> {
    for entry in summarize(schedule.timeline()) {
        println!(
            "{:<20}  {:>7}  {:>5.1}%  ({} block{})",
            entry.title,
            format_duration(entry.minutes),
            entry.share * 100.0,
            entry.segments,
            if entry.segments == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn export_command(schedule: &Schedule, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(&to_snapshot(schedule.timeline()))?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {:?}", path))?;
            info!("Exported schedule to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
