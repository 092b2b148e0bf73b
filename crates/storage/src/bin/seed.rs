use std::fmt;

use bridge_core::model::{
    Activity, ActivityId, CourseId, CourseOutline, ModuleId, ModuleOutline, SuccessThreshold,
};
use bridge_core::origin::Origin;
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: CourseId,
    modules: u32,
    activities: u32,
    origin: Origin,
    threshold: SuccessThreshold,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCourseId { raw: String },
    InvalidModules { raw: String },
    InvalidActivities { raw: String },
    InvalidDbUrl { raw: String },
    InvalidOrigin { raw: String },
    InvalidThreshold { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidModules { raw } => write!(f, "invalid --modules value: {raw}"),
            ArgsError::InvalidActivities { raw } => {
                write!(f, "invalid --activities value: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidOrigin { raw } => write!(f, "invalid --origin value: {raw}"),
            ArgsError::InvalidThreshold { raw } => {
                write!(f, "invalid --threshold value (expected 0..=1): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

/// Largest activity id the seeded shape derives for `course`, if it still
/// fits the `i64` id columns.
fn max_derived_id(course: u64) -> Option<u64> {
    course
        .checked_mul(10_000)?
        .checked_add(99 * 100 + 99)
        .filter(|id| i64::try_from(*id).is_ok())
}

fn parse_count(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|n| (1..=99).contains(n))
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("BRIDGE_DB_URL")
            .unwrap_or_else(|_| "sqlite://bridge.sqlite3?mode=rwc".into());
        let mut course_id = CourseId::new(1);
        let mut modules = 2;
        let mut activities = 3;
        let mut origin_raw = String::from("http://localhost:8080");
        let mut threshold = SuccessThreshold::default();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    let parsed = value
                        .parse::<u64>()
                        .ok()
                        .filter(|course| max_derived_id(*course).is_some())
                        .ok_or_else(|| ArgsError::InvalidCourseId { raw: value.clone() })?;
                    course_id = CourseId::new(parsed);
                }
                "--modules" => {
                    let value = require_value(&mut args, "--modules")?;
                    modules = parse_count(&value)
                        .ok_or_else(|| ArgsError::InvalidModules { raw: value.clone() })?;
                }
                "--activities" => {
                    let value = require_value(&mut args, "--activities")?;
                    activities = parse_count(&value)
                        .ok_or_else(|| ArgsError::InvalidActivities { raw: value.clone() })?;
                }
                "--origin" => {
                    origin_raw = require_value(&mut args, "--origin")?;
                }
                "--threshold" => {
                    let value = require_value(&mut args, "--threshold")?;
                    threshold = value
                        .parse::<f64>()
                        .ok()
                        .and_then(|raw| SuccessThreshold::new(raw).ok())
                        .ok_or_else(|| ArgsError::InvalidThreshold { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let origin = Origin::parse(&origin_raw)
            .map_err(|_| ArgsError::InvalidOrigin { raw: origin_raw })?;

        Ok(Self {
            db_url,
            course_id,
            modules,
            activities,
            origin,
            threshold,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://bridge.sqlite3?mode=rwc)");
    eprintln!("  --course-id <id>          Course id to upsert (default: 1)");
    eprintln!("  --modules <n>             Modules in the course, 1..=99 (default: 2)");
    eprintln!("  --activities <n>          Activities per module, 1..=99 (default: 3)");
    eprintln!("  --origin <origin>         Allowed content origin");
    eprintln!("                            (default: http://localhost:8080)");
    eprintln!("  --threshold <0..=1>       Success threshold (default: 0.7)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  BRIDGE_DB_URL");
}

/// Ids are derived from positions so reseeding the same shape is idempotent.
fn demo_outline(args: &Args) -> Result<CourseOutline, Box<dyn std::error::Error>> {
    let course = args.course_id.value();
    let mut modules = Vec::new();
    for m in 1..=u64::from(args.modules) {
        let module_id = ModuleId::new(course * 100 + m);
        let activities = (1..=u64::from(args.activities))
            .map(|a| {
                Activity::new(
                    ActivityId::new(course * 10_000 + m * 100 + a),
                    module_id,
                    args.course_id,
                    args.threshold,
                    vec![args.origin.clone()],
                )
            })
            .collect();
        modules.push(ModuleOutline::new(module_id, activities));
    }
    Ok(CourseOutline::new(args.course_id, modules)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let outline = demo_outline(&args)?;
    storage.catalog.upsert_course(&outline).await?;

    println!(
        "Seeded course {} with {} modules and {} activities into {}",
        outline.id().value(),
        outline.modules().len(),
        outline.total_activities(),
        args.db_url
    );
    for activity in outline.activities() {
        println!(
            "  activity {} (module {})",
            activity.id().value(),
            activity.module_id().value()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_must_fit_the_id_columns() {
        assert_eq!(max_derived_id(1), Some(19_999));
        assert!(max_derived_id(922_337_203_685_476).is_some());
        assert_eq!(max_derived_id(922_337_203_685_477), None);
        assert_eq!(max_derived_id(u64::MAX), None);
    }
}
