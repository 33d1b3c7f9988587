//! Edumate command line front-end.
//!
//! Loads the dashboard, generates reports and resolves the profile photo for
//! one student. Identity comes from flags or the `EDUMATE_*` environment.
//!
//! Usage:
//!   edumate dashboard --month 2024-03
//!   edumate report attendance --semester 4 --open

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use edumate_lib::config::load_config;
use edumate_lib::error::PageError;
use edumate_lib::photo::{PhotoSlot, ProfileImage, ProfileImageResolver};
use edumate_lib::reports::{ReportSessionController, ReportState, ReportType};
use edumate_lib::services::DashboardAggregator;
use edumate_lib::upstream::{Institution, StudentIdentity, UpstreamClient};

#[derive(Parser)]
#[command(name = "edumate")]
#[command(about = "Academic dashboard for the institutional student portal", long_about = None)]
struct Cli {
    /// Student record key
    #[arg(long, env = "EDUMATE_STUDENT_ID", global = true)]
    student_id: Option<String>,

    /// SEC or SIT
    #[arg(long, env = "EDUMATE_INSTITUTION", default_value = "SEC", global = true)]
    institution: Institution,

    /// Bearer token from the portal session
    #[arg(long, env = "EDUMATE_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Override the configured API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the dashboard and print it as JSON
    Dashboard {
        /// Print the attendance summary for a month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        /// Print the period breakdown for a day (YYYY-MM-DD)
        #[arg(long)]
        day: Option<NaiveDate>,
        /// Print per-course attendance with its band
        #[arg(long)]
        courses: bool,
    },
    /// Generate a report: attendance, cat or endsem
    Report {
        report: ReportType,
        /// Semester id; lists the available semesters when omitted
        #[arg(long)]
        semester: Option<i64>,
        /// File or directory to save the report to
        #[arg(long)]
        out: Option<PathBuf>,
        /// Open the saved report with the system viewer
        #[arg(long)]
        open: bool,
    },
    /// Resolve the profile photo
    Photo {
        /// Write the image (or SVG placeholder) here instead of printing a data URI
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    fn identity(&self) -> anyhow::Result<StudentIdentity> {
        let student_id = self
            .student_id
            .as_deref()
            .context("a student id is required (--student-id or EDUMATE_STUDENT_ID)")?;
        let token = self
            .token
            .as_deref()
            .context("a session token is required (--token or EDUMATE_TOKEN)")?;
        Ok(StudentIdentity::new(student_id, self.institution, token))
    }
}

fn parse_month(raw: &str) -> anyhow::Result<(i32, u32)> {
    let (year, month) = raw
        .split_once('-')
        .with_context(|| format!("expected YYYY-MM, got '{}'", raw))?;
    let year: i32 = year.parse().context("invalid year")?;
    let month: u32 = month.parse().context("invalid month")?;
    if !(1..=12).contains(&month) {
        bail!("month must be between 1 and 12");
    }
    Ok((year, month))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn default_save_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn run_dashboard(
    client: UpstreamClient,
    identity: &StudentIdentity,
    month: Option<String>,
    day: Option<NaiveDate>,
    courses: bool,
) -> anyhow::Result<()> {
    let aggregator = DashboardAggregator::new(client);
    if let Err(e) = aggregator.load(identity).await {
        print_json(&PageError::from(&e))?;
        bail!(e);
    }
    let view = aggregator.snapshot();
    print_json(&view)?;

    if let Some(month) = month {
        let (year, month) = parse_month(&month)?;
        match view.attendance.as_ref().and_then(|c| c.month_summary(year, month)) {
            Some(summary) => print_json(&summary)?,
            None => eprintln!("No attendance recorded for {}-{:02}", year, month),
        }
    }

    if let Some(day) = day {
        let breakdown = view
            .attendance
            .as_ref()
            .map(|c| c.period_breakdown(day))
            .unwrap_or_default();
        print_json(&breakdown)?;
    }

    if courses {
        for course in view.courses.iter().flatten() {
            println!(
                "  {:<8} {:<40} {:>6.1}%  {:?}",
                course.course_code.as_deref().unwrap_or("-"),
                course.course_name.as_deref().unwrap_or("-"),
                course.attendance_percentage,
                course.band
            );
        }
    }
    Ok(())
}

async fn run_report(
    mut controller: ReportSessionController,
    report: ReportType,
    semester: Option<i64>,
    out: Option<PathBuf>,
    open: bool,
) -> anyhow::Result<()> {
    let state = controller.select_type(report).await?;
    if let Some(message) = state.error() {
        bail!("{}", message);
    }

    let Some(semester) = semester else {
        println!("{} semesters:", report.label());
        for s in state.semesters() {
            println!("  {:>4}  {}", s.id, s.name);
        }
        return Ok(());
    };

    let saved = match controller.select_semester(semester).await? {
        ReportState::Ready { artifact, .. } => {
            let dest = out.unwrap_or_else(default_save_dir);
            artifact
                .save_to(&dest)
                .with_context(|| format!("failed to save report to {}", dest.display()))?
        }
        ReportState::Error { message, .. } => bail!("{}", message),
        other => bail!("report did not complete ({})", other.name()),
    };
    controller.close_artifact()?;

    println!("Saved {}", saved.display());
    if open {
        open::that(&saved).with_context(|| format!("failed to open {}", saved.display()))?;
    }
    Ok(())
}

async fn run_photo(
    client: UpstreamClient,
    identity: &StudentIdentity,
    min_image_bytes: usize,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let aggregator = DashboardAggregator::new(client.clone());
    // Personal details carry the photo reference; the secondary tier is not needed.
    let _tier = aggregator.load_critical(identity).await?;
    let personal = aggregator.snapshot().personal.unwrap_or_default();

    let slot = PhotoSlot::new(ProfileImageResolver::new(client).with_min_bytes(min_image_bytes));
    let image = slot
        .load(identity, personal.photo_reference(), &personal.name)
        .await
        .context("photo resolution was revoked")?;

    match out {
        Some(path) => {
            match &image {
                ProfileImage::Photo(photo) => std::fs::write(path, &photo.bytes)?,
                ProfileImage::Placeholder(placeholder) => std::fs::write(path, placeholder.svg())?,
            }
            println!("Saved {}", path.display());
        }
        None => print_json(&image)?,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config().context("failed to load ~/.edumate/config.json")?;
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    let identity = cli.identity()?;
    let client = UpstreamClient::from_config(&config).context("invalid upstream configuration")?;
    log::info!(
        "edumate: {} student {} via {}",
        identity.institution(),
        identity.short_key(),
        config.base_url
    );

    match cli.command {
        Commands::Dashboard {
            month,
            day,
            courses,
        } => run_dashboard(client, &identity, month, day, courses).await,
        Commands::Report {
            report,
            semester,
            out,
            open,
        } => {
            let controller = ReportSessionController::new(client, identity)
                .with_min_bytes(config.min_report_bytes);
            run_report(controller, report, semester, out, open).await
        }
        Commands::Photo { out } => {
            run_photo(client, &identity, config.min_image_bytes, out.as_deref()).await
        }
    }
}
