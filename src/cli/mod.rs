use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod info;
pub mod nearby;
pub mod search;
pub mod upcoming;

use crate::core::AppConfig;
use crate::meeting::{MeetingId, MeetingRecord, OccurrenceResolver};
use crate::normalize::flatten;
use crate::query::TypeFilter;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum TypeArg {
    #[default]
    Any,
    InPerson,
    InPersonOnly,
    Virtual,
    VirtualOnly,
    Hybrid,
}

impl From<TypeArg> for TypeFilter {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Any => TypeFilter::Any,
            TypeArg::InPerson => TypeFilter::InPerson { exclusive: false },
            TypeArg::InPersonOnly => TypeFilter::InPerson { exclusive: true },
            TypeArg::Virtual => TypeFilter::Virtual { exclusive: false },
            TypeArg::VirtualOnly => TypeFilter::Virtual { exclusive: true },
            TypeArg::Hybrid => TypeFilter::Hybrid,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the directory server's info
    Info {},
    /// Search for meetings
    Search {
        #[arg(long, value_enum, default_value = "any")]
        r#type: TypeArg,
        #[arg(long, allow_hyphen_values = true, requires = "longitude")]
        latitude: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "latitude")]
        longitude: Option<f64>,
        /// Search radius in meters
        #[arg(long, default_value = "0")]
        radius: f64,
        /// Only fetch these meetings, as `server:meeting` pairs
        #[arg(long, value_delimiter = ',', value_parser = parse_meeting_id)]
        ids: Vec<MeetingId>,
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        page_size: i64,
        #[arg(long, default_value = "0")]
        page: i64,
    },
    /// Find at least a minimum number of meetings around a point
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        #[arg(long, default_value = "10")]
        minimum: usize,
        /// Largest radius to search in meters, defaults to
        /// MEETDIR_MAX_RADIUS_METERS
        #[arg(long)]
        max_radius: Option<f64>,
        #[arg(long, value_enum, default_value = "any")]
        r#type: TypeArg,
    },
    /// List upcoming virtual and hybrid meetings in local time
    Upcoming {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "false")]
        hybrid_only: bool,
    },
    /// Export search results as flat records
    Export {
        #[arg(long, value_enum, default_value = "any")]
        r#type: TypeArg,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Info {}) => {
            info::run(&config).await?;
        }
        Some(Command::Search {
            r#type,
            latitude,
            longitude,
            radius,
            ids,
            page_size,
            page,
        }) => {
            let center = latitude.zip(longitude);
            search::run(&config, r#type.into(), center, radius, ids, page_size, page).await?;
        }
        Some(Command::Nearby {
            latitude,
            longitude,
            minimum,
            max_radius,
            r#type,
        }) => {
            let max_radius = max_radius.unwrap_or(config.max_radius_meters);
            nearby::run(&config, r#type.into(), latitude, longitude, minimum, max_radius).await?;
        }
        Some(Command::Upcoming { limit, hybrid_only }) => {
            upcoming::run(&config, limit, hybrid_only).await?;
        }
        Some(Command::Export { r#type }) => {
            search::export(&config, r#type.into()).await?;
        }
        None => {}
    }

    Ok(())
}

/// Parses `server:meeting`.
pub fn parse_meeting_id(value: &str) -> Result<MeetingId> {
    let (server, meeting) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| anyhow!("expected server:meeting, got {:?}", value))?;
    let server = server.parse()?;
    let meeting = meeting.parse()?;
    MeetingId::new(server, meeting).ok_or_else(|| anyhow!("meeting id out of range: {}", value))
}

/// Flat record plus when the meeting next starts, in the local zone.
pub(crate) fn meeting_row(
    meeting: &MeetingRecord,
    resolver: &OccurrenceResolver,
    now: DateTime<Utc>,
) -> Value {
    let mut row = flatten(meeting);
    let next = resolver.next_occurrence(meeting, now, false);
    row.insert(
        String::from("next_start"),
        json!(next.with_timezone(&resolver.local_timezone()).to_rfc3339()),
    );
    row.insert(
        String::from("address"),
        json!(meeting.address.as_ref().map(|a| a.one_line())),
    );
    row.insert(
        String::from("in_progress"),
        json!(resolver.is_in_progress(meeting, now)),
    );
    Value::Object(row)
}
