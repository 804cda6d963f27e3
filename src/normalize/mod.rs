//! Normalization of raw directory server responses
//!
//! A single code path turns the loosely typed per-meeting objects into
//! [`MeetingRecord`]s. What a caller gets back is decided by an
//! [`OutputShape`]: the rich record itself or the flattened export map.
//! Invalid records are dropped, never reported as errors.
use chrono_tz::Tz;
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::meeting::{Coordinate, Format, MeetingId, MeetingRecord, OccurrenceCell, PostalAddress};

pub mod export;
pub mod fields;

pub use export::{FlatRecord, flatten, formats_from_tdv, formats_to_tdv};

/// Default locations that upstream data entry tools fill in when the
/// real address is unknown. Anything within
/// [`PLACEHOLDER_RADIUS_METERS`] of these is treated as junk.
pub const PLACEHOLDER_LOCATIONS: [Coordinate; 2] = [
    // NA World Service office, Chatsworth CA
    Coordinate {
        latitude: 34.2355,
        longitude: -118.5634,
    },
    // Null island
    Coordinate {
        latitude: 0.0,
        longitude: 0.0,
    },
];
pub const PLACEHOLDER_RADIUS_METERS: f64 = 200.0;

pub fn is_placeholder_location(coordinate: &Coordinate) -> bool {
    PLACEHOLDER_LOCATIONS
        .iter()
        .any(|p| p.distance_meters(coordinate) <= PLACEHOLDER_RADIUS_METERS)
}

/// What to do with records that have no usable `time_zone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimezonePolicy {
    /// Drop the record
    Required,
    /// Use the caller's local zone
    DefaultToLocal,
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub timezone_policy: TimezonePolicy,
    pub local_timezone: Tz,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            timezone_policy: TimezonePolicy::Required,
            local_timezone: Tz::UTC,
        }
    }
}

/// Strategy for the value produced for each parsed record.
pub trait OutputShape {
    type Output;

    fn shape(record: MeetingRecord) -> Self::Output;
}

/// Produces [`MeetingRecord`]s.
pub struct RichShape;

impl OutputShape for RichShape {
    type Output = MeetingRecord;

    fn shape(record: MeetingRecord) -> Self::Output {
        record
    }
}

/// Produces flattened, scalar-only maps for export.
pub struct FlatShape;

impl OutputShape for FlatShape {
    type Output = FlatRecord;

    fn shape(record: MeetingRecord) -> Self::Output {
        flatten(&record)
    }
}

/// Paging bookkeeping as reported by the server. The counters are
/// taken as-is, even when records were dropped during parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMeta {
    pub actual_size: i64,
    pub page_size: i64,
    pub starting_index: i64,
    pub total: i64,
    pub total_pages: i64,
    pub page: i64,
    pub search_time: f64,
}

impl PageMeta {
    fn from_raw(raw: &Map<String, Value>) -> Self {
        Self {
            actual_size: fields::signed(raw, "actual_size").unwrap_or_default(),
            page_size: fields::signed(raw, "page_size").unwrap_or_default(),
            starting_index: fields::signed(raw, "starting_index").unwrap_or_default(),
            total: fields::signed(raw, "total").unwrap_or_default(),
            total_pages: fields::signed(raw, "total_pages").unwrap_or_default(),
            page: fields::signed(raw, "page").unwrap_or_default(),
            search_time: fields::float(raw, "search_time").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub meta: PageMeta,
    pub meetings: Vec<T>,
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("response has no meta object")]
    MissingMeta,
    #[error("response has no meetings array")]
    MissingMeetings,
    #[error("response contains no meetings")]
    NoMeetings,
}

/// Why a single record was dropped. Only ever logged.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordRejection {
    #[error("not a JSON object")]
    NotAnObject,
    #[error("missing or invalid {0}")]
    Invalid(&'static str),
    #[error("no usable time zone")]
    NoTimezone,
    #[error("neither an in-person nor a virtual component")]
    NoAttendance,
}

#[derive(Debug, Default)]
struct Physical {
    coordinate: Option<Coordinate>,
    address: Option<PostalAddress>,
    venue_name: Option<String>,
    location_note: Option<String>,
}

#[derive(Debug, Default)]
struct Virtual {
    url: Option<String>,
    phone: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Parses a `?query` response body.
    pub fn parse_page_str<S: OutputShape>(&self, body: &str) -> Result<Page<S::Output>, PageError> {
        let value: Value = serde_json::from_str(body)?;
        self.parse_page::<S>(&value)
    }

    pub fn parse_page<S: OutputShape>(&self, body: &Value) -> Result<Page<S::Output>, PageError> {
        let body = body.as_object().ok_or(PageError::NotAnObject)?;
        let meta = body
            .get("meta")
            .and_then(Value::as_object)
            .ok_or(PageError::MissingMeta)?;
        let meetings = body
            .get("meetings")
            .and_then(Value::as_array)
            .ok_or(PageError::MissingMeetings)?;
        if meetings.is_empty() {
            return Err(PageError::NoMeetings);
        }

        let meta = PageMeta::from_raw(meta);
        let parsed = self.parse_records::<S>(meetings);
        tracing::debug!(
            "Parsed {} of {} meetings (server reported {})",
            parsed.len(),
            meetings.len(),
            meta.actual_size
        );

        Ok(Page {
            meta,
            meetings: parsed,
        })
    }

    /// Parses each entry, dropping invalid records and any repeat of an
    /// id already seen.
    pub fn parse_records<S: OutputShape>(&self, raw: &[Value]) -> Vec<S::Output> {
        raw.iter()
            .filter_map(|value| self.parse_record(value))
            .unique_by(|record| record.id)
            .map(S::shape)
            .collect()
    }

    /// Parses one meeting, logging and returning `None` when invalid.
    pub fn parse_record(&self, raw: &Value) -> Option<MeetingRecord> {
        match self.try_parse_record(raw) {
            Ok(record) => Some(record),
            Err(rejection) => {
                let meeting_id = raw.get("meeting_id").unwrap_or(&Value::Null);
                tracing::debug!("Dropping meeting {}: {}", meeting_id, rejection);
                None
            }
        }
    }

    pub fn try_parse_record(&self, raw: &Value) -> Result<MeetingRecord, RecordRejection> {
        let raw = raw.as_object().ok_or(RecordRejection::NotAnObject)?;

        let server_id = fields::unsigned(raw, "server_id").ok_or(RecordRejection::Invalid("server_id"))?;
        let local_id = fields::unsigned(raw, "meeting_id").ok_or(RecordRejection::Invalid("meeting_id"))?;
        let id = MeetingId::new(server_id, local_id).ok_or(RecordRejection::Invalid("meeting_id"))?;
        let weekday = fields::unsigned(raw, "weekday")
            .filter(|w| (1..=7).contains(w))
            .ok_or(RecordRejection::Invalid("weekday"))? as u8;
        let start_time = fields::string(raw, "start_time")
            .and_then(|s| fields::time_of_day(&s))
            .ok_or(RecordRejection::Invalid("start_time"))?;
        let organization =
            fields::string(raw, "organization_key").ok_or(RecordRejection::Invalid("organization_key"))?;
        let timezone = self.timezone(raw)?;

        let physical = physical(raw);
        let virtual_info = virtual_info(raw);
        let has_in_person = physical.venue_name.is_some() || physical.address.is_some();
        let has_virtual = virtual_info.url.is_some() || virtual_info.phone.is_some();
        if !has_in_person && !has_virtual {
            return Err(RecordRejection::NoAttendance);
        }

        Ok(MeetingRecord {
            id,
            weekday,
            start_time,
            duration: fields::duration_seconds(raw, "duration"),
            timezone,
            name: fields::string(raw, "name").unwrap_or_default(),
            organization,
            formats: formats(raw),
            coordinate: physical.coordinate,
            address: physical.address,
            venue_name: physical.venue_name,
            location_note: physical.location_note,
            virtual_url: virtual_info.url,
            phone_number: virtual_info.phone,
            virtual_note: virtual_info.note,
            comments: fields::string(raw, "comments"),
            next_start: OccurrenceCell::default(),
        })
    }

    fn timezone(&self, raw: &Map<String, Value>) -> Result<Tz, RecordRejection> {
        let parsed = fields::string(raw, "time_zone").and_then(|s| s.parse::<Tz>().ok());
        match (parsed, self.config.timezone_policy) {
            (Some(tz), _) => Ok(tz),
            (None, TimezonePolicy::DefaultToLocal) => Ok(self.config.local_timezone),
            (None, TimezonePolicy::Required) => Err(RecordRejection::NoTimezone),
        }
    }
}

/// Reads the in-person block from either the nested
/// `physical_address` object or the flattened export keys.
fn physical(raw: &Map<String, Value>) -> Physical {
    let coordinate = fields::float(raw, "latitude")
        .zip(fields::float(raw, "longitude"))
        .map(|(latitude, longitude)| Coordinate::new(latitude, longitude))
        .filter(Coordinate::is_valid);

    if let Some(c) = coordinate
        && is_placeholder_location(&c)
    {
        tracing::debug!("Ignoring placeholder location {},{}", c.latitude, c.longitude);
        return Physical::default();
    }

    let (source, venue_key, note_key) = match raw.get("physical_address").and_then(Value::as_object) {
        Some(nested) => (nested, "name", "info"),
        None => (raw, "location_name", "location_info"),
    };

    let address = fields::string(source, "street").map(|street| PostalAddress {
        street,
        neighborhood: fields::string(source, "neighborhood").unwrap_or_default(),
        city: fields::string(source, "city").unwrap_or_default(),
        province: fields::string(source, "province").unwrap_or_default(),
        county: fields::string(source, "county").unwrap_or_default(),
        postal_code: fields::string(source, "postal_code").unwrap_or_default(),
        country: fields::string(source, "country").unwrap_or_default(),
    });

    Physical {
        coordinate,
        address,
        venue_name: fields::string(source, venue_key),
        location_note: fields::string(source, note_key),
    }
}

fn virtual_info(raw: &Map<String, Value>) -> Virtual {
    let (source, url_key, phone_key, note_key) =
        match raw.get("virtual_information").and_then(Value::as_object) {
            Some(nested) => (nested, "url", "phone_number", "info"),
            None => (
                raw,
                "virtual_meeting_link",
                "phone_meeting_number",
                "virtual_meeting_additional_info",
            ),
        };

    Virtual {
        url: fields::string(source, url_key).and_then(|s| fields::normalize_virtual_url(&s)),
        phone: fields::string(source, phone_key).and_then(|s| fields::last_segment(&s)),
        note: fields::string(source, note_key).and_then(|s| fields::last_segment(&s)),
    }
}

/// Formats arrive as an array of objects from the server, or as a TDV
/// string from a flattened export. Bad entries are skipped.
fn formats(raw: &Map<String, Value>) -> Vec<Format> {
    match raw.get("formats") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_object)
            .filter_map(format_entry)
            .collect(),
        Some(Value::String(tdv)) => formats_from_tdv(tdv),
        _ => vec![],
    }
}

fn format_entry(raw: &Map<String, Value>) -> Option<Format> {
    Some(Format {
        key: fields::string(raw, "key")?,
        id: fields::unsigned(raw, "id")?,
        name: fields::string(raw, "name").unwrap_or_default(),
        description: fields::string(raw, "description").unwrap_or_default(),
        language: fields::string(raw, "language").unwrap_or_default(),
    })
}
