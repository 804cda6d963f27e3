//! Canonical meeting record and the types derived from it
use std::fmt;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub mod occurrence;
pub use occurrence::{OccurrenceCell, OccurrenceResolver, distant_future, distant_past};

/// Number of bits reserved for the server-local meeting id in a
/// [`MeetingId`].
pub const LOCAL_ID_BITS: u32 = 44;
const LOCAL_ID_MASK: u64 = (1 << LOCAL_ID_BITS) - 1;

/// Meeting id that is unique across every server of an aggregated
/// result set: `server_id << 44 | local_meeting_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(u64);

impl MeetingId {
    /// Returns `None` when the local id does not fit into 44 bits or
    /// the server id would overflow.
    pub fn new(server_id: u64, local_id: u64) -> Option<Self> {
        if local_id > LOCAL_ID_MASK || server_id > (u64::MAX >> LOCAL_ID_BITS) {
            return None;
        }
        Some(Self((server_id << LOCAL_ID_BITS) | local_id))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn server_id(&self) -> u64 {
        self.0 >> LOCAL_ID_BITS
    }

    pub fn local_id(&self) -> u64 {
        self.0 & LOCAL_ID_MASK
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance using the haversine formula.
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub key: String,
    pub name: String,
    pub description: String,
    pub language: String,
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub province: String,
    pub county: String,
    pub postal_code: String,
    pub country: String,
}

impl PostalAddress {
    /// Single line rendering that skips empty components.
    pub fn one_line(&self) -> String {
        [
            &self.street,
            &self.neighborhood,
            &self.city,
            &self.province,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    InPerson,
    Virtual,
    Hybrid,
}

impl fmt::Display for MeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeetingType::InPerson => "in_person",
            MeetingType::Virtual => "virtual",
            MeetingType::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

/// Finer grained meeting type used for sorting lists. Variant order is
/// the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortableMeetingType {
    InPerson,
    HybridVideo,
    HybridPhone,
    HybridVideoAndPhone,
    VirtualVideo,
    VirtualPhone,
    VirtualVideoAndPhone,
}

impl fmt::Display for SortableMeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortableMeetingType::InPerson => "in_person",
            SortableMeetingType::HybridVideo => "hybrid_video",
            SortableMeetingType::HybridPhone => "hybrid_phone",
            SortableMeetingType::HybridVideoAndPhone => "hybrid_video_and_phone",
            SortableMeetingType::VirtualVideo => "virtual_video",
            SortableMeetingType::VirtualPhone => "virtual_phone",
            SortableMeetingType::VirtualVideoAndPhone => "virtual_video_and_phone",
        };
        write!(f, "{}", s)
    }
}

/// A weekly recurring meeting as normalized from a directory server
/// response.
///
/// Records are built once by the normalizer and never modified after
/// that. The only interior state is the occurrence cache which the
/// [`OccurrenceResolver`] fills in lazily.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingRecord {
    pub id: MeetingId,
    /// 1 = Sunday through 7 = Saturday
    pub weekday: u8,
    pub start_time: NaiveTime,
    /// Seconds, always within `[0, 86400)`
    pub duration: u32,
    pub timezone: Tz,
    pub name: String,
    pub organization: String,
    pub formats: Vec<Format>,
    pub coordinate: Option<Coordinate>,
    pub address: Option<PostalAddress>,
    pub venue_name: Option<String>,
    pub location_note: Option<String>,
    pub virtual_url: Option<String>,
    pub phone_number: Option<String>,
    pub virtual_note: Option<String>,
    pub comments: Option<String>,
    pub(crate) next_start: OccurrenceCell,
}

impl MeetingRecord {
    pub fn server_id(&self) -> u64 {
        self.id.server_id()
    }

    pub fn local_meeting_id(&self) -> u64 {
        self.id.local_id()
    }

    pub fn chrono_weekday(&self) -> Option<Weekday> {
        weekday_from_index(self.weekday)
    }

    pub fn has_in_person_component(&self) -> bool {
        self.venue_name.is_some() || self.address.is_some()
    }

    pub fn has_virtual_component(&self) -> bool {
        self.has_video() || self.has_phone()
    }

    /// True when there is a non-phone virtual URL.
    pub fn has_video(&self) -> bool {
        self.virtual_url
            .as_deref()
            .is_some_and(|url| !url.starts_with("tel:"))
    }

    pub fn has_phone(&self) -> bool {
        self.phone_number.is_some()
            || self
                .virtual_url
                .as_deref()
                .is_some_and(|url| url.starts_with("tel:"))
    }

    pub fn meeting_type(&self) -> MeetingType {
        match (self.has_in_person_component(), self.has_virtual_component()) {
            (true, true) => MeetingType::Hybrid,
            (false, true) => MeetingType::Virtual,
            _ => MeetingType::InPerson,
        }
    }

    pub fn sortable_type(&self) -> SortableMeetingType {
        let (video, phone) = (self.has_video(), self.has_phone());
        match (self.meeting_type(), video, phone) {
            (MeetingType::InPerson, _, _) => SortableMeetingType::InPerson,
            (MeetingType::Hybrid, true, true) => SortableMeetingType::HybridVideoAndPhone,
            (MeetingType::Hybrid, false, _) => SortableMeetingType::HybridPhone,
            (MeetingType::Hybrid, true, false) => SortableMeetingType::HybridVideo,
            (MeetingType::Virtual, true, true) => SortableMeetingType::VirtualVideoAndPhone,
            (MeetingType::Virtual, false, _) => SortableMeetingType::VirtualPhone,
            (MeetingType::Virtual, true, false) => SortableMeetingType::VirtualVideo,
        }
    }
}

/// Maps the directory's 1-based, Sunday-first weekday numbering.
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        1 => Some(Weekday::Sun),
        2 => Some(Weekday::Mon),
        3 => Some(Weekday::Tue),
        4 => Some(Weekday::Wed),
        5 => Some(Weekday::Thu),
        6 => Some(Weekday::Fri),
        7 => Some(Weekday::Sat),
        _ => None,
    }
}
