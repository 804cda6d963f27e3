//! Flattened, two-level export of meeting records
//!
//! Every value in an exported map is a scalar. Nested structures are
//! spread into top-level keys and the format list is packed into a
//! single tab-delimited (TDV) string. The normalizer reads these maps
//! back, so an export can be re-parsed into the same records.
use serde_json::{Map, Value, json};

use crate::meeting::{Format, MeetingRecord};

pub type FlatRecord = Map<String, Value>;

/// Tab separated `key, name, description, language, id` per format,
/// one format per line.
pub fn formats_to_tdv(formats: &[Format]) -> String {
    formats
        .iter()
        .map(|f| {
            [
                tdv_field(&f.key),
                tdv_field(&f.name),
                tdv_field(&f.description),
                tdv_field(&f.language),
                f.id.to_string(),
            ]
            .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads formats written by [`formats_to_tdv`]. Lines without a key or
/// with an unparseable id are skipped.
pub fn formats_from_tdv(tdv: &str) -> Vec<Format> {
    tdv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            let [key, name, description, language, id] = cols.as_slice() else {
                return None;
            };
            if key.trim().is_empty() {
                return None;
            }
            Some(Format {
                key: key.trim().to_string(),
                name: name.to_string(),
                description: description.to_string(),
                language: language.to_string(),
                id: id.trim().parse().ok()?,
            })
        })
        .collect()
}

// Tabs and newlines would break the row/column structure
fn tdv_field(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

pub fn flatten(record: &MeetingRecord) -> FlatRecord {
    let address = record.address.clone().unwrap_or_default();
    let text = |s: &Option<String>| json!(s.clone().unwrap_or_default());

    let value = json!({
        "id": record.id.as_u64(),
        "server_id": record.server_id(),
        "meeting_id": record.local_meeting_id(),
        "weekday": record.weekday,
        "start_time": record.start_time.format("%H:%M:%S").to_string(),
        "duration": record.duration,
        "time_zone": record.timezone.name(),
        "organization_key": record.organization,
        "name": record.name,
        "meeting_type": record.meeting_type().to_string(),
        "sortable_type": record.sortable_type().to_string(),
        "latitude": record.coordinate.map(|c| c.latitude),
        "longitude": record.coordinate.map(|c| c.longitude),
        "street": address.street,
        "neighborhood": address.neighborhood,
        "city": address.city,
        "province": address.province,
        "county": address.county,
        "postal_code": address.postal_code,
        "country": address.country,
        "location_name": text(&record.venue_name),
        "location_info": text(&record.location_note),
        "virtual_meeting_link": text(&record.virtual_url),
        "phone_meeting_number": text(&record.phone_number),
        "virtual_meeting_additional_info": text(&record.virtual_note),
        "comments": text(&record.comments),
        "formats": formats_to_tdv(&record.formats),
    });

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn export(records: &[MeetingRecord]) -> Vec<FlatRecord> {
    records.iter().map(flatten).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::{MeetingType, fixtures::meeting};
    use crate::normalize::Normalizer;

    fn format(key: &str, id: u64) -> Format {
        Format {
            key: key.to_string(),
            name: format!("{} name", key),
            description: String::from("Open to everyone"),
            language: String::from("en"),
            id,
        }
    }

    #[test]
    fn test_formats_tdv() {
        let mut open = format("O", 17);
        open.description = String::from("has\ttab and\nnewline");
        let formats = vec![open, format("C", 4)];
        let tdv = formats_to_tdv(&formats);
        assert_eq!(tdv.lines().count(), 2);
        assert_eq!(
            tdv.lines().next().unwrap(),
            "O\tO name\thas tab and newline\ten\t17"
        );

        let parsed = formats_from_tdv(&tdv);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].key, "O");
        assert_eq!(parsed[1].id, 4);
        assert_eq!(parsed[0].description, "has tab and newline");
    }

    #[test]
    fn test_formats_from_tdv_skips_bad_lines() {
        let parsed = formats_from_tdv("O\tOpen\t\ten\t17\nbroken line\n\tNo key\t\ten\t3\nB\tBeg\t\ten\tx");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].key, "O");
        assert!(formats_from_tdv("").is_empty());
    }

    #[test]
    fn test_flatten_is_scalar_only() {
        let mut m = meeting(3, "19:00:00", 3600, chrono_tz::America::New_York);
        m.formats = vec![format("O", 17)];
        let flat = flatten(&m);
        assert!(flat.values().all(|v| !v.is_object() && !v.is_array()));
        assert_eq!(flat["time_zone"], json!("America/New_York"));
        assert_eq!(flat["start_time"], json!("19:00:00"));
        assert_eq!(flat["latitude"], Value::Null);
        assert_eq!(flat["meeting_type"], json!("virtual"));
    }

    #[test]
    fn test_export_round_trip() {
        let normalizer = Normalizer::default();

        let mut virtual_only = meeting(3, "19:00:00", 3600, chrono_tz::America::New_York);
        virtual_only.phone_number = Some(String::from("+1 555 0100"));

        let mut hybrid = meeting(5, "07:30:00", 1800, chrono_tz::Europe::Paris);
        hybrid.id = crate::meeting::MeetingId::new(9, 1234).unwrap();
        hybrid.venue_name = Some(String::from("Salle des fêtes"));
        hybrid.formats = vec![format("O", 17), format("W", 2)];

        let mut in_person = meeting(1, "12:00:00", 3600, chrono_tz::Tz::UTC);
        in_person.id = crate::meeting::MeetingId::new(1, 1).unwrap();
        in_person.virtual_url = None;
        in_person.address = Some(crate::meeting::PostalAddress {
            street: String::from("1 High St"),
            ..Default::default()
        });
        in_person.coordinate = Some(crate::meeting::Coordinate::new(51.5, -0.12));

        for original in [virtual_only, hybrid, in_person] {
            let flat = Value::Object(flatten(&original));
            let reparsed = normalizer.parse_record(&flat).unwrap();
            assert_eq!(reparsed.id, original.id);
            assert_eq!(reparsed.server_id(), original.server_id());
            assert_eq!(reparsed.local_meeting_id(), original.local_meeting_id());
            assert_eq!(reparsed.meeting_type(), original.meeting_type());
            assert_eq!(reparsed, original);
        }
    }

    #[test]
    fn test_export_keeps_derived_type() {
        let mut m = meeting(2, "10:00:00", 3600, chrono_tz::Tz::UTC);
        m.venue_name = Some(String::from("Hall"));
        let rows = export(&[m]);
        assert_eq!(rows[0]["meeting_type"], json!(MeetingType::Hybrid.to_string()));
    }
}
