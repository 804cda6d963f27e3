//! Next/previous occurrence of a weekly meeting pattern
//!
//! Occurrences are resolved in the meeting's own timezone by walking
//! forward one civil day at a time until the weekday matches, then
//! placing the start time on that day. The result is memoized on the
//! record and reused until it is in the past.
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Days, Duration, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::MeetingRecord;

pub const ONE_WEEK_SECONDS: i64 = 604_800;

/// Sentinel for an occurrence that could not be resolved.
pub fn distant_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(4001, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Sentinel for a previous occurrence that could not be resolved.
pub fn distant_past() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Memoized next start instant for a single record.
#[derive(Debug, Default)]
pub struct OccurrenceCell(Mutex<Option<DateTime<Utc>>>);

impl OccurrenceCell {
    /// Returns the cached instant if it is still the nearest start at
    /// or after `now`, clearing it otherwise.
    fn fresh(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Some(next) if now <= next && next - Duration::seconds(ONE_WEEK_SECONDS) < now => {
                Some(next)
            }
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    fn store(&self, next: DateTime<Utc>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(next);
    }

    pub fn peek(&self) -> Option<DateTime<Utc>> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for OccurrenceCell {
    fn clone(&self) -> Self {
        Self(Mutex::new(self.peek()))
    }
}

// The cache is not part of a record's identity
impl PartialEq for OccurrenceCell {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Resolves occurrences relative to the caller's local timezone.
#[derive(Debug, Clone, Copy)]
pub struct OccurrenceResolver {
    local_tz: Tz,
}

impl OccurrenceResolver {
    pub fn new(local_tz: Tz) -> Self {
        Self { local_tz }
    }

    pub fn local_timezone(&self) -> Tz {
        self.local_tz
    }

    /// The first start of `meeting` at or after `now`.
    ///
    /// With `adjust_to_local` the instant is shifted by the difference
    /// between the meeting's UTC offset and the local UTC offset at the
    /// resolved instant, so that formatting it in the local zone shows
    /// the meeting's own wall-clock time. The offset is taken once,
    /// which is an approximation right at a DST transition.
    ///
    /// Returns [`distant_future`] when no occurrence can be resolved.
    pub fn next_occurrence(
        &self,
        meeting: &MeetingRecord,
        now: DateTime<Utc>,
        adjust_to_local: bool,
    ) -> DateTime<Utc> {
        let next = match meeting.next_start.fresh(now) {
            Some(cached) => cached,
            None => match resolve_next(meeting, now) {
                Some(next) => {
                    meeting.next_start.store(next);
                    next
                }
                None => {
                    tracing::debug!("Unable to resolve next occurrence for meeting {}", meeting.id);
                    return distant_future();
                }
            },
        };

        if adjust_to_local {
            self.adjust_to_local(meeting.timezone, next)
        } else {
            next
        }
    }

    /// One week before the next occurrence, or [`distant_past`] when
    /// the next occurrence could not be resolved.
    pub fn previous_occurrence(
        &self,
        meeting: &MeetingRecord,
        now: DateTime<Utc>,
        adjust_to_local: bool,
    ) -> DateTime<Utc> {
        let next = self.next_occurrence(meeting, now, adjust_to_local);
        if next == distant_future() {
            return distant_past();
        }
        next - Duration::seconds(ONE_WEEK_SECONDS)
    }

    /// True when `now` falls in the occurrence before the next one.
    /// At the exact start instant the meeting is still the next
    /// occurrence, so this returns false until one second later.
    pub fn is_in_progress(&self, meeting: &MeetingRecord, now: DateTime<Utc>) -> bool {
        let start = self.previous_occurrence(meeting, now, false);
        if start == distant_past() {
            return false;
        }
        start <= now && now < start + Duration::seconds(i64::from(meeting.duration))
    }

    fn adjust_to_local(&self, meeting_tz: Tz, instant: DateTime<Utc>) -> DateTime<Utc> {
        let meeting_offset = instant.with_timezone(&meeting_tz).offset().fix().local_minus_utc();
        let local_offset = instant.with_timezone(&self.local_tz).offset().fix().local_minus_utc();
        instant + Duration::seconds(i64::from(meeting_offset - local_offset))
    }
}

fn resolve_next(meeting: &MeetingRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz = meeting.timezone;
    let weekday = meeting.chrono_weekday()?;
    let time = NaiveTime::from_hms_opt(meeting.start_time.hour(), meeting.start_time.minute(), 0)?;
    let today = now.with_timezone(&tz).date_naive();

    // Eight days covers the case where today matches but the start
    // time has already passed.
    (0..=7u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter(|date| date.weekday() == weekday)
        .filter_map(|date| resolve_civil(tz, date.and_time(time)))
        .find(|instant| *instant >= now)
}

/// Maps a civil time in `tz` to an instant. Ambiguous times take the
/// earlier instant. Times skipped by a forward transition are read
/// with the offset in effect before the transition, which moves them
/// forward by the length of the gap.
fn resolve_civil(tz: Tz, civil: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&civil) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before = tz.from_local_datetime(&(civil - Duration::days(1))).earliest()?;
            let offset = before.offset().fix().local_minus_utc();
            Some((civil - Duration::seconds(i64::from(offset))).and_utc())
        }
    }
}
