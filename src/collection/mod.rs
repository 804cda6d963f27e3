//! Refreshable collection of virtual meetings with precomputed next
//! occurrences
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::client::{DirectoryClient, FetchError};
use crate::meeting::{MeetingRecord, MeetingType, OccurrenceResolver};
use crate::query::{SearchSpecification, TypeFilter};

/// A meeting together with the next start computed when it was added.
#[derive(Debug, Clone)]
pub struct CachedOccurrence {
    pub meeting: MeetingRecord,
    next_start: DateTime<Utc>,
}

impl CachedOccurrence {
    pub fn new(meeting: MeetingRecord, resolver: &OccurrenceResolver, now: DateTime<Utc>) -> Self {
        let next_start = resolver.next_occurrence(&meeting, now, false);
        Self {
            meeting,
            next_start,
        }
    }

    /// The stored instant, which may be stale. See [`Self::current`].
    pub fn next_start(&self) -> DateTime<Utc> {
        self.next_start
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now > self.next_start
    }

    /// The next start as of `now`, recomputed if the stored one has
    /// passed.
    pub fn current(&mut self, resolver: &OccurrenceResolver, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.is_stale(now) {
            self.next_start = resolver.next_occurrence(&self.meeting, now, false);
        }
        self.next_start
    }

    pub fn next_start_in(&self, tz: Tz) -> DateTime<Tz> {
        self.next_start.with_timezone(&tz)
    }
}

/// Virtual and hybrid meetings from a single fetch, ordered by next
/// start.
pub struct LocalTimezoneCollection {
    client: DirectoryClient,
    resolver: OccurrenceResolver,
    entries: Vec<CachedOccurrence>,
}

impl LocalTimezoneCollection {
    pub fn new(client: DirectoryClient, resolver: OccurrenceResolver) -> Self {
        Self {
            client,
            resolver,
            entries: vec![],
        }
    }

    pub fn resolver(&self) -> &OccurrenceResolver {
        &self.resolver
    }

    /// Fetches every meeting with a virtual component and replaces the
    /// whole collection with it. On failure the current contents are
    /// kept, except for an empty result which clears them.
    pub async fn replace_all(&mut self, now: DateTime<Utc>) -> Result<usize, FetchError> {
        let spec = SearchSpecification::default().with_type(TypeFilter::Virtual { exclusive: false });
        match self.client.search(&spec).await {
            Ok(page) => {
                self.replace_with(page.meetings, now);
                Ok(self.entries.len())
            }
            Err(FetchError::EmptyResult) => {
                self.entries.clear();
                Ok(0)
            }
            Err(e) => {
                tracing::error!("Failed to refresh virtual meetings: {}", e);
                Err(e)
            }
        }
    }

    /// Replaces the collection with `meetings`, computing each next
    /// occurrence up front.
    pub fn replace_with(&mut self, meetings: Vec<MeetingRecord>, now: DateTime<Utc>) {
        self.entries = meetings
            .into_iter()
            .map(|m| CachedOccurrence::new(m, &self.resolver, now))
            .collect();
        self.sort();
    }

    /// Recomputes entries whose next start has passed.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        let mut changed = false;
        for entry in self.entries.iter_mut().filter(|e| e.is_stale(now)) {
            entry.current(&self.resolver, now);
            changed = true;
        }
        if changed {
            self.sort();
        }
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.next_start.cmp(&b.next_start).then(a.meeting.id.cmp(&b.meeting.id)));
    }

    pub fn entries(&self) -> &[CachedOccurrence] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hybrid(&self) -> impl Iterator<Item = &CachedOccurrence> {
        self.of_type(MeetingType::Hybrid)
    }

    pub fn virtual_only(&self) -> impl Iterator<Item = &CachedOccurrence> {
        self.of_type(MeetingType::Virtual)
    }

    fn of_type(&self, meeting_type: MeetingType) -> impl Iterator<Item = &CachedOccurrence> {
        self.entries
            .iter()
            .filter(move |e| e.meeting.meeting_type() == meeting_type)
    }

    /// Entries in progress at `now`.
    pub fn in_progress(&self, now: DateTime<Utc>) -> impl Iterator<Item = &CachedOccurrence> {
        self.entries
            .iter()
            .filter(move |e| self.resolver.is_in_progress(&e.meeting, now))
    }
}
