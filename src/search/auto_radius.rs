//! Geographic search that widens its radius until enough meetings are
//! found
//!
//! The radius starts at one meter and grows by 10% per step until the
//! minimum count is reached or the next radius would exceed the cap.
//! Each step is awaited before the next one is issued, so there is
//! never more than one request in flight per controller.
use std::sync::{Mutex, PoisonError};

use crate::client::{DirectoryClient, FetchError};
use crate::meeting::MeetingRecord;
use crate::normalize::{Page, PageMeta};
use crate::query::{DEFAULT_MAX_RADIUS_METERS, SearchSpecification};

pub const START_RADIUS_METERS: f64 = 1.0;
pub const GROWTH_FACTOR: f64 = 1.1;

#[derive(Debug, thiserror::Error)]
pub enum AutoRadiusError {
    #[error("minimum result count must be greater than zero")]
    InvalidMinimum,
    #[error("virtual-only meetings can not be searched by location")]
    VirtualOnly,
    #[error("search center is missing or invalid")]
    InvalidCenter,
    #[error("a search is already running on this controller")]
    Busy,
    #[error("every search step failed, last error: {0}")]
    AllStepsFailed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Searching,
}

#[derive(Debug, Clone)]
pub struct AutoRadiusResult {
    pub meetings: Vec<MeetingRecord>,
    /// Meta of the page the meetings came from
    pub meta: Option<PageMeta>,
    /// Radius of the step that produced `meetings`, 0 when empty
    pub radius_meters: f64,
    /// Number of requests issued
    pub steps: usize,
    /// True when `meetings` reached the requested minimum
    pub satisfied: bool,
}

/// Bookkeeping for one run of the radius ladder, independent of how
/// the steps are executed.
#[derive(Debug)]
pub struct RadiusLadder {
    minimum: usize,
    max_radius: f64,
    steps: usize,
    succeeded: usize,
    satisfied: bool,
    best: Option<(Page<MeetingRecord>, f64)>,
    last_error: Option<FetchError>,
}

impl RadiusLadder {
    pub fn new(minimum: usize, max_radius: f64) -> Self {
        Self {
            minimum,
            max_radius,
            steps: 0,
            succeeded: 0,
            satisfied: false,
            best: None,
            last_error: None,
        }
    }

    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Radius of the first step, `None` if even that exceeds the cap.
    pub fn start(&self) -> Option<f64> {
        self.within_cap(START_RADIUS_METERS)
    }

    /// Records the outcome of the step at `radius` and returns the
    /// radius of the next step, or `None` when the ladder is done.
    /// Failed steps count as zero results.
    pub fn advance(&mut self, radius: f64, outcome: Result<Page<MeetingRecord>, FetchError>) -> Option<f64> {
        self.steps += 1;
        match outcome {
            Ok(page) => {
                self.succeeded += 1;
                let count = page.meetings.len();
                tracing::debug!("Radius {:.1}m found {} meetings", radius, count);
                if count > 0 {
                    self.best = Some((page, radius));
                }
                if count >= self.minimum {
                    self.satisfied = true;
                    return None;
                }
            }
            Err(FetchError::EmptyResult) => {
                self.succeeded += 1;
                tracing::debug!("Radius {:.1}m found no meetings", radius);
            }
            Err(e) => {
                tracing::debug!("Radius {:.1}m failed, treating as empty: {}", radius, e);
                self.last_error = Some(e);
            }
        }
        self.within_cap(radius * GROWTH_FACTOR)
    }

    fn within_cap(&self, radius: f64) -> Option<f64> {
        if radius > self.max_radius { None } else { Some(radius) }
    }

    pub fn finish(self) -> Result<AutoRadiusResult, AutoRadiusError> {
        if self.succeeded == 0
            && let Some(e) = self.last_error
        {
            return Err(AutoRadiusError::AllStepsFailed(e));
        }

        Ok(match self.best {
            Some((page, radius_meters)) => AutoRadiusResult {
                meetings: page.meetings,
                meta: Some(page.meta),
                radius_meters,
                steps: self.steps,
                satisfied: self.satisfied,
            },
            None => AutoRadiusResult {
                meetings: vec![],
                meta: None,
                radius_meters: 0.0,
                steps: self.steps,
                satisfied: false,
            },
        })
    }
}

/// Runs auto radius searches against one directory server.
///
/// Share it behind an `Arc` if needed; a second search started while
/// one is running is rejected with [`AutoRadiusError::Busy`].
pub struct AutoRadiusSearch {
    client: DirectoryClient,
    state: Mutex<SearchState>,
}

// Puts the controller back to idle however the search ends, including
// when its future is dropped.
struct SearchingGuard<'a>(&'a Mutex<SearchState>);

impl Drop for SearchingGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = SearchState::Idle;
    }
}

impl AutoRadiusSearch {
    pub fn new(client: DirectoryClient) -> Self {
        Self {
            client,
            state: Mutex::new(SearchState::Idle),
        }
    }

    pub fn state(&self) -> SearchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<SearchingGuard<'_>, AutoRadiusError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SearchState::Searching {
            return Err(AutoRadiusError::Busy);
        }
        *state = SearchState::Searching;
        Ok(SearchingGuard(&self.state))
    }

    /// Finds at least `minimum` meetings around the center of `base`,
    /// searching no further than its radius (or
    /// [`DEFAULT_MAX_RADIUS_METERS`] when that is not positive).
    ///
    /// Running out of radius is not an error: the last non-empty result
    /// is returned, or an empty one.
    pub async fn search(
        &self,
        minimum: usize,
        base: &SearchSpecification,
    ) -> Result<AutoRadiusResult, AutoRadiusError> {
        if base.type_filter.is_exclusive_virtual() {
            return Err(AutoRadiusError::VirtualOnly);
        }
        if minimum == 0 {
            return Err(AutoRadiusError::InvalidMinimum);
        }
        let Some(center) = base.center.filter(|c| c.is_valid()) else {
            return Err(AutoRadiusError::InvalidCenter);
        };
        let max_radius = if base.radius_meters > 0.0 {
            base.radius_meters
        } else {
            DEFAULT_MAX_RADIUS_METERS
        };

        let _searching = self.begin()?;
        let mut ladder = RadiusLadder::new(minimum, max_radius);
        tracing::debug!(
            "Searching for {} meetings within {:.0}m",
            minimum,
            ladder.max_radius()
        );
        let mut next = ladder.start();
        while let Some(radius) = next {
            let spec = base.clone().with_ids(vec![]).with_geo(center, radius);
            let outcome = self.client.search(&spec).await;
            next = ladder.advance(radius, outcome);
        }

        let result = ladder.finish()?;
        tracing::info!(
            "Auto radius search finished after {} steps with {} meetings at {:.0}m",
            result.steps,
            result.meetings.len(),
            result.radius_meters
        );
        Ok(result)
    }
}
