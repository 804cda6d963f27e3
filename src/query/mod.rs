//! Search specification and its compilation into query parameters
//!
//! Compilation is a pure function of the specification: the same
//! specification always yields the same parameters in the same order,
//! which lets callers use the rendered URL as a cache key.
use itertools::Itertools;
use reqwest::Url;

use crate::meeting::{Coordinate, MeetingId};

/// Used by the auto radius search when no usable radius is given.
pub const DEFAULT_MAX_RADIUS_METERS: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    Any,
    /// Meetings with an in-person component. Exclusive drops hybrids.
    InPerson { exclusive: bool },
    /// Meetings with a virtual component. Exclusive drops hybrids.
    Virtual { exclusive: bool },
    Hybrid,
}

impl TypeFilter {
    /// Value of the `type` query parameter, `None` for [`TypeFilter::Any`].
    pub fn code(&self) -> Option<i32> {
        match self {
            TypeFilter::Any => None,
            TypeFilter::InPerson { exclusive: true } => Some(-2),
            TypeFilter::InPerson { exclusive: false } => Some(1),
            TypeFilter::Virtual { exclusive: true } => Some(-1),
            TypeFilter::Virtual { exclusive: false } => Some(2),
            TypeFilter::Hybrid => Some(3),
        }
    }

    pub fn is_exclusive_virtual(&self) -> bool {
        matches!(self, TypeFilter::Virtual { exclusive: true })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpecification {
    pub type_filter: TypeFilter,
    pub center: Option<Coordinate>,
    pub radius_meters: f64,
    /// When non-empty, only these meetings are requested and the type
    /// and geographic filters are ignored.
    pub ids: Vec<MeetingId>,
    /// Negative means unset
    pub page_size: i64,
    pub page_number: i64,
}

impl Default for SearchSpecification {
    fn default() -> Self {
        Self {
            type_filter: TypeFilter::Any,
            center: None,
            radius_meters: 0.0,
            ids: vec![],
            page_size: -1,
            page_number: 0,
        }
    }
}

impl SearchSpecification {
    pub fn with_type(mut self, type_filter: TypeFilter) -> Self {
        self.type_filter = type_filter;
        self
    }

    pub fn with_geo(mut self, center: Coordinate, radius_meters: f64) -> Self {
        self.center = Some(center);
        self.radius_meters = radius_meters;
        self
    }

    pub fn with_ids(mut self, ids: Vec<MeetingId>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_paging(mut self, page_size: i64, page_number: i64) -> Self {
        self.page_size = page_size;
        self.page_number = page_number;
        self
    }

    fn valid_center(&self) -> Option<Coordinate> {
        self.center.filter(Coordinate::is_valid)
    }

    /// Ordered `(name, value)` pairs. The leading `query` marker has an
    /// empty value.
    pub fn compile(&self) -> Vec<(String, String)> {
        let mut params = vec![(String::from("query"), String::new())];

        if !self.ids.is_empty() {
            let ids = self
                .ids
                .iter()
                .map(|id| format!("({},{})", id.server_id(), id.local_id()))
                .join(",");
            params.push((String::from("ids"), ids));
        } else {
            if let Some(code) = self.type_filter.code() {
                params.push((String::from("type"), code.to_string()));
            }
            // Distance is meaningless for meetings with no location
            if !self.type_filter.is_exclusive_virtual()
                && let Some(center) = self.valid_center()
                && self.radius_meters > 0.0
            {
                params.push((String::from("geocenter_lng"), center.longitude.to_string()));
                params.push((String::from("geocenter_lat"), center.latitude.to_string()));
                params.push((
                    String::from("geo_radius"),
                    (self.radius_meters / 1000.0).to_string(),
                ));
            }
        }

        if self.page_size >= 0 {
            params.push((String::from("page_size"), self.page_size.to_string()));
            if self.page_size > 0 && self.page_number > 0 {
                params.push((String::from("page"), self.page_number.to_string()));
            }
        }

        params
    }

    /// Renders the compiled parameters onto `base`, replacing any query
    /// string it already had.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in self.compile() {
                if value.is_empty() {
                    query.append_key_only(&name);
                } else {
                    query.append_pair(&name, &value);
                }
            }
        }
        url
    }
}
