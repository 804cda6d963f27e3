pub mod auto_radius;
pub use auto_radius::{
    AutoRadiusError, AutoRadiusResult, AutoRadiusSearch, GROWTH_FACTOR, RadiusLadder,
    START_RADIUS_METERS, SearchState,
};
