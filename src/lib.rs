pub mod cli;
pub mod client;
pub mod collection;
pub mod core;
pub mod meeting;
pub mod normalize;
pub mod query;
pub mod search;
