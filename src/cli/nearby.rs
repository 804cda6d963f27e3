use anyhow::Result;
use chrono::Utc;
use serde_json::{Value, json};

use super::meeting_row;
use crate::client::{DirectoryClient, ServiceContext};
use crate::core::AppConfig;
use crate::meeting::{Coordinate, OccurrenceResolver};
use crate::query::{SearchSpecification, TypeFilter};
use crate::search::AutoRadiusSearch;

pub async fn run(
    config: &AppConfig,
    type_filter: TypeFilter,
    latitude: f64,
    longitude: f64,
    minimum: usize,
    max_radius: f64,
) -> Result<()> {
    let client = DirectoryClient::new(ServiceContext::from_config(config)?);
    let center = Coordinate::new(latitude, longitude);
    let base = SearchSpecification::default()
        .with_type(type_filter)
        .with_geo(center, max_radius);

    let result = AutoRadiusSearch::new(client).search(minimum, &base).await?;

    let resolver = OccurrenceResolver::new(config.local_timezone);
    let now = Utc::now();
    let results: Vec<Value> = result
        .meetings
        .iter()
        .map(|m| {
            let mut row = meeting_row(m, &resolver, now);
            if let (Some(obj), Some(coordinate)) = (row.as_object_mut(), m.coordinate) {
                obj.insert(
                    String::from("distance_meters"),
                    json!(center.distance_meters(&coordinate).round()),
                );
            }
            row
        })
        .collect();

    println!(
        "{}",
        json!({
            "radius_meters": result.radius_meters,
            "steps": result.steps,
            "satisfied": result.satisfied,
            "meta": result.meta,
            "results": results,
        })
    );
    Ok(())
}
