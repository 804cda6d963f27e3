use anyhow::Result;
use chrono::Utc;
use serde_json::{Value, json};

use super::meeting_row;
use crate::client::{DirectoryClient, FetchError, ServiceContext};
use crate::core::AppConfig;
use crate::meeting::{Coordinate, MeetingId, OccurrenceResolver};
use crate::normalize::FlatShape;
use crate::query::{SearchSpecification, TypeFilter};

pub async fn run(
    config: &AppConfig,
    type_filter: TypeFilter,
    center: Option<(f64, f64)>,
    radius: f64,
    ids: Vec<MeetingId>,
    page_size: i64,
    page_number: i64,
) -> Result<()> {
    let client = DirectoryClient::new(ServiceContext::from_config(config)?);
    let mut spec = SearchSpecification::default()
        .with_type(type_filter)
        .with_ids(ids)
        .with_paging(page_size, page_number);
    if let Some((latitude, longitude)) = center {
        spec = spec.with_geo(Coordinate::new(latitude, longitude), radius);
    }

    let resolver = OccurrenceResolver::new(config.local_timezone);
    let now = Utc::now();
    let (meta, results) = match client.search(&spec).await {
        Ok(page) => {
            let rows: Vec<Value> = page
                .meetings
                .iter()
                .map(|m| meeting_row(m, &resolver, now))
                .collect();
            (Some(page.meta), rows)
        }
        Err(FetchError::EmptyResult) => (None, vec![]),
        Err(e) => return Err(e.into()),
    };

    println!(
        "{}",
        json!({
            "query": spec.to_url(&client.context().base_uri).as_str(),
            "meta": meta,
            "results": results,
        })
    );
    Ok(())
}

/// Prints every matching meeting as a flat record, one JSON object per
/// line.
pub async fn export(config: &AppConfig, type_filter: TypeFilter) -> Result<()> {
    let client = DirectoryClient::new(ServiceContext::from_config(config)?);
    let spec = SearchSpecification::default().with_type(type_filter);
    let records = match client.search_shaped::<FlatShape>(&spec).await {
        Ok(page) => page.meetings,
        Err(FetchError::EmptyResult) => vec![],
        Err(e) => return Err(e.into()),
    };
    tracing::info!("Exporting {} meetings", records.len());
    for record in records {
        println!("{}", Value::Object(record));
    }
    Ok(())
}
