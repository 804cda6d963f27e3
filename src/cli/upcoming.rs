use anyhow::Result;
use chrono::Utc;
use serde_json::{Value, json};

use crate::client::{DirectoryClient, ServiceContext};
use crate::collection::{CachedOccurrence, LocalTimezoneCollection};
use crate::core::AppConfig;
use crate::meeting::OccurrenceResolver;

pub async fn run(config: &AppConfig, limit: usize, hybrid_only: bool) -> Result<()> {
    let client = DirectoryClient::new(ServiceContext::from_config(config)?);
    let mut collection =
        LocalTimezoneCollection::new(client, OccurrenceResolver::new(config.local_timezone));
    let now = Utc::now();
    collection.replace_all(now).await?;

    let local_tz = collection.resolver().local_timezone();
    let row = |entry: &CachedOccurrence| {
        json!({
            "id": entry.meeting.id,
            "name": entry.meeting.name,
            "meeting_type": entry.meeting.meeting_type().to_string(),
            "next_start": entry.next_start_in(local_tz).to_rfc3339(),
            "meeting_time_zone": entry.meeting.timezone.name(),
            "address": entry.meeting.address.as_ref().map(|a| a.one_line()),
            "virtual_meeting_link": entry.meeting.virtual_url,
            "phone_meeting_number": entry.meeting.phone_number,
        })
    };
    let results: Vec<Value> = if hybrid_only {
        collection.hybrid().take(limit).map(row).collect()
    } else {
        collection.entries().iter().take(limit).map(row).collect()
    };

    println!(
        "{}",
        json!({
            "local_time_zone": local_tz.name(),
            "total": collection.len(),
            "results": results,
        })
    );
    Ok(())
}
