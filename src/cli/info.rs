use anyhow::Result;
use serde_json::json;

use crate::client::{DirectoryClient, ServiceContext};
use crate::core::AppConfig;

pub async fn run(config: &AppConfig) -> Result<()> {
    let client = DirectoryClient::new(ServiceContext::from_config(config)?);
    let info = client.server_info().await?;
    println!(
        "{}",
        json!({
            "server_version": info.server_version,
            "last_update": info.last_update().map(|t| t.to_rfc3339()),
            "servers": info.server_count(),
            "total_meetings": info.total_meetings(),
            "organizations": info.organizations,
        })
    );
    Ok(())
}
