//! Types for the `?info` response
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub server_version: String,
    /// Unix seconds
    #[serde(default, deserialize_with = "loose_i64")]
    pub last_update_timestamp: i64,
    #[serde(default)]
    pub services: HashMap<String, Service>,
    /// Meeting counts per organization key, plus a `total_meetings`
    /// entry.
    #[serde(default)]
    pub organizations: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub servers: HashMap<String, ServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub num_meetings: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub organizations: HashMap<String, u64>,
}

impl ServerInfo {
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_update_timestamp, 0)
    }

    pub fn total_meetings(&self) -> u64 {
        self.organizations.get("total_meetings").copied().unwrap_or_else(|| {
            self.services
                .values()
                .flat_map(|s| s.servers.values())
                .map(|s| s.num_meetings)
                .sum()
        })
    }

    pub fn server_count(&self) -> usize {
        self.services.values().map(|s| s.servers.len()).sum()
    }
}

// Some servers send the timestamp as a string
fn loose_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Int(i) => i,
        Loose::Float(f) => f as i64,
        Loose::Text(s) => s.trim().parse().map_err(serde::de::Error::custom)?,
    })
}
