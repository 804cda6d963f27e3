//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};

use meetdir::client::{
    DirectoryClient, ReqwestTransport, ServiceContext, Transport, TransportResponse,
};
use meetdir::normalize::Normalizer;

/// A raw meeting as the directory server sends it.
pub fn raw_meeting(meeting_id: u64, weekday: u8, start_time: &str) -> Value {
    json!({
        "server_id": "3",
        "meeting_id": meeting_id.to_string(),
        "weekday": weekday,
        "start_time": start_time,
        "duration": "01:00",
        "time_zone": "America/New_York",
        "organization_key": "na",
        "name": format!("Meeting {}", meeting_id),
        "formats": "O\tOpen\tOpen to all\ten\t17",
        "virtual_information": {"url": format!("zoom.us/j/{}", meeting_id)},
        "latitude": 40.75,
        "longitude": -73.99
    })
}

/// Same as [`raw_meeting`] with a street address, so hybrid.
pub fn raw_hybrid_meeting(meeting_id: u64, weekday: u8, start_time: &str) -> Value {
    let mut raw = raw_meeting(meeting_id, weekday, start_time);
    raw["physical_address"] = json!({
        "street": "123 Main St",
        "city": "New York",
        "name": "Community Hall"
    });
    raw
}

pub fn page_body(meetings: Vec<Value>) -> String {
    json!({
        "meta": {
            "actual_size": meetings.len(),
            "page_size": meetings.len(),
            "starting_index": 0,
            "total": meetings.len(),
            "total_pages": 1,
            "page": 1,
            "search_time": 0.01
        },
        "meetings": meetings
    })
    .to_string()
}

/// A client pointed at a mockito server.
pub fn mock_client(server: &mockito::ServerGuard) -> DirectoryClient {
    let base_uri = Url::parse(&format!("{}/entrypoint.php", server.url())).unwrap();
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    DirectoryClient::new(ServiceContext::new(
        base_uri,
        Arc::new(transport),
        Normalizer::default(),
    ))
}

/// Transport that answers from a closure and records every URL it was
/// asked for.
pub struct FakeTransport<F> {
    respond: F,
    pub requests: Mutex<Vec<Url>>,
}

impl<F> FakeTransport<F>
where
    F: Fn(&Url) -> Result<TransportResponse> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            requests: Mutex::new(vec![]),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `geo_radius` of each request, in kilometers.
    pub fn radii_km(&self) -> Vec<f64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|url| {
                url.query_pairs()
                    .find(|(k, _)| k == "geo_radius")
                    .and_then(|(_, v)| v.parse().ok())
            })
            .collect()
    }
}

#[async_trait]
impl<F> Transport for FakeTransport<F>
where
    F: Fn(&Url) -> Result<TransportResponse> + Send + Sync,
{
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(url.clone());
        (self.respond)(url)
    }
}

pub fn json_response(body: String) -> TransportResponse {
    TransportResponse {
        status: 200,
        content_type: Some(String::from("application/json")),
        body,
    }
}

pub fn fake_client(transport: Arc<dyn Transport>) -> DirectoryClient {
    DirectoryClient::new(ServiceContext::new(
        Url::parse("https://directory.example.org/entrypoint.php").unwrap(),
        transport,
        Normalizer::default(),
    ))
}
