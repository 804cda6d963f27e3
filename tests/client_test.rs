//! Integration tests for the directory client against a mock server

mod test_utils;

#[cfg(test)]
mod tests {
    use meetdir::client::FetchError;
    use meetdir::meeting::{Coordinate, MeetingId, MeetingType};
    use meetdir::normalize::FlatShape;
    use meetdir::query::{SearchSpecification, TypeFilter};
    use mockito::Matcher;
    use serde_json::json;

    use crate::test_utils::{mock_client, page_body, raw_hybrid_meeting, raw_meeting};

    #[tokio::test]
    async fn it_fetches_server_info() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "server_version": "2.0.1",
            "last_update_timestamp": 1704067200,
            "services": {"BMLT": {"service_name": "BMLT", "servers": {
                "3": {"name": "East", "num_meetings": 12, "url": "https://east.example.org"}
            }}},
            "organizations": {"na": 12, "total_meetings": 12}
        });
        let mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Exact(String::from("info")))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let info = mock_client(&server).server_info().await.unwrap();
        mock.assert_async().await;
        assert_eq!(info.server_version, "2.0.1");
        assert_eq!(info.server_count(), 1);
        assert_eq!(info.total_meetings(), 12);
    }

    #[tokio::test]
    async fn it_searches_with_compiled_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex(String::from("^query&")),
                Matcher::UrlEncoded(String::from("type"), String::from("3")),
                Matcher::UrlEncoded(String::from("geocenter_lat"), String::from("40.75")),
                Matcher::UrlEncoded(String::from("geocenter_lng"), String::from("-73.99")),
                Matcher::UrlEncoded(String::from("geo_radius"), String::from("0.5")),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json; charset=utf-8")
            .with_body(page_body(vec![
                raw_hybrid_meeting(10, 3, "19:00:00"),
                raw_hybrid_meeting(11, 5, "12:30"),
            ]))
            .create_async()
            .await;

        let spec = SearchSpecification::default()
            .with_type(TypeFilter::Hybrid)
            .with_geo(Coordinate::new(40.75, -73.99), 500.0);
        let page = mock_client(&server).search(&spec).await.unwrap();
        mock.assert_async().await;

        assert_eq!(page.meta.actual_size, 2);
        assert_eq!(page.meetings.len(), 2);
        let first = &page.meetings[0];
        assert_eq!(first.id, MeetingId::new(3, 10).unwrap());
        assert_eq!(first.duration, 3600);
        assert_eq!(first.meeting_type(), MeetingType::Hybrid);
        assert_eq!(first.virtual_url.as_deref(), Some("https://zoom.us/j/10"));
        assert_eq!(first.formats[0].key, "O");
    }

    #[tokio::test]
    async fn it_requests_ids_only() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex(String::from("^query&ids=[^&]+$")),
                Matcher::UrlEncoded(String::from("ids"), String::from("(3,10)")),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_body(vec![raw_meeting(10, 2, "08:00:00")]))
            .create_async()
            .await;

        let spec = SearchSpecification::default()
            .with_type(TypeFilter::Hybrid)
            .with_ids(vec![MeetingId::new(3, 10).unwrap()]);
        let page = mock_client(&server).search(&spec).await.unwrap();
        mock.assert_async().await;
        assert_eq!(page.meetings.len(), 1);
    }

    #[tokio::test]
    async fn it_drops_invalid_and_duplicate_records() {
        let mut server = mockito::Server::new_async().await;
        let mut no_org = raw_meeting(12, 2, "08:00:00");
        no_org.as_object_mut().unwrap().remove("organization_key");
        let mut bad_weekday = raw_meeting(13, 2, "08:00:00");
        bad_weekday["weekday"] = json!(9);
        let _mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_body(vec![
                raw_meeting(10, 2, "08:00:00"),
                no_org,
                raw_meeting(11, 2, "09:00:00"),
                bad_weekday,
                raw_meeting(10, 4, "10:00:00"),
            ]))
            .create_async()
            .await;

        let page = mock_client(&server)
            .search(&SearchSpecification::default())
            .await
            .unwrap();
        let ids: Vec<u64> = page.meetings.iter().map(|m| m.local_meeting_id()).collect();
        assert_eq!(ids, vec![10, 11]);
        // First occurrence of a duplicate id wins
        assert_eq!(page.meetings[0].weekday, 2);
        assert_eq!(page.meta.actual_size, 5);
    }

    #[tokio::test]
    async fn it_returns_no_data_for_non_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = mock_client(&server)
            .search(&SearchSpecification::default())
            .await
            .unwrap_err();
        match err {
            FetchError::NoData { status, content_type } => {
                assert_eq!(status, 200);
                assert_eq!(content_type.as_deref(), Some("text/html"));
            }
            other => panic!("expected NoData, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_returns_no_data_for_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let err = mock_client(&server).server_info().await.unwrap_err();
        assert!(matches!(err, FetchError::NoData { status: 500, .. }));
    }

    #[tokio::test]
    async fn it_returns_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_body(vec![]))
            .create_async()
            .await;

        let err = mock_client(&server)
            .search(&SearchSpecification::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyResult));
    }

    #[tokio::test]
    async fn it_returns_decode_error_for_malformed_page() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"meetings": []"#)
            .create_async()
            .await;

        let err = mock_client(&server)
            .search(&SearchSpecification::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn it_shapes_search_results_flat() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_body(vec![raw_meeting(10, 3, "19:00:00")]))
            .create_async()
            .await;

        let page = mock_client(&server)
            .search_shaped::<FlatShape>(&SearchSpecification::default())
            .await
            .unwrap();
        let row = &page.meetings[0];
        assert_eq!(row["meeting_id"], 10);
        assert_eq!(row["start_time"], "19:00:00");
        assert_eq!(row["time_zone"], "America/New_York");
        assert_eq!(row["meeting_type"], "virtual");
        assert_eq!(row["formats"], "O\tOpen\tOpen to all\ten\t17");
    }
}
