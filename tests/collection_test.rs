//! Integration tests for the local time zone collection

mod test_utils;

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::America::{Los_Angeles, New_York};
    use mockito::Matcher;

    use meetdir::client::FetchError;
    use meetdir::collection::LocalTimezoneCollection;
    use meetdir::meeting::OccurrenceResolver;

    use crate::test_utils::{mock_client, page_body, raw_hybrid_meeting, raw_meeting};

    fn now() -> DateTime<Utc> {
        // Monday 2024-01-01 00:00 in New York
        Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap()
    }

    fn body() -> String {
        page_body(vec![
            raw_meeting(1, 5, "12:00:00"),
            raw_hybrid_meeting(2, 3, "19:00:00"),
            raw_meeting(3, 2, "08:00:00"),
        ])
    }

    #[tokio::test]
    async fn it_replaces_all_with_virtual_and_hybrid_meetings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::UrlEncoded(String::from("type"), String::from("2")))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body())
            .create_async()
            .await;

        let mut collection =
            LocalTimezoneCollection::new(mock_client(&server), OccurrenceResolver::new(Los_Angeles));
        let count = collection.replace_all(now()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(count, 3);
        let ids: Vec<u64> = collection
            .entries()
            .iter()
            .map(|e| e.meeting.local_meeting_id())
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(collection.hybrid().count(), 1);
        assert_eq!(collection.virtual_only().count(), 2);

        // Tuesday 19:00 in New York is 16:00 in Los Angeles
        let tuesday = &collection.entries()[1];
        assert_eq!(
            tuesday.next_start_in(Los_Angeles).to_rfc3339(),
            "2024-01-02T16:00:00-08:00"
        );
        assert_eq!(
            tuesday.next_start(),
            New_York.with_ymd_and_hms(2024, 1, 2, 19, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn it_keeps_contents_when_refresh_fails() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body())
            .create_async()
            .await;

        let mut collection =
            LocalTimezoneCollection::new(mock_client(&server), OccurrenceResolver::new(New_York));
        collection.replace_all(now()).await.unwrap();
        assert_eq!(collection.len(), 3);

        ok.remove_async().await;
        let failing = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_header("content-type", "text/html")
            .create_async()
            .await;

        let err = collection.replace_all(now()).await.unwrap_err();
        assert!(matches!(err, FetchError::NoData { status: 502, .. }));
        assert_eq!(collection.len(), 3);

        failing.remove_async().await;
        let _empty = server
            .mock("GET", "/entrypoint.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_body(vec![]))
            .create_async()
            .await;

        assert_eq!(collection.replace_all(now()).await.unwrap(), 0);
        assert!(collection.is_empty());
    }
}
