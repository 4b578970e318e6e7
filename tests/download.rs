use std::{fs, time::Duration};

use httpmock::{Method::GET, MockServer};
use serde_json::json;
use test_log::test;
use weathergen::{
    archive::extract_all,
    config::KdpConfig,
    kdp::{DatasetRef, DownloadOutcome, KdpClient, ListQuery, OrderBy},
    utils::{backoff::BackoffPolicy, token::Token},
};

const FILES_PATH: &str = "/open-data/v1/datasets/nl_rdr_data_rtcor_5m_tar/versions/1.0/files";

fn client(server: &MockServer) -> KdpClient {
    let config = KdpConfig {
        max_retries: 3,
        backoff: BackoffPolicy::new(Duration::from_millis(1), 2.0, Duration::from_millis(5)),
        min_interval: Duration::ZERO,
        ..KdpConfig::default()
    }
    .with_base_url(server.url("/open-data/v1/"));
    KdpClient::new(config, Token::new("integration-token").unwrap()).unwrap()
}

fn tar_with(members: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap()
}

#[test]
fn downloads_and_unpacks_a_month_of_archives() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path(FILES_PATH)
            .header("authorization", "integration-token")
            .query_param("orderBy", "created")
            .query_param("begin", "2024-01-01T00:00:00+00:00")
            .query_param("end", "2024-02-01T00:00:00+00:00");
        then.status(200).json_body(json!({
            "isTruncated": false,
            "resultCount": 2,
            "files": [
                { "filename": "day1.tar", "size": 10 },
                { "filename": "day2.tar", "size": 10 }
            ]
        }));
    });
    for day in ["day1", "day2"] {
        let blob_path = format!("/bucket/{day}.tar");
        let url = server.url(&blob_path);
        server.mock(|when, then| {
            when.method(GET).path(format!("{FILES_PATH}/{day}.tar/url"));
            then.status(200)
                .json_body(json!({ "temporaryDownloadUrl": url }));
        });
        let first = format!("{day}_0000.h5");
        let second = format!("{day}_0005.h5");
        let body = tar_with(&[(first.as_str(), "a"), (second.as_str(), "b")]);
        server.mock(|when, then| {
            when.method(GET).path(blob_path.as_str());
            then.status(200).body(body);
        });
    }

    let client = client(&server);
    let dataset = DatasetRef::new("nl_rdr_data_rtcor_5m_tar", "1.0");
    let query = ListQuery {
        max_keys: 31,
        order_by: OrderBy::Created,
        begin: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
        end: chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();

    let mut outcomes = Vec::new();
    for file in client.files(&dataset, query.clone()) {
        let file = file.unwrap();
        outcomes.push(
            client
                .download_file(&dataset, &file.filename, dir.path(), false)
                .unwrap(),
        );
    }
    let report = extract_all(dir.path()).unwrap();

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, DownloadOutcome::Downloaded { .. })));
    assert_eq!(report.extracted, 4);
    assert_eq!(fs::read_to_string(dir.path().join("day2_0005.h5")).unwrap(), "b");
    listing.assert();

    // A second run finds everything in place
    let again: Vec<_> = client
        .files(&dataset, query)
        .map(|file| {
            client
                .download_file(&dataset, &file.unwrap().filename, dir.path(), false)
                .unwrap()
        })
        .collect();
    assert!(again
        .iter()
        .all(|o| matches!(o, DownloadOutcome::Skipped(_))));
    assert_eq!(extract_all(dir.path()).unwrap().extracted, 0);
}

#[test]
fn transient_failures_on_the_blob_store_are_retried() {
    let server = MockServer::start();
    let url = server.url("/bucket/flaky.tar");
    server.mock(|when, then| {
        when.method(GET).path(format!("{FILES_PATH}/flaky.tar/url"));
        then.status(200).json_body(json!({ "temporaryDownloadUrl": url }));
    });
    let blob = server.mock(|when, then| {
        when.method(GET).path("/bucket/flaky.tar");
        then.status(502);
    });

    let client = client(&server);
    let dataset = DatasetRef::new("nl_rdr_data_rtcor_5m_tar", "1.0");
    let dir = tempfile::tempdir().unwrap();

    let err = client
        .download_file(&dataset, "flaky.tar", dir.path(), false)
        .unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(blob.hits(), 4);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}
