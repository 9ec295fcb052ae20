// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use ghgscope_app::{
    AggregateQuery, ChartDimension, Credentials, DataService, Facet, Metric, Predicate,
    QueryDescriptor, RecordId, RowRecord, ServiceError, SortColumn, SortDirection, SortSpec,
};
use ghgscope_client::Client;
use std::collections::BTreeMap;
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};
use url::Url;

fn mock_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    Ok((server, addr))
}

fn respond_json(request: Request, status: u16, body: &str) {
    let response = Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        );
    request.respond(response).expect("response should succeed");
}

fn query_pairs(request: &Request) -> BTreeMap<String, String> {
    let url = Url::parse(&format!("http://mock{}", request.url())).expect("valid request url");
    url.query_pairs().into_owned().collect()
}

fn sample_record() -> RowRecord {
    RowRecord {
        id: RecordId::new(3),
        company_name: "Borealis Power".to_owned(),
        isin: Some("DE0000000003".to_owned()),
        ticker: Some("BP".to_owned()),
        weight: Some(0.5),
        sector: Some("Energy".to_owned()),
        region: Some("Europe".to_owned()),
        country: Some("Germany".to_owned()),
        scope1_direct: Some(300.0),
        scope2_location: None,
        scope2_market: Some(12.5),
    }
}

#[test]
fn unreachable_service_is_a_network_error() {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .filter_options()
        .expect_err("call should fail for unreachable endpoint");
    assert_eq!(error.kind(), "network");
    assert!(error.to_string().contains("127.0.0.1:1"));
}

#[test]
fn slow_service_times_out_without_retry() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/get_filters");
        thread::sleep(Duration::from_millis(400));
        let _ = request.respond(Response::from_string("{}"));
        let retried = server
            .recv_timeout(Duration::from_millis(300))
            .expect("server should stay healthy");
        assert!(retried.is_none(), "client must not retry after a timeout");
    });

    let client = Client::new(&addr, Duration::from_millis(100))?;
    match client.filter_options() {
        Err(ServiceError::Network(message)) => {
            assert!(message.contains("did not answer within 100ms"), "{message}");
        }
        other => panic!("expected a network timeout, got {other:?}"),
    }

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn rows_send_descriptor_and_paging() -> Result<()> {
    let (server, addr) = mock_server()?;
    let descriptor = QueryDescriptor {
        predicates: vec![
            Predicate::Search {
                needle: "acme".to_owned(),
            },
            Predicate::Facet {
                facet: Facet::Sector,
                value: "Energy".to_owned(),
            },
        ],
        order: Some(SortSpec {
            column: SortColumn::Scope2Market,
            direction: SortDirection::Asc,
        }),
        ..QueryDescriptor::default()
    };
    let expected = descriptor.clone();

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert!(request.url().starts_with("/get_data?"));
        let pairs = query_pairs(&request);
        assert_eq!(pairs["page"], "2");
        assert_eq!(pairs["items_per_page"], "10");
        let sent: QueryDescriptor =
            serde_json::from_str(&pairs["query"]).expect("descriptor should decode");
        assert_eq!(sent, expected);
        respond_json(
            request,
            200,
            r#"{"data":[{"id":1,"company_name":"Acme Energy","area":"Americas","scope1_direct":100.0}],"totalItems":11}"#,
        );
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let page = client.rows(&descriptor, 2, 10)?;
    assert_eq!(page.total_items, 11);
    assert_eq!(page.rows[0].company_name, "Acme Energy");
    assert_eq!(page.rows[0].region.as_deref(), Some("Americas"));
    assert_eq!(page.rows[0].isin, None);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn filters_and_region_map_decode() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/get_filters");
        respond_json(
            request,
            200,
            r#"{"sectors":["Energy"],"regions":["Europe"],"countries":["France","Germany"]}"#,
        );
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/get_region_country_map");
        respond_json(request, 200, r#"{"Europe":["France","Germany"]}"#);
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let options = client.filter_options()?;
    assert_eq!(options.countries, ["France", "Germany"]);
    let map = client.region_country_map()?;
    assert_eq!(map["Europe"].len(), 2);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn chart_routes_carry_dimension_and_query() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/get_chart_items?group_by=region");
        respond_json(request, 200, r#"["Americas","Europe"]"#);

        let mut request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/get_chart_data");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("body should read");
        let sent: AggregateQuery = serde_json::from_str(&body).expect("query should decode");
        assert_eq!(sent.dimension, ChartDimension::Region);
        assert_eq!(sent.metrics, [Metric::Total]);
        respond_json(
            request,
            200,
            r#"[{"label":"Europe","values":[{"metric":"total","value":420.5}]}]"#,
        );
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let items = client.chart_items(ChartDimension::Region)?;
    assert_eq!(items, ["Americas", "Europe"]);
    let points = client.chart_data(&AggregateQuery {
        dimension: ChartDimension::Region,
        entities: vec!["Europe".to_owned()],
        metrics: vec![Metric::Total],
    })?;
    assert_eq!(points[0].value(Metric::Total), Some(420.5));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn login_failures_are_auth_errors() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/login");
        respond_json(request, 200, r#"{"success":false}"#);
        let request = server.recv().expect("request expected");
        respond_json(request, 401, r#"{"message":"locked out"}"#);
        let request = server.recv().expect("request expected");
        respond_json(request, 200, r#"{"success":true}"#);
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let credentials = Credentials {
        username: "admin".to_owned(),
        password: "admin".to_owned(),
    };
    assert!(matches!(
        client.login(&credentials),
        Err(ServiceError::Auth(_))
    ));
    assert_eq!(
        client.login(&credentials),
        Err(ServiceError::Auth("locked out".to_owned()))
    );
    assert!(client.login(&credentials)?.success);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn rejected_update_is_a_validation_error() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/update_row");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("body should read");
        assert!(body.contains("\"country_region\":\"Germany\""));
        respond_json(
            request,
            200,
            r#"{"success":false,"message":"sector must not be empty"}"#,
        );

        let request = server.recv().expect("request expected");
        respond_json(request, 200, "not json");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    assert_eq!(
        client.update_row(&sample_record()),
        Err(ServiceError::Validation("sector must not be empty".to_owned()))
    );
    let malformed = client
        .update_row(&sample_record())
        .expect_err("body is not json");
    assert_eq!(malformed.kind(), "malformed_response");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn reference_data_may_be_null() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/get_reference_data/3");
        respond_json(request, 200, "null");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    assert_eq!(client.reference_data(RecordId::new(3))?, None);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn download_writes_csv_without_sort() -> Result<()> {
    let (server, addr) = mock_server()?;
    let dir = tempfile::tempdir()?;
    let dest = dir.path().join("nested").join("rows.csv");

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert!(request.url().starts_with("/download_data?"));
        let pairs = query_pairs(&request);
        let sent: QueryDescriptor =
            serde_json::from_str(&pairs["query"]).expect("descriptor should decode");
        assert_eq!(sent.order, None);
        let response = Response::from_string("id,company_name\n1,Acme Energy\n2,Acme Foods\n")
            .with_status_code(200)
            .with_header(
                Header::from_bytes("Content-Type", "text/csv").expect("valid content type header"),
            );
        request.respond(response).expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let descriptor = QueryDescriptor {
        order: Some(SortSpec {
            column: SortColumn::Scope1Direct,
            direction: SortDirection::Desc,
        }),
        ..QueryDescriptor::default()
    };
    assert_eq!(client.download(&descriptor, &dest)?, 2);
    let written = std::fs::read_to_string(&dest)?;
    assert!(written.contains("Acme Foods"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn server_errors_surface_status() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        respond_json(request, 503, "maintenance");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client.all_rows().expect_err("503 should fail");
    assert_eq!(
        error,
        ServiceError::Network("server error (503): maintenance".to_owned())
    );

    handle.join().expect("server thread should join");
    Ok(())
}
