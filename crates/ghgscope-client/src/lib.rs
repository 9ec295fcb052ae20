// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use ghgscope_app::{
    AggregateQuery, AllRows, ChartDimension, ChartPoint, Credentials, DataService, FilterOptions,
    LoginOutcome, QueryDescriptor, RecordId, ReferenceRecord, RowPage, RowRecord, ServiceError,
    ServiceResult, WriteOutcome,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP implementation of [`DataService`].
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("service.base_url must not be empty");
        }
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("parse service.base_url {trimmed:?}; use http://host:port"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "service.base_url {trimmed:?} must use http or https, got {}",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        self.base_url
            .join(path)
            .map_err(|error| ServiceError::Network(format!("invalid route {path:?}: {error}")))
    }

    fn get(&self, path: &str) -> ServiceResult<RequestBuilder> {
        Ok(self.http.get(self.endpoint(path)?))
    }

    fn post(&self, path: &str) -> ServiceResult<RequestBuilder> {
        Ok(self.http.post(self.endpoint(path)?))
    }

    fn send(&self, route: &str, request: RequestBuilder) -> ServiceResult<Response> {
        debug!(route, "sending request");
        let response = request
            .send()
            .map_err(|error| connection_error(self.base_url(), self.timeout, error))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let error = clean_error_response(status, &body);
        warn!(route, status = status.as_u16(), error = %error, "request failed");
        Err(error)
    }

    fn decode<T: DeserializeOwned>(route: &str, response: Response) -> ServiceResult<T> {
        response
            .json()
            .map_err(|error| ServiceError::MalformedResponse(format!("decode {route}: {error}")))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ServiceResult<T> {
        let response = self.send(path, self.get(path)?.query(query))?;
        Self::decode(path, response)
    }

    fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ServiceResult<T> {
        let response = self.send(path, self.post(path)?.json(body))?;
        Self::decode(path, response)
    }
}

impl DataService for Client {
    fn filter_options(&self) -> ServiceResult<FilterOptions> {
        self.get_json("get_filters", &[])
    }

    fn region_country_map(&self) -> ServiceResult<BTreeMap<String, Vec<String>>> {
        self.get_json("get_region_country_map", &[])
    }

    fn rows(&self, query: &QueryDescriptor, page: u32, page_size: u32) -> ServiceResult<RowPage> {
        self.get_json(
            "get_data",
            &[
                ("query", encode_query(query)?),
                ("page", page.to_string()),
                ("items_per_page", page_size.to_string()),
            ],
        )
    }

    fn all_rows(&self) -> ServiceResult<AllRows> {
        self.get_json("get_all_data", &[])
    }

    fn chart_items(&self, dimension: ChartDimension) -> ServiceResult<Vec<String>> {
        self.get_json("get_chart_items", &[("group_by", dimension.param().to_owned())])
    }

    fn chart_data(&self, query: &AggregateQuery) -> ServiceResult<Vec<ChartPoint>> {
        self.post_json("get_chart_data", query)
    }

    fn reference_data(&self, id: RecordId) -> ServiceResult<Option<ReferenceRecord>> {
        self.get_json(&format!("get_reference_data/{}", id.get()), &[])
    }

    fn login(&self, credentials: &Credentials) -> ServiceResult<LoginOutcome> {
        let body = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
        };
        let outcome: LoginOutcome = self.post_json("login", &body).map_err(|error| match error {
            ServiceError::Validation(message) => ServiceError::Auth(message),
            other => other,
        })?;
        if !outcome.success {
            return Err(ServiceError::Auth("invalid username or password".to_owned()));
        }
        Ok(outcome)
    }

    fn update_row(&self, record: &RowRecord) -> ServiceResult<WriteOutcome> {
        let outcome: WriteOutcome = self.post_json("update_row", record)?;
        if !outcome.success {
            return Err(ServiceError::Validation(
                outcome
                    .message
                    .unwrap_or_else(|| "the server refused the update".to_owned()),
            ));
        }
        Ok(outcome)
    }

    fn download(&self, query: &QueryDescriptor, dest: &Path) -> ServiceResult<u64> {
        let response = self.send(
            "download_data",
            self.get("download_data")?
                .query(&[("query", encode_query(&query.without_order())?)]),
        )?;
        let bytes = response
            .bytes()
            .map_err(|error| ServiceError::Network(format!("read download body: {error}")))?;
        let rows = count_csv_rows(&bytes)?;
        write_download(dest, &bytes)
            .map_err(|error| ServiceError::Network(format!("{error:#}")))?;
        Ok(rows)
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn encode_query(query: &QueryDescriptor) -> ServiceResult<String> {
    serde_json::to_string(query)
        .map_err(|error| ServiceError::Network(format!("encode query descriptor: {error}")))
}

fn count_csv_rows(bytes: &[u8]) -> ServiceResult<u64> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut rows = 0;
    for record in reader.records() {
        record.map_err(|error| ServiceError::MalformedResponse(format!("download is not CSV: {error}")))?;
        rows += 1;
    }
    Ok(rows)
}

fn write_download(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export directory {}", parent.display()))?;
    }
    fs::write(dest, bytes).with_context(|| format!("write {}", dest.display()))
}

fn connection_error(base_url: &str, timeout: Duration, error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        return ServiceError::Network(format!(
            "{base_url} did not answer within {}ms -- raise service.timeout or check the server",
            timeout.as_millis()
        ));
    }
    ServiceError::Network(format!(
        "cannot reach {base_url} -- start the data service or set service.mode = \"local\" ({error})"
    ))
}

fn clean_error_response(status: StatusCode, body: &str) -> ServiceError {
    let detail = server_message(body);
    let message = match &detail {
        Some(detail) => format!("server error ({}): {detail}", status.as_u16()),
        None => format!("server returned {}", status.as_u16()),
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ServiceError::Auth(detail.unwrap_or_else(|| "invalid username or password".to_owned()))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            ServiceError::Validation(detail.unwrap_or(message))
        }
        _ => ServiceError::Network(message),
    }
}

fn server_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.is_empty()
    {
        return Some(message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return Some(trimmed.to_owned());
    }
    None
}
