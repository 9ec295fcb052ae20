// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use ghgscope_app::{ServiceRequest, ServiceResponse};
use ghgscope_client::Client;
use ghgscope_db::Store;
use ghgscope_tui::InternalEvent;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

/// Answers requests synchronously against a local store.
pub struct InlineRuntime<'a> {
    store: &'a Store,
    export_dir: PathBuf,
}

impl<'a> InlineRuntime<'a> {
    pub fn new(store: &'a Store, export_dir: PathBuf) -> Self {
        Self { store, export_dir }
    }
}

impl ghgscope_tui::AppRuntime for InlineRuntime<'_> {
    fn execute(&mut self, request: ServiceRequest) -> ServiceResponse {
        ghgscope_app::execute(self.store, request)
    }

    fn download_path(&mut self) -> PathBuf {
        next_download_path(&self.export_dir, OffsetDateTime::now_utc())
    }
}

/// Runs each request on its own thread so a slow server never blocks input.
pub struct ThreadedRuntime {
    client: Client,
    export_dir: PathBuf,
}

impl ThreadedRuntime {
    pub fn new(client: Client, export_dir: PathBuf) -> Self {
        Self { client, export_dir }
    }
}

impl ghgscope_tui::AppRuntime for ThreadedRuntime {
    fn execute(&mut self, request: ServiceRequest) -> ServiceResponse {
        ghgscope_app::execute(&self.client, request)
    }

    fn submit(&mut self, request: ServiceRequest, tx: &Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        let tx = tx.clone();
        let name = request.name();
        thread::Builder::new()
            .name(format!("ghgscope-{name}"))
            .spawn(move || {
                let response = ghgscope_app::execute(&client, request);
                if tx.send(InternalEvent::Response(response)).is_err() {
                    debug!(request = name, "response dropped after shutdown");
                }
            })
            .map_err(|error| anyhow!("spawn worker for {name}: {error}"))?;
        Ok(())
    }

    fn download_path(&mut self) -> PathBuf {
        next_download_path(&self.export_dir, OffsetDateTime::now_utc())
    }
}

fn next_download_path(dir: &Path, now: OffsetDateTime) -> PathBuf {
    let stamp = now
        .format(format_description!("[year][month][day]-[hour][minute][second]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());

    let first = dir.join(format!("ghgscope-{stamp}.csv"));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("ghgscope-{stamp}-{n}.csv")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::{InlineRuntime, ThreadedRuntime, next_download_path};
    use anyhow::Result;
    use ghgscope_app::{
        ChartDimension, ChartItemsTicket, FetchTicket, QueryDescriptor, ServiceRequest,
        ServiceResponse,
    };
    use ghgscope_client::Client;
    use ghgscope_db::Store;
    use ghgscope_tui::{AppRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::time::Duration;
    use time::macros::datetime;

    fn seeded_store() -> Result<Store> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        let demo = ghgscope_testkit::demo_dataset();
        store.seed(&demo.records, &demo.references)?;
        Ok(store)
    }

    #[test]
    fn download_path_is_timestamped_and_unique() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let now = datetime!(2026-03-04 05:06:07 UTC);

        let first = next_download_path(dir.path(), now);
        assert_eq!(first, dir.path().join("ghgscope-20260304-050607.csv"));

        std::fs::write(&first, "id\n")?;
        let second = next_download_path(dir.path(), now);
        assert_eq!(second, dir.path().join("ghgscope-20260304-050607-2.csv"));
        Ok(())
    }

    #[test]
    fn inline_runtime_answers_from_store() -> Result<()> {
        let store = seeded_store()?;
        let dir = tempfile::tempdir()?;
        let mut runtime = InlineRuntime::new(&store, dir.path().to_path_buf());
        let (tx, rx) = mpsc::channel();

        runtime.submit(
            ServiceRequest::Rows(FetchTicket {
                seq: 4,
                query: QueryDescriptor::default(),
                page: 1,
                page_size: 10,
            }),
            &tx,
        )?;

        match rx.try_recv()? {
            InternalEvent::Response(ServiceResponse::Rows { seq, result }) => {
                assert_eq!(seq, 4);
                let page = result?;
                assert_eq!(page.rows.len(), 10);
                assert_eq!(page.total_items, ghgscope_testkit::DEMO_COMPANY_COUNT as u64);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(runtime.download_path().starts_with(dir.path()));
        Ok(())
    }

    #[test]
    fn threaded_runtime_delivers_failures_as_responses() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
        let mut runtime = ThreadedRuntime::new(client, std::env::temp_dir());
        let (tx, rx) = mpsc::channel();

        runtime.submit(
            ServiceRequest::ChartItems(ChartItemsTicket {
                seq: 9,
                dimension: ChartDimension::Sector,
            }),
            &tx,
        )?;

        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::Response(ServiceResponse::ChartItems { seq, result }) => {
                assert_eq!(seq, 9);
                let error = result.expect_err("unreachable server should fail");
                assert_eq!(error.kind(), "network");
            }
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }
}
