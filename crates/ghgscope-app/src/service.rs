// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{
    AggregateQuery, AllRows, ChartDataTicket, ChartDimension, ChartItemsTicket, ChartPoint,
    Credentials, FetchTicket, FilterOptions, LoginOutcome, LoginTicket, QueryDescriptor, RecordId,
    ReferenceRecord, ReferenceTicket, RowPage, RowRecord, SaveTicket, ServiceResult, WriteOutcome,
};

/// The data seam. Implemented in-process over SQLite and remotely over HTTP.
pub trait DataService {
    fn filter_options(&self) -> ServiceResult<FilterOptions>;
    fn region_country_map(&self) -> ServiceResult<BTreeMap<String, Vec<String>>>;
    fn rows(&self, query: &QueryDescriptor, page: u32, page_size: u32) -> ServiceResult<RowPage>;
    fn all_rows(&self) -> ServiceResult<AllRows>;
    fn chart_items(&self, dimension: ChartDimension) -> ServiceResult<Vec<String>>;
    fn chart_data(&self, query: &AggregateQuery) -> ServiceResult<Vec<ChartPoint>>;
    fn reference_data(&self, id: RecordId) -> ServiceResult<Option<ReferenceRecord>>;
    fn login(&self, credentials: &Credentials) -> ServiceResult<LoginOutcome>;
    fn update_row(&self, record: &RowRecord) -> ServiceResult<WriteOutcome>;
    /// Writes matching rows as CSV to `dest` and returns the number of data rows.
    fn download(&self, query: &QueryDescriptor, dest: &Path) -> ServiceResult<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub query: QueryDescriptor,
    pub dest: PathBuf,
}

/// Work handed from the controllers to a runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    Rows(FetchTicket),
    ChartItems(ChartItemsTicket),
    ChartData(ChartDataTicket),
    Reference(ReferenceTicket),
    Save(SaveTicket),
    Login(LoginTicket),
    Download(DownloadTicket),
}

impl ServiceRequest {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::ChartItems(_) => "chart_items",
            Self::ChartData(_) => "chart_data",
            Self::Reference(_) => "reference_data",
            Self::Save(_) => "update_row",
            Self::Login(_) => "login",
            Self::Download(_) => "download",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    Rows {
        seq: u64,
        result: ServiceResult<RowPage>,
    },
    ChartItems {
        seq: u64,
        result: ServiceResult<Vec<String>>,
    },
    ChartData {
        seq: u64,
        result: ServiceResult<Vec<ChartPoint>>,
    },
    Reference {
        seq: u64,
        result: ServiceResult<Option<ReferenceRecord>>,
    },
    Save {
        seq: u64,
        result: ServiceResult<WriteOutcome>,
    },
    Login {
        seq: u64,
        username: String,
        result: ServiceResult<LoginOutcome>,
    },
    Download {
        dest: PathBuf,
        result: ServiceResult<u64>,
    },
}

/// Runs one request to completion. Runtimes call this inline or on a worker thread.
pub fn execute(service: &dyn DataService, request: ServiceRequest) -> ServiceResponse {
    match request {
        ServiceRequest::Rows(ticket) => ServiceResponse::Rows {
            seq: ticket.seq,
            result: service.rows(&ticket.query, ticket.page, ticket.page_size),
        },
        ServiceRequest::ChartItems(ticket) => ServiceResponse::ChartItems {
            seq: ticket.seq,
            result: service.chart_items(ticket.dimension),
        },
        ServiceRequest::ChartData(ticket) => ServiceResponse::ChartData {
            seq: ticket.seq,
            result: service.chart_data(&ticket.query),
        },
        ServiceRequest::Reference(ticket) => ServiceResponse::Reference {
            seq: ticket.seq,
            result: service.reference_data(ticket.id),
        },
        ServiceRequest::Save(ticket) => ServiceResponse::Save {
            seq: ticket.seq,
            result: service.update_row(&ticket.record),
        },
        ServiceRequest::Login(ticket) => ServiceResponse::Login {
            seq: ticket.seq,
            result: service.login(&ticket.credentials),
            username: ticket.credentials.username,
        },
        ServiceRequest::Download(ticket) => ServiceResponse::Download {
            result: service.download(&ticket.query, &ticket.dest),
            dest: ticket.dest,
        },
    }
}
