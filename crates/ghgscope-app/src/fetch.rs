// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, warn};

use crate::{QueryDescriptor, RowPage, RowRecord, ServiceError, ServiceResult};

/// Monotonic request tags with a last-applied watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestSequencer {
    issued: u64,
    applied: u64,
}

impl RequestSequencer {
    pub fn issue(&mut self) -> u64 {
        self.issued = self.issued.saturating_add(1);
        self.issued
    }

    /// Accepts `seq` only if it is newer than anything applied and was actually issued.
    pub fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied || seq > self.issued {
            return false;
        }
        self.applied = seq;
        true
    }

    /// Drops everything in flight.
    pub fn invalidate(&mut self) {
        self.applied = self.issued;
    }

    pub const fn in_flight(&self) -> bool {
        self.issued > self.applied
    }

    pub const fn latest(&self) -> u64 {
        self.issued
    }

    pub const fn applied(&self) -> u64 {
        self.applied
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub query: QueryDescriptor,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Applied { total_items: u64 },
    Stale,
    Failed(ServiceError),
}

/// Owns the row view and decides which responses may repaint it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFetchController {
    sequencer: RequestSequencer,
    rows: Vec<RowRecord>,
    total_items: u64,
    loaded: bool,
}

impl DataFetchController {
    pub fn request(&mut self, query: QueryDescriptor, page: u32, page_size: u32) -> FetchTicket {
        let seq = self.sequencer.issue();
        debug!(
            seq,
            page,
            page_size,
            predicates = query.predicates.len(),
            "row request issued"
        );
        FetchTicket {
            seq,
            query,
            page,
            page_size,
        }
    }

    pub fn complete(&mut self, seq: u64, result: ServiceResult<RowPage>) -> FetchOutcome {
        if !self.sequencer.accept(seq) {
            warn!(
                seq,
                applied = self.sequencer.applied(),
                "dropping stale row response"
            );
            return FetchOutcome::Stale;
        }
        match result {
            Ok(page) => {
                self.rows = page.rows;
                self.total_items = page.total_items;
                self.loaded = true;
                FetchOutcome::Applied {
                    total_items: self.total_items,
                }
            }
            Err(err) => {
                warn!(seq, kind = err.kind(), error = %err, "row request failed");
                FetchOutcome::Failed(err)
            }
        }
    }

    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RowRecord> {
        self.rows.get(index)
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn in_flight(&self) -> bool {
        self.sequencer.in_flight()
    }

    pub fn display_rows(&self) -> Vec<[String; 7]> {
        self.rows.iter().map(RowRecord::display_cells).collect()
    }
}
