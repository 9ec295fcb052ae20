// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::{
    DataFetchController, Facet, FetchOutcome, FetchTicket, FilterOptions, FilterState,
    NavigationParams, NavigationSync, PageState, QueryDescriptor, RegionCountryMap, RowPage,
    SearchState, Selection, ServiceResult, SortColumn, SortSpec, SortState, build_query,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorerCommand {
    SetSector(Selection),
    SetRegion(Selection),
    SetCountry(Selection),
    Search(String),
    ClickSort(SortColumn),
    CommitPage(i64),
    NextPage,
    PrevPage,
    ClearAll,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorerEvent {
    FilterChanged { facet: Facet, value: Selection },
    CountryOptionsChanged(Vec<String>),
    SearchChanged(String),
    SortChanged(Option<SortSpec>),
    PageChanged(u32),
    FetchRequested(FetchTicket),
    RowsRepainted { total_items: u64, total_pages: u32 },
    LocationChanged(String),
    Notice(String),
}

/// Owns the table's view slices. Each command touches one slice, then the query is rebuilt.
#[derive(Debug, Clone, PartialEq)]
pub struct Explorer {
    filters: FilterState,
    search: SearchState,
    sort: SortState,
    pages: PageState,
    fetch: DataFetchController,
    navigation: NavigationSync,
    query: QueryDescriptor,
    /// Location each in-flight row request was issued for.
    pending: BTreeMap<u64, NavigationParams>,
}

impl Explorer {
    pub fn new(options: FilterOptions, map: RegionCountryMap) -> Self {
        let filters = FilterState::new(options, map);
        let search = SearchState::default();
        let sort = SortState::default();
        let query = build_query(&filters, &search, &sort);
        Self {
            filters,
            search,
            sort,
            pages: PageState::default(),
            fetch: DataFetchController::default(),
            navigation: NavigationSync::default(),
            query,
            pending: BTreeMap::new(),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn pages(&self) -> &PageState {
        &self.pages
    }

    pub fn rows(&self) -> &DataFetchController {
        &self.fetch
    }

    pub fn navigation(&self) -> &NavigationSync {
        &self.navigation
    }

    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Current filters and search without sort; downloads ignore ordering and paging.
    pub fn download_query(&self) -> QueryDescriptor {
        self.query.without_order()
    }

    pub fn location(&self) -> NavigationParams {
        NavigationParams {
            page: self.pages.index(),
            sector: self.filters.sector().clone(),
            region: self.filters.region().clone(),
            country: self.filters.country().clone(),
        }
    }

    /// Initial load at page 1 with every facet at `all`.
    pub fn start(&mut self) -> Vec<ExplorerEvent> {
        vec![self.issue_fetch()]
    }

    /// Applies location parameters, falling back to `all` for anything that no longer fits.
    pub fn restore(&mut self, params: &NavigationParams) -> Vec<ExplorerEvent> {
        let mut events = Vec::new();
        let facets = [
            (Facet::Sector, &params.sector),
            (Facet::Region, &params.region),
            (Facet::Country, &params.country),
        ];
        for (facet, value) in facets {
            match self.filters.set(facet, value.clone()) {
                Ok(true) => events.push(ExplorerEvent::FilterChanged {
                    facet,
                    value: value.clone(),
                }),
                Ok(false) => {}
                Err(err) => {
                    warn!(facet = facet.param(), error = %err, "ignoring restored filter");
                }
            }
        }
        if !self.filters.region().is_all() {
            events.push(ExplorerEvent::CountryOptionsChanged(
                self.filters.allowed_countries().to_vec(),
            ));
        }
        self.pages.restore(params.page);
        info!(location = %params.to_query_string(), "restoring view");
        events.push(ExplorerEvent::PageChanged(self.pages.index()));
        self.rebuild_query();
        events.push(self.issue_fetch());
        events
    }

    pub fn dispatch(&mut self, command: ExplorerCommand) -> Vec<ExplorerEvent> {
        match command {
            ExplorerCommand::SetSector(value) => self.set_facet(Facet::Sector, value),
            ExplorerCommand::SetRegion(value) => self.set_facet(Facet::Region, value),
            ExplorerCommand::SetCountry(value) => self.set_facet(Facet::Country, value),
            ExplorerCommand::Search(raw) => {
                if !self.search.set(raw) {
                    return Vec::new();
                }
                let mut events = vec![ExplorerEvent::SearchChanged(self.search.raw().to_owned())];
                self.refetch_from_first_page(&mut events);
                events
            }
            ExplorerCommand::ClickSort(column) => {
                let spec = self.sort.click(column);
                let mut events = vec![ExplorerEvent::SortChanged(Some(spec))];
                self.refetch_from_first_page(&mut events);
                events
            }
            ExplorerCommand::CommitPage(page) => {
                let moved = self.pages.commit(page);
                self.page_moved(moved)
            }
            ExplorerCommand::NextPage => {
                let moved = self.pages.next();
                self.page_moved(moved)
            }
            ExplorerCommand::PrevPage => {
                let moved = self.pages.prev();
                self.page_moved(moved)
            }
            ExplorerCommand::ClearAll => self.clear_all(),
            ExplorerCommand::Refresh => vec![self.issue_fetch()],
        }
    }

    pub fn complete_rows(&mut self, seq: u64, result: ServiceResult<RowPage>) -> Vec<ExplorerEvent> {
        let issued_for = self.pending.remove(&seq);
        let outcome = self.fetch.complete(seq, result);
        if !matches!(outcome, FetchOutcome::Stale) {
            self.pending.retain(|pending, _| *pending > seq);
        }
        match outcome {
            FetchOutcome::Stale => Vec::new(),
            FetchOutcome::Failed(err) => {
                vec![ExplorerEvent::Notice(format!("could not load rows: {err}"))]
            }
            FetchOutcome::Applied { total_items } => {
                self.pages.set_total_items(total_items);
                if self.pages.is_out_of_range() {
                    return self.clamp_restored_page();
                }
                let mut events = vec![ExplorerEvent::RowsRepainted {
                    total_items,
                    total_pages: self.pages.total_pages(),
                }];
                let shown = issued_for.unwrap_or_else(|| self.location());
                if let Some(location) = self.navigation.push(&shown) {
                    events.push(ExplorerEvent::LocationChanged(location));
                }
                events
            }
        }
    }

    fn set_facet(&mut self, facet: Facet, value: Selection) -> Vec<ExplorerEvent> {
        match self.filters.set(facet, value.clone()) {
            Ok(false) => Vec::new(),
            Ok(true) => {
                let mut events = vec![ExplorerEvent::FilterChanged { facet, value }];
                if facet == Facet::Region {
                    events.push(ExplorerEvent::FilterChanged {
                        facet: Facet::Country,
                        value: Selection::All,
                    });
                    events.push(ExplorerEvent::CountryOptionsChanged(
                        self.filters.allowed_countries().to_vec(),
                    ));
                }
                self.refetch_from_first_page(&mut events);
                events
            }
            Err(err) => {
                warn!(facet = facet.param(), error = %err, "filter change rejected");
                vec![ExplorerEvent::Notice(err.to_string())]
            }
        }
    }

    fn clear_all(&mut self) -> Vec<ExplorerEvent> {
        let mut events = Vec::new();
        if self.search.clear() {
            events.push(ExplorerEvent::SearchChanged(String::new()));
        }
        if self.filters.reset() {
            for facet in Facet::ALL {
                events.push(ExplorerEvent::FilterChanged {
                    facet,
                    value: Selection::All,
                });
            }
            events.push(ExplorerEvent::CountryOptionsChanged(
                self.filters.allowed_countries().to_vec(),
            ));
        }
        if self.sort.reset() {
            events.push(ExplorerEvent::SortChanged(None));
        }
        self.refetch_from_first_page(&mut events);
        events
    }

    fn page_moved(&mut self, moved: Option<u32>) -> Vec<ExplorerEvent> {
        match moved {
            Some(page) => vec![ExplorerEvent::PageChanged(page), self.issue_fetch()],
            None => Vec::new(),
        }
    }

    fn clamp_restored_page(&mut self) -> Vec<ExplorerEvent> {
        let clamped = self.pages.clamp(i64::from(self.pages.index()));
        self.pages.restore(clamped);
        let mut events = vec![ExplorerEvent::PageChanged(clamped)];
        if self.pages.total_pages() == 0 {
            events.push(ExplorerEvent::RowsRepainted {
                total_items: 0,
                total_pages: 0,
            });
            if let Some(location) = self.navigation.push(&self.location()) {
                events.push(ExplorerEvent::LocationChanged(location));
            }
        } else {
            events.push(self.issue_fetch());
        }
        events
    }

    fn refetch_from_first_page(&mut self, events: &mut Vec<ExplorerEvent>) {
        if self.pages.reset() {
            events.push(ExplorerEvent::PageChanged(1));
        }
        self.rebuild_query();
        events.push(self.issue_fetch());
    }

    fn rebuild_query(&mut self) {
        self.query = build_query(&self.filters, &self.search, &self.sort);
    }

    fn issue_fetch(&mut self) -> ExplorerEvent {
        let ticket = self
            .fetch
            .request(self.query.clone(), self.pages.index(), self.pages.size());
        self.pending.insert(ticket.seq, self.location());
        ExplorerEvent::FetchRequested(ticket)
    }
}
