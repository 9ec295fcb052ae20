// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    AdminEditSession, ChartCommand, ChartController, ChartEvent, DataService, DownloadTicket,
    EditCommand, EditEvent, Explorer, ExplorerCommand, ExplorerEvent, FilterOptions,
    NavigationParams, RegionCountryMap, ServiceRequest, ServiceResponse,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub explorer: Explorer,
    pub chart: ChartController,
    pub admin: AdminEditSession,
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Explorer(ExplorerCommand),
    Chart(ChartCommand),
    Edit(EditCommand),
    /// Opens an edit on the row at this position of the current page.
    EditRow(usize),
    Download(PathBuf),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Request(ServiceRequest),
    StatusUpdated(String),
    StatusCleared,
    Repaint,
}

impl AppState {
    pub fn new(options: FilterOptions, map: RegionCountryMap) -> Self {
        Self {
            explorer: Explorer::new(options, map),
            chart: ChartController::default(),
            admin: AdminEditSession::default(),
            status_line: None,
        }
    }

    /// Loads facet options and the region map. Either failing leaves that part empty.
    pub fn load(service: &dyn DataService) -> Self {
        let options = service.filter_options().unwrap_or_else(|err| {
            warn!(kind = err.kind(), error = %err, "filter options unavailable");
            FilterOptions::default()
        });
        let map = service.region_country_map().unwrap_or_else(|err| {
            warn!(kind = err.kind(), error = %err, "region map unavailable");
            Default::default()
        });
        info!(
            sectors = options.sectors.len(),
            regions = map.len(),
            "explorer options loaded"
        );
        Self::new(options, RegionCountryMap::new(map))
    }

    /// First table load, optionally restoring a shared location, plus the chart's entry list.
    pub fn start(&mut self, restore: Option<&NavigationParams>) -> Vec<AppEvent> {
        let table = match restore {
            Some(params) => self.explorer.restore(params),
            None => self.explorer.start(),
        };
        let mut events = self.from_explorer(table);
        let chart = self.chart.init();
        events.extend(self.from_chart(chart));
        events
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::Explorer(command) => {
                let events = self.explorer.dispatch(command);
                self.from_explorer(events)
            }
            AppCommand::Chart(command) => {
                let events = self.chart.dispatch(command);
                self.from_chart(events)
            }
            AppCommand::Edit(command) => {
                let events = self.admin.dispatch(command);
                self.from_edit(events)
            }
            AppCommand::EditRow(index) => match self.explorer.rows().row(index).cloned() {
                Some(row) => {
                    let events = self.admin.dispatch(EditCommand::Open(row));
                    self.from_edit(events)
                }
                None => vec![self.set_status("no row selected")],
            },
            AppCommand::Download(dest) => {
                let ticket = DownloadTicket {
                    query: self.explorer.download_query(),
                    dest,
                };
                vec![
                    self.set_status("download started"),
                    AppEvent::Request(ServiceRequest::Download(ticket)),
                ]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn handle_response(&mut self, response: ServiceResponse) -> Vec<AppEvent> {
        match response {
            ServiceResponse::Rows { seq, result } => {
                let events = self.explorer.complete_rows(seq, result);
                self.from_explorer(events)
            }
            ServiceResponse::ChartItems { seq, result } => {
                let events = self.chart.complete_items(seq, result);
                self.from_chart(events)
            }
            ServiceResponse::ChartData { seq, result } => {
                let events = self.chart.complete_data(seq, result);
                self.from_chart(events)
            }
            ServiceResponse::Reference { seq, result } => {
                let events = self.admin.complete_reference(seq, result);
                self.from_edit(events)
            }
            ServiceResponse::Save { seq, result } => {
                let events = self.admin.complete_save(seq, result);
                self.from_edit(events)
            }
            ServiceResponse::Login {
                seq,
                username,
                result,
            } => {
                let events = self.admin.complete_login(seq, &username, result);
                self.from_edit(events)
            }
            ServiceResponse::Download { dest, result } => match result {
                Ok(rows) => {
                    info!(rows, dest = %dest.display(), "download written");
                    vec![self.set_status(&format!("downloaded {rows} rows to {}", dest.display()))]
                }
                Err(err) => {
                    warn!(kind = err.kind(), error = %err, "download failed");
                    vec![self.set_status(&format!("download failed: {err}"))]
                }
            },
        }
    }

    fn from_explorer(&mut self, events: Vec<ExplorerEvent>) -> Vec<AppEvent> {
        let mut out = Vec::new();
        let mut repaint = false;
        for event in events {
            match event {
                ExplorerEvent::FetchRequested(ticket) => {
                    out.push(AppEvent::Request(ServiceRequest::Rows(ticket)));
                }
                ExplorerEvent::Notice(message) => out.push(self.set_status(&message)),
                _ => repaint = true,
            }
        }
        if repaint {
            out.push(AppEvent::Repaint);
        }
        out
    }

    fn from_chart(&mut self, events: Vec<ChartEvent>) -> Vec<AppEvent> {
        let mut out = Vec::new();
        let mut repaint = false;
        for event in events {
            match event {
                ChartEvent::ItemsRequested(ticket) => {
                    out.push(AppEvent::Request(ServiceRequest::ChartItems(ticket)));
                }
                ChartEvent::DataRequested(ticket) => {
                    out.push(AppEvent::Request(ServiceRequest::ChartData(ticket)));
                }
                ChartEvent::Notice(message) => out.push(self.set_status(&message)),
                _ => repaint = true,
            }
        }
        if repaint {
            out.push(AppEvent::Repaint);
        }
        out
    }

    fn from_edit(&mut self, events: Vec<EditEvent>) -> Vec<AppEvent> {
        let mut out = Vec::new();
        let mut repaint = false;
        for event in events {
            match event {
                EditEvent::LoginRequested(ticket) => {
                    out.push(AppEvent::Request(ServiceRequest::Login(ticket)));
                }
                EditEvent::ReferenceRequested(ticket) => {
                    out.push(AppEvent::Request(ServiceRequest::Reference(ticket)));
                }
                EditEvent::SaveRequested(ticket) => {
                    out.push(AppEvent::Request(ServiceRequest::Save(ticket)));
                }
                EditEvent::Saved(id) => {
                    out.push(self.set_status(&format!("record {} saved", id.get())));
                    let refresh = self.explorer.dispatch(ExplorerCommand::Refresh);
                    out.extend(self.from_explorer(refresh));
                }
                EditEvent::Notice(message) => out.push(self.set_status(&message)),
                EditEvent::RoleChanged(_) | EditEvent::PhaseChanged(_) | EditEvent::FieldChanged(_) => {
                    repaint = true;
                }
            }
        }
        if repaint {
            out.push(AppEvent::Repaint);
        }
        out
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::{
        AggregateQuery, AllRows, ChartDimension, ChartPoint, Credentials, DataService,
        EditCommand, ExplorerCommand, FilterOptions, LoginOutcome, QueryDescriptor, RecordId,
        ReferenceRecord, RowPage, RowRecord, Selection, ServiceError, ServiceRequest,
        ServiceResponse, ServiceResult, SortColumn, WriteOutcome, execute,
    };
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    struct FakeService {
        reachable: bool,
    }

    fn row(id: i64) -> RowRecord {
        RowRecord {
            id: RecordId::new(id),
            company_name: format!("Company {id}"),
            isin: None,
            ticker: None,
            weight: None,
            sector: Some("Energy".to_owned()),
            region: Some("Europe".to_owned()),
            country: Some("France".to_owned()),
            scope1_direct: Some(10.0),
            scope2_location: Some(5.0),
            scope2_market: Some(2.0),
        }
    }

    impl FakeService {
        fn check(&self) -> ServiceResult<()> {
            if self.reachable {
                Ok(())
            } else {
                Err(ServiceError::Network("connection refused".to_owned()))
            }
        }
    }

    impl DataService for FakeService {
        fn filter_options(&self) -> ServiceResult<FilterOptions> {
            self.check()?;
            Ok(FilterOptions {
                sectors: vec!["Energy".to_owned()],
                regions: vec!["Europe".to_owned()],
                countries: vec!["France".to_owned()],
            })
        }

        fn region_country_map(&self) -> ServiceResult<BTreeMap<String, Vec<String>>> {
            self.check()?;
            Ok(BTreeMap::from([(
                "Europe".to_owned(),
                vec!["France".to_owned()],
            )]))
        }

        fn rows(&self, _: &QueryDescriptor, _: u32, _: u32) -> ServiceResult<RowPage> {
            self.check()?;
            Ok(RowPage {
                rows: vec![row(1), row(2)],
                total_items: 2,
            })
        }

        fn all_rows(&self) -> ServiceResult<AllRows> {
            self.check()?;
            Ok(AllRows::default())
        }

        fn chart_items(&self, _: ChartDimension) -> ServiceResult<Vec<String>> {
            self.check()?;
            Ok(vec!["Company 1".to_owned()])
        }

        fn chart_data(&self, _: &AggregateQuery) -> ServiceResult<Vec<ChartPoint>> {
            self.check()?;
            Ok(Vec::new())
        }

        fn reference_data(&self, _: RecordId) -> ServiceResult<Option<ReferenceRecord>> {
            self.check()?;
            Ok(None)
        }

        fn login(&self, credentials: &Credentials) -> ServiceResult<LoginOutcome> {
            self.check()?;
            Ok(LoginOutcome {
                success: credentials.password == "admin",
            })
        }

        fn update_row(&self, _: &RowRecord) -> ServiceResult<WriteOutcome> {
            self.check()?;
            Ok(WriteOutcome::accepted())
        }

        fn download(&self, _: &QueryDescriptor, _: &Path) -> ServiceResult<u64> {
            self.check()?;
            Ok(2)
        }
    }

    fn requests(events: &[AppEvent]) -> Vec<ServiceRequest> {
        events
            .iter()
            .filter_map(|event| match event {
                AppEvent::Request(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Executes every request inline until the state stops asking for work.
    fn settle(state: &mut AppState, service: &FakeService, mut events: Vec<AppEvent>) {
        for _ in 0..16 {
            let pending = requests(&events);
            if pending.is_empty() {
                return;
            }
            events = pending
                .into_iter()
                .flat_map(|request| state.handle_response(execute(service, request)))
                .collect();
        }
        panic!("requests never settled");
    }

    #[test]
    fn unreachable_service_loads_empty_options() {
        let state = AppState::load(&FakeService { reachable: false });
        assert!(state.explorer.filters().options().sectors.is_empty());
        assert!(state.explorer.filters().allowed_countries().is_empty());
    }

    #[test]
    fn start_requests_rows_and_chart_entries() {
        let service = FakeService { reachable: true };
        let mut state = AppState::load(&service);
        let events = state.start(None);
        let names: Vec<&str> = requests(&events).iter().map(ServiceRequest::name).collect();
        assert_eq!(names, vec!["rows", "chart_items"]);

        settle(&mut state, &service, events);
        assert_eq!(state.explorer.rows().rows().len(), 2);
        assert_eq!(state.chart.available(), &["Company 1".to_owned()]);
        assert_eq!(
            state.explorer.navigation().current(),
            Some("?page=1&sector=all&region=all&country=all")
        );
    }

    #[test]
    fn explorer_notice_becomes_status() {
        let mut state = AppState::load(&FakeService { reachable: true });
        let events = state.dispatch(AppCommand::Explorer(ExplorerCommand::SetSector(
            Selection::only("Utilities"),
        )));
        assert!(requests(&events).is_empty());
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("unknown sector"))
        );
    }

    #[test]
    fn saved_edit_refreshes_rows() {
        let service = FakeService { reachable: true };
        let mut state = AppState::load(&service);
        let events = state.start(None);
        settle(&mut state, &service, events);

        let events = state.dispatch(AppCommand::Edit(EditCommand::Login(Credentials {
            username: "admin".to_owned(),
            password: "admin".to_owned(),
        })));
        settle(&mut state, &service, events);

        let events = state.dispatch(AppCommand::EditRow(1));
        settle(&mut state, &service, events);

        let events = state.dispatch(AppCommand::Edit(EditCommand::Save));
        let save = requests(&events);
        assert_eq!(save.len(), 1);
        let response = execute(&service, save[0].clone());
        let after = state.handle_response(response);
        let names: Vec<&str> = requests(&after).iter().map(ServiceRequest::name).collect();
        assert_eq!(names, vec!["rows"]);
        assert_eq!(state.status_line.as_deref(), Some("record 2 saved"));
    }

    #[test]
    fn download_ignores_sort() {
        let mut state = AppState::load(&FakeService { reachable: true });
        state.dispatch(AppCommand::Explorer(ExplorerCommand::ClickSort(
            SortColumn::Scope1Direct,
        )));
        let events = state.dispatch(AppCommand::Download(PathBuf::from("/tmp/out.csv")));
        match requests(&events).as_slice() {
            [ServiceRequest::Download(ticket)] => assert_eq!(ticket.query.order, None),
            other => panic!("expected a download request, got {other:?}"),
        }

        let status = state.handle_response(ServiceResponse::Download {
            dest: PathBuf::from("/tmp/out.csv"),
            result: Ok(2),
        });
        assert_eq!(
            status,
            vec![AppEvent::StatusUpdated(
                "downloaded 2 rows to /tmp/out.csv".to_owned()
            )]
        );
    }
}
