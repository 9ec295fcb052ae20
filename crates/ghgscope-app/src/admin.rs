// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    Credentials, EditableField, FieldKind, LoginOutcome, RecordId, ReferenceRecord,
    RequestSequencer, Role, RowRecord, ServiceError, ServiceResult, WriteOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("editing requires the admin role -- log in first")]
    NotAdmin,
    #[error("an edit is already open -- save or cancel it first")]
    AlreadyOpen,
    #[error("no edit is open")]
    NotOpen,
    #[error("reference data is still loading -- wait a moment and retry")]
    NotReady,
    #[error("a save is in progress -- wait for it to finish")]
    SaveInFlight,
    #[error("{field} `{value}` is not a number -- enter digits like 1250.5 or leave it blank")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPhase {
    #[default]
    Closed,
    Loading,
    Ready,
    Saving,
}

impl EditPhase {
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceHints {
    Loading,
    Loaded(Option<ReferenceRecord>),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub target: RowRecord,
    pub draft: BTreeMap<EditableField, String>,
    pub reference: ReferenceHints,
    pub pending_write: Option<RowRecord>,
    pub error: Option<String>,
}

impl EditSession {
    fn new(target: RowRecord) -> Self {
        let draft = EditableField::ALL
            .into_iter()
            .map(|field| (field, field.read(&target)))
            .collect();
        Self {
            target,
            draft,
            reference: ReferenceHints::Loading,
            pending_write: None,
            error: None,
        }
    }

    pub fn value(&self, field: EditableField) -> &str {
        self.draft.get(&field).map(String::as_str).unwrap_or_default()
    }

    /// Target identity plus every editable field parsed from the draft.
    pub fn to_record(&self) -> Result<RowRecord, AdminError> {
        let mut record = self.target.clone();
        for field in EditableField::ALL {
            let raw = self.value(field).trim();
            match field.kind() {
                FieldKind::Text => {
                    let value = (!raw.is_empty()).then(|| raw.to_owned());
                    match field {
                        EditableField::Sector => record.sector = value,
                        EditableField::Region => record.region = value,
                        _ => record.country = value,
                    }
                }
                FieldKind::Number => {
                    let value = parse_number(field, raw)?;
                    match field {
                        EditableField::Scope1Direct => record.scope1_direct = value,
                        EditableField::Scope2Location => record.scope2_location = value,
                        _ => record.scope2_market = value,
                    }
                }
            }
        }
        Ok(record)
    }
}

fn parse_number(field: EditableField, raw: &str) -> Result<Option<f64>, AdminError> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(AdminError::InvalidNumber {
            field: field.label(),
            value: raw.to_owned(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTicket {
    pub seq: u64,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceTicket {
    pub seq: u64,
    pub id: RecordId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub seq: u64,
    pub record: RowRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    Login(Credentials),
    Logout,
    Open(RowRecord),
    SetField(EditableField, String),
    Save,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    LoginRequested(LoginTicket),
    RoleChanged(Role),
    ReferenceRequested(ReferenceTicket),
    SaveRequested(SaveTicket),
    PhaseChanged(EditPhase),
    FieldChanged(EditableField),
    Saved(RecordId),
    Notice(String),
}

/// Session role plus the one-row edit lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdminEditSession {
    role: Role,
    username: Option<String>,
    phase: EditPhase,
    session: Option<EditSession>,
    login_seq: RequestSequencer,
    reference_seq: RequestSequencer,
    save_seq: RequestSequencer,
}

impl AdminEditSession {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn phase(&self) -> EditPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn dispatch(&mut self, command: EditCommand) -> Vec<EditEvent> {
        let result = match command {
            EditCommand::Login(credentials) => Ok(self.login(credentials)),
            EditCommand::Logout => self.logout(),
            EditCommand::Open(target) => self.open(target),
            EditCommand::SetField(field, value) => self.set_field(field, value),
            EditCommand::Save => self.save(),
            EditCommand::Cancel => self.cancel(),
        };
        match result {
            Ok(events) => events,
            Err(err) => vec![EditEvent::Notice(err.to_string())],
        }
    }

    fn login(&mut self, credentials: Credentials) -> Vec<EditEvent> {
        let seq = self.login_seq.issue();
        debug!(seq, username = %credentials.username, "login requested");
        vec![EditEvent::LoginRequested(LoginTicket { seq, credentials })]
    }

    pub fn complete_login(
        &mut self,
        seq: u64,
        username: &str,
        result: ServiceResult<LoginOutcome>,
    ) -> Vec<EditEvent> {
        if !self.login_seq.accept(seq) {
            return Vec::new();
        }
        let failure = match result {
            Ok(LoginOutcome { success: true }) => {
                info!(username, "admin login");
                self.role = Role::Admin;
                self.username = Some(username.to_owned());
                return vec![
                    EditEvent::RoleChanged(Role::Admin),
                    EditEvent::Notice(format!("logged in as {username}")),
                ];
            }
            Ok(LoginOutcome { success: false }) => {
                ServiceError::Auth("invalid username or password".to_owned())
            }
            Err(err) => err,
        };
        warn!(username, kind = failure.kind(), error = %failure, "login failed");
        vec![EditEvent::Notice(failure.to_string())]
    }

    fn logout(&mut self) -> Result<Vec<EditEvent>, AdminError> {
        if self.phase == EditPhase::Saving {
            return Err(AdminError::SaveInFlight);
        }
        let mut events = Vec::new();
        if self.phase.is_open() {
            events.extend(self.close());
        }
        self.login_seq.invalidate();
        self.role = Role::Analyst;
        self.username = None;
        events.push(EditEvent::RoleChanged(Role::Analyst));
        Ok(events)
    }

    fn open(&mut self, target: RowRecord) -> Result<Vec<EditEvent>, AdminError> {
        if self.role != Role::Admin {
            return Err(AdminError::NotAdmin);
        }
        if self.phase.is_open() {
            return Err(AdminError::AlreadyOpen);
        }
        let id = target.id;
        self.session = Some(EditSession::new(target));
        self.phase = EditPhase::Loading;
        let seq = self.reference_seq.issue();
        debug!(seq, id = id.get(), "reference lookup requested");
        Ok(vec![
            EditEvent::PhaseChanged(EditPhase::Loading),
            EditEvent::ReferenceRequested(ReferenceTicket { seq, id }),
        ])
    }

    /// A missing or failed lookup only degrades the hints; editing continues.
    pub fn complete_reference(
        &mut self,
        seq: u64,
        result: ServiceResult<Option<ReferenceRecord>>,
    ) -> Vec<EditEvent> {
        if !self.reference_seq.accept(seq) || self.phase != EditPhase::Loading {
            debug!(seq, "ignoring reference response for a closed session");
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.reference = match result {
            Ok(record) => ReferenceHints::Loaded(record),
            Err(err) => {
                warn!(seq, kind = err.kind(), error = %err, "reference lookup failed");
                ReferenceHints::Unavailable(format!("reference data unavailable: {err}"))
            }
        };
        self.phase = EditPhase::Ready;
        vec![EditEvent::PhaseChanged(EditPhase::Ready)]
    }

    fn set_field(&mut self, field: EditableField, value: String) -> Result<Vec<EditEvent>, AdminError> {
        match self.phase {
            EditPhase::Closed => return Err(AdminError::NotOpen),
            EditPhase::Saving => return Err(AdminError::SaveInFlight),
            EditPhase::Loading | EditPhase::Ready => {}
        }
        let session = self.session.as_mut().ok_or(AdminError::NotOpen)?;
        session.draft.insert(field, value);
        Ok(vec![EditEvent::FieldChanged(field)])
    }

    fn save(&mut self) -> Result<Vec<EditEvent>, AdminError> {
        match self.phase {
            EditPhase::Closed => return Err(AdminError::NotOpen),
            EditPhase::Loading => return Err(AdminError::NotReady),
            EditPhase::Saving => return Err(AdminError::SaveInFlight),
            EditPhase::Ready => {}
        }
        let session = self.session.as_mut().ok_or(AdminError::NotOpen)?;
        let record = match session.to_record() {
            Ok(record) => record,
            Err(err) => {
                session.error = Some(err.to_string());
                return Ok(vec![EditEvent::Notice(err.to_string())]);
            }
        };
        session.error = None;
        session.pending_write = Some(record.clone());
        self.phase = EditPhase::Saving;
        let seq = self.save_seq.issue();
        debug!(seq, id = record.id.get(), "save requested");
        Ok(vec![
            EditEvent::PhaseChanged(EditPhase::Saving),
            EditEvent::SaveRequested(SaveTicket { seq, record }),
        ])
    }

    pub fn complete_save(&mut self, seq: u64, result: ServiceResult<WriteOutcome>) -> Vec<EditEvent> {
        if !self.save_seq.accept(seq) || self.phase != EditPhase::Saving {
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let failure = match result {
            Ok(WriteOutcome { success: true, .. }) => {
                let id = session.target.id;
                info!(id = id.get(), "record saved");
                let mut events = self.close();
                events.insert(0, EditEvent::Saved(id));
                return events;
            }
            Ok(WriteOutcome {
                success: false,
                message,
            }) => ServiceError::Validation(message.unwrap_or_else(|| "no reason given".to_owned())),
            Err(err) => err,
        };
        warn!(seq, kind = failure.kind(), error = %failure, "save failed");
        session.pending_write = None;
        session.error = Some(failure.to_string());
        self.phase = EditPhase::Ready;
        vec![
            EditEvent::PhaseChanged(EditPhase::Ready),
            EditEvent::Notice(failure.to_string()),
        ]
    }

    fn cancel(&mut self) -> Result<Vec<EditEvent>, AdminError> {
        match self.phase {
            EditPhase::Closed => Err(AdminError::NotOpen),
            EditPhase::Saving => Err(AdminError::SaveInFlight),
            EditPhase::Loading | EditPhase::Ready => Ok(self.close()),
        }
    }

    fn close(&mut self) -> Vec<EditEvent> {
        self.session = None;
        self.phase = EditPhase::Closed;
        self.reference_seq.invalidate();
        vec![EditEvent::PhaseChanged(EditPhase::Closed)]
    }
}
