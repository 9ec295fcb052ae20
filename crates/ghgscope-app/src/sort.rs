// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::{SortColumn, SortDirection};

pub const DEFAULT_SORT_DIRECTION: SortDirection = SortDirection::Desc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// At most one active sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    active: Option<SortSpec>,
}

impl SortState {
    pub const fn active(&self) -> Option<SortSpec> {
        self.active
    }

    pub fn direction_of(&self, column: SortColumn) -> Option<SortDirection> {
        self.active
            .filter(|spec| spec.column == column)
            .map(|spec| spec.direction)
    }

    /// Toggles an active column, otherwise activates `column` descending and drops the previous one.
    pub fn click(&mut self, column: SortColumn) -> SortSpec {
        let direction = match self.direction_of(column) {
            Some(direction) => direction.toggled(),
            None => DEFAULT_SORT_DIRECTION,
        };
        let spec = SortSpec { column, direction };
        self.active = Some(spec);
        spec
    }

    pub fn reset(&mut self) -> bool {
        self.active.take().is_some()
    }

    pub fn restore(&mut self, spec: Option<SortSpec>) {
        self.active = spec;
    }
}
