// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Predicate;

/// Raw search text plus the clause compiled from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchState {
    raw: String,
    clause: Option<Predicate>,
}

impl SearchState {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clause(&self) -> Option<&Predicate> {
        self.clause.as_ref()
    }

    /// Returns true when the compiled clause changed. Whitespace-only edits do not refetch.
    pub fn set(&mut self, raw: impl Into<String>) -> bool {
        let raw = raw.into();
        let clause = Predicate::search(&raw);
        let changed = clause != self.clause;
        self.raw = raw;
        self.clause = clause;
        changed
    }

    pub fn clear(&mut self) -> bool {
        self.set(String::new())
    }
}
