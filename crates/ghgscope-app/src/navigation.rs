// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use url::{Url, form_urlencoded};

use crate::Selection;

/// Location parameters that make a view shareable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationParams {
    pub page: u32,
    pub sector: Selection,
    pub region: Selection,
    pub country: Selection,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            page: 1,
            sector: Selection::All,
            region: Selection::All,
            country: Selection::All,
        }
    }
}

impl NavigationParams {
    pub fn to_query_string(&self) -> String {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .append_pair("page", &self.page.to_string())
            .append_pair("sector", self.sector.as_str())
            .append_pair("region", self.region.as_str())
            .append_pair("country", self.country.as_str())
            .finish();
        format!("?{encoded}")
    }

    /// Reads parameters from `?a=b`, `a=b`, or a full URL. Unknown keys and bad pages are ignored.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let query = if raw.contains("://") {
            match Url::parse(raw) {
                Ok(url) => url.query().unwrap_or_default().to_owned(),
                Err(_) => String::new(),
            }
        } else {
            raw.trim_start_matches('?').to_owned()
        };

        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => {
                    params.page = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|page| *page >= 1)
                        .unwrap_or(1);
                }
                "sector" => params.sector = Selection::parse(&value),
                "region" => params.region = Selection::parse(&value),
                "country" => params.country = Selection::parse(&value),
                _ => {}
            }
        }
        params
    }
}

/// Oldest entries are dropped past this many.
pub const MAX_HISTORY: usize = 64;

/// History of pushed locations, newest last. No reloads, no duplicates in a row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationSync {
    history: Vec<String>,
}

impl NavigationSync {
    /// Returns the pushed location, or `None` if it matched the current entry.
    pub fn push(&mut self, params: &NavigationParams) -> Option<String> {
        let location = params.to_query_string();
        if self.current() == Some(location.as_str()) {
            return None;
        }
        self.history.push(location.clone());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        Some(location)
    }

    pub fn current(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}
