// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::{BASE_SOURCE, Facet, FilterState, SearchState, Selection, SortSpec, SortState};

/// Value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterizedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Case-insensitive substring match on company name or ISIN.
    Search { needle: String },
    Facet { facet: Facet, value: String },
}

impl Predicate {
    pub fn search(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        if needle.is_empty() {
            return None;
        }
        Some(Self::Search {
            needle: needle.to_owned(),
        })
    }

    pub fn facet(facet: Facet, selection: &Selection) -> Option<Self> {
        selection.value().map(|value| Self::Facet {
            facet,
            value: value.to_owned(),
        })
    }

    fn render(&self, params: &mut Vec<SqlParam>) -> String {
        match self {
            Self::Search { needle } => {
                let pattern = format!("%{}%", escape_like(needle));
                params.push(SqlParam::Text(pattern.clone()));
                params.push(SqlParam::Text(pattern));
                "(company_name LIKE ? ESCAPE '\\' OR isin LIKE ? ESCAPE '\\')".to_owned()
            }
            Self::Facet { facet, value } => {
                params.push(SqlParam::Text(value.clone()));
                format!("{} = ?", facet.column())
            }
        }
    }
}

pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Composed row query. Recomputed from the view slices on every change, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub base_source: String,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub order: Option<SortSpec>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            base_source: BASE_SOURCE.to_owned(),
            predicates: Vec::new(),
            order: None,
        }
    }
}

impl QueryDescriptor {
    pub fn validate(&self) -> Result<()> {
        if self.base_source != BASE_SOURCE {
            bail!(
                "unsupported source `{}` -- only `{BASE_SOURCE}` can be queried",
                self.base_source
            );
        }
        for predicate in &self.predicates {
            match predicate {
                Predicate::Search { needle } if needle.trim().is_empty() => {
                    bail!("search predicate is blank -- drop it or supply text");
                }
                Predicate::Facet { facet, value } if value.trim().is_empty() => {
                    bail!("{} predicate is blank -- use `all` instead", facet.label());
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn without_order(&self) -> Self {
        Self {
            order: None,
            ..self.clone()
        }
    }

    pub fn where_clause(&self) -> ParameterizedQuery {
        let mut params = Vec::new();
        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|predicate| predicate.render(&mut params))
            .collect();
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        ParameterizedQuery { sql, params }
    }

    pub fn order_clause(&self) -> String {
        match self.order {
            Some(spec) => format!(
                " ORDER BY CAST({} AS REAL) {}, id ASC",
                spec.column.column(),
                spec.direction.as_sql()
            ),
            None => " ORDER BY id ASC".to_owned(),
        }
    }

    pub fn select_sql(&self, columns: &str) -> ParameterizedQuery {
        let filter = self.where_clause();
        ParameterizedQuery {
            sql: format!(
                "SELECT {columns} FROM {BASE_SOURCE}{}{}",
                filter.sql,
                self.order_clause()
            ),
            params: filter.params,
        }
    }

    pub fn count_sql(&self) -> ParameterizedQuery {
        let filter = self.where_clause();
        ParameterizedQuery {
            sql: format!("SELECT COUNT(*) FROM {BASE_SOURCE}{}", filter.sql),
            params: filter.params,
        }
    }

    pub fn page_sql(&self, columns: &str, page: u32, page_size: u32) -> ParameterizedQuery {
        let mut query = self.select_sql(columns);
        let offset = i64::from(page.max(1) - 1) * i64::from(page_size);
        query.sql.push_str(" LIMIT ? OFFSET ?");
        query.params.push(SqlParam::Integer(i64::from(page_size)));
        query.params.push(SqlParam::Integer(offset));
        query
    }
}

/// Composes the row query. Clause order is search, sector, region, country.
pub fn build_query(filters: &FilterState, search: &SearchState, sort: &SortState) -> QueryDescriptor {
    let mut predicates = Vec::with_capacity(4);
    if let Some(clause) = search.clause() {
        predicates.push(clause.clone());
    }
    for facet in Facet::ALL {
        if let Some(predicate) = Predicate::facet(facet, filters.get(facet)) {
            predicates.push(predicate);
        }
    }
    QueryDescriptor {
        base_source: BASE_SOURCE.to_owned(),
        predicates,
        order: sort.active(),
    }
}
