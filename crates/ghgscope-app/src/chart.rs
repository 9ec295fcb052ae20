// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    BASE_SOURCE, ChartDimension, ChartPoint, Metric, MetricGroup, ParameterizedQuery,
    RequestSequencer, ServiceResult, SqlParam,
};

pub const MAX_CHART_ENTITIES: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("at most {MAX_CHART_ENTITIES} entries can be compared -- remove one first")]
    TooManyEntities,
    #[error("`{value}` is not a known {dimension} -- wait for the list to load and pick again")]
    UnknownEntity {
        value: String,
        dimension: &'static str,
    },
}

/// Two mutually exclusive metric groups: the individual scopes, or the combined total.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricSelection {
    individual: BTreeSet<Metric>,
    combined: bool,
}

impl MetricSelection {
    /// Flips `metric`. Choosing from one group clears the other.
    pub fn toggle(&mut self, metric: Metric) -> bool {
        match metric.group() {
            MetricGroup::Combined => {
                if self.combined {
                    self.combined = false;
                } else {
                    self.individual.clear();
                    self.combined = true;
                }
                self.combined
            }
            MetricGroup::Individual => {
                if self.individual.remove(&metric) {
                    return false;
                }
                self.combined = false;
                self.individual.insert(metric);
                true
            }
        }
    }

    pub fn is_selected(&self, metric: Metric) -> bool {
        match metric.group() {
            MetricGroup::Combined => self.combined,
            MetricGroup::Individual => self.individual.contains(&metric),
        }
    }

    /// A group is enabled only while the other group is empty.
    pub fn is_enabled(&self, metric: Metric) -> bool {
        match metric.group() {
            MetricGroup::Combined => self.individual.is_empty(),
            MetricGroup::Individual => !self.combined,
        }
    }

    pub fn active_group(&self) -> Option<MetricGroup> {
        if self.combined {
            Some(MetricGroup::Combined)
        } else if !self.individual.is_empty() {
            Some(MetricGroup::Individual)
        } else {
            None
        }
    }

    pub fn metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|metric| self.is_selected(*metric))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active_group().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateMode {
    Raw,
    Sum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub dimension: ChartDimension,
    pub entities: Vec<String>,
    pub metrics: Vec<Metric>,
}

impl AggregateQuery {
    pub fn mode(&self) -> AggregateMode {
        if self.dimension.is_finest() {
            AggregateMode::Raw
        } else {
            AggregateMode::Sum
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.entities.is_empty() || self.metrics.is_empty() {
            bail!("chart query needs at least one entry and one metric");
        }
        if self.entities.len() > MAX_CHART_ENTITIES {
            bail!(
                "chart query compares {} entries -- the limit is {MAX_CHART_ENTITIES}",
                self.entities.len()
            );
        }
        let groups: BTreeSet<MetricGroup> = self.metrics.iter().map(|m| m.group()).collect();
        if groups.len() > 1 {
            bail!("chart query mixes individual and combined metrics -- pick one group");
        }
        Ok(())
    }

    /// Raw per-row values at the finest grain, otherwise `SUM` per group.
    pub fn to_sql(&self) -> ParameterizedQuery {
        let column = self.dimension.column();
        let mode = self.mode();
        let values: Vec<String> = self
            .metrics
            .iter()
            .map(|metric| match mode {
                AggregateMode::Raw => format!("{} AS {}", metric.sql_expr(), metric.key()),
                AggregateMode::Sum => format!("SUM({}) AS {}", metric.sql_expr(), metric.key()),
            })
            .collect();
        let placeholders = vec!["?"; self.entities.len()].join(", ");
        let mut sql = format!(
            "SELECT {column} AS label, {} FROM {BASE_SOURCE} WHERE {column} IN ({placeholders})",
            values.join(", ")
        );
        if mode == AggregateMode::Sum {
            sql.push_str(&format!(" GROUP BY {column}"));
        }
        sql.push_str(&format!(" ORDER BY {column}"));
        ParameterizedQuery {
            sql,
            params: self
                .entities
                .iter()
                .cloned()
                .map(SqlParam::Text)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartItemsTicket {
    pub seq: u64,
    pub dimension: ChartDimension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDataTicket {
    pub seq: u64,
    pub query: AggregateQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartCommand {
    SetDimension(ChartDimension),
    ToggleEntity(String),
    ToggleMetric(Metric),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartEvent {
    DimensionChanged(ChartDimension),
    EntitiesChanged(Vec<String>),
    MetricsChanged(Vec<Metric>),
    ItemsRequested(ChartItemsTicket),
    ItemsLoaded(usize),
    DataRequested(ChartDataTicket),
    Repainted(usize),
    Cleared,
    Notice(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartController {
    dimension: ChartDimension,
    available: Vec<String>,
    entities: Vec<String>,
    metrics: MetricSelection,
    points: Vec<ChartPoint>,
    items_seq: RequestSequencer,
    data_seq: RequestSequencer,
}

impl ChartController {
    pub fn dimension(&self) -> ChartDimension {
        self.dimension
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn metrics(&self) -> &MetricSelection {
        &self.metrics
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn query(&self) -> Option<AggregateQuery> {
        if self.entities.is_empty() || self.metrics.is_empty() {
            return None;
        }
        Some(AggregateQuery {
            dimension: self.dimension,
            entities: self.entities.clone(),
            metrics: self.metrics.metrics(),
        })
    }

    /// Loads the entry list for the starting dimension.
    pub fn init(&mut self) -> Vec<ChartEvent> {
        vec![self.request_items()]
    }

    pub fn dispatch(&mut self, command: ChartCommand) -> Vec<ChartEvent> {
        match command {
            ChartCommand::SetDimension(dimension) => {
                if dimension == self.dimension {
                    return Vec::new();
                }
                self.dimension = dimension;
                self.available.clear();
                self.entities.clear();
                // Entries for the previous dimension must never land in `available`.
                self.items_seq.invalidate();
                let mut events = vec![
                    ChartEvent::DimensionChanged(dimension),
                    ChartEvent::EntitiesChanged(Vec::new()),
                ];
                events.push(self.clear_points());
                events.push(self.request_items());
                events
            }
            ChartCommand::ToggleEntity(value) => {
                if let Some(position) = self.entities.iter().position(|e| *e == value) {
                    self.entities.remove(position);
                } else if let Err(err) = self.check_entity(&value) {
                    return vec![ChartEvent::Notice(err.to_string())];
                } else {
                    self.entities.push(value);
                }
                vec![
                    ChartEvent::EntitiesChanged(self.entities.clone()),
                    self.rebuild(),
                ]
            }
            ChartCommand::ToggleMetric(metric) => {
                self.metrics.toggle(metric);
                vec![
                    ChartEvent::MetricsChanged(self.metrics.metrics()),
                    self.rebuild(),
                ]
            }
            ChartCommand::Clear => {
                self.entities.clear();
                self.metrics = MetricSelection::default();
                vec![
                    ChartEvent::EntitiesChanged(Vec::new()),
                    ChartEvent::MetricsChanged(Vec::new()),
                    self.clear_points(),
                ]
            }
        }
    }

    pub fn complete_items(&mut self, seq: u64, result: ServiceResult<Vec<String>>) -> Vec<ChartEvent> {
        if !self.items_seq.accept(seq) {
            warn!(seq, "dropping stale chart item response");
            return Vec::new();
        }
        match result {
            Ok(values) => {
                self.available = values;
                vec![ChartEvent::ItemsLoaded(self.available.len())]
            }
            Err(err) => {
                warn!(seq, kind = err.kind(), error = %err, "chart item request failed");
                vec![ChartEvent::Notice(format!("could not load chart entries: {err}"))]
            }
        }
    }

    pub fn complete_data(
        &mut self,
        seq: u64,
        result: ServiceResult<Vec<ChartPoint>>,
    ) -> Vec<ChartEvent> {
        if !self.data_seq.accept(seq) {
            warn!(seq, "dropping stale chart data response");
            return Vec::new();
        }
        match result {
            Ok(points) => {
                self.points = points;
                vec![ChartEvent::Repainted(self.points.len())]
            }
            Err(err) => {
                warn!(seq, kind = err.kind(), error = %err, "chart data request failed");
                vec![ChartEvent::Notice(format!("could not load chart: {err}"))]
            }
        }
    }

    fn check_entity(&self, value: &str) -> Result<(), ChartError> {
        if !self.available.iter().any(|known| known == value) {
            return Err(ChartError::UnknownEntity {
                value: value.to_owned(),
                dimension: self.dimension.param(),
            });
        }
        if self.entities.len() >= MAX_CHART_ENTITIES {
            return Err(ChartError::TooManyEntities);
        }
        Ok(())
    }

    fn rebuild(&mut self) -> ChartEvent {
        match self.query() {
            Some(query) => {
                let seq = self.data_seq.issue();
                debug!(
                    seq,
                    dimension = query.dimension.param(),
                    entities = query.entities.len(),
                    "chart data request issued"
                );
                ChartEvent::DataRequested(ChartDataTicket { seq, query })
            }
            None => self.clear_points(),
        }
    }

    fn clear_points(&mut self) -> ChartEvent {
        self.points.clear();
        self.data_seq.invalidate();
        ChartEvent::Cleared
    }

    fn request_items(&mut self) -> ChartEvent {
        let seq = self.items_seq.issue();
        debug!(seq, dimension = self.dimension.param(), "chart item request issued");
        ChartEvent::ItemsRequested(ChartItemsTicket {
            seq,
            dimension: self.dimension,
        })
    }
}
