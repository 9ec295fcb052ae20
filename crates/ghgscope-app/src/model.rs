// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::*;

pub const PAGE_SIZE: u32 = 10;
pub const ALL_VALUES: &str = "all";
pub const NULL_SENTINEL: &str = "None";
pub const BASE_SOURCE: &str = "emissions_data";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_VALUES) {
            Self::All
        } else {
            Self::Only(trimmed.to_owned())
        }
    }

    pub fn only(value: impl Into<String>) -> Self {
        Self::parse(&value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_VALUES,
            Self::Only(value) => value,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(value) => Some(value),
        }
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Selection> for String {
    fn from(value: Selection) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Sector,
    Region,
    Country,
}

impl Facet {
    pub const ALL: [Self; 3] = [Self::Sector, Self::Region, Self::Country];

    /// Storage column. The region facet reads the historical `area` column.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Sector => "sector",
            Self::Region => "area",
            Self::Country => "country_region",
        }
    }

    pub const fn param(self) -> &'static str {
        match self {
            Self::Sector => "sector",
            Self::Region => "region",
            Self::Country => "country",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sector => "sector",
            Self::Region => "region",
            Self::Country => "country/region",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub const fn marker(self) -> &'static str {
        match self {
            Self::Asc => "▲",
            Self::Desc => "▼",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Scope1Direct,
    Scope2Location,
    Scope2Market,
}

impl SortColumn {
    pub const ALL: [Self; 3] = [Self::Scope1Direct, Self::Scope2Location, Self::Scope2Market];

    pub const fn column(self) -> &'static str {
        match self {
            Self::Scope1Direct => "scope1_direct",
            Self::Scope2Location => "scope2_location",
            Self::Scope2Market => "scope2_market",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Scope1Direct => "Scope1",
            Self::Scope2Location => "Scope2-Location",
            Self::Scope2Market => "Scope2-Market",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricGroup {
    Individual,
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Scope1Direct,
    Scope2Location,
    Scope2Market,
    Total,
}

impl Metric {
    pub const ALL: [Self; 4] = [
        Self::Scope1Direct,
        Self::Scope2Location,
        Self::Scope2Market,
        Self::Total,
    ];
    pub const INDIVIDUAL: [Self; 3] = [Self::Scope1Direct, Self::Scope2Location, Self::Scope2Market];

    pub const fn group(self) -> MetricGroup {
        match self {
            Self::Total => MetricGroup::Combined,
            Self::Scope1Direct | Self::Scope2Location | Self::Scope2Market => {
                MetricGroup::Individual
            }
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Scope1Direct => "scope1_direct",
            Self::Scope2Location => "scope2_location",
            Self::Scope2Market => "scope2_market",
            Self::Total => "total",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Scope1Direct => "scope 1",
            Self::Scope2Location => "scope 2 (location)",
            Self::Scope2Market => "scope 2 (market)",
            Self::Total => "scope 1+2 (market)",
        }
    }

    /// Numeric expression over one row. The combined metric treats missing parts as zero.
    pub const fn sql_expr(self) -> &'static str {
        match self {
            Self::Scope1Direct => "CAST(scope1_direct AS REAL)",
            Self::Scope2Location => "CAST(scope2_location AS REAL)",
            Self::Scope2Market => "CAST(scope2_market AS REAL)",
            Self::Total => {
                "(COALESCE(CAST(scope1_direct AS REAL), 0) + COALESCE(CAST(scope2_market AS REAL), 0))"
            }
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.key() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartDimension {
    #[default]
    Company,
    Sector,
    Region,
    Country,
}

impl ChartDimension {
    pub const ALL: [Self; 4] = [Self::Company, Self::Sector, Self::Region, Self::Country];

    pub const fn column(self) -> &'static str {
        match self {
            Self::Company => "company_name",
            Self::Sector => Facet::Sector.column(),
            Self::Region => Facet::Region.column(),
            Self::Country => Facet::Country.column(),
        }
    }

    pub const fn param(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Sector => "sector",
            Self::Region => "region",
            Self::Country => "country",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.param() == value)
    }

    pub const fn is_finest(self) -> bool {
        matches!(self, Self::Company)
    }

    pub const fn next(self) -> Self {
        match self {
            Self::Company => Self::Sector,
            Self::Sector => Self::Region,
            Self::Region => Self::Country,
            Self::Country => Self::Company,
        }
    }
}

/// One row of the emissions table.
///
/// Wire names follow the stored columns: `region` travels as `area` and
/// `country` as `country_region`. The plain names are accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: RecordId,
    pub company_name: String,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default, rename = "area", alias = "region")]
    pub region: Option<String>,
    #[serde(default, rename = "country_region", alias = "country")]
    pub country: Option<String>,
    #[serde(default)]
    pub scope1_direct: Option<f64>,
    #[serde(default)]
    pub scope2_location: Option<f64>,
    #[serde(default)]
    pub scope2_market: Option<f64>,
}

impl RowRecord {
    pub fn display_cells(&self) -> [String; 7] {
        [
            self.company_name.clone(),
            display_text(self.sector.as_deref()),
            display_text(self.region.as_deref()),
            display_text(self.country.as_deref()),
            display_number(self.scope1_direct),
            display_number(self.scope2_location),
            display_number(self.scope2_market),
        ]
    }

    pub fn same_identity(&self, other: &Self) -> bool {
        self.id == other.id && self.company_name == other.company_name && self.isin == other.isin
    }
}

pub const TABLE_HEADERS: [&str; 7] = [
    "Company",
    "Sector",
    "Region",
    "Country/Region",
    "Scope1",
    "Scope2-Location",
    "Scope2-Market",
];

pub fn display_text(value: Option<&str>) -> String {
    match value {
        Some(text) => text.to_owned(),
        None => NULL_SENTINEL.to_owned(),
    }
}

pub fn display_number(value: Option<f64>) -> String {
    match value {
        Some(number) => number.to_string(),
        None => NULL_SENTINEL.to_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    Sector,
    Region,
    Country,
    Scope1Direct,
    Scope2Location,
    Scope2Market,
}

impl EditableField {
    pub const ALL: [Self; 6] = [
        Self::Sector,
        Self::Region,
        Self::Country,
        Self::Scope1Direct,
        Self::Scope2Location,
        Self::Scope2Market,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sector => "sector",
            Self::Region => "region",
            Self::Country => "country/region",
            Self::Scope1Direct => "scope 1",
            Self::Scope2Location => "scope 2 location",
            Self::Scope2Market => "scope 2 market",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Sector | Self::Region | Self::Country => FieldKind::Text,
            Self::Scope1Direct | Self::Scope2Location | Self::Scope2Market => FieldKind::Number,
        }
    }

    /// Raw draft text for this field; missing values read as an empty string.
    pub fn read(self, record: &RowRecord) -> String {
        match self {
            Self::Sector => record.sector.clone().unwrap_or_default(),
            Self::Region => record.region.clone().unwrap_or_default(),
            Self::Country => record.country.clone().unwrap_or_default(),
            Self::Scope1Direct => record.scope1_direct.map(|v| v.to_string()).unwrap_or_default(),
            Self::Scope2Location => record
                .scope2_location
                .map(|v| v.to_string())
                .unwrap_or_default(),
            Self::Scope2Market => record.scope2_market.map(|v| v.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub isin: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default, rename = "area", alias = "region")]
    pub region: Option<String>,
    #[serde(default, rename = "country_region", alias = "country")]
    pub country: Option<String>,
    #[serde(default)]
    pub scope1_direct: Option<f64>,
    #[serde(default)]
    pub scope2_location: Option<f64>,
    #[serde(default)]
    pub scope2_market: Option<f64>,
}

impl ReferenceRecord {
    pub fn hint(&self, field: EditableField) -> String {
        match field {
            EditableField::Sector => display_text(self.sector.as_deref()),
            EditableField::Region => display_text(self.region.as_deref()),
            EditableField::Country => display_text(self.country.as_deref()),
            EditableField::Scope1Direct => display_number(self.scope1_direct),
            EditableField::Scope2Location => display_number(self.scope2_location),
            EditableField::Scope2Market => display_number(self.scope2_market),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
}

impl FilterOptions {
    pub fn values(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Sector => &self.sectors,
            Facet::Region => &self.regions,
            Facet::Country => &self.countries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowPage {
    #[serde(rename = "data", alias = "rows")]
    pub rows: Vec<RowRecord>,
    #[serde(rename = "totalItems", alias = "total_items")]
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllRows {
    pub columns: Vec<String>,
    pub rows: Vec<RowRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub values: Vec<MetricValue>,
}

impl ChartPoint {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.values
            .iter()
            .find(|entry| entry.metric == metric)
            .and_then(|entry| entry.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric: Metric,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl WriteOutcome {
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Analyst,
    Admin,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChartDimension, Credentials, EditableField, Metric, MetricGroup, NULL_SENTINEL, RecordId,
        ReferenceRecord, RowPage, RowRecord, Selection,
    };

    fn sample_record() -> RowRecord {
        RowRecord {
            id: RecordId::new(7),
            company_name: "Acme Power".to_owned(),
            isin: Some("US0000000007".to_owned()),
            ticker: None,
            weight: Some(0.42),
            sector: Some("Energy".to_owned()),
            region: None,
            country: Some("United States".to_owned()),
            scope1_direct: Some(1_017_651.0),
            scope2_location: Some(12.5),
            scope2_market: None,
        }
    }

    #[test]
    fn selection_parses_all_case_insensitively() {
        assert_eq!(Selection::parse("ALL"), Selection::All);
        assert_eq!(Selection::parse("  "), Selection::All);
        assert_eq!(
            Selection::parse(" Energy "),
            Selection::Only("Energy".to_owned())
        );
        assert_eq!(Selection::only("Energy").as_str(), "Energy");
    }

    #[test]
    fn display_cells_render_null_sentinel() {
        let cells = sample_record().display_cells();
        assert_eq!(cells[2], NULL_SENTINEL);
        assert_eq!(cells[4], "1017651");
        assert_eq!(cells[5], "12.5");
        assert_eq!(cells[6], NULL_SENTINEL);
    }

    #[test]
    fn editable_field_reads_empty_for_missing_values() {
        let record = sample_record();
        assert_eq!(EditableField::Region.read(&record), "");
        assert_eq!(EditableField::Scope2Location.read(&record), "12.5");
    }

    #[test]
    fn metric_groups_split_combined_from_individual() {
        assert_eq!(Metric::Total.group(), MetricGroup::Combined);
        for metric in Metric::INDIVIDUAL {
            assert_eq!(metric.group(), MetricGroup::Individual);
        }
        assert_eq!(Metric::parse("total"), Some(Metric::Total));
        assert_eq!(ChartDimension::parse("region"), Some(ChartDimension::Region));
        assert!(ChartDimension::Company.is_finest());
    }

    #[test]
    fn row_page_reads_historical_wire_names() {
        let raw = r#"{
            "data": [{
                "id": 3,
                "company_name": "Kinross",
                "sector": "Materials",
                "area": "Americas",
                "country_region": "Canada",
                "scope1_direct": 1017651.0,
                "scope2_location": null
            }],
            "totalItems": 23
        }"#;
        let page: RowPage = serde_json::from_str(raw).expect("decode page");
        assert_eq!(page.total_items, 23);
        assert_eq!(page.rows[0].region.as_deref(), Some("Americas"));
        assert_eq!(page.rows[0].country.as_deref(), Some("Canada"));
        assert_eq!(page.rows[0].scope2_market, None);
    }

    #[test]
    fn records_accept_plain_facet_names() {
        let row: RowRecord = serde_json::from_str(
            r#"{"id":1,"company_name":"A","region":"Europe","country":"France"}"#,
        )
        .expect("decode row");
        assert_eq!(row.region.as_deref(), Some("Europe"));
        assert_eq!(row.country.as_deref(), Some("France"));

        let reference: ReferenceRecord = serde_json::from_str(
            r#"{"isin":"FR0000000001","region":"Europe","country":"France"}"#,
        )
        .expect("decode reference");
        assert_eq!(reference.region.as_deref(), Some("Europe"));
        assert_eq!(reference.country.as_deref(), Some("France"));

        let encoded = serde_json::to_string(&row).expect("encode row");
        assert!(encoded.contains("\"area\":\"Europe\""));
        assert!(encoded.contains("\"country_region\":\"France\""));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "admin".to_owned(),
            password: "hunter2".to_owned(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
