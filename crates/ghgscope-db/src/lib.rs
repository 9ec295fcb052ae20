// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod validation;

use anyhow::{Context, Result, anyhow, bail};
use ghgscope_app::{
    AggregateQuery, AllRows, ChartDimension, ChartPoint, Credentials, DataService, FilterOptions,
    LoginOutcome, MetricValue, QueryDescriptor, RecordId, ReferenceRecord, RowPage, RowRecord,
    ServiceError, ServiceResult, SqlParam, UserId, WriteOutcome,
};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::validation::{WriteRejection, check_identity, validate_record};

pub const APP_NAME: &str = "ghgscope";

const ROW_COLUMNS: &str = "id, company_name, isin, ticker, weight, sector, area, country_region, \
                           scope1_direct, scope2_location, scope2_market";

const CSV_HEADERS: [&str; 11] = [
    "id",
    "company_name",
    "isin",
    "ticker",
    "weight",
    "sector",
    "area",
    "country_region",
    "scope1_direct",
    "scope2_location",
    "scope2_market",
];

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "emissions_data",
        &[
            "id",
            "company_name",
            "isin",
            "ticker",
            "weight",
            "sector",
            "area",
            "country_region",
            "scope1_direct",
            "scope2_location",
            "scope2_market",
            "updated_at",
        ],
    ),
    (
        "reference_data",
        &[
            "isin",
            "sector",
            "area",
            "country_region",
            "scope1_direct",
            "scope2_location",
            "scope2_market",
        ],
    ),
    (
        "users",
        &[
            "id",
            "username",
            "password_salt",
            "password_hash",
            "is_admin",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_emissions_sector",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_emissions_sector ON emissions_data (sector);",
    },
    RequiredIndex {
        name: "idx_emissions_area",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_emissions_area ON emissions_data (area);",
    },
    RequiredIndex {
        name: "idx_emissions_country_region",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_emissions_country_region ON emissions_data (country_region);",
    },
    RequiredIndex {
        name: "idx_emissions_isin",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_emissions_isin ON emissions_data (isin);",
    },
];

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            info!("created emissions schema");
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    pub fn filter_options(&self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            sectors: self.distinct_values("sector")?,
            regions: self.distinct_values("area")?,
            countries: self.distinct_values("country_region")?,
        })
    }

    pub fn region_country_map(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT DISTINCT area, country_region
                FROM emissions_data
                WHERE area IS NOT NULL AND area <> ''
                  AND country_region IS NOT NULL AND country_region <> ''
                ORDER BY area ASC, country_region ASC
                ",
            )
            .context("prepare region map query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("query region map")?;

        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (region, country) = row.context("scan region map row")?;
            map.entry(region).or_default().push(country);
        }
        Ok(map)
    }

    pub fn query_rows(&self, query: &QueryDescriptor, page: u32, page_size: u32) -> Result<RowPage> {
        query.validate()?;
        if page_size == 0 {
            bail!("page size must be positive");
        }

        let count = query.count_sql();
        let total_items: i64 = self
            .conn
            .query_row(&count.sql, params_from_iter(bind(&count.params)), |row| {
                row.get(0)
            })
            .context("count matching rows")?;

        let select = query.page_sql(ROW_COLUMNS, page, page_size);
        debug!(sql = %select.sql, page, page_size, "querying rows");
        let rows = self.collect_rows(&select.sql, &select.params)?;
        Ok(RowPage {
            rows,
            total_items: u64::try_from(total_items).unwrap_or_default(),
        })
    }

    /// Every matching row in query order, without paging.
    pub fn query_all(&self, query: &QueryDescriptor) -> Result<Vec<RowRecord>> {
        query.validate()?;
        let select = query.select_sql(ROW_COLUMNS);
        self.collect_rows(&select.sql, &select.params)
    }

    pub fn all_rows(&self) -> Result<AllRows> {
        let rows = self.query_all(&QueryDescriptor::default())?;
        Ok(AllRows {
            columns: CSV_HEADERS.iter().map(|header| (*header).to_owned()).collect(),
            rows,
        })
    }

    pub fn get_record(&self, id: RecordId) -> Result<Option<RowRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {ROW_COLUMNS} FROM emissions_data WHERE id = ?"),
                params![id.get()],
                read_row,
            )
            .optional()
            .with_context(|| format!("load record {}", id.get()))
    }

    pub fn chart_items(&self, dimension: ChartDimension) -> Result<Vec<String>> {
        self.distinct_values(dimension.column())
    }

    pub fn chart_data(&self, query: &AggregateQuery) -> Result<Vec<ChartPoint>> {
        query.validate()?;
        let rendered = query.to_sql();
        let mut stmt = self
            .conn
            .prepare(&rendered.sql)
            .context("prepare chart query")?;
        let rows = stmt
            .query_map(params_from_iter(bind(&rendered.params)), |row| {
                let label: String = row.get(0)?;
                let mut values = Vec::with_capacity(query.metrics.len());
                for (offset, metric) in query.metrics.iter().enumerate() {
                    values.push(MetricValue {
                        metric: *metric,
                        value: read_number(row, offset + 1)?,
                    });
                }
                Ok(ChartPoint { label, values })
            })
            .context("query chart data")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect chart data")
    }

    /// Reference values for the record's ISIN. `None` when the record has no ISIN or no match.
    pub fn reference_for(&self, id: RecordId) -> Result<Option<ReferenceRecord>> {
        let record = self
            .get_record(id)?
            .ok_or_else(|| anyhow!("record {} not found; reload the table and retry", id.get()))?;
        let Some(isin) = record.isin else {
            return Ok(None);
        };
        self.conn
            .query_row(
                "
                SELECT isin, sector, area, country_region,
                       scope1_direct, scope2_location, scope2_market
                FROM reference_data
                WHERE isin = ?
                ",
                params![isin],
                |row| {
                    Ok(ReferenceRecord {
                        isin: row.get(0)?,
                        sector: row.get(1)?,
                        region: row.get(2)?,
                        country: row.get(3)?,
                        scope1_direct: read_number(row, 4)?,
                        scope2_location: read_number(row, 5)?,
                        scope2_market: read_number(row, 6)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load reference data for {isin}"))
    }

    /// Inserts `record`, keeping its id when positive.
    pub fn insert_record(&self, record: &RowRecord) -> Result<RecordId> {
        let now = now_rfc3339()?;
        let id = (record.id.get() > 0).then_some(record.id.get());
        self.conn
            .execute(
                "
                INSERT INTO emissions_data (
                  id, company_name, isin, ticker, weight, sector, area, country_region,
                  scope1_direct, scope2_location, scope2_market, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id,
                    record.company_name,
                    record.isin,
                    record.ticker,
                    record.weight,
                    record.sector,
                    record.region,
                    record.country,
                    record.scope1_direct,
                    record.scope2_location,
                    record.scope2_market,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("insert record for {}", record.company_name))?;
        Ok(RecordId::new(self.conn.last_insert_rowid()))
    }

    pub fn insert_reference(&self, reference: &ReferenceRecord) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT OR REPLACE INTO reference_data (
                  isin, sector, area, country_region,
                  scope1_direct, scope2_location, scope2_market, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    reference.isin,
                    reference.sector,
                    reference.region,
                    reference.country,
                    reference.scope1_direct,
                    reference.scope2_location,
                    reference.scope2_market,
                    now,
                ],
            )
            .with_context(|| format!("insert reference data for {}", reference.isin))?;
        Ok(())
    }

    /// Loads a dataset in one transaction.
    pub fn seed(&self, records: &[RowRecord], references: &[ReferenceRecord]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin seed transaction")?;
        for record in records {
            self.insert_record(record)?;
        }
        for reference in references {
            self.insert_reference(reference)?;
        }
        tx.commit().context("commit seed transaction")?;
        info!(
            records = records.len(),
            references = references.len(),
            "seeded dataset"
        );
        Ok(())
    }

    pub fn create_user(&self, username: &str, password: &str, is_admin: bool) -> Result<UserId> {
        let username = username.trim();
        if username.is_empty() {
            bail!("username must not be empty");
        }
        if password.is_empty() {
            bail!("password must not be empty");
        }
        let now = now_rfc3339()?;
        let salt = new_salt(username);
        let hash = password_hash(&salt, password);
        self.conn
            .execute(
                "
                INSERT INTO users (username, password_salt, password_hash, is_admin, created_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![username, salt, hash, is_admin, now],
            )
            .with_context(|| format!("create user {username}; pick a different username"))?;
        Ok(UserId::new(self.conn.last_insert_rowid()))
    }

    /// True only for an existing admin whose password matches.
    pub fn verify_login(&self, credentials: &Credentials) -> Result<bool> {
        let stored = self
            .conn
            .query_row(
                "SELECT password_salt, password_hash, is_admin FROM users WHERE username = ?",
                params![credentials.username.trim()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()
            .context("look up user")?;
        let Some((salt, hash, is_admin)) = stored else {
            return Ok(false);
        };
        Ok(is_admin && password_hash(&salt, &credentials.password) == hash)
    }

    /// Validates and writes every editable field. Rejections come back as an unsuccessful outcome.
    pub fn update_record(&self, record: &RowRecord) -> Result<WriteOutcome> {
        let Some(stored) = self.get_record(record.id)? else {
            return Ok(rejected(WriteRejection::NotFound));
        };
        if let Err(rejection) = check_identity(&stored, record) {
            return Ok(rejected(rejection));
        }
        let regions = self.region_country_map()?;
        if let Err(rejection) = validate_record(record, &regions) {
            return Ok(rejected(rejection));
        }

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                UPDATE emissions_data
                SET sector = ?, area = ?, country_region = ?,
                    scope1_direct = ?, scope2_location = ?, scope2_market = ?,
                    updated_at = ?
                WHERE id = ?
                ",
                params![
                    record.sector.as_deref().map(str::trim),
                    record.region,
                    record.country,
                    record.scope1_direct,
                    record.scope2_location,
                    record.scope2_market,
                    now,
                    record.id.get(),
                ],
            )
            .with_context(|| format!("update record {}", record.id.get()))?;
        info!(id = record.id.get(), company = %record.company_name, "record updated");
        Ok(WriteOutcome::accepted())
    }

    /// Writes the rows matching `query` as CSV, ignoring its sort.
    pub fn download(&self, query: &QueryDescriptor, dest: &Path) -> Result<u64> {
        let rows = self.query_all(&query.without_order())?;
        write_csv(&rows, dest)
    }

    pub fn export_all(&self, dest: &Path) -> Result<u64> {
        let all = self.all_rows()?;
        write_csv(&all.rows, dest)
    }

    pub fn record_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM emissions_data", [], |row| row.get(0))
            .context("count records")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn distinct_values(&self, column: &str) -> Result<Vec<String>> {
        if !is_safe_identifier(column) {
            bail!("invalid column name: {column:?}");
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "
                SELECT DISTINCT {column}
                FROM emissions_data
                WHERE {column} IS NOT NULL AND {column} <> ''
                ORDER BY {column} ASC
                "
            ))
            .with_context(|| format!("prepare distinct {column} query"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .with_context(|| format!("query distinct {column}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect distinct {column}"))
    }

    fn collect_rows(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<RowRecord>> {
        let mut stmt = self.conn.prepare(sql).context("prepare row query")?;
        let rows = stmt
            .query_map(params_from_iter(bind(params)), read_row)
            .context("query rows")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect rows")
    }
}

impl DataService for Store {
    fn filter_options(&self) -> ServiceResult<FilterOptions> {
        Store::filter_options(self).map_err(store_error)
    }

    fn region_country_map(&self) -> ServiceResult<BTreeMap<String, Vec<String>>> {
        Store::region_country_map(self).map_err(store_error)
    }

    fn rows(&self, query: &QueryDescriptor, page: u32, page_size: u32) -> ServiceResult<RowPage> {
        self.query_rows(query, page, page_size).map_err(store_error)
    }

    fn all_rows(&self) -> ServiceResult<AllRows> {
        Store::all_rows(self).map_err(store_error)
    }

    fn chart_items(&self, dimension: ChartDimension) -> ServiceResult<Vec<String>> {
        Store::chart_items(self, dimension).map_err(store_error)
    }

    fn chart_data(&self, query: &AggregateQuery) -> ServiceResult<Vec<ChartPoint>> {
        Store::chart_data(self, query).map_err(store_error)
    }

    fn reference_data(&self, id: RecordId) -> ServiceResult<Option<ReferenceRecord>> {
        self.reference_for(id).map_err(store_error)
    }

    fn login(&self, credentials: &Credentials) -> ServiceResult<LoginOutcome> {
        if self.verify_login(credentials).map_err(store_error)? {
            Ok(LoginOutcome { success: true })
        } else {
            Err(ServiceError::Auth("invalid username or password".to_owned()))
        }
    }

    fn update_row(&self, record: &RowRecord) -> ServiceResult<WriteOutcome> {
        let outcome = self.update_record(record).map_err(store_error)?;
        if outcome.success {
            Ok(outcome)
        } else {
            Err(ServiceError::Validation(
                outcome.message.unwrap_or_else(|| "write rejected".to_owned()),
            ))
        }
    }

    fn download(&self, query: &QueryDescriptor, dest: &Path) -> ServiceResult<u64> {
        Store::download(self, query, dest).map_err(store_error)
    }
}

fn store_error(err: anyhow::Error) -> ServiceError {
    warn!(error = %format!("{err:#}"), "store call failed");
    ServiceError::Network(format!("{err:#}"))
}

fn rejected(rejection: WriteRejection) -> WriteOutcome {
    warn!(reason = %rejection, "write rejected");
    WriteOutcome::rejected(rejection.to_string())
}

/// Writes rows as CSV with the stored column names. Missing values are empty cells.
pub fn write_csv(rows: &[RowRecord], dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export directory {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(dest)
        .with_context(|| format!("create {}; check the export directory", dest.display()))?;
    writer
        .write_record(CSV_HEADERS)
        .context("write csv header")?;
    for row in rows {
        writer
            .write_record([
                row.id.get().to_string(),
                row.company_name.clone(),
                row.isin.clone().unwrap_or_default(),
                row.ticker.clone().unwrap_or_default(),
                csv_number(row.weight),
                row.sector.clone().unwrap_or_default(),
                row.region.clone().unwrap_or_default(),
                row.country.clone().unwrap_or_default(),
                csv_number(row.scope1_direct),
                csv_number(row.scope2_location),
                csv_number(row.scope2_market),
            ])
            .with_context(|| format!("write csv row for {}", row.company_name))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", dest.display()))?;
    Ok(rows.len() as u64)
}

fn csv_number(value: Option<f64>) -> String {
    value.map(|number| number.to_string()).unwrap_or_default()
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("GHGSCOPE_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set GHGSCOPE_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("ghgscope.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RowRecord> {
    Ok(RowRecord {
        id: RecordId::new(row.get(0)?),
        company_name: row.get(1)?,
        isin: row.get(2)?,
        ticker: row.get(3)?,
        weight: read_number(row, 4)?,
        sector: row.get(5)?,
        region: row.get(6)?,
        country: row.get(7)?,
        scope1_direct: read_number(row, 8)?,
        scope2_location: read_number(row, 9)?,
        scope2_market: read_number(row, 10)?,
    })
}

/// Numeric cell that may have been stored as text by older loaders.
fn read_number(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value as f64),
        ValueRef::Real(value) => Some(value),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok()),
        ValueRef::Blob(_) => None,
    })
}

fn bind(params: &[SqlParam]) -> Vec<Value> {
    params
        .iter()
        .map(|param| match param {
            SqlParam::Integer(value) => Value::Integer(*value),
            SqlParam::Real(value) => Value::Real(*value),
            SqlParam::Text(value) => Value::Text(value.clone()),
        })
        .collect()
}

fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point storage.db_path at a ghgscope database"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; migrate the database before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; migrate the database before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn new_salt(username: &str) -> String {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let mut salt = checksum_sha256(format!("{username}:{nanos}:{}", std::process::id()).as_bytes());
    salt.truncate(32);
    salt
}

fn password_hash(salt: &str, password: &str) -> String {
    checksum_sha256(format!("{salt}${password}").as_bytes())
}

fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{Store, password_hash, read_number};
    use anyhow::Result;
    use ghgscope_app::Credentials;

    #[test]
    fn password_hash_depends_on_salt() {
        assert_ne!(password_hash("a", "admin"), password_hash("b", "admin"));
        assert_eq!(password_hash("a", "admin").len(), 64);
    }

    #[test]
    fn text_numbers_from_older_loaders_are_read() -> Result<()> {
        let store = Store::open_memory()?;
        let value = store.raw_connection().query_row(
            "SELECT '1017651.0', 'n/a', NULL, 7",
            [],
            |row| {
                Ok((
                    read_number(row, 0)?,
                    read_number(row, 1)?,
                    read_number(row, 2)?,
                    read_number(row, 3)?,
                ))
            },
        )?;
        assert_eq!(value, (Some(1_017_651.0), None, None, Some(7.0)));
        Ok(())
    }

    #[test]
    fn non_admin_users_cannot_log_in() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        store.create_user("analyst", "secret", false)?;
        assert!(!store.verify_login(&Credentials {
            username: "analyst".to_owned(),
            password: "secret".to_owned(),
        })?);
        Ok(())
    }
}
