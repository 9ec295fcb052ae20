// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use ghgscope_app::RowRecord;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRejection {
    NotFound,
    IdentityMismatch,
    EmptySector,
    NegativeEmission { field: &'static str, value: f64 },
    NonFiniteEmission { field: &'static str },
    CountryOutsideRegion { country: String, region: String },
}

impl std::fmt::Display for WriteRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("record not found; reload the table and retry"),
            Self::IdentityMismatch => {
                f.write_str("company name or ISIN differs from the stored record; reload and retry")
            }
            Self::EmptySector => f.write_str("sector must not be empty"),
            Self::NegativeEmission { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::NonFiniteEmission { field } => write!(f, "{field} must be a finite number"),
            Self::CountryOutsideRegion { country, region } => {
                write!(f, "country `{country}` is not part of region `{region}`")
            }
        }
    }
}

impl std::error::Error for WriteRejection {}

pub type WriteResult<T> = std::result::Result<T, WriteRejection>;

/// Checks the editable fields of `record`. Identity is checked against storage separately.
pub fn validate_record(
    record: &RowRecord,
    regions: &BTreeMap<String, Vec<String>>,
) -> WriteResult<()> {
    let sector_present = record
        .sector
        .as_deref()
        .is_some_and(|sector| !sector.trim().is_empty());
    if !sector_present {
        return Err(WriteRejection::EmptySector);
    }

    let emissions = [
        ("scope 1", record.scope1_direct),
        ("scope 2 location", record.scope2_location),
        ("scope 2 market", record.scope2_market),
    ];
    for (field, value) in emissions {
        let Some(value) = value else {
            continue;
        };
        if !value.is_finite() {
            return Err(WriteRejection::NonFiniteEmission { field });
        }
        if value < 0.0 {
            return Err(WriteRejection::NegativeEmission { field, value });
        }
    }

    if let (Some(region), Some(country)) = (record.region.as_deref(), record.country.as_deref())
        && let Some(countries) = regions.get(region)
        && !countries.iter().any(|known| known == country)
    {
        return Err(WriteRejection::CountryOutsideRegion {
            country: country.to_owned(),
            region: region.to_owned(),
        });
    }

    Ok(())
}

pub fn check_identity(stored: &RowRecord, incoming: &RowRecord) -> WriteResult<()> {
    if stored.same_identity(incoming) {
        Ok(())
    } else {
        Err(WriteRejection::IdentityMismatch)
    }
}
