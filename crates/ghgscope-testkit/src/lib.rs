// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use ghgscope_app::{RecordId, ReferenceRecord, RowRecord};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEMO_USERNAME: &str = "admin";
pub const DEMO_PASSWORD: &str = "admin";
pub const DEMO_COMPANY_COUNT: usize = 120;

const SECTORS: [&str; 11] = [
    "Communication Services",
    "Consumer Discretionary",
    "Consumer Staples",
    "Energy",
    "Financials",
    "Health Care",
    "Industrials",
    "Information Technology",
    "Materials",
    "Real Estate",
    "Utilities",
];

const REGIONS: [(&str, &[(&str, &str)]); 4] = [
    (
        "Americas",
        &[
            ("United States", "US"),
            ("Canada", "CA"),
            ("Brazil", "BR"),
            ("Mexico", "MX"),
        ],
    ),
    (
        "Europe",
        &[
            ("France", "FR"),
            ("Germany", "DE"),
            ("United Kingdom", "GB"),
            ("Netherlands", "NL"),
            ("Switzerland", "CH"),
        ],
    ),
    (
        "Asia Pacific",
        &[
            ("Japan", "JP"),
            ("Australia", "AU"),
            ("Hong Kong", "HK"),
            ("Singapore", "SG"),
        ],
    ),
    (
        "Middle East & Africa",
        &[
            ("South Africa", "ZA"),
            ("Israel", "IL"),
            ("Saudi Arabia", "SA"),
        ],
    ),
];

const NAME_PREFIXES: [&str; 16] = [
    "Northern", "Pacific", "Atlas", "Summit", "Harbor", "Granite", "Meridian", "Crescent",
    "Sterling", "Evergreen", "Cobalt", "Polar", "Redwood", "Silver", "Union", "Vanguard",
];
const NAME_NOUNS: [&str; 14] = [
    "Power", "Mining", "Steel", "Foods", "Telecom", "Logistics", "Chemicals", "Energy",
    "Holdings", "Pharma", "Motors", "Cement", "Gold", "Airlines",
];
const NAME_SUFFIXES: [&str; 6] = ["Corp", "Group", "Inc", "plc", "AG", "Ltd"];

/// Rough tonnes of scope 1 emissions for a large company in the sector.
const SECTOR_INTENSITY: [f64; 11] = [
    40_000.0, 150_000.0, 300_000.0, 8_000_000.0, 10_000.0, 60_000.0, 900_000.0, 20_000.0,
    4_000_000.0, 30_000.0, 12_000_000.0,
];

struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }

    fn one_in(&mut self, n: usize) -> bool {
        self.int_n(n) == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoDataset {
    pub records: Vec<RowRecord>,
    pub references: Vec<ReferenceRecord>,
}

pub struct EmissionsFaker {
    rng: DeterministicRng,
    used_names: BTreeSet<String>,
    next_id: i64,
}

impl EmissionsFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            used_names: BTreeSet::new(),
            next_id: 1,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn company(&mut self) -> RowRecord {
        let sector_index = self.rng.int_n(SECTORS.len());
        let (region, countries) = REGIONS[self.rng.int_n(REGIONS.len())];
        let (country, country_code) = countries[self.rng.int_n(countries.len())];
        let name = self.company_name();
        let intensity = SECTOR_INTENSITY[sector_index];

        let id = RecordId::new(self.next_id);
        self.next_id += 1;

        let scope1 = self.emission(intensity);
        let scope2_location = self.emission(intensity * 0.3);
        let scope2_market = match scope2_location {
            Some(location) if !self.rng.one_in(6) => Some(round_tenths(location * self.between(0.4, 1.1))),
            _ => self.emission(intensity * 0.25),
        };

        RowRecord {
            id,
            isin: (!self.rng.one_in(20)).then(|| self.isin(country_code)),
            ticker: Some(ticker_for(&name)),
            weight: Some(round_hundredths(self.between(0.01, 2.5))),
            company_name: name,
            sector: Some(SECTORS[sector_index].to_owned()),
            region: Some(region.to_owned()),
            country: Some(country.to_owned()),
            scope1_direct: scope1,
            scope2_location,
            scope2_market,
        }
    }

    /// Externally sourced values that roughly agree with `record`. Records without an ISIN get none.
    pub fn reference_for(&mut self, record: &RowRecord) -> Option<ReferenceRecord> {
        let isin = record.isin.clone()?;
        if self.rng.one_in(10) {
            return None;
        }
        Some(ReferenceRecord {
            isin,
            sector: record.sector.clone(),
            region: record.region.clone(),
            country: record.country.clone(),
            scope1_direct: self.perturb(record.scope1_direct),
            scope2_location: self.perturb(record.scope2_location),
            scope2_market: self.perturb(record.scope2_market),
        })
    }

    pub fn dataset(&mut self, count: usize) -> DemoDataset {
        let records: Vec<RowRecord> = (0..count).map(|_| self.company()).collect();
        let references = records
            .iter()
            .filter_map(|record| self.reference_for(record))
            .collect();
        DemoDataset {
            records,
            references,
        }
    }

    fn company_name(&mut self) -> String {
        let base = format!(
            "{} {} {}",
            pick(&mut self.rng, &NAME_PREFIXES),
            pick(&mut self.rng, &NAME_NOUNS),
            pick(&mut self.rng, &NAME_SUFFIXES)
        );
        let mut name = base.clone();
        let mut suffix = 2;
        while !self.used_names.insert(name.clone()) {
            name = format!("{base} {suffix}");
            suffix += 1;
        }
        name
    }

    fn isin(&mut self, country_code: &str) -> String {
        let digits: String = (0..10)
            .map(|_| char::from(b'0' + self.rng.int_n(10) as u8))
            .collect();
        format!("{country_code}{digits}")
    }

    fn emission(&mut self, scale: f64) -> Option<f64> {
        if self.rng.one_in(8) {
            return None;
        }
        Some(round_tenths(scale * self.between(0.05, 1.5)))
    }

    fn perturb(&mut self, value: Option<f64>) -> Option<f64> {
        let value = value?;
        Some(round_tenths(value * self.between(0.9, 1.1)))
    }

    fn between(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.rng.unit()
    }
}

/// The deterministic dataset behind `--demo`.
pub fn demo_dataset() -> DemoDataset {
    EmissionsFaker::new(7).dataset(DEMO_COMPANY_COUNT)
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("ghgscope-test.db");
    Ok((dir, path))
}

pub fn sectors() -> &'static [&'static str] {
    &SECTORS
}

pub fn regions() -> impl Iterator<Item = (&'static str, Vec<&'static str>)> {
    REGIONS.iter().map(|(region, countries)| {
        (
            *region,
            countries.iter().map(|(country, _)| *country).collect(),
        )
    })
}

fn pick<'a>(rng: &mut DeterministicRng, items: &'a [&'a str]) -> &'a str {
    items[rng.int_n(items.len())]
}

fn ticker_for(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .filter(char::is_ascii_alphabetic)
        .map(|ch| ch.to_ascii_uppercase())
        .take(4)
        .collect()
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{EmissionsFaker, demo_dataset, regions, sectors, ticker_for};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_dataset() {
        let left = EmissionsFaker::new(42).dataset(25);
        let right = EmissionsFaker::new(42).dataset(25);
        assert_eq!(left, right);
    }

    #[test]
    fn company_names_are_unique() {
        let dataset = EmissionsFaker::new(3).dataset(400);
        let names: BTreeSet<&str> = dataset
            .records
            .iter()
            .map(|record| record.company_name.as_str())
            .collect();
        assert_eq!(names.len(), 400);
    }

    #[test]
    fn countries_belong_to_their_region() {
        let dataset = EmissionsFaker::new(9).dataset(200);
        let lookup: Vec<(&str, Vec<&str>)> = regions().collect();
        for record in &dataset.records {
            let region = record.region.as_deref().expect("region");
            let country = record.country.as_deref().expect("country");
            let (_, countries) = lookup
                .iter()
                .find(|(name, _)| *name == region)
                .expect("known region");
            assert!(countries.contains(&country), "{country} not in {region}");
            assert!(sectors().contains(&record.sector.as_deref().expect("sector")));
        }
    }

    #[test]
    fn emissions_include_nulls_and_never_go_negative() {
        let dataset = demo_dataset();
        let values: Vec<Option<f64>> = dataset
            .records
            .iter()
            .flat_map(|r| [r.scope1_direct, r.scope2_location, r.scope2_market])
            .collect();
        assert!(values.iter().any(Option::is_none));
        assert!(values.iter().flatten().all(|value| *value >= 0.0));
    }

    #[test]
    fn references_share_isin_with_a_record() {
        let dataset = demo_dataset();
        assert!(!dataset.references.is_empty());
        let isins: BTreeSet<&str> = dataset
            .records
            .iter()
            .filter_map(|record| record.isin.as_deref())
            .collect();
        for reference in &dataset.references {
            assert!(isins.contains(reference.isin.as_str()));
        }
    }

    #[test]
    fn ticker_uses_word_initials() {
        assert_eq!(ticker_for("Atlas Mining plc"), "AMP");
        assert_eq!(ticker_for("Union Steel Group 2"), "USG");
    }
}
