// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::{Facet, FilterOptions, Selection};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown {facet} `{value}` -- pick one of the listed values")]
    UnknownValue { facet: &'static str, value: String },
    #[error("country `{country}` is not in region `{region}` -- pick a country from that region")]
    CountryOutsideRegion { country: String, region: String },
}

/// Region to country lookup, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionCountryMap {
    regions: BTreeMap<String, Vec<String>>,
}

impl RegionCountryMap {
    pub fn new(regions: BTreeMap<String, Vec<String>>) -> Self {
        let regions = regions
            .into_iter()
            .map(|(region, countries)| {
                let mut seen = BTreeSet::new();
                let countries = countries
                    .into_iter()
                    .filter(|country| seen.insert(country.clone()))
                    .collect();
                (region, countries)
            })
            .collect();
        Self { regions }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.regions
    }

    /// Countries allowed under `region`. `All` yields the sorted union of every region.
    pub fn countries_for(&self, region: &Selection) -> Vec<String> {
        match region {
            Selection::All => self
                .regions
                .values()
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            Selection::Only(name) => self.regions.get(name).cloned().unwrap_or_default(),
        }
    }

    pub fn allows(&self, region: &Selection, country: &Selection) -> bool {
        match country {
            Selection::All => true,
            Selection::Only(name) => self.countries_for(region).iter().any(|c| c == name),
        }
    }
}

impl From<BTreeMap<String, Vec<String>>> for RegionCountryMap {
    fn from(value: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    sector: Selection,
    region: Selection,
    country: Selection,
    options: FilterOptions,
    map: RegionCountryMap,
    allowed_countries: Vec<String>,
}

impl FilterState {
    pub fn new(options: FilterOptions, map: RegionCountryMap) -> Self {
        let allowed_countries = map.countries_for(&Selection::All);
        Self {
            sector: Selection::All,
            region: Selection::All,
            country: Selection::All,
            options,
            map,
            allowed_countries,
        }
    }

    pub fn sector(&self) -> &Selection {
        &self.sector
    }

    pub fn region(&self) -> &Selection {
        &self.region
    }

    pub fn country(&self) -> &Selection {
        &self.country
    }

    pub fn get(&self, facet: Facet) -> &Selection {
        match facet {
            Facet::Sector => &self.sector,
            Facet::Region => &self.region,
            Facet::Country => &self.country,
        }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn region_map(&self) -> &RegionCountryMap {
        &self.map
    }

    pub fn allowed_countries(&self) -> &[String] {
        &self.allowed_countries
    }

    /// Values the facet can take right now, excluding `all`.
    pub fn choices(&self, facet: Facet) -> Vec<String> {
        match facet {
            Facet::Sector => self.options.sectors.clone(),
            Facet::Region => {
                let mut regions: BTreeSet<String> = self.options.regions.iter().cloned().collect();
                regions.extend(self.map.regions().map(str::to_owned));
                regions.into_iter().collect()
            }
            Facet::Country => self.allowed_countries.clone(),
        }
    }

    /// Returns `Ok(true)` when the sector changed.
    pub fn set_sector(&mut self, value: Selection) -> Result<bool, FilterError> {
        self.check_known(Facet::Sector, &value)?;
        if self.sector == value {
            return Ok(false);
        }
        self.sector = value;
        Ok(true)
    }

    /// Changing the region always resets the country to `all`.
    pub fn set_region(&mut self, value: Selection) -> Result<bool, FilterError> {
        self.check_known(Facet::Region, &value)?;
        if self.region == value {
            return Ok(false);
        }
        self.region = value;
        self.country = Selection::All;
        self.allowed_countries = self.map.countries_for(&self.region);
        Ok(true)
    }

    pub fn set_country(&mut self, value: Selection) -> Result<bool, FilterError> {
        if let Selection::Only(name) = &value {
            if !self.allowed_countries.iter().any(|c| c == name) {
                return Err(FilterError::CountryOutsideRegion {
                    country: name.clone(),
                    region: self.region.to_string(),
                });
            }
        }
        if self.country == value {
            return Ok(false);
        }
        self.country = value;
        Ok(true)
    }

    pub fn set(&mut self, facet: Facet, value: Selection) -> Result<bool, FilterError> {
        match facet {
            Facet::Sector => self.set_sector(value),
            Facet::Region => self.set_region(value),
            Facet::Country => self.set_country(value),
        }
    }

    /// Next value in the facet's cycle `all, v1, v2, ..., all`.
    pub fn cycled(&self, facet: Facet, forward: bool) -> Selection {
        let mut ring = vec![Selection::All];
        ring.extend(self.choices(facet).into_iter().map(Selection::Only));
        let current = ring
            .iter()
            .position(|value| value == self.get(facet))
            .unwrap_or(0) as isize;
        let delta = if forward { 1 } else { -1 };
        let next = (current + delta).rem_euclid(ring.len() as isize) as usize;
        ring[next].clone()
    }

    pub fn is_default(&self) -> bool {
        self.sector.is_all() && self.region.is_all() && self.country.is_all()
    }

    pub fn reset(&mut self) -> bool {
        let changed = !self.is_default();
        self.sector = Selection::All;
        self.region = Selection::All;
        self.country = Selection::All;
        self.allowed_countries = self.map.countries_for(&Selection::All);
        changed
    }

    fn check_known(&self, facet: Facet, value: &Selection) -> Result<(), FilterError> {
        let Selection::Only(name) = value else {
            return Ok(());
        };
        if self.choices(facet).iter().any(|known| known == name) {
            return Ok(());
        }
        Err(FilterError::UnknownValue {
            facet: facet.label(),
            value: name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterError, FilterState, RegionCountryMap};
    use crate::{Facet, FilterOptions, Selection};
    use std::collections::BTreeMap;

    fn sample_map() -> RegionCountryMap {
        let mut regions = BTreeMap::new();
        regions.insert(
            "Europe".to_owned(),
            vec!["France".to_owned(), "Germany".to_owned(), "France".to_owned()],
        );
        regions.insert(
            "Americas".to_owned(),
            vec!["Canada".to_owned(), "United States".to_owned()],
        );
        regions.insert("Asia".to_owned(), vec!["Japan".to_owned()]);
        RegionCountryMap::new(regions)
    }

    fn sample_state() -> FilterState {
        let options = FilterOptions {
            sectors: vec!["Energy".to_owned(), "Materials".to_owned()],
            regions: vec!["Americas".to_owned(), "Asia".to_owned(), "Europe".to_owned()],
            countries: vec![
                "Canada".to_owned(),
                "France".to_owned(),
                "Germany".to_owned(),
                "Japan".to_owned(),
                "United States".to_owned(),
            ],
        };
        FilterState::new(options, sample_map())
    }

    #[test]
    fn map_deduplicates_countries() {
        let map = sample_map();
        assert_eq!(
            map.countries_for(&Selection::only("Europe")),
            vec!["France".to_owned(), "Germany".to_owned()]
        );
        assert_eq!(map.countries_for(&Selection::All).len(), 5);
        assert!(map.countries_for(&Selection::only("Atlantis")).is_empty());
    }

    #[test]
    fn region_change_resets_country_and_narrows_choices() {
        let mut state = sample_state();
        assert_eq!(state.set_country(Selection::only("Japan")), Ok(true));

        assert_eq!(state.set_region(Selection::only("Europe")), Ok(true));
        assert_eq!(state.country(), &Selection::All);
        assert_eq!(
            state.allowed_countries(),
            &["France".to_owned(), "Germany".to_owned()]
        );
    }

    #[test]
    fn country_outside_region_is_rejected_without_change() {
        let mut state = sample_state();
        state.set_region(Selection::only("Asia")).expect("known region");

        let err = state
            .set_country(Selection::only("France"))
            .expect_err("france is not in asia");
        assert!(matches!(err, FilterError::CountryOutsideRegion { .. }));
        assert_eq!(state.country(), &Selection::All);
    }

    #[test]
    fn country_always_within_region_after_any_region_sequence() {
        let mut state = sample_state();
        let regions = ["Europe", "all", "Asia", "Americas", "Asia", "all"];
        for (step, region) in regions.iter().enumerate() {
            state
                .set_region(Selection::parse(region))
                .expect("known region");
            let choices = state.allowed_countries().to_vec();
            if let Some(first) = choices.get(step % choices.len().max(1)) {
                state
                    .set_country(Selection::only(first.clone()))
                    .expect("allowed country");
            }
            assert!(
                state
                    .region_map()
                    .allows(state.region(), state.country()),
                "country {} escaped region {}",
                state.country(),
                state.region()
            );
        }
    }

    #[test]
    fn unknown_sector_is_rejected() {
        let mut state = sample_state();
        let err = state
            .set_sector(Selection::only("Utilities"))
            .expect_err("not a listed sector");
        assert!(err.to_string().contains("unknown sector"));
        assert_eq!(state.set_sector(Selection::All), Ok(false));
    }

    #[test]
    fn cycling_walks_through_all_and_wraps() {
        let mut state = sample_state();
        let next = state.cycled(Facet::Sector, true);
        assert_eq!(next, Selection::only("Energy"));
        state.set_sector(next).expect("known sector");
        assert_eq!(state.cycled(Facet::Sector, false), Selection::All);

        state.set_sector(Selection::only("Materials")).expect("known");
        assert_eq!(state.cycled(Facet::Sector, true), Selection::All);
    }

    #[test]
    fn reset_reports_whether_anything_changed() {
        let mut state = sample_state();
        assert!(!state.reset());
        state.set_region(Selection::only("Europe")).expect("known");
        assert!(state.reset());
        assert!(state.is_default());
        assert_eq!(state.allowed_countries().len(), 5);
    }
}
