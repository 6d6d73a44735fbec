use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::{Vehicle, VehicleKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TypeFilter {
    #[default]
    All,
    Bus,
    Tram,
}

impl TypeFilter {
    fn matches(self, kind: VehicleKind) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Bus => kind == VehicleKind::Bus,
            TypeFilter::Tram => kind == VehicleKind::Tram,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum DelayFilter {
    #[default]
    All,
    OnTime,
    Delayed,
}

impl DelayFilter {
    fn matches(self, vehicle: &Vehicle) -> bool {
        match self {
            DelayFilter::All => true,
            DelayFilter::OnTime => !vehicle.is_delayed(),
            DelayFilter::Delayed => vehicle.is_delayed(),
        }
    }
}

/// Split free text on commas into trimmed, uppercased, non-empty line names
pub fn parse_line_list(text: &str) -> BTreeSet<String> {
    text.split(',')
        .map(|part| part.trim().to_uppercase())
        .filter(|part| !part.is_empty())
        .collect()
}

/// The user's current selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FilterCriteria {
    /// Normalized line names; empty means every line
    pub lines: BTreeSet<String>,
    pub kind: TypeFilter,
    pub delay: DelayFilter,
}

/// Partial change to [`FilterCriteria`]; `None` fields are left alone
#[derive(Clone, Debug, Default)]
pub struct FilterUpdate {
    pub lines: Option<String>,
    pub kind: Option<TypeFilter>,
    pub delay: Option<DelayFilter>,
}

impl FilterCriteria {
    pub fn new(line_text: &str, kind: TypeFilter, delay: DelayFilter) -> Self {
        Self {
            lines: parse_line_list(line_text),
            kind,
            delay,
        }
    }

    pub fn update(&mut self, update: FilterUpdate) {
        if let Some(text) = update.lines {
            self.lines = parse_line_list(&text);
        }
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(delay) = update.delay {
            self.delay = delay;
        }
    }

    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        self.kind.matches(vehicle.kind)
            && self.delay.matches(vehicle)
            && (self.lines.is_empty() || self.lines.iter().any(|line| vehicle.is_line(line)))
    }
}

/// Visible vehicles and their per-kind counts
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterResult {
    pub vehicles: Vec<Vehicle>,
    pub bus_count: usize,
    pub tram_count: usize,
}

pub fn apply(vehicles: &[Vehicle], criteria: &FilterCriteria) -> FilterResult {
    let visible: Vec<Vehicle> = vehicles
        .iter()
        .filter(|vehicle| criteria.matches(vehicle))
        .cloned()
        .collect();

    let tram_count = visible.iter().filter(|v| v.kind == VehicleKind::Tram).count();
    let bus_count = visible.len() - tram_count;

    FilterResult {
        vehicles: visible,
        bus_count,
        tram_count,
    }
}

/// Caches the last [`apply`] result keyed on snapshot generation and criteria
#[derive(Debug, Default)]
pub struct FilteredView {
    key: Option<(u64, FilterCriteria)>,
    result: Arc<FilterResult>,
}

impl FilteredView {
    pub fn get(
        &mut self,
        generation: u64,
        vehicles: &[Vehicle],
        criteria: &FilterCriteria,
    ) -> Arc<FilterResult> {
        let fresh = matches!(&self.key, Some((g, c)) if *g == generation && c == criteria);
        if !fresh {
            self.result = Arc::new(apply(vehicles, criteria));
            self.key = Some((generation, criteria.clone()));
        }
        Arc::clone(&self.result)
    }
}
