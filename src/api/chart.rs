use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::{Projection, YearSnapshot};

/// Chart series, in legend order. The index of a series is its position here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Series {
    RetirementFund,
    Principal,
    InterestPerYear,
    TotalInterest,
    Spending,
}

impl Series {
    pub const ALL: [Series; 5] = [
        Series::RetirementFund,
        Series::Principal,
        Series::InterestPerYear,
        Series::TotalInterest,
        Series::Spending,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Series::RetirementFund => "Retirement Fund",
            Series::Principal => "Principal",
            Series::InterestPerYear => "Interest Per Year",
            Series::TotalInterest => "Total Interest",
            Series::Spending => "Spending",
        }
    }

    fn value(self, snapshot: &YearSnapshot) -> f64 {
        match self {
            Series::RetirementFund => snapshot.balance,
            Series::Principal => snapshot.principal,
            Series::InterestPerYear => snapshot.interest_this_year,
            Series::TotalInterest => snapshot.total_interest,
            Series::Spending => snapshot.spending,
        }
    }
}

/// Indices of series the user has hidden in the chart legend.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HiddenSeries(BTreeSet<usize>);

impl HiddenSeries {
    /// Parses a comma separated index list such as `"0,3"`. Entries that are
    /// not indices are skipped.
    pub fn parse(raw: &str) -> Self {
        raw.split(',')
            .filter_map(|part| part.trim().parse::<usize>().ok())
            .collect()
    }

    /// Builds the selection from per-series legend flags.
    pub fn from_flags(flags: &[bool]) -> Self {
        flags
            .iter()
            .enumerate()
            .filter(|(_, hidden)| **hidden)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|idx| idx.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_hidden(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<usize> for HiddenSeries {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: &'static str,
    pub data: Vec<f64>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<u32>,
    pub datasets: Vec<Dataset>,
}

pub fn chart_data(projection: &Projection, hidden: &HiddenSeries) -> ChartData {
    let labels = projection.years.iter().map(|s| s.age).collect();
    let datasets = Series::ALL
        .iter()
        .enumerate()
        .map(|(idx, series)| Dataset {
            label: series.label(),
            data: projection.years.iter().map(|s| series.value(s)).collect(),
            hidden: hidden.is_hidden(idx),
        })
        .collect();

    ChartData { labels, datasets }
}
