//! Binding between a [`Plan`] and a string key-value store such as the page
//! URL's query string.
//!
//! Each plan field is stored under its human-readable label. Values equal to
//! the field's default are deleted rather than stored, so a fresh page has an
//! empty query string. The field being solved for is an output: it is only
//! stored while finite and is never read back.
//!
//! Links written by the first version of the calculator used slightly
//! different keys (`Starting age`, `Withdrawl Rate (%)`, `disabledField`, ...).
//! Those are still accepted when the current key is absent.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use super::chart::HiddenSeries;
use crate::core::{Plan, SolveFor};

pub const SOLVE_FOR_PARAM: &str = "solveFor";
pub const HIDDEN_SERIES_PARAM: &str = "hiddenSeries";

const LEGACY_SOLVE_FOR_PARAM: &str = "disabledField";
const LEGACY_HIDDEN_SERIES_PARAM: &str = "hiddenDatasets";

/// Ages above this are rejected when read from the store.
pub const MAX_ACCEPTED_AGE: u32 = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("{field}: '{value}' is not a valid number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field}: value must be finite")]
    NotFinite { field: &'static str },

    #[error("{field}: {value} exceeds the maximum age of {max}")]
    AgeOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("malformed query string: {0}")]
    MalformedQuery(String),
}

/// String key-value storage for plan parameters.
pub trait ParamStore {
    fn get(&self, name: &str) -> Option<String>;

    /// Stores `value` under `name`. An empty value deletes the entry.
    fn set(&mut self, name: &str, value: &str);

    fn delete(&mut self, name: &str);
}

/// Ordered name/value pairs backed by an `application/x-www-form-urlencoded`
/// query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(query: &str) -> Result<Self, ParamError> {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map_err(|e| ParamError::MalformedQuery(e.to_string()))?;
        Ok(Self { pairs })
    }

    pub fn to_query_string(&self) -> String {
        // Serializing a sequence of string pairs cannot fail.
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl ParamStore for QueryParams {
    fn get(&self, name: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.delete(name);
            return;
        }
        match self.pairs.iter().position(|(k, _)| k == name) {
            Some(idx) => {
                self.pairs[idx].1 = value.to_string();
                let mut seen = 0;
                self.pairs.retain(|(k, _)| {
                    if k != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((name.to_string(), value.to_string())),
        }
    }

    fn delete(&mut self, name: &str) {
        self.pairs.retain(|(k, _)| k != name);
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FieldValue {
    Age(u32),
    Amount(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Age(v) => write!(f, "{v}"),
            FieldValue::Amount(v) => write!(f, "{v}"),
        }
    }
}

/// An editable plan field, in form order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PlanField {
    StartingAge,
    StartingBalance,
    InterestRate,
    RetirementAge,
    MaxAge,
    StartingInvestmentPerMonth,
    InvestmentIncreasingRate,
    SpendingPerYear,
    WithdrawalRate,
}

impl PlanField {
    pub const ALL: [PlanField; 9] = [
        PlanField::StartingAge,
        PlanField::StartingBalance,
        PlanField::InterestRate,
        PlanField::RetirementAge,
        PlanField::MaxAge,
        PlanField::StartingInvestmentPerMonth,
        PlanField::InvestmentIncreasingRate,
        PlanField::SpendingPerYear,
        PlanField::WithdrawalRate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PlanField::StartingAge => "Starting Age",
            PlanField::StartingBalance => "Starting Balance",
            PlanField::InterestRate => "Interest Rate (%)",
            PlanField::RetirementAge => "Retirement Age",
            PlanField::MaxAge => "Max Age",
            PlanField::StartingInvestmentPerMonth => "Starting Investment Per Month",
            PlanField::InvestmentIncreasingRate => "Investment Increasing Rate (%)",
            PlanField::SpendingPerYear => "Spending Per Year",
            PlanField::WithdrawalRate => "Withdrawal Rate (%)",
        }
    }

    /// Key used for this field by older links, where it differs.
    pub fn legacy_label(self) -> Option<&'static str> {
        match self {
            PlanField::StartingAge => Some("Starting age"),
            PlanField::SpendingPerYear => Some("Spending Per Year Input"),
            PlanField::WithdrawalRate => Some("Withdrawl Rate (%)"),
            _ => None,
        }
    }

    /// Accepts both current and legacy labels.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.label() == label || f.legacy_label() == Some(label))
    }

    fn lookup(self, store: &impl ParamStore) -> Option<String> {
        store
            .get(self.label())
            .or_else(|| self.legacy_label().and_then(|legacy| store.get(legacy)))
    }

    /// Fields that a solver can derive.
    pub fn solve_for(self) -> Option<SolveFor> {
        match self {
            PlanField::RetirementAge => Some(SolveFor::RetirementAge),
            PlanField::WithdrawalRate => Some(SolveFor::WithdrawalRate),
            PlanField::StartingInvestmentPerMonth => Some(SolveFor::MonthlyInvestment),
            _ => None,
        }
    }

    pub fn for_solve_target(target: SolveFor) -> Self {
        match target {
            SolveFor::RetirementAge => PlanField::RetirementAge,
            SolveFor::WithdrawalRate => PlanField::WithdrawalRate,
            SolveFor::MonthlyInvestment => PlanField::StartingInvestmentPerMonth,
        }
    }

    pub fn read(self, plan: &Plan) -> FieldValue {
        let a = &plan.assumptions;
        match self {
            PlanField::StartingAge => FieldValue::Age(a.starting_age),
            PlanField::StartingBalance => FieldValue::Amount(a.starting_balance),
            PlanField::InterestRate => FieldValue::Amount(a.annual_interest_rate_percent),
            PlanField::RetirementAge => FieldValue::Age(a.retirement_age),
            PlanField::MaxAge => FieldValue::Age(a.max_age),
            PlanField::StartingInvestmentPerMonth => {
                FieldValue::Amount(a.starting_monthly_investment)
            }
            PlanField::InvestmentIncreasingRate => {
                FieldValue::Amount(a.annual_investment_increase_rate_percent)
            }
            PlanField::SpendingPerYear => FieldValue::Amount(a.annual_spending),
            PlanField::WithdrawalRate => FieldValue::Amount(plan.withdrawal_rate_percent),
        }
    }

    pub fn write(self, plan: &mut Plan, raw: &str) -> Result<(), ParamError> {
        let a = &mut plan.assumptions;
        match self {
            PlanField::StartingAge => a.starting_age = self.parse_age(raw)?,
            PlanField::RetirementAge => a.retirement_age = self.parse_age(raw)?,
            PlanField::MaxAge => a.max_age = self.parse_age(raw)?,
            PlanField::StartingBalance => a.starting_balance = self.parse_amount(raw)?,
            PlanField::InterestRate => a.annual_interest_rate_percent = self.parse_amount(raw)?,
            PlanField::StartingInvestmentPerMonth => {
                a.starting_monthly_investment = self.parse_amount(raw)?
            }
            PlanField::InvestmentIncreasingRate => {
                a.annual_investment_increase_rate_percent = self.parse_amount(raw)?
            }
            PlanField::SpendingPerYear => a.annual_spending = self.parse_amount(raw)?,
            PlanField::WithdrawalRate => plan.withdrawal_rate_percent = self.parse_amount(raw)?,
        }
        Ok(())
    }

    fn parse_age(self, raw: &str) -> Result<u32, ParamError> {
        let value = raw
            .trim()
            .parse::<u32>()
            .map_err(|_| self.invalid_number(raw))?;
        if value > MAX_ACCEPTED_AGE {
            return Err(ParamError::AgeOutOfRange {
                field: self.label(),
                value,
                max: MAX_ACCEPTED_AGE,
            });
        }
        Ok(value)
    }

    fn parse_amount(self, raw: &str) -> Result<f64, ParamError> {
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| self.invalid_number(raw))?;
        if !value.is_finite() {
            return Err(ParamError::NotFinite {
                field: self.label(),
            });
        }
        Ok(value)
    }

    fn invalid_number(self, raw: &str) -> ParamError {
        ParamError::InvalidNumber {
            field: self.label(),
            value: raw.to_string(),
        }
    }
}

/// Reads a plan from `store`, starting from the defaults. An unknown or
/// non-solvable `solveFor` value falls back to the default target. The
/// solved field keeps its default since the solver overwrites it.
pub fn load_plan(store: &impl ParamStore) -> Result<Plan, ParamError> {
    let mut plan = Plan::default();

    let solve_for = store
        .get(SOLVE_FOR_PARAM)
        .or_else(|| store.get(LEGACY_SOLVE_FOR_PARAM));
    if let Some(raw) = solve_for {
        match PlanField::from_label(&raw).and_then(PlanField::solve_for) {
            Some(target) => plan.solve_for = target,
            None => warn!(value = %raw, "ignoring unknown solveFor field"),
        }
    }

    let solved = PlanField::for_solve_target(plan.solve_for);
    for field in PlanField::ALL {
        if field == solved {
            continue;
        }
        if let Some(raw) = field.lookup(store) {
            field.write(&mut plan, &raw)?;
        }
    }

    Ok(plan)
}

/// Writes every plan field to `store`, deleting those at their default.
pub fn store_plan(store: &mut impl ParamStore, plan: &Plan) {
    let defaults = Plan::default();
    for field in PlanField::ALL {
        let value = field.read(plan);
        let non_finite = matches!(value, FieldValue::Amount(v) if !v.is_finite());
        if non_finite || value == field.read(&defaults) {
            store.delete(field.label());
        } else {
            store.set(field.label(), &value.to_string());
        }
    }

    if plan.solve_for == defaults.solve_for {
        store.delete(SOLVE_FOR_PARAM);
    } else {
        store.set(
            SOLVE_FOR_PARAM,
            PlanField::for_solve_target(plan.solve_for).label(),
        );
    }
}

pub fn load_hidden_series(store: &impl ParamStore) -> HiddenSeries {
    store
        .get(HIDDEN_SERIES_PARAM)
        .or_else(|| store.get(LEGACY_HIDDEN_SERIES_PARAM))
        .map(|raw| HiddenSeries::parse(&raw))
        .unwrap_or_default()
}

pub fn store_hidden_series(store: &mut impl ParamStore, hidden: &HiddenSeries) {
    store.set(HIDDEN_SERIES_PARAM, &hidden.encode());
}
