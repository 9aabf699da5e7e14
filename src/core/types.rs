use serde::{Deserialize, Serialize};

/// Scalar inputs to a projection. Rates are percentages, so `7.0` means 7%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub starting_age: u32,
    pub starting_balance: f64,
    pub annual_interest_rate_percent: f64,
    pub retirement_age: u32,
    pub max_age: u32,
    pub starting_monthly_investment: f64,
    pub annual_investment_increase_rate_percent: f64,
    pub annual_spending: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            starting_age: 20,
            starting_balance: 0.0,
            annual_interest_rate_percent: 7.0,
            retirement_age: 60,
            max_age: 120,
            starting_monthly_investment: 750.0,
            annual_investment_increase_rate_percent: 0.0,
            annual_spending: 100_000.0,
        }
    }
}

impl Assumptions {
    pub(crate) fn monthly_interest_rate(&self) -> f64 {
        self.annual_interest_rate_percent / 100.0 / 12.0
    }

    pub(crate) fn investment_growth_factor(&self) -> f64 {
        1.0 + self.annual_investment_increase_rate_percent / 100.0
    }

    /// Balance needed to sustain `annual_spending` at the given withdrawal rate.
    pub fn required_nest_egg(&self, withdrawal_rate_percent: f64) -> f64 {
        self.annual_spending / withdrawal_rate_percent * 100.0
    }
}

/// Which plan field is derived by a solver instead of entered.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveFor {
    RetirementAge,
    #[default]
    WithdrawalRate,
    MonthlyInvestment,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub assumptions: Assumptions,
    pub withdrawal_rate_percent: f64,
    pub solve_for: SolveFor,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            assumptions: Assumptions::default(),
            withdrawal_rate_percent: 5.05,
            solve_for: SolveFor::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedPlan {
    pub plan: Plan,
    pub solved_value: f64,
    pub converged: bool,
}

/// Outcome of an inverse solve. `Exhausted` carries the boundary value the
/// calculator has always reported when the search gives up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Solution<T> {
    Converged(T),
    Exhausted(T),
}

impl<T: Copy> Solution<T> {
    pub fn value(self) -> T {
        match self {
            Solution::Converged(v) | Solution::Exhausted(v) => v,
        }
    }

    pub fn converged(self) -> Option<T> {
        match self {
            Solution::Converged(v) => Some(v),
            Solution::Exhausted(_) => None,
        }
    }

    pub fn is_converged(self) -> bool {
        matches!(self, Solution::Converged(_))
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> Solution<U> {
        match self {
            Solution::Converged(v) => Solution::Converged(f(v)),
            Solution::Exhausted(v) => Solution::Exhausted(f(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub age: u32,
    pub balance: f64,
    pub principal: f64,
    /// Interest earned over the year that ended at `age`.
    pub interest_this_year: f64,
    pub total_interest: f64,
    pub spending: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub years: Vec<YearSnapshot>,
}

impl Projection {
    pub fn first(&self) -> Option<&YearSnapshot> {
        self.years.first()
    }

    pub fn last(&self) -> Option<&YearSnapshot> {
        self.years.last()
    }

    pub fn at_age(&self, age: u32) -> Option<&YearSnapshot> {
        let start = self.first()?.age;
        let idx = age.checked_sub(start)? as usize;
        self.years.get(idx)
    }

    /// Age of the snapshot where the balance first went negative, if any.
    pub fn depleted_at(&self) -> Option<u32> {
        self.last().filter(|s| s.balance < 0.0).map(|s| s.age)
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
