use std::cmp::Ordering;

use tracing::debug;

use super::engine::{MONTHS_PER_YEAR, compound_month};
use super::types::{Assumptions, Plan, SolveFor, Solution, SolvedPlan};

/// Monthly investment reported when the search gives up.
pub const MONTHLY_INVESTMENT_FALLBACK: f64 = 1_000.0;

/// Bounds for the monthly-investment search. Candidates are
/// `step, 2 * step, ...` up to `max_candidates` of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchLimits {
    pub step: f64,
    pub max_candidates: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            step: 50.0,
            max_candidates: 100_000,
        }
    }
}

/// Balance-only accumulation shared by the solvers. Uses the same operation
/// order as the projection engine so results agree bit for bit.
#[derive(Debug)]
struct Accumulator {
    balance: f64,
    monthly_investment: f64,
    monthly_rate: f64,
    investment_growth: f64,
}

impl Accumulator {
    fn new(assumptions: &Assumptions, monthly_investment: f64) -> Self {
        Self {
            balance: assumptions.starting_balance,
            monthly_investment,
            monthly_rate: assumptions.monthly_interest_rate(),
            investment_growth: assumptions.investment_growth_factor(),
        }
    }

    fn contribute_month(&mut self) {
        self.balance += self.monthly_investment;
        compound_month(&mut self.balance, self.monthly_rate);
    }

    fn finish_year(&mut self) {
        self.monthly_investment *= self.investment_growth;
    }

    /// A NaN target counts as reached.
    fn reached(&self, target: f64) -> bool {
        !matches!(self.balance.partial_cmp(&target), Some(Ordering::Less))
    }
}

/// Withdrawal rate, in percent rounded to two decimals, implied by the
/// balance at the start of the retirement year.
///
/// If retirement is never reached the final simulated age is returned as
/// `Exhausted`.
pub fn solve_withdrawal_rate(assumptions: &Assumptions) -> Solution<f64> {
    let mut acc = Accumulator::new(assumptions, assumptions.starting_monthly_investment);
    let mut age = assumptions.starting_age;

    while age <= assumptions.max_age {
        if acc.balance < 0.0 {
            break;
        }
        if age >= assumptions.retirement_age {
            return Solution::Converged(withdrawal_rate_percent(
                assumptions.annual_spending,
                acc.balance,
            ));
        }
        for _ in 0..MONTHS_PER_YEAR {
            acc.contribute_month();
        }
        acc.finish_year();
        match age.checked_add(1) {
            Some(next) => age = next,
            None => break,
        }
    }

    Solution::Exhausted(f64::from(age))
}

fn withdrawal_rate_percent(annual_spending: f64, balance: f64) -> f64 {
    (annual_spending / balance * 10_000.0).round() / 100.0
}

/// Earliest age at which the nest egg for `withdrawal_rate_percent` is
/// reached under uninterrupted contributions. `assumptions.retirement_age`
/// is ignored.
pub fn solve_retirement_age(
    assumptions: &Assumptions,
    withdrawal_rate_percent: f64,
) -> Solution<u32> {
    let required = assumptions.required_nest_egg(withdrawal_rate_percent);
    let mut acc = Accumulator::new(assumptions, assumptions.starting_monthly_investment);

    for age in assumptions.starting_age..=assumptions.max_age {
        if acc.balance < 0.0 {
            break;
        }
        for _ in 0..MONTHS_PER_YEAR {
            if acc.reached(required) {
                return Solution::Converged(age);
            }
            acc.contribute_month();
        }
        acc.finish_year();
    }

    Solution::Exhausted(assumptions.max_age)
}

/// Smallest multiple of 50 per month that reaches the nest egg by
/// retirement. `assumptions.starting_monthly_investment` is ignored.
pub fn solve_monthly_investment(
    assumptions: &Assumptions,
    withdrawal_rate_percent: f64,
) -> Solution<f64> {
    solve_monthly_investment_with_limits(
        assumptions,
        withdrawal_rate_percent,
        SearchLimits::default(),
    )
}

pub fn solve_monthly_investment_with_limits(
    assumptions: &Assumptions,
    withdrawal_rate_percent: f64,
    limits: SearchLimits,
) -> Solution<f64> {
    let required = assumptions.required_nest_egg(withdrawal_rate_percent);
    let last_age = assumptions.max_age.min(assumptions.retirement_age);

    if assumptions.starting_age > last_age || required == f64::INFINITY {
        return Solution::Exhausted(MONTHLY_INVESTMENT_FALLBACK);
    }

    // Non-negative compounding and growth factors keep every balance
    // non-decreasing in the contribution.
    let monotone = assumptions.monthly_interest_rate() >= -1.0
        && assumptions.investment_growth_factor() >= 0.0;
    let found = lowest_reaching_candidate(limits, monotone, |candidate| {
        reaches_nest_egg(assumptions, candidate, required, last_age)
    });

    match found {
        Some(candidate) => Solution::Converged(candidate),
        None => {
            debug!(
                required,
                max_candidates = limits.max_candidates,
                "monthly investment search hit its candidate cap"
            );
            Solution::Exhausted(MONTHLY_INVESTMENT_FALLBACK)
        }
    }
}

/// First candidate `step * n`, `n` in `1..=max_candidates`, accepted by
/// `reaches`. When `monotone` holds every candidate above an accepted one is
/// accepted too, so the range is bisected instead of scanned.
fn lowest_reaching_candidate(
    limits: SearchLimits,
    monotone: bool,
    mut reaches: impl FnMut(f64) -> bool,
) -> Option<f64> {
    let candidate = |n: u32| limits.step * f64::from(n);

    if !monotone {
        return (1..=limits.max_candidates)
            .map(candidate)
            .find(|&c| reaches(c));
    }
    if limits.max_candidates == 0 || !reaches(candidate(limits.max_candidates)) {
        return None;
    }

    // candidate(hi) reaches; nothing below lo does.
    let (mut lo, mut hi) = (1, limits.max_candidates);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if reaches(candidate(mid)) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Some(candidate(hi))
}

/// Contributions continue through `last_age` inclusive.
fn reaches_nest_egg(
    assumptions: &Assumptions,
    monthly_investment: f64,
    required: f64,
    last_age: u32,
) -> bool {
    let mut acc = Accumulator::new(assumptions, monthly_investment);
    for _ in assumptions.starting_age..=last_age {
        if acc.balance < 0.0 {
            return false;
        }
        for _ in 0..MONTHS_PER_YEAR {
            if acc.reached(required) {
                return true;
            }
            acc.contribute_month();
        }
        acc.finish_year();
    }
    false
}

/// Runs the solver selected by `plan.solve_for` and writes its answer, or
/// its fallback, into the matching plan field.
pub fn solve_plan(plan: &Plan) -> SolvedPlan {
    let mut solved = *plan;
    let assumptions = &plan.assumptions;

    let solution = match plan.solve_for {
        SolveFor::RetirementAge => {
            let age = solve_retirement_age(assumptions, plan.withdrawal_rate_percent);
            solved.assumptions.retirement_age = age.value();
            age.map(f64::from)
        }
        SolveFor::WithdrawalRate => {
            let rate = solve_withdrawal_rate(assumptions);
            solved.withdrawal_rate_percent = rate.value();
            rate
        }
        SolveFor::MonthlyInvestment => {
            let amount = solve_monthly_investment(assumptions, plan.withdrawal_rate_percent);
            solved.assumptions.starting_monthly_investment = amount.value();
            amount
        }
    };

    debug!(
        solve_for = ?plan.solve_for,
        value = solution.value(),
        converged = solution.is_converged(),
        "solved plan"
    );

    SolvedPlan {
        plan: solved,
        solved_value: solution.value(),
        converged: solution.is_converged(),
    }
}
