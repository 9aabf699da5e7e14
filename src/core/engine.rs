use super::types::{Assumptions, Projection, YearSnapshot};

pub(crate) const MONTHS_PER_YEAR: usize = 12;

#[derive(Debug)]
struct Ledger {
    age: u32,
    balance: f64,
    monthly_investment: f64,
    principal: f64,
    interest_this_year: f64,
    total_interest: f64,
    spending: f64,
}

impl Ledger {
    fn new(assumptions: &Assumptions) -> Self {
        Self {
            age: assumptions.starting_age,
            balance: assumptions.starting_balance,
            monthly_investment: assumptions.starting_monthly_investment,
            principal: assumptions.starting_balance,
            interest_this_year: 0.0,
            total_interest: 0.0,
            spending: 0.0,
        }
    }

    fn snapshot(&self) -> YearSnapshot {
        YearSnapshot {
            age: self.age,
            balance: self.balance,
            principal: self.principal,
            interest_this_year: self.interest_this_year,
            total_interest: self.total_interest,
            spending: self.spending,
        }
    }
}

/// Simulates monthly compounding from `starting_age` up to `max_age`,
/// recording one snapshot per year of age.
///
/// Each snapshot holds the state at the start of that age, so the final
/// year's activity is visible only in the following snapshot. The
/// simulation stops after recording the first negative balance. A starting
/// age beyond `max_age` yields the starting snapshot alone.
pub fn project(assumptions: &Assumptions) -> Projection {
    let monthly_rate = assumptions.monthly_interest_rate();
    let monthly_spending = assumptions.annual_spending / 12.0;
    let investment_growth = assumptions.investment_growth_factor();

    let span = assumptions.max_age.saturating_sub(assumptions.starting_age) as usize + 1;
    let mut years = Vec::with_capacity(span.min(256));
    let mut ledger = Ledger::new(assumptions);

    loop {
        years.push(ledger.snapshot());
        ledger.interest_this_year = 0.0;

        if ledger.balance < 0.0 || ledger.age >= assumptions.max_age {
            break;
        }

        let accumulating = ledger.age < assumptions.retirement_age;
        for _ in 0..MONTHS_PER_YEAR {
            if accumulating {
                apply_contribution_month(&mut ledger);
            } else {
                apply_withdrawal_month(&mut ledger, monthly_spending);
            }
            let interest = compound_month(&mut ledger.balance, monthly_rate);
            ledger.interest_this_year += interest;
            ledger.total_interest += interest;
        }

        ledger.monthly_investment *= investment_growth;
        ledger.age += 1;
    }

    Projection { years }
}

fn apply_contribution_month(ledger: &mut Ledger) {
    ledger.principal += ledger.monthly_investment;
    ledger.balance += ledger.monthly_investment;
}

fn apply_withdrawal_month(ledger: &mut Ledger, monthly_spending: f64) {
    ledger.spending += monthly_spending;
    ledger.balance -= monthly_spending;
}

/// Credits one month of interest on the post-flow balance and returns it.
pub(crate) fn compound_month(balance: &mut f64, monthly_rate: f64) -> f64 {
    let interest = *balance * monthly_rate;
    *balance *= 1.0 + monthly_rate;
    interest
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_assumptions() -> Assumptions {
        Assumptions::default()
    }

    fn flat_assumptions() -> Assumptions {
        Assumptions {
            starting_age: 30,
            starting_balance: 100_000.0,
            annual_interest_rate_percent: 0.0,
            retirement_age: 30,
            max_age: 90,
            starting_monthly_investment: 0.0,
            annual_investment_increase_rate_percent: 0.0,
            annual_spending: 0.0,
        }
    }

    /// Future value of an annuity due: deposit, then compound, `months` times.
    fn annuity_due_value(deposit: f64, monthly_rate: f64, months: i32) -> f64 {
        deposit * ((1.0 + monthly_rate).powi(months) - 1.0) / monthly_rate * (1.0 + monthly_rate)
    }

    #[test]
    fn default_plan_matches_closed_form_accumulation() {
        let assumptions = sample_assumptions();
        let projection = project(&assumptions);
        let rate = 0.07 / 12.0;

        let at_59 = projection.at_age(59).expect("age 59 present");
        let expected_59 = annuity_due_value(750.0, rate, 39 * 12);
        assert_approx_tol(at_59.balance, expected_59, expected_59 * 1e-9);

        let at_60 = projection.at_age(60).expect("age 60 present");
        let expected_60 = annuity_due_value(750.0, rate, 40 * 12);
        assert_approx_tol(at_60.balance, expected_60, expected_60 * 1e-9);
        assert_approx(at_60.principal, 750.0 * 480.0);
        assert_approx(at_60.spending, 0.0);
        assert_approx_tol(
            at_60.total_interest,
            expected_60 - 750.0 * 480.0,
            expected_60 * 1e-9,
        );
    }

    #[test]
    fn default_plan_runs_to_max_age_without_depleting() {
        let projection = project(&sample_assumptions());
        assert_eq!(projection.len(), 101);
        assert_eq!(projection.first().map(|s| s.age), Some(20));
        assert_eq!(projection.last().map(|s| s.age), Some(120));
        assert_eq!(projection.depleted_at(), None);

        let at_61 = projection.at_age(61).expect("age 61 present");
        assert_approx(at_61.spending, 100_000.0);
        assert_approx(at_61.principal, 750.0 * 480.0);
    }

    #[test]
    fn first_snapshot_reports_starting_state() {
        let mut assumptions = sample_assumptions();
        assumptions.starting_balance = 12_345.0;
        let projection = project(&assumptions);
        let first = projection.first().expect("non-empty");

        assert_eq!(first.age, 20);
        assert_approx(first.balance, 12_345.0);
        assert_approx(first.principal, 12_345.0);
        assert_approx(first.interest_this_year, 0.0);
        assert_approx(first.total_interest, 0.0);
        assert_approx(first.spending, 0.0);
    }

    #[test]
    fn depletion_stops_after_first_negative_balance() {
        let mut assumptions = flat_assumptions();
        assumptions.annual_spending = 30_000.0;

        let projection = project(&assumptions);
        let balances = projection
            .years
            .iter()
            .map(|s| s.balance)
            .collect::<Vec<_>>();

        assert_eq!(balances, vec![100_000.0, 70_000.0, 40_000.0, 10_000.0, -20_000.0]);
        assert_eq!(projection.depleted_at(), Some(34));
        assert_approx(projection.last().expect("non-empty").spending, 120_000.0);
    }

    #[test]
    fn negative_starting_balance_yields_single_snapshot() {
        let mut assumptions = flat_assumptions();
        assumptions.starting_balance = -1.0;
        let projection = project(&assumptions);
        assert_eq!(projection.len(), 1);
        assert_eq!(projection.depleted_at(), Some(30));
    }

    #[test]
    fn starting_age_beyond_max_age_yields_starting_snapshot_only() {
        let mut assumptions = sample_assumptions();
        assumptions.starting_age = 130;
        let projection = project(&assumptions);
        assert_eq!(projection.len(), 1);
        assert_eq!(projection.first().map(|s| s.age), Some(130));
    }

    #[test]
    fn starting_age_equal_to_max_age_yields_single_snapshot() {
        let mut assumptions = sample_assumptions();
        assumptions.starting_age = 120;
        assert_eq!(project(&assumptions).len(), 1);
    }

    #[test]
    fn interest_this_year_resets_each_year() {
        let mut assumptions = flat_assumptions();
        assumptions.annual_interest_rate_percent = 12.0;
        assumptions.retirement_age = 200;
        assumptions.max_age = 32;

        let projection = project(&assumptions);
        assert_eq!(projection.len(), 3);
        let one_year_factor = 1.01f64.powi(12);

        let y1 = &projection.years[1];
        assert_approx(y1.interest_this_year, 100_000.0 * (one_year_factor - 1.0));
        assert_approx(y1.total_interest, y1.interest_this_year);

        let y2 = &projection.years[2];
        assert_approx(
            y2.interest_this_year,
            100_000.0 * one_year_factor * (one_year_factor - 1.0),
        );
        assert_approx(y2.total_interest, y1.interest_this_year + y2.interest_this_year);
        assert_approx(y2.balance, 100_000.0 + y2.total_interest);
    }

    #[test]
    fn investment_increase_steps_once_per_year() {
        let mut assumptions = flat_assumptions();
        assumptions.starting_balance = 0.0;
        assumptions.starting_monthly_investment = 100.0;
        assumptions.annual_investment_increase_rate_percent = 10.0;
        assumptions.retirement_age = 200;
        assumptions.max_age = 33;

        let projection = project(&assumptions);
        assert_approx(projection.years[1].principal, 1_200.0);
        assert_approx(projection.years[2].principal, 1_200.0 + 1_320.0);
        assert_approx(projection.years[3].principal, 1_200.0 + 1_320.0 + 1_452.0);
    }

    #[test]
    fn retirement_age_switches_phase_for_whole_year() {
        let mut assumptions = flat_assumptions();
        assumptions.starting_balance = 0.0;
        assumptions.starting_monthly_investment = 1_000.0;
        assumptions.annual_spending = 6_000.0;
        assumptions.retirement_age = 32;
        assumptions.max_age = 34;

        let projection = project(&assumptions);
        let balances = projection
            .years
            .iter()
            .map(|s| s.balance)
            .collect::<Vec<_>>();
        assert_eq!(balances, vec![0.0, 12_000.0, 24_000.0, 18_000.0, 12_000.0]);
        assert_approx(projection.at_age(32).expect("present").spending, 0.0);
        assert_approx(projection.at_age(33).expect("present").spending, 6_000.0);
        assert_approx(projection.at_age(34).expect("present").principal, 24_000.0);
    }

    #[test]
    fn zero_interest_earns_no_interest() {
        let mut assumptions = flat_assumptions();
        assumptions.starting_monthly_investment = 500.0;
        assumptions.retirement_age = 60;
        assumptions.annual_spending = 10_000.0;
        for snapshot in &project(&assumptions).years {
            assert_approx(snapshot.total_interest, 0.0);
            assert_approx(snapshot.interest_this_year, 0.0);
        }
    }

    #[test]
    fn projection_is_deterministic() {
        let assumptions = sample_assumptions();
        assert_eq!(project(&assumptions), project(&assumptions));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_ages_start_at_starting_age_and_increase_by_one(
            starting_age in 0u32..100,
            span in 0u32..80,
            retirement_offset in 0u32..90,
            balance in -10_000i64..2_000_000,
            rate_bp in -500i32..1500,
            monthly in 0u32..5_000,
            increase_bp in -500i32..1000,
            spending in 0u32..200_000
        ) {
            let assumptions = Assumptions {
                starting_age,
                starting_balance: balance as f64,
                annual_interest_rate_percent: rate_bp as f64 / 100.0,
                retirement_age: starting_age + retirement_offset,
                max_age: starting_age + span,
                starting_monthly_investment: monthly as f64,
                annual_investment_increase_rate_percent: increase_bp as f64 / 100.0,
                annual_spending: spending as f64,
            };
            let projection = project(&assumptions);

            prop_assert!(!projection.is_empty());
            prop_assert_eq!(projection.years[0].age, starting_age);
            prop_assert!(projection.len() as u32 <= span + 1);
            for (idx, snapshot) in projection.years.iter().enumerate() {
                prop_assert_eq!(snapshot.age, starting_age + idx as u32);
            }
            for snapshot in &projection.years[..projection.len() - 1] {
                prop_assert!(snapshot.balance >= 0.0);
            }
            if projection.depleted_at().is_none() {
                prop_assert_eq!(projection.len() as u32, span + 1);
            }
        }

        #[test]
        fn prop_no_flows_and_no_interest_keeps_balance_constant(
            starting_age in 0u32..100,
            span in 0u32..80,
            retirement_offset in 0u32..90,
            balance in 0u32..5_000_000
        ) {
            let assumptions = Assumptions {
                starting_age,
                starting_balance: balance as f64,
                annual_interest_rate_percent: 0.0,
                retirement_age: starting_age + retirement_offset,
                max_age: starting_age + span,
                starting_monthly_investment: 0.0,
                annual_investment_increase_rate_percent: 0.0,
                annual_spending: 0.0,
            };
            let projection = project(&assumptions);
            prop_assert_eq!(projection.len() as u32, span + 1);
            for snapshot in &projection.years {
                prop_assert_eq!(snapshot.balance, balance as f64);
            }
        }

        #[test]
        fn prop_pure_accumulation_never_decreases_balance(
            starting_age in 18u32..70,
            span in 0u32..60,
            balance in 0u32..1_000_000,
            rate_bp in 0i32..1500,
            monthly in 1u32..5_000,
            increase_bp in 0i32..1000,
            spending in 0u32..200_000
        ) {
            let max_age = starting_age + span;
            let assumptions = Assumptions {
                starting_age,
                starting_balance: balance as f64,
                annual_interest_rate_percent: rate_bp as f64 / 100.0,
                retirement_age: max_age + 1,
                max_age,
                starting_monthly_investment: monthly as f64,
                annual_investment_increase_rate_percent: increase_bp as f64 / 100.0,
                annual_spending: spending as f64,
            };
            let projection = project(&assumptions);
            for pair in projection.years.windows(2) {
                prop_assert!(pair[1].balance >= pair[0].balance);
                prop_assert!(pair[1].principal >= pair[0].principal);
                prop_assert_eq!(pair[1].spending, 0.0);
            }
        }
    }
}
