mod engine;
mod solver;
mod types;

pub use engine::project;
pub use solver::{
    MONTHLY_INVESTMENT_FALLBACK, SearchLimits, solve_monthly_investment,
    solve_monthly_investment_with_limits, solve_plan, solve_retirement_age, solve_withdrawal_rate,
};
pub use types::{Assumptions, Plan, Projection, SolveFor, Solution, SolvedPlan, YearSnapshot};
