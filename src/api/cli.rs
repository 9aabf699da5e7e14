use std::fmt::{self, Write as _};
use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use super::chart::HiddenSeries;
use super::params::MAX_ACCEPTED_AGE;
use super::build_report;
use crate::config::{LogFormat, ServerConfig};
use crate::core::{Assumptions, Plan, Projection, SolveFor, SolvedPlan, project, solve_plan};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliSolveFor {
    RetirementAge,
    WithdrawalRate,
    MonthlyInvestment,
}

impl From<CliSolveFor> for SolveFor {
    fn from(value: CliSolveFor) -> Self {
        match value {
            CliSolveFor::RetirementAge => SolveFor::RetirementAge,
            CliSolveFor::WithdrawalRate => SolveFor::WithdrawalRate,
            CliSolveFor::MonthlyInvestment => SolveFor::MonthlyInvestment,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement savings projection calculator (monthly compounding + inverse solvers)"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Log filter, e.g. info or nestegg=debug; overrides NESTEGG_LOG"
    )]
    pub log_level: Option<String>,
    #[arg(long, global = true, value_enum, help = "Log output format")]
    pub log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Command::Serve(args) = &self.command {
            if let Some(bind) = args.bind {
                config.bind_addr = bind;
            }
            if let Some(port) = args.port {
                config.bind_addr.set_port(port);
            }
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Solve the selected field and print the year-by-year projection.
    Project(ProjectArgs),
    /// Serve the JSON API over HTTP.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, help = "Socket address to bind, overrides NESTEGG_BIND_ADDR")]
    pub bind: Option<SocketAddr>,
    #[arg(long, help = "Port to bind, applied after --bind")]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Clone)]
#[command(allow_negative_numbers = true)]
pub struct ProjectArgs {
    #[arg(long, default_value_t = 20)]
    pub starting_age: u32,
    #[arg(long, default_value_t = 0.0)]
    pub starting_balance: f64,
    #[arg(long, default_value_t = 7.0, help = "Annual interest rate in percent")]
    pub interest_rate: f64,
    #[arg(long, default_value_t = 60)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = 120, help = "Age to project through")]
    pub max_age: u32,
    #[arg(long, default_value_t = 750.0)]
    pub monthly_investment: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Yearly increase of the monthly investment in percent"
    )]
    pub investment_increase_rate: f64,
    #[arg(long, default_value_t = 100_000.0)]
    pub annual_spending: f64,
    #[arg(long, default_value_t = 5.05, help = "Withdrawal rate in percent")]
    pub withdrawal_rate: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliSolveFor::WithdrawalRate,
        help = "Field derived by the solver; its input value is ignored"
    )]
    pub solve_for: CliSolveFor,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn build_plan(args: &ProjectArgs) -> Result<Plan, String> {
    for (flag, age) in [
        ("--starting-age", args.starting_age),
        ("--retirement-age", args.retirement_age),
        ("--max-age", args.max_age),
    ] {
        if age > MAX_ACCEPTED_AGE {
            return Err(format!("{flag} must be <= {MAX_ACCEPTED_AGE}"));
        }
    }

    for (flag, value) in [
        ("--starting-balance", args.starting_balance),
        ("--interest-rate", args.interest_rate),
        ("--monthly-investment", args.monthly_investment),
        ("--investment-increase-rate", args.investment_increase_rate),
        ("--annual-spending", args.annual_spending),
        ("--withdrawal-rate", args.withdrawal_rate),
    ] {
        if !value.is_finite() {
            return Err(format!("{flag} must be a finite number"));
        }
    }

    Ok(Plan {
        assumptions: Assumptions {
            starting_age: args.starting_age,
            starting_balance: args.starting_balance,
            annual_interest_rate_percent: args.interest_rate,
            retirement_age: args.retirement_age,
            max_age: args.max_age,
            starting_monthly_investment: args.monthly_investment,
            annual_investment_increase_rate_percent: args.investment_increase_rate,
            annual_spending: args.annual_spending,
        },
        withdrawal_rate_percent: args.withdrawal_rate,
        solve_for: args.solve_for.into(),
    })
}

/// Runs the `project` subcommand and returns what should be printed.
pub fn run_project(args: &ProjectArgs) -> Result<String, String> {
    let plan = build_plan(args)?;
    let solved = solve_plan(&plan);
    let projection = project(&solved.plan.assumptions);

    match args.format {
        OutputFormat::Table => {
            render_table(&solved, &projection).map_err(|e| format!("Failed to render table: {e}"))
        }
        OutputFormat::Json => {
            let report = build_report(solved, projection, HiddenSeries::default());
            serde_json::to_string_pretty(&report).map_err(|e| format!("Failed to encode JSON: {e}"))
        }
    }
}

pub fn render_table(solved: &SolvedPlan, projection: &Projection) -> Result<String, fmt::Error> {
    let plan = &solved.plan;
    let mut out = String::new();

    let solved_label = match plan.solve_for {
        SolveFor::RetirementAge => "Retirement age",
        SolveFor::WithdrawalRate => "Withdrawal rate (%)",
        SolveFor::MonthlyInvestment => "Monthly investment",
    };
    let status = if solved.converged {
        ""
    } else {
        " (search did not converge; fallback value)"
    };
    writeln!(out, "{solved_label}: {}{status}", solved.solved_value)?;
    writeln!(
        out,
        "Nest egg at {:.2}% withdrawal: {:.2}",
        plan.withdrawal_rate_percent,
        plan.assumptions.required_nest_egg(plan.withdrawal_rate_percent)
    )?;
    if let Some(age) = projection.depleted_at() {
        writeln!(out, "Funds depleted at age {age}")?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "{:>5} {:>16} {:>16} {:>14} {:>16} {:>16}",
        "Age", "Balance", "Principal", "Interest/yr", "Total interest", "Spending"
    )?;
    for s in &projection.years {
        writeln!(
            out,
            "{:>5} {:>16.2} {:>16.2} {:>14.2} {:>16.2} {:>16.2}",
            s.age, s.balance, s.principal, s.interest_this_year, s.total_interest, s.spending
        )?;
    }
    Ok(out)
}
