//! Monthly small-cap rotation over a synthetic year of sessions.
//!
//! Run with: cargo run --example monthly_backtest

use anyhow::Context;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rustc_hash::FxHashMap;
use smallcap_rotation::memory::{InMemoryMarket, PaperBroker};
use smallcap_rotation::query::SessionQuery;
use smallcap_rotation::types::{SecurityId, Session};
use smallcap_rotation::{
    Broker, Error, MarketData, SmallCapStrategy, StrategyConfig, StrategyContext,
};

const CONFIG: &str = r#"
[filter]
min_listing_days = 20

[selection]
top_n = 10

[schedule]
monthday = 1
benchmark = "000300.XSHG"
"#;

/// Small deterministic generator so the run is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn trading_days(year: i32) -> Vec<NaiveDate> {
    let mut day = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default();
    let mut out = Vec::new();
    while day.year() == year {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day = day + Days::new(1);
    }
    out
}

fn synthetic_market(calendar: &[NaiveDate]) -> InMemoryMarket {
    let mut rng = Lcg(42);
    let mut builder = InMemoryMarket::builder();
    let first = calendar[0];

    for i in 0..40 {
        let id = if i % 13 == 12 {
            format!("N83{i:04}.BJ")
        } else {
            format!("{:06}.XSHE", 2000 + i)
        };
        let name = if i % 11 == 5 {
            format!("ST Company {i}")
        } else {
            format!("Company {i}")
        };
        // A few listings arrive mid-year.
        let start = if i % 9 == 4 {
            first + Days::new(30 * (i as u64 % 7 + 1))
        } else {
            NaiveDate::from_ymd_opt(2010, 1, 4).unwrap_or(first)
        };
        let cap = 5.0 + 95.0 * rng.next_f64();
        builder = builder
            .with_security(id.as_str(), &name, start)
            .with_valuation(id.as_str(), cap, cap * 1.6);

        let mut close = 5.0 + 20.0 * rng.next_f64();
        for &day in calendar.iter().filter(|&&d| d >= start) {
            let prev = close;
            close *= 1.0 + (rng.next_f64() - 0.5) * 0.06;
            let paused = rng.next_f64() < 0.02;
            builder = builder.with_session(
                id.as_str(),
                Session {
                    date: day,
                    close: (close * 100.0).round() / 100.0,
                    high_limit: (prev * 1.10 * 100.0).round() / 100.0,
                    paused,
                },
            );
        }
    }
    builder.build()
}

fn closes(
    market: &InMemoryMarket,
    ids: Vec<SecurityId>,
    day: NaiveDate,
) -> FxHashMap<SecurityId, f64> {
    let query = SessionQuery {
        ids,
        start: day - Days::new(10),
        end: day,
    };
    market
        .latest_sessions(&query)
        .map(|m| m.into_iter().map(|(id, s)| (id, s.close)).collect())
        .unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = StrategyConfig::from_toml(CONFIG).context("parsing demo config")?;
    let strategy = SmallCapStrategy::new(config)?;
    strategy.initialize();

    let calendar = trading_days(2024);
    let market = synthetic_market(&calendar);
    let mut broker = PaperBroker::builder().with_cash(1_000_000.0).build();

    println!("=== Monthly Small-Cap Rotation ===\n");
    let mut last_closes: FxHashMap<SecurityId, f64> = FxHashMap::default();

    for day in strategy.schedule().due_dates(&calendar) {
        // Mark held positions to the latest close before trading.
        let held: Vec<SecurityId> = broker
            .portfolio()?
            .holdings
            .into_iter()
            .map(|h| h.id)
            .collect();
        let now = closes(&market, held, day);
        broker.mark(|id| match (last_closes.get(id), now.get(id)) {
            (Some(&then), Some(&px)) if then > 0.0 => px / then,
            _ => 1.0,
        });
        broker.clear_instructions();

        let mut ctx = StrategyContext::new(day, &market, &mut broker);
        match strategy.rebalance(&mut ctx) {
            Ok(report) => {
                println!(
                    "  {day}: {:>2} selected of {:>2} eligible, {:>2} orders, value = {:>12.2}",
                    report.selected.len(),
                    report.filter.eligible.len(),
                    report.submitted,
                    report.plan.total_value,
                );
                last_closes = closes(&market, report.selected, day);
            }
            Err(Error::EmptySelection) => println!("  {day}: nothing eligible, skipped"),
            Err(e) => return Err(e).context(format!("rebalance on {day}")),
        }
    }

    let snap = broker.portfolio()?;
    println!(
        "\nFinal value: {:.2} ({} holdings, {:.2} cash)",
        snap.total_value,
        snap.holdings.len(),
        snap.cash
    );
    Ok(())
}
