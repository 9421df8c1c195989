//! Writes `sample_signals.parquet`, a synthetic trade log for trying the dashboard.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[derive(Parser, Debug)]
#[command(about = "Generate a synthetic trading-signal table")]
struct Args {
    /// Output file.
    #[arg(default_value = "sample_signals.parquet")]
    output: String,

    /// Number of trades.
    #[arg(long, default_value_t = 1500)]
    trades: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct Symbol {
    name: &'static str,
    /// Probability that a trade reaches its target.
    hit_rate: f64,
    target_r: f64,
}

const SYMBOLS: [Symbol; 4] = [
    Symbol { name: "ES", hit_rate: 0.45, target_r: 2.0 },
    Symbol { name: "NQ", hit_rate: 0.40, target_r: 2.5 },
    Symbol { name: "CL", hit_rate: 0.35, target_r: 3.0 },
    Symbol { name: "GC", hit_rate: 0.50, target_r: 1.5 },
];

const SESSIONS: [&str; 3] = ["Asia", "London", "New York"];

/// Risk per trade as a percentage of equity, for the "Return %" column.
const RISK_PCT: f64 = 0.5;

#[derive(Default)]
struct Columns {
    date: Vec<i32>,
    symbol: Vec<&'static str>,
    side: Vec<&'static str>,
    session: Vec<&'static str>,
    sc_in: Vec<bool>,
    r: Vec<f64>,
    mfe: Vec<f64>,
    bars: Vec<i64>,
    return_pct: Vec<f64>,
}

fn generate(trades: usize, seed: u64) -> Result<Columns> {
    let mut rng = StdRng::seed_from_u64(seed);
    let slippage = Normal::new(0.0, 0.08).context("building slippage distribution")?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("epoch date")?;
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).context("start date")?;

    let mut cols = Columns::default();
    let mut day = start;
    for _ in 0..trades {
        // A few signals per weekday.
        if rng.gen_bool(0.35) {
            day += Duration::days(1);
            while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                day += Duration::days(1);
            }
        }

        let sym = SYMBOLS.choose(&mut rng).context("no symbols")?;
        let sc_in = rng.gen_bool(0.4);
        // Scaled-in entries hit slightly more often.
        let hit_rate = if sc_in { sym.hit_rate + 0.08 } else { sym.hit_rate };
        let winner = rng.gen_bool(hit_rate);

        let r = if winner {
            sym.target_r + slippage.sample(&mut rng)
        } else if rng.gen_bool(0.2) {
            // Scratched at breakeven.
            slippage.sample(&mut rng) * 0.5
        } else {
            -1.0 + slippage.sample(&mut rng)
        };
        let mfe = if winner {
            r + rng.gen_range(0.0..1.0)
        } else {
            rng.gen_range(0.0..sym.target_r)
        };

        cols.date.push((day - epoch).num_days() as i32);
        cols.symbol.push(sym.name);
        cols.side.push(if rng.gen_bool(0.5) { "Long" } else { "Short" });
        cols.session.push(SESSIONS.choose(&mut rng).copied().context("no sessions")?);
        cols.sc_in.push(sc_in);
        cols.r.push((r * 100.0).round() / 100.0);
        cols.mfe.push((mfe.max(0.0) * 100.0).round() / 100.0);
        cols.bars.push(rng.gen_range(1..=60));
        cols.return_pct.push((r * RISK_PCT * 100.0).round() / 100.0);
    }
    Ok(cols)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cols = generate(args.trades, args.seed)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("Date", DataType::Date32, false),
        Field::new("Symbol", DataType::Utf8, false),
        Field::new("Side", DataType::Utf8, false),
        Field::new("Session", DataType::Utf8, false),
        Field::new("SC-In", DataType::Boolean, false),
        Field::new("R", DataType::Float64, false),
        Field::new("MFE", DataType::Float64, false),
        Field::new("Bars", DataType::Int64, false),
        Field::new("Return %", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Date32Array::from(cols.date)),
            Arc::new(StringArray::from(cols.symbol)),
            Arc::new(StringArray::from(cols.side)),
            Arc::new(StringArray::from(cols.session)),
            Arc::new(BooleanArray::from(cols.sc_in)),
            Arc::new(Float64Array::from(cols.r)),
            Arc::new(Float64Array::from(cols.mfe)),
            Arc::new(Int64Array::from(cols.bars)),
            Arc::new(Float64Array::from(cols.return_pct)),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;

    println!("Wrote {} trades to {}", args.trades, args.output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_seeded_and_skips_weekends() {
        let a = generate(200, 7).unwrap();
        let b = generate(200, 7).unwrap();
        assert_eq!(a.r, b.r);
        assert_eq!(a.date.len(), 200);

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        for d in &a.date {
            let day = epoch + Duration::days(*d as i64);
            assert!(!matches!(day.weekday(), Weekday::Sat | Weekday::Sun), "{day} is a weekend");
        }
        assert!(a.date.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn losses_are_capped_near_one_r() {
        let cols = generate(500, 1).unwrap();
        assert!(cols.r.iter().all(|r| *r > -2.0));
        assert!(cols.r.iter().any(|r| *r > 1.0));
        assert!(cols.r.iter().any(|r| *r < -0.5));
    }
}
