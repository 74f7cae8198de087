//! SmaLab CLI — backtest, sweep and download commands.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file or command-line flags
//! - `sweep` — run every short/long window pair of a grid on one series
//! - `download` — fetch daily bars from Yahoo Finance and write them as CSV

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use smalab_core::data::{write_series_csv, DataSource, PriceHistoryProvider, YahooProvider};
use smalab_runner::export::export_sweep_csv;
use smalab_runner::runner::{build_provider, load_series};
use smalab_runner::{
    init_logging, run_single_backtest, save_artifacts, BacktestConfig, BacktestResult, LogFormat,
    ParamGrid, ParamSweep, RankBy,
};

#[derive(Parser)]
#[command(
    name = "smalab",
    about = "SmaLab CLI — moving-average crossover backtester"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or flags.
    Run {
        /// Path to a TOML config file. Other data flags are ignored when set.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// Short SMA window.
        #[arg(long, default_value_t = 20)]
        short: usize,

        /// Long SMA window.
        #[arg(long, default_value_t = 50)]
        long: usize,

        /// Output directory for artifacts. Overrides the config's [output].
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a grid of window pairs on one series.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Short windows, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [5, 10, 15, 20, 25, 30])]
        short: Vec<usize>,

        /// Long windows, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [40, 60, 80, 100, 150, 200])]
        long: Vec<usize>,

        /// Ranking metric: total_return, sharpe, max_drawdown, win_rate.
        #[arg(long, default_value = "total_return")]
        rank_by: RankBy,

        /// Number of ranked rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Run sequentially instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write the full sweep table to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download daily bars from Yahoo Finance into CSV files.
    Download {
        /// Symbols to download (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 10 years ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// HTTP(S) proxy for the requests.
        #[arg(long)]
        proxy: Option<String>,

        /// Directory for `<SYMBOL>.csv` files.
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },
}

/// Where prices come from when no config file is given.
#[derive(Args)]
struct DataArgs {
    /// Symbol to backtest.
    #[arg(long, default_value = "SPY")]
    symbol: String,

    /// Start date (YYYY-MM-DD). Defaults to 5 years ago.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Initial capital.
    #[arg(long, default_value_t = 10_000.0)]
    capital: f64,

    /// CSV file or directory of `<SYMBOL>.csv` files.
    #[arg(long, conflicts_with_all = ["yahoo", "synthetic"])]
    csv: Option<PathBuf>,

    /// Fetch from Yahoo Finance.
    #[arg(long, default_value_t = false, conflicts_with = "synthetic")]
    yahoo: bool,

    /// HTTP(S) proxy for Yahoo Finance.
    #[arg(long, requires = "yahoo")]
    proxy: Option<String>,

    /// Use a seeded synthetic random walk (the default when no source is given).
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Synthetic seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Synthetic bar count; ignores --end when set.
    #[arg(long)]
    bars: Option<usize>,
}

impl DataArgs {
    fn to_config(&self, short: usize, long: usize) -> Result<BacktestConfig> {
        let today = chrono::Local::now().date_naive();
        let start = parse_date_or(self.start.as_deref(), today - chrono::Duration::days(365 * 5))?;
        let end = parse_date_or(self.end.as_deref(), today)?;

        let mut config = BacktestConfig::new(&self.symbol, start, end);
        config.backtest.initial_capital = self.capital;
        config.strategy.short_window = short;
        config.strategy.long_window = long;
        config.data.seed = self.seed;
        config.data.bars = self.bars;
        config.data.proxy = self.proxy.clone();
        config.data.source = if let Some(path) = &self.csv {
            config.data.path = Some(path.clone());
            DataSource::Csv
        } else if self.yahoo {
            DataSource::YahooFinance
        } else {
            DataSource::Synthetic
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Run {
            config,
            data,
            short,
            long,
            output_dir,
        } => run_backtest_cmd(config, &data, short, long, output_dir),
        Commands::Sweep {
            data,
            short,
            long,
            rank_by,
            top,
            sequential,
            output,
        } => run_sweep_cmd(&data, short, long, rank_by, top, sequential, output),
        Commands::Download {
            symbols,
            start,
            end,
            proxy,
            out_dir,
        } => run_download(&symbols, start.as_deref(), end.as_deref(), proxy, out_dir),
    }
}

fn parse_date_or(raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)")),
        None => Ok(default),
    }
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    data: &DataArgs,
    short: usize,
    long: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => BacktestConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => data.to_config(short, long)?,
    };
    if output_dir.is_some() {
        config.output.dir = output_dir;
    }

    let result = run_single_backtest(&config)?;
    print_summary(&result);

    if let Some(dir) = &config.output.dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Summary ===");
    println!("Symbol:           {}", result.symbol);
    if let (Some(start), Some(end)) = (result.start_date, result.end_date) {
        println!("Period:           {start} to {end}");
    }
    println!(
        "Windows:          SMA {} / SMA {}",
        result.params.short_window, result.params.long_window
    );
    println!("Bars:             {}", result.bar_count);
    println!("Data:             {}", result.data_source);
    println!("Initial capital:  {:.2}", result.params.initial_capital);
    println!("Final capital:    {:.2}", m.final_capital);
    println!("Market value:     {:.2}", m.final_market_value);
    println!("Total return:     {:.2}%", m.total_return * 100.0);
    println!("Sharpe:           {:.3}", m.sharpe);
    println!("Max drawdown:     {:.2}%", m.max_drawdown * 100.0);
    println!(
        "Trades:           {} ({} round trips, win rate {:.1}%)",
        m.trade_count,
        m.round_trips,
        m.win_rate * 100.0
    );
    if m.open_at_end {
        println!("Position still open at the last bar.");
    }
    println!();

    for t in &result.output.trades {
        println!(
            "{}  {:<4}  price {:>10.2}  shares {:>12.4}",
            t.date, t.side, t.price, t.shares
        );
    }
    if result.output.trades.is_empty() {
        println!("No trades.");
    }

    info!(run_id = %result.run_id, "run finished");
}

fn run_sweep_cmd(
    data: &DataArgs,
    shorts: Vec<usize>,
    longs: Vec<usize>,
    rank_by: RankBy,
    top: usize,
    sequential: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = data.to_config(
        shorts.iter().copied().min().unwrap_or(1),
        longs.iter().copied().max().unwrap_or(2),
    )?;
    let provider = build_provider(&config)?;
    let series = load_series(&config, provider.as_ref())?;

    let grid = ParamGrid {
        short_windows: shorts,
        long_windows: longs,
        initial_capital: config.backtest.initial_capital,
    };
    if grid.size() == 0 {
        bail!("grid has no pairs with short < long");
    }

    let results = ParamSweep::new(&series)
        .with_parallelism(!sequential)
        .sweep(&grid)?;

    println!();
    println!(
        "=== Sweep: {} ({} bars, {} pairs, ranked by {:?}) ===",
        series.symbol(),
        series.len(),
        results.len(),
        rank_by
    );
    println!(
        "{:>6} {:>6} {:>10} {:>8} {:>10} {:>7} {:>8}",
        "short", "long", "return", "sharpe", "max_dd", "trades", "win"
    );
    println!("{}", "-".repeat(61));
    for e in results.top_n(rank_by, top) {
        let m = &e.metrics;
        println!(
            "{:>6} {:>6} {:>9.2}% {:>8.3} {:>9.2}% {:>7} {:>7.1}%",
            e.params.short_window,
            e.params.long_window,
            m.total_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.trade_count,
            m.win_rate * 100.0
        );
    }

    if let Some(path) = output {
        std::fs::write(&path, export_sweep_csv(&results)?)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Sweep table saved to: {}", path.display());
    }
    Ok(())
}

fn run_download(
    symbols: &[String],
    start: Option<&str>,
    end: Option<&str>,
    proxy: Option<String>,
    out_dir: PathBuf,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let start_date = parse_date_or(start, today - chrono::Duration::days(365 * 10))?;
    let end_date = parse_date_or(end, today)?;
    if start_date > end_date {
        bail!("start date {start_date} is after end date {end_date}");
    }

    let provider = match proxy.as_deref() {
        Some(p) => YahooProvider::with_proxy(p)?,
        None => YahooProvider::new()?,
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut failures = Vec::new();
    for symbol in symbols {
        match provider.fetch(symbol, start_date, end_date) {
            Ok(series) => {
                let path = out_dir.join(format!("{symbol}.csv"));
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                write_series_csv(&series, file)?;
                println!("{symbol}: {} bars -> {}", series.len(), path.display());
            }
            Err(e) => {
                eprintln!("Error for {symbol}: {e}");
                failures.push(symbol.clone());
            }
        }
    }

    if !failures.is_empty() {
        bail!(
            "{} of {} downloads failed: {}",
            failures.len(),
            symbols.len(),
            failures.join(", ")
        );
    }
    Ok(())
}
