use std::time::Duration;

use clap::{Parser, Subcommand};
use tv_streamer::{
  discover_tv_cookies, get_historic_candles, StreamerBuilder, StreamingEngine, Subscription,
};

#[derive(Parser)]
#[command(name = "tv-streamer", about = "Stream or fetch TradingView bars")]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// Raise the log filter level (-v, -vv).
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,
}

#[derive(Subcommand)]
enum Command {
  /// Stream real-time ticks and bar updates to stdout (JSON lines).
  Stream {
    #[arg(short, long = "symbol", required = true)]
    symbols: Vec<String>,
    #[arg(short, long, default_value = "1")]
    interval: String,
    #[arg(short = 'n', long = "init-bars", default_value_t = 0)]
    init_bars: u32,
  },
  /// Candle-focused subcommands.
  Candles {
    #[command(subcommand)]
    action: CandlesAction,
  },
}

#[derive(Subcommand)]
enum CandlesAction {
  /// Pretty-print live candles for one symbol/interval.
  Live {
    #[arg(long)]
    symbol: String,
    #[arg(long, default_value = "1")]
    interval: String,
  },
  /// Print the last N closed candles as a table.
  Hist {
    #[arg(long)]
    symbol: String,
    #[arg(long, default_value = "1")]
    interval: String,
    #[arg(long, default_value_t = 300)]
    limit: u32,
  },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
  let cli = Cli::parse();

  let level = match cli.verbose {
    0 => log::LevelFilter::Info,
    1 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };
  env_logger::Builder::new().filter_level(level).init();

  match run(cli.command).await {
    Ok(()) => std::process::ExitCode::from(0),
    Err(e) => {
      eprintln!("error: {e}");
      std::process::ExitCode::from(1)
    }
  }
}

async fn run(command: Command) -> tv_streamer::TvResult<()> {
  match command {
    Command::Stream {
      symbols,
      interval,
      init_bars,
    } => stream(symbols, interval, init_bars).await,
    Command::Candles {
      action: CandlesAction::Live { symbol, interval },
    } => stream(vec![symbol], interval, 0).await,
    Command::Candles {
      action:
        CandlesAction::Hist {
          symbol,
          interval,
          limit,
        },
    } => hist(symbol, interval, limit).await,
  }
}

fn options_with_auth() -> tv_streamer::StreamerOptions {
  let cookies = discover_tv_cookies();
  let mut builder = StreamerBuilder::new();
  if let Some(token) = cookies.auth_token {
    builder = builder.token(token);
  }
  if let Some(session_id) = cookies.session_id {
    builder = builder.session_cookie(session_id);
  }
  builder.build()
}

async fn stream(symbols: Vec<String>, interval: String, init_bars: u32) -> tv_streamer::TvResult<()> {
  let subs: Vec<Subscription> = symbols
    .into_iter()
    .map(|s| Subscription::new(s, interval.clone()))
    .collect();

  let mut options = options_with_auth();
  if init_bars > 0 {
    options.initial_bars = init_bars;
  }

  let engine = StreamingEngine::new(subs, options);
  let mut events = engine.subscribe().await;

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        log::info!("shutting down on ctrl-c");
        engine.close().await;
        break;
      }
      event = events.recv() => {
        match event {
          Some(event) => {
            if let Ok(line) = serde_json::to_string(&event) {
              println!("{line}");
            }
          }
          None => break,
        }
      }
    }
  }

  Ok(())
}

async fn hist(symbol: String, interval: String, limit: u32) -> tv_streamer::TvResult<()> {
  let options = options_with_auth();
  let candles =
    get_historic_candles(&symbol, &interval, limit, Duration::from_secs(10), &options).await?;

  println!("{:<12} {:<20} {:>10} {:>10} {:>10} {:>10} {:>12}", "SYMBOL", "OPEN TIME", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME");
  for candle in candles {
    println!(
      "{:<12} {:<20} {:>10} {:>10} {:>10} {:>10} {:>12}",
      candle.symbol,
      candle.ts_open.to_rfc3339(),
      candle.open,
      candle.high,
      candle.low,
      candle.close,
      candle.volume.map(|v| v.to_string()).unwrap_or_default(),
    );
  }
  Ok(())
}
