use std::fs;

use sched_dash::cli::{self, Command, FormatArg};
use sched_dash::error::{Error, Result};
use sched_dash::ids::IdGenerator;
use sched_dash::models::Algorithm;
use sched_dash::output::{Formatter, HumanFormatter, JsonFormatter, SummaryFormatter};
use sched_dash::replay;
use sched_dash::session::Session;
use sched_dash::store::{self, ResultStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args()?;

    match args.command {
        Command::ListAlgorithms => {
            for algorithm in Algorithm::ALL {
                println!("{}", algorithm);
            }
        }
        Command::Compare(compare) => {
            let config = cli::build_config(&compare.common)?;
            let mut ids = IdGenerator::new(config.reconciler.id_salt.unwrap_or(0));
            let mut store = ResultStore::new();
            for run in store::load_runs(&compare.runs, &mut ids)? {
                store.add_result(run);
            }

            let analytics = config.analytics.build();
            let runs = store.runs();
            let chart = if compare.chart {
                analytics.chart_rows(&runs)
            } else {
                Vec::new()
            };
            let formatter = formatter_for(&compare.common.format);
            print!("{}", formatter.comparison(&analytics.compare(&runs), &chart));
        }
        Command::Replay(replay_args) => {
            let config = cli::build_replay_config(&replay_args)?;
            let contents = fs::read_to_string(&replay_args.events).map_err(|err| {
                Error::EventsIo(format!(
                    "failed to read events '{}': {}",
                    replay_args.events.display(),
                    err
                ))
            })?;
            let lines = replay::parse_events(&contents)?;

            let mut session = Session::new(config);
            replay::replay(&mut session, lines)?;

            let formatter = formatter_for(&replay_args.common.format);
            print!(
                "{}",
                formatter.replay(
                    &session.snapshot(),
                    session.status_message(),
                    &session.compare()
                )
            );
        }
    }

    Ok(())
}

fn formatter_for(format: &FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
    }
}
