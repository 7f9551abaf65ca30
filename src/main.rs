//! swtrigger - Main Entry Point
//!
//! Runs a record file through the fan-out / fan-in trigger farm and writes
//! every record the workers emit to an output file.
//!
//! ```text
//! swtrigger [--config <file.toml>] <input> <output>
//! ```

use anyhow::{bail, Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use swtrigger::{
    config::{ReadMode, TriggerConfig},
    pipeline::{
        BlockConverter, ConvertingSource, MessageSource, PassThrough, RecordConverter,
        RecordFileSource, RecordWriterSink, TopologyBuilder,
    },
    transport::Context,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "usage: swtrigger [--config <file.toml>] <input> <output>";

struct Args {
    config: Option<PathBuf>,
    input: PathBuf,
    output: PathBuf,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut config = None;
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            _ if arg.starts_with('-') => bail!("unknown option '{}'\n{}", arg, USAGE),
            _ => positional.push(PathBuf::from(arg)),
        }
    }
    let [input, output] = <[PathBuf; 2]>::try_from(positional)
        .map_err(|_| anyhow::anyhow!("expected an input and an output file\n{}", USAGE))?;
    Ok(Args {
        config,
        input,
        output,
    })
}

fn main() -> Result<()> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,swtrigger=debug")),
        )
        .with(fmt::layer().with_writer(writer))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => TriggerConfig::load(path)
            .with_context(|| format!("loading configuration {:?}", path))?,
        None => TriggerConfig::default(),
    };

    tracing::info!(
        "Starting swtrigger: {:?} -> {:?} with {} workers",
        args.input,
        args.output,
        config.fanout.workers
    );

    let ctx = Arc::new(Context::new(config.transport.clone()));
    let reader = RecordFileSource::open(&args.input, &config.source)
        .with_context(|| format!("opening input {:?}", args.input))?;
    let source: Box<dyn MessageSource> = match config.source.mode {
        ReadMode::Single => Box::new(ConvertingSource::new(reader, RecordConverter)),
        ReadMode::Block => Box::new(ConvertingSource::new(reader, BlockConverter)),
    };
    let sink = RecordWriterSink::create(&args.output)
        .with_context(|| format!("creating output {:?}", args.output))?;

    let started = Instant::now();
    let topology = TopologyBuilder::new(ctx, config.fanout.clone())
        .spawn(source, |_| PassThrough, sink)
        .context("starting topology")?;
    let stats = topology.join().context("running topology")?;

    let elapsed = started.elapsed();
    for (index, worker) in stats.workers.iter().enumerate() {
        tracing::debug!("worker-{} handled {} items", index, worker.process_items);
    }
    tracing::info!(
        "Done in {:.3}s: {} items read, {} worker items, {} records collected",
        elapsed.as_secs_f64(),
        stats.distributor.process_items,
        stats.worker_items(),
        stats.collector.process_items
    );
    Ok(())
}
