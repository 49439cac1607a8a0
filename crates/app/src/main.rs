//! countcodec: serialize a seeded sample count map with the trie and flat
//! codecs, check both round trips and report the sizes.

mod config;
mod input_gen;
mod metrics;

use config::Config;
use countcodec_core::framing::{self, CodecKind};
use countcodec_core::{CountCodec, CountMap, FlatCountCodec, TrieCountCodec};
use metrics::{CodecRun, Metrics};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    // Override with RUST_LOG, e.g. RUST_LOG=countcodec_core=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,countcodec=info,countcodec_core=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("run with --help for usage");
            return ExitCode::from(2);
        }
    };

    if config.print_config {
        config.print();
    }

    match run(&config) {
        Ok(metrics) => {
            if config.metrics_text {
                print!("{}", metrics.export_text());
            } else if config.print_metrics {
                metrics.print_summary();
            }
            metrics.print_result();
            if metrics.all_verified() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "run failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> countcodec_core::Result<Metrics> {
    let mut metrics = Metrics::new();

    let sample = input_gen::generate_sample_map(config.seed, config.entries, config.depth, config.skew)?;
    metrics.entries = config.entries as u64;
    metrics.distinct_paths = sample.len();
    metrics.total_count = sample.total();
    tracing::info!(
        seed = config.seed,
        paths = sample.len(),
        total = sample.total(),
        depth = config.depth,
        "generated sample"
    );

    metrics.runs.push(measure("trie", &TrieCountCodec::new(config.trie), &sample)?);
    metrics.runs.push(measure("flat", &FlatCountCodec::new(), &sample)?);

    if let Some(path) = &config.output_file {
        metrics.runs.push(write_framed(config, path, &sample)?);
        metrics.output_bytes = metrics.run("framed").map(|r| r.encoded_bytes as u64);
    }

    metrics.complete();
    Ok(metrics)
}

fn measure<C: CountCodec>(name: &str, codec: &C, sample: &CountMap) -> countcodec_core::Result<CodecRun> {
    let start = Instant::now();
    let bytes = codec.to_bytes(sample)?;
    let encode_time = start.elapsed();

    let start = Instant::now();
    let decoded = codec.from_bytes(&bytes, sample.bit_depth());
    let decode_time = start.elapsed();

    tracing::debug!(codec = name, bytes = bytes.len(), "codec measured");
    Ok(CodecRun::checked(name, bytes.len(), encode_time, decode_time, decoded, sample))
}

/// Seal the sample, write it to `path` and read it back from disk.
fn write_framed(config: &Config, path: &Path, sample: &CountMap) -> countcodec_core::Result<CodecRun> {
    let start = Instant::now();
    let frame = framing::seal(CodecKind::Trie(config.trie), sample)?;
    std::fs::write(path, &frame)?;
    let encode_time = start.elapsed();

    let start = Instant::now();
    let decoded = std::fs::read(path)
        .map_err(countcodec_core::Error::from)
        .and_then(|bytes| framing::open(&bytes));
    let decode_time = start.elapsed();

    tracing::info!(path = %path.display(), bytes = frame.len(), "wrote framed trie stream");
    Ok(CodecRun::checked("framed", frame.len(), encode_time, decode_time, decoded, sample))
}
