//! Metrics collection and reporting for a comparison run.
//!
//! Tracks the sample's shape plus, for every codec exercised, the encoded
//! size, encode/decode time and whether the decoded map matched.
//!
//! The `Metrics` struct is NOT thread-safe; the run is single-threaded.

use countcodec_core::CountMap;
use std::time::{Duration, Instant};

/// Outcome of serializing the sample with one codec.
#[derive(Debug, Clone)]
pub struct CodecRun {
    /// Display name of the codec
    pub name: String,

    /// Encoded stream size in bytes
    pub encoded_bytes: usize,

    /// Time spent writing the stream
    pub encode_time: Duration,

    /// Time spent reading it back
    pub decode_time: Duration,

    /// Whether the decoded map equals the sample
    pub verified: bool,
}

impl CodecRun {
    /// Record a run, comparing what was decoded against the sample.
    ///
    /// A decode error counts as a failed round trip.
    pub fn checked(
        name: &str,
        encoded_bytes: usize,
        encode_time: Duration,
        decode_time: Duration,
        decoded: countcodec_core::Result<CountMap>,
        sample: &CountMap,
    ) -> Self {
        let verified = match decoded {
            Ok(map) if map == *sample => true,
            Ok(_) => {
                tracing::warn!(codec = name, "decoded map does not match the sample");
                false
            }
            Err(e) => {
                tracing::warn!(codec = name, error = %e, "decode failed");
                false
            }
        };
        Self {
            name: name.to_string(),
            encoded_bytes,
            encode_time,
            decode_time,
            verified,
        }
    }

    /// Bits spent per distinct path (0.0 for an empty sample).
    pub fn bits_per_path(&self, distinct_paths: usize) -> f64 {
        if distinct_paths == 0 {
            0.0
        } else {
            (self.encoded_bytes * 8) as f64 / distinct_paths as f64
        }
    }
}

/// Metrics for one run of the tool.
#[derive(Debug, Clone)]
pub struct Metrics {
    // === Timing ===
    /// When the run started
    pub start_time: Instant,

    /// When the run ended (set on completion)
    pub end_time: Option<Instant>,

    // === Sample ===
    /// Observations drawn
    pub entries: u64,

    /// Distinct paths in the map
    pub distinct_paths: usize,

    /// Sum of all counts
    pub total_count: u64,

    // === Codecs ===
    /// One entry per codec, in the order they ran
    pub runs: Vec<CodecRun>,

    // === Output ===
    /// Bytes written to the output file, if any
    pub output_bytes: Option<u64>,
}

impl Metrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            entries: 0,
            distinct_paths: 0,
            total_count: 0,
            runs: Vec::new(),
            output_bytes: None,
        }
    }

    /// Mark the run as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Look up a codec run by name.
    pub fn run(&self, name: &str) -> Option<&CodecRun> {
        self.runs.iter().find(|r| r.name == name)
    }

    /// Size of `name`'s stream relative to `baseline`'s.
    ///
    /// Returns 0.0 if either is missing or the baseline is empty.
    pub fn size_ratio(&self, name: &str, baseline: &str) -> f64 {
        match (self.run(name), self.run(baseline)) {
            (Some(run), Some(base)) if base.encoded_bytes > 0 => {
                run.encoded_bytes as f64 / base.encoded_bytes as f64
            }
            _ => 0.0,
        }
    }

    /// True when every codec decoded its own stream back to the sample.
    pub fn all_verified(&self) -> bool {
        self.runs.iter().all(|r| r.verified)
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Run Summary ===");
        println!("Duration: {} ms", self.duration().as_millis());
        println!();

        println!("=== Sample ===");
        println!("Entries: {}", self.entries);
        println!("Distinct paths: {}", self.distinct_paths);
        println!("Total count: {}", self.total_count);
        println!();

        println!("=== Codecs ===");
        for run in &self.runs {
            println!(
                "{:<8} {:>10} bytes  {:>7.2} bits/path  encode {:>6} us  decode {:>6} us  {}",
                run.name,
                run.encoded_bytes,
                run.bits_per_path(self.distinct_paths),
                run.encode_time.as_micros(),
                run.decode_time.as_micros(),
                if run.verified { "PASSED ✓" } else { "FAILED ✗" },
            );
        }
        println!();

        if let Some(bytes) = self.output_bytes {
            println!("=== Output ===");
            println!("Framed bytes written: {}", bytes);
            println!();
        }
    }

    /// Print just the final result (pass/fail).
    pub fn print_result(&self) {
        if self.all_verified() {
            println!("✓ All codecs round-tripped");
            if self.run("trie").is_some() && self.run("flat").is_some() {
                println!("  trie/flat size: {:.1}%", self.size_ratio("trie", "flat") * 100.0);
            }
        } else {
            for run in self.runs.iter().filter(|r| !r.verified) {
                println!("✗ {} codec failed to round-trip", run.name);
            }
        }
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        let mut text = format!(
            "duration_ms={}\nentries={}\ndistinct_paths={}\ntotal_count={}\n",
            self.duration().as_millis(),
            self.entries,
            self.distinct_paths,
            self.total_count,
        );
        for run in &self.runs {
            text.push_str(&format!(
                "{name}_bytes={}\n{name}_verified={}\n",
                run.encoded_bytes,
                run.verified,
                name = run.name,
            ));
        }
        text
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
