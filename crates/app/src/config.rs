//! Configuration for the countcodec application.
//!
//! Handles parsing command-line arguments and generating sensible defaults
//! (including randomized defaults that are reproducible with a seed).
//!
//! The tool works with zero arguments. Every default is printed with
//! `--print-config` so runs can be repeated exactly.

use countcodec_core::TrieCodecConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

/// Complete configuration for a comparison run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seed for sample generation and randomized defaults
    pub seed: u64,

    // === Sample ===
    /// Number of observations drawn into the sample map
    pub entries: usize,

    /// Bit depth of every sampled path
    pub depth: usize,

    /// Probability that a sampled path bit is 0 (0.5 = uniform)
    pub skew: f64,

    // === Codec ===
    /// Trie codec options
    pub trie: TrieCodecConfig,

    // === Output ===
    /// Where to write the framed trie stream (None = don't write)
    pub output_file: Option<PathBuf>,

    /// Whether to print detailed config
    pub print_config: bool,

    /// Whether to print detailed metrics summary
    pub print_metrics: bool,

    /// Whether to print metrics as `key=value` lines instead
    pub metrics_text: bool,
}

impl Config {
    /// Parse configuration from command-line arguments.
    ///
    /// Without `--seed` the seed is time-based; with it the whole run is
    /// deterministic.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut seed: Option<u64> = None;
        let mut entries: Option<usize> = None;
        let mut depth: Option<usize> = None;
        let mut skew: Option<f64> = None;
        let mut trie = TrieCodecConfig::default();
        let mut output_file: Option<PathBuf> = None;
        let mut print_config = false;
        let mut print_metrics = true;
        let mut metrics_text = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--seed" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--seed requires a number".to_string());
                    }
                    seed = Some(args[i].parse().map_err(|_| "invalid seed")?);
                }
                "--entries" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--entries requires a number".to_string());
                    }
                    entries = Some(args[i].parse().map_err(|_| "invalid entries")?);
                }
                "--depth" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--depth requires a number".to_string());
                    }
                    let value: usize = args[i].parse().map_err(|_| "invalid depth")?;
                    if !(1..=64).contains(&value) {
                        return Err("--depth must be between 1 and 64".to_string());
                    }
                    depth = Some(value);
                }
                "--skew" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--skew requires a number".to_string());
                    }
                    let value: f64 = args[i].parse().map_err(|_| "invalid skew")?;
                    if !(0.0..=1.0).contains(&value) {
                        return Err("--skew must be between 0.0 and 1.0".to_string());
                    }
                    skew = Some(value);
                }
                "--no-binomial" => {
                    trie.binomial = false;
                }
                "--verify" => {
                    trie.verify = true;
                }
                "--out" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--out requires a path".to_string());
                    }
                    output_file = Some(PathBuf::from(&args[i]));
                }
                "--print-config" => {
                    print_config = true;
                }
                "--no-metrics" => {
                    print_metrics = false;
                }
                "--metrics-text" => {
                    metrics_text = true;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    return Err(format!("unknown argument: {}", args[i]));
                }
            }
            i += 1;
        }

        let seed = seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|t| t.as_millis() as u64)
                .unwrap_or_default()
        });

        // Generate defaults using seed
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        Ok(Config {
            seed,
            entries: entries.unwrap_or_else(|| rng.gen_range(500..=5000)),
            depth: depth.unwrap_or_else(|| rng.gen_range(8..=24)),
            skew: skew.unwrap_or_else(|| rng.gen_range(0.5..0.95)),
            trie,
            output_file,
            print_config,
            print_metrics,
            metrics_text,
        })
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        println!("Seed: {}", self.seed);
        println!(
            "Output file: {}",
            self.output_file
                .as_ref()
                .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
        );
        println!();
        println!("=== Sample ===");
        println!("Entries: {}", self.entries);
        println!("Depth: {} bits", self.depth);
        println!("Skew: {:.3}", self.skew);
        println!();
        println!("=== Trie Codec ===");
        println!("Binomial split coding: {}", self.trie.binomial);
        println!("Verify mode: {}", self.trie.verify);
        println!();
    }
}

fn print_help() {
    println!("countcodec: Compare trie and flat serialization of sparse count maps");
    println!();
    println!("USAGE:");
    println!("    countcodec [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --seed <N>              Random seed for determinism");
    println!();
    println!("    --entries <N>           Observations in the sample (default: random 500-5000)");
    println!("    --depth <BITS>          Path depth 1-64 (default: random 8-24)");
    println!("    --skew <P>              Probability of a 0 bit (default: random 0.5-0.95)");
    println!();
    println!("    --no-binomial           Code trie splits with flat bounded fields");
    println!("    --verify                Write and check trie sentinels");
    println!("    --out <PATH>            Write the framed trie stream to a file");
    println!();
    println!("    --print-config          Print resolved configuration");
    println!("    --no-metrics            Don't print metrics summary");
    println!("    --metrics-text          Print metrics as key=value lines");
    println!("    --help, -h              Print this help");
    println!();
    println!("EXAMPLES:");
    println!("    countcodec                                 # Run with random defaults");
    println!("    countcodec --seed 42                       # Deterministic run");
    println!("    countcodec --skew 0.5 --depth 16           # Uniform paths");
    println!("    countcodec --verify --out counts.bin       # Checked stream, saved");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seeded_defaults_are_deterministic() {
        let a = Config::from_args(&args(&["--seed", "7"])).unwrap();
        let b = Config::from_args(&args(&["--seed", "7"])).unwrap();
        assert_eq!(a.entries, b.entries);
        assert_eq!(a.depth, b.depth);
        assert_eq!(a.skew, b.skew);
        assert!((8..=24).contains(&a.depth));
        assert!(a.trie.binomial);
        assert!(!a.trie.verify);
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_args(&args(&[
            "--seed",
            "1",
            "--entries",
            "100",
            "--depth",
            "10",
            "--skew",
            "0.8",
            "--no-binomial",
            "--verify",
            "--out",
            "x.bin",
            "--no-metrics",
            "--metrics-text",
        ]))
        .unwrap();
        assert_eq!(config.entries, 100);
        assert_eq!(config.depth, 10);
        assert_eq!(config.skew, 0.8);
        assert!(!config.trie.binomial);
        assert!(config.trie.verify);
        assert_eq!(config.output_file, Some(PathBuf::from("x.bin")));
        assert!(!config.print_metrics);
        assert!(config.metrics_text);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Config::from_args(&args(&["--depth", "0"])).is_err());
        assert!(Config::from_args(&args(&["--depth", "65"])).is_err());
        assert!(Config::from_args(&args(&["--skew", "1.5"])).is_err());
        assert!(Config::from_args(&args(&["--entries"])).is_err());
        assert!(Config::from_args(&args(&["--bogus"])).is_err());
    }
}
