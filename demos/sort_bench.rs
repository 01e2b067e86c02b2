//! Wall-clock harness: random u64 keys through the parallel radix sort,
//! optionally side by side with `sort_unstable`.
//!
//! ```text
//! cargo run --release --example sort_bench -- --size 16000000 --baseline
//! ```

use std::time::{Duration, Instant};

use argh::FromArgs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shedsort::{radix_sort_with, Backend, DigitWidth, SortConfig};

#[derive(FromArgs)]
/// Benchmark the parallel radix sort on random u64 keys.
struct Args {
    /// number of random keys
    #[argh(option, default = "4_000_000")]
    size: usize,

    /// worker threads, 0 = hardware parallelism
    #[argh(option, default = "0")]
    threads: usize,

    /// scheduler backend: 'native' or 'rayon'
    #[argh(option, default = "Backend::Native")]
    backend: Backend,

    /// digit width in bytes: 1 or 2
    #[argh(option, default = "1")]
    width: usize,

    /// timed repetitions
    #[argh(option, default = "3")]
    runs: usize,

    /// rng seed
    #[argh(option, default = "123456")]
    seed: u64,

    /// also time std's sort_unstable on the same input
    #[argh(switch)]
    baseline: bool,
}

/// Prints seconds, milliseconds or microseconds depending on magnitude.
struct PrettyDuration(Duration);

impl std::fmt::Display for PrettyDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let duration = self.0;
        if duration.as_secs() > 0 {
            let seconds =
                duration.as_secs() as f64 + f64::from(duration.subsec_nanos()) / 1_000_000_000.0;
            write!(f, "{seconds:.2}s ")
        } else if duration.subsec_millis() > 0 {
            let milliseconds =
                duration.as_millis() as f64 + f64::from(duration.subsec_micros() % 1_000) / 1_000.0;
            write!(f, "{milliseconds:.2}ms")
        } else {
            let microseconds = duration.as_micros();
            write!(f, "{microseconds}µs")
        }
    }
}

fn main() {
    env_logger::init();
    let args: Args = argh::from_env();

    let (width, digits) = match args.width {
        1 => (DigitWidth::U8, 8),
        2 => (DigitWidth::U16, 4),
        other => {
            eprintln!("unsupported digit width {other}, expected 1 or 2");
            std::process::exit(1);
        }
    };

    let config = SortConfig {
        threads: args.threads,
        backend: args.backend,
        ..SortConfig::default()
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let input: Vec<u64> = (0..args.size).map(|_| rng.random()).collect();

    let threads = if args.threads == 0 {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        args.threads
    };
    println!(
        "{} keys, {:?} backend, {threads} threads, {}-byte digits",
        args.size, args.backend, args.width,
    );

    for run in 0..args.runs {
        let mut data = input.clone();
        let start = Instant::now();
        radix_sort_with(&mut data, width, digits, &config);
        let radix_time = start.elapsed();
        assert!(data.windows(2).all(|w| w[0] <= w[1]));

        if args.baseline {
            let mut data = input.clone();
            let start = Instant::now();
            data.sort_unstable();
            let std_time = start.elapsed();
            println!(
                "run {run}: radix {} | sort_unstable {}",
                PrettyDuration(radix_time),
                PrettyDuration(std_time),
            );
        } else {
            println!("run {run}: radix {}", PrettyDuration(radix_time));
        }
    }
}
