use clap::Parser;
use hexpow::{
    render, verify_minimal, Algorithm, DifficultyTarget, Error, Format, HashFunction,
    MinerConfig, MiningOutcome, MiningSession, Partition,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Find the smallest nonce whose hash starts with N hex zeros", version)]
struct Args {
    #[arg(long, help = "Prefix hashed in front of the decimal nonce")]
    prefix: Option<String>,

    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Required leading '0' hex characters"
    )]
    difficulty: Option<i64>,

    #[arg(long, help = "Worker threads (default: available parallelism)")]
    workers: Option<usize>,

    #[arg(long, value_name = "striped|chunked")]
    partition: Option<String>,

    #[arg(long, help = "Nonces per claim in chunked mode")]
    chunk_size: Option<u64>,

    #[arg(long, help = "Hashes between watermark and stop checks")]
    check_interval: Option<u64>,

    #[arg(long = "algo", value_name = "NAME")]
    algorithm: Option<String>,

    #[arg(long, help = "Give up after this many milliseconds")]
    deadline_ms: Option<u64>,

    #[arg(long, help = "Exclusive upper bound on the nonce space")]
    nonce_limit: Option<u64>,

    #[arg(long, help = "JSON miner config; flags override its values")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "text", value_name = "text|json")]
    format: String,

    #[arg(long, help = "Re-check the result, including minimality")]
    verify: bool,
}

fn init_log() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<MinerConfig, Error> {
    let mut config = match &args.config {
        Some(path) => MinerConfig::from_json_file(path)?,
        None => MinerConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(partition) = &args.partition {
        config.partition = partition.parse()?;
    }
    if let Some(chunk_size) = args.chunk_size {
        match config.partition {
            Partition::Chunked { .. } => config.partition = Partition::Chunked { chunk_size },
            Partition::Striped => {
                return Err(Error::InvalidConfig(
                    "--chunk-size only applies to the chunked partition".into(),
                ))
            }
        }
    }
    if let Some(check_interval) = args.check_interval {
        config.check_interval = check_interval;
    }
    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.clone();
    }
    if args.deadline_ms.is_some() {
        config.deadline_ms = args.deadline_ms;
    }
    if args.nonce_limit.is_some() {
        config.nonce_limit = args.nonce_limit;
    }
    config.validate()?;
    Ok(config)
}

/// Mine one prefix and print the outcome; returns whether a result was found.
fn mine_one(
    prefix: &str,
    difficulty: i64,
    config: &MinerConfig,
    format: Format,
    verify: bool,
) -> Result<bool, Error> {
    let target = DifficultyTarget::from_signed(difficulty, config.difficulty_ceiling)?;
    let session = MiningSession::from_config(prefix, target.difficulty(), config)?;
    let outcome = session.run()?;
    println!("{}", render(&outcome, format)?);

    let MiningOutcome::Found(result) = &outcome else {
        return Ok(false);
    };
    if verify {
        let hasher: Arc<dyn HashFunction> = Arc::new(config.algorithm()?);
        match verify_minimal(
            prefix.as_bytes(),
            &target,
            result.nonce,
            &result.digest,
            hasher.as_ref(),
        ) {
            Ok(()) => info!(nonce = result.nonce, "result verified"),
            Err(e) => {
                error!(error = %e, "verification failed");
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// 0 when every search found and verified, 2 when one was cancelled, exhausted or
/// failed verification, 1 on errors.
fn exit_status(outcome: &Result<bool, Error>) -> u8 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => 2,
        Err(_) => 1,
    }
}

fn main() -> ExitCode {
    init_log();
    let args = Args::parse();

    let outcome = (|| -> Result<bool, Error> {
        let config = load_config(&args)?;
        let format: Format = args.format.parse()?;
        match (&args.prefix, args.difficulty) {
            (Some(prefix), Some(difficulty)) => {
                mine_one(prefix, difficulty, &config, format, args.verify)
            }
            (None, None) => {
                info!(
                    algorithm = Algorithm::default().name(),
                    "no prefix given, running the arthur demo"
                );
                let mut all = true;
                for difficulty in [4, 5] {
                    all &= mine_one("arthur", difficulty, &config, format, args.verify)?;
                }
                Ok(all)
            }
            _ => Err(Error::InvalidConfig(
                "--prefix and --difficulty must be given together".into(),
            )),
        }
    })();

    if let Err(e) = &outcome {
        error!(error = %e, "hexpow failed");
    }
    ExitCode::from(exit_status(&outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(flags: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("hexpow").chain(flags.iter().copied())).unwrap()
    }

    fn status(prefix: &str, difficulty: i64, config: &MinerConfig) -> u8 {
        exit_status(&mine_one(prefix, difficulty, config, Format::Text, true))
    }

    #[test]
    fn found_and_verified_exits_zero() {
        let config = load_config(&args(&["--workers", "2"])).unwrap();
        assert_eq!(status("arthur", 2, &config), 0);
    }

    #[test]
    fn cancelled_search_exits_two() {
        let config = load_config(&args(&["--workers", "2", "--deadline-ms", "20"])).unwrap();
        assert_eq!(status("no-such-luck", 16, &config), 2);
    }

    #[test]
    fn exhausted_search_exits_two() {
        let config = load_config(&args(&["--workers", "2", "--nonce-limit", "200"])).unwrap();
        assert_eq!(status("bounded", 8, &config), 2);
    }

    #[test]
    fn setup_errors_exit_one() {
        let config = MinerConfig::default();
        assert_eq!(status("arthur", -1, &config), 1);
        assert_eq!(status("arthur", 17, &config), 1);
    }

    #[test]
    fn chunk_size_refines_chunked_partition() {
        let config = load_config(&args(&["--chunk-size", "64"])).unwrap();
        assert_eq!(config.partition, Partition::Chunked { chunk_size: 64 });

        let config =
            load_config(&args(&["--partition", "chunked", "--chunk-size", "32"])).unwrap();
        assert_eq!(config.partition, Partition::Chunked { chunk_size: 32 });
    }

    #[test]
    fn chunk_size_with_striped_partition_is_rejected() {
        let err = load_config(&args(&["--partition", "striped", "--chunk-size", "64"]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("--chunk-size")));
    }
}
