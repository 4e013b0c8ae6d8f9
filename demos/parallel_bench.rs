use hexpow::{Algorithm, HashFunction, MiningSession, Partition};
use std::str::FromStr;
use std::sync::Arc;

fn usage() -> String {
    "Usage: cargo run --release --example parallel_bench -- \
      [--prefix <str>] [--difficulty <u32>] [--threads-list <n,n,...>] \
      [--algo <name>] [--chunk-size <u64>] [--repeats <u32>]\n"
        .to_string()
}

fn parse_next<T: FromStr>(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<T, String> {
    let v = it.next().ok_or_else(usage)?;
    v.parse::<T>().map_err(|_| format!("Invalid {flag}"))
}

fn main() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let mut prefix = String::from("arthur");
    let mut difficulty: u32 = 5;
    let mut threads_list: Vec<usize> = vec![1, 2, 4, 8];
    let mut algo = String::from("sha2_256");
    let mut chunk_size: u64 = hexpow::DEFAULT_CHUNK_SIZE;
    let mut repeats: u32 = 3;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--prefix" => prefix = args.next().ok_or_else(usage)?,
            "--difficulty" => difficulty = parse_next(&mut args, "--difficulty")?,
            "--threads-list" => {
                let raw = args.next().ok_or_else(usage)?;
                threads_list = raw
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.parse::<usize>().map_err(|_| usage()))
                    .collect::<Result<Vec<_>, _>>()?;
                if threads_list.is_empty() {
                    return Err(usage());
                }
            }
            "--algo" => algo = args.next().ok_or_else(usage)?,
            "--chunk-size" => chunk_size = parse_next(&mut args, "--chunk-size")?,
            "--repeats" => repeats = parse_next(&mut args, "--repeats")?,
            _ => return Err(usage()),
        }
    }

    let hasher: Arc<dyn HashFunction> =
        Arc::new(Algorithm::from_name(&algo).map_err(|e| e.to_string())?);
    let partitions = [Partition::Striped, Partition::Chunked { chunk_size }];

    println!("partition,threads,repeat_idx,nonce,attempts,time_ms,hashes_per_s");
    for threads in threads_list {
        for partition in partitions {
            let mut total_ms = 0f64;
            for rep in 0..repeats {
                let session = MiningSession::builder()
                    .prefix(prefix.as_str())
                    .difficulty(difficulty)
                    .workers(threads)
                    .partition(partition)
                    .hasher(hasher.clone())
                    .build_validated()
                    .map_err(|e| e.to_string())?;
                let result = session
                    .run()
                    .and_then(|o| o.into_result())
                    .map_err(|e| e.to_string())?;
                let ms = result.elapsed.as_secs_f64() * 1000.0;
                total_ms += ms;
                let rate = result.attempts as f64 / result.elapsed.as_secs_f64().max(1e-9);
                println!(
                    "{},{},{},{},{},{:.3},{:.0}",
                    partition, threads, rep, result.nonce, result.attempts, ms, rate
                );
            }
            println!(
                "summary,{},{},mean_time_ms={:.3}",
                partition,
                threads,
                total_ms / f64::from(repeats.max(1))
            );
        }
    }
    Ok(())
}
