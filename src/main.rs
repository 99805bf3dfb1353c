use anyhow::{Context, Result};
use memscan::config::{load_config, validate_config};
use memscan::{logging, MatchRecord, NarrowSummary, ScanSummary, ValueType};
use serde::Serialize;
use tracing::info;

/// Records printed in the summary
#[cfg_attr(not(windows), allow(dead_code))]
const MAX_PRINTED: usize = 100;

const USAGE: &str = "usage: memscan <pid> <value> [type] [narrow values...]";

#[derive(Debug)]
#[cfg_attr(not(windows), allow(dead_code))]
struct Args {
    pid: u32,
    target: i32,
    value_type: ValueType,
    narrow: Vec<i32>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let pid = args
            .next()
            .context(USAGE)?
            .parse()
            .context("pid must be a number")?;
        let target = args
            .next()
            .context(USAGE)?
            .parse()
            .context("value must be a 32-bit integer")?;

        let mut value_type = ValueType::Int32;
        let mut narrow = Vec::new();
        for (i, arg) in args.enumerate() {
            if i == 0 {
                if let Ok(ty) = arg.parse::<ValueType>() {
                    value_type = ty;
                    continue;
                }
            }
            narrow.push(
                arg.parse()
                    .with_context(|| format!("narrow value '{}' is not an integer", arg))?,
            );
        }

        Ok(Args {
            pid,
            target,
            value_type,
            narrow,
        })
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(not(windows), allow(dead_code))]
struct Report {
    pid: u32,
    value_type: ValueType,
    scan: ScanSummary,
    narrowing: Vec<NarrowSummary>,
    total_results: usize,
    results: Vec<MatchRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;
    logging::init(&config.logging)?;

    info!("Starting memscan v{}", env!("CARGO_PKG_VERSION"));
    let args = Args::parse(std::env::args().skip(1))?;
    let report = run(config, args).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(windows)]
async fn run(config: memscan::Config, args: Args) -> Result<Report> {
    use memscan::process::ProcessHandle;
    use memscan::Engine;
    use std::sync::Arc;

    let process = ProcessHandle::open_for_read_write(args.pid)
        .with_context(|| format!("opening process {}", args.pid))?;
    let engine = Arc::new(Engine::new(Arc::new(process), config));

    let session = engine.session();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, cancelling");
            session.cancel();
        }
    });

    let worker = Arc::clone(&engine);
    let report = tokio::task::spawn_blocking(move || -> Result<Report> {
        let scan = worker.scan(args.target, args.value_type)?;
        let mut narrowing = Vec::new();
        for value in &args.narrow {
            if worker.session().is_cancelled() {
                break;
            }
            narrowing.push(worker.narrow(*value)?);
        }

        let results = worker.results();
        let mut printed = results.snapshot();
        printed.truncate(MAX_PRINTED);
        Ok(Report {
            pid: args.pid,
            value_type: args.value_type,
            scan,
            narrowing,
            total_results: results.len(),
            results: printed,
        })
    })
    .await??;

    ctrl_c.abort();
    Ok(report)
}

#[cfg(not(windows))]
async fn run(_config: memscan::Config, args: Args) -> Result<Report> {
    anyhow::bail!(
        "memscan can only attach to processes on Windows (pid {})",
        args.pid
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_minimal() {
        let args = parse(&["1234", "100"]).unwrap();
        assert_eq!(args.pid, 1234);
        assert_eq!(args.target, 100);
        assert_eq!(args.value_type, ValueType::Int32);
        assert!(args.narrow.is_empty());
    }

    #[test]
    fn test_parse_type_and_narrow() {
        let args = parse(&["1", "5", "float32", "6", "7"]).unwrap();
        assert_eq!(args.value_type, ValueType::Float32);
        assert_eq!(args.narrow, vec![6, 7]);

        let args = parse(&["1", "5", "6"]).unwrap();
        assert_eq!(args.value_type, ValueType::Int32);
        assert_eq!(args.narrow, vec![6]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["x", "1"]).is_err());
        assert!(parse(&["1", "2", "int32", "nope"]).is_err());
    }
}
