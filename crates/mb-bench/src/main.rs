use anyhow::Result;
use clap::Parser;
use log::info;

use mb_bench::BenchConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BenchConfig::parse();
    let reports = mb_bench::run(&config)?;

    for report in &reports {
        match report.verify {
            Some(v) => info!(
                "{}: {} elements checked, max abs diff {:e}",
                report.kind, v.checked, v.max_abs_diff
            ),
            None => info!("{}: not verified", report.kind),
        }
    }
    Ok(())
}
