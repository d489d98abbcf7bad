use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "shardstream", about)]
pub struct Cli {
    /// Stream to demo-supply records from. Partitions are synthesized as
    /// `<stream>-0` .. `<stream>-<partitions - 1>`.
    #[arg(long, default_value = "demo-stream")]
    pub stream: String,

    /// Number of synthetic partitions to assign and script.
    #[arg(long, default_value_t = 3)]
    pub partitions: usize,

    /// How many times to call `poll` before exiting.
    #[arg(long, default_value_t = 20)]
    pub poll_rounds: u64,

    /// Tokio worker threads.
    #[arg(long, default_value_t = default_workers())]
    pub workers: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
