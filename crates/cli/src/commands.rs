use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Copy source objects to the destination through the transform chain
    Run {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, default_value_t = 1, help = "Concurrent worker loops")]
        parallelism: usize,

        #[arg(
            long,
            default_value_t = 30,
            help = "Deadline in seconds for each storage operation"
        )]
        op_timeout: u64,

        #[arg(long, help = "Print a progress line after every finished batch")]
        progress: bool,
    },
    /// Check a config file and report findings without copying anything
    Validate {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Print the configuration hash that prefixes this pipeline's state objects
    Hash {
        #[arg(long, help = "Config file path")]
        config: String,
    },
}
