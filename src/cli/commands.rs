use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "confluence",
    about = "Cached multi-source investment scoring with LLM recommendations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a subject and ask the model for a recommendation
    Analyze {
        /// Ticker or subject key (e.g. AAPL)
        subject: String,
        /// Expert profile id to answer as
        #[arg(long)]
        expert: Option<String>,
        /// Run even if a recent analysis exists
        #[arg(long)]
        force: bool,
    },
    /// Ask several expert profiles about one subject and tally their verdicts
    Panel {
        /// Ticker or subject key (e.g. AAPL)
        subject: String,
        /// Expert profile ids; repeat the flag or separate with commas
        #[arg(long = "expert", value_delimiter = ',', required = true)]
        experts: Vec<String>,
    },
    /// Stored analyses for a subject, newest first
    History {
        subject: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Newest analyses across all subjects
    Recent {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show one stored analysis
    Show { id: String },
    /// Delete one stored analysis
    Delete { id: String },
    /// Analysis and cache statistics
    Stats,
    /// Remove expired cache entries
    PurgeCache,
}
