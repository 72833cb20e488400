use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "unichat",
    version,
    about = "Normalize Twitch, Kick and YouTube live chat into one event stream"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to <config dir>/unichat/config.toml)
    #[arg(short, long, global = true, env = "UNICHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed captured frames (one per line) through a scraper session
    Replay {
        /// Scraper id, e.g. kick-chat
        #[arg(short, long)]
        scraper: String,

        /// File with one frame per line
        #[arg(short, long)]
        file: PathBuf,

        /// Channel name used to build the page URL
        #[arg(long, default_value = "replay")]
        channel: String,

        /// Page URL to attach to; overrides --channel
        #[arg(long)]
        url: Option<String>,

        /// Print the presentation buffer after the replay
        #[arg(long)]
        render: bool,
    },

    /// Stream live chat from a Kick or Twitch page until Ctrl-C
    Connect {
        /// Page URL, e.g. https://www.twitch.tv/somechannel
        #[arg(short, long)]
        url: String,

        /// Scraper id; detected from the URL when omitted
        #[arg(short, long)]
        scraper: Option<String>,

        /// Kick chatroom id (Kick subscribes by numeric id)
        #[arg(long)]
        chatroom_id: Option<String>,
    },

    /// List registered scrapers
    Scrapers,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
