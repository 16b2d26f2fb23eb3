use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Follow a live HLS playlist and save every new segment",
    long_about = "Polls a live HLS playlist, downloads each newly published media segment\n\
                  exactly once in sequence order and writes it under the output directory\n\
                  at the path the playlist declares for it.\n\
                  \n\
                  The follower re-opens the playlist after the restart delay whenever a\n\
                  session fails, and stops on Ctrl-C or when the playlist is ended."
)]
pub struct CliArgs {
    /// Playlist URL (master or media)
    #[arg(required = true, help = "URL of the master or media playlist to follow")]
    pub url: String,

    /// Output directory for segments
    #[arg(
        short,
        long,
        default_value = ".",
        help = "Directory where segments are written, mirroring their playlist paths"
    )]
    pub output_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Log file path
    #[arg(
        long,
        default_value = "hls-follow.log",
        help = "File that receives a copy of the log output"
    )]
    pub log_file: PathBuf,

    /// Overall timeout in seconds
    #[arg(
        long,
        default_value = "0",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Read timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Read timeout in seconds (maximum time between receiving data chunks)"
    )]
    pub read_timeout: u64,

    /// Playlist fetch timeout in seconds
    #[arg(
        long,
        default_value = "15",
        help = "Timeout for a single playlist fetch in seconds"
    )]
    pub playlist_timeout: u64,

    /// Segment download timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Timeout for an individual segment download in seconds"
    )]
    pub segment_timeout: u64,

    /// Custom HTTP headers for requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// User agent override
    #[arg(short = 'A', long, help = "User-Agent sent with every request")]
    pub user_agent: Option<String>,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(
        long,
        help = "Proxy server URL for downloads (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type (http, https, socks5, all)
    #[arg(
        long,
        default_value = "http",
        help = "Proxy type (http, https, socks5, all)",
        value_parser = ["http", "https", "socks5", "all"]
    )]
    pub proxy_type: String,

    /// Proxy username
    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// Use system proxy settings
    #[arg(
        long,
        help = "Use system proxy settings if no explicit proxy is configured"
    )]
    pub use_system_proxy: bool,

    /// Disable all proxy settings
    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy)"
    )]
    pub no_proxy: bool,

    /// Fixed wait between refreshed polls
    #[arg(
        long,
        help = "Fixed wait after a refreshed playlist instead of target duration minus one second (e.g. \"2s\")"
    )]
    pub poll_interval: Option<String>,

    /// Wait after an unchanged playlist
    #[arg(
        long,
        default_value = "1s",
        help = "Wait after a poll that found no new segments (s, m, h or plain seconds, e.g. \"1s\", \"0.5\")"
    )]
    pub idle_interval: String,

    /// Variant selection policy
    #[arg(
        long,
        default_value = "first",
        help = "Which rendition of a master playlist to follow",
        value_parser = ["first", "highest", "lowest"]
    )]
    pub variant: String,

    /// Maximum master playlist nesting
    #[arg(
        long,
        default_value = "5",
        help = "Maximum number of master playlists followed before giving up"
    )]
    pub max_variant_depth: u32,

    /// Download the segments already listed when opening
    #[arg(
        long,
        help = "Also download the segments listed when the playlist is first opened"
    )]
    pub download_existing: bool,

    /// Segment retry attempts
    #[arg(
        long,
        default_value = "0",
        help = "Extra attempts for a segment download that failed with a timeout or 5xx"
    )]
    pub segment_retries: u32,

    /// Base delay between segment retries
    #[arg(
        long,
        default_value = "0.5",
        help = "Delay before the first segment retry, doubled for each further retry"
    )]
    pub segment_retry_delay: String,

    /// Write retry attempts
    #[arg(
        long,
        default_value = "1",
        help = "Extra attempts for a segment write that failed"
    )]
    pub write_retries: u32,

    /// Delay before re-opening after a failed session
    #[arg(
        long,
        default_value = "5s",
        help = "Delay before re-opening the playlist after a failed session (s, m, h)"
    )]
    pub restart_delay: String,

    /// Enables exponential backoff up to this delay
    #[arg(
        long,
        help = "Double the restart delay for each failed opening in a row, up to this value (s, m, h)"
    )]
    pub max_restart_delay: Option<String>,

    /// Restart limit
    #[arg(long, help = "Give up after this many restarts (unbounded by default)")]
    pub max_restarts: Option<u32>,

    /// Show a progress display
    #[arg(
        short = 'P',
        long = "progress",
        help = "Show a live progress display of saved segments"
    )]
    pub show_progress: bool,

    /// One-shot preload mode
    #[arg(
        long,
        help = "Download every segment of every rendition once and exit instead of following"
    )]
    pub preload: bool,
}
