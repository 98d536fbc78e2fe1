use clap::Parser;

#[derive(Parser)]
#[command(
    name = "transcript-relay",
    about = "Transcript Relay - Serve plain-text video transcripts over HTTP with tiered caching",
    version,
    long_about = "An HTTP service that resolves video URLs to plain-text transcripts. Caption tracks are fetched from the video platform with per-language fallback, speech-to-text recovery can kick in when captions are missing, and results are cached across memory, Redis and a persistent store."
)]
pub struct Cli {
    /// Address to bind the HTTP listener on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the HTTP listener
    #[arg(short, long, env = "PORT", default_value_t = 8787)]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
