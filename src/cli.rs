//! Command-line interface definitions for Marketplace Scout.
//!
//! Global options tune the crawler; each subcommand is one way of running a
//! query. Most options can also come from environment variables.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for the Marketplace Scout application.
///
/// # Examples
///
/// ```sh
/// # Serve the HTTP API
/// marketplace_scout serve --bind 127.0.0.1:8000
///
/// # One-shot search, saving the results
/// marketplace_scout search -k "ap automation" -r UK -o ./results
///
/// # Free-text question through headless Chrome
/// marketplace_scout --renderer browser ask "What MPP is good for AP Automation in the UK?"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "SCOUT_CONFIG", global = true)]
    pub config: Option<String>,

    /// Maximum concurrent detail-page fetches (overrides the config file)
    #[arg(long, env = "SCOUT_CONCURRENCY", global = true)]
    pub concurrency: Option<usize>,

    /// How pages are fetched
    #[arg(long, value_enum, env = "SCOUT_RENDERER", default_value_t = Renderer::Http, global = true)]
    pub renderer: Renderer,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP query API
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(short, long, env = "SCOUT_BIND")]
        bind: Option<String>,
    },

    /// Run one keyword search and print the results as JSON
    Search {
        /// Comma-separated keywords
        #[arg(short, long)]
        keywords: String,

        /// Region the listings must be approved for
        #[arg(short, long)]
        region: Option<String>,

        /// How keywords combine: `all` or `any`
        #[arg(short = 'm', long = "match")]
        policy: Option<String>,

        /// Also search detail-page text and provider names
        #[arg(long)]
        full_text: bool,

        /// Directory to write a dated JSON copy of the results into
        #[arg(short, long)]
        output_dir: Option<String>,
    },

    /// Interpret a free-text question and print the answer as JSON
    Ask {
        question: String,

        /// Also search detail-page text and provider names
        #[arg(long)]
        full_text: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    /// Plain HTTP fetches; no script execution
    Http,
    /// Headless Chrome (requires the `browser` feature)
    Browser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_parsing() {
        let cli = Cli::parse_from([
            "marketplace_scout",
            "search",
            "--keywords",
            "ap automation,cash",
            "--region",
            "UK",
            "--match",
            "all",
        ]);

        assert_eq!(cli.renderer, Renderer::Http);
        match cli.command {
            Command::Search {
                keywords,
                region,
                policy,
                full_text,
                output_dir,
            } => {
                assert_eq!(keywords, "ap automation,cash");
                assert_eq!(region.as_deref(), Some("UK"));
                assert_eq!(policy.as_deref(), Some("all"));
                assert!(!full_text);
                assert!(output_dir.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_short_flags_and_globals() {
        let cli = Cli::parse_from([
            "marketplace_scout",
            "search",
            "-k",
            "payroll",
            "-o",
            "/tmp/results",
            "--renderer",
            "browser",
            "--concurrency",
            "3",
        ]);

        assert_eq!(cli.renderer, Renderer::Browser);
        assert_eq!(cli.concurrency, Some(3));
        assert!(matches!(
            cli.command,
            Command::Search { output_dir: Some(ref d), .. } if d == "/tmp/results"
        ));
    }

    #[test]
    fn test_ask_takes_positional_question() {
        let cli = Cli::parse_from(["marketplace_scout", "ask", "What is best for payroll in Canada?"]);
        assert!(matches!(
            cli.command,
            Command::Ask { ref question, full_text: false } if question.contains("payroll")
        ));
    }
}
