use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::format_description::well_known::Rfc3339;

use crate::app::App;
use crate::config::AppConfig;
use crate::store::{Entry, EntryStore};
use crate::timeline::layout;

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search term (read from stdin when omitted and input is piped)
    #[arg()]
    pub term: Vec<String>,
    /// How many simulated entries to load before filtering
    #[arg(long, default_value_t = 20)]
    pub count: usize,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    /// Number of entries to generate
    #[arg(long, default_value_t = 5)]
    pub count: usize,
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn search_entries(config: Arc<AppConfig>, args: SearchArgs) -> Result<()> {
    let mut term = args.term.join(" ");
    if term.trim().is_empty() {
        if let Some(piped) = read_stdin()? {
            term = piped;
        }
    }
    let output = run_search(&config, term.trim(), args.count)?;
    print!("{output}");
    Ok(())
}

fn run_search(config: &AppConfig, term: &str, count: usize) -> Result<String> {
    if term.is_empty() {
        bail!("search term cannot be empty");
    }
    let mut store = EntryStore::new(&config.latency, &config.failures);
    let entries = store
        .load_initial(count)
        .context("loading entries to search")?;
    let matches = store
        .search(&entries, term)
        .context("searching entries")?;
    tracing::debug!(term, loaded = entries.len(), matches = matches.len(), "cli search");
    Ok(format_search_results(&matches))
}

fn format_search_results(entries: &[Entry]) -> String {
    if entries.is_empty() {
        return "No matches found.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(&mut out, "{}  {}", entry.id, format_timestamp(entry));
        for line in layout::sanitize(&entry.content).lines() {
            let _ = writeln!(&mut out, "    {line}");
        }
        out.push('\n');
    }
    out
}

pub fn print_sample(config: Arc<AppConfig>, args: SampleArgs) -> Result<()> {
    let output = render_sample(&config, &args)?;
    println!("{output}");
    Ok(())
}

fn render_sample(config: &AppConfig, args: &SampleArgs) -> Result<String> {
    let mut store = EntryStore::new(&config.latency, &config.failures);
    let entries = store
        .load_initial(args.count)
        .context("generating sample entries")?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&entries)
    } else {
        serde_json::to_string(&entries)
    };
    json.context("serializing sample entries")
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading search term from stdin")?;
    Ok(Some(buf))
}

fn format_timestamp(entry: &Entry) -> String {
    entry
        .timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| entry.timestamp.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T = ()> = Result<T>;

    #[test]
    fn cli_search_prints_only_matches() -> TestResult {
        let config = AppConfig::default();
        let output = run_search(&config, "entry 3:", 10)?;
        assert!(output.contains("Entry 3:"));
        assert!(!output.contains("Entry 4:"));
        Ok(())
    }

    #[test]
    fn cli_search_reports_no_matches() -> TestResult {
        let config = AppConfig::default();
        let output = run_search(&config, "zzz-not-there", 10)?;
        assert_eq!(output, "No matches found.\n");
        Ok(())
    }

    #[test]
    fn cli_search_rejects_blank_term() {
        let config = AppConfig::default();
        assert!(run_search(&config, "", 10).is_err());
    }

    #[test]
    fn sample_is_valid_json_in_order() -> TestResult {
        let config = AppConfig::default();
        let args = SampleArgs {
            count: 4,
            pretty: false,
        };
        let json = render_sample(&config, &args)?;
        let entries: Vec<Entry> = serde_json::from_str(&json)?;
        assert_eq!(entries.len(), 4);
        assert!(entries
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
        assert!(entries.iter().all(|entry| !entry.highlighted));
        Ok(())
    }
}
