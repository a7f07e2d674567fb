//! CLI entry point for mailscrub.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailscrub::cleaner::{self, date, denylist, CleanReport};
use mailscrub::config::Config;
use mailscrub::parser::header;

#[derive(Parser)]
#[command(
    name = "mailscrub",
    version,
    about = "Clean .eml messages before sharing",
    long_about = "Strips tracking headers (Received, ARC-*, X-* except X-Gm*), replaces the \
                  Date header, rebuilds the MIME body from its text, HTML and inline parts, \
                  and optionally appends a document attachment."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Sanitize a single message
    Clean {
        /// Input .eml file
        input: PathBuf,
        /// Output .eml file
        #[arg(short, long)]
        output: PathBuf,
        /// Replacement Date header (RFC 3339 or RFC 2822; defaults to now)
        #[arg(long)]
        date: Option<String>,
        /// File to append as an attachment
        #[arg(long)]
        attach: Option<PathBuf>,
        /// Filename to advertise for the attachment (defaults to the file name)
        #[arg(long)]
        attach_name: Option<String>,
        /// Content type for the attachment (defaults from config)
        #[arg(long)]
        attach_type: Option<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sanitize every message in a directory
    Batch {
        /// Input directory of .eml files
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Replacement Date header applied to every message
        #[arg(long)]
        date: Option<String>,
        /// File to append as an attachment to every message
        #[arg(long)]
        attach: Option<PathBuf>,
        /// Filename to advertise for the attachment
        #[arg(long)]
        attach_name: Option<String>,
        /// Content type for the attachment
        #[arg(long)]
        attach_type: Option<String>,
    },
    /// Show which headers of a message would be kept or stripped
    Headers {
        /// Input .eml file
        input: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mailscrub::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Clean {
            input,
            output,
            date,
            attach,
            attach_name,
            attach_type,
            json,
        } => cmd_clean(
            &input,
            &output,
            date.as_deref(),
            attach.as_deref(),
            attach_name.as_deref(),
            attach_type.as_deref(),
            json,
            &config,
        ),
        Commands::Batch {
            input,
            output,
            date,
            attach,
            attach_name,
            attach_type,
        } => cmd_batch(
            &input,
            &output,
            date.as_deref(),
            attach.as_deref(),
            attach_name.as_deref(),
            attach_type.as_deref(),
            &config,
        ),
        Commands::Headers { input, json } => cmd_headers(&input, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mailscrub::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailscrub.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Resolve the replacement date: parse the argument, or default to now.
fn resolve_date(arg: Option<&str>) -> anyhow::Result<DateTime<FixedOffset>> {
    match arg {
        Some(s) => Ok(date::parse_date_arg(s)?),
        None => Ok(Local::now().fixed_offset()),
    }
}

/// Sanitize a single message file.
#[allow(clippy::too_many_arguments)]
fn cmd_clean(
    input: &Path,
    output: &Path,
    date_arg: Option<&str>,
    attach: Option<&Path>,
    attach_name: Option<&str>,
    attach_type: Option<&str>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("File not found: {}", input.display());
    }

    let date = resolve_date(date_arg)?;
    let attach_type = attach_type.unwrap_or(&config.attach.content_type);

    let report = cleaner::sanitize_file(input, output, date, attach, attach_name, attach_type)?;

    if json {
        print_report_json(output, &report)?;
    } else {
        print_report_table(output, &report);
    }

    Ok(())
}

/// Sanitize every matching message in a directory.
fn cmd_batch(
    input_dir: &Path,
    output_dir: &Path,
    date_arg: Option<&str>,
    attach: Option<&Path>,
    attach_name: Option<&str>,
    attach_type: Option<&str>,
    config: &Config,
) -> anyhow::Result<()> {
    if !input_dir.is_dir() {
        anyhow::bail!("Not a directory: {}", input_dir.display());
    }

    let date = resolve_date(date_arg)?;
    let attach_type = attach_type.unwrap_or(&config.attach.content_type);
    let extension = config.batch.extension.as_str();

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        println!("  No .{extension} files found in {}", input_dir.display());
        return Ok(());
    }

    std::fs::create_dir_all(output_dir)?;

    println!(
        "  Sanitizing {} message(s) to {}",
        files.len(),
        output_dir.display()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Sanitizing [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut done = 0usize;
    let mut failed = 0usize;
    let mut headers_removed = 0usize;
    let mut output_bytes = 0u64;

    for (i, file) in files.iter().enumerate() {
        pb.set_position(i as u64);

        let name = file.file_name().expect("listed files have names");
        let out_path = output_dir.join(name);

        match cleaner::sanitize_file(file, &out_path, date, attach, attach_name, attach_type) {
            Ok(report) => {
                done += 1;
                headers_removed += report.headers_removed;
                output_bytes += report.output_size;
            }
            Err(e) => {
                if config.batch.fail_fast {
                    pb.finish_and_clear();
                    return Err(e.context(format!("while sanitizing {}", file.display())));
                }
                failed += 1;
                tracing::warn!(
                    file = %file.display(),
                    error = %e,
                    "Failed to sanitize message"
                );
            }
        }
    }
    pb.finish_and_clear();

    use humansize::{format_size, BINARY};
    println!();
    println!("  Batch complete:");
    println!("  {:<25} {}", "Messages sanitized", done);
    if failed > 0 {
        println!("  {:<25} {}", "Failed", failed);
    }
    println!("  {:<25} {}", "Headers removed", headers_removed);
    println!(
        "  {:<25} {}",
        "Output size",
        format_size(output_bytes, BINARY)
    );
    println!();

    Ok(())
}

/// Show the keep/strip verdict for every top-level header of a message.
fn cmd_headers(input: &Path, json: bool) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("File not found: {}", input.display());
    }

    let raw = std::fs::read(input)?;
    let headers = header::parse_header_block(&raw);

    if json {
        let items: Vec<serde_json::Value> = headers
            .iter()
            .map(|h| {
                serde_json::json!({
                    "name": h.name,
                    "value": h.unfolded_value(),
                    "action": if denylist::is_internal(&h.name) { "strip" } else { "keep" },
                })
            })
            .collect();
        let stripped = headers.iter().filter(|h| denylist::is_internal(&h.name)).count();
        let output = serde_json::json!({
            "header_count": headers.len(),
            "strip_count": stripped,
            "headers": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    let mut stripped = 0usize;
    for h in &headers {
        let verdict = if denylist::is_internal(&h.name) {
            stripped += 1;
            "strip"
        } else {
            "keep "
        };
        let value = h.unfolded_value();
        let value_trunc: String = value.chars().take(60).collect();
        println!("  {verdict}  {}: {value_trunc}", h.name);
    }
    println!();
    println!(
        "  {} header(s), {} would be stripped",
        headers.len(),
        stripped
    );
    println!();

    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailscrub", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print the clean report in a human-readable table.
fn print_report_table(output: &Path, report: &CleanReport) {
    use humansize::{format_size, BINARY};

    let body = match (report.has_plain_body, report.has_html_body) {
        (true, true) => "plain + html",
        (true, false) => "plain",
        (false, true) => "html",
        (false, false) => "none",
    };

    println!();
    println!("  {:<25} {}", "Output", output.display());
    println!("  {:<25} {}", "Headers removed", report.headers_removed);
    println!("  {:<25} {}", "Headers kept", report.headers_kept);
    println!("  {:<25} {}", "Body", body);
    println!("  {:<25} {}", "Inline parts", report.inline_parts);
    println!(
        "  {:<25} {}",
        "Attachments discarded", report.attachments_discarded
    );
    println!(
        "  {:<25} {}",
        "Attachment added",
        if report.attachment_added { "yes" } else { "no" }
    );
    if report.decode_problems > 0 {
        println!("  {:<25} {}", "Decode problems", report.decode_problems);
    }
    println!(
        "  {:<25} {} -> {}",
        "Size",
        format_size(report.input_size, BINARY),
        format_size(report.output_size, BINARY)
    );
    println!();
}

/// Print the clean report as JSON.
fn print_report_json(output: &Path, report: &CleanReport) -> anyhow::Result<()> {
    let out = serde_json::json!({
        "output": output.to_string_lossy(),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
