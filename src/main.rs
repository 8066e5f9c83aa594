//! CLI entry point for `emlview`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};

use emlview::model::mail::Message;

#[derive(Parser)]
#[command(name = "emlview", version, about = "Inspect raw RFC 822 / MIME email files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a message summary: key headers, body preview, attachments
    Show { path: PathBuf },
    /// Print all headers in wire order
    Headers {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List attachments
    Attachments {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Extract all attachments into a directory
    Extract {
        path: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Print the HTML body (plain text gets a minimal HTML wrapper)
    Html { path: PathBuf },
    /// Print the plain-text body
    Text { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Show { path } => show(&path),
        Commands::Headers { path, json } => headers(&path, json),
        Commands::Attachments { path, json } => attachments(&path, json),
        Commands::Extract { path, output } => extract(&path, &output),
        Commands::Html { path } => {
            let msg = Message::from_file(path)?;
            match msg.html_body() {
                Some(html) => println!("{html}"),
                None => eprintln!("(no renderable body)"),
            }
            Ok(())
        }
        Commands::Text { path } => {
            let msg = Message::from_file(path)?;
            match msg.text_body() {
                Some(text) => println!("{text}"),
                None => eprintln!("(no renderable body)"),
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show(path: &PathBuf) -> Result<()> {
    let msg = Message::from_file(path)?;

    if let Some(from) = msg.from_addr() {
        println!("From:    {from}");
    }
    let to = msg.to_addrs();
    if !to.is_empty() {
        let list: Vec<String> = to.iter().map(|a| a.display()).collect();
        println!("To:      {}", list.join(", "));
    }
    if let Some(date) = msg.date() {
        println!("Date:    {}", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(subject) = msg.subject() {
        println!("Subject: {subject}");
    }
    if let Some(id) = msg.identifier() {
        println!("ID:      {id}");
    }

    if let Some(text) = msg.text_body() {
        println!();
        for line in text.lines().take(20) {
            println!("{line}");
        }
        if text.lines().count() > 20 {
            println!("[...]");
        }
    }

    let attachments = msg.attachments();
    if !attachments.is_empty() {
        println!();
        println!("Attachments:");
        for (i, att) in attachments.iter().enumerate() {
            println!(
                "  {} ({}, {}{})",
                att.display_name(i),
                att.mime_type.as_deref().unwrap_or("unknown"),
                format_size(att.size(), DECIMAL),
                if att.is_inline { ", inline" } else { "" },
            );
        }
    }

    Ok(())
}

fn headers(path: &PathBuf, json: bool) -> Result<()> {
    let msg = Message::from_file(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&msg.root.headers)?);
    } else {
        for header in &msg.root.headers {
            println!("{}: {}", header.name, header.body);
        }
    }
    Ok(())
}

fn attachments(path: &PathBuf, json: bool) -> Result<()> {
    let msg = Message::from_file(path)?;
    let attachments = msg.attachments();

    if json {
        println!("{}", serde_json::to_string_pretty(&attachments)?);
    } else if attachments.is_empty() {
        eprintln!("(no attachments)");
    } else {
        for (i, att) in attachments.iter().enumerate() {
            println!(
                "{}\t{}\t{}",
                att.display_name(i),
                att.mime_type.as_deref().unwrap_or("unknown"),
                format_size(att.size(), DECIMAL),
            );
        }
    }
    Ok(())
}

fn extract(path: &PathBuf, output: &PathBuf) -> Result<()> {
    let msg = Message::from_file(path)?;
    let attachments = msg.attachments();
    if attachments.is_empty() {
        eprintln!("(no attachments)");
        return Ok(());
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    for (i, att) in attachments.iter().enumerate() {
        // Keep only the final path component of the filename; attachment
        // names from the wire are untrusted.
        let name = att.display_name(i);
        let safe_name = std::path::Path::new(&name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("attachment_{i}"));
        let target = output.join(safe_name);
        std::fs::write(&target, &att.data)
            .with_context(|| format!("writing {}", target.display()))?;
        println!("{} ({})", target.display(), format_size(att.size(), DECIMAL));
    }

    Ok(())
}
