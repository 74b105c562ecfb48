//! Quote budget command line.
//!
//! Opens the quote database and prints totals, exports the summary or runs
//! an invoice through the extraction endpoint.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use quote_budget_lib::domain::QuoteSettings;
use quote_budget_lib::repository::init_db;
use quote_budget_lib::services::{
    display_amount, extract_invoice, HttpInvoiceExtractor, PlainTextRenderer, UploadedFile,
};
use quote_budget_lib::QuoteSession;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "quote-budget")]
#[command(about = "Budget totals, render tracking and export for production quotes")]
struct Args {
    /// SQLite database file
    #[arg(long, value_name = "PATH", default_value = "quote_budget.db")]
    db: PathBuf,

    /// Settings JSON file, replaces the saved settings for this run
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, value_name = "DIR", default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print budget totals, render totals and the variance
    Totals {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write the quote summary document
    Export {
        #[arg(long, default_value = "Devis")]
        title: String,
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
        /// Notes, HTML allowed
        #[arg(long)]
        notes: Option<String>,
        /// Terms and conditions, HTML allowed
        #[arg(long)]
        terms: Option<String>,
    },
    /// Send an invoice to the extraction endpoint and print what it found
    Extract {
        #[arg(long)]
        endpoint: String,
        file: PathBuf,
    },
    /// Empty the render store
    ResetRender,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Err(e) = rolling_logger::init_logger(args.log_dir.clone(), "QuoteBudget") {
        eprintln!("Logging disabled: {}", e);
    }

    let db = match init_db(&args.db) {
        Ok(db) => {
            let _ = rolling_logger::info("DB init success");
            db
        }
        Err(e) => {
            let _ = rolling_logger::error(&format!("DB init failed: {}", e));
            return Err(e.into());
        }
    };
    let mut session = QuoteSession::open(&db).await?;

    if let Some(path) = &args.settings {
        let settings = QuoteSettings::load(path)?;
        session.update_settings(settings, false);
    }

    match args.command {
        Command::Totals { json } => {
            let totals = session.totals();
            let render = session.render_totals();
            let variance = session.variance();

            if json {
                let report = serde_json::json!({
                    "budget": totals,
                    "render": render,
                    "variance": variance,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let settings = session.settings();
                for category in &totals.categories {
                    println!("{:<40} {:>16}", category.name, display_amount(settings, category.subtotal));
                }
                println!("{:<40} {:>16}", "Total", display_amount(settings, totals.grand_total));
                println!("{:<40} {:>16}", "Render HT", display_amount(settings, render.total_ht()));
                println!(
                    "{:<40} {:>16} ({:+.2}%)",
                    "Variance",
                    display_amount(settings, variance.difference),
                    variance.percent_difference
                );
            }
        }
        Command::Export { title, out, notes, terms } => {
            let path = session.export(
                &title,
                notes.as_deref(),
                terms.as_deref(),
                &PlainTextRenderer::default(),
                &out,
            )?;
            println!("{}", path.display());
        }
        Command::Extract { endpoint, file } => {
            let bytes = std::fs::read(&file)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let upload = UploadedFile::new(&name, None, bytes)?;
            let invoice = extract_invoice(&HttpInvoiceExtractor::new(&endpoint), &upload).await?;
            println!("{}", serde_json::to_string_pretty(&invoice)?);
        }
        Command::ResetRender => {
            session.reset_render();
            session.save_render().await?;
            log::info!("Render store reset");
        }
    }

    Ok(())
}
