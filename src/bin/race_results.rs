//! Lists or exports recorded race results.

use clap::Parser;
use speed_show::results::{format_table, write_csv, ResultsLog};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "race_results")]
#[command(author, version, about = "Show recorded Speed Show race results")]
struct Args {
    /// Only show the N most recent races
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Write the selected rows to a CSV file instead of printing them
    #[arg(long, short = 'o')]
    csv: Option<PathBuf>,

    /// Results log to read
    #[arg(long, default_value = "racing_data.jsonl")]
    file: PathBuf,
}

fn main() {
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let log = ResultsLog::new(&args.file);
    let records = log.recent(args.limit)?;

    match &args.csv {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_csv(&records, &mut writer)?;
            writer.flush()?;
            println!("Exported {} row(s) to {}", records.len(), path.display());
        }
        None => {
            if !records.is_empty() {
                println!(
                    "Showing {} result(s) from {}",
                    records.len(),
                    log.path().display()
                );
            }
            println!("{}", format_table(&records));
        }
    }

    Ok(())
}
