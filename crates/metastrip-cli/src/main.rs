// File: crates/metastrip-cli/src/main.rs

use anyhow::{Context, Result, bail};
use clap::Parser;
use metastrip_core::{StripResult, scrubber_for_file};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Strip EXIF, text and timestamp metadata from JPEG and PNG images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List the metadata a clean would remove
    View {
        /// The path to the image
        #[arg(required = true)]
        file_path: PathBuf,
    },
    /// Remove metadata from an image
    Clean {
        /// The path to the image
        #[arg(required = true)]
        file_path: PathBuf,

        /// Where to write the cleaned image (default: <name>_clean.<ext>)
        #[arg(conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the file in-place
        #[arg(short, long)]
        in_place: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `photo.jpg` -> `photo_clean.jpg`, next to the input.
fn default_output_path(file_path: &Path) -> PathBuf {
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let new_file_name = match file_path.extension() {
        Some(ext) => format!("{}_clean.{}", stem, ext.to_string_lossy()),
        None => format!("{}_clean", stem),
    };
    file_path.with_file_name(new_file_name)
}

/// Formats a byte count with thousands separators: 1234567 -> "1,234,567".
fn group_digits(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn print_report(input: &Path, output: &Path, result: &StripResult) {
    println!("Metadata stripped successfully");
    println!("  Input:    {}", input.display());
    println!("  Output:   {}", output.display());
    println!("  Type:     {}", result.format);
    println!("  Original: {} bytes", group_digits(result.original_size));
    println!("  Cleaned:  {} bytes", group_digits(result.output_size));
    println!(
        "  Saved:    {} bytes ({:.1}%)",
        group_digits(result.bytes_saved()),
        result.percent_saved()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::View { file_path } => {
            let file_bytes = tokio::fs::read(&file_path)
                .await
                .with_context(|| format!("Failed to read file: {}", file_path.display()))?;

            let scrubber = scrubber_for_file(file_bytes)
                .with_context(|| format!("Cannot inspect {}", file_path.display()))?;
            let metadata = scrubber.view_metadata()?;

            if metadata.is_empty() {
                println!("No metadata found in {}.", file_path.display());
            } else {
                println!("Metadata for {} ({}):", file_path.display(), scrubber.format());
                for entry in metadata {
                    println!("  - {}: {} = {}", entry.category, entry.key, entry.value);
                }
            }
        }

        Commands::Clean {
            file_path,
            output,
            in_place,
        } => {
            if !tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
                bail!("Image not found: {}", file_path.display());
            }
            let file_bytes = tokio::fs::read(&file_path)
                .await
                .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
            debug!(path = %file_path.display(), bytes = file_bytes.len(), "read input");

            let scrubber = scrubber_for_file(file_bytes)
                .with_context(|| format!("Cannot strip {}", file_path.display()))?;
            let result = scrubber.scrub()?;
            for entry in &result.metadata_removed {
                info!(segment = %entry.key, detail = %entry.value, "removed {}", entry.category);
            }

            let output_path = match (output, in_place) {
                (Some(path), _) => path,
                (None, true) => file_path.clone(),
                (None, false) => default_output_path(&file_path),
            };

            tokio::fs::write(&output_path, &result.cleaned_file_bytes)
                .await
                .with_context(|| {
                    format!("Failed to write cleaned file to {}", output_path.display())
                })?;

            print_report(&file_path, &output_path, &result);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_inserts_clean_before_extension() {
        assert_eq!(
            default_output_path(Path::new("/tmp/photos/gemini_image.png")),
            PathBuf::from("/tmp/photos/gemini_image_clean.png")
        );
        assert_eq!(
            default_output_path(Path::new("shot.final.jpeg")),
            PathBuf::from("shot.final_clean.jpeg")
        );
        assert_eq!(default_output_path(Path::new("raw")), PathBuf::from("raw_clean"));
    }

    #[test]
    fn groups_digits_in_thousands() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1234567), "1,234,567");
    }

    #[test]
    fn output_and_in_place_conflict() {
        let parsed = Cli::try_parse_from(["metastrip", "clean", "a.jpg", "b.jpg", "--in-place"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["metastrip", "-vv", "clean", "a.jpg"]).unwrap();
        assert_eq!(parsed.verbose, 2);
        match parsed.command {
            Commands::Clean { output, in_place, .. } => {
                assert!(output.is_none());
                assert!(!in_place);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
