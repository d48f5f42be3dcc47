//! Main entry point for the fulpack CLI app

use fulpack::cli::{self, Commands};
use fulpack::options::{CreateOptions, ExtractOptions, ScanOptions, VerifyOptions};
use fulpack::{create, extract, formats::Format, info, scan, verify};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run_app().await {
        Ok(ok) if ok => std::process::ExitCode::SUCCESS,
        Ok(_) => std::process::ExitCode::FAILURE,
        Err(e) => {
            if e.downcast_ref::<clap::Error>().is_none() {
                eprintln!("Error: {}", e);
            }
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<bool, Box<dyn std::error::Error>> {
    let command = cli::run()?;

    match command {
        Commands::Create {
            inputs,
            output,
            format,
            level,
            checksum,
            follow_symlinks,
            include_patterns,
            exclude_patterns,
        } => {
            let format = match format {
                Some(f) => f,
                None => Format::from_path(&output)
                    .ok_or("cannot derive a format from the output suffix; pass --format")?,
            };
            let options = CreateOptions {
                compression_level: level,
                checksum_algorithm: Some(checksum),
                follow_symlinks,
                include_patterns,
                exclude_patterns,
                ..Default::default()
            };
            let archive_info = create(&inputs, &output, format, options).await?;
            println!(
                "Created {} ({} entries, {} bytes, ratio {:.2})",
                output.display(),
                archive_info.entry_count,
                archive_info.compressed_size,
                archive_info.compression_ratio
            );
            Ok(true)
        }
        Commands::Extract {
            archive,
            output,
            overwrite,
            max_size,
            max_entries,
            no_verify_checksums,
            include_patterns,
        } => {
            let destination = match output {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            let options = ExtractOptions {
                overwrite,
                max_size,
                max_entries,
                verify_checksums: !no_verify_checksums,
                include_patterns,
                ..Default::default()
            };
            let result = extract(&archive, &destination, options).await?;
            println!(
                "Extracted {} entries ({} skipped, {} errors)",
                result.extracted_count, result.skipped_count, result.error_count
            );
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            for err in &result.errors {
                eprintln!("error: {err}");
            }
            Ok(result.error_count == 0)
        }
        Commands::List { archive, json } => {
            let entries = scan(&archive, ScanOptions::default()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("Archive contents ({} entries):", entries.len());
                for entry in &entries {
                    println!("- {} ({} bytes)", entry.path, entry.size);
                }
            }
            Ok(true)
        }
        Commands::Verify { archive, json } => {
            let report = verify(&archive, VerifyOptions::default()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {} entries, {} checksums verified",
                    if report.valid { "VALID" } else { "INVALID" },
                    report.entry_count,
                    report.checksums_verified
                );
                for warning in &report.warnings {
                    println!("warning: {warning}");
                }
                for err in &report.errors {
                    println!("error: {err}");
                }
            }
            Ok(report.valid)
        }
        Commands::Info { archive, json } => {
            let archive_info = info(&archive).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&archive_info)?);
            } else {
                println!("Format: {}", archive_info.format);
                println!("Entries: {}", archive_info.entry_count);
                println!("Total size: {} bytes", archive_info.total_size);
                println!("Archive size: {} bytes", archive_info.compressed_size);
                println!("Compression ratio: {:.2}", archive_info.compression_ratio);
                println!("Checksums: {}", archive_info.has_checksums);
            }
            Ok(true)
        }
    }
}
