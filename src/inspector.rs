// inspector.rs - ABIF directory inspector for troubleshooting damaged or unusual runs
// Features: header dump, directory table, bounds checks, decode warnings, optional full analysis

use std::fs::File;
use std::io::Write;
use std::path::Path;

use argh::FromArgs;
use serde::Serialize;

use genotyper::abif::{decode, read_directory, read_header, AbifHeader, DirEntry};
use genotyper::analyze;

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(FromArgs)]
/// Inspect the ABIF header and directory of an .fsa/.ab1 file
struct Args {
    /// path to the .fsa/.ab1 file
    #[argh(positional)]
    file: String,

    /// only list tags whose name starts with this prefix (e.g. DATA)
    #[argh(option)]
    tag: Option<String>,

    /// print header and directory as JSON instead of a table
    #[argh(switch)]
    json: bool,

    /// export the directory table to a TSV file
    #[argh(option)]
    export_summary: Option<String>,

    /// also run the full analysis and print its summary
    #[argh(switch)]
    analyze: bool,

    /// quiet mode - minimal output
    #[argh(switch)]
    quiet: bool,
}

// ============================================================================
// DIRECTORY ROWS
// ============================================================================

#[derive(Debug, Serialize)]
struct EntryRow {
    tag: String,
    number: i32,
    element_type: String,
    element_size: i16,
    num_elements: i32,
    data_size: i32,
    data_offset: i32,
    inline: bool,
    in_bounds: bool,
}

impl EntryRow {
    fn from_entry(entry: &DirEntry, bytes: &[u8]) -> Self {
        Self {
            tag: entry.name.clone(),
            number: entry.number,
            element_type: entry.kind().name(),
            element_size: entry.element_size,
            num_elements: entry.num_elements,
            data_size: entry.data_size,
            data_offset: entry.data_offset,
            inline: entry.is_inline(),
            in_bounds: entry.in_bounds(bytes),
        }
    }
}

#[derive(Debug, Serialize)]
struct Inspection {
    file: String,
    file_size: usize,
    header: AbifHeader,
    entries: Vec<EntryRow>,
    warnings: Vec<String>,
}

fn inspect(path: &Path, tag_prefix: Option<&str>) -> Result<Inspection, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let header = read_header(&bytes).map_err(|e| e.to_string())?;
    let (entries, truncation) = read_directory(&bytes, &header);

    let mut warnings: Vec<String> = truncation.iter().map(ToString::to_string).collect();
    match decode(&bytes) {
        Ok(decoded) => warnings.extend(decoded.warnings.iter().map(ToString::to_string)),
        Err(e) => warnings.push(format!("decode failed: {}", e)),
    }
    warnings.dedup();

    let entries = entries
        .iter()
        .filter(|e| tag_prefix.map_or(true, |prefix| e.name.starts_with(prefix)))
        .map(|e| EntryRow::from_entry(e, &bytes))
        .collect();

    Ok(Inspection {
        file: path.display().to_string(),
        file_size: bytes.len(),
        header,
        entries,
        warnings,
    })
}

// ============================================================================
// REPORTING
// ============================================================================

fn print_table(inspection: &Inspection, quiet: bool) {
    if !quiet {
        println!("\n=== ABIF HEADER ===");
        println!("File: {} ({} bytes)", inspection.file, inspection.file_size);
        println!("Version: {}", inspection.header.version);
        println!(
            "Directory: {} entries at offset {} ({} bytes)",
            inspection.header.directory_count,
            inspection.header.directory_offset,
            inspection.header.directory_size
        );
        println!("\n=== DIRECTORY ===");
    }

    println!(
        "{:<6} {:>6} {:<8} {:>5} {:>9} {:>10} {:>10} {:<7} {}",
        "Tag", "Num", "Type", "Size", "Count", "Bytes", "Offset", "Inline", "OK"
    );
    for row in &inspection.entries {
        println!(
            "{:<6} {:>6} {:<8} {:>5} {:>9} {:>10} {:>10} {:<7} {}",
            row.tag,
            row.number,
            row.element_type,
            row.element_size,
            row.num_elements,
            row.data_size,
            row.data_offset,
            if row.inline { "yes" } else { "no" },
            if row.in_bounds { "✅" } else { "❌" }
        );
    }

    if !inspection.warnings.is_empty() {
        println!("\n=== WARNINGS ===");
        for warning in &inspection.warnings {
            println!("⚠️  {}", warning);
        }
    }
}

fn export_summary(inspection: &Inspection, output_path: &str) -> Result<(), String> {
    let mut file = File::create(output_path)
        .map_err(|e| format!("Failed to create '{}': {}", output_path, e))?;

    writeln!(file, "tag\tnumber\ttype\telement_size\tnum_elements\tdata_size\tdata_offset\tinline\tin_bounds")
        .map_err(|e| format!("Write error: {}", e))?;
    for row in &inspection.entries {
        writeln!(
            file,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.tag,
            row.number,
            row.element_type,
            row.element_size,
            row.num_elements,
            row.data_size,
            row.data_offset,
            row.inline,
            row.in_bounds
        )
        .map_err(|e| format!("Write error: {}", e))?;
    }

    println!("Summary exported to: {}", output_path);
    Ok(())
}

fn print_analysis(path: &Path) -> Result<(), String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let result = analyze(&bytes, &filename);

    println!("\n=== ANALYSIS ===");
    if !result.success {
        println!("❌ {}", result.error.unwrap_or_default());
        return Ok(());
    }
    println!("Sample: {}", result.sample_name());
    println!("CRC32: {:08x}", result.checksum);
    for (channel, trace) in &result.traces {
        let peaks = result.peaks.get(channel).map_or(0, Vec::len);
        println!(
            "  Channel {} ({}): {} points, max {}, {} peaks",
            channel,
            trace.dye,
            trace.len(),
            trace.max_intensity().unwrap_or(0),
            peaks
        );
    }
    if let Some(calibration) = &result.calibration {
        println!(
            "Calibration: {:?} size = {:.5} * scan + {:.3} (R² {:.4}, max residual {:.2} bp)",
            calibration.status,
            calibration.slope,
            calibration.intercept,
            calibration.r_squared,
            calibration.max_residual
        );
    }
    for (locus, call) in &result.alleles {
        println!("  {:<10} {:<12} {:?}", locus, call.genotype(), call.confidence);
    }
    if let Some(quality) = &result.quality {
        println!("Quality: {:.0} ({})", quality.score, quality.status.as_str());
        for issue in &quality.issues {
            println!("  • {}", issue);
        }
    }
    Ok(())
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    let args: Args = argh::from_env();
    let path = Path::new(&args.file);

    let inspection = match inspect(path, args.tag.as_deref()) {
        Ok(inspection) => inspection,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&inspection) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("❌ Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print_table(&inspection, args.quiet);
    }

    if let Some(output_path) = &args.export_summary {
        if let Err(e) = export_summary(&inspection, output_path) {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }

    if args.analyze {
        if let Err(e) = print_analysis(path) {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}
