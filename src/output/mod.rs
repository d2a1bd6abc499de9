// mod.rs - Output writers: genotype tables, distance matrices, JSON results

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::engine::AnalysisResult;
use crate::data::profile::{GenotypeMatrix, GenotypeProfile};

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(file_path).parent() {
        create_dir_all(parent)
            .map_err(|e| format!("Failed to create parent directory '{}': {}", parent.display(), e))?;
    }
    Ok(())
}

fn create_writer(file_path: &str) -> Result<BufWriter<File>, String> {
    ensure_parent_dir(file_path)?;
    let file = File::create(file_path)
        .map_err(|e| format!("Failed to create output file '{}': {}", file_path, e))?;
    Ok(BufWriter::new(file))
}

fn write_header_comments<W: Write>(writer: &mut W, prefix: &str, command_line: &str) -> Result<(), String> {
    writeln!(writer, "{} Command: {}", prefix, command_line).map_err(|e| format!("Write error: {}", e))?;
    writeln!(
        writer,
        "{} Generated: {}",
        prefix,
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
    .map_err(|e| format!("Write error: {}", e))?;
    writeln!(writer, "{} genotyper v{}", prefix, env!("CARGO_PKG_VERSION"))
        .map_err(|e| format!("Write error: {}", e))?;
    Ok(())
}

fn delimiter_for(format: &str) -> Result<u8, String> {
    match format.to_lowercase().as_str() {
        "tsv" => Ok(b'\t'),
        "csv" => Ok(b','),
        _ => Err(format!("Unsupported output format: {}. Use: tsv, csv", format)),
    }
}

/// Write the samples x loci genotype table. Untyped cells are empty.
pub fn write_genotypes(
    file_path: &str,
    format: &str,
    matrix: &GenotypeMatrix,
    command_line: &str,
) -> Result<(), String> {
    let delimiter = delimiter_for(format)?;
    let mut writer = create_writer(file_path)?;
    write_header_comments(&mut writer, "#", command_line)?;

    let mut table = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let mut header = vec!["Sample".to_string()];
    header.extend(matrix.loci_names.iter().cloned());
    table
        .write_record(&header)
        .map_err(|e| format!("Write error: {}", e))?;

    for sample in &matrix.samples {
        let mut record = Vec::with_capacity(header.len());
        record.push(sample.sample_id.clone());
        record.extend(
            matrix
                .loci_names
                .iter()
                .map(|locus| sample.get(locus).map(ToString::to_string).unwrap_or_default()),
        );
        table
            .write_record(&record)
            .map_err(|e| format!("Write error: {}", e))?;
    }

    table.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Genotype table written to: {}", file_path);
    Ok(())
}

fn distance_cell(distance: Option<usize>) -> String {
    match distance {
        Some(d) => d.to_string(),
        None => "NA".to_string(),
    }
}

/// Write distance matrix in TSV or CSV format
fn write_delimited_matrix(
    file_path: &str,
    delimiter: u8,
    samples: &[GenotypeProfile],
    matrix: &[Vec<Option<usize>>],
    command_line: &str,
) -> Result<(), String> {
    let mut writer = create_writer(file_path)?;
    write_header_comments(&mut writer, "#", command_line)?;

    let mut table = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let mut header = vec!["Sample".to_string()];
    header.extend(samples.iter().map(|s| s.sample_id.clone()));
    table
        .write_record(&header)
        .map_err(|e| format!("Write error: {}", e))?;

    for (sample, row) in samples.iter().zip(matrix) {
        let mut record = vec![sample.sample_id.clone()];
        record.extend(row.iter().map(|&d| distance_cell(d)));
        table
            .write_record(&record)
            .map_err(|e| format!("Write error: {}", e))?;
    }

    table.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Distance matrix written to: {}", file_path);
    Ok(())
}

/// Write distance matrix in PHYLIP format (lower triangle)
pub fn write_phylip(
    file_path: &str,
    samples: &[GenotypeProfile],
    matrix: &[Vec<Option<usize>>],
    command_line: &str,
) -> Result<(), String> {
    let mut writer = create_writer(file_path)?;

    writeln!(writer, "    {}", samples.len()).map_err(|e| format!("Write error: {}", e))?;
    for (i, sample) in samples.iter().enumerate() {
        write!(writer, "{:<10}", sample.sample_id).map_err(|e| format!("Write error: {}", e))?;
        for j in 0..=i {
            write!(writer, "  {}", distance_cell(matrix[i][j])).map_err(|e| format!("Write error: {}", e))?;
        }
        writeln!(writer).map_err(|e| format!("Write error: {}", e))?;
    }

    // Trailing comments, most PHYLIP readers stop after the matrix
    writeln!(writer).map_err(|e| format!("Write error: {}", e))?;
    write_header_comments(&mut writer, "#", command_line)?;

    writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Distance matrix written to: {} (PHYLIP format)", file_path);
    Ok(())
}

/// Write distance matrix in the specified format
pub fn write_matrix(
    file_path: &str,
    format: &str,
    samples: &[GenotypeProfile],
    matrix: &[Vec<Option<usize>>],
    command_line: &str,
) -> Result<(), String> {
    match format.to_lowercase().as_str() {
        "tsv" => write_delimited_matrix(file_path, b'\t', samples, matrix, command_line),
        "csv" => write_delimited_matrix(file_path, b',', samples, matrix, command_line),
        "phylip" => write_phylip(file_path, samples, matrix, command_line),
        _ => Err(format!("Unsupported output format: {}. Use: tsv, csv, phylip", format)),
    }
}

/// Write every analysis result (failed ones included) as a JSON array
pub fn write_json(file_path: &str, results: &[AnalysisResult]) -> Result<(), String> {
    let mut writer = create_writer(file_path)?;
    serde_json::to_writer_pretty(&mut writer, results)
        .map_err(|e| format!("Failed to serialize results: {}", e))?;
    writeln!(writer).map_err(|e| format!("Write error: {}", e))?;
    writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ JSON results written to: {}", file_path);
    Ok(())
}
