// main.rs - CLI entry point

use std::path::Path;
use std::time::Instant;

use genotyper::cli::Config;
use genotyper::core::BatchReport;
use genotyper::prelude::*;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run_main() -> Result<(), String> {
    let mut args: Args = argh::from_env();
    let command_line = std::env::args().collect::<Vec<String>>().join(" ");

    // Handle generate config first
    if args.generate_config {
        println!("{}", Config::generate_sample());
        println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
        return Ok(());
    }

    init_logging(args.quiet);

    // Load configuration file if specified
    let mut analysis = AnalysisConfig::default();
    if let Some(config_path) = args.config.clone() {
        let (merged, config) = args.with_config_file(&config_path)?;
        args = merged;
        analysis = config.analysis_config();
    }
    analysis.validate()?;

    let validation = validate_args(&args)?;
    let show_progress = !args.no_progress && !args.quiet;

    if !args.quiet {
        println!("🚀 {}", genotyper::get_info());
        println!(
            "🧬 Kit: {} loci, ladder {} ({} fragments)",
            analysis.markers.len(),
            analysis.ladder.name,
            analysis.ladder.len()
        );
    }

    // Configure thread pool
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        if !args.quiet {
            println!("🧵 Threads: {}", n);
        }
    } else if !args.quiet {
        println!("🧵 Threads: {} (auto-detected)", rayon::current_num_threads());
    }

    if args.dry_run {
        println!("✅ Dry run completed successfully");
        println!("📂 {} input file(s) ready for analysis", args.files.len());
        return Ok(());
    }

    let total_start = Instant::now();

    // Read inputs; an unreadable file is reported and skipped
    let mut inputs = Vec::with_capacity(args.files.len());
    for file in &args.files {
        match BatchInput::from_path(Path::new(file)) {
            Ok(input) => inputs.push(input),
            Err(e) => eprintln!("❌ {}", e),
        }
    }

    if !args.quiet {
        println!("\n🔬 Analysing {} file(s)...", inputs.len());
    }
    // Panics inside a file's analysis come back as failed results; keep the
    // default hook's message out of the batch output
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|info| log::debug!("absorbed panic: {}", info)));
    let analyzer = Analyzer::new(analysis.clone());
    let report = analyze_batch(&analyzer, &inputs, show_progress);
    std::panic::set_hook(default_hook);
    print_report(&report, args.quiet);

    if let Some(json_path) = &args.json {
        write_json(json_path, &report.results)?;
    }

    if report.succeeded == 0 {
        return Err("No file could be analysed".to_string());
    }

    // Genotype table over the kit's loci
    let profiles: Vec<GenotypeProfile> = report
        .successes()
        .map(GenotypeProfile::from_result)
        .collect();
    let mut matrix = GenotypeMatrix::from_profiles(profiles, &analysis.markers.loci_names());

    matrix.apply_sample_filtering(
        validation.sample_include_regex.as_ref(),
        validation.sample_exclude_regex.as_ref(),
    )?;
    matrix.apply_quality_filters(
        args.sample_threshold,
        args.locus_threshold,
        validation.loci_include_regex.as_ref(),
        validation.loci_exclude_regex.as_ref(),
    )?;

    if !args.quiet {
        matrix.print_matrix_statistics("after filtering");
    }

    if let Some(output) = &args.output {
        write_genotypes(output, &args.format, &matrix, &command_line)?;
    }

    if let Some(distances_path) = &args.distances {
        if !args.quiet {
            println!(
                "\n🎯 Distance mode: {:?}, minimum shared loci: {}",
                validation.distance_mode, args.min_loci
            );
        }
        let distances = calculate_distance_matrix(
            &matrix.samples,
            &matrix.loci_names,
            validation.distance_mode,
            args.min_loci,
            show_progress,
        );
        write_matrix(
            distances_path,
            &args.distance_format,
            &matrix.samples,
            &distances,
            &command_line,
        )?;
    }

    println!(
        "\n🎉 Done: {} succeeded, {} failed in {:.2}s",
        report.succeeded,
        report.failed + (args.files.len() - inputs.len()),
        total_start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn print_report(report: &BatchReport, quiet: bool) {
    for result in &report.results {
        if !result.success {
            eprintln!(
                "❌ {}: {}",
                result.filename,
                result.error.as_deref().unwrap_or("unknown error")
            );
            continue;
        }
        if quiet {
            continue;
        }

        let (score, status) = result
            .quality
            .as_ref()
            .map(|q| (q.score, q.status.as_str()))
            .unwrap_or((0.0, "n/a"));
        let r_squared = result.calibration.as_ref().map(|c| c.r_squared).unwrap_or(0.0);
        let icon = match result.quality.as_ref().map(|q| q.status) {
            Some(QualityStatus::Good) => "🟢",
            Some(QualityStatus::Warning) => "🟡",
            _ => "🔴",
        };
        println!(
            "{} {} [{}]: {} peaks, {} loci called, R² {:.4}, quality {:.0} ({})",
            icon,
            result.filename,
            result.sample_name(),
            result.total_peaks(),
            result.alleles.len(),
            r_squared,
            score,
            status
        );
        for warning in &result.warnings {
            println!("   ⚠️  {}", warning);
        }
        if let Some(quality) = &result.quality {
            for issue in &quality.issues {
                println!("   • {}", issue);
            }
        }
    }
    println!(
        "📊 Batch: {} succeeded, {} failed ({:.2}s)",
        report.succeeded, report.failed, report.elapsed_secs
    );
}
