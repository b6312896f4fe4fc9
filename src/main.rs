//! nitf-io - inspect and extract from NITF files.
//!
//! This binary wires the library to a small CLI: metadata dumps,
//! structure checks, and raw sub-window extraction.

use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nitf_io::{
    config::{CheckConfig, Cli, Command, DumpConfig, ExtractConfig},
    Extensions, Field, FieldKind, MaxDownSample, PixelSkip, Reader, Record, SubWindow, Tre,
    TreRegistry,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Dump(config) => run_dump(config),
        Command::Extract(config) => run_extract(config),
        Command::Check(config) => run_check(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "nitf_io=debug" } else { "nitf_io=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load TRE handlers from an explicit plugin directory.
fn load_plugins(path: Option<&Path>) -> bool {
    let Some(path) = path else {
        return true;
    };
    let registry = TreRegistry::global();
    let mut guard = match registry.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.load_dir(path) {
        Ok(count) => {
            info!("loaded {} TRE handler(s) from {}", count, path.display());
            true
        }
        Err(err) => {
            error!("could not load TRE handlers from {}: {}", path.display(), err);
            false
        }
    }
}

fn open_and_parse(path: &Path) -> Option<(Reader, Record)> {
    match nitf_io::read(path) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            error!("{}: {}", path.display(), err);
            None
        }
    }
}

// =============================================================================
// Dump Command
// =============================================================================

fn run_dump(config: DumpConfig) -> ExitCode {
    init_logging(config.verbose);
    if !load_plugins(config.plugin_path.as_deref()) {
        return ExitCode::FAILURE;
    }
    let Some((_, record)) = open_and_parse(&config.file) else {
        return ExitCode::FAILURE;
    };

    println!("--- FileHeader ({}) ---", record.version());
    print_fields(&record.header.field_names());
    dump_extensions("UDHD", &record.header.user_defined, config.no_tres);
    dump_extensions("XHD", &record.header.extended, config.no_tres);

    for (index, segment) in record.images().iter().enumerate() {
        println!("--- Image [{}] ---", index + 1);
        print_fields(&segment.subheader.field_names());
        dump_extensions("UDID", &segment.subheader.user_defined, config.no_tres);
        dump_extensions("IXSHD", &segment.subheader.extended, config.no_tres);
    }
    for (index, segment) in record.graphics().iter().enumerate() {
        println!("--- Graphic [{}] ---", index + 1);
        print_fields(&segment.subheader.field_names());
        dump_extensions("SXSHD", &segment.subheader.extended, config.no_tres);
    }
    for (index, segment) in record.labels().iter().enumerate() {
        println!("--- Label [{}] ---", index + 1);
        print_fields(&segment.subheader.field_names());
        dump_extensions("LXSHD", &segment.subheader.extended, config.no_tres);
    }
    for (index, segment) in record.texts().iter().enumerate() {
        println!("--- Text [{}] ---", index + 1);
        print_fields(&segment.subheader.field_names());
        dump_extensions("TXSHD", &segment.subheader.extended, config.no_tres);
    }
    for (index, segment) in record.data_extensions().iter().enumerate() {
        println!("--- DES [{}] ---", index + 1);
        print_fields(&segment.subheader.field_names());
        if let Some(ref fields) = segment.subheader.subheader_fields {
            dump_tre(fields, "DESSHF", config.no_tres);
        }
    }
    for (index, segment) in record.reserved_extensions().iter().enumerate() {
        println!("--- RES [{}] ---", index + 1);
        print_fields(&segment.subheader.field_names());
    }

    ExitCode::SUCCESS
}

fn print_fields(fields: &[(String, &Field)]) {
    for (name, field) in fields {
        let value = match field.kind() {
            FieldKind::Binary => format!("0x{}", hex::encode(field.bytes())),
            _ => format!("'{}'", field.as_str()),
        };
        println!("{}({}) = {}", name, field.len(), value);
    }
}

fn dump_extensions(section: &str, extensions: &Extensions, no_tres: bool) {
    for tre in extensions {
        println!(
            "--- {} TRE [{}] - ({}) ---",
            section,
            tre.tag(),
            tre.current_size()
        );
        dump_tre(tre, section, no_tres);
    }
}

fn dump_tre(tre: &Tre, _section: &str, no_tres: bool) {
    if no_tres {
        return;
    }
    for (name, field) in tre.iter() {
        let value = match field.kind() {
            FieldKind::Binary => format!("0x{}", hex::encode(field.bytes())),
            _ => format!("'{}'", field.as_str()),
        };
        println!("{}({}) = {}", name, field.len(), value);
    }
}

// =============================================================================
// Extract Command
// =============================================================================

fn run_extract(config: ExtractConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(message) = config.validate() {
        error!("Configuration error: {}", message);
        return ExitCode::FAILURE;
    }
    if !load_plugins(config.plugin_path.as_deref()) {
        return ExitCode::FAILURE;
    }
    let Some((reader, record)) = open_and_parse(&config.file) else {
        return ExitCode::FAILURE;
    };

    let Some(segment) = record.images().get(config.image) else {
        error!(
            "image {} out of range ({} image segments)",
            config.image,
            record.images().len()
        );
        return ExitCode::FAILURE;
    };
    let subheader = &segment.subheader;
    let total_rows = subheader.num_rows.as_u64().unwrap_or(0) as u32;
    let total_cols = subheader.num_cols.as_u64().unwrap_or(0) as u32;

    let window = SubWindow::new(
        config.start_row,
        config.start_col,
        config
            .num_rows
            .unwrap_or(total_rows.saturating_sub(config.start_row)),
        config
            .num_cols
            .unwrap_or(total_cols.saturating_sub(config.start_col)),
        config
            .bands
            .clone()
            .unwrap_or_else(|| (0..subheader.band_count() as u32).collect()),
    );

    let mut image = match reader.image_reader(config.image) {
        Ok(image) => image,
        Err(err) => {
            error!("image {}: {}", config.image, err);
            return ExitCode::FAILURE;
        }
    };

    let skip = PixelSkip::new(config.row_skip, config.col_skip);
    let max = MaxDownSample::new(config.row_skip, config.col_skip);
    let downsampler: Option<&dyn nitf_io::DownSample> =
        if config.row_skip > 1 || config.col_skip > 1 {
            if config.max {
                Some(&max)
            } else {
                Some(&skip)
            }
        } else {
            None
        };

    let bands = match image.read(&window, downsampler) {
        Ok(bands) => bands,
        Err(err) => {
            error!("read failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut out = match std::fs::File::create(&config.output) {
        Ok(file) => file,
        Err(err) => {
            error!("{}: {}", config.output.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let mut total = 0usize;
    for band in &bands {
        if let Err(err) = out.write_all(band) {
            error!("{}: {}", config.output.display(), err);
            return ExitCode::FAILURE;
        }
        total += band.len();
    }

    let (out_rows, out_cols) = window.output_dims(downsampler);
    info!(
        "wrote {} band(s), {}x{}, {} bytes to {}",
        bands.len(),
        out_rows,
        out_cols,
        total,
        config.output.display()
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("NITF Structure Check");
    println!("════════════════════");
    println!();

    if !load_plugins(config.plugin_path.as_deref()) {
        return ExitCode::FAILURE;
    }

    let version = match Reader::version_of(&config.file) {
        Ok(version) => {
            println!("✓ Version: {}", version);
            version
        }
        Err(err) => {
            println!("✗ Version: {}", err);
            return ExitCode::FAILURE;
        }
    };

    print!("Parsing... ");
    let (reader, record) = match nitf_io::read(&config.file) {
        Ok(parsed) => {
            println!("✓ success");
            parsed
        }
        Err(err) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("Segments:");
    println!("  {} image(s)", record.images().len());
    println!("  {} graphic(s)", record.graphics().len());
    if version.supports_labels() {
        println!("  {} label(s)", record.labels().len());
    }
    println!("  {} text(s)", record.texts().len());
    println!("  {} data extension(s)", record.data_extensions().len());
    println!("  {} reserved extension(s)", record.reserved_extensions().len());

    // Confirm every image segment's layout is readable
    for index in 0..record.images().len() {
        print!("Image {} layout... ", index);
        match reader.image_reader(index) {
            Ok(_) => println!("✓ ok"),
            Err(err) => {
                println!("✗ {}", err);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("════════════════════");
    println!("✓ All checks passed!");
    ExitCode::SUCCESS
}
