//! pirdb-gen: CLI tool for converting product dumps and inspecting database files.

use clap::{Parser, Subcommand};
use pirdb::binary::{scan_keys, write_keys_only, DatabaseHeader, KeysOnly};
use pirdb::converter::{ConvertOptions, StreamConverter, DEFAULT_KEY_COLUMN};
use pirdb::key::bit_width_for_keys;
use pirdb::storage::write_atomically;
use pirdb::{
    lookup, CacheConfig, ConversionMetadata, DatabaseCache, DirectRetrieval, FsStorage, Record,
    RecordReader,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pirdb-gen")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Convert product dumps to PIR database files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a tab-separated product dump to the full binary format
    Convert {
        /// Input tab-separated file (gzip accepted)
        #[arg(short, long)]
        input: PathBuf,

        /// Output binary file
        #[arg(short, long)]
        output: PathBuf,

        /// Header name of the key column
        #[arg(long, default_value = DEFAULT_KEY_COLUMN)]
        key_column: String,

        /// Stop after this many records
        #[arg(long)]
        max_records: Option<u64>,

        /// Write the conversion report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build the keys-only cache from a full binary file
    BuildKeys {
        /// Input full binary file
        #[arg(short, long)]
        input: PathBuf,

        /// Output keys-only file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the header of a database file
    Inspect {
        /// Full binary or keys-only file
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as a keys-only file
        #[arg(long)]
        keys: bool,
    },

    /// Print the record at an index of a full binary file
    Get {
        /// Input full binary file
        #[arg(short, long)]
        input: PathBuf,

        /// Record index
        #[arg(long)]
        index: u64,
    },

    /// Resolve an identifier and print its record
    Lookup {
        /// YAML cache configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Source file, when no configuration is given
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Product identifier
        identifier: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            key_column,
            max_records,
            report,
            verbose,
        } => convert_file(
            &input,
            &output,
            key_column,
            max_records,
            report.as_deref(),
            verbose,
        ),
        Commands::BuildKeys { input, output } => build_keys(&input, &output),
        Commands::Inspect { input, keys } => inspect(&input, keys),
        Commands::Get { input, index } => get_record(&input, index),
        Commands::Lookup {
            config,
            source,
            identifier,
        } => lookup_identifier(config.as_deref(), source.as_deref(), &identifier),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn convert_file(
    input: &Path,
    output: &Path,
    key_column: String,
    max_records: Option<u64>,
    report_path: Option<&Path>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if verbose {
        println!("Reading input file: {:?}", input);
    }

    let options = ConvertOptions {
        key_column: key_column.clone(),
        max_records,
    };
    let report = StreamConverter::new(options).convert(input, output)?;

    if verbose {
        for row in &report.skipped_rows {
            println!("  Skipped line {}: {}", row.line_number, row.reason);
        }
        println!(
            "Parsed {} records, skipped {}, max key {}, record size {} bits",
            report.accepted_count,
            report.skipped_count(),
            report.max_key,
            report.record_bits
        );
    }

    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }
    let metadata = ConversionMetadata::now(input, &key_column, report);
    metadata.save(ConversionMetadata::path_for(output))?;

    println!("Successfully converted {:?} -> {:?}", input, output);
    Ok(())
}

fn build_keys(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = BufReader::new(File::open(input)?);
    let (schema, keys) = scan_keys(&mut file, None)?;
    let record_bits = bit_width_for_keys(&keys);

    write_atomically(&FsStorage, output, |file| {
        let file = write_keys_only(file, &schema, record_bits, &keys)?;
        Ok(((), file))
    })?;

    println!(
        "Generated {:?}: {} keys, record size {} bits",
        output,
        keys.len(),
        record_bits
    );
    Ok(())
}

fn inspect(input: &Path, keys_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    if keys_only {
        let decoded = KeysOnly::load(&File::open(input)?, None)?;
        println!("Format:      keys-only");
        println!("Columns:     {}", decoded.schema.columns().join(", "));
        println!("Keys:        {}", decoded.keys.len());
        println!("Record bits: {}", decoded.record_bits);
    } else {
        let header = DatabaseHeader::read(&mut BufReader::new(File::open(input)?))?;
        println!("Format:      full");
        println!("Columns:     {}", header.schema.columns().join(", "));
        println!("Records:     {}", header.record_count);

        let metadata = ConversionMetadata::load(ConversionMetadata::path_for(input))?;
        if let Some(source) = metadata.source {
            println!("Source:      {:?}", source);
            println!("Skipped:     {}", metadata.report.skipped_count());
        }
    }
    Ok(())
}

fn get_record(input: &Path, index: u64) -> Result<(), Box<dyn std::error::Error>> {
    let record = RecordReader::open(input)?.read(index)?;
    print_record(&record);
    Ok(())
}

fn lookup_identifier(
    config: Option<&Path>,
    source: Option<&Path>,
    identifier: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match (config, source) {
        (Some(path), _) => CacheConfig::from_yaml_file(path)?,
        (None, Some(source)) => CacheConfig::for_source(source),
        (None, None) => CacheConfig::default(),
    };
    let cache = DatabaseCache::new(config);
    let result = lookup(&cache, &DirectRetrieval::new(), identifier)?;

    println!("Identifier:  {}", result.identifier);
    println!("Key:         {}", result.key);
    println!("Index:       {}", result.index);
    print_record(&result.output);
    Ok(())
}

fn print_record(record: &Record) {
    println!("key: {}", record.key());
    for (column, value) in record.fields() {
        println!("  {}: {}", column, value.unwrap_or(pirdb::MISSING));
    }
}
