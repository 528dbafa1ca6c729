//! Prints the parsed header of a kdbx database
//!
//! Primarily for investigating the kdbx format.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kdbx3-dump-header", version, about = "Print the unencrypted header of a KDBX 3 database")]
struct Args {
    /// Path to the kdbx file
    database: PathBuf,
}

fn print_optional(label: &str, value: Option<&Vec<u8>>) {
    match value {
        Some(bytes) => println!("{}: {} ({} bytes)", label, hex::encode(bytes), bytes.len()),
        None => println!("{}: <missing>", label),
    }
}

fn main() -> Result<(), kdbx3_rs::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let kdbx = kdbx3_rs::open(&args.database)?;
    let header = kdbx.header();
    println!("Version: {}.{}", kdbx.major_version(), kdbx.minor_version());
    println!("Cipher: {:?}", header.cipher);
    println!("Compression: {:?}", header.compression_type);
    match header.transform_rounds {
        Some(rounds) => println!("Transform rounds: {}", rounds.total()),
        None => println!("Transform rounds: <missing>"),
    }
    println!("Inner stream: {:?}", header.inner_stream_cipher);
    print_optional("Master Seed", header.master_seed.as_ref());
    print_optional("Transform Seed", header.transform_seed.as_ref());
    print_optional("Encryption IV", header.encryption_iv.as_ref());
    print_optional("Stream Start Bytes", header.stream_start_bytes.as_ref());
    println!(
        "Protected Stream Key: {}",
        if header.protected_stream_key.is_some() { "<present>" } else { "<missing>" }
    );
    println!("Data start: {}", header.data_start);
    println!("Other headers: {:?}", header.other_headers);
    Ok(())
}
