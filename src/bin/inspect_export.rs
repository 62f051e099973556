use anyhow::Result;
use std::path::PathBuf;

use bp_decoder::data_loading::{read_export_file, record_type_counts};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <export_xml>", args[0]);
        std::process::exit(1);
    }

    let records = read_export_file(&PathBuf::from(&args[1]))?;
    let counts = record_type_counts(&records);

    println!("\nRecord types ({} total records):", records.len());
    for (record_type, count) in &counts {
        println!("  {}: {}", record_type, count);
    }

    Ok(())
}
