//! Command-line front-end: load a compiled converter module and run one
//! query through it.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ktos_host::Converter;

#[derive(Parser, Debug)]
#[command(name = "ktos-host", about = "Run a KQL query through a canonical-ABI WebAssembly converter")]
struct Arguments {
    /// Path to the compiled converter module (.wasm or .wat)
    module: PathBuf,
    /// KQL query; read from stdin when omitted
    query: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Arguments { module, query } = Arguments::parse();

    let bytes = match std::fs::read(&module) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("cannot read {}: {}", module.display(), error);
            return ExitCode::FAILURE;
        }
    };
    let mut converter = match Converter::from_bytes(&bytes) {
        Ok(converter) => converter,
        Err(error) => {
            eprintln!("cannot load {}: {}", module.display(), error);
            return ExitCode::FAILURE;
        }
    };

    let kql = match query {
        Some(kql) => kql,
        None => {
            let mut buffer = String::new();
            if let Err(error) = std::io::stdin().read_to_string(&mut buffer) {
                eprintln!("cannot read stdin: {error}");
                return ExitCode::FAILURE;
            }
            buffer
        }
    };

    match converter.convert(&kql) {
        Ok(Ok(sql)) => {
            println!("{sql}");
            ExitCode::SUCCESS
        }
        Ok(Err(diagnostics)) => {
            eprintln!("{diagnostics}");
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("conversion failed: {error}");
            ExitCode::FAILURE
        }
    }
}
