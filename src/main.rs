// binspec: compile and inspect binary format schemas

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use memmap2::Mmap;

use ksy_lang::engine::Value;
use ksy_lang::eval::Evaluator;
use ksy_lang::{parse_schema, Emitter, Resolver, RustEmitter};

#[derive(Parser)]
#[command(name = "binspec", version, about = "Binary format schema compiler and inspector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a schema against a binary input and print the annotations
    Eval {
        /// Schema file (.ksy)
        schema: PathBuf,
        /// Binary input file
        input: PathBuf,
    },
    /// Generate Rust source for a schema
    Gen {
        /// Schema file (.ksy)
        schema: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Parse an expression and print its canonical form
    DumpExpr {
        /// Expression source text
        expr: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("binspec: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Eval { schema, input } => {
            let schema_name = schema.to_string_lossy().into_owned();
            let parsed = parse_schema(fs::File::open(&schema)?)?;
            let file = fs::File::open(&input)?;
            let data = unsafe { Mmap::map(&file)? };
            let resolver = Resolver::from_fs();
            let mut evaluator = Evaluator::new(&resolver, &data);
            let annotations = evaluator.evaluate(&schema_name, &parsed)?;
            for ann in &annotations {
                println!(
                    "{:#010x}..{:#010x} {} = {}",
                    ann.range.start,
                    ann.range.end,
                    ann.path,
                    format_value(ann.value.as_ref())
                );
            }
            Ok(())
        }
        Command::Gen { schema, out_dir } => {
            let schema_name = schema.to_string_lossy().into_owned();
            let parsed = parse_schema(fs::File::open(&schema)?)?;
            let resolver = Resolver::from_fs();
            let mut emitter = RustEmitter::new(Some(&resolver));
            let artifacts = emitter.emit(&schema_name, &parsed)?;
            fs::create_dir_all(&out_dir)?;
            for artifact in artifacts {
                let path = out_dir.join(&artifact.filename);
                fs::write(&path, &artifact.body)?;
                println!("wrote {}", path.display());
            }
            Ok(())
        }
        Command::DumpExpr { expr } => {
            let parsed = ksy_lang::expr::parse_expr(&expr)?;
            println!("{}", parsed);
            Ok(())
        }
    }
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}
