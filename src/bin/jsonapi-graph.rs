//! JSON:API Graph CLI
//!
//! Command-line interface for encoding, decoding and checking resource-graph
//! documents against a schema file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jsonapi_graph::{
    into_document, load_json, load_json_auto, load_registry, validate_document, CodecOptions,
    DecodeError, Document, DuplicatePolicy, FieldRole, Registry, ResourceSchema,
};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "jsonapi-graph")]
#[command(about = "Encode and decode JSON:API resource-graph documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode domain JSON into a document
    Encode {
        /// Domain value (or array of values) to encode
        input: PathBuf,

        /// Schema file declaring the domain types
        #[arg(long)]
        schema: PathBuf,

        /// Domain type name (omit for polymorphic input carrying a class discriminator)
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Treat the input as a list of values
        #[arg(long)]
        list: bool,

        /// Fail when two copies of an included resource differ
        #[arg(long)]
        reject_conflicts: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Decode a document back into domain JSON
    Decode {
        /// Document source: file path or URL (http:// or https://)
        source: String,

        /// Schema file declaring the domain types
        #[arg(long)]
        schema: PathBuf,

        /// Domain type name (omit to decode mixed primary data)
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Expect list primary data
        #[arg(long)]
        list: bool,

        /// Skip the structural document check
        #[arg(long)]
        no_validate: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Classify a schema file and print each type's fields
    Check {
        /// Schema file to check
        #[arg(long)]
        schema: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check a document's wire shape
    Validate {
        /// Document source: file path or URL
        source: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode {
            input,
            schema,
            type_name,
            list,
            reject_conflicts,
            output,
            pretty,
        } => run_encode(EncodeArgs {
            input,
            schema,
            type_name,
            list,
            reject_conflicts,
            output,
            pretty,
        }),

        Commands::Decode {
            source,
            schema,
            type_name,
            list,
            no_validate,
            output,
            pretty,
        } => run_decode(DecodeArgs {
            source,
            schema,
            type_name,
            list,
            validate: !no_validate,
            output,
            pretty,
        }),

        Commands::Check { schema, format } => run_check(&schema, &format),

        Commands::Validate { source, json } => run_validate(&source, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct EncodeArgs {
    input: PathBuf,
    schema: PathBuf,
    type_name: Option<String>,
    list: bool,
    reject_conflicts: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_encode(args: EncodeArgs) -> Result<(), u8> {
    let policy = if args.reject_conflicts {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::KeepFirst
    };
    let registry = open_registry(&args.schema, CodecOptions::new().duplicates(policy))?;

    let input = load_json(&args.input).map_err(|e| {
        eprintln!("Error loading input: {}", e);
        e.exit_code() as u8
    })?;

    let doc = match (&args.type_name, args.list) {
        (Some(name), false) => {
            let adapter = registry.lookup(name).ok_or_else(|| unknown_type(name))?;
            adapter.encode(&input)
        }
        (Some(name), true) => {
            let adapter = registry
                .lookup_for_collection(name)
                .ok_or_else(|| unknown_type(name))?;
            adapter.encode(as_array(&input)?)
        }
        (None, _) => registry.encode_polymorphic(as_array(&input)?),
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_json(&doc, args.output.as_deref(), args.pretty)
}

struct DecodeArgs {
    source: String,
    schema: PathBuf,
    type_name: Option<String>,
    list: bool,
    validate: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_decode(args: DecodeArgs) -> Result<(), u8> {
    let registry = open_registry(&args.schema, CodecOptions::new())?;
    let doc = read_document(&args.source, args.validate)?;

    let decoded = match (&args.type_name, args.list) {
        (Some(name), false) => {
            let adapter = registry.lookup(name).ok_or_else(|| unknown_type(name))?;
            adapter.decode(&doc)
        }
        (Some(name), true) => {
            let adapter = registry
                .lookup_for_collection(name)
                .ok_or_else(|| unknown_type(name))?;
            adapter.decode(&doc).map(Value::Array)
        }
        (None, _) => registry.decode_polymorphic(&doc).map(Value::Array),
    }
    .map_err(|e| report_decode_error(&e))?;

    if doc.has_errors() {
        eprintln!("Note: document carries {} error object(s)", doc.errors().len());
    }

    write_json(&decoded, args.output.as_deref(), args.pretty)
}

fn run_check(schema: &Path, format: &str) -> Result<(), u8> {
    let registry = open_registry(schema, CodecOptions::new())?;
    let schemas: Vec<&ResourceSchema> = registry.schemas().collect();

    if format == "json" {
        let output = serde_json::to_string_pretty(&schemas).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
        return Ok(());
    }

    for schema in &schemas {
        println!("{} ({})", schema.type_name, schema.resource_type);
        for field in &schema.fields {
            let nullable = if field.nullable { "?" } else { "" };
            let role = match &field.role {
                FieldRole::Attribute => "attribute".to_string(),
                FieldRole::ToOne(target) => format!("to-one -> {}", target),
                FieldRole::ToMany(target) => format!("to-many -> {}", target),
                FieldRole::Links(placement) => format!("links @ {}", placement),
                FieldRole::Meta(placement) => format!("meta @ {}", placement),
            };
            println!("  {}{}: {}", field.name, nullable, role);
        }
    }
    println!("{} types checked", schemas.len());
    Ok(())
}

fn run_validate(source: &str, json_output: bool) -> Result<(), u8> {
    let raw = load_json_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading document: {}", e));
        e.exit_code() as u8
    })?;

    match validate_document(&raw) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(DecodeError::Malformed { violations }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": violations
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for violation in violations {
                    eprintln!("  {}", violation);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn open_registry(path: &Path, options: CodecOptions) -> Result<Registry, u8> {
    load_registry(path, options).map_err(|e| {
        eprintln!("Error loading schema: {}", e);
        e.exit_code() as u8
    })
}

fn read_document(source: &str, validate: bool) -> Result<Document, u8> {
    let raw = load_json_auto(source).map_err(|e| {
        eprintln!("Error loading document: {}", e);
        e.exit_code() as u8
    })?;
    if validate {
        validate_document(&raw).map_err(|e| report_decode_error(&e))?;
    }
    into_document(raw).map_err(|e| report_decode_error(&e))
}

fn report_decode_error(e: &DecodeError) -> u8 {
    eprintln!("Error: {}", e);
    if let DecodeError::Malformed { violations } = e {
        for violation in violations {
            eprintln!("  {}", violation);
        }
    }
    e.exit_code() as u8
}

fn unknown_type(name: &str) -> u8 {
    eprintln!("Error: type '{}' is not declared in the schema", name);
    2
}

fn as_array(input: &Value) -> Result<&[Value], u8> {
    input.as_array().map(Vec::as_slice).ok_or_else(|| {
        eprintln!("Error: expected a JSON array of values");
        2
    })
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>, pretty: bool) -> Result<(), u8> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => std::fs::write(path, &text).map_err(|e| {
            eprintln!("Error writing to {}: {}", path.display(), e);
            3u8
        }),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}
