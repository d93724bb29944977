use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use url::Url;

use jpq::format::Format;
use jpq::output::{self, Layout, RenderOptions};
use jpq::{parser, stream, JsonPath, Match, PathError, PathEvaluationOptions};

#[derive(Parser)]
#[command(name = "jpq", version, about = "Query JSON and YAML documents with JSONPath")]
struct Cli {
    /// JSONPath expression, e.g. '$.store.book[*].author'
    path: String,

    /// Input file(s) (reads from stdin if omitted)
    files: Vec<PathBuf>,

    /// Force input format [json, yaml]
    #[arg(short = 'p', long = "input-format")]
    input_format: Option<String>,

    /// Output format [json, yaml] (default: json)
    #[arg(short, long = "output-format")]
    output_format: Option<String>,

    /// Compact output (no pretty printing)
    #[arg(short, long)]
    compact: bool,

    /// Raw string output (no quotes for string values)
    #[arg(short, long)]
    raw: bool,

    /// Print the location of each match instead of its value
    #[arg(long, conflicts_with = "with_paths")]
    paths: bool,

    /// Print {"path": ..., "value": ...} for each match
    #[arg(long = "with-paths")]
    with_paths: bool,

    /// Print locations as normalized paths ($['a'][0]) instead of JSON Pointers
    #[arg(long)]
    normalized: bool,

    /// Print the JSON Pointer equivalent of a singular path and exit
    #[arg(long)]
    pointer: bool,

    /// Stop after the first match of each document
    #[arg(long)]
    first: bool,

    /// Allow + - * / in filter expressions
    #[arg(long)]
    math: bool,

    /// Allow the `in` operator in filter expressions
    #[arg(long = "in")]
    in_operator: bool,

    /// Allow array and object literals in filter expressions
    #[arg(long = "json-constructs")]
    json_constructs: bool,

    /// Allow the path to start with '@'
    #[arg(long)]
    relative: bool,

    /// Resolve {"$ref": "file:..."} data references in matches
    #[arg(long = "data-references")]
    data_references: bool,

    /// Load evaluation options from a JSON or YAML file (camelCase keys)
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Read input as newline-delimited JSON (NDJSON/JSON Lines)
    #[arg(long)]
    jsonl: bool,

    /// Log evaluation details to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = evaluation_options(&cli)?;
    let path = JsonPath::parse_with_options(&cli.path, &options)
        .with_context(|| format!("invalid path '{}'", cli.path))?;

    if cli.pointer {
        let pointer = path.as_json_pointer()?;
        println!("{pointer}");
        return Ok(());
    }

    let out_fmt = match &cli.output_format {
        Some(f) => Format::from_str_name(f)?,
        None => Format::Json,
    };
    let render = RenderOptions {
        format: out_fmt,
        compact: cli.compact,
        raw: cli.raw,
        layout: if cli.paths {
            Layout::Paths
        } else if cli.with_paths {
            Layout::Pairs
        } else {
            Layout::Values
        },
        normalized: cli.normalized,
    };

    let mut found: Vec<Match> = Vec::new();
    let mut collect = |m: Match| -> Result<(), PathError> {
        found.push(m);
        Ok(())
    };

    for (name, input) in read_inputs(&cli.files)? {
        if cli.jsonl {
            stream::stream_ndjson(&input, &path, &options, cli.first, |_, m| collect(m))
                .with_context(|| format!("evaluating {name}"))?;
            continue;
        }
        let in_fmt = input_format(&cli, name.as_deref(), &input)?;
        let evaluated = match in_fmt {
            Format::Json => stream::stream_documents(&input, &path, &options, cli.first, &mut collect),
            Format::Yaml => {
                let value = parser::parse(&input, in_fmt)?;
                stream::evaluate_document(&value, &path, &options, cli.first, &mut collect)
            }
        };
        evaluated.with_context(|| format!("evaluating {name}"))?;
    }

    let rendered = output::render_matches(&found, &render)?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("writing output")?;
    Ok(())
}

/// Options from `--options`, with command-line flags switched on top.
fn evaluation_options(cli: &Cli) -> Result<PathEvaluationOptions> {
    let mut options = match &cli.options {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let value = match Format::from_extension(file) {
                Ok(format) => parser::parse(&text, format)?,
                Err(_) => parser::parse_sniffed(&text)?,
            };
            serde_json::from_value::<PathEvaluationOptions>(value)
                .with_context(|| format!("invalid options in {}", file.display()))?
        }
        None => PathEvaluationOptions::default(),
    };

    options.allow_math_operations |= cli.math;
    options.allow_in_operator |= cli.in_operator;
    options.allow_json_constructs |= cli.json_constructs;
    options.allow_relative_path_start |= cli.relative;
    if cli.data_references || options.experimental.process_data_references {
        options = options.with_data_references(load_reference);
    }
    Ok(options)
}

/// Download hook for data references: local files only.
fn load_reference(url: &Url) -> Result<Option<Value>, String> {
    if url.scheme() != "file" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    let path = url
        .to_file_path()
        .map_err(|_| format!("{url} is not a local file"))?;
    let text = std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    let format = Format::from_extension(&path).unwrap_or_else(|_| Format::sniff(&text));
    parser::parse(&text, format).map(Some).map_err(|e| e.to_string())
}

/// Each input with a display name; `None` as the file name means stdin.
fn read_inputs(files: &[PathBuf]) -> Result<Vec<(InputName, String)>> {
    if files.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(vec![(InputName(None), buf)]);
    }
    files
        .iter()
        .map(|path| -> Result<(InputName, String)> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok((InputName(Some(path.clone())), text))
        })
        .collect()
}

struct InputName(Option<PathBuf>);

impl InputName {
    fn as_deref(&self) -> Option<&Path> {
        self.0.as_deref()
    }
}

impl std::fmt::Display for InputName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "stdin"),
        }
    }
}

fn input_format(cli: &Cli, file: Option<&Path>, input: &str) -> Result<Format> {
    if let Some(name) = &cli.input_format {
        return Ok(Format::from_str_name(name)?);
    }
    Ok(match file {
        Some(path) => Format::from_extension(path).unwrap_or_else(|_| Format::sniff(input)),
        None => Format::sniff(input),
    })
}
