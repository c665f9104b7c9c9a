//! yamp command-line tool for checking, dumping and transcoding YAML streams.
//!
//! Usage: yamp [OPTIONS] [FILE|DIR]
//!
//! Input is read from the file, or stdin when no file is given, and fed to
//! the streaming parser in chunks. When a directory is given, every `.yaml`
//! and `.yml` file in it is processed in turn. The exit status is 1 if any
//! document had an error.

use clap::{Parser, ValueEnum};
use libyamp::cst::{token_type, CstNode};
use libyamp::{
    parse_cst, stringify_all, Document, Lexer, ParseOptions, SchemaName, StreamParser, StringifyOptions,
    Version,
};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

mod logging;
mod transcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// Documents re-emitted as YAML
    Yaml,
    /// One JSON value per document
    Json,
    /// Debug dump of the concrete syntax tree
    Cst,
    /// Lexemes, one per line
    Tokens,
}

#[derive(Debug, Parser)]
#[command(name = "yamp", version, about = "Check, dump and transcode YAML streams")]
struct Args {
    /// Input file or directory (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Yaml)]
    to: Output,

    /// Only report problems; print "ok" for valid input
    #[arg(long)]
    check: bool,

    /// Bytes handed to the parser at a time (0 for all at once)
    #[arg(long, default_value_t = 64 * 1024)]
    chunk_size: usize,

    /// Schema for all documents [failsafe, json, core, yaml-1.1]
    #[arg(long)]
    schema: Option<SchemaName>,

    /// Version assumed for documents without a %YAML directive
    #[arg(long, default_value = "1.2")]
    yaml_version: Version,

    /// Treat unresolved tags as errors rather than warnings
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    strict: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "libyamp=trace" [env: YAMP_LOG]
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn parse_options(&self, filename: Option<String>) -> ParseOptions {
        let mut options = ParseOptions::default()
            .with_version(self.yaml_version)
            .with_strict(self.strict);
        if let Some(schema) = self.schema {
            options = options.with_schema(schema);
        }
        if let Some(filename) = filename {
            options = options.with_filename(filename);
        }
        options
    }
}

fn main() {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref());

    if let Some(path) = args.input.as_deref().filter(|p| p.is_dir()) {
        if args.output.is_some() {
            eprintln!("Error: --output cannot be used with directory input");
            process::exit(1);
        }
        process::exit(process_directory(path, &args));
    }

    let input = match read_input(args.input.as_deref()) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    process::exit(process_input(&input, args.input.as_deref(), &args));
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    let bytes = match path {
        Some(path) => fs::read(path).map_err(|e| format!("reading {}: {}", path.display(), e))?,
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .map_err(|e| format!("reading stdin: {}", e))?;
            buffer
        }
    };
    String::from_utf8(bytes).map_err(|e| format!("input is not valid UTF-8: {}", e))
}

fn process_directory(dir: &Path, args: &Args) -> i32 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error reading directory {}: {}", dir.display(), e);
            return 1;
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")))
        .collect();
    paths.sort();

    let mut exit_code = 0;
    for path in &paths {
        let code = match read_input(Some(path)) {
            Ok(input) => process_input(&input, Some(path), args),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
        exit_code = exit_code.max(code);
    }
    exit_code
}

fn process_input(input: &str, path: Option<&Path>, args: &Args) -> i32 {
    match args.to {
        Output::Tokens if !args.check => return write_output(&dump_tokens(input), args),
        Output::Cst if !args.check => return write_output(&dump_cst(&parse_cst(input)), args),
        _ => {}
    }

    let filename = path.map(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| p.display().to_string())
    });
    let docs = parse_chunked(input, args.chunk_size, args.parse_options(filename));
    let failed = report_problems(&docs, path);
    tracing::info!(documents = docs.len(), failed, "parsed input");

    if args.check {
        if failed {
            return 1;
        }
        match path {
            Some(path) => println!("{}: ok", path.display()),
            None => println!("ok"),
        }
        return 0;
    }

    let output = match args.to {
        Output::Json => match to_json(&docs) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("Error: Cannot convert to JSON: {}", e);
                return 1;
            }
        },
        _ => stringify_all(&docs, &StringifyOptions::default()),
    };
    let code = write_output(&output, args);
    if failed {
        1
    } else {
        code
    }
}

/// Feed `input` to a stream parser `chunk_size` bytes at a time, splitting
/// only on character boundaries.
fn parse_chunked(input: &str, chunk_size: usize, options: ParseOptions) -> Vec<Document> {
    let mut stream = StreamParser::new(options);
    let mut docs = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let mut end = if chunk_size == 0 { rest.len() } else { chunk_size.min(rest.len()) };
        while !rest.is_char_boundary(end) {
            end += 1;
        }
        let (chunk, tail) = rest.split_at(end);
        docs.extend(stream.feed(chunk));
        rest = tail;
    }
    docs.extend(stream.finish());
    docs
}

/// Print errors and warnings to stderr. Returns whether there were errors.
fn report_problems(docs: &[Document], path: Option<&Path>) -> bool {
    let prefix = path.map(|p| format!("{}: ", p.display())).unwrap_or_default();
    let mut failed = false;
    for doc in docs {
        for warning in &doc.warnings {
            eprintln!("{}warning: {} [{}]", prefix, warning, warning.code);
        }
        for error in &doc.errors {
            eprintln!("{}error: {} [{}]", prefix, error, error.code);
            failed = true;
        }
    }
    failed
}

fn to_json(docs: &[Document]) -> Result<String, String> {
    let mut out = String::new();
    for doc in docs {
        let value = doc.to_value().map_err(|e| e.to_string())?;
        out.push_str(&transcode::json::encode(&value)?);
        out.push('\n');
    }
    Ok(out)
}

fn dump_tokens(input: &str) -> String {
    Lexer::lex_all(input)
        .iter()
        .map(|lexeme| {
            let kind = token_type(lexeme).map_or("text", |t| t.as_str());
            format!("{:<16} {:?}\n", kind, lexeme)
        })
        .collect()
}

fn dump_cst(nodes: &[CstNode]) -> String {
    nodes.iter().map(|node| format!("{:#?}\n", node)).collect()
}

fn write_output(output: &str, args: &Args) -> i32 {
    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, output) {
                eprintln!("Error writing {}: {}", path.display(), e);
                return 1;
            }
        }
        None => {
            print!("{}", output);
            if !output.is_empty() && !output.ends_with('\n') {
                println!();
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sizes_agree() {
        let input = "a: [1, 2]\nb: |\n  text é\n---\n- &x y\n- *x\n";
        let whole = parse_chunked(input, 0, ParseOptions::default());
        for size in [1, 2, 3, 7] {
            let docs = parse_chunked(input, size, ParseOptions::default());
            assert_eq!(docs.len(), whole.len());
            for (a, b) in docs.iter().zip(&whole) {
                assert_eq!(a.to_value().unwrap(), b.to_value().unwrap());
            }
        }
    }

    #[test]
    fn test_report_problems() {
        let docs = parse_chunked("a: 1\na: 2\n", 0, ParseOptions::default());
        assert!(report_problems(&docs, None));
        let docs = parse_chunked("a: 1\n", 0, ParseOptions::default());
        assert!(!report_problems(&docs, None));
    }

    #[test]
    fn test_json_per_document() {
        let docs = parse_chunked("a: 1\n---\n[x]\n", 0, ParseOptions::default());
        let json = to_json(&docs).unwrap();
        assert_eq!(json, "{\n  \"a\": 1\n}\n[\n  \"x\"\n]\n");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["yamp", "--to", "json", "--schema", "yaml-1.1", "--strict", "false"]);
        assert_eq!(args.to, Output::Json);
        let options = args.parse_options(None);
        assert_eq!(options.schema, Some(SchemaName::Yaml11));
        assert!(!options.strict);
    }
}
