//! Pit contract compiler CLI
//!
//! Compiles a contract (directory tree or Markdown documents) into a
//! manifest and reports what it contains, or why it could not be built.
//!
//! Usage:
//!   pit-lang <contract_dir> [OPTIONS]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser as _;
use pit_lang::{parser_for, Diagnostic, Manifest, ParseOptions, ParseOutput, Severity, SourceFormat};
use serde_json::json;
use tracing::Level;
use tracing_subscriber::EnvFilter;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Pit contract compiler
#[derive(clap::Parser, Debug)]
#[command(name = "pit-lang")]
#[command(
    author,
    version,
    about = "Compile a pit contract into a service manifest"
)]
struct Args {
    /// Contract root directory
    #[arg(required = true)]
    path: PathBuf,

    /// Source format: files (default), markdown
    #[arg(short, long)]
    format: Option<SourceFormat>,

    /// YAML file with parse options
    #[arg(short, long, env = "PIT_CONFIG")]
    config: Option<PathBuf>,

    /// Manifest name (defaults to the contract directory name)
    #[arg(short, long)]
    name: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Print Mountebank stubs instead of the manifest (json output)
    #[arg(long)]
    stubs: bool,

    /// Strict mode - treat warnings as errors
    #[arg(short, long)]
    strict: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{RED}{BOLD}error{RESET}: {e:#}");
            std::process::exit(1);
        }
    }
}

fn load_options(args: &Args) -> anyhow::Result<ParseOptions> {
    let mut options = match &args.config {
        Some(path) => ParseOptions::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ParseOptions::default(),
    };

    if let Some(format) = args.format {
        options.format = format;
    }
    if let Some(name) = &args.name {
        options.name = Some(name.clone());
    }
    options.validate()?;
    Ok(options)
}

fn run(args: &Args) -> anyhow::Result<i32> {
    let options = load_options(args)?;
    let json_output = args.output == "json" || args.stubs;

    if !json_output {
        println!("{BOLD}{CYAN}Pit Contract Compiler{RESET}");
        println!("{DIM}{RULE}{RESET}");
        println!(
            "{DIM}Parsing:{RESET} {CYAN}{}{RESET} {DIM}({}){RESET}\n",
            args.path.display(),
            options.format
        );
    }

    let output = match parser_for(&args.path, &options).parse() {
        Ok(output) => output,
        Err(e) => {
            let diagnostic = Diagnostic::from_parse_error(&e, &args.path);
            if json_output {
                print_json(&json!({ "error": diagnostic }))?;
            } else {
                print_diagnostic(&diagnostic);
                println!("\n{RED}{BOLD}Compilation failed{RESET}");
            }
            return Ok(1);
        }
    };

    let manifest = Manifest::new(output.data.clone())?;

    if args.stubs {
        print_json(&json!({ "stubs": manifest.stubs()? }))?;
    } else if json_output {
        print_json(&json!({
            "manifest": output.data,
            "diagnostics": output.diagnostics,
        }))?;
    } else {
        print_manifest(&manifest);
        print_summary(&manifest, &output);
    }

    let failed = args.strict && output.has_warnings();
    Ok(if failed { 1 } else { 0 })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let color = severity_color(&diagnostic.severity);
    let marker = format!("{color}|{RESET}");

    let location = match diagnostic.line {
        Some(line) => format!("{}:{line}", diagnostic.file.display()),
        None => diagnostic.file.display().to_string(),
    };

    println!(
        "  {marker} {DIM}[{RESET}{CYAN}{location}{RESET}{DIM}]{RESET} {BOLD}{color}{}{RESET}: {} {DIM}({color}{}{DIM}){RESET}",
        diagnostic.severity.label(),
        diagnostic.message,
        diagnostic.code
    );

    if let Some(suggestion) = &diagnostic.suggestion {
        println!("  {marker}   {GREEN}-> {suggestion}{RESET}");
    }
}

fn print_manifest(manifest: &Manifest) {
    for resource in manifest.resources() {
        println!("{BOLD}{CYAN}{}{RESET}", resource.pattern);

        for action in resource.actions() {
            println!("  {BOLD}{}{RESET}", action.method);
            for case in &action.cases {
                let status = case.response.status_code;
                let color = if case.is_success_like() { GREEN } else { YELLOW };
                println!(
                    "    {color}{status}{RESET} '{}' {DIM}{}{RESET}",
                    case.name, case.request.path
                );
            }
        }
        println!();
    }

    let states = manifest.states();
    if !states.is_empty() {
        println!("{BOLD}States{RESET}");
        for (provider, names) in &states {
            println!("  {CYAN}{provider}{RESET}: {}", names.join(", "));
        }
        println!();
    }

    let dependencies = manifest.dependencies();
    if !dependencies.is_empty() {
        println!("{BOLD}Dependencies{RESET}");
        for id in dependencies.keys() {
            println!("  {CYAN}{id}{RESET}");
        }
        println!();
    }
}

fn print_summary(manifest: &Manifest, output: &ParseOutput) {
    for diagnostic in &output.diagnostics {
        print_diagnostic(diagnostic);
    }
    if !output.diagnostics.is_empty() {
        println!();
    }

    println!("{DIM}{RULE}{RESET}");
    println!("{BOLD}{CYAN}Summary{RESET}");
    println!("{DIM}{RULE}{RESET}");
    println!("  {DIM}Manifest:{RESET}  {BOLD}{}{RESET}", manifest.name());
    println!(
        "  {DIM}Resources:{RESET} {BOLD}{}{RESET}",
        manifest.resources().len()
    );
    println!("  {DIM}Cases:{RESET}     {BOLD}{}{RESET}", manifest.cases().count());
    println!(
        "  {DIM}Archetypes:{RESET} {BOLD}{}{RESET}",
        manifest.archetypes().len()
    );

    let warnings = output.warnings();
    if warnings > 0 {
        println!("  {YELLOW}Warnings:{RESET}  {BOLD}{YELLOW}{warnings}{RESET}");
    } else {
        println!("  {DIM}Warnings:{RESET}  {BOLD}0{RESET}");
    }

    println!();
    if warnings == 0 {
        println!("{GREEN}{BOLD}Compiled successfully!{RESET}");
    } else {
        println!("{YELLOW}{BOLD}Compiled with warnings{RESET}");
    }
}
