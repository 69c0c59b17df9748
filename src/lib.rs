pub mod ast;
pub mod blocks;
pub mod cli;
pub mod codegen;
pub mod description;
pub mod lexer;
pub mod nsd;
pub mod parser;
pub mod program;
pub mod registry;
pub mod semantic;
pub mod structorizer;
pub mod types;
pub mod variables;
pub mod wire;

use anyhow::{bail, Context, Result};
use codegen::{CodegenOptions, EmittedProgram};
use nsd::{Diagram, NsdParser};
use program::ProgramUnit;
use std::path::{Path, PathBuf};

pub fn run_cli(args: &cli::Args) -> Result<()> {
    let progress = CliProgress::new("Convert", 4);

    progress.emit(1, "Resolving input paths");
    let inputs = args
        .inputs
        .iter()
        .map(|input| canonicalize_file(input))
        .collect::<Result<Vec<_>>>()?;

    progress.emit(2, "Reading and parsing diagrams");
    let units = load_units(&inputs)?;

    progress.emit(3, "Emitting blocks");
    let unit_progress = CliProgress::new("Emit", units.len());
    let mut unit_cb = |step: usize, _total: usize, label: &str| unit_progress.emit(step, label);
    let options = CodegenOptions {
        globals: args.globals.clone(),
    };
    let program = codegen::emit_program_with_progress(&units, &options, Some(&mut unit_cb))?;

    match &args.output {
        Some(output) => {
            progress.emit(4, "Writing project JSON");
            codegen::write_project_json(&program, output, args.compact)?;
        }
        None => {
            progress.emit(4, "Printing project JSON");
            println!("{}", codegen::render_project_json(&program, args.compact)?);
        }
    }
    Ok(())
}

/// Parses every diagram into a unit, stopping at the first failure.
pub fn parse_diagrams(diagrams: &[Diagram]) -> Result<Vec<ProgramUnit>> {
    diagrams
        .iter()
        .map(|diagram| {
            NsdParser::new(diagram)
                .parse()
                .with_context(|| format!("Invalid diagram '{}'.", diagram.label.trim()))
        })
        .collect()
}

pub fn convert_diagrams(diagrams: &[Diagram], options: &CodegenOptions) -> Result<EmittedProgram> {
    let units = parse_diagrams(diagrams)?;
    codegen::emit_program(&units, options)
}

pub fn convert_files(paths: &[PathBuf], options: &CodegenOptions) -> Result<EmittedProgram> {
    let units = load_units(paths)?;
    codegen::emit_program(&units, options)
}

/// Reads and parses every file, reporting all failing files together.
pub fn load_units(paths: &[PathBuf]) -> Result<Vec<ProgramUnit>> {
    let mut units = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        let parsed = structorizer::read_nsd_file(path).and_then(|diagram| {
            NsdParser::new(&diagram)
                .parse()
                .with_context(|| format!("Invalid diagram '{}'.", diagram.label.trim()))
        });
        match parsed {
            Ok(unit) => units.push(unit),
            Err(e) => failures.push(format!("{}: {:#}", pretty_path(path), e)),
        }
    }
    if !failures.is_empty() {
        bail!(
            "{} of {} diagram file(s) failed:\n{}",
            failures.len(),
            paths.len(),
            failures.join("\n")
        );
    }
    Ok(units)
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

fn pretty_path(path: &Path) -> String {
    let raw = path.display().to_string();
    if let Some(stripped) = raw.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        raw
    }
}

struct CliProgress {
    prefix: &'static str,
    total: usize,
}

impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
