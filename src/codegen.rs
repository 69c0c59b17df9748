use crate::blocks::{Block, FunctionBlock};
use crate::program::{ProgramUnit, UnitKind};
use crate::registry::{builtins, BlockRegistry};
use crate::semantic::{analyze_unit, collect_globals};
use crate::variables::FrameArena;
use crate::wire::Wire;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

type CodegenProgressCallback<'a> = dyn FnMut(usize, usize, &str) + 'a;

#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// Stage variables to declare even if no diagram assigns them.
    pub globals: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EmittedUnit {
    pub kind: UnitKind,
    pub spec: String,
    pub script: Wire,
    pub frames: FrameArena,
}

#[derive(Debug, Clone)]
pub struct EmittedProgram {
    pub globals: Vec<String>,
    pub units: Vec<EmittedUnit>,
}

pub fn emit_program(units: &[ProgramUnit], options: &CodegenOptions) -> Result<EmittedProgram> {
    emit_program_with_progress(units, options, Option::<&mut fn(usize, usize, &str)>::None)
}

pub fn emit_program_with_progress<F>(
    units: &[ProgramUnit],
    options: &CodegenOptions,
    progress: Option<&mut F>,
) -> Result<EmittedProgram>
where
    F: FnMut(usize, usize, &str),
{
    let mut progress = progress.map(|cb| cb as &mut CodegenProgressCallback<'_>);
    let registry = custom_block_registry(units)?;
    let globals = collect_globals(units, &options.globals);

    let total = units.len().max(1);
    let mut emitted = Vec::with_capacity(units.len());
    for (index, unit) in units.iter().enumerate() {
        let spec = unit.user_spec();
        report_progress(&mut progress, index + 1, total, &spec);
        let scope = analyze_unit(unit, &globals)
            .with_context(|| format!("Variable analysis failed for {} '{}'.", unit.kind().keyword(), spec))?;
        let script = unit
            .emit_body(&scope.variables, &registry)
            .with_context(|| format!("Cannot emit {} '{}'.", unit.kind().keyword(), spec))?;
        emitted.push(EmittedUnit {
            kind: unit.kind(),
            spec,
            script,
            frames: scope.frames,
        });
    }

    Ok(EmittedProgram {
        globals: globals.into_iter().collect(),
        units: emitted,
    })
}

/// Built-ins plus one block per custom block definition. Callers invoke a
/// custom block through its header shape; it emits its user spec.
pub fn custom_block_registry(units: &[ProgramUnit]) -> Result<BlockRegistry<'static>> {
    let mut registry = BlockRegistry::with_base(builtins());
    for unit in units.iter().filter(|unit| unit.kind() != UnitKind::Script) {
        let spec = unit.user_spec();
        let block = FunctionBlock::new(unit.description().clone(), unit.kind().return_type(), spec.clone());
        registry
            .register(Block::Function(block))
            .with_context(|| format!("Cannot define custom block '{}'.", spec))?;
    }
    Ok(registry)
}

pub fn project_json(program: &EmittedProgram) -> Value {
    let units = program
        .units
        .iter()
        .map(|unit| {
            let frames = unit
                .frames
                .frames()
                .iter()
                .map(|frame| json!(frame.names))
                .collect::<Vec<_>>();
            json!({
                "kind": unit.kind.keyword(),
                "spec": unit.spec,
                "frames": frames,
                "script": unit.script.to_json(),
            })
        })
        .collect::<Vec<_>>();
    json!({
        "globals": program.globals,
        "units": units,
    })
}

pub fn render_project_json(program: &EmittedProgram, compact: bool) -> Result<String> {
    let value = project_json(program);
    let text = if compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    Ok(text)
}

pub fn write_project_json(program: &EmittedProgram, output_path: &Path, compact: bool) -> Result<()> {
    let text = render_project_json(program, compact)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, text)
        .with_context(|| format!("Failed to write '{}'.", output_path.display()))?;
    Ok(())
}

fn report_progress(
    progress: &mut Option<&mut CodegenProgressCallback<'_>>,
    step: usize,
    total: usize,
    label: &str,
) {
    if let Some(cb) = progress.as_deref_mut() {
        cb(step, total, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nsd::{Diagram, Element, NsdParser};
    use crate::program::ConversionError;
    use crate::registry::DuplicateBlockError;
    use crate::semantic::SemanticError;

    fn unit(label: &str, lines: &[&str]) -> ProgramUnit {
        let diagram = lines
            .iter()
            .fold(Diagram::new(label), |diagram, line| diagram.with_child(Element::instruction(*line)));
        NsdParser::new(&diagram).parse().unwrap()
    }

    fn script(program: &EmittedProgram, index: usize) -> &[Wire] {
        program.units[index].script.as_array().unwrap()
    }

    fn block_read(name: &str, last: Wire) -> Wire {
        Wire::Array(vec![
            Wire::symbol("byob"),
            Wire::String(String::new()),
            Wire::symbol("readBlockVariable"),
            Wire::utf8(name),
            last,
        ])
    }

    #[test]
    fn custom_blocks_are_callable_from_scripts() {
        let units = vec![
            unit("COMMAND greet (who)", &["say (who)"]),
            unit("main", &["greet \"world\""]),
        ];
        let program = emit_program(&units, &CodegenOptions::default()).unwrap();

        assert_eq!(
            script(&program, 0)[0],
            Wire::Array(vec![
                Wire::symbol("say:"),
                block_read("who", Wire::utf8("greet %who")),
            ])
        );
        assert_eq!(
            script(&program, 1)[0],
            Wire::Array(vec![Wire::symbol("greet %who"), Wire::String("world".to_string())])
        );
    }

    #[test]
    fn reporters_report_their_result() {
        let units = vec![unit("REPORTER add (a) and (b)", &["report ((a) + (b))"])];
        let program = emit_program(&units, &CodegenOptions::default()).unwrap();
        let spec = Wire::utf8("add %a and %b");
        assert_eq!(
            script(&program, 0)[0],
            Wire::Array(vec![
                Wire::symbol("doReport"),
                Wire::Array(vec![
                    Wire::symbol("+"),
                    block_read("a", spec.clone()),
                    block_read("b", spec),
                ]),
            ])
        );
    }

    #[test]
    fn assigned_names_become_globals() {
        let units = vec![unit("main", &["set (score) to 0", "change (score) by 1"])];
        let options = CodegenOptions {
            globals: vec!["level".to_string()],
        };
        let program = emit_program(&units, &options).unwrap();
        assert_eq!(program.globals, vec!["level".to_string(), "score".to_string()]);
        assert_eq!(
            script(&program, 0)[1],
            Wire::Array(vec![
                Wire::symbol("changeVariable"),
                Wire::utf8("score"),
                Wire::symbol("changeVar:by:"),
                Wire::Integer(1),
            ])
        );
    }

    #[test]
    fn script_variables_share_the_unit_frame() {
        let units = vec![unit("main", &["script variables (i)", "set (i) to 0"])];
        let program = emit_program(&units, &CodegenOptions::default()).unwrap();
        let frame = match &script(&program, 0)[0] {
            Wire::Array(items) => items[3].clone(),
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(frame, Wire::Frame(_)));
        assert_eq!(
            script(&program, 0)[1],
            Wire::Array(vec![
                Wire::symbol("changeBlockVariable"),
                Wire::utf8("i"),
                Wire::symbol("setVar:to:"),
                frame,
                Wire::Integer(0),
            ])
        );
        assert!(program.globals.is_empty());
    }

    #[test]
    fn duplicate_definitions_fail() {
        let units = vec![
            unit("COMMAND jump (height)", &[]),
            unit("REPORTER jump (x)", &[]),
        ];
        let err = emit_program(&units, &CodegenOptions::default()).unwrap_err();
        assert!(err.downcast_ref::<DuplicateBlockError>().is_some());
    }

    #[test]
    fn unresolved_references_fail_with_context() {
        let units = vec![unit("main", &["fly away"])];
        let err = emit_program(&units, &CodegenOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConversionError>(),
            Some(ConversionError::UnresolvedReference { .. })
        ));
        assert!(err.to_string().contains("SCRIPT 'main'"));
    }

    #[test]
    fn semantic_errors_are_reported() {
        let units = vec![unit("COMMAND twice (a) (a)", &[])];
        let err = emit_program(&units, &CodegenOptions::default()).unwrap_err();
        assert!(err.downcast_ref::<SemanticError>().is_some());
    }

    #[test]
    fn reports_progress_per_unit() {
        let units = vec![unit("first", &[]), unit("second", &[])];
        let mut seen = Vec::new();
        let mut cb = |step: usize, total: usize, label: &str| seen.push((step, total, label.to_string()));
        emit_program_with_progress(&units, &CodegenOptions::default(), Some(&mut cb)).unwrap();
        assert_eq!(
            seen,
            vec![(1, 2, "first".to_string()), (2, 2, "second".to_string())]
        );
    }

    #[test]
    fn renders_project_json() {
        let diagram = Diagram::new("loop").with_child(Element::TestFirstLoop {
            label: "repeat 2".to_string(),
            body: vec![Element::instruction("say \"hi\"")],
        });
        let units = vec![
            unit("main", &["script variables (t)"]),
            NsdParser::new(&diagram).parse().unwrap(),
        ];

        let program = emit_program(&units, &CodegenOptions::default()).unwrap();
        let value = project_json(&program);
        assert_eq!(
            value,
            json!({
                "globals": [],
                "units": [
                    {
                        "kind": "SCRIPT",
                        "spec": "main",
                        "frames": [["t"]],
                        "script": [[{ "symbol": "byob" }, "", { "symbol": "doDeclareVariables" }, { "frame": 0 }]],
                    },
                    {
                        "kind": "SCRIPT",
                        "spec": "loop",
                        "frames": [],
                        "script": [[{ "symbol": "doRepeat" }, 2, [[{ "symbol": "say:" }, "hi"]]]],
                    }
                ]
            })
        );
        let compact = render_project_json(&program, true).unwrap();
        assert!(!compact.contains('\n'));
    }
}
