use crate::blocks::{Block, MAX_SCRIPT_VARIABLES};
use crate::program::{BlockExpression, Expression, ProgramUnit};
use crate::variables::{FrameArena, FrameRef, VariableContext, VariableMap};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub message: String,
}

impl Display for SemanticError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for SemanticError {}

/// Variable layout of one unit: the frames it allocates and the map its
/// body is emitted against.
#[derive(Debug, Clone)]
pub struct UnitScope<'u> {
    pub frames: FrameArena,
    pub variables: VariableMap<'u>,
}

/// Every variable written somewhere in the program that is neither a
/// parameter nor a script variable of the writing unit, plus `declared`.
pub fn collect_globals(units: &[ProgramUnit], declared: &[String]) -> BTreeSet<String> {
    let mut globals: BTreeSet<String> = declared.iter().cloned().collect();
    for unit in units {
        let mut locals: HashSet<String> = unit.description().param_names().map(str::to_string).collect();
        visit_blocks(unit.body(), &mut |block| {
            if is_script_variables(block) {
                locals.extend(block.params().iter().filter_map(variable_name));
            }
        });
        visit_blocks(unit.body(), &mut |block| {
            if is_assignment(block) {
                if let Some(name) = block.params().first().and_then(variable_name) {
                    if !locals.contains(&name) {
                        globals.insert(name);
                    }
                }
            }
        });
    }
    globals
}

/// Builds the variable map for `unit`. Script variables shadow parameters,
/// which shadow globals. All `script variables` blocks of a unit share one
/// frame.
pub fn analyze_unit<'u>(unit: &'u ProgramUnit, globals: &BTreeSet<String>) -> Result<UnitScope<'u>, SemanticError> {
    let spec = unit.user_spec();
    let mut entries: HashMap<String, VariableContext<'u>> = globals
        .iter()
        .map(|name| (name.clone(), VariableContext::Global))
        .collect();

    let mut params = HashSet::new();
    for name in unit.description().param_names() {
        if !params.insert(name) {
            return Err(SemanticError {
                message: format!("Duplicate parameter '{}' in block '{}'.", name, spec),
            });
        }
        entries.insert(name.to_string(), VariableContext::Unit(unit));
    }

    let script_variables = declared_script_variables(unit)?;
    let mut frames = FrameArena::new();
    if !script_variables.is_empty() {
        let frame: FrameRef = frames.alloc(script_variables.clone());
        for name in script_variables {
            entries.insert(name, VariableContext::Script(frame));
        }
    }

    Ok(UnitScope {
        frames,
        variables: VariableMap::new(entries),
    })
}

fn declared_script_variables(unit: &ProgramUnit) -> Result<Vec<String>, SemanticError> {
    let mut names = Vec::new();
    let mut error = None;
    visit_blocks(unit.body(), &mut |block| {
        if error.is_some() || !is_script_variables(block) {
            return;
        }
        if block.params().len() > MAX_SCRIPT_VARIABLES {
            error = Some(format!(
                "At most {} script variables may be declared at once, got {}.",
                MAX_SCRIPT_VARIABLES,
                block.params().len()
            ));
            return;
        }
        for param in block.params() {
            match variable_name(param) {
                Some(name) if names.contains(&name) => {
                    error = Some(format!("Script variable '{}' is declared twice.", name));
                    return;
                }
                Some(name) => names.push(name),
                None => {
                    error = Some(format!("Script variable declaration expects names, got '{}'.", param));
                    return;
                }
            }
        }
    });
    match error {
        Some(message) => Err(SemanticError {
            message: format!("{} (in block '{}')", message, unit.user_spec()),
        }),
        None => Ok(names),
    }
}

fn is_assignment(block: &BlockExpression) -> bool {
    block.description() == Block::SetVariable.description() || block.description() == Block::ChangeVariable.description()
}

fn is_script_variables(block: &BlockExpression) -> bool {
    let arity = block.params().len();
    arity > 0 && block.description() == Block::script_variables(arity).description()
}

fn variable_name(expression: &Expression) -> Option<String> {
    expression.as_block().and_then(BlockExpression::variable_name)
}

/// Depth-first over every call site, including arguments and nested scripts.
fn visit_blocks<'e>(blocks: &'e [BlockExpression], visit: &mut impl FnMut(&'e BlockExpression)) {
    for block in blocks {
        visit(block);
        for param in block.params() {
            match param {
                Expression::Block(inner) => visit_blocks(std::slice::from_ref(inner), visit),
                Expression::Script(script) => visit_blocks(script.blocks(), visit),
                Expression::Number { .. } | Expression::String { .. } => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nsd::{Diagram, Element, NsdParser};

    fn unit(label: &str, lines: &[&str]) -> ProgramUnit {
        let diagram = lines
            .iter()
            .fold(Diagram::new(label), |diagram, line| diagram.with_child(Element::instruction(*line)));
        NsdParser::new(&diagram).parse().unwrap()
    }

    #[test]
    fn collects_assigned_globals() {
        let units = vec![
            unit("main", &["set (score) to 0", "change (lives) by (-1)"]),
            unit("COMMAND bump (n)", &["set (n) to 1", "change (score) by 1"]),
        ];
        let globals = collect_globals(&units, &["level".to_string()]);
        let names: Vec<_> = globals.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["level", "lives", "score"]);
    }

    #[test]
    fn script_variables_are_not_globals() {
        let units = vec![unit("main", &["script variables (tmp)", "set (tmp) to 3"])];
        assert!(collect_globals(&units, &[]).is_empty());
    }

    #[test]
    fn finds_assignments_in_nested_scripts() {
        let diagram = Diagram::new("main").with_child(Element::Forever {
            body: vec![Element::instruction("change (counter) by 1")],
        });
        let units = vec![NsdParser::new(&diagram).parse().unwrap()];
        assert!(collect_globals(&units, &[]).contains("counter"));
    }

    #[test]
    fn inner_scopes_shadow_outer_ones() {
        let command = unit("COMMAND shadow (x) (y)", &["script variables (y)"]);
        let globals: BTreeSet<String> = ["x".to_string(), "z".to_string()].into_iter().collect();
        let scope = analyze_unit(&command, &globals).unwrap();

        assert!(matches!(scope.variables.get("x"), Some(VariableContext::Unit(_))));
        assert!(matches!(scope.variables.get("y"), Some(VariableContext::Script(_))));
        assert!(matches!(scope.variables.get("z"), Some(VariableContext::Global)));
        assert_eq!(scope.frames.frames().len(), 1);
        assert_eq!(scope.frames.frames()[0].names, vec!["y".to_string()]);
    }

    #[test]
    fn declarations_share_one_frame() {
        let script = unit("main", &["script variables (a) (b)", "script variables (c)"]);
        let scope = analyze_unit(&script, &BTreeSet::new()).unwrap();
        let frame_of = |name: &str| match scope.variables.get(name) {
            Some(VariableContext::Script(frame)) => Some(*frame),
            _ => None,
        };
        assert!(frame_of("a").is_some());
        assert_eq!(frame_of("a"), frame_of("c"));
        assert_eq!(scope.frames.frames()[0].names.len(), 3);
    }

    #[test]
    fn units_without_script_variables_have_no_frames() {
        let script = unit("main", &["say \"hi\""]);
        let scope = analyze_unit(&script, &BTreeSet::new()).unwrap();
        assert!(scope.frames.is_empty());
        assert!(scope.variables.is_empty());
    }

    #[test]
    fn rejects_duplicate_parameters() {
        let command = unit("COMMAND twice (a) and (a)", &[]);
        let err = analyze_unit(&command, &BTreeSet::new()).unwrap_err();
        assert!(err.message.contains("Duplicate parameter 'a'"));
    }

    #[test]
    fn rejects_bad_script_variable_declarations() {
        let literal = unit("main", &["script variables 5"]);
        assert!(analyze_unit(&literal, &BTreeSet::new()).is_err());

        let repeated = unit("main", &["script variables (a)", "script variables (a)"]);
        let err = analyze_unit(&repeated, &BTreeSet::new()).unwrap_err();
        assert!(err.message.contains("declared twice"));
    }
}
