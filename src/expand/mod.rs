//! Cartesian grid expansion
//!
//! Expands a definition containing [`MultiVariable`](crate::variable::MultiVariable)
//! branching axes into the
//! ordered cartesian product of concrete, branch-free definitions. One
//! expanded definition plus the record of which axis took which value is a
//! [`Variant`]; the variant index is the canonical run identifier.
//!
//! # Ordering convention
//!
//! Axes are collected depth-first; within a mapping, entries are visited in
//! stored (parser) order. The first axis collected is the least-significant
//! digit of the mixed-radix variant index, so it varies fastest:
//!
//! ```
//! use trazar::expand::expand;
//! use trazar::variable::parse_definition;
//!
//! let def = parse_definition(&serde_json::json!({
//!     "a": {"*": [1, 2]},
//!     "b": {"*": [10, 20]},
//! })).unwrap();
//! let variants = expand(&def).unwrap();
//! assert_eq!(variants.len(), 4);
//! // index 1 selects a's second alternative, b's first.
//! assert_eq!(variants[1].params[0].value, serde_json::json!(2));
//! assert_eq!(variants[1].params[1].value, serde_json::json!(10));
//! ```
//!
//! Alternatives may themselves contain further axes; those surface in a
//! follow-up pass, capped at [`MAX_EXPANSION_PASSES`] passes.


use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::variable::{ConfigError, DefinitionVariable, Variable};

/// Upper bound on repeated expansion passes over nested branching axes.
pub const MAX_EXPANSION_PASSES: usize = 8;

/// One axis selection made while expanding a variant: which parameter varied
/// and the value it took. The human-readable side channel for run labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariedParam {
    /// Dotted path of the branching axis within the definition.
    pub path: String,
    /// The selected alternative, rendered back to JSON.
    pub value: Value,
}

/// One concrete, branch-free point of the expanded experiment grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Canonical run identifier: position in the deterministic expansion
    /// order.
    pub index: usize,
    /// The fully expanded definition; contains no branching axes.
    pub definition: DefinitionVariable,
    /// Which axis took which value in this variant.
    pub params: Vec<VariedParam>,
}

impl Variant {
    /// Human-readable grid-point label, e.g. `"lr=0.1, batch_size=16"`.
    pub fn label(&self) -> String {
        if self.params.is_empty() {
            return format!("variant-{}", self.index);
        }
        self.params
            .iter()
            .map(|p| format!("{}={}", p.path, p.value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Expand a definition into the ordered cartesian product of its branching
/// axes.
///
/// A definition with no axes yields exactly one variant equal to the input.
/// Axes nested inside selected alternatives are expanded in further passes;
/// exceeding [`MAX_EXPANSION_PASSES`] is a configuration error.
pub fn expand(root: &DefinitionVariable) -> Result<Vec<Variant>, ConfigError> {
    let mut pending = vec![(root.clone(), Vec::new())];
    let mut passes = 0;

    while pending.iter().any(|(def, _)| def.contains_multi()) {
        if passes == MAX_EXPANSION_PASSES {
            return Err(ConfigError::NestedBranchingTooDeep(MAX_EXPANSION_PASSES));
        }
        passes += 1;

        let mut next = Vec::with_capacity(pending.len());
        for (def, params) in pending {
            if def.contains_multi() {
                for (expanded, selections) in expand_once(&def)? {
                    let mut all = params.clone();
                    all.extend(selections);
                    next.push((expanded, all));
                }
            } else {
                next.push((def, params));
            }
        }
        pending = next;
    }

    Ok(pending
        .into_iter()
        .enumerate()
        .map(|(index, (definition, params))| Variant {
            index,
            definition,
            params,
        })
        .collect())
}

/// A branching axis discovered during traversal.
struct Axis {
    path: String,
    arity: usize,
}

/// One pass: select an alternative for every axis visible at the current
/// level. Axes hiding inside the selected alternatives are left for the next
/// pass.
fn expand_once(
    def: &DefinitionVariable,
) -> Result<Vec<(DefinitionVariable, Vec<VariedParam>)>, ConfigError> {
    let mut axes = Vec::new();
    collect_axes(def, "", &mut axes);

    if axes.iter().any(|axis| axis.arity == 0) {
        return Err(ConfigError::EmptyMulti);
    }

    let total: usize = axes.iter().map(|axis| axis.arity).product();
    let mut out = Vec::with_capacity(total);

    for index in 0..total {
        let mut remainder = index;
        let selections: Vec<usize> = axes
            .iter()
            .map(|axis| {
                let selected = remainder % axis.arity;
                remainder /= axis.arity;
                selected
            })
            .collect();

        let mut cursor = 0;
        let mut params = Vec::with_capacity(axes.len());
        let expanded = substitute_definition(def, &axes, &selections, &mut cursor, &mut params);
        out.push((expanded, params));
    }

    Ok(out)
}

fn collect_axes(def: &DefinitionVariable, prefix: &str, out: &mut Vec<Axis>) {
    for (key, var) in def.iter() {
        let path = join_path(prefix, key);
        collect_axes_var(var, &path, out);
    }
}

fn collect_axes_var(var: &Variable, path: &str, out: &mut Vec<Axis>) {
    match var {
        Variable::Multi(multi) => out.push(Axis {
            path: path.to_string(),
            arity: multi.len(),
        }),
        Variable::List(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_axes_var(item, &join_path(path, &i.to_string()), out);
            }
        }
        Variable::Definition(nested) => collect_axes(nested, path, out),
        Variable::Typed(typed) => collect_axes(&typed.body, path, out),
        Variable::Scalar(_) | Variable::Undetermined => {}
    }
}

fn substitute_definition(
    def: &DefinitionVariable,
    axes: &[Axis],
    selections: &[usize],
    cursor: &mut usize,
    params: &mut Vec<VariedParam>,
) -> DefinitionVariable {
    let mut result = DefinitionVariable::new();
    for (key, var) in def.iter() {
        let substituted = substitute_var(var, axes, selections, cursor, params);
        // Keys were unique in the source definition.
        result.set(key, substituted);
    }
    result
}

fn substitute_var(
    var: &Variable,
    axes: &[Axis],
    selections: &[usize],
    cursor: &mut usize,
    params: &mut Vec<VariedParam>,
) -> Variable {
    match var {
        Variable::Multi(multi) => {
            let axis = *cursor;
            *cursor += 1;
            let chosen = multi.alternatives()[selections[axis]].clone();
            params.push(VariedParam {
                path: axes[axis].path.clone(),
                value: chosen.to_json(),
            });
            chosen
        }
        Variable::List(items) => Variable::List(
            items
                .iter()
                .map(|item| substitute_var(item, axes, selections, cursor, params))
                .collect(),
        ),
        Variable::Definition(nested) => Variable::Definition(substitute_definition(
            nested, axes, selections, cursor, params,
        )),
        Variable::Typed(typed) => Variable::Typed(crate::variable::TypedVariable::new(
            typed.object_type.clone(),
            substitute_definition(&typed.body, axes, selections, cursor, params),
        )),
        Variable::Scalar(_) | Variable::Undetermined => var.clone(),
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}
