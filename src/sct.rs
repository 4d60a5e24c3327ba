//! Declarative submission-correctness-tests.
//!
//! Exercise files carry their checks as data. A [`CheckSpec`] tree maps
//! one-to-one onto the check layer: locator specs carry a `then` list that
//! runs against the narrowed state, evaluator specs are leaves. Sibling
//! specs behave like `multi`: they all run against the same input.

use std::rc::Rc;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::check::{check, context, function, has, logic, parts, Check, CheckResult, State};
use crate::failure::{AuthoringError, Failure};
use crate::runtime::Value;
use crate::syntax::{NodeKind, PartIndex};

// ============================================================================
// SPEC TYPES
// ============================================================================

/// Index into an indexed part, as written in an exercise file: a position,
/// a key, or a path of both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    Pos(usize),
    Key(String),
    Path(Vec<IndexSpec>),
}

impl IndexSpec {
    fn to_part_index(&self) -> PartIndex {
        match self {
            IndexSpec::Pos(i) => PartIndex::Pos(*i),
            IndexSpec::Key(k) => PartIndex::Key(k.clone()),
            IndexSpec::Path(steps) => {
                PartIndex::Path(steps.iter().map(IndexSpec::to_part_index).collect())
            }
        }
    }
}

/// One node of a declarative check tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckSpec {
    CheckForLoop(NodeSpec),
    CheckWhile(NodeSpec),
    CheckIfElse(NodeSpec),
    CheckWith(NodeSpec),
    CheckTryExcept(NodeSpec),
    CheckLambdaFunction(NodeSpec),
    CheckFunctionDef {
        name: String,
        #[serde(default)]
        missing_msg: Option<String>,
        #[serde(default)]
        expand_msg: Option<String>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    CheckPart {
        name: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        missing_msg: Option<String>,
        #[serde(default)]
        expand_msg: Option<String>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    CheckPartIndex {
        name: String,
        index: IndexSpec,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        missing_msg: Option<String>,
        #[serde(default)]
        expand_msg: Option<String>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    CheckFunction {
        name: String,
        #[serde(default)]
        index: usize,
        #[serde(default)]
        missing_msg: Option<String>,
        #[serde(default)]
        params_not_matched_msg: Option<String>,
        #[serde(default)]
        expand_msg: Option<String>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    CheckArgs {
        name: IndexSpec,
        #[serde(default)]
        missing_msg: Option<String>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    CheckCall {
        callstr: String,
        #[serde(default)]
        expand_msg: Option<String>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    WithContext {
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    SetContext {
        #[serde(default)]
        vals: Vec<Json>,
        #[serde(default)]
        names: Vec<(String, Json)>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    SetEnv {
        #[serde(default)]
        names: Vec<(String, Json)>,
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    Multi {
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    Extend {
        #[serde(default)]
        then: Vec<CheckSpec>,
    },
    HasEqualAst {
        #[serde(default = "default_true")]
        exact: bool,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasEqualPart {
        name: String,
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasEqualPartLen {
        name: String,
        #[serde(default)]
        unequal_msg: Option<String>,
    },
    HasEqualName {
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    IsDefault {
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasEqualValue(ExprSpec),
    HasEqualOutput(ExprSpec),
    HasEqualError(ExprSpec),
    HasContext {
        #[serde(default)]
        incorrect_msg: Option<String>,
        #[serde(default)]
        exact_names: bool,
    },
    HasCode {
        pattern: String,
        #[serde(default)]
        fixed: bool,
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasOutput {
        pattern: String,
        #[serde(default)]
        fixed: bool,
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasNoError {
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasPrintout {
        #[serde(default)]
        index: usize,
        #[serde(default)]
        incorrect_msg: Option<String>,
    },
    HasImport {
        module: String,
        #[serde(default)]
        same_as: bool,
        #[serde(default)]
        not_imported_msg: Option<String>,
        #[serde(default)]
        incorrect_as_msg: Option<String>,
    },
    Fail {
        #[serde(default)]
        msg: Option<String>,
    },
}

/// Shared shape of the construct locators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub missing_msg: Option<String>,
    #[serde(default)]
    pub expand_msg: Option<String>,
    #[serde(default)]
    pub then: Vec<CheckSpec>,
}

/// Shared shape of the behavioral evaluators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExprSpec {
    #[serde(default)]
    pub incorrect_msg: Option<String>,
    #[serde(default)]
    pub extra_env: Vec<(String, Json)>,
    #[serde(default)]
    pub context_vals: Vec<Json>,
    #[serde(default)]
    pub pre_code: Option<String>,
    #[serde(default)]
    pub expr_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub no_copy: bool,
    #[serde(default, rename = "override")]
    pub override_code: Option<String>,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// COMPILATION
// ============================================================================

/// Compile a sibling list into one check that runs them `multi`-style.
pub fn compile_all(specs: &[CheckSpec]) -> Check {
    let compiled: Vec<Check> = specs.iter().map(compile).collect();
    check(move |state| logic::multi(state, &compiled))
}

/// Compile one spec node into a runnable check.
pub fn compile(spec: &CheckSpec) -> Check {
    match spec {
        CheckSpec::CheckForLoop(node) => compile_node(NodeKind::ForLoop, node),
        CheckSpec::CheckWhile(node) => compile_node(NodeKind::While, node),
        CheckSpec::CheckIfElse(node) => compile_node(NodeKind::IfElse, node),
        CheckSpec::CheckWith(node) => compile_node(NodeKind::With, node),
        CheckSpec::CheckTryExcept(node) => compile_node(NodeKind::TryExcept, node),
        CheckSpec::CheckLambdaFunction(node) => compile_node(NodeKind::Lambda, node),

        CheckSpec::CheckFunctionDef {
            name,
            missing_msg,
            expand_msg,
            then,
        } => {
            let (name, missing_msg, expand_msg) =
                (name.clone(), missing_msg.clone(), expand_msg.clone());
            let next = compile_all(then);
            check(move |state| {
                let child = parts::check_node(
                    state,
                    NodeKind::FunctionDef,
                    &PartIndex::Key(name.clone()),
                    None,
                    missing_msg.as_deref(),
                    expand_msg.as_deref(),
                )?;
                next(&child)
            })
        }

        CheckSpec::CheckPart {
            name,
            label,
            missing_msg,
            expand_msg,
            then,
        } => {
            let name = name.clone();
            let label = label.clone().unwrap_or_else(|| name.clone());
            let (missing_msg, expand_msg) = (missing_msg.clone(), expand_msg.clone());
            let next = compile_all(then);
            check(move |state| {
                let child = parts::check_part(
                    state,
                    &name,
                    &label,
                    missing_msg.as_deref(),
                    expand_msg.as_deref(),
                )?;
                next(&child)
            })
        }

        CheckSpec::CheckPartIndex {
            name,
            index,
            label,
            missing_msg,
            expand_msg,
            then,
        } => {
            let name = name.clone();
            let index = index.to_part_index();
            let label = label.clone().unwrap_or_else(|| name.clone());
            let (missing_msg, expand_msg) = (missing_msg.clone(), expand_msg.clone());
            let next = compile_all(then);
            check(move |state| {
                let child = parts::check_part_index(
                    state,
                    &name,
                    &index,
                    &label,
                    missing_msg.as_deref(),
                    expand_msg.as_deref(),
                )?;
                next(&child)
            })
        }

        CheckSpec::CheckFunction {
            name,
            index,
            missing_msg,
            params_not_matched_msg,
            expand_msg,
            then,
        } => {
            let (name, index) = (name.clone(), *index);
            let missing_msg = missing_msg.clone();
            let params_not_matched_msg = params_not_matched_msg.clone();
            let expand_msg = expand_msg.clone();
            let next = compile_all(then);
            check(move |state| {
                let child = function::check_function(
                    state,
                    &name,
                    index,
                    missing_msg.as_deref(),
                    params_not_matched_msg.as_deref(),
                    expand_msg.as_deref(),
                    None,
                )?;
                next(&child)
            })
        }

        CheckSpec::CheckArgs {
            name,
            missing_msg,
            then,
        } => {
            let index = name.to_part_index();
            let missing_msg = missing_msg.clone();
            let next = compile_all(then);
            check(move |state| {
                let child = function::check_args(state, &index, missing_msg.as_deref())?;
                next(&child)
            })
        }

        CheckSpec::CheckCall {
            callstr,
            expand_msg,
            then,
        } => {
            let (callstr, expand_msg) = (callstr.clone(), expand_msg.clone());
            let next = compile_all(then);
            check(move |state| {
                let child = function::check_call(state, &callstr, expand_msg.as_deref())?;
                next(&child)
            })
        }

        CheckSpec::WithContext { then } => {
            let compiled: Vec<Check> = then.iter().map(compile).collect();
            check(move |state| context::with_context(state, &compiled))
        }

        CheckSpec::SetContext { vals, names, then } => {
            let (vals, names) = (vals.clone(), names.clone());
            let next = compile_all(then);
            check(move |state| {
                let mut values = Vec::new();
                for json in &vals {
                    values.push(json_to_value(json)?);
                }
                let mut named = Vec::new();
                for (name, json) in &names {
                    named.push((name.clone(), json_to_value(json)?));
                }
                let child = context::set_context(state, &values, &named)?;
                next(&child)
            })
        }

        CheckSpec::SetEnv { names, then } => {
            let names = names.clone();
            let next = compile_all(then);
            check(move |state| {
                let mut vars = Vec::new();
                for (name, json) in &names {
                    vars.push((name.clone(), json_to_value(json)?));
                }
                let child = context::set_env(state, &vars)?;
                next(&child)
            })
        }

        CheckSpec::Multi { then } => {
            let compiled: Vec<Check> = then.iter().map(compile).collect();
            check(move |state| logic::multi(state, &compiled))
        }

        CheckSpec::Extend { then } => {
            let compiled: Vec<Check> = then.iter().map(compile).collect();
            check(move |state| logic::extend(state, &compiled))
        }

        CheckSpec::HasEqualAst {
            exact,
            code,
            incorrect_msg,
        } => {
            let opts = has::AstOptions {
                exact: *exact,
                code: code.clone(),
                incorrect_msg: incorrect_msg.clone(),
            };
            check(move |state| has::has_equal_ast(state, &opts))
        }

        CheckSpec::HasEqualPart {
            name,
            incorrect_msg,
        } => {
            let (name, incorrect_msg) = (name.clone(), incorrect_msg.clone());
            check(move |state| has::has_equal_part(state, &name, incorrect_msg.as_deref()))
        }

        CheckSpec::HasEqualPartLen { name, unequal_msg } => {
            let (name, unequal_msg) = (name.clone(), unequal_msg.clone());
            check(move |state| has::has_equal_part_len(state, &name, unequal_msg.as_deref()))
        }

        CheckSpec::HasEqualName { incorrect_msg } => {
            let incorrect_msg = incorrect_msg.clone().unwrap_or_else(|| {
                "Make sure to use the correct name. Expected `{{sol}}`, but got `{{stu}}`."
                    .to_string()
            });
            check(move |state| has::has_equal_part(state, "name", Some(incorrect_msg.as_str())))
        }

        CheckSpec::IsDefault { incorrect_msg } => {
            let incorrect_msg = incorrect_msg
                .clone()
                .unwrap_or_else(|| "Have you used the default value here?".to_string());
            check(move |state| {
                has::has_equal_part(state, "is_default", Some(incorrect_msg.as_str()))
            })
        }

        CheckSpec::HasEqualValue(spec) => compile_expr(spec, has::has_equal_value),
        CheckSpec::HasEqualOutput(spec) => compile_expr(spec, has::has_equal_output),
        CheckSpec::HasEqualError(spec) => compile_expr(spec, has::has_equal_error),

        CheckSpec::HasContext {
            incorrect_msg,
            exact_names,
        } => {
            let (incorrect_msg, exact_names) = (incorrect_msg.clone(), *exact_names);
            check(move |state| context::has_context(state, incorrect_msg.as_deref(), exact_names))
        }

        CheckSpec::HasCode {
            pattern,
            fixed,
            incorrect_msg,
        } => {
            let (pattern, fixed, incorrect_msg) =
                (pattern.clone(), *fixed, incorrect_msg.clone());
            check(move |state| has::has_code(state, &pattern, fixed, incorrect_msg.as_deref()))
        }

        CheckSpec::HasOutput {
            pattern,
            fixed,
            incorrect_msg,
        } => {
            let (pattern, fixed, incorrect_msg) =
                (pattern.clone(), *fixed, incorrect_msg.clone());
            check(move |state| has::has_output(state, &pattern, fixed, incorrect_msg.as_deref()))
        }

        CheckSpec::HasNoError { incorrect_msg } => {
            let incorrect_msg = incorrect_msg.clone();
            check(move |state| has::has_no_error(state, incorrect_msg.as_deref()))
        }

        CheckSpec::HasPrintout {
            index,
            incorrect_msg,
        } => {
            let (index, incorrect_msg) = (*index, incorrect_msg.clone());
            check(move |state| has::has_printout(state, index, incorrect_msg.as_deref()))
        }

        CheckSpec::HasImport {
            module,
            same_as,
            not_imported_msg,
            incorrect_as_msg,
        } => {
            let (module, same_as) = (module.clone(), *same_as);
            let not_imported_msg = not_imported_msg.clone();
            let incorrect_as_msg = incorrect_as_msg.clone();
            check(move |state| {
                has::has_import(
                    state,
                    &module,
                    same_as,
                    not_imported_msg.as_deref(),
                    incorrect_as_msg.as_deref(),
                )
            })
        }

        CheckSpec::Fail { msg } => {
            let msg = msg.clone();
            check(move |state| logic::fail(state, msg.as_deref()))
        }
    }
}

fn compile_node(kind: NodeKind, node: &NodeSpec) -> Check {
    let index = PartIndex::Pos(node.index);
    let label = node.label.clone();
    let (missing_msg, expand_msg) = (node.missing_msg.clone(), node.expand_msg.clone());
    let next = compile_all(&node.then);
    check(move |state| {
        let child = parts::check_node(
            state,
            kind,
            &index,
            label.as_deref(),
            missing_msg.as_deref(),
            expand_msg.as_deref(),
        )?;
        next(&child)
    })
}

fn compile_expr(
    spec: &ExprSpec,
    runner: fn(&Rc<State>, &has::ExprOptions) -> CheckResult,
) -> Check {
    let spec = spec.clone();
    check(move |state| {
        let opts = expr_options(&spec)?;
        runner(state, &opts)
    })
}

fn expr_options(spec: &ExprSpec) -> Result<has::ExprOptions, Failure> {
    let mut extra_env = Vec::new();
    for (name, json) in &spec.extra_env {
        extra_env.push((name.clone(), json_to_value(json)?));
    }
    let mut context_vals = Vec::new();
    for json in &spec.context_vals {
        context_vals.push(json_to_value(json)?);
    }
    Ok(has::ExprOptions {
        incorrect_msg: spec.incorrect_msg.clone(),
        extra_env,
        context_vals,
        pre_code: spec.pre_code.clone(),
        expr_code: spec.expr_code.clone(),
        name: spec.name.clone(),
        no_copy: spec.no_copy,
        override_code: spec.override_code.clone(),
        comparator: None,
    })
}

/// Convert a JSON literal from an exercise file into a runtime value.
pub fn json_to_value(json: &Json) -> Result<Value, Failure> {
    match json {
        Json::Null => Ok(Value::Nil),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n.as_f64().map(Value::Number).ok_or_else(|| {
            Failure::Authoring(AuthoringError::new(format!(
                "cannot represent the number `{}`",
                n
            )))
        }),
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Array(items) => {
            let mut values = Vector::new();
            for item in items {
                values.push_back(json_to_value(item)?);
            }
            Ok(Value::List(values))
        }
        Json::Object(entries) => {
            let mut map = OrdMap::new();
            for (key, item) in entries {
                map.insert(key.clone(), json_to_value(item)?);
            }
            Ok(Value::Map(map))
        }
    }
}
