//! Tree-walking evaluator for the teaching language.
//!
//! Deliberately small and fully sandboxed: no filesystem, no clock, no real
//! I/O. `print` appends to a captured output buffer, `with` resources are
//! in-memory values, and runaway recursion or loops hit hard limits instead
//! of hanging the grader.

use std::rc::Rc;

use im::{OrdMap, Vector};

use crate::runtime::signature::ParamSig;
use crate::runtime::{Environment, Lambda, Resource, RuntimeError, Value};
use crate::syntax::{AstNode, Expr};

const MAX_CALL_DEPTH: usize = 200;
const MAX_LOOP_ITERATIONS: usize = 100_000;

const NATIVE_NAMES: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "<=", ">=", "=", "!=", "not", "print", "str", "len", "abs",
    "list", "nth", "push", "sum", "min", "max", "range", "error", "resource", "broken-resource",
];

const MODULES: &[(&str, &[&str])] = &[
    ("math", &["floor", "ceil", "sqrt", "pow"]),
    ("string", &["upper", "lower", "join"]),
];

// ============================================================================
// INTERPRETER
// ============================================================================

/// Evaluator state: bindings, module aliases and captured output.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    pub env: Environment,
    /// alias -> module, from executed `use` forms.
    pub aliases: OrdMap<String, String>,
    /// Everything `print` wrote, in order.
    pub output: String,
    depth: usize,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::default()
    }

    /// Evaluate a statement sequence, returning the last value.
    pub fn run(&mut self, nodes: &[AstNode]) -> Result<Value, RuntimeError> {
        let mut last = Value::Nil;
        for node in nodes {
            last = self.eval(node)?;
        }
        Ok(last)
    }

    pub fn eval(&mut self, node: &AstNode) -> Result<Value, RuntimeError> {
        match &*node.value {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Keyword(k) => Ok(Value::Str(format!(":{}", k))),
            Expr::Symbol(name) => self.lookup(name),
            Expr::List(items) => self.eval_list(node, items),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        if let Some(native) = self.resolve_native(name) {
            return Ok(Value::Native(native));
        }
        Err(RuntimeError::UndefinedName(name.to_string()))
    }

    /// Resolve a plain or alias-qualified name to a builtin registry name.
    fn resolve_native(&self, name: &str) -> Option<&'static str> {
        if let Some((head, rest)) = name.split_once('.') {
            let module = self.aliases.get(head).map(String::as_str).unwrap_or(head);
            let (_, members) = MODULES.iter().find(|(m, _)| *m == module)?;
            let member = members.iter().find(|m| **m == rest)?;
            let qualified = format!("{}.{}", module, member);
            return MODULE_NATIVES.iter().find(|n| **n == qualified).copied();
        }
        NATIVE_NAMES.iter().find(|n| **n == name).copied()
    }

    fn eval_list(&mut self, node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let Some(head) = items.first() else {
            return Ok(Value::List(Vector::new()));
        };

        if let Expr::Symbol(name) = &*head.value {
            match name.as_str() {
                "do" => return self.run(&items[1..]),
                "set" => return self.eval_set(node, items),
                "def" => return self.eval_def(node, items),
                "lambda" => return self.eval_lambda(node, items),
                "if" => return self.eval_if(node, items),
                "while" => return self.eval_while(node, items),
                "for" => return self.eval_for(node, items),
                "with" => return self.eval_with(node, items),
                "try" => return self.eval_try(node, items),
                "use" => return self.eval_use(node, items),
                "quote" => {
                    return match items.get(1) {
                        Some(quoted) => Ok(quote_value(quoted)),
                        None => Err(arity("quote takes one argument")),
                    }
                }
                _ => {}
            }
        }

        let callee = self.eval(head)?;
        let (pos, kw) = self.eval_args(&items[1..])?;
        self.call(callee, pos, kw)
    }

    fn eval_args(
        &mut self,
        args: &[AstNode],
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), RuntimeError> {
        let mut pos = Vec::new();
        let mut kw = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if let Expr::Keyword(key) = &*arg.value {
                let value_node = iter
                    .next()
                    .ok_or_else(|| arity(&format!("keyword argument :{} has no value", key)))?;
                kw.push((key.clone(), self.eval(value_node)?));
            } else {
                pos.push(self.eval(arg)?);
            }
        }
        Ok((pos, kw))
    }

    // ------------------------------------------------------------------------
    // SPECIAL FORMS
    // ------------------------------------------------------------------------

    fn eval_set(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let (Some(target), Some(value_node)) = (items.get(1), items.get(2)) else {
            return Err(arity("set takes a name and a value"));
        };
        let Expr::Symbol(name) = &*target.value else {
            return Err(RuntimeError::Type(format!(
                "cannot assign to {}",
                target.value.type_name()
            )));
        };
        let value = self.eval(value_node)?;
        self.env.insert(name.clone(), value);
        Ok(Value::Nil)
    }

    fn eval_def(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        if items.len() < 4 {
            return Err(arity("def takes a name, a parameter list and a body"));
        }
        let Expr::Symbol(name) = &*items[1].value else {
            return Err(RuntimeError::Type(format!(
                "function name must be a symbol, found {}",
                items[1].value.type_name()
            )));
        };
        let lambda = Lambda {
            name: Some(name.clone()),
            params: items[2].clone(),
            body: items[3..].to_vec(),
            env: self.env.clone(),
        };
        self.env.insert(name.clone(), Value::Lambda(Rc::new(lambda)));
        Ok(Value::Nil)
    }

    fn eval_lambda(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        if items.len() < 3 {
            return Err(arity("lambda takes a parameter list and a body"));
        }
        let lambda = Lambda {
            name: None,
            params: items[1].clone(),
            body: items[2..].to_vec(),
            env: self.env.clone(),
        };
        Ok(Value::Lambda(Rc::new(lambda)))
    }

    fn eval_if(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let (Some(test), Some(then)) = (items.get(1), items.get(2)) else {
            return Err(arity("if takes a test and a consequent"));
        };
        if self.eval(test)?.is_truthy() {
            self.eval(then)
        } else {
            match items.get(3) {
                Some(orelse) => self.eval(orelse),
                None => Ok(Value::Nil),
            }
        }
    }

    fn eval_while(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let Some(test) = items.get(1) else {
            return Err(arity("while takes a test and a body"));
        };
        let mut iterations = 0usize;
        while self.eval(test)?.is_truthy() {
            iterations += 1;
            if iterations > MAX_LOOP_ITERATIONS {
                return Err(RuntimeError::IterationLimit);
            }
            self.run(&items[2..])?;
        }
        Ok(Value::Nil)
    }

    fn eval_for(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let (Some(target), Some(iter_node)) = (items.get(1), items.get(2)) else {
            return Err(arity("for takes a target, an iterable and a body"));
        };
        let iterable = self.eval(iter_node)?;
        let elements: Vec<Value> = match iterable {
            Value::List(items) => items.into_iter().collect(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            other => {
                return Err(RuntimeError::Type(format!(
                    "cannot iterate over {}",
                    other.type_name()
                )))
            }
        };
        if elements.len() > MAX_LOOP_ITERATIONS {
            return Err(RuntimeError::IterationLimit);
        }
        for element in elements {
            self.bind_target(target, element)?;
            self.run(&items[3..])?;
        }
        Ok(Value::Nil)
    }

    /// Bind a loop or with target: a single name takes the value whole, a
    /// name list unpacks it.
    fn bind_target(&mut self, target: &AstNode, value: Value) -> Result<(), RuntimeError> {
        match &*target.value {
            Expr::Symbol(name) => {
                self.env.insert(name.clone(), value);
                Ok(())
            }
            Expr::List(names) => {
                let Value::List(values) = value else {
                    return Err(RuntimeError::Unpack {
                        want: names.len(),
                        got: 1,
                    });
                };
                if values.len() != names.len() {
                    return Err(RuntimeError::Unpack {
                        want: names.len(),
                        got: values.len(),
                    });
                }
                for (name_node, value) in names.iter().zip(values) {
                    let Expr::Symbol(name) = &*name_node.value else {
                        return Err(RuntimeError::Type(format!(
                            "cannot bind to {}",
                            name_node.value.type_name()
                        )));
                    };
                    self.env.insert(name.clone(), value);
                }
                Ok(())
            }
            other => Err(RuntimeError::Type(format!(
                "cannot bind to {}",
                other.type_name()
            ))),
        }
    }

    fn eval_with(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let Some(bindings_node) = items.get(1) else {
            return Err(arity("with takes a binding list and a body"));
        };
        let Expr::List(bindings) = &*bindings_node.value else {
            return Err(RuntimeError::Type(format!(
                "with bindings must be a list, found {}",
                bindings_node.value.type_name()
            )));
        };

        let mut entered: Vec<Rc<Resource>> = Vec::new();
        let mut setup_error = None;
        for binding in bindings {
            match self.enter_binding(binding) {
                Ok(resource) => entered.push(resource),
                Err(e) => {
                    setup_error = Some(e);
                    break;
                }
            }
        }

        let body_result = match setup_error {
            Some(e) => Err(e),
            None => self.run(&items[2..]),
        };

        // Teardown runs in reverse order regardless of the body outcome, and
        // a teardown failure takes precedence over a body failure.
        let mut teardown_error = None;
        for resource in entered.iter().rev() {
            if let Err(e) = exit_resource(resource) {
                teardown_error = Some(e);
            }
        }
        match teardown_error {
            Some(e) => Err(e),
            None => body_result.map(|_| Value::Nil),
        }
    }

    /// Evaluate one with binding `(name... expr)`: enter the resource and
    /// bind its yielded values to the target names.
    pub(crate) fn enter_binding(&mut self, binding: &AstNode) -> Result<Rc<Resource>, RuntimeError> {
        let Expr::List(parts) = &*binding.value else {
            return Err(RuntimeError::Type(format!(
                "with binding must be a list, found {}",
                binding.value.type_name()
            )));
        };
        if parts.len() < 2 {
            return Err(arity("with binding takes at least one name and an expression"));
        }
        let (targets, expr) = parts.split_at(parts.len() - 1);

        let value = self.eval(&expr[0])?;
        let Value::Resource(resource) = value else {
            return Err(RuntimeError::Protocol(value.type_name()));
        };

        let yielded = if resource.values.len() == 1 {
            resource.values[0].clone()
        } else {
            Value::List(resource.values.clone())
        };
        if targets.len() == 1 {
            self.bind_target(&targets[0], yielded)?;
        } else {
            let Value::List(values) = &yielded else {
                return Err(RuntimeError::Unpack {
                    want: targets.len(),
                    got: 1,
                });
            };
            if values.len() != targets.len() {
                return Err(RuntimeError::Unpack {
                    want: targets.len(),
                    got: values.len(),
                });
            }
            for (target, value) in targets.iter().zip(values.iter()) {
                self.bind_target(target, value.clone())?;
            }
        }
        Ok(resource)
    }

    fn eval_try(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let Some(body_node) = items.get(1) else {
            return Err(arity("try takes a body"));
        };
        let body: Vec<AstNode> = match body_node.value.as_list() {
            Some(stmts) => stmts.to_vec(),
            None => vec![body_node.clone()],
        };

        let error = match self.run(&body) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        for clause in &items[2..] {
            let Expr::List(parts) = &*clause.value else { continue };
            let is_catch =
                matches!(parts.first().map(|h| &*h.value), Some(Expr::Symbol(s)) if s == "catch");
            if !is_catch || parts.len() < 2 {
                continue;
            }
            let Expr::Symbol(kind) = &*parts[1].value else { continue };
            if kind == "error" || kind == error.kind() {
                return self.run(&parts[2..]);
            }
        }
        Err(error)
    }

    fn eval_use(&mut self, _node: &AstNode, items: &[AstNode]) -> Result<Value, RuntimeError> {
        let Some(module_node) = items.get(1) else {
            return Err(arity("use takes a module name"));
        };
        let Expr::Symbol(module) = &*module_node.value else {
            return Err(RuntimeError::Type(format!(
                "module name must be a symbol, found {}",
                module_node.value.type_name()
            )));
        };
        if !MODULES.iter().any(|(m, _)| m == module) {
            return Err(RuntimeError::UndefinedName(module.clone()));
        }
        let alias = match items.get(3).map(|n| &*n.value) {
            Some(Expr::Symbol(a)) => a.clone(),
            _ => module.clone(),
        };
        self.aliases.insert(alias, module.clone());
        Ok(Value::Nil)
    }

    // ------------------------------------------------------------------------
    // CALLS
    // ------------------------------------------------------------------------

    pub fn call(
        &mut self,
        callee: Value,
        pos: Vec<Value>,
        kw: Vec<(String, Value)>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Lambda(lambda) => self.call_lambda(&lambda, pos, kw),
            Value::Native(name) => {
                if let Some((key, _)) = kw.first() {
                    return Err(arity(&format!(
                        "builtin `{}` takes no keyword argument :{}",
                        name, key
                    )));
                }
                self.call_native(name, pos)
            }
            other => Err(RuntimeError::Type(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_lambda(
        &mut self,
        lambda: &Rc<Lambda>,
        pos: Vec<Value>,
        kw: Vec<(String, Value)>,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit);
        }

        let sig = ParamSig::parse(&lambda.params)
            .map_err(|e| RuntimeError::Type(e.to_string()))?;
        let names = sig.positional_names();

        let mut bound: Vec<(String, Value)> = Vec::new();
        let mut rest_values = Vector::new();
        for (i, value) in pos.into_iter().enumerate() {
            match names.get(i) {
                Some(name) => bound.push((name.to_string(), value)),
                None if sig.rest.is_some() => rest_values.push_back(value),
                None => {
                    return Err(arity(&format!(
                        "{} takes at most {} arguments",
                        describe_lambda(lambda),
                        names.len()
                    )))
                }
            }
        }
        for (key, value) in kw {
            if !names.iter().any(|n| *n == key.as_str()) {
                return Err(arity(&format!(
                    "{} has no parameter `{}`",
                    describe_lambda(lambda),
                    key
                )));
            }
            if bound.iter().any(|(n, _)| *n == key) {
                return Err(arity(&format!("duplicate argument `{}`", key)));
            }
            bound.push((key, value));
        }
        for required in &sig.required {
            if !bound.iter().any(|(n, _)| n == required) {
                return Err(arity(&format!(
                    "{} missing required argument `{}`",
                    describe_lambda(lambda),
                    required
                )));
            }
        }

        let mut local = lambda.env.clone();
        if let Some(name) = &lambda.name {
            local.insert(name.clone(), Value::Lambda(Rc::clone(lambda)));
        }

        // Unbound optional parameters take their defaults, evaluated in the
        // captured environment.
        let defaults: Vec<(String, AstNode)> = sig
            .optional
            .iter()
            .filter(|(name, _)| !bound.iter().any(|(n, _)| n == name))
            .filter_map(|(name, default)| default.clone().map(|d| (name.clone(), d)))
            .collect();

        let saved = std::mem::replace(&mut self.env, local);
        self.depth += 1;
        let result = (|| {
            for (name, default) in defaults {
                let value = self.eval(&default)?;
                self.env.insert(name, value);
            }
            for (name, value) in bound {
                self.env.insert(name, value);
            }
            if let Some(rest) = &sig.rest {
                self.env.insert(rest.clone(), Value::List(rest_values));
            }
            self.run(&lambda.body)
        })();
        self.depth -= 1;
        self.env = saved;
        result
    }

    fn call_native(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match name {
            "+" => fold_add(&args),
            "-" => fold_numeric(name, &args, |a, b| Ok(a - b), true),
            "*" => fold_numeric(name, &args, |a, b| Ok(a * b), false),
            "/" => fold_numeric(
                name,
                &args,
                |a, b| {
                    if b == 0.0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(a / b)
                    }
                },
                false,
            ),
            "%" => fold_numeric(
                name,
                &args,
                |a, b| {
                    if b == 0.0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(a.rem_euclid(b))
                    }
                },
                false,
            ),
            "<" => compare(name, &args, |a, b| a < b),
            ">" => compare(name, &args, |a, b| a > b),
            "<=" => compare(name, &args, |a, b| a <= b),
            ">=" => compare(name, &args, |a, b| a >= b),
            "=" => {
                expect_arity(name, &args, 2)?;
                Ok(Value::Bool(args[0] == args[1]))
            }
            "!=" => {
                expect_arity(name, &args, 2)?;
                Ok(Value::Bool(args[0] != args[1]))
            }
            "not" => {
                expect_arity(name, &args, 1)?;
                Ok(Value::Bool(!args[0].is_truthy()))
            }
            "print" => {
                let line = args
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push_str(&line);
                self.output.push('\n');
                Ok(Value::Nil)
            }
            "str" => {
                expect_arity(name, &args, 1)?;
                Ok(Value::Str(args[0].to_string()))
            }
            "len" => {
                expect_arity(name, &args, 1)?;
                match &args[0] {
                    Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
                    Value::List(items) => Ok(Value::Number(items.len() as f64)),
                    Value::Map(entries) => Ok(Value::Number(entries.len() as f64)),
                    other => Err(RuntimeError::Type(format!(
                        "len does not apply to {}",
                        other.type_name()
                    ))),
                }
            }
            "abs" => {
                expect_arity(name, &args, 1)?;
                Ok(Value::Number(as_number(name, &args[0])?.abs()))
            }
            "list" => Ok(Value::List(args.into_iter().collect())),
            "nth" => {
                expect_arity(name, &args, 2)?;
                let index = as_number(name, &args[1])? as i64;
                match &args[0] {
                    Value::List(items) => {
                        let len = items.len();
                        let i = normalize_index(index, len)?;
                        Ok(items[i].clone())
                    }
                    Value::Str(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        let i = normalize_index(index, chars.len())?;
                        Ok(Value::Str(chars[i].to_string()))
                    }
                    other => Err(RuntimeError::Type(format!(
                        "nth does not apply to {}",
                        other.type_name()
                    ))),
                }
            }
            "push" => {
                expect_arity(name, &args, 2)?;
                let Value::List(items) = &args[0] else {
                    return Err(RuntimeError::Type(format!(
                        "push does not apply to {}",
                        args[0].type_name()
                    )));
                };
                let mut items = items.clone();
                items.push_back(args[1].clone());
                Ok(Value::List(items))
            }
            "sum" => {
                expect_arity(name, &args, 1)?;
                let Value::List(items) = &args[0] else {
                    return Err(RuntimeError::Type(format!(
                        "sum does not apply to {}",
                        args[0].type_name()
                    )));
                };
                let mut total = 0.0;
                for item in items {
                    total += as_number(name, item)?;
                }
                Ok(Value::Number(total))
            }
            "min" | "max" => {
                if args.is_empty() {
                    return Err(RuntimeError::Value(format!("{} of no values", name)));
                }
                let mut best = as_number(name, &args[0])?;
                for arg in &args[1..] {
                    let n = as_number(name, arg)?;
                    best = if name == "min" { best.min(n) } else { best.max(n) };
                }
                Ok(Value::Number(best))
            }
            "range" => {
                if args.is_empty() || args.len() > 3 {
                    return Err(arity("range takes one to three arguments"));
                }
                let mut bounds = Vec::new();
                for arg in &args {
                    bounds.push(as_number(name, arg)? as i64);
                }
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => unreachable!(),
                };
                if step == 0 {
                    return Err(RuntimeError::Value("range step must not be zero".into()));
                }
                let mut items = Vector::new();
                let mut current = start;
                while (step > 0 && current < stop) || (step < 0 && current > stop) {
                    if items.len() > MAX_LOOP_ITERATIONS {
                        return Err(RuntimeError::IterationLimit);
                    }
                    items.push_back(Value::Number(current as f64));
                    current += step;
                }
                Ok(Value::List(items))
            }
            "error" => {
                expect_arity(name, &args, 1)?;
                Err(RuntimeError::Raised(args[0].to_string()))
            }
            "resource" | "broken-resource" => Ok(Value::Resource(Rc::new(Resource {
                values: args.into_iter().collect(),
                fail_on_exit: name == "broken-resource",
            }))),
            "math.floor" => math_unary(name, &args, f64::floor),
            "math.ceil" => math_unary(name, &args, f64::ceil),
            "math.sqrt" => {
                expect_arity(name, &args, 1)?;
                let n = as_number(name, &args[0])?;
                if n < 0.0 {
                    return Err(RuntimeError::Value(
                        "square root of a negative number".into(),
                    ));
                }
                Ok(Value::Number(n.sqrt()))
            }
            "math.pow" => {
                expect_arity(name, &args, 2)?;
                let base = as_number(name, &args[0])?;
                let exponent = as_number(name, &args[1])?;
                Ok(Value::Number(base.powf(exponent)))
            }
            "string.upper" => string_unary(name, &args, |s| s.to_uppercase()),
            "string.lower" => string_unary(name, &args, |s| s.to_lowercase()),
            "string.join" => {
                expect_arity(name, &args, 2)?;
                let Value::Str(separator) = &args[0] else {
                    return Err(RuntimeError::Type("join separator must be a string".into()));
                };
                let Value::List(items) = &args[1] else {
                    return Err(RuntimeError::Type("join items must be a list".into()));
                };
                let parts: Vec<String> = items.iter().map(Value::to_string).collect();
                Ok(Value::Str(parts.join(separator)))
            }
            other => Err(RuntimeError::UndefinedName(other.to_string())),
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

static MODULE_NATIVES: &[&str] = &[
    "math.floor",
    "math.ceil",
    "math.sqrt",
    "math.pow",
    "string.upper",
    "string.lower",
    "string.join",
];

pub(crate) fn exit_resource(resource: &Resource) -> Result<(), RuntimeError> {
    if resource.fail_on_exit {
        Err(RuntimeError::Raised("resource teardown failed".to_string()))
    } else {
        Ok(())
    }
}

fn quote_value(node: &AstNode) -> Value {
    match &*node.value {
        Expr::Number(n) => Value::Number(*n),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Str(s) => Value::Str(s.clone()),
        Expr::Symbol(s) => Value::Str(s.clone()),
        Expr::Keyword(k) => Value::Str(format!(":{}", k)),
        Expr::List(items) => Value::List(items.iter().map(quote_value).collect()),
    }
}

fn describe_lambda(lambda: &Lambda) -> String {
    match &lambda.name {
        Some(name) => format!("`{}`", name),
        None => "lambda".to_string(),
    }
}

fn arity(message: &str) -> RuntimeError {
    RuntimeError::Arity(message.to_string())
}

fn expect_arity(name: &str, args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() != want {
        return Err(arity(&format!(
            "{} takes {} argument{}, got {}",
            name,
            want,
            if want == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn as_number(context: &str, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeError::Type(format!(
            "{} expects a number, found {}",
            context,
            other.type_name()
        ))),
    }
}

fn fold_add(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.iter().all(|a| matches!(a, Value::Str(_))) && !args.is_empty() {
        let mut out = String::new();
        for arg in args {
            if let Value::Str(s) = arg {
                out.push_str(s);
            }
        }
        return Ok(Value::Str(out));
    }
    let mut total = 0.0;
    for arg in args {
        total += as_number("+", arg)?;
    }
    Ok(Value::Number(total))
}

fn fold_numeric(
    name: &str,
    args: &[Value],
    op: impl Fn(f64, f64) -> Result<f64, RuntimeError>,
    negate_single: bool,
) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Err(arity(&format!("{} takes at least one argument", name)));
    }
    let first = as_number(name, &args[0])?;
    if args.len() == 1 {
        return Ok(Value::Number(if negate_single { -first } else { first }));
    }
    let mut total = first;
    for arg in &args[1..] {
        total = op(total, as_number(name, arg)?)?;
    }
    Ok(Value::Number(total))
}

fn compare(name: &str, args: &[Value], op: impl Fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    if args.len() < 2 {
        return Err(arity(&format!("{} takes at least two arguments", name)));
    }
    for pair in args.windows(2) {
        let a = as_number(name, &pair[0])?;
        let b = as_number(name, &pair[1])?;
        if !op(a, b) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn normalize_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    let adjusted = if index < 0 { index + len as i64 } else { index };
    if adjusted < 0 || adjusted as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(adjusted as usize)
}

fn string_unary(
    name: &str,
    args: &[Value],
    op: impl Fn(&str) -> String,
) -> Result<Value, RuntimeError> {
    expect_arity(name, args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(op(s))),
        other => Err(RuntimeError::Type(format!(
            "{} expects a string, found {}",
            name,
            other.type_name()
        ))),
    }
}

fn math_unary(name: &str, args: &[Value], op: impl Fn(f64) -> f64) -> Result<Value, RuntimeError> {
    expect_arity(name, args, 1)?;
    Ok(Value::Number(op(as_number(name, &args[0])?)))
}
