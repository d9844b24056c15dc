// ABOUTME: Tree-walking interpreter: statement dispatch, scope lifecycle,
// typed control-flow signals, loop guards, actions, and module imports

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{ActionStmt, Program, Stmt};
use crate::builtins::free::iterable_items;
use crate::context::{ExecutionContext, Kwargs, LogEvent};
use crate::env::Environment;
use crate::error::{FlowError, ModuleError, ModuleErrorKind, RuntimeError, RuntimeErrorKind};
use crate::modules::{ModuleExports, ModuleNamespace};
use crate::parser::{parse_source, ParseOptions};
use crate::value::{FunctionBody, FunctionValue, Value};

/// Block-local control flow: what a statement told its enclosing block to do
/// next. Loops consume Break/Continue; function calls consume Return.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Non-local termination traveling up the call stack: a runtime failure or
/// the `exit` signal. Only the outermost executor consumes `Exit`.
#[derive(Debug)]
pub enum Interrupt {
    Error(FlowError),
    Exit { code: i64, message: Option<String> },
}

impl From<FlowError> for Interrupt {
    fn from(e: FlowError) -> Self {
        Interrupt::Error(e)
    }
}

impl From<RuntimeError> for Interrupt {
    fn from(e: RuntimeError) -> Self {
        Interrupt::Error(FlowError::Runtime(e))
    }
}

impl From<ModuleError> for Interrupt {
    fn from(e: ModuleError) -> Self {
        Interrupt::Error(FlowError::Module(e))
    }
}

/// How a program finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Completed,
    Failed { code: i64, message: String },
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Completed)
    }
}

pub struct Interpreter {
    pub(crate) ctx: ExecutionContext,
    globals: Rc<Environment>,
    /// Names of the functions currently executing, for the recursion policy.
    call_stack: Vec<String>,
    /// Path of the file currently executing; imports resolve relative to it.
    current_origin: Option<PathBuf>,
    /// Collector active while a library's top level runs.
    collecting_exports: Option<IndexMap<String, Value>>,
}

impl Interpreter {
    pub fn new(ctx: ExecutionContext) -> Self {
        Interpreter {
            ctx,
            globals: Environment::global(),
            call_stack: Vec::new(),
            current_origin: None,
            collecting_exports: None,
        }
    }

    pub fn with_origin(ctx: ExecutionContext, origin: Option<PathBuf>) -> Self {
        let mut interp = Self::new(ctx);
        interp.current_origin = origin;
        interp
    }

    pub fn globals(&self) -> Rc<Environment> {
        self.globals.clone()
    }

    /// Execute a whole program. `exit 0` and falling off the end both
    /// complete; `exit N` fails with N; uncaught errors fail with code 1.
    pub fn run_program(&mut self, program: &Program) -> ExitOutcome {
        let env = self.globals.clone();
        match self.exec_block(&program.statements, &env) {
            Ok(_) => ExitOutcome::Completed,
            Err(Interrupt::Exit { code, message }) => {
                if code == 0 {
                    ExitOutcome::Completed
                } else {
                    ExitOutcome::Failed {
                        code,
                        message: message.unwrap_or_else(|| format!("exit {}", code)),
                    }
                }
            }
            Err(Interrupt::Error(e)) => ExitOutcome::Failed {
                code: 1,
                message: self.format_error(&e),
            },
        }
    }

    fn format_error(&self, error: &FlowError) -> String {
        let text = self
            .ctx
            .messages
            .resolve(error.message_key())
            .map(|prefix| format!("{}: {}", prefix, error))
            .unwrap_or_else(|| error.to_string());
        match &self.current_origin {
            Some(origin) => format!("{}: {}", origin.display(), text),
            None => text,
        }
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    pub(crate) fn exec_block(
        &mut self,
        statements: &[Stmt],
        env: &Rc<Environment>,
    ) -> Result<Flow, Interrupt> {
        for stmt in statements {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        env: &Rc<Environment>,
    ) -> Result<Flow, Interrupt> {
        match stmt {
            Stmt::Let { name, value, .. } => {
                let v = self.eval_expr(value, env)?;
                env.declare(name.clone(), v);
                Ok(Flow::Normal)
            }

            Stmt::Const { name, value, .. } => {
                let v = self.eval_expr(value, env)?;
                env.declare_const(name.clone(), v);
                Ok(Flow::Normal)
            }

            Stmt::Assign {
                target,
                value,
                line,
            } => {
                let v = self.eval_expr(value, env)?;
                self.assign(target, v, env, *line)?;
                Ok(Flow::Normal)
            }

            Stmt::If {
                cond,
                then_block,
                else_block,
                ..
            } => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.exec_block(then_block, env)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block, env)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::When { subject, cases, .. } => {
                let scrutinee = self.eval_expr(subject, env)?;
                for case in cases {
                    if case.otherwise {
                        return self.exec_block(&case.body, env);
                    }
                    for label in &case.labels {
                        let label_value = self.eval_expr(label, env)?;
                        if scrutinee.value_eq(&label_value) {
                            return self.exec_block(&case.body, env);
                        }
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::For {
                vars,
                iterable,
                body,
                line,
            } => {
                let source = self.eval_expr(iterable, env)?;
                let items = match &source {
                    Value::List(_) | Value::Dict(_) | Value::String(_) => {
                        iterable_items("for", &source).map_err(|e| e.at(*line))?
                    }
                    other => {
                        return Err(RuntimeErrorKind::NotIterable {
                            type_name: other.type_name().to_string(),
                        }
                        .at(*line)
                        .into())
                    }
                };

                for item in items {
                    // Fresh scope per iteration; dropped on every exit path.
                    let iteration = env.child();
                    self.bind_loop_vars(vars, item, &iteration, *line)?;
                    match self.exec_block(body, &iteration)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::While { cond, body, line } => {
                let limit = self.ctx.limits.max_loop_iterations;
                let mut iterations = 0usize;
                loop {
                    if !self.eval_expr(cond, env)?.is_truthy() {
                        break;
                    }
                    iterations += 1;
                    if iterations > limit {
                        return Err(RuntimeErrorKind::LoopLimitExceeded { limit }
                            .at(*line)
                            .into());
                    }
                    let iteration = env.child();
                    match self.exec_block(body, &iteration)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),

            Stmt::Step { label, body, line } => {
                self.ctx.logger.event(LogEvent::StepEntered {
                    label: label.clone(),
                    line: *line,
                });
                // Steps are logging boundaries, not scopes.
                self.exec_block(body, env)
            }

            Stmt::FunctionDef {
                name, params, body, ..
            } => {
                let function = FunctionValue {
                    name: Some(name.clone()),
                    params: params.clone(),
                    body: FunctionBody::Block(Rc::new(body.clone())),
                    env: env.capture(),
                };
                env.declare(name.clone(), Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(v))
            }

            // The declaration itself is parse-time metadata.
            Stmt::Library { .. } => Ok(Flow::Normal),

            Stmt::Export { decl, line } => {
                self.exec_stmt(decl, env)?;
                let exported_name = match decl.as_ref() {
                    Stmt::Let { name, .. }
                    | Stmt::Const { name, .. }
                    | Stmt::FunctionDef { name, .. } => Some(name.clone()),
                    _ => None,
                };
                if let (Some(name), Some(collector)) =
                    (exported_name, self.collecting_exports.as_mut())
                {
                    if let Some(value) = env.get(&name) {
                        collector.insert(name, value);
                    } else {
                        return Err(RuntimeErrorKind::UndefinedVariable { name }
                            .at(*line)
                            .into());
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::ImportAll { alias, path, line } => {
                let exports = self.import_module(path, *line)?;
                env.declare(
                    alias.clone(),
                    Value::Namespace(Rc::new(ModuleNamespace::new(exports))),
                );
                Ok(Flow::Normal)
            }

            Stmt::ImportMembers { names, path, line } => {
                let exports = self.import_module(path, *line)?;
                for name in names {
                    let value = exports.exports.get(name).cloned().ok_or_else(|| {
                        RuntimeErrorKind::MemberNotExported {
                            member: name.clone(),
                            library: exports.library.clone(),
                        }
                        .at(*line)
                    })?;
                    env.declare(name.clone(), value);
                }
                Ok(Flow::Normal)
            }

            Stmt::Exit {
                code,
                message,
                line,
            } => {
                let code = match code {
                    Some(expr) => match self.eval_expr(expr, env)? {
                        Value::Int(n) => n,
                        other => {
                            return Err(RuntimeErrorKind::bad_argument(
                                "exit",
                                format!("code must be an integer, got {}", other.type_name()),
                            )
                            .at(*line)
                            .into())
                        }
                    },
                    None => 0,
                };
                let message = match message {
                    Some(expr) => Some(self.eval_expr(expr, env)?.to_display_string()),
                    None => None,
                };
                Err(Interrupt::Exit { code, message })
            }

            Stmt::Log { value, line } => {
                let v = self.eval_expr(value, env)?;
                self.ctx.logger.event(LogEvent::ScriptLog {
                    text: v.to_display_string(),
                    line: *line,
                });
                Ok(Flow::Normal)
            }

            Stmt::Action { action, line } => {
                self.exec_action(action, env, *line)?;
                Ok(Flow::Normal)
            }

            Stmt::Expr { expr, .. } => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn bind_loop_vars(
        &mut self,
        vars: &[String],
        item: Value,
        env: &Rc<Environment>,
        line: usize,
    ) -> Result<(), Interrupt> {
        if vars.len() == 1 {
            env.declare(vars[0].clone(), item);
            return Ok(());
        }
        match &item {
            Value::List(elements) => {
                let elements = elements.borrow();
                if elements.len() != vars.len() {
                    return Err(RuntimeErrorKind::UnpackMismatch {
                        type_name: format!("list of length {}", elements.len()),
                        arity: vars.len(),
                    }
                    .at(line)
                    .into());
                }
                for (var, value) in vars.iter().zip(elements.iter()) {
                    env.declare(var.clone(), value.clone());
                }
                Ok(())
            }
            other => Err(RuntimeErrorKind::UnpackMismatch {
                type_name: other.type_name().to_string(),
                arity: vars.len(),
            }
            .at(line)
            .into()),
        }
    }

    fn assign(
        &mut self,
        target: &crate::ast::AssignTarget,
        value: Value,
        env: &Rc<Environment>,
        line: usize,
    ) -> Result<(), Interrupt> {
        use crate::ast::AssignTarget;
        match target {
            AssignTarget::Name(name) => {
                env.assign(name, value).map_err(|e| e.at(line))?;
                Ok(())
            }
            AssignTarget::Member { object, member } => {
                let object = self.eval_expr(object, env)?;
                match object {
                    Value::Dict(entries) => {
                        entries.borrow_mut().insert(member.clone(), value);
                        Ok(())
                    }
                    other => Err(RuntimeErrorKind::MemberNotFound {
                        member: member.clone(),
                        type_name: other.type_name().to_string(),
                    }
                    .at(line)
                    .into()),
                }
            }
            AssignTarget::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                match (&object, &index) {
                    (Value::List(items), Value::Int(i)) => {
                        let mut items = items.borrow_mut();
                        let len = items.len();
                        let idx = resolve_index(*i, len).ok_or_else(|| {
                            RuntimeErrorKind::IndexOutOfRange { index: *i, len }.at(line)
                        })?;
                        items[idx] = value;
                        Ok(())
                    }
                    (Value::Dict(entries), Value::String(key)) => {
                        entries.borrow_mut().insert(key.clone(), value);
                        Ok(())
                    }
                    (container, idx) => Err(RuntimeErrorKind::BadOperands {
                        op: "[]=".to_string(),
                        lhs: container.type_name().to_string(),
                        rhs: idx.type_name().to_string(),
                    }
                    .at(line)
                    .into()),
                }
            }
        }
    }

    // ========================================================================
    // Domain actions
    // ========================================================================

    fn exec_action(
        &mut self,
        action: &ActionStmt,
        env: &Rc<Environment>,
        line: usize,
    ) -> Result<(), Interrupt> {
        // Assertions are evaluated in-core; everything else goes to the host.
        if let ActionStmt::Assert { cond, message } = action {
            let passed = self.eval_expr(cond, env)?.is_truthy();
            if !passed {
                let message = match message {
                    Some(expr) => self.eval_expr(expr, env)?.to_display_string(),
                    None => "condition was falsy".to_string(),
                };
                return Err(RuntimeErrorKind::AssertionFailed { message }
                    .at(line)
                    .into());
            }
            return Ok(());
        }

        let mut params = Kwargs::new();
        let mut extract_into: Option<&str> = None;
        match action {
            ActionStmt::Navigate { url } => {
                let url = self.eval_expr(url, env)?;
                params.insert("url".to_string(), url);
            }
            ActionStmt::Click { selector }
            | ActionStmt::Check { selector }
            | ActionStmt::Hover { selector } => {
                let selector = self.eval_expr(selector, env)?;
                params.insert("selector".to_string(), selector);
            }
            ActionStmt::TypeText { text, selector } => {
                let text = self.eval_expr(text, env)?;
                let selector = self.eval_expr(selector, env)?;
                params.insert("text".to_string(), text);
                params.insert("selector".to_string(), selector);
            }
            ActionStmt::WaitSeconds { seconds } => {
                let seconds = self.eval_expr(seconds, env)?;
                params.insert("seconds".to_string(), seconds);
            }
            ActionStmt::WaitFor { selector } => {
                let selector = self.eval_expr(selector, env)?;
                params.insert("selector".to_string(), selector);
            }
            ActionStmt::Screenshot { name } => {
                if let Some(name) = name {
                    let name = self.eval_expr(name, env)?;
                    params.insert("name".to_string(), name);
                }
            }
            ActionStmt::Scroll { target } => {
                let target = self.eval_expr(target, env)?;
                params.insert("target".to_string(), target);
            }
            ActionStmt::Extract { source, into } => {
                let source = self.eval_expr(source, env)?;
                params.insert("source".to_string(), source);
                extract_into = Some(into.as_str());
            }
            ActionStmt::Upload { file, selector } => {
                let file = self.eval_expr(file, env)?;
                let selector = self.eval_expr(selector, env)?;
                params.insert("file".to_string(), file);
                params.insert("selector".to_string(), selector);
            }
            ActionStmt::Select { option, selector } => {
                let option = self.eval_expr(option, env)?;
                let selector = self.eval_expr(selector, env)?;
                params.insert("option".to_string(), option);
                params.insert("selector".to_string(), selector);
            }
            ActionStmt::Assert { .. } => unreachable!("handled above"),
        }

        let kind = action.kind();
        let result = self
            .ctx
            .actions
            .borrow_mut()
            .execute(kind, params, line)
            .map_err(|e| e.at(line))?;
        self.ctx.logger.event(LogEvent::ActionExecuted {
            action: kind.to_string(),
            line,
        });

        if let Some(name) = extract_into {
            if env.assign(name, result.clone()).is_err() {
                env.declare(name.to_string(), result);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Function calls
    // ========================================================================

    pub(crate) fn call_function(
        &mut self,
        function: &Rc<FunctionValue>,
        args: Vec<Value>,
        line: usize,
    ) -> Result<Value, Interrupt> {
        let display_name = function
            .name
            .clone()
            .unwrap_or_else(|| "<lambda>".to_string());

        if args.len() != function.params.len() {
            return Err(RuntimeErrorKind::wrong_arity(
                &display_name,
                function.params.len(),
                args.len(),
            )
            .at(line)
            .into());
        }

        if self.call_stack.len() >= self.ctx.limits.max_call_depth {
            return Err(RuntimeErrorKind::CallDepthExceeded {
                limit: self.ctx.limits.max_call_depth,
            }
            .at(line)
            .into());
        }
        if !self.ctx.limits.allow_recursion {
            if let Some(name) = &function.name {
                if self.call_stack.iter().any(|frame| frame == name) {
                    return Err(RuntimeErrorKind::RecursionRefused { name: name.clone() }
                        .at(line)
                        .into());
                }
            }
        }

        // The call scope extends the closure environment, not the caller's.
        let call_env = function.env.child();
        for (param, arg) in function.params.iter().zip(args) {
            call_env.declare(param.clone(), arg);
        }

        self.call_stack.push(display_name);
        let result = match &function.body {
            FunctionBody::Block(body) => self.exec_block(body, &call_env).map(|flow| match flow {
                Flow::Return(v) => v,
                Flow::Normal => Value::None,
                // The parser rejects break/continue that would cross a
                // function boundary.
                Flow::Break | Flow::Continue => {
                    unreachable!("loop signal escaped a function body")
                }
            }),
            FunctionBody::Expr(body) => self.eval_expr(body, &call_env),
        };
        self.call_stack.pop();
        result
    }

    // ========================================================================
    // Module imports (two-phase)
    // ========================================================================

    fn import_module(
        &mut self,
        path_str: &str,
        line: usize,
    ) -> Result<Rc<ModuleExports>, Interrupt> {
        let loader = self.ctx.modules.clone();
        let abs = loader
            .resolve(path_str, self.current_origin.as_deref())
            .map_err(|e| e.at(line))?;

        if let Some(cached) = loader.cached(&abs) {
            return Ok(cached);
        }

        loader.begin(&abs).map_err(|e| e.at(line))?;
        let result = self.load_module(&abs, line);
        match result {
            Ok(exports) => {
                loader.finish(&abs, exports.clone());
                self.ctx.logger.event(LogEvent::ModuleLoaded {
                    path: abs.display().to_string(),
                });
                Ok(exports)
            }
            Err(e) => {
                loader.abort(&abs);
                Err(e)
            }
        }
    }

    /// Phase 1: parse in library mode and validate. Phase 2: execute the
    /// declarations in a fresh environment and collect the exports. Every
    /// failure surfaces at the import statement's line.
    fn load_module(&mut self, abs: &Path, line: usize) -> Result<Rc<ModuleExports>, Interrupt> {
        let loader = self.ctx.modules.clone();
        let display = abs.display().to_string();
        let source = loader.read_source(abs).map_err(|e| e.at(line))?;

        let stem = abs
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let options = ParseOptions {
            file_stem: Some(stem.clone()),
            system_names: crate::builtins::system_names_for(&self.ctx),
        };
        let program = parse_source(&source, options).map_err(|e| {
            ModuleErrorKind::LoadFailed {
                path: display.clone(),
                message: e.to_string(),
            }
            .at(line)
        })?;

        if program.library_name.is_none() && loader.strict_imports() {
            return Err(ModuleErrorKind::NotALibrary { path: display }.at(line).into());
        }

        let library_env = Environment::global();
        let saved_origin = self.current_origin.replace(abs.to_path_buf());
        let saved_collector = self.collecting_exports.replace(IndexMap::new());

        let run = self.exec_block(&program.statements, &library_env);

        let collected = self.collecting_exports.take().unwrap_or_default();
        self.collecting_exports = saved_collector;
        self.current_origin = saved_origin;

        run.map_err(|e| match e {
            Interrupt::Error(err) => Interrupt::Error(FlowError::Module(
                ModuleErrorKind::LoadFailed {
                    path: display.clone(),
                    message: err.to_string(),
                }
                .at(line),
            )),
            exit => exit,
        })?;

        let mut exports = collected;
        if program.library_name.is_none() {
            // Relaxed mode: every top-level const/function is exported.
            for stmt in &program.statements {
                if let Stmt::Const { name, .. } | Stmt::FunctionDef { name, .. } = stmt {
                    if let Some(value) = library_env.get(name) {
                        exports.insert(name.clone(), value);
                    }
                }
            }
        }

        Ok(Rc::new(ModuleExports {
            library: program.library_name.unwrap_or(stem),
            exports,
        }))
    }
}

/// Map a possibly-negative index onto a sequence of the given length.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    if (0..len).contains(&idx) {
        Some(idx as usize)
    } else {
        None
    }
}
