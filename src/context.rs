// ABOUTME: Execution context and the collaborator traits the interpreter
// calls into: actions, namespaces, resources, input, logging

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::builtins::{BuiltinRegistry, NamespaceRegistry};
use crate::config::{ModuleConfig, NetConfig, RunLimits};
use crate::error::RuntimeErrorKind;
use crate::i18n::{DefaultMessages, MessageResolver};
use crate::modules::ModuleLoader;
use crate::value::Value;

/// Named call arguments, insertion-ordered.
pub type Kwargs = IndexMap<String, Value>;

/// A host-provided namespace: `Math`, `http`, `page`, a loaded library, or
/// a `Resource(...)` handle. The core never reflects on concrete types; it
/// only speaks this protocol.
pub trait NamespaceCall {
    fn name(&self) -> &str;

    /// Data members readable by `ns.member` without a call. Module exports
    /// live here; built-in namespaces usually have none.
    fn get(&self, _member: &str) -> Option<Value> {
        None
    }

    /// `ns.method(args, kwargs)`.
    fn invoke(&self, method: &str, args: &[Value], kwargs: &Kwargs)
        -> Result<Value, RuntimeErrorKind>;
}

/// Receiver for domain actions (`navigate`, `click`, `type`, ...). One call
/// per action; parameters arrive fully evaluated.
pub trait ActionHost {
    fn execute(
        &mut self,
        action: &str,
        params: Kwargs,
        line: usize,
    ) -> Result<Value, RuntimeErrorKind>;
}

/// Collaborator behind the `Resource(...)` built-in.
pub trait ResourceLoader {
    fn load(&self, path: &str) -> Result<Rc<dyn NamespaceCall>, RuntimeErrorKind>;
}

/// Collaborator behind `input(...)`. May block.
pub trait InputSource {
    fn read(
        &mut self,
        prompt: &str,
        default: Option<Value>,
        ty: Option<&str>,
    ) -> Result<Value, RuntimeErrorKind>;
}

/// Structured events emitted during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    StepEntered { label: String, line: usize },
    ActionExecuted { action: String, line: usize },
    ScriptLog { text: String, line: usize },
    ModuleLoaded { path: String },
}

pub trait Logger {
    fn event(&self, event: LogEvent);
}

// ============================================================================
// Default collaborator implementations
// ============================================================================

/// Logs every action instead of driving a browser. The default host for
/// dry runs and the CLI without a driver attached.
pub struct ConsoleActionHost;

impl ActionHost for ConsoleActionHost {
    fn execute(
        &mut self,
        action: &str,
        params: Kwargs,
        _line: usize,
    ) -> Result<Value, RuntimeErrorKind> {
        let rendered: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.to_display_string()))
            .collect();
        println!("[action] {} {}", action, rendered.join(" "));
        Ok(Value::None)
    }
}

/// Captures the action stream for assertions in tests. `responses` maps an
/// action name to the value each call of it returns (extract, mostly).
#[derive(Default)]
pub struct RecordingActionHost {
    pub executed: Vec<(String, Kwargs)>,
    pub responses: IndexMap<String, Value>,
    pub fail_on: Option<String>,
}

impl RecordingActionHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to(mut self, action: &str, value: Value) -> Self {
        self.responses.insert(action.to_string(), value);
        self
    }
}

impl ActionHost for RecordingActionHost {
    fn execute(
        &mut self,
        action: &str,
        params: Kwargs,
        _line: usize,
    ) -> Result<Value, RuntimeErrorKind> {
        if self.fail_on.as_deref() == Some(action) {
            return Err(RuntimeErrorKind::ActionFailed {
                action: action.to_string(),
                message: "forced failure".to_string(),
            });
        }
        self.executed.push((action.to_string(), params));
        Ok(self
            .responses
            .get(action)
            .cloned()
            .unwrap_or(Value::None))
    }
}

/// Refuses every `Resource(...)` call. Hosts with an OpenAPI loader inject
/// their own implementation.
pub struct NullResourceLoader;

impl ResourceLoader for NullResourceLoader {
    fn load(&self, path: &str) -> Result<Rc<dyn NamespaceCall>, RuntimeErrorKind> {
        Err(RuntimeErrorKind::Host {
            message: format!("no resource loader configured (Resource(\"{}\"))", path),
        })
    }
}

/// Reads from stdin when interactive; otherwise falls back to the default
/// or refuses.
pub struct ConsoleInput {
    pub interactive: bool,
}

impl InputSource for ConsoleInput {
    fn read(
        &mut self,
        prompt: &str,
        default: Option<Value>,
        _ty: Option<&str>,
    ) -> Result<Value, RuntimeErrorKind> {
        if !self.interactive {
            return default.ok_or(RuntimeErrorKind::InputRequired);
        }
        use std::io::Write;
        print!("{} ", prompt);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| RuntimeErrorKind::Host {
                message: format!("cannot read input: {}", e),
            })?;
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            if let Some(d) = default {
                return Ok(d);
            }
        }
        Ok(Value::string(trimmed))
    }
}

/// A canned input source for tests and non-interactive runs.
#[derive(Default)]
pub struct QueuedInput {
    pub queue: Vec<Value>,
}

impl InputSource for QueuedInput {
    fn read(
        &mut self,
        _prompt: &str,
        default: Option<Value>,
        _ty: Option<&str>,
    ) -> Result<Value, RuntimeErrorKind> {
        if self.queue.is_empty() {
            default.ok_or(RuntimeErrorKind::InputRequired)
        } else {
            Ok(self.queue.remove(0))
        }
    }
}

pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn event(&self, event: LogEvent) {
        match event {
            LogEvent::StepEntered { label, .. } => println!("=== {} ===", label),
            LogEvent::ScriptLog { text, .. } => println!("{}", text),
            LogEvent::ActionExecuted { .. } | LogEvent::ModuleLoaded { .. } => {}
        }
    }
}

/// Collects events for assertions in tests.
#[derive(Default)]
pub struct RecordingLogger {
    pub events: RefCell<Vec<LogEvent>>,
}

impl Logger for RecordingLogger {
    fn event(&self, event: LogEvent) {
        self.events.borrow_mut().push(event);
    }
}

// ============================================================================
// ExecutionContext
// ============================================================================

/// Everything the interpreter needs injected at construction time. No
/// process-wide state: each run carries its own context.
pub struct ExecutionContext {
    pub actions: Rc<RefCell<dyn ActionHost>>,
    pub namespaces: NamespaceRegistry,
    pub builtins: BuiltinRegistry,
    pub modules: Rc<ModuleLoader>,
    pub resources: Rc<dyn ResourceLoader>,
    pub input: Rc<RefCell<dyn InputSource>>,
    pub logger: Rc<dyn Logger>,
    pub messages: Rc<dyn MessageResolver>,
    pub limits: RunLimits,
}

impl ExecutionContext {
    /// A context wired with the bundled collaborators: console action host,
    /// default namespaces, no resource loader, non-interactive input.
    pub fn with_defaults() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder::default()
    }
}

#[derive(Default)]
pub struct ExecutionContextBuilder {
    actions: Option<Rc<RefCell<dyn ActionHost>>>,
    resources: Option<Rc<dyn ResourceLoader>>,
    input: Option<Rc<RefCell<dyn InputSource>>>,
    logger: Option<Rc<dyn Logger>>,
    messages: Option<Rc<dyn MessageResolver>>,
    net: NetConfig,
    module_config: Option<ModuleConfig>,
    limits: RunLimits,
    extra_globals: Vec<String>,
    extra_namespaces: Vec<Rc<dyn NamespaceCall>>,
}

impl ExecutionContextBuilder {
    pub fn actions(mut self, host: Rc<RefCell<dyn ActionHost>>) -> Self {
        self.actions = Some(host);
        self
    }

    pub fn resources(mut self, loader: Rc<dyn ResourceLoader>) -> Self {
        self.resources = Some(loader);
        self
    }

    pub fn input(mut self, input: Rc<RefCell<dyn InputSource>>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn logger(mut self, logger: Rc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn messages(mut self, messages: Rc<dyn MessageResolver>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn net(mut self, net: NetConfig) -> Self {
        self.net = net;
        self
    }

    pub fn modules(mut self, config: ModuleConfig) -> Self {
        self.module_config = Some(config);
        self
    }

    pub fn limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Extra names the host injects as always-defined globals.
    pub fn global_name(mut self, name: &str) -> Self {
        self.extra_globals.push(name.to_string());
        self
    }

    /// Register a host namespace, replacing any default with the same name
    /// (a driver host supplies `page` and `response` this way).
    pub fn namespace(mut self, ns: Rc<dyn NamespaceCall>) -> Self {
        self.extra_namespaces.push(ns);
        self
    }

    pub fn build(self) -> ExecutionContext {
        let mut namespaces = crate::builtins::default_namespaces(&self.net);
        for ns in self.extra_namespaces {
            namespaces.register(ns);
        }
        let mut builtins = BuiltinRegistry::new();
        crate::builtins::free::register(&mut builtins);
        for name in &self.extra_globals {
            builtins.note_injected(name);
        }

        ExecutionContext {
            actions: self
                .actions
                .unwrap_or_else(|| Rc::new(RefCell::new(ConsoleActionHost))),
            namespaces,
            builtins,
            modules: Rc::new(ModuleLoader::new(self.module_config.unwrap_or_default())),
            resources: self.resources.unwrap_or_else(|| Rc::new(NullResourceLoader)),
            input: self
                .input
                .unwrap_or_else(|| Rc::new(RefCell::new(ConsoleInput { interactive: false }))),
            logger: self.logger.unwrap_or_else(|| Rc::new(ConsoleLogger)),
            messages: self.messages.unwrap_or_else(|| Rc::new(DefaultMessages)),
            limits: self.limits,
        }
    }
}
