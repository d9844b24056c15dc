// ABOUTME: CLI entry point: run a script file or start the REPL

use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use flowby::config::{self, ModuleConfig, NetConfig, RunLimits};
use flowby::context::{ConsoleInput, ExecutionContext};
use flowby::interp::ExitOutcome;
use flowby::repl;

/// Flowby: a Python-indented DSL for web-automation workflows
#[derive(Parser, Debug)]
#[command(name = "flowby")]
#[command(version = config::VERSION)]
#[command(about = "Run Flowby workflow scripts")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts a REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Add a module search root (can be repeated)
    #[arg(long = "lib-path", value_name = "PATH", action = clap::ArgAction::Append)]
    lib_paths: Vec<PathBuf>,

    /// Iteration ceiling for while loops
    #[arg(long = "max-loop-iterations", value_name = "N", default_value = "10000")]
    max_loop_iterations: usize,

    /// Permit recursive function calls (bounded by --max-call-depth)
    #[arg(long = "allow-recursion")]
    allow_recursion: bool,

    /// Call stack depth ceiling
    #[arg(long = "max-call-depth", value_name = "N", default_value = "64")]
    max_call_depth: usize,

    /// Enable network I/O for the http namespace
    #[arg(long = "allow-network")]
    allow_network: bool,

    /// Add an allowed network address (can be repeated)
    #[arg(long = "net-allow", value_name = "ADDR", action = clap::ArgAction::Append)]
    net_addresses: Vec<String>,

    /// Allow importing files without a 'library' declaration
    #[arg(long = "relaxed-imports")]
    relaxed_imports: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let limits = RunLimits {
        max_loop_iterations: args.max_loop_iterations,
        allow_recursion: args.allow_recursion,
        max_call_depth: args.max_call_depth,
    };
    let net = NetConfig {
        enabled: args.allow_network,
        allowed_addresses: args.net_addresses.clone(),
        timeout_ms: None,
    };
    let mut module_config = ModuleConfig::default();
    module_config.strict_imports = !args.relaxed_imports;
    for path in args.lib_paths.iter().rev() {
        module_config.search_roots.insert(0, path.clone());
    }

    let interactive = args.script.is_none();
    let context = ExecutionContext::builder()
        .limits(limits)
        .net(net)
        .modules(module_config)
        .input(Rc::new(RefCell::new(ConsoleInput { interactive })))
        .build();

    match args.script {
        Some(script_path) => {
            let source = std::fs::read_to_string(&script_path)
                .map_err(|e| format!("cannot read {}: {}", script_path.display(), e))?;
            let origin = script_path.display().to_string();
            match flowby::run(&source, &origin, context) {
                ExitOutcome::Completed => Ok(()),
                ExitOutcome::Failed { code, message } => {
                    eprintln!("{}", message);
                    std::process::exit(code.clamp(1, 255) as i32);
                }
            }
        }
        None => repl::run_repl(context),
    }
}
