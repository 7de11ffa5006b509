//! Purpose: `xmi` CLI entry point for driving an XMI kernel from the shell.
//! Role: Binary crate root; parses args, installs logging, runs one command, emits JSON.
//! Invariants: Command results go to stdout as JSON; errors go to stderr (JSON unless a TTY).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Every kernel interaction goes through `api::Session`.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
#[cfg(test)]
#[allow(dead_code)]
#[path = "../tests/common/mock_kernel.rs"]
mod mock_kernel;
mod pretty_json;

use pretty_json::render_json;
use xmi::api::{Error, ErrorKind, Session, SessionOptions, to_exit_code};

const LIB_ENV: &str = "XMI_LIB";
const LOG_ENV: &str = "XMI_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "xmi",
    version,
    about = "Drive a simulation kernel through its XMI/BMI interface",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    kernel: KernelArgs,
    /// Log filter (e.g. `debug`, `xmi=trace`); defaults to $XMI_LOG, then `warn`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct KernelArgs {
    /// Kernel shared library; defaults to $XMI_LIB.
    #[arg(long, global = true)]
    lib: Option<PathBuf>,
    /// Directory holding the kernel's own shared-library dependencies.
    #[arg(long, global = true)]
    lib_dependency: Option<PathBuf>,
    /// Directory the kernel runs in (model input/output paths resolve here).
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,
    /// Time every native call and report the totals.
    #[arg(long, global = true)]
    timing: bool,
    /// Integer global written before initialize, e.g. `ISTDOUTTOFILE=0`; repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_knob, global = true)]
    knobs: Vec<(String, i32)>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print component, version, time frame and exchanged variables.
    Info {
        /// Kernel configuration file; empty selects the kernel's default.
        config: Option<String>,
    },
    /// Advance the model to its end time.
    Run {
        config: Option<String>,
        /// Use the prepare/solve/finalize cycle with at most N outer iterations.
        #[arg(long, value_name = "N")]
        max_iter: Option<u32>,
        /// Stop after at most N time steps.
        #[arg(long, value_name = "N")]
        max_steps: Option<u64>,
    },
    /// Print a variable's descriptor and a copy of its value.
    Get {
        #[command(flatten)]
        var: VarArgs,
        /// Advance N time steps before reading.
        #[arg(long, value_name = "N", default_value_t = 0)]
        after_steps: u64,
    },
    /// Print the grid a variable lives on.
    Grid {
        #[command(flatten)]
        var: VarArgs,
    },
}

#[derive(Args, Debug)]
struct VarArgs {
    /// Variable name, e.g. `X`.
    var: String,
    /// Component name, e.g. `SLN_1` or a model name.
    component: String,
    #[arg(long, default_value = "")]
    subcomponent: String,
    #[arg(long)]
    config: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run(std::env::args_os()) {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run<I>(args: I) -> Result<RunOutcome, (Error, ColorMode)>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Input).with_message(clap_error_summary(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    init_tracing(cli.log_level.as_deref()).map_err(|err| (err, color_mode))?;
    command_dispatch::dispatch_command(cli.command, &cli.kernel, color_mode)
        .map_err(|err| (err, color_mode))
}

fn init_tracing(level: Option<&str>) -> Result<(), Error> {
    let env_filter = match level {
        Some(level) => EnvFilter::try_new(level).map_err(|err| {
            Error::new(ErrorKind::Input)
                .with_message(format!("invalid log level '{level}'"))
                .with_source(err)
        })?,
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
    Ok(())
}

fn open_session(args: &KernelArgs) -> Result<Session, Error> {
    let lib = args
        .lib
        .clone()
        .or_else(|| std::env::var_os(LIB_ENV).map(PathBuf::from))
        .ok_or_else(|| {
            Error::new(ErrorKind::Input)
                .with_message(format!("no kernel library given (use --lib or set {LIB_ENV})"))
        })?;

    let mut options = SessionOptions::new().with_timing(args.timing);
    if let Some(dir) = &args.lib_dependency {
        options = options.with_dependency_dir(dir);
    }
    if let Some(dir) = &args.workdir {
        options = options.with_working_directory(dir);
    }

    let session = Session::open(&lib, options)?;
    for (name, value) in &args.knobs {
        session.set_int(name, *value)?;
    }
    Ok(session)
}

fn parse_knob(raw: &str) -> Result<(String, i32), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("global name is empty".to_string());
    }
    let value = value
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("value for {name} is not an integer: '{value}'"))?;
    Ok((name.to_string(), value))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let text = if is_tty || use_color {
        render_json(&value, use_color)
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{text}");
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = if color_mode.use_color(is_tty) {
            "\u{1b}[31merror:\u{1b}[0m"
        } else {
            "error:"
        };
        eprintln!("{label} {err}");
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(err.to_string()));
    if let Some(function) = err.function() {
        inner.insert("function".to_string(), json!(function));
    }
    if let Some(detail) = err.detail() {
        inner.insert("detail".to_string(), json!(detail));
    }
    if let Some(component) = err.component() {
        inner.insert("component".to_string(), json!(component));
    }
    if let Some(kernel_message) = err.kernel_message() {
        inner.insert("kernel_message".to_string(), json!(kernel_message));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    json!({ "error": Value::Object(inner) })
}
