//! `dispatch` command-line front end
//!
//! Prints one JSON document per invocation on stdout; logs go to stderr.

use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use dispatch_core::{EngineConfig, ExecutionResult, InputKind, TaskEngine, TaskError};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 1;

fn cli() -> Command {
    Command::new("dispatch")
        .version(dispatch_core::VERSION)
        .about("Classify a free-text task and run it inside a sandboxed data root")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("data-root")
                .long("data-root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory every task reads and writes beneath"),
        )
        .arg(
            Arg::new("api-base")
                .long("api-base")
                .global(true)
                .help("Base URL of an OpenAI-compatible API"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .global(true)
                .env("DISPATCH_API_KEY")
                .hide_env_values(true)
                .help("API key for the model collaborator"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .global(true)
                .help("Completion model used for classification and extraction"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Classify and execute a task")
                .arg(Arg::new("task").required(true).help("Task description")),
        )
        .subcommand(
            Command::new("classify")
                .about("Show how a task would be routed, without executing it")
                .arg(Arg::new("task").required(true).help("Task description")),
        )
        .subcommand(
            Command::new("read")
                .about("Print a file from beneath the data root")
                .arg(Arg::new("path").required(true).help("Path, e.g. /data/dates.txt")),
        )
        .subcommand(Command::new("operations").about("List the operation catalog"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("dispatch=info,dispatch_core=info,dispatch_collab=info,dispatch_sandbox=info")
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<EngineConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(root) = matches.get_one::<PathBuf>("data-root") {
        config = config.with_data_root(root.clone());
    }
    if let Some(base) = matches.get_one::<String>("api-base") {
        config = config.with_api_base(base.clone());
    }
    if let Some(key) = matches.get_one::<String>("api-key") {
        config = config.with_api_key(key.clone());
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config = config.with_completion_model(model.clone());
    }
    Ok(config)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn error_json(err: &TaskError) -> serde_json::Value {
    serde_json::json!({
        "status": "failure",
        "message": err.to_string(),
        "error_kind": err.kind(),
    })
}

fn list_operations(engine: &TaskEngine) -> serde_json::Value {
    let operations: Vec<serde_json::Value> = engine
        .catalog()
        .iter()
        .map(|descriptor| {
            let input = descriptor.input.is_required().then(|| match descriptor.input_kind {
                InputKind::File => "file",
                InputKind::Directory => "directory",
            });
            serde_json::json!({
                "operation": descriptor.id,
                "summary": descriptor.summary,
                "input": input,
                "output": descriptor.output.is_required(),
                "parameters": descriptor.required_parameters,
            })
        })
        .collect();
    serde_json::Value::Array(operations)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config = load_config(&matches)?;
    let engine = TaskEngine::from_config(config).context("starting task engine")?;

    let succeeded = match matches.subcommand() {
        Some(("run", args)) => {
            let task = args.get_one::<String>("task").context("task is required")?;
            let result: ExecutionResult = engine.run(task).await;
            print_json(&serde_json::to_value(&result)?)?;
            result.is_success()
        }
        Some(("classify", args)) => {
            let task = args.get_one::<String>("task").context("task is required")?;
            match engine.classify(task).await {
                Ok(intent) => {
                    print_json(&intent.to_json())?;
                    true
                }
                Err(err) => {
                    print_json(&error_json(&err))?;
                    false
                }
            }
        }
        Some(("read", args)) => {
            let path = args.get_one::<String>("path").context("path is required")?;
            match engine.read_file(path).await {
                Ok(content) => {
                    print!("{content}");
                    true
                }
                Err(err) => {
                    print_json(&error_json(&err))?;
                    false
                }
            }
        }
        Some(("operations", _)) => {
            print_json(&list_operations(&engine))?;
            true
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand {other}"),
        None => anyhow::bail!("a subcommand is required"),
    };

    if !succeeded {
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "dispatch",
                "--data-root",
                "/srv/data",
                "--api-base",
                "http://localhost:8080/v1",
                "--model",
                "small",
                "operations",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/srv/data"));
        assert_eq!(config.collaborator.api_base.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.collaborator.completion_model, "small");
    }

    #[test]
    fn run_requires_task() {
        assert!(cli().try_get_matches_from(["dispatch", "run"]).is_err());
    }

    #[test]
    fn failure_json_carries_kind() {
        let json = error_json(&TaskError::InputNotFound("dates.txt".into()));
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error_kind"], "InputNotFound");
    }
}
