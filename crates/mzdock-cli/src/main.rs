mod output;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use mzdock_workspace::{
    import_directory, ingest, params, remove_experiments, reset_all, run_pairing_cycle,
    AppConfig, CycleOutcome, DockError, IngestOutcome, Mode, MzmlParser, ParameterOverrides,
    Parameters, Reporter, SessionContext, UploadedFile, WorkspaceHandle, WorkspaceManager,
};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::output::Output;

#[derive(Parser)]
#[command(
    name = "mzdock",
    version,
    about = "Workspaces and upload pairing for deconvolved mzML results"
)]
struct Cli {
    /// Directory holding all workspaces.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Run as a hosted multi-tenant instance.
    #[arg(long, global = true)]
    hosted: bool,
    /// Answer for the hosted verification gate.
    #[arg(long, global = true)]
    token: Option<String>,
    /// Existing workspace to work in. In hosted mode, leaving it out gives
    /// commands that store data a brand-new workspace, which stays on disk;
    /// `status` and `params show` then report defaults and create nothing.
    #[arg(long, global = true)]
    workspace: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Session parameter override, `key=value`.
    #[arg(long = "set", global = true)]
    set_values: Vec<String>,
    #[arg(long, global = true)]
    json: bool,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Workspace(WorkspaceCommand),
    /// Add *_deconv.mzML / *_annotated.mzML files and parse new pairs.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Add every matching file from a directory, e.g. bundled example data.
    Import { dir: PathBuf },
    /// Parse pending pairs and show the experiment table.
    Status,
    Remove {
        #[arg(required_unless_present = "all")]
        experiments: Vec<String>,
        #[arg(long, conflicts_with = "experiments")]
        all: bool,
    },
    /// Write the experiment table as TSV.
    Export { out: PathBuf },
    #[command(subcommand)]
    Params(ParamsCommand),
}

impl Commands {
    fn is_read_only(&self) -> bool {
        matches!(self, Commands::Status | Commands::Params(ParamsCommand::Show))
    }
}

#[derive(Subcommand)]
enum WorkspaceCommand {
    List,
    Show,
    Create { name: String },
    Delete { name: String },
}

#[derive(Subcommand)]
enum ParamsCommand {
    Show,
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut output = Output::new(cli.json);
    let result = run_command(cli, &mut output);
    match result {
        Ok(payload) => {
            if output.is_json() {
                emit_json(&json!({
                    "ok": true,
                    "result": payload,
                    "events": output.events(),
                }));
            }
            Ok(())
        }
        Err(err) => {
            if output.is_json() {
                let code = err
                    .downcast_ref::<DockError>()
                    .map(DockError::code)
                    .unwrap_or("command_failed");
                emit_json(&json_error(
                    code,
                    format!("{:#}", err),
                    json!({ "events": output.events() }),
                ));
                std::process::exit(1);
            }
            let soft = err
                .downcast_ref::<DockError>()
                .map(DockError::is_soft)
                .unwrap_or(false);
            if soft && output.reported_problems() {
                return Ok(());
            }
            Err(err)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_command(cli: Cli, output: &mut Output) -> Result<Value> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.workspaces_root = root;
    }
    if cli.hosted {
        config.mode = Mode::Hosted;
    }
    debug!(
        root = %config.workspaces_root.display(),
        mode = config.mode.as_str(),
        "configuration loaded"
    );
    let manager = WorkspaceManager::new(&config);
    let mut session = manager.open_session();
    if config.mode == Mode::Hosted {
        let answer = cli.token.as_deref().unwrap_or_default();
        if !manager.verify(&mut session, answer) {
            return Err(DockError::AccessDenied.into());
        }
    }
    let json_mode = output.is_json();
    let reporter = output.reporter();

    let command = match cli.command {
        Commands::Workspace(cmd) => {
            return workspace_command(
                &manager,
                &config,
                &mut session,
                cli.workspace.as_deref(),
                cmd,
                json_mode,
                reporter,
            );
        }
        other => other,
    };

    if config.mode == Mode::Hosted && cli.workspace.is_none() && command.is_read_only() {
        let mut overrides = ParameterOverrides::default();
        for raw in &cli.set_values {
            overrides.set_binding(raw)?;
        }
        return without_workspace(&command, &overrides, json_mode, reporter);
    }

    let workspace = bind(&manager, &config, &mut session, cli.workspace.as_deref())?;
    if cli.workspace.is_none() {
        if let Some(notice) = manager.info(&session)?.share_notice {
            reporter.info(&notice);
        }
    }
    for raw in &cli.set_values {
        session.overrides.set_binding(raw)?;
    }
    let mut page_params = params::load(&workspace, false)?;

    let ctx = Page {
        config: &config,
        workspace: &workspace,
        json_mode,
    };
    let result = ctx.run(command, &mut session, &mut page_params, reporter);
    params::save(&workspace, &page_params, &session.overrides)?;
    result
}

struct Page<'a> {
    config: &'a AppConfig,
    workspace: &'a WorkspaceHandle,
    json_mode: bool,
}

impl Page<'_> {
    fn run(
        &self,
        command: Commands,
        session: &mut SessionContext,
        page_params: &mut Parameters,
        reporter: &mut dyn Reporter,
    ) -> Result<Value> {
        match command {
            Commands::Upload { files } => {
                let mut uploads = Vec::new();
                for path in &files {
                    let upload = UploadedFile::from_path(path)?;
                    let outcome = ingest(session, &upload)?;
                    uploads.push(outcome_json(&upload.name, outcome));
                }
                reporter.success("Successfully added uploaded files!");
                let cycle = self.cycle(session, reporter)?;
                Ok(json!({ "uploads": uploads, "cycle": cycle }))
            }
            Commands::Import { dir } => {
                let outcomes = import_directory(session, &dir)?;
                let uploads: Vec<Value> = outcomes
                    .iter()
                    .map(|(name, outcome)| outcome_json(name, *outcome))
                    .collect();
                reporter.success("Example mzML files loaded!");
                let cycle = self.cycle(session, reporter)?;
                Ok(json!({ "uploads": uploads, "cycle": cycle }))
            }
            Commands::Status => self.cycle(session, reporter),
            Commands::Remove { experiments, all } => {
                if all {
                    reset_all(session, reporter)?;
                    return Ok(json!({ "removed": "all" }));
                }
                self.cycle_allowing_soft(session, reporter)?;
                let removed = remove_experiments(session, &experiments, reporter)?;
                Ok(json!({ "removed": removed }))
            }
            Commands::Export { out } => {
                self.cycle_allowing_soft(session, reporter)?;
                let table = session.cache.summary();
                table.export_tsv(&out)?;
                reporter.success(&format!(
                    "Wrote {} experiments to {}",
                    table.len(),
                    out.display()
                ));
                Ok(json!({ "out": out.display().to_string(), "experiments": table.len() }))
            }
            Commands::Params(ParamsCommand::Show) => {
                let effective = params::merge_overrides(page_params, &session.overrides)?;
                show_params(&effective, self.json_mode)
            }
            Commands::Params(ParamsCommand::Reset) => {
                *page_params = params::load(self.workspace, true)?;
                reporter.success("Parameters reset to defaults.");
                Ok(serde_json::to_value(&*page_params)?)
            }
            Commands::Workspace(_) => Err(anyhow!("workspace commands do not run inside a page")),
        }
    }

    fn cycle(&self, session: &mut SessionContext, reporter: &mut dyn Reporter) -> Result<Value> {
        let outcome = run_pairing_cycle(session, &MzmlParser, &self.config.pairing, reporter)?;
        Ok(cycle_to_json(&outcome))
    }

    /// Like `cycle`, but an unpairable upload (already reported) leaves the
    /// experiments parsed so far in place instead of failing the command.
    fn cycle_allowing_soft(
        &self,
        session: &mut SessionContext,
        reporter: &mut dyn Reporter,
    ) -> Result<Value> {
        match run_pairing_cycle(session, &MzmlParser, &self.config.pairing, reporter) {
            Ok(outcome) => Ok(cycle_to_json(&outcome)),
            Err(err) if err.is_soft() => {
                debug!(error = %err, "continuing after incomplete pairing cycle");
                Ok(json!({
                    "status": "incomplete",
                    "error": err.code(),
                    "experiments": session.cache.summary().rows(),
                }))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Read-only commands in hosted mode without `--workspace`: a new workspace
/// would be empty, so answer from defaults.
fn without_workspace(
    command: &Commands,
    overrides: &ParameterOverrides,
    json_mode: bool,
    reporter: &mut dyn Reporter,
) -> Result<Value> {
    match command {
        Commands::Params(ParamsCommand::Show) => {
            let effective = params::merge_overrides(&Parameters::defaults()?, overrides)?;
            show_params(&effective, json_mode)
        }
        _ => {
            reporter.info("No mzML added yet!");
            Ok(cycle_to_json(&CycleOutcome::NothingUploaded))
        }
    }
}

fn show_params(effective: &Parameters, json_mode: bool) -> Result<Value> {
    let value = serde_json::to_value(effective)?;
    if !json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(value)
}

fn workspace_command(
    manager: &WorkspaceManager,
    config: &AppConfig,
    session: &mut SessionContext,
    requested: Option<&str>,
    command: WorkspaceCommand,
    json_mode: bool,
    reporter: &mut dyn Reporter,
) -> Result<Value> {
    match command {
        WorkspaceCommand::List => {
            let names = manager.list_workspaces(session)?;
            if !json_mode {
                for name in &names {
                    println!("{}", name);
                }
            }
            Ok(json!({ "workspaces": names }))
        }
        WorkspaceCommand::Show => {
            bind(manager, config, session, requested)?;
            let info = manager.info(session)?;
            if !json_mode {
                println!("workspace: {}", info.name);
                println!("path: {}", info.path.display());
                println!("mode: {}", info.mode);
                println!("deconvolved files: {}", info.deconvolved_files);
                println!("annotated files: {}", info.annotated_files);
                if let Some(notice) = &info.share_notice {
                    println!("{}", notice);
                }
            }
            Ok(serde_json::to_value(&info)?)
        }
        WorkspaceCommand::Create { name } => {
            let workspace = manager.create_workspace(session, &name)?;
            let defaults = params::load(&workspace, false)?;
            params::save(&workspace, &defaults, &session.overrides)?;
            reporter.success(&format!("Created workspace {}", workspace.name()));
            Ok(json!({ "workspace": workspace.name(), "path": workspace.path().display().to_string() }))
        }
        WorkspaceCommand::Delete { name } => {
            if requested.is_some() {
                bind(manager, config, session, requested)?;
            }
            manager.delete_workspace(session, &name)?;
            reporter.success(&format!("Deleted workspace {}", name));
            let current = session.workspace().map(|w| w.name().to_string());
            Ok(json!({ "deleted": name, "current": current }))
        }
    }
}

fn bind(
    manager: &WorkspaceManager,
    config: &AppConfig,
    session: &mut SessionContext,
    requested: Option<&str>,
) -> Result<WorkspaceHandle, DockError> {
    match requested {
        Some(name) if manager.mode() == Mode::Local && name == config.default_workspace => {
            manager.resolve_workspace(session)
        }
        Some(name) => manager.switch_workspace(session, name),
        None => manager.resolve_workspace(session),
    }
}

fn cycle_to_json(outcome: &CycleOutcome) -> Value {
    match outcome {
        CycleOutcome::NothingUploaded => json!({ "status": "nothing_uploaded", "experiments": [] }),
        CycleOutcome::UpToDate(table) => json!({
            "status": "up_to_date",
            "parsed": [],
            "experiments": table.rows(),
        }),
        CycleOutcome::Parsed { experiments, table } => json!({
            "status": "parsed",
            "parsed": experiments,
            "experiments": table.rows(),
        }),
    }
}

fn outcome_json(name: &str, outcome: IngestOutcome) -> Value {
    let (status, bucket) = match outcome {
        IngestOutcome::Stored(bucket) => ("stored", Some(bucket)),
        IngestOutcome::Duplicate(bucket) => ("duplicate", Some(bucket)),
        IngestOutcome::Skipped => ("skipped", None),
    };
    json!({ "file": name, "status": status, "bucket": bucket })
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}
