//! The bundling command: discover, plan, then print or execute.

use crate::prompt::StdinPrompt;
use crate::ui::{self, TerminalReporter, Verbosity};
use crate::Cli;
use anyhow::{Context, Result};
use dylibpack_core::{
    BundleError, Bundler, Codesign, DestinationPolicy, Discovery, Executor, FailOnUnresolved,
    InstallNameTool, Otool, Settings, StdFs,
};
use dylibpack_schema::RelocationPlan;

/// Fails early when a required developer tool is not on `PATH`.
fn require_tool(tool: &'static str) -> Result<(), BundleError> {
    which::which(tool)
        .map(drop)
        .map_err(|_| BundleError::ToolMissing(tool))
}

pub fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;
    let verbosity = if cli.json {
        Verbosity::Silent
    } else if settings.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    let reporter = TerminalReporter::new(verbosity);

    require_tool("otool")?;

    let bundler = Bundler::new(&settings, &StdFs, &Otool, &reporter);
    let targets = bundler.targets()?;
    if targets.is_empty() {
        anyhow::bail!("No files to fix. Pass at least one --fix-file or --app");
    }
    tracing::info!("Fixing {} file(s)", targets.len());

    let discovery = if settings.interactive && !cli.json {
        bundler.discover(&targets, StdinPrompt::stdin())?
    } else {
        bundler.discover(&targets, FailOnUnresolved)?
    };
    let plan = bundler.plan(&discovery, &targets)?;

    if cli.json {
        println!("{}", render_json(&discovery, &plan)?);
        return Ok(());
    }
    if cli.dry_run {
        ui::print_plan(&plan);
        return Ok(());
    }

    execute(&settings, &plan, &reporter)
}

fn execute(settings: &Settings, plan: &RelocationPlan, reporter: &TerminalReporter) -> Result<()> {
    require_tool("install_name_tool")?;
    if settings.codesign && !plan.sign.is_empty() {
        require_tool("codesign")?;
    }

    let signer = Codesign::with_identity(settings.codesign_identity.as_str());
    let executor = Executor {
        fs: &StdFs,
        patcher: &InstallNameTool,
        signer: &signer,
        reporter,
    };
    let policy = DestinationPolicy {
        overwrite_files: settings.overwrite_files,
        overwrite_dir: settings.overwrite_dir,
        create_dir: settings.can_create_dir(),
    };
    executor.apply(plan, policy).context("Bundling failed")?;
    Ok(())
}

/// Discovered libraries, their dependents and the plan as one document.
fn render_json(discovery: &Discovery, plan: &RelocationPlan) -> Result<String> {
    let document = serde_json::json!({
        "libraries": discovery.store.libraries(),
        "edges": discovery.store.edges(),
        "plan": plan,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}
