mod cli;

use pubforge::{
    config,
    context::RunContext,
    manager::{
        AllActiveTasks, CollectionReport, PhaseOutcome, PhaseReport, PublishManager, RunReport,
    },
    plugin::factory::build_registry,
    registration::{JsonlCatalog, MemoryCatalog, RegistrationSink},
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "pubforge=trace,pubforge_common=debug".to_string()
        } else {
            "pubforge=info,pubforge_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Collect { paths, save } => collect(&paths, config_path, save.as_deref()),
        Commands::Validate { paths } => validate(&paths, config_path),
        Commands::Run {
            paths,
            dry_run,
            save,
        } => run_paths(&paths, config_path, dry_run, save.as_deref()),
        Commands::RunTree { file, dry_run } => run_tree(&file, config_path, dry_run),
        Commands::Show { file } => show(&file, config_path),
        Commands::CheckConfig {
            config: check_path,
        } => {
            let path = check_path.or(cli.config);
            check_config(path.as_deref())
        }
        Commands::Version => {
            println!("pubforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_manager(config_path: Option<&Path>, dry_run: bool) -> Result<PublishManager> {
    let config = config::load_config_or_default(config_path)?;
    let registry = build_registry(&config)?;

    let sink: Arc<dyn RegistrationSink> = if dry_run {
        Arc::new(MemoryCatalog::new())
    } else {
        let catalog_path = config.catalog.expanded_path();
        tracing::debug!("Registering publishes in {:?}", catalog_path);
        Arc::new(JsonlCatalog::new(catalog_path))
    };

    let run = RunContext::new(config.context.clone(), sink).with_dry_run(dry_run);
    Ok(PublishManager::new(registry, run).with_acceptance(config.manager.acceptance))
}

fn collect_into(manager: &mut PublishManager, paths: &[PathBuf]) -> Result<CollectionReport> {
    for path in paths {
        if !path.exists() {
            anyhow::bail!("Path does not exist: {:?}", path);
        }
    }

    let report = manager.collect_files(paths)?;
    for error in &report.errors {
        eprintln!("✗ {}", error);
    }
    for path in &report.skipped_paths {
        println!("Already collected: {}", path.display());
    }
    println!(
        "Collected {} item(s), {} task(s)",
        report.new_items.len(),
        report.tasks_created
    );
    Ok(report)
}

fn collect(paths: &[PathBuf], config_path: Option<&Path>, save: Option<&Path>) -> Result<()> {
    let mut manager = build_manager(config_path, false)?;
    let report = collect_into(&mut manager, paths)?;

    println!();
    manager.tree().pprint();

    if let Some(save) = save {
        manager.save(save)?;
        println!("\nSaved tree to {}", save.display());
    }

    if !report.errors.is_empty() {
        anyhow::bail!("{} collection error(s)", report.errors.len());
    }
    Ok(())
}

fn validate(paths: &[PathBuf], config_path: Option<&Path>) -> Result<()> {
    let mut manager = build_manager(config_path, false)?;
    collect_into(&mut manager, paths)?;

    let report = manager.validate(AllActiveTasks)?;
    print_phase(&report);

    if !report.is_success() {
        anyhow::bail!("Validation failed");
    }
    Ok(())
}

fn run_paths(
    paths: &[PathBuf],
    config_path: Option<&Path>,
    dry_run: bool,
    save: Option<&Path>,
) -> Result<()> {
    let mut manager = build_manager(config_path, dry_run)?;
    collect_into(&mut manager, paths)?;

    let report = manager.run()?;
    print_run(&report, dry_run);

    if let Some(save) = save {
        manager.save(save)?;
        println!("\nSaved tree to {}", save.display());
    }

    finish(&report)
}

fn run_tree(file: &Path, config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let mut manager = build_manager(config_path, dry_run)?;
    manager.load(file)?;
    tracing::info!("Loaded {} item(s) from {:?}", manager.tree().len(), file);

    let report = manager.run()?;
    print_run(&report, dry_run);
    finish(&report)
}

fn show(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let mut manager = build_manager(config_path, false)?;
    manager.load(file)?;
    if manager.tree().is_empty() {
        println!("(empty tree)");
    } else {
        manager.tree().pprint();
    }
    Ok(())
}

fn check_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };
    let registry = build_registry(&config)?;

    println!("✓ Configuration is valid");
    println!("  Context: {}", config.context);
    println!("  Catalog: {}", config.catalog.expanded_path().display());
    println!("  Acceptance: {:?}", config.manager.acceptance);
    for plugin in registry.iter() {
        println!(
            "  {} '{}': {}",
            plugin.capability().kind(),
            plugin.id(),
            plugin.capability().name()
        );
    }

    Ok(())
}

fn print_run(report: &RunReport, dry_run: bool) {
    if dry_run {
        println!("\n[DRY RUN] Nothing was registered");
    }
    for phase in report.phases() {
        print_phase(phase);
    }
    if report.publish.is_none() {
        println!("publish: skipped");
    }
}

fn print_phase(report: &PhaseReport) {
    match report.outcome() {
        PhaseOutcome::NoActiveTasks => println!("{}: no active tasks", report.phase),
        PhaseOutcome::Succeeded { tasks } => {
            println!("{}: {} task(s) succeeded", report.phase, tasks)
        }
        PhaseOutcome::TaskFailures(failures) => {
            println!("{}: {} task(s) failed", report.phase, failures.len());
            for failure in failures {
                println!("  ✗ {}", failure);
            }
        }
        PhaseOutcome::SystemicFailure { source, message } => {
            println!("{}: aborted by {}: {}", report.phase, source, message)
        }
        PhaseOutcome::Cancelled { completed } => {
            println!("{}: cancelled after {} task(s)", report.phase, completed)
        }
    }
    for error in &report.finalize_errors {
        println!("  ! {}", error);
    }
}

fn finish(report: &RunReport) -> Result<()> {
    if !report.is_success() {
        anyhow::bail!("Publish run did not succeed");
    }
    Ok(())
}
