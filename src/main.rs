use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use remint::backup;
use remint::context::{ElevationPolicy, ResetContext};
use remint::elevate::OsElevator;
use remint::orchestrator::ResetOrchestrator;
use remint::paths::{self, StoreKind};
use remint::report::ResetReport;
use remint::stores::embedded_db;

#[derive(Parser)]
#[command(name = "remint")]
#[command(about = "Regenerate editor machine identity across its persistent stores", long_about = None)]
struct Cli {
    /// Product data directory name (e.g. Cursor, VSCodium, Code)
    #[arg(long, global = true, default_value = "Cursor")]
    app: String,

    /// Also append logs to `remint.log` in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate all identifiers and rewrite every store
    Reset {
        /// Reset a single store kind (config-json, embedded-db,
        /// flat-id-file, workspace-cache, os-registry). All if omitted.
        #[arg(long)]
        kind: Option<String>,

        /// Create stores that do not exist yet instead of skipping them
        #[arg(long)]
        allow_create: bool,

        /// Never prompt for OS elevation; report permission failures
        #[arg(long)]
        no_elevate: bool,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show resolved store paths, existence, and latest backups
    Status,
    /// List backup sidecars next to each store
    Backups,
    /// Delete embedded-db rows whose key or value contains a marker
    PurgeDb {
        /// Substring to match against keys and values
        marker: String,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    remint::logging::init(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Reset {
            kind,
            allow_create,
            no_elevate,
            json,
            yes,
        } => run_reset(&cli.app, kind, allow_create, no_elevate, json, yes),
        Commands::Status => run_status(&cli.app),
        Commands::Backups => run_backups(&cli.app),
        Commands::PurgeDb { marker, yes } => run_purge_db(&cli.app, &marker, yes),
    }
}

fn run_reset(
    app: &str,
    kind: Option<String>,
    allow_create: bool,
    no_elevate: bool,
    json: bool,
    yes: bool,
) -> Result<()> {
    let kind = kind
        .map(|k| k.parse::<StoreKind>().map_err(anyhow::Error::msg))
        .transpose()?;

    if !yes {
        let scope = kind.map(|k| k.to_string()).unwrap_or_else(|| "all stores".to_string());
        let confirmed = inquire::Confirm::new(&format!(
            "Regenerate {} identity and rewrite {}?",
            app, scope
        ))
        .with_default(false)
        .prompt()
        .context("confirmation prompt failed")?;
        if !confirmed {
            eprintln!("Reset cancelled.");
            return Ok(());
        }
    }

    let mut ctx = ResetContext::for_current_host(app)?;
    ctx.allow_create = allow_create;
    if no_elevate {
        ctx.elevation = ElevationPolicy::Never;
    }

    let elevator = OsElevator;
    let orchestrator = ResetOrchestrator::new(&elevator);
    let report = match kind {
        Some(kind) => orchestrator.reset_one(&ctx, kind),
        None => orchestrator.reset_all(&ctx),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.overall_success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &ResetReport) {
    eprintln!("New identity:");
    eprintln!("  deviceId:         {}", report.identity.device_id);
    eprintln!("  machineId:        {}", report.identity.machine_id);
    eprintln!("  macMachineId:     {}", report.identity.mac_machine_id);
    eprintln!("  sqmId:            {}", report.identity.sqm_id);
    eprintln!("  serviceMachineId: {}", report.identity.service_machine_id);
    eprintln!();

    for result in &report.results {
        let mark = if result.success { "✓" } else { "✗" };
        match &result.error {
            Some(error) => eprintln!("  {} {}: {}", mark, result.kind, error),
            None => eprintln!("  {} {}", mark, result.kind),
        }
        for warning in &result.warnings {
            eprintln!("      ! {}", warning);
        }
        if let Some(backup) = &result.backup {
            eprintln!("      backup: {}", backup.backup_path.display());
        }
    }

    if report.overall_success {
        eprintln!("\n✅ All stores reset.");
    } else {
        eprintln!(
            "\n⚠ {} store(s) failed; see messages above.",
            report.failures().count()
        );
    }
}

fn run_status(app: &str) -> Result<()> {
    let ctx = ResetContext::for_current_host(app)?;
    println!("Product: {} ({})", ctx.product, ctx.os);

    for kind in StoreKind::ALL {
        match paths::resolve(&ctx, kind) {
            Ok(desc) => {
                println!("\n{}:", kind);
                println!("  path: {}", desc.path.display());
                println!(
                    "  state: {}",
                    if desc.exists_before_op { "present" } else { "MISSING" }
                );
                if let Some(latest) = backup::list_backups(&desc.path).last() {
                    println!("  latest backup: {}", latest.path.display());
                }
            }
            Err(err) => {
                println!("\n{}: {}", kind, err);
            }
        }
    }
    Ok(())
}

fn run_backups(app: &str) -> Result<()> {
    let ctx = ResetContext::for_current_host(app)?;
    let mut found_any = false;

    for kind in StoreKind::ALL {
        let Ok(desc) = paths::resolve(&ctx, kind) else {
            continue;
        };
        let listings = backup::list_backups(&desc.path);
        if listings.is_empty() {
            continue;
        }
        found_any = true;
        println!("{}:", kind);
        for listing in listings {
            println!("  {} (ts {})", listing.path.display(), listing.created_at);
        }
    }

    if !found_any {
        println!("No backups found.");
    }
    Ok(())
}

fn run_purge_db(app: &str, marker: &str, yes: bool) -> Result<()> {
    let ctx = ResetContext::for_current_host(app)?;
    let desc = paths::resolve(&ctx, StoreKind::EmbeddedDb)?;

    if !yes {
        let confirmed = inquire::Confirm::new(&format!(
            "Permanently delete every row of {} matching '{}'?",
            desc.path.display(),
            marker
        ))
        .with_default(false)
        .prompt()
        .context("confirmation prompt failed")?;
        if !confirmed {
            eprintln!("Purge cancelled.");
            return Ok(());
        }
    }

    let deleted = embedded_db::purge_marker(&desc.path, marker)?;
    eprintln!("Deleted {} row(s).", deleted);
    Ok(())
}
