//! Cirrus demo CLI.
//!
//! Runs the sandbox scenarios, or a policy file against a JSON fixture of
//! an in-memory cloud.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- network-drift
//!   cargo run -p demo -- run --policies p.toml --fixture cloud.json --event event.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cirrus_audit::InMemoryLedger;
use cirrus_contracts::{
    error::{CirrusError, CirrusResult},
    event::CloudEvent,
    settings::RunnerSettings,
};
use cirrus_core::PolicyRunner;
use cirrus_policy::{settings, PolicyLoader};
use cirrus_sandbox::{
    scenarios::{elb_hygiene, network_drift, owner_tagging, topic_exposure},
    Fixture, InMemoryCloud,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Cirrus: cloud policy filters and actions, run against an in-memory cloud.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Cirrus cloud policy plugin demo",
    long_about = "Runs Cirrus sandbox scenarios, or compiles a policy document and runs\n\
                  it against a JSON fixture, printing matches, action reports and\n\
                  the remediation ledger status."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every sandbox scenario in sequence.
    RunAll,
    /// Event-driven owner attribution (auto-tag-user).
    OwnerTagging,
    /// Inconsistent function network placement (network-location).
    NetworkDrift,
    /// Load balancers without access logs (is-not-logging, unbind-publicips).
    ElbHygiene,
    /// Publicly writable notification topics (topic-access, topic-lts).
    TopicExposure,
    /// Run a policy document against a fixture.
    Run {
        /// TOML policy document.
        #[arg(long)]
        policies: PathBuf,
        /// JSON sandbox fixture.
        #[arg(long)]
        fixture: PathBuf,
        /// JSON audit-trail event for event-driven policies.
        #[arg(long)]
        event: Option<PathBuf>,
        /// TOML runner settings.
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Evaluate filters only.
        #[arg(long)]
        dry_run: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for every service call.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::OwnerTagging => owner_tagging::run_scenario().map(drop),
        Command::NetworkDrift => network_drift::run_scenario().map(drop),
        Command::ElbHygiene => elb_hygiene::run_scenario().map(drop),
        Command::TopicExposure => topic_exposure::run_scenario().map(drop),
        Command::Run {
            policies,
            fixture,
            event,
            settings,
            dry_run,
        } => run_file(&policies, &fixture, event.as_deref(), settings.as_deref(), dry_run),
    };

    match result {
        Ok(()) => println!("Done."),
        Err(e) => {
            eprintln!("Demo error: {e}");
            std::process::exit(1);
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

fn run_all() -> CirrusResult<()> {
    owner_tagging::run_scenario()?;
    network_drift::run_scenario()?;
    elb_hygiene::run_scenario()?;
    topic_exposure::run_scenario()?;
    Ok(())
}

fn read(path: &Path, what: &str) -> CirrusResult<String> {
    std::fs::read_to_string(path).map_err(|e| CirrusError::ConfigError {
        reason: format!("failed to read {what} '{}': {e}", path.display()),
    })
}

fn run_file(
    policies: &Path,
    fixture: &Path,
    event: Option<&Path>,
    settings_path: Option<&Path>,
    dry_run: bool,
) -> CirrusResult<()> {
    let mut settings = match settings_path {
        Some(path) => settings::from_file(path)?,
        None => RunnerSettings::default(),
    };
    settings.dry_run |= dry_run;

    let fixture = Fixture::from_json_str(&read(fixture, "fixture")?)?;
    let cloud = Arc::new(InMemoryCloud::from_fixture(fixture)?);
    let event: Option<CloudEvent> = match event {
        Some(path) => Some(serde_json::from_str(&read(path, "event")?).map_err(|e| {
            CirrusError::ConfigError {
                reason: format!("failed to parse event '{}': {e}", path.display()),
            }
        })?),
        None => None,
    };

    let compiled = PolicyLoader::new(settings.clone()).from_file(policies)?;
    let ledger = InMemoryLedger::new();
    let runner = PolicyRunner::new(cloud.clone(), Box::new(ledger.clone()), settings);
    info!(policies = compiled.len(), "running policy document");

    for policy in &compiled {
        let outcome = runner.run(policy, event.as_ref())?;
        println!("Policy {} ({})", outcome.policy, policy.resource_type);
        if !outcome.triggered {
            println!("  not triggered");
            continue;
        }
        for resource in &outcome.matched {
            let rendered = serde_json::to_string(&resource.annotations).unwrap_or_default();
            println!("  matched {} {rendered}", resource.id());
        }
        for report in &outcome.reports {
            println!(
                "  {} succeeded={:?} failed={:?}",
                report.action,
                report.succeeded,
                report.failed.iter().map(|f| (&f.id, &f.reason)).collect::<Vec<_>>()
            );
        }
    }

    let snapshot = ledger.export()?;
    match ledger.verify() {
        Ok(()) => println!(
            "Ledger verified: {} entries, terminal hash {}",
            snapshot.entries.len(),
            if snapshot.terminal_hash.is_empty() { "-" } else { snapshot.terminal_hash.as_str() }
        ),
        Err(sequence) => println!("Ledger BROKEN at entry {sequence}"),
    }
    println!("Service calls: {}", cloud.calls().len());
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Cirrus: cloud policy plugin");
    println!("Sandbox demo");
    println!("===========================");
    println!();
    println!("Per policy run:");
    println!("  [1] Fetch resources of the policy's type (restricted to the event's ids)");
    println!("  [2] Filters run in order, each seeing what the previous kept");
    println!("  [3] Actions run over every matched resource");
    println!("  [4] Each action's report is appended to the SHA-256 ledger");
    println!();
}
