use clap::{Parser, Subcommand};
use rn_circuit::{PassReport, Session};
use rn_core::{CircuitKind, NodeId};
use rn_project::{PanelHandles, ProjectResult};
use std::path::{Path, PathBuf};
use tracing::info;

mod script;

#[derive(Parser)]
#[command(name = "rn-cli")]
#[command(about = "RelayNet CLI - relay panel circuit simulation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate panel file syntax and structure
    Validate {
        /// Path to the panel YAML or JSON file
        panel_path: PathBuf,
    },
    /// Build a panel and show its circuits and relays
    Status {
        /// Path to the panel YAML or JSON file
        panel_path: PathBuf,
    },
    /// Build a panel and play a script of operator actions against it
    Simulate {
        /// Path to the panel YAML or JSON file
        panel_path: PathBuf,
        /// Path to the action script (YAML list)
        #[arg(long)]
        script: PathBuf,
        /// Save the final panel state here (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ProjectResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { panel_path } => cmd_validate(&panel_path),
        Commands::Status { panel_path } => cmd_status(&panel_path),
        Commands::Simulate {
            panel_path,
            script,
            output,
        } => cmd_simulate(&panel_path, &script, output.as_deref()),
    }
}

fn cmd_validate(panel_path: &Path) -> ProjectResult<()> {
    println!("Validating panel: {}", panel_path.display());
    let doc = rn_project::load(panel_path)?;
    println!("✓ Panel is valid");
    println!(
        "  {} relays, {} buttons, {} nodes, {} cables",
        doc.relays.len(),
        doc.buttons.len(),
        doc.nodes.len(),
        doc.cables.len()
    );
    Ok(())
}

fn cmd_status(panel_path: &Path) -> ProjectResult<()> {
    let doc = rn_project::load(panel_path)?;
    let (session, handles) = rn_project::build_session(&doc)?;
    println!("Panel: {}", doc.name);
    print_status(&session, &handles);
    Ok(())
}

fn cmd_simulate(panel_path: &Path, script_path: &Path, output: Option<&Path>) -> ProjectResult<()> {
    let doc = rn_project::load(panel_path)?;
    let (mut session, handles) = rn_project::build_session(&doc)?;
    let actions = script::parse(&std::fs::read_to_string(script_path)?)?;
    info!(panel = %doc.name, actions = actions.len(), "starting simulation");

    println!("Simulating panel: {}", doc.name);
    for (i, action) in actions.iter().enumerate() {
        let report = script::apply(&mut session, &handles, action)?;
        println!("[{:>6} ms] #{} {:?}", session.now_ms(), i + 1, action);
        print_report(&report);
    }
    println!();
    print_status(&session, &handles);

    if let Some(path) = output {
        rn_project::save(path, &rn_project::snapshot(&doc.name, &session, &handles))?;
        println!("✓ Final state saved to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &PassReport) {
    if report.is_quiet() && report.abandoned.is_empty() {
        println!("  (no circuit change)");
        return;
    }
    println!(
        "  created {}, extended {}, closed {}, split {}, truncated {}, deleted {}",
        report.created,
        report.extended,
        report.closed,
        report.split,
        report.truncated,
        report.deleted
    );
    for (why, count) in &report.abandoned {
        println!("  abandoned {:?}: {}", why, count);
    }
}

fn print_status(session: &Session, handles: &PanelHandles) {
    let arena = session.circuits();
    println!("Time: {} ms", session.now_ms());
    println!(
        "Circuits: {} closed, {} open",
        arena.count(CircuitKind::Closed),
        arena.count(CircuitKind::Open)
    );

    let node_label = |id: NodeId| {
        handles
            .node_key(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{id}"))
    };
    for leaf in arena.leaves(CircuitKind::Closed) {
        let path: Vec<String> = arena
            .full_path(leaf.id())
            .iter()
            .filter_map(|item| item.as_node())
            .map(|n| node_label(n.node))
            .collect();
        println!("  closed: {}", path.join(" -> "));
    }

    println!("Nodes:");
    for (key, id) in &handles.nodes {
        if let Ok(node) = session.network().node(*id) {
            let contacts: Vec<String> = node.contacts().iter().map(|c| format!("{:?}", c.any())).collect();
            println!("  {} ({}, {}): [{}]", key, node.name, node.kind.name(), contacts.join(", "));
        }
    }
    println!("Cables:");
    for (key, id) in &handles.cables {
        if let Ok(cable) = session.network().cable(*id) {
            println!("  {}: {:?}", key, cable.powered());
        }
    }

    if !handles.relays.is_empty() {
        println!("Relays:");
        for (key, id) in &handles.relays {
            if let Some(relay) = session.relay(*id) {
                println!("  {} ({}): {:?}", key, relay.name, relay.state());
            }
        }
    }
    let pending = session.pending_transitions();
    if pending > 0 {
        println!("Pending relay transitions: {}", pending);
    }
}
