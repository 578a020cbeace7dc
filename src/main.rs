//! Netspace CLI
//!
//! Command-line access to the GSN and GTN registries. Nodes are given and
//! printed in their textual form:
//!
//! ```text
//! identity,host,address,service,state,role,key
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use netspace_registry::{
    Netspace, NetspaceConfig, NodeRecord, NodeRole, NodeState, RegistryMode, StoreBackend,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Netspace registry - GSN peer directory and GTN root directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the node_geosub/node_geotop stores
    #[arg(long, env = "NETSPACE_STORE_DIR", default_value = "/var/lib/netspace/live")]
    store_dir: PathBuf,

    /// Enable testing-mode capabilities (reset, address rewrite, root seeding)
    #[arg(long, env = "NETSPACE_TESTING")]
    testing: bool,

    /// Use in-memory stores (nothing is persisted)
    #[arg(long)]
    in_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a node in the GSN
    Register { node: String },
    /// Unregister a node from the GSN
    Unregister { node: String },
    /// Replace the state of a registered node
    Update { node: String },
    /// Rewrite the address of a registered node (testing mode)
    UpdateAddress { node: String },
    /// Look up a single node
    Find {
        #[arg(value_enum)]
        by: FindBy,
        value: String,
    },
    /// List nodes holding any role in the mask (integer or hub|org)
    ByRole { mask: String },
    /// List nodes in a state (ordinal or name)
    ByState { state: String },
    /// List every GSN node
    List,
    /// Register a node as root of a geosub
    RegisterRoot { node: String, geosub: String },
    /// Seed a root from `<node>,<geosub>` with service forced to dvsp (testing mode)
    SeedRoot { text: String },
    /// Remove a node as root of a geosub
    UnregisterRoot { node: String, geosub: String },
    /// List the roots of a geosub
    Roots { geosub: String },
    /// Look up one root entry
    Root { identity: String, geosub: String },
    /// List known geosubs
    Geosubs,
    /// Wipe both stores (testing mode)
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FindBy {
    Address,
    Host,
    Identity,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = NetspaceConfig {
        store: if args.in_memory {
            StoreBackend::InMemory
        } else {
            StoreBackend::FileSystem {
                root_path: args.store_dir.clone(),
            }
        },
        mode: if args.testing {
            RegistryMode::Testing
        } else {
            RegistryMode::Live
        },
    };
    debug!(?config, "Opening netspace");

    let netspace = Netspace::open(config).context("failed to open netspace stores")?;
    run(&netspace, args.command)
}

fn run(ns: &Netspace, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Register { node } => {
            let node = parse_node(&node)?;
            check(ns.gsn().register(&node)?, "register", &node.identity)
        }
        Command::Unregister { node } => {
            let node = parse_node(&node)?;
            check(ns.gsn().unregister(&node)?, "unregister", &node.identity)
        }
        Command::Update { node } => {
            let node = parse_node(&node)?;
            check(ns.gsn().update(&node)?, "update", &node.identity)
        }
        Command::UpdateAddress { node } => {
            let node = parse_node(&node)?;
            check(ns.gsn().update_address(&node)?, "update-address", &node.identity)
        }
        Command::Find { by, value } => {
            let found = match by {
                FindBy::Address => ns.gsn().find_by_address(&value)?,
                FindBy::Host => ns.gsn().find_by_hostname(&value)?,
                FindBy::Identity => ns.gsn().find_by_identity(&value)?,
            };
            match found {
                Some(node) => print_nodes(&[node]),
                None => bail!("no node found"),
            }
        }
        Command::ByRole { mask } => {
            let mask: NodeRole = mask.parse()?;
            print_nodes(&ns.gsn().find_by_role(mask)?)
        }
        Command::ByState { state } => {
            let state: NodeState = state.parse()?;
            print_nodes(&ns.gsn().find_by_state(state)?)
        }
        Command::List => print_nodes(&ns.gsn().list_all()?),
        Command::RegisterRoot { node, geosub } => {
            let node = parse_node(&node)?;
            check(ns.gtn().register_root(&node, &geosub)?, "register-root", &node.identity)
        }
        Command::SeedRoot { text } => check(ns.register_root_from_str(&text)?, "seed-root", &text),
        Command::UnregisterRoot { node, geosub } => {
            let node = parse_node(&node)?;
            check(ns.gtn().unregister_root(&node, &geosub)?, "unregister-root", &node.identity)
        }
        Command::Roots { geosub } => print_nodes(&ns.gtn().roots_of(&geosub)?),
        Command::Root { identity, geosub } => match ns.gtn().root_by_identity(&identity, &geosub)? {
            Some(node) => print_nodes(&[node]),
            None => bail!("{} is not a root of {}", identity, geosub),
        },
        Command::Geosubs => {
            for geosub in ns.gtn().geosubs()? {
                println!("{}", geosub);
            }
            Ok(())
        }
        Command::Reset => check(ns.reset_for_testing()?, "reset", "netspace"),
    }
}

fn parse_node(text: &str) -> anyhow::Result<NodeRecord> {
    text.parse::<NodeRecord>()
        .with_context(|| format!("invalid node description: {}", text))
}

fn check(accepted: bool, operation: &str, subject: &str) -> anyhow::Result<()> {
    if !accepted {
        bail!("{} rejected for {}", operation, subject);
    }
    println!("ok");
    Ok(())
}

fn print_nodes(nodes: &[NodeRecord]) -> anyhow::Result<()> {
    for node in nodes {
        println!("{}", node);
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
