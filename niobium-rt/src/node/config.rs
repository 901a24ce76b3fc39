//! Node configuration: CLI surface plus launcher environment.
//!
//! The cluster launcher establishes node identity through the environment
//! (`NIOBIUM_NODE_NAME`, `NIOBIUM_NODE_COUNT`, `NIOBIUM_PEERS`); the command
//! line sizes the worker pool and switches instrumentation. Everything the
//! parser does not recognize is handed through to the initial actors.

// Layer 1: Standard library imports
use std::env;

// Layer 2: Third-party crate imports
use clap::Parser;

// Layer 3: Internal module imports
use super::errors::NodeError;
use crate::multiplex::MultiplexPolicy;
use crate::util::NodeId;

/// Node id environment variable, set by the launcher.
pub const ENV_NODE_NAME: &str = "NIOBIUM_NODE_NAME";

/// Cluster size environment variable, set by the launcher.
pub const ENV_NODE_COUNT: &str = "NIOBIUM_NODE_COUNT";

/// Comma-separated `host:port` transport endpoints, one per node.
pub const ENV_PEERS: &str = "NIOBIUM_PEERS";

/// Set to `0` or `false` to opt out of deterministic actor names.
pub const ENV_DETERMINISTIC_NAMES: &str = "NIOBIUM_DETERMINISTIC_NAMES";

#[derive(Debug, Parser)]
#[command(name = "niobium")]
struct Cli {
    /// Worker threads for this node.
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Print a load report every period.
    #[arg(long)]
    print_load: bool,

    /// Print pool usage every period.
    #[arg(long)]
    print_memory_usage: bool,

    /// Print engine counters every period.
    #[arg(long)]
    print_counters: bool,

    /// Enable the load balancer (actor migration between workers).
    #[arg(long)]
    auto_scale: bool,

    /// Cap on live actors (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    max_actors: usize,

    /// Everything else is handed to the initial actors.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    app_args: Vec<String>,
}

/// Fully resolved node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's id.
    pub node_id: NodeId,
    /// Number of nodes in the cluster.
    pub node_count: u32,
    /// Worker threads to run.
    pub workers: usize,
    /// Counter-encoded names (required for multi-node runs).
    pub deterministic_names: bool,
    /// Enable worker-to-worker actor migration.
    pub auto_scale: bool,
    /// Cap on live actors (0 = unbounded).
    pub max_actors: usize,
    /// Print a load report every period.
    pub print_load: bool,
    /// Print pool usage every period.
    pub print_memory_usage: bool,
    /// Print engine counters every period.
    pub print_counters: bool,
    /// Outbound batching policy.
    pub multiplex: MultiplexPolicy,
    /// Arguments passed through to initial actors.
    pub app_args: Vec<String>,
}

impl NodeConfig {
    /// A single-node configuration with `workers` threads. The starting
    /// point for tests and in-process clusters.
    pub fn single_node(workers: usize) -> Self {
        Self {
            node_id: NodeId::from_raw(0),
            node_count: 1,
            workers,
            deterministic_names: true,
            auto_scale: false,
            max_actors: 0,
            print_load: false,
            print_memory_usage: false,
            print_counters: false,
            multiplex: MultiplexPolicy::default(),
            app_args: Vec::new(),
        }
    }

    /// Member `node_id` of a cluster of `node_count`.
    pub fn cluster_member(node_id: NodeId, node_count: u32, workers: usize) -> Self {
        Self {
            node_id,
            node_count,
            ..Self::single_node(workers)
        }
    }

    /// Resolve configuration from the command line and environment.
    ///
    /// `args` is the full argv including the program name.
    pub fn from_args<I, S>(args: I) -> Result<Self, NodeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let cli = Cli::try_parse_from(&args).map_err(|e| NodeError::Config(e.to_string()))?;

        let node_id = env_u32(ENV_NODE_NAME)?.unwrap_or(0);
        let node_count = env_u32(ENV_NODE_COUNT)?.unwrap_or(1);
        let deterministic_names = !matches!(
            env::var(ENV_DETERMINISTIC_NAMES).ok().as_deref(),
            Some("0") | Some("false")
        );

        let config = Self {
            node_id: NodeId::from_raw(node_id),
            node_count,
            workers: cli.threads.unwrap_or_else(num_cpus::get),
            deterministic_names,
            auto_scale: cli.auto_scale,
            max_actors: cli.max_actors,
            print_load: cli.print_load,
            print_memory_usage: cli.print_memory_usage,
            print_counters: cli.print_counters,
            multiplex: MultiplexPolicy::default(),
            app_args: cli.app_args,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.workers == 0 {
            return Err(NodeError::Config("worker count must be > 0".into()));
        }
        if self.node_count == 0 {
            return Err(NodeError::Config("node count must be > 0".into()));
        }
        if self.node_id.raw() >= self.node_count {
            return Err(NodeError::Config(format!(
                "node id {} outside cluster of {}",
                self.node_id, self.node_count
            )));
        }
        if !self.deterministic_names && self.node_count > 1 {
            return Err(NodeError::Config(
                "random actor names carry no location; multi-node runs require \
                 deterministic naming"
                    .into(),
            ));
        }
        Ok(())
    }
}

fn env_u32(key: &str) -> Result<Option<u32>, NodeError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| NodeError::Config(format!("{key}={value:?} is not an integer"))),
        Err(_) => Ok(None),
    }
}
