//! Types for parsing strata configuration files.
//!
//! The top level config type is [`Config`]. It gathers the constants that the
//! rest of the system treats as fixed for the process lifetime: thread counts
//! per tier, default replication factors, node capacities, and the
//! virtual-node count of the hash rings.

use crate::{messages::Tier, metadata::{KeyReplication, TierMetadata}};
use serde::{Deserialize, Serialize};

/// The top level config type.
///
/// This type can be read and written to config files using the
/// [`serde::Serialize`] and [`serde::Deserialize`] implementations.
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The number of worker threads per node, per tier.
    pub threads: Threads,
    /// Default replication factors applied to keys without an explicitly
    /// configured factor.
    pub replication: Replication,
    /// Storage capacity of the nodes of each tier.
    pub capacities: Capacities,
    /// Number of virtual ring positions per physical member, to smooth the
    /// load distribution of the consistent hash rings.
    #[serde(default = "default_virtual_nodes")]
    pub virtual_nodes: usize,
}

fn default_virtual_nodes() -> usize {
    3000
}

impl Config {
    /// Returns the per-tier view of this configuration.
    pub fn tier_metadata(&self, tier: Tier) -> TierMetadata {
        match tier {
            Tier::Memory => TierMetadata {
                thread_number: self.threads.memory,
                default_replication: self.replication.memory,
                node_capacity: self.capacities.memory_cap,
            },
            Tier::Disk => TierMetadata {
                thread_number: self.threads.disk,
                default_replication: self.replication.disk,
                node_capacity: self.capacities.disk_cap,
            },
            Tier::Routing => TierMetadata {
                thread_number: self.threads.routing,
                default_replication: 0,
                node_capacity: 0,
            },
        }
    }

    /// The replication factor assumed for keys whose factor was never
    /// explicitly written.
    pub fn default_replication(&self) -> KeyReplication {
        KeyReplication {
            global: [
                (Tier::Memory, self.replication.memory.max(self.replication.minimum)),
                (Tier::Disk, self.replication.disk),
            ]
            .into_iter()
            .collect(),
            local: [
                (Tier::Memory, self.replication.local),
                (Tier::Disk, self.replication.local),
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// The number of worker threads per node, for each kind of node.
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Threads {
    /// Worker threads on memory-tier nodes.
    pub memory: u32,
    /// Worker threads on disk-tier nodes.
    pub disk: u32,
    /// Threads on routing nodes.
    pub routing: u32,
}

/// Default replication factors.
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Replication {
    /// Cross-node replicas in the memory tier.
    pub memory: usize,
    /// Cross-node replicas in the disk tier.
    pub disk: usize,
    /// Replicas across the worker threads of a single node.
    pub local: usize,
    /// Lower bound on the number of memory-tier replicas.
    pub minimum: usize,
}

/// Configured per-node storage capacities, in bytes.
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Capacities {
    /// Capacity of a memory-tier node.
    pub memory_cap: u64,
    /// Capacity of a disk-tier node.
    pub disk_cap: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            threads: Threads {
                memory: 4,
                disk: 2,
                routing: 1,
            },
            replication: Replication {
                memory: 1,
                disk: 0,
                local: 1,
                minimum: 2,
            },
            capacities: Capacities {
                memory_cap: 1,
                disk_cap: 0,
            },
            virtual_nodes: 128,
        }
    }

    #[test]
    fn default_replication_respects_minimum() {
        let defaults = config().default_replication();
        assert_eq!(defaults.global[&Tier::Memory], 2);
        assert_eq!(defaults.global[&Tier::Disk], 0);
        assert_eq!(defaults.local[&Tier::Memory], 1);
    }

    #[test]
    fn virtual_nodes_defaults_when_missing() {
        let parsed: Config = serde_json::from_str(
            r#"{
                "threads": { "memory": 1, "disk": 1, "routing": 1 },
                "replication": { "memory": 1, "disk": 0, "local": 1, "minimum": 1 },
                "capacities": { "memory_cap": 1, "disk_cap": 0 }
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.virtual_nodes, 3000);
    }
}
