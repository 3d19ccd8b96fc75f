//! Information about the node cluster, i.e. which nodes exist for which
//! [`Tier`], and the notifications emitted when that changes.

use super::Tier;

/// A message to track which physical servers are a part of which storage
/// tier.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterInfo {
    /// The set of all tiers in the system.
    pub tiers: Vec<TierMembership>,
    /// List of all routing nodes in the cluster.
    pub routing_node_ids: Vec<String>,
}

/// The representation of the servers comprising an individual tier.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TierMembership {
    /// The tier represented by this message.
    pub tier_id: Tier,
    /// The list of server node ids in this tier.
    pub servers: Vec<String>,
}

/// Notification that a node joined the cluster.
///
/// Consumed by the hash rings of every node; the membership orchestration
/// that produces these events is external to this core.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Join {
    /// The tier of the joined node.
    pub tier: Tier,
    /// The ID of the joined node.
    pub node_id: String,
}

/// Notification that a node left the cluster.
///
/// The drain handshake with the departing node's threads is handled outside
/// this core; by the time this notification arrives, the node's keys are
/// expected to have been handed off.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Departed {
    /// The tier of the departed node.
    pub tier: Tier,
    /// The ID of the departed node.
    pub node_id: String,
}
