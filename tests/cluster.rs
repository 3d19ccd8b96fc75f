use pretty_assertions::assert_eq;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use strata::{
    config::{Capacities, Config, Replication, Threads},
    hash_ring::{responsible_threads, SharedRings},
    lattice::{LastWriterWinsLattice, Lattice, SetLattice, Timestamp},
    messages::{
        cluster_membership::Join, AddressRequest, Message, Request, RequestTuple, RequestType,
        Response, Tier,
    },
    metadata::MetadataKey,
    nodes::{KvsNode, RoutingNode},
    topics::{Address, ClientThread, KvsThread},
    ClientKey, Key, LatticeType, LatticeValue, StrataError,
};

#[test]
fn put_and_get_resolve_through_pending_replay() {
    let _ = set_up_logger();
    let mut cluster = Cluster::new(&config(1, 0, 1), &["node-a"], &[]);
    let client = client_thread();

    // the key's replication factor is unknown at first, so the PUT parks,
    // a factor fetch round-trips through the metadata tier, and the parked
    // PUT replays against the default factor
    cluster.send_request(0, put_request("a", 10, b"v1", &client, "put-1"));
    let responses = cluster.take_client_responses();
    assert_eq!(responses.len(), 1);
    let response = &responses[0];
    assert_eq!(response.response_id.as_deref(), Some("put-1"));
    assert_eq!(response.tuples.len(), 1);
    assert_eq!(response.tuples[0].error, None);

    cluster.send_request(0, get_request("a", &client, "get-1"));
    let responses = cluster.take_client_responses();
    assert_eq!(responses.len(), 1);
    let tuple = &responses[0].tuples[0];
    assert_eq!(tuple.error, None);
    assert_eq!(tuple.lattice_type, Some(LatticeType::Lww));
    assert_eq!(lww_value(tuple.payload.as_deref().unwrap()), b"v1");
}

#[test]
fn replayed_request_matches_direct_request() {
    let _ = set_up_logger();
    let mut cluster = Cluster::new(&config(1, 0, 1), &["node-a"], &[]);
    let client = client_thread();

    // first PUT goes through the pending path
    cluster.send_request(0, put_request("a", 10, b"v1", &client, "put-1"));
    let deferred = cluster.take_client_responses().remove(0);

    // the factor is cached now, so the same PUT is served directly
    cluster.send_request(0, put_request("a", 10, b"v1", &client, "put-2"));
    let direct = cluster.take_client_responses().remove(0);

    assert_eq!(deferred.tuples, direct.tuples);
}

#[test]
fn type_mismatch_put_is_dropped_without_mutation() {
    let _ = set_up_logger();
    let mut cluster = Cluster::new(&config(1, 0, 1), &["node-a"], &[]);
    let client = client_thread();

    cluster.send_request(0, put_request("a", 10, b"v1", &client, "put-1"));
    cluster.take_client_responses();

    // a PUT with a conflicting lattice type produces no response tuple at all
    let mut set = SetLattice::default();
    set.insert(b"x".to_vec());
    let payload = LatticeValue::Set(set).serialize().unwrap();
    cluster.send_request(
        0,
        Request {
            request_id: Some("put-2".to_owned()),
            response_address: Some(client.response_topic()),
            ty: RequestType::Put,
            tuples: vec![RequestTuple::put(
                Key::Client("a".into()),
                LatticeType::Set,
                payload,
            )],
        },
    );
    assert_eq!(cluster.take_client_responses(), vec![]);

    // the stored value and its type are untouched
    cluster.send_request(0, get_request("a", &client, "get-1"));
    let responses = cluster.take_client_responses();
    let tuple = &responses[0].tuples[0];
    assert_eq!(tuple.lattice_type, Some(LatticeType::Lww));
    assert_eq!(lww_value(tuple.payload.as_deref().unwrap()), b"v1");
}

#[test]
fn gossip_converges_replicas_after_one_exchange() {
    let _ = set_up_logger();
    // both nodes own every key: two cross-node replicas in the memory tier
    let mut cluster = Cluster::new(&config(2, 0, 1), &["node-a", "node-b"], &[]);
    let client = client_thread();

    // disjoint concurrent updates land on different replicas
    cluster.send_request(0, put_request("a", 100, b"v1", &client, "put-1"));
    cluster.send_request(1, put_request("a", 200, b"v2", &client, "put-2"));
    cluster.take_client_responses();

    // one bidirectional anti-entropy exchange
    cluster.run_gossip_round(0);
    cluster.run_gossip_round(1);

    // both replicas now return the write with the larger timestamp
    for node in 0..2 {
        cluster.send_request(node, get_request("a", &client, "get"));
        let responses = cluster.take_client_responses();
        let tuple = &responses[0].tuples[0];
        assert_eq!(tuple.error, None);
        assert_eq!(lww_value(tuple.payload.as_deref().unwrap()), b"v2");
    }
}

#[test]
fn address_request_escalates_to_populated_tier() {
    let _ = set_up_logger();
    // zero memory-tier replicas: tier 0 resolves to nothing and the routing
    // tier must escalate to the disk tier
    let mut cluster = Cluster::new(&config(0, 1, 0), &["node-m"], &["node-d"]);
    let client = client_thread();

    cluster.send_address_request(AddressRequest {
        request_id: "addr-1".to_owned(),
        response_address: client.address_response_topic(),
        keys: vec![ClientKey::from("a")],
    });

    let responses = cluster.take_client_address_responses();
    assert_eq!(responses.len(), 1);
    let response = &responses[0];
    assert_eq!(response.response_id, "addr-1");
    assert_eq!(response.error, None);
    assert_eq!(response.addresses.len(), 1);
    assert_eq!(
        response.addresses[0].threads,
        vec![KvsThread::new("node-d".to_owned(), 0)]
    );
}

#[test]
fn address_request_without_servers_fails_once() {
    let _ = set_up_logger();
    let mut cluster = Cluster::new(&config(1, 0, 1), &[], &[]);
    let client = client_thread();

    cluster.send_address_request(AddressRequest {
        request_id: "addr-1".to_owned(),
        response_address: client.address_response_topic(),
        keys: vec![ClientKey::from("a"), ClientKey::from("b")],
    });

    let responses = cluster.take_client_address_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].error, Some(StrataError::NoServers));
    assert_eq!(responses[0].addresses, vec![]);
}

#[test]
fn metadata_request_to_wrong_thread_returns_error_code_2() {
    let _ = set_up_logger();
    let mut cluster = Cluster::new(&config(1, 0, 1), &["node-a", "node-b"], &[]);
    let client = client_thread();

    let metadata_key = Key::Metadata(MetadataKey::Replication {
        key: ClientKey::from("a"),
    });
    let owner = cluster.metadata_owner(&metadata_key);
    let wrong = (0..2)
        .find(|&i| cluster.kvs[i].thread() != &owner)
        .unwrap();

    cluster.send_request(
        wrong,
        Request {
            request_id: Some("get-1".to_owned()),
            response_address: Some(client.response_topic()),
            ty: RequestType::Get,
            tuples: vec![RequestTuple::get(metadata_key.clone())],
        },
    );

    let responses = cluster.take_client_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].tuples[0].error, Some(StrataError::WrongThread));
    assert_eq!(responses[0].tuples[0].key, metadata_key);
}

#[test]
fn stale_address_cache_orders_invalidation() {
    let _ = set_up_logger();
    let mut cluster = Cluster::new(&config(1, 0, 1), &["node-a"], &[]);
    let client = client_thread();

    cluster.send_request(0, put_request("a", 10, b"v1", &client, "put-1"));
    cluster.take_client_responses();

    // the client claims to know five owner addresses; the true count is one
    let mut request = get_request("a", &client, "get-1");
    request.tuples[0].address_cache_size = Some(5);
    cluster.send_request(0, request);

    let responses = cluster.take_client_responses();
    assert!(responses[0].tuples[0].invalidate);
}

fn config(memory_replication: usize, disk_replication: usize, minimum: usize) -> Config {
    Config {
        threads: Threads {
            memory: 1,
            disk: 1,
            routing: 1,
        },
        replication: Replication {
            memory: memory_replication,
            disk: disk_replication,
            local: 1,
            minimum,
        },
        capacities: Capacities {
            memory_cap: 1,
            disk_cap: 1,
        },
        virtual_nodes: 64,
    }
}

fn client_thread() -> ClientThread {
    ClientThread::new("client".to_owned(), 0)
}

fn lww_payload(timestamp: u64, value: &[u8]) -> Vec<u8> {
    LatticeValue::Lww(LastWriterWinsLattice::from_pair(
        Timestamp::new(timestamp),
        value.to_vec(),
    ))
    .serialize()
    .unwrap()
}

fn lww_value(payload: &[u8]) -> Vec<u8> {
    LatticeValue::deserialize(LatticeType::Lww, payload)
        .unwrap()
        .into_lww()
        .unwrap()
        .into_revealed()
        .into_value()
}

fn put_request(
    key: &str,
    timestamp: u64,
    value: &[u8],
    client: &ClientThread,
    request_id: &str,
) -> Request {
    Request {
        request_id: Some(request_id.to_owned()),
        response_address: Some(client.response_topic()),
        ty: RequestType::Put,
        tuples: vec![RequestTuple::put(
            Key::Client(key.into()),
            LatticeType::Lww,
            lww_payload(timestamp, value),
        )],
    }
}

fn get_request(key: &str, client: &ClientThread, request_id: &str) -> Request {
    Request {
        request_id: Some(request_id.to_owned()),
        response_address: Some(client.response_topic()),
        ty: RequestType::Get,
        tuples: vec![RequestTuple::get(Key::Client(key.into()))],
    }
}

/// A hand-driven cluster: real node actors wired together by delivering the
/// outbound message batches that the handlers return.
struct Cluster {
    kvs: Vec<KvsNode>,
    rings: Vec<SharedRings>,
    routing: RoutingNode,
    client_inbox: Vec<(Address, Message)>,
}

impl Cluster {
    fn new(config: &Config, memory_nodes: &[&str], disk_nodes: &[&str]) -> Self {
        let config = Arc::new(config.clone());
        let joins: Vec<Join> = memory_nodes
            .iter()
            .map(|id| Join {
                tier: Tier::Memory,
                node_id: (*id).to_owned(),
            })
            .chain(disk_nodes.iter().map(|id| Join {
                tier: Tier::Disk,
                node_id: (*id).to_owned(),
            }))
            .collect();

        let mut kvs = Vec::new();
        let mut rings = Vec::new();
        for join in &joins {
            let node_rings = SharedRings::new(&config);
            let node = KvsNode::new(
                config.clone(),
                join.tier,
                join.node_id.clone(),
                0,
                node_rings.clone(),
            );
            for join in &joins {
                node.handle_join(join);
            }
            kvs.push(node);
            rings.push(node_rings);
        }

        let routing_rings = SharedRings::new(&config);
        let routing = RoutingNode::new(config, "router".to_owned(), 0, routing_rings);
        for join in &joins {
            routing.handle_join(join);
        }

        Self {
            kvs,
            rings,
            routing,
            client_inbox: Vec::new(),
        }
    }

    /// Sends a request to the given KVS node's request topic and runs the
    /// cluster until all triggered messages are delivered.
    fn send_request(&mut self, node: usize, request: Request) {
        let address = self.kvs[node].thread().request_topic();
        self.deliver(vec![(address, Message::Request(request))]);
    }

    fn send_address_request(&mut self, request: AddressRequest) {
        let address = self.routing.thread().address_request_topic();
        self.deliver(vec![(address, Message::AddressRequest(request))]);
    }

    fn run_gossip_round(&mut self, node: usize) {
        let outbound = self.kvs[node].gossip_round();
        self.deliver(outbound);
    }

    fn metadata_owner(&self, key: &Key) -> KvsThread {
        let snapshot = self.rings[0].snapshot();
        let owners =
            responsible_threads(&snapshot, &HashMap::new(), key, &[Tier::Memory]).unwrap();
        owners.into_iter().next().unwrap()
    }

    fn take_client_responses(&mut self) -> Vec<Response> {
        std::mem::take(&mut self.client_inbox)
            .into_iter()
            .filter_map(|(_, message)| match message {
                Message::Response(response) => Some(response),
                _ => None,
            })
            .collect()
    }

    fn take_client_address_responses(&mut self) -> Vec<strata::messages::AddressResponse> {
        std::mem::take(&mut self.client_inbox)
            .into_iter()
            .filter_map(|(_, message)| match message {
                Message::AddressResponse(response) => Some(response),
                _ => None,
            })
            .collect()
    }

    /// Routes every message to the thread listening on its address until the
    /// cluster falls silent; messages to unknown addresses are client
    /// responses and land in the inbox.
    fn deliver(&mut self, outbound: Vec<(Address, Message)>) {
        let mut queue: VecDeque<_> = outbound.into();
        while let Some((address, message)) = queue.pop_front() {
            let mut handled = false;

            for node in &mut self.kvs {
                let thread = node.thread().clone();
                if address == thread.request_topic() {
                    if let Message::Request(request) = message.clone() {
                        queue.extend(node.handle_request(request));
                    }
                    handled = true;
                } else if address == thread.gossip_topic() {
                    if let Message::Request(request) = message.clone() {
                        queue.extend(node.handle_gossip(request));
                    }
                    handled = true;
                } else if address == thread.replication_response_topic() {
                    if let Message::Response(response) = message.clone() {
                        queue.extend(node.handle_replication_response(response));
                    }
                    handled = true;
                }
                if handled {
                    break;
                }
            }
            if handled {
                continue;
            }

            if address == self.routing.thread().address_request_topic() {
                if let Message::AddressRequest(request) = message {
                    queue.extend(self.routing.handle_address_request(request));
                }
            } else if address == self.routing.thread().replication_response_topic() {
                if let Message::Response(response) = message {
                    queue.extend(self.routing.handle_replication_response(response));
                }
            } else {
                self.client_inbox.push((address, message));
            }
        }
    }
}

fn set_up_logger() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
