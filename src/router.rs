//! Shard routing
//!
//! Maps a key name onto one node of the target cluster. The mapping must be
//! stable across invocations and process restarts: a key copied to node 2 on
//! Monday's run must still route to node 2 when the checkpoint resumes on
//! Tuesday. CRC32 of the raw key bytes modulo the node count gives exactly
//! that, with no dependence on wall-clock time or process state.

/// Route a key to a node index in `0..node_count`.
///
/// The index is CRC32 (IEEE) of the key bytes modulo `node_count`, so it
/// depends only on the key and on the *size* of the cluster. The caller maps
/// the index into its configured node list; since reordering that list
/// changes the assignment, the list order is durable configuration.
///
/// `node_count` must be at least 1; config validation guarantees a non-empty
/// target list before any routing happens.
pub fn route(key: &[u8], node_count: usize) -> usize {
    debug_assert!(node_count >= 1, "route requires a non-empty cluster");
    crc32fast::hash(key) as usize % node_count
}

/// Route a key directly to a member of an ordered node slice.
pub fn route_to<'a, T>(key: &[u8], nodes: &'a [T]) -> &'a T {
    &nodes[route(key, nodes.len())]
}
