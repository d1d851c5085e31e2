use smallvec::SmallVec;

use crate::index::comparator::Comparator;
use crate::index::key::RowId;
use crate::index::stats::{IndexStats, TreeMetrics};

/// Default maximum fan-out of an internal node.
pub const DEFAULT_ORDER: usize = 512;

/// Smallest order for which the delete algorithm terminates.
pub(crate) const MIN_ORDER: usize = 4;

/// Sorted, deduplicated row-id set for one leaf key. Unique-key trees hold
/// exactly one id, hence the inline capacity.
pub(crate) type ValueSet = SmallVec<[RowId; 1]>;

/// Arena slot address of a node. Distinct from the persisted node id, which
/// survives serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeId(pub(crate) u32);

/// Tree node, leaf (`height == 0`) or internal.
///
/// `parent`, `prev` and `next` are non-owning navigational references;
/// `children` is the owning edge. Leaves keep `values`, internals keep
/// `children`.
#[derive(Debug)]
pub(crate) struct Node<K> {
    pub(crate) id: u64,
    pub(crate) height: u16,
    pub(crate) parent: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) keys: Vec<K>,
    pub(crate) values: Vec<ValueSet>,
    pub(crate) children: Vec<NodeId>,
}

impl<K> Node<K> {
    pub(crate) fn is_leaf(&self) -> bool {
        self.height == 0
    }
}

/// Node factory and storage. Slots released by merges and marker absorption
/// are reused; persisted ids stay monotonically fresh.
#[derive(Debug)]
pub(crate) struct NodeArena<K> {
    nodes: Vec<Node<K>>,
    free: Vec<NodeId>,
    next_node_id: u64,
}

impl<K> NodeArena<K> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            next_node_id: 0,
        }
    }

    pub(crate) fn alloc(&mut self, height: u16) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        if let Some(slot) = self.free.pop() {
            let node = &mut self.nodes[slot.0 as usize];
            node.id = id;
            node.height = height;
            node.parent = None;
            node.prev = None;
            node.next = None;
            node.keys.clear();
            node.values.clear();
            node.children.clear();
            return slot;
        }
        let slot = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            height,
            parent: None,
            prev: None,
            next: None,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        });
        slot
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<K> {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<K> {
        &mut self.nodes[id.0 as usize]
    }

    /// Unlinks the slot for reuse. Callers are responsible for having
    /// detached every navigational reference first.
    pub(crate) fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0 as usize];
        node.keys.clear();
        node.values.clear();
        node.children.clear();
        node.parent = None;
        node.prev = None;
        node.next = None;
        self.free.push(id);
    }

    /// Ensures factory-assigned persisted ids stay ahead of `floor`.
    pub(crate) fn bump_node_id(&mut self, floor: u64) {
        if self.next_node_id < floor {
            self.next_node_id = floor;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }
}

/// Configuration knobs for a tree instance.
#[derive(Clone, Debug)]
pub struct BTreeOptions {
    /// Maximum fan-out of an internal node; must be at least 4.
    pub order: usize,
}

impl Default for BTreeOptions {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
        }
    }
}

/// B+ tree backing one table index.
///
/// Single-threaded and fully synchronous: mutation assumes exclusive access
/// for its duration. Isolation and locking belong to the owning transaction
/// layer.
#[derive(Debug)]
pub struct BTree<C: Comparator> {
    pub(crate) name: String,
    pub(crate) cmp: C,
    pub(crate) unique: bool,
    /// Maximum fan-out.
    pub(crate) order: usize,
    /// `order - 1`.
    pub(crate) max_keys: usize,
    /// `order >> 1`.
    pub(crate) min_keys: usize,
    /// Read once at construction; selects the containing-leaf strategy.
    pub(crate) multi_dim: bool,
    pub(crate) root: NodeId,
    pub(crate) arena: NodeArena<C::Key>,
    pub(crate) stats: IndexStats<C::Key>,
    pub(crate) metrics: TreeMetrics,
}

/// Shared mutable accumulator threaded through a range scan. One instance
/// per `get_range` call, passed by mutable reference to avoid intermediate
/// allocations.
#[derive(Debug)]
pub(crate) struct ScanState {
    pub(crate) count: usize,
    pub(crate) limit: usize,
    pub(crate) reverse: bool,
    pub(crate) skip: usize,
}

impl ScanState {
    pub(crate) fn new(limit: usize, skip: usize, reverse: bool) -> Self {
        Self {
            count: 0,
            limit,
            reverse,
            skip,
        }
    }

    /// State for a scan that must see every match (reverse evaluation
    /// windows after the fact).
    pub(crate) fn unbounded(reverse: bool) -> Self {
        Self::new(usize::MAX, 0, reverse)
    }

    pub(crate) fn done(&self) -> bool {
        self.count >= self.limit
    }
}
