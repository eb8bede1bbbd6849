// A dataflow graph of typed op nodes.
//
// Nodes live in an arena owned by the Dag and refer to each other by id.
// Ids are stable across pass boundaries: cloning a dag from its ancestor
// keeps every id, so debug tooling can correlate nodes before and after a
// rewrite. A node may list the same parent twice (x + x); multiplicity is
// represented by repeating the id on both sides of the edge.
//
// Parentless nodes are registered as children of a conceptual sentinel,
// in insertion order. The zero-ciphertext cache walks that list.


use std::collections::BTreeMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Node<T> {
    value: T,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Dag<T> {
    nodes: BTreeMap<NodeId, Node<T>>,
    sentinel_children: Vec<NodeId>,
    next_id: i64,
}

impl<T> Default for Dag<T> {
    fn default() -> Self {
        Dag::new()
    }
}

impl<T> Dag<T> {
    pub fn new() -> Self {
        Dag {
            nodes: BTreeMap::new(),
            sentinel_children: Vec::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        self.nodes.get(&id).expect("node id not in dag")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.nodes.get_mut(&id).expect("node id not in dag")
    }

    pub fn value(&self, id: NodeId) -> &T {
        &self.node(id).value
    }

    pub fn value_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.node_mut(id).value
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).parents
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Whether `parent` occurs more than once among `id`'s parents.
    pub fn is_double_parent(&self, id: NodeId, parent: NodeId) -> bool {
        self.node(id).parents.iter().filter(|p| **p == parent).count() > 1
    }

    pub fn sentinel_children(&self) -> &[NodeId] {
        &self.sentinel_children
    }

    pub fn add_node(&mut self, value: T, parents: &[NodeId]) -> NodeId {
        let id = NodeId(self.next_id);
        self.add_node_with_id(id, value, parents);
        id
    }

    /// Insert with a caller-chosen id (deserialization, ancestor clones).
    pub fn add_node_with_id(&mut self, id: NodeId, value: T, parents: &[NodeId]) {
        assert!(!self.nodes.contains_key(&id), "duplicate node id");
        for parent in parents {
            assert!(self.nodes.contains_key(parent), "parent id not in dag");
        }
        self.nodes.insert(
            id,
            Node {
                value,
                parents: parents.to_vec(),
                children: Vec::new(),
            },
        );
        for parent in parents {
            self.node_mut(*parent).children.push(id);
        }
        if parents.is_empty() {
            self.sentinel_children.push(id);
        }
        self.next_id = self.next_id.max(id.0 + 1);
    }

    /// Add one parent->child edge occurrence. Adding an existing edge
    /// again records a double edge.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        assert!(self.contains(parent) && self.contains(child));
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parents.push(parent);
    }

    /// Remove one occurrence of the edge.
    pub fn remove_edge(&mut self, parent: NodeId, child: NodeId) {
        let children = &mut self.node_mut(parent).children;
        let pos = children
            .iter()
            .position(|c| *c == child)
            .expect("edge not in dag");
        children.remove(pos);
        let parents = &mut self.node_mut(child).parents;
        let pos = parents
            .iter()
            .position(|p| *p == parent)
            .expect("edge not in dag");
        parents.remove(pos);
    }

    /// Remove a single-parent node, reattaching its children (with their
    /// edge multiplicities) to that parent.
    pub fn remove_node(&mut self, id: NodeId) -> T {
        let node = self.node(id);
        let mut distinct = node.parents.clone();
        distinct.dedup();
        assert!(
            distinct.len() == 1,
            "only single-parent nodes can be spliced out"
        );
        let parent = distinct[0];
        let removed = self.nodes.remove(&id).unwrap();
        let pchildren = &mut self.node_mut(parent).children;
        pchildren.retain(|c| *c != id);
        for child in &removed.children {
            pchildren.push(*child);
        }
        for child in removed.children {
            for slot in self.node_mut(child).parents.iter_mut() {
                if *slot == id {
                    *slot = parent;
                }
            }
        }
        removed.value
    }

    /// Remove a node dropping all of its edges; the caller has already
    /// rewired whatever should survive.
    pub fn remove_node_without_reassigning(&mut self, id: NodeId) -> T {
        let removed = self.nodes.remove(&id).expect("node id not in dag");
        for parent in &removed.parents {
            self.node_mut(*parent).children.retain(|c| *c != id);
        }
        for child in &removed.children {
            self.node_mut(*child).parents.retain(|p| *p != id);
        }
        self.sentinel_children.retain(|c| *c != id);
        removed.value
    }

    /// All ids in ancestor-id order: ascending id, which is construction
    /// order of the oldest ancestor dag.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Parents-before-children order; ties broken by ascending id so the
    /// order is deterministic.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut pending: BTreeMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (*id, node.parents.len()))
            .collect();
        let mut ready: std::collections::BTreeSet<NodeId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            pending.remove(&id);
            order.push(id);
            for child in &self.node(id).children {
                let count = pending.get_mut(child).expect("edge desync");
                *count -= 1;
                if *count == 0 {
                    ready.insert(*child);
                }
            }
        }
        assert!(order.len() == self.nodes.len(), "cycle in dag");
        order
    }

    pub fn reverse_topological_order(&self) -> Vec<NodeId> {
        let mut order = self.topological_order();
        order.reverse();
        order
    }
}

impl<T: Clone> Dag<T> {
    /// A value-level copy that keeps every node id, so the clone's ids
    /// still name the ancestor's nodes.
    pub fn clone_from_ancestor(&self) -> Dag<T> {
        self.clone()
    }
}
