use crate::context::InterruptObserver;
use crate::error::GraphError;
use crate::node::{Node, NodeId};

pub(crate) struct NodeSlot {
    pub name: String,
    pub parent: Option<NodeId>,
    pub owner: Option<NodeId>,
    pub services: Vec<NodeId>,
    pub node: Box<dyn Node>,
    pub initialized: bool,
    pub activation: u64,
    pub observers: Vec<InterruptObserver>,
}

/// Arena of every node in one tree, filled by the tree loader.
///
/// Nodes are added bottom-up: a composite's children must already be in the graph when the
/// composite is added. Parent back-references are derived from [`Node::children`] and never
/// carry ownership; the graph owns every node.
#[derive(Default)]
pub struct NodeGraph {
    slots: Vec<NodeSlot>,
    faults: Vec<GraphError>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, node: impl Node) -> NodeId {
        self.add_boxed(name, Box::new(node))
    }

    pub fn add_boxed(&mut self, name: impl Into<String>, node: Box<dyn Node>) -> NodeId {
        let id = NodeId::from_raw(self.slots.len() as u32);
        for child in node.children() {
            match self.slots.get_mut(child.index()) {
                None => self.faults.push(GraphError::UnknownChild { parent: id, child }),
                Some(slot) => match slot.parent {
                    Some(first) => self.faults.push(GraphError::MultipleParents {
                        child,
                        first,
                        second: id,
                    }),
                    None => slot.parent = Some(id),
                },
            }
        }

        self.slots.push(NodeSlot {
            name: name.into(),
            parent: None,
            owner: None,
            services: Vec::new(),
            node,
            initialized: false,
            activation: 0,
            observers: Vec::new(),
        });
        id
    }

    /// Attach `service` to `owner`: the service runs on its own stack for as long as `owner`
    /// is on a stack.
    pub fn attach_service(&mut self, owner: NodeId, service: NodeId) -> Result<(), GraphError> {
        if !self.contains(owner) {
            return Err(GraphError::UnknownNode { node: owner });
        }
        let slot = self
            .slots
            .get_mut(service.index())
            .ok_or(GraphError::UnknownNode { node: service })?;
        if slot.node.service().is_none() {
            return Err(GraphError::NotAService { node: service });
        }
        if let Some(existing) = slot.owner {
            return Err(GraphError::ServiceAlreadyAttached {
                service,
                owner: existing,
            });
        }
        slot.owner = Some(owner);
        self.slots[owner.index()].services.push(service);
        Ok(())
    }

    pub fn validate(&self, root: NodeId) -> Result<(), GraphError> {
        if !self.contains(root) {
            return Err(GraphError::UnknownRoot { root });
        }
        match self.faults.first() {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.slots.len()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.slots.get(id.index()).map(|s| s.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.index())?.parent
    }

    /// The node a service is attached to.
    pub fn owner(&self, service: NodeId) -> Option<NodeId> {
        self.slots.get(service.index())?.owner
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.slots
            .get(id.index())
            .map(|s| s.node.children())
            .unwrap_or_default()
    }

    pub fn services_of(&self, id: NodeId) -> &[NodeId] {
        self.slots
            .get(id.index())
            .map(|s| s.services.as_slice())
            .unwrap_or(&[])
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.slots
            .iter()
            .position(|s| s.name == name)
            .map(|i| NodeId::from_raw(i as u32))
    }

    pub(crate) fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.slots.get(id.index())
    }

    pub(crate) fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.slots.get_mut(id.index())
    }
}
