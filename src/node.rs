// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use log::debug;

use crate::{
    parsing::{self, BigEndianToken, FdtError, FdtHeader, ParseError, Stream},
    properties::NodeProperty,
};

/// Index of a node inside a [`DeviceTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    parent: Option<NodeId>,
    depth: usize,
    props: Vec<(String, Vec<u8>)>,
    children: Vec<NodeId>,
}

/// A parsed devicetree.
///
/// Nodes live in a flat arena and refer to each other by [`NodeId`]; the
/// phandle table maps every `phandle` property value to the node carrying it.
///
/// Note on `Display` impl: with the `pretty-printing` feature enabled the tree
/// is rendered similarly to `dtc`'s output
#[derive(Debug, Clone)]
pub struct DeviceTree {
    header: FdtHeader,
    nodes: Vec<NodeData>,
    phandles: BTreeMap<u32, NodeId>,
}

#[cfg(feature = "pretty-printing")]
impl core::fmt::Display for DeviceTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        crate::pretty_print::print_node(f, self.root(), 0)
    }
}

impl DeviceTree {
    /// Checks the header of `data` and parses its structure block.
    ///
    /// Node and property names are validated, duplicates (nodes, properties
    /// and phandles) are rejected.
    pub fn parse(data: &[u8]) -> Result<Self, FdtError> {
        let header = FdtHeader::parse(data)?;
        header.check(data)?;

        let structs = data.get(header.struct_range()).ok_or(ParseError::UnexpectedEndOfData)?;
        let strings = data.get(header.strings_range()).ok_or(ParseError::UnexpectedEndOfData)?;

        let mut tree = Self { header, nodes: Vec::new(), phandles: BTreeMap::new() };
        tree.parse_structs(Stream::new(structs), strings)?;

        debug!("parsed {} nodes, {} phandles", tree.nodes.len(), tree.phandles.len());

        Ok(tree)
    }

    fn parse_structs(&mut self, mut stream: Stream<'_>, strings: &[u8]) -> Result<(), FdtError> {
        let mut current: Option<NodeId> = None;
        let mut depth = 0usize;

        loop {
            match stream.advance_token()? {
                BigEndianToken::BEGIN_NODE => {
                    let name = stream.advance_cstr()?;
                    if !self.nodes.is_empty() && !parsing::is_valid_node_name(name) {
                        return Err(FdtError::InvalidNodeName(name.to_owned()));
                    }

                    let id = self.push_node(name, current)?;
                    current = Some(id);
                    depth += 1;
                }
                BigEndianToken::END_NODE => {
                    let node = current.ok_or(FdtError::Corrupt)?;
                    if depth == 0 {
                        return Err(FdtError::Corrupt);
                    }

                    current = self.nodes[node.0].parent;
                    depth -= 1;
                }
                BigEndianToken::PROP => {
                    let node = current.ok_or(FdtError::Corrupt)?;
                    let len = stream.advance_u32()? as usize;
                    let name_offset = stream.advance_u32()? as usize;

                    let name = parsing::string_at(strings, name_offset)?;
                    if !parsing::is_valid_property_name(name) {
                        return Err(FdtError::InvalidPropertyName(name.to_owned()));
                    }

                    let value = stream.advance_aligned(len)?;
                    self.push_property(node, name, value)?;
                }
                BigEndianToken::NOP => {}
                BigEndianToken::END => {
                    if depth != 0 {
                        return Err(FdtError::Truncated);
                    }

                    break;
                }
                BigEndianToken(token) => {
                    debug!("unknown structure token {token:#x}");
                    return Err(FdtError::Corrupt);
                }
            }
        }

        if self.nodes.is_empty() {
            return Err(FdtError::Corrupt);
        }

        Ok(())
    }

    fn push_node(&mut self, name: &str, parent: Option<NodeId>) -> Result<NodeId, FdtError> {
        let id = NodeId(self.nodes.len());

        let depth = match parent {
            Some(parent) => {
                if self.node(parent).child(name).is_some() {
                    return Err(FdtError::DuplicateNode(name.to_owned()));
                }

                self.nodes[parent.0].children.push(id);
                self.nodes[parent.0].depth + 1
            }
            // A second top-level node would otherwise be silently detached
            None if !self.nodes.is_empty() => return Err(FdtError::Corrupt),
            None => 0,
        };

        self.nodes.push(NodeData { name: name.to_owned(), parent, depth, props: Vec::new(), children: Vec::new() });

        Ok(id)
    }

    fn push_property(&mut self, node: NodeId, name: &str, value: &[u8]) -> Result<(), FdtError> {
        if self.nodes[node.0].props.iter().any(|(n, _)| n == name) {
            return Err(FdtError::DuplicateProperty(name.to_owned()));
        }

        if name == "phandle" {
            let phandle = match value {
                [a, b, c, d] => u32::from_be_bytes([*a, *b, *c, *d]),
                _ => return Err(FdtError::InvalidPhandle(self.node(node).path())),
            };

            if self.phandles.insert(phandle, node).is_some() {
                return Err(FdtError::DuplicatePhandle(phandle));
            }
        }

        self.nodes[node.0].props.push((name.to_owned(), value.to_vec()));

        Ok(())
    }

    fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn header(&self) -> &FdtHeader {
        &self.header
    }

    /// Return the root (`/`) node, which is always available
    pub fn root(&self) -> Node<'_> {
        self.node(NodeId(0))
    }

    /// Looks up a node by absolute path, e.g. `/dvs/rail@0`
    pub fn find_node(&self, path: &str) -> Option<Node<'_>> {
        let rest = path.strip_prefix('/')?;

        rest.split('/').filter(|s| !s.is_empty()).try_fold(self.root(), |node, name| node.child(name))
    }

    /// Searches for the given `phandle`
    pub fn find_phandle(&self, phandle: u32) -> Option<Node<'_>> {
        self.phandles.get(&phandle).map(|&id| self.node(id))
    }

    /// Returns an iterator over all of the nodes in the devicetree, depth-first
    pub fn all_nodes(&self) -> impl Iterator<Item = Node<'_>> {
        let mut stack = vec![NodeId(0)];

        core::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id.0].children.iter().rev());
            Some(self.node(id))
        })
    }
}

/// A node name split into its base name and optional unit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeName<'a> {
    pub name: &'a str,
    pub unit_address: Option<&'a str>,
}

impl core::fmt::Display for NodeName<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.unit_address {
            Some(ua) => write!(f, "{}@{}", self.name, ua),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A devicetree node
#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a DeviceTree,
    id: NodeId,
}

impl core::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node").field("path", &self.path()).finish_non_exhaustive()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

#[cfg(feature = "pretty-printing")]
impl core::fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        crate::pretty_print::print_node(f, *self, 0)
    }
}

impl<'a> Node<'a> {
    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The raw node name as stored in the blob; empty for the root
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn node_name(&self) -> NodeName<'a> {
        match self.name().split_once('@') {
            Some((name, unit_address)) => NodeName { name, unit_address: Some(unit_address) },
            None => NodeName { name: self.name(), unit_address: None },
        }
    }

    /// Absolute path of the node; the root is `/`
    pub fn path(&self) -> String {
        match self.parent() {
            None => String::from("/"),
            Some(parent) if parent.parent().is_none() => format!("/{}", self.name()),
            Some(parent) => format!("{}/{}", parent.path(), self.name()),
        }
    }

    pub fn depth(&self) -> usize {
        self.data().depth
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    /// Returns an iterator over the available properties of the node, in blob
    /// order
    pub fn properties(&self) -> impl Iterator<Item = NodeProperty<'a>> + 'a {
        self.data().props.iter().map(|(name, value)| NodeProperty { name, value })
    }

    /// Attempts to find the a property by its name
    pub fn property(&self, name: &str) -> Option<NodeProperty<'a>> {
        self.properties().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Returns an iterator over the children of the current node
    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| tree.node(id))
    }

    pub fn child(&self, name: &str) -> Option<Node<'a>> {
        self.children().find(|c| c.name() == name)
    }

    pub fn has_children(&self) -> bool {
        !self.data().children.is_empty()
    }

    /// Resolves a phandle through the tree's phandle table
    pub fn get_by_phandle(&self, phandle: u32) -> Option<Node<'a>> {
        self.tree.find_phandle(phandle)
    }
}
