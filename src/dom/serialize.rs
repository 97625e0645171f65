//! HTML serialization through `html5ever::serialize`.

use std::collections::VecDeque;
use std::io;

use html5ever::QualName;
use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};

use super::arena::{NodeArena, NodeData, NodeId};

/// A node handle html5ever's serializer can walk.
pub struct SerializableNode<'a> {
    arena: &'a NodeArena,
    id: NodeId,
}

impl<'a> SerializableNode<'a> {
    pub fn new(arena: &'a NodeArena, id: NodeId) -> Self {
        Self { arena, id }
    }
}

enum Op {
    Open(NodeId),
    Close(QualName),
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let mut ops = VecDeque::new();
        match traversal_scope {
            TraversalScope::IncludeNode => ops.push_back(Op::Open(self.id)),
            TraversalScope::ChildrenOnly(_) => {
                ops.extend(self.arena.children(self.id).map(Op::Open))
            }
        }

        while let Some(op) = ops.pop_front() {
            let id = match op {
                Op::Open(id) => id,
                Op::Close(name) => {
                    serializer.end_elem(name)?;
                    continue;
                }
            };
            let Some(node) = self.arena.node(id) else {
                continue;
            };

            match &node.data {
                NodeData::Element { name, attrs, .. } => {
                    serializer.start_elem(
                        name.clone(),
                        attrs.iter().map(|a| (&a.name, a.value.as_str())),
                    )?;
                    ops.push_front(Op::Close(name.clone()));
                }
                NodeData::Document => {}
                NodeData::Doctype { name, .. } => {
                    serializer.write_doctype(name)?;
                    continue;
                }
                NodeData::Text(text) => {
                    serializer.write_text(text)?;
                    continue;
                }
                NodeData::Comment(text) => {
                    serializer.write_comment(text)?;
                    continue;
                }
            }

            let children: Vec<_> = self.arena.children(id).collect();
            for child in children.into_iter().rev() {
                ops.push_front(Op::Open(child));
            }
        }
        Ok(())
    }
}

fn serialize_with(arena: &NodeArena, id: NodeId, traversal_scope: TraversalScope) -> String {
    let mut out = Vec::new();
    // Pages are parsed as if scripting were off, so `noscript` holds markup.
    let opts = SerializeOpts {
        scripting_enabled: false,
        traversal_scope,
        ..Default::default()
    };
    match serialize(&mut out, &SerializableNode::new(arena, id), opts) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => String::new(),
    }
}

/// Markup of `id` including the node itself. For the document root this is
/// the whole page.
pub fn outer_html(arena: &NodeArena, id: NodeId) -> String {
    serialize_with(arena, id, TraversalScope::IncludeNode)
}

/// Markup of the children of `id`.
pub fn inner_html(arena: &NodeArena, id: NodeId) -> String {
    let parent = arena.qual_name(id).cloned();
    serialize_with(arena, id, TraversalScope::ChildrenOnly(parent))
}
