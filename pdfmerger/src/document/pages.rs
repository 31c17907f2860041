//! Page tree traversal.
//!
//! Tree nodes live in an arena and refer to their parent by index. The walk
//! is an explicit depth-first stack; the set of ids on the current path
//! detects cycles, and a page's `/Parent` must name a node on that path.

use std::collections::HashSet;

use crate::document::SourceDocument;
use crate::error::{PdfMergeError, Result};
use crate::merge::CancelToken;
use crate::object::{Dictionary, Object, ObjectId};

/// Attributes a page may inherit from its ancestors.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A page leaf, ready to be re-parented.
///
/// `dict` has its `/Parent` removed and every inheritable attribute it
/// lacked filled in from its ancestors.
#[derive(Debug, Clone)]
pub struct PageLeaf {
    /// Id of the page object in its source document.
    pub id: ObjectId,
    /// Page dictionary.
    pub dict: Dictionary,
}

struct Node {
    parent: Option<usize>,
    attrs: Dictionary,
}

struct Frame {
    node: usize,
    id: ObjectId,
    kids: Vec<ObjectId>,
    next: usize,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    fn push(&mut self, parent: Option<usize>, dict: &Dictionary) -> usize {
        let attrs = INHERITABLE
            .iter()
            .filter_map(|&key| dict.get(key).map(|v| (key.to_vec(), v.clone())))
            .collect();
        self.nodes.push(Node { parent, attrs });
        self.nodes.len() - 1
    }

    /// Nearest value of `key` on the chain from `node` up to the root.
    fn inherited(&self, mut node: usize, key: &[u8]) -> Option<&Object> {
        loop {
            let current = self.nodes.get(node)?;
            if let Some(value) = current.attrs.get(key) {
                return Some(value);
            }
            node = current.parent?;
        }
    }
}

fn is_tree_node(dict: &Dictionary) -> bool {
    match dict.get_name(b"Type") {
        Some(b"Pages") => true,
        Some(b"Page") => false,
        _ => dict.has(b"Kids"),
    }
}

fn load_dict(doc: &mut SourceDocument<'_>, id: ObjectId) -> Result<Dictionary> {
    match doc.object(id)? {
        Object::Dictionary(dict) => Ok(dict),
        other => Err(PdfMergeError::malformed_object_at(
            id,
            format!("page tree node is a {}, not a dictionary", other.kind()),
        )),
    }
}

fn kids_of(doc: &mut SourceDocument<'_>, id: ObjectId, dict: &Dictionary) -> Result<Vec<ObjectId>> {
    let kids = match dict.get(b"Kids") {
        None => return Ok(Vec::new()),
        Some(Object::Reference(kids_id)) => doc.object(*kids_id)?,
        Some(other) => other.clone(),
    };
    let Object::Array(items) = kids else {
        return Err(PdfMergeError::malformed_object_at(id, "/Kids is not an array"));
    };
    items
        .iter()
        .map(|kid| {
            kid.as_reference().map(|kid| doc.canonical_id(kid)).ok_or_else(|| {
                PdfMergeError::malformed_object_at(id, "/Kids entry is not an indirect reference")
            })
        })
        .collect()
}

/// Walk the page tree under `root` and return its leaves in document order.
pub fn collect_pages(
    doc: &mut SourceDocument<'_>,
    root: ObjectId,
    cancel: &CancelToken,
) -> Result<Vec<PageLeaf>> {
    let root_dict = load_dict(doc, root)?;
    if !is_tree_node(&root_dict) {
        return Err(PdfMergeError::missing_root(format!(
            "/Pages {} {} is not a page tree node",
            root.0, root.1
        )));
    }

    let mut arena = Arena::default();
    let mut on_path = HashSet::from([root]);
    let mut leaves = Vec::new();
    let root_node = arena.push(None, &root_dict);
    let mut stack = vec![Frame {
        node: root_node,
        id: root,
        kids: kids_of(doc, root, &root_dict)?,
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(&kid) = frame.kids.get(frame.next) else {
            on_path.remove(&frame.id);
            stack.pop();
            continue;
        };
        frame.next += 1;
        let parent = frame.node;

        cancel.check()?;
        if on_path.contains(&kid) {
            return Err(PdfMergeError::CircularReference {
                document: None,
                object: kid,
            });
        }

        let mut dict = load_dict(doc, kid)?;
        if is_tree_node(&dict) {
            let node = arena.push(Some(parent), &dict);
            let kids = kids_of(doc, kid, &dict)?;
            on_path.insert(kid);
            stack.push(Frame {
                node,
                id: kid,
                kids,
                next: 0,
            });
            continue;
        }

        match dict.remove(b"Parent") {
            Some(Object::Reference(parent_id)) if on_path.contains(&parent_id) => {}
            Some(Object::Reference(parent_id)) => {
                return Err(PdfMergeError::malformed_object_at(
                    kid,
                    format!(
                        "page /Parent {} {} is not an ancestor of the page",
                        parent_id.0, parent_id.1
                    ),
                ));
            }
            _ => {
                return Err(PdfMergeError::malformed_object_at(
                    kid,
                    "page has no /Parent reference",
                ));
            }
        }

        for key in INHERITABLE {
            if !dict.has(key)
                && let Some(value) = arena.inherited(parent, key)
            {
                dict.set(key, value.clone());
            }
        }
        leaves.push(PageLeaf { id: kid, dict });
    }

    Ok(leaves)
}
