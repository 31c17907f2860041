//! Global object numbering for one merge.

use std::collections::HashMap;

use crate::object::ObjectId;

/// Maps `(document index, source id)` to output object numbers.
///
/// Numbers are handed out from a single counter starting at 1, so the
/// mapping is injective: two distinct source objects never share an output
/// number. Every output object has generation 0.
#[derive(Debug, Clone)]
pub struct GlobalObjectSpace {
    numbers: HashMap<(usize, ObjectId), u32>,
    next: u32,
}

impl GlobalObjectSpace {
    /// Create an empty space; the first number handed out is 1.
    pub fn new() -> Self {
        Self {
            numbers: HashMap::new(),
            next: 1,
        }
    }

    /// Number for a source object, assigning the next free one on first use.
    pub fn assign(&mut self, document: usize, id: ObjectId) -> u32 {
        let next = &mut self.next;
        *self.numbers.entry((document, id)).or_insert_with(|| {
            let number = *next;
            *next += 1;
            number
        })
    }

    /// Number already assigned to a source object.
    pub fn get(&self, document: usize, id: ObjectId) -> Option<u32> {
        self.numbers.get(&(document, id)).copied()
    }

    /// Rewrite a source reference into the output space.
    ///
    /// Ids that were never assigned map to object 0, the head of the free
    /// list, which readers resolve to `null`.
    pub fn translate(&self, document: usize, id: ObjectId) -> ObjectId {
        (self.get(document, id).unwrap_or(0), 0)
    }

    /// A fresh number for an object created by the merge itself.
    pub fn allocate(&mut self) -> u32 {
        let number = self.next;
        self.next += 1;
        number
    }

    /// Number of numbers handed out so far.
    pub fn len(&self) -> usize {
        self.next as usize - 1
    }

    /// Whether nothing was assigned yet.
    pub fn is_empty(&self) -> bool {
        self.next == 1
    }
}

impl Default for GlobalObjectSpace {
    fn default() -> Self {
        Self::new()
    }
}
