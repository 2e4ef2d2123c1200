//! Ghost-layer view of remote boundary leaves.
//!
//! Between the ghost-exchange and cross-partition phases the orchestrator
//! holds a [`GhostLayer`]: the set of read-only leaf copies received from
//! neighboring partitions. The violation detector consumes chunk-scoped
//! views of this layer.

use meshforge_proto::GhostElement;
use std::collections::HashMap;

/// Which mesh entities to ghost across a partition boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhostKind {
    /// Face-adjacent neighbors only (the minimum for 2:1 balance checks).
    Faces,
    /// Faces and edge-adjacent neighbors.
    Edges,
    /// Faces, edges, and corner-adjacent neighbors.
    Corners,
}

/// The local view of leaves owned by neighboring partitions.
///
/// The layer is rebuilt each balance cycle during the ghost-exchange phase
/// and read by the violation detector during the cross-partition phase.
#[derive(Debug, Clone, Default)]
pub struct GhostLayer {
    elements: Vec<GhostElement>,
}

impl GhostLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layer from an already-collected element list.
    pub fn from_elements(elements: Vec<GhostElement>) -> Self {
        Self { elements }
    }

    /// Incorporate a batch of remote boundary leaves.
    pub fn extend(&mut self, elements: impl IntoIterator<Item = GhostElement>) {
        self.elements.extend(elements);
    }

    pub fn elements(&self) -> &[GhostElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// A transient layer scoped to one contiguous chunk of the element list.
    ///
    /// Used by the parallel violation detector to hand each worker task its
    /// own slice of the ghost view.
    pub fn scoped(&self, start: usize, end: usize) -> GhostLayer {
        let end = end.min(self.elements.len());
        let start = start.min(end);
        GhostLayer {
            elements: self.elements[start..end].to_vec(),
        }
    }

    /// Elements grouped by the rank that owns them.
    pub fn by_owner(&self) -> HashMap<i32, Vec<&GhostElement>> {
        let mut grouped: HashMap<i32, Vec<&GhostElement>> = HashMap::new();
        for element in &self.elements {
            grouped.entry(element.owner_rank).or_default().push(element);
        }
        grouped
    }
}
