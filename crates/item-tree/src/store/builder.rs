//! Declarative construction of nested-set rows.
//!
//! Items are declared parent-first; [`HierarchyBuilder::build`] assigns ids
//! in declaration order and left/right bounds in a single depth-first pass,
//! starting with `left = 1` on the root.

use crate::error::{Result, TreeError};
use crate::types::{CollectionId, ItemId, ItemMode, ItemRow};

#[derive(Debug, Clone)]
struct BuilderNode {
    parent: Option<usize>,
    name: String,
    mode: ItemMode,
    content_ref: Option<u64>,
    children: Vec<usize>,
}

/// Builds the rows of one collection's hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    collection_id: CollectionId,
    first_id: u64,
    nodes: Vec<BuilderNode>,
}

impl HierarchyBuilder {
    /// Starts a hierarchy whose root container gets id 1.
    pub fn new(collection_id: CollectionId, root_name: &str) -> Self {
        Self::with_first_id(collection_id, 1, root_name)
    }

    /// Starts a hierarchy whose root container gets id `first_id`.
    pub fn with_first_id(collection_id: CollectionId, first_id: u64, root_name: &str) -> Self {
        Self {
            collection_id,
            first_id,
            nodes: vec![BuilderNode {
                parent: None,
                name: root_name.to_string(),
                mode: ItemMode::CONTAINER,
                content_ref: None,
                children: Vec::new(),
            }],
        }
    }

    #[inline]
    pub fn root(&self) -> ItemId {
        ItemId::new(self.first_id)
    }

    pub fn container(&mut self, parent: ItemId, name: &str) -> Result<ItemId> {
        self.node(parent, name, ItemMode::CONTAINER, None)
    }

    /// An artifact folder, e.g. the metadata directory of an unpacked archive.
    pub fn artifact(&mut self, parent: ItemId, name: &str) -> Result<ItemId> {
        self.node(parent, name, ItemMode::CONTAINER | ItemMode::ARTIFACT, None)
    }

    pub fn file(&mut self, parent: ItemId, name: &str, content_ref: u64) -> Result<ItemId> {
        self.node(parent, name, ItemMode::empty(), Some(content_ref))
    }

    pub fn node(
        &mut self,
        parent: ItemId,
        name: &str,
        mode: ItemMode,
        content_ref: Option<u64>,
    ) -> Result<ItemId> {
        let parent_index = self.index_of(parent)?;
        if !self.nodes[parent_index].mode.is_container() {
            return Err(TreeError::InvalidInput(format!(
                "item {parent} is not a container"
            )));
        }

        let index = self.nodes.len();
        self.nodes.push(BuilderNode {
            parent: Some(parent_index),
            name: name.to_string(),
            mode,
            content_ref,
            children: Vec::new(),
        });
        self.nodes[parent_index].children.push(index);
        Ok(self.id_at(index))
    }

    /// Number of declared items, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Emits the rows ordered by id.
    pub fn build(&self) -> Vec<ItemRow> {
        let mut bounds = vec![(0i64, 0i64); self.nodes.len()];
        let mut counter = 1i64;
        let mut stack = vec![(0usize, false)];

        while let Some((index, visited)) = stack.pop() {
            if visited {
                bounds[index].1 = counter;
                counter += 1;
                continue;
            }
            bounds[index].0 = counter;
            counter += 1;
            stack.push((index, true));
            for child in self.nodes[index].children.iter().rev() {
                stack.push((*child, false));
            }
        }

        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| ItemRow {
                id: self.id_at(index),
                collection_id: self.collection_id,
                parent: node.parent.map(|parent| self.id_at(parent)),
                left: bounds[index].0,
                right: bounds[index].1,
                content_ref: node.content_ref,
                mode: node.mode.bits(),
                name: node.name.clone(),
            })
            .collect()
    }

    fn index_of(&self, id: ItemId) -> Result<usize> {
        id.get()
            .checked_sub(self.first_id)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|index| *index < self.nodes.len())
            .ok_or_else(|| TreeError::InvalidInput(format!("unknown parent item {id}")))
    }

    #[inline]
    fn id_at(&self, index: usize) -> ItemId {
        ItemId::new(self.first_id + index as u64)
    }
}
