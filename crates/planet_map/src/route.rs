use serde::{Deserialize, Serialize};

use crate::types::{NodeId, PathId};

/// A precomputed walk between two nodes. `path_id_list` is stored tail-first:
/// the next hop to take is always the last element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub from_id: NodeId,
    pub to_id: NodeId,
    pub length: f64,
    pub path_id_list: Vec<PathId>,
}

impl Route {
    pub fn new(from_id: impl Into<NodeId>, to_id: impl Into<NodeId>, length: f64, path_id_list: Vec<PathId>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            length,
            path_id_list,
        }
    }

    pub fn next_path_id(&self) -> Option<&str> {
        self.path_id_list.last().map(String::as_str)
    }

    pub fn pop_next(&mut self) -> Option<PathId> {
        self.path_id_list.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.path_id_list.is_empty()
    }

    pub fn hops(&self) -> usize {
        self.path_id_list.len()
    }
}
