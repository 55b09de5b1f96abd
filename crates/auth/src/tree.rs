//! Permission tree for menu rendering.
//!
//! The tree is presentation only: authorization always checks the flat
//! granted set in [`crate::Grants`], never a node's position.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use adminconsole_core::PermissionId;

/// A permission record as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub permission_name: String,
    pub permission_code: String,
    #[serde(default)]
    pub permission_type: i32,
    #[serde(default)]
    pub parent_id: Option<PermissionId>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTreeNode {
    #[serde(flatten)]
    pub permission: PermissionRecord,
    #[serde(default)]
    pub children: Vec<PermissionTreeNode>,
}

impl PermissionTreeNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }
}

// Deep chains would otherwise drop recursively, one stack frame per level.
impl Drop for PermissionTreeNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Build a forest from a flat, ordered permission list.
///
/// - A record whose `parent_id` is absent or names no record becomes a root.
/// - Children keep the relative order of the source list.
/// - A record whose ancestor chain leads back to itself also becomes a root;
///   its subtree is cut where the chain would revisit a node already on the
///   current path, so cyclic input yields duplicated but finite subtrees.
/// - With duplicate ids, the first record carrying the id is the parent.
///
/// Runs without recursion, so input depth is bounded only by memory.
pub fn build_permission_tree(records: &[PermissionRecord]) -> Vec<PermissionTreeNode> {
    let mut index: HashMap<PermissionId, usize> = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        index.entry(record.id).or_insert(i);
    }

    let parent_of: Vec<Option<usize>> = records
        .iter()
        .map(|r| r.parent_id.and_then(|p| index.get(&p).copied()))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    for (i, parent) in parent_of.iter().enumerate() {
        if let Some(p) = parent {
            children[*p].push(i);
        }
    }

    let on_cycle = cycle_members(&parent_of);
    let mut on_path = vec![false; records.len()];
    let mut forest = Vec::new();
    for i in 0..records.len() {
        if parent_of[i].is_none() || on_cycle[i] {
            build_subtree(i, records, &children, &mut on_path, &mut forest);
        }
    }

    tracing::debug!(roots = forest.len(), records = records.len(), "permission tree built");

    forest
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Flag every node that lies on a parent cycle. Each node has at most one
/// parent, so one walk per unvisited node marks everything in O(n).
fn cycle_members(parent_of: &[Option<usize>]) -> Vec<bool> {
    let mut mark = vec![Mark::Unvisited; parent_of.len()];
    let mut on_cycle = vec![false; parent_of.len()];
    let mut path = Vec::new();

    for start in 0..parent_of.len() {
        let mut current = Some(start);
        while let Some(node) = current {
            match mark[node] {
                Mark::Unvisited => {
                    mark[node] = Mark::InProgress;
                    path.push(node);
                    current = parent_of[node];
                }
                Mark::InProgress => {
                    // The walk closed a loop: everything from `node` onwards
                    // on the path is the cycle.
                    if let Some(pos) = path.iter().position(|&p| p == node) {
                        for &member in &path[pos..] {
                            on_cycle[member] = true;
                        }
                    }
                    break;
                }
                Mark::Done => break,
            }
        }
        for node in path.drain(..) {
            mark[node] = Mark::Done;
        }
    }

    on_cycle
}

struct Frame {
    index: usize,
    next_child: usize,
    built: Vec<PermissionTreeNode>,
}

impl Frame {
    fn new(index: usize) -> Self {
        Self {
            index,
            next_child: 0,
            built: Vec::new(),
        }
    }
}

/// Depth-first build of the subtree under `root` on an explicit stack,
/// skipping any child already on the current path.
fn build_subtree(
    root: usize,
    records: &[PermissionRecord],
    children: &[Vec<usize>],
    on_path: &mut [bool],
    forest: &mut Vec<PermissionTreeNode>,
) {
    on_path[root] = true;
    let mut stack = vec![Frame::new(root)];

    while let Some(frame) = stack.last_mut() {
        if let Some(&child) = children[frame.index].get(frame.next_child) {
            frame.next_child += 1;
            if !on_path[child] {
                on_path[child] = true;
                stack.push(Frame::new(child));
            }
            continue;
        }

        let Some(done) = stack.pop() else { break };
        on_path[done.index] = false;
        let node = PermissionTreeNode {
            permission: records[done.index].clone(),
            children: done.built,
        };
        match stack.last_mut() {
            Some(parent) => parent.built.push(node),
            None => forest.push(node),
        }
    }
}
