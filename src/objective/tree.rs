use crate::error::{OkrError, OkrResult};
use crate::objective::model::{Level, Objective, ObjectiveSummary, TreeNode};
use std::collections::{HashMap, HashSet};

/// Arena of objectives indexed by id, with children resolved through a
/// parent-indexed multimap. All walks are iterative.
#[derive(Debug, Default)]
pub struct ObjectiveTree {
    nodes: HashMap<i32, Objective>,
    children: HashMap<i32, Vec<i32>>,
    roots: Vec<i32>,
}

impl ObjectiveTree {
    pub fn new(objectives: Vec<Objective>) -> Self {
        let mut nodes = HashMap::with_capacity(objectives.len());
        for o in objectives {
            nodes.insert(o.id, o);
        }

        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        let mut roots = Vec::new();
        for o in nodes.values() {
            match o.parent_id {
                // a dangling parent reference is treated as a root
                Some(pid) if nodes.contains_key(&pid) => {
                    children.entry(pid).or_default().push(o.id)
                }
                _ => roots.push(o.id),
            }
        }
        for ids in children.values_mut() {
            ids.sort_unstable();
        }
        roots.sort_unstable();

        Self {
            nodes,
            children,
            roots,
        }
    }

    pub fn get(&self, id: i32) -> Option<&Objective> {
        self.nodes.get(&id)
    }

    pub fn require(&self, id: i32) -> OkrResult<&Objective> {
        self.get(id).ok_or_else(|| OkrError::not_found("objective", id))
    }

    pub fn roots(&self) -> &[i32] {
        &self.roots
    }

    /// Direct children ids, ascending.
    pub fn child_ids(&self, id: i32) -> &[i32] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, id: i32) -> Vec<&Objective> {
        self.child_ids(id)
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .collect()
    }

    /// Ancestors ordered root first, ending at the immediate parent.
    pub fn ancestors(&self, id: i32) -> Vec<&Objective> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.nodes.get(&id).and_then(|o| o.parent_id);
        while let Some(pid) = current {
            if !seen.insert(pid) {
                break;
            }
            let Some(parent) = self.nodes.get(&pid) else {
                break;
            };
            chain.push(parent);
            current = parent.parent_id;
        }
        chain.reverse();
        chain
    }

    /// Ancestor ids from the immediate parent up to the root.
    pub fn ancestor_ids_upward(&self, id: i32) -> Vec<i32> {
        self.ancestors(id).into_iter().rev().map(|o| o.id).collect()
    }

    /// True when `candidate` lies strictly below `ancestor`.
    pub fn is_descendant(&self, candidate: i32, ancestor: i32) -> bool {
        candidate != ancestor && self.ancestors(candidate).iter().any(|a| a.id == ancestor)
    }

    /// Every node of the subtree rooted at `root`, children before parents.
    pub fn subtree_post_order(&self, root: i32) -> Vec<i32> {
        if !self.nodes.contains_key(&root) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        let mut seen = HashSet::new();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.child_ids(id).iter().rev() {
                stack.push((*child, false));
            }
        }
        out
    }

    /// Nested view of the subtree rooted at `root`.
    pub fn build(&self, root: i32) -> Option<TreeNode> {
        let order = self.subtree_post_order(root);
        let mut built: HashMap<i32, TreeNode> = HashMap::with_capacity(order.len());
        for id in order {
            let obj = self.nodes.get(&id)?;
            let children = self
                .child_ids(id)
                .iter()
                .filter_map(|c| built.remove(c))
                .collect();
            built.insert(
                id,
                TreeNode {
                    objective: ObjectiveSummary::from(obj),
                    children,
                },
            );
        }
        built.remove(&root)
    }

    pub fn forest(&self) -> Vec<TreeNode> {
        self.roots().iter().filter_map(|r| self.build(*r)).collect()
    }

    /// A node may be placed under `new_parent` only if the parent sits
    /// exactly one level above it and is not inside the node's own subtree.
    pub fn check_move(&self, id: i32, new_parent: Option<i32>) -> OkrResult<()> {
        let node = self.require(id)?;
        let Some(pid) = new_parent else {
            return Ok(());
        };
        if pid == id {
            return Err(OkrError::hierarchy("an objective cannot be its own parent"));
        }
        let parent = self.require(pid)?;
        if self.is_descendant(pid, id) {
            return Err(OkrError::hierarchy(format!(
                "objective {} is a descendant of {}",
                pid, id
            )));
        }
        check_parent_level(node.level, Some(parent.level))
    }

    /// A level change must keep the node one below its parent and one
    /// above each of its children.
    pub fn check_level_change(&self, id: i32, new_level: Level) -> OkrResult<()> {
        let node = self.require(id)?;
        let parent_level = node
            .parent_id
            .and_then(|pid| self.get(pid))
            .map(|p| p.level);
        check_parent_level(new_level, parent_level)?;
        let child_level = new_level.child_level();
        for child in self.children(id) {
            if Some(child.level) != child_level {
                return Err(OkrError::hierarchy(match child_level {
                    Some(_) => format!("{} cannot be a child of {}", child.level, new_level),
                    None => format!("{} objectives cannot have children", new_level),
                }));
            }
        }
        Ok(())
    }
}

/// Level-successor rule between a node and its (optional) parent.
pub fn check_parent_level(child: Level, parent: Option<Level>) -> OkrResult<()> {
    match parent {
        None => Ok(()),
        Some(p) if child == Level::Company => Err(OkrError::hierarchy(format!(
            "company objectives cannot have a parent ({})",
            p
        ))),
        Some(p) if child.parent_level() == Some(p) => Ok(()),
        Some(p) => Err(OkrError::hierarchy(format!(
            "{} cannot be a child of {}",
            child, p
        ))),
    }
}
