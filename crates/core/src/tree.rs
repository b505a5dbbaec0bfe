//! Task hierarchy - arena-backed forest built from flat task lists.

use std::collections::HashMap;

use crate::id::TaskId;
use crate::task::Task;

/// A forest of tasks linked by `parent_id`.
///
/// Tasks live in an arena (`Vec<Task>`) addressed by index, with a
/// separate adjacency mapping from parent index to ordered child indices.
/// Traversal is an explicit stack walk over the arena; there is no
/// self-referential node type.
#[derive(Debug, Clone, Default)]
pub struct TaskTree {
    tasks: Vec<Task>,
    children: Vec<Vec<usize>>,
    parent: Vec<Option<usize>>,
    roots: Vec<usize>,
    index: HashMap<TaskId, usize>,
}

impl TaskTree {
    /// Build a forest from a flat task list.
    ///
    /// Children keep the input order. A task whose `parent_id` does not
    /// resolve to any task in the list (or points at itself) is promoted
    /// to a root rather than rejected; callers that want stricter input
    /// validation must check before building.
    pub fn build(flat: Vec<Task>) -> Self {
        let mut index = HashMap::with_capacity(flat.len());
        for (i, task) in flat.iter().enumerate() {
            index.insert(task.id.clone(), i);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
        let mut parent: Vec<Option<usize>> = vec![None; flat.len()];
        let mut roots = Vec::new();

        for (i, task) in flat.iter().enumerate() {
            match task.parent_id.as_ref().and_then(|pid| index.get(pid)) {
                Some(&pi) if pi != i => {
                    children[pi].push(i);
                    parent[i] = Some(pi);
                }
                _ => {
                    if task.parent_id.is_some() {
                        tracing::debug!(
                            task = %task.id,
                            "unresolvable parent id, promoting task to root"
                        );
                    }
                    roots.push(i);
                }
            }
        }

        let mut tasks = flat;
        for (i, task) in tasks.iter_mut().enumerate() {
            task.is_leaf = children[i].is_empty();
        }

        Self {
            tasks,
            children,
            parent,
            roots,
            index,
        }
    }

    /// Flatten back to a list in depth-first pre-order.
    ///
    /// Recomputes `level` (root = 1) and `parent_id` from the actual tree
    /// shape; orphans that were promoted to roots come back with no
    /// parent.
    pub fn flatten(&self) -> Vec<Task> {
        let mut out = Vec::with_capacity(self.tasks.len());
        let mut stack: Vec<(usize, u32)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, 1))
            .collect();

        while let Some((i, level)) = stack.pop() {
            let mut task = self.tasks[i].clone();
            task.level = level;
            task.parent_id = self.parent[i].map(|pi| self.tasks[pi].id.clone());
            task.is_leaf = self.children[i].is_empty();
            out.push(task);

            for &child in self.children[i].iter().rev() {
                stack.push((child, level + 1));
            }
        }

        out
    }

    /// All tasks in arena (input) order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Leaf tasks in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|task| task.is_leaf)
    }

    /// Look up a task by id.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Ancestor chain from root to the given task, inclusive.
    pub fn path_to(&self, id: &TaskId) -> Option<Vec<&Task>> {
        let mut i = *self.index.get(id)?;
        let mut path = vec![&self.tasks[i]];
        while let Some(pi) = self.parent[i] {
            path.push(&self.tasks[pi]);
            i = pi;
        }
        path.reverse();
        Some(path)
    }

    /// Number of tasks in the forest.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the forest holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(id: &str, parent: &str) -> Task {
        let mut task = Task::new(id, id);
        task.parent_id = Some(TaskId::from(parent));
        task
    }

    fn sample_forest() -> TaskTree {
        // A
        // ├── A1
        // │   └── A1a
        // └── A2
        // B
        TaskTree::build(vec![
            Task::new("A", "A"),
            child("A1", "A"),
            child("A1a", "A1"),
            child("A2", "A"),
            Task::new("B", "B"),
        ])
    }

    #[test]
    fn build_assigns_leaf_status() {
        let tree = sample_forest();
        assert!(!tree.get(&TaskId::from("A")).unwrap().is_leaf);
        assert!(!tree.get(&TaskId::from("A1")).unwrap().is_leaf);
        assert!(tree.get(&TaskId::from("A1a")).unwrap().is_leaf);
        assert!(tree.get(&TaskId::from("A2")).unwrap().is_leaf);
        assert!(tree.get(&TaskId::from("B")).unwrap().is_leaf);
        assert_eq!(tree.leaves().count(), 3);
    }

    #[test]
    fn flatten_is_preorder_with_levels() {
        let tree = sample_forest();
        let flat = tree.flatten();
        let ids: Vec<&str> = flat.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["A", "A1", "A1a", "A2", "B"]);
        let levels: Vec<u32> = flat.iter().map(|t| t.level).collect();
        assert_eq!(levels, [1, 2, 3, 2, 1]);
        assert_eq!(flat[2].parent_id, Some(TaskId::from("A1")));
        assert_eq!(flat[4].parent_id, None);
    }

    #[test]
    fn orphaned_parent_becomes_root() {
        // Intentional tolerance: an unmatched parent id silently promotes
        // the task to a root instead of rejecting the input.
        let tree = TaskTree::build(vec![Task::new("A", "A"), child("X", "nonexistent")]);
        let flat = tree.flatten();
        assert_eq!(flat.len(), 2);
        let orphan = flat.iter().find(|t| t.id.as_str() == "X").unwrap();
        assert_eq!(orphan.level, 1);
        assert_eq!(orphan.parent_id, None);
    }

    #[test]
    fn self_parent_becomes_root() {
        let tree = TaskTree::build(vec![child("A", "A")]);
        let flat = tree.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].parent_id, None);
    }

    #[test]
    fn children_keep_input_order() {
        let tree = TaskTree::build(vec![
            Task::new("P", "P"),
            child("c", "P"),
            child("a", "P"),
            child("b", "P"),
        ]);
        let flat = tree.flatten();
        let ids: Vec<&str> = flat.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["P", "c", "a", "b"]);
    }

    #[test]
    fn path_to_walks_from_root() {
        let tree = sample_forest();
        let path = tree.path_to(&TaskId::from("A1a")).unwrap();
        let ids: Vec<&str> = path.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["A", "A1", "A1a"]);
        assert!(tree.path_to(&TaskId::from("missing")).is_none());
    }
}
