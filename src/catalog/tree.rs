use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Hard depth cap. The parent graph is a forest by construction; if a
/// walk ever gets this deep something has written a cycle and we report
/// it instead of spinning.
pub const MAX_TREE_DEPTH: usize = 64;

/// The slice of a category row that tree traversal needs.
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    /// status == active
    pub active: bool,
    /// soft-delete flag
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl CategoryNode {
    fn visible(&self) -> bool {
        self.active && !self.deleted
    }
}

/// One entry of the admin dropdown listing: the category name prefixed
/// with a depth marker, e.g. `|--- |--- Gaming Laptops`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryOption {
    pub id: Uuid,
    pub name: String,
    pub depth: usize,
}

/// The category itself plus every descendant, filtered to visible nodes
/// at every level. Used for product aggregation under a category: a
/// soft-deleted branch hides its whole subtree from aggregation.
pub fn resolve_subtree(nodes: &[CategoryNode], root: Uuid) -> AppResult<HashSet<Uuid>> {
    let children = children_by_parent(nodes);
    let by_id: HashMap<Uuid, &CategoryNode> = nodes.iter().map(|n| (n.id, n)).collect();

    let mut result = HashSet::new();
    let Some(root_node) = by_id.get(&root) else {
        return Ok(result);
    };
    if !root_node.visible() {
        return Ok(result);
    }

    let mut frontier = vec![root];
    result.insert(root);

    let mut depth = 0;
    while !frontier.is_empty() {
        if depth >= MAX_TREE_DEPTH {
            return Err(AppError::Internal(anyhow::anyhow!(
                "category tree deeper than {MAX_TREE_DEPTH} levels under {root}, possible parent cycle"
            )));
        }
        let mut next = Vec::new();
        for id in frontier {
            for child in children.get(&Some(id)).into_iter().flatten() {
                if child.visible() && result.insert(child.id) {
                    next.push(child.id);
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    Ok(result)
}

/// Depth-first flattening of the whole forest for admin dropdowns.
/// Soft-deleted nodes are skipped (with their subtrees); inactive ones
/// still show so they can be edited. Iterative on purpose: tree depth is
/// data-controlled and must not become stack depth.
pub fn render_indented(nodes: &[CategoryNode]) -> AppResult<Vec<CategoryOption>> {
    let children = children_by_parent(nodes);

    // Roots newest-first, children oldest-first, matching the admin UI.
    let mut roots: Vec<&CategoryNode> = nodes
        .iter()
        .filter(|n| n.parent_id.is_none() && !n.deleted)
        .collect();
    roots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut out = Vec::new();
    let mut stack: Vec<(&CategoryNode, usize)> =
        roots.into_iter().rev().map(|n| (n, 0)).collect();

    while let Some((node, depth)) = stack.pop() {
        if depth >= MAX_TREE_DEPTH {
            return Err(AppError::Internal(anyhow::anyhow!(
                "category tree deeper than {MAX_TREE_DEPTH} levels, possible parent cycle"
            )));
        }
        out.push(CategoryOption {
            id: node.id,
            name: format!("{}{}", "|--- ".repeat(depth), node.name),
            depth,
        });

        let mut kids: Vec<&CategoryNode> = children
            .get(&Some(node.id))
            .into_iter()
            .flatten()
            .filter(|n| !n.deleted)
            .copied()
            .collect();
        kids.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for kid in kids.into_iter().rev() {
            stack.push((kid, depth + 1));
        }
    }

    Ok(out)
}

/// The node and every descendant, visibility ignored. Reparenting
/// guards use this: a category must never move under its own subtree,
/// and hidden children still count for that purpose.
pub fn descendant_ids(nodes: &[CategoryNode], root: Uuid) -> AppResult<HashSet<Uuid>> {
    let children = children_by_parent(nodes);
    let mut result = HashSet::new();
    result.insert(root);
    let mut frontier = vec![root];

    let mut depth = 0;
    while !frontier.is_empty() {
        if depth >= MAX_TREE_DEPTH {
            return Err(AppError::Internal(anyhow::anyhow!(
                "category tree deeper than {MAX_TREE_DEPTH} levels under {root}, possible parent cycle"
            )));
        }
        let mut next = Vec::new();
        for id in frontier {
            for child in children.get(&Some(id)).into_iter().flatten() {
                if result.insert(child.id) {
                    next.push(child.id);
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    Ok(result)
}

fn children_by_parent(nodes: &[CategoryNode]) -> HashMap<Option<Uuid>, Vec<&CategoryNode>> {
    let mut map: HashMap<Option<Uuid>, Vec<&CategoryNode>> = HashMap::new();
    for node in nodes {
        map.entry(node.parent_id).or_default().push(node);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn node(name: &str, parent: Option<Uuid>, offset_secs: i64) -> CategoryNode {
        CategoryNode {
            id: Uuid::new_v4(),
            parent_id: parent,
            name: name.to_string(),
            slug: name.to_lowercase(),
            active: true,
            deleted: false,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn subtree_includes_all_descendants() {
        let a = node("A", None, 0);
        let b = node("B", Some(a.id), 1);
        let c = node("C", Some(b.id), 2);
        let other = node("Other", None, 3);

        let nodes = vec![a.clone(), b.clone(), c.clone(), other];
        let subtree = resolve_subtree(&nodes, a.id).unwrap();
        assert_eq!(subtree, [a.id, b.id, c.id].into_iter().collect());
    }

    #[test]
    fn soft_deleted_branch_is_excluded_from_aggregation() {
        let a = node("A", None, 0);
        let mut b = node("B", Some(a.id), 1);
        b.deleted = true;
        let c = node("C", Some(b.id), 2);

        let nodes = vec![a.clone(), b, c];
        let subtree = resolve_subtree(&nodes, a.id).unwrap();
        assert_eq!(subtree, [a.id].into_iter().collect());
    }

    #[test]
    fn inactive_root_yields_empty_subtree() {
        let mut a = node("A", None, 0);
        a.active = false;
        let b = node("B", Some(a.id), 1);
        let nodes = vec![a.clone(), b];
        assert!(resolve_subtree(&nodes, a.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_root_yields_empty_subtree() {
        let a = node("A", None, 0);
        assert!(resolve_subtree(&[a], Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn parent_cycle_terminates() {
        let mut a = node("A", None, 0);
        let b = node("B", Some(a.id), 1);
        a.parent_id = Some(b.id);
        let a_id = a.id;
        let b_id = b.id;
        // The visited set breaks the loop; both nodes come back once.
        let subtree = resolve_subtree(&[a, b], a_id).unwrap();
        assert_eq!(subtree, [a_id, b_id].into_iter().collect());
    }

    #[test]
    fn overly_deep_chain_is_reported() {
        let mut nodes = vec![node("N0", None, 0)];
        for i in 1..=MAX_TREE_DEPTH {
            let parent = nodes[i - 1].id;
            nodes.push(node(&format!("N{i}"), Some(parent), i as i64));
        }
        let root = nodes[0].id;
        assert!(resolve_subtree(&nodes, root).is_err());
        assert!(descendant_ids(&nodes, root).is_err());
        assert!(render_indented(&nodes).is_err());
    }

    #[test]
    fn descendant_ids_sees_through_hidden_nodes() {
        let a = node("A", None, 0);
        let mut b = node("B", Some(a.id), 1);
        b.deleted = true;
        let c = node("C", Some(b.id), 2);

        let nodes = vec![a.clone(), b.clone(), c.clone()];
        let ids = descendant_ids(&nodes, a.id).unwrap();
        assert_eq!(ids, [a.id, b.id, c.id].into_iter().collect());
    }

    #[test]
    fn indented_rendering_prefixes_by_depth() {
        let a = node("Computers", None, 0);
        let b = node("Laptops", Some(a.id), 1);
        let c = node("Gaming", Some(b.id), 2);

        let out = render_indented(&[a, b, c]).unwrap();
        let names: Vec<&str> = out.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Computers", "|--- Laptops", "|--- |--- Gaming"]
        );
        assert_eq!(out[2].depth, 2);
    }

    #[test]
    fn rendering_skips_deleted_subtrees_but_keeps_inactive() {
        let a = node("A", None, 0);
        let mut b = node("B", Some(a.id), 1);
        b.deleted = true;
        let c = node("C", Some(b.id), 2);
        let mut d = node("D", Some(a.id), 3);
        d.active = false;

        let out = render_indented(&[a, b, c, d]).unwrap();
        let names: Vec<&str> = out.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["A", "|--- D"]);
    }
}
