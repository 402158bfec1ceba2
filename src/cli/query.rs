//! Query commands (tree, show, path, siblings, search, levels, between, filter)

use anyhow::Result;
use serde::Serialize;

use super::output::Output;
use crate::domain::{
    level_label, name_filter, HierarchyIndex, HierarchyNode, NodeAnomaly, QueryEngine, UnitId,
    Validity,
};

/// What every query command renders against
pub struct View<'a> {
    index: &'a HierarchyIndex,
    levels: &'a [String],
    output: &'a Output,
}

impl<'a> View<'a> {
    pub fn new(index: &'a HierarchyIndex, levels: &'a [String], output: &'a Output) -> Self {
        Self {
            index,
            levels,
            output,
        }
    }

    fn engine(&self) -> QueryEngine<'a> {
        QueryEngine::new(self.index)
    }

    fn node_view(&self, node: &'a HierarchyNode) -> NodeView<'a> {
        NodeView {
            id: node.id(),
            name: node.name(),
            depth: node.depth,
            level: level_label(self.levels, node.depth),
            parent: node.parent.map(|p| self.index.node(p).id()),
            children: node.children.len(),
            descendants: node.descendant_count(),
            anomaly: node.anomaly,
        }
    }

    fn node_views(&self, nodes: &[&'a HierarchyNode]) -> Vec<NodeView<'a>> {
        nodes.iter().copied().map(|n| self.node_view(n)).collect()
    }

    /// Indented listing; depths are shown relative to the first node
    fn print_tree(&self, nodes: &[&HierarchyNode]) {
        let base = nodes.iter().map(|n| n.depth).min().unwrap_or(0);
        for node in nodes {
            let indent = "  ".repeat(node.depth - base);
            println!("{}{}  {}{}", indent, node.id(), node.name(), marker(node));
        }
    }

    fn print_list(&self, nodes: &[&HierarchyNode]) {
        self.output
            .header(&format!("{:<14} {:<6} NAME", "ID", "DEPTH"), 60);
        for node in nodes {
            println!(
                "{:<14} {:<6} {}{}",
                node.id().as_str(),
                node.depth,
                node.name(),
                marker(node)
            );
        }
    }
}

/// Serialized form of one node
#[derive(Debug, Serialize)]
struct NodeView<'a> {
    id: &'a UnitId,
    name: &'a str,
    depth: usize,
    level: String,
    parent: Option<&'a UnitId>,
    children: usize,
    descendants: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    anomaly: Option<NodeAnomaly>,
}

fn marker(node: &HierarchyNode) -> &'static str {
    match node.anomaly {
        Some(NodeAnomaly::Cycle) => "  [cycle]",
        Some(NodeAnomaly::ParentConflict) => "  [conflict]",
        None => "",
    }
}

/// Print the forest or one subtree
pub fn tree(view: &View, id: Option<&UnitId>, depth: Option<usize>) -> Result<()> {
    let engine = view.engine();
    let nodes = match id {
        Some(id) => engine.subtree(id, depth)?,
        None => match depth {
            Some(depth) => engine.visible_to_level(depth),
            None => view
                .index
                .graph()
                .preorder()
                .into_iter()
                .map(|n| view.index.node(n))
                .collect(),
        },
    };
    view.output
        .verbose_ctx("tree", &format!("{} nodes", nodes.len()));

    if view.output.is_json() {
        view.output.data(&view.node_views(&nodes));
    } else if nodes.is_empty() {
        println!("No units in the hierarchy.");
    } else {
        view.print_tree(&nodes);
    }
    Ok(())
}

/// Show one unit in detail
pub fn show(view: &View, id: &UnitId) -> Result<()> {
    #[derive(Serialize)]
    struct Detail<'a> {
        #[serde(flatten)]
        node: NodeView<'a>,
        #[serde(skip_serializing_if = "Option::is_none")]
        short_text: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        long_text: Option<&'a str>,
        validity: Validity,
        path: Vec<&'a UnitId>,
    }

    let node = view.index.get(id)?;
    let path = view.index.ancestor_path(id)?;
    let detail = Detail {
        node: view.node_view(node),
        short_text: node.unit.short_text.as_deref(),
        long_text: node.unit.long_text.as_deref(),
        validity: node.unit.validity,
        path: path.iter().map(|n| n.id()).collect(),
    };

    if view.output.is_json() {
        view.output.data(&detail);
        return Ok(());
    }

    let out = view.output;
    out.field("ID", detail.node.id);
    out.field("Name", detail.node.name);
    if let Some(short) = detail.short_text {
        out.field("Short text", short);
    }
    if let Some(long) = detail.long_text {
        out.field("Long text", long);
    }
    out.field("Valid", detail.validity);
    out.field(
        "Level",
        format!("{} ({})", detail.node.depth, detail.node.level),
    );
    out.field(
        "Parent",
        detail
            .node
            .parent
            .map_or_else(|| "(root)".to_string(), |p| p.to_string()),
    );
    out.field("Children", detail.node.children);
    out.field("Descendants", detail.node.descendants);
    if let Some(anomaly) = detail.node.anomaly {
        let note = match anomaly {
            NodeAnomaly::Cycle => "cut from a cycle",
            NodeAnomaly::ParentConflict => "had competing parents",
        };
        out.field("Anomaly", note);
    }
    let path: Vec<_> = detail.path.iter().map(|p| p.as_str()).collect();
    out.field("Path", path.join(" > "));
    Ok(())
}

/// Print the path from the root down to a unit
pub fn path(view: &View, id: &UnitId) -> Result<()> {
    let nodes = view.engine().path_to_root(id)?;

    if view.output.is_json() {
        view.output.data(&view.node_views(&nodes));
    } else {
        view.print_tree(&nodes);
    }
    Ok(())
}

pub fn siblings(view: &View, id: &UnitId) -> Result<()> {
    let nodes = view.engine().siblings(id)?;

    if view.output.is_json() {
        view.output.data(&view.node_views(&nodes));
    } else if nodes.is_empty() {
        println!("{} has no siblings.", id);
    } else {
        view.print_list(&nodes);
    }
    Ok(())
}

pub fn search(view: &View, text: &str, limit: usize, word: bool) -> Result<()> {
    let engine = view.engine();
    let nodes = if word {
        engine.search_words(text, limit)
    } else {
        engine.search(text, limit)
    };
    view.output
        .verbose_ctx("search", &format!("Found {} results", nodes.len()));

    if view.output.is_json() {
        view.output.data(&view.node_views(&nodes));
    } else if nodes.is_empty() {
        println!("No units found for '{}'", text);
    } else {
        view.print_list(&nodes);
        println!();
        println!("Found {} unit(s)", nodes.len());
    }
    Ok(())
}

/// Print every unit at or above a level
pub fn levels(view: &View, max: usize) -> Result<()> {
    let nodes = view.engine().visible_to_level(max);

    if view.output.is_json() {
        view.output.data(&view.node_views(&nodes));
    } else if nodes.is_empty() {
        println!("No units in the hierarchy.");
    } else {
        view.print_tree(&nodes);
    }
    Ok(())
}

/// Connect two units through their lowest common ancestor
pub fn between(view: &View, a: &UnitId, b: &UnitId) -> Result<()> {
    let connection = view.engine().connect(a, b)?;

    if view.output.is_json() {
        view.output.data(&serde_json::json!({
            "lca": connection.lca,
            "from": connection.from_a,
            "to": connection.to_b,
            "highlighted": connection.highlighted(),
        }));
        return Ok(());
    }

    match connection.lca {
        Some(lca) => {
            view.output.field("Common ancestor", lca);
            view.output
                .field("Path", join_ids(&connection.highlighted()));
        }
        None => {
            println!("{} and {} are in different trees.", a, b);
            view.output
                .field(&format!("Path of {}", a), join_ids(&connection.from_a));
            view.output
                .field(&format!("Path of {}", b), join_ids(&connection.to_b));
        }
    }
    Ok(())
}

fn join_ids(ids: &[&UnitId]) -> String {
    ids.iter()
        .map(|i| i.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Subtree of a unit reduced to branches that match a text
pub fn filter(view: &View, id: &UnitId, text: &str) -> Result<()> {
    let nodes = view.engine().filtered_subtree(id, name_filter(text))?;

    if view.output.is_json() {
        view.output.data(&view.node_views(&nodes));
    } else if nodes.is_empty() {
        println!("Nothing under {} matches '{}'", id, text);
    } else {
        view.print_tree(&nodes);
    }
    Ok(())
}
