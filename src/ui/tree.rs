//! Task descriptions and dependency trees

use crate::error::GraphResult;
use crate::graph::{TaskDescriptor, TaskGraph};
use colored::Colorize;

/// List every task with its description, in registration order
pub fn render_descriptions(graph: &TaskGraph) -> String {
    let width = graph.tasks().map(|t| t.name().len()).max().unwrap_or_default() + 4;

    let mut output = String::new();
    for task in graph.tasks() {
        let name = format!("{:<width$}", task.name());
        output.push_str(&format!(
            "{}{}\n",
            name.bold(),
            task.description().unwrap_or_default()
        ));
    }
    output
}

/// Render the dependency tree of `target`. The target is resolved first,
/// so missing dependencies and cycles are reported instead of drawn.
pub fn render_tree(graph: &TaskGraph, target: &str) -> GraphResult<String> {
    graph.resolve(target, false)?;

    let mut output = String::new();
    if let Some(root) = graph.get(target) {
        output.push_str(&format!("{}\n", root.name().bold()));
        render_children(graph, root, "", &mut output);
    }
    Ok(output)
}

fn render_children(graph: &TaskGraph, task: &TaskDescriptor, prefix: &str, output: &mut String) {
    let children = graph.predecessors(task.name());
    let count = children.len();

    for (i, child) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        output.push_str(&format!("{}{}{}\n", prefix, branch, child.name()));
        render_children(graph, child, &format!("{}{}", prefix, indent), output);
    }
}

pub fn print_descriptions(graph: &TaskGraph) {
    print!("{}", render_descriptions(graph));
}

pub fn print_tree(graph: &TaskGraph, target: &str) -> GraphResult<()> {
    print!("{}", render_tree(graph, target)?);
    Ok(())
}
