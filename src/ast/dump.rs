//! Structural dump of a node tree, a debugging aid for the `dump` subcommand.

use std::fmt::Write;

use super::{Arguments, NodeId, NodeKind, Tree};

/// Renders the tree as an indented outline, one node per line.
pub fn dump(tree: &Tree) -> String {
    let mut out = String::new();
    dump_node(tree, tree.root(), 0, &mut out);
    out
}

fn dump_node(tree: &Tree, id: NodeId, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    let line = tree.node(id).line;
    match tree.kind(id) {
        NodeKind::Section { children } => {
            let _ = writeln!(out, "{pad}Section");
            for child in children {
                dump_node(tree, *child, indent + 1, out);
            }
        }
        NodeKind::Text { value } => {
            let _ = writeln!(out, "{pad}Text {:?} @{}", value, line);
        }
        NodeKind::Error { message } => {
            let _ = writeln!(out, "{pad}Error {:?} @{}", message, line);
        }
        NodeKind::Command(command) => {
            let mut marks = Vec::new();
            if command.is_system {
                marks.push("system".to_string());
            }
            if command.is_block {
                marks.push("block".to_string());
            }
            if command.is_series {
                marks.push("series".to_string());
            }
            if !command.format.is_empty() {
                marks.push(format!("format={}", command.format));
            }
            if !command.flags.is_empty() {
                let flags: Vec<&str> = command.flags.iter().map(String::as_str).collect();
                marks.push(format!("flags=<{}>", flags.join(",")));
            }
            let marks = if marks.is_empty() {
                String::new()
            } else {
                format!(" [{}]", marks.join(" "))
            };
            let _ = writeln!(out, "{pad}Command {}{} @{}", command.name, marks, line);
            match &command.arguments {
                Arguments::Anonymous(list) => {
                    for (i, arg) in list.iter().enumerate() {
                        let _ = writeln!(out, "{pad}  #{}:", i + 1);
                        dump_node(tree, *arg, indent + 2, out);
                    }
                }
                Arguments::Named(map) => {
                    for (name, arg) in map {
                        let _ = writeln!(out, "{pad}  {}=", name);
                        dump_node(tree, *arg, indent + 2, out);
                    }
                }
            }
        }
    }
}
