use std::fmt::{Debug, Write};

use crate::record::{RecordId, Records};

const TABLE_START: &str = "<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\">";
const TABLE_END: &str = "</TABLE>";

/// Renders the links below `root` as a Graphviz digraph.
///
/// Nodes are numbered in the order they are discovered, parents before
/// children and left before right, so the output is stable for snapshots.
/// Records housed by a heap also show their sequence position.
pub(crate) fn output_dot<V: Debug>(records: &Records<V>, root: Option<RecordId>) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "digraph {{\n  \
        node [shape=plaintext];\n  \
        rankdir=\"TB\";"
    )
    .unwrap();

    let mut edges = String::new();
    let mut stack: Vec<(RecordId, usize)> = root.map(|root| (root, 0)).into_iter().collect();
    let mut next_name = stack.len();

    while let Some((id, name)) = stack.pop() {
        let record = &records[id];
        write!(
            out,
            "  n{name} [label=<{TABLE_START}<TR><TD>{}</TD><TD>{}</TD>",
            record.order(),
            escape(&format!("{:?}", record.value())),
        )
        .unwrap();
        if let Some(index) = record.index() {
            write!(out, "<TD>@{index}</TD>").unwrap();
        }
        writeln!(out, "</TR>{TABLE_END}>];").unwrap();

        let mut children = vec![];
        for (child, side) in [(record.left(), "L"), (record.right(), "R")] {
            let Some(child) = child else {
                continue
            };
            let child_name = next_name;
            next_name += 1;
            writeln!(edges, "  n{name} -> n{child_name} [label=\"{side}\"];").unwrap();
            children.push((child, child_name));
        }
        stack.extend(children.into_iter().rev());
    }

    out.push_str(&edges);
    out.push('}');
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
