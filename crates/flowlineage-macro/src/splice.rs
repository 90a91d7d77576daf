//! Macro splicing
//!
//! Replaces a macro reference node with the internals of its expanded
//! definition. Boundary input `i` of the definition binds to input port `i`
//! of the reference, boundary output `j` to output port `j`. Boundary nodes
//! disappear; their inner connections are rewired to the caller's feeders
//! and consumers.

use flowlineage_core::{Connection, Endpoint, NodeId, UnresolvedReason, WorkflowDocument};
use std::collections::HashMap;
use tracing::debug;

/// Splice `definition` into `parent` in place of node `call_site`
///
/// On a port-count mismatch `parent` is left untouched and the mismatch is
/// returned as the reason the reference stays unresolved.
pub fn splice(
    parent: &mut WorkflowDocument,
    call_site: &str,
    definition: &WorkflowDocument,
) -> Result<(), UnresolvedReason> {
    let Some(position) = parent.nodes.iter().position(|n| n.id == call_site) else {
        return Err(UnresolvedReason::Malformed {
            message: format!("call site {} not found in {}", call_site, parent.name),
        });
    };

    let reference = &parent.nodes[position];
    let boundary_inputs: Vec<&str> = definition.boundary_inputs().into_iter().map(|n| n.id.as_str()).collect();
    let boundary_outputs: Vec<&str> = definition.boundary_outputs().into_iter().map(|n| n.id.as_str()).collect();

    if reference.input_ports.len() != boundary_inputs.len()
        || reference.output_ports.len() != boundary_outputs.len()
    {
        return Err(UnresolvedReason::PortArity {
            expected_inputs: reference.input_ports.len(),
            found_inputs: boundary_inputs.len(),
            expected_outputs: reference.output_ports.len(),
            found_outputs: boundary_outputs.len(),
        });
    }

    let input_ports = reference.input_ports.clone();
    let output_ports = reference.output_ports.clone();
    let input_index: HashMap<&str, usize> =
        boundary_inputs.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let output_index: HashMap<&str, usize> =
        boundary_outputs.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let prefixed = |id: &str| -> NodeId { format!("{}/{}", call_site, id) };

    // Classify inner connections by how they touch the boundary
    let mut internal = Vec::new();
    let mut from_input: Vec<Vec<Endpoint>> = vec![Vec::new(); boundary_inputs.len()];
    let mut to_output: Vec<Vec<Endpoint>> = vec![Vec::new(); boundary_outputs.len()];
    let mut pass_through: Vec<(usize, usize)> = Vec::new();

    for conn in &definition.connections {
        let source_input = input_index.get(conn.from.node.as_str()).copied();
        let target_output = output_index.get(conn.to.node.as_str()).copied();
        let touches_boundary_wrongly = output_index.contains_key(conn.from.node.as_str())
            || input_index.contains_key(conn.to.node.as_str());

        if touches_boundary_wrongly {
            debug!(macro_name = %definition.name, ?conn, "Ignoring connection into a boundary input or out of a boundary output");
            continue;
        }

        match (source_input, target_output) {
            (Some(i), Some(j)) => pass_through.push((i, j)),
            (Some(i), None) => from_input[i].push(Endpoint::new(prefixed(&conn.to.node), &conn.to.port)),
            (None, Some(j)) => to_output[j].push(Endpoint::new(prefixed(&conn.from.node), &conn.from.port)),
            (None, None) => internal.push(Connection {
                from: Endpoint::new(prefixed(&conn.from.node), &conn.from.port),
                to: Endpoint::new(prefixed(&conn.to.node), &conn.to.port),
            }),
        }
    }

    // Feeders of each reference input port, in parent connection order
    let mut feeders: Vec<Vec<Endpoint>> = vec![Vec::new(); input_ports.len()];
    for conn in parent.incoming(call_site) {
        if let Some(i) = input_ports.iter().position(|p| *p == conn.to.port) {
            feeders[i].push(conn.from.clone());
        }
    }

    let mut connections = Vec::with_capacity(parent.connections.len() + internal.len());
    let mut internal = Some(internal);

    for conn in &parent.connections {
        let into_reference = conn.to.node == call_site;
        let out_of_reference = conn.from.node == call_site;

        if !into_reference && !out_of_reference {
            connections.push(conn.clone());
            continue;
        }

        if let Some(internal) = internal.take() {
            connections.extend(internal);
        }

        if into_reference {
            if let Some(i) = input_ports.iter().position(|p| *p == conn.to.port) {
                for target in &from_input[i] {
                    connections.push(Connection {
                        from: conn.from.clone(),
                        to: target.clone(),
                    });
                }
            }
        }

        if out_of_reference {
            if let Some(j) = output_ports.iter().position(|p| *p == conn.from.port) {
                for source in &to_output[j] {
                    connections.push(Connection {
                        from: source.clone(),
                        to: conn.to.clone(),
                    });
                }
                for (i, _) in pass_through.iter().filter(|(_, out)| *out == j) {
                    for feeder in &feeders[*i] {
                        connections.push(Connection {
                            from: feeder.clone(),
                            to: conn.to.clone(),
                        });
                    }
                }
            }
        }
    }

    if let Some(internal) = internal {
        connections.extend(internal);
    }

    let inner_nodes: Vec<_> = definition
        .nodes
        .iter()
        .filter(|n| !input_index.contains_key(n.id.as_str()) && !output_index.contains_key(n.id.as_str()))
        .map(|n| {
            let mut node = n.clone();
            node.id = prefixed(&n.id);
            node.container_id = n.container_id.as_deref().map(prefixed);
            if node.origin.is_empty() {
                node.origin = format!("{}#{}", definition.name, n.id);
            }
            node
        })
        .collect();

    debug!(
        workflow = %parent.name,
        call_site,
        macro_name = %definition.name,
        nodes = inner_nodes.len(),
        "Spliced macro"
    );

    parent.nodes.splice(position..=position, inner_nodes);
    parent.connections = connections;

    Ok(())
}
