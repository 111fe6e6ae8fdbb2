//! Network-disconnected game-over predicate (spec §4.8, §9).

use crate::ids::SystemId;
use crate::state::GameState;
use crate::system::SystemKind;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use std::collections::HashMap;

impl GameState {
    /// True iff at least one non-failed source can reach at least one
    /// non-failed destination via active, non-destroyed wires. Tutorial
    /// levels (spec §9 open-question resolution) use undirected
    /// reachability as a fallback instead of a string match on level name.
    pub(crate) fn has_network_path_source_to_sink(&self) -> bool {
        let sources: Vec<SystemId> = self
            .level
            .systems
            .iter()
            .filter(|s| !s.is_failed() && matches!(s.kind, SystemKind::Reference { is_source: true, .. }))
            .map(|s| s.id)
            .collect();
        let sinks: Vec<SystemId> = self
            .level
            .systems
            .iter()
            .filter(|s| !s.is_failed() && matches!(s.kind, SystemKind::Reference { .. }))
            .map(|s| s.id)
            .collect();
        if sources.is_empty() || sinks.is_empty() {
            return false;
        }

        let mut index_of: HashMap<SystemId, NodeIndex> = HashMap::new();
        if self.level.is_tutorial {
            let mut graph: UnGraph<SystemId, ()> = UnGraph::new_undirected();
            for system in self.level.systems.iter() {
                index_of.insert(system.id, graph.add_node(system.id));
            }
            for wire in self.level.active_wires() {
                if let (Some(src_sys), Some(dst_sys)) = (
                    self.level.system_owning_port(wire.source_port).map(|s| s.id),
                    self.level.system_owning_port(wire.destination_port).map(|s| s.id),
                ) {
                    graph.add_edge(index_of[&src_sys], index_of[&dst_sys], ());
                }
            }
            sources.iter().any(|src| {
                sinks
                    .iter()
                    .any(|dst| has_path_connecting(&graph, index_of[src], index_of[dst], None))
            })
        } else {
            let mut graph: DiGraph<SystemId, ()> = DiGraph::new();
            for system in self.level.systems.iter() {
                index_of.insert(system.id, graph.add_node(system.id));
            }
            for wire in self.level.active_wires() {
                if let (Some(src_sys), Some(dst_sys)) = (
                    self.level.system_owning_port(wire.source_port).map(|s| s.id),
                    self.level.system_owning_port(wire.destination_port).map(|s| s.id),
                ) {
                    graph.add_edge(index_of[&src_sys], index_of[&dst_sys], ());
                }
            }
            sources.iter().any(|src| {
                sinks
                    .iter()
                    .any(|dst| has_path_connecting(&graph, index_of[src], index_of[dst], None))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Point2D;
    use crate::ids::{PortId, SystemId, WireId};
    use crate::level::GameLevel;
    use crate::port::{Port, PortShape};
    use crate::state::{GameState, Settings};
    use crate::system::{System, SystemKind};
    use crate::wire::WireConnection;

    fn src_dst_level() -> GameLevel {
        let mut level = GameLevel::new("c", "Connectivity", 1000.0, 60.0);
        let mut src = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Reference { is_source: true, delivered_count: 0 });
        src.output_ports.push(Port::new(PortId(0), PortShape::Square, false, SystemId(0), Point2D::new(10.0, 0.0)));
        let mut dst = System::new(SystemId(1), Point2D::new(200.0, 0.0), SystemKind::Reference { is_source: false, delivered_count: 0 });
        dst.input_ports.push(Port::new(PortId(1), PortShape::Square, true, SystemId(1), Point2D::new(190.0, 0.0)));
        level.systems.push(src);
        level.systems.push(dst);
        level.wires.push(WireConnection::new(WireId(0), PortId(0), PortId(1), 200.0));
        level
    }

    #[test]
    fn an_active_wire_connects_source_to_sink() {
        let state = GameState::new(src_dst_level(), Settings::default());
        assert!(state.has_network_path_source_to_sink());
    }

    #[test]
    fn a_destroyed_wire_disconnects_source_from_sink() {
        let mut state = GameState::new(src_dst_level(), Settings::default());
        state.level.wires[0].destroyed = true;
        state.level.wires[0].active = false;
        assert!(!state.has_network_path_source_to_sink());
    }

    #[test]
    fn a_failed_source_has_no_path_to_any_sink() {
        let mut state = GameState::new(src_dst_level(), Settings::default());
        state.level.systems[0].state = crate::system::SystemState::Failed;
        assert!(!state.has_network_path_source_to_sink());
    }

    #[test]
    fn a_level_with_no_sources_is_never_connected() {
        let level = GameLevel::new("empty", "No Sources", 1000.0, 60.0);
        let state = GameState::new(level, Settings::default());
        assert!(!state.has_network_path_source_to_sink());
    }
}
