//! Level file format (spec §6): `serde`-derived wire structs with string
//! ids, converted into a [`GameLevel`] by [`TryFrom`]. Grounded on the
//! teacher's transport DTOs, which keep a `serde_json`-facing struct
//! separate from the domain type and resolve ids during conversion rather
//! than carrying string ids into the simulation.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::{Point2D, WireBend};
use crate::ids::{IdGen, PortId, SystemId, WireId};
use crate::level::{GameLevel, PacketInjection};
use crate::packet::PacketType;
use crate::port::{Port, PortShape};
use crate::system::{System, SystemKind};
use crate::wire::WireConnection;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionFile {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortShapeFile {
    Square,
    Triangle,
    Hexagon,
}

impl From<PortShapeFile> for PortShape {
    fn from(shape: PortShapeFile) -> Self {
        match shape {
            PortShapeFile::Square => PortShape::Square,
            PortShapeFile::Triangle => PortShape::Triangle,
            PortShapeFile::Hexagon => PortShape::Hexagon,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortFile {
    pub id: String,
    pub shape: PortShapeFile,
    pub position: PositionFile,
}

fn default_scan_radius() -> f32 {
    150.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCommon {
    pub id: String,
    pub position: PositionFile,
    #[serde(rename = "inputPorts", default)]
    pub input_ports: Vec<PortFile>,
    #[serde(rename = "outputPorts", default)]
    pub output_ports: Vec<PortFile>,
}

/// Polymorphic system tag (spec §6): `{ "type": "NormalSystem", ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemFile {
    NormalSystem(SystemCommon),
    ReferenceSystem {
        #[serde(flatten)]
        common: SystemCommon,
        #[serde(rename = "isSource", default)]
        is_source: bool,
    },
    SpySystem(SystemCommon),
    SaboteurSystem(SystemCommon),
    #[serde(rename = "VPNSystem")]
    VpnSystem(SystemCommon),
    AntiTrojanSystem {
        #[serde(flatten)]
        common: SystemCommon,
        #[serde(rename = "scanRadius", default = "default_scan_radius")]
        scan_radius: f32,
    },
    DistributorSystem(SystemCommon),
    MergerSystem(SystemCommon),
}

impl SystemFile {
    fn common(&self) -> &SystemCommon {
        match self {
            SystemFile::NormalSystem(c)
            | SystemFile::SpySystem(c)
            | SystemFile::SaboteurSystem(c)
            | SystemFile::VpnSystem(c)
            | SystemFile::DistributorSystem(c)
            | SystemFile::MergerSystem(c) => c,
            SystemFile::ReferenceSystem { common, .. } => common,
            SystemFile::AntiTrojanSystem { common, .. } => common,
        }
    }

    fn kind(&self) -> SystemKind {
        match self {
            SystemFile::NormalSystem(_) => SystemKind::Normal,
            SystemFile::ReferenceSystem { is_source, .. } => SystemKind::Reference {
                is_source: *is_source,
                delivered_count: 0,
            },
            SystemFile::SpySystem(_) => SystemKind::Spy,
            SystemFile::SaboteurSystem(_) => SystemKind::Saboteur,
            SystemFile::VpnSystem(_) => SystemKind::Vpn,
            SystemFile::AntiTrojanSystem { scan_radius, .. } => SystemKind::AntiTrojan { scan_radius: *scan_radius },
            SystemFile::DistributorSystem(_) => SystemKind::Distributor,
            SystemFile::MergerSystem(_) => SystemKind::Merger,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConnectionFile {
    #[serde(rename = "sourcePort")]
    pub source_port: String,
    #[serde(rename = "destinationPort")]
    pub destination_port: String,
    #[serde(default)]
    pub bends: Vec<PositionFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketInjectionFile {
    pub time: f32,
    #[serde(rename = "packetType")]
    pub packet_type: PacketType,
    #[serde(rename = "sourceId")]
    pub source_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelFile {
    #[serde(rename = "levelId")]
    pub level_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "initialWireLength")]
    pub initial_wire_length: f32,
    #[serde(rename = "levelDuration")]
    pub level_duration: f32,
    pub systems: Vec<SystemFile>,
    #[serde(rename = "wireConnections", default)]
    pub wire_connections: Vec<WireConnectionFile>,
    #[serde(rename = "packetSchedule", default)]
    pub packet_schedule: Vec<PacketInjectionFile>,
    #[serde(rename = "isTutorial", default)]
    pub is_tutorial: bool,
}

impl TryFrom<LevelFile> for GameLevel {
    type Error = anyhow::Error;

    fn try_from(file: LevelFile) -> Result<Self> {
        let mut level = GameLevel::new(file.level_id, file.name, file.initial_wire_length, file.level_duration);
        level.description = file.description;
        level.is_tutorial = file.is_tutorial;

        let mut system_ids = IdGen::default();
        let mut port_ids = IdGen::default();
        let mut system_map: HashMap<String, SystemId> = HashMap::new();
        let mut port_map: HashMap<String, PortId> = HashMap::new();

        for system_file in &file.systems {
            let common = system_file.common();
            if system_map.contains_key(&common.id) {
                return Err(anyhow!("duplicate system id `{}`", common.id));
            }
            let system_id = SystemId(system_ids.next());
            system_map.insert(common.id.clone(), system_id);

            let position = Point2D::new(common.position.x, common.position.y);
            let mut system = System::new(system_id, position, system_file.kind());

            for port_file in &common.input_ports {
                let port_id = PortId(port_ids.next());
                port_map.insert(port_file.id.clone(), port_id);
                let pos = Point2D::new(port_file.position.x, port_file.position.y);
                system.input_ports.push(Port::new(port_id, port_file.shape.into(), true, system_id, pos));
            }
            for port_file in &common.output_ports {
                let port_id = PortId(port_ids.next());
                port_map.insert(port_file.id.clone(), port_id);
                let pos = Point2D::new(port_file.position.x, port_file.position.y);
                system.output_ports.push(Port::new(port_id, port_file.shape.into(), false, system_id, pos));
            }
            level.systems.push(system);
        }

        let mut wire_ids = IdGen::default();
        for wire_file in &file.wire_connections {
            let source_port = *port_map
                .get(&wire_file.source_port)
                .with_context(|| format!("wire references unknown source port `{}`", wire_file.source_port))?;
            let destination_port = *port_map
                .get(&wire_file.destination_port)
                .with_context(|| format!("wire references unknown destination port `{}`", wire_file.destination_port))?;

            let source_pos = level
                .system_owning_port(source_port)
                .and_then(|s| s.port(source_port))
                .map(|p| p.position)
                .with_context(|| "source port resolved but owning system missing")?;
            let dest_pos = level
                .system_owning_port(destination_port)
                .and_then(|s| s.port(destination_port))
                .map(|p| p.position)
                .with_context(|| "destination port resolved but owning system missing")?;

            let wire_id = WireId(wire_ids.next());
            let mut wire = WireConnection::new(wire_id, source_port, destination_port, source_pos.distance(&dest_pos));
            for bend in &wire_file.bends {
                wire.bends.push(WireBend::new(Point2D::new(bend.x, bend.y)));
            }
            if let Some(port) = level.system_owning_port_mut(source_port).and_then(|s| s.port_mut(source_port)) {
                port.is_connected = true;
            }
            if let Some(port) = level.system_owning_port_mut(destination_port).and_then(|s| s.port_mut(destination_port)) {
                port.is_connected = true;
            }
            level.wires.push(wire);
        }

        for injection_file in &file.packet_schedule {
            let source_system = *system_map
                .get(&injection_file.source_id)
                .with_context(|| format!("injection references unknown system `{}`", injection_file.source_id))?;
            level
                .packet_schedule
                .push(PacketInjection::new(injection_file.time, injection_file.packet_type, source_system));
        }

        Ok(level)
    }
}

/// Parses a level file from JSON text (spec §6).
pub fn load_level_json(text: &str) -> Result<GameLevel> {
    let file: LevelFile = serde_json::from_str(text).context("failed to parse level file")?;
    GameLevel::try_from(file).context("failed to resolve level file into a level")
}
