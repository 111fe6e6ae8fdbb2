criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(3));
    targets =
        ticking_idle_level,
        ticking_busy_chain,
        injecting_a_packet,
        advancing_wire_packets,
        building_a_wire_path,
        time_travel_fast_forward,
}

fn ticking_idle_level(c: &mut criterion::Criterion) {
    let mut state = GameState::new(two_hop_level(), Settings::default());
    let mut engine = Engine::new(1);
    c.bench_function("tick an idle two-system level", |b| {
        b.iter(|| engine.tick(&mut state, DT))
    });
}

fn ticking_busy_chain(c: &mut criterion::Criterion) {
    let mut state = GameState::new(busy_chain_level(), Settings::default());
    let mut engine = Engine::new(2);
    for _ in 0..120 {
        engine.tick(&mut state, DT);
    }
    c.bench_function("tick a five-system chain under steady packet load", |b| {
        b.iter(|| engine.tick(&mut state, DT))
    });
}

fn injecting_a_packet(c: &mut criterion::Criterion) {
    c.bench_function("process one due injection", |b| {
        b.iter_batched(
            || GameState::new(two_hop_level(), Settings::default()),
            |mut state| {
                let mut engine = Engine::new(3);
                engine.tick(&mut state, DT)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn advancing_wire_packets(c: &mut criterion::Criterion) {
    let mut state = GameState::new(busy_chain_level(), Settings::default());
    let mut engine = Engine::new(4);
    engine.tick(&mut state, DT);
    c.bench_function("advance every in-flight packet one substep", |b| {
        b.iter(|| engine.tick(&mut state, DT))
    });
}

fn building_a_wire_path(c: &mut criterion::Criterion) {
    let bends = [WireBend::new(Point2D::new(150.0, 40.0)), WireBend::new(Point2D::new(300.0, -30.0))];
    c.bench_function("build a smooth three-bend wire path", |b| {
        b.iter(|| WirePath::build(Point2D::new(0.0, 0.0), &bends, Point2D::new(450.0, 0.0), true))
    });
}

fn time_travel_fast_forward(c: &mut criterion::Criterion) {
    c.bench_function("fast-forward ten seconds via time travel", |b| {
        b.iter_batched(
            || (Engine::new(5), GameState::new(busy_chain_level(), Settings::default())),
            |(mut engine, mut state)| engine.time_travel_to(&mut state, 10.0),
            criterion::BatchSize::SmallInput,
        )
    });
}

const DT: f32 = 1.0 / 60.0;

fn two_hop_level() -> GameLevel {
    let json = r#"{
        "levelId": "bench-idle", "name": "Idle",
        "initialWireLength": 1000.0, "levelDuration": 600.0,
        "systems": [
            {"type": "ReferenceSystem", "id": "src", "position": {"x": 0.0, "y": 0.0}, "isSource": true,
             "outputPorts": [{"id": "src-out", "shape": "SQUARE", "position": {"x": 10.0, "y": 0.0}}]},
            {"type": "ReferenceSystem", "id": "dst", "position": {"x": 200.0, "y": 0.0},
             "inputPorts": [{"id": "dst-in", "shape": "SQUARE", "position": {"x": 190.0, "y": 0.0}}]}
        ],
        "wireConnections": [{"sourcePort": "src-out", "destinationPort": "dst-in"}],
        "packetSchedule": []
    }"#;
    load_level_json(json).expect("bench fixture should parse")
}

/// Five systems, a branching mix of packet kinds injected every two
/// seconds, enough in-flight traffic to exercise collision checks, bulk
/// side effects, and port contention during the steady-state bench.
fn busy_chain_level() -> GameLevel {
    let json = r#"{
        "levelId": "bench-busy", "name": "Busy Chain",
        "initialWireLength": 5000.0, "levelDuration": 600.0,
        "systems": [
            {"type": "ReferenceSystem", "id": "src", "position": {"x": 0.0, "y": 0.0}, "isSource": true,
             "outputPorts": [{"id": "src-out", "shape": "SQUARE", "position": {"x": 10.0, "y": 0.0}}]},
            {"type": "NormalSystem", "id": "a", "position": {"x": 150.0, "y": 0.0},
             "inputPorts": [{"id": "a-in", "shape": "SQUARE", "position": {"x": 140.0, "y": 0.0}}],
             "outputPorts": [{"id": "a-out", "shape": "SQUARE", "position": {"x": 160.0, "y": 0.0}}]},
            {"type": "DistributorSystem", "id": "b", "position": {"x": 300.0, "y": 0.0},
             "inputPorts": [{"id": "b-in", "shape": "SQUARE", "position": {"x": 290.0, "y": 0.0}}],
             "outputPorts": [
                {"id": "b-out1", "shape": "SQUARE", "position": {"x": 310.0, "y": -20.0}},
                {"id": "b-out2", "shape": "TRIANGLE", "position": {"x": 310.0, "y": 20.0}}
             ]},
            {"type": "NormalSystem", "id": "c", "position": {"x": 450.0, "y": -20.0},
             "inputPorts": [{"id": "c-in", "shape": "SQUARE", "position": {"x": 440.0, "y": -20.0}}],
             "outputPorts": [{"id": "c-out", "shape": "SQUARE", "position": {"x": 460.0, "y": -20.0}}]},
            {"type": "ReferenceSystem", "id": "dst", "position": {"x": 600.0, "y": 0.0},
             "inputPorts": [
                {"id": "dst-in1", "shape": "SQUARE", "position": {"x": 590.0, "y": -20.0}},
                {"id": "dst-in2", "shape": "TRIANGLE", "position": {"x": 590.0, "y": 20.0}}
             ]}
        ],
        "wireConnections": [
            {"sourcePort": "src-out", "destinationPort": "a-in"},
            {"sourcePort": "a-out", "destinationPort": "b-in"},
            {"sourcePort": "b-out1", "destinationPort": "c-in"},
            {"sourcePort": "c-out", "destinationPort": "dst-in1"},
            {"sourcePort": "b-out2", "destinationPort": "dst-in2"}
        ],
        "packetSchedule": [
            {"time": 0.0, "packetType": "SquareMessenger", "sourceId": "src"},
            {"time": 2.0, "packetType": "TriangleMessenger", "sourceId": "src"},
            {"time": 4.0, "packetType": "BulkSmall", "sourceId": "src"},
            {"time": 6.0, "packetType": "SquareMessenger", "sourceId": "src"},
            {"time": 8.0, "packetType": "Confidential", "sourceId": "src"}
        ]
    }"#;
    load_level_json(json).expect("bench fixture should parse")
}

use packetnet::dto::load_level_json;
use packetnet::geometry::{Point2D, WireBend, WirePath};
use packetnet::state::{GameState, Settings};
use packetnet::{Engine, GameLevel};
