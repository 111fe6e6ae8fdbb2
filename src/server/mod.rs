//! HTTP + WebSocket transport exposing the engine's deterministic tick API
//! (spec §6). Grounded on the teacher's `hosting::Casino`/`hosting::Server`:
//! one `Hub` holds every loaded level behind an async mutex, keyed by a
//! counter-assigned id, and a WebSocket bridge ticks a level once per
//! inbound message and echoes back the resulting state snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::dto::LevelFile;
use crate::engine::Engine;
use crate::error::GameOverReason;
use crate::state::{GameState, Settings, SimulationMode};

pub type LevelId = u64;

struct LevelSession {
    engine: Engine,
    state: GameState,
}

/// Holds every loaded level for the lifetime of the process.
pub struct Hub {
    levels: RwLock<HashMap<LevelId, Mutex<LevelSession>>>,
    next_id: AtomicU64,
}

impl Default for Hub {
    fn default() -> Self {
        Self {
            levels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Hub {
    async fn load(&self, file: LevelFile, seed: u64) -> anyhow::Result<LevelId> {
        let level = crate::level::GameLevel::try_from(file)?;
        let state = GameState::new(level, Settings::default());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.levels.write().await.insert(
            id,
            Mutex::new(LevelSession {
                engine: Engine::new(seed),
                state,
            }),
        );
        log::info!("loaded level {id}");
        Ok(id)
    }

    async fn tick(&self, id: LevelId, dt: f32) -> anyhow::Result<StateSnapshot> {
        let levels = self.levels.read().await;
        let session = levels.get(&id).ok_or_else(|| anyhow::anyhow!("level not found"))?;
        let mut session = session.lock().await;
        let LevelSession { engine, state } = &mut *session;
        engine.tick(state, dt);
        Ok(StateSnapshot::from(&*state))
    }

    async fn snapshot(&self, id: LevelId) -> anyhow::Result<StateSnapshot> {
        let levels = self.levels.read().await;
        let session = levels.get(&id).ok_or_else(|| anyhow::anyhow!("level not found"))?;
        let session = session.lock().await;
        Ok(StateSnapshot::from(&session.state))
    }
}

/// The query surface spec §6 lists: coins, packet-loss %, delivered/lost
/// counts, remaining wire length, mode, level-complete/over flags, last
/// game-over reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub temporal_progress: f32,
    pub coins: u32,
    pub packet_loss_percentage: f32,
    pub delivered_count: u32,
    pub lost_packets_count: u32,
    pub remaining_wire_length: f32,
    pub mode: SimulationMode,
    pub level_complete: bool,
    pub game_over: bool,
    pub last_game_over_reason: GameOverReason,
}

impl From<&GameState> for StateSnapshot {
    fn from(state: &GameState) -> Self {
        Self {
            temporal_progress: state.temporal_progress,
            coins: state.coins,
            packet_loss_percentage: state.packet_loss_percentage(),
            delivered_count: state.delivered_count,
            lost_packets_count: state.lost_packets_count,
            remaining_wire_length: state.remaining_wire_length,
            mode: state.mode,
            level_complete: state.level_complete,
            game_over: state.game_over,
            last_game_over_reason: state.last_game_over_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoadRequest {
    #[serde(flatten)]
    level: LevelFile,
    #[serde(default)]
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct TickRequest {
    dt: f32,
}

pub struct Server;

impl Server {
    pub async fn run() -> Result<(), std::io::Error> {
        let hub = web::Data::new(Hub::default());
        log::info!("starting simulation server");
        HttpServer::new(move || {
            App::new()
                .wrap(Logger::new("%r %s %Ts"))
                .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
                .app_data(hub.clone())
                .route("/levels", web::post().to(load_level))
                .route("/levels/{id}/tick", web::post().to(tick_level))
                .route("/levels/{id}/state", web::get().to(get_state))
                .route("/levels/{id}/stream", web::get().to(stream_level))
        })
        .workers(4)
        .bind(std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()))?
        .run()
        .await
    }
}

async fn load_level(hub: web::Data<Hub>, body: web::Json<LoadRequest>) -> impl Responder {
    let LoadRequest { level, seed } = body.into_inner();
    match hub.load(level, seed).await {
        Ok(id) => HttpResponse::Ok().json(serde_json::json!({ "levelId": id })),
        Err(e) => HttpResponse::BadRequest().body(e.to_string()),
    }
}

async fn tick_level(hub: web::Data<Hub>, path: web::Path<LevelId>, body: web::Json<TickRequest>) -> impl Responder {
    match hub.tick(path.into_inner(), body.dt).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => HttpResponse::NotFound().body(e.to_string()),
    }
}

async fn get_state(hub: web::Data<Hub>, path: web::Path<LevelId>) -> impl Responder {
    match hub.snapshot(path.into_inner()).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => HttpResponse::NotFound().body(e.to_string()),
    }
}

/// Each inbound text message is parsed as a [`TickRequest`]; the level
/// advances once and the resulting snapshot is echoed back as JSON.
async fn stream_level(
    hub: web::Data<Hub>,
    path: web::Path<LevelId>,
    body: web::Payload,
    req: HttpRequest,
) -> impl Responder {
    use futures::StreamExt;
    let id = path.into_inner();
    let (response, mut session, mut stream) = match actix_ws::handle(&req, body) {
        Ok(v) => v,
        Err(e) => return HttpResponse::InternalServerError().body(e.to_string()).map_into_right_body(),
    };

    actix_web::rt::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                actix_ws::Message::Text(text) => {
                    let dt = serde_json::from_str::<TickRequest>(&text).map(|r| r.dt).unwrap_or(1.0 / 60.0);
                    match hub.tick(id, dt).await {
                        Ok(snapshot) => {
                            let json = serde_json::to_string(&snapshot).unwrap_or_default();
                            if session.text(json).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                actix_ws::Message::Close(_) => break,
                _ => continue,
            }
        }
    });

    response.map_into_left_body()
}
