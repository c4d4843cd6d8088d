/**
 * REQUEST SERVER - Ressources requête/réponse exposées aux appareils
 *
 * RÔLE :
 * Canal requête/réponse de la passerelle : les appareils y déposent mesures
 * et performances, et viennent y lire la dernière commande actionneur.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, une route par ressource : "/PIOT/<appareil>/<type>"
 * - GET  .../ActuatorCmd    -> dernière commande (ActuatorCommandResource)
 * - POST .../ActuatorCmd    -> texte brut -> handle_incoming_message
 * - POST|PUT .../SensorMsg, .../SystemPerfMsg -> handlers typés du routeur
 * - GET  /health            -> compteurs santé
 * - Arrêt propre via oneshot (with_graceful_shutdown)
 */

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::config::ServerConf;
use crate::error::{GatewayError, Result};
use crate::health::{GatewayHealth, HealthTracker};
use crate::models::ActuatorCommand;
use crate::mqtt::{current_listener, empty_listener_slot, ListenerSlot};
use crate::ports::{ActuatorListener, DataMessageListener, TransportLifecycle};
use crate::resources::ResourceName;

pub const SERVER_TRANSPORT: &str = "request-server";

/// Dernière commande actionneur, lue par polling par l'appareil
#[derive(Default)]
pub struct ActuatorCommandResource {
    latest: Mutex<Option<ActuatorCommand>>,
}

impl ActuatorCommandResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ActuatorCommand> {
        self.latest.lock().clone()
    }
}

impl ActuatorListener for ActuatorCommandResource {
    fn on_actuator_update(&self, command: &ActuatorCommand) -> bool {
        let mut latest = self.latest.lock();
        match latest.as_mut() {
            Some(current) => current.update_from(command),
            None => *latest = Some(command.clone()),
        }
        debug!(actuator = %command.name, command = %command.command, "actuator resource updated");
        true
    }
}

#[derive(Clone)]
pub struct AppState {
    pub listener: ListenerSlot,
    pub actuator: Arc<ActuatorCommandResource>,
    pub health: HealthTracker,
}

fn resource_path(resource: ResourceName) -> String {
    format!("/{}", resource.channel())
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route(
            &resource_path(ResourceName::CdaActuatorCmd),
            get(get_actuator_command).post(post_actuator_command),
        )
        .route(
            &resource_path(ResourceName::CdaSensorMsg),
            post(update_sensor_message).put(update_sensor_message),
        )
        .route(
            &resource_path(ResourceName::CdaSystemPerfMsg),
            post(update_cda_performance).put(update_cda_performance),
        )
        .route(
            &resource_path(ResourceName::GdaSystemPerfMsg),
            post(update_gda_performance).put(update_gda_performance),
        )
        .with_state(app_state)
}

type Reply = (StatusCode, Json<serde_json::Value>);

fn accepted(ok: bool) -> Reply {
    let code = if ok { StatusCode::OK } else { StatusCode::UNPROCESSABLE_ENTITY };
    (code, Json(json!({ "accepted": ok })))
}

fn rejected(code: StatusCode, e: GatewayError) -> Reply {
    (code, Json(json!({ "accepted": false, "error": e.to_string() })))
}

fn router_of(app: &AppState) -> std::result::Result<Arc<dyn DataMessageListener>, Reply> {
    current_listener(&app.listener).ok_or_else(|| {
        rejected(
            StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::NotConnected("message router".into()),
        )
    })
}

// GET /health
async fn get_health(State(app): State<AppState>) -> Json<GatewayHealth> {
    Json(app.health.get_health())
}

// GET /PIOT/ConstrainedDevice/ActuatorCmd
async fn get_actuator_command(State(app): State<AppState>) -> std::result::Result<Json<ActuatorCommand>, StatusCode> {
    app.actuator.latest().map(Json).ok_or(StatusCode::NOT_FOUND)
}

// POST /PIOT/ConstrainedDevice/ActuatorCmd (texte brut)
async fn post_actuator_command(State(app): State<AppState>, body: String) -> Reply {
    let router = match router_of(&app) {
        Ok(router) => router,
        Err(reply) => return reply,
    };
    accepted(router.handle_incoming_message(&ResourceName::CdaActuatorCmd.channel(), &body))
}

async fn update_sensor_message(State(app): State<AppState>, body: String) -> Reply {
    let router = match router_of(&app) {
        Ok(router) => router,
        Err(reply) => return reply,
    };
    match codec::sensor_reading_from_json(&body) {
        Ok(reading) => accepted(router.handle_sensor_message(&ResourceName::CdaSensorMsg.channel(), &reading)),
        Err(e) => rejected(StatusCode::BAD_REQUEST, e),
    }
}

fn update_performance(app: &AppState, resource: ResourceName, body: &str) -> Reply {
    let router = match router_of(app) {
        Ok(router) => router,
        Err(reply) => return reply,
    };
    match codec::system_performance_from_json(body) {
        Ok(snapshot) => accepted(router.handle_system_performance_message(&resource.channel(), &snapshot)),
        Err(e) => rejected(StatusCode::BAD_REQUEST, e),
    }
}

async fn update_cda_performance(State(app): State<AppState>, body: String) -> Reply {
    update_performance(&app, ResourceName::CdaSystemPerfMsg, &body)
}

async fn update_gda_performance(State(app): State<AppState>, body: String) -> Reply {
    update_performance(&app, ResourceName::GdaSystemPerfMsg, &body)
}

/// Serveur requête/réponse piloté comme un transport
pub struct RequestServer {
    settings: ServerConf,
    state: AppState,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    running: Arc<AtomicBool>,
}

impl RequestServer {
    pub fn new(settings: ServerConf, actuator: Arc<ActuatorCommandResource>, health: HealthTracker) -> Self {
        Self {
            settings,
            state: AppState {
                listener: empty_listener_slot(),
                actuator,
                health,
            },
            shutdown: Mutex::new(None),
            local_addr: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_listener(&self, listener: Weak<dyn DataMessageListener>) {
        *self.state.listener.lock() = Some(listener);
    }

    /// Adresse effective (utile avec un port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

impl TransportLifecycle for RequestServer {
    fn name(&self) -> &str {
        SERVER_TRANSPORT
    }

    fn connect(&self) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| GatewayError::transport(SERVER_TRANSPORT, format!("no tokio runtime: {e}")))?;

        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            return Ok(());
        }

        let std_listener = std::net::TcpListener::bind(&self.settings.bind)?;
        std_listener.set_nonblocking(true)?;
        let addr = std_listener.local_addr()?;
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(std_listener)?
        };

        let (tx, rx) = oneshot::channel::<()>();
        let app = build_router(self.state.clone());
        let running = self.running.clone();
        let health = self.state.health.clone();

        running.store(true, Ordering::SeqCst);
        health.mark_connected(SERVER_TRANSPORT);
        runtime.spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                error!(error = %e, "request server stopped with error");
            }
            running.store(false, Ordering::SeqCst);
            health.mark_disconnected(SERVER_TRANSPORT);
        });

        info!(%addr, "request server listening");
        *self.local_addr.lock() = Some(addr);
        *shutdown = Some(tx);
        Ok(())
    }

    /// Aucun abonnement côté serveur
    fn unsubscribe_known(&self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let Some(tx) = self.shutdown.lock().take() else {
            return Ok(());
        };
        if tx.send(()).is_err() {
            warn!("request server already stopped");
        }
        info!("request server shutting down");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
