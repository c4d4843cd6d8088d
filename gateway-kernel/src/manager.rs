/**
 * GATEWAY MANAGER - Façade de démarrage / arrêt
 *
 * RÔLE :
 * Construit, selon les drapeaux de config, le contrôleur, le dispatcher, le
 * routeur et les transports, puis pilote leur cycle de vie.
 *
 * FONCTIONNEMENT :
 * - Le routeur possède les sorties (Arc) ; les transports ne gardent qu'une
 *   référence faible vers lui (pas de cycle)
 * - start() : connect() de chaque transport, un rapport par transport
 * - stop()  : unsubscribe_known() puis disconnect(), par transport
 * - Un transport en échec n'interrompt jamais les autres
 */

use std::sync::Arc;
use tracing::{info, warn};

use crate::cloud::CloudConnector;
use crate::config::GatewayConfig;
use crate::controller::HysteresisController;
use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::health::HealthTracker;
use crate::http::{ActuatorCommandResource, RequestServer};
use crate::mqtt::MqttConnector;
use crate::ports::{qos_from_level, DataMessageListener, TransportLifecycle};
use crate::router::MessageRouter;

/// Résultat d'une étape de cycle de vie pour un transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub transport: String,
    pub ok: bool,
    pub detail: Option<String>,
}

impl LifecycleReport {
    fn from_result(transport: &str, result: Result<()>) -> Self {
        Self {
            transport: transport.to_string(),
            ok: result.is_ok(),
            detail: result.err().map(|e| e.to_string()),
        }
    }
}

pub struct GatewayManager {
    router: Arc<MessageRouter>,
    transports: Vec<Arc<dyn TransportLifecycle>>,
    actuator_resource: Option<Arc<ActuatorCommandResource>>,
    health: HealthTracker,
}

impl GatewayManager {
    pub fn new(config: &GatewayConfig) -> Self {
        let health = HealthTracker::new();
        let flags = &config.gateway;

        let mqtt = flags
            .enable_mqtt_client
            .then(|| Arc::new(MqttConnector::new(config.mqtt.clone(), health.clone())));
        let cloud = flags
            .enable_cloud_client
            .then(|| Arc::new(CloudConnector::new(config.cloud.clone(), health.clone())));
        let actuator_resource = flags
            .enable_request_server
            .then(|| Arc::new(ActuatorCommandResource::new()));
        let server = actuator_resource.as_ref().map(|resource| {
            Arc::new(RequestServer::new(config.server.clone(), resource.clone(), health.clone()))
        });

        let mut dispatcher = CommandDispatcher::new(qos_from_level(config.mqtt.qos), health.clone());
        if let Some(mqtt) = &mqtt {
            dispatcher = dispatcher.with_pubsub(mqtt.clone());
        }
        if let Some(resource) = &actuator_resource {
            dispatcher = dispatcher.with_listener(resource.clone());
        }

        let mut router = MessageRouter::new(dispatcher);
        if flags.handle_humidity_change_on_device {
            let controller = HysteresisController::new(config.control.clone(), health.clone());
            router = router.with_controller(Arc::new(controller));
        }
        if let Some(cloud) = &cloud {
            router = router.with_relay(cloud.clone());
        }
        let router = Arc::new(router);

        let as_listener: Arc<dyn DataMessageListener> = router.clone();
        let weak = Arc::downgrade(&as_listener);

        let mut transports: Vec<Arc<dyn TransportLifecycle>> = Vec::new();
        if let Some(mqtt) = mqtt {
            mqtt.set_listener(weak.clone());
            transports.push(mqtt);
        }
        if let Some(cloud) = cloud {
            cloud.set_listener(weak.clone());
            transports.push(cloud);
        }
        if let Some(server) = server {
            server.set_listener(weak);
            transports.push(server);
        }

        info!(
            location = %flags.location_id,
            transports = transports.len(),
            local_control = flags.handle_humidity_change_on_device,
            "gateway manager configured"
        );

        Self {
            router,
            transports,
            actuator_resource,
            health,
        }
    }

    /// Câblage explicite (tests, intégrations sur mesure)
    pub fn with_transports(
        router: Arc<MessageRouter>,
        transports: Vec<Arc<dyn TransportLifecycle>>,
        health: HealthTracker,
    ) -> Self {
        Self {
            router,
            transports,
            actuator_resource: None,
            health,
        }
    }

    pub fn router(&self) -> Arc<MessageRouter> {
        self.router.clone()
    }

    pub fn health(&self) -> HealthTracker {
        self.health.clone()
    }

    pub fn actuator_resource(&self) -> Option<Arc<ActuatorCommandResource>> {
        self.actuator_resource.clone()
    }

    pub fn transport_names(&self) -> Vec<String> {
        self.transports.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn start(&self) -> Vec<LifecycleReport> {
        info!("starting gateway transports");
        self.transports
            .iter()
            .map(|transport| {
                let report = LifecycleReport::from_result(transport.name(), transport.connect());
                if report.ok {
                    info!(transport = %report.transport, "transport started");
                } else {
                    self.health.mark_disconnected(&report.transport);
                    warn!(transport = %report.transport, detail = ?report.detail, "transport failed to start");
                }
                report
            })
            .collect()
    }

    pub fn stop(&self) -> Vec<LifecycleReport> {
        info!("stopping gateway transports");
        self.transports
            .iter()
            .map(|transport| {
                let name = transport.name();
                let unsubscribed = transport.unsubscribe_known();
                if let Err(e) = &unsubscribed {
                    warn!(transport = name, error = %e, "unsubscribe failed");
                }
                let disconnected = transport.disconnect();
                if let Err(e) = &disconnected {
                    warn!(transport = name, error = %e, "disconnect failed");
                }
                LifecycleReport::from_result(name, unsubscribed.and(disconnected))
            })
            .collect()
    }
}
