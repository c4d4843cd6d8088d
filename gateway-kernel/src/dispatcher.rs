/**
 * COMMAND DISPATCHER - Livraison des commandes actionneur
 *
 * RÔLE :
 * Remet une commande au listener local puis au transport pub/sub actifs.
 *
 * FONCTIONNEMENT :
 * - Chaque transport est tenté indépendamment
 * - Un échec est loggé et compté dans la santé, sans remonter d'erreur
 * - DispatchReport indique qui a accepté la commande
 */

use rumqttc::QoS;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec;
use crate::health::HealthTracker;
use crate::models::ActuatorCommand;
use crate::ports::{ActuatorListener, PubSubTransport};
use crate::resources::ResourceName;

/// Résultat de livraison, un champ par transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// None si aucun listener local n'est configuré
    pub listener_notified: Option<bool>,
    /// None si aucun transport pub/sub n'est configuré
    pub published: Option<bool>,
}

impl DispatchReport {
    pub fn any_accepted(&self) -> bool {
        self.listener_notified == Some(true) || self.published == Some(true)
    }
}

pub struct CommandDispatcher {
    pubsub: Option<Arc<dyn PubSubTransport>>,
    listener: Option<Arc<dyn ActuatorListener>>,
    qos: QoS,
    health: HealthTracker,
}

impl CommandDispatcher {
    pub fn new(qos: QoS, health: HealthTracker) -> Self {
        Self {
            pubsub: None,
            listener: None,
            qos,
            health,
        }
    }

    pub fn with_pubsub(mut self, pubsub: Arc<dyn PubSubTransport>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ActuatorListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn has_targets(&self) -> bool {
        self.pubsub.is_some() || self.listener.is_some()
    }

    /// Listener local d'abord (synchrone), puis publication sur `resource`
    pub fn dispatch(&self, resource: ResourceName, command: &ActuatorCommand) -> DispatchReport {
        let mut report = DispatchReport::default();

        if let Some(listener) = &self.listener {
            let ok = listener.on_actuator_update(command);
            if !ok {
                warn!(actuator = %command.name, "local actuator listener rejected command");
            }
            report.listener_notified = Some(ok);
        }

        if let Some(pubsub) = &self.pubsub {
            let ok = match codec::encode(command) {
                Ok(payload) => match pubsub.publish(resource, &payload, self.qos) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(actuator = %command.name, error = %e, "actuator command publish failed");
                        false
                    }
                },
                Err(e) => {
                    warn!(actuator = %command.name, error = %e, "failed to encode actuator command");
                    false
                }
            };
            if !ok {
                self.health.record_publish_failure();
            }
            report.published = Some(ok);
        }

        if report.any_accepted() {
            self.health.record_command_issued();
            debug!(
                actuator = %command.name,
                location = %command.location_id,
                command = %command.command,
                %resource,
                "actuator command dispatched"
            );
        } else if !self.has_targets() {
            warn!(actuator = %command.name, "no transport configured, actuator command dropped");
        }

        report
    }
}
