/**
 * CLOUD CONNECTOR - Relais amont vers le broker cloud
 *
 * RÔLE :
 * Second lien MQTT, dédié au cloud : republie mesures et performances
 * (UpstreamRelay) et reçoit les messages d'activation d'actionneurs.
 *
 * FONCTIONNEMENT :
 * - Topic amont = "<base_topic><device>/<type>-<item>" en minuscules
 * - Performance système -> 2 mesures (CPU, mémoire), succès si les deux passent
 * - Connexion : pour chaque actionneur configuré, publication d'une réponse
 *   factice (valeur -1) puis abonnement à son topic d'activation ; une mesure
 *   d'humidité et un snapshot par défaut provisionnent les topics amont
 * - Activation reçue : valeur 1 (ON) ou 0 (OFF) -> commande estampillée puis
 *   handle_incoming_message sur le canal ActuatorCmd ; autre valeur ignorée
 */

use rumqttc::{AsyncClient, QoS};
use std::sync::Weak;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{ActuatorIdentity, CloudConf, HUMIDITY_SENSOR_NAME, HUMIDITY_SENSOR_TYPE};
use crate::error::{GatewayError, Result};
use crate::health::HealthTracker;
use crate::models::{ActuatorCommand, CommandCode, SensorReading, SystemPerformanceSnapshot};
use crate::mqtt::{current_listener, empty_listener_slot, mqtt_options, subscribe_all, ListenerSlot, MqttLink};
use crate::ports::{qos_from_level, DataMessageListener, TransportLifecycle, UpstreamRelay};
use crate::resources::{cloud_topic_name, normalize_topic_prefix, ResourceName, CONSTRAINED_DEVICE};

pub const CLOUD_TRANSPORT: &str = "cloud";

/// Valeur hors plage : marque une ressource d'actionneur sans état connu
const PLACEHOLDER_VALUE: f32 = -1.0;

pub struct CloudConnector {
    link: MqttLink,
    settings: CloudConf,
    prefix: String,
    qos: QoS,
    listener: ListenerSlot,
}

impl CloudConnector {
    pub fn new(settings: CloudConf, health: HealthTracker) -> Self {
        Self {
            link: MqttLink::new(CLOUD_TRANSPORT, health),
            prefix: normalize_topic_prefix(settings.base_topic.as_deref()),
            qos: qos_from_level(settings.qos),
            settings,
            listener: empty_listener_slot(),
        }
    }

    pub fn set_listener(&self, listener: Weak<dyn DataMessageListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn topic_prefix(&self) -> &str {
        &self.prefix
    }

    /// Topic d'activation d'un actionneur, ex: "/constraineddevice/hvacactuator"
    pub fn enablement_topic(&self, actuator_name: &str) -> String {
        cloud_topic_name(&self.prefix, CONSTRAINED_DEVICE, actuator_name)
    }

    fn enablement_topics(&self) -> Vec<String> {
        self.settings
            .actuators
            .iter()
            .map(|a| self.enablement_topic(&a.name))
            .collect()
    }

    fn publish_record<T: serde::Serialize>(&self, resource: ResourceName, item: &str, record: &T) -> Result<()> {
        let (topic, payload) = upstream_message(&self.prefix, resource, item, record)?;
        self.link.publish(&topic, &payload, self.qos)?;
        debug!(%topic, "relayed upstream");
        Ok(())
    }
}

/// (topic amont, payload JSON)
pub type UpstreamMessage = (String, String);

fn upstream_message<T: serde::Serialize>(
    prefix: &str,
    resource: ResourceName,
    item: &str,
    record: &T,
) -> Result<UpstreamMessage> {
    Ok((resource.cloud_topic(prefix, item), codec::encode(record)?))
}

/// Messages publiés à chaque ConnAck : réponses factices des actionneurs,
/// puis mesure d'humidité et performances par défaut
pub fn provisioning_messages(
    prefix: &str,
    actuators: &[(String, ActuatorIdentity)],
) -> Result<Vec<UpstreamMessage>> {
    let mut messages = Vec::with_capacity(actuators.len() + 3);
    for (topic, actuator) in actuators {
        messages.push((topic.clone(), codec::encode(&placeholder_response(actuator))?));
    }

    let humidity = SensorReading::new(HUMIDITY_SENSOR_NAME, CONSTRAINED_DEVICE, HUMIDITY_SENSOR_TYPE, 0.0);
    messages.push(upstream_message(prefix, ResourceName::CdaSensorMsg, &humidity.name, &humidity)?);

    let snapshot = SystemPerformanceSnapshot {
        location_id: CONSTRAINED_DEVICE.to_string(),
        ..Default::default()
    };
    for reading in snapshot.split_readings() {
        messages.push(upstream_message(prefix, ResourceName::CdaSystemPerfMsg, &reading.name, &reading)?);
    }
    Ok(messages)
}

/// Réponse factice publiée à la connexion pour chaque actionneur
pub fn placeholder_response(actuator: &ActuatorIdentity) -> ActuatorCommand {
    let mut response = ActuatorCommand::new(&actuator.name, CONSTRAINED_DEVICE, actuator.type_id);
    response.is_response = true;
    response.value = PLACEHOLDER_VALUE;
    response
}

/// Transforme un message d'activation en commande à router.
/// None si la valeur n'est ni ON ni OFF.
pub fn enablement_command(actuator: &ActuatorIdentity, payload: &[u8]) -> Result<Option<ActuatorCommand>> {
    let mut command: ActuatorCommand = codec::decode_bytes(payload)?;
    command.location_id = CONSTRAINED_DEVICE.to_string();
    command.type_id = actuator.type_id;
    command.name = actuator.name.clone();

    let code = match command.value as i32 {
        1 => CommandCode::On,
        0 => CommandCode::Off,
        other => {
            debug!(actuator = %actuator.name, value = other, "enablement value ignored");
            return Ok(None);
        }
    };
    command.command = code;
    command.state_data = format!("{} switching {}", actuator.name, code);
    Ok(Some(command))
}

fn handle_enablement(listener: &ListenerSlot, actuators: &[(String, ActuatorIdentity)], topic: &str, payload: &[u8]) {
    let Some((_, actuator)) = actuators.iter().find(|(t, _)| t == topic) else {
        warn!(%topic, "message on unknown cloud topic ignored");
        return;
    };

    let command = match enablement_command(actuator, payload) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            warn!(actuator = %actuator.name, error = %e, "invalid enablement message");
            return;
        }
    };
    info!(actuator = %actuator.name, state = %command.state_data, "cloud enablement message received");

    let Some(router) = current_listener(listener) else {
        warn!(%topic, "no data listener registered, enablement dropped");
        return;
    };
    match codec::encode(&command) {
        Ok(json) => {
            if !router.handle_incoming_message(&ResourceName::CdaActuatorCmd.channel(), &json) {
                warn!(actuator = %actuator.name, "enablement command not accepted by any transport");
            }
        }
        Err(e) => warn!(actuator = %actuator.name, error = %e, "failed to encode enablement command"),
    }
}

fn provision_cloud_topics(client: &AsyncClient, prefix: &str, actuators: &[(String, ActuatorIdentity)], qos: QoS) {
    match provisioning_messages(prefix, actuators) {
        Ok(messages) => {
            for (topic, payload) in messages {
                if let Err(e) = client.try_publish(topic.as_str(), qos, false, payload.into_bytes()) {
                    warn!(%topic, error = %e, "provisioning publish failed");
                }
            }
        }
        Err(e) => warn!(error = %e, "failed to encode provisioning messages"),
    }
    let topics: Vec<String> = actuators.iter().map(|(t, _)| t.clone()).collect();
    subscribe_all(CLOUD_TRANSPORT, client, &topics, qos);
}

impl UpstreamRelay for CloudConnector {
    fn relay_sensor(&self, resource: ResourceName, reading: &SensorReading) -> Result<()> {
        self.publish_record(resource, &reading.name, reading)
    }

    fn relay_performance(&self, resource: ResourceName, snapshot: &SystemPerformanceSnapshot) -> Result<()> {
        let mut failures = Vec::new();
        for reading in snapshot.split_readings() {
            if let Err(e) = self.publish_record(resource, &reading.name, &reading) {
                failures.push(format!("{}: {e}", reading.name));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::transport(CLOUD_TRANSPORT, failures.join(", ")))
        }
    }
}

impl TransportLifecycle for CloudConnector {
    fn name(&self) -> &str {
        self.link.name()
    }

    fn connect(&self) -> Result<()> {
        let options = mqtt_options(
            "gateway-kernel-cloud",
            &self.settings.host,
            self.settings.port,
            self.settings.keep_alive_secs,
            self.settings.client_id.as_deref(),
        );
        let actuators: Vec<(String, ActuatorIdentity)> = self
            .settings
            .actuators
            .iter()
            .map(|a| (self.enablement_topic(&a.name), a.clone()))
            .collect();
        let routing = actuators.clone();
        let listener = self.listener.clone();
        let prefix = self.prefix.clone();
        let qos = self.qos;

        self.link.open(
            options,
            move |client| provision_cloud_topics(client, &prefix, &actuators, qos),
            move |topic, payload| handle_enablement(&listener, &routing, topic, payload),
        )
    }

    fn unsubscribe_known(&self) -> Result<()> {
        self.link.unsubscribe(&self.enablement_topics())
    }

    fn disconnect(&self) -> Result<()> {
        self.link.close()
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }
}
