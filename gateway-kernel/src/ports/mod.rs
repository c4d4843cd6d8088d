/**
 * PORTS - Interfaces de capacité entre le coeur et les transports
 *
 * RÔLE :
 * Le routeur, le contrôleur et le dispatcher ne connaissent que ces traits.
 * Les connecteurs concrets (MQTT, cloud, serveur requête/réponse) les
 * implémentent ; les tests injectent des faux.
 *
 * FONCTIONNEMENT :
 * - DataMessageListener = entrées (transport -> coeur), retour bool, jamais de panique
 * - PubSubTransport / UpstreamRelay / ActuatorListener = sorties (coeur -> transport)
 * - TransportLifecycle = connect / désabonnement / déconnexion pilotés par le manager
 *
 * Toutes les sorties sont non bloquantes : un transport lent ou en échec ne
 * doit jamais retarder une décision de contrôle.
 */

use rumqttc::QoS;

use crate::config::DEFAULT_QOS;
use crate::error::Result;
use crate::models::{ActuatorCommand, SensorReading, SystemPerformanceSnapshot};
use crate::resources::ResourceName;

/// Points d'entrée appelés par les callbacks des transports.
/// `resource` est le nom de canal brut tel que reçu (topic, chemin).
pub trait DataMessageListener: Send + Sync {
    fn handle_incoming_message(&self, resource: &str, payload: &str) -> bool;

    fn handle_sensor_message(&self, resource: &str, reading: &SensorReading) -> bool;

    fn handle_system_performance_message(
        &self,
        resource: &str,
        snapshot: &SystemPerformanceSnapshot,
    ) -> bool;

    fn handle_actuator_command_response(&self, resource: &str, command: &ActuatorCommand) -> bool;
}

/// Transport publish/subscribe sortant
pub trait PubSubTransport: Send + Sync {
    /// Accepte (ou refuse) la publication sans attendre sa livraison
    fn publish(&self, resource: ResourceName, payload: &str, qos: QoS) -> Result<()>;
}

/// Relais amont (cloud)
pub trait UpstreamRelay: Send + Sync {
    fn relay_sensor(&self, resource: ResourceName, reading: &SensorReading) -> Result<()>;

    fn relay_performance(
        &self,
        resource: ResourceName,
        snapshot: &SystemPerformanceSnapshot,
    ) -> Result<()>;
}

/// Listener local notifié de chaque commande émise (ex: ressource
/// interrogée en requête/réponse par l'appareil)
pub trait ActuatorListener: Send + Sync {
    fn on_actuator_update(&self, command: &ActuatorCommand) -> bool;
}

/// Cycle de vie d'un transport piloté par le manager
pub trait TransportLifecycle: Send + Sync {
    fn name(&self) -> &str;

    fn connect(&self) -> Result<()>;

    /// Désabonnement des topics connus (avant déconnexion)
    fn unsubscribe_known(&self) -> Result<()>;

    fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Niveau de qualité depuis la config ; hors [0, 2] -> défaut (1)
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        other => {
            tracing::warn!(requested = other, "invalid QoS level, using default");
            qos_from_level(DEFAULT_QOS)
        }
    }
}
