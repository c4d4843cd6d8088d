/**
 * MESSAGE ROUTER - Point d'entrée unique des transports
 *
 * RÔLE :
 * Classe chaque événement entrant (texte brut ou enregistrement déjà décodé)
 * et l'envoie au bon collaborateur : relais amont, contrôleur, dispatcher.
 *
 * FONCTIONNEMENT :
 * - Identité de ressource = nom de canal brut, parsé en ResourceName
 * - Entrée vide / inconnue -> false + warn, aucun état modifié
 * - Mesures de la dimension suivie -> HysteresisController -> CommandDispatcher
 * - Décision et livraison d'une commande sous le même verrou de livraison :
 *   les commandes sortent dans l'ordre où elles ont été décidées
 * - Réponses actionneur : informatives uniquement, jamais réinjectées
 *
 * Aucun enregistrement n'est retenu au-delà de l'appel.
 */

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec;
use crate::controller::HysteresisController;
use crate::dispatcher::{CommandDispatcher, DispatchReport};
use crate::error::{GatewayError, Result};
use crate::models::{ActuatorCommand, SensorReading, SystemPerformanceSnapshot};
use crate::ports::{DataMessageListener, UpstreamRelay};
use crate::resources::ResourceName;

pub struct MessageRouter {
    dispatcher: CommandDispatcher,
    controller: Option<Arc<HysteresisController>>,
    relay: Option<Arc<dyn UpstreamRelay>>,
    delivery: Mutex<()>,
}

impl MessageRouter {
    pub fn new(dispatcher: CommandDispatcher) -> Self {
        Self {
            dispatcher,
            controller: None,
            relay: None,
            delivery: Mutex::new(()),
        }
    }

    /// Active l'analyse locale des mesures
    pub fn with_controller(mut self, controller: Arc<HysteresisController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_relay(mut self, relay: Arc<dyn UpstreamRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn controller(&self) -> Option<&Arc<HysteresisController>> {
        self.controller.as_ref()
    }

    fn forward_actuator_command(&self, resource: &str, payload: &str) -> Result<DispatchReport> {
        let resource = parse_resource(resource)?;
        if resource != ResourceName::CdaActuatorCmd {
            return Err(GatewayError::UnknownResource(format!(
                "{resource} is not an actuator command resource"
            )));
        }

        let command = codec::actuator_command_from_json(payload)?;
        let validated = codec::actuator_command_from_json(&codec::encode(&command)?)?;
        debug!(actuator = %validated.name, command = %validated.command, "incoming actuator command decoded");

        let _delivery = self.delivery.lock();
        Ok(self.dispatcher.dispatch(resource, &validated))
    }

    fn process_sensor(&self, resource: &str, reading: &SensorReading) -> Result<()> {
        let resource = parse_resource(resource)?;
        if reading.name.trim().is_empty() {
            return Err(GatewayError::MalformedInput("sensor reading without name".into()));
        }
        if reading.has_error {
            warn!(
                sensor = %reading.name,
                location = %reading.location_id,
                status = reading.status_code,
                "sensor reading flagged with error, processing anyway"
            );
        }

        if let Some(relay) = &self.relay {
            if let Err(e) = relay.relay_sensor(resource, reading) {
                warn!(sensor = %reading.name, error = %e, "upstream relay of sensor reading failed");
            }
        }

        if let Some(controller) = self.controller.as_ref().filter(|c| c.tracks(reading)) {
            // transports non bloquants (try_*) : le verrou ne couvre aucune attente réseau
            let _delivery = self.delivery.lock();
            if let Some(command) = controller.evaluate(reading) {
                let report = self.dispatcher.dispatch(ResourceName::CdaActuatorCmd, &command);
                if !report.any_accepted() {
                    warn!(actuator = %command.name, "no transport accepted controller command");
                }
            }
        }
        Ok(())
    }

    fn process_performance(&self, resource: &str, snapshot: &SystemPerformanceSnapshot) -> Result<()> {
        let resource = parse_resource(resource)?;
        if snapshot.name.trim().is_empty() {
            return Err(GatewayError::MalformedInput("performance snapshot without name".into()));
        }
        if let Some(relay) = &self.relay {
            if let Err(e) = relay.relay_performance(resource, snapshot) {
                warn!(location = %snapshot.location_id, error = %e, "upstream relay of performance snapshot failed");
            }
        }
        Ok(())
    }

    fn process_response(&self, resource: &str, response: &ActuatorCommand) -> Result<()> {
        let resource = parse_resource(resource)?;
        if response.name.trim().is_empty() {
            return Err(GatewayError::MalformedInput("actuator response without name".into()));
        }
        if response.has_error {
            warn!(actuator = %response.name, status = response.status_code, "actuator response flagged with error");
        }
        info!(
            %resource,
            actuator = %response.name,
            command = %response.command,
            value = response.value,
            state = %response.state_data,
            "actuator command response received"
        );
        Ok(())
    }
}

fn parse_resource(resource: &str) -> Result<ResourceName> {
    resource.parse()
}

/// Erreur -> false + warn ; le détail reste dans les logs
fn settle<T>(operation: &str, resource: &str, outcome: Result<T>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation, resource, error = %e, "inbound message rejected");
            None
        }
    }
}

impl DataMessageListener for MessageRouter {
    fn handle_incoming_message(&self, resource: &str, payload: &str) -> bool {
        settle("incoming_message", resource, self.forward_actuator_command(resource, payload))
            .map(|report| report.any_accepted())
            .unwrap_or(false)
    }

    fn handle_sensor_message(&self, resource: &str, reading: &SensorReading) -> bool {
        settle("sensor_message", resource, self.process_sensor(resource, reading)).is_some()
    }

    fn handle_system_performance_message(
        &self,
        resource: &str,
        snapshot: &SystemPerformanceSnapshot,
    ) -> bool {
        settle("system_performance_message", resource, self.process_performance(resource, snapshot)).is_some()
    }

    fn handle_actuator_command_response(&self, resource: &str, command: &ActuatorCommand) -> bool {
        settle("actuator_command_response", resource, self.process_response(resource, command)).is_some()
    }
}
