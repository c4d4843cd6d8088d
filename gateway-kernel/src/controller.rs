/**
 * HYSTERESIS CONTROLLER - Boucle de contrôle environnemental
 *
 * RÔLE :
 * Transforme les mesures de la dimension suivie (ex: humidité) en commandes
 * actionneur ON/OFF, uniquement quand une excursion hors bande persiste
 * au-delà d'un seuil temporel.
 *
 * FONCTIONNEMENT :
 * - Table location -> ControlState, protégée par un seul Mutex
 * - NOMINAL -> EXCURSION_LOW/HIGH : première mesure hors bande, timer démarré
 * - EXCURSION -> ACTUATING : mesure hors bande >= seuil après la première
 * - ACTUATING -> NOMINAL : mesure dans la bande + actionneur arrivé au nominal
 * - Le temps écoulé vient des horodatages des mesures, pas de l'horloge locale
 *
 * Le contrôleur décide, il n'envoie rien : la commande retournée est
 * dispatchée par l'appelant une fois le verrou relâché.
 */

use parking_lot::Mutex;
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::config::ControlConf;
use crate::error::GatewayError;
use crate::health::HealthTracker;
use crate::models::{now_rfc3339, ActuatorCommand, CommandCode, SensorReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPhase {
    Nominal,
    ExcursionLow,
    ExcursionHigh,
    Actuating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Low,
    High,
}

/// Mesure hors bande + instant de première détection (toujours ensemble)
#[derive(Debug, Clone)]
struct Excursion {
    reading: SensorReading,
    started_at: OffsetDateTime,
    direction: Direction,
}

#[derive(Debug, Clone)]
struct ControlState {
    excursion: Option<Excursion>,
    pending: Option<ActuatorCommand>,
    last_command: CommandCode,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            excursion: None,
            pending: None,
            last_command: CommandCode::Off,
        }
    }
}

impl ControlState {
    fn phase(&self) -> ControlPhase {
        if self.pending.is_some() {
            return ControlPhase::Actuating;
        }
        match self.excursion.as_ref().map(|e| e.direction) {
            Some(Direction::Low) => ControlPhase::ExcursionLow,
            Some(Direction::High) => ControlPhase::ExcursionHigh,
            None => ControlPhase::Nominal,
        }
    }

    fn is_idle(&self) -> bool {
        self.excursion.is_none() && self.pending.is_none() && self.last_command == CommandCode::Off
    }
}

pub struct HysteresisController {
    settings: ControlConf,
    states: Mutex<HashMap<String, ControlState>>,
    health: HealthTracker,
}

impl HysteresisController {
    pub fn new(settings: ControlConf, health: HealthTracker) -> Self {
        Self {
            settings: settings.validated(),
            states: Mutex::new(HashMap::new()),
            health,
        }
    }

    pub fn settings(&self) -> &ControlConf {
        &self.settings
    }

    /// Vrai si la mesure appartient à la dimension suivie
    pub fn tracks(&self, reading: &SensorReading) -> bool {
        reading.type_id == self.settings.tracked_type_id
    }

    pub fn phase(&self, location_id: &str) -> ControlPhase {
        self.states
            .lock()
            .get(location_id)
            .map(ControlState::phase)
            .unwrap_or(ControlPhase::Nominal)
    }

    pub fn pending_command(&self, location_id: &str) -> Option<ActuatorCommand> {
        self.states.lock().get(location_id).and_then(|s| s.pending.clone())
    }

    /// Instant de première détection de l'excursion en cours
    pub fn excursion_started_at(&self, location_id: &str) -> Option<OffsetDateTime> {
        self.states
            .lock()
            .get(location_id)
            .and_then(|s| s.excursion.as_ref().map(|e| e.started_at))
    }

    /// Outil opérateur : fusionne une vue plus récente de l'actionneur dans la
    /// commande en attente. Les réponses actionneur ne passent pas par ici,
    /// elles sont seulement journalisées ; sans appel explicite, la valeur
    /// comparée au nominal reste celle de la commande émise.
    /// Retourne false s'il n'y a rien en attente pour cette location.
    pub fn refresh_pending(&self, location_id: &str, newer: &ActuatorCommand) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(location_id).and_then(|s| s.pending.as_mut()) {
            Some(pending) => {
                pending.update_from(newer);
                debug!(location = location_id, value = pending.value, "pending actuator command refreshed");
                true
            }
            None => false,
        }
    }

    /// Oublie tout l'état suivi pour une location
    pub fn reset(&self, location_id: &str) {
        if self.states.lock().remove(location_id).is_some() {
            info!(location = location_id, "controller state reset");
        }
    }

    /// Évalue une mesure ; retourne la commande à émettre, s'il y en a une
    pub fn evaluate(&self, reading: &SensorReading) -> Option<ActuatorCommand> {
        let cfg = &self.settings;
        debug!(
            location = %reading.location_id,
            value = reading.value,
            "analyzing tracked reading"
        );

        let direction = if reading.value < cfg.floor {
            Some(Direction::Low)
        } else if reading.value > cfg.ceiling {
            Some(Direction::High)
        } else {
            None
        };

        let location = reading.location_id.as_str();
        let mut states = self.states.lock();

        // seule une mesure hors bande crée une entrée
        let command = match direction {
            Some(direction) => {
                let state = states.entry(location.to_string()).or_default();
                self.on_out_of_band(state, reading, direction)
            }
            None => match states.get_mut(location) {
                Some(state) => self.on_in_band(state, reading),
                None => None,
            },
        };

        if states.get(location).is_some_and(ControlState::is_idle) {
            states.remove(location);
        }
        command
    }

    /// Nombre de locations avec un état non nominal en mémoire
    pub fn tracked_locations(&self) -> usize {
        self.states.lock().len()
    }

    fn on_out_of_band(
        &self,
        state: &mut ControlState,
        reading: &SensorReading,
        direction: Direction,
    ) -> Option<ActuatorCommand> {
        let cfg = &self.settings;
        let current = self.reading_time(reading);

        let Some(excursion) = state.excursion.as_mut() else {
            state.excursion = Some(Excursion {
                reading: reading.clone(),
                started_at: current,
                direction,
            });
            debug!(
                location = %reading.location_id,
                threshold_secs = cfg.max_time_past_threshold,
                "value outside nominal band, starting excursion timer"
            );
            return None;
        };

        // le timer court depuis la première détection, quel que soit le sens
        if excursion.direction != direction {
            debug!(location = %reading.location_id, "excursion changed direction, timer kept");
            excursion.direction = direction;
        }
        let elapsed = (current - excursion.started_at).whole_seconds();
        let first_value = excursion.reading.value;
        debug!(location = %reading.location_id, elapsed, "checking excursion time delta");

        if elapsed < cfg.max_time_past_threshold as i64 {
            return None;
        }

        let mut command = ActuatorCommand::new(
            &cfg.actuator_name,
            &reading.location_id,
            cfg.actuator_type_id,
        );
        command.value = cfg.nominal_setting;
        command.command = match direction {
            Direction::Low => CommandCode::On,
            Direction::High => CommandCode::Off,
        };

        info!(
            location = %reading.location_id,
            command = %command.command,
            target = command.value,
            first_value,
            elapsed,
            "excursion persisted past threshold, issuing actuator command"
        );

        state.last_command = command.command;
        state.pending = Some(command.clone());
        state.excursion = None;
        Some(command)
    }

    fn on_in_band(&self, state: &mut ControlState, reading: &SensorReading) -> Option<ActuatorCommand> {
        let cfg = &self.settings;

        if state.last_command == CommandCode::On {
            let Some(pending) = state.pending.as_mut() else {
                let err = GatewayError::InconsistentState(format!(
                    "location {} actuating with no pending actuator command",
                    reading.location_id
                ));
                error!(error = %err, "leaving control state untouched");
                self.health.record_inconsistent_state();
                return None;
            };

            if pending.value < cfg.nominal_setting {
                debug!(
                    location = %reading.location_id,
                    actuator_value = pending.value,
                    "actuator still on, not yet at nominal level"
                );
                return None;
            }

            pending.command = CommandCode::Off;
            pending.timestamp = now_rfc3339();
            let off = pending.clone();
            info!(
                location = %reading.location_id,
                target = off.value,
                "nominal value reached, issuing OFF actuator command"
            );

            *state = ControlState::default();
            return Some(off);
        }

        if let Some(excursion) = &state.excursion {
            debug!(
                location = %reading.location_id,
                first_value = excursion.reading.value,
                "value back in band before threshold, excursion timer kept"
            );
        }
        // une commande OFF n'attend aucune suite
        state.pending = None;
        None
    }

    /// Horodatage de la mesure ; illisible -> heure locale + compteur santé
    fn reading_time(&self, reading: &SensorReading) -> OffsetDateTime {
        match OffsetDateTime::parse(&reading.timestamp, &Rfc3339) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(
                    location = %reading.location_id,
                    timestamp = %reading.timestamp,
                    error = %e,
                    "failed to parse reading timestamp, using local current time"
                );
                self.health.record_timestamp_fallback();
                OffsetDateTime::now_utc()
            }
        }
    }
}
