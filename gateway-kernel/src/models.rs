/**
 * MODELS - Enregistrements échangés avec les appareils contraints
 *
 * RÔLE :
 * Mesures, commandes actionneur et snapshots de performance système.
 *
 * FONCTIONNEMENT :
 * - Enregistrements transitoires : créés par message, possédés par le handler
 * - Seul le contrôleur en retient entre deux messages
 * - Champs JSON du contrat historique des appareils (typeID, locationID, timeStamp)
 */

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const DEFAULT_NAME: &str = "Not Set";
pub const SYS_PERF_DATA_NAME: &str = "SystemPerfData";
pub const CPU_UTIL_NAME: &str = "DeviceCpuUtil";
pub const MEM_UTIL_NAME: &str = "DeviceMemUtil";
pub const DEFAULT_TYPE_ID: i32 = 0;

/// Horodatage courant au format RFC 3339 (UTC)
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Code de commande actionneur. Sur le fil : ON = 1, OFF = 0, sinon -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CommandCode {
    Off,
    On,
    #[default]
    Unspecified,
}

impl From<i32> for CommandCode {
    fn from(code: i32) -> Self {
        match code {
            0 => CommandCode::Off,
            1 => CommandCode::On,
            _ => CommandCode::Unspecified,
        }
    }
}

impl From<CommandCode> for i32 {
    fn from(code: CommandCode) -> Self {
        match code {
            CommandCode::Off => 0,
            CommandCode::On => 1,
            CommandCode::Unspecified => -1,
        }
    }
}

impl std::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandCode::Off => write!(f, "OFF"),
            CommandCode::On => write!(f, "ON"),
            CommandCode::Unspecified => write!(f, "UNSPECIFIED"),
        }
    }
}

/// Mesure produite par un capteur terrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensorReading {
    pub name: String,
    #[serde(rename = "locationID")]
    pub location_id: String,
    #[serde(rename = "typeID")]
    pub type_id: i32,
    pub status_code: i32,
    pub has_error: bool,
    pub value: f32,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            location_id: String::new(),
            type_id: DEFAULT_TYPE_ID,
            status_code: 0,
            has_error: false,
            value: 0.0,
            timestamp: now_rfc3339(),
        }
    }
}

impl SensorReading {
    pub fn new(name: &str, location_id: &str, type_id: i32, value: f32) -> Self {
        Self {
            name: name.to_string(),
            location_id: location_id.to_string(),
            type_id,
            value,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Un code de statut négatif lève le drapeau d'erreur
    pub fn set_status_code(&mut self, code: i32) {
        self.status_code = code;
        if code < 0 {
            self.has_error = true;
        }
    }

    /// Recopie les champs renseignés d'un enregistrement plus récent.
    /// Les champs d'identité ne sont copiés que s'ils sont renseignés ; la
    /// mesure (valeur, horodatage, statut) est toujours celle du plus récent.
    pub fn update_from(&mut self, newer: &SensorReading) {
        if newer.name != DEFAULT_NAME && !newer.name.is_empty() {
            self.name = newer.name.clone();
        }
        if !newer.location_id.is_empty() {
            self.location_id = newer.location_id.clone();
        }
        if newer.type_id != DEFAULT_TYPE_ID {
            self.type_id = newer.type_id;
        }
        self.status_code = newer.status_code;
        self.has_error = newer.has_error;
        self.value = newer.value;
        self.timestamp = newer.timestamp.clone();
    }
}

/// Commande (ou réponse) actionneur
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActuatorCommand {
    pub name: String,
    #[serde(rename = "locationID")]
    pub location_id: String,
    #[serde(rename = "typeID")]
    pub type_id: i32,
    pub status_code: i32,
    pub has_error: bool,
    pub command: CommandCode,
    pub value: f32,
    pub is_response: bool,
    pub state_data: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
}

impl Default for ActuatorCommand {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            location_id: String::new(),
            type_id: DEFAULT_TYPE_ID,
            status_code: 0,
            has_error: false,
            command: CommandCode::Unspecified,
            value: 0.0,
            is_response: false,
            state_data: String::new(),
            timestamp: now_rfc3339(),
        }
    }
}

impl ActuatorCommand {
    pub fn new(name: &str, location_id: &str, type_id: i32) -> Self {
        Self {
            name: name.to_string(),
            location_id: location_id.to_string(),
            type_id,
            ..Default::default()
        }
    }

    pub fn set_status_code(&mut self, code: i32) {
        self.status_code = code;
        if code < 0 {
            self.has_error = true;
        }
    }

    /// Fusion en place d'une vue plus récente du même actionneur.
    /// `is_response` est collant : une fois vrai, il le reste.
    pub fn update_from(&mut self, newer: &ActuatorCommand) {
        if newer.name != DEFAULT_NAME && !newer.name.is_empty() {
            self.name = newer.name.clone();
        }
        if !newer.location_id.is_empty() {
            self.location_id = newer.location_id.clone();
        }
        if newer.type_id != DEFAULT_TYPE_ID {
            self.type_id = newer.type_id;
        }
        if newer.command != CommandCode::Unspecified {
            self.command = newer.command;
        }
        if !newer.state_data.is_empty() {
            self.state_data = newer.state_data.clone();
        }
        if newer.is_response {
            self.is_response = true;
        }
        self.status_code = newer.status_code;
        self.has_error = newer.has_error;
        self.value = newer.value;
        self.timestamp = newer.timestamp.clone();
    }
}

/// Instantané de performance système d'un appareil
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemPerformanceSnapshot {
    pub name: String,
    #[serde(rename = "locationID")]
    pub location_id: String,
    #[serde(rename = "typeID")]
    pub type_id: i32,
    pub status_code: i32,
    pub has_error: bool,
    pub cpu_util: f32,
    pub mem_util: f32,
    pub disk_util: f32,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
}

impl Default for SystemPerformanceSnapshot {
    fn default() -> Self {
        Self {
            name: SYS_PERF_DATA_NAME.to_string(),
            location_id: String::new(),
            type_id: DEFAULT_TYPE_ID,
            status_code: 0,
            has_error: false,
            cpu_util: 0.0,
            mem_util: 0.0,
            disk_util: 0.0,
            timestamp: now_rfc3339(),
        }
    }
}

impl SystemPerformanceSnapshot {
    /// Décompose en deux mesures nommées (CPU, mémoire) pour l'amont.
    /// Chacune hérite de l'identité et de l'horodatage de l'instantané.
    pub fn split_readings(&self) -> [SensorReading; 2] {
        let base = SensorReading {
            name: DEFAULT_NAME.to_string(),
            location_id: self.location_id.clone(),
            type_id: self.type_id,
            status_code: self.status_code,
            has_error: self.has_error,
            value: 0.0,
            timestamp: self.timestamp.clone(),
        };

        let cpu = SensorReading {
            name: CPU_UTIL_NAME.to_string(),
            value: self.cpu_util,
            ..base.clone()
        };
        let mem = SensorReading {
            name: MEM_UTIL_NAME.to_string(),
            value: self.mem_util,
            ..base
        };
        [cpu, mem]
    }
}
