use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};

pub const CONFIG_ENV_VAR: &str = "GATEWAY_KERNEL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "gateway.yaml";

pub const HUMIDITY_SENSOR_TYPE: i32 = 1;
pub const HUMIDITY_SENSOR_NAME: &str = "HumiditySensor";
pub const HUMIDIFIER_ACTUATOR_TYPE: i32 = 2;
pub const HUMIDIFIER_ACTUATOR_NAME: &str = "HumidifierActuator";
pub const HVAC_ACTUATOR_TYPE: i32 = 1;
pub const HVAC_ACTUATOR_NAME: &str = "HvacActuator";
pub const LED_ACTUATOR_TYPE: i32 = 100;
pub const LED_ACTUATOR_NAME: &str = "LEDActuator";

pub const MIN_TIME_PAST_THRESHOLD: u64 = 10;
pub const MAX_TIME_PAST_THRESHOLD: u64 = 7200;
pub const DEFAULT_QOS: u8 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub gateway: GatewayConf,
    pub control: ControlConf,
    pub mqtt: MqttConf,
    pub cloud: CloudConf,
    pub server: ServerConf,
}

/// Drapeaux d'activation des transports et identité de la passerelle
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConf {
    pub location_id: String,
    pub enable_mqtt_client: bool,
    pub enable_cloud_client: bool,
    pub enable_request_server: bool,
    /// Analyse locale des mesures + émission de commandes
    pub handle_humidity_change_on_device: bool,
}

impl Default for GatewayConf {
    fn default() -> Self {
        Self {
            location_id: "gatewaydevice001".into(),
            enable_mqtt_client: true,
            enable_cloud_client: false,
            enable_request_server: false,
            handle_humidity_change_on_device: true,
        }
    }
}

/// Réglages de la boucle à hystérésis
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControlConf {
    pub tracked_type_id: i32,
    pub floor: f32,
    pub ceiling: f32,
    pub nominal_setting: f32,
    /// Secondes pendant lesquelles une excursion doit persister
    pub max_time_past_threshold: u64,
    pub actuator_name: String,
    pub actuator_type_id: i32,
}

impl Default for ControlConf {
    fn default() -> Self {
        Self {
            tracked_type_id: HUMIDITY_SENSOR_TYPE,
            floor: 40.0,
            ceiling: 60.0,
            nominal_setting: 50.0,
            max_time_past_threshold: 300,
            actuator_name: HUMIDIFIER_ACTUATOR_NAME.into(),
            actuator_type_id: HUMIDIFIER_ACTUATOR_TYPE,
        }
    }
}

impl ControlConf {
    /// Seuil temporel borné à [10, 7200] secondes
    pub fn validated(mut self) -> Self {
        let clamped = self
            .max_time_past_threshold
            .clamp(MIN_TIME_PAST_THRESHOLD, MAX_TIME_PAST_THRESHOLD);
        if clamped != self.max_time_past_threshold {
            warn!(
                requested = self.max_time_past_threshold,
                applied = clamped,
                "max_time_past_threshold out of range, clamped"
            );
            self.max_time_past_threshold = clamped;
        }
        if self.floor > self.ceiling {
            warn!(floor = self.floor, ceiling = self.ceiling, "control band inverted, swapping edges");
            std::mem::swap(&mut self.floor, &mut self.ceiling);
        }
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    /// Généré (uuid) si absent
    pub client_id: Option<String>,
    pub qos: u8,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            keep_alive_secs: 30,
            client_id: None,
            qos: DEFAULT_QOS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CloudConf {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub client_id: Option<String>,
    pub base_topic: Option<String>,
    pub qos: u8,
    /// Actionneurs pilotables depuis le cloud (topics d'activation)
    pub actuators: Vec<ActuatorIdentity>,
}

impl Default for CloudConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            keep_alive_secs: 30,
            client_id: None,
            base_topic: None,
            qos: DEFAULT_QOS,
            actuators: vec![
                ActuatorIdentity { name: HVAC_ACTUATOR_NAME.into(), type_id: HVAC_ACTUATOR_TYPE },
                ActuatorIdentity { name: LED_ACTUATOR_NAME.into(), type_id: LED_ACTUATOR_TYPE },
                ActuatorIdentity { name: HUMIDIFIER_ACTUATOR_NAME.into(), type_id: HUMIDIFIER_ACTUATOR_TYPE },
            ],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActuatorIdentity {
    pub name: String,
    pub type_id: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConf {
    pub bind: String,
}

impl Default for ServerConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

/// Lecture stricte : fichier vide -> défauts, YAML invalide -> erreur
pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<GatewayConfig> {
    let txt = std::fs::read_to_string(path.as_ref())?;
    if txt.trim().is_empty() {
        return Ok(GatewayConfig::default());
    }
    let mut cfg: GatewayConfig = serde_yaml::from_str(&txt)?;
    cfg.control = cfg.control.validated();
    Ok(cfg)
}

/// Chemin depuis GATEWAY_KERNEL_CONFIG, sinon gateway.yaml
pub fn load_config() -> Result<GatewayConfig> {
    load_config_with(std::env::var(CONFIG_ENV_VAR).ok())
}

/// Fichier nommé explicitement : absent ou invalide -> erreur.
/// gateway.yaml implicite : absent ou invalide -> défauts + warn.
pub fn load_config_with(explicit: Option<String>) -> Result<GatewayConfig> {
    if let Some(path) = explicit {
        let cfg = load_config_from(&path).map_err(|e| GatewayError::ConfigFile {
            path: format!("{CONFIG_ENV_VAR}={path}"),
            reason: e.to_string(),
        })?;
        info!(%path, "config loaded");
        return Ok(cfg);
    }

    let path = DEFAULT_CONFIG_PATH;
    if !Path::new(path).exists() {
        warn!(%path, "no config file, using defaults");
        return Ok(GatewayConfig::default());
    }
    match load_config_from(path) {
        Ok(cfg) => {
            info!(%path, "config loaded");
            Ok(cfg)
        }
        Err(e) => {
            warn!(%path, error = %e, "invalid config, using defaults");
            Ok(GatewayConfig::default())
        }
    }
}
