/**
 * RESOURCES - Identités de ressources de la passerelle
 *
 * RÔLE :
 * Nom structuré qui relie une capacité logique d'un appareil
 * (ex: commande actionneur du constrained device) au canal du transport
 * (topic MQTT, chemin de ressource requête/réponse).
 *
 * FONCTIONNEMENT :
 * - Chemin = "<produit>/<appareil>/<type de ressource>"
 * - Parsing depuis le nom de canal brut reçu par un transport
 * - Noms de topics amont (cloud) dérivés : "<prefix><appareil>/<type>-<item>"
 */

use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

pub const PRODUCT_NAME: &str = "PIOT";
pub const CONSTRAINED_DEVICE: &str = "ConstrainedDevice";
pub const GATEWAY_DEVICE: &str = "GatewayDevice";

/// Clé de dispatch utilisée partout dans le coeur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceName {
    CdaMgmtStatusMsg,
    CdaMgmtStatusCmd,
    CdaActuatorCmd,
    CdaActuatorResponse,
    CdaSensorMsg,
    CdaSystemPerfMsg,
    GdaMgmtStatusMsg,
    GdaMgmtStatusCmd,
    GdaSystemPerfMsg,
}

impl ResourceName {
    pub const ALL: [ResourceName; 9] = [
        ResourceName::CdaMgmtStatusMsg,
        ResourceName::CdaMgmtStatusCmd,
        ResourceName::CdaActuatorCmd,
        ResourceName::CdaActuatorResponse,
        ResourceName::CdaSensorMsg,
        ResourceName::CdaSystemPerfMsg,
        ResourceName::GdaMgmtStatusMsg,
        ResourceName::GdaMgmtStatusCmd,
        ResourceName::GdaSystemPerfMsg,
    ];

    pub fn device_name(&self) -> &'static str {
        match self {
            ResourceName::GdaMgmtStatusMsg
            | ResourceName::GdaMgmtStatusCmd
            | ResourceName::GdaSystemPerfMsg => GATEWAY_DEVICE,
            _ => CONSTRAINED_DEVICE,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceName::CdaMgmtStatusMsg | ResourceName::GdaMgmtStatusMsg => "MgmtStatusMsg",
            ResourceName::CdaMgmtStatusCmd | ResourceName::GdaMgmtStatusCmd => "MgmtStatusCmd",
            ResourceName::CdaActuatorCmd => "ActuatorCmd",
            ResourceName::CdaActuatorResponse => "ActuatorResponse",
            ResourceName::CdaSensorMsg => "SensorMsg",
            ResourceName::CdaSystemPerfMsg | ResourceName::GdaSystemPerfMsg => "SystemPerfMsg",
        }
    }

    /// Nom complet du canal, ex: "PIOT/ConstrainedDevice/ActuatorCmd"
    pub fn channel(&self) -> String {
        format!("{}/{}/{}", PRODUCT_NAME, self.device_name(), self.resource_type())
    }

    /// Topic amont (cloud) pour un item donné, toujours en minuscules
    /// Ex: prefix "edge/" + CdaSensorMsg + "HumiditySensor"
    ///     -> "edge/constraineddevice/sensormsg-humiditysensor"
    pub fn cloud_topic(&self, prefix: &str, item_name: &str) -> String {
        let base = cloud_topic_name(prefix, self.device_name(), self.resource_type());
        format!("{}-{}", base, item_name).to_lowercase()
    }
}

/// "<prefix><device>/<resource type>" en minuscules; segments vides omis
pub fn cloud_topic_name(prefix: &str, device_name: &str, resource_type: &str) -> String {
    let mut buf = String::new();
    if !device_name.trim().is_empty() {
        buf.push_str(prefix);
        buf.push_str(device_name);
    }
    if !resource_type.trim().is_empty() {
        buf.push('/');
        buf.push_str(resource_type);
    }
    buf.to_lowercase()
}

/// Normalise un préfixe de topic : "/" par défaut, toujours terminé par '/'
pub fn normalize_topic_prefix(prefix: Option<&str>) -> String {
    match prefix.map(str::trim) {
        None | Some("") => "/".to_string(),
        Some(p) if p.ends_with('/') => p.to_string(),
        Some(p) => format!("{p}/"),
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel())
    }
}

impl FromStr for ResourceName {
    type Err = GatewayError;

    /// Accepte le canal complet, avec ou sans '/' initial (chemins HTTP)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(GatewayError::MalformedInput("empty resource name".into()));
        }
        ResourceName::ALL
            .iter()
            .copied()
            .find(|r| r.channel().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| GatewayError::UnknownResource(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(ResourceName::CdaActuatorCmd.channel(), "PIOT/ConstrainedDevice/ActuatorCmd");
        assert_eq!(ResourceName::GdaSystemPerfMsg.channel(), "PIOT/GatewayDevice/SystemPerfMsg");
    }

    #[test]
    fn test_parse_resource_name() {
        assert_eq!(
            "PIOT/ConstrainedDevice/SensorMsg".parse::<ResourceName>().unwrap(),
            ResourceName::CdaSensorMsg
        );
        assert_eq!(
            "/piot/constraineddevice/actuatorresponse".parse::<ResourceName>().unwrap(),
            ResourceName::CdaActuatorResponse
        );
        assert!(matches!("".parse::<ResourceName>(), Err(GatewayError::MalformedInput(_))));
        assert!(matches!("  ".parse::<ResourceName>(), Err(GatewayError::MalformedInput(_))));
        assert!(matches!(
            "PIOT/Nowhere/Nothing".parse::<ResourceName>(),
            Err(GatewayError::UnknownResource(_))
        ));
    }

    #[test]
    fn test_cloud_topic() {
        let prefix = normalize_topic_prefix(Some("edge"));
        assert_eq!(prefix, "edge/");
        assert_eq!(
            ResourceName::CdaSensorMsg.cloud_topic(&prefix, "HumiditySensor"),
            "edge/constraineddevice/sensormsg-humiditysensor"
        );
        assert_eq!(normalize_topic_prefix(None), "/");
        assert_eq!(cloud_topic_name("/", "ConstrainedDevice", "HumidifierActuator"), "/constraineddevice/humidifieractuator");
    }
}
