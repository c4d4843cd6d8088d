/**
 * CODEC - Encodage texte (JSON) des enregistrements
 *
 * RÔLE :
 * Sérialise et désérialise mesures, commandes et snapshots de performance.
 *
 * FONCTIONNEMENT :
 * - Payload vide ou non UTF-8 -> MalformedInput
 * - Contrat : encode(decode(x)) redonne un enregistrement équivalent
 */

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GatewayError, Result};
use crate::models::{ActuatorCommand, SensorReading, SystemPerformanceSnapshot};

pub fn encode<T: Serialize>(record: &T) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T> {
    if payload.trim().is_empty() {
        return Err(GatewayError::MalformedInput("empty payload".into()));
    }
    Ok(serde_json::from_str(payload)?)
}

pub fn decode_bytes<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let txt = std::str::from_utf8(payload)
        .map_err(|e| GatewayError::MalformedInput(format!("payload is not UTF-8: {e}")))?;
    decode(txt)
}

pub fn actuator_command_from_json(payload: &str) -> Result<ActuatorCommand> {
    decode(payload)
}

pub fn sensor_reading_from_json(payload: &str) -> Result<SensorReading> {
    decode(payload)
}

pub fn system_performance_from_json(payload: &str) -> Result<SystemPerformanceSnapshot> {
    decode(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandCode;

    #[test]
    fn test_actuator_command_round_trip() {
        let mut cmd = ActuatorCommand::new("HumidifierActuator", "constraineddevice001", 2);
        cmd.command = CommandCode::On;
        cmd.value = 50.0;
        cmd.state_data = "Humidifier switching ON".into();

        let json = encode(&cmd).unwrap();
        let back: ActuatorCommand = decode(&json).unwrap();
        assert_eq!(back, cmd);
        assert_eq!(encode(&back).unwrap(), json);
    }

    #[test]
    fn test_sensor_reading_round_trip_keeps_unparsable_timestamp() {
        let reading = SensorReading::new("HumiditySensor", "cda001", 1, 35.0).with_timestamp("yesterday");
        let back = sensor_reading_from_json(&encode(&reading).unwrap()).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn test_system_performance_round_trip() {
        let snapshot = SystemPerformanceSnapshot {
            cpu_util: 3.5,
            mem_util: 41.0,
            disk_util: 77.25,
            ..Default::default()
        };
        let back = system_performance_from_json(&encode(&snapshot).unwrap()).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_wire_field_names() {
        let json = r#"{"name":"HumiditySensor","typeID":1,"locationID":"cda001","value":35.0,"timeStamp":"2026-01-01T00:00:00Z","hasError":false,"statusCode":0}"#;
        let reading = sensor_reading_from_json(json).unwrap();
        assert_eq!(reading.type_id, 1);
        assert_eq!(reading.location_id, "cda001");
        assert_eq!(reading.timestamp, "2026-01-01T00:00:00Z");

        let cmd = actuator_command_from_json(r#"{"command":1,"value":50.0,"isResponse":true}"#).unwrap();
        assert_eq!(cmd.command, CommandCode::On);
        assert!(cmd.is_response);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(decode::<SensorReading>(""), Err(GatewayError::MalformedInput(_))));
        assert!(matches!(decode::<SensorReading>("{not json"), Err(GatewayError::Decode(_))));
        assert!(matches!(
            decode_bytes::<SensorReading>(&[0xff, 0xfe]),
            Err(GatewayError::MalformedInput(_))
        ));
    }
}
