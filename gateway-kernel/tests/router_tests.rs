mod common;

use common::{humidity_at, Harness, SlowListener, DEVICE, SENSOR_CHANNEL};
use gateway_kernel::controller::ControlPhase;
use gateway_kernel::models::{ActuatorCommand, CommandCode, SensorReading, SystemPerformanceSnapshot};
use gateway_kernel::ports::DataMessageListener;
use gateway_kernel::resources::ResourceName;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const ACTUATOR_CHANNEL: &str = "PIOT/ConstrainedDevice/ActuatorCmd";

#[test]
fn test_humidity_scenario_on_then_off() {
    let h = Harness::new();

    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(35.0, 0)));
    assert!(h.pubsub.published.lock().is_empty());

    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(33.0, 301)));
    let commands = h.pubsub.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, CommandCode::On);
    assert_eq!(commands[0].value, 50.0);
    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Actuating);

    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(52.0, 305)));
    let commands = h.pubsub.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1].command, CommandCode::Off);
    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Nominal);

    let published = h.pubsub.published.lock();
    assert!(published.iter().all(|m| m.resource == ResourceName::CdaActuatorCmd));
    assert_eq!(h.listener.updates.lock().len(), 2);
    assert_eq!(h.health.get_health().commands_issued, 2);
}

#[test]
fn test_sensor_readings_relayed_upstream() {
    let h = Harness::new();
    let mut temperature = SensorReading::new("TempSensor", DEVICE, 3, 21.5);
    temperature.set_status_code(-2);

    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &temperature));
    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(45.0, 0)));

    let relayed = h.relay.sensors.lock();
    assert_eq!(relayed.len(), 2);
    assert_eq!(relayed[0].0, ResourceName::CdaSensorMsg);
    assert!(relayed[0].1.has_error);
    // type non suivi : aucune analyse
    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Nominal);
}

#[test]
fn test_relay_failure_does_not_stop_control() {
    let h = Harness::new();
    h.relay.fail.store(true, Ordering::SeqCst);

    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(65.0, 0)));
    assert!(h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(66.0, 300)));

    let commands = h.pubsub.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, CommandCode::Off);
}

#[test]
fn test_publish_failure_still_reaches_local_listener() {
    let h = Harness::new();
    h.pubsub.fail.store(true, Ordering::SeqCst);

    h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(30.0, 0));
    h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(30.0, 600));

    assert!(h.pubsub.published.lock().is_empty());
    let updates = h.listener.updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].command, CommandCode::On);
    assert_eq!(h.health.get_health().publish_failures, 1);
}

#[test]
fn test_incoming_actuator_command_forwarded() {
    let h = Harness::new();
    let json = r#"{"name":"LEDActuator","typeID":100,"locationID":"constraineddevice001","command":1,"value":1.0,"stateData":"LED on"}"#;

    assert!(h.router.handle_incoming_message(ACTUATOR_CHANNEL, json));

    let commands = h.pubsub.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].name, "LEDActuator");
    assert_eq!(commands[0].state_data, "LED on");
    assert_eq!(h.listener.updates.lock()[0].command, CommandCode::On);
}

#[test]
fn test_incoming_message_rejections() {
    let h = Harness::new();
    let json = r#"{"name":"LEDActuator","command":1}"#;

    assert!(!h.router.handle_incoming_message("", json));
    assert!(!h.router.handle_incoming_message(ACTUATOR_CHANNEL, ""));
    assert!(!h.router.handle_incoming_message(ACTUATOR_CHANNEL, "{not json"));
    assert!(!h.router.handle_incoming_message("PIOT/Unknown/Thing", json));
    assert!(!h.router.handle_incoming_message(SENSOR_CHANNEL, json));

    assert!(h.pubsub.published.lock().is_empty());
    assert!(h.listener.updates.lock().is_empty());
}

#[test]
fn test_incoming_message_accepted_by_listener_when_publish_fails() {
    let h = Harness::new();
    h.pubsub.fail.store(true, Ordering::SeqCst);

    // le listener local accepte toujours
    assert!(h.router.handle_incoming_message(ACTUATOR_CHANNEL, r#"{"command":0}"#));
}

#[test]
fn test_malformed_typed_inputs_rejected() {
    let h = Harness::new();
    let mut nameless = humidity_at(30.0, 0);
    nameless.name.clear();

    assert!(!h.router.handle_sensor_message("", &humidity_at(30.0, 0)));
    assert!(!h.router.handle_sensor_message("PIOT/Nowhere/SensorMsg", &humidity_at(30.0, 0)));
    assert!(!h.router.handle_sensor_message(SENSOR_CHANNEL, &nameless));
    assert!(!h.router.handle_system_performance_message("", &SystemPerformanceSnapshot::default()));
    assert!(!h.router.handle_actuator_command_response(" ", &ActuatorCommand::default()));

    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Nominal);
    assert!(h.relay.sensors.lock().is_empty());
}

#[test]
fn test_system_performance_relayed_without_control() {
    let h = Harness::new();
    let snapshot = SystemPerformanceSnapshot {
        location_id: DEVICE.into(),
        cpu_util: 12.0,
        mem_util: 40.0,
        ..Default::default()
    };

    assert!(h
        .router
        .handle_system_performance_message("PIOT/ConstrainedDevice/SystemPerfMsg", &snapshot));

    let relayed = h.relay.snapshots.lock();
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].0, ResourceName::CdaSystemPerfMsg);
    assert!(h.pubsub.published.lock().is_empty());
}

#[test]
fn test_actuator_response_is_informational() {
    let h = Harness::new();
    h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(35.0, 0));
    h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(35.0, 400));
    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Actuating);

    let mut response = ActuatorCommand::new("HumidifierActuator", DEVICE, 2);
    response.is_response = true;
    response.command = CommandCode::Off;
    response.has_error = true;

    assert!(h
        .router
        .handle_actuator_command_response("PIOT/ConstrainedDevice/ActuatorResponse", &response));
    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Actuating);
    assert_eq!(h.pubsub.published.lock().len(), 1);
}

#[test]
fn test_concurrent_readings_issue_single_command() {
    let h = Harness::new();
    h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(35.0, 0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let router = Arc::clone(&h.router);
            std::thread::spawn(move || {
                router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(34.0, 300 + i));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // une seule commande : les suivantes démarrent une nouvelle excursion
    let commands = h.pubsub.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, CommandCode::On);
}

#[test]
fn test_commands_delivered_in_decision_order() {
    let slow = Arc::new(SlowListener::new(Duration::from_millis(300)));
    let h = Harness::with_actuator(slow.clone());
    h.router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(35.0, 0));

    // ON décidé d'abord, livré lentement ; OFF décidé pendant la livraison
    let router = Arc::clone(&h.router);
    let on = std::thread::spawn(move || router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(33.0, 301)));
    std::thread::sleep(Duration::from_millis(50));
    let router = Arc::clone(&h.router);
    let off = std::thread::spawn(move || router.handle_sensor_message(SENSOR_CHANNEL, &humidity_at(52.0, 305)));
    assert!(on.join().unwrap());
    assert!(off.join().unwrap());

    assert_eq!(*slow.updates.lock(), vec![CommandCode::On, CommandCode::Off]);
    let published: Vec<CommandCode> = h.pubsub.commands().iter().map(|c| c.command).collect();
    assert_eq!(published, vec![CommandCode::On, CommandCode::Off]);
    assert_eq!(h.controller.phase(DEVICE), ControlPhase::Nominal);
}
