/*!
Faux transports pour tester le coeur sans broker ni serveur.

Chaque faux enregistre ce qu'il reçoit ; les échecs sont simulés par drapeau.
*/

#![allow(dead_code)]

use gateway_kernel::config::ControlConf;
use gateway_kernel::controller::HysteresisController;
use gateway_kernel::dispatcher::CommandDispatcher;
use gateway_kernel::error::{GatewayError, Result};
use gateway_kernel::health::HealthTracker;
use gateway_kernel::models::{ActuatorCommand, CommandCode, SensorReading, SystemPerformanceSnapshot};
use gateway_kernel::ports::{ActuatorListener, PubSubTransport, TransportLifecycle, UpstreamRelay};
use gateway_kernel::resources::ResourceName;
use gateway_kernel::router::MessageRouter;
use parking_lot::Mutex;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub resource: ResourceName,
    pub payload: String,
    pub qos: QoS,
}

#[derive(Default)]
pub struct MockPubSub {
    pub published: Mutex<Vec<PublishedMessage>>,
    pub fail: AtomicBool,
}

impl MockPubSub {
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.published
            .lock()
            .iter()
            .map(|m| serde_json::from_str(&m.payload).expect("published payload is a command"))
            .collect()
    }
}

impl PubSubTransport for MockPubSub {
    fn publish(&self, resource: ResourceName, payload: &str, qos: QoS) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::transport("mock", "broker unavailable"));
        }
        self.published.lock().push(PublishedMessage {
            resource,
            payload: payload.to_string(),
            qos,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRelay {
    pub sensors: Mutex<Vec<(ResourceName, SensorReading)>>,
    pub snapshots: Mutex<Vec<(ResourceName, SystemPerformanceSnapshot)>>,
    pub fail: AtomicBool,
}

impl UpstreamRelay for MockRelay {
    fn relay_sensor(&self, resource: ResourceName, reading: &SensorReading) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::NotConnected("cloud".into()));
        }
        self.sensors.lock().push((resource, reading.clone()));
        Ok(())
    }

    fn relay_performance(&self, resource: ResourceName, snapshot: &SystemPerformanceSnapshot) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::NotConnected("cloud".into()));
        }
        self.snapshots.lock().push((resource, snapshot.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub updates: Mutex<Vec<ActuatorCommand>>,
}

impl ActuatorListener for RecordingListener {
    fn on_actuator_update(&self, command: &ActuatorCommand) -> bool {
        self.updates.lock().push(command.clone());
        true
    }
}

/// Actionneur lent sur ON : simule un listener qui met du temps à appliquer
pub struct SlowListener {
    pub delay: Duration,
    pub updates: Mutex<Vec<CommandCode>>,
}

impl SlowListener {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            updates: Mutex::new(Vec::new()),
        }
    }
}

impl ActuatorListener for SlowListener {
    fn on_actuator_update(&self, command: &ActuatorCommand) -> bool {
        if command.command == CommandCode::On {
            std::thread::sleep(self.delay);
        }
        self.updates.lock().push(command.command);
        true
    }
}

/// Transport factice : journal d'appels partagé pour vérifier l'ordre
pub struct FakeTransport {
    pub name: String,
    pub journal: Arc<Mutex<Vec<String>>>,
    pub fail_connect: bool,
    pub fail_unsubscribe: bool,
    connected: AtomicBool,
}

impl FakeTransport {
    pub fn new(name: &str, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            journal,
            fail_connect: false,
            fail_unsubscribe: false,
            connected: AtomicBool::new(false),
        }
    }

    fn record(&self, step: &str) {
        self.journal.lock().push(format!("{}:{}", self.name, step));
    }
}

impl TransportLifecycle for FakeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<()> {
        self.record("connect");
        if self.fail_connect {
            return Err(GatewayError::transport(&self.name, "connection refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe_known(&self) -> Result<()> {
        self.record("unsubscribe");
        if self.fail_unsubscribe {
            return Err(GatewayError::NotConnected(self.name.clone()));
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Routeur câblé sur des faux, réglages de contrôle par défaut (40/60/50, 300s)
pub struct Harness {
    pub router: Arc<MessageRouter>,
    pub controller: Arc<HysteresisController>,
    pub pubsub: Arc<MockPubSub>,
    pub relay: Arc<MockRelay>,
    pub listener: Arc<RecordingListener>,
    pub health: HealthTracker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_control(ControlConf::default())
    }

    pub fn with_control(control: ControlConf) -> Self {
        Self::build(control, None)
    }

    /// Listener local supplémentaire servi avant le journal du harnais
    pub fn with_actuator(actuator: Arc<dyn ActuatorListener>) -> Self {
        Self::build(ControlConf::default(), Some(actuator))
    }

    fn build(control: ControlConf, actuator: Option<Arc<dyn ActuatorListener>>) -> Self {
        let health = HealthTracker::new();
        let pubsub = Arc::new(MockPubSub::default());
        let relay = Arc::new(MockRelay::default());
        let listener = Arc::new(RecordingListener::default());
        let controller = Arc::new(HysteresisController::new(control, health.clone()));

        let local: Arc<dyn ActuatorListener> = match actuator {
            Some(actuator) => actuator,
            None => listener.clone(),
        };
        let dispatcher = CommandDispatcher::new(QoS::AtLeastOnce, health.clone())
            .with_pubsub(pubsub.clone())
            .with_listener(local);
        let router = MessageRouter::new(dispatcher)
            .with_controller(controller.clone())
            .with_relay(relay.clone());

        Self {
            router: Arc::new(router),
            controller,
            pubsub,
            relay,
            listener,
            health,
        }
    }
}

pub const DEVICE: &str = "constraineddevice001";
pub const SENSOR_CHANNEL: &str = "PIOT/ConstrainedDevice/SensorMsg";

/// Mesure d'humidité horodatée à t secondes d'une origine fixe
pub fn humidity_at(value: f32, t: i64) -> SensorReading {
    let ts = OffsetDateTime::from_unix_timestamp(1_767_225_600 + t).expect("valid timestamp");
    SensorReading::new("HumiditySensor", DEVICE, 1, value).with_timestamp(ts.format(&Rfc3339).expect("rfc3339"))
}
