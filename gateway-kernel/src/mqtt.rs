/**
 * MQTT CONNECTOR - Transport pub/sub côté appareils contraints
 *
 * RÔLE :
 * Adapte un client rumqttc aux ports du coeur : entrées vers le routeur
 * (DataMessageListener), sorties PubSubTransport, cycle de vie piloté par le
 * manager (TransportLifecycle).
 *
 * FONCTIONNEMENT :
 * - connect() crée AsyncClient + task tokio qui poll l'eventloop
 * - ConnAck -> abonnement aux canaux ActuatorResponse, SensorMsg, SystemPerfMsg
 * - Publish reçu -> décodage selon la ressource -> handler typé du routeur
 * - Erreur de connexion -> pause 2s puis nouvelle tentative (rumqttc reconnecte)
 * - Publications via try_publish : jamais d'attente réseau côté coeur
 *
 * MqttLink est partagé avec le connecteur cloud.
 */

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, Outgoing, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec;
use crate::config::MqttConf;
use crate::error::{GatewayError, Result};
use crate::health::HealthTracker;
use crate::models::{ActuatorCommand, SensorReading, SystemPerformanceSnapshot};
use crate::ports::{qos_from_level, DataMessageListener, PubSubTransport, TransportLifecycle};
use crate::resources::ResourceName;
use crate::state::{new_shared, Shared};

pub const MQTT_TRANSPORT: &str = "mqtt";

const RECONNECT_PAUSE: Duration = Duration::from_secs(2);
const REQUEST_CAPACITY: usize = 10;

/// Canaux écoutés sur le broker local
pub const DEVICE_SUBSCRIPTIONS: [ResourceName; 3] = [
    ResourceName::CdaActuatorResponse,
    ResourceName::CdaSensorMsg,
    ResourceName::CdaSystemPerfMsg,
];

/// Référence faible vers le routeur, posée après construction
pub type ListenerSlot = Shared<Option<Weak<dyn DataMessageListener>>>;

pub fn empty_listener_slot() -> ListenerSlot {
    new_shared(None)
}

pub(crate) fn current_listener(slot: &ListenerSlot) -> Option<Arc<dyn DataMessageListener>> {
    slot.lock().as_ref().and_then(Weak::upgrade)
}

/// Options client ; id généré si la config n'en fournit pas
pub(crate) fn mqtt_options(
    prefix: &str,
    host: &str,
    port: u16,
    keep_alive_secs: u64,
    client_id: Option<&str>,
) -> MqttOptions {
    let client_id = client_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("{prefix}-{}", Uuid::new_v4()));
    let mut opts = MqttOptions::new(client_id, host, port);
    opts.set_keep_alive(Duration::from_secs(keep_alive_secs.max(5)));
    opts.set_clean_session(true);
    opts
}

/// Une ouverture du lien : client + drapeaux propres à sa task d'eventloop
struct Session {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
}

/// Connexion MQTT + task d'eventloop, sans logique métier
pub(crate) struct MqttLink {
    name: &'static str,
    session: Mutex<Option<Session>>,
    health: HealthTracker,
}

impl MqttLink {
    pub(crate) fn new(name: &'static str, health: HealthTracker) -> Self {
        Self {
            name,
            session: Mutex::new(None),
            health,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Lance la task d'eventloop ; no-op si déjà ouvert
    pub(crate) fn open<C, P>(&self, options: MqttOptions, on_connack: C, on_publish: P) -> Result<()>
    where
        C: Fn(&AsyncClient) + Send + 'static,
        P: Fn(&str, &[u8]) + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| GatewayError::transport(self.name, format!("no tokio runtime: {e}")))?;

        let mut slot = self.session.lock();
        if slot.is_some() {
            debug!(transport = self.name, "already connected");
            return Ok(());
        }

        let (host, port) = options.broker_address();
        info!(transport = self.name, %host, port, "connecting to MQTT broker");
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        self.health.mark_connecting(self.name);

        // drapeaux neufs : une task précédente garde les siens
        let session = Session {
            client,
            connected: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
        };
        let name = self.name;
        let task_client = session.client.clone();
        let connected = session.connected.clone();
        let stopping = session.stopping.clone();
        let health = self.health.clone();

        runtime.spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        connected.store(true, Ordering::SeqCst);
                        health.mark_connected(name);
                        info!(transport = name, "MQTT connection established");
                        on_connack(&task_client);
                    }
                    Ok(Event::Incoming(Incoming::Publish(p))) => {
                        debug!(transport = name, topic = %p.topic, "message received");
                        on_publish(p.topic.as_str(), p.payload.as_ref());
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        if stopping.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        connected.store(false, Ordering::SeqCst);
                        if stopping.load(Ordering::SeqCst) {
                            break;
                        }
                        warn!(transport = name, error = %e, "MQTT connection error, retrying");
                        health.increment_reconnects(name);
                        tokio::time::sleep(RECONNECT_PAUSE).await;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            info!(transport = name, "MQTT event loop stopped");
        });

        *slot = Some(session);
        Ok(())
    }

    pub(crate) fn client(&self) -> Result<AsyncClient> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.client.clone())
            .ok_or_else(|| GatewayError::NotConnected(self.name.to_string()))
    }

    pub(crate) fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<()> {
        self.client()?
            .try_publish(topic, qos, false, payload.as_bytes().to_vec())
            .map_err(|e| GatewayError::transport(self.name, e))
    }

    pub(crate) fn unsubscribe(&self, topics: &[String]) -> Result<()> {
        let client = self.client()?;
        let mut failures = Vec::new();
        for topic in topics {
            match client.try_unsubscribe(topic.as_str()) {
                Ok(()) => debug!(transport = self.name, %topic, "unsubscribed"),
                Err(e) => failures.push(format!("{topic}: {e}")),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::transport(self.name, failures.join(", ")))
        }
    }

    /// Idempotent : déconnecter un lien fermé réussit
    pub(crate) fn close(&self) -> Result<()> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };
        session.stopping.store(true, Ordering::SeqCst);
        session.connected.store(false, Ordering::SeqCst);
        self.health.mark_disconnected(self.name);
        session
            .client
            .try_disconnect()
            .map_err(|e| GatewayError::transport(self.name, e))
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.connected.load(Ordering::SeqCst))
    }
}

pub(crate) fn subscribe_all(name: &str, client: &AsyncClient, topics: &[String], qos: QoS) {
    for topic in topics {
        match client.try_subscribe(topic.as_str(), qos) {
            Ok(()) => info!(transport = name, %topic, "subscribed"),
            Err(e) => warn!(transport = name, %topic, error = %e, "subscribe failed"),
        }
    }
}

/// Décode un message broker et l'envoie au handler typé correspondant
pub fn route_device_message(listener: &dyn DataMessageListener, topic: &str, payload: &[u8]) -> bool {
    let resource = match topic.parse::<ResourceName>() {
        Ok(resource) => resource,
        Err(e) => {
            warn!(%topic, error = %e, "message on unexpected topic ignored");
            return false;
        }
    };

    let routed = match resource {
        ResourceName::CdaActuatorResponse => codec::decode_bytes::<ActuatorCommand>(payload)
            .map(|cmd| listener.handle_actuator_command_response(topic, &cmd)),
        ResourceName::CdaSensorMsg => codec::decode_bytes::<SensorReading>(payload)
            .map(|reading| listener.handle_sensor_message(topic, &reading)),
        ResourceName::CdaSystemPerfMsg | ResourceName::GdaSystemPerfMsg => {
            codec::decode_bytes::<SystemPerformanceSnapshot>(payload)
                .map(|snapshot| listener.handle_system_performance_message(topic, &snapshot))
        }
        ResourceName::CdaActuatorCmd => match std::str::from_utf8(payload) {
            Ok(text) => Ok(listener.handle_incoming_message(topic, text)),
            Err(e) => Err(GatewayError::MalformedInput(e.to_string())),
        },
        other => {
            debug!(resource = %other, "no handler for resource");
            return false;
        }
    };

    routed.unwrap_or_else(|e| {
        warn!(%topic, error = %e, "failed to decode broker message");
        false
    })
}

pub struct MqttConnector {
    link: MqttLink,
    settings: MqttConf,
    qos: QoS,
    listener: ListenerSlot,
}

impl MqttConnector {
    pub fn new(settings: MqttConf, health: HealthTracker) -> Self {
        Self {
            link: MqttLink::new(MQTT_TRANSPORT, health),
            qos: qos_from_level(settings.qos),
            settings,
            listener: empty_listener_slot(),
        }
    }

    pub fn set_listener(&self, listener: Weak<dyn DataMessageListener>) {
        *self.listener.lock() = Some(listener);
    }

    fn subscription_topics() -> Vec<String> {
        DEVICE_SUBSCRIPTIONS.iter().map(ResourceName::channel).collect()
    }
}

impl PubSubTransport for MqttConnector {
    fn publish(&self, resource: ResourceName, payload: &str, qos: QoS) -> Result<()> {
        self.link.publish(&resource.channel(), payload, qos)
    }
}

impl TransportLifecycle for MqttConnector {
    fn name(&self) -> &str {
        self.link.name()
    }

    fn connect(&self) -> Result<()> {
        let options = mqtt_options(
            "gateway-kernel",
            &self.settings.host,
            self.settings.port,
            self.settings.keep_alive_secs,
            self.settings.client_id.as_deref(),
        );
        let qos = self.qos;
        let listener = self.listener.clone();

        self.link.open(
            options,
            move |client| subscribe_all(MQTT_TRANSPORT, client, &Self::subscription_topics(), qos),
            move |topic, payload| match current_listener(&listener) {
                Some(router) => {
                    route_device_message(router.as_ref(), topic, payload);
                }
                None => warn!(%topic, "no data listener registered, message dropped"),
            },
        )
    }

    fn unsubscribe_known(&self) -> Result<()> {
        self.link.unsubscribe(&Self::subscription_topics())
    }

    fn disconnect(&self) -> Result<()> {
        self.link.close()
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }
}
