/*!
 * GATEWAY KERNEL - Coeur de gestion de données d'une passerelle IoT edge
 *
 * RÔLE :
 * Reçoit télémétrie et réponses actionneur depuis plusieurs transports,
 * les relaie vers l'amont et fait tourner une boucle de contrôle à
 * hystérésis qui transforme les mesures en commandes actionneur.
 */

pub mod cloud;
pub mod codec;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod http;
pub mod manager;
pub mod models;
pub mod mqtt;
pub mod ports;
pub mod resources;
pub mod router;
pub mod state;

pub use error::{GatewayError, Result};
