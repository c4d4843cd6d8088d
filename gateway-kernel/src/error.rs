/**
 * GATEWAY ERRORS - Taxonomie d'erreurs du coeur
 *
 * RÔLE :
 * Erreurs typées du routage, du contrôle, des transports et de la config.
 *
 * FONCTIONNEMENT :
 * - Points d'entrée du routeur : erreur -> false + log, jamais de panique
 * - Transports : erreur remontée dans le rapport de cycle de vie
 * - Seule une config nommée explicitement et illisible arrête le démarrage
 */

/// Erreurs possibles lors du routage, du contrôle et du transport
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Identité de ressource ou payload vide / absent
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    /// Nom de canal qui ne correspond à aucune ressource connue
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    /// Payload illisible pour le type d'enregistrement attendu
    #[error("Decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Publication / connexion / déconnexion refusée par un transport
    #[error("Transport failure ({transport}): {reason}")]
    Transport { transport: String, reason: String },
    /// Transport pas encore connecté (ou déjà arrêté)
    #[error("Transport not connected: {0}")]
    NotConnected(String),
    /// État du contrôleur incohérent (ex: ACTUATING sans commande en attente)
    #[error("Inconsistent controller state: {0}")]
    InconsistentState(String),
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),
    /// Fichier de config nommé explicitement mais absent ou invalide
    #[error("Config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn transport(transport: &str, reason: impl std::fmt::Display) -> Self {
        GatewayError::Transport {
            transport: transport.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
