/*!
# Modem Bridge DevKit - Doubles de test pour le bridge

Bibliothèque facilitant les tests du bridge sans matériel réel avec:
- Stub MQTT pour tests sans broker
- Broker TCP minimal pour tester le vrai client rumqttc
- Routeur OpenWRT simulé (serveur HTTP local)
- Fixtures JSON des réponses réelles du routeur
*/

#![recursion_limit = "256"]

pub mod fixtures;
pub mod mock_broker;
pub mod mock_router;
pub mod mqtt_stub;

pub use mock_broker::{BrokerSession, MockBroker};
pub use mock_router::MockRouter;
pub use mqtt_stub::{MockMessage, MockMqttClient};
