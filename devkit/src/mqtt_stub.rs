/*!
Mock MQTT Client pour développement sans broker

Enregistre tous les messages publiés et les abonnements, simule la
réception de messages sur les topics abonnés, et permet de simuler un
échec de publication sur des topics précis.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl MockMessage {
    /// Payload décodé en texte (les topics du bridge sont en texte brut)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone, Default)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<(String, QoS)>>>,
    failing_topics: Arc<Mutex<HashSet<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::Sender<String>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration d'un channel pour recevoir les payloads simulés
    /// (même forme que les commandes transmises par la boucle MQTT)
    pub fn setup_receiver(&self, capacity: usize) -> mpsc::Receiver<String> {
        let (sender, receiver) = mpsc::channel(capacity);
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Ferme le channel : le receveur voit la fin du flux
    pub fn close_receiver(&self) {
        self.message_sender.lock().unwrap().take();
    }

    /// Simule la réception d'un message. Renvoie `false` si le topic n'est
    /// pas abonné (rien n'est livré, comme avec un vrai broker)
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<bool>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let topic = topic.into();
        let subscribed = self.subscriptions.lock().unwrap().iter().any(|(t, _)| *t == topic);
        if !subscribed {
            log::info!("📨 [MOCK] Ignored incoming on {} (not subscribed)", topic);
            return Ok(false);
        }

        let sender = self.message_sender.lock().unwrap().clone();
        let Some(sender) = sender else {
            anyhow::bail!("no receiver set up");
        };
        let text = String::from_utf8_lossy(&payload.into()).into_owned();
        sender.send(text).await.map_err(|e| anyhow::anyhow!("Send error: {}", e))?;

        log::info!("📨 [MOCK] Simulated incoming: {}", topic);
        Ok(true)
    }

    /// Toute publication future sur ce topic échouera
    pub fn fail_topic<S: Into<String>>(&self, topic: S) {
        self.failing_topics.lock().unwrap().insert(topic.into());
    }

    /// Simule la publication d'un message (compatible avec AsyncClient)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let topic = topic.into();
        if self.failing_topics.lock().unwrap().contains(&topic) {
            log::warn!("📤 [MOCK] Publish refusé sur {}", topic);
            anyhow::bail!("simulated publish failure on {}", topic);
        }

        let message = MockMessage {
            topic,
            payload: payload.into(),
            qos,
            retain,
        };
        log::info!("📤 [MOCK] Published to {}: {} bytes", message.topic, message.payload.len());
        self.published_messages.lock().unwrap().push(message);
        Ok(())
    }

    /// Simule l'abonnement à un topic (compatible avec AsyncClient)
    pub async fn subscribe<S: Into<String>>(&self, topic: S, qos: QoS) -> Result<()> {
        let topic = topic.into();
        log::info!("📥 [MOCK] Subscribed to {}", topic);
        self.subscriptions.lock().unwrap().push((topic, qos));
        Ok(())
    }

    /// Récupère tous les messages publiés (pour assertions de tests)
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Récupère les abonnements (pour assertions de tests)
    pub fn get_subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Trouve les messages publiés sur un topic donné
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Dernier payload texte publié sur un topic
    pub fn last_text(&self, topic: &str) -> Option<String> {
        self.find_messages_by_topic(topic).last().map(MockMessage::text)
    }

    /// Reset tous les messages enregistrés
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}
