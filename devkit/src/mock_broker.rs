/*!
Broker MQTT minimal sur TCP pour tester le vrai client rumqttc

Ne parle que le strict nécessaire de MQTT 3.1.1 :
- CONNECT → CONNACK accepté
- SUBSCRIBE → SUBACK
- envoi de PUBLISH QoS 0 vers le client

Fermer une `BrokerSession` (drop) coupe la connexion, ce qui permet de
simuler une panne puis une reconnexion sur le même port.
*/

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const CONNECT: u8 = 0x10;
pub const PUBLISH: u8 = 0x30;
pub const SUBSCRIBE: u8 = 0x82;
pub const DISCONNECT: u8 = 0xE0;

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

pub struct MockBroker {
    listener: TcpListener,
}

impl MockBroker {
    /// Écoute sur 127.0.0.1 avec un port libre
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        log::info!("[mock-broker] listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or_default()
    }

    /// Accepte le prochain client, lit son CONNECT et répond CONNACK
    pub async fn accept(&self) -> Result<BrokerSession> {
        let (stream, peer) = self.listener.accept().await?;
        let mut session = BrokerSession { stream };

        let (header, _) = session.read_packet().await?;
        if header & 0xF0 != CONNECT {
            anyhow::bail!("expected CONNECT, got packet 0x{:02x}", header);
        }
        session.stream.write_all(&CONNACK_ACCEPTED).await?;
        log::info!("[mock-broker] client {} connected", peer);
        Ok(session)
    }
}

/// Une connexion client acceptée
pub struct BrokerSession {
    stream: TcpStream,
}

impl BrokerSession {
    /// Lit un paquet : (premier octet du header fixe, corps)
    pub async fn read_packet(&mut self) -> Result<(u8, Vec<u8>)> {
        let header = self.stream.read_u8().await?;

        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = self.stream.read_u8().await?;
            len |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 21 {
                anyhow::bail!("malformed remaining length");
            }
        }

        let mut body = vec![0; len];
        self.stream.read_exact(&mut body).await?;
        Ok((header, body))
    }

    /// Saute les autres paquets jusqu'au prochain SUBSCRIBE, répond SUBACK
    /// et renvoie le premier topic demandé
    pub async fn next_subscribe(&mut self) -> Result<String> {
        loop {
            let (header, body) = self.read_packet().await?;
            if header != SUBSCRIBE {
                continue;
            }
            if body.len() < 4 {
                anyhow::bail!("short SUBSCRIBE packet");
            }
            let topic_len = u16::from_be_bytes([body[2], body[3]]) as usize;
            let topic = String::from_utf8_lossy(&body[4..4 + topic_len]).into_owned();

            self.stream.write_all(&[0x90, 0x03, body[0], body[1], 0x00]).await?;
            log::info!("[mock-broker] SUBSCRIBE {}", topic);
            return Ok(topic);
        }
    }

    /// Envoie un PUBLISH QoS 0 au client
    pub async fn send_publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
        body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(payload);

        let mut packet = vec![PUBLISH];
        encode_remaining_length(body.len(), &mut packet);
        packet.extend_from_slice(&body);
        self.stream.write_all(&packet).await?;
        Ok(())
    }
}

fn encode_remaining_length(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}
