//! UDP transport in front of the session engine
//!
//! Every datagram carries one bincode-encoded `Packet`. Requests map 1:1
//! onto `GameService` operations; the response goes back to the sender's
//! address. A `Subscribe` request registers the sender as a live
//! connection: a per-connection task drains that subscriber's event
//! queue and forwards each event as its own datagram. When forwarding
//! fails the task stops and the broadcaster prunes the dead subscriber
//! on its next publish; recorded answers and scores are untouched.

use crate::error::GameError;
use crate::service::GameService;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const RECV_BUFFER_SIZE: usize = 8192;

struct LiveConnection {
    code: String,
    subscription_id: u64,
    forwarder: JoinHandle<()>,
}

pub struct NetworkServer {
    socket: Arc<UdpSocket>,
    service: Arc<GameService>,
    connections: Mutex<HashMap<SocketAddr, LiveConnection>>,
}

impl NetworkServer {
    pub async fn bind(addr: &str, service: Arc<GameService>) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            service,
            connections: Mutex::new(HashMap::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive loop: decode, dispatch, reply. Runs until the task is
    /// cancelled; transient socket errors are logged and skipped.
    pub async fn run(&self) -> std::io::Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        loop {
            let (len, addr) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    continue;
                }
            };

            let packet = match deserialize::<Packet>(&buffer[0..len]) {
                Ok(packet) => packet,
                Err(_) => {
                    warn!("Failed to deserialize packet from {}", addr);
                    continue;
                }
            };

            let response = self.handle_packet(packet, addr).await;
            self.send_packet(&response, addr).await;
        }
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        match serialize(packet) {
            Ok(data) => {
                if let Err(e) = self.socket.send_to(&data, addr).await {
                    warn!("Failed to send to {}: {}", addr, e);
                }
            }
            Err(e) => error!("Failed to serialize response packet: {}", e),
        }
    }

    fn error_packet(err: GameError) -> Packet {
        Packet::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) -> Packet {
        match packet {
            Packet::CreateSession { quiz_ref } => {
                match self.service.create_session(quiz_ref).await {
                    Ok(created) => Packet::SessionCreated {
                        code: created.code,
                        host_token: created.host_token,
                    },
                    Err(err) => Self::error_packet(err),
                }
            }

            Packet::Join { code, nickname } => {
                match self.service.join_session(&code, &nickname).await {
                    Ok(joined) => Packet::Joined {
                        participant_id: joined.participant_id,
                        connection_token: joined.connection_token,
                    },
                    Err(err) => Self::error_packet(err),
                }
            }

            Packet::Reconnect {
                code,
                participant_id,
            } => match self.service.reconnect(&code, participant_id).await {
                Ok(joined) => Packet::Reconnected {
                    connection_token: joined.connection_token,
                },
                Err(err) => Self::error_packet(err),
            },

            Packet::Start { code, host_token } => {
                match self.service.start_session(&code, &host_token).await {
                    Ok(()) => Packet::Started,
                    Err(err) => Self::error_packet(err),
                }
            }

            Packet::Submit {
                code,
                participant_id,
                order,
            } => match self
                .service
                .submit_answer(&code, participant_id, &order)
                .await
            {
                Ok(result) => Packet::SubmitResult {
                    total_score: result.total_score,
                    correct_count: result.correct_count,
                },
                Err(err) => Self::error_packet(err),
            },

            Packet::Finish { code, host_token } => {
                match self.service.finish_session(&code, &host_token).await {
                    Ok(leaderboard) => Packet::Finished { leaderboard },
                    Err(err) => Self::error_packet(err),
                }
            }

            Packet::Kick {
                code,
                host_token,
                participant_id,
            } => match self
                .service
                .kick_participant(&code, &host_token, participant_id)
                .await
            {
                Ok(()) => Packet::KickAck,
                Err(err) => Self::error_packet(err),
            },

            Packet::Subscribe { code } => match self.subscribe_connection(&code, addr).await {
                Ok(()) => Packet::Subscribed,
                Err(err) => Self::error_packet(err),
            },

            Packet::Unsubscribe { .. } => {
                self.drop_connection(addr).await;
                Packet::Unsubscribed
            }

            Packet::Destroy { code, host_token } => {
                match self.service.destroy_session(&code, &host_token).await {
                    Ok(()) => Packet::Destroyed,
                    Err(err) => Self::error_packet(err),
                }
            }

            other => {
                warn!("Unexpected packet type from {}: {:?}", addr, other);
                Packet::Error {
                    code: "unexpected_packet".to_string(),
                    message: "packet type not valid as a request".to_string(),
                }
            }
        }
    }

    /// Registers `addr` on the session channel and spawns the task that
    /// forwards its queued events as datagrams. A re-subscribe from the
    /// same address replaces the previous connection.
    async fn subscribe_connection(&self, code: &str, addr: SocketAddr) -> Result<(), GameError> {
        self.drop_connection(addr).await;

        let mut subscription = self.service.subscribe_events(code).await?;
        let subscription_id = subscription.id;
        let canonical = code.trim().to_ascii_uppercase();

        let socket = Arc::clone(&self.socket);
        let forwarder = tokio::spawn(async move {
            while let Some(event) = subscription.receiver.recv().await {
                let data = match serialize(&Packet::Event { event }) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to serialize event for {}: {}", addr, e);
                        continue;
                    }
                };
                if let Err(e) = socket.send_to(&data, addr).await {
                    // Dead connection: stop forwarding; dropping the
                    // receiver gets this subscriber pruned on the next
                    // publish.
                    debug!("Event forwarding to {} stopped: {}", addr, e);
                    break;
                }
            }
        });

        let mut connections = self.connections.lock().await;
        connections.insert(
            addr,
            LiveConnection {
                code: canonical,
                subscription_id,
                forwarder,
            },
        );
        info!("Connection {} subscribed", addr);
        Ok(())
    }

    async fn drop_connection(&self, addr: SocketAddr) {
        let removed = self.connections.lock().await.remove(&addr);
        if let Some(connection) = removed {
            connection.forwarder.abort();
            self.service
                .unsubscribe_events(&connection.code, connection.subscription_id)
                .await;
            debug!("Connection {} unsubscribed", addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz_store::InMemoryQuizStore;
    use crate::service::EngineConfig;
    use shared::GameEvent;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn spawn_server() -> (SocketAddr, Arc<NetworkServer>) {
        let service = Arc::new(GameService::new(
            Arc::new(InMemoryQuizStore::with_demo_quiz()),
            EngineConfig::default(),
        ));
        let server = Arc::new(
            NetworkServer::bind("127.0.0.1:0", service)
                .await
                .expect("bind failed"),
        );
        let addr = server.local_addr().unwrap();

        let runner = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = runner.run().await;
        });

        (addr, server)
    }

    async fn request(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> Packet {
        socket.send_to(&serialize(packet).unwrap(), server).await.unwrap();
        recv_packet(socket).await
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for packet")
            .unwrap();
        deserialize(&buffer[0..len]).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_over_udp() {
        let (server_addr, _server) = spawn_server().await;
        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let player = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let (code, host_token) =
            match request(&host, server_addr, &Packet::CreateSession { quiz_ref: 1 }).await {
                Packet::SessionCreated { code, host_token } => (code, host_token),
                other => panic!("expected SessionCreated, got {other:?}"),
            };

        let participant_id = match request(
            &player,
            server_addr,
            &Packet::Join {
                code: code.clone(),
                nickname: "Alice".to_string(),
            },
        )
        .await
        {
            Packet::Joined { participant_id, .. } => participant_id,
            other => panic!("expected Joined, got {other:?}"),
        };

        match request(
            &host,
            server_addr,
            &Packet::Start {
                code: code.clone(),
                host_token: host_token.clone(),
            },
        )
        .await
        {
            Packet::Started => {}
            other => panic!("expected Started, got {other:?}"),
        }

        match request(
            &player,
            server_addr,
            &Packet::Submit {
                code: code.clone(),
                participant_id,
                order: vec![1, 2, 3, 4],
            },
        )
        .await
        {
            Packet::SubmitResult {
                total_score,
                correct_count,
            } => {
                assert_eq!(total_score, 400);
                assert_eq!(correct_count, 4);
            }
            other => panic!("expected SubmitResult, got {other:?}"),
        }

        match request(&host, server_addr, &Packet::Finish { code, host_token }).await {
            Packet::Finished { leaderboard } => {
                assert_eq!(leaderboard.len(), 1);
                assert_eq!(leaderboard[0].score, 400);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_event_datagrams() {
        let (server_addr, _server) = spawn_server().await;
        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let watcher = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let (code, _host_token) =
            match request(&host, server_addr, &Packet::CreateSession { quiz_ref: 1 }).await {
                Packet::SessionCreated { code, host_token } => (code, host_token),
                other => panic!("expected SessionCreated, got {other:?}"),
            };

        match request(&watcher, server_addr, &Packet::Subscribe { code: code.clone() }).await {
            Packet::Subscribed => {}
            other => panic!("expected Subscribed, got {other:?}"),
        }

        request(
            &host,
            server_addr,
            &Packet::Join {
                code,
                nickname: "Bob".to_string(),
            },
        )
        .await;

        match recv_packet(&watcher).await {
            Packet::Event {
                event: GameEvent::ParticipantJoined { nickname, .. },
            } => assert_eq!(nickname, "Bob"),
            other => panic!("expected joined event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_session_yields_error_packet() {
        let (server_addr, _server) = spawn_server().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        match request(
            &socket,
            server_addr,
            &Packet::Join {
                code: "NOPE42".to_string(),
                nickname: "Alice".to_string(),
            },
        )
        .await
        {
            Packet::Error { code, .. } => assert_eq!(code, "session_not_found"),
            other => panic!("expected Error, got {other:?}"),
        }
    }
}
