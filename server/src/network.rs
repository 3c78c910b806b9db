//! Server network layer handling UDP communications and the event loop

use crate::client_manager::ClientManager;
use crate::combat::SwingCombat;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::{Dispatch, GameState};
use crate::spawner::Spawner;
use crate::store::BlobStore;
use crate::world::WorldMap;
use log::{debug, error, info, warn};
use shared::{
    decode, encode, is_player_id, Frame, Packet, World, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    FrameReceived { frame: Frame, addr: SocketAddr },
    ClientTimeout { player_id: u64 },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendFrame { frame: Frame, addr: SocketAddr },
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    world: Arc<WorldMap>,
    spawner: Arc<Spawner>,
    tick_duration: Duration,
    ticks_per_spawn: u64,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        config: &ServerConfig,
        world: World,
        store: Box<dyn BlobStore>,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let world = Arc::new(WorldMap::new(world));
        let spawner = Arc::new(Spawner::new(config.max_npcs_per_node));
        let game_state = GameState::new(
            Arc::clone(&world),
            Arc::clone(&spawner),
            store,
            Box::new(SwingCombat),
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.session_timeout(),
            ))),
            game_state,
            world,
            spawner,
            tick_duration: config.tick_duration(),
            ticks_per_spawn: config.ticks_per_spawn(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Binds a server over the built-in Britannia map.
    pub async fn with_default_world(
        config: &ServerConfig,
        store: Box<dyn BlobStore>,
    ) -> Result<Self, ServerError> {
        let world = World::britannia()?;
        Self::new(config, world, store).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sender that can stop a running server with [`ServerMessage::Shutdown`].
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(frame) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::FrameReceived { frame, addr })
                            {
                                error!("Failed to send frame to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that drains the outgoing frame queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(GameMessage::SendFrame { frame, addr }) = game_rx.recv().await {
                if let Err(e) = Self::send_frame_impl(&socket, &frame, addr).await {
                    error!("Failed to send {} to {}: {}", frame.packet.kind(), addr, e);
                }
            }
        });
    }

    /// Spawns task that monitors session timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for player_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { player_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn send_frame_impl(
        socket: &UdpSocket,
        frame: &Frame,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = encode(frame)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_frame(&self, frame: Frame, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendFrame { frame, addr }) {
            error!("Failed to queue frame for sending: {}", e);
        }
    }

    fn reply(&self, sequence: u32, packet: Packet, addr: SocketAddr) {
        self.send_frame(Frame::new(sequence, packet), addr);
    }

    fn reject(&self, sequence: u32, reason: &str, addr: SocketAddr) {
        self.reply(
            sequence,
            Packet::Rejected {
                reason: reason.to_string(),
            },
            addr,
        );
    }

    async fn deliver(&mut self, sequence: u32, dispatch: Dispatch, addr: SocketAddr) {
        if let Some(packet) = dispatch.reply {
            self.clients
                .write()
                .await
                .remember_reply(addr, sequence, packet.clone());
            self.reply(sequence, packet, addr);
        }

        if dispatch.pushes.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for (player_id, packet) in dispatch.pushes {
            match clients.find_addr_by_player(player_id) {
                Some(target) => self.send_frame(Frame::push(packet), target),
                None => debug!("Player {} is offline, dropping push", player_id),
            }
        }
    }

    /// Processes one incoming frame
    async fn handle_frame(&mut self, frame: Frame, addr: SocketAddr) {
        let sequence = frame.sequence;

        match frame.packet {
            Packet::Authenticate {
                client_version,
                player_id,
                name,
            } => {
                info!(
                    "Player {} authenticating from {} (version: {})",
                    player_id, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.reject(sequence, "Protocol version mismatch", addr);
                    return;
                }

                if !is_player_id(player_id) {
                    warn!("Rejecting reserved player id {} from {}", player_id, addr);
                    self.reject(sequence, "Invalid player id", addr);
                    return;
                }

                let previous = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr).map(|c| c.player_id)
                };
                if let Some(previous) = previous.filter(|p| *p != player_id) {
                    self.game_state.logout(previous).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, player_id)
                };

                match client_id {
                    Some(_) => {
                        let response = self.game_state.login(player_id, &name).await;
                        self.reply(sequence, response, addr);
                    }
                    None => self.reply(
                        sequence,
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    ),
                }
            }

            Packet::Heartbeat { timestamp } => {
                let session = self.clients.write().await.touch(addr);
                match session {
                    Some(_) => self.reply(sequence, Packet::Heartbeat { timestamp }, addr),
                    None => self.reject(sequence, "Not authenticated", addr),
                }
            }

            packet => {
                let session = self.clients.write().await.touch(addr);
                let Some(player_id) = session else {
                    self.reject(sequence, "Not authenticated", addr);
                    return;
                };

                let cached = self.clients.read().await.cached_reply(addr, sequence);
                if let Some(reply) = cached {
                    debug!("Replaying reply {} to {}", sequence, addr);
                    self.reply(sequence, reply, addr);
                    return;
                }

                if packet.player_id() != Some(player_id) {
                    warn!(
                        "{} from {} claims player {:?}, session is {}",
                        packet.kind(),
                        addr,
                        packet.player_id(),
                        player_id
                    );
                    self.reject(sequence, "Player id does not match session", addr);
                    return;
                }

                let logging_out = matches!(packet, Packet::Logout { .. });
                let dispatch = self.game_state.handle_request(player_id, packet).await;
                self.deliver(sequence, dispatch, addr).await;

                if logging_out {
                    let mut clients = self.clients.write().await;
                    let client_id = clients.find_client_by_addr(addr).map(|c| c.id);
                    if let Some(client_id) = client_id {
                        clients.remove_client(&client_id);
                    }
                }
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);

        info!(
            "Server started with {} regions, {} spawnable",
            self.world.len(),
            self.world.spawnable_locations().len()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::FrameReceived { frame, addr }) => {
                            self.handle_frame(frame, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { player_id }) => {
                            info!("Player {} timed out", player_id);
                            self.game_state.logout(player_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.game_state.tick += 1;

                    if self.game_state.tick % self.ticks_per_spawn == 0 {
                        let spawned = self.spawner.populate(&self.world).await;
                        if spawned > 0 {
                            debug!("Spawn pass created {} creatures", spawned);
                        }
                    }

                    if self.game_state.tick % 600 == 0 {
                        let client_count = self.clients.read().await.len();
                        debug!(
                            "Tick {}: {} sessions, {} players online",
                            self.game_state.tick,
                            client_count,
                            self.game_state.online_count()
                        );
                    }
                },
            }
        }

        let saved = self.game_state.logout_all().await;
        info!("Saved {} players on shutdown", saved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use shared::{Location, MobileReason};
    use tokio::time::timeout;

    async fn start() -> (SocketAddr, mpsc::UnboundedSender<ServerMessage>) {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let store = Box::new(SqliteStore::open_in_memory().unwrap());
        let mut server = Server::with_default_world(&config, store).await.unwrap();
        let addr = server.local_addr().unwrap();
        let control = server.control();
        tokio::spawn(async move { server.run().await });
        (addr, control)
    }

    async fn exchange(socket: &UdpSocket, server: SocketAddr, frame: Frame) -> Frame {
        socket.send_to(&encode(&frame).unwrap(), server).await.unwrap();
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        decode(&buffer[..len]).unwrap()
    }

    fn authenticate(player_id: u64) -> Packet {
        Packet::Authenticate {
            client_version: PROTOCOL_VERSION,
            player_id,
            name: "Dupre".to_string(),
        }
    }

    #[tokio::test]
    async fn test_request_before_authentication_is_rejected() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(&socket, server, Frame::new(3, Packet::get_node(1, Location::BRITAIN))).await;
        assert_eq!(reply.sequence, 3);
        assert!(matches!(reply.packet, Packet::Rejected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_then_query() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(&socket, server, Frame::new(1, authenticate(11))).await;
        assert_eq!(reply.sequence, 1);
        match reply.packet {
            Packet::Authenticated { player_id, location, .. } => {
                assert_eq!(player_id, 11);
                assert_eq!(location, Location::BRITAIN);
            }
            other => panic!("Unexpected packet: {:?}", other),
        }

        let reply = exchange(
            &socket,
            server,
            Frame::new(2, Packet::get_mobile(11, MobileReason::PAPERDOLL)),
        )
        .await;
        assert_eq!(reply.sequence, 2);
        match reply.packet {
            Packet::GetMobile { payload, .. } => {
                assert!(payload.paperdoll.unwrap().contains("Dupre"));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_player_id_is_rejected() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        exchange(&socket, server, Frame::new(1, authenticate(11))).await;
        let reply = exchange(&socket, server, Frame::new(2, Packet::get_local_mobiles(12))).await;
        assert!(matches!(reply.packet, Packet::Rejected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_version_mismatch_is_rejected() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(
            &socket,
            server,
            Frame::new(
                1,
                Packet::Authenticate {
                    client_version: PROTOCOL_VERSION + 1,
                    player_id: 1,
                    name: "Dupre".to_string(),
                },
            ),
        )
        .await;
        assert!(matches!(reply.packet, Packet::Rejected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_is_echoed() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        exchange(&socket, server, Frame::new(1, authenticate(4))).await;
        let reply = exchange(&socket, server, Frame::new(2, Packet::Heartbeat { timestamp: 99 })).await;
        assert!(matches!(reply.packet, Packet::Heartbeat { timestamp: 99 }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_reserved_player_ids_are_rejected() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        for (sequence, player_id) in [(1, 0), (2, shared::NPC_SERIAL_BASE)] {
            let reply = exchange(&socket, server, Frame::new(sequence, authenticate(player_id))).await;
            assert_eq!(reply.sequence, sequence);
            assert!(matches!(reply.packet, Packet::Rejected { .. }));
        }

        let reply = exchange(&socket, server, Frame::new(3, Packet::get_local_mobiles(0))).await;
        assert!(matches!(reply.packet, Packet::Rejected { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_retransmitted_request_is_applied_once() {
        let (server, control) = start().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        exchange(&socket, server, Frame::new(1, authenticate(21))).await;

        let first = exchange(&socket, server, Frame::new(2, Packet::use_item(21, 1))).await;
        let again = exchange(&socket, server, Frame::new(2, Packet::use_item(21, 1))).await;
        for reply in [&first, &again] {
            assert_eq!(reply.sequence, 2);
            assert!(matches!(&reply.packet, Packet::UseItem { response: Some(text), .. }
                if text.contains("Health Potion")));
        }

        let reply = exchange(
            &socket,
            server,
            Frame::new(3, Packet::get_mobile(21, MobileReason::ITEMS)),
        )
        .await;
        match reply.packet {
            Packet::GetMobile { payload, .. } => {
                let items = payload.items.unwrap();
                assert_eq!(items.get(&1).map(String::as_str), Some("Health Potion (2)"));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn test_game_tick_drives_spawn_passes() {
        let config = ServerConfig {
            port: 0,
            tick_rate: 20,
            spawn_interval: 1,
            max_npcs_per_node: 2,
            ..ServerConfig::default()
        };
        let store = Box::new(SqliteStore::open_in_memory().unwrap());
        let mut server = Server::with_default_world(&config, store).await.unwrap();
        let addr = server.local_addr().unwrap();
        let control = server.control();
        tokio::spawn(async move { server.run().await });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        exchange(&socket, addr, Frame::new(1, authenticate(8))).await;
        exchange(
            &socket,
            addr,
            Frame::new(
                2,
                Packet::MoveMobile {
                    player_id: 8,
                    destination: Location::GRAVEYARD,
                    direction: shared::Direction::None,
                },
            ),
        )
        .await;

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let reply = exchange(&socket, addr, Frame::new(3, Packet::get_local_mobiles(8))).await;
        match reply.packet {
            Packet::GetLocalMobiles {
                mobiles: Some(mobiles),
                ..
            } => {
                let creatures = mobiles.iter().filter(|m| !m.is_player()).count();
                assert!(creatures >= 1 && creatures <= 2);
            }
            other => panic!("Unexpected packet: {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
    }
}
