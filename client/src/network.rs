use crate::combat_log::{CombatLog, CombatSink};
use crate::config::ClientConfig;
use crate::console::{self, Command};
use crate::error::ClientError;
use crate::state::ClientState;
use log::{debug, error, info, warn};
use shared::{
    decode, encode, Direction, Frame, Location, Mobile, MobileReason, Packet, MAX_DATAGRAM_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout_at, Instant};

/// Where a session is in its lifecycle. Only a full disconnect moves it back
/// to `Unauthenticated`, dropping the cached state.
#[derive(Debug)]
pub enum Session {
    Unauthenticated,
    Authenticated {
        player_id: u64,
        account: Mobile,
        unlocked: Location,
        location: Location,
    },
    Active(ClientState),
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: ClientConfig,
    session: Session,
    next_sequence: u32,
    combat_log: Box<dyn CombatSink + Send>,
}

impl Client {
    pub async fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let sink = Box::new(CombatLog::new(config.combat_log.clone()));
        Self::with_sink(config, sink).await
    }

    pub async fn with_sink(
        config: ClientConfig,
        combat_log: Box<dyn CombatSink + Send>,
    ) -> Result<Self, ClientError> {
        let server_addr: SocketAddr = config.server.parse()?;
        let bind = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind).await?;

        Ok(Client {
            socket,
            server_addr,
            config,
            session: Session::Unauthenticated,
            next_sequence: 0,
            combat_log,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> Option<&ClientState> {
        match &self.session {
            Session::Active(state) => Some(state),
            _ => None,
        }
    }

    pub fn state_mut(&mut self) -> Option<&mut ClientState> {
        match &mut self.session {
            Session::Active(state) => Some(state),
            _ => None,
        }
    }

    fn active_state(&self) -> Result<&ClientState, ClientError> {
        self.state().ok_or(ClientError::NotActive)
    }

    fn next_sequence(&mut self) -> u32 {
        self.next_sequence = self.next_sequence.wrapping_add(1);
        if self.next_sequence == 0 {
            self.next_sequence = 1;
        }
        self.next_sequence
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), ClientError> {
        let data = encode(frame)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Waits for the next well-formed frame from the server. Returns None
    /// once the deadline passes.
    async fn recv_frame(&self, deadline: Instant) -> Result<Option<Frame>, ClientError> {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, addr) = match timeout_at(deadline, self.socket.recv_from(&mut buffer)).await
            {
                Err(_) => return Ok(None),
                Ok(result) => result?,
            };

            if addr != self.server_addr {
                debug!("Ignoring datagram from {}", addr);
                continue;
            }

            match decode(&buffer[..len]) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => warn!("Dropping malformed datagram: {}", e),
            }
        }
    }

    /// Sends a request and waits for the response carrying its sequence.
    ///
    /// Pushes that arrive meanwhile are applied at once; responses to older
    /// requests are dropped. After `max_retries` re-sends without an answer
    /// the request fails with [`ClientError::Timeout`].
    pub async fn request(&mut self, packet: Packet) -> Result<Packet, ClientError> {
        let sequence = self.next_sequence();
        let frame = Frame::new(sequence, packet);
        let attempts = self.config.max_retries + 1;

        for attempt in 1..=attempts {
            self.send_frame(&frame).await?;
            let deadline = Instant::now() + self.config.request_timeout();

            while let Some(reply) = self.recv_frame(deadline).await? {
                if reply.is_push() {
                    self.apply_push(reply.packet);
                } else if reply.sequence == sequence {
                    return Ok(reply.packet);
                } else {
                    debug!("Dropping stale response {} (waiting for {})", reply.sequence, sequence);
                }
            }

            if attempt < attempts {
                warn!(
                    "{} request timed out, re-sending ({}/{})",
                    frame.packet.kind(),
                    attempt,
                    self.config.max_retries
                );
            }
        }

        Err(ClientError::Timeout { attempts })
    }

    /// Sends a request, applies the response and follows up on any request
    /// the response calls for.
    pub async fn send(&mut self, packet: Packet) -> Result<(), ClientError> {
        let mut next = Some(packet);
        while let Some(packet) = next {
            let response = self.request(packet).await?;
            next = self.dispatch(response)?;
        }
        Ok(())
    }

    fn apply_push(&mut self, packet: Packet) {
        debug!("Received {} push", packet.kind());
        match self.dispatch(packet) {
            Ok(Some(follow_up)) => debug!("Push asked for {}, skipped", follow_up.kind()),
            Ok(None) => {}
            Err(e) => warn!("Push could not be applied: {}", e),
        }
    }

    /// Applies one server packet to the session. Returns a follow-up request
    /// when the packet leaves the cache needing more data.
    fn dispatch(&mut self, packet: Packet) -> Result<Option<Packet>, ClientError> {
        match packet {
            Packet::GetNode {
                node: Some(node),
                unlocked,
                ..
            } => {
                match &mut self.session {
                    Session::Active(state) => {
                        state.unlock(unlocked);
                        state.set_region(node);
                    }
                    Session::Authenticated {
                        player_id, account, ..
                    } => {
                        let state = ClientState::new(*player_id, account.clone(), node, unlocked)
                            .ok_or(ClientError::Unexpected("GetNode"))?;
                        info!("Session active in {}", state.region().name());
                        self.session = Session::Active(state);
                    }
                    Session::Unauthenticated => return Err(ClientError::NotActive),
                }
                Ok(None)
            }

            Packet::GetNode { location, .. } => {
                warn!("Server sent no region for {}", location);
                Ok(None)
            }

            Packet::GetMobile { reason, payload, .. } => {
                let state = self.state_mut().ok_or(ClientError::NotActive)?;
                state.apply_mobile_update(reason, &payload);
                Ok(None)
            }

            Packet::GetLocalMobiles { mobiles, .. } => {
                let state = self.state_mut().ok_or(ClientError::NotActive)?;
                state.apply_local_mobiles(mobiles);
                Ok(None)
            }

            Packet::CombatMobile {
                is_alive, updates, ..
            } => match &mut self.session {
                Session::Active(state) => {
                    state.apply_combat_update(is_alive, updates.as_deref(), self.combat_log.as_mut());
                    Ok(None)
                }
                _ => Err(ClientError::NotActive),
            },

            Packet::Resurrect {
                player_id,
                location,
                success,
            } => {
                let state = self.state_mut().ok_or(ClientError::NotActive)?;
                Ok(state.apply_resurrection(player_id, location, success))
            }

            Packet::UseItem { response, .. } => {
                let state = self.state_mut().ok_or(ClientError::NotActive)?;
                state.apply_item_response(response);
                Ok(None)
            }

            Packet::Heartbeat { .. } => Ok(None),

            Packet::Rejected { reason } => Err(ClientError::Rejected(reason)),

            Packet::Disconnected { reason } => {
                info!("Disconnected: {}", reason);
                self.session = Session::Unauthenticated;
                Err(ClientError::Disconnected(reason))
            }

            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    /// Authenticates and fetches the starting region, leaving the session
    /// active.
    pub async fn login(&mut self) -> Result<(), ClientError> {
        info!("Logging in as player {}", self.config.player_id);

        let response = self
            .request(Packet::Authenticate {
                client_version: PROTOCOL_VERSION,
                player_id: self.config.player_id,
                name: self.config.name.clone(),
            })
            .await?;

        let location = match response {
            Packet::Authenticated {
                player_id,
                account,
                unlocked,
                location,
            } => {
                self.session = Session::Authenticated {
                    player_id,
                    account,
                    unlocked,
                    location,
                };
                location
            }
            Packet::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            Packet::Disconnected { reason } => return Err(ClientError::Disconnected(reason)),
            other => return Err(ClientError::Unexpected(other.kind())),
        };

        self.send(Packet::get_node(self.config.player_id, location))
            .await
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let player_id = self.active_state()?.player_id();
        match self.send(Packet::Logout { player_id }).await {
            Err(ClientError::Disconnected(_)) | Ok(()) => {
                self.session = Session::Unauthenticated;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn heartbeat(&mut self) -> Result<(), ClientError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64;
        self.send(Packet::Heartbeat { timestamp }).await
    }

    /// Runs one console command. Returns false when the session should end.
    pub async fn execute(&mut self, command: Command) -> Result<bool, ClientError> {
        let state = self.active_state()?;
        let player_id = state.player_id();

        match command {
            Command::Help => println!("{}", console::HELP),

            Command::Look => {
                let location = state.region().location();
                println!("{}", console::render_region(state.region(), state.unlocked()));
                self.send(Packet::get_node(player_id, location)).await?;
            }

            Command::Travel(token) => match state.resolve_region_token(&token) {
                None => println!("You cannot travel to '{}' from here.", token),
                Some(location) if location == state.region().location() => {
                    println!("You stay in {}.", location)
                }
                Some(location) => {
                    self.send(Packet::MoveMobile {
                        player_id,
                        destination: location,
                        direction: Direction::None,
                    })
                    .await?
                }
            },

            Command::Wander(token) => match state.resolve_direction_token(&token) {
                None => println!("You cannot wander '{}' here.", token),
                Some(direction) => {
                    self.send(Packet::MoveMobile {
                        player_id,
                        destination: Location::empty(),
                        direction,
                    })
                    .await?
                }
            },

            Command::Nearby => self.send(Packet::get_local_mobiles(player_id)).await?,

            Command::Attack(position) => {
                let target = position
                    .checked_sub(1)
                    .and_then(|i| state.nearby_mobiles().get(i))
                    .cloned();
                match target {
                    None => println!("There is no such target. Try 'nearby' first."),
                    Some(target) => {
                        let serial = target.serial;
                        if let Some(state) = self.state_mut() {
                            state.set_last_target(Some(target));
                        }
                        self.send(Packet::Attack {
                            player_id,
                            target: serial,
                        })
                        .await?;
                    }
                }
            }

            Command::Status => {
                let reason = MobileReason::PAPERDOLL | MobileReason::IS_DEAD;
                self.send(Packet::get_mobile(player_id, reason)).await?
            }

            Command::Items => {
                if state.inventory().is_none() {
                    self.send(Packet::get_mobile(player_id, MobileReason::ITEMS))
                        .await?;
                }
                if let Some(listing) = self.state().and_then(ClientState::inventory_listing) {
                    println!("{}", console::render_inventory(&listing));
                }
            }

            Command::Equipment => {
                self.send(Packet::get_mobile(player_id, MobileReason::EQUIPMENT))
                    .await?;
                if let Some(equipment) = self.state().and_then(ClientState::equipment) {
                    println!("{}", console::render_equipment(equipment));
                }
            }

            Command::Use(selection) => {
                let mut request = state.select_and_use_item(selection);
                if let Some(fetch @ Packet::GetMobile { .. }) = request {
                    self.send(fetch).await?;
                    request = self
                        .state()
                        .and_then(|state| state.select_and_use_item(selection));
                }
                match request {
                    Some(packet @ Packet::UseItem { .. }) => self.send(packet).await?,
                    _ => println!("You have no item at position {}.", selection),
                }
            }

            Command::Resurrect => {
                self.send(Packet::Resurrect {
                    player_id,
                    location: Location::empty(),
                    success: false,
                })
                .await?
            }

            Command::Quit => {
                self.logout().await?;
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn print_events(&mut self) {
        if let Some(state) = self.state_mut() {
            for event in state.drain_events() {
                println!("{}", console::render_event(&event));
            }
        }
    }

    /// Interactive session: logs in, then serves console commands, heartbeats
    /// and server pushes until the user quits or the server goes away.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        self.login().await?;
        self.print_events();
        println!("{}", console::HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut heartbeat = interval(self.config.heartbeat_interval());
        heartbeat.tick().await;

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        self.logout().await?;
                        break;
                    };
                    let Some(command) = Command::parse(&line) else {
                        if !line.trim().is_empty() {
                            println!("Unknown command. Type 'help' for a list.");
                        }
                        continue;
                    };

                    match self.execute(command).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(ClientError::Rejected(reason)) => println!("{}", reason),
                        Err(e) => return Err(e),
                    }
                    self.print_events();
                },

                _ = heartbeat.tick() => {
                    if let Err(e) = self.heartbeat().await {
                        error!("Heartbeat failed: {}", e);
                        return Err(e);
                    }
                },

                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => match decode(&buffer[..len]) {
                            Ok(frame) if frame.is_push() => {
                                self.apply_push(frame.packet);
                                self.print_events();
                            }
                            Ok(frame) => debug!("Dropping late response {}", frame.sequence),
                            Err(e) => warn!("Dropping malformed datagram: {}", e),
                        },
                        Ok(_) => {}
                        Err(e) => error!("Error receiving datagram: {}", e),
                    }
                },
            }

            if matches!(self.session, Session::Unauthenticated) {
                info!("Session ended");
                break;
            }
        }

        Ok(())
    }
}
