//! Session tracking for connected clients.
//!
//! A session is created the first time an address authenticates and is
//! bound to exactly one player id. Every later datagram from that address
//! refreshes the session; sessions that stay silent past the timeout are
//! dropped by the timeout checker.

use log::info;
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected address and the account it speaks for.
#[derive(Debug)]
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    pub player_id: u64,
    /// Last time we received any datagram from this client
    pub last_seen: Instant,
    /// Sequence and reply of the last answered request, replayed when the
    /// client retransmits it
    pub last_reply: Option<(u32, Packet)>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, player_id: u64) -> Self {
        Self {
            id,
            addr,
            player_id,
            last_seen: Instant::now(),
            last_reply: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Owns every live session and enforces the capacity limit.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Opens a session for `player_id` at `addr`.
    ///
    /// Returns None when the server is full. Any older session for the same
    /// address or the same player is closed first, so an account is never
    /// reachable through two addresses.
    pub fn add_client(&mut self, addr: SocketAddr, player_id: u64) -> Option<u32> {
        let stale: Vec<u32> = self
            .clients
            .values()
            .filter(|c| c.addr == addr || c.player_id == player_id)
            .map(|c| c.id)
            .collect();
        for client_id in &stale {
            self.remove_client(client_id);
        }

        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!(
            "Client {} connected from {} as player {}",
            client_id, addr, player_id
        );
        self.clients
            .insert(client_id, Client::new(client_id, addr, player_id));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} (player {}) disconnected", client.id, client.player_id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<&Client> {
        self.clients.values().find(|client| client.addr == addr)
    }

    /// Address of the session bound to `player_id`, used to route pushes.
    pub fn find_addr_by_player(&self, player_id: u64) -> Option<SocketAddr> {
        self.clients
            .values()
            .find(|client| client.player_id == player_id)
            .map(|client| client.addr)
    }

    /// Marks the session at `addr` as active. Returns its player id, or None
    /// when the address has no session.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<u64> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.touch();
        Some(client.player_id)
    }

    /// Records the reply sent for `sequence` on the session at `addr`.
    pub fn remember_reply(&mut self, addr: SocketAddr, sequence: u32, reply: Packet) {
        if let Some(client) = self.clients.values_mut().find(|c| c.addr == addr) {
            client.last_reply = Some((sequence, reply));
        }
    }

    /// The reply already sent for `sequence`, if that was the last request
    /// the session at `addr` answered.
    pub fn cached_reply(&self, addr: SocketAddr, sequence: u32) -> Option<Packet> {
        let client = self.find_client_by_addr(addr)?;
        match &client.last_reply {
            Some((answered, reply)) if *answered == sequence => Some(reply.clone()),
            _ => None,
        }
    }

    /// Drops every session silent for longer than the configured timeout and
    /// returns the player ids that went offline.
    pub fn check_timeouts(&mut self) -> Vec<u64> {
        let timed_out: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| self.remove_client(client_id))
            .map(|client| client.player_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), 7);
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client() {
        let mut manager = ClientManager::new(2, Duration::from_secs(5));
        assert!(manager.is_empty());

        let client_id = manager.add_client(test_addr(), 7).unwrap();
        assert_eq!(client_id, 1);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_client_by_addr(test_addr()).unwrap().player_id, 7);
        assert_eq!(manager.find_addr_by_player(7), Some(test_addr()));
    }

    #[test]
    fn test_cached_reply_matches_last_sequence_only() {
        let mut manager = ClientManager::new(2, Duration::from_secs(5));
        manager.add_client(test_addr(), 7).unwrap();
        assert!(manager.cached_reply(test_addr(), 3).is_none());

        let reply = Packet::UseItem {
            player_id: 7,
            item: 1,
            response: Some("You drink the Health Potion.".to_string()),
        };
        manager.remember_reply(test_addr(), 3, reply);
        assert!(matches!(
            manager.cached_reply(test_addr(), 3),
            Some(Packet::UseItem { item: 1, .. })
        ));
        assert!(manager.cached_reply(test_addr(), 4).is_none());
        assert!(manager.cached_reply(test_addr2(), 3).is_none());

        manager.remember_reply(test_addr(), 4, Packet::Heartbeat { timestamp: 1 });
        assert!(manager.cached_reply(test_addr(), 3).is_none());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1, Duration::from_secs(5));

        assert!(manager.add_client(test_addr(), 1).is_some());
        assert!(manager.add_client(test_addr2(), 2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_reauthenticating_replaces_old_session() {
        let mut manager = ClientManager::new(4, Duration::from_secs(5));

        manager.add_client(test_addr(), 1).unwrap();
        manager.add_client(test_addr(), 2).unwrap();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_addr_by_player(1), None);

        manager.add_client(test_addr2(), 2).unwrap();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_addr_by_player(2), Some(test_addr2()));
        assert!(manager.find_client_by_addr(test_addr()).is_none());
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2, Duration::from_secs(5));
        let client_id = manager.add_client(test_addr(), 3).unwrap();

        assert_eq!(manager.remove_client(&client_id).map(|c| c.player_id), Some(3));
        assert!(manager.remove_client(&client_id).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_touch_unknown_address() {
        let mut manager = ClientManager::new(2, Duration::from_secs(5));
        assert_eq!(manager.touch(test_addr()), None);

        manager.add_client(test_addr(), 9).unwrap();
        assert_eq!(manager.touch(test_addr()), Some(9));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2, Duration::from_millis(100));
        let stale = manager.add_client(test_addr(), 1).unwrap();
        manager.add_client(test_addr2(), 2).unwrap();

        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(1);

        assert_eq!(manager.check_timeouts(), vec![1]);
        assert_eq!(manager.len(), 1);
        assert!(manager.check_timeouts().is_empty());
    }
}
