//! Authoritative request resolution.
//!
//! The game state owns the records of every online player and answers each
//! request against the shared [`WorldMap`]. Records are loaded from the blob
//! store on login and written back on logout.

use crate::combat::CombatResolver;
use crate::spawner::Spawner;
use crate::store::{self, BlobStore};
use crate::world::WorldMap;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    is_player_id, Direction, Location, Mobile, MobilePayload, MobileReason, Packet, Serial,
    STARTING_LOCATION,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEffect {
    Heal(i32),
    Inert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub effect: ItemEffect,
    pub charges: u32,
}

impl Item {
    pub fn health_potions(charges: u32) -> Self {
        Self {
            name: "Health Potion".to_string(),
            effect: ItemEffect::Heal(33),
            charges,
        }
    }

    pub fn label(&self) -> String {
        if self.charges > 1 {
            format!("{} ({})", self.name, self.charges)
        } else {
            self.name.clone()
        }
    }
}

/// Everything the server keeps about one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: u64,
    pub mobile: Mobile,
    pub unlocked: Location,
    pub items: BTreeMap<u32, Item>,
    pub equipment: BTreeMap<u32, String>,
    pub kills: u32,
}

impl PlayerRecord {
    pub fn new(player_id: u64, name: &str) -> Self {
        let mut items = BTreeMap::new();
        items.insert(1, Item::health_potions(3));
        items.insert(
            2,
            Item {
                name: "Torch".to_string(),
                effect: ItemEffect::Inert,
                charges: 1,
            },
        );

        let mut equipment = BTreeMap::new();
        equipment.insert(1, "Iron Longsword".to_string());
        equipment.insert(2, "Kite Shield".to_string());

        Self {
            player_id,
            mobile: Mobile::player(player_id, name, STARTING_LOCATION),
            unlocked: Location::BASIC,
            items,
            equipment,
            kills: 0,
        }
    }

    pub fn location(&self) -> Location {
        self.mobile.location
    }

    pub fn paperdoll(&self) -> String {
        let equipped: Vec<&str> = self.equipment.values().map(String::as_str).collect();
        format!(
            "{}\n  Hits: {}/{}\n  Attack: {}\n  Location: {}\n  Kills: {}\n  Equipped: {}",
            self.mobile.name,
            self.mobile.hits,
            self.mobile.hits_max,
            self.mobile.attack,
            self.location(),
            self.kills,
            if equipped.is_empty() {
                "nothing".to_string()
            } else {
                equipped.join(", ")
            }
        )
    }

    pub fn item_labels(&self) -> BTreeMap<u32, String> {
        self.items
            .iter()
            .map(|(slot, item)| (*slot, item.label()))
            .collect()
    }
}

/// Result of handling one request: an optional reply to the sender and
/// unsolicited packets for other players.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub reply: Option<Packet>,
    pub pushes: Vec<(u64, Packet)>,
}

impl Dispatch {
    pub fn reply(packet: Packet) -> Self {
        Self {
            reply: Some(packet),
            pushes: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    fn rejected(reason: &str) -> Self {
        Self::reply(Packet::Rejected {
            reason: reason.to_string(),
        })
    }
}

pub struct GameState {
    pub tick: u64,
    world: Arc<WorldMap>,
    spawner: Arc<Spawner>,
    store: Box<dyn BlobStore>,
    combat: Box<dyn CombatResolver>,
    players: HashMap<u64, PlayerRecord>,
}

impl GameState {
    pub fn new(
        world: Arc<WorldMap>,
        spawner: Arc<Spawner>,
        store: Box<dyn BlobStore>,
        combat: Box<dyn CombatResolver>,
    ) -> Self {
        Self {
            tick: 0,
            world,
            spawner,
            store,
            combat,
            players: HashMap::new(),
        }
    }

    pub fn world(&self) -> &Arc<WorldMap> {
        &self.world
    }

    pub fn record(&self, player_id: u64) -> Option<&PlayerRecord> {
        self.players.get(&player_id)
    }

    pub fn online_count(&self) -> usize {
        self.players.len()
    }

    /// Brings an account online, loading it from the store or creating it.
    pub async fn login(&mut self, player_id: u64, name: &str) -> Packet {
        if !is_player_id(player_id) {
            warn!("Refusing login for reserved id {}", player_id);
            return Packet::Rejected {
                reason: "Invalid player id".to_string(),
            };
        }

        if !self.players.contains_key(&player_id) {
            let mut record = self.load_or_create(player_id, name);
            let location = if self.world.contains(record.location()) {
                record.location()
            } else {
                warn!(
                    "Player {} was stored in unknown region {:#x}",
                    player_id,
                    record.location().bits()
                );
                STARTING_LOCATION
            };
            record.mobile.location = location;
            if let Err(e) = self.world.add_mobile(location, record.mobile.clone()).await {
                error!("Failed to place player {}: {}", player_id, e);
            }

            info!("Player {} ({}) entered {}", player_id, record.mobile.name, location);
            self.players.insert(player_id, record);
        }

        match self.players.get(&player_id) {
            Some(record) => Packet::Authenticated {
                player_id,
                account: record.mobile.clone(),
                unlocked: record.unlocked,
                location: record.location(),
            },
            None => Packet::Rejected {
                reason: "Account unavailable".to_string(),
            },
        }
    }

    fn load_or_create(&self, player_id: u64, name: &str) -> PlayerRecord {
        match store::load::<PlayerRecord>(self.store.as_ref(), player_id) {
            Ok(Some(record)) => return record,
            Ok(None) => info!("Creating account {} for {}", player_id, name),
            Err(e) => warn!("Could not load account {}: {}, starting fresh", player_id, e),
        }

        let record = PlayerRecord::new(player_id, name);
        self.persist(&record);
        record
    }

    fn persist(&self, record: &PlayerRecord) {
        if let Err(e) = store::save(self.store.as_ref(), record.player_id, record) {
            error!("Failed to persist player {}: {}", record.player_id, e);
        }
    }

    /// Takes an account offline and writes it back to the store.
    pub async fn logout(&mut self, player_id: u64) -> bool {
        match self.players.remove(&player_id) {
            Some(record) => {
                self.world.remove_mobile(record.location(), &record.mobile).await;
                self.persist(&record);
                info!("Player {} left the world", player_id);
                true
            }
            None => false,
        }
    }

    pub async fn logout_all(&mut self) -> usize {
        let online: Vec<u64> = self.players.keys().copied().collect();
        for player_id in &online {
            self.logout(*player_id).await;
        }
        online.len()
    }

    pub async fn handle_request(&mut self, player_id: u64, packet: Packet) -> Dispatch {
        if !self.players.contains_key(&player_id) {
            return Dispatch::rejected("Not authenticated");
        }

        match packet {
            Packet::GetNode { location, .. } => self.get_node(player_id, location).await,
            Packet::GetMobile { reason, .. } => self.get_mobile(player_id, reason).await,
            Packet::GetLocalMobiles { .. } => self.local_mobiles(player_id).await,
            Packet::MoveMobile {
                destination,
                direction,
                ..
            } => self.move_mobile(player_id, destination, direction).await,
            Packet::Attack { target, .. } => self.attack(player_id, target).await,
            Packet::Resurrect { .. } => self.resurrect(player_id).await,
            Packet::UseItem { item, .. } => self.use_item(player_id, item).await,
            Packet::Logout { .. } => {
                self.logout(player_id).await;
                Dispatch::reply(Packet::Disconnected {
                    reason: "Logged out".to_string(),
                })
            }
            other => {
                warn!("Player {} sent unexpected {} packet", player_id, other.kind());
                Dispatch::rejected("Unexpected packet")
            }
        }
    }

    async fn get_node(&self, player_id: u64, location: Location) -> Dispatch {
        let unlocked = self
            .players
            .get(&player_id)
            .map(|r| r.unlocked)
            .unwrap_or_else(Location::empty);

        match self.world.snapshot(location).await {
            Some(node) => Dispatch::reply(Packet::GetNode {
                player_id,
                location,
                node: Some(node),
                unlocked,
            }),
            None => Dispatch::rejected("No such region"),
        }
    }

    async fn get_mobile(&self, player_id: u64, reason: MobileReason) -> Dispatch {
        let Some(record) = self.players.get(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };

        let mut payload = MobilePayload::default();
        for part in reason.decompose() {
            if part == MobileReason::PAPERDOLL {
                payload.paperdoll = Some(record.paperdoll());
            } else if part == MobileReason::LOCATION {
                payload.region = self.world.snapshot(record.location()).await;
            } else if part == MobileReason::IS_DEAD {
                payload.is_alive = Some(record.mobile.is_alive());
            } else if part == MobileReason::ITEMS {
                payload.items = Some(record.item_labels());
            } else if part == MobileReason::EQUIPMENT {
                payload.equipment = Some(record.equipment.clone());
            }
        }

        Dispatch::reply(Packet::GetMobile {
            player_id,
            reason: reason & MobileReason::all(),
            payload,
        })
    }

    async fn local_mobiles(&self, player_id: u64) -> Dispatch {
        let Some(record) = self.players.get(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };

        let mobiles = self
            .world
            .mobiles(record.location())
            .await
            .into_iter()
            .filter(|m| m.serial != record.mobile.serial)
            .collect();

        Dispatch::reply(Packet::GetLocalMobiles {
            player_id,
            mobiles: Some(mobiles),
        })
    }

    async fn move_mobile(
        &mut self,
        player_id: u64,
        destination: Location,
        direction: Direction,
    ) -> Dispatch {
        let Some(record) = self.players.get(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };
        let here = record.location();

        if destination.is_empty() || destination == here {
            if direction == Direction::None {
                return Dispatch::rejected("Nowhere to go");
            }

            let traversable = match self.world.snapshot(here).await {
                Some(node) => node.can_traverse(),
                None => false,
            };
            if !traversable {
                return Dispatch::rejected("You cannot wander here");
            }

            // Wandering may stir up a new creature.
            self.spawner.spawn_one(&self.world, here).await;
            return self.local_mobiles(player_id).await;
        }

        let connected = match self.world.connections(here).await {
            Some(connections) => connections.contains(&destination),
            None => false,
        };
        if !connected {
            return Dispatch::rejected("That region is not connected to yours");
        }

        let Some(record) = self.players.get_mut(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };
        record.mobile.location = destination;
        record.unlocked |= destination;
        let mobile = record.mobile.clone();
        let unlocked = record.unlocked;

        if let Err(e) = self.world.move_mobile(here, destination, mobile).await {
            warn!("Move of player {} failed: {}", player_id, e);
            return Dispatch::rejected("Move failed");
        }

        info!("Player {} travelled {} -> {}", player_id, here, destination);
        match self.world.snapshot(destination).await {
            Some(node) => Dispatch::reply(Packet::GetNode {
                player_id,
                location: destination,
                node: Some(node),
                unlocked,
            }),
            None => Dispatch::rejected("No such region"),
        }
    }

    async fn attack(&mut self, player_id: u64, target: Serial) -> Dispatch {
        let Some(mut attacker) = self.players.remove(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };
        let here = attacker.location();

        let dispatch = match self.world.find_mobile(here, target).await {
            None => Dispatch::rejected("Your target is not here"),
            Some(defender) if defender.serial == attacker.mobile.serial => {
                Dispatch::rejected("You cannot attack yourself")
            }
            Some(defender) if defender.is_player() => {
                self.attack_player(&mut attacker, defender.serial).await
            }
            Some(mut defender) => {
                let updates = self.combat.exchange(&mut attacker.mobile, &mut defender);
                if defender.is_alive() {
                    self.world.update_mobile(here, defender).await;
                } else {
                    self.world.remove_mobile(here, &defender).await;
                    attacker.kills += 1;
                }
                self.world.update_mobile(here, attacker.mobile.clone()).await;

                Dispatch::reply(Packet::CombatMobile {
                    player_id,
                    is_alive: attacker.mobile.is_alive(),
                    updates: Some(updates),
                })
            }
        };

        self.players.insert(player_id, attacker);
        dispatch
    }

    async fn attack_player(&mut self, attacker: &mut PlayerRecord, target: u64) -> Dispatch {
        let here = attacker.location();
        let pvp = match self.world.snapshot(here).await {
            Some(node) => node.is_pvp(),
            None => false,
        };
        if !pvp {
            return Dispatch::rejected("You cannot attack players here");
        }

        let Some(defender) = self.players.get_mut(&target) else {
            return Dispatch::rejected("Your target is not here");
        };

        let updates = self.combat.exchange(&mut attacker.mobile, &mut defender.mobile);
        if !defender.mobile.is_alive() {
            attacker.kills += 1;
        }
        let defender_mobile = defender.mobile.clone();
        let defender_alive = defender_mobile.is_alive();

        self.world.update_mobile(here, defender_mobile).await;
        self.world.update_mobile(here, attacker.mobile.clone()).await;

        Dispatch {
            reply: Some(Packet::CombatMobile {
                player_id: attacker.player_id,
                is_alive: attacker.mobile.is_alive(),
                updates: Some(updates.clone()),
            }),
            pushes: vec![(
                target,
                Packet::CombatMobile {
                    player_id: target,
                    is_alive: defender_alive,
                    updates: Some(updates),
                },
            )],
        }
    }

    async fn resurrect(&mut self, player_id: u64) -> Dispatch {
        let Some(record) = self.players.get_mut(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };

        if record.mobile.is_alive() {
            return Dispatch::reply(Packet::Resurrect {
                player_id,
                location: record.location(),
                success: false,
            });
        }

        let from = record.location();
        record.mobile.hits = record.mobile.hits_max;
        record.mobile.location = STARTING_LOCATION;
        let mobile = record.mobile.clone();

        if let Err(e) = self.world.move_mobile(from, STARTING_LOCATION, mobile).await {
            error!("Resurrection of player {} failed: {}", player_id, e);
        }

        info!("Player {} was resurrected in {}", player_id, STARTING_LOCATION);
        Dispatch::reply(Packet::Resurrect {
            player_id,
            location: STARTING_LOCATION,
            success: true,
        })
    }

    async fn use_item(&mut self, player_id: u64, slot: u32) -> Dispatch {
        let Some(record) = self.players.get_mut(&player_id) else {
            return Dispatch::rejected("Not authenticated");
        };

        let response = if !record.mobile.is_alive() {
            "You cannot do that while dead.".to_string()
        } else {
            match record.items.get_mut(&slot) {
                None => "That item is no longer in your pack.".to_string(),
                Some(item) => match item.effect {
                    ItemEffect::Heal(amount) => {
                        let before = record.mobile.hits;
                        record.mobile.heal(amount);
                        let name = item.name.clone();
                        item.charges = item.charges.saturating_sub(1);
                        if item.charges == 0 {
                            record.items.remove(&slot);
                        }
                        format!(
                            "You drink the {} and recover {} hits.",
                            name,
                            record.mobile.hits - before
                        )
                    }
                    ItemEffect::Inert => format!("The {} does nothing.", item.name),
                },
            }
        };

        let mobile = record.mobile.clone();
        self.world.update_mobile(mobile.location, mobile).await;

        Dispatch::reply(Packet::UseItem {
            player_id,
            item: slot,
            response: Some(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::SwingCombat;
    use crate::store::SqliteStore;
    use shared::{World, NPC_SERIAL_BASE};

    fn game() -> GameState {
        let world = Arc::new(WorldMap::new(World::britannia().unwrap()));
        GameState::new(
            world,
            Arc::new(Spawner::new(4)),
            Box::new(SqliteStore::open_in_memory().unwrap()),
            Box::new(SwingCombat),
        )
    }

    async fn online(game: &mut GameState, player_id: u64) {
        match game.login(player_id, "Avatar").await {
            Packet::Authenticated { location, .. } => assert_eq!(location, STARTING_LOCATION),
            other => panic!("Unexpected login response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_creates_account_in_starting_region() {
        let mut game = game();
        match game.login(42, "Avatar").await {
            Packet::Authenticated {
                player_id,
                account,
                unlocked,
                location,
            } => {
                assert_eq!(player_id, 42);
                assert!(account.is_player());
                assert_eq!(unlocked, Location::BASIC);
                assert_eq!(location, Location::BRITAIN);
            }
            other => panic!("Unexpected login response: {:?}", other),
        }
        assert!(game.world().find_mobile(Location::BRITAIN, 42).await.is_some());
        assert_eq!(game.online_count(), 1);
    }

    #[tokio::test]
    async fn test_reserved_ids_cannot_log_in() {
        let mut game = game();
        let creature = game
            .spawner
            .spawn_one(&game.world, Location::GRAVEYARD)
            .await
            .unwrap();

        for player_id in [0, creature.serial] {
            assert!(matches!(
                game.login(player_id, "Impostor").await,
                Packet::Rejected { .. }
            ));
        }

        assert_eq!(game.online_count(), 0);
        assert_eq!(game.world().npc_count(Location::GRAVEYARD).await, 1);
        assert!(game
            .world()
            .find_mobile(Location::GRAVEYARD, creature.serial)
            .await
            .is_some_and(|m| !m.is_player()));
    }

    #[tokio::test]
    async fn test_requests_before_login_are_rejected() {
        let mut game = game();
        let dispatch = game
            .handle_request(9, Packet::get_node(9, Location::BRITAIN))
            .await;
        assert!(matches!(dispatch.reply, Some(Packet::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_get_mobile_fills_only_requested_fields() {
        let mut game = game();
        online(&mut game, 1).await;

        let reason = MobileReason::ITEMS | MobileReason::IS_DEAD;
        let dispatch = game
            .handle_request(1, Packet::get_mobile(1, reason))
            .await;

        match dispatch.reply {
            Some(Packet::GetMobile {
                reason: echoed,
                payload,
                ..
            }) => {
                assert_eq!(echoed, reason);
                assert_eq!(payload.is_alive, Some(true));
                assert_eq!(
                    payload.items.unwrap().get(&1).map(String::as_str),
                    Some("Health Potion (3)")
                );
                assert!(payload.paperdoll.is_none());
                assert!(payload.region.is_none());
                assert!(payload.equipment.is_none());
            }
            other => panic!("Unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_move_along_connection_unlocks_destination() {
        let mut game = game();
        online(&mut game, 1).await;

        let dispatch = game
            .handle_request(
                1,
                Packet::MoveMobile {
                    player_id: 1,
                    destination: Location::MOONGATE,
                    direction: Direction::None,
                },
            )
            .await;

        match dispatch.reply {
            Some(Packet::GetNode {
                node: Some(node),
                unlocked,
                ..
            }) => {
                assert_eq!(node.location(), Location::MOONGATE);
                assert!(unlocked.contains(Location::MOONGATE | Location::BASIC));
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        assert!(game.world().find_mobile(Location::BRITAIN, 1).await.is_none());
        assert!(game.world().find_mobile(Location::MOONGATE, 1).await.is_some());
    }

    #[tokio::test]
    async fn test_move_to_unconnected_region_is_rejected() {
        let mut game = game();
        online(&mut game, 1).await;

        let dispatch = game
            .handle_request(
                1,
                Packet::MoveMobile {
                    player_id: 1,
                    destination: Location::DESTARD,
                    direction: Direction::None,
                },
            )
            .await;

        assert!(matches!(dispatch.reply, Some(Packet::Rejected { .. })));
        assert_eq!(game.record(1).unwrap().location(), Location::BRITAIN);
    }

    #[tokio::test]
    async fn test_wandering_needs_traversable_region() {
        let mut game = game();
        online(&mut game, 1).await;

        let wander = Packet::MoveMobile {
            player_id: 1,
            destination: Location::empty(),
            direction: Direction::North,
        };
        let dispatch = game.handle_request(1, wander.clone()).await;
        assert!(matches!(dispatch.reply, Some(Packet::Rejected { .. })));

        game.handle_request(
            1,
            Packet::MoveMobile {
                player_id: 1,
                destination: Location::SEWERS,
                direction: Direction::None,
            },
        )
        .await;

        let dispatch = game.handle_request(1, wander).await;
        match dispatch.reply {
            Some(Packet::GetLocalMobiles {
                mobiles: Some(mobiles),
                ..
            }) => {
                assert_eq!(mobiles.len(), 1);
                assert!(mobiles.iter().all(|m| !m.is_player()));
            }
            other => panic!("Unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_attack_creature_produces_combat_log() {
        let mut game = game();
        online(&mut game, 1).await;
        game.handle_request(
            1,
            Packet::MoveMobile {
                player_id: 1,
                destination: Location::SEWERS,
                direction: Direction::None,
            },
        )
        .await;

        let rat = Mobile::npc(NPC_SERIAL_BASE + 77, "Rat", Location::SEWERS, 1, 1);
        game.world()
            .add_mobile(Location::SEWERS, rat.clone())
            .await
            .unwrap();

        let dispatch = game
            .handle_request(
                1,
                Packet::Attack {
                    player_id: 1,
                    target: rat.serial,
                },
            )
            .await;

        match dispatch.reply {
            Some(Packet::CombatMobile {
                is_alive, updates, ..
            }) => {
                assert!(is_alive);
                assert!(!updates.unwrap().is_empty());
            }
            other => panic!("Unexpected response: {:?}", other),
        }
        assert!(game.world().find_mobile(Location::SEWERS, rat.serial).await.is_none());
        assert_eq!(game.record(1).unwrap().kills, 1);
        assert!(dispatch.pushes.is_empty());
    }

    #[tokio::test]
    async fn test_player_attack_pushes_to_victim_in_pvp_region() {
        let mut game = game();
        online(&mut game, 1).await;
        online(&mut game, 2).await;

        let attack = Packet::Attack {
            player_id: 1,
            target: 2,
        };
        let dispatch = game.handle_request(1, attack.clone()).await;
        assert!(matches!(dispatch.reply, Some(Packet::Rejected { .. })));

        for player_id in [1, 2] {
            game.handle_request(
                player_id,
                Packet::MoveMobile {
                    player_id,
                    destination: Location::GRAVEYARD,
                    direction: Direction::None,
                },
            )
            .await;
        }

        let dispatch = game.handle_request(1, attack).await;
        assert!(matches!(dispatch.reply, Some(Packet::CombatMobile { .. })));
        assert_eq!(dispatch.pushes.len(), 1);
        assert_eq!(dispatch.pushes[0].0, 2);
        assert!(game.record(2).unwrap().mobile.hits < 100);
    }

    #[tokio::test]
    async fn test_resurrect_only_when_dead() {
        let mut game = game();
        online(&mut game, 1).await;

        let rez = Packet::Resurrect {
            player_id: 1,
            location: Location::empty(),
            success: false,
        };
        let dispatch = game.handle_request(1, rez.clone()).await;
        assert!(matches!(
            dispatch.reply,
            Some(Packet::Resurrect { success: false, .. })
        ));

        game.players.get_mut(&1).unwrap().mobile.hits = 0;
        let dispatch = game.handle_request(1, rez).await;
        match dispatch.reply {
            Some(Packet::Resurrect {
                success, location, ..
            }) => {
                assert!(success);
                assert_eq!(location, STARTING_LOCATION);
            }
            other => panic!("Unexpected response: {:?}", other),
        }
        assert!(game.record(1).unwrap().mobile.is_alive());
    }

    #[tokio::test]
    async fn test_use_item_consumes_charges() {
        let mut game = game();
        online(&mut game, 1).await;
        game.players.get_mut(&1).unwrap().mobile.hits = 50;

        let dispatch = game.handle_request(1, Packet::use_item(1, 1)).await;
        match dispatch.reply {
            Some(Packet::UseItem {
                response: Some(text),
                ..
            }) => assert!(text.contains("recover 33 hits")),
            other => panic!("Unexpected response: {:?}", other),
        }

        let record = game.record(1).unwrap();
        assert_eq!(record.mobile.hits, 83);
        assert_eq!(record.items.get(&1).map(|i| i.charges), Some(2));

        let dispatch = game.handle_request(1, Packet::use_item(1, 99)).await;
        match dispatch.reply {
            Some(Packet::UseItem {
                response: Some(text),
                ..
            }) => assert!(text.contains("no longer")),
            other => panic!("Unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logout_persists_and_login_restores() {
        let mut game = game();
        online(&mut game, 5).await;
        game.handle_request(
            5,
            Packet::MoveMobile {
                player_id: 5,
                destination: Location::WILDERNESS,
                direction: Direction::None,
            },
        )
        .await;

        let dispatch = game.handle_request(5, Packet::Logout { player_id: 5 }).await;
        assert!(matches!(dispatch.reply, Some(Packet::Disconnected { .. })));
        assert_eq!(game.online_count(), 0);
        assert!(game.world().find_mobile(Location::WILDERNESS, 5).await.is_none());

        match game.login(5, "Avatar").await {
            Packet::Authenticated { location, .. } => assert_eq!(location, Location::WILDERNESS),
            other => panic!("Unexpected login response: {:?}", other),
        }
    }
}
