//! Creature generation for spawnable regions.

use crate::world::WorldMap;
use log::debug;
use rand::seq::SliceRandom;
use shared::{Location, Mobile, Serial, NPC_SERIAL_BASE};
use std::sync::atomic::{AtomicU64, Ordering};

struct CreatureTemplate {
    name: &'static str,
    hits: i32,
    attack: i32,
}

const TEMPLATES: [CreatureTemplate; 6] = [
    CreatureTemplate { name: "Giant Rat", hits: 8, attack: 2 },
    CreatureTemplate { name: "Skeleton", hits: 20, attack: 4 },
    CreatureTemplate { name: "Zombie", hits: 28, attack: 3 },
    CreatureTemplate { name: "Orc", hits: 35, attack: 6 },
    CreatureTemplate { name: "Ettin", hits: 60, attack: 9 },
    CreatureTemplate { name: "Drake", hits: 90, attack: 12 },
];

pub struct Spawner {
    max_per_node: usize,
    next_serial: AtomicU64,
}

impl Spawner {
    pub fn new(max_per_node: usize) -> Self {
        Self {
            max_per_node,
            next_serial: AtomicU64::new(NPC_SERIAL_BASE),
        }
    }

    pub fn next_serial(&self) -> Serial {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Rolls a random creature for `location`.
    pub fn create(&self, location: Location) -> Mobile {
        let template = TEMPLATES
            .choose(&mut rand::thread_rng())
            .unwrap_or(&TEMPLATES[0]);
        Mobile::npc(
            self.next_serial(),
            template.name,
            location,
            template.hits,
            template.attack,
        )
    }

    /// Spawns one creature if the region allows it and is under the cap.
    pub async fn spawn_one(&self, world: &WorldMap, location: Location) -> Option<Mobile> {
        if !world.spawnable_locations().contains(&location) {
            return None;
        }

        let creature = self.create(location);
        if !world
            .add_npc_capped(location, creature.clone(), self.max_per_node)
            .await
        {
            return None;
        }
        debug!("Spawned {} ({}) in {}", creature.name, creature.serial, location);
        Some(creature)
    }

    /// One spawn pass over every spawnable region. Returns how many creatures
    /// were created.
    pub async fn populate(&self, world: &WorldMap) -> usize {
        let mut spawned = 0;
        for location in world.spawnable_locations() {
            if self.spawn_one(world, *location).await.is_some() {
                spawned += 1;
            }
        }
        spawned
    }
}
