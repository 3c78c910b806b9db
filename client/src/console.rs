//! Text front-end: command parsing and rendering of session events.

use crate::state::ClientEvent;
use shared::{Location, Mobile, Node};
use std::collections::BTreeMap;

pub const HELP: &str = "Commands:
  look                 describe the current region
  travel <n|name>      travel to a connected region (0 stays)
  wander <direction>   explore north/south/east/west in the wilds
  nearby               list creatures and players here
  attack <n>           attack the nth nearby mobile
  status               show your paperdoll
  items                list your pack
  equipment            list what you wear
  use <n>              use the nth item in your pack
  resurrect            return to life at the shrine
  quit                 save and leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Look,
    Travel(String),
    Wander(String),
    Nearby,
    Attack(usize),
    Status,
    Items,
    Equipment,
    Use(i64),
    Resurrect,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_lowercase();
        let rest = words.collect::<Vec<_>>().join(" ");

        let command = match verb.as_str() {
            "help" | "?" => Command::Help,
            "look" | "l" => Command::Look,
            "travel" | "go" | "t" if !rest.is_empty() => Command::Travel(rest),
            "wander" | "w" if !rest.is_empty() => Command::Wander(rest),
            "nearby" | "n" => Command::Nearby,
            "attack" | "a" => Command::Attack(rest.parse().ok()?),
            "status" | "s" => Command::Status,
            "items" | "i" => Command::Items,
            "equipment" | "eq" => Command::Equipment,
            "use" | "u" => Command::Use(rest.parse().ok()?),
            "resurrect" | "rez" => Command::Resurrect,
            "quit" | "exit" | "logout" => Command::Quit,
            _ => return None,
        };
        Some(command)
    }
}

pub fn render_region(node: &Node, unlocked: Location) -> String {
    let mut out = format!("== {} ==\n{}", node.name(), node.description());

    let connections: Vec<Location> = node
        .connections()
        .iter()
        .copied()
        .filter(|l| l.is_single())
        .collect();
    if !connections.is_empty() {
        out.push_str("\nRoutes:");
        for (i, location) in connections.iter().enumerate() {
            let marker = if unlocked.contains(*location) { "" } else { " (unexplored)" };
            out.push_str(&format!("\n  {}. {}{}", i + 1, location, marker));
        }
    }
    if node.can_traverse() {
        out.push_str("\nThe wilds here can be explored by direction.");
    }
    if node.is_pvp() {
        out.push_str("\nOther players may attack you here.");
    }
    out
}

pub fn render_mobiles(mobiles: &[Mobile]) -> String {
    if mobiles.is_empty() {
        return "You are alone.".to_string();
    }

    let mut out = String::from("Nearby:");
    for (i, mobile) in mobiles.iter().enumerate() {
        out.push_str(&format!(
            "\n  {}. {} ({}/{})",
            i + 1,
            mobile.name,
            mobile.hits,
            mobile.hits_max
        ));
    }
    out
}

pub fn render_inventory(listing: &[(usize, u32, &str)]) -> String {
    if listing.is_empty() {
        return "Your pack is empty.".to_string();
    }

    let mut out = String::from("Pack:");
    for (position, _, label) in listing {
        out.push_str(&format!("\n  {}. {}", position, label));
    }
    out
}

pub fn render_equipment(equipment: &BTreeMap<u32, String>) -> String {
    if equipment.is_empty() {
        return "You wear nothing of note.".to_string();
    }

    let mut out = String::from("Equipped:");
    for label in equipment.values() {
        out.push_str(&format!("\n  {}", label));
    }
    out
}

pub fn render_event(event: &ClientEvent) -> String {
    match event {
        ClientEvent::Paperdoll(text) => text.clone(),
        ClientEvent::Region(node) => format!("You are in {}. {}", node.name(), node.description()),
        ClientEvent::Nearby(mobiles) => render_mobiles(mobiles),
        ClientEvent::Combat(lines) => lines.join("\n"),
        ClientEvent::ItemUsed(text) => text.clone(),
        ClientEvent::Resurrected => "You feel life return to your body.".to_string(),
        ClientEvent::Warning(text) => format!("[warning] {}", text),
    }
}
