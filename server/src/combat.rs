//! Combat resolution seam. Damage math is a collaborator of the world
//! server; the game loop only needs the resulting log lines and the updated
//! mobiles.

use rand::Rng;
use shared::Mobile;

pub trait CombatResolver: Send + Sync {
    /// Resolves one exchange of blows and returns the combat log lines in
    /// the order they happened.
    fn exchange(&mut self, attacker: &mut Mobile, defender: &mut Mobile) -> Vec<String>;
}

/// Each side swings once: damage rolls uniformly between 1 and the swinger's
/// attack attribute. A defender killed by the first swing does not answer.
#[derive(Debug, Default)]
pub struct SwingCombat;

impl SwingCombat {
    fn swing(from: &Mobile, to: &mut Mobile, log: &mut Vec<String>) -> bool {
        let damage = rand::thread_rng().gen_range(1..=from.attack.max(1));
        let killed = to.damage(damage);
        log.push(format!(
            "{} hits {} for {} damage ({}/{}).",
            from.name, to.name, damage, to.hits, to.hits_max
        ));
        if killed {
            log.push(format!("{} has been slain by {}.", to.name, from.name));
        }
        killed
    }
}

impl CombatResolver for SwingCombat {
    fn exchange(&mut self, attacker: &mut Mobile, defender: &mut Mobile) -> Vec<String> {
        let mut log = Vec::new();

        if !attacker.is_alive() {
            log.push(format!("{} is dead and cannot fight.", attacker.name));
            return log;
        }
        if !defender.is_alive() {
            log.push(format!("{} is already dead.", defender.name));
            return log;
        }

        if !Self::swing(attacker, defender, &mut log) {
            Self::swing(defender, attacker, &mut log);
        }

        log
    }
}
