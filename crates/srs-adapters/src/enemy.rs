//! Sparse enemy results onto the canonical 14-slot layout.

use srs_core::{CANONICAL_ENEMY_IDS, ENEMY_SLOTS};

/// One enemy type's counts as reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyEncounter {
    pub enemy_id: i32,
    pub pop_count: u32,
    pub team_defeat_count: u32,
    /// Kills by the uploader alone.
    pub defeat_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanonicalEnemies {
    pub counts: [u32; ENEMY_SLOTS],
    pub kill_counts: [u32; ENEMY_SLOTS],
    pub uploader_kill_counts: [u32; ENEMY_SLOTS],
}

/// Enemies that never appeared get zero in every array; unknown ids are dropped.
pub fn canonicalize(sparse: &[EnemyEncounter]) -> CanonicalEnemies {
    let mut out = CanonicalEnemies::default();
    for (slot, enemy_id) in CANONICAL_ENEMY_IDS.iter().enumerate() {
        if let Some(enemy) = sparse.iter().find(|e| e.enemy_id == *enemy_id) {
            out.counts[slot] = enemy.pop_count;
            out.kill_counts[slot] = enemy.team_defeat_count;
            out.uploader_kill_counts[slot] = enemy.defeat_count;
        }
    }
    out
}
