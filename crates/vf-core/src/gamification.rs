//! # Gamification
//!
//! Levels, badges and the before/after snapshot diff that drives the
//! "you leveled up" notifications. Everything here is pure; awarding XP and
//! persisting badges is the store's job.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::UnknownVariant;

pub const XP_PER_POST: i64 = 5;
pub const XP_PER_COMMENT: i64 = 2;
/// Granted to a post author for each new upvote cast by someone else.
pub const XP_PER_UPVOTE_RECEIVED: i64 = 1;

pub const CURIOUS_COMMENT_COUNT: u64 = 10;
pub const LEGENDARY_POST_UPVOTES: u64 = 20;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Level {
    #[default]
    #[serde(rename = "Iniciante")]
    Iniciante,
    #[serde(rename = "Entusiasta")]
    Entusiasta,
    #[serde(rename = "Grower Sênior")]
    GrowerSenior,
    #[serde(rename = "Cultivador Indoor")]
    CultivadorIndoor,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Iniciante => "Iniciante",
            Level::Entusiasta => "Entusiasta",
            Level::GrowerSenior => "Grower Sênior",
            Level::CultivadorIndoor => "Cultivador Indoor",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Level {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        LEVEL_THRESHOLDS
            .iter()
            .map(|threshold| threshold.level)
            .find(|level| level.label() == value)
            .ok_or(UnknownVariant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelThreshold {
    pub level: Level,
    pub min_xp: i64,
    pub description: &'static str,
}

/// Ascending by `min_xp`; the first entry starts at zero.
pub const LEVEL_THRESHOLDS: [LevelThreshold; 4] = [
    LevelThreshold {
        level: Level::Iniciante,
        min_xp: 0,
        description: "Chegou agora na comunidade.",
    },
    LevelThreshold {
        level: Level::Entusiasta,
        min_xp: 100,
        description: "Participa com frequência e compartilha o que aprende.",
    },
    LevelThreshold {
        level: Level::GrowerSenior,
        min_xp: 300,
        description: "Referência para quem está começando.",
    },
    LevelThreshold {
        level: Level::CultivadorIndoor,
        min_xp: 700,
        description: "Veterano da casa.",
    },
];

pub fn level_for_xp(xp: i64) -> Level {
    LEVEL_THRESHOLDS
        .iter()
        .rev()
        .find(|threshold| xp >= threshold.min_xp)
        .map(|threshold| threshold.level)
        .unwrap_or_default()
}

/// Position inside the current level band.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub xp: i64,
    pub level: Level,
    pub level_min_xp: i64,
    pub next_level: Option<Level>,
    pub xp_to_next_level: Option<i64>,
    /// 0..=100; 100 once the last level is reached
    pub percent: u8,
}

pub fn level_progress(xp: i64) -> LevelProgress {
    let index = LEVEL_THRESHOLDS
        .iter()
        .rposition(|threshold| xp >= threshold.min_xp)
        .unwrap_or(0);
    let current = LEVEL_THRESHOLDS[index];
    let next = LEVEL_THRESHOLDS.get(index + 1);

    let percent = match next {
        Some(next) => {
            let band = (next.min_xp - current.min_xp).max(1);
            let done = (xp - current.min_xp).clamp(0, band);
            ((done * 100) / band) as u8
        }
        None => 100,
    };

    LevelProgress {
        xp,
        level: current.level,
        level_min_xp: current.min_xp,
        next_level: next.map(|n| n.level),
        xp_to_next_level: next.map(|n| n.min_xp - xp),
        percent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeCode {
    PrimeiraColheita,
    BrisadoLendario,
    CultivadorIndoor,
    CuriosoIluminado,
}

impl BadgeCode {
    pub const ALL: [BadgeCode; 4] = [
        BadgeCode::PrimeiraColheita,
        BadgeCode::BrisadoLendario,
        BadgeCode::CultivadorIndoor,
        BadgeCode::CuriosoIluminado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BadgeCode::PrimeiraColheita => "primeira-colheita",
            BadgeCode::BrisadoLendario => "brisado-lendario",
            BadgeCode::CultivadorIndoor => "cultivador-indoor",
            BadgeCode::CuriosoIluminado => "curioso-iluminado",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BadgeCode::PrimeiraColheita => "Primeira Colheita",
            BadgeCode::BrisadoLendario => "Brisado Lendário",
            BadgeCode::CultivadorIndoor => "Cultivador Indoor",
            BadgeCode::CuriosoIluminado => "Curioso Iluminado",
        }
    }
}

impl fmt::Display for BadgeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeCode {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BadgeCode::ALL
            .into_iter()
            .find(|code| code.as_str() == value)
            .ok_or(UnknownVariant)
    }
}

/// Counters the badge rules are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityStats {
    pub xp: i64,
    pub posts: u64,
    pub comments: u64,
    pub best_post_upvotes: u64,
}

/// Every badge the stats qualify for. The store inserts the missing ones;
/// badges are never revoked.
pub fn badges_earned(stats: &ActivityStats) -> Vec<BadgeCode> {
    let mut earned = Vec::new();
    if stats.posts >= 1 {
        earned.push(BadgeCode::PrimeiraColheita);
    }
    if stats.comments >= CURIOUS_COMMENT_COUNT {
        earned.push(BadgeCode::CuriosoIluminado);
    }
    if stats.best_post_upvotes >= LEGENDARY_POST_UPVOTES {
        earned.push(BadgeCode::BrisadoLendario);
    }
    if level_for_xp(stats.xp) == Level::CultivadorIndoor {
        earned.push(BadgeCode::CultivadorIndoor);
    }
    earned
}

/// Point-in-time XP/level/badges of one user. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationSnapshot {
    pub xp: i64,
    pub level: Level,
    pub badges: Vec<BadgeCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationDiff {
    pub xp_delta: i64,
    pub previous_level: Level,
    pub new_level: Level,
    pub leveled_up: bool,
    pub new_badges: Vec<BadgeCode>,
    pub badges_count: usize,
    pub current_xp: i64,
}

/// Compares two snapshots of the same user. Badges present in both are not
/// reported, even if the store re-awarded them in between.
pub fn diff_snapshots(
    before: &GamificationSnapshot,
    after: &GamificationSnapshot,
) -> GamificationDiff {
    let known: HashSet<BadgeCode> = before.badges.iter().copied().collect();
    let mut seen = HashSet::new();
    let new_badges = after
        .badges
        .iter()
        .copied()
        .filter(|code| !known.contains(code) && seen.insert(*code))
        .collect();

    GamificationDiff {
        xp_delta: after.xp - before.xp,
        previous_level: before.level,
        new_level: after.level,
        leveled_up: before.level != after.level,
        new_badges,
        badges_count: after.badges.len(),
        current_xp: after.xp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(xp: i64, level: Level, badges: &[BadgeCode]) -> GamificationSnapshot {
        GamificationSnapshot {
            xp,
            level,
            badges: badges.to_vec(),
        }
    }

    #[test]
    fn new_badges_are_a_set_difference() {
        let a = BadgeCode::PrimeiraColheita;
        let b = BadgeCode::CuriosoIluminado;

        let diff = diff_snapshots(&snapshot(0, Level::Iniciante, &[a]), &snapshot(0, Level::Iniciante, &[a, b]));
        assert_eq!(diff.new_badges, vec![b]);
        assert_eq!(diff.badges_count, 2);

        let diff = diff_snapshots(&snapshot(0, Level::Iniciante, &[a]), &snapshot(0, Level::Iniciante, &[a]));
        assert!(diff.new_badges.is_empty());
    }

    #[test]
    fn badge_order_does_not_matter() {
        let before = snapshot(5, Level::Iniciante, &[BadgeCode::CuriosoIluminado, BadgeCode::PrimeiraColheita]);
        let after = snapshot(5, Level::Iniciante, &[BadgeCode::PrimeiraColheita, BadgeCode::CuriosoIluminado]);
        assert!(diff_snapshots(&before, &after).new_badges.is_empty());
    }

    #[test]
    fn level_change_is_detected() {
        let diff = diff_snapshots(&snapshot(98, Level::Iniciante, &[]), &snapshot(103, Level::Entusiasta, &[]));
        assert!(diff.leveled_up);
        assert_eq!(diff.previous_level, Level::Iniciante);
        assert_eq!(diff.new_level, Level::Entusiasta);
        assert_eq!(diff.xp_delta, 5);
        assert_eq!(diff.current_xp, 103);
    }

    #[test]
    fn unchanged_snapshots_diff_to_nothing() {
        let s = snapshot(40, Level::Iniciante, &[BadgeCode::PrimeiraColheita]);
        let diff = diff_snapshots(&s, &s);
        assert_eq!(diff.xp_delta, 0);
        assert!(!diff.leveled_up);
        assert!(diff.new_badges.is_empty());
    }

    #[test]
    fn thresholds_map_xp_to_levels() {
        assert_eq!(level_for_xp(-3), Level::Iniciante);
        assert_eq!(level_for_xp(0), Level::Iniciante);
        assert_eq!(level_for_xp(99), Level::Iniciante);
        assert_eq!(level_for_xp(100), Level::Entusiasta);
        assert_eq!(level_for_xp(300), Level::GrowerSenior);
        assert_eq!(level_for_xp(10_000), Level::CultivadorIndoor);
    }

    #[test]
    fn progress_inside_a_band() {
        let progress = level_progress(150);
        assert_eq!(progress.level, Level::Entusiasta);
        assert_eq!(progress.next_level, Some(Level::GrowerSenior));
        assert_eq!(progress.xp_to_next_level, Some(150));
        assert_eq!(progress.percent, 25);

        let top = level_progress(900);
        assert_eq!(top.next_level, None);
        assert_eq!(top.percent, 100);
    }

    #[test]
    fn badge_rules() {
        assert!(badges_earned(&ActivityStats::default()).is_empty());
        let stats = ActivityStats {
            xp: 700,
            posts: 1,
            comments: 10,
            best_post_upvotes: 20,
        };
        assert_eq!(badges_earned(&stats).len(), 4);
    }

    #[test]
    fn labels_serialize_as_shown_to_users() {
        assert_eq!(serde_json::to_string(&Level::GrowerSenior).unwrap(), "\"Grower Sênior\"");
        assert_eq!("Grower Sênior".parse::<Level>(), Ok(Level::GrowerSenior));
        assert_eq!(serde_json::to_string(&BadgeCode::BrisadoLendario).unwrap(), "\"brisado-lendario\"");
        assert_eq!("curioso-iluminado".parse::<BadgeCode>(), Ok(BadgeCode::CuriosoIluminado));
    }
}
