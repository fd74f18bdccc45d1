use std::sync::Arc;

use uuid::Uuid;
use vf_core::gamification::GamificationSnapshot;
use vf_core::traits::ProfileRepo;

/// Reads the user's current XP, level and badges.
///
/// Never fails: a missing profile or a store error yields the empty snapshot
/// (XP 0, `Iniciante`, no badges), so a diff against it is still meaningful.
pub async fn fetch_snapshot(profiles: &Arc<dyn ProfileRepo>, user_id: Uuid) -> GamificationSnapshot {
    let profile = match profiles.get_profile(user_id).await {
        Ok(profile) => profile,
        Err(error) => {
            tracing::warn!(%user_id, error = %error, "gamification snapshot: profile unavailable");
            None
        }
    };
    let badges = match profiles.list_badges(user_id).await {
        Ok(badges) => badges.into_iter().map(|badge| badge.code).collect(),
        Err(error) => {
            tracing::warn!(%user_id, error = %error, "gamification snapshot: badges unavailable");
            Vec::new()
        }
    };

    match profile {
        Some(profile) => GamificationSnapshot {
            xp: profile.xp,
            level: profile.level,
            badges,
        },
        None => GamificationSnapshot {
            badges,
            ..GamificationSnapshot::default()
        },
    }
}
