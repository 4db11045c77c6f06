use crate::entity::Role;
use crate::hook::{EntityView, HookEnv, HookResult, RoleHooks};

use super::builders::{dead, move_to, shoot};
use super::random_point;

/// Front-line unit.
///
/// - Idle: walks to a random point in the field
/// - Hit by a bullet: dies
/// - Sees a living enemy that is not a bullet: shoots it
#[derive(Debug, Clone, Copy, Default)]
pub struct Soldier;

impl RoleHooks for Soldier {
    fn on_state_change(&self, env: &mut HookEnv<'_>, me: &EntityView) -> HookResult {
        if !me.state.is_idle() {
            return Ok(None);
        }
        let target = random_point(env)?;
        Ok(Some(move_to(target.x, target.y)))
    }

    fn on_collision(
        &self,
        _env: &mut HookEnv<'_>,
        _me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        Ok((other.role == Role::Bullet).then(dead))
    }

    fn on_enter_view(
        &self,
        _env: &mut HookEnv<'_>,
        me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        let enemy = other.team != me.team && other.role != Role::Bullet && !other.state.is_dead();
        Ok(enemy.then(|| shoot(&other.id)))
    }
}
