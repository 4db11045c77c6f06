use crate::entity::Role;
use crate::hook::{EntityView, HookEnv, HookResult, RoleHooks};

use super::builders::{command, dead, move_to};
use super::random_point;

/// Commander.
///
/// Sends every idle soldier of its own team that comes into view to a random
/// point, and dies when hit by a bullet. Generals do not wander on their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct General;

impl RoleHooks for General {
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
        env: &mut HookEnv<'_>,
        me: &EntityView,
        other: &EntityView,
    ) -> HookResult {
        if other.role != Role::Soldier || other.team != me.team || !other.state.is_idle() {
            return Ok(None);
        }
        let target = random_point(env)?;
        Ok(Some(command(&other.id, &move_to(target.x, target.y))))
    }
}
