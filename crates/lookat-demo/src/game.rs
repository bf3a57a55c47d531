//! Binds the demo world to the look-at core.

use lookat_core::Game;

use crate::world::{Actor, Hit, World};

/// The demo game. Sneaking switches to alternate mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Demo;

impl Game for Demo {
    type World = World;
    type Actor = Actor;
    type Hit = Hit;

    fn is_alt_mode(actor: &Actor) -> bool {
        actor.sneaking
    }
}
