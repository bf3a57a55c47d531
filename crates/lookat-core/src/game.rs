//! Binding between the core and the host game.

/// Type family describing the host game.
///
/// The core never looks inside these types. They are only handed through to
/// the closures of target types and information providers.
pub trait Game: 'static {
    /// The world a target lives in.
    type World;
    /// The player requesting information.
    type Actor;
    /// Raw result of the aim raycast.
    type Hit;

    /// Whether the actor is in alternate display mode (e.g. sneaking).
    ///
    /// Used by the server, which has no other way to learn the flag.
    fn is_alt_mode(_actor: &Self::Actor) -> bool {
        false
    }
}

/// Actor and world a target descriptor is decoded against.
pub struct DecodeContext<'a, G: Game> {
    /// The requesting actor.
    pub actor: &'a G::Actor,
    /// The world the actor is in.
    pub world: &'a G::World,
}

impl<'a, G: Game> DecodeContext<'a, G> {
    /// Bundle an actor and its world.
    pub fn new(actor: &'a G::Actor, world: &'a G::World) -> Self {
        Self { actor, world }
    }
}
