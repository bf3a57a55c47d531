//! In-memory world the demo content runs against.
//!
//! Absent block positions are air. Entities are keyed by [`EntityId`]; a
//! part entity (e.g. one segment of a dragon) names its owner so targeting
//! the part reports on the whole creature.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Integer block coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Tool class required to harvest a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolClass {
    Pickaxe,
    Axe,
    Shovel,
    Hoe,
}

/// A stack of items held by a container block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}

/// One tank of a fluid container, in millibuckets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidTank {
    pub fluid: String,
    pub amount: u64,
    pub capacity: u64,
}

/// Fluid occupying a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FluidState {
    pub fluid: String,
    pub viscosity: u32,
}

/// Everything the world knows about one block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockState {
    /// Registry-style name, e.g. `"stone"`.
    pub name: String,
    /// Seconds of unassisted breaking per unit, negative if unbreakable.
    pub hardness: f32,
    /// Tool needed for drops; `None` if any tool works.
    pub required_tool: Option<ToolClass>,
    /// Container contents; empty for non-containers.
    pub inventory: Vec<ItemStack>,
    /// Fluid tanks; empty for blocks without storage.
    pub fluid_storage: Vec<FluidTank>,
    /// Fluid in the block itself (source or flowing fluid).
    pub fluid: Option<FluidState>,
}

impl BlockState {
    /// A plain solid block.
    pub fn solid(name: impl Into<String>, hardness: f32) -> Self {
        Self {
            name: name.into(),
            hardness,
            required_tool: None,
            inventory: Vec::new(),
            fluid_storage: Vec::new(),
            fluid: None,
        }
    }

    /// A fluid source block.
    pub fn fluid(name: impl Into<String>, viscosity: u32) -> Self {
        let name = name.into();
        Self {
            fluid: Some(FluidState {
                fluid: name.clone(),
                viscosity,
            }),
            ..Self::solid(name, 100.0)
        }
    }

    pub fn with_tool(mut self, tool: ToolClass) -> Self {
        self.required_tool = Some(tool);
        self
    }

    pub fn with_inventory(mut self, items: Vec<ItemStack>) -> Self {
        self.inventory = items;
        self
    }

    pub fn with_fluid_storage(mut self, tanks: Vec<FluidTank>) -> Self {
        self.fluid_storage = tanks;
        self
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Network-stable entity identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// An active status effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub effect: String,
    pub amplifier: u8,
    pub remaining_ticks: u32,
}

/// Extra data carried by player entities.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerInfo {
    pub name: String,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Kind name, e.g. `"zombie"`.
    pub kind: String,
    /// Current health; `None` for non-living entities.
    pub health: Option<f32>,
    pub effects: Vec<StatusEffect>,
    /// Composite entity this one is a part of.
    pub owner: Option<EntityId>,
    pub player: Option<PlayerInfo>,
}

impl Entity {
    /// A living entity with the given health.
    pub fn living(kind: impl Into<String>, health: f32) -> Self {
        Self {
            kind: kind.into(),
            health: Some(health),
            effects: Vec::new(),
            owner: None,
            player: None,
        }
    }

    /// A non-living entity.
    pub fn object(kind: impl Into<String>) -> Self {
        Self {
            health: None,
            ..Self::living(kind, 0.0)
        }
    }

    /// A part of the composite entity `owner`.
    pub fn part(kind: impl Into<String>, owner: EntityId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::object(kind)
        }
    }

    /// A player.
    pub fn player(name: impl Into<String>, health: f32, latency_ms: u32) -> Self {
        Self {
            player: Some(PlayerInfo {
                name: name.into(),
                latency_ms,
            }),
            ..Self::living("player", health)
        }
    }

    pub fn with_effect(
        mut self,
        effect: impl Into<String>,
        amplifier: u8,
        remaining_ticks: u32,
    ) -> Self {
        self.effects.push(StatusEffect {
            effect: effect.into(),
            amplifier,
            remaining_ticks,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Mining progress on one block, `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreakingProgress {
    pub pos: BlockPos,
    pub progress: f32,
}

/// Blocks, entities and the game clock.
#[derive(Debug, Default)]
pub struct World {
    blocks: HashMap<BlockPos, BlockState>,
    entities: HashMap<EntityId, Entity>,
    next_entity: u32,
    tick: u64,
    /// Block the local player is currently mining. Client-side only.
    pub breaking: Option<BreakingProgress>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `state` at `pos`, replacing whatever was there.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) {
        self.blocks.insert(pos, state);
    }

    /// Turn `pos` back into air.
    pub fn remove_block(&mut self, pos: BlockPos) -> Option<BlockState> {
        self.blocks.remove(&pos)
    }

    /// The block at `pos`, or `None` for air.
    pub fn block(&self, pos: BlockPos) -> Option<&BlockState> {
        self.blocks.get(&pos)
    }

    /// Add an entity and return its id.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.next_entity += 1;
        let id = EntityId(self.next_entity);
        self.entities.insert(id, entity);
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// The entity `id` stands for: its owner if it is a part of a live
    /// composite entity, otherwise itself. `None` if `id` does not exist.
    pub fn owning_entity(&self, id: EntityId) -> Option<EntityId> {
        let entity = self.entities.get(&id)?;
        match entity.owner {
            Some(owner) if self.entities.contains_key(&owner) => Some(owner),
            _ => Some(id),
        }
    }

    /// Current game tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the clock by one tick and count down status effects.
    pub fn advance(&mut self) {
        self.tick += 1;
        for entity in self.entities.values_mut() {
            entity.effects.retain_mut(|effect| {
                effect.remaining_ticks = effect.remaining_ticks.saturating_sub(1);
                effect.remaining_ticks > 0
            });
        }
    }
}

/// The actor aiming at things.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Actor {
    pub name: String,
    pub sneaking: bool,
    pub main_hand: Option<ToolClass>,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Result of the aim raycast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    Block(BlockPos),
    Entity(EntityId),
    Miss,
}
