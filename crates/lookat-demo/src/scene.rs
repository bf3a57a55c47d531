//! The scripted scene the demo session looks at.

use crate::world::{
    Actor, BlockPos, BlockState, BreakingProgress, Entity, EntityId, FluidTank, Hit, ItemStack,
    ToolClass, World,
};

/// Ticks the aim rests on each stop of the sweep.
pub const DWELL_TICKS: u64 = 20;

/// Landmarks placed by [`demo_world`].
#[derive(Debug, Clone)]
pub struct Scene {
    pub stone: BlockPos,
    pub chest: BlockPos,
    pub tank: BlockPos,
    pub water: BlockPos,
    pub zombie: EntityId,
    pub dragon_part: EntityId,
    pub player: EntityId,
}

/// Build a small world with one of everything.
pub fn demo_world() -> (World, Scene) {
    let mut world = World::new();

    let stone = BlockPos::new(0, 64, 0);
    let chest = BlockPos::new(1, 64, 0);
    let tank = BlockPos::new(2, 64, 0);
    let water = BlockPos::new(3, 63, 0);

    world.set_block(
        stone,
        BlockState::solid("stone", 1.5).with_tool(ToolClass::Pickaxe),
    );
    world.set_block(
        chest,
        BlockState::solid("chest", 2.5)
            .with_tool(ToolClass::Axe)
            .with_inventory(vec![
                ItemStack::new("diamond", 3),
                ItemStack::new("bread", 12),
            ]),
    );
    world.set_block(
        tank,
        BlockState::solid("tank", 2.0).with_fluid_storage(vec![FluidTank {
            fluid: "lava".to_string(),
            amount: 4000,
            capacity: 8000,
        }]),
    );
    world.set_block(water, BlockState::fluid("water", 1000));

    let zombie = world.spawn(Entity::living("zombie", 20.0).with_effect("speed", 1, 600));
    let dragon = world.spawn(Entity::living("ender_dragon", 200.0));
    let dragon_part = world.spawn(Entity::part("ender_dragon_part", dragon));
    let player = world.spawn(Entity::player("alex", 20.0, 85));

    let scene = Scene {
        stone,
        chest,
        tank,
        water,
        zombie,
        dragon_part,
        player,
    };
    (world, scene)
}

/// The local player: carries a pickaxe.
pub fn demo_actor() -> Actor {
    Actor {
        main_hand: Some(ToolClass::Pickaxe),
        ..Actor::new("steve")
    }
}

impl Scene {
    fn stops(&self) -> [Hit; 8] {
        [
            Hit::Block(self.stone),
            Hit::Block(self.chest),
            Hit::Block(self.tank),
            Hit::Block(self.water),
            Hit::Entity(self.zombie),
            Hit::Entity(self.dragon_part),
            Hit::Entity(self.player),
            Hit::Miss,
        ]
    }

    /// Where the aim rests at `tick`.
    pub fn aim(&self, tick: u64) -> Hit {
        let stops = self.stops();
        stops[((tick / DWELL_TICKS) % stops.len() as u64) as usize]
    }

    /// The actor sneaks during the second half of every stop.
    pub fn sneaking(&self, tick: u64) -> bool {
        tick % DWELL_TICKS >= DWELL_TICKS / 2
    }

    /// Mining progress while the aim rests on stone.
    pub fn breaking(&self, tick: u64) -> Option<BreakingProgress> {
        if self.aim(tick) != Hit::Block(self.stone) {
            return None;
        }
        Some(BreakingProgress {
            pos: self.stone,
            progress: (tick % DWELL_TICKS) as f32 / DWELL_TICKS as f32,
        })
    }

    /// Whether `tick` is the last tick of a stop.
    pub fn is_stop_end(&self, tick: u64) -> bool {
        tick % DWELL_TICKS == DWELL_TICKS - 1
    }
}
