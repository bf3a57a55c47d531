//! Built-in target types: blocks, fluids, entities and players.

use lookat_core::{Registry, RegistryError, TargetTypeDef, TargetTypeId};

use crate::game::Demo;
use crate::world::{BlockPos, EntityId, Hit, World};

pub const BLOCK: &str = "lookat:block";
pub const FLUID: &str = "lookat:fluid";
pub const ENTITY: &str = "lookat:entity";
pub const PLAYER: &str = "lookat:player";

/// A non-air block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockTarget {
    pub pos: BlockPos,
    pub block: String,
}

/// The fluid inside a block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FluidTarget {
    pub pos: BlockPos,
    pub fluid: String,
}

/// An entity, after redirecting parts to their owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityTarget(pub EntityId);

/// A player entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlayerTarget(pub EntityId);

/// Handles of the built-in target types.
#[derive(Debug, Clone, Copy)]
pub struct TargetTypes {
    pub block: TargetTypeId<BlockTarget>,
    pub fluid: TargetTypeId<FluidTarget>,
    pub entity: TargetTypeId<EntityTarget>,
    pub player: TargetTypeId<PlayerTarget>,
}

fn block_at(world: &World, pos: BlockPos) -> Option<BlockTarget> {
    world.block(pos).map(|state| BlockTarget {
        pos,
        block: state.name.clone(),
    })
}

fn fluid_at(world: &World, pos: BlockPos) -> Option<FluidTarget> {
    let fluid = world.block(pos)?.fluid.as_ref()?;
    Some(FluidTarget {
        pos,
        fluid: fluid.fluid.clone(),
    })
}

fn player_of(world: &World, id: EntityId) -> Option<PlayerTarget> {
    let id = world.owning_entity(id)?;
    world
        .entity(id)?
        .player
        .as_ref()
        .map(|_| PlayerTarget(id))
}

/// Register the built-in target types.
///
/// The fluid type is always registered so wire indices do not depend on
/// configuration; with `include_fluids` off it simply never resolves.
pub fn register_target_types(
    registry: &mut Registry<Demo>,
    include_fluids: bool,
) -> Result<TargetTypes, RegistryError> {
    let block = registry.register_target_type(TargetTypeDef::<Demo, _>::new(
        BLOCK,
        0,
        |world: &World, hit: &Hit| match *hit {
            Hit::Block(pos) => block_at(world, pos),
            _ => None,
        },
        |target: &BlockTarget, out| out.write(&target.pos),
        |ctx, input| {
            let pos: BlockPos = input.read()?;
            Ok(block_at(ctx.world, pos))
        },
    ))?;

    let fluid = registry.register_target_type(TargetTypeDef::<Demo, _>::new(
        FLUID,
        10,
        move |world: &World, hit: &Hit| match *hit {
            Hit::Block(pos) if include_fluids => fluid_at(world, pos),
            _ => None,
        },
        |target: &FluidTarget, out| out.write(&target.pos),
        |ctx, input| {
            let pos: BlockPos = input.read()?;
            Ok(fluid_at(ctx.world, pos))
        },
    ))?;

    let entity = registry.register_target_type(TargetTypeDef::<Demo, _>::new(
        ENTITY,
        20,
        |world: &World, hit: &Hit| match *hit {
            Hit::Entity(id) => world.owning_entity(id).map(EntityTarget),
            _ => None,
        },
        |target: &EntityTarget, out| out.write_varint(target.0.0),
        |ctx, input| {
            let id = EntityId(input.read_varint()?);
            Ok(ctx.world.owning_entity(id).map(EntityTarget))
        },
    ))?;

    let player = registry.register_target_type(
        TargetTypeDef::<Demo, _>::new(
            PLAYER,
            30,
            |world: &World, hit: &Hit| match *hit {
                Hit::Entity(id) => player_of(world, id),
                _ => None,
            },
            |target: &PlayerTarget, out| out.write_varint(target.0.0),
            |ctx, input| {
                let id = EntityId(input.read_varint()?);
                Ok(player_of(ctx.world, id))
            },
        )
        .with_parent(entity, |player: &PlayerTarget| EntityTarget(player.0)),
    )?;

    Ok(TargetTypes {
        block,
        fluid,
        entity,
        player,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Actor, BlockState, Entity};
    use lookat_core::DecodeContext;

    fn build(include_fluids: bool) -> (Registry<Demo>, TargetTypes) {
        let mut registry = Registry::new();
        let types = register_target_types(&mut registry, include_fluids).unwrap();
        registry.freeze();
        (registry, types)
    }

    fn world() -> (World, BlockPos, BlockPos) {
        let mut world = World::new();
        let stone = BlockPos::new(0, 64, 0);
        let water = BlockPos::new(1, 64, 0);
        world.set_block(stone, BlockState::solid("stone", 1.5));
        world.set_block(water, BlockState::fluid("water", 1000));
        (world, stone, water)
    }

    #[test]
    fn test_air_and_miss_resolve_to_nothing() {
        let (registry, _) = build(true);
        let (world, _, _) = world();
        assert!(registry.resolve(&world, &Hit::Miss).is_none());
        assert!(
            registry
                .resolve(&world, &Hit::Block(BlockPos::new(9, 9, 9)))
                .is_none()
        );
    }

    #[test]
    fn test_fluid_wins_only_when_enabled() {
        let (world, _, water) = world();

        let (registry, types) = build(true);
        let target = registry.resolve(&world, &Hit::Block(water)).unwrap();
        assert_eq!(target.type_index(), types.fluid.index());

        let (registry, types) = build(false);
        let target = registry.resolve(&world, &Hit::Block(water)).unwrap();
        assert_eq!(target.type_index(), types.block.index());
    }

    #[test]
    fn test_part_is_redirected_to_owner() {
        let (registry, types) = build(false);
        let (mut world, _, _) = world();
        let dragon = world.spawn(Entity::living("ender_dragon", 200.0));
        let wing = world.spawn(Entity::part("ender_dragon_part", dragon));

        let target = registry.resolve(&world, &Hit::Entity(wing)).unwrap();
        assert_eq!(target.downcast(types.entity), Some(&EntityTarget(dragon)));

        // A descriptor naming the part decodes to the owner as well.
        let mut out = lookat_core::WireWriter::new();
        out.write_varint(types.entity.index()).unwrap();
        out.write_varint(wing.0).unwrap();
        let actor = Actor::new("steve");
        let decoded = registry
            .decode_target(&DecodeContext::new(&actor, &world), &out.into_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, target);
    }

    #[test]
    fn test_player_outranks_entity_and_upcasts() {
        let (registry, types) = build(false);
        let (mut world, _, _) = world();
        let alex = world.spawn(Entity::player("alex", 20.0, 85));

        let target = registry.resolve(&world, &Hit::Entity(alex)).unwrap();
        assert_eq!(target.downcast(types.player), Some(&PlayerTarget(alex)));

        let entity = registry.upcast(&target, types.entity.index()).unwrap();
        assert_eq!(entity.downcast(types.entity), Some(&EntityTarget(alex)));
    }

    #[test]
    fn test_block_descriptor_roundtrip() {
        let (registry, types) = build(false);
        let (world, stone, _) = world();
        let actor = Actor::new("steve");
        let ctx = DecodeContext::new(&actor, &world);

        let target = registry.resolve(&world, &Hit::Block(stone)).unwrap();
        let bytes = registry.encode_target(&target).unwrap();
        let decoded = registry.decode_target(&ctx, &bytes).unwrap().unwrap();
        assert_eq!(decoded, target);
        assert_eq!(
            decoded.downcast(types.block).map(|b| b.block.as_str()),
            Some("stone")
        );
    }

    #[test]
    fn test_removed_block_decodes_to_nothing() {
        let (registry, _) = build(false);
        let (mut world, stone, _) = world();
        let target = registry.resolve(&world, &Hit::Block(stone)).unwrap();
        let bytes = registry.encode_target(&target).unwrap();

        world.remove_block(stone);
        let actor = Actor::new("steve");
        let ctx = DecodeContext::new(&actor, &world);
        assert!(registry.decode_target(&ctx, &bytes).unwrap().is_none());
    }
}
