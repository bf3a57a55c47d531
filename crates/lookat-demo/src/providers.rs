//! Built-in information providers.

use lookat_core::{InformationProvider, ProviderId, ProviderSide, Registry, RegistryError};
use serde::{Deserialize, Serialize};

use crate::game::Demo;
use crate::targets::{BlockTarget, EntityTarget, FluidTarget, PlayerTarget, TargetTypes};
use crate::world::{Actor, FluidTank, ItemStack, StatusEffect, ToolClass, World};

pub const BLOCK_HARDNESS: &str = "lookat:block_hardness";
pub const BLOCK_HARVESTABILITY: &str = "lookat:block_harvestability";
pub const BLOCK_BREAKING_PROGRESS: &str = "lookat:block_breaking_progress";
pub const BLOCK_INVENTORY: &str = "lookat:block_inventory";
pub const BLOCK_FLUID_STORAGE: &str = "lookat:block_fluid_storage";
pub const FLUID_VISCOSITY: &str = "lookat:fluid_viscosity";
pub const ENTITY_HEALTH: &str = "lookat:entity_health";
pub const ENTITY_STATUS_EFFECTS: &str = "lookat:entity_status_effects";
pub const PLAYER_PING: &str = "lookat:player_ping";

/// Breaking progress is shown above everything else.
const BREAKING_PROGRESS_PRIORITY: i32 = -6900;

/// Whether the actor's main-hand tool gets drops from a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvestability {
    /// Tool class the block asks for, if any.
    pub effective_tool: Option<ToolClass>,
    pub harvestable: bool,
}

/// Handles of the built-in providers.
#[derive(Debug, Clone, Copy)]
pub struct Providers {
    pub block_hardness: ProviderId<f32>,
    pub block_harvestability: ProviderId<Harvestability>,
    pub block_breaking_progress: ProviderId<f32>,
    pub block_inventory: ProviderId<Vec<ItemStack>>,
    pub block_fluid_storage: ProviderId<Vec<FluidTank>>,
    pub fluid_viscosity: ProviderId<u32>,
    pub entity_health: ProviderId<f32>,
    pub entity_status_effects: ProviderId<Vec<StatusEffect>>,
    pub player_ping: ProviderId<u32>,
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    (!items.is_empty()).then(|| items.to_vec())
}

/// Register the built-in providers against `types`.
pub fn register_providers(
    registry: &mut Registry<Demo>,
    types: &TargetTypes,
) -> Result<Providers, RegistryError> {
    let block_hardness = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        BLOCK_HARDNESS,
        types.block,
        ProviderSide::Server,
        |_: &Actor, world: &World, target: &BlockTarget| {
            world.block(target.pos).map(|state| state.hardness)
        },
    ))?;

    let block_harvestability = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        BLOCK_HARVESTABILITY,
        types.block,
        ProviderSide::Server,
        |actor: &Actor, world: &World, target: &BlockTarget| {
            let state = world.block(target.pos)?;
            let tool_ok = state
                .required_tool
                .is_none_or(|tool| actor.main_hand == Some(tool));
            Some(Harvestability {
                effective_tool: state.required_tool,
                harvestable: state.hardness >= 0.0 && tool_ok,
            })
        },
    ))?;

    let block_breaking_progress = registry.register_provider(
        InformationProvider::<Demo, _, _>::new(
            BLOCK_BREAKING_PROGRESS,
            types.block,
            ProviderSide::Client,
            |_: &Actor, world: &World, target: &BlockTarget| {
                let breaking = world.breaking.filter(|b| b.pos == target.pos)?;
                (breaking.progress > 0.0).then_some(breaking.progress)
            },
        )
        .priority(BREAKING_PROGRESS_PRIORITY),
    )?;

    let block_inventory = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        BLOCK_INVENTORY,
        types.block,
        ProviderSide::Server,
        |_: &Actor, world: &World, target: &BlockTarget| {
            non_empty(&world.block(target.pos)?.inventory)
        },
    ))?;

    let block_fluid_storage = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        BLOCK_FLUID_STORAGE,
        types.block,
        ProviderSide::Server,
        |_: &Actor, world: &World, target: &BlockTarget| {
            non_empty(&world.block(target.pos)?.fluid_storage)
        },
    ))?;

    let fluid_viscosity = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        FLUID_VISCOSITY,
        types.fluid,
        ProviderSide::Server,
        |_: &Actor, world: &World, target: &FluidTarget| {
            world
                .block(target.pos)?
                .fluid
                .as_ref()
                .map(|fluid| fluid.viscosity)
        },
    ))?;

    let entity_health = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        ENTITY_HEALTH,
        types.entity,
        ProviderSide::Server,
        |_: &Actor, world: &World, target: &EntityTarget| world.entity(target.0)?.health,
    ))?;

    let entity_status_effects = registry.register_provider(
        InformationProvider::<Demo, _, _>::new(
            ENTITY_STATUS_EFFECTS,
            types.entity,
            ProviderSide::Server,
            |_: &Actor, world: &World, target: &EntityTarget| {
                non_empty(&world.entity(target.0)?.effects)
            },
        )
        .alt_mode_only(),
    )?;

    // Only other players: the actor's own latency is not interesting.
    let player_ping = registry.register_provider(InformationProvider::<Demo, _, _>::new(
        PLAYER_PING,
        types.player,
        ProviderSide::Both,
        |actor: &Actor, world: &World, target: &PlayerTarget| {
            let player = world.entity(target.0)?.player.as_ref()?;
            (player.name != actor.name).then_some(player.latency_ms)
        },
    ))?;

    Ok(Providers {
        block_hardness,
        block_harvestability,
        block_breaking_progress,
        block_inventory,
        block_fluid_storage,
        fluid_viscosity,
        entity_health,
        entity_status_effects,
        player_ping,
    })
}
