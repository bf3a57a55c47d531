//! Small in-memory game used by the unit tests.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::game::{DecodeContext, Game};
use crate::provider::{InformationProvider, ProviderId, ProviderSide};
use crate::registry::Registry;
use crate::target::{TargetTypeDef, TargetTypeId};

pub const STONE_POS: u64 = 1;
pub const CHEST_POS: u64 = 2;
pub const WATER_POS: u64 = 3;
pub const ZOMBIE_ID: u32 = 10;
pub const PLAYER_ID: u32 = 11;
pub const PLAYER_LATENCY: u32 = 85;

pub struct TestGame;

impl Game for TestGame {
    type World = TestWorld;
    type Actor = TestActor;
    type Hit = TestHit;

    fn is_alt_mode(actor: &TestActor) -> bool {
        actor.sneaking
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestActor {
    pub sneaking: bool,
}

#[derive(Debug, Clone)]
pub struct TestBlock {
    pub name: &'static str,
    pub hardness: f32,
    pub inventory: Option<u32>,
    pub fluid: bool,
}

#[derive(Debug, Clone)]
pub struct TestEntity {
    pub health: f32,
    pub player: bool,
    pub latency: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TestWorld {
    pub blocks: FxHashMap<u64, TestBlock>,
    pub entities: FxHashMap<u32, TestEntity>,
}

#[derive(Debug, Clone)]
pub enum TestHit {
    Block(u64),
    Entity(u32),
    Miss,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockTarget(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FluidTarget(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTarget(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerTarget(pub u32);

pub fn test_world() -> TestWorld {
    let mut world = TestWorld::default();
    world.blocks.insert(
        STONE_POS,
        TestBlock {
            name: "stone",
            hardness: 1.5,
            inventory: None,
            fluid: false,
        },
    );
    world.blocks.insert(
        CHEST_POS,
        TestBlock {
            name: "chest",
            hardness: 2.5,
            inventory: Some(3),
            fluid: false,
        },
    );
    world.blocks.insert(
        WATER_POS,
        TestBlock {
            name: "water",
            hardness: 100.0,
            inventory: None,
            fluid: true,
        },
    );
    world.entities.insert(
        ZOMBIE_ID,
        TestEntity {
            health: 18.0,
            player: false,
            latency: None,
        },
    );
    world.entities.insert(
        PLAYER_ID,
        TestEntity {
            health: 20.0,
            player: true,
            latency: Some(PLAYER_LATENCY),
        },
    );
    world
}

pub fn block_type(priority: i32) -> TargetTypeDef<TestGame, BlockTarget> {
    TargetTypeDef::new(
        "test:block",
        priority,
        |world: &TestWorld, hit: &TestHit| match hit {
            TestHit::Block(pos) if world.blocks.contains_key(pos) => Some(BlockTarget(*pos)),
            _ => None,
        },
        |target: &BlockTarget, out| out.write(&target.0),
        |_, input| Ok(Some(BlockTarget(input.read()?))),
    )
}

pub fn fluid_type(priority: i32) -> TargetTypeDef<TestGame, FluidTarget> {
    TargetTypeDef::new(
        "test:fluid",
        priority,
        |world: &TestWorld, hit: &TestHit| match hit {
            TestHit::Block(pos) if world.blocks.get(pos).is_some_and(|b| b.fluid) => {
                Some(FluidTarget(*pos))
            }
            _ => None,
        },
        |target: &FluidTarget, out| out.write(&target.0),
        |_, input| Ok(Some(FluidTarget(input.read()?))),
    )
}

pub fn entity_type(priority: i32) -> TargetTypeDef<TestGame, EntityTarget> {
    TargetTypeDef::new(
        "test:entity",
        priority,
        |world: &TestWorld, hit: &TestHit| match hit {
            TestHit::Entity(id) if world.entities.contains_key(id) => Some(EntityTarget(*id)),
            _ => None,
        },
        |target: &EntityTarget, out| out.write_varint(target.0),
        |ctx: &DecodeContext<'_, TestGame>, input| {
            let id = input.read_varint()?;
            Ok(ctx.world.entities.contains_key(&id).then_some(EntityTarget(id)))
        },
    )
}

pub fn player_type(
    priority: i32,
    entity: TargetTypeId<EntityTarget>,
) -> TargetTypeDef<TestGame, PlayerTarget> {
    TargetTypeDef::new(
        "test:player",
        priority,
        |world: &TestWorld, hit: &TestHit| match hit {
            TestHit::Entity(id) if world.entities.get(id).is_some_and(|e| e.player) => {
                Some(PlayerTarget(*id))
            }
            _ => None,
        },
        |target: &PlayerTarget, out| out.write_varint(target.0),
        |ctx: &DecodeContext<'_, TestGame>, input| {
            let id = input.read_varint()?;
            Ok(ctx
                .world
                .entities
                .get(&id)
                .is_some_and(|e| e.player)
                .then_some(PlayerTarget(id)))
        },
    )
    .with_parent(entity, |player: &PlayerTarget| EntityTarget(player.0))
}

pub fn hardness_provider(
    block: TargetTypeId<BlockTarget>,
) -> InformationProvider<TestGame, BlockTarget, f32> {
    InformationProvider::new(
        "test:hardness",
        block,
        ProviderSide::Server,
        |_, world: &TestWorld, target: &BlockTarget| {
            let block = world.blocks.get(&target.0)?;
            assert!(!block.hardness.is_nan(), "hardness must be a number");
            Some(block.hardness)
        },
    )
}

pub struct Fixture {
    pub registry: Arc<Registry<TestGame>>,
    pub block: TargetTypeId<BlockTarget>,
    pub fluid: TargetTypeId<FluidTarget>,
    pub entity: TargetTypeId<EntityTarget>,
    pub player: TargetTypeId<PlayerTarget>,
    pub hardness: ProviderId<f32>,
    pub inventory: ProviderId<u32>,
    pub health: ProviderId<f32>,
    pub name: ProviderId<String>,
    pub position: ProviderId<u64>,
    pub ping: ProviderId<u32>,
}

impl Fixture {
    pub fn registry_arc(&self) -> Arc<Registry<TestGame>> {
        Arc::clone(&self.registry)
    }
}

pub fn fixture() -> Fixture {
    let mut registry = Registry::<TestGame>::new();
    let block = registry.register_target_type(block_type(0)).unwrap();
    let fluid = registry.register_target_type(fluid_type(10)).unwrap();
    let entity = registry.register_target_type(entity_type(20)).unwrap();
    let player = registry
        .register_target_type(player_type(30, entity))
        .unwrap();

    let hardness = registry.register_provider(hardness_provider(block)).unwrap();
    let inventory = registry
        .register_provider(
            InformationProvider::new(
                "test:inventory",
                block,
                ProviderSide::Server,
                |_, world: &TestWorld, target: &BlockTarget| {
                    world.blocks.get(&target.0)?.inventory.filter(|&n| n > 0)
                },
            )
            .priority(10),
        )
        .unwrap();
    let health = registry
        .register_provider(InformationProvider::new(
            "test:health",
            entity,
            ProviderSide::Server,
            |_, world: &TestWorld, target: &EntityTarget| {
                world.entities.get(&target.0).map(|e| e.health)
            },
        ))
        .unwrap();
    let name = registry
        .register_provider(
            InformationProvider::new(
                "test:name",
                block,
                ProviderSide::Client,
                |_, world: &TestWorld, target: &BlockTarget| {
                    world.blocks.get(&target.0).map(|b| b.name.to_string())
                },
            )
            .priority(-10),
        )
        .unwrap();
    let position = registry
        .register_provider(
            InformationProvider::new(
                "test:position",
                block,
                ProviderSide::Server,
                |_, _, target: &BlockTarget| Some(target.0),
            )
            .priority(20)
            .alt_mode_only(),
        )
        .unwrap();
    let ping = registry
        .register_provider(
            InformationProvider::new(
                "test:ping",
                player,
                ProviderSide::Both,
                |_, world: &TestWorld, target: &PlayerTarget| {
                    world.entities.get(&target.0)?.latency
                },
            )
            .priority(5),
        )
        .unwrap();

    Fixture {
        registry: registry.into_shared(),
        block,
        fluid,
        entity,
        player,
        hardness,
        inventory,
        health,
        name,
        position,
        ping,
    }
}
