//! Request/reply exchange between a server and a client dispatcher over the
//! demo content, without a network in between.

use lookat_core::{
    ClientDispatcher, DecodeContext, RequestData, ServerDispatcher, TargetInfo, WireReader,
};
use lookat_demo::providers::{BLOCK_HARDNESS, BLOCK_HARVESTABILITY};
use lookat_demo::scene::{demo_actor, demo_world};
use lookat_demo::world::{
    Actor, BlockPos, BlockState, BreakingProgress, Entity, EntityId, FluidTank, Hit, ItemStack,
    StatusEffect, ToolClass, World,
};
use lookat_demo::{Content, Demo, Harvestability, build_registry};

const UPDATE_DELAY: u64 = 10;
const CONNECTION: u32 = 1;

struct Harness {
    content: Content,
    server: ServerDispatcher<Demo, u32>,
    client: ClientDispatcher<Demo>,
    world: World,
    actor: Actor,
    barrel: BlockPos,
    stone: BlockPos,
    zombie: EntityId,
}

fn harness() -> Harness {
    let content = build_registry(false).unwrap();
    let server = ServerDispatcher::new(content.registry.clone(), UPDATE_DELAY).unwrap();
    let client = ClientDispatcher::new(content.registry.clone()).unwrap();

    let mut world = World::new();
    let barrel = BlockPos::new(0, 64, 0);
    let stone = BlockPos::new(4, 64, 0);
    world.set_block(
        barrel,
        BlockState::solid("barrel", 1.5).with_inventory(vec![ItemStack::new("apple", 5)]),
    );
    world.set_block(stone, BlockState::solid("stone", 1.5));
    let zombie = world.spawn(Entity::living("zombie", 20.0));

    Harness {
        content,
        server,
        client,
        world,
        actor: Actor::new("steve"),
        barrel,
        stone,
        zombie,
    }
}

impl Harness {
    /// Run one client tick aimed at `hit` and hand the request to the server
    /// at `now`. Returns whether the client merged a reply.
    fn exchange(&mut self, hit: Hit, now: u64) -> bool {
        let Some(request) = self.client.tick(&self.actor, &self.world, &hit, false) else {
            return false;
        };
        match self
            .server
            .handle_request(&CONNECTION, &self.actor, &self.world, now, &request)
        {
            Some(reply) => self.client.receive(&reply),
            None => false,
        }
    }
}

#[test]
fn test_block_reply_carries_nonce_and_block_entries() {
    let mut h = harness();
    // Leave hardness and inventory as the only server facts for a block.
    h.server.set_disabled_providers([BLOCK_HARVESTABILITY]).unwrap();
    h.client.set_disabled_providers([BLOCK_HARVESTABILITY]).unwrap();

    let hit = Hit::Block(h.barrel);
    let mut request = None;
    for _ in 0..8 {
        request = h.client.tick(&h.actor, &h.world, &hit, false);
    }
    let request = request.unwrap();
    assert_eq!(request.nonce, 7);

    let reply = h
        .server
        .handle_request(&CONNECTION, &h.actor, &h.world, 100, &request)
        .unwrap();
    assert_eq!(reply.nonce, 7);
    let mut results = WireReader::new(&reply.results);
    assert_eq!(results.read_varint().unwrap(), 2);

    assert!(h.client.receive(&reply));
    let info = h.client.view().unwrap();
    assert_eq!(info.server_nonce(), Some(7));
    assert_eq!(info.get(h.content.providers.block_hardness), Some(&1.5));
    assert_eq!(
        info.get(h.content.providers.block_inventory),
        Some(&vec![ItemStack::new("apple", 5)])
    );
    assert_eq!(info.get(h.content.providers.entity_health), None);
    assert_eq!(info.facts().len(), 2);
}

#[test]
fn test_same_target_is_throttled_and_first_result_kept() {
    let mut h = harness();
    let hit = Hit::Block(h.barrel);

    assert!(h.exchange(hit, 100));
    let first = h.client.view().unwrap().server_nonce();

    assert!(!h.exchange(hit, 101));
    assert!(!h.exchange(hit, 109));
    let info = h.client.view().unwrap();
    assert_eq!(info.server_nonce(), first);
    assert_eq!(info.get(h.content.providers.block_hardness), Some(&1.5));

    assert!(h.exchange(hit, 110));
}

#[test]
fn test_new_target_fast_tracked_after_half_interval() {
    let mut h = harness();
    assert!(h.exchange(Hit::Block(h.barrel), 100));

    // Less than half the interval: still throttled.
    assert!(!h.exchange(Hit::Block(h.stone), 104));
    // The override stays armed until a request is accepted.
    assert!(h.exchange(Hit::Block(h.stone), 105));
    let info = h.client.view().unwrap();
    assert_eq!(info.get(h.content.providers.block_inventory), None);

    // Back to the steady interval for the unchanged target.
    assert!(!h.exchange(Hit::Block(h.stone), 110));
    assert!(h.exchange(Hit::Block(h.stone), 115));
}

#[test]
fn test_disabled_provider_is_left_out() {
    let mut h = harness();
    assert_eq!(h.server.set_disabled_providers([BLOCK_HARDNESS]).unwrap(), 1);
    h.client.set_disabled_providers([BLOCK_HARDNESS]).unwrap();

    assert!(h.exchange(Hit::Block(h.stone), 0));
    let info = h.client.view().unwrap();
    assert_eq!(info.get(h.content.providers.block_hardness), None);
    assert!(info.get(h.content.providers.block_harvestability).is_some());
}

#[test]
fn test_entity_target_gets_entity_facts_only() {
    let mut h = harness();
    assert!(h.exchange(Hit::Entity(h.zombie), 0));
    let info = h.client.view().unwrap();
    assert_eq!(info.get(h.content.providers.entity_health), Some(&20.0));
    assert_eq!(info.get(h.content.providers.block_hardness), None);
}

#[test]
fn test_despawned_entity_gets_no_reply() {
    let mut h = harness();
    let request = h
        .client
        .tick(&h.actor, &h.world, &Hit::Entity(h.zombie), false)
        .unwrap();
    h.world.despawn(h.zombie);
    assert!(
        h.server
            .handle_request(&CONNECTION, &h.actor, &h.world, 0, &request)
            .is_none()
    );
}

#[test]
fn test_garbage_request_is_dropped() {
    let mut h = harness();
    let request = RequestData {
        nonce: 3,
        target: vec![0x7f, 1, 2, 3],
    };
    assert!(
        h.server
            .handle_request(&CONNECTION, &h.actor, &h.world, 0, &request)
            .is_none()
    );
}

#[test]
fn test_every_target_type_survives_the_wire() {
    let h = harness();
    let registry = &h.content.registry;
    let ctx = DecodeContext::new(&h.actor, &h.world);
    for hit in [Hit::Block(h.barrel), Hit::Block(h.stone), Hit::Entity(h.zombie)] {
        let target = registry.resolve(&h.world, &hit).unwrap();
        let bytes = registry.encode_target(&target).unwrap();
        assert_eq!(registry.decode_target(&ctx, &bytes).unwrap(), Some(target));
    }
}

#[test]
fn test_every_provider_value_survives_the_exchange() {
    let content = build_registry(true).unwrap();
    let p = content.providers;
    let mut server = ServerDispatcher::<Demo, u32>::new(content.registry.clone(), UPDATE_DELAY)
        .unwrap();
    let mut client = ClientDispatcher::new(content.registry.clone()).unwrap();

    let (mut world, scene) = demo_world();
    world.breaking = Some(BreakingProgress {
        pos: scene.stone,
        progress: 0.25,
    });
    // Sneaking unlocks status effects.
    let mut actor = demo_actor();
    actor.sneaking = true;

    let mut now = 0;
    let mut look = |hit: Hit| -> TargetInfo {
        let request = client.tick(&actor, &world, &hit, actor.sneaking).unwrap();
        let reply = server
            .handle_request(&CONNECTION, &actor, &world, now, &request)
            .unwrap();
        now += UPDATE_DELAY;
        assert!(client.receive(&reply));
        client.view().unwrap()
    };

    let stone = look(Hit::Block(scene.stone));
    assert_eq!(stone.get(p.block_hardness), Some(&1.5));
    assert_eq!(
        stone.get(p.block_harvestability),
        Some(&Harvestability {
            effective_tool: Some(ToolClass::Pickaxe),
            harvestable: true,
        })
    );
    assert_eq!(stone.get(p.block_breaking_progress), Some(&0.25));
    assert_eq!(stone.get(p.block_inventory), None);

    let chest = look(Hit::Block(scene.chest));
    assert_eq!(chest.get(p.block_hardness), Some(&2.5));
    assert_eq!(
        chest.get(p.block_harvestability),
        Some(&Harvestability {
            effective_tool: Some(ToolClass::Axe),
            harvestable: false,
        })
    );
    assert_eq!(
        chest.get(p.block_inventory),
        Some(&vec![ItemStack::new("diamond", 3), ItemStack::new("bread", 12)])
    );
    assert_eq!(chest.get(p.block_breaking_progress), None);

    let tank = look(Hit::Block(scene.tank));
    assert_eq!(
        tank.get(p.block_fluid_storage),
        Some(&vec![FluidTank {
            fluid: "lava".to_string(),
            amount: 4000,
            capacity: 8000,
        }])
    );

    let water = look(Hit::Block(scene.water));
    assert_eq!(water.get(p.fluid_viscosity), Some(&1000));
    assert_eq!(water.get(p.block_hardness), None);

    let zombie = look(Hit::Entity(scene.zombie));
    assert_eq!(zombie.get(p.entity_health), Some(&20.0));
    assert_eq!(
        zombie.get(p.entity_status_effects),
        Some(&vec![StatusEffect {
            effect: "speed".to_string(),
            amplifier: 1,
            remaining_ticks: 600,
        }])
    );

    let dragon = look(Hit::Entity(scene.dragon_part));
    assert_eq!(dragon.get(p.entity_health), Some(&200.0));
    assert_eq!(dragon.get(p.entity_status_effects), None);

    let alex = look(Hit::Entity(scene.player));
    assert_eq!(alex.get(p.player_ping), Some(&85));
    assert_eq!(alex.get(p.entity_health), Some(&20.0));
}
