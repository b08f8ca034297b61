//! End-to-end tests driving real Lua modules through the dispatch hooks

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use gameobject::ddf::{Descriptor, DescriptorBuilder, FieldKind};
use gameobject::{
    CollectionId, GameObject, InputAction, InstanceRef, MessageBuffer, NameHash, Register,
    UpdateContext,
};
use glam::{Quat, Vec3};

use crate::{DispatchResult, InputResult, ScriptEnv};

struct Fixture {
    env: ScriptEnv,
    register: Rc<RefCell<Register>>,
    main: CollectionId,
}

impl Fixture {
    fn new() -> Self {
        let register = Rc::new(RefCell::new(Register::new()));
        let main = register.borrow_mut().add_collection("main");
        let env = ScriptEnv::new(register.clone()).unwrap();
        Fixture {
            env,
            register,
            main,
        }
    }

    /// Add an object to the main collection with a sprite and a script
    /// component attached, in that order.
    fn add_object(&self, name: &str) -> InstanceRef {
        let id = self.register.borrow_mut().collection_mut(self.main).add(
            GameObject::new(name)
                .with_component("sprite")
                .with_component("script"),
        );
        InstanceRef {
            collection: self.main,
            id,
        }
    }

    fn drain_message_ids(&self) -> Vec<NameHash> {
        let mut ids = Vec::new();
        while let Some(buffer) = self.register.borrow_mut().poll_message() {
            ids.push(buffer.message_id);
        }
        ids
    }
}

fn hit_descriptor() -> Arc<Descriptor> {
    DescriptorBuilder::new("hit")
        .field("amount", FieldKind::Int32)
        .optional_field("source", FieldKind::String)
        .build()
}

#[test]
fn missing_lifecycle_functions_are_no_ops() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function update(self) end", "update_only.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("solo");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Ok);
    let mut msg = MessageBuffer::named(NameHash::of("ping"), instance);
    assert_eq!(
        fx.env.on_message_component(&component, &mut msg),
        DispatchResult::Ok
    );
    assert_eq!(
        fx.env.on_input_component(&component, &InputAction::pressed("jump")),
        InputResult::Ignored
    );
}

#[test]
fn dt_is_visible_during_update() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function update(self)
                if math.abs(self.dt - 0.25) < 1e-6 then
                    post("dt_ok")
                end
            end
            "#,
            "timer.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("timer");
    fx.env.create_component(&mut world, script, instance).unwrap();

    let result = fx.env.update_component(&world, &UpdateContext::new(0.25));
    assert_eq!(result, DispatchResult::Ok);
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("dt_ok")]);
}

#[test]
fn dt_is_nil_outside_update() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function on_message(self, message_id, message)
                if self.dt == nil then
                    post("no_dt")
                end
            end
            "#,
            "no_dt.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    let mut msg = MessageBuffer::named(NameHash::of("poke"), instance);
    assert_eq!(
        fx.env.on_message_component(&component, &mut msg),
        DispatchResult::Ok
    );
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("no_dt")]);
}

#[test]
fn instances_sharing_a_module_keep_separate_state() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function update(self)
                if self.n == 5 then
                    post("five")
                end
            end
            "#,
            "shared.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let b = fx.add_object("b");
    fx.env.create_component(&mut world, script.clone(), a).unwrap();
    fx.env.create_component(&mut world, script, b).unwrap();

    // only one instance gets the property
    fx.env.set_script_int_property(&world, a, "n", 5);

    let result = fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(result, DispatchResult::Ok);
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("five")]);
}

#[test]
fn builtin_id_shadows_data_store_writes() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                self.id = 999
                if self.id == self.expected then
                    post("shadowed")
                end
            end
            "#,
            "shadow.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();
    fx.env
        .set_script_int_property(&world, instance, "expected", instance.id.as_i64());

    assert_eq!(fx.env.init_component(&component), DispatchResult::Ok);
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("shadowed")]);
}

#[test]
fn context_unbinds_after_runtime_error_and_siblings_still_run() {
    let fx = Fixture::new();
    let bad = fx
        .env
        .new_script(b"function update(self) error('boom') end", "bad.script")
        .unwrap();
    let good = fx
        .env
        .new_script(b"function update(self) post('alive') end", "good.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let b = fx.add_object("b");
    fx.env.create_component(&mut world, bad, a).unwrap();
    fx.env.create_component(&mut world, good, b).unwrap();

    let result = fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(result, DispatchResult::Failed);
    assert!(!fx.env.has_bound_context());
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("alive")]);
}

#[test]
fn typed_message_round_trip_through_dispatch() {
    let fx = Fixture::new();
    fx.env.register_message_type(hit_descriptor());
    let script = fx
        .env
        .new_script(
            br#"
            function update(self)
                post("hit", { amount = 10 })
            end

            function on_message(self, message_id, message)
                if message_id == ident(self, "hit")
                    and message.amount == 10
                    and message.source == "" then
                    post("ok")
                end
            end
            "#,
            "combat.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("fighter");
    fx.env.create_component(&mut world, script, instance).unwrap();

    fx.env.update_component(&world, &UpdateContext::new(0.016));
    let mut buffer = fx.register.borrow_mut().poll_message().unwrap();
    assert_eq!(buffer.message_id, NameHash::of("hit"));
    assert_eq!(buffer.receiver, instance);

    let component = world.find(buffer.receiver).unwrap();
    assert_eq!(
        fx.env.on_message_component(&component, &mut buffer),
        DispatchResult::Ok
    );
    assert!(buffer.is_relocated());
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("ok")]);
}

#[test]
fn named_message_delivers_empty_table() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function on_message(self, message_id, message)
                if message_id == ident(self, "ping") and next(message) == nil then
                    post("pong")
                end
            end
            "#,
            "ping.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    let mut msg = MessageBuffer::named(NameHash::of("ping"), instance);
    assert_eq!(
        fx.env.on_message_component(&component, &mut msg),
        DispatchResult::Ok
    );
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("pong")]);
}

#[test]
fn posting_unregistered_typed_message_fails() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            b"function init(self) post('mystery', { x = 1 }) end",
            "mystery.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Failed);
    assert!(!fx.env.has_bound_context());
    assert_eq!(fx.register.borrow().queued_messages(), 0);
}

#[test]
fn input_consumed_when_script_returns_true() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function on_input(self, action_id, action)
                if action_id == ident(self, "jump")
                    and action.pressed
                    and not action.released
                    and not action.repeated
                    and action.value == 1.0 then
                    return true
                end
                return false
            end
            "#,
            "input.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(
        fx.env.on_input_component(&component, &InputAction::pressed("jump")),
        InputResult::Consumed
    );
    assert_eq!(
        fx.env.on_input_component(&component, &InputAction::pressed("duck")),
        InputResult::Ignored
    );
}

#[test]
fn input_without_return_value_is_ignored() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function on_input(self, action_id, action) end", "quiet.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(
        fx.env.on_input_component(&component, &InputAction::pressed("jump")),
        InputResult::Ignored
    );
}

#[test]
fn input_with_non_boolean_return_is_an_error() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            b"function on_input(self, action_id, action) return 'yes' end",
            "chatty.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(
        fx.env.on_input_component(&component, &InputAction::pressed("jump")),
        InputResult::Error
    );
    assert!(!fx.env.has_bound_context());
}

#[test]
fn input_raising_is_an_error() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            b"function on_input(self, action_id, action) error('nope') end",
            "raise.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(
        fx.env.on_input_component(&component, &InputAction::pressed("jump")),
        InputResult::Error
    );
    assert!(!fx.env.has_bound_context());
}

#[test]
fn visibility_query_uses_bound_view_projection() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function update(self)
                if is_visible(vec3(-0.5, -0.5, -0.5), vec3(0.5, 0.5, 0.5)) then
                    post("seen")
                end
                if not is_visible(vec3(-2, -2, -2), vec3(2, 2, 2)) then
                    post("unseen")
                end
            end
            "#,
            "vis.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    fx.env.create_component(&mut world, script, instance).unwrap();

    // identity view-projection: unit box fits, double box does not
    let result = fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(result, DispatchResult::Ok);
    assert_eq!(
        fx.drain_message_ids(),
        vec![NameHash::of("seen"), NameHash::of("unseen")]
    );
}

#[test]
fn visibility_query_outside_update_fails() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function on_message(self, message_id, message)
                is_visible(vec3(0, 0, 0), vec3(1, 1, 1))
            end
            "#,
            "vis_msg.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    let mut msg = MessageBuffer::named(NameHash::of("poke"), instance);
    assert_eq!(
        fx.env.on_message_component(&component, &mut msg),
        DispatchResult::Failed
    );
}

#[test]
fn transform_accessors_read_and_write_the_object() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                local p = get_position(self)
                if p[1] == 1.0 and p[2] == 2.0 and p[3] == 3.0 then
                    set_position(self, vec3(9, 2, 3))
                end
                local wp = get_world_position(self)
                if wp[1] == 4.0 and wp[2] == 5.0 and wp[3] == 6.0 then
                    post("world_ok")
                end
                local r = get_rotation(self)
                set_rotation(self, quat(r[1], r[2], r[3], r[4]))
            end
            "#,
            "transform.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    {
        let mut reg = fx.register.borrow_mut();
        let object = reg.instance_mut(instance).unwrap();
        object.position = Vec3::new(1.0, 2.0, 3.0);
        object.world_position = Vec3::new(4.0, 5.0, 6.0);
    }
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Ok);
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("world_ok")]);
    let reg = fx.register.borrow();
    let object = reg.instance(instance).unwrap();
    assert_eq!(object.position, Vec3::new(9.0, 2.0, 3.0));
    assert_eq!(object.rotation, Quat::IDENTITY);
}

#[test]
fn post_named_to_resolves_target_and_component_index() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                post_named_to(ident(self, "b"), "script", "nudge")
            end
            "#,
            "sender.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    fx.add_object("b");
    let component = fx.env.create_component(&mut world, script, a).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Ok);
    let buffer = fx.register.borrow_mut().poll_message().unwrap();
    assert_eq!(buffer.message_id, NameHash::of("nudge"));
    assert_eq!(buffer.receiver.id, NameHash::of("b"));
    assert_eq!(buffer.receiver.collection, fx.main);
    // "script" is the second attached component
    assert_eq!(buffer.component_index, 1);
}

#[test]
fn post_named_to_unknown_target_fails() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                post_named_to(ident(self, "ghost"), "script", "nudge")
            end
            "#,
            "sender.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let component = fx.env.create_component(&mut world, script, a).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Failed);
    assert_eq!(fx.register.borrow().queued_messages(), 0);
}

#[test]
fn post_to_collection_crosses_collections() {
    let fx = Fixture::new();
    let other = fx.register.borrow_mut().add_collection("other");
    fx.register
        .borrow_mut()
        .collection_mut(other)
        .add(GameObject::new("c").with_component("script"));
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                post_to_collection("other", ident(self, "c"), "script", "hello")
            end
            "#,
            "cross.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let component = fx.env.create_component(&mut world, script, a).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Ok);
    let buffer = fx.register.borrow_mut().poll_message().unwrap();
    assert_eq!(buffer.receiver.collection, other);
    assert_eq!(buffer.receiver.id, NameHash::of("c"));
    assert_eq!(buffer.component_index, 0);
}

#[test]
fn post_to_unknown_collection_fails() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                post_to_collection("nowhere", ident(self, "c"), "script", "hello")
            end
            "#,
            "lost.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let component = fx.env.create_component(&mut world, script, a).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Failed);
}

#[test]
fn spawn_is_deferred_through_the_spawn_channel() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(
            br#"
            function init(self)
                spawn("rocket", vec3(1, 0, 0), quat_identity())
            end
            "#,
            "launcher.script",
        )
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("launcher");
    let component = fx.env.create_component(&mut world, script, instance).unwrap();

    assert_eq!(fx.env.init_component(&component), DispatchResult::Ok);
    // nothing was instantiated inline
    assert_eq!(fx.register.borrow().collection(fx.main).len(), 1);
    let request = fx.register.borrow_mut().poll_spawn().unwrap();
    assert_eq!(request.prototype, "rocket");
    assert_eq!(request.collection, fx.main);
    assert_eq!(request.position, Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(request.rotation, Quat::IDENTITY);
}

#[test]
fn delete_schedules_removal_instead_of_removing_inline() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function update(self) delete(self) end", "fading.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("fading");
    fx.env.create_component(&mut world, script, instance).unwrap();

    let result = fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(result, DispatchResult::Ok);
    {
        let reg = fx.register.borrow();
        let col = reg.collection(fx.main);
        assert!(col.contains(instance.id));
        assert_eq!(col.pending_deletes(), &[instance.id]);
    }
    let removed = fx
        .register
        .borrow_mut()
        .collection_mut(fx.main)
        .flush_deletes();
    assert_eq!(removed, vec![instance.id]);
    assert!(!fx.register.borrow().collection(fx.main).contains(instance.id));
}

#[test]
fn destroy_component_removes_exactly_one() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function update(self) post('tick') end", "ticker.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let b = fx.add_object("b");
    let c = fx.add_object("c");
    fx.env.create_component(&mut world, script.clone(), a).unwrap();
    let middle = fx.env.create_component(&mut world, script.clone(), b).unwrap();
    fx.env.create_component(&mut world, script, c).unwrap();

    fx.env.destroy_component(&mut world, middle).unwrap();
    assert_eq!(world.len(), 2);
    assert!(world.find(b).is_none());

    let result = fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(result, DispatchResult::Ok);
    assert_eq!(fx.drain_message_ids().len(), 2);
}

#[test]
fn reload_swaps_behavior_for_existing_instances() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function update(self) post('v1') end", "hot.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    fx.env.create_component(&mut world, script.clone(), instance).unwrap();

    fx.env
        .reload_script(&script, b"function update(self) post('v2') end", "hot.script")
        .unwrap();
    fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(fx.drain_message_ids(), vec![NameHash::of("v2")]);
}

#[test]
fn failed_reload_leaves_instances_without_callbacks() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function update(self) post('v1') end", "hot.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let instance = fx.add_object("obj");
    fx.env.create_component(&mut world, script.clone(), instance).unwrap();

    assert!(fx
        .env
        .reload_script(&script, b"function update(self", "hot.script")
        .is_err());
    // destructive: the old update is gone, the tick degrades to a no-op
    let result = fx.env.update_component(&world, &UpdateContext::new(0.016));
    assert_eq!(result, DispatchResult::Ok);
    assert!(fx.drain_message_ids().is_empty());
}

#[test]
fn delete_world_releases_remaining_components() {
    let fx = Fixture::new();
    let script = fx
        .env
        .new_script(b"function update(self) end", "idle.script")
        .unwrap();
    let mut world = fx.env.new_world();
    let a = fx.add_object("a");
    let b = fx.add_object("b");
    fx.env.create_component(&mut world, script.clone(), a).unwrap();
    fx.env.create_component(&mut world, script, b).unwrap();

    fx.env.delete_world(world).unwrap();
}

#[test]
fn property_injection_without_component_is_a_noop() {
    let fx = Fixture::new();
    let world = fx.env.new_world();
    let instance = fx.add_object("obj");
    fx.env.set_script_int_property(&world, instance, "n", 5);
    fx.env.set_script_float_property(&world, instance, "f", 1.5);
    fx.env.set_script_string_property(&world, instance, "s", "x");
    assert!(world.is_empty());
}
