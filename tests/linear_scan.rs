use tile_regalloc::entity::EntityRef;
use tile_regalloc::ir::{Allocation, Node, RegSpec, SpillArea, SpillSlot, Tile, TileList, TileOp};
use tile_regalloc::isa::registers::x64;
use tile_regalloc::isa::{StorageClass, TargetDescriptor};
use tile_regalloc::regalloc::Stats;
use tile_regalloc::settings::{self, Flags};
use tile_regalloc::{AllocError, Context};

fn flags() -> Flags {
    let mut b = settings::builder();
    b.enable_verifier(true);
    Flags::new(b)
}

fn n(i: usize) -> Node {
    Node::new(i)
}

fn names(list: &TileList) -> Vec<String> {
    list.iter().map(|t| t.op.to_string()).collect()
}

fn run(target: &TargetDescriptor, list: &mut TileList) -> Result<Context, AllocError> {
    let _ = env_logger::try_init();
    let mut ctx = Context::new();
    ctx.run(target, &flags(), list, &mut SpillArea::new())?;
    Ok(ctx)
}

/// Eight values defined back to back, then used once each in definition order.
fn eight_values() -> TileList {
    let mut list = TileList::new();
    for i in 0..8 {
        list.push(Tile::value("def", n(i), &[]));
    }
    for i in 0..8 {
        list.push(Tile::effect("use", n(8 + i), &[n(i)]));
    }
    list
}

#[test]
fn no_spills_with_enough_registers() {
    let mut list = eight_values();
    let ctx = run(&TargetDescriptor::with_gprs(8), &mut list).unwrap();
    assert_eq!(ctx.stats().spills, 0);
    assert_eq!(list.len(), 16);
    assert!(list.iter().all(|t| !t.op.is_synthetic()));

    // Every use reads the register its value was defined in.
    for i in 0..8 {
        assert!(list[i].alloc(0).is_some());
        assert_eq!(list[8 + i].alloc(1), list[i].alloc(0));
    }
}

#[test]
fn eight_values_four_registers() {
    let mut list = eight_values();
    let mut area = SpillArea::new();
    let mut ctx = Context::new();
    ctx.run(&TargetDescriptor::with_gprs(4), &flags(), &mut list, &mut area)
        .unwrap();

    let stats = *ctx.stats();
    assert_eq!(stats.spills, 4);
    assert_eq!(stats.loads, 4);
    assert_eq!(stats.stores, 4);
    assert_eq!(stats.spill_top, 32);
    assert_eq!(area.top(), 32);
    assert_eq!(list.len(), 24);

    // The values ending last are the ones spilled.
    let spilled: Vec<Node> = ctx.spilled().map(|lr| lr.node).collect();
    assert_eq!(spilled, [n(3), n(4), n(5), n(6)]);

    for (pos, tile) in list.iter().enumerate() {
        match tile.op {
            TileOp::Store(_) => {
                let def = &list[pos - 1];
                assert_eq!(def.node, tile.node, "store at {pos} follows its definition");
                assert_eq!(def.alloc(0), tile.alloc(1));
            }
            TileOp::Load(_) => {
                let user = &list[pos + 1];
                assert_eq!(user.operands[1].source, Some(tile.node));
                assert_eq!(user.alloc(1), tile.alloc(0));
            }
            _ => {}
        }
    }
}

#[test]
fn copies_collapse() {
    // b := const; a := b; c := a; use(c)
    let mut list: TileList = [
        Tile::value("const", n(0), &[]),
        Tile::copy(n(1), n(0)),
        Tile::copy(n(2), n(1)),
        Tile::effect("use", n(3), &[n(2)]),
    ]
    .into_iter()
    .collect();
    let ctx = run(&TargetDescriptor::with_gprs(2), &mut list).unwrap();
    assert_eq!(ctx.live_ranges().count(), 1);
    assert_eq!(list[3].alloc(1), list[0].alloc(0));
    // Copies don't get a location of their own.
    assert_eq!(list[1].alloc(0), None);
}

#[test]
fn select_shares_one_range() {
    let mut list: TileList = [
        Tile::value("cond", n(0), &[]),
        Tile::value("left", n(1), &[]),
        Tile::value("right", n(2), &[]),
        Tile::effect("br", n(3), &[n(0)]),
        Tile::select(n(4), n(1), n(2)),
        Tile::effect("use", n(5), &[n(4)]),
    ]
    .into_iter()
    .collect();
    let ctx = run(&TargetDescriptor::with_gprs(4), &mut list).unwrap();

    let lr = ctx.liveness().range_of(n(4)).unwrap();
    assert_eq!(lr.node, n(1));
    let refs: Vec<_> = lr.refs().iter().map(|r| (r.tile, r.slot)).collect();
    assert_eq!(refs, [(1, 0), (2, 0), (5, 1)]);
    assert_eq!(list[1].alloc(0), list[2].alloc(0));
    assert_eq!(list[5].alloc(1), list[1].alloc(0));
    // The range emptied by the merge isn't counted.
    assert_eq!(ctx.stats().live_ranges, 2);
    assert_eq!(ctx.liveness().ranges().len(), 3);
}

#[test]
fn sequence_yields_last() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::value("b", n(1), &[]),
        Tile::sequence(n(2), &[n(0), n(1)]),
        Tile::effect("use", n(3), &[n(2)]),
    ]
    .into_iter()
    .collect();
    run(&TargetDescriptor::with_gprs(2), &mut list).unwrap();
    assert_eq!(list[3].alloc(1), list[1].alloc(0));
}

#[test]
fn call_spills_live_values() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::value("b", n(1), &[]),
        Tile::arglist(n(2), &[n(0)]),
        Tile::call(n(3), n(2), true),
        Tile::effect("use", n(4), &[n(1), n(3)]),
    ]
    .into_iter()
    .collect();
    let ctx = run(&TargetDescriptor::with_gprs(4), &mut list).unwrap();

    // `a` dies at the argument list, `b` lives across the call.
    assert_eq!(ctx.stats().spills, 1);
    assert_eq!(ctx.spilled().next().unwrap().node, n(1));
    assert_eq!(
        names(&list),
        ["a", "b", "store[spill+0]", "arglist", "call", "load[spill+0]", "use"]
    );
    assert_eq!(list[3].alloc(1), Some(Allocation::Reg(StorageClass::Gpr, 0)));
    assert_eq!(list[3].alloc(1), list[0].alloc(0));
    assert_eq!(list[2].alloc(1), list[1].alloc(0));
    assert_eq!(list[6].alloc(1), list[5].alloc(0));
    assert!(list[4].alloc(0).is_some());
}

#[test]
fn arguments_bound_to_spill_slot() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::value("b", n(1), &[]),
        Tile::value("c", n(2), &[]),
        Tile::effect("use", n(3), &[n(1), n(2)]),
        Tile::arglist(n(4), &[n(0)]),
        Tile::call(n(5), n(4), false),
    ]
    .into_iter()
    .collect();
    let ctx = run(&TargetDescriptor::with_gprs(2), &mut list).unwrap();

    assert_eq!(ctx.stats().spills, 1);
    assert_eq!(ctx.stats().loads, 0);
    assert_eq!(
        names(&list),
        ["a", "store[spill+0]", "b", "c", "use", "arglist", "call"]
    );
    // The argument is passed in memory instead of being reloaded.
    assert_eq!(list[5].alloc(1), Some(Allocation::Stack(SpillSlot::new(0))));
}

#[test]
fn nonvolatile_survives_call() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]).with_spec(0, RegSpec::Fixed(x64::R12)),
        Tile::arglist(n(1), &[]),
        Tile::call(n(2), n(1), false),
        Tile::effect("use", n(3), &[n(0)]).with_spec(1, RegSpec::Fixed(x64::R12)),
    ]
    .into_iter()
    .collect();
    let ctx = run(&TargetDescriptor::x64(), &mut list).unwrap();
    assert_eq!(ctx.stats().spills, 0);
    let r12 = Some(Allocation::Reg(StorageClass::Nvr, x64::R12));
    assert_eq!(list[0].alloc(0), r12);
    assert_eq!(list[3].alloc(1), r12);
}

#[test]
fn nonvolatile_reused_after_end() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]).with_spec(0, RegSpec::Fixed(x64::R12)),
        Tile::effect("use", n(1), &[n(0)]),
        Tile::value("b", n(2), &[]).with_spec(0, RegSpec::Fixed(x64::R12)),
        Tile::effect("use", n(3), &[n(2)]),
    ]
    .into_iter()
    .collect();
    run(&TargetDescriptor::x64(), &mut list).unwrap();
    assert_eq!(list[1].alloc(1), list[3].alloc(1));
}

#[test]
fn fixed_volatile_register() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]).with_spec(0, RegSpec::Fixed(x64::RAX)),
        Tile::effect("use", n(1), &[n(0)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::x64(), &mut list).err();
    assert_eq!(
        err,
        Some(AllocError::FixedRegisterConflict {
            node: n(0),
            reg: x64::RAX
        })
    );
}

#[test]
fn overlapping_pins() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]).with_spec(0, RegSpec::Fixed(x64::R12)),
        Tile::value("b", n(1), &[]).with_spec(0, RegSpec::Fixed(x64::R12)),
        Tile::effect("use", n(2), &[n(0)]),
        Tile::effect("use", n(3), &[n(1)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::x64(), &mut list).err();
    assert_eq!(
        err,
        Some(AllocError::FixedRegisterConflict {
            node: n(1),
            reg: x64::R12
        })
    );
    // Nothing was inserted into the failed list.
    assert_eq!(list.len(), 4);
    assert_eq!(list.pending_edits(), 0);
}

#[test]
fn fixed_use_elsewhere() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::effect("use", n(1), &[n(0)]).with_spec(1, RegSpec::Fixed(1)),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::with_gprs(2), &mut list).err();
    assert_eq!(
        err,
        Some(AllocError::FixedUseRequirement {
            tile: 1,
            slot: 1,
            reg: 1
        })
    );
}

#[test]
fn no_registers_in_class() {
    let mut list: TileList = [
        Tile::value("f", n(0), &[]).with_class(StorageClass::Num),
        Tile::effect("use", n(1), &[n(0)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::with_gprs(2), &mut list).err();
    assert_eq!(err, Some(AllocError::NoRegisters(StorageClass::Num)));
}

#[test]
fn nonvolatile_class_without_requirement() {
    // Non-volatile registers are only handed out to pinned values.
    let mut list: TileList = [
        Tile::value("a", n(0), &[]).with_class(StorageClass::Nvr),
        Tile::effect("use", n(1), &[n(0)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::x64(), &mut list).err();
    assert_eq!(err, Some(AllocError::NoRegisters(StorageClass::Nvr)));
}

#[test]
fn select_across_classes() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::value("f", n(1), &[]).with_class(StorageClass::Num),
        Tile::select(n(2), n(0), n(1)),
        Tile::effect("use", n(3), &[n(2)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::x64(), &mut list).err();
    assert_eq!(
        err,
        Some(AllocError::StorageClassMismatch {
            tile: 2,
            left: StorageClass::Gpr,
            right: StorageClass::Num
        })
    );
}

#[test]
fn select_between_pins_without_verifier() {
    let _ = env_logger::try_init();
    let mut list: TileList = [
        Tile::value("a", n(0), &[]).with_spec(0, RegSpec::Fixed(x64::R12)),
        Tile::value("b", n(1), &[]).with_spec(0, RegSpec::Fixed(x64::R13)),
        Tile::select(n(2), n(0), n(1)),
        Tile::effect("use", n(3), &[n(2)]),
    ]
    .into_iter()
    .collect();
    let mut b = settings::builder();
    b.enable_verifier(false);
    let mut ctx = Context::new();
    let err = ctx
        .run(&TargetDescriptor::x64(), &Flags::new(b), &mut list, &mut SpillArea::new())
        .err();
    assert_eq!(
        err,
        Some(AllocError::FixedRegisterConflict {
            node: n(1),
            reg: x64::R13
        })
    );
}

#[test]
fn fixed_use_of_num_value() {
    // The num value gets x0, which is not rax.
    let mut list: TileList = [
        Tile::value("f", n(0), &[]).with_class(StorageClass::Num),
        Tile::effect("use", n(1), &[n(0)]).with_spec(1, RegSpec::Fixed(x64::RAX)),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::x64(), &mut list).err();
    assert_eq!(
        err,
        Some(AllocError::FixedUseRequirement {
            tile: 1,
            slot: 1,
            reg: x64::RAX
        })
    );
}

#[test]
fn missing_operands() {
    let mut copy = Tile::copy(n(1), n(0));
    copy.operands.truncate(1);
    let mut list: TileList = [Tile::value("a", n(0), &[]), copy].into_iter().collect();
    let err = run(&TargetDescriptor::with_gprs(2), &mut list).err();
    assert_eq!(err, Some(AllocError::MissingOperand { tile: 1, slot: 1 }));

    let mut user = Tile::effect("use", n(1), &[n(0)]);
    user.operands[1].source = None;
    let mut list: TileList = [Tile::value("a", n(0), &[]), user].into_iter().collect();
    let err = run(&TargetDescriptor::with_gprs(2), &mut list).err();
    assert_eq!(err, Some(AllocError::MissingOperand { tile: 1, slot: 1 }));
}

#[test]
fn out_of_registers() {
    // A single tile reading two values can't be served by one register.
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::value("b", n(1), &[]),
        Tile::effect("use", n(2), &[n(0), n(1)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::with_gprs(1), &mut list).err();
    assert_eq!(
        err,
        Some(AllocError::OutOfRegisters {
            class: StorageClass::Gpr,
            tile: 2
        })
    );
    assert_eq!(list.len(), 3);
}

#[test]
fn undefined_use() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::effect("use", n(1), &[n(7)]),
    ]
    .into_iter()
    .collect();
    let err = run(&TargetDescriptor::with_gprs(2), &mut list).err();
    assert_eq!(err, Some(AllocError::UndefinedValue { tile: 1, node: n(7) }));
}

#[test]
fn empty_list() {
    let mut list = TileList::new();
    let ctx = run(&TargetDescriptor::with_gprs(2), &mut list).unwrap();
    assert_eq!(*ctx.stats(), Stats::default());
}

#[test]
fn context_reuse() {
    let _ = env_logger::try_init();
    let target = TargetDescriptor::with_gprs(4);
    let mut ctx = Context::new();

    let mut first = eight_values();
    ctx.run(&target, &flags(), &mut first, &mut SpillArea::new())
        .unwrap();
    assert_eq!(ctx.stats().spills, 4);

    // A second, smaller list sees none of the first one's state.
    let mut second: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::effect("use", n(1), &[n(0)]),
    ]
    .into_iter()
    .collect();
    ctx.run(&target, &flags(), &mut second, &mut SpillArea::new())
        .unwrap();
    assert_eq!(ctx.stats().spills, 0);
    assert_eq!(ctx.spilled().count(), 0);
    assert_eq!(ctx.live_ranges().count(), 1);

    ctx.clear();
    assert_eq!(ctx.live_ranges().count(), 0);
}

#[test]
fn text_output() {
    let mut list: TileList = [
        Tile::value("a", n(0), &[]),
        Tile::value("b", n(1), &[]),
        Tile::effect("use", n(2), &[n(0)]),
    ]
    .into_iter()
    .collect();
    run(&TargetDescriptor::with_gprs(1), &mut list).unwrap();
    assert_eq!(
        list.to_string(),
        "    n0:%r0 = a\n    store[spill+0] n0:%r0\n    n1:%r0 = b\n    n0:%r0 = load[spill+0]\n    use n0:%r0\n"
    );
}
