use {
    std::{sync::Arc, time::Duration},
    tokio::time::Instant,
    wrapper_auction::{
        Adapter,
        Options,
        Orchestrator,
        Registry,
        adapter::{GRACE, mocks::FakeAdapter},
        domain::{AuctionContext, PageContext, SlotId, TargetingValue},
    },
};

fn orchestrator(adapters: &[&Arc<FakeAdapter>]) -> Orchestrator {
    observe::tracing::initialize_reentrant("warn,wrapper_auction=debug");
    let mut registry = Registry::new();
    for adapter in adapters {
        registry
            .register(Arc::clone(adapter) as Arc<dyn Adapter>)
            .unwrap();
    }
    Orchestrator::new(registry)
}

fn slots(names: &[&str]) -> Vec<SlotId> {
    names.iter().map(|name| SlotId::from(*name)).collect()
}

fn options(timeout: Duration) -> Options {
    Options::new(timeout)
}

#[tokio::test(start_paused = true)]
async fn two_bidders_merge_their_targeting() {
    let alpha = Arc::new(
        FakeAdapter::new("alpha")
            .with_bid(1.2, &[("a_pb", "1.20"), ("a_adid", "17")])
            .with_delay(Duration::from_millis(120)),
    );
    let beta = Arc::new(
        FakeAdapter::new("beta")
            .with_bid(0.8, &[("b_pb", "0.80")])
            .with_delay(Duration::from_millis(300)),
    );
    let orchestrator = orchestrator(&[&alpha, &beta]);

    let results = orchestrator
        .run_auction(
            slots(&["top"]),
            &PageContext::default(),
            &options(Duration::from_secs(1)),
        )
        .await;

    let top = &results["top"];
    assert_eq!(top.adapters.len(), 2);
    assert!(top.adapters.values().all(|result| result.success));
    assert_eq!(top.targeting.len(), 3);
    assert_eq!(top.targeting["a_pb"], TargetingValue::from("1.20"));
    assert_eq!(top.targeting["b_pb"], TargetingValue::from("0.80"));
    assert_eq!(top.best_bid().unwrap().bidder.as_deref(), Some("alpha"));
    assert_eq!(alpha.applied(), slots(&["top"]));
    assert_eq!(beta.applied(), slots(&["top"]));
    assert_eq!(orchestrator.store().get("top").as_ref(), Some(top));
}

#[tokio::test(start_paused = true)]
async fn unconfigured_adapter_is_absent() {
    let alpha = Arc::new(FakeAdapter::new("alpha").only_for(&["sidebar"]));
    let orchestrator = orchestrator(&[&alpha]);

    let results = orchestrator
        .run_auction(
            slots(&["top"]),
            &PageContext::default(),
            &options(Duration::from_secs(1)),
        )
        .await;

    let top = &results["top"];
    assert!(top.adapters.is_empty());
    assert!(top.targeting.is_empty());
    assert_eq!(alpha.init_count(), 0);
    assert_eq!(alpha.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_adapter_times_out() {
    let slow = Arc::new(
        FakeAdapter::new("slow")
            .with_bid(5.0, &[("s_pb", "5.00")])
            .with_delay(Duration::from_secs(5)),
    );
    let orchestrator = orchestrator(&[&slow]);

    let start = Instant::now();
    let results = orchestrator
        .run_auction(
            slots(&["top"]),
            &PageContext::default(),
            &options(Duration::from_secs(1)),
        )
        .await;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed <= Duration::from_secs(1) + GRACE);

    let result = &results["top"].adapters["slow"];
    assert!(!result.success);
    assert!(result.is_timeout());
    assert_eq!(result.reason.as_deref(), Some("timeout"));
    assert!(results["top"].targeting.is_empty());
    assert!(slow.applied().is_empty());

    // The late answer never reaches the store.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        orchestrator.store().get("top").as_ref(),
        Some(&results["top"])
    );
    assert!(slow.applied().is_empty());
}

#[tokio::test(start_paused = true)]
async fn panicking_adapter_only_fails_its_slot() {
    let left = Arc::new(
        FakeAdapter::new("left")
            .only_for(&["left"])
            .with_bid(1.0, &[("l_pb", "1.00")])
            .with_delay(Duration::from_millis(200)),
    );
    let broken = Arc::new(FakeAdapter::new("broken").only_for(&["middle"]).panicking());
    let right = Arc::new(
        FakeAdapter::new("right")
            .only_for(&["right"])
            .with_bid(2.0, &[("r_pb", "2.00")])
            .with_delay(Duration::from_millis(400)),
    );
    let orchestrator = orchestrator(&[&left, &broken, &right]);

    let start = Instant::now();
    let results = orchestrator
        .run_auction(
            slots(&["left", "middle", "right"]),
            &PageContext::default(),
            &options(Duration::from_secs(1)),
        )
        .await;
    assert!(start.elapsed() < Duration::from_secs(1));

    let middle = &results["middle"].adapters["broken"];
    assert!(!middle.success);
    assert_eq!(
        middle.reason.as_deref(),
        Some("panic: broken vendor library crashed")
    );
    assert!(results["middle"].targeting.is_empty());
    assert!(results["left"].adapters["left"].success);
    assert_eq!(
        results["left"].targeting["l_pb"],
        TargetingValue::from("1.00")
    );
    assert!(results["right"].adapters["right"].success);
    assert_eq!(orchestrator.store().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn auction_is_bounded_by_the_timeout() {
    let names = (0..20).map(|i| format!("adapter-{i}")).collect::<Vec<_>>();
    let adapters = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let adapter = FakeAdapter::new(name).with_bid(1.0, &[]);
            Arc::new(if i % 2 == 0 {
                adapter.hanging()
            } else {
                adapter.with_delay(Duration::from_millis(100 * i as u64))
            })
        })
        .collect::<Vec<_>>();
    let orchestrator = orchestrator(&adapters.iter().collect::<Vec<_>>());
    let slots = (0..50)
        .map(|i| SlotId::from(format!("slot-{i}")))
        .collect::<Vec<_>>();

    let start = Instant::now();
    let results = orchestrator
        .run_auction(
            slots.clone(),
            &PageContext::default(),
            &options(Duration::from_millis(650)),
        )
        .await;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(650));
    assert!(elapsed <= Duration::from_millis(650) + GRACE);

    assert_eq!(results.len(), slots.len());
    for slot in &slots {
        let result = &results[slot];
        assert_eq!(result.adapters.len(), adapters.len());
        let bidders = result.bidders().collect::<Vec<_>>();
        assert_eq!(
            bidders,
            ["adapter-1", "adapter-3", "adapter-5"],
            "slot {slot}"
        );
    }
    // Every adapter got initialized exactly once for all slots.
    assert!(adapters.iter().all(|adapter| adapter.init_count() == 1));
}

#[tokio::test(start_paused = true)]
async fn later_registered_adapter_wins_key_collisions() {
    for (first_delay, second_delay) in [(10, 300), (300, 10)] {
        let first = Arc::new(
            FakeAdapter::new("first")
                .with_bid(3.0, &[("hb_pb", "3.00"), ("first_only", "x")])
                .with_delay(Duration::from_millis(first_delay)),
        );
        let second = Arc::new(
            FakeAdapter::new("second")
                .with_bid(1.0, &[("hb_pb", "1.00")])
                .with_delay(Duration::from_millis(second_delay)),
        );
        let orchestrator = orchestrator(&[&first, &second]);

        let results = orchestrator
            .run_auction(
                slots(&["top"]),
                &PageContext::default(),
                &options(Duration::from_secs(1)),
            )
            .await;

        let top = &results["top"];
        assert_eq!(
            top.adapters.keys().collect::<Vec<_>>(),
            ["first", "second"]
        );
        assert_eq!(top.targeting["hb_pb"], TargetingValue::from("1.00"));
        assert_eq!(top.targeting["first_only"], TargetingValue::from("x"));
    }
}

#[tokio::test(start_paused = true)]
async fn failures_do_not_poison_other_adapters() {
    let failing = Arc::new(FakeAdapter::new("failing").failing("bad gateway"));
    let unloaded = Arc::new(FakeAdapter::new("unloaded").unloaded());
    let bidder = Arc::new(FakeAdapter::new("bidder").with_bid(1.0, &[("b_pb", "1.00")]));
    let orchestrator = orchestrator(&[&failing, &unloaded, &bidder]);

    let results = orchestrator
        .run_auction(
            slots(&["top"]),
            &PageContext::default(),
            &options(Duration::from_secs(1)),
        )
        .await;

    let top = &results["top"];
    assert_eq!(
        top.adapters["failing"].reason.as_deref(),
        Some("bad gateway")
    );
    assert_eq!(
        top.adapters["unloaded"].reason.as_deref(),
        Some("unloaded not loaded")
    );
    assert!(top.adapters["bidder"].success);
    assert_eq!(top.bidders().collect::<Vec<_>>(), ["bidder"]);
    assert!(failing.applied().is_empty());
    assert_eq!(bidder.applied(), slots(&["top"]));
}

#[tokio::test(start_paused = true)]
async fn rerunning_a_slot_replaces_its_result() {
    let alpha = Arc::new(FakeAdapter::new("alpha").with_bid(1.0, &[("a_pb", "1.00")]));
    let orchestrator = orchestrator(&[&alpha]);
    let first = |slot: &SlotId| AuctionContext::new(slot.clone());
    let refresh = |slot: &SlotId| AuctionContext {
        refresh: 2,
        ..AuctionContext::new(slot.clone())
    };
    let options = options(Duration::from_secs(1));

    orchestrator
        .run_auction(slots(&["top", "sidebar"]), &first, &options)
        .await;
    orchestrator
        .run_auction(slots(&["top"]), &refresh, &options)
        .await;

    assert_eq!(orchestrator.store().len(), 2);
    assert_eq!(alpha.init_count(), 1);
    assert_eq!(alpha.request_count(), 3);

    orchestrator.clear_slot(&SlotId::from("sidebar"));
    assert!(orchestrator.store().get("sidebar").is_none());
    assert!(orchestrator.store().get("top").is_some());
    assert_eq!(alpha.cleared(), slots(&["sidebar"]));
}

#[tokio::test(start_paused = true)]
async fn hanging_init_delays_the_batch_once() {
    let stuck = Arc::new(FakeAdapter::new("stuck").hanging_init());
    let bidder = Arc::new(
        FakeAdapter::new("bidder")
            .with_bid(1.0, &[("b_pb", "1.00")])
            .with_delay(Duration::from_millis(300)),
    );
    let orchestrator = orchestrator(&[&stuck, &bidder]);
    let options = options(Duration::from_secs(1)).with_init_timeout(Duration::from_millis(500));
    let slots = slots(&["a", "b", "c", "d"]);

    let start = Instant::now();
    let results = orchestrator
        .run_auction(slots.clone(), &PageContext::default(), &options)
        .await;
    assert!(start.elapsed() <= options.init_timeout + options.timeout);
    assert_eq!(stuck.init_count(), 1);
    for slot in &slots {
        assert_eq!(
            results[slot].adapters["stuck"].reason.as_deref(),
            Some("init failed: timeout")
        );
        assert_eq!(results[slot].bidders().collect::<Vec<_>>(), ["bidder"]);
    }
    assert_eq!(bidder.applied().len(), slots.len());
}
