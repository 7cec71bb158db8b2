//! End-to-end observation scenarios on the simulated host.
//!
//! Each test wires a detector, a regulator, and (where relevant) an
//! observation session to [`SimulatedHost`] and drives time with a
//! [`VirtualClock`], so every timing assertion is exact.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sizewatch_core::{
    ConfigurationError, ElementId, LifecycleError, MechanismKind, Size, TimeSource, VirtualClock,
    WallClock,
};
use sizewatch_harness::{Delivery, Recorder, SimulatedHost};
use sizewatch_runtime::{
    Detector, DetectorConfig, ObservationSession, ObserverDetector, Regulator, ScrollDetector,
    SessionConfig, SizeOnce,
};

// ── Helpers ───────────────────────────────────────────────────────────────

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn square(side: f64) -> Size {
    Size::new(side, side)
}

fn at(millis: u64, side: f64) -> Delivery {
    Delivery {
        at: ms(millis),
        size: square(side),
    }
}

fn observer(host: &SimulatedHost, clock: &VirtualClock, regulator: Regulator) -> Rc<dyn Detector> {
    ObserverDetector::create(
        host.shared(),
        clock.source(),
        DetectorConfig::default().with_regulator(regulator),
    )
    .expect("simulated host supports the observer mechanism")
}

fn scroll(host: &SimulatedHost, clock: &VirtualClock, regulator: Regulator) -> Rc<dyn Detector> {
    ScrollDetector::create(
        host.shared(),
        clock.source(),
        DetectorConfig::default().with_regulator(regulator),
    )
}

/// Count propagated changes on a session.
fn propagation_counter(
    session: &ObservationSession,
) -> (Rc<Cell<u32>>, sizewatch_runtime::Subscription) {
    let count = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&count);
    let sub = session.subscribe(move |_| sink.set(sink.get() + 1));
    (count, sub)
}

// ── One-shot detector ─────────────────────────────────────────────────────

#[test]
fn size_once_reports_initial_size_and_ignores_resizes() {
    let host = SimulatedHost::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::size_once(&host);

    session.attach(element).unwrap();
    assert_eq!(session.size(), square(600.0));

    host.resize(element, square(700.0));
    assert_eq!(session.size(), square(600.0));
    assert_eq!(session.version(), 1);
    assert_eq!(host.listener_count(), 0);
}

// ── Ongoing detectors without regulation ──────────────────────────────────

#[test]
fn unregulated_observer_forwards_immediately_and_dedups() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let recorder = Recorder::new(&clock);
    let detector = observer(&host, &clock, Regulator::none());

    detector.observe(element, recorder.callback());
    host.resize(element, square(700.0));
    host.resize(element, square(700.0));
    host.nudge(element);

    assert_eq!(recorder.deliveries(), vec![at(0, 600.0), at(0, 700.0)]);
    assert_eq!(clock.pending_timers(), 0);
}

#[test]
fn unregulated_scroll_detector_updates_session() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::new(scroll(&host, &clock, Regulator::none()));

    session.attach(element).unwrap();
    host.resize(element, square(700.0));
    assert_eq!(session.size(), square(700.0));
}

#[test]
fn identical_reports_propagate_once_through_session() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::new(observer(&host, &clock, Regulator::none()));
    let (count, _sub) = propagation_counter(&session);

    session.attach(element).unwrap();
    host.resize(element, square(700.0));
    host.resize(element, square(700.0));

    assert_eq!(count.get(), 2);
    assert_eq!(session.size(), square(700.0));
}

#[test]
fn repeated_unmeasurable_size_is_deduplicated() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let recorder = Recorder::new(&clock);
    let detector = observer(&host, &clock, Regulator::none());

    detector.observe(element, recorder.callback());
    host.resize(element, Size::new(f64::NAN, 700.0));
    host.resize(element, Size::new(f64::NAN, 700.0));
    host.nudge(element);

    assert_eq!(
        recorder.sizes(),
        vec![square(600.0), Size::new(f64::NAN, 700.0)]
    );
}

// ── Throttle ──────────────────────────────────────────────────────────────

#[test]
fn throttle_delivers_latest_size_at_frame_boundary() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let recorder = Recorder::new(&clock);
    let detector = observer(&host, &clock, Regulator::throttle(ms(250)));

    detector.observe(element, recorder.callback());
    host.resize_all(square(800.0));
    clock.advance(ms(100));
    host.resize_all(square(700.0));
    clock.advance(ms(100));
    assert_eq!(recorder.deliveries(), vec![at(0, 600.0)]);

    clock.advance(ms(100));
    assert_eq!(recorder.deliveries(), vec![at(0, 600.0), at(250, 700.0)]);
}

#[test]
fn throttled_session_does_not_update_before_frame_elapses() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::new(observer(&host, &clock, Regulator::throttle(ms(250))));
    session.attach(element).unwrap();
    let (count, _sub) = propagation_counter(&session);

    host.resize_all(square(800.0));
    clock.advance(ms(100));
    host.resize_all(square(700.0));
    clock.advance(ms(100));

    assert_eq!(count.get(), 0);
    assert_eq!(session.size(), square(600.0));
}

#[test]
fn throttled_resize_back_to_original_size_causes_no_update() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::new(observer(&host, &clock, Regulator::throttle(ms(250))));
    session.attach(element).unwrap();
    let (count, _sub) = propagation_counter(&session);

    host.resize_all(square(800.0));
    clock.advance(ms(100));
    host.resize_all(square(600.0));
    clock.advance(ms(200));

    // The throttle fired with 600x600, which the session already holds.
    assert_eq!(clock.pending_timers(), 0);
    assert_eq!(count.get(), 0);
}

#[test]
fn throttled_session_updates_after_frame_elapses() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::new(observer(&host, &clock, Regulator::throttle(ms(250))));
    session.attach(element).unwrap();

    host.resize_all(square(800.0));
    clock.advance(ms(100));
    host.resize_all(square(700.0));
    clock.advance(ms(200));

    assert_eq!(session.size(), square(700.0));
    assert_eq!(session.version(), 2);
}

// ── Debounce ──────────────────────────────────────────────────────────────

#[test]
fn debounced_session_waits_for_quiet_period() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let mut session = ObservationSession::new(observer(&host, &clock, Regulator::debounce(ms(200))));
    session.attach(element).unwrap();
    let (count, _sub) = propagation_counter(&session);

    host.resize_all(square(800.0));
    clock.advance(ms(120));
    host.resize_all(square(700.0));
    clock.advance(ms(120));
    assert_eq!(count.get(), 0);

    clock.advance(ms(100));
    assert_eq!(count.get(), 1);
    assert_eq!(session.size(), square(700.0));
}

#[test]
fn debounce_burst_delivers_last_size_once() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let recorder = Recorder::new(&clock);
    let detector = scroll(&host, &clock, Regulator::debounce(ms(200)));

    detector.observe(element, recorder.callback());
    for side in [900.0, 800.0, 700.0] {
        host.resize(element, square(side));
        clock.advance(ms(100));
    }
    clock.advance(ms(250));

    assert_eq!(recorder.deliveries(), vec![at(0, 600.0), at(400, 700.0)]);
}

// ── Teardown and cancellation ─────────────────────────────────────────────

#[test]
fn unobserve_twice_leaves_nothing_alive() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let detectors: Vec<Rc<dyn Detector>> = vec![
        SizeOnce::create(&host),
        scroll(&host, &clock, Regulator::debounce(ms(100))),
        observer(&host, &clock, Regulator::throttle(ms(250))),
        observer(&host, &clock, Regulator::none()),
    ];

    for detector in detectors {
        let element = host.mount(square(600.0));
        let recorder = Recorder::new(&clock);
        detector.observe(element, recorder.callback());
        host.resize(element, square(640.0));

        detector.unobserve(element);
        detector.unobserve(element);

        assert_eq!(clock.pending_timers(), 0);
        assert_eq!(host.listener_count(), 0);
        let delivered = recorder.len();
        host.resize(element, square(10.0));
        clock.advance(ms(1_000));
        assert_eq!(recorder.len(), delivered);
    }
}

#[test]
fn unobserve_cancels_pending_debounce() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let recorder = Recorder::new(&clock);
    let detector = observer(&host, &clock, Regulator::debounce(ms(100)));

    detector.observe(element, recorder.callback());
    host.resize(element, square(700.0));
    clock.advance(ms(99));
    detector.unobserve(element);
    clock.advance(ms(1_000));

    assert_eq!(recorder.sizes(), vec![square(600.0)]);
}

#[test]
fn detach_with_pending_throttle_resets_and_stays_reset() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let config = SessionConfig::default().with_default_size(square(1.0));
    let mut session = ObservationSession::with_config(
        observer(&host, &clock, Regulator::throttle(ms(250))),
        config,
    );

    session.attach(element).unwrap();
    host.resize(element, square(900.0));
    session.detach().unwrap();
    clock.advance(ms(1_000));

    assert_eq!(session.size(), square(1.0));
    assert!(!session.is_attached());
    assert_eq!(host.listener_count(), 0);
}

#[test]
fn unobserve_of_unknown_element_is_a_no_op() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let detector = scroll(&host, &clock, Regulator::none());
    detector.unobserve(ElementId::new(404));
    assert_eq!(host.mechanisms_created(MechanismKind::Scroll), 0);
}

// ── Session lifecycle ─────────────────────────────────────────────────────

#[test]
fn session_lifecycle_errors() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let a = host.mount(square(100.0));
    let b = host.mount(square(200.0));
    let mut session = ObservationSession::new(scroll(&host, &clock, Regulator::none()));

    assert_eq!(session.detach(), Err(LifecycleError::NotAttached));
    session.attach(a).unwrap();
    assert_eq!(
        session.attach(b),
        Err(LifecycleError::AlreadyAttached {
            current: a,
            requested: b,
        })
    );
    assert_eq!(session.size(), square(100.0));

    session.detach().unwrap();
    session.attach(b).unwrap();
    assert_eq!(session.size(), square(200.0));

    host.resize(a, square(150.0));
    assert_eq!(session.size(), square(200.0));
}

#[test]
fn one_mechanism_serves_many_sessions() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let detector = scroll(&host, &clock, Regulator::none());
    assert_eq!(host.mechanisms_created(MechanismKind::Scroll), 0);

    let elements: Vec<ElementId> = (1..=3u32).map(|i| host.mount(square(f64::from(i)))).collect();
    let mut sessions: Vec<ObservationSession> = elements
        .iter()
        .map(|_| ObservationSession::new(Rc::clone(&detector)))
        .collect();
    for (session, element) in sessions.iter_mut().zip(&elements) {
        session.attach(*element).unwrap();
    }
    assert_eq!(host.mechanisms_created(MechanismKind::Scroll), 1);
    assert_eq!(host.listener_count(), 3);

    host.resize(elements[1], square(50.0));
    let sizes: Vec<Size> = sessions.iter().map(ObservationSession::size).collect();
    assert_eq!(sizes, vec![square(1.0), square(50.0), square(3.0)]);

    drop(sessions);
    assert_eq!(host.listener_count(), 0);
}

#[test]
fn concrete_detectors_count_observed_elements() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let a = host.mount(square(100.0));
    let b = host.mount(square(200.0));
    let by_observer = Rc::new(
        ObserverDetector::try_new(host.shared(), clock.source(), DetectorConfig::default())
            .unwrap(),
    );
    let by_scroll = Rc::new(
        ScrollDetector::try_new(host.shared(), clock.source(), DetectorConfig::default()).unwrap(),
    );
    assert_eq!(by_observer.observed_count(), 0);

    let mut first = ObservationSession::new(by_observer.clone());
    let mut second = ObservationSession::new(by_observer.clone());
    first.attach(a).unwrap();
    second.attach(b).unwrap();
    by_scroll.observe(a, Recorder::new(&clock).callback());
    assert_eq!(by_observer.observed_count(), 2);
    assert_eq!(by_scroll.observed_count(), 1);

    first.detach().unwrap();
    assert_eq!(by_observer.observed_count(), 1);
    drop(second);
    by_scroll.unobserve(a);
    assert_eq!(by_observer.observed_count(), 0);
    assert_eq!(by_scroll.observed_count(), 0);
    assert_eq!(host.listener_count(), 0);
}

#[test]
fn observing_twice_keeps_a_single_subscription() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let first = Recorder::new(&clock);
    let second = Recorder::new(&clock);
    let detector = scroll(&host, &clock, Regulator::debounce(ms(50)));

    detector.observe(element, first.callback());
    host.resize(element, square(610.0));
    detector.observe(element, second.callback());
    assert_eq!(host.listener_count(), 1);
    assert_eq!(clock.pending_timers(), 0);

    host.resize(element, square(620.0));
    clock.advance(ms(50));
    assert_eq!(first.sizes(), vec![square(600.0)]);
    assert_eq!(second.sizes(), vec![square(610.0), square(620.0)]);
}

#[test]
fn vanished_element_stops_reporting() {
    let host = SimulatedHost::new();
    let clock = VirtualClock::new();
    let element = host.mount(square(600.0));
    let recorder = Recorder::new(&clock);
    let detector = scroll(&host, &clock, Regulator::none());

    detector.observe(element, recorder.callback());
    host.unmount(element);
    host.nudge(element);
    assert_eq!(recorder.len(), 1);
}

// ── Environment ───────────────────────────────────────────────────────────

#[test]
fn headless_host_yields_inert_detectors() {
    let host = SimulatedHost::headless();
    let clock = VirtualClock::new();

    let by_scroll = scroll(&host, &clock, Regulator::none());
    let by_observer =
        ObserverDetector::create(host.shared(), clock.source(), DetectorConfig::default())
            .expect("headless hosts degrade instead of failing");
    let once = SizeOnce::create(&host);

    for detector in [by_scroll, by_observer, once] {
        let mut session = ObservationSession::new(detector);
        session.attach(ElementId::new(1)).unwrap();
        assert_eq!(session.size(), Size::ZERO);
        session.detach().unwrap();
    }
}

#[test]
fn missing_observer_fails_at_construction() {
    let host = SimulatedHost::without_observer();
    let clock = VirtualClock::new();

    let err = ObserverDetector::create(host.shared(), clock.source(), DetectorConfig::default())
        .err()
        .expect("observer mechanism is unavailable");
    assert_eq!(
        err,
        ConfigurationError::MechanismUnavailable(MechanismKind::Observer)
    );

    // Recover by choosing the scroll mechanism.
    let element = host.mount(square(300.0));
    let mut session = ObservationSession::new(scroll(&host, &clock, Regulator::none()));
    session.attach(element).unwrap();
    host.resize(element, square(320.0));
    assert_eq!(session.size(), square(320.0));
}

#[test]
fn wall_clock_host_loop_drives_regulated_delivery() {
    let host = SimulatedHost::new();
    let clock = Rc::new(WallClock::new());
    let time: Rc<dyn TimeSource> = clock.clone();
    let element = host.mount(square(600.0));
    let detector = ScrollDetector::create(
        host.shared(),
        time,
        DetectorConfig::default().with_regulator(Regulator::debounce(Duration::ZERO)),
    );
    let mut session = ObservationSession::new(detector);

    session.attach(element).unwrap();
    host.resize(element, square(700.0));
    assert_eq!(session.size(), square(600.0));
    assert_eq!(clock.time_until_next(), Some(Duration::ZERO));

    clock.run_due();
    assert_eq!(session.size(), square(700.0));
}
