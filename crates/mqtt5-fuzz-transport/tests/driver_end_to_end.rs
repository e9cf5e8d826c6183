//! Whole runs: transport, reference client and driver together.

use mqtt5_fuzz_transport::{
    ClientEvent, ClientOptions, EventHandler, FuzzConfig, FuzzMode, RawPacketBuilder,
    ReferenceClient, Result, RunDriver, SeedCorpus, StepClient, StepOutcome, StreamTransport,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn every_dynamic_seed_runs_to_completion() {
    let driver = RunDriver::new(
        FuzzConfig::default()
            .with_autopilot(true)
            .with_mode(FuzzMode::Dynamic)
            .with_step_count(64),
    );

    for seed in SeedCorpus::generate().unwrap().seeds() {
        let Some(&selector) = seed.data.first() else {
            continue;
        };
        if !seed.name.starts_with("dyn_") {
            continue;
        }
        let report = driver.run_reference(seed.data.clone()).unwrap();
        assert_eq!(report.effective_mode, FuzzMode::from_selector(selector), "{}", seed.name);
        assert_eq!(report.steps, 64);
        assert_eq!(report.step_errors, 0, "{}", seed.name);
        assert!(report.transport.bytes_from_input <= seed.data.len() - 1);
    }
}

#[test]
fn fragmented_reads_deliver_the_same_frames() {
    let seed = SeedCorpus::generate().unwrap()
        .get("coalesced_connack_publish_pingresp.bin")
        .unwrap()
        .data
        .clone();

    let whole = RunDriver::new(FuzzConfig::default().with_step_count(64))
        .run_reference(seed.clone())
        .unwrap();
    let fragmented = RunDriver::new(
        FuzzConfig::default()
            .with_fragment_cap(1)
            .with_step_count(64),
    )
    .run_reference(seed.clone())
    .unwrap();

    assert_eq!(whole.outcome.frames_handled, 3);
    assert_eq!(fragmented.outcome.frames_handled, 3);
    assert_eq!(whole.outcome.errors, 0);
    assert_eq!(fragmented.outcome.errors, 0);
    assert_eq!(fragmented.transport.bytes_from_input, seed.len());
}

#[test]
fn refused_connack_counts_as_session_error() {
    let driver = RunDriver::new(FuzzConfig::default().with_step_count(8));
    let report = driver
        .run_reference(RawPacketBuilder::connack(false, 5))
        .unwrap();

    assert_eq!(report.outcome.errors, 1);
    assert_eq!(report.step_errors, 0);
}

#[test]
fn autopilot_drives_qos2_flow_without_input() {
    let driver = RunDriver::new(
        FuzzConfig::default()
            .with_autopilot(true)
            .with_mode(FuzzMode::Connected)
            .with_step_count(16),
    );
    let mut input = RawPacketBuilder::pubrec(2);
    input.extend(RawPacketBuilder::pingresp());

    let report = driver.run_reference(input).unwrap();
    // CONNACK, SUBACK, then PUBCOMP for the PUBREL answering PUBREC.
    assert_eq!(report.transport.replies, 3);
    assert_eq!(report.outcome.errors, 0);
}

struct RecordingClient {
    inner: ReferenceClient,
    events: Rc<RefCell<Vec<String>>>,
}

impl StepClient for RecordingClient {
    fn step(&mut self) -> Result<StepOutcome> {
        self.inner.step()
    }

    fn register_event_handler(&mut self, _handler: EventHandler) {
        let events = Rc::clone(&self.events);
        self.inner.register_event_handler(move |event: &ClientEvent| {
            let label = match event {
                ClientEvent::Connected { .. } => "connected",
                ClientEvent::Subscribed { .. } => "subscribed",
                ClientEvent::Published { .. } => "published",
                _ => return,
            };
            events.borrow_mut().push(label.to_string());
        });
    }

    fn destroy(self: Box<Self>) -> Result<()> {
        let mut inner = self.inner;
        inner.destroy()
    }
}

#[test]
fn custom_client_receives_the_transport() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let driver = RunDriver::new(
        FuzzConfig::default()
            .with_autopilot(true)
            .with_mode(FuzzMode::Connected)
            .with_step_count(8),
    );

    driver
        .run_once(RawPacketBuilder::pubrec(2), move |transport: Box<dyn StreamTransport>, mode| {
            let options = ClientOptions::for_mode(mode).with_client_id("recorder");
            Ok(Box::new(RecordingClient {
                inner: ReferenceClient::new(transport, options),
                events: sink,
            }) as Box<dyn StepClient>)
        })
        .unwrap();

    assert_eq!(*events.borrow(), ["connected", "subscribed", "published"]);
}
