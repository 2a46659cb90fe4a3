mod common;

use common::{frame, init_logger, ScriptedTransport};
use ems_proto::{BusEvent, Config, EmsNode, Error, TransmitOutcome, TxAction, TxRequest, TxState};

const POLL: [u8; 1] = [0x8B];
const ACK: [u8; 1] = [0x0B];

fn poll(node: &mut EmsNode, port: &mut ScriptedTransport, now: u64) {
    node.on_frame_ready(port, &POLL, now);
}

/// Events other than connection changes.
fn tx_events(node: &mut EmsNode) -> Vec<BusEvent> {
    std::iter::from_fn(|| node.next_event())
        .filter(|e| !matches!(e, BusEvent::ConnectionChanged { .. }))
        .collect()
}

#[test]
fn sends_only_when_polled() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.submit(TxRequest::read(0x08, 0x02)?, 0)?;

    // somebody else's poll
    node.on_frame_ready(&mut port, &[0x97], 1);
    assert!(port.sent.is_empty());
    assert!(!node.status().tx_capable);

    poll(&mut node, &mut port, 2);
    assert!(node.status().tx_capable);
    assert_eq!(port.sent, [vec![0x0B, 0x88, 0x02, 0x00, 0x20, 0xBC]]);
    assert_eq!(port.receive_pauses, 1);
    assert!(port.receive_enabled);
    assert_eq!(node.status().frames_sent, 1);
    assert_eq!(node.status().tx_state, TxState::Waiting);
    Ok(())
}

#[test]
fn idle_poll_ack() {
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    poll(&mut node, &mut port, 0);
    poll(&mut node, &mut port, 250);
    assert_eq!(port.sent, [ACK.to_vec(), ACK.to_vec()]);
    assert_eq!(node.status().poll_interval, Some(250));
    assert_eq!(node.status().frames_sent, 0);

    node.set_poll_enabled(false);
    port.clear();
    poll(&mut node, &mut port, 500);
    assert!(port.sent.is_empty());
}

#[test]
fn one_request_in_flight() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.read(0x08, 0x18, 0)?;
    node.read(0x08, 0x19, 0)?;

    poll(&mut node, &mut port, 1);
    assert_eq!(node.in_flight().unwrap().type_id(), 0x18);
    // still waiting for the answer: only an ack goes out
    poll(&mut node, &mut port, 2);
    assert_eq!(port.last_sent(), Some(&ACK[..]));
    assert_eq!(port.requests().len(), 1);

    node.on_frame_ready(&mut port, &frame(&[0x08, 0x0B, 0x18, 0x00, 0x46]), 3);
    assert!(node.in_flight().is_none());
    assert_eq!(node.status().tx_state, TxState::Idle);
    match tx_events(&mut node).as_slice() {
        [BusEvent::TxSucceeded { request }] => assert_eq!(request.type_id(), 0x18),
        other => panic!("unexpected events {:?}", other),
    }
    // the answer is decoded like any other telegram
    let boiler = node.boiler().unwrap();
    assert_eq!(boiler.boiler().unwrap().selected_flow_temp, Some(70));

    poll(&mut node, &mut port, 4);
    assert_eq!(port.requests().len(), 2);
    assert_eq!(node.in_flight().unwrap().type_id(), 0x19);
    Ok(())
}

#[test]
fn unrelated_telegram_keeps_waiting() -> anyhow::Result<()> {
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.read(0x08, 0x18, 0)?;
    poll(&mut node, &mut port, 1);

    // broadcast of the right type, and a reply to someone else
    node.on_frame_ready(&mut port, &frame(&[0x08, 0x00, 0x18, 0x00, 0x46]), 2);
    node.on_frame_ready(&mut port, &frame(&[0x08, 0x17, 0x18, 0x00, 0x46]), 3);
    assert!(node.in_flight().is_some());
    assert!(tx_events(&mut node).is_empty());
    Ok(())
}

#[test]
fn retries_exhausted() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    for _ in 0..3 {
        port.push_outcome(TransmitOutcome::Timeout { at_byte: 2 });
    }
    node.read(0x08, 0x02, 0)?;

    for t in 1..=3 {
        assert!(tx_events(&mut node).is_empty());
        poll(&mut node, &mut port, t);
    }
    assert_eq!(port.sent.len(), 3);
    assert!(port.sent.iter().all(|f| f == &port.sent[0]));
    assert_eq!(node.pending().count(), 0);
    assert!(node.in_flight().is_none());

    match tx_events(&mut node).as_slice() {
        [BusEvent::TxFailed { request, error }] => {
            assert_eq!(*error, Error::TxTimeout { at_byte: 2 });
            assert_eq!(request.retry_count(), 3);
        }
        other => panic!("unexpected events {:?}", other),
    }
    assert_eq!(node.status().last_retry_count, 3);
    assert_eq!(node.status().frames_sent, 0);
    Ok(())
}

#[test]
fn retry_then_success() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    port.push_outcome(TransmitOutcome::Collision { at_byte: 0 });
    port.push_outcome(TransmitOutcome::Timeout { at_byte: 4 });
    node.read(0x08, 0x02, 0)?;
    node.read(0x08, 0x18, 0)?;

    poll(&mut node, &mut port, 1);
    // retried request stays ahead of the rest
    assert_eq!(node.pending().next().unwrap().type_id(), 0x02);
    assert_eq!(node.status().last_retry_count, 1);
    poll(&mut node, &mut port, 2);
    poll(&mut node, &mut port, 3);
    assert_eq!(node.in_flight().unwrap().type_id(), 0x02);

    node.on_frame_ready(&mut port, &frame(&[0x08, 0x0B, 0x02, 0x00, 123, 6, 2]), 4);
    let events = tx_events(&mut node);
    assert_eq!(events.len(), 2);
    match &events[0] {
        BusEvent::TxSucceeded { request } => assert_eq!(request.retry_count(), 2),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(events[1], BusEvent::DeviceIdentified { device_id: 0x08 });
    assert_eq!(node.status().last_retry_count, 2);
    Ok(())
}

#[test]
fn collision_reported() -> anyhow::Result<()> {
    let mut node = EmsNode::new(Config::new().with_max_retries(1));
    let mut port = ScriptedTransport::new();
    port.push_outcome(TransmitOutcome::Collision { at_byte: 1 });
    node.read(0x10, 0x06, 0)?;
    poll(&mut node, &mut port, 1);
    assert!(matches!(
        tx_events(&mut node).as_slice(),
        [BusEvent::TxFailed {
            error: Error::TxCollision { at_byte: 1 },
            ..
        }]
    ));
    Ok(())
}

#[test]
fn plain_write() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.submit(TxRequest::write(0x08, 0x33, 2, &[0x3C])?, 0)?;

    poll(&mut node, &mut port, 1);
    assert_eq!(port.sent, [vec![0x0B, 0x08, 0x33, 0x02, 0x3C, 0x04]]);
    assert_eq!(node.in_flight().unwrap().action(), TxAction::Write);

    // accepted: the bus is released with an ack
    node.on_frame_ready(&mut port, &[0x01], 2);
    assert_eq!(port.last_sent(), Some(&ACK[..]));
    match tx_events(&mut node).as_slice() {
        [BusEvent::TxSucceeded { request }] => assert_eq!(request.action(), TxAction::Write),
        other => panic!("unexpected events {:?}", other),
    }
    assert_eq!(node.pending().count(), 0);
    Ok(())
}

#[test]
fn write_rejected() -> anyhow::Result<()> {
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.submit(TxRequest::write(0x08, 0x33, 2, &[0x3C])?, 0)?;
    poll(&mut node, &mut port, 1);
    node.on_frame_ready(&mut port, &[0x04], 2);

    assert!(matches!(
        tx_events(&mut node).as_slice(),
        [BusEvent::TxFailed {
            error: Error::WriteRejected,
            ..
        }]
    ));
    // not retried
    assert_eq!(node.pending().count(), 0);
    assert!(node.in_flight().is_none());
    Ok(())
}

fn validated_write() -> anyhow::Result<TxRequest> {
    Ok(TxRequest::write(0x08, 0x33, 2, &[0x37])?
        .validate_with(0x33, 2, 0x37)?
        .then_read(0x34)?)
}

/// Poll, write accepted, poll, validate read answered with `read_back`.
fn write_cycle(node: &mut EmsNode, port: &mut ScriptedTransport, read_back: u8, now: u64) {
    poll(node, port, now);
    node.on_frame_ready(port, &[0x01], now + 1);
    poll(node, port, now + 2);
    node.on_frame_ready(port, &frame(&[0x08, 0x0B, 0x33, 0x02, read_back]), now + 3);
}

#[test]
fn write_then_validate() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    let write = validated_write()?;
    node.submit(write.clone(), 0)?;

    poll(&mut node, &mut port, 1);
    node.on_frame_ready(&mut port, &[0x01], 2);
    // the validate read goes first
    let validate = node.pending().next().unwrap();
    assert_eq!(validate.action(), TxAction::Validate);
    assert!(tx_events(&mut node).is_empty());

    poll(&mut node, &mut port, 3);
    assert_eq!(
        port.requests(),
        [
            &[0x0B, 0x08, 0x33, 0x02, 0x37, 0x0F][..],
            &[0x0B, 0x88, 0x33, 0x02, 0x01, 0x5D][..],
        ]
    );
    node.on_frame_ready(&mut port, &frame(&[0x08, 0x0B, 0x33, 0x02, 0x37]), 4);

    match tx_events(&mut node).as_slice() {
        [BusEvent::TxSucceeded { request }] => {
            assert_eq!(request.action(), TxAction::Write);
            assert_eq!(request.payload(), write.payload());
        }
        other => panic!("unexpected events {:?}", other),
    }
    // refresh read queued after confirmation
    let refresh = node.pending().next().unwrap();
    assert_eq!((refresh.action(), refresh.type_id()), (TxAction::Read, ems_proto::type_id(0x34)));
    assert_eq!(node.boiler().unwrap().boiler().unwrap().ww_selected_temp, Some(0x37));
    Ok(())
}

#[test]
fn validation_mismatch_retries_write() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.submit(validated_write()?, 0)?;

    write_cycle(&mut node, &mut port, 0x3C, 10);
    let retry = node.pending().next().unwrap();
    assert_eq!(retry.action(), TxAction::Write);
    assert_eq!(retry.retry_count(), 1);
    assert!(tx_events(&mut node).is_empty());

    write_cycle(&mut node, &mut port, 0x3C, 20);
    write_cycle(&mut node, &mut port, 0x3C, 30);
    match tx_events(&mut node).as_slice() {
        [BusEvent::TxFailed { request, error }] => {
            assert_eq!(request.action(), TxAction::Write);
            assert_eq!(
                *error,
                Error::WriteValidationFailed {
                    expected: 0x37,
                    actual: Some(0x3C)
                }
            );
        }
        other => panic!("unexpected events {:?}", other),
    }
    // three writes, three validates
    assert_eq!(port.requests().len(), 6);
    assert_eq!(node.pending().count(), 0);
    Ok(())
}

/// Frames carrying the write itself, not its validate read.
fn writes_sent(port: &ScriptedTransport) -> usize {
    port.requests().iter().filter(|f| f[1] == 0x08).count()
}

#[test]
fn unanswered_validate_retries_write() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    let write = validated_write()?;
    node.submit(write.clone(), 0)?;

    for (round, t) in [0, 3_000, 6_000].into_iter().enumerate() {
        poll(&mut node, &mut port, t);
        node.on_frame_ready(&mut port, &[0x01], t + 1);
        poll(&mut node, &mut port, t + 2);
        assert_eq!(node.in_flight().unwrap().action(), TxAction::Validate);
        node.tick(t + 2_002);
        if round < 2 {
            let retry = node.pending().next().unwrap();
            assert_eq!(retry.action(), TxAction::Write);
            assert_eq!(retry.retry_count() as usize, round + 1);
        }
    }

    match tx_events(&mut node).as_slice() {
        [BusEvent::TxFailed { request, error }] => {
            assert_eq!(request.action(), TxAction::Write);
            assert_eq!(request.payload(), write.payload());
            assert_eq!(request.retry_count(), 3);
            assert_eq!(*error, Error::ReplyTimeout);
        }
        other => panic!("unexpected events {:?}", other),
    }
    assert_eq!(writes_sent(&port), 3);
    assert_eq!(node.pending().count(), 0);
    Ok(())
}

#[test]
fn validate_collision_retries_write() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.submit(validated_write()?, 0)?;

    poll(&mut node, &mut port, 0);
    node.on_frame_ready(&mut port, &[0x01], 1);
    port.push_outcome(TransmitOutcome::Collision { at_byte: 2 });
    poll(&mut node, &mut port, 2);

    let retry = node.pending().next().unwrap();
    assert_eq!(retry.action(), TxAction::Write);
    assert_eq!(retry.retry_count(), 1);
    assert!(tx_events(&mut node).is_empty());

    // the write goes out again, then validates
    write_cycle(&mut node, &mut port, 0x37, 10);
    assert_eq!(writes_sent(&port), 2);
    match tx_events(&mut node).as_slice() {
        [BusEvent::TxSucceeded { request }] => assert_eq!(request.action(), TxAction::Write),
        other => panic!("unexpected events {:?}", other),
    }
    Ok(())
}

#[test]
fn reply_timeout() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.read(0x17, 0x91, 0)?;

    poll(&mut node, &mut port, 100);
    node.tick(2_099);
    assert!(node.in_flight().is_some());
    node.tick(2_100);
    assert!(node.in_flight().is_none());
    assert_eq!(node.pending().next().unwrap().retry_count(), 1);

    poll(&mut node, &mut port, 2_200);
    node.tick(4_200);
    poll(&mut node, &mut port, 4_300);
    node.tick(6_300);
    assert!(matches!(
        tx_events(&mut node).as_slice(),
        [BusEvent::TxFailed {
            error: Error::ReplyTimeout,
            ..
        }]
    ));
    Ok(())
}

#[test]
fn raw_bytes_verbatim() -> anyhow::Result<()> {
    let mut node = EmsNode::default();
    let mut port = ScriptedTransport::new();
    node.submit(TxRequest::raw_hex("0B 88 02 00 20")?.force_publish(true), 0)?;
    // deliberately wrong CRC goes out as is
    node.submit(TxRequest::raw(&[0x0B, 0x88, 0x02, 0x00, 0x20, 0x00])?, 0)?;

    poll(&mut node, &mut port, 1);
    assert!(node.in_flight().is_none());
    poll(&mut node, &mut port, 2);
    assert_eq!(
        port.requests(),
        [
            &[0x0B, 0x88, 0x02, 0x00, 0x20, 0xBC][..],
            &[0x0B, 0x88, 0x02, 0x00, 0x20, 0x00][..],
        ]
    );
    assert_eq!(tx_events(&mut node).len(), 2);
    assert!(node.take_refreshed());
    Ok(())
}

#[test]
fn reversed_polarity() -> anyhow::Result<()> {
    init_logger();
    let mut node = EmsNode::new(Config::new().with_reverse(true));
    let mut port = ScriptedTransport::new();
    node.read(0x08, 0x02, 0)?;

    // the normal poll byte isn't ours in this mode
    poll(&mut node, &mut port, 1);
    assert!(port.sent.is_empty());

    node.on_frame_ready(&mut port, &[0x0B], 2);
    assert_eq!(port.sent, [vec![0x8B, 0x88, 0x02, 0x00, 0x20, 0x74]]);
    node.on_frame_ready(&mut port, &[0x0B], 3);
    assert_eq!(port.last_sent(), Some(&[0x8B][..]));

    node.on_frame_ready(&mut port, &frame(&[0x08, 0x0B, 0x02, 0x00, 123, 6, 2]), 4);
    assert!(node.in_flight().is_none());
    Ok(())
}

#[test]
fn queue_bound() -> anyhow::Result<()> {
    let mut node = EmsNode::new(Config::new().with_queue_capacity(2));
    node.read(0x08, 0x18, 0)?;
    node.read(0x08, 0x19, 0)?;
    assert_eq!(node.read(0x08, 0x34, 0), Err(Error::QueueFull { capacity: 2 }));

    assert_eq!(node.cancel_pending(|r| r.type_id() == 0x18), 1);
    node.read(0x08, 0x34, 0)?;
    let types: Vec<u16> = node.pending().map(|r| *r.type_id()).collect();
    assert_eq!(types, [0x19, 0x34]);
    Ok(())
}

#[test]
fn tx_disabled() -> anyhow::Result<()> {
    let mut node = EmsNode::new(Config::new().with_tx_disabled(true));
    let mut port = ScriptedTransport::new();
    node.read(0x08, 0x18, 0)?;
    poll(&mut node, &mut port, 1);
    assert_eq!(port.sent, [ACK.to_vec()]);
    assert_eq!(node.pending().count(), 1);

    node.set_tx_disabled(false);
    poll(&mut node, &mut port, 2);
    assert_eq!(port.requests().len(), 1);
    Ok(())
}

#[test]
fn scan_devices() -> anyhow::Result<()> {
    let mut node = EmsNode::default();
    let queued = node.scan_devices(0)?;
    assert!(queued > 5);
    assert!(node.pending().all(|r| r.type_id() == 0x02 && r.destination() != 0x0B));
    assert_eq!(node.scan_devices(1)?, 0);
    Ok(())
}
