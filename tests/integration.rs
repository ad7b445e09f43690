//! Integration tests for amqp-engine.
//!
//! These tests drive the public API only: codec and registry on one side,
//! two connections exchanging frames on the other.

use amqp_engine::codec::{registry, Decoder, Descriptor, DescriptorRegistry, Encoder, Value};
use amqp_engine::engine::{Connection, EndpointState, Frame, Performative, Role, StateMask};
use amqp_engine::types::{
    Accepted, DeleteOnNoLinksOrMessages, DescribedType, LifetimePolicy, Received, TypedValue,
};
use amqp_engine::{ConnectionConfig, EngineError};

const LIFETIME_SYMBOL: &str = "amqp:delete-on-no-links-or-messages:list";

fn pump(from: &mut Connection, to: &mut Connection) -> usize {
    let mut moved = 0;
    while let Some(frame) = from.pop_frame() {
        to.handle_frame(frame).unwrap();
        moved += 1;
    }
    moved
}

/// Test the session iteration scenario: local ACTIVE, remote UNINITIALIZED.
#[test]
fn test_session_head_finds_opened_session() {
    let mut connection = Connection::new();
    connection.open().unwrap();
    let session = connection.session().unwrap();
    connection.open_session(session).unwrap();

    let mut cursor = connection.session_head(
        StateMask::ACTIVE,
        StateMask::UNINITIALIZED | StateMask::ACTIVE,
    );
    assert_eq!(cursor.next(&connection), Some(session));
    assert_eq!(cursor.next(&connection), None);
}

/// Test that a session created after the cursor is not part of its pass.
#[test]
fn test_session_head_is_one_pass() {
    let mut connection = Connection::new();
    let first = connection.session().unwrap();
    let second = connection.session().unwrap();

    let mut cursor = connection.session_head(StateMask::ANY, StateMask::ANY);
    assert_eq!(cursor.next(&connection), Some(first));
    let third = connection.session().unwrap();
    assert_eq!(cursor.next(&connection), Some(second));
    assert_eq!(cursor.next(&connection), None);

    let all = connection
        .session_head(StateMask::ANY, StateMask::ANY)
        .collect(&connection);
    assert_eq!(all, vec![first, second, third]);
}

/// Test numeric and symbolic descriptors decoding to the same policy.
#[test]
fn test_lifetime_policy_both_descriptors() {
    let mut registry = DescriptorRegistry::new();
    DeleteOnNoLinksOrMessages::register(&mut registry);

    let by_code = registry.decode(&Descriptor::Code(0x2e), vec![]).unwrap();
    let by_symbol = registry
        .decode(&Descriptor::symbol(LIFETIME_SYMBOL), vec![])
        .unwrap();

    assert_eq!(by_code, by_symbol);
    assert_eq!(by_code.descriptor(), Some(Descriptor::Code(0x2e)));
    match by_symbol {
        TypedValue::LifetimePolicy(policy) => {
            assert_eq!(policy.size(), 0);
            assert!(policy.get(0).is_err());
        }
        other => panic!("expected lifetime policy, got {other:?}"),
    }
}

/// Test symbolic wire form re-encoding to the canonical numeric form.
#[test]
fn test_symbolic_wire_form_canonicalizes() {
    let symbolic = Value::described(Descriptor::symbol(LIFETIME_SYMBOL), vec![]);
    let bytes = Encoder::encode(&symbolic).unwrap();

    let typed = Decoder::new(bytes).decode_typed(registry()).unwrap();
    assert_eq!(
        typed,
        TypedValue::LifetimePolicy(LifetimePolicy::from(DeleteOnNoLinksOrMessages))
    );

    let canonical = Encoder::encode(&typed.to_value().unwrap()).unwrap();
    assert_eq!(&canonical[..], &[0x00, 0x53, 0x2e, 0x45]);
}

/// Test that unknown descriptors come back unchanged and re-encode byte for byte.
#[test]
fn test_unknown_descriptor_preserved() {
    let fields = vec![Value::Uint(7), Value::String("x".into()), Value::Null];
    let original = Value::described(Descriptor::symbol("vendor:custom:list"), fields.clone());
    let bytes = Encoder::encode(&original).unwrap();

    let typed = Decoder::new(bytes.clone()).decode_typed(registry()).unwrap();
    match &typed {
        TypedValue::Unknown(unknown) => {
            assert_eq!(unknown.descriptor(), &Descriptor::symbol("vendor:custom:list"));
            assert_eq!(unknown.fields(), &fields[..]);
        }
        other => panic!("expected unknown, got {other:?}"),
    }
    assert_eq!(Encoder::encode(&typed.to_value().unwrap()).unwrap(), bytes);
}

/// Test that a malformed composite fails alone and leaves its sibling decodable.
#[test]
fn test_malformed_value_is_local() {
    let bad = Value::described(Descriptor::Code(0x23), vec![Value::Uint(1)]);
    let good = Received::new(1, 2).to_value().unwrap();

    let mut bytes = Encoder::encode(&bad).unwrap().to_vec();
    let bad_len = bytes.len();
    bytes.extend_from_slice(&Encoder::encode(&good).unwrap());

    let mut decoder = Decoder::from_slice(&bytes);
    assert!(matches!(
        decoder.decode_typed(registry()),
        Err(EngineError::Arity { .. })
    ));
    // position unchanged: skip the bad value by hand and read the next one
    assert_eq!(decoder.remaining(), bytes.len());
    let mut decoder = Decoder::from_slice(&bytes[bad_len..]);
    assert!(matches!(
        decoder.decode_typed(registry()).unwrap(),
        TypedValue::DeliveryState(_)
    ));
}

/// Test that hostile input fails as a malformed value instead of taking the
/// process down.
#[test]
fn test_adversarial_input_is_malformed() {
    let mut huge_count = vec![0xd0];
    huge_count.extend_from_slice(&5u32.to_be_bytes());
    huge_count.extend_from_slice(&u32::MAX.to_be_bytes());
    huge_count.push(0x40);

    let mut described_chain = Vec::new();
    for _ in 0..10_000 {
        described_chain.extend_from_slice(&[0x00, 0x53, 0x23]);
    }
    described_chain.push(0x45);

    let inputs: Vec<Vec<u8>> = vec![
        vec![0x00; 2_000_000],
        huge_count,
        vec![0xb1, 0xff, 0xff, 0xff, 0xff, b'a'],
        described_chain,
    ];
    for bytes in inputs {
        let mut decoder = Decoder::from_slice(&bytes);
        assert!(matches!(
            decoder.decode_typed(registry()),
            Err(EngineError::Malformed(_))
        ));
        assert_eq!(decoder.remaining(), bytes.len());
    }
}

/// Test last-write-wins registration.
#[test]
fn test_registry_last_write_wins() {
    fn always_accepted(_: Vec<Value>) -> amqp_engine::Result<TypedValue> {
        Ok(TypedValue::DeliveryState(Accepted.into()))
    }

    let mut registry = DescriptorRegistry::with_defaults();
    registry.register(0x2eu64, always_accepted);

    let typed = registry.decode(&Descriptor::Code(0x2e), vec![]).unwrap();
    assert!(matches!(typed, TypedValue::DeliveryState(_)));
    // the symbolic alias still points at the original constructor
    let typed = registry
        .decode(&Descriptor::symbol(LIFETIME_SYMBOL), vec![])
        .unwrap();
    assert!(matches!(typed, TypedValue::LifetimePolicy(_)));
}

/// Test a full exchange: open, begin, attach, transfer, disposition, teardown.
#[test]
fn test_full_exchange_between_two_connections() {
    let mut client = Connection::with_config(
        ConnectionConfig::builder()
            .container_id("client")
            .hostname("broker.local")
            .build()
            .unwrap(),
    );
    let mut server = Connection::new();
    server.set_container("broker").unwrap();

    client.open().unwrap();
    let session = client.session().unwrap();
    client.open_session(session).unwrap();
    let sender = client.sender(session, "queue-a").unwrap();
    client.open_link(sender).unwrap();
    assert_eq!(pump(&mut client, &mut server), 3);
    assert_eq!(server.remote_hostname(), Some("broker.local"));

    // server answers everything the client started
    server.open().unwrap();
    let mut sessions = server.session_head(StateMask::UNINITIALIZED, StateMask::ACTIVE);
    while let Some(s) = sessions.next(&server) {
        server.open_session(s).unwrap();
    }
    let mut links = server.link_head(StateMask::UNINITIALIZED, StateMask::ACTIVE);
    while let Some(l) = links.next(&server) {
        server.open_link(l).unwrap();
    }
    assert_eq!(pump(&mut server, &mut client), 3);
    assert_eq!(client.remote_container(), Some("broker"));
    assert_eq!(
        client.get_link(sender).unwrap().remote_state(),
        EndpointState::Active
    );

    // three messages arrive in order
    let sent: Vec<_> = ["d1", "d2", "d3"]
        .iter()
        .map(|tag| client.send(sender, tag.as_bytes().to_vec(), &b"body"[..]).unwrap())
        .collect();
    pump(&mut client, &mut server);

    let mut tags = Vec::new();
    let mut cursor = server.work_head();
    while let Some(d) = cursor {
        tags.push(server.get_delivery(d).unwrap().tag().to_vec());
        cursor = server.work_next(d);
    }
    assert_eq!(tags, vec![b"d1".to_vec(), b"d2".to_vec(), b"d3".to_vec()]);

    // receiver accepts and settles each one
    while let Some(d) = server.work_head() {
        server.disposition(d, Accepted.into()).unwrap();
        server.settle(d).unwrap();
        server.free_delivery(d).unwrap();
    }
    assert_eq!(server.delivery_count(), 0);
    pump(&mut server, &mut client);

    for d in &sent {
        let delivery = client.get_delivery(*d).unwrap();
        assert!(delivery.is_remote_settled());
        assert!(delivery.remote_state().is_some_and(|s| s.is_terminal()));
    }
    assert_eq!(client.work().collect::<Vec<_>>(), sent);

    // sender settles; nothing goes back since the receiver settled first
    for d in &sent {
        client.settle(*d).unwrap();
        client.free_delivery(*d).unwrap();
    }
    assert_eq!(client.pending_frames(), 0);
    assert_eq!(client.work_head(), None);

    // teardown in reverse order
    client.close_link(sender).unwrap();
    client.close_session(session).unwrap();
    client.close().unwrap();
    pump(&mut client, &mut server);

    let closing: Vec<_> = server
        .link_head(StateMask::ACTIVE, StateMask::CLOSED)
        .collect(&server);
    assert_eq!(closing.len(), 1);
    assert_eq!(server.remote_state(), EndpointState::Closed);
}

/// Test a peer ending its session with links still attached: the local side
/// can still tear down and free the whole subtree.
#[test]
fn test_abrupt_end_leaves_subtree_freeable() {
    let mut client = Connection::new();
    let mut server = Connection::new();
    client.open().unwrap();
    server.open().unwrap();
    let session = client.session().unwrap();
    client.open_session(session).unwrap();
    let sender = client.sender(session, "events").unwrap();
    client.open_link(sender).unwrap();
    pump(&mut client, &mut server);

    let remote_session = server
        .session_head(StateMask::UNINITIALIZED, StateMask::ACTIVE)
        .next(&server)
        .unwrap();
    server.open_session(remote_session).unwrap();
    let receiver = server
        .link_head(StateMask::UNINITIALIZED, StateMask::ACTIVE)
        .next(&server)
        .unwrap();
    server.open_link(receiver).unwrap();
    pump(&mut server, &mut client);

    // end without detaching first
    client.close_session(session).unwrap();
    assert_eq!(pump(&mut client, &mut server), 1);
    assert_eq!(
        server.get_link(receiver).unwrap().remote_state(),
        EndpointState::Closed
    );

    server.close_link(receiver).unwrap();
    server.close_session(remote_session).unwrap();
    server.free_link(receiver).unwrap();
    server.free_session(remote_session).unwrap();
    assert_eq!(server.session_count(), 0);

    // the client's answer from the server completes its own teardown
    pump(&mut server, &mut client);
    client.close_link(sender).unwrap();
    client.free_link(sender).unwrap();
    client.free_session(session).unwrap();
    assert_eq!(client.link_count(), 0);
}

/// Test the work queue FIFO and re-flagging through remote updates.
#[test]
fn test_work_queue_fifo_and_reflag() {
    let mut client = Connection::new();
    let mut server = Connection::new();
    client.open().unwrap();
    server.open().unwrap();
    let session = client.session().unwrap();
    client.open_session(session).unwrap();
    let receiver = client.receiver(session, "inbox").unwrap();
    client.open_link(receiver).unwrap();
    pump(&mut client, &mut server);

    let remote_session = server
        .session_head(StateMask::UNINITIALIZED, StateMask::ACTIVE)
        .next(&server)
        .unwrap();
    server.open_session(remote_session).unwrap();
    let sender = server
        .link_head(StateMask::UNINITIALIZED, StateMask::ACTIVE)
        .next(&server)
        .unwrap();
    assert_eq!(server.get_link(sender).unwrap().role(), Role::Sender);
    server.open_link(sender).unwrap();
    for tag in [b"D1", b"D2", b"D3"] {
        server.send(sender, &tag[..], &b""[..]).unwrap();
    }
    pump(&mut server, &mut client);

    let d1 = client.work_head().unwrap();
    let d2 = client.work_next(d1).unwrap();
    let d3 = client.work_next(d2).unwrap();
    assert_eq!(client.get_delivery(d1).unwrap().tag(), b"D1");
    assert_eq!(client.get_delivery(d3).unwrap().tag(), b"D3");

    // consume D1
    client.clear_work(d1).unwrap();
    assert_eq!(client.work().collect::<Vec<_>>(), vec![d2, d3]);

    // a new remote update re-flags D1 at the back
    let delivery_id = client.get_delivery(d1).unwrap().delivery_id();
    client
        .handle_frame(Frame::new(
            0,
            Performative::Disposition {
                role: Role::Sender,
                first: delivery_id,
                last: None,
                settled: false,
                state: Some(Received::new(0, 3).into()),
            },
        ))
        .unwrap();
    assert_eq!(client.work().collect::<Vec<_>>(), vec![d2, d3, d1]);
}

/// Test that a rejected operation leaves state and outbound frames unchanged.
#[test]
fn test_rejected_operations_change_nothing() {
    let mut connection = Connection::new();
    connection.open().unwrap();
    connection.close().unwrap();
    let pending = connection.pending_frames();

    assert!(matches!(
        connection.open(),
        Err(EngineError::IllegalState { .. })
    ));
    assert!(connection.close().is_err());
    assert_eq!(connection.local_state(), EndpointState::Closed);
    assert_eq!(connection.pending_frames(), pending);

    // peer closes: now terminal
    connection
        .handle_frame(Frame::new(
            0,
            Performative::Open {
                container_id: "peer".into(),
                hostname: None,
                channel_max: 0,
                max_frame_size: 512,
                idle_timeout_ms: None,
            },
        ))
        .unwrap();
    connection
        .handle_frame(Frame::new(0, Performative::Close { error: None }))
        .unwrap();
    assert!(connection.states().is_terminal());
    assert!(matches!(
        connection.open(),
        Err(EngineError::EndpointClosed { .. })
    ));
}

/// Test loading configuration from JSON into a connection.
#[test]
fn test_config_from_json() {
    let config = ConnectionConfig::from_json(
        r#"{"container_id": "worker-7", "channel_max": 0, "max_delivery_tag_len": 4}"#,
    )
    .unwrap();
    let mut connection = Connection::with_config(config);
    connection.open().unwrap();

    let session = connection.session().unwrap();
    assert!(matches!(
        connection.session(),
        Err(EngineError::ChannelMax(0))
    ));
    connection.open_session(session).unwrap();
    let link = connection.sender(session, "s").unwrap();
    connection.open_link(link).unwrap();
    assert!(matches!(
        connection.send(link, &b"12345"[..], &b""[..]),
        Err(EngineError::DeliveryTag(_))
    ));

    match connection.pop_frame().unwrap().performative {
        Performative::Open { container_id, .. } => assert_eq!(container_id, "worker-7"),
        other => panic!("expected open, got {other:?}"),
    }
}
