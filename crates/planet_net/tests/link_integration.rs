use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use planet_map::{Coord, Direction};
use planet_net::{
    LinkError, LinkEvent, MothershipClient, MothershipClientConfig, TankLink, TankLinkConfig,
};
use planet_proto::{MothershipMessage, NodeArrivalInfo, RequestResponse, TankMessage};

fn bind_link() -> TankLink {
    TankLink::bind(
        TankLinkConfig::default()
            .with_bind_addr("127.0.0.1:0")
            .with_accept_timeout(Duration::from_millis(20))
            .with_recv_timeout(Duration::from_millis(20)),
    )
    .expect("bind link")
}

fn client_config(link: &TankLink) -> MothershipClientConfig {
    MothershipClientConfig::new(link.local_addr().to_string())
        .with_retry_interval(Duration::from_millis(20))
        .with_max_attempts(50)
        .with_response_timeout(Some(Duration::from_secs(5)))
}

/// Ticks the link until `done` returns true for the collected events and
/// messages, failing after five seconds.
fn tick_until(
    link: &mut TankLink,
    mut done: impl FnMut(&[LinkEvent], &[TankMessage]) -> bool,
) -> (Vec<LinkEvent>, Vec<TankMessage>) {
    let mut events = Vec::new();
    let mut messages = Vec::new();
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        events.extend(link.poll());
        messages.extend(link.drain());
        if done(&events, &messages) {
            return (events, messages);
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("link did not reach expected state: events={events:?} messages={messages:?}");
}

fn raw_handshake(link: &TankLink) -> (TcpStream, BufReader<TcpStream>) {
    let mut stream = connect_with_retry(&link.local_addr().to_string(), Duration::from_secs(1));
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout");
    stream.write_all(b"connection_request\n").expect("request");
    let reader = BufReader::new(stream.try_clone().expect("clone"));
    (stream, reader)
}

fn read_line(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read line");
    line.trim().to_string()
}

fn connect_with_retry(addr: &str, timeout: Duration) -> TcpStream {
    let start = Instant::now();
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return stream,
            Err(err) => {
                if start.elapsed() > timeout {
                    panic!("connect timeout: {err}");
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    listener.local_addr().expect("local addr").port()
}

#[test]
fn client_and_link_exchange_arrival() {
    let mut link = bind_link();
    let config = client_config(&link);

    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("connect");
        client.send_node_arrival().expect("send arrival");
        client.get_node_arrival_response().expect("arrival response")
    });

    let (events, messages) = tick_until(&mut link, |_, messages| !messages.is_empty());
    assert!(matches!(events.as_slice(), [LinkEvent::TankConnected { .. }]));
    assert_eq!(messages, vec![TankMessage::NodeArrival]);

    let info = NodeArrivalInfo {
        node_id: "A".to_string(),
        node_coord: Coord::new(0.0, 0.0),
        facing_direction: Direction::South,
        available_paths: vec![Direction::East],
    };
    link.send(&MothershipMessage::ArrivalResponse(info.clone()))
        .expect("send response");

    let received = tank.join().expect("tank thread");
    assert_eq!(received, info);
}

#[test]
fn liveness_ping_is_answered_by_drain() {
    let mut link = bind_link();
    let config = client_config(&link);

    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("connect");
        client.check_alive().expect("pong");
        client.send_stuck().expect("send stuck");
    });

    tick_until(&mut link, |_, messages| messages.contains(&TankMessage::Stuck));
    tank.join().expect("tank thread");
}

#[test]
fn client_skips_unexpected_messages_and_surfaces_errors() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        assert_eq!(read_line(&mut reader), "connection_request");
        stream
            .write_all(
                b"connection_approved\n\
                  {\"type\":\"start\"}\n\
                  {\"type\":\"bogus\"}\n\
                  ping\n\
                  {\"type\":\"path_chosen_response\",\"request_response\":{\"is_approved\":false,\"message\":\"no\"}}\n\
                  {\"type\":\"error\",\"msg\":\"conflict\"}\n",
            )
            .expect("write");
        assert_eq!(read_line(&mut reader), "pong");
    });

    let mut client = MothershipClient::connect(
        MothershipClientConfig::new(addr).with_response_timeout(Some(Duration::from_secs(2))),
    )
    .expect("connect");
    let response = client.get_path_chosen_response().expect("response");
    assert_eq!(response, RequestResponse::deny("no"));
    assert_eq!(
        client.get_node_arrival_response(),
        Err(LinkError::Rejected {
            msg: "conflict".to_string()
        })
    );
    server.join().expect("server thread");
}

#[test]
fn reset_surfaces_as_tank_lost_and_link_accepts_again() {
    let mut link = bind_link();
    let (stream, mut reader) = raw_handshake(&link);
    tick_until(&mut link, |events, _| !events.is_empty());
    assert_eq!(read_line(&mut reader), "connection_approved");

    // Unread data in the tank's receive buffer turns the close into a reset.
    link.send(&MothershipMessage::Start).expect("send start");
    thread::sleep(Duration::from_millis(50));
    drop(reader);
    drop(stream);

    let (events, _) = tick_until(&mut link, |events, _| {
        events
            .iter()
            .any(|event| matches!(event, LinkEvent::TankLost { .. }))
    });
    assert!(matches!(events.last(), Some(LinkEvent::TankLost { .. })));
    assert!(!link.is_connected());

    let (_stream, mut reader) = raw_handshake(&link);
    tick_until(&mut link, |events, _| {
        matches!(events, [LinkEvent::TankConnected { .. }])
    });
    assert_eq!(read_line(&mut reader), "connection_approved");
}

#[test]
fn requested_disconnect_closes_on_next_receive_pass() {
    let mut link = bind_link();
    let (_stream, mut reader) = raw_handshake(&link);
    tick_until(&mut link, |events, _| !events.is_empty());
    assert_eq!(read_line(&mut reader), "connection_approved");

    link.request_disconnect();
    let (events, _) = tick_until(&mut link, |events, _| {
        events
            .iter()
            .any(|event| matches!(event, LinkEvent::TankDisconnected { .. }))
    });
    assert_eq!(events.len(), 1);

    let mut line = String::new();
    let read = reader.read_line(&mut line).unwrap_or(0);
    assert_eq!(read, 0);
}

#[test]
fn malformed_frames_are_dropped() {
    let mut link = bind_link();
    let (mut stream, mut reader) = raw_handshake(&link);
    tick_until(&mut link, |events, _| !events.is_empty());
    assert_eq!(read_line(&mut reader), "connection_approved");

    stream
        .write_all(b"{\"type\":\"path_chosen\"}\nhello\n{\"type\":\"path_chosen\",\"direction\":\"N\"}\n")
        .expect("write");
    let (_, messages) = tick_until(&mut link, |_, messages| !messages.is_empty());
    assert_eq!(
        messages,
        vec![TankMessage::PathChosen {
            direction: Direction::North
        }]
    );
    assert!(link.is_connected());
}

#[test]
fn silent_peer_does_not_stall_poll() {
    let mut link = TankLink::bind(
        TankLinkConfig::default()
            .with_bind_addr("127.0.0.1:0")
            .with_accept_timeout(Duration::from_millis(20))
            .with_recv_timeout(Duration::from_millis(20))
            .with_handshake_timeout(Duration::from_millis(300)),
    )
    .expect("bind");
    let _silent = connect_with_retry(&link.local_addr().to_string(), Duration::from_secs(1));

    for _ in 0..5 {
        let start = Instant::now();
        let events = link.poll();
        assert!(
            start.elapsed() < Duration::from_millis(200),
            "poll took {:?}",
            start.elapsed()
        );
        assert!(events.is_empty());
    }
    assert!(!link.is_connected());

    // Once the silent peer times out, a real tank gets through.
    let config = client_config(&link);
    let tank = thread::spawn(move || MothershipClient::connect(config).map(|_| ()));
    tick_until(&mut link, |events, _| {
        matches!(events, [LinkEvent::TankConnected { .. }])
    });
    tank.join().expect("tank thread").expect("connected");
}

#[test]
fn disallowed_peer_is_refused() {
    let allowed: IpAddr = "10.255.255.1".parse().expect("ip");
    let mut link = TankLink::bind(
        TankLinkConfig::default()
            .with_bind_addr("127.0.0.1:0")
            .with_accept_timeout(Duration::from_millis(20))
            .with_allowed_peer(Some(allowed)),
    )
    .expect("bind");
    let config = MothershipClientConfig::new(link.local_addr().to_string())
        .with_max_attempts(1)
        .with_handshake_timeout(Duration::from_millis(500));

    let tank = thread::spawn(move || MothershipClient::connect(config).map(|_| ()));
    let start = Instant::now();
    while !tank.is_finished() && start.elapsed() < Duration::from_secs(5) {
        assert!(link.poll().is_empty());
        thread::sleep(Duration::from_millis(5));
    }
    let result = tank.join().expect("tank thread");
    assert!(matches!(result, Err(LinkError::RetriesExhausted { attempts: 1, .. })));
    assert!(!link.is_connected());
}

#[test]
fn client_retries_until_mothership_comes_up() {
    let port = find_free_port();
    let addr = format!("127.0.0.1:{port}");
    let config = MothershipClientConfig::new(addr.clone())
        .with_retry_interval(Duration::from_millis(25))
        .with_max_attempts(100);
    let tank = thread::spawn(move || MothershipClient::connect(config).map(|_| ()));

    thread::sleep(Duration::from_millis(150));
    let mut link = TankLink::bind(
        TankLinkConfig::default()
            .with_bind_addr(addr)
            .with_accept_timeout(Duration::from_millis(20)),
    )
    .expect("bind");
    tick_until(&mut link, |events, _| !events.is_empty());
    tank.join().expect("tank thread").expect("connected");
}
