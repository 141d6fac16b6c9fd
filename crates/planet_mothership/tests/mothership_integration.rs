use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use planet_map::{Coord, Direction, Node, Planet, Route};
use planet_mothership::{Mothership, UpdateEvent};
use planet_net::{LinkError, MothershipClient, MothershipClientConfig, TankLinkConfig};
use planet_proto::InternalPlanetUpdate;

fn two_node_planet() -> Planet {
    let mut planet = Planet::new();
    planet.add_node(Node::new("A", Coord::new(0.0, 0.0))).unwrap();
    planet.add_node(Node::new("B", Coord::new(1.0, 0.0))).unwrap();
    planet
        .connect("A", Direction::East, "B", Direction::West, 1.0)
        .unwrap();
    planet
}

fn bind_mothership() -> Mothership {
    let link = TankLinkConfig::default()
        .with_bind_addr("127.0.0.1:0")
        .with_accept_timeout(Duration::from_millis(10))
        .with_recv_timeout(Duration::from_millis(10));
    let mut mothership = Mothership::bind(link, two_node_planet())
        .expect("bind")
        .with_tick_interval(Duration::from_millis(5));
    mothership
        .set_start_position("A", Direction::North)
        .expect("start position");
    mothership
}

fn client_config(mothership: &Mothership) -> MothershipClientConfig {
    MothershipClientConfig::new(mothership.local_addr().to_string())
        .with_retry_interval(Duration::from_millis(20))
        .with_max_attempts(50)
        .with_response_timeout(Some(Duration::from_secs(5)))
}

fn tick_until(
    mothership: &mut Mothership,
    mut done: impl FnMut(&Mothership, &[UpdateEvent]) -> bool,
) -> Vec<UpdateEvent> {
    let mut events = Vec::new();
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        events.extend(mothership.tick());
        if done(mothership, &events) {
            return events;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("mothership did not reach expected state: {events:?}");
}

#[test]
fn two_node_walk_moves_tank_and_records_planet_update() {
    let mut mothership = bind_mothership();
    let config = client_config(&mothership);

    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("connect");
        client.wait_for_start().expect("start");

        client.send_node_arrival().expect("arrival");
        let first = client.get_node_arrival_response().expect("arrival response");

        client.send_path_chosen(Direction::North).expect("choose north");
        let denied = client.get_path_chosen_response().expect("north response");

        client.send_path_chosen(Direction::East).expect("choose east");
        let approved = client.get_path_chosen_response().expect("east response");

        let mut planet = Planet::new();
        planet
            .add_node_with_unknown_paths("A", Coord::new(0.0, 0.0), [Direction::East])
            .unwrap();
        client
            .send_internal_planet_update(InternalPlanetUpdate {
                planet,
                cur_node: "A".to_string(),
                target_node: None,
                target_route: None::<Route>,
                depart_dir: Direction::East,
            })
            .expect("planet update");

        client.send_node_arrival().expect("second arrival");
        let second = client.get_node_arrival_response().expect("second response");
        client.send_finished_exploring().expect("finished");
        (first, denied, approved, second)
    });

    let events = tick_until(&mut mothership, |_, events| {
        events
            .iter()
            .any(|event| matches!(event, UpdateEvent::TankFinished { .. }))
    });
    let (first, denied, approved, second) = tank.join().expect("tank thread");

    assert!(matches!(
        events.first(),
        Some(UpdateEvent::AddedTank { starting_node_id, .. }) if starting_node_id == "A"
    ));
    assert_eq!(first.node_id, "A");
    assert_eq!(first.facing_direction, Direction::South);
    assert_eq!(first.available_paths, vec![Direction::East]);
    assert!(!denied.is_approved);
    assert!(approved.is_approved);
    assert_eq!(second.node_id, "B");
    assert_eq!(second.facing_direction, Direction::East);

    let update = mothership.last_planet_update().expect("planet update kept");
    assert_eq!(update.cur_node, "A");
    assert_eq!(update.depart_dir, Direction::East);
    let tank = mothership.state().tank().expect("tank registered");
    assert_eq!(tank.cur_node_id, "B");
}

#[test]
fn path_blocked_makes_far_node_unreachable() {
    let mut mothership = bind_mothership();
    let config = client_config(&mothership);

    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("connect");
        client.wait_for_start().expect("start");
        client.send_node_arrival().expect("arrival");
        client.get_node_arrival_response().expect("arrival response");
        client.send_path_chosen(Direction::East).expect("choose east");
        assert!(client.get_path_chosen_response().expect("response").is_approved);
        client.send_path_blocked().expect("blocked");
        client.send_node_arrival().expect("return arrival");
        let back = client.get_node_arrival_response().expect("return response");
        client.send_stuck().expect("stuck");
        back
    });

    tick_until(&mut mothership, |_, events| {
        events
            .iter()
            .any(|event| matches!(event, UpdateEvent::TankStuck { .. }))
    });
    let back = tank.join().expect("tank thread");
    assert_eq!(back.node_id, "A");
    assert_eq!(back.facing_direction, Direction::West);
    assert!(back.available_paths.is_empty());

    let planet = mothership.state().planet().expect("planet");
    assert!(!planet.shortest_routes_from("A").contains_key("B"));
}

#[test]
fn topology_conflict_is_reported_as_error_message() {
    let mut mothership = bind_mothership();
    let config = client_config(&mothership);

    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("connect");
        client.wait_for_start().expect("start");
        client.send_path_blocked().expect("blocked without departure");
        let err = client.get_node_arrival_response().unwrap_err();
        client.send_stuck().expect("stuck");
        err
    });

    tick_until(&mut mothership, |_, events| {
        events
            .iter()
            .any(|event| matches!(event, UpdateEvent::TankStuck { .. }))
    });
    let err = tank.join().expect("tank thread");
    assert!(matches!(err, LinkError::Rejected { .. }));
    assert!(mothership.state().tank().is_some());
}

#[test]
fn lost_tank_is_removed_and_mothership_keeps_running() {
    let mut mothership = bind_mothership();
    let mut stream = TcpStream::connect(mothership.local_addr()).expect("connect");
    stream.write_all(b"connection_request\n").expect("request");

    tick_until(&mut mothership, |mothership, _| {
        mothership.state().tank().is_some()
    });
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    let mut line = String::new();
    reader.read_line(&mut line).expect("approval");
    assert_eq!(line.trim(), "connection_approved");
    drop(reader);
    drop(stream);

    let events = tick_until(&mut mothership, |mothership, _| {
        mothership.state().tank().is_none()
    });
    assert!(events
        .iter()
        .any(|event| matches!(event, UpdateEvent::TankConnectionLost { .. })));
    assert!(mothership.tank_ip().is_none());

    let config = client_config(&mothership);
    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("reconnect");
        client.wait_for_start().expect("start");
    });
    tick_until(&mut mothership, |mothership, _| {
        mothership.state().tank().is_some()
    });
    tank.join().expect("tank thread");
}

#[test]
fn disconnect_tank_closes_link_and_forgets_tank() {
    let mut mothership = bind_mothership();
    let config = client_config(&mothership);

    let tank = thread::spawn(move || {
        let mut client = MothershipClient::connect(config).expect("connect");
        client.wait_for_start().expect("start");
        client.next_message()
    });
    tick_until(&mut mothership, |mothership, _| {
        mothership.state().tank().is_some()
    });

    mothership.disconnect_tank();
    let events = tick_until(&mut mothership, |mothership, _| {
        mothership.state().tank().is_none()
    });
    assert!(events
        .iter()
        .any(|event| matches!(event, UpdateEvent::DisconnectedTank { .. })));
    assert!(!events
        .iter()
        .any(|event| matches!(event, UpdateEvent::TankConnectionLost { .. })));
    assert!(mothership.tank_ip().is_none());

    let after_disconnect = tank.join().expect("tank thread");
    assert!(matches!(
        after_disconnect,
        Err(LinkError::Closed | LinkError::Io(_))
    ));
}

#[test]
fn run_stops_on_shutdown_flag() {
    let mut mothership = bind_mothership();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let handle = thread::spawn(move || {
        mothership.run(&flag).expect("run");
        mothership
    });
    thread::sleep(Duration::from_millis(50));
    shutdown.store(true, Ordering::SeqCst);
    let mothership = handle.join().expect("mothership thread");
    assert!(mothership.state().tank().is_none());
}
