use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use planet_map::{Coord, Direction, Node, Planet};
use planet_mothership::Mothership;
use planet_net::{MothershipClient, MothershipClientConfig, TankLinkConfig};
use planet_tank::{ExplorationOutcome, FollowOutcome, InstantDriver, ScriptedDriver, TankRobot};

fn t_planet() -> Planet {
    // B - A - C with D hanging below A.
    let mut planet = Planet::new();
    for (name, x, y) in [("A", 0.0, 0.0), ("B", -1.0, 0.0), ("C", 1.0, 0.0), ("D", 0.0, -1.0)] {
        planet.add_node(Node::new(name, Coord::new(x, y))).unwrap();
    }
    planet
        .connect("A", Direction::West, "B", Direction::East, 1.0)
        .unwrap();
    planet
        .connect("A", Direction::East, "C", Direction::West, 2.0)
        .unwrap();
    planet
        .connect("A", Direction::South, "D", Direction::North, 1.5)
        .unwrap();
    planet
}

fn spawn_mothership(planet: Planet) -> (String, Arc<AtomicBool>, thread::JoinHandle<Mothership>) {
    let link = TankLinkConfig::default()
        .with_bind_addr("127.0.0.1:0")
        .with_accept_timeout(Duration::from_millis(10))
        .with_recv_timeout(Duration::from_millis(10));
    let mut mothership = Mothership::bind(link, planet)
        .expect("bind")
        .with_tick_interval(Duration::from_millis(5));
    mothership
        .set_start_position("A", Direction::North)
        .expect("start position");
    let addr = mothership.local_addr().to_string();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let handle = thread::spawn(move || {
        mothership.run(&flag).expect("mothership run");
        mothership
    });
    (addr, shutdown, handle)
}

fn connect(addr: String) -> MothershipClient {
    let config = MothershipClientConfig::new(addr)
        .with_retry_interval(Duration::from_millis(20))
        .with_max_attempts(50)
        .with_response_timeout(Some(Duration::from_secs(5)));
    let mut client = MothershipClient::connect(config).expect("connect");
    client.wait_for_start().expect("start");
    client
}

#[test]
fn tank_explores_planet_over_tcp() {
    let (addr, shutdown, handle) = spawn_mothership(t_planet());

    let mut robot = TankRobot::new(connect(addr), InstantDriver);
    let outcome = robot.core_loop().expect("exploration");
    assert_eq!(outcome, ExplorationOutcome::Finished);

    let explorer = robot.explorer();
    assert_eq!(explorer.planet().nodes().len(), 4);
    assert_eq!(explorer.planet().paths().len(), 3);
    assert!(explorer.finished_exploring());

    // Let the mothership read the trailing messages before stopping it.
    thread::sleep(Duration::from_millis(100));
    shutdown.store(true, Ordering::SeqCst);
    let mothership = handle.join().expect("mothership thread");

    let tank = mothership.state().tank().expect("tank still registered");
    assert_eq!(Some(tank.cur_node_id.as_str()), explorer.cur_node_id());
    // Sent from A before the final leg, so B is not in it yet.
    let update = mothership.last_planet_update().expect("planet update");
    assert_eq!(update.cur_node, "A");
    assert_eq!(update.depart_dir, Direction::West);
    assert_eq!(update.planet.nodes().len(), 3);
}

#[test]
fn blocked_path_is_shared_with_mothership_over_tcp() {
    let (addr, shutdown, handle) = spawn_mothership(t_planet());

    // Arrive at A, then the first departure hits an obstacle.
    let driver = ScriptedDriver::new([FollowOutcome::ArrivedAtNode, FollowOutcome::PathBlocked]);
    let mut robot = TankRobot::new(connect(addr), driver);
    let outcome = robot.core_loop().expect("exploration");
    assert_eq!(outcome, ExplorationOutcome::Finished);

    assert!(robot.channel().peer_addr().ip().is_loopback());
    let explorer = robot.explorer();
    assert_eq!(explorer.planet().nodes().len(), 3);
    assert!(!explorer.planet().node("A").unwrap().is_available(Direction::East));

    thread::sleep(Duration::from_millis(100));
    shutdown.store(true, Ordering::SeqCst);
    let mothership = handle.join().expect("mothership thread");
    let planet = mothership.state().planet().expect("planet");
    assert!(planet.path("A:E-C:W").unwrap().is_blocked());
}
