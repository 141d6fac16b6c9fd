use std::collections::HashMap;
use std::time::Duration;

use planet_map::{Coord, Direction, Node, Planet, PlanetError};
use planet_proto::RequestResponse;

use super::*;

fn two_node_planet() -> Planet {
    let mut planet = Planet::new();
    planet.add_node(Node::new("A", Coord::new(0.0, 0.0))).unwrap();
    planet.add_node(Node::new("B", Coord::new(1.0, 0.0))).unwrap();
    planet
        .connect("A", Direction::East, "B", Direction::West, 1.0)
        .unwrap();
    planet
}

fn manager_at_a() -> PlanetStateManager {
    let mut manager = PlanetStateManager::new();
    manager.set_planet(two_node_planet());
    manager
        .set_tank_entity(TankEntity::new("tank", "A", Direction::North))
        .unwrap();
    manager.on_tank_arrival().unwrap();
    manager
}

#[test]
fn tank_entity_faces_away_from_arrival_exit() {
    let tank = TankEntity::new("tank", "A", Direction::North);
    assert_eq!(tank.facing_direction, Direction::South);
    assert_eq!(tank.departure_direction, Direction::Unknown);
    assert!(!tank.reached_first_node);
}

#[test]
fn first_arrival_only_marks_reached() {
    let manager = manager_at_a();
    let tank = manager.tank().unwrap();
    assert!(tank.reached_first_node);
    assert_eq!(tank.cur_node_id, "A");

    let info = manager.tank_arrival_response().unwrap();
    assert_eq!(info.node_id, "A");
    assert_eq!(info.facing_direction, Direction::South);
    assert_eq!(info.available_paths, vec![Direction::East]);
}

#[test]
fn approved_departure_moves_tank_to_far_end() {
    let mut manager = manager_at_a();
    let response = manager.tank_path_chosen_response(Direction::East).unwrap();
    assert!(response.is_approved);
    assert_eq!(manager.tank().unwrap().departure_direction, Direction::East);

    manager.on_tank_arrival().unwrap();
    let tank = manager.tank().unwrap();
    assert_eq!(tank.cur_node_id, "B");
    // Entered through B's west exit, so the tank faces east.
    assert_eq!(tank.facing_direction, Direction::East);

    let info = manager.tank_arrival_response().unwrap();
    assert_eq!(info.node_id, "B");
    assert_eq!(info.node_coord, Coord::new(1.0, 0.0));
    assert_eq!(info.available_paths, vec![Direction::West]);
}

#[test]
fn unknown_direction_is_denied_without_side_effects() {
    let mut manager = manager_at_a();
    for direction in [Direction::North, Direction::Unknown] {
        let response = manager.tank_path_chosen_response(direction).unwrap();
        assert!(!response.is_approved, "{direction} should be denied");
        assert!(!response.message.is_empty());
    }
    assert_eq!(
        manager.tank().unwrap().departure_direction,
        Direction::Unknown
    );
    assert!(matches!(
        manager.on_tank_arrival(),
        Err(StateError::NoDeparture { .. })
    ));
}

#[test]
fn blocked_path_is_reported_and_tank_returns() {
    let mut manager = manager_at_a();
    assert!(manager
        .tank_path_chosen_response(Direction::East)
        .unwrap()
        .is_approved);
    manager.handle_tank_path_blocked().unwrap();

    let planet = manager.planet().unwrap();
    assert!(planet.path("A:E-B:W").unwrap().is_blocked());
    assert!(!planet.shortest_routes_from("A").contains_key("B"));

    manager.on_tank_arrival().unwrap();
    let tank = manager.tank().unwrap();
    assert_eq!(tank.cur_node_id, "A");
    assert_eq!(tank.facing_direction, Direction::West);
    assert!(!tank.returning_from_blocked);

    let info = manager.tank_arrival_response().unwrap();
    assert!(info.available_paths.is_empty());
    assert_eq!(
        manager.tank_path_chosen_response(Direction::East).unwrap(),
        RequestResponse::deny("there is no known path EAST of A")
    );
}

#[test]
fn blocked_far_end_is_hidden_and_denied() {
    let mut manager = PlanetStateManager::new();
    let mut planet = two_node_planet();
    planet.block_path_in_direction("A", Direction::East).unwrap();
    manager.set_planet(planet);
    manager
        .set_tank_entity(TankEntity::new("tank", "B", Direction::East))
        .unwrap();
    manager.on_tank_arrival().unwrap();

    assert!(manager
        .tank_arrival_response()
        .unwrap()
        .available_paths
        .is_empty());
    let response = manager.tank_path_chosen_response(Direction::West).unwrap();
    assert_eq!(response, RequestResponse::deny("path A:E-B:W is blocked"));
}

#[test]
fn blocking_twice_is_a_topology_conflict() {
    let mut manager = manager_at_a();
    manager.tank_path_chosen_response(Direction::East).unwrap();
    manager.handle_tank_path_blocked().unwrap();
    assert!(matches!(
        manager.handle_tank_path_blocked(),
        Err(StateError::Planet(PlanetError::PathUnavailable { .. }))
    ));
}

#[test]
fn self_loop_arrives_through_other_exit() {
    let mut planet = two_node_planet();
    planet
        .connect("B", Direction::North, "B", Direction::East, 2.0)
        .unwrap();
    let mut manager = PlanetStateManager::new();
    manager.set_planet(planet);
    manager
        .set_tank_entity(TankEntity::new("tank", "B", Direction::West))
        .unwrap();
    manager.on_tank_arrival().unwrap();

    manager.tank_path_chosen_response(Direction::North).unwrap();
    manager.on_tank_arrival().unwrap();
    let tank = manager.tank().unwrap();
    assert_eq!(tank.cur_node_id, "B");
    assert_eq!(tank.facing_direction, Direction::West);
}

#[test]
fn missing_planet_or_tank_are_errors() {
    let mut manager = PlanetStateManager::new();
    assert_eq!(
        manager.set_tank_entity(TankEntity::new("tank", "A", Direction::North)),
        Err(StateError::NoPlanet)
    );
    manager.set_planet(two_node_planet());
    assert_eq!(manager.on_tank_arrival(), Err(StateError::NoTank));
    assert_eq!(
        manager.set_tank_entity(TankEntity::new("tank", "Q", Direction::North)),
        Err(StateError::UnknownStartNode {
            node_id: "Q".to_string()
        })
    );
    assert!(manager.remove_tank().is_none());
}

#[test]
fn config_defaults_apply_without_sources() {
    let config = MothershipConfig::from_env_with(|_| None).unwrap();
    assert_eq!(config, MothershipConfig::default());
    assert_eq!(config.bind_addr, "0.0.0.0:65432");
    assert_eq!(config.tick_interval(), Duration::from_millis(100));
    assert!(config.auto_start);
    assert_eq!(config.arrival_from, Direction::South);
}

#[test]
fn config_reads_overrides() {
    let values: HashMap<&str, &str> = [
        (config::ENV_BIND_ADDR, "127.0.0.1:7000"),
        (config::ENV_TICK_MS, "20"),
        (config::ENV_TANK_IP, "192.168.1.12"),
        (config::ENV_PLANET_FILE, "planets/moon.json"),
        (config::ENV_START_NODE, "A"),
        (config::ENV_ARRIVAL_FROM, "w"),
        (config::ENV_AUTO_START, "false"),
    ]
    .into_iter()
    .collect();
    let config =
        MothershipConfig::from_env_with(|key| values.get(key).map(|value| value.to_string()))
            .unwrap();
    assert_eq!(config.bind_addr, "127.0.0.1:7000");
    assert_eq!(config.tick_ms, 20);
    assert_eq!(config.tank_ip, Some("192.168.1.12".parse().unwrap()));
    assert_eq!(config.start_node.as_deref(), Some("A"));
    assert_eq!(config.arrival_from, Direction::West);
    assert!(!config.auto_start);

    let link = config.link_config();
    assert_eq!(link.bind_addr, "127.0.0.1:7000");
    assert_eq!(link.allowed_peer, config.tank_ip);
}

#[test]
fn config_rejects_bad_values() {
    let err = MothershipConfig::from_env_with(|key| {
        (key == config::ENV_TICK_MS).then(|| "0".to_string())
    })
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::InvalidValue {
            key: config::ENV_TICK_MS,
            value: "0".to_string()
        }
    );
    assert!(MothershipConfig::from_env_with(|key| {
        (key == config::ENV_ARRIVAL_FROM).then(|| "U".to_string())
    })
    .is_err());
    assert!(MothershipConfig::from_env_with(|key| {
        (key == config::ENV_TANK_IP).then(|| "not-an-ip".to_string())
    })
    .is_err());
}

#[test]
fn config_file_keys_fall_back_to_defaults() {
    let mut path = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    path.push(format!("mothership-config-{nanos}.toml"));
    std::fs::write(
        &path,
        "MOTHERSHIP_BIND_ADDR = \"127.0.0.1:6000\"\nMOTHERSHIP_RECV_TIMEOUT_MS = 25\n",
    )
    .expect("write config");

    let config = MothershipConfig::from_config_file(&path).expect("config");
    assert_eq!(config.bind_addr, "127.0.0.1:6000");
    assert_eq!(config.recv_timeout_ms, 25);
    assert_eq!(config.accept_timeout_ms, config::DEFAULT_ACCEPT_TIMEOUT_MS);
    let _ = std::fs::remove_file(&path);
}
