//! Graph model shared by the tank and the mothership: nodes with four
//! directional edge slots, weighted paths, routes and the planet that owns
//! them, plus shortest-route planning.

mod direction;
mod error;
mod node;
mod path;
mod planet;
mod route;
mod routing;
mod types;


pub use direction::{abbreviated, Direction, DirectionParseError, RelativeDirection};
pub use error::PlanetError;
pub use node::{EdgeSlot, Node};
pub use path::{endpoint_label, path_id, Path};
pub use planet::Planet;
pub use route::Route;
pub use types::{Coord, NodeId, PathId, DEFAULT_PATH_LENGTH};
