mod floor;
mod router;
mod view;

pub use floor::{FloorHit, FloorSensor, FloorSensorConfig, SensorSite};
pub use router::{InputEvent, InputRouter, InputState};
pub use view::{FirstPersonView, ViewConfig};
