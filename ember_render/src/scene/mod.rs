/// Scene module - entity/component store and the components the renderer reads

pub mod scene_store;
pub mod components;

pub use scene_store::{Entity, ObserverId, SceneStore};
pub use components::*;
