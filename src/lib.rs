//! Mapshot
//!
//! Renders zoomable screenshots of Factorio saves by driving the game with a
//! companion mod, and serves the rendered shots over HTTP.

pub mod config;
pub mod error;
pub mod factorio;
pub mod render;
pub mod serve;
pub mod wait;

pub use config::{RenderParams, ServeConfig, Settings};
pub use error::{Error, Result};
pub use factorio::{Factorio, ModList, ModListEntry};
pub use render::{RenderOutput, Renderer};
pub use serve::{RoutingTable, Server, ShotInfo, ShotsJson};
pub use wait::{next_wake, shutdown_channel, Shutdown, ShutdownTrigger, Wake};
