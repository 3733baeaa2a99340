//! Host collaborator contract for crafthammer modules
//!
//! The game host owns event dispatch, the tick scheduler and outbound
//! transmission. This crate describes that contract as the [`Host`] trait and
//! ships [`LocalHost`], an in-process implementation used by the runner and
//! by tests.

pub mod clock;
pub mod host;
pub mod local;
pub mod world;

pub use clock::{Clock, ManualClock, SystemClock};
pub use host::{
    ClientCommand, Host, ListenerId, ServerCommand, ServerCommandListener, TickListener,
};
pub use local::LocalHost;
pub use world::{Unit, UnitId, Vector, World, distance};
