//! Service layer
//!
//! Stage resolution, shadow state and the route guards built on them.

pub mod guard_actor;
pub mod guard_supervisor;
pub mod route_guard;
pub mod route_table;
pub mod shadow_state;
pub mod stage_resolver;

pub use guard_actor::{spawn_route_guard, RouteGuardHandle};
pub use guard_supervisor::{GuardSupervisor, MountRequest, Mounted};
pub use route_guard::{GuardOutcome, GuardPhase, GuardStatus, RouteGuard};
pub use route_table::RouteTable;
pub use shadow_state::{MergeOutcome, ShadowStateStore};
