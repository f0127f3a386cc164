//! Per-visitor session state for tessera.
//!
//! A [`SessionFactory`] checks once that the store is usable and then hands
//! out one [`SessionManager`] per request.  The manager exposes a registry
//! with a session-wide `data` scope and a `page` scope keyed by the page
//! fingerprint, and announces close / destroy through the event dispatcher.

pub mod backend;
pub mod capability;
pub mod directives;
pub mod environment;
pub mod events;
pub mod factory;
pub mod manager;
pub mod page;
mod path;
pub mod registry;
pub mod request;
pub mod state;
pub mod view;

pub use backend::{FileBackend, MemoryBackend, SessionBackend};
pub use environment::{Environment, StaticEnvironment};
pub use events::{Event, EventDispatcher};
pub use factory::{RequestContext, SessionFactory};
pub use manager::{Lifecycle, Services, SessionManager, COMPONENT_ID};
pub use page::page_fingerprint;
pub use registry::{Permission, Registry, RegistryAccess};
pub use request::{Channel, RequestChannels, RequestParams};
pub use state::{SessionData, SharedState};
pub use view::{ViewData, ViewSink, RENDER_PRE};
