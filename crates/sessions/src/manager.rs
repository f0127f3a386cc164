//! Per-request session manager.
//!
//! Starting a manager configures the store, resumes or issues the session
//! id, strips the id from every request channel and binds a registry whose
//! `data` and `page` scopes write straight into the session state:
//!
//! ```text
//! registry
//! ├── name  "SID"
//! ├── id    "<session id>"
//! ├── data  → SessionData.data
//! └── page  → SessionData.pages[sha256(page id)]
//! ```
//!
//! `close()` flushes the state and ends write access; `destroy()` wipes it.
//! Both announce themselves with `tessera.session.{close,destroy}.{pre,post}`.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};

use ts_domain::config::SessionConfig;
use ts_domain::error::{Error, Result};
use ts_domain::trace::TraceEvent;

use crate::backend::{SessionBackend, SessionLock};
use crate::directives;
use crate::environment::Environment;
use crate::events::{Event, EventDispatcher, ListenerId};
use crate::page::page_fingerprint;
use crate::registry::{Permission, Registry, RegistryAccess};
use crate::request::{Channel, RequestChannels};
use crate::state::{SharedState, Slot, StateBinding};
use crate::view::{ViewData, ViewSink, RENDER_PRE};

/// Prefix of every event the manager emits.
pub const COMPONENT_ID: &str = "tessera.session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Closed,
    Destroyed,
}

/// Collaborators a manager delegates to.
#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn SessionBackend>,
    pub dispatcher: Arc<EventDispatcher>,
    pub view: Arc<dyn ViewSink>,
}

impl Services {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            dispatcher: Arc::new(EventDispatcher::new()),
            view: Arc::new(ViewData::new()),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_view(mut self, view: Arc<dyn ViewSink>) -> Self {
        self.view = view;
        self
    }
}

pub struct SessionManager {
    name: String,
    id: String,
    fingerprint: String,
    state: SharedState,
    registry: RwLock<Option<Registry>>,
    lifecycle: Mutex<Lifecycle>,
    started_at: Instant,
    services: Services,
    render_listener: Mutex<Option<ListenerId>>,
    /// Exclusive claim on `id` in the store, held until close, destroy or drop.
    lock: Mutex<Option<SessionLock>>,
}

impl SessionManager {
    /// Start the session for the current request.
    ///
    /// A missing session name fails with [`Error::Configuration`] before the
    /// store is touched.  Every other failure is wrapped in
    /// [`Error::Runtime`].  Nothing is registered with the dispatcher until
    /// all fallible steps have succeeded.
    pub fn start(
        config: &SessionConfig,
        services: Services,
        env: &dyn Environment,
        request: &mut dyn RequestChannels,
    ) -> Result<Arc<Self>> {
        directives::StoreDirectives::from_config(config)?;

        let manager = Self::prepare(config, services, env, request)
            .map_err(|e| Error::runtime("initializing session", e))?;
        let manager = Arc::new(manager);
        manager.register_render_listener();
        Ok(manager)
    }

    fn prepare(
        config: &SessionConfig,
        services: Services,
        env: &dyn Environment,
        request: &mut dyn RequestChannels,
    ) -> Result<Self> {
        let started_at = Instant::now();
        let directives = directives::resolve(config, env, true)?;
        let name = directives.name.clone();
        services.backend.configure(&directives)?;

        let incoming = request.lookup(&Channel::Cookie.key(&name));
        let opened = services.backend.open(incoming.as_deref())?;
        let fingerprint = page_fingerprint(env.page_id());

        for channel in Channel::ALL {
            let key = channel.key(&name);
            if request.unregister(&key) {
                TraceEvent::RequestValueStripped { key }.emit();
            }
        }

        let mut data = opened.data;
        data.ensure_page(&fingerprint);
        let state: SharedState = Arc::new(RwLock::new(data));

        let registry = Registry::new(Permission::All);
        registry.set(None, json!({ "name": name, "id": opened.id }))?;
        registry.bind("data", StateBinding::new(state.clone(), Slot::Data))?;
        registry.bind(
            "page",
            StateBinding::new(state.clone(), Slot::Page(fingerprint.clone())),
        )?;

        TraceEvent::SessionStarted {
            session_name: name.clone(),
            session_id: opened.id.clone(),
            backend: services.backend.name().into(),
            is_new: opened.is_new,
        }
        .emit();
        TraceEvent::PageScoped {
            session_id: opened.id.clone(),
            fingerprint: fingerprint.clone(),
        }
        .emit();

        Ok(Self {
            name,
            id: opened.id,
            fingerprint,
            state,
            registry: RwLock::new(Some(registry)),
            lifecycle: Mutex::new(Lifecycle::Active),
            started_at,
            services,
            render_listener: Mutex::new(None),
            lock: Mutex::new(Some(opened.lock)),
        })
    }

    fn register_render_listener(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let id = self
            .services
            .dispatcher
            .add_listener(RENDER_PRE, move |_event| {
                if let Some(manager) = weak.upgrade() {
                    manager.on_pre_render();
                }
                Ok(())
            });
        *self.render_listener.lock() = Some(id);
    }

    /// Publish the registry snapshot to the view as `session`.
    pub fn on_pre_render(&self) {
        if let Some(snapshot) = self.snapshot() {
            self.services.view.register("session", snapshot);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fingerprint of the page this request is scoped to.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// The session state the registry scopes are bound to.
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Full registry contents, `None` once destroyed.
    pub fn snapshot(&self) -> Option<Value> {
        self.registry
            .read()
            .as_ref()
            .and_then(|registry| registry.get(None).ok().flatten())
    }

    /// Flush the session and end write access for this request.  The id is
    /// released to other requests once the write succeeds.
    pub fn close(&self) -> Result<()> {
        self.require_state(&[Lifecycle::Active], "close")?;
        self.guarded("closing session", || {
            self.notify("close.pre")?;
            let data = self.state.read().clone();
            self.services.backend.write(&self.id, &data)?;
            *self.lifecycle.lock() = Lifecycle::Closed;
            self.lock.lock().take();
            self.notify("close.post")?;

            TraceEvent::SessionClosed {
                session_id: self.id.clone(),
                duration_ms: self.started_at.elapsed().as_millis() as u64,
            }
            .emit();
            Ok(())
        })
    }

    /// Irreversibly end the session: delete it from the store, then wipe the
    /// in-memory state.  If the store refuses, nothing is wiped and the call
    /// may be retried.  A second successful call is rejected.
    pub fn destroy(&self) -> Result<()> {
        self.require_state(&[Lifecycle::Active, Lifecycle::Closed], "destroy")?;
        self.guarded("destroying session", || {
            self.notify("destroy.pre")?;
            self.services.backend.destroy(&self.id)?;
            self.registry.write().take();
            self.state.write().clear();
            *self.lifecycle.lock() = Lifecycle::Destroyed;
            self.lock.lock().take();
            self.notify("destroy.post")?;

            TraceEvent::SessionDestroyed {
                session_id: self.id.clone(),
            }
            .emit();
            Ok(())
        })
    }

    fn require_state(&self, allowed: &[Lifecycle], operation: &str) -> Result<()> {
        let current = self.lifecycle();
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(Error::State(format!(
                "cannot {operation} session {}: it is {current:?}",
                self.id
            )))
        }
    }

    fn guarded(&self, context: &str, op: impl FnOnce() -> Result<()>) -> Result<()> {
        op().map_err(|e| {
            tracing::warn!(session_id = %self.id, error = %e, "{context} failed");
            Error::runtime(context, e)
        })
    }

    fn notify(&self, suffix: &str) -> Result<()> {
        let event = Event::new(format!("{COMPONENT_ID}.{suffix}"))
            .with_payload(json!({ "name": self.name, "id": self.id }));
        self.services.dispatcher.notify(&event)
    }

    fn with_registry<T>(&self, f: impl FnOnce(&Registry) -> Result<T>) -> Result<T> {
        match self.registry.read().as_ref() {
            Some(registry) => f(registry),
            None => Err(Error::State(format!("session {} was destroyed", self.id))),
        }
    }

    fn writable(&self) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::Active => Ok(()),
            state => Err(Error::State(format!(
                "session {} is {state:?}; writes are no longer accepted",
                self.id
            ))),
        }
    }
}

impl RegistryAccess for SessionManager {
    fn get(&self, path: Option<&str>) -> Result<Option<Value>> {
        self.with_registry(|r| r.get(path))
    }

    fn set(&self, path: Option<&str>, value: Value) -> Result<()> {
        self.writable()?;
        self.with_registry(|r| r.set(path, value))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.with_registry(|r| r.exists(path))
    }

    fn unregister(&self, path: &str) -> Result<bool> {
        self.writable()?;
        self.with_registry(|r| r.unregister(path))
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(id) = self.render_listener.lock().take() {
            self.services.dispatcher.remove_listener(id);
        }

        // End of request: persist whatever was not explicitly closed, then
        // hand the id to the next request.
        if *self.lifecycle.get_mut() == Lifecycle::Active {
            let data = self.state.read().clone();
            if let Err(e) = self.services.backend.write(&self.id, &data) {
                tracing::warn!(session_id = %self.id, error = %e, "failed to flush session on drop");
            }
        }
        self.lock.get_mut().take();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("fingerprint", &self.fingerprint)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
