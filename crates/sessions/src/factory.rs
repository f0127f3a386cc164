//! Process-wide session factory and per-request context.
//!
//! The factory is the single handle through which sessions are created.  It
//! runs the capability check once, then builds at most one
//! [`SessionManager`] per [`RequestContext`], lazily on first access.

use std::sync::{Arc, OnceLock};

use ts_domain::config::{Config, SessionConfig};
use ts_domain::error::{Error, Result};

use crate::backend;
use crate::capability;
use crate::directives;
use crate::environment::Environment;
use crate::manager::{Services, SessionManager};
use crate::request::{RequestChannels, RequestParams};
use crate::state::SessionData;

static GLOBAL: OnceLock<SessionFactory> = OnceLock::new();

/// Everything the session layer needs from one request.
pub struct RequestContext<R: RequestChannels = RequestParams> {
    pub request: R,
    pub environment: Arc<dyn Environment>,
    session: Option<Arc<SessionManager>>,
}

impl<R: RequestChannels> RequestContext<R> {
    pub fn new(request: R, environment: Arc<dyn Environment>) -> Self {
        Self {
            request,
            environment,
            session: None,
        }
    }

    /// The session, if one was started for this request.
    pub fn session(&self) -> Option<&Arc<SessionManager>> {
        self.session.as_ref()
    }
}

pub struct SessionFactory {
    config: SessionConfig,
    services: Services,
    capability: OnceLock<std::result::Result<(), String>>,
}

impl SessionFactory {
    pub fn new(config: SessionConfig, services: Services) -> Self {
        Self {
            config,
            services,
            capability: OnceLock::new(),
        }
    }

    /// Factory with the backend selected in `config` and default
    /// dispatcher / view.
    pub fn from_config(config: &Config) -> Self {
        let backend = backend::from_kind(config.session.backend);
        Self::new(config.session.clone(), Services::new(backend))
    }

    /// Make this factory the process-wide one.  Fails if one is installed.
    pub fn install(self) -> Result<&'static SessionFactory> {
        GLOBAL
            .set(self)
            .map_err(|_| Error::State("a session factory is already installed".into()))?;
        GLOBAL
            .get()
            .ok_or_else(|| Error::State("session factory vanished after install".into()))
    }

    pub fn global() -> Option<&'static SessionFactory> {
        GLOBAL.get()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Verify the store is usable.  The probe runs once; later calls replay
    /// its outcome.
    pub fn ensure_capability(&self) -> Result<()> {
        self.capability
            .get_or_init(|| capability::probe(self.services.backend.as_ref()))
            .clone()
            .map_err(Error::Configuration)
    }

    /// The session for `ctx`, started on first access.
    pub fn session<R: RequestChannels>(
        &self,
        ctx: &mut RequestContext<R>,
    ) -> Result<Arc<SessionManager>> {
        if let Some(existing) = &ctx.session {
            return Ok(existing.clone());
        }

        self.ensure_capability()?;
        let manager = SessionManager::start(
            &self.config,
            self.services.clone(),
            ctx.environment.as_ref(),
            &mut ctx.request,
        )?;
        ctx.session = Some(manager.clone());
        Ok(manager)
    }

    /// Reclaim sessions idle for longer than the configured lifetime.
    pub fn collect_garbage(&self, env: &dyn Environment) -> Result<usize> {
        self.ensure_capability()?;
        let directives = directives::resolve(&self.config, env, false)?;
        self.services.backend.configure(&directives)?;
        self.services
            .backend
            .gc(directives.effective_lifetime())
            .map_err(|e| Error::runtime("collecting expired sessions", e))
    }

    /// Load the stored state of `id` without starting a session.
    pub fn inspect(&self, env: &dyn Environment, id: &str) -> Result<Option<SessionData>> {
        self.ensure_capability()?;
        let directives = directives::resolve(&self.config, env, false)?;
        self.services.backend.configure(&directives)?;
        self.services.backend.read(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, SessionBackend};
    use crate::environment::StaticEnvironment;
    use crate::request::Channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use ts_domain::config::EnvironmentConfig;

    /// Counts capability probes.
    struct CountingBackend {
        inner: MemoryBackend,
        probes: AtomicUsize,
    }

    impl SessionBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn is_available(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn configure(&self, d: &directives::StoreDirectives) -> Result<()> {
            self.inner.configure(d)
        }
        fn read(&self, id: &str) -> Result<Option<SessionData>> {
            self.inner.read(id)
        }
        fn write(&self, id: &str, data: &SessionData) -> Result<()> {
            self.inner.write(id, data)
        }
        fn destroy(&self, id: &str) -> Result<()> {
            self.inner.destroy(id)
        }
        fn gc(&self, max: Duration) -> Result<usize> {
            self.inner.gc(max)
        }
    }

    fn ctx() -> RequestContext {
        let env = StaticEnvironment::from_config(&EnvironmentConfig::default()).with_page("home");
        RequestContext::new(RequestParams::new(), Arc::new(env))
    }

    #[test]
    fn capability_probe_runs_once() {
        let backend = Arc::new(CountingBackend {
            inner: MemoryBackend::new(),
            probes: AtomicUsize::new(0),
        });
        let factory = SessionFactory::new(SessionConfig::named("SID"), Services::new(backend.clone()));

        for _ in 0..3 {
            let mut ctx = ctx();
            factory.session(&mut ctx).unwrap();
        }
        assert_eq!(backend.probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn one_manager_per_request_context() {
        let factory = SessionFactory::new(
            SessionConfig::named("SID"),
            Services::new(Arc::new(MemoryBackend::new())),
        );
        let mut ctx = ctx();
        let a = factory.session(&mut ctx).unwrap();
        let b = factory.session(&mut ctx).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(ctx.session().is_some());
    }

    #[test]
    fn unavailable_backend_is_fatal() {
        let factory = SessionFactory::new(
            SessionConfig::named("SID"),
            Services::new(Arc::new(MemoryBackend::unavailable())),
        );
        let mut ctx = ctx();
        let err = factory.session(&mut ctx).unwrap_err();
        assert!(err.is_configuration());
        assert!(ctx.session().is_none());
        // The cached outcome is replayed.
        assert!(factory.session(&mut ctx).unwrap_err().is_configuration());
    }

    #[test]
    fn inspect_reads_stored_state() {
        let backend = Arc::new(MemoryBackend::new());
        let factory = SessionFactory::new(SessionConfig::named("SID"), Services::new(backend));
        let mut ctx = ctx();
        let id = {
            let session = factory.session(&mut ctx).unwrap();
            session.close().unwrap();
            session.id().to_owned()
        };

        let env = StaticEnvironment::from_config(&EnvironmentConfig::default());
        assert!(factory.inspect(&env, &id).unwrap().is_some());
        assert!(factory.inspect(&env, "unknown-id-000000000000").unwrap().is_none());
    }

    #[test]
    fn cookie_is_consumed_by_the_factory_session() {
        let factory = SessionFactory::new(
            SessionConfig::named("SID"),
            Services::new(Arc::new(MemoryBackend::new())),
        );
        let env = StaticEnvironment::from_config(&EnvironmentConfig::default());
        let mut ctx = RequestContext::new(
            RequestParams::new().with(Channel::Cookie, "SID", "whatever-value-0000000000"),
            Arc::new(env),
        );
        factory.session(&mut ctx).unwrap();
        assert!(ctx.request.get(Channel::Cookie, "SID").is_none());
    }
}
