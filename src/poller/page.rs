use crate::config::{validate_page, PageConfig, PollPlan};
use crate::poller::client::{build_http_client, RequestTemplate, Transport, DEFAULT_REQUEST_TIMEOUT};
use crate::poller::rotation::{RotationMode, UserAgentRotator};
use crate::poller::scheduler::Schedule;
use crate::{ConfigError, PollError, PollerError};
use async_trait::async_trait;
use reqwest::Response;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

/// Outcome of one poll attempt
pub type PollResult = Result<Response, PollError>;

/// Callback receiving the poller id and the outcome of every poll attempt
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&str, PollResult) + Send + Sync>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, PollResult) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn call(&self, id: &str, result: PollResult) {
        (self.0)(id, result)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Polls one page and reports every result to a handler
#[async_trait]
pub trait Poller: Send + Sync {
    /// Polls until `cancel` fires. With `begin_immediately` the first
    /// request goes out right away instead of after the first interval.
    async fn start(&self, cancel: CancellationToken, begin_immediately: bool) -> crate::Result<()>;

    /// Replaces the handler; takes effect for requests completing afterwards
    fn set_handler(&self, handler: Handler);

    /// The configured id, or the generated one if none was configured
    fn id(&self) -> &str;
}

/// Poller for a single page
///
/// Built idle; [`Poller::start`] runs it until its cancellation token fires.
/// A poller runs once: starting it a second time fails with
/// [`PollerError::AlreadyStarted`].
pub struct PagePoller {
    id: String,
    transport: Arc<dyn Transport>,
    template: RequestTemplate,
    rotator: Mutex<UserAgentRotator>,
    plan: PollPlan,
    handler: Arc<RwLock<Option<Handler>>>,
    dispatch: Dispatch,
    started: AtomicBool,
}

impl PagePoller {
    /// Creates a poller with its own HTTP client
    ///
    /// # Returns
    ///
    /// * `Ok(PagePoller)` - Ready to start
    /// * `Err(PollerError::Config)` - Unrecognized method or unusable URL
    /// * `Err(PollerError::Reqwest)` - The HTTP client could not be built
    pub fn new(config: &PageConfig) -> crate::Result<Self> {
        let client = build_http_client(DEFAULT_REQUEST_TIMEOUT)?;
        Ok(Self::with_transport(config, Arc::new(client))?)
    }

    /// Creates a poller sending its requests through `transport`
    ///
    /// Use this to share one client between many pollers.
    pub fn with_transport(
        config: &PageConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let page = validate_page(config)?;

        tracing::debug!(
            id = %page.id,
            method = %page.method,
            url = %page.url,
            plan = ?page.plan,
            user_agents = page.user_agents.len(),
            "Page poller created"
        );

        Ok(Self {
            template: RequestTemplate::new(page.method, page.url, page.headers),
            rotator: Mutex::new(UserAgentRotator::new(
                page.user_agents,
                RotationMode::from_random_flag(page.random_ua),
            )),
            id: page.id,
            transport,
            plan: page.plan,
            handler: Arc::new(RwLock::new(None)),
            dispatch: Dispatch::none(),
            started: AtomicBool::new(false),
        })
    }

    /// Sends this poller's log output to `dispatch` instead of discarding it
    ///
    /// Events from the handler and the transport are not affected.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn plan(&self) -> &PollPlan {
        &self.plan
    }

    pub fn template(&self) -> &RequestTemplate {
        &self.template
    }

    /// Runs the schedule, dispatching one poll per firing
    async fn run(&self, cancel: CancellationToken, begin_immediately: bool) {
        let schedule = Schedule::from_plan(&self.plan);
        tracing::info!(
            id = %self.id,
            url = %self.template.url(),
            schedule = ?schedule,
            "Starting poller"
        );

        schedule
            .run(&cancel, begin_immediately, || self.dispatch_poll(&cancel))
            .await;

        tracing::info!(id = %self.id, "Stop requested, poller stopped");
    }

    /// Starts one poll attempt on its own task
    ///
    /// The user agent is picked here, in the timing loop, so rotation state
    /// advances in dispatch order even when requests overlap.
    fn dispatch_poll(&self, cancel: &CancellationToken) {
        let user_agent = self
            .rotator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next();
        let request = self.template.build(&user_agent);

        tracing::debug!(id = %self.id, user_agent = %user_agent, "Polling");

        let id = self.id.clone();
        let transport = Arc::clone(&self.transport);
        let handler = Arc::clone(&self.handler);
        let dispatch = self.dispatch.clone();
        let cancel = cancel.clone();

        // Only this poller's own events go to its dispatch; the transport and
        // the handler log to whatever subscriber the caller has installed.
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PollError::Cancelled),
                response = transport.execute(request) => response.map_err(PollError::from),
            };

            tracing::dispatcher::with_default(&dispatch, || match &result {
                Ok(response) => {
                    tracing::debug!(id = %id, status = %response.status(), "Poll completed");
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Error while doing request");
                }
            });

            let handler = handler
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(handler) = handler {
                handler.call(&id, result);
            }
        });
    }
}

#[async_trait]
impl Poller for PagePoller {
    async fn start(&self, cancel: CancellationToken, begin_immediately: bool) -> crate::Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PollerError::AlreadyStarted {
                id: self.id.clone(),
            });
        }

        self.run(cancel, begin_immediately)
            .with_subscriber(self.dispatch.clone())
            .await;
        Ok(())
    }

    fn set_handler(&self, handler: Handler) {
        *self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for PagePoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePoller")
            .field("id", &self.id)
            .field("template", &self.template)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}
