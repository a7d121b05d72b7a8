//! Host matching: which routes are served and who takes an order.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use document_store::Session;
use domain::{Country, DomainError, Host};

use crate::repositories::HostRepository;

/// Decides service availability and picks a host in the origin country.
#[async_trait]
pub trait HostMatcher: Send + Sync {
    /// True when the origin has an available host and the destination is served.
    async fn check_service_availability(
        &self,
        session: &dyn Session,
        origin_country: &Country,
        destination_country: &Country,
    ) -> Result<bool, DomainError>;

    /// An available host in `origin_country`, if any.
    async fn match_host(
        &self,
        session: &dyn Session,
        origin_country: &Country,
    ) -> Result<Option<Host>, DomainError>;
}

/// [`HostMatcher`] over stored hosts.
///
/// Picks the available host with the fewest assigned orders. Destinations are
/// served when listed; an empty list serves every destination.
pub struct DocumentHostMatcher {
    hosts: Arc<dyn HostRepository>,
    serviced_destinations: HashSet<Country>,
}

impl DocumentHostMatcher {
    pub fn new(
        hosts: Arc<dyn HostRepository>,
        serviced_destinations: impl IntoIterator<Item = Country>,
    ) -> Self {
        Self {
            hosts,
            serviced_destinations: serviced_destinations.into_iter().collect(),
        }
    }

    fn serves_destination(&self, destination: &Country) -> bool {
        self.serviced_destinations.is_empty() || self.serviced_destinations.contains(destination)
    }
}

#[async_trait]
impl HostMatcher for DocumentHostMatcher {
    #[tracing::instrument(skip(self, session))]
    async fn check_service_availability(
        &self,
        session: &dyn Session,
        origin_country: &Country,
        destination_country: &Country,
    ) -> Result<bool, DomainError> {
        if !self.serves_destination(destination_country) {
            return Ok(false);
        }
        let hosts = self.hosts.find_available_hosts(session, origin_country).await?;
        Ok(!hosts.is_empty())
    }

    #[tracing::instrument(skip(self, session))]
    async fn match_host(
        &self,
        session: &dyn Session,
        origin_country: &Country,
    ) -> Result<Option<Host>, DomainError> {
        let hosts = self.hosts.find_available_hosts(session, origin_country).await?;
        Ok(hosts.into_iter().min_by_key(|host| host.order_ids.len()))
    }
}

#[derive(Debug, Default)]
struct InMemoryHostMatcherState {
    unavailable: bool,
    host: Option<Host>,
    fail: bool,
    checks: Vec<(Country, Country)>,
}

/// In-memory host matcher for testing.
///
/// Every route is served until [`set_service_available`](Self::set_service_available)
/// says otherwise; [`match_host`](HostMatcher::match_host) returns the configured host.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHostMatcher {
    state: Arc<RwLock<InMemoryHostMatcherState>>,
}

impl InMemoryHostMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_service_available(&self, available: bool) {
        self.write().unavailable = !available;
    }

    pub fn set_host(&self, host: Option<Host>) {
        self.write().host = host;
    }

    /// Configures every call to fail with an internal error.
    pub fn set_fail(&self, fail: bool) {
        self.write().fail = fail;
    }

    /// Routes checked so far, as (origin, destination).
    pub fn checks(&self) -> Vec<(Country, Country)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .checks
            .clone()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryHostMatcherState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HostMatcher for InMemoryHostMatcher {
    async fn check_service_availability(
        &self,
        _session: &dyn Session,
        origin_country: &Country,
        destination_country: &Country,
    ) -> Result<bool, DomainError> {
        let mut state = self.write();
        if state.fail {
            return Err(DomainError::internal("Host matcher unavailable"));
        }
        state
            .checks
            .push((origin_country.clone(), destination_country.clone()));
        Ok(!state.unavailable)
    }

    async fn match_host(
        &self,
        _session: &dyn Session,
        _origin_country: &Country,
    ) -> Result<Option<Host>, DomainError> {
        let state = self.write();
        if state.fail {
            return Err(DomainError::internal("Host matcher unavailable"));
        }
        Ok(state.host.clone())
    }
}
