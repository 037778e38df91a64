//! Request interceptors.
//!
//! An interceptor edits a [`Request`] in place right before it is sent, for
//! example to add an auth header or rewrite the URL. Interceptors run in
//! registration order against the same request, so each one sees the edits
//! made by the ones before it.
//!
//! Returning an error aborts the execution before any network I/O; the
//! remaining interceptors are skipped and the caller receives
//! [`Error::Interceptor`](crate::Error::Interceptor).

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::InterceptorError;
use crate::http::Request;

pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut Request) -> Result<(), InterceptorError>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut Request) -> Result<(), InterceptorError> + Send + Sync,
{
    fn intercept(&self, request: &mut Request) -> Result<(), InterceptorError> {
        self(request)
    }
}

/// Appends a fixed header to every request.
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    name: String,
    value: String,
}

impl HeaderInterceptor {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn intercept(&self, request: &mut Request) -> Result<(), InterceptorError> {
        request.add_header(self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Ordered interceptor registry shared by a client.
///
/// Registration may happen from any thread. Each execution works on a
/// snapshot, so a concurrent add or remove never affects a request already
/// being intercepted.
#[derive(Default)]
pub(crate) struct InterceptorChain {
    entries: RwLock<Vec<Arc<dyn RequestInterceptor>>>,
}

impl InterceptorChain {
    pub(crate) fn add(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
    }

    /// Remove the first registration of `interceptor`, compared by identity.
    pub(crate) fn remove(&self, interceptor: &Arc<dyn RequestInterceptor>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|e| Arc::ptr_eq(e, interceptor)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn RequestInterceptor>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Run a snapshot of the chain over `request`, stopping at the first
    /// error.
    pub(crate) fn apply(&self, request: &mut Request) -> Result<(), InterceptorError> {
        for interceptor in self.snapshot() {
            interceptor.intercept(request)?;
        }
        Ok(())
    }
}
