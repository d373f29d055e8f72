//! Request pipeline.
//!
//! Each operation is a typed [`Request`] with a static response type.
//! [`Pipeline::send`] validates the request, runs its [`RequestHandler`] and
//! passes the result through the normalization stage.

pub mod normalize;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use normalize::{Branch, IntoApiResponse, Normalized, wrap_response};

/// A command or query.
pub trait Request: Send + 'static {
    /// What the handler returns.
    type Response: IntoApiResponse + Send;

    /// Name used in logs.
    const NAME: &'static str;

    /// Check the request before it reaches the handler.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the offending fields.
    fn validate_request(&self) -> Result<()> {
        Ok(())
    }
}

/// Handles one request type.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    /// Execute the request.
    async fn handle(&self, request: R) -> Result<R::Response>;
}

/// Dispatches requests to a handler set.
pub struct Pipeline<H> {
    handlers: Arc<H>,
}

impl<H> Clone for Pipeline<H> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<H> Pipeline<H> {
    /// Create a pipeline over a handler set.
    pub const fn new(handlers: Arc<H>) -> Self {
        Self { handlers }
    }

    /// The handler set.
    pub const fn handlers(&self) -> &Arc<H> {
        &self.handlers
    }

    /// Validate, handle and normalize a request.
    ///
    /// # Errors
    ///
    /// Returns validation errors and handler errors unchanged.
    pub async fn send<R>(
        &self,
        request: R,
    ) -> Result<Normalized<<R::Response as IntoApiResponse>::Data>>
    where
        R: Request,
        H: RequestHandler<R>,
    {
        request.validate_request()?;
        wrap_response(R::NAME, self.handlers.handle(request)).await
    }
}
