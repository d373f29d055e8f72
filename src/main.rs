//! LMS API Service Entry Point
//!
//! Loads configuration, initializes storage and services, and starts the HTTP server.

use lms_api::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run().await
}
