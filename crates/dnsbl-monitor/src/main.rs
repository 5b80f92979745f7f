//! dnsbl-monitor - DNSBL listing monitor
//!
//! Keeps sending IPs' priorities in step with their blocklist status.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dnsbl_monitor::run().await
}
