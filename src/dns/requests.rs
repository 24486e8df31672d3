//! Request logging with persist-then-broadcast semantics
//!
//! Every served query/response pair is written to the request log under its
//! owning subdomain, then pushed to live watchers of the queried name's
//! base-domain. Persistence comes first: a crash between the two loses only
//! the live notification, never the durable record.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use serde_derive::{Deserialize, Serialize};

use crate::dns::errors::Result;
use crate::dns::protocol::DnsPacket;
use crate::dns::store::ZoneStore;
use crate::dns::stream::RequestStream;
use crate::dns::validation;

/// How many trailing labels of the queried name form the broadcast key.
/// Coarser than the exact subdomain, so traffic for names nested several
/// levels under a subdomain still reaches its watchers.
const BASE_DOMAIN_LABELS: usize = 4;

/// One persisted query/response pair. Immutable once written; removed by the
/// retention sweeper or when a subdomain is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: i64,
    pub created_at: i64,
    pub request: String,
    pub response: String,
    pub src_ip: String,
    pub src_host: String,
}

/// The event delivered to live watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub created_at: i64,
    pub request: String,
    pub response: String,
    pub src_ip: String,
    pub src_host: String,
}

/// The last up-to-four dot-separated parts of `name`, used as the broadcast
/// fan-out key. The trailing root label counts as a part, so this keeps the
/// final three labels of a fully qualified name.
pub fn base_domain(name: &str) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    let start = parts.len().saturating_sub(BASE_DOMAIN_LABELS);
    parts[start..].join(".")
}

/// Persists served queries and fans them out to live watchers.
pub struct RequestLog {
    store: Arc<ZoneStore>,
    stream: Arc<RequestStream>,
}

impl RequestLog {
    pub fn new(store: Arc<ZoneStore>, stream: Arc<RequestStream>) -> RequestLog {
        RequestLog { store, stream }
    }

    /// Log one served query/response pair and notify watchers.
    ///
    /// Broadcast failures are swallowed here: a slow or absent watcher must
    /// never fail or delay the serving path.
    pub async fn log_request(
        &self,
        request: &DnsPacket,
        response: &DnsPacket,
        src_ip: IpAddr,
        src_host: &str,
    ) -> Result<()> {
        let request_json = serde_json::to_string(request)?;
        let response_json = serde_json::to_string(response)?;

        let name = request
            .questions
            .first()
            .map_or("", |q| q.name.as_str());
        let subdomain = validation::owner_label(name);

        self.store
            .insert_request(
                subdomain,
                &request_json,
                &response_json,
                &src_ip.to_string(),
                src_host,
            )
            .await?;

        self.stream.publish(
            &base_domain(name),
            RequestEvent {
                created_at: Utc::now().timestamp(),
                request: request_json,
                response: response_json,
                src_ip: src_ip.to_string(),
                src_host: src_host.to_string(),
            },
        );

        Ok(())
    }

    /// Logged requests for a subdomain, newest first.
    pub async fn get_requests(&self, subdomain: &str) -> Result<Vec<RequestLogEntry>> {
        self.store.get_requests(subdomain).await
    }

    /// Drop the log for a released subdomain.
    pub async fn delete_requests_for_domain(&self, subdomain: &str) -> Result<()> {
        self.store.delete_requests_for_domain(subdomain).await
    }
}
