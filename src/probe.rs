use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::FetchError;
use crate::matcher::{Matcher, Verdict};
use crate::transport::Transport;

pub const SNIPPET_CHARS: usize = 200;

const SCHEMES: [&str; 2] = ["http", "https"];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// The two candidate URLs for a subdomain, in the order they are tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub subdomain: String,
    pub urls: [String; 2],
}

impl ProbeTarget {
    pub fn new(subdomain: &str) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            urls: SCHEMES.map(|scheme| format!("{}://{}", scheme, subdomain)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Vulnerable {
        url: String,
        status_code: u16,
        body_snippet: String,
    },
    Clean,
    TransportError {
        reason: String,
    },
}

pub fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}

pub struct Prober {
    transport: Arc<dyn Transport>,
    matcher: Arc<Matcher>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>, matcher: Arc<Matcher>) -> Self {
        Self { transport, matcher }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub async fn probe(&self, subdomain: &str) -> ProbeOutcome {
        let target = ProbeTarget::new(subdomain);
        let user_agent = random_user_agent();
        let mut responded = false;
        let mut last_error: Option<FetchError> = None;

        for url in target.urls {
            match self.transport.get(&url, user_agent).await {
                Ok(response) => {
                    responded = true;
                    if self.matcher.classify(response.status_code, &response.body)
                        == Verdict::Vulnerable
                    {
                        return ProbeOutcome::Vulnerable {
                            body_snippet: snippet(&response.body),
                            status_code: response.status_code,
                            url,
                        };
                    }
                    debug!(%url, status = response.status_code, "no fingerprint");
                }
                Err(err) => {
                    debug!(subdomain = %target.subdomain, %url, error = %err, "candidate failed");
                    last_error = Some(err);
                }
            }
        }

        match (responded, last_error) {
            (false, Some(err)) => ProbeOutcome::TransportError {
                reason: err.reason().to_string(),
            },
            _ => ProbeOutcome::Clean,
        }
    }
}
