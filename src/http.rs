use std::thread;
use std::time::Duration;

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(6),
            attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

fn build_agent(policy: &RequestPolicy) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build()
}

pub(crate) fn get_text_with_retries(
    url: &str,
    query: &[(String, String)],
    auth_token: Option<&str>,
    policy: RequestPolicy,
) -> Result<String, String> {
    call_with_retries(policy, |agent| {
        let mut request = agent.get(url);
        if let Some(token) = auth_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        for (key, value) in query {
            request = request.query(key, value);
        }
        request.call()
    })
}

pub(crate) fn post_json_with_retries(
    url: &str,
    body: &str,
    auth_token: Option<&str>,
    policy: RequestPolicy,
) -> Result<String, String> {
    call_with_retries(policy, |agent| {
        let mut request = agent.post(url).set("Content-Type", "application/json");
        if let Some(token) = auth_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request.send_string(body)
    })
}

fn call_with_retries<F>(policy: RequestPolicy, send: F) -> Result<String, String>
where
    F: Fn(&ureq::Agent) -> Result<ureq::Response, ureq::Error>,
{
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        let agent = build_agent(&policy);
        match send(&agent) {
            Ok(response) => match response.into_string() {
                Ok(body) => return Ok(body),
                Err(err) => {
                    return Err(format!("request failed: response decode failed: {err}"));
                }
            },
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim();
                let status_error = if body.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if should_retry_http_status(status) && attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                if should_retry_http_status(status) {
                    return Err(format!(
                        "request failed after {attempts} attempt(s): {status_error}"
                    ));
                }

                return Err(format!("request failed: {status_error}"));
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(format!(
                    "request failed after {attempts} attempt(s): {transport_error}"
                ));
            }
        }
    }

    Err("request failed: exhausted attempts without a concrete error".to_string())
}
