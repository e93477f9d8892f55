//! Failure notifications for records that exhausted their retries.
//!
//! One message is composed per pass. Delivery failures are logged and
//! swallowed; they never affect the pass outcome.
use std::{fmt::Write as _, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    domain::{Domain, Record},
    util::time::{Clock, kst},
};

const ACTION_STEPS: [&str; 3] = [
    "에어테이블에서 해당 레코드의 주소 정보 확인",
    "주소 정보가 올바른지 확인",
    "필요시 수동으로 정보 입력",
];

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Reports newly exhausted records. Never fails.
    async fn notify(&self, domain: Domain, records: &[Record]);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureNotice {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Builds the operator message for one batch of exhausted records.
#[must_use]
pub fn compose_notice(
    domain: Domain,
    records: &[Record],
    max_attempts: u32,
    at: DateTime<Utc>,
    admin_url: Option<&str>,
) -> FailureNotice {
    let kind = domain.display_name();
    let count = records.len();
    let occurred_at = at.with_timezone(&kst()).format("%Y-%m-%d %H:%M:%S KST");

    let subject = format!("[{kind} 서비스] {count}개 레코드 처리 실패");

    let mut text = format!("다음 {kind} 레코드들이 {max_attempts}회 재시도 후에도 처리에 실패했습니다:\n\n");
    for record in records {
        let _ = writeln!(text, "- {} (레코드 ID: {})", record.address, record.id);
    }
    let _ = write!(text, "\n총 실패 레코드: {count}개\n발생 시각: {occurred_at}\n\n조치 필요:\n");
    for (index, step) in ACTION_STEPS.iter().enumerate() {
        let _ = writeln!(text, "{}. {step}", index + 1);
    }
    if let Some(url) = admin_url {
        let _ = write!(text, "\n서비스 관리: {url}\n");
    }

    let mut html = format!(
        "<h2>{kind} 정보 수집 실패 알림</h2>\n<p>다음 {kind} 레코드들이 <strong>{max_attempts}회 재시도</strong> 후에도 처리에 실패했습니다:</p>\n<ul>\n"
    );
    for record in records {
        let _ = writeln!(
            html,
            "<li>{} <small>(레코드 ID: {})</small></li>",
            escape_html(&record.address),
            escape_html(&record.id)
        );
    }
    let _ = write!(
        html,
        "</ul>\n<p><strong>총 실패 레코드:</strong> {count}개</p>\n<p><strong>발생 시각:</strong> {occurred_at}</p>\n<h3>조치 필요</h3>\n<ol>\n"
    );
    for step in ACTION_STEPS {
        let _ = writeln!(html, "<li>{step}</li>");
    }
    html.push_str("</ol>\n");
    if let Some(url) = admin_url {
        let _ = writeln!(html, "<p><a href=\"{}\">서비스 관리 페이지</a></p>", escape_html(url));
    }

    FailureNotice { subject, text, html }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub url: String,
    pub from: String,
    pub to: String,
    pub admin_url: Option<String>,
    pub max_attempts: u32,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Hands composed messages to an HTTP mail relay.
pub struct MailRelayNotifier {
    client: Client,
    url: Url,
    config: MailRelayConfig,
    clock: Arc<dyn Clock>,
}

impl MailRelayNotifier {
    /// # Errors
    /// Fails when the relay URL does not parse or the HTTP client cannot be built.
    pub fn new(config: MailRelayConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build mail relay HTTP client")?;
        let url = Url::parse(&config.url).context("invalid mail relay URL")?;
        Ok(Self {
            client,
            url,
            config,
            clock,
        })
    }

    async fn send(&self, notice: &FailureNotice) -> Result<()> {
        let message = RelayMessage {
            from: &self.config.from,
            to: &self.config.to,
            subject: &notice.subject,
            text: &notice.text,
            html: &notice.html,
        };

        self.client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await
            .context("mail relay request failed")?
            .error_for_status()
            .context("mail relay returned error status")?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn notify(&self, domain: Domain, records: &[Record]) {
        if records.is_empty() {
            return;
        }

        let notice = compose_notice(
            domain,
            records,
            self.config.max_attempts,
            self.clock.now(),
            self.config.admin_url.as_deref(),
        );

        match self.send(&notice).await {
            Ok(()) => info!(domain = %domain, records = records.len(), "failure notification sent"),
            Err(err) => error!(
                domain = %domain,
                records = records.len(),
                error = %format!("{err:#}"),
                "failed to send failure notification"
            ),
        }
    }
}

/// Fallback when no relay is configured: the notice only goes to the log.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    max_attempts: u32,
}

impl LogNotifier {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, domain: Domain, records: &[Record]) {
        if records.is_empty() {
            return;
        }
        let notice = compose_notice(domain, records, self.max_attempts, Utc::now(), None);
        let record_ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        warn!(
            domain = %domain,
            subject = %notice.subject,
            record_ids = ?record_ids,
            "records exhausted their retries (no mail relay configured)"
        );
    }
}
