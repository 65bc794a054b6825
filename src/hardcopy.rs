//! PDF hardcopies of a set: submit the hardcopy form, poll until the server
//! has rendered the file, download it.
//!
//! The whole wait runs under one ceiling and one [`CancellationToken`]. Both
//! simply drop the polling future, so nothing keeps running after
//! [`request_hardcopy`] returns.

use core::time::Duration;
use std::{
    sync::LazyLock,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use compact_str::{CompactString, format_compact};
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    account::Account,
    error::{Error, FetchFailure, Result},
    scrape::{
        Binary, PageClient, Reply, session_rejected,
        parse::{self, JobStatus, hardcopy::is_submission_field},
    },
    util::set_slug,
};

static FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'[^']*')?"?([^";]+)"?"#).unwrap()
});

/// Fields this module sets itself; copies from the form are replaced.
const OWN_FIELDS: [&str; 4] = ["hardcopy_format", "generate_hardcopy", "printStudentAnswers", "showComments"];

#[derive(Clone, Debug)]
pub struct HardcopyOptions {
    pub include_answers: bool,
    pub include_comments: bool,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub backoff: f64,
    /// Upper bound on the whole request, form fetch and download included.
    pub ceiling: Duration,
}

impl Default for HardcopyOptions {
    fn default() -> Self {
        Self {
            include_answers: true,
            include_comments: false,
            poll_interval: const { Duration::from_secs(1) },
            max_poll_interval: const { Duration::from_secs(5) },
            backoff: 1.5,
            ceiling: const { Duration::from_secs(60) },
        }
    }
}

impl HardcopyOptions {
    fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff.max(1.0))
            .map_or(self.max_poll_interval, |next| next.min(self.max_poll_interval))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Ready,
    Downloaded,
    Failed,
    TimedOut,
    Cancelled,
}

#[derive(Clone, Debug, Serialize)]
pub struct HardcopyJob {
    pub id: CompactString,
    pub set_name: String,
    pub state: JobState,
    pub polls: u32,
}

impl HardcopyJob {
    fn new(account: &Account, set_name: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        Self {
            id: format_compact!("{}/{}#{millis}", account.id(), set_slug(set_name)),
            set_name: set_name.to_owned(),
            state: JobState::Pending,
            polls: 0,
        }
    }

    fn transition(&mut self, to: JobState) {
        tracing::info!(target: "hardcopy", "{}: {:?} -> {to:?}", self.id, self.state);
        self.state = to;
    }
}

/// A rendered hardcopy, handed over once and not kept anywhere else.
#[derive(Debug)]
pub struct Hardcopy {
    pub set_name: String,
    pub job: HardcopyJob,
    pub filename: String,
    pub payload: Bytes,
}

fn jittered(wait: Duration) -> Duration {
    let ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
    let extra = rand::rng().random_range(0..=ms / 10);
    Duration::from_millis(ms.saturating_add(extra))
}

fn is_pdf(binary: &Binary) -> bool {
    binary.content_type.contains("pdf") || binary.bytes.starts_with(b"%PDF")
}

fn filename(disposition: Option<&str>, account: &Account, set_name: &str) -> String {
    disposition
        .and_then(|d| FILENAME.captures(d))
        .and_then(|c| {
            let name = c[1].trim().rsplit(['/', '\\']).next()?.to_owned();
            (!name.is_empty() && name != "." && name != "..").then_some(name)
        })
        .unwrap_or_else(|| format!("{}.{}.{}.pdf", account.class_name(), account.username(), set_slug(set_name)))
}

/// Renders `set_name` of `account`'s class as a PDF.
pub async fn request_hardcopy(
    pages: PageClient<'_>,
    account: &Account,
    set_name: &str,
    options: &HardcopyOptions,
    cancel: &CancellationToken,
) -> Result<Hardcopy> {
    let mut job = HardcopyJob::new(account, set_name);
    let start = Instant::now();
    tracing::info!(target: "hardcopy", "{}: requested", job.id);

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        r = tokio::time::timeout(options.ceiling, drive(pages, account, &mut job, options)) => Some(r),
    };

    match outcome {
        None => {
            job.transition(JobState::Cancelled);
            Err(Error::Cancelled { job: job.id })
        }
        Some(Err(_)) => {
            job.transition(JobState::TimedOut);
            Err(Error::Timeout {
                job: job.id,
                waited_ms: start.elapsed().as_millis() as u64,
            })
        }
        Some(Ok(Err(e))) => {
            if job.state != JobState::Failed {
                job.transition(JobState::Failed);
            }
            Err(e)
        }
        Some(Ok(Ok(binary))) => {
            let filename = filename(binary.disposition.as_deref(), account, set_name);
            tracing::info!(target: "hardcopy", "{}: {} bytes as {filename} after {:?}", job.id, binary.bytes.len(), start.elapsed());
            job.transition(JobState::Downloaded);
            Ok(Hardcopy {
                set_name: set_name.to_owned(),
                job,
                filename,
                payload: binary.bytes,
            })
        }
    }
}

/// What gets posted: the form's own fields, with the ones set here replaced
/// by the requested options.
fn form_fields(mut fields: Vec<(String, String)>, options: &HardcopyOptions) -> Vec<(String, String)> {
    fields.retain(|(name, _)| !OWN_FIELDS.contains(&name.as_str()));
    fields.push(("hardcopy_format".to_owned(), "pdf".to_owned()));
    if options.include_answers {
        fields.push(("printStudentAnswers".to_owned(), "on".to_owned()));
    }
    if options.include_comments {
        fields.push(("showComments".to_owned(), "on".to_owned()));
    }
    fields.push(("generate_hardcopy".to_owned(), "Generate Hardcopy".to_owned()));
    debug_assert!(!fields.iter().any(|(name, _)| is_submission_field(name)));
    fields
}

/// Fetches the form and posts it back. The form carries a key bound to the
/// session it was served under, so after an expiry the whole form is fetched
/// again rather than resent.
async fn submit(
    pages: PageClient<'_>,
    account: &Account,
    job: &HardcopyJob,
    options: &HardcopyOptions,
) -> Result<Reply> {
    for _ in 0..2 {
        let form_page = pages.hardcopy_form(account, &set_slug(&job.set_name)).await?;
        let form = parse::parse_hardcopy_form(&form_page.body, &form_page.url)?;
        let fields = form_fields(form.fields, options);
        if let Some(reply) = pages.post_form_once(account, &form.action, &fields).await? {
            return Ok(reply);
        }
        tracing::info!(target: "hardcopy", "{}: session expired under the form, fetching it again", job.id);
    }
    Err(session_rejected(account))
}

async fn drive(
    pages: PageClient<'_>,
    account: &Account,
    job: &mut HardcopyJob,
    options: &HardcopyOptions,
) -> Result<Binary> {
    let mut reply = submit(pages, account, job, options).await?;
    let mut interval = options.poll_interval;

    loop {
        let page = match reply {
            Reply::Binary(binary) if is_pdf(&binary) => {
                job.transition(JobState::Ready);
                return Ok(binary);
            }
            Reply::Binary(binary) => {
                return Err(Error::Fetch {
                    account: account.id().clone(),
                    url: binary.url.to_string(),
                    cause: FetchFailure::UnexpectedContent(binary.content_type),
                });
            }
            Reply::Html(page) => page,
        };

        match parse::classify_hardcopy(&page.body, &page.url)? {
            JobStatus::Failed { reason } => {
                job.transition(JobState::Failed);
                return Err(Error::Generation {
                    job: job.id.clone(),
                    reason,
                });
            }
            JobStatus::Ready { download } => {
                job.transition(JobState::Ready);
                return match pages.get(account, &download).await? {
                    Reply::Binary(binary) if is_pdf(&binary) => Ok(binary),
                    Reply::Binary(Binary { content_type, .. }) => Err(Error::Fetch {
                        account: account.id().clone(),
                        url: download.into(),
                        cause: FetchFailure::UnexpectedContent(content_type),
                    }),
                    Reply::Html(_) => Err(Error::Fetch {
                        account: account.id().clone(),
                        url: download.into(),
                        cause: FetchFailure::UnexpectedContent("html instead of the pdf".into()),
                    }),
                };
            }
            JobStatus::Pending { poll, retry_after } => {
                job.polls += 1;
                let wait = retry_after
                    .map_or(interval, |r| r.max(interval))
                    .min(options.max_poll_interval);
                tracing::debug!(target: "hardcopy", "{}: pending, poll #{} in {wait:?}", job.id, job.polls);
                tokio::time::sleep(jittered(wait)).await;
                interval = options.next_interval(interval);
                reply = pages.get(account, &poll).await?;
            }
        }
    }
}
