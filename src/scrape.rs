use core::time::Duration;
use std::time::{Instant, SystemTime};

use bytes::Bytes;
use compact_str::CompactString;
use reqwest::{
    Client, RequestBuilder, Response, Url,
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    redirect::Policy,
};

use crate::{
    account::Account,
    error::{AuthFailure, Error, FetchFailure, Result, View},
    session::{Session, SessionManager},
    util,
};

pub mod parse;

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: CompactString,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: const { Duration::from_secs(30) },
            connect_timeout: const { Duration::from_secs(8) },
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// A client with its own cookie jar that only follows redirects staying on
/// `base`'s origin.
pub fn basic(options: &ClientOptions, base: &Url) -> reqwest::Result<Client> {
    let origin = base.origin();
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() >= 10 {
            attempt.error("too many redirects")
        } else if attempt.url().origin() == origin {
            attempt.follow()
        } else {
            tracing::warn!(target: "fetch", "not following redirect to {}", attempt.url().host_str().unwrap_or("?"));
            attempt.stop()
        }
    });

    Client::builder()
        .cookie_store(true)
        .redirect(policy)
        .connect_timeout(options.connect_timeout)
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .build()
}

/// An HTML page as fetched, with the server's clock at response time.
#[derive(Debug)]
pub struct Page {
    pub url: Url,
    pub body: String,
    pub date: SystemTime,
}

#[derive(Debug)]
pub struct Binary {
    pub url: Url,
    pub content_type: CompactString,
    pub disposition: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub enum Reply {
    Html(Page),
    Binary(Binary),
}

enum Fetched {
    LoginPage,
    Reply(Reply),
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|ct| ct.contains("html"))
}

/// Authenticated fetches against one [`SessionManager`]. Holds no state of
/// its own; every call goes through the account's current session.
#[derive(Clone, Copy)]
pub struct PageClient<'s> {
    sessions: &'s SessionManager,
}

impl<'s> PageClient<'s> {
    #[inline]
    pub const fn new(sessions: &'s SessionManager) -> Self {
        Self { sessions }
    }

    /// Sends the request built by `make` once with the account's current
    /// session. `None` means the server answered with its login page; that
    /// session is expired before returning.
    pub async fn attempt(
        &self,
        account: &Account,
        make: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Option<Reply>> {
        let session = self.sessions.acquire(account.id()).await?;
        match send(account, &session, &make).await? {
            Fetched::Reply(reply) => Ok(Some(reply)),
            Fetched::LoginPage => {
                self.sessions.expire(&session);
                Ok(None)
            }
        }
    }

    /// Like [`Self::attempt`], but a login page logs in again and resends
    /// once; a second login page is an authentication failure.
    pub async fn request(
        &self,
        account: &Account,
        make: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Reply> {
        if let Some(reply) = self.attempt(account, &make).await? {
            return Ok(reply);
        }
        tracing::info!(target: "fetch", "{}: got the login page, re-authenticating", account.id());
        self.attempt(account, &make)
            .await?
            .ok_or_else(|| session_rejected(account))
    }

    pub async fn get(&self, account: &Account, url: &Url) -> Result<Reply> {
        self.request(account, |client| client.get(url.clone())).await
    }

    /// A single POST without the re-login retry, for forms whose fields are
    /// tied to the session they were fetched with.
    pub async fn post_form_once(
        &self,
        account: &Account,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<Option<Reply>> {
        self.attempt(account, |client| client.post(url.clone()).form(fields)).await
    }

    /// GET that must come back as HTML.
    pub async fn page(&self, account: &Account, url: &Url, view: View) -> Result<Page> {
        match self.get(account, url).await? {
            Reply::Html(page) => Ok(page),
            Reply::Binary(binary) => Err(Error::Fetch {
                account: account.id().clone(),
                url: url.to_string(),
                cause: FetchFailure::UnexpectedContent(compact_str::format_compact!(
                    "{} instead of the {view}",
                    binary.content_type
                )),
            }),
        }
    }

    pub async fn set_list(&self, account: &Account) -> Result<Page> {
        self.page(account, &account.class_url(), View::SetList).await
    }

    pub async fn set_detail(&self, account: &Account, set_url: &Url) -> Result<Page> {
        self.page(account, set_url, View::SetDetail).await
    }

    pub async fn problem(&self, account: &Account, set_slug: &str, number: u32) -> Result<Page> {
        let number = number.to_string();
        let url = account.user_url_for(&[set_slug, &number]);
        self.page(account, &url, View::Problem).await
    }

    pub async fn grades(&self, account: &Account) -> Result<Page> {
        self.page(account, &account.user_url_for(&["grades"]), View::Grades).await
    }

    pub async fn hardcopy_form(&self, account: &Account, set_slug: &str) -> Result<Page> {
        let url = account.user_url_for(&["hardcopy", set_slug]);
        self.page(account, &url, View::HardcopyForm).await
    }
}

pub(crate) fn session_rejected(account: &Account) -> Error {
    Error::Authentication {
        account: account.id().clone(),
        cause: AuthFailure::SessionRejected,
    }
}

async fn send(
    account: &Account,
    session: &Session,
    make: &impl Fn(&Client) -> RequestBuilder,
) -> Result<Fetched> {
    let (client, request) = make(&session.client).build_split();
    let request = request.map_err(|e| Error::transport(account.id(), account.base_url(), e))?;
    let url = request.url().clone();
    let fail = |cause| Error::Fetch {
        account: account.id().clone(),
        url: url.to_string(),
        cause,
    };

    if url.origin() != account.base_url().origin() {
        return Err(fail(FetchFailure::ForeignHost));
    }

    let start = Instant::now();
    let method = request.method().clone();
    let response = client
        .execute(request)
        .await
        .map_err(|e| Error::transport(account.id(), &url, e))?;
    let fetched = read(account, response).await?;

    tracing::debug!(
        target: "fetch",
        "{}: {method} {} (session #{}) in {:?}",
        account.id(),
        url.path(),
        session.generation(),
        start.elapsed(),
    );
    Ok(fetched)
}

async fn read(account: &Account, response: Response) -> Result<Fetched> {
    let url = response.url().clone();
    let status = response.status();
    let date = util::server_date(response.headers());
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(CompactString::from);
    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let fail = |cause| Error::Fetch {
        account: account.id().clone(),
        url: url.to_string(),
        cause,
    };

    if is_html(content_type.as_deref()) {
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(account.id(), &url, e))?;
        tracing::debug!(target: "fetch", "{}: {status}, {} bytes of html", account.id(), body.len());

        if parse::is_login_page(&body) {
            return Ok(Fetched::LoginPage);
        }
        if !status.is_success() {
            return Err(fail(FetchFailure::Status(status)));
        }
        return Ok(Fetched::Reply(Reply::Html(Page { url, body, date })));
    }

    if !status.is_success() {
        return Err(fail(FetchFailure::Status(status)));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::transport(account.id(), &url, e))?;
    tracing::debug!(target: "fetch", "{}: {status}, {} bytes of {}", account.id(), bytes.len(), content_type.as_deref().unwrap_or("?"));

    Ok(Fetched::Reply(Reply::Binary(Binary {
        url,
        content_type: content_type.unwrap_or_default(),
        disposition,
        bytes,
    })))
}
