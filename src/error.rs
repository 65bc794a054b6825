use core::fmt;

use compact_str::CompactString;
use reqwest::StatusCode;

use crate::account::AccountId;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The page a parser was looking at when it gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    SetList,
    SetDetail,
    Problem,
    Grades,
    HardcopyForm,
    HardcopyStatus,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SetList => "set listing",
            Self::SetDetail => "set detail",
            Self::Problem => "problem page",
            Self::Grades => "grades page",
            Self::HardcopyForm => "hardcopy form",
            Self::HardcopyStatus => "hardcopy status",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("credentials rejected")]
    Rejected,
    #[error("login response did not look like a login result")]
    UnexpectedPage,
    #[error("login answered with status {0}")]
    Status(StatusCode),
    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server still asked for a login right after re-authenticating")]
    SessionRejected,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("status {0}")]
    Status(StatusCode),
    #[error("unexpected content: {0}")]
    UnexpectedContent(CompactString),
    #[error("refusing to send the session outside the configured host")]
    ForeignHost,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed for {account}: {cause}")]
    Authentication {
        account: AccountId,
        #[source]
        cause: AuthFailure,
    },
    #[error("fetching {url} for {account} failed: {cause}")]
    Fetch {
        account: AccountId,
        url: String,
        #[source]
        cause: FetchFailure,
    },
    #[error("{view}: missing {field}")]
    Parse { view: View, field: &'static str },
    #[error("hardcopy job {job} still pending after {waited_ms} ms")]
    Timeout { job: CompactString, waited_ms: u64 },
    #[error("hardcopy job {job} failed: {reason}")]
    Generation { job: CompactString, reason: String },
    #[error("hardcopy job {job} cancelled")]
    Cancelled { job: CompactString },
    #[error("unknown class {0:?}")]
    UnknownClass(CompactString),
    #[error("{what} not found in {class}")]
    NotFound { class: CompactString, what: String },
    #[error("invalid account {account}: {reason}")]
    InvalidAccount { account: CompactString, reason: &'static str },
}

impl Error {
    pub(crate) const fn parse(view: View, field: &'static str) -> Self {
        Self::Parse { view, field }
    }

    pub(crate) fn transport(account: &AccountId, url: &reqwest::Url, e: reqwest::Error) -> Self {
        Self::Fetch {
            account: account.clone(),
            url: url.to_string(),
            cause: FetchFailure::Transport(e),
        }
    }
}
