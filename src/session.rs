//! One cookie session per [`Account`], created on demand and replaced when
//! the server stops honouring it.
//!
//! Every account gets its own slot, fixed at construction, so sessions of
//! different accounts never share a lock or a cookie jar. Within a slot a
//! login gate makes concurrent callers wait for the login already in flight
//! instead of starting another one.

use core::sync::atomic::{AtomicU64, Ordering};
use std::{
    sync::Arc,
    time::{Instant, SystemTime},
};

use hashbrown::HashMap;
use parking_lot::Mutex;
use reqwest::Client;

use crate::{
    account::{Account, AccountId},
    error::{AuthFailure, Error, Result},
    scrape::{self, ClientOptions, parse},
};

/// Authenticated state for exactly one account: an HTTP client whose cookie
/// jar holds that account's login.
#[derive(Debug)]
pub struct Session {
    account: AccountId,
    generation: u64,
    established: SystemTime,
    pub(crate) client: Client,
}

impl Session {
    #[inline]
    pub const fn account(&self) -> &AccountId {
        &self.account
    }

    /// Counts logins for the account; each new session gets the next number.
    #[inline]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub const fn established(&self) -> SystemTime {
        self.established
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Active { generation: u64 },
    Expired { generation: u64 },
}

enum Slot {
    Unauthenticated,
    Authenticating,
    Active(Arc<Session>),
    Expired(u64),
}

struct Entry {
    account: Account,
    slot: Mutex<Slot>,
    gate: tokio::sync::Mutex<()>,
    logins: AtomicU64,
}

pub struct SessionManager {
    entries: HashMap<AccountId, Entry>,
    order: Vec<AccountId>,
    options: ClientOptions,
}

impl SessionManager {
    pub fn new(accounts: Vec<Account>, options: ClientOptions) -> Result<Self> {
        let mut entries = HashMap::with_capacity(accounts.len());
        let mut order = Vec::with_capacity(accounts.len());

        for account in accounts {
            let id = account.id().clone();
            if entries.contains_key(&id) {
                return Err(Error::InvalidAccount {
                    account: id.as_str().into(),
                    reason: "class configured twice",
                });
            }
            order.push(id.clone());
            entries.insert(
                id,
                Entry {
                    account,
                    slot: Mutex::new(Slot::Unauthenticated),
                    gate: tokio::sync::Mutex::new(()),
                    logins: AtomicU64::new(0),
                },
            );
        }

        Ok(Self { entries, order, options })
    }

    /// Accounts in configuration order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.order.iter().filter_map(|id| self.entries.get(id).map(|e| &e.account))
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.entries.get(id).map(|e| &e.account)
    }

    pub fn find_class(&self, class_name: &str) -> Result<&Account> {
        self.accounts()
            .find(|a| a.class_name() == class_name)
            .ok_or_else(|| Error::UnknownClass(class_name.into()))
    }

    fn entry(&self, id: &AccountId) -> Result<&Entry> {
        self.entries
            .get(id)
            .ok_or_else(|| Error::UnknownClass(id.as_str().into()))
    }

    pub fn state(&self, id: &AccountId) -> Option<SessionState> {
        let entry = self.entries.get(id)?;
        Some(match &*entry.slot.lock() {
            Slot::Unauthenticated => SessionState::Unauthenticated,
            Slot::Authenticating => SessionState::Authenticating,
            Slot::Active(s) => SessionState::Active { generation: s.generation },
            Slot::Expired(generation) => SessionState::Expired { generation: *generation },
        })
    }

    /// Number of login attempts made for the account so far.
    pub fn login_count(&self, id: &AccountId) -> u64 {
        self.entries
            .get(id)
            .map_or(0, |e| e.logins.load(Ordering::Acquire))
    }

    fn active(entry: &Entry) -> Option<Arc<Session>> {
        match &*entry.slot.lock() {
            Slot::Active(session) => Some(session.clone()),
            _ => None,
        }
    }

    /// Returns the live session for the account, logging in if there is none.
    /// Makes at most one login attempt per call.
    pub async fn acquire(&self, id: &AccountId) -> Result<Arc<Session>> {
        let entry = self.entry(id)?;
        if let Some(session) = Self::active(entry) {
            return Ok(session);
        }

        let _gate = entry.gate.lock().await;
        // whoever held the gate before us may have logged in already
        if let Some(session) = Self::active(entry) {
            return Ok(session);
        }

        // a dropped acquire can leave Authenticating behind
        let previous = match core::mem::replace(&mut *entry.slot.lock(), Slot::Authenticating) {
            Slot::Authenticating => Slot::Unauthenticated,
            other => other,
        };
        let generation = entry.logins.fetch_add(1, Ordering::AcqRel) + 1;

        match login(&entry.account, &self.options).await {
            Ok(client) => {
                let session = Arc::new(Session {
                    account: id.clone(),
                    generation,
                    established: SystemTime::now(),
                    client,
                });
                *entry.slot.lock() = Slot::Active(session.clone());
                Ok(session)
            }
            Err(cause) => {
                *entry.slot.lock() = previous;
                Err(Error::Authentication {
                    account: id.clone(),
                    cause,
                })
            }
        }
    }

    /// Marks the account's current session expired; the next [`Self::acquire`]
    /// logs in again.
    pub fn invalidate(&self, id: &AccountId) {
        if let Some(entry) = self.entries.get(id) {
            let mut slot = entry.slot.lock();
            if let Slot::Active(session) = &*slot {
                tracing::info!(target: "session", "{id}: session #{} invalidated", session.generation);
                *slot = Slot::Expired(session.generation);
            }
        }
    }

    /// Like [`Self::invalidate`], but only if `session` is still the current
    /// one. A caller holding a stale session cannot kill a fresh login.
    pub(crate) fn expire(&self, session: &Session) {
        if let Some(entry) = self.entries.get(&session.account) {
            let mut slot = entry.slot.lock();
            if let Slot::Active(current) = &*slot
                && current.generation == session.generation
            {
                tracing::info!(target: "session", "{}: session #{} expired", session.account, session.generation);
                *slot = Slot::Expired(session.generation);
            }
        }
    }
}

async fn login(account: &Account, options: &ClientOptions) -> Result<Client, AuthFailure> {
    let start = Instant::now();
    let client = scrape::basic(options, account.base_url()).map_err(AuthFailure::Transport)?;

    tracing::debug!(target: "session", "{}: logging in as {}", account.id(), account.username());

    let form = [
        ("user", account.username()),
        ("passwd", account.password()),
        (".submit", "Continue"),
    ];
    let response = client
        .post(account.class_url())
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(target: "session", "{}: login request failed after {:?}: {e}", account.id(), start.elapsed());
            AuthFailure::Transport(e)
        })?;

    let status = response.status();
    let html = response.text().await.map_err(AuthFailure::Transport)?;
    tracing::debug!(target: "session", "{}: login answered {status} ({} bytes) in {:?}", account.id(), html.len(), start.elapsed());

    match parse::login_outcome(&html) {
        parse::LoginOutcome::LoggedIn => {
            tracing::info!(target: "session", "\x1b[36m{}: logged in as {}\x1b[0m", account.id(), account.username());
            Ok(client)
        }
        parse::LoginOutcome::Rejected => {
            tracing::warn!(target: "session", "{}: credentials rejected", account.id());
            Err(AuthFailure::Rejected)
        }
        parse::LoginOutcome::Unrecognized if !status.is_success() => Err(AuthFailure::Status(status)),
        parse::LoginOutcome::Unrecognized => {
            tracing::warn!(target: "session", "{}: login response has no login status", account.id());
            Err(AuthFailure::UnexpectedPage)
        }
    }
}
