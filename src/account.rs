use core::fmt;

use compact_str::CompactString;
use reqwest::Url;
use serde::Serialize;

use crate::error::{Error, Result};

/// Identity of an [`Account`]. Sessions are keyed by this, so two accounts
/// sharing a username in different classes never share cookies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountId(CompactString);

impl AccountId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One set of credentials for one enrolled class.
#[derive(Clone)]
pub struct Account {
    id: AccountId,
    class_name: CompactString,
    username: CompactString,
    password: String,
    base_url: Url,
}

impl Account {
    pub fn new(
        class_name: &str,
        username: &str,
        password: &str,
        base_url: &str,
    ) -> Result<Self> {
        let invalid = |reason| Error::InvalidAccount {
            account: class_name.into(),
            reason,
        };

        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(invalid("empty class name"));
        }
        if username.is_empty() {
            return Err(invalid("empty username"));
        }
        if password.is_empty() {
            return Err(invalid("empty password"));
        }
        let base_url = Url::parse(base_url.trim()).map_err(|_| invalid("unparsable base url"))?;
        if base_url.cannot_be_a_base() || base_url.host_str().is_none() {
            return Err(invalid("base url has no host"));
        }

        Ok(Self {
            id: AccountId(class_name.into()),
            class_name: class_name.into(),
            username: username.into(),
            password: password.to_owned(),
            base_url,
        })
    }

    #[inline]
    pub const fn id(&self) -> &AccountId {
        &self.id
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[inline]
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    #[inline]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{class}/`, the course root that also serves the set listing.
    pub fn class_url(&self) -> Url {
        self.url_for(&[])
    }

    /// Course-relative URL, one path segment per item, with a trailing slash.
    pub(crate) fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.class_name).extend(segments).push("");
        }
        url
    }

    /// Same as [`Self::url_for`] with `effectiveUser` set, as the course pages expect.
    pub(crate) fn user_url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.url_for(segments);
        url.query_pairs_mut()
            .append_pair("effectiveUser", &self.username);
        url
    }

    pub fn summary(&self) -> ClassSummary {
        ClassSummary {
            class_name: self.class_name.clone(),
            url: self.class_url().into(),
            username: self.username.clone(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub class_name: CompactString,
    pub url: String,
    pub username: CompactString,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new("Math221-Vanderlei", "alice", "hunter2", "https://webwork.example.edu/webwork2").unwrap()
    }

    #[test]
    fn builds_course_urls() {
        let a = account();
        assert_eq!(
            a.class_url().as_str(),
            "https://webwork.example.edu/webwork2/Math221-Vanderlei/"
        );
        assert_eq!(
            a.user_url_for(&["Assignment_9", "3"]).as_str(),
            "https://webwork.example.edu/webwork2/Math221-Vanderlei/Assignment_9/3/?effectiveUser=alice"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        let a = Account::new("C", "u", "p", "https://ww.example.edu/webwork2/").unwrap();
        assert_eq!(a.class_url().as_str(), "https://ww.example.edu/webwork2/C/");
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(matches!(
            Account::new("C", "", "p", "https://ww.example.edu"),
            Err(Error::InvalidAccount { reason: "empty username", .. })
        ));
        assert!(matches!(
            Account::new("C", "u", "p", "not a url"),
            Err(Error::InvalidAccount { .. })
        ));
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", account());
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("alice"));
    }
}
