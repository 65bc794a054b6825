use futures_util::future::try_join_all;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::{
    account::{Account, ClassSummary},
    error::{Error, Result, View},
    hardcopy::{self, Hardcopy, HardcopyOptions},
    model::{GradeRecord, HomeworkSet, Problem, SetListing},
    scrape::{ClientOptions, PageClient, parse},
    session::SessionManager,
    util::set_slug,
    views::{self, CourseInfo, DashboardEntry, DueDateEntry, SetProgress},
};

/// Read-only access to every configured class. Each call fetches fresh
/// pages; nothing is cached between calls.
pub struct HomeworkClient {
    sessions: SessionManager,
}

impl HomeworkClient {
    pub fn new(accounts: Vec<Account>, options: ClientOptions) -> Result<Self> {
        Ok(Self {
            sessions: SessionManager::new(accounts, options)?,
        })
    }

    #[inline]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[inline]
    const fn pages(&self) -> PageClient<'_> {
        PageClient::new(&self.sessions)
    }

    fn account(&self, class_name: &str) -> Result<&Account> {
        self.sessions.find_class(class_name)
    }

    /// Every configured class, each confirmed by a login. Fails on the first
    /// class that cannot log in.
    pub async fn classes(&self) -> Result<Vec<ClassSummary>> {
        try_join_all(self.sessions.accounts().map(|account| async move {
            self.sessions.acquire(account.id()).await.map(|_| account.summary())
        }))
        .await
    }

    async fn listing(&self, account: &Account) -> Result<SetListing> {
        let page = self.pages().set_list(account).await?;
        let sets = parse::parse_set_list(&page.body, &page.url, account.class_name())?;
        Ok(SetListing {
            sets,
            fetched_at: page.date,
        })
    }

    pub async fn all_sets(&self, class_name: &str) -> Result<SetListing> {
        self.listing(self.account(class_name)?).await
    }

    pub async fn open_sets(&self, class_name: &str) -> Result<Vec<HomeworkSet>> {
        let listing = self.all_sets(class_name).await?;
        Ok(views::open_sets(&listing.sets, listing.fetched_at))
    }

    pub async fn due_dates(&self, class_name: &str) -> Result<Vec<DueDateEntry>> {
        let listing = self.all_sets(class_name).await?;
        Ok(views::due_dates(&listing.sets))
    }

    pub async fn upcoming_deadlines(&self, class_name: &str) -> Result<Vec<DueDateEntry>> {
        let listing = self.all_sets(class_name).await?;
        Ok(views::upcoming_deadlines(&listing.sets, listing.fetched_at))
    }

    async fn fill_problems(&self, account: &Account, mut set: HomeworkSet) -> Result<HomeworkSet> {
        let url = Url::parse(&set.url).map_err(|_| Error::parse(View::SetList, "set link href"))?;
        let page = self.pages().set_detail(account, &url).await?;
        set.problems = parse::parse_set_detail(&page.body, &page.url)?;
        Ok(set)
    }

    fn find_set(account: &Account, listing: SetListing, set_name: &str) -> Result<HomeworkSet> {
        listing
            .sets
            .into_iter()
            .find(|s| s.name == set_name)
            .ok_or_else(|| Error::NotFound {
                class: account.class_name().into(),
                what: format!("set {set_name:?}"),
            })
    }

    /// The set as listed, with its problem table filled in.
    pub async fn set_info(&self, class_name: &str, set_name: &str) -> Result<HomeworkSet> {
        let account = self.account(class_name)?;
        let listing = self.listing(account).await?;
        let set = Self::find_set(account, listing, set_name)?;
        self.fill_problems(account, set).await
    }

    pub async fn set_progress(&self, class_name: &str, set_name: &str) -> Result<SetProgress> {
        Ok(views::set_progress(&self.set_info(class_name, set_name).await?))
    }

    pub async fn problem(&self, class_name: &str, set_name: &str, number: u32) -> Result<Problem> {
        let account = self.account(class_name)?;
        let page = self.pages().problem(account, &set_slug(set_name), number).await?;
        parse::parse_problem(&page.body, set_name, number, page.url.as_str())
    }

    pub async fn grades(&self, class_name: &str) -> Result<Vec<GradeRecord>> {
        let account = self.account(class_name)?;
        let page = self.pages().grades(account).await?;
        parse::parse_grades(&page.body)
    }

    /// Open sets of every class, fetched concurrently.
    pub async fn dashboard(&self) -> Result<Vec<DashboardEntry>> {
        try_join_all(self.sessions.accounts().map(|account| async move {
            let listing = self.listing(account).await?;
            Ok::<_, Error>(views::dashboard_entry(account.class_name(), &listing.sets, listing.fetched_at))
        }))
        .await
    }

    async fn course(&self, account: &Account) -> Result<CourseInfo> {
        let listing = self.listing(account).await?;
        let open = views::open_sets(&listing.sets, listing.fetched_at);
        let open = try_join_all(open.into_iter().map(|set| self.fill_problems(account, set))).await?;
        Ok(views::course_info(account.summary(), &listing.sets, &open, listing.fetched_at))
    }

    pub async fn course_info(&self, class_name: &str) -> Result<CourseInfo> {
        self.course(self.account(class_name)?).await
    }

    pub async fn all_courses_info(&self) -> Result<Vec<CourseInfo>> {
        try_join_all(self.sessions.accounts().map(|account| self.course(account))).await
    }

    pub async fn hardcopy(
        &self,
        class_name: &str,
        set_name: &str,
        options: &HardcopyOptions,
        cancel: &CancellationToken,
    ) -> Result<Hardcopy> {
        let account = self.account(class_name)?;
        hardcopy::request_hardcopy(self.pages(), account, set_name, options, cancel).await
    }
}
