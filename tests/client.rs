mod common;

use std::time::{Duration, SystemTime};

use reqwest::{StatusCode, Url};
use wwscr::{
    Account, AuthFailure, ClientOptions, Error, FetchFailure, HomeworkClient, View,
    model::{Attempts, SetStatus},
    scrape::PageClient,
};

fn names<T>(items: &[T], name: impl Fn(&T) -> String) -> Vec<String> {
    items.iter().map(name).collect()
}

#[tokio::test]
async fn listing_uses_the_server_clock() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);

    let listing = client.all_sets("Math221").await.unwrap();
    assert_eq!(listing.sets.len(), 5);
    assert_eq!(listing.fetched_at, SystemTime::UNIX_EPOCH + Duration::from_secs(1_773_576_000));
    assert_eq!(listing.sets[1].status, SetStatus::Closed);
    assert!(listing.sets.iter().all(|s| s.class_name == "Math221"));
}

#[tokio::test]
async fn open_sets_and_deadlines() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);

    let open = client.open_sets("Math221").await.unwrap();
    assert_eq!(names(&open, |s| s.name.clone()), ["Assignment 3", "Assignment 2"]);

    let due = client.due_dates("Math221").await.unwrap();
    assert_eq!(
        names(&due, |e| e.name.clone()),
        ["Assignment 0", "Assignment 3", "Assignment 2", "Assignment 1", "Quiz"]
    );

    let upcoming = client.upcoming_deadlines("Math221").await.unwrap();
    assert_eq!(names(&upcoming, |e| e.name.clone()), ["Assignment 3", "Assignment 2"]);
    assert!(upcoming.iter().all(|e| e.status == SetStatus::Open));
}

#[tokio::test]
async fn set_info_and_progress() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);

    let set = client.set_info("Math221", "Assignment 2").await.unwrap();
    assert_eq!(set.problems.len(), 3);
    assert_eq!(set.problems[0].remaining, Attempts::Unlimited);
    assert_eq!(
        set.problems[1].url.as_deref(),
        Some(format!("{base}Math221/Assignment_2/2/?effectiveUser=alice").as_str())
    );

    let progress = client.set_progress("Math221", "Assignment 2").await.unwrap();
    assert_eq!(progress.completed_count, 1);
    assert_eq!(progress.remaining_problems, [2, 3]);
    assert_eq!(progress.percent, Some(50.0));
}

#[tokio::test]
async fn unknown_set_and_class() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);

    assert!(matches!(
        client.set_info("Math221", "Assignment 9").await.unwrap_err(),
        Error::NotFound { class, .. } if class == "Math221"
    ));
    assert!(matches!(
        client.grades("Chem999").await.unwrap_err(),
        Error::UnknownClass(class) if class == "Chem999"
    ));
}

#[tokio::test]
async fn problem_markup_is_verbatim() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);

    let problem = client.problem("Math221", "Assignment 2", 1).await.unwrap();
    assert_eq!(problem.markup, common::PROBLEM_BODY);
    assert_eq!(problem.math[0].tex, r"\vec{u} = \langle 1, -2 &amp; 3 \rangle");
    assert_eq!(problem.math[1].tex, r"\int_0^1 x^2\,dx < \frac{1}{2}");
    assert!(problem.math[1].display);
    assert!(problem.text.contains("[answer 1]"));
    assert_eq!(problem.answers.len(), 1);
    assert_eq!(problem.answers[0].name, "AnSwEr0001");
    assert_eq!(problem.answers[0].label, "answer 1");
    assert_eq!(problem.attempts, 2);
    assert_eq!(problem.remaining, Some(Attempts::Unlimited));
    assert_eq!(problem.score, Some(0.5));
    assert_eq!(problem.url, format!("{base}Math221/Assignment_2/1/?effectiveUser=alice"));
}

#[tokio::test]
async fn grades_recompute_percentages() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);

    let grades = client.grades("Math221").await.unwrap();
    assert_eq!(grades[0].set_name, "Assignment 1");
    assert_eq!(grades[0].percentage, Some(66.67));
    assert_eq!(grades[1].percentage, Some(100.0));
}

#[tokio::test]
async fn course_overview_for_every_class() {
    let (fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221", "Phys101"]);

    let classes = client.classes().await.unwrap();
    assert_eq!(names(&classes, |c| c.class_name.to_string()), ["Math221", "Phys101"]);

    let dashboard = client.dashboard().await.unwrap();
    assert_eq!(dashboard.len(), 2);
    assert_eq!(names(&dashboard[1].open_sets, |e| e.name.clone()), ["Assignment 3", "Assignment 2"]);

    let courses = client.all_courses_info().await.unwrap();
    assert_eq!(courses.len(), 2);
    let math = &courses[0];
    assert_eq!(math.class.class_name, "Math221");
    assert_eq!(math.total_sets, 5);
    assert_eq!(math.open_sets_count, 2);
    assert_eq!(math.closed_sets_count, 3);
    assert_eq!(math.open_sets[0].total_problems, 3);
    assert_eq!(names(&math.closed_sets, |e| e.name.clone()), ["Assignment 0", "Assignment 1", "Quiz"]);

    assert_eq!(fake.logins("Math221"), 1);
    assert_eq!(fake.logins("Phys101"), 1);
}

#[tokio::test]
async fn failing_class_fails_the_class_list() {
    let (fake, base) = common::spawn().await;
    let accounts = vec![
        common::account(&base, "Math221", "wrong"),
        common::account(&base, "Phys101", "wrong"),
    ];
    let client = HomeworkClient::new(accounts, ClientOptions::default()).unwrap();

    assert!(matches!(
        client.classes().await.unwrap_err(),
        Error::Authentication { cause: AuthFailure::Rejected, .. }
    ));
    assert!(matches!(
        client.all_courses_info().await.unwrap_err(),
        Error::Authentication { .. }
    ));
    assert!(fake.logins("Math221") >= 1);
}

fn math221(client: &HomeworkClient) -> &Account {
    client.sessions().find_class("Math221").unwrap()
}

#[tokio::test]
async fn error_status_is_a_fetch_error() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);
    let account = math221(&client);

    let url = account.class_url().join("no/such/page/").unwrap();
    let err = PageClient::new(client.sessions()).get(account, &url).await.unwrap_err();
    assert!(matches!(
        &err,
        Error::Fetch { account, url, cause: FetchFailure::Status(StatusCode::NOT_FOUND) }
            if account.as_str() == "Math221" && url.ends_with("/webwork2/Math221/no/such/page/")
    ), "{err:?}");
}

#[tokio::test]
async fn redirect_off_the_server_is_not_followed() {
    let (fake, base) = common::spawn().await;
    let (other, other_base) = common::spawn().await;
    *fake.redirect_to.lock() = Some(format!("{other_base}Math221/"));
    let client = common::client(&base, &["Math221"]);
    let account = math221(&client);

    let url = account.class_url().join("elsewhere/").unwrap();
    let err = PageClient::new(client.sessions()).get(account, &url).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Fetch { cause: FetchFailure::Status(StatusCode::FOUND), .. }
    ), "{err:?}");
    assert_eq!(other.total_hits(), 0);
}

#[tokio::test]
async fn session_is_never_sent_to_another_host() {
    let (_fake, base) = common::spawn().await;
    let (other, other_base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);
    let account = math221(&client);

    let url = Url::parse(&format!("{other_base}Math221/")).unwrap();
    let err = PageClient::new(client.sessions()).get(account, &url).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { cause: FetchFailure::ForeignHost, .. }), "{err:?}");
    assert_eq!(other.total_hits(), 0);
}

#[tokio::test]
async fn binary_in_place_of_a_page_is_unexpected_content() {
    let (_fake, base) = common::spawn().await;
    let client = common::client(&base, &["Math221"]);
    let account = math221(&client);

    let url = account.class_url().join("hardcopy/download/").unwrap();
    let err = PageClient::new(client.sessions())
        .page(account, &url, View::Problem)
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        Error::Fetch { cause: FetchFailure::UnexpectedContent(what), .. }
            if what.starts_with("application/pdf") && what.ends_with("problem page")
    ), "{err:?}");
}
