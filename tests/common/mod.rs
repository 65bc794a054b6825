//! An in-process stand-in for a WeBWorK server: a cookie login, a course
//! with a few sets, and a hardcopy generator that can be told to stall or
//! fail.

#![allow(dead_code)]

use core::{
    sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};
use std::{collections::HashMap, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::State,
    http::{
        HeaderMap, Method, StatusCode, Uri,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, DATE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use parking_lot::Mutex;
use wwscr::{Account, ClientOptions, HomeworkClient};

pub const PASSWORD: &str = "s3cret";
pub const USER: &str = "alice";
/// What the fake server's clock reads: Sunday, 8am EDT.
pub const SERVER_DATE: &str = "Sun, 15 Mar 2026 12:00:00 GMT";

#[derive(Default)]
pub struct Fake {
    logins: Mutex<HashMap<String, u32>>,
    tokens: Mutex<HashMap<String, String>>,
    hits: Mutex<HashMap<String, u32>>,
    pub posts: Mutex<Vec<(String, HashMap<String, String>)>>,
    next_token: AtomicU64,
    last_set: Mutex<String>,
    /// Every page asks for a login even with a valid cookie.
    pub reject_sessions: AtomicBool,
    pub stall_hardcopy: AtomicBool,
    pub fail_hardcopy: AtomicBool,
    pub direct_pdf: AtomicBool,
    pub polls: AtomicU32,
    pub login_delay_ms: AtomicU64,
    /// Forget every session right after serving the next hardcopy form.
    pub expire_after_form: AtomicBool,
    /// Hardcopy forms carry a key no session will ever accept.
    pub stale_form_keys: AtomicBool,
    /// Where `/webwork2/<class>/elsewhere/` redirects to.
    pub redirect_to: Mutex<Option<String>>,
}

impl Fake {
    pub fn logins(&self, class: &str) -> u32 {
        self.logins.lock().get(class).copied().unwrap_or(0)
    }

    pub fn hits(&self, path: &str) -> u32 {
        self.hits.lock().get(path).copied().unwrap_or(0)
    }

    /// Forgets every session, as a server restart or timeout would.
    pub fn expire_all(&self) {
        self.tokens.lock().clear();
    }

    pub fn total_hits(&self) -> u32 {
        self.hits.lock().values().sum()
    }

    /// The session token of a cookie still valid for `class`.
    fn session(&self, class: &str, headers: &HeaderMap) -> Option<String> {
        if self.reject_sessions.load(Ordering::Acquire) {
            return None;
        }
        let tokens = self.tokens.lock();
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|kv| kv.trim().strip_prefix("ww="))
            .find(|token| tokens.get(*token).is_some_and(|c| c == class))
            .map(str::to_owned)
    }
}

pub async fn spawn() -> (Arc<Fake>, String) {
    let fake = Arc::new(Fake::default());
    let app = Router::new().fallback(handle).with_state(fake.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (fake, format!("http://{addr}/webwork2/"))
}

pub fn account(base: &str, class: &str, password: &str) -> Account {
    Account::new(class, USER, password, base).unwrap()
}

pub fn client(base: &str, classes: &[&str]) -> HomeworkClient {
    let accounts = classes.iter().map(|c| account(base, c, PASSWORD)).collect();
    HomeworkClient::new(accounts, ClientOptions::default()).unwrap()
}

fn respond(status: StatusCode, content_type: &str) -> axum::http::response::Builder {
    Response::builder()
        .status(status)
        .header(DATE, SERVER_DATE)
        .header(CONTENT_TYPE, content_type)
}

fn html(body: String) -> Response {
    respond(StatusCode::OK, "text/html; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

fn login_form(class: &str) -> Response {
    html(format!(
        r#"<html><body><h2>Please enter your username and password for {class}</h2>
        <form method="post" action="/webwork2/{class}/">
          <input type="text" name="user"><input type="password" name="passwd">
          <input type="submit" name=".submit" value="Continue">
        </form></body></html>"#
    ))
}

fn banner() -> String {
    format!(r#"<div id="loginstatus">Logged in as <b>{USER}</b>. <a href="/logout">Log Out</a></div>"#)
}

fn set_list(class: &str) -> String {
    let row = |slug: &str, name: &str, status: &str| {
        format!(r#"<tr><td><a href="/webwork2/{class}/{slug}/?effectiveUser={USER}">{name}</a></td><td>{status}</td></tr>"#)
    };
    format!(
        r#"<html><body>{}<table class="problem_set_table"><tr><th>Name</th><th>Status</th></tr>{}{}{}{}{}</table></body></html>"#,
        banner(),
        row("Assignment_2", "Assignment 2", "Open, closes 03/20/2026 at 11:59pm EDT."),
        row("Assignment_1", "Assignment 1", "Closed, answers available."),
        row("Assignment_3", "Assignment 3", "Open, closes 03/18/2026 at 11:59pm EDT."),
        row("Quiz", "Quiz", "Will open on 03/25/2026 at 12:00am EDT."),
        row("Assignment_0", "Assignment 0", "Open, closes 03/01/2026 at 11:59pm EST."),
    )
}

fn set_detail() -> String {
    format!(
        r#"<html><body>{}<table class="problem_table">
        <tr><th>Name</th><th>Attempts</th><th>Remaining</th><th>Worth</th><th>Status</th></tr>
        <tr><td><a href="1/?effectiveUser={USER}">Problem 1</a></td><td>2</td><td>unlimited</td><td>1</td><td>100%</td></tr>
        <tr><td><a href="2/?effectiveUser={USER}">Problem 2</a></td><td>1</td><td>2</td><td>2</td><td>50%</td></tr>
        <tr><td><a href="3/?effectiveUser={USER}">Problem 3</a></td><td>0</td><td>3</td><td>1</td><td>not attempted</td></tr>
        </table></body></html>"#,
        banner()
    )
}

pub const PROBLEM_BODY: &str = r#"
<p>Let <script type="math/tex">\vec{u} = \langle 1, -2 &amp; 3 \rangle</script>.</p>
<script type="math/tex; mode=display">\int_0^1 x^2\,dx < \frac{1}{2}</script>
<input type="text" name="AnSwEr0001" aria-label="answer 1">
"#;

fn problem() -> String {
    format!(
        r#"<html><body>{}<form id="problemMainForm" method="post">
        <div id="problem_body">{PROBLEM_BODY}</div>
        <div id="score_summary">You have attempted this problem 2 times.<br>
        Your overall recorded score is 50%.<br>You have unlimited attempts remaining.</div>
        </form></body></html>"#,
        banner()
    )
}

fn grades() -> String {
    format!(
        r#"<html><body>{}<table class="grade_table">
        <tr><th>Set</th><th>Percent</th><th>Score</th><th>Out Of</th></tr>
        <tr><td>Assignment 1</td><td>67%</td><td>2</td><td>3</td></tr>
        <tr><td>Assignment 2</td><td>100%</td><td>4</td><td>4</td></tr>
        </table></body></html>"#,
        banner()
    )
}

fn hardcopy_form(class: &str, set: &str, key: &str) -> String {
    format!(
        r#"<html><body>{}<form id="hardcopy-form" method="post" action="/webwork2/{class}/hardcopy/">
        <input type="hidden" name="user" value="{USER}">
        <input type="hidden" name="effectiveUser" value="{USER}">
        <input type="hidden" name="key" value="{key}">
        <input type="hidden" name="selected_sets" value="{set}">
        <input type="hidden" name=".cgifields" value="printStudentAnswers">
        <input type="hidden" name="submitAnswers" value="Submit">
        <input type="checkbox" name="printStudentAnswers">
        <input type="submit" name="generate_hardcopy" value="Generate Hardcopy">
        </form></body></html>"#,
        banner()
    )
}

fn pending(class: &str) -> String {
    format!(
        r#"<html><head><meta http-equiv="refresh" content="0; url=/webwork2/{class}/hardcopy/status/"></head>
        <body>{}<p>Your hardcopy is being generated.</p></body></html>"#,
        banner()
    )
}

fn pdf(fake: &Fake, class: &str) -> Response {
    let set = fake.last_set.lock().clone();
    respond(StatusCode::OK, "application/pdf")
        .header(CONTENT_DISPOSITION, format!(r#"attachment; filename="{class}.{USER}.{set}.pdf""#))
        .body(Body::from(&b"%PDF-1.4\n% fake hardcopy\n%%EOF\n"[..]))
        .unwrap()
}

async fn handle(
    State(fake): State<Arc<Fake>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let path = uri.path().to_owned();
    *fake.hits.lock().entry(path.clone()).or_default() += 1;
    if method == Method::POST {
        fake.posts.lock().push((path.clone(), form.clone()));
    }

    let Some(rest) = path.strip_prefix("/webwork2/") else {
        return respond(StatusCode::NOT_FOUND, "text/plain").body(Body::empty()).unwrap();
    };
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let Some((&class, tail)) = segments.split_first() else {
        return respond(StatusCode::NOT_FOUND, "text/plain").body(Body::empty()).unwrap();
    };

    if tail.is_empty() && method == Method::POST && form.contains_key("passwd") {
        *fake.logins.lock().entry(class.to_owned()).or_default() += 1;
        let delay = fake.login_delay_ms.load(Ordering::Acquire);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if form.get("user").map(String::as_str) != Some(USER)
            || form.get("passwd").map(String::as_str) != Some(PASSWORD)
        {
            return login_form(class);
        }
        let token = format!("{class}-{}", fake.next_token.fetch_add(1, Ordering::AcqRel));
        fake.tokens.lock().insert(token.clone(), class.to_owned());
        return respond(StatusCode::OK, "text/html; charset=utf-8")
            .header(SET_COOKIE, format!("ww={token}; Path=/; HttpOnly"))
            .body(Body::from(set_list(class)))
            .unwrap();
    }

    let Some(token) = fake.session(class, &headers) else {
        return login_form(class);
    };

    match (method, tail) {
        (Method::GET, []) => html(set_list(class)),
        (Method::GET, ["grades"]) => html(grades()),
        (Method::POST, ["hardcopy"]) if form.get("key") != Some(&token) => login_form(class),
        (Method::POST, ["hardcopy"]) => {
            *fake.last_set.lock() = form.get("selected_sets").cloned().unwrap_or_default();
            fake.polls.store(0, Ordering::Release);
            if fake.fail_hardcopy.load(Ordering::Acquire) {
                html(format!(
                    r#"<html><body>{}<div class="alert alert-danger">Errors occurred while generating hardcopy: LaTeX failed on line 12</div></body></html>"#,
                    banner()
                ))
            } else if fake.direct_pdf.load(Ordering::Acquire) {
                pdf(&fake, class)
            } else {
                html(pending(class))
            }
        }
        (Method::GET, ["hardcopy", "status"]) => {
            let polls = fake.polls.fetch_add(1, Ordering::AcqRel) + 1;
            if fake.stall_hardcopy.load(Ordering::Acquire) || polls < 2 {
                html(pending(class))
            } else {
                html(format!(
                    r#"<html><body>{}<p>Done: <a href="/webwork2/{class}/hardcopy/download/?tempFilename=x.pdf">download</a></p></body></html>"#,
                    banner()
                ))
            }
        }
        (Method::GET, ["hardcopy", "download"]) => pdf(&fake, class),
        (Method::GET, ["hardcopy", set]) => {
            let key = if fake.stale_form_keys.load(Ordering::Acquire) { "k3y" } else { token.as_str() };
            let page = html(hardcopy_form(class, set, key));
            if fake.expire_after_form.swap(false, Ordering::AcqRel) {
                fake.expire_all();
            }
            page
        }
        (Method::GET, ["elsewhere"]) => match fake.redirect_to.lock().clone() {
            Some(target) => respond(StatusCode::FOUND, "text/html")
                .header(LOCATION, target)
                .body(Body::empty())
                .unwrap(),
            None => respond(StatusCode::NOT_FOUND, "text/html").body(Body::empty()).unwrap(),
        },
        (Method::GET, [_set]) => html(set_detail()),
        (Method::GET, [_set, n]) if n.parse::<u32>().is_ok() => html(problem()),
        _ => respond(StatusCode::NOT_FOUND, "text/html")
            .body(Body::from("<p>not found</p>"))
            .unwrap(),
    }
}
