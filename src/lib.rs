#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::absolute_paths,
    clippy::arithmetic_side_effects,
    clippy::as_conversions,
    clippy::cast_lossless, // u32 -> f64
    clippy::cast_possible_truncation, // u128 -> u64
    clippy::cast_precision_loss, // usize -> f64
    clippy::option_if_let_else,
    clippy::future_not_send,
    clippy::implicit_return,
    clippy::indexing_slicing,
    clippy::min_ident_chars,
    clippy::missing_assert_message,
    clippy::missing_errors_doc,
    clippy::missing_trait_methods,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::non_ascii_literal,
    clippy::single_char_lifetime_names,
    clippy::pattern_type_mismatch,
    clippy::pub_use,
    clippy::question_mark_used,
    clippy::ref_patterns,
    clippy::self_named_module_files,
    clippy::shadow_reuse,
    clippy::shadow_unrelated,
    clippy::similar_names,
    clippy::single_call_fn,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::string_add,
    clippy::unseparated_literal_suffix,
    clippy::wildcard_enum_match_arm,
)]

//! Read-only scraping client for WeBWorK homework servers.
//!
//! [`HomeworkClient`] is the entry point: it owns one [`SessionManager`]
//! holding a cookie session per configured [`Account`], fetches the
//! server-rendered pages and parses them into the records in [`model`].

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod hardcopy;
pub mod model;
pub mod scrape;
pub mod session;
pub mod util;
pub mod views;

pub use account::{Account, AccountId, ClassSummary};
pub use client::HomeworkClient;
pub use config::{ClassCredentials, Config};
pub use error::{AuthFailure, Error, FetchFailure, Result, View};
pub use hardcopy::{Hardcopy, HardcopyOptions, JobState};
pub use scrape::ClientOptions;
pub use session::{Session, SessionManager, SessionState};
