use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use wwscr::{ClientOptions, Config, HardcopyOptions, HomeworkClient, hardcopy::HardcopyJob};

#[derive(clap::Parser)]
struct Args {
    /// JSON file with `url` and `classes`; the environment (and `.env`) otherwise.
    #[arg(short, long, value_name = "file", env = "WEBWORK_CONFIG")]
    config: Option<PathBuf>,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    Classes,
    Dashboard,
    Sets { class: String },
    OpenSets { class: String },
    DueDates { class: String },
    Upcoming { class: String },
    SetInfo { class: String, set: String },
    Progress { class: String, set: String },
    Problem { class: String, set: String, number: u32 },
    Grades { class: String },
    Course { class: String },
    Courses,
    Hardcopy {
        class: String,
        set: String,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        #[arg(long)]
        no_answers: bool,
        #[arg(long)]
        comments: bool,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 60)]
        ceiling: u64,
    },
}

#[derive(Serialize)]
struct Written<'a> {
    job: &'a HardcopyJob,
    path: &'a Path,
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let config = match &args.config {
        Some(file) => Config::from_json(file)?,
        None => Config::from_env()?,
    };
    let options = ClientOptions {
        timeout: core::time::Duration::from_secs(args.timeout),
        ..ClientOptions::default()
    };
    let client = HomeworkClient::new(config.accounts()?, options)?;

    match args.command {
        Commands::Classes => print(&client.classes().await?)?,
        Commands::Dashboard => print(&client.dashboard().await?)?,
        Commands::Sets { class } => print(&client.all_sets(&class).await?)?,
        Commands::OpenSets { class } => print(&client.open_sets(&class).await?)?,
        Commands::DueDates { class } => print(&client.due_dates(&class).await?)?,
        Commands::Upcoming { class } => print(&client.upcoming_deadlines(&class).await?)?,
        Commands::SetInfo { class, set } => print(&client.set_info(&class, &set).await?)?,
        Commands::Progress { class, set } => print(&client.set_progress(&class, &set).await?)?,
        Commands::Problem { class, set, number } => print(&client.problem(&class, &set, number).await?)?,
        Commands::Grades { class } => print(&client.grades(&class).await?)?,
        Commands::Course { class } => print(&client.course_info(&class).await?)?,
        Commands::Courses => print(&client.all_courses_info().await?)?,
        Commands::Hardcopy {
            class,
            set,
            out,
            no_answers,
            comments,
            ceiling,
        } => {
            let options = HardcopyOptions {
                include_answers: !no_answers,
                include_comments: comments,
                ceiling: core::time::Duration::from_secs(ceiling),
                ..HardcopyOptions::default()
            };

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!(target: "main", "interrupted, cancelling hardcopy ...");
                    on_ctrl_c.cancel();
                }
            });

            let hardcopy = client.hardcopy(&class, &set, &options, &cancel).await?;
            let path = out.join(&hardcopy.filename);
            tokio::task::spawn_blocking({
                let path = path.clone();
                move || std::fs::write(path, hardcopy.payload)
            })
            .await??;
            log::info!(target: "main", "\x1b[36mwrote {}\x1b[0m", path.display());
            print(&Written {
                job: &hardcopy.job,
                path: &path,
            })?;
        }
    }

    Ok(())
}
