use repo_search::{
    anilist_api_utils::{anilist_api_helper::AnilistExecutor, Media},
    config_utils::Settings,
    error::{ConfigError, QueryError},
    github_api_utils::{github_api_helper::GithubSearchExecutor, Repository},
    pagination_utils::{
        pagination_controller::{FetchState, Outcome, PaginationController, QueryExecutor},
        CollectionKey, QueryArgs,
    },
};

use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

const DEFAULT_DUMP_MAX_PAGES: usize = 10;

/// One line of a printed list.
trait ListRow {
    fn row(&self) -> String;
}

impl ListRow for Repository {
    fn row(&self) -> String {
        format!("{} - {}", self.full_name, self.url)
    }
}

impl ListRow for Media {
    fn row(&self) -> String {
        format!(
            "{} - {}",
            self.display_title(),
            self.site_url.as_deref().unwrap_or("no link")
        )
    }
}

/// Commands understood by an interactive list.
struct Commands {
    help: &'static str,
    /// Arguments for `command text`, `None` when the command doesn't start a list.
    args_for: fn(&str, &str) -> Option<QueryArgs>,
    /// Whether a blank search text is a list of its own.
    start_blank: bool,
}

fn repository_args(command: &str, text: &str) -> Option<QueryArgs> {
    match command {
        "new" => Some(QueryArgs::repositories(text)),
        "user" => Some(QueryArgs::user_repositories(text)),
        _ => None,
    }
}

fn media_args(command: &str, text: &str) -> Option<QueryArgs> {
    match command {
        "new" => Some(QueryArgs::media(text)),
        _ => None,
    }
}

const REPOSITORY_COMMANDS: Commands = Commands {
    help: "Commands: <enter>|more, retry, new <text>, user <login>, clear, quit",
    args_for: repository_args,
    start_blank: false,
};

const MEDIA_COMMANDS: Commands = Commands {
    help: "Commands: <enter>|more, retry, new [title], clear, quit",
    args_for: media_args,
    start_blank: true,
};

/// Terminal front end for one list.
struct Session<E: QueryExecutor> {
    controller: PaginationController<E>,
    page_size: u32,
    key: Option<CollectionKey>,
    // items of the active collection already written to stdout
    printed: usize,
}

impl<E> Session<E>
where
    E: QueryExecutor,
    E::Item: ListRow,
{
    fn new(settings: &Settings, executor: E) -> Self {
        Session {
            controller: PaginationController::new(executor)
                .with_min_query_len(settings.min_query_len),
            page_size: settings.page_size,
            key: None,
            printed: 0,
        }
    }

    /// Replaces the shown list. Validation errors leave it untouched.
    async fn start(&mut self, args: QueryArgs) -> Result<(), QueryError> {
        let args = args.with_page_size(self.page_size);
        let key = args.key();
        let outcome = self.controller.request_initial(args).await?;
        if outcome != Outcome::Ignored {
            self.printed = 0;
        }
        self.key = Some(key);
        self.report(outcome);
        Ok(())
    }

    async fn more(&mut self) {
        let Some(key) = self.key.clone() else {
            println!("Search something first");
            return;
        };
        let outcome = self.controller.request_more(&key).await;
        self.report(outcome);
    }

    async fn retry(&mut self) {
        let Some(key) = self.key.clone() else {
            return;
        };
        let outcome = self.controller.retry(&key).await;
        self.report(outcome);
    }

    fn clear(&mut self) {
        self.controller.clear_all();
        self.key = None;
        self.printed = 0;
        println!("Cleared");
    }

    fn state(&self) -> FetchState {
        self.key
            .as_ref()
            .map_or(FetchState::Idle, |key| self.controller.current_state(key))
    }

    fn report(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Merged(state) => {
                self.print_new_items();
                if state == FetchState::Exhausted {
                    println!("-- end of results --");
                }
            }
            Outcome::Failed(err) => report_failure(&err),
            Outcome::Discarded => debug!("Response arrived for a collection no longer shown"),
            Outcome::Ignored => match self.state() {
                FetchState::Exhausted => println!("No more results"),
                FetchState::Failed => println!("Last request failed, type 'retry'"),
                FetchState::Fetching => println!("Still loading..."),
                FetchState::Idle => {}
            },
        }
    }

    fn print_new_items(&mut self) {
        let Some(collection) = self
            .key
            .as_ref()
            .and_then(|key| self.controller.current_collection(key))
        else {
            return;
        };
        if collection.is_empty() {
            println!("No items to display");
            return;
        }
        for (idx, item) in collection.items.iter().enumerate().skip(self.printed) {
            println!("{:>4}. {}", idx + 1, item.row());
        }
        self.printed = collection.len();
        if let Some(total) = collection.total_count {
            println!("[{} / {}]", collection.len(), total);
        }
    }
}

fn report_failure(err: &QueryError) {
    match err {
        QueryError::Authorization(_) => {
            println!("Something went wrong: {err}. Check GH_API_KEY, then type 'retry'")
        }
        _ => println!("Something went wrong: {err}. Type 'retry' to try again"),
    }
}

/// Reads commands from stdin until `quit` or end of input.
async fn run_interactive<E>(session: &mut Session<E>, commands: &Commands, initial_text: String)
where
    E: QueryExecutor,
    E::Item: ListRow,
{
    if commands.start_blank || !initial_text.trim().is_empty() {
        if let Some(args) = (commands.args_for)("new", &initial_text) {
            if let Err(err) = session.start(args).await {
                println!("{err}");
            }
        }
    }
    println!("{}", commands.help);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!("Couldn't read stdin: {err}");
                break;
            }
        };
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" | "more" => session.more().await,
            "retry" => session.retry().await,
            "clear" => session.clear(),
            "quit" | "exit" => break,
            _ => match (commands.args_for)(command, rest) {
                Some(args) => {
                    if let Err(err) = session.start(args).await {
                        println!("{err}");
                    }
                }
                None => println!("Unrecognized command {command}"),
            },
        }
    }
}

/// Fetches pages until the collection is exhausted, fails or `max_pages` is reached.
async fn run_dump<E>(
    session: &mut Session<E>,
    text: String,
    max_pages: usize,
) -> Result<(), QueryError>
where
    E: QueryExecutor,
    E::Item: ListRow,
{
    session.start(QueryArgs::repositories(text)).await?;
    let mut pages = 1;
    while pages < max_pages && session.state() == FetchState::Idle {
        session.more().await;
        pages += 1;
    }
    match session.key.as_ref().and_then(|key| session.controller.last_error(key)) {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

fn or_exit<T>(result: Result<T, ConfigError>) -> T {
    result.unwrap_or_else(|err| {
        error!("{err}");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    // load env variables
    dotenv().ok();
    pretty_env_logger::init();

    let settings = or_exit(Settings::load());

    let args: Vec<String> = std::env::args().collect();
    let text = args.get(2..).map(|words| words.join(" ")).unwrap_or_default();
    match args.get(1).map(String::as_str) {
        Some("search") => {
            let executor = or_exit(GithubSearchExecutor::new(&settings));
            let mut session = Session::new(&settings, executor);
            run_interactive(&mut session, &REPOSITORY_COMMANDS, text).await
        }
        Some("anime") => {
            let executor = or_exit(AnilistExecutor::new(&settings));
            let mut session = Session::new(&settings, executor);
            run_interactive(&mut session, &MEDIA_COMMANDS, text).await
        }
        Some("dump") => {
            let text = args.get(2).cloned().unwrap_or_default();
            let max_pages = match args.get(3).map(|pages| pages.parse::<usize>()) {
                None => DEFAULT_DUMP_MAX_PAGES,
                Some(Ok(pages)) if pages > 0 => pages,
                Some(_) => {
                    error!("max_pages must be a positive number");
                    std::process::exit(2);
                }
            };
            let executor = or_exit(GithubSearchExecutor::new(&settings));
            let mut session = Session::new(&settings, executor);
            if let Err(err) = run_dump(&mut session, text, max_pages).await {
                error!("{err}");
                std::process::exit(1);
            }
        }
        Some(other) => {
            error!("Unrecognized argument {other}, closing...");
            std::process::exit(2);
        }
        None => {
            error!(
                "Usage: repo_search search <text> | repo_search anime [title] | repo_search dump <text> [max_pages]"
            );
            std::process::exit(2);
        }
    }
}
