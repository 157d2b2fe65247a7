mod config;

use anyhow::{Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use config::{Config, Context};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use inkpost_client::session::store::FileStore;
use inkpost_client::types::{
    AdminCreateRequest, BlogPayload, ContactRequest, ListQuery, LoginRequest, ProfileUpdate,
    RegisterRequest,
};
use inkpost_client::{ApiClient, ApiConfig, ApiError, SessionManager};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "inkpost")]
#[command(version, about = "Inkpost Command Line Client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Interactive mode (TUI post browser)
    #[arg(short, long)]
    interactive: bool,

    /// Backend API base URL (overrides context and INKPOST_API_URL)
    #[arg(long)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Context management
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
    /// Log in and store the session
    /// Examples:
    ///     inkpost login --username alice --password secret
    ///     inkpost --api-url=http://localhost:5000/api login -u alice -p secret
    #[command(verbatim_doc_comment)]
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account and store the session
    /// Examples:
    ///     inkpost register -u alice -e alice@example.com -p secret
    ///     inkpost register --name "Alice B" -u alice -e alice@example.com -p secret
    #[command(verbatim_doc_comment)]
    Register {
        /// Display name (defaults to the username)
        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Drop the stored session
    Logout,
    /// Show the stored session state
    Whoami,
    /// Blog posts
    Blog {
        #[command(subcommand)]
        command: BlogCommand,
    },
    /// Comments on a post
    Comment {
        #[command(subcommand)]
        command: CommentCommand,
    },
    /// Upload an image and print the stored URL
    /// Examples:
    ///     inkpost upload cover.png
    #[command(verbatim_doc_comment)]
    Upload {
        /// Image file (max 5 MiB)
        file: PathBuf,
    },
    /// Profile management
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Send a message through the contact form
    /// Examples:
    ///     inkpost contact --name Alice --email alice@example.com --message "Hi"
    #[command(verbatim_doc_comment)]
    Contact {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        message: String,
    },
    /// Admin provisioning
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
    /// Backend health check
    Health,
}

#[derive(Subcommand)]
enum BlogCommand {
    /// List published posts
    /// Examples:
    ///     inkpost blog list
    ///     inkpost blog list --tag travel --page 2 --limit 12
    ///     inkpost blog list --search rust --json
    #[command(verbatim_doc_comment)]
    List {
        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        /// Emit only the JSON response
        #[arg(short, long)]
        json: bool,
    },
    /// Show a single post
    Get {
        /// Post ID
        id: String,

        /// Emit only the JSON response
        #[arg(short, long)]
        json: bool,
    },
    /// Publish a new post
    /// Examples:
    ///     inkpost blog create --title "Hello" --content "First post"
    ///     inkpost blog create --title "Trip" --content-file trip.md --tags travel,food
    ///     inkpost blog create --title "Pic" --content "..." --image-file cover.png
    #[command(verbatim_doc_comment)]
    Create {
        #[arg(long)]
        title: String,

        /// Post body (markdown)
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read the post body from a file
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,

        /// Short summary shown in listings
        #[arg(long)]
        excerpt: Option<String>,

        /// Cover image URL
        #[arg(long, conflicts_with = "image_file")]
        image: Option<String>,

        /// Upload a local cover image first and use the stored URL
        #[arg(long)]
        image_file: Option<PathBuf>,
    },
    /// Update an existing post
    /// Examples:
    ///     inkpost blog update 66f1a2 --title "Hello again" --content-file post.md
    #[command(verbatim_doc_comment)]
    Update {
        /// Post ID
        id: String,

        #[arg(long)]
        title: String,

        /// Post body (markdown)
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read the post body from a file
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,

        /// Short summary shown in listings
        #[arg(long)]
        excerpt: Option<String>,

        /// Cover image URL
        #[arg(long, conflicts_with = "image_file")]
        image: Option<String>,

        /// Upload a local cover image first and use the stored URL
        #[arg(long)]
        image_file: Option<PathBuf>,
    },
    /// Delete a post
    Delete {
        /// Post ID
        id: String,
    },
    /// List the authenticated user's posts
    Mine {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        /// Emit only the JSON response
        #[arg(short, long)]
        json: bool,
    },
    /// Toggle a like on a post
    Like {
        /// Post ID
        id: String,
    },
    /// Aggregate statistics for the authenticated user's posts
    Stats,
}

#[derive(Subcommand)]
enum CommentCommand {
    /// Comment on a post
    /// Examples:
    ///     inkpost comment add 66f1a2 "Great write-up"
    #[command(verbatim_doc_comment)]
    Add {
        /// Post ID
        blog_id: String,

        /// Comment text
        content: String,
    },
    /// Delete a comment
    Delete {
        /// Post ID
        blog_id: String,

        /// Comment ID
        comment_id: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Show the authenticated user's profile
    Show,
    /// Update profile fields; unset flags are left unchanged
    /// Examples:
    ///     inkpost profile update --bio "Rustacean"
    ///     inkpost profile update --avatar https://cdn.example.com/me.png
    #[command(verbatim_doc_comment)]
    Update {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        bio: Option<String>,

        /// Profile image URL
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Provision an admin account
    /// Examples:
    ///     inkpost admin create --name "Site Admin" -u admin -e admin@example.com -p secret
    #[command(verbatim_doc_comment)]
    Create {
        #[arg(long)]
        name: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        bio: Option<String>,
    },
}

#[derive(Subcommand)]
enum ContextCommand {
    /// Add a named backend endpoint
    /// Examples:
    ///     inkpost context add local --api-url=http://localhost:5000/api
    ///     inkpost context add prod --api-url=https://blog.example.com/api --set-current
    #[command(verbatim_doc_comment)]
    Add {
        /// Context name
        name: String,

        /// Backend API base URL (e.g. http://localhost:5000/api)
        #[arg(long)]
        api_url: String,

        /// Set as current context
        #[arg(long)]
        set_current: bool,
    },
    /// List all configured contexts
    List,
    /// Switch to a different context
    Use {
        /// Context name to switch to
        name: String,
    },
    /// Delete a context
    Delete {
        /// Context name to delete
        name: String,
    },
    /// Show current active context
    Current,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    let api_url = if let Some(url) = cli.api_url {
        url
    } else if let Some((_, ctx)) = config.get_current_context() {
        ctx.api_url.clone()
    } else {
        ApiConfig::from_env().base_url
    };
    tracing::debug!("Using API endpoint: {}", api_url);

    if cli.interactive {
        return run_tui(&api_url).await;
    }

    match cli.command {
        Some(Commands::Context { command }) => {
            handle_context_command(&mut config, command)?;
        }
        Some(Commands::Login { username, password }) => {
            let client = build_client(&api_url)?;
            match client.login(&LoginRequest { username, password }).await {
                Ok(_) => println!("Logged in as {}.", session_label(&client)),
                Err(e) => fail(&format!("Login failed: {}", e)),
            }
        }
        Some(Commands::Register {
            name,
            username,
            email,
            password,
        }) => {
            let client = build_client(&api_url)?;
            let request = RegisterRequest {
                name,
                username: Some(username),
                email,
                password,
            };
            match client.register(&request).await {
                Ok(_) => println!("Account created. Logged in as {}.", session_label(&client)),
                Err(e) => fail(&format!("Registration failed: {}", e)),
            }
        }
        Some(Commands::Logout) => {
            let client = build_client(&api_url)?;
            client.logout();
            println!("Logged out.");
        }
        Some(Commands::Whoami) => {
            let client = build_client(&api_url)?;
            let status = client.session().check_auth_status();
            if status.is_authenticated {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Not logged in.");
            }
        }
        Some(Commands::Blog { command }) => {
            let client = build_client(&api_url)?;
            handle_blog_command(&client, command).await?;
        }
        Some(Commands::Comment { command }) => {
            let client = build_client(&api_url)?;
            match command {
                CommentCommand::Add { blog_id, content } => {
                    print_result(client.add_comment(&blog_id, &content).await, false)?;
                }
                CommentCommand::Delete {
                    blog_id,
                    comment_id,
                } => {
                    print_result(client.delete_comment(&blog_id, &comment_id).await, false)?;
                }
            }
        }
        Some(Commands::Upload { file }) => {
            let client = build_client(&api_url)?;
            print_result(client.upload_image(&file).await, false)?;
        }
        Some(Commands::Profile { command }) => {
            let client = build_client(&api_url)?;
            match command {
                ProfileCommand::Show => {
                    print_result(client.get_profile().await, false)?;
                }
                ProfileCommand::Update {
                    name,
                    email,
                    bio,
                    avatar,
                } => {
                    let update = ProfileUpdate {
                        name,
                        email,
                        bio,
                        profile_picture: avatar,
                    };
                    print_result(client.update_profile(&update).await, false)?;
                }
            }
        }
        Some(Commands::Contact {
            name,
            email,
            message,
        }) => {
            let client = build_client(&api_url)?;
            let request = ContactRequest {
                name,
                email,
                message,
            };
            match client.submit_contact(&request).await {
                Ok(_) => println!("Message sent."),
                Err(e) => fail(&format!("Failed to send message: {}", e)),
            }
        }
        Some(Commands::Admin { command }) => {
            let client = build_client(&api_url)?;
            match command {
                AdminCommand::Create {
                    name,
                    username,
                    email,
                    password,
                    bio,
                } => {
                    let request = AdminCreateRequest {
                        name,
                        email,
                        username: username.clone(),
                        password,
                        bio,
                    };
                    match client.create_admin(&request).await {
                        Ok(body) => {
                            let created = body
                                .get("username")
                                .and_then(|v| v.as_str())
                                .unwrap_or(&username);
                            println!("Admin {} created.", created);
                        }
                        Err(e) => fail(&format!("Failed to create admin: {}", e)),
                    }
                }
            }
        }
        Some(Commands::Health) => {
            let client = build_client(&api_url)?;
            print_result(client.health().await, false)?;
        }
        None => {
            println!("Use --help for usage information or --interactive for the post browser");
        }
    }

    Ok(())
}

fn build_client(api_url: &str) -> Result<ApiClient> {
    let store = FileStore::default_location()?;
    let session = SessionManager::new(Box::new(store));
    let mut client = ApiClient::new(ApiConfig::new(api_url), session);
    client.on_unauthorized(|| {
        eprintln!("Session expired. Run `inkpost login` to sign in again.");
    });
    Ok(client)
}

/// Short name for the signed-in user, for confirmation messages.
fn session_label(client: &ApiClient) -> String {
    client
        .session()
        .current_user()
        .and_then(|u| u.username.or(u.name))
        .unwrap_or_else(|| "unknown".to_string())
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

/// Print the response body, or the error message on stderr with a
/// non-zero exit.
fn print_result(result: Result<Value, ApiError>, json_only: bool) -> Result<()> {
    match result {
        Ok(body) => {
            if json_only {
                println!("{}", serde_json::to_string(&body)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Ok(())
        }
        Err(e) => fail(&e.to_string()),
    }
}

async fn handle_blog_command(client: &ApiClient, command: BlogCommand) -> Result<()> {
    match command {
        BlogCommand::List {
            tag,
            search,
            page,
            limit,
            json,
        } => {
            let query = ListQuery {
                tag,
                search,
                page,
                limit,
            };
            print_result(client.list_blogs(&query).await, json)
        }
        BlogCommand::Get { id, json } => print_result(client.get_blog(&id).await, json),
        BlogCommand::Create {
            title,
            content,
            content_file,
            tags,
            excerpt,
            image,
            image_file,
        } => {
            let payload = build_blog_payload(
                client,
                title,
                content,
                content_file,
                tags,
                excerpt,
                image,
                image_file,
            )
            .await?;
            print_result(client.create_blog(&payload).await, false)
        }
        BlogCommand::Update {
            id,
            title,
            content,
            content_file,
            tags,
            excerpt,
            image,
            image_file,
        } => {
            let payload = build_blog_payload(
                client,
                title,
                content,
                content_file,
                tags,
                excerpt,
                image,
                image_file,
            )
            .await?;
            print_result(client.update_blog(&id, &payload).await, false)
        }
        BlogCommand::Delete { id } => match client.delete_blog(&id).await {
            Ok(_) => {
                println!("Post {} deleted.", id);
                Ok(())
            }
            Err(e) => fail(&format!("Failed to delete post: {}", e)),
        },
        BlogCommand::Mine { page, limit, json } => {
            let query = ListQuery {
                page,
                limit,
                ..Default::default()
            };
            print_result(client.my_blogs(&query).await, json)
        }
        BlogCommand::Like { id } => print_result(client.toggle_like(&id).await, false),
        BlogCommand::Stats => print_result(client.blog_stats().await, false),
    }
}

/// Assemble a post payload from CLI flags. A local cover image is uploaded
/// first and the stored URL threaded into the payload.
#[allow(clippy::too_many_arguments)]
async fn build_blog_payload(
    client: &ApiClient,
    title: String,
    content: Option<String>,
    content_file: Option<PathBuf>,
    tags: Option<String>,
    excerpt: Option<String>,
    image: Option<String>,
    image_file: Option<PathBuf>,
) -> Result<BlogPayload> {
    let content = match (content, content_file) {
        (Some(content), _) => content,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read content file: {}", path.display()))?,
        (None, None) => String::new(),
    };

    let tags = tags
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let image = match image_file {
        Some(path) => {
            let uploaded = client.upload_image(&path).await?;
            let url = uploaded
                .get("imageUrl")
                .or_else(|| uploaded.get("url"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            if url.is_none() {
                anyhow::bail!("Upload succeeded but the response carried no imageUrl");
            }
            url
        }
        None => image,
    };

    Ok(BlogPayload {
        title,
        excerpt,
        content,
        tags,
        image,
    })
}

fn handle_context_command(config: &mut Config, command: ContextCommand) -> Result<()> {
    match command {
        ContextCommand::Add {
            name,
            api_url,
            set_current,
        } => {
            config.contexts.insert(name.clone(), Context { api_url });
            if set_current || config.current_context.is_none() {
                config.current_context = Some(name.clone());
            }
            config.save()?;
            println!("Context '{}' added.", name);
            if config.current_context.as_ref() == Some(&name) {
                println!("Context '{}' is now the current context.", name);
            }
        }
        ContextCommand::List => {
            println!("  {:<20} {:<30}", "NAME", "API URL");
            for (name, ctx) in &config.contexts {
                let current_mark = if config.current_context.as_ref() == Some(name) {
                    "*"
                } else {
                    " "
                };
                println!("{} {:<20} {:<30}", current_mark, name, ctx.api_url);
            }
        }
        ContextCommand::Use { name } => {
            if config.contexts.contains_key(&name) {
                config.current_context = Some(name.clone());
                config.save()?;
                println!("Switched to context '{}'.", name);
            } else {
                eprintln!("Context '{}' not found.", name);
                std::process::exit(1);
            }
        }
        ContextCommand::Delete { name } => {
            if config.contexts.remove(&name).is_some() {
                if config.current_context.as_ref() == Some(&name) {
                    config.current_context = None;
                }
                config.save()?;
                println!("Context '{}' deleted.", name);
            } else {
                eprintln!("Context '{}' not found.", name);
                std::process::exit(1);
            }
        }
        ContextCommand::Current => {
            if let Some((name, ctx)) = config.get_current_context() {
                println!("Current context: {} ({})", name, ctx.api_url);
            } else {
                println!("No current context set.");
            }
        }
    }
    Ok(())
}

async fn run_tui(api_url: &str) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(api_url)?;
    let res = run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

struct App {
    posts: Vec<String>,
    state: ListState,
    client: ApiClient,
}

impl App {
    fn new(api_url: &str) -> Result<App> {
        Ok(App {
            posts: Vec::new(),
            state: ListState::default(),
            client: build_client(api_url)?,
        })
    }

    async fn update_posts(&mut self) -> Result<()> {
        let body = self
            .client
            .list_blogs(&ListQuery {
                limit: Some(50),
                ..Default::default()
            })
            .await?;
        self.posts = post_lines(&body);
        Ok(())
    }

    fn next(&mut self) {
        if self.posts.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= self.posts.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn previous(&mut self) {
        if self.posts.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    self.posts.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }
}

/// One display line per post from a listing response.
fn post_lines(body: &Value) -> Vec<String> {
    body.get("blogs")
        .and_then(|v| v.as_array())
        .map(|posts| {
            posts
                .iter()
                .map(|post| {
                    let title = post
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or("(untitled)");
                    match post
                        .get("author")
                        .and_then(|a| a.get("name"))
                        .and_then(|v| v.as_str())
                    {
                        Some(author) => format!("{} ({})", title, author),
                        None => title.to_string(),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    app.update_posts().await.ok();
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    KeyCode::Char('r') => {
                        app.update_posts().await.ok();
                    }
                    _ => {}
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.size());

    let header = Paragraph::new("Inkpost - Latest Posts")
        .block(Block::default().borders(Borders::ALL).title("Info"));
    f.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = app.posts.iter().map(|p| ListItem::new(p.as_str())).collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Posts"))
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, chunks[1], &mut app.state);

    let footer = Paragraph::new("q: Quit | r: Refresh | ↑/↓: Navigate")
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(footer, chunks[2]);
}
