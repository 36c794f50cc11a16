use std::sync::Arc;

mod navigator;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use examhub_core::config::{ApiConfig, ConfigLocator};
use examhub_core::http::{ApiOrigin, Method, RequestDescriptor};
use examhub_core::services::{ProfileUpdate, RegisterRequest};
use examhub_core::session::{Role, UserRecord};
use examhub_core::storage::FileKeyValueStore;
use examhub_core::{ApiClient, SessionContext, SessionStore, LOGIN_LOCATION};
use tokio::task;
use tracing_subscriber::EnvFilter;

use navigator::TerminalNavigator;

#[derive(Parser, Debug)]
#[command(author, version, about = "ExamHub terminal client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in, sign out, and manage credentials
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Current user profile
    #[command(subcommand)]
    User(UserCommand),
    /// Send a raw authenticated request to the primary or analytics API
    Api(ApiArgs),
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Create a new account
    Register(RegisterArgs),
    /// Sign out and forget stored tokens
    Logout,
    /// Change the password of the signed-in user
    ChangePassword(ChangePasswordArgs),
    /// Request a password reset email
    ForgotPassword(ForgotPasswordArgs),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Show the signed-in user
    Me(MeArgs),
    /// Update first and/or last name
    Update(UpdateArgs),
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// Account email
    #[arg(long)]
    email: String,
    /// Password (prompted when omitted)
    #[arg(long, env = "EXAMHUB_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    email: String,
    /// Password (prompted when omitted)
    #[arg(long, env = "EXAMHUB_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long = "first-name")]
    first_name: String,
    #[arg(long = "last-name")]
    last_name: String,
    #[arg(long, value_enum, default_value_t = RoleArg::Student)]
    role: RoleArg,
}

#[derive(Args, Debug)]
struct ChangePasswordArgs {
    /// Current password (prompted when omitted)
    #[arg(long)]
    current: Option<String>,
    /// New password (prompted when omitted)
    #[arg(long = "new")]
    new_password: Option<String>,
}

#[derive(Args, Debug)]
struct ForgotPasswordArgs {
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct MeArgs {
    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    #[arg(long = "first-name")]
    first_name: Option<String>,
    #[arg(long = "last-name")]
    last_name: Option<String>,
}

#[derive(Args, Debug)]
struct ApiArgs {
    /// HTTP method
    #[arg(value_enum)]
    method: MethodArg,
    /// Path relative to the API base URL (e.g. /exams)
    path: String,
    /// Target the analytics API instead of the primary API
    #[arg(long)]
    analytics: bool,
    /// JSON request body
    #[arg(long)]
    body: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RoleArg {
    Student,
    Educator,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Student => Role::Student,
            RoleArg::Educator => Role::Educator,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MethodArg {
    Get,
    Post,
    Patch,
    Delete,
}

impl From<MethodArg> for Method {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Get => Method::GET,
            MethodArg::Post => Method::POST,
            MethodArg::Patch => Method::PATCH,
            MethodArg::Delete => Method::DELETE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Auth(cmd) => match cmd {
            AuthCommand::Login(args) => auth_login(args).await?,
            AuthCommand::Register(args) => auth_register(args).await?,
            AuthCommand::Logout => auth_logout().await?,
            AuthCommand::ChangePassword(args) => auth_change_password(args).await?,
            AuthCommand::ForgotPassword(args) => auth_forgot_password(args).await?,
        },
        Commands::User(cmd) => match cmd {
            UserCommand::Me(args) => user_me(args).await?,
            UserCommand::Update(args) => user_update(args).await?,
        },
        Commands::Api(args) => api_request(args).await?,
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Wire the file-backed context for a command running at `location`.
fn open_session(location: &str) -> Result<SessionStore> {
    let locator = ConfigLocator::new().context("unable to locate configuration directory")?;
    let storage = Arc::new(FileKeyValueStore::from_locator(&locator));
    let navigator = Arc::new(TerminalNavigator::at(location));
    let context = SessionContext::new(storage, navigator);
    let config = ApiConfig::from_env().context("invalid API configuration")?;
    let client = ApiClient::new(config, context).context("failed to build HTTP client")?;
    Ok(SessionStore::new(client))
}

/// Restore the stored session and confirm it with the backend.
async fn signed_in_session(location: &str) -> Result<SessionStore> {
    let store = open_session(location)?;
    if !store.verify().await {
        bail!("not signed in; run `examhub auth login` first");
    }
    Ok(store)
}

fn session_error(store: &SessionStore, fallback: &str) -> anyhow::Error {
    let message = store.session().error.unwrap_or_else(|| fallback.to_owned());
    anyhow!(message)
}

async fn auth_login(args: LoginArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password: ").await?,
    };
    let store = open_session(LOGIN_LOCATION)?;
    if !store.login(&args.email, &password).await {
        return Err(session_error(&store, "login failed"));
    }
    if let Some(user) = store.user() {
        println!("Logged in as {} ({}).", describe(&user), user.role);
    }
    Ok(())
}

async fn auth_register(args: RegisterArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt("Choose a password: ").await?,
    };
    let store = open_session("/register")?;
    let request = RegisterRequest {
        email: args.email,
        password,
        first_name: args.first_name,
        last_name: args.last_name,
        role: args.role.into(),
    };
    if !store.register(&request).await {
        return Err(session_error(&store, "registration failed"));
    }
    match store.user() {
        Some(user) => println!("Account created. Logged in as {}.", describe(&user)),
        None => println!("Account created. Run `examhub auth login` to sign in."),
    }
    Ok(())
}

async fn auth_logout() -> Result<()> {
    let store = open_session("/logout")?;
    store.logout().await;
    println!("Signed out. Stored tokens removed.");
    Ok(())
}

async fn auth_change_password(args: ChangePasswordArgs) -> Result<()> {
    let store = signed_in_session("/settings/password").await?;
    let current = match args.current {
        Some(current) => current,
        None => prompt("Current password: ").await?,
    };
    let new_password = match args.new_password {
        Some(new_password) => new_password,
        None => prompt("New password: ").await?,
    };
    if !store.change_password(&current, &new_password).await {
        bail!("password change failed");
    }
    println!("Password updated.");
    Ok(())
}

async fn auth_forgot_password(args: ForgotPasswordArgs) -> Result<()> {
    let store = open_session("/forgot-password")?;
    if !store.forgot_password(&args.email).await {
        return Err(session_error(&store, "failed to request password reset"));
    }
    println!("If {} has an account, a reset link is on its way.", args.email);
    Ok(())
}

async fn user_me(args: MeArgs) -> Result<()> {
    let store = signed_in_session("/profile").await?;
    let user = store
        .user()
        .ok_or_else(|| anyhow!("session has no user loaded"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        render_user(&user);
    }
    Ok(())
}

async fn user_update(args: UpdateArgs) -> Result<()> {
    let update = ProfileUpdate {
        first_name: args.first_name,
        last_name: args.last_name,
    };
    if update.is_empty() {
        bail!("nothing to update; pass --first-name and/or --last-name");
    }
    let store = signed_in_session("/profile").await?;
    if !store.update_profile(&update).await {
        bail!("profile update failed");
    }
    if let Some(user) = store.user() {
        println!("Profile updated: {}", describe(&user));
    }
    Ok(())
}

async fn api_request(args: ApiArgs) -> Result<()> {
    let store = open_session("/api")?;
    let origin = if args.analytics {
        ApiOrigin::Analytics
    } else {
        ApiOrigin::Primary
    };
    let mut request = RequestDescriptor::new(args.method.into(), origin, args.path);
    if let Some(body) = args.body {
        let body = serde_json::from_str(&body).context("--body must be valid JSON")?;
        request = request.with_body(body);
    }

    let response = store
        .client()
        .send(request)
        .await
        .context("request failed")?;
    println!("{}", serde_json::to_string_pretty(response.body())?);
    Ok(())
}

fn describe(user: &UserRecord) -> String {
    let name = user.full_name();
    if name.is_empty() {
        user.email.clone()
    } else {
        format!("{name} <{}>", user.email)
    }
}

fn render_user(user: &UserRecord) {
    println!("{}", describe(user));
    println!("  id:          {}", user.id);
    println!("  role:        {}", user.role);
    println!("  active:      {}", if user.is_active { "yes" } else { "no" });
    if let Some(institution) = &user.institution_id {
        println!("  institution: {institution}");
    }
    if let Some(department) = &user.department_id {
        println!("  department:  {department}");
    }
    if let Some(created) = user.created_at {
        println!("  joined:      {}", created.format("%Y-%m-%d"));
    }
    if let Some(avatar) = &user.avatar_url {
        println!("  avatar:      {avatar}");
    }
}

async fn prompt(label: &'static str) -> Result<String> {
    task::spawn_blocking(move || {
        use std::io::{self, Write};
        print!("{label}");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok::<_, io::Error>(input.trim_end_matches(['\r', '\n']).to_owned())
    })
    .await
    .context("input task panicked")?
    .context("failed to read from stdin")
}
