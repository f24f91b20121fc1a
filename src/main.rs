//! Taskboard CLI entry point

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use anyhow::Result;
use url::Url;

use taskboard::auth::{
    wait_for_callback, ApiClient, FileTokenStorage, LoginInitiator, Navigator, Provider,
    ProviderRegistry, SessionState, SessionStore, SignInFlow, FAILURE_REDIRECT_DELAY,
};
use taskboard::config::Config;
use taskboard::ui;

type Store = SessionStore<ApiClient, FileTokenStorage>;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Taskboard - sign in to your project board from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the backend URL and OAuth client IDs
    Onboard,

    /// Sign in with Google or GitHub
    Login {
        /// Identity provider: google or github
        provider: Provider,

        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Finish a sign-in from a redirect URL copied out of the browser
    Callback {
        /// Identity provider: google or github
        provider: Provider,

        /// Full redirect URL, including any #fragment
        url: String,
    },

    /// Sign in with email and password
    Signin {
        #[arg(short, long)]
        email: String,
    },

    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,
    },

    /// Get a fresh access token
    Refresh,

    /// Sign out and remove stored tokens
    Logout,

    /// Show who is signed in
    Status,
}

/// Leaves navigation to the user; the URL is printed either way
struct PrintOnly;

impl Navigator for PrintOnly {
    fn navigate(&self, _url: &Url) -> taskboard::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            taskboard::config::onboard()?;
        }

        Commands::Login { provider, no_browser } => {
            let config = taskboard::config::load()?;
            let store = open_store(&config).await?;
            let registry = ProviderRegistry::from_config(&config);

            if no_browser {
                run_login(&config, &store, &LoginInitiator::with_navigator(registry, PrintOnly), provider).await?;
            } else {
                run_login(&config, &store, &LoginInitiator::new(registry), provider).await?;
            }
        }

        Commands::Callback { provider, url } => {
            let config = taskboard::config::load()?;
            let store = open_store(&config).await?;
            let mut flow = SignInFlow::new(&store);
            finish_sign_in(&mut flow, provider, &url).await?;
        }

        Commands::Signin { email } => {
            let config = taskboard::config::load()?;
            let store = open_store(&config).await?;
            let password = prompt_password("Password:")?;

            let spinner = ui::spinner("Signing in...");
            let result = store.password_login(&email, &password).await;
            spinner.finish_and_clear();

            let session = result?;
            ui::print_success(&format!("Signed in as {}", session.user.display_name()));
        }

        Commands::Register { username, email } => {
            let config = taskboard::config::load()?;
            let store = open_store(&config).await?;
            let password = prompt_password("Choose a password:")?;

            let spinner = ui::spinner("Creating account...");
            let result = store.register(&username, &email, &password).await;
            spinner.finish_and_clear();

            let session = result?;
            ui::print_success(&format!("Welcome, {}!", session.user.display_name()));
        }

        Commands::Refresh => {
            let config = taskboard::config::load()?;
            let store = open_store(&config).await?;
            store.refresh_access().await?;
            ui::print_success("Access token refreshed");
        }

        Commands::Logout => {
            let config = taskboard::config::load()?;
            let store = Store::new(ApiClient::new(&config.api_base_url), FileTokenStorage::default());
            store.logout()?;
            ui::print_success("Logged out successfully");
        }

        Commands::Status => {
            let config = taskboard::config::load()?;
            let registry = ProviderRegistry::from_config(&config);

            ui::print_header("Status");
            println!("API: {}", config.api_base_url);
            for provider in Provider::ALL {
                let configured = registry.get(provider).is_configured();
                println!("{} OAuth: {}", provider.display_name(), if configured { "✓" } else { "not configured" });
            }

            let store = open_store(&config).await?;
            match store.state() {
                SessionState::Authenticated(session) => {
                    println!("Signed in as: {} <{}>", session.user.display_name(), session.user.email);
                }
                SessionState::Anonymous => println!("Signed in as: nobody (run 'taskboard login <provider>')"),
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Store> {
    let store = Store::open(ApiClient::new(&config.api_base_url), FileTokenStorage::default()).await?;
    Ok(store)
}

async fn run_login<N: Navigator>(
    config: &Config,
    store: &Store,
    initiator: &LoginInitiator<N>,
    provider: Provider,
) -> Result<()> {
    let mut flow = SignInFlow::new(store);

    let pending = match flow.start(initiator, provider) {
        Ok(pending) => pending,
        Err(e) => {
            ui::print_error(&e.user_message());
            return Err(e.into());
        }
    };

    println!("\n🔐 Sign in with {} in your browser.\n", provider.display_name());
    println!("If the browser doesn't open, visit this URL:\n{}\n", pending.url);

    let spinner = ui::spinner("Waiting for authorization...");
    let redirect = wait_for_callback(&config.app_origin, provider).await;
    spinner.finish_and_clear();

    finish_sign_in(&mut flow, provider, &redirect?).await
}

async fn finish_sign_in(flow: &mut SignInFlow<'_, ApiClient, FileTokenStorage>, provider: Provider, redirect: &str) -> Result<()> {
    let spinner = ui::spinner(&format!("Authenticating with {}...", provider.display_name()));
    let result = flow.complete(provider, redirect).await;
    spinner.finish_and_clear();

    match result {
        Ok(user) => {
            ui::print_success(&format!("Signed in as {}", user.display_name()));
            Ok(())
        }
        Err(e) => {
            ui::print_error(&e.user_message());
            ui::print_step("Redirecting to login...");
            tokio::time::sleep(FAILURE_REDIRECT_DELAY).await;

            flow.reset_after_failure();
            println!("\nSign in again with one of:");
            for p in Provider::ALL {
                println!("  taskboard login {}", p);
            }
            println!("  taskboard signin --email <email>");
            Err(e.into())
        }
    }
}

fn prompt_password(message: &str) -> Result<String> {
    let password = inquire::Password::new(message)
        .without_confirmation()
        .prompt()?;
    Ok(password)
}
