//! Login initiator - builds the provider authorization URL and sends the user there

use url::Url;
use crate::Result;
use crate::error::Error;
use super::provider::{Provider, ProviderRegistry};

/// Length of the generated `state` nonce
const STATE_LENGTH: usize = 32;

/// Something that can take the user to a URL
pub trait Navigator {
    fn navigate(&self, url: &Url) -> Result<()>;
}

/// Opens the URL in the system browser
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &Url) -> Result<()> {
        open::that(url.as_str())
            .map_err(|e| Error::Other(format!("Failed to open browser: {}", e)))
    }
}

/// A login that has been sent to the provider and awaits its callback
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub provider: Provider,
    pub state: String,
    pub url: Url,
}

/// Starts OAuth2 sign-in for a registered provider
pub struct LoginInitiator<N = BrowserNavigator> {
    registry: ProviderRegistry,
    navigator: N,
}

impl LoginInitiator<BrowserNavigator> {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self::with_navigator(registry, BrowserNavigator)
    }
}

impl<N: Navigator> LoginInitiator<N> {
    pub fn with_navigator(registry: ProviderRegistry, navigator: N) -> Self {
        Self { registry, navigator }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build the authorization URL for `provider`.
    ///
    /// Fails with `MisconfiguredProvider` when no client ID is set.
    pub fn authorization_url(&self, provider: Provider, state: Option<&str>) -> Result<Url> {
        let config = self.registry.get(provider);
        if !config.is_configured() {
            return Err(Error::MisconfiguredProvider(provider));
        }

        let mut url = Url::parse(&config.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &config.client_id)
                .append_pair("redirect_uri", &config.redirect_uri)
                .append_pair("scope", &config.scope)
                .append_pair("response_type", config.response_mode.response_type());

            // Google only: keep scopes the user granted earlier
            if provider == Provider::Google {
                query.append_pair("include_granted_scopes", "true");
            }

            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }

        Ok(url)
    }

    /// Build the URL and navigate to it.
    ///
    /// No navigation happens when the provider is misconfigured. A navigator
    /// failure is not fatal: the URL is still returned so it can be opened by hand.
    pub fn initiate(&self, provider: Provider) -> Result<PendingLogin> {
        let state = generate_state();
        let url = self.authorization_url(provider, Some(&state))?;

        tracing::info!("Redirecting to {} for sign-in", provider.display_name());
        if let Err(e) = self.navigator.navigate(&url) {
            tracing::warn!("{}", e);
        }

        Ok(PendingLogin { provider, state, url })
    }
}

/// Generate a random state string for CSRF protection
fn generate_state() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..STATE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}
