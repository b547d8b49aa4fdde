//! Client authentication handshake.
//!
//! The exchange is fixed:
//!
//! ```text
//! client: hello[:<version>]
//! server: whoareyou[:<server version>]
//! client: <client name>
//! server: okpassword
//! client: <password>
//! server: ok
//! ```
//!
//! Every failure is logged with its cause and reported to the caller as
//! the same [`AuthFailed`], so nothing about the reason leaks to the peer.

pub mod password;

use crate::clientconf::{ClientConfig, ClientConfigStore};
use crate::proto::{Command, Message, MessageChannel};
use crate::utils::{AuthError, AuthFailed};
use crate::version;

/// Result of a successful handshake.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub client: String,
    pub version: Option<String>,
    pub config: ClientConfig,
}

impl AuthOutcome {
    /// The identity used for authorisation decisions.
    pub fn trust_name(&self) -> &str {
        self.config.trust_name.as_deref().unwrap_or(&self.client)
    }
}

/// Run the handshake on `channel`, loading the client's settings from
/// `store`.
pub async fn authenticate<C, S>(
    channel: &mut C,
    store: &S,
    server_version: &str,
) -> Result<AuthOutcome, AuthFailed>
where
    C: MessageChannel,
    S: ClientConfigStore + ?Sized,
{
    match handshake(channel, store, server_version).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::warn!("Authentication failed: {}", e);
            Err(AuthFailed)
        }
    }
}

async fn handshake<C, S>(
    channel: &mut C,
    store: &S,
    server_version: &str,
) -> Result<AuthOutcome, AuthError>
where
    C: MessageChannel,
    S: ClientConfigStore + ?Sized,
{
    let hello = channel.recv().await.map_err(|source| AuthError::Channel {
        step: "unable to read initial message",
        source,
    })?;
    let client_version = parse_hello(hello)?;

    let mut whoareyou = "whoareyou".to_string();
    if let Some(v) = &client_version {
        // Older clients cannot parse a suffixed reply.
        if version::wants_server_version(v)? {
            whoareyou = format!("whoareyou:{server_version}");
        }
    }
    channel
        .send_str(&whoareyou)
        .await
        .map_err(|source| AuthError::Channel {
            step: "unable to send whoareyou",
            source,
        })?;

    let client = channel
        .recv()
        .await
        .map_err(|source| AuthError::Channel {
            step: "unable to get client name",
            source,
        })?
        .into_text();

    channel
        .send_str("okpassword")
        .await
        .map_err(|source| AuthError::Channel {
            step: "unable to ask for password",
            source,
        })?;

    let password = channel
        .recv()
        .await
        .map_err(|source| AuthError::Channel {
            step: "unable to get password",
            source,
        })?
        .into_text();

    let mut config = store.load(&client).await.map_err(|source| AuthError::ConfigLoad {
        client: client.clone(),
        source,
    })?;
    check_client_and_password(&client, &password, &mut config)?;

    if config.version_warn {
        version_warn(&client, client_version.as_deref(), server_version);
    }

    tracing::info!(
        "auth ok for: {}{}",
        client,
        if config.password_check {
            ""
        } else {
            " (no password needed)"
        }
    );

    channel
        .send_str("ok")
        .await
        .map_err(|source| AuthError::Channel {
            step: "unable to confirm authentication",
            source,
        })?;

    Ok(AuthOutcome {
        client,
        version: client_version,
        config,
    })
}

/// Accepts `hello` or `hello:<version>` as generic text and returns the
/// version, if any.
fn parse_hello(msg: Message) -> Result<Option<String>, AuthError> {
    if msg.cmd != Command::Gen {
        return Err(AuthError::ProtocolViolation(format!(
            "expected generic hello, got command {:?}",
            msg.cmd.as_char()
        )));
    }
    let text = msg.into_text();
    if text == "hello" {
        return Ok(None);
    }
    match text.strip_prefix("hello:") {
        Some(v) => Ok(Some(v.to_string())),
        None => Err(AuthError::ProtocolViolation(format!(
            "unexpected initial message {text:?}"
        ))),
    }
}

fn check_client_and_password(
    client: &str,
    password: &str,
    config: &mut ClientConfig,
) -> Result<(), AuthError> {
    if config.trust_name.is_none() {
        tracing::info!("trust name unset");
        if client.is_empty() {
            return Err(AuthError::NoTrustName);
        }
        tracing::info!("Falling back to using '{}'", client);
        config.trust_name = Some(client.to_string());
    }

    if config.password_check {
        let rejected = || AuthError::Rejected(format!("password rejected for client {client}"));

        if config.password.is_none() && config.passwd.is_none() {
            return Err(rejected());
        }
        if let Some(plain) = &config.password {
            if !password::check_plain(plain, password) {
                return Err(rejected());
            }
        }
        if let Some(hash) = &config.passwd {
            if !password::check_crypt(hash, password) {
                return Err(rejected());
            }
        }
    }

    if config.retention() == 0 {
        return Err(AuthError::Rejected(format!(
            "{client}: you cannot set the keep value for a client to 0!"
        )));
    }
    Ok(())
}

fn version_warn(client: &str, client_version: Option<&str>, server_version: &str) {
    match client_version {
        None | Some("") => tracing::warn!(
            "Client '{}' has an unknown version. Please upgrade.",
            client
        ),
        Some(v) if v != server_version => tracing::warn!(
            "Client '{}' version '{}' does not match server version '{}'. An upgrade is recommended.",
            client,
            v,
            server_version
        ),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientDefaults;
    use crate::manifest::Protocol;
    use crate::proto::channel::testing::ScriptedChannel;
    use crate::utils::{ChannelError, ConfigError};
    use std::collections::HashMap;

    const SERVER: &str = "3.1.0";

    #[derive(Default)]
    struct MemoryStore(HashMap<String, ClientConfig>);

    impl MemoryStore {
        fn with(client: &str, config: ClientConfig) -> Self {
            let mut map = HashMap::new();
            map.insert(client.to_string(), config);
            Self(map)
        }
    }

    impl ClientConfigStore for MemoryStore {
        async fn load(&self, client: &str) -> Result<ClientConfig, ConfigError> {
            self.0
                .get(client)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownClient(client.to_string()))
        }
    }

    fn client_config() -> ClientConfig {
        let mut config = ClientConfig::from_defaults(&ClientDefaults::default(), Protocol::V1);
        config.password = Some("secret".to_string());
        config.keep = vec![7];
        config
    }

    async fn run(
        texts: &[&str],
        store: &MemoryStore,
    ) -> (Result<AuthOutcome, AuthFailed>, Vec<String>) {
        let mut channel = ScriptedChannel::with_texts(texts);
        let result = authenticate(&mut channel, store, SERVER).await;
        (result, channel.sent_texts())
    }

    #[tokio::test]
    async fn test_successful_handshake() {
        let store = MemoryStore::with("laptop", client_config());
        let (result, sent) = run(&["hello:3.1.0", "laptop", "secret"], &store).await;

        let outcome = result.unwrap();
        assert_eq!(outcome.client, "laptop");
        assert_eq!(outcome.version.as_deref(), Some("3.1.0"));
        assert_eq!(outcome.trust_name(), "laptop");
        assert_eq!(sent, vec!["whoareyou:3.1.0", "okpassword", "ok"]);
    }

    #[tokio::test]
    async fn test_whoareyou_without_client_version() {
        let store = MemoryStore::with("laptop", client_config());
        let (result, sent) = run(&["hello", "laptop", "secret"], &store).await;
        assert!(result.is_ok());
        assert_eq!(sent[0], "whoareyou");
        assert_eq!(result.unwrap().version, None);
    }

    #[tokio::test]
    async fn test_whoareyou_respects_threshold() {
        let store = MemoryStore::with("laptop", client_config());

        let (_, sent) = run(&["hello:1.4.0", "laptop", "secret"], &store).await;
        assert_eq!(sent[0], format!("whoareyou:{SERVER}"));

        let (_, sent) = run(&["hello:1.0.0", "laptop", "secret"], &store).await;
        assert_eq!(sent[0], "whoareyou");

        let (_, sent) = run(&["hello:1.10.0", "laptop", "secret"], &store).await;
        assert_eq!(sent[0], format!("whoareyou:{SERVER}"));
    }

    #[tokio::test]
    async fn test_unparsable_version_fails_before_reply() {
        let store = MemoryStore::with("laptop", client_config());
        for hello in ["hello:1.x.0", "hello:"] {
            let (result, sent) = run(&[hello, "laptop", "secret"], &store).await;
            assert_eq!(result.unwrap_err(), AuthFailed);
            assert!(sent.is_empty());
        }
    }

    #[tokio::test]
    async fn test_bad_hello() {
        let store = MemoryStore::with("laptop", client_config());
        for hello in ["goodbye", "hellohello", "HELLO", ""] {
            let (result, sent) = run(&[hello, "laptop", "secret"], &store).await;
            assert!(result.is_err(), "{hello:?} should be rejected");
            assert!(sent.is_empty());
        }

        let mut channel = ScriptedChannel::default();
        channel.push(Message::new(Command::File, "hello"));
        assert!(authenticate(&mut channel, &store, SERVER).await.is_err());
    }

    #[tokio::test]
    async fn test_channel_failure_mid_handshake() {
        let store = MemoryStore::with("laptop", client_config());

        let (result, sent) = run(&["hello"], &store).await;
        assert!(result.is_err());
        assert_eq!(sent, vec!["whoareyou"]);

        let mut channel = ScriptedChannel::with_texts(&["hello", "laptop"]);
        channel.incoming.push_back(Err(ChannelError::Timeout(60)));
        assert!(authenticate(&mut channel, &store, SERVER).await.is_err());
        assert_eq!(channel.sent_texts(), vec!["whoareyou", "okpassword"]);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let store = MemoryStore::with("laptop", client_config());
        let (result, sent) = run(&["hello", "laptop", "wrong"], &store).await;
        assert!(result.is_err());
        assert!(!sent.contains(&"ok".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let store = MemoryStore::default();
        let (result, _) = run(&["hello", "stranger", "secret"], &store).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_retention_rejected_even_with_correct_password() {
        let mut config = client_config();
        config.keep = vec![0];
        let store = MemoryStore::with("laptop", config);
        let (result, sent) = run(&["hello", "laptop", "secret"], &store).await;
        assert!(result.is_err());
        assert_eq!(sent, vec!["whoareyou", "okpassword"]);

        let mut config = client_config();
        config.keep = Vec::new();
        let store = MemoryStore::with("laptop", config);
        assert!(run(&["hello", "laptop", "secret"], &store).await.0.is_err());
    }

    #[tokio::test]
    async fn test_no_password_check_and_no_trust_name() {
        let mut config = client_config();
        config.password_check = false;
        config.password = None;
        let store = MemoryStore::with("kiosk", config);

        let (result, sent) = run(&["hello", "kiosk", ""], &store).await;
        let outcome = result.unwrap();
        assert_eq!(outcome.config.trust_name.as_deref(), Some("kiosk"));
        assert_eq!(sent.last().map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn test_configured_trust_name_is_kept() {
        let mut config = client_config();
        config.trust_name = Some("laptop.example".to_string());
        let store = MemoryStore::with("laptop", config);
        let outcome = run(&["hello", "laptop", "secret"], &store).await.0.unwrap();
        assert_eq!(outcome.trust_name(), "laptop.example");
    }

    #[tokio::test]
    async fn test_missing_secrets_rejected_when_checking() {
        let mut config = client_config();
        config.password = None;
        let store = MemoryStore::with("laptop", config);
        assert!(run(&["hello", "laptop", ""], &store).await.0.is_err());
    }

    #[tokio::test]
    async fn test_hashed_password() {
        let mut config = client_config();
        config.password = None;
        config.passwd = Some(pwhash::unix_crypt::hash_with("xy", "secret").unwrap());
        let store = MemoryStore::with("laptop", config);

        assert!(run(&["hello", "laptop", "secret"], &store).await.0.is_ok());
        assert!(run(&["hello", "laptop", "secreT"], &store).await.0.is_err());
    }

    #[tokio::test]
    async fn test_malformed_hash_fails_cleanly() {
        let mut config = client_config();
        config.password = None;
        config.passwd = Some("xy12345".to_string());
        let store = MemoryStore::with("laptop", config);
        assert!(run(&["hello", "laptop", "secret"], &store).await.0.is_err());
    }

    #[tokio::test]
    async fn test_plain_and_hash_are_independent_checks() {
        let mut config = client_config();
        config.passwd = Some(pwhash::unix_crypt::hash_with("xy", "other").unwrap());
        let store = MemoryStore::with("laptop", config);

        // plain matches but the hash does not
        assert!(run(&["hello", "laptop", "secret"], &store).await.0.is_err());
        // hash matches but the plain password does not
        assert!(run(&["hello", "laptop", "other"], &store).await.0.is_err());
    }

    #[tokio::test]
    async fn test_version_warning_is_not_fatal() {
        let store = MemoryStore::with("laptop", client_config());
        assert!(run(&["hello:2.0.0", "laptop", "secret"], &store).await.0.is_ok());
        assert!(run(&["hello", "laptop", "secret"], &store).await.0.is_ok());
    }
}
