//! db-passwords - resolve database passwords from the secret store
//!
//! Reads the host attributes file, picks the vault or encrypted data bag
//! backend it names, and prints the requested password on stdout. Logs go to
//! stderr so the output can be captured by provisioning scripts.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

use passwords_core::{
    BackendMode, CredentialResolver, DataBagSecret, EncryptedFileStore, FileSecretClient,
    HttpVaultClient, HttpVaultConfig, ItemPurpose, ResolverConfig, SecretItem,
};

/// Database password resolution for host automation
#[derive(Parser)]
#[command(name = "db-passwords")]
#[command(version)]
#[command(about = "Resolve database passwords from vault or encrypted data bags")]
struct Args {
    /// Host attributes file (JSON); built-in defaults when omitted
    #[arg(long, env = "PASSWORDS_ATTRIBUTES")]
    attributes: Option<PathBuf>,

    /// Directory holding one sub-directory per container
    #[arg(long, env = "PASSWORDS_DATA_BAG_DIR", default_value = "/etc/chef/data_bags")]
    data_bag_dir: PathBuf,

    /// Vault address, required when the attributes select the vault
    #[arg(long, env = "VAULT_ADDR")]
    vault_addr: Option<Url>,

    /// Vault token
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    vault_token: Option<String>,

    /// Vault enterprise namespace
    #[arg(long, env = "VAULT_NAMESPACE")]
    vault_namespace: Option<String>,

    /// KV engine mount point
    #[arg(long, default_value = passwords_core::store::DEFAULT_MOUNT)]
    vault_mount: String,

    /// Vault request timeout in seconds
    #[arg(long, default_value = "30")]
    vault_timeout_secs: u64,

    /// Only log warnings and errors
    #[arg(long, short)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("attributes", &self.attributes)
            .field("data_bag_dir", &self.data_bag_dir)
            .field("vault_addr", &self.vault_addr.as_ref().map(Url::as_str))
            .field("vault_token", &self.vault_token.as_ref().map(|_| "[REDACTED]"))
            .field("vault_namespace", &self.vault_namespace)
            .field("vault_mount", &self.vault_mount)
            .field("vault_timeout_secs", &self.vault_timeout_secs)
            .field("quiet", &self.quiet)
            .field("command", &self.command)
            .finish()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one of the well-known passwords
    Get {
        #[arg(value_enum)]
        password: PasswordKind,
    },
    /// Resolve an arbitrary key, with an optional default
    Resolve {
        /// Item identifier
        #[arg(long, conflicts_with = "purpose")]
        item: Option<String>,

        /// Item selected by purpose (defaults to mysql)
        #[arg(long, value_enum)]
        purpose: Option<Purpose>,

        /// Key within the item
        #[arg(long)]
        key: String,

        /// Value printed when the store cannot supply one
        #[arg(long)]
        default: Option<String>,
    },
    /// Encrypt key=value pairs into an item file
    Seal {
        /// Container name (defaults to the configured one)
        #[arg(long)]
        container: Option<String>,

        /// Item identifier
        #[arg(long)]
        item: String,

        /// Shared secret file used to encrypt the values
        #[arg(long)]
        secret_file: PathBuf,

        /// Values as key=value
        #[arg(required = true)]
        values: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PasswordKind {
    Root,
    OldPasswords,
    Replication,
    Backup,
    Debian,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Purpose {
    Mysql,
    System,
}

impl From<Purpose> for ItemPurpose {
    fn from(purpose: Purpose) -> Self {
        match purpose {
            Purpose::Mysql => ItemPurpose::Mysql,
            Purpose::System => ItemPurpose::System,
        }
    }
}

/// Vault connection settings from the parsed flags
fn vault_config(args: &Args) -> Result<HttpVaultConfig, Box<dyn std::error::Error>> {
    let address = args
        .vault_addr
        .clone()
        .ok_or("vault mode selected but no --vault-addr / VAULT_ADDR given")?;
    let token = args
        .vault_token
        .clone()
        .ok_or("vault mode selected but no --vault-token / VAULT_TOKEN given")?;

    let mut config = HttpVaultConfig::new(address, token)
        .with_mount(args.vault_mount.clone())
        .with_timeout(Duration::from_secs(args.vault_timeout_secs));
    if let Some(namespace) = &args.vault_namespace {
        config = config.with_namespace(namespace.clone());
    }
    Ok(config)
}

/// Build the resolver for the backend the attributes select
fn build_resolver(
    args: &Args,
    config: ResolverConfig,
) -> Result<CredentialResolver, Box<dyn std::error::Error>> {
    match config.backend_mode {
        BackendMode::Vault => {
            let settings = vault_config(args)?;
            info!("Reading items from vault at {}", settings.address);
            Ok(CredentialResolver::with_vault(
                config,
                Arc::new(HttpVaultClient::new(settings)?),
            ))
        }
        BackendMode::FileSecret => {
            info!("Reading encrypted items from {:?}", args.data_bag_dir);
            Ok(CredentialResolver::with_file_secrets(
                config,
                Arc::new(EncryptedFileStore::new(args.data_bag_dir.clone())),
            ))
        }
    }
}

/// Parse `key=value` arguments into an item
fn parse_values(values: &[String]) -> Result<SecretItem, Box<dyn std::error::Error>> {
    let mut item = SecretItem::new();
    for pair in values {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
        if key.is_empty() {
            return Err(format!("empty key in '{}'", pair).into());
        }
        item.insert(key, value);
    }
    Ok(item)
}

fn print_resolved(value: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    match value {
        Some(password) => {
            println!("{}", password);
            Ok(())
        }
        None => Err("no value in the store and no default configured".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let config = match &args.attributes {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };

    match &args.command {
        Command::Get { password } => {
            let resolver = build_resolver(&args, config)?;
            let value = match password {
                PasswordKind::Root => resolver.root_password().await?,
                PasswordKind::OldPasswords => resolver.old_passwords().await?,
                PasswordKind::Replication => resolver.replication_password().await?,
                PasswordKind::Backup => resolver.backup_password().await?,
                PasswordKind::Debian => resolver.debian_password(),
            };
            print_resolved(value)
        }
        Command::Resolve {
            item,
            purpose,
            key,
            default,
        } => {
            let resolver = build_resolver(&args, config)?;
            let value = match item {
                Some(item) => resolver.resolve(item, key, default.as_deref()).await?,
                None => {
                    let purpose = purpose.map(ItemPurpose::from).unwrap_or(ItemPurpose::Mysql);
                    resolver.resolve_for(purpose, key, default.as_deref()).await?
                }
            };
            print_resolved(value)
        }
        Command::Seal {
            container,
            item,
            secret_file,
            values,
        } => {
            let store = EncryptedFileStore::new(args.data_bag_dir.clone());
            let secret: DataBagSecret = store.load_secret(secret_file).await?;
            let values = parse_values(values)?;
            let container = container.as_deref().unwrap_or(&config.container);

            let path = store.seal(container, item, &values, &secret).await?;
            info!("Sealed {} keys into {:?}", values.len(), path);
            Ok(())
        }
    }
}
