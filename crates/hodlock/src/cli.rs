use clap::Parser;

use hodlock_core::policy::DEFAULT_LOCK_YEARS;
use hodlock_core::types::{ProviderName, WalletNetwork};

/// hodlock: timelock Bitcoin outputs for decades through an external wallet.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "HODLOCK_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090", env = "HODLOCK_PORT")]
    pub port: u16,

    /// Lock duration in years.
    #[arg(long, default_value_t = DEFAULT_LOCK_YEARS, env = "HODLOCK_LOCK_YEARS")]
    pub lock_years: u32,

    /// Wallet bridge endpoint as `<provider>=<url>` (repeatable), e.g.
    /// `unisat=http://127.0.0.1:7001`.
    #[arg(
        long = "wallet",
        value_name = "PROVIDER=URL",
        value_parser = parse_wallet_endpoint,
        value_delimiter = ',',
        env = "HODLOCK_WALLETS"
    )]
    pub wallets: Vec<WalletEndpoint>,

    /// Basic-auth user for the wallet bridges.
    #[arg(long, env = "HODLOCK_WALLET_USER")]
    pub wallet_user: Option<String>,

    /// Basic-auth password for the wallet bridges.
    #[arg(long, env = "HODLOCK_WALLET_PASS")]
    pub wallet_pass: Option<String>,

    /// Per-request wallet timeout. Covers the user's approval prompt.
    #[arg(long, default_value = "300", env = "HODLOCK_WALLET_TIMEOUT_SECS")]
    pub wallet_timeout_secs: u64,

    /// Register the in-process fixture wallet (sample outputs, no real
    /// signing). For demos only.
    #[arg(long, env = "HODLOCK_ENABLE_FIXTURE_WALLET")]
    pub enable_fixture_wallet: bool,

    /// Network the fixture wallet reports.
    #[arg(long, default_value = "mainnet", env = "HODLOCK_FIXTURE_NETWORK")]
    pub fixture_network: WalletNetwork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletEndpoint {
    pub provider: ProviderName,
    pub url: String,
}

fn parse_wallet_endpoint(raw: &str) -> Result<WalletEndpoint, String> {
    let (name, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <provider>=<url>, got `{raw}`"))?;
    let provider: ProviderName = name.parse()?;
    if provider == ProviderName::Fixture {
        return Err("the fixture wallet has no bridge; use --enable-fixture-wallet".to_owned());
    }
    let url = url.trim();
    if url.is_empty() {
        return Err(format!("missing bridge url for {provider}"));
    }
    Ok(WalletEndpoint {
        provider,
        url: url.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_endpoints_parse_repeated_flags() {
        let cli = Cli::try_parse_from([
            "hodlock",
            "--wallet",
            "unisat=http://127.0.0.1:7001",
            "--wallet",
            "Phantom=https://bridge.local/rpc",
        ])
        .expect("arguments must parse");

        assert_eq!(
            cli.wallets,
            vec![
                WalletEndpoint {
                    provider: ProviderName::Unisat,
                    url: "http://127.0.0.1:7001".to_owned(),
                },
                WalletEndpoint {
                    provider: ProviderName::Phantom,
                    url: "https://bridge.local/rpc".to_owned(),
                },
            ]
        );
        assert_eq!(cli.lock_years, DEFAULT_LOCK_YEARS);
        assert_eq!(cli.fixture_network, WalletNetwork::Mainnet);
        assert!(!cli.enable_fixture_wallet);
    }

    #[test]
    fn wallet_endpoint_rejects_unknown_provider_and_fixture() {
        assert!(parse_wallet_endpoint("metamask=http://x").is_err());
        assert!(parse_wallet_endpoint("fixture=http://x").is_err());
        assert!(parse_wallet_endpoint("unisat").is_err());
        assert!(parse_wallet_endpoint("unisat= ").is_err());
    }

    #[test]
    fn fixture_network_accepts_wallet_spellings() {
        let cli = Cli::try_parse_from([
            "hodlock",
            "--enable-fixture-wallet",
            "--fixture-network",
            "testnet",
            "--lock-years",
            "5",
        ])
        .expect("arguments must parse");
        assert!(cli.enable_fixture_wallet);
        assert_eq!(cli.fixture_network, WalletNetwork::Testnet);
        assert_eq!(cli.lock_years, 5);
    }
}
