//! Process configuration.
//!
//! Grounded on the teacher's `models::Config::from_env`: `dotenv` loaded
//! first, every field read via `std::env::var` with a hard-coded
//! default, numeric fields parsed with a `.unwrap_or(default)` fallback
//! rather than failing startup over a malformed env var.

/// `USERNAME:bcrypt-ready-plaintext-password` seed pairs for the
/// in-memory credential store (`spec.md` leaves persisted credential
/// storage out of scope; see SPEC_FULL.md §4/§9).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub binance_ws_url: String,
    pub kraken_ws_url: String,
    pub seed_users: Vec<(String, String)>,
    pub client_tick_period_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let binance_ws_url = std::env::var("BINANCE_WS_URL")
            .unwrap_or_else(|_| "wss://stream.binance.com:9443/ws".to_string());

        let kraken_ws_url =
            std::env::var("KRAKEN_WS_URL").unwrap_or_else(|_| "wss://ws.kraken.com/v2".to_string());

        let seed_users = std::env::var("SEED_USERS")
            .unwrap_or_else(|_| "demo:demo".to_string())
            .split(',')
            .filter_map(|pair| pair.split_once(':'))
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .collect();

        let client_tick_period_secs = std::env::var("CLIENT_TICK_PERIOD_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);

        Self {
            port,
            binance_ws_url,
            kraken_ws_url,
            seed_users,
            client_tick_period_secs,
        }
    }
}
