//! Fulfillment core configuration
//!
//! Every setting can be overridden through an environment variable:
//!
//! | Environment variable | Default | Meaning |
//! |----------------------|---------|---------|
//! | FULFILLMENT_DB_PATH | ./fulfillment.redb | Database file |
//! | CART_EXPIRY_MINUTES | 30 | Idle time before a cart is reclaimed |
//! | REAPER_INTERVAL_SECS | 600 | Background sweep interval |
//! | SHIPPING_FEE | 2.00 | Flat fee added to every order |
//! | CREDIT_VALIDITY_DAYS | 90 | Expiry window for issued store credit |
//! | MAX_CART_ITEMS | 50 | Distinct products allowed per cart |
//! | LOG_LEVEL | info | Default tracing level when RUST_LOG is unset |

use rust_decimal::Decimal;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the redb database file
    pub db_path: String,
    /// Idle minutes after which a cart is considered abandoned
    pub cart_expiry_minutes: i64,
    /// Seconds between reaper sweeps
    pub reaper_interval_secs: u64,
    /// Flat shipping fee applied to every order regardless of size
    pub shipping_fee: Decimal,
    /// Days until cancellation-issued store credit expires
    pub credit_validity_days: i64,
    /// Maximum number of distinct products in one cart
    pub max_cart_items: usize,
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("FULFILLMENT_DB_PATH")
                .unwrap_or_else(|_| "./fulfillment.redb".into()),
            cart_expiry_minutes: env_parse("CART_EXPIRY_MINUTES", 30),
            reaper_interval_secs: env_parse("REAPER_INTERVAL_SECS", 600),
            shipping_fee: env_parse("SHIPPING_FEE", Decimal::TWO),
            credit_validity_days: env_parse("CREDIT_VALIDITY_DAYS", 90),
            max_cart_items: env_parse("MAX_CART_ITEMS", 50),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
        }
    }

    /// Cart expiry threshold in milliseconds
    pub fn cart_expiry_ms(&self) -> i64 {
        self.cart_expiry_minutes * MS_PER_MINUTE
    }

    /// Credit validity window in milliseconds
    pub fn credit_validity_ms(&self) -> i64 {
        self.credit_validity_days * MS_PER_DAY
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
