//! Shop configuration

use std::{fs, path::Path};

use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{self, PriceError};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file couldn't be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file isn't valid YAML for [`ShopConfig`].
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Default currency isn't an ISO currency.
    #[error(transparent)]
    Currency(#[from] PriceError),
}

/// Which shipping strategy the shop uses when none is given explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMode {
    /// Free shipping everywhere.
    #[default]
    None,

    /// Each item's own shipping cost per unit.
    PerItem,

    /// Rates per method and region, see [`crate::shipping::RegionalShipping`].
    Regional,
}

/// Shop settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    /// Currency used when a cart has no region.
    pub currency: String,

    /// Session key the cart is kept under.
    pub cart_session_key: String,

    /// Session key favourites are kept under.
    pub favourites_session_key: String,

    /// Send receipts when orders are paid.
    pub email_receipts: bool,

    /// Shop managers notified of new orders.
    pub managers: Vec<String>,

    /// Accept voucher codes.
    pub vouchers_enabled: bool,

    /// Shipping strategy.
    pub shipping: ShippingMode,

    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            currency: "NZD".to_string(),
            cart_session_key: "cart".to_string(),
            favourites_session_key: "favourites".to_string(),
            email_receipts: true,
            managers: Vec::new(),
            vouchers_enabled: true,
            shipping: ShippingMode::None,
            log_level: "info".to_string(),
        }
    }
}

impl ShopConfig {
    /// Parse YAML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the YAML is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Read a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    /// The default currency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Currency`] if it isn't an ISO currency.
    pub fn currency(&self) -> Result<&'static Currency, ConfigError> {
        Ok(money::currency(&self.currency)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rusty_money::iso::AUD;
    use tempfile::NamedTempFile;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn missing_keys_take_defaults() -> TestResult {
        let config = ShopConfig::from_yaml_str("shipping: per_item\n")?;

        assert_eq!(config.shipping, ShippingMode::PerItem);
        assert_eq!(config.cart_session_key, "cart");
        assert!(config.vouchers_enabled);

        Ok(())
    }

    #[test]
    fn loads_from_file() -> TestResult {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "currency: aud\nemail_receipts: false")?;

        let config = ShopConfig::load(file.path())?;

        assert_eq!(config.currency()?, AUD);
        assert!(!config.email_receipts);

        Ok(())
    }

    #[test]
    fn unknown_currency_is_an_error() -> TestResult {
        let config = ShopConfig::from_yaml_str("currency: XXQ")?;

        assert!(matches!(config.currency(), Err(ConfigError::Currency(_))));

        Ok(())
    }

    #[test]
    fn unknown_shipping_mode_is_rejected() {
        assert!(matches!(
            ShopConfig::from_yaml_str("shipping: carrier_pigeon"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
