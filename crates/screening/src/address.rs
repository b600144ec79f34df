//! Address validation capability
//!
//! The orchestrator only needs a yes/no answer for an address and the
//! blockchain family of the currency being screened. [`ShapeValidator`]
//! checks the textual shape (prefix, alphabet, length); it does not verify
//! checksums.

use aml_core::BlockchainFamily;

/// Decides whether an address belongs to a blockchain family
pub trait AddressValidator: Send + Sync {
    fn is_valid(&self, address: &str, family: BlockchainFamily) -> bool;
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Shape-only validator for the supported families
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeValidator;

impl ShapeValidator {
    fn is_base58(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| BASE58_ALPHABET.contains(c))
    }

    fn is_evm(address: &str) -> bool {
        address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    }

    fn is_tron(address: &str) -> bool {
        address.len() == 34 && address.starts_with('T') && Self::is_base58(address)
    }

    fn is_bitcoin(address: &str) -> bool {
        Self::is_bech32(address) || ((25..=35).contains(&address.len()) && Self::is_base58(address))
    }

    /// Single-case human readable part, `1` separator, data in the bech32 charset
    fn is_bech32(address: &str) -> bool {
        if !(14..=90).contains(&address.len()) {
            return false;
        }
        let lower = address.to_lowercase();
        if lower != address && address.to_uppercase() != address {
            return false;
        }
        let Some((hrp, data)) = lower.rsplit_once('1') else {
            return false;
        };
        !hrp.is_empty()
            && hrp.chars().all(|c| c.is_ascii_lowercase())
            && data.len() >= 6
            && data.chars().all(|c| BECH32_CHARSET.contains(c))
    }
}

impl AddressValidator for ShapeValidator {
    fn is_valid(&self, address: &str, family: BlockchainFamily) -> bool {
        let address = address.trim();
        match family {
            BlockchainFamily::Evm => Self::is_evm(address),
            BlockchainFamily::Tron => Self::is_tron(address),
            BlockchainFamily::Bitcoin => Self::is_bitcoin(address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm() {
        let v = ShapeValidator;
        assert!(v.is_valid("0x52908400098527886E0F7030069857D2E4169EE7", BlockchainFamily::Evm));
        assert!(!v.is_valid("0x5290840009852788", BlockchainFamily::Evm));
        assert!(!v.is_valid("52908400098527886E0F7030069857D2E4169EE7", BlockchainFamily::Evm));
    }

    #[test]
    fn test_tron() {
        let v = ShapeValidator;
        assert!(v.is_valid("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", BlockchainFamily::Tron));
        assert!(!v.is_valid("0x52908400098527886E0F7030069857D2E4169EE7", BlockchainFamily::Tron));
        // '0' is outside the base58 alphabet
        assert!(!v.is_valid("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj60", BlockchainFamily::Tron));
    }

    #[test]
    fn test_bitcoin() {
        let v = ShapeValidator;
        assert!(v.is_valid("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BlockchainFamily::Bitcoin));
        assert!(v.is_valid("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", BlockchainFamily::Bitcoin));
        assert!(v.is_valid(
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
            BlockchainFamily::Bitcoin
        ));
        assert!(!v.is_valid("bc1qAR0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", BlockchainFamily::Bitcoin));
        assert!(!v.is_valid("not-an-address", BlockchainFamily::Bitcoin));
    }
}
