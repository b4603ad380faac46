//! Macro for implementing Display and FromStr for wire-name enums
//!
//! Ledger rows carry enum values as lowercase strings. This macro keeps the
//! `Display` and `FromStr` implementations in one mapping table.
//!
//! # Example
//!
//! ```rust
//! use creditsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Store {
//!     AppStore,
//!     Promo,
//! }
//!
//! impl_domain_status_conversions!(Store {
//!     AppStore => "app_store",
//!     Promo => "promo",
//! });
//!
//! assert_eq!(Store::AppStore.to_string(), "app_store");
//! assert_eq!("PROMO".parse::<Store>().unwrap(), Store::Promo);
//! ```

/// Implements Display and FromStr traits for wire-name enums
///
/// Parsing is case-insensitive; output is the mapped string verbatim.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Channel {
        Store,
        Promo,
    }

    impl_domain_status_conversions!(Channel {
        Store => "store",
        Promo => "promo",
    });

    #[test]
    fn test_display_and_as_str_agree() {
        assert_eq!(Channel::Store.to_string(), "store");
        assert_eq!(Channel::Promo.as_str(), "promo");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(Channel::from_str("PrOmO").unwrap(), Channel::Promo);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = Channel::from_str("refund").unwrap_err();
        assert!(err.contains("Invalid Channel: refund"));
    }
}
