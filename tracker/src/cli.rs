//! Command-line interface.

use clap::{Parser, Subcommand};
use order_tracker_core::ShipmentFilter;

/// Track order-confirmation emails into the order store.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Process every unread email once
    Run,

    /// Print shipment entries matching a filter
    Find {
        /// Filter as JSON, e.g. '{"eq":{"field":"status","value":"shipped"}}'.
        /// Defaults to shipped or delivered orders without a transshipment carrier.
        #[arg(long, value_parser = parse_filter)]
        filter: Option<ShipmentFilter>,
    },

    /// Record the transshipment leg of an order (overwrites)
    SetTransshipment {
        /// Order number
        number: String,
        /// Forwarding carrier
        trans_carrier: String,
        /// Package number with the forwarding carrier
        package_number: String,
    },

    /// Create or upgrade the order store schema
    Migrate,
}

fn parse_filter(raw: &str) -> Result<ShipmentFilter, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid filter: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use clap::CommandFactory;
    use order_tracker_core::{ShipmentField, ShipmentStatus};

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn find_defaults_to_no_filter() {
        let cli = Cli::try_parse_from(["order-tracker", "find"]).unwrap();
        assert_eq!(cli.command, Command::Find { filter: None });
    }

    #[test]
    fn find_parses_json_filter() {
        let cli = Cli::try_parse_from([
            "order-tracker",
            "find",
            "--filter",
            r#"{"or":[{"eq":{"field":"status","value":"shipped"}},{"eq":{"field":"carrier","value":"UPS"}}]}"#,
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Find {
                filter: Some(ShipmentFilter::Or(vec![
                    ShipmentFilter::status_is(ShipmentStatus::Shipped),
                    ShipmentFilter::eq(ShipmentField::Carrier, "UPS"),
                ]))
            }
        );
    }

    #[test]
    fn find_rejects_bad_filter() {
        let result = Cli::try_parse_from(["order-tracker", "find", "--filter", r#"{"xor":[]}"#]);
        assert!(result.is_err());
    }

    #[test]
    fn set_transshipment_takes_three_arguments() {
        let cli =
            Cli::try_parse_from(["order-tracker", "set-transshipment", "A100", "DHL", "PKG-1"])
                .unwrap();

        assert_eq!(
            cli.command,
            Command::SetTransshipment {
                number: "A100".to_string(),
                trans_carrier: "DHL".to_string(),
                package_number: "PKG-1".to_string(),
            }
        );
    }
}
