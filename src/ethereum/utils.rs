use alloy::primitives::{keccak256, Address, B256, U256};
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(anyhow!(
            "Invalid address format: '{}'. Addresses must start with '0x'",
            address
        ));
    }

    if address.len() != 42 {
        return Err(anyhow!(
            "Invalid address length: '{}'. Addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    let hex_part = &address[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        ));
    }

    Address::from_str(address).map_err(|e| anyhow!("Invalid address: '{}'. Error: {}", address, e))
}

/// Parses an integer given in decimal or `0x` hex.
pub fn parse_uint(value_str: &str) -> Result<U256> {
    let value_str = value_str.trim();
    if value_str.is_empty() {
        return Err(anyhow!("Value cannot be empty"));
    }

    if let Some(hex_part) = value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        U256::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow!("Invalid hexadecimal value: '{}'", value_str))
    } else {
        U256::from_str_radix(value_str, 10).map_err(|_| {
            anyhow!(
                "Invalid numeric value: '{}'. Use decimal format or '0x' prefixed hex",
                value_str
            )
        })
    }
}

/// Parses a token amount such as `5`, `0.25` or `1.5e3` into base units
/// using `decimals`. A plain integer with a `wei` suffix, or `0x` hex, is
/// taken as base units.
pub fn parse_amount(value_str: &str, decimals: u8) -> Result<U256> {
    let value_str = value_str.trim();

    if let Some(raw) = value_str.strip_suffix("wei") {
        return parse_uint(raw);
    }

    if value_str.starts_with("0x") || value_str.starts_with("0X") {
        return parse_uint(value_str);
    }

    let (number, exponent) = match value_str.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => {
            let exponent: usize = exponent
                .parse()
                .map_err(|_| anyhow!("Invalid exponent in amount: '{}'", value_str))?;
            (mantissa, exponent)
        }
        None => (value_str, 0),
    };

    // uint256 holds at most 78 decimal digits
    let scale = decimals as usize + exponent;
    if scale > 78 {
        return Err(anyhow!("Amount overflows uint256: '{}'", value_str));
    }

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.len() > scale {
        return Err(anyhow!(
            "Amount '{}' has more than {} decimal places",
            value_str,
            scale
        ));
    }
    let padded = format!("{}{:0<width$}", whole, fraction, width = scale);
    parse_uint(&padded)
}

/// Converts gwei to wei for gas prices.
pub fn gwei(amount: u64) -> u128 {
    amount as u128 * 1_000_000_000
}

/// Topic hash of an event signature such as `Initialized(uint64)`,
/// or the topic itself when given as 32 bytes of hex.
pub fn event_topic(signature: &str) -> Result<B256> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(anyhow!("Event signature cannot be empty"));
    }

    if signature.starts_with("0x") && signature.len() == 66 {
        return B256::from_str(signature)
            .map_err(|e| anyhow!("Invalid event topic '{}': {}", signature, e));
    }

    if !signature.contains('(') || !signature.ends_with(')') {
        return Err(anyhow!(
            "Invalid event signature '{}'. Expected a form like 'Initialized(uint64)'",
            signature
        ));
    }

    let canonical: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(keccak256(canonical.as_bytes()))
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        "The contract function reverted execution. This usually means the function's requirements were not met.".to_string()
    } else if error.contains("insufficient funds") {
        "Insufficient funds to cover gas costs. Make sure the signing account holds enough native currency.".to_string()
    } else if error.contains("intrinsic gas too low") || error.contains("gas required exceeds allowance") {
        "Gas limit too low. Resubmit with a higher gas limit.".to_string()
    } else if error.contains("nonce too low") {
        "Nonce too low. Another transaction was already mined with this nonce; reset the nonce and resubmit.".to_string()
    } else if error.contains("already known") {
        "The node already has this transaction in its pool.".to_string()
    } else if error.contains("replacement transaction underpriced") {
        "Gas price too low to replace a pending transaction with the same nonce. Increase the gas price.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Cannot connect to RPC endpoint. Check your internet connection and RPC URL configuration.".to_string()
    } else if error.contains("timeout") || error.contains("timed out") {
        "Request timed out. The RPC endpoint may be overloaded or unreachable.".to_string()
    } else if error.contains("rate limit") {
        "Too many requests to the RPC endpoint. Try again in a few moments or use a different endpoint.".to_string()
    } else if error.contains("method not found") {
        "The requested method is not supported by this RPC endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}
