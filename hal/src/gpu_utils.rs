//! Helpers for reading memory budgets from the environment.

use crate::Error;
use std::env;

/// Read a byte budget from `var`, e.g. `RUSTCV_TRAJECTORY_MAX_BYTES=64MB`.
///
/// Returns `Ok(None)` when the variable is not set.
pub fn read_max_bytes_from_env(var: &str) -> crate::Result<Option<usize>> {
    let raw = match env::var(var) {
        Ok(v) => v,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(e) => return Err(Error::MemoryError(format!("Failed to read {var}: {e}"))),
    };

    let parsed = parse_bytes_with_suffix(&raw)?;
    if parsed == 0 {
        return Err(Error::MemoryError(format!("{var} must be >= 1")));
    }
    Ok(Some(parsed))
}

/// Parse `1024`, `512KB`, `256MB`, `2GB` (case-insensitive, `_` separators allowed).
pub fn parse_bytes_with_suffix(raw: &str) -> crate::Result<usize> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::MemoryError("memory size cannot be empty".to_string()));
    }

    let upper = s.to_ascii_uppercase().replace('_', "");
    let (number, multiplier): (&str, usize) = if let Some(v) = upper.strip_suffix("KB") {
        (v, 1 << 10)
    } else if let Some(v) = upper.strip_suffix("MB") {
        (v, 1 << 20)
    } else if let Some(v) = upper.strip_suffix("GB") {
        (v, 1 << 30)
    } else if let Some(v) = upper.strip_suffix('B') {
        (v, 1)
    } else {
        (upper.as_str(), 1)
    };

    let base: usize = number.trim().parse().map_err(|_| {
        Error::MemoryError(format!(
            "memory size must look like '65536', '512KB' or '2GB'; got '{raw}'"
        ))
    })?;

    base.checked_mul(multiplier)
        .ok_or_else(|| Error::MemoryError(format!("memory size '{raw}' overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixes() {
        assert_eq!(parse_bytes_with_suffix("1024").unwrap(), 1024);
        assert_eq!(parse_bytes_with_suffix("2kb").unwrap(), 2048);
        assert_eq!(parse_bytes_with_suffix("3MB").unwrap(), 3 << 20);
        assert_eq!(parse_bytes_with_suffix("1_GB").unwrap(), 1 << 30);
        assert_eq!(parse_bytes_with_suffix("64B").unwrap(), 64);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_bytes_with_suffix("").is_err());
        assert!(parse_bytes_with_suffix("lots").is_err());
        assert!(parse_bytes_with_suffix("99999999999999999999GB").is_err());
    }

    #[test]
    fn unset_variable_is_none() {
        assert_eq!(
            read_max_bytes_from_env("RUSTCV_TEST_UNSET_BUDGET_VARIABLE").unwrap(),
            None
        );
    }
}
