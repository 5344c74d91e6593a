//! Resource request validation and materialization
//!
//! Only dimensions the cluster actually requests end up in the request map, so
//! an absent CPU value can never turn into a zero quantity.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use pgcluster_common::ResourceRequests;

use crate::SynthesisError;

/// Field path of the CPU request in the custom resource
pub const CPU_FIELD: &str = "spec.resources.cpu";
/// Field path of the memory request in the custom resource
pub const MEMORY_FIELD: &str = "spec.resources.memory";

const CPU_EXPECTED: &str = "'100m', '1', '0.5', '1.5m'";
const MEMORY_EXPECTED: &str = "'128Mi', '1Gi', '129M', '129e6'";

/// Binary and decimal SI suffixes; the empty suffix is a plain number
const QUANTITY_SUFFIXES: [&str; 16] = [
    "", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E",
];

/// Build the container request map from optional requests.
///
/// Returns `None` when nothing is requested.
pub fn build_requests(
    cluster: &str,
    requests: &ResourceRequests,
) -> Result<Option<BTreeMap<String, Quantity>>, SynthesisError> {
    let mut map = BTreeMap::new();

    if let Some(cpu) = requests.cpu.as_deref() {
        validate_cpu_quantity(cluster, cpu)?;
        map.insert("cpu".to_string(), Quantity(cpu.to_string()));
    }

    if let Some(memory) = requests.memory.as_deref() {
        validate_memory_quantity(cluster, memory)?;
        map.insert("memory".to_string(), Quantity(memory.to_string()));
    }

    Ok(if map.is_empty() { None } else { Some(map) })
}

/// Validate CPU quantity format (e.g., "100m", "1", "0.5")
pub fn validate_cpu_quantity(cluster: &str, qty: &str) -> Result<(), SynthesisError> {
    if !is_quantity(qty) {
        return Err(invalid(cluster, CPU_FIELD, qty, CPU_EXPECTED));
    }
    Ok(())
}

/// Validate memory quantity format (e.g., "128Mi", "1Gi", "129e6")
pub fn validate_memory_quantity(cluster: &str, qty: &str) -> Result<(), SynthesisError> {
    if !is_quantity(qty) {
        return Err(invalid(cluster, MEMORY_FIELD, qty, MEMORY_EXPECTED));
    }
    Ok(())
}

/// Kubernetes quantity syntax: `[+]<digits>[.<digits>]<suffix>`, where the
/// suffix is an SI suffix or an `e`/`E` exponent.
///
/// A leading `-` is rejected; a negative request is never valid.
fn is_quantity(qty: &str) -> bool {
    let unsigned = qty.strip_prefix('+').unwrap_or(qty);
    let number_end = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_end);
    is_decimal(number) && is_suffix(suffix)
}

fn is_decimal(s: &str) -> bool {
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    !(whole.is_empty() && fraction.is_empty()) && all_digits(whole) && all_digits(fraction)
}

fn is_suffix(s: &str) -> bool {
    if QUANTITY_SUFFIXES.contains(&s) {
        return true;
    }
    match s.strip_prefix(|c: char| c == 'e' || c == 'E') {
        Some(exponent) => {
            let digits = exponent
                .strip_prefix(|c: char| c == '+' || c == '-')
                .unwrap_or(exponent);
            !digits.is_empty() && all_digits(digits)
        }
        None => false,
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn invalid(cluster: &str, field: &str, value: &str, expected: &'static str) -> SynthesisError {
    SynthesisError::InvalidQuantity {
        cluster: cluster.to_string(),
        field: field.to_string(),
        value: value.to_string(),
        expected,
    }
}
