//! Network token parsing for job submission

use crate::error::DiscoveryError;
use crate::scanner::CidrRange;
use crate::scanner::cidr::parse_dotted_quad;

/// Upper bound on the aggregate host count of one submission
pub const MAX_SCAN_HOSTS: u64 = 2048;

/// Split raw input on commas and newlines, trimming and dropping empty tokens.
pub fn split_networks<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    inputs
        .iter()
        .flat_map(|input| input.as_ref().split([',', '\n']))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate one token. A bare address becomes a /32.
pub fn normalize_network(token: &str) -> Result<CidrRange, DiscoveryError> {
    let token = token.trim();
    if !token.contains('/') {
        let addr = parse_dotted_quad(token).ok_or_else(|| DiscoveryError::invalid_ip(token))?;
        return CidrRange::parse(&format!("{}/32", addr));
    }
    CidrRange::parse(token)
}

/// Parse, normalize and size-check a submission.
///
/// Duplicate networks are scanned once, keeping the first spelling: `10.0.0.5/24` repeats
/// `10.0.0.0/24`. Fails before any work is scheduled.
pub fn plan_networks<S: AsRef<str>>(
    inputs: &[S],
    max_hosts: u64,
) -> Result<Vec<CidrRange>, DiscoveryError> {
    let tokens = split_networks(inputs);
    if tokens.is_empty() {
        return Err(DiscoveryError::EmptyInput);
    }

    let mut networks: Vec<CidrRange> = Vec::with_capacity(tokens.len());
    for token in &tokens {
        let range = normalize_network(token)?;
        if !networks.iter().any(|seen| seen.same_block(&range)) {
            networks.push(range);
        }
    }

    let total: u64 = networks.iter().map(CidrRange::host_count).sum();
    if total > max_hosts {
        return Err(DiscoveryError::TooManyHosts {
            total,
            max: max_hosts,
        });
    }

    Ok(networks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_commas_and_newlines() {
        let tokens = split_networks(&["10.0.0.0/24, 10.0.1.1\n 10.0.2.0/30 ,,\n"]);
        assert_eq!(tokens, vec!["10.0.0.0/24", "10.0.1.1", "10.0.2.0/30"]);

        let tokens = split_networks(&["10.0.0.1".to_string(), " 10.0.0.2 ".to_string()]);
        assert_eq!(tokens, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_bare_ip_becomes_host_route() {
        let range = normalize_network("10.5.80.1").unwrap();
        assert_eq!(range.to_string(), "10.5.80.1/32");
        assert_eq!(range.host_count(), 1);
    }

    #[test]
    fn test_error_messages_name_the_token() {
        assert_eq!(
            normalize_network("10.5.80").unwrap_err().to_string(),
            "Invalid IP address format: 10.5.80"
        );
        assert_eq!(
            normalize_network("10.5.80.0/40").unwrap_err().to_string(),
            "Invalid CIDR format: 10.5.80.0/40"
        );
        assert_eq!(
            normalize_network("300.1.1.1").unwrap_err().to_string(),
            "Invalid IP address format: 300.1.1.1"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            plan_networks(&[" , \n"], MAX_SCAN_HOSTS).unwrap_err(),
            DiscoveryError::EmptyInput
        );
        let none: [&str; 0] = [];
        assert_eq!(plan_networks(&none, MAX_SCAN_HOSTS).unwrap_err(), DiscoveryError::EmptyInput);
    }

    #[test]
    fn test_host_cap_boundary() {
        // /21 = 2046, /31 = 2, /32 = 1
        let over = plan_networks(&["10.0.0.0/21, 10.1.0.0/31, 10.2.0.9"], MAX_SCAN_HOSTS);
        assert_eq!(
            over.unwrap_err(),
            DiscoveryError::TooManyHosts {
                total: 2049,
                max: 2048
            }
        );

        let at_cap = plan_networks(&["10.0.0.0/21", "10.1.0.0/31"], MAX_SCAN_HOSTS).unwrap();
        assert_eq!(at_cap.iter().map(CidrRange::host_count).sum::<u64>(), 2048);
    }

    #[test]
    fn test_duplicates_scanned_once() {
        let networks = plan_networks(&["10.0.0.0/24,10.0.0.0/24", " 10.0.0.0/24"], MAX_SCAN_HOSTS).unwrap();
        assert_eq!(networks.len(), 1);
    }

    #[test]
    fn test_same_block_written_differently_counts_once() {
        let networks = plan_networks(&["10.0.0.0/24", "10.0.0.5/24", "10.0.0.4/31,10.0.0.5/31"], MAX_SCAN_HOSTS).unwrap();
        let names: Vec<String> = networks.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["10.0.0.0/24", "10.0.0.4/31"]);
        assert_eq!(networks.iter().map(CidrRange::host_count).sum::<u64>(), 256);

        // same address, different prefix: distinct blocks
        let networks = plan_networks(&["10.0.0.0/24", "10.0.0.0/25"], MAX_SCAN_HOSTS).unwrap();
        assert_eq!(networks.len(), 2);
    }

    #[test]
    fn test_first_invalid_token_rejects_whole_submission() {
        let err = plan_networks(&["10.0.0.0/24, bogus, 10.0.1.0/24"], MAX_SCAN_HOSTS).unwrap_err();
        assert_eq!(err.to_string(), "Invalid IP address format: bogus");
    }
}
