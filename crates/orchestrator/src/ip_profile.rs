//! IP profile defaulting for virtual links.
//!
//! A VLD that references an IP profile gets a fully populated profile
//! before its network is requested. Missing fields are derived from the
//! subnet, which is itself picked at random from `192.168.x.0/24` when the
//! profile leaves it out.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnetwork::IpNetwork;
use nfvo_descriptor::{IpProfileParams, IpVersion};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

pub const DEFAULT_DHCP_COUNT: u32 = 50;
/// Largest DHCP range the external RO accepts.
pub const MAX_DHCP_COUNT: u32 = 100;

/// A profile with every field filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIpProfile {
    pub ip_version: IpVersion,
    pub subnet_address: String,
    pub gateway_address: String,
    pub dns_server: Vec<String>,
    pub dhcp_enabled: bool,
    pub dhcp_start_address: String,
    pub dhcp_count: u32,
    pub dhcp_end_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
}

pub fn resolve_ip_profile(params: &IpProfileParams) -> Result<ResolvedIpProfile, OrchestratorError> {
    resolve_with_rng(params, &mut rand::thread_rng())
}

pub fn resolve_with_rng<R: Rng + ?Sized>(
    params: &IpProfileParams,
    rng: &mut R,
) -> Result<ResolvedIpProfile, OrchestratorError> {
    let subnet = match params.subnet_address.as_deref() {
        Some(text) => IpNetwork::from_str(text)
            .map_err(|e| OrchestratorError::config(format!("invalid subnet '{}': {}", text, e)))?,
        None => {
            let octet: u8 = rng.gen_range(0..=255);
            IpNetwork::from_str(&format!("192.168.{}.0/24", octet))
                .map_err(|e| OrchestratorError::internal(e.to_string()))?
        }
    };
    let network = subnet.network();

    let gateway = parse_or_host(params.gateway_address.as_deref(), network, 1, "gateway")?;
    let dns_server = if params.dns_server.is_empty() {
        vec![host(network, 2).to_string()]
    } else {
        params.dns_server.iter().map(|d| d.address.clone()).collect()
    };

    let dhcp = params.dhcp_params.clone().unwrap_or_default();
    let start = parse_or_host(dhcp.start_address.as_deref(), network, 3, "dhcp start")?;
    if !subnet.contains(start) {
        return Err(OrchestratorError::config(format!(
            "dhcp start {} outside subnet {}",
            start, subnet
        )));
    }

    let requested = match dhcp.count {
        Some(0) | None => DEFAULT_DHCP_COUNT,
        Some(n) => n,
    };
    let count = requested.min(available_hosts(subnet, start)).min(MAX_DHCP_COUNT);
    if count == 0 {
        return Err(OrchestratorError::config(format!(
            "no dhcp addresses available in {} from {}",
            subnet, start
        )));
    }
    let end = offset(start, u128::from(count - 1));

    let ip_version = params.ip_version.unwrap_or(match subnet {
        IpNetwork::V4(_) => IpVersion::Ipv4,
        IpNetwork::V6(_) => IpVersion::Ipv6,
    });

    Ok(ResolvedIpProfile {
        ip_version,
        subnet_address: format!("{}/{}", network, subnet.prefix()),
        gateway_address: gateway.to_string(),
        dns_server,
        dhcp_enabled: dhcp.enabled.unwrap_or(true),
        dhcp_start_address: start.to_string(),
        dhcp_count: count,
        dhcp_end_address: end.to_string(),
        security_group: params.security_group.clone(),
    })
}

fn parse_or_host(
    text: Option<&str>,
    network: IpAddr,
    n: u128,
    what: &str,
) -> Result<IpAddr, OrchestratorError> {
    match text {
        Some(t) => IpAddr::from_str(t)
            .map_err(|_| OrchestratorError::config(format!("invalid {} address '{}'", what, t))),
        None => Ok(host(network, n)),
    }
}

fn host(network: IpAddr, n: u128) -> IpAddr {
    offset(network, n)
}

fn offset(addr: IpAddr, n: u128) -> IpAddr {
    match addr {
        IpAddr::V4(a) => {
            let v = u32::from(a).saturating_add(n.min(u128::from(u32::MAX)) as u32);
            IpAddr::V4(Ipv4Addr::from(v))
        }
        IpAddr::V6(a) => IpAddr::V6(Ipv6Addr::from(u128::from(a).saturating_add(n))),
    }
}

/// Host addresses from `start` up to the last usable address of `subnet`.
fn available_hosts(subnet: IpNetwork, start: IpAddr) -> u32 {
    let (last, start) = match (subnet, start) {
        (IpNetwork::V4(net), IpAddr::V4(s)) => {
            let broadcast = u32::from(net.broadcast());
            (u128::from(broadcast.saturating_sub(1)), u128::from(u32::from(s)))
        }
        (IpNetwork::V6(net), IpAddr::V6(s)) => {
            let base = u128::from(net.network());
            let span = 128u32.saturating_sub(u32::from(net.prefix()));
            let last = if span >= 128 {
                u128::MAX
            } else {
                base + ((1u128 << span) - 1)
            };
            (last, u128::from(s))
        }
        _ => return 0,
    };
    if last < start {
        0
    } else {
        (last - start + 1).min(u128::from(u32::MAX)) as u32
    }
}
