//! IP profile defaulting.
//!
//! An empty IP profile resolves to IPv4 with DHCP on: the gateway, DNS
//! server and first DHCP address are hosts .1, .2 and .3 of the chosen
//! /24, and the DHCP range holds 50 addresses.

use std::net::Ipv4Addr;

use nfvo_descriptor::IpProfileParams;
use serde_json::Value;

use crate::traits::TestableOrchestrator;

fn field<'a>(profile: &'a Value, name: &str) -> Result<&'a Value, String> {
    profile
        .get(name)
        .ok_or_else(|| format!("resolved profile has no {}: {}", name, profile))
}

fn address(profile: &Value, name: &str) -> Result<Ipv4Addr, String> {
    let text = field(profile, name)?
        .as_str()
        .ok_or_else(|| format!("{} is not a string", name))?;
    text.parse()
        .map_err(|e| format!("{} = {} is not an IPv4 address: {}", name, text, e))
}

fn host(base: Ipv4Addr, n: u8) -> Ipv4Addr {
    let [a, b, c, _] = base.octets();
    Ipv4Addr::new(a, b, c, n)
}

pub async fn test_ip_profile_defaulting<O: TestableOrchestrator>(orch: &O) -> Result<(), String> {
    let profile = orch
        .resolve_ip_profile(&IpProfileParams::default())
        .await
        .map_err(|e| format!("resolve_ip_profile failed: {}", e))?;

    if field(&profile, "ip_version")? != "ipv4" {
        return Err(format!("default ip_version is not ipv4: {}", profile));
    }
    if field(&profile, "dhcp_enabled")? != true {
        return Err(format!("dhcp is not enabled by default: {}", profile));
    }
    if field(&profile, "dhcp_count")? != 50 {
        return Err(format!("default dhcp_count is not 50: {}", profile));
    }

    let subnet = field(&profile, "subnet_address")?
        .as_str()
        .ok_or("subnet_address is not a string")?;
    let (network, prefix) = subnet
        .split_once('/')
        .ok_or_else(|| format!("subnet {} has no prefix length", subnet))?;
    if prefix != "24" {
        return Err(format!("default subnet {} is not a /24", subnet));
    }
    let network: Ipv4Addr = network
        .parse()
        .map_err(|e| format!("subnet {} is not IPv4: {}", subnet, e))?;

    let expected = [
        ("gateway_address", host(network, 1)),
        ("dhcp_start_address", host(network, 3)),
        ("dhcp_end_address", host(network, 52)),
    ];
    for (name, want) in expected {
        let got = address(&profile, name)?;
        if got != want {
            return Err(format!("{} is {}, expected {}", name, got, want));
        }
    }
    let dns = field(&profile, "dns_server")?;
    let first_dns = dns
        .get(0)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("no default dns server: {}", dns))?;
    if first_dns != host(network, 2).to_string() {
        return Err(format!("dns server is {}, expected {}", first_dns, host(network, 2)));
    }
    Ok(())
}
