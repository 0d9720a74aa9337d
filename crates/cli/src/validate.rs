//! `nfvo validate`: load a bundle and report what is wrong with it.

use std::path::Path;
use std::process;

use nfvo_descriptor::from_bundle;

use crate::{fail, OutputFormat};

pub(crate) fn cmd_validate(bundle_path: &Path, output: OutputFormat, quiet: bool) {
    let text = match std::fs::read_to_string(bundle_path) {
        Ok(s) => s,
        Err(e) => fail(
            &format!("error reading file '{}': {}", bundle_path.display(), e),
            output,
            quiet,
        ),
    };
    let doc: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => fail(
            &format!("error parsing JSON in '{}': {}", bundle_path.display(), e),
            output,
            quiet,
        ),
    };

    match from_bundle(&doc) {
        Ok(bundle) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Text => println!(
                    "valid: {} nsd, {} vnfd, {} ns instance config",
                    bundle.nsds.len(),
                    bundle.vnfds.len(),
                    bundle.ns_instances.len()
                ),
                OutputFormat::Json => {
                    let nsds: Vec<&str> = bundle.nsds.iter().map(|n| n.id.as_str()).collect();
                    let vnfds: Vec<&str> = bundle.vnfds.iter().map(|v| v.id.as_str()).collect();
                    let configs: Vec<&str> =
                        bundle.ns_instances.iter().map(|c| c.id.as_str()).collect();
                    let json = serde_json::json!({
                        "valid": true,
                        "nsd": nsds,
                        "vnfd": vnfds,
                        "ns_instance_config": configs,
                    });
                    println!("{}", json);
                }
            }
        }
        Err(e) => {
            match output {
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("invalid bundle");
                        eprintln!("  - {}", e);
                    }
                }
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "valid": false,
                        "errors": [e.to_string()],
                    });
                    println!("{}", json);
                }
            }
            process::exit(1);
        }
    }
}
