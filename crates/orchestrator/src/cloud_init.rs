//! Cloud-init assembly for VDU records.
//!
//! A VDU's user data comes from its descriptor (inline or a file in the
//! VNFD package), has its `{{ ... }}` tokens substituted from a per-VNFR
//! [`VdurDatastore`], and is then extended with the NS key material:
//!
//! - `{{ vdu[<id>].<attr> }}` : an attribute of a sibling VDU
//! - `{{ vdu.<attr> }}` : an attribute of the VDU itself
//! - `{{ CI<name> }}` : a custom meta-data entry with destination `CLOUD_INIT`
//!
//! Any token that cannot be resolved fails the instantiation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use nfvo_descriptor::{CustomMetaData, KeyPair, User, Vdu};
use serde_yaml::{Mapping, Sequence, Value as Yaml};

use crate::error::OrchestratorError;
use crate::lock;

#[derive(Debug, Clone, Default)]
struct VdurData {
    name: Option<String>,
    mgmt_ip: Option<String>,
    vdur_name: Option<String>,
    custom_meta_data: Vec<CustomMetaData>,
}

/// Attributes of the VDU records of one VNFR, keyed by VDU id.
#[derive(Debug, Default)]
pub struct VdurDatastore {
    data: Mutex<HashMap<String, VdurData>>,
}

impl VdurDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a VDU record. Only the first record of a VDU is kept.
    pub fn add(&self, vdu: &Vdu, unique_short_name: &str) {
        let custom_meta_data = vdu
            .supplemental_boot_data
            .as_ref()
            .map(|b| b.custom_meta_data.clone())
            .unwrap_or_default();
        lock(&self.data)
            .entry(vdu.id.clone())
            .or_insert_with(|| VdurData {
                name: Some(vdu.name.clone()),
                mgmt_ip: None,
                vdur_name: Some(unique_short_name.to_string()),
                custom_meta_data,
            });
    }

    pub fn set_mgmt_ip(&self, vdu_id: &str, ip: Option<String>) {
        if let Some(entry) = lock(&self.data).get_mut(vdu_id) {
            entry.mgmt_ip = ip;
        }
    }

    pub fn remove(&self, vdu_id: &str) {
        lock(&self.data).remove(vdu_id);
    }

    /// Look up `attr` (`name`, `mgmt.ip` or `vdur_name`) of `vdu_id`.
    pub fn get(&self, vdu_id: &str, attr: &str) -> Option<String> {
        let data = lock(&self.data);
        let entry = data.get(vdu_id)?;
        match attr {
            "name" => entry.name.clone(),
            "mgmt.ip" => entry.mgmt_ip.clone(),
            "vdur_name" => entry.vdur_name.clone(),
            _ => None,
        }
    }

    fn cloud_init_var(&self, vdu_id: &str, var: &str) -> Option<String> {
        let data = lock(&self.data);
        data.get(vdu_id)?
            .custom_meta_data
            .iter()
            .find(|m| m.destination.as_deref() == Some("CLOUD_INIT") && m.name == var)
            .map(|m| m.value.clone())
    }
}

// ── Substitution ────────────────────────────────────────────────────

/// Replace every `{{ token }}` in `text` for the VDU `vdu_id`.
pub fn render(text: &str, vdu_id: &str, store: &VdurDatastore) -> Result<String, OrchestratorError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let token = after[..end].trim();
        out.push_str(&resolve(token, vdu_id, store)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve(token: &str, vdu_id: &str, store: &VdurDatastore) -> Result<String, OrchestratorError> {
    let missing = || OrchestratorError::VduRecord {
        message: format!(
            "unable to find a substitute for {} in {} cloud-init script",
            token, vdu_id
        ),
    };

    if let Some(tail) = token.strip_prefix("vdu[") {
        let close = tail.find(']').ok_or_else(missing)?;
        let attr = tail[close + 1..].strip_prefix('.').ok_or_else(missing)?;
        return store.get(&tail[..close], attr).ok_or_else(missing);
    }
    if let Some(attr) = token.strip_prefix("vdu.") {
        return store.get(vdu_id, attr).ok_or_else(missing);
    }
    if token.starts_with("CI") {
        return store.cloud_init_var(vdu_id, token).ok_or_else(missing);
    }
    Err(OrchestratorError::VduRecord {
        message: format!("unrecognized cloud-config variable: {}", token),
    })
}

// ── Assembly ────────────────────────────────────────────────────────

/// Key material and users to inject into every VDU of an NS.
#[derive(Debug, Clone, Default)]
pub struct CloudConfigAccess {
    pub key_pairs: Vec<KeyPair>,
    pub users: Vec<User>,
    pub ns_public_key: Option<String>,
}

impl CloudConfigAccess {
    fn is_empty(&self) -> bool {
        self.key_pairs.is_empty() && self.users.is_empty() && self.ns_public_key.is_none()
    }
}

/// The raw user data of a VDU, inline or read from its package.
pub fn read_script(vdu: &Vdu, package_dir: Option<&Path>) -> Result<Option<String>, OrchestratorError> {
    match (&vdu.cloud_init, &vdu.cloud_init_file) {
        (Some(inline), _) => Ok(Some(inline.clone())),
        (None, Some(file)) => {
            let path = match package_dir {
                Some(dir) => dir.join(file),
                None => Path::new(file).to_path_buf(),
            };
            let text = std::fs::read_to_string(&path).map_err(|e| OrchestratorError::VduRecord {
                message: format!("cannot read cloud-init file {}: {}", path.display(), e),
            })?;
            Ok(Some(text))
        }
        (None, None) => Ok(None),
    }
}

/// Merge the NS key material and users into a rendered cloud-config.
///
/// The script is loaded as a YAML mapping and the entries are appended to
/// its `ssh_authorized_keys` and `users` lists, creating them when absent.
/// A script that is not a YAML mapping (a shell script, say) is returned
/// unchanged.
pub fn add_access(script: Option<String>, access: &CloudConfigAccess) -> Option<String> {
    if access.is_empty() {
        return script;
    }
    let parsed = match script.as_deref() {
        None => Some(Mapping::new()),
        Some(text) if is_blank(text) => Some(Mapping::new()),
        Some(text) => match serde_yaml::from_str::<Yaml>(text) {
            Ok(Yaml::Mapping(doc)) => Some(doc),
            Ok(Yaml::Null) => Some(Mapping::new()),
            _ => None,
        },
    };
    let Some(mut doc) = parsed else {
        return script;
    };

    let mut authorized: Vec<Yaml> = access
        .key_pairs
        .iter()
        .map(|k| Yaml::from(k.key.as_str()))
        .collect();
    if let Some(key) = &access.ns_public_key {
        authorized.push(Yaml::from(key.as_str()));
    }
    append(&mut doc, "ssh_authorized_keys", authorized);
    append(&mut doc, "users", access.users.iter().map(user_entry).collect());

    match serde_yaml::to_string(&Yaml::Mapping(doc)) {
        Ok(body) => Some(format!("#cloud-config\n{}", body)),
        Err(_) => script,
    }
}

/// Only comments and whitespace.
fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

fn append(doc: &mut Mapping, key: &str, items: Vec<Yaml>) {
    if items.is_empty() {
        return;
    }
    let entry = doc.entry(Yaml::from(key)).or_insert(Yaml::Null);
    if let Yaml::Sequence(seq) = &mut *entry {
        seq.extend(items);
        return;
    }
    let mut seq = match std::mem::replace(entry, Yaml::Null) {
        Yaml::Null => Sequence::new(),
        other => vec![other],
    };
    seq.extend(items);
    *entry = Yaml::Sequence(seq);
}

fn user_entry(user: &User) -> Yaml {
    let mut entry = Mapping::new();
    entry.insert("name".into(), user.name.as_str().into());
    if let Some(info) = &user.user_info {
        entry.insert("gecos".into(), info.as_str().into());
    }
    entry.insert("sudo".into(), "ALL=(ALL) NOPASSWD:ALL".into());
    if !user.key_pair.is_empty() {
        let keys = user.key_pair.iter().map(|k| Yaml::from(k.key.as_str())).collect();
        entry.insert("ssh-authorized-keys".into(), Yaml::Sequence(keys));
    }
    Yaml::Mapping(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfvo_descriptor::SupplementalBootData;

    fn vdu(id: &str, cloud_init: Option<&str>) -> Vdu {
        let mut vdu: Vdu = serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("{}-name", id)
        }))
        .unwrap();
        vdu.cloud_init = cloud_init.map(str::to_string);
        vdu
    }

    #[test]
    fn substitutes_sibling_and_self_attributes() {
        let store = VdurDatastore::new();
        store.add(&vdu("a", None), "ns-abc123-a");
        store.add(&vdu("b", None), "ns-abc123-b");
        store.set_mgmt_ip("b", Some("10.0.0.9".into()));

        let text = "peer={{ vdu[b].mgmt.ip }} host={{vdu.vdur_name}} n={{ vdu[b].name }}";
        let out = render(text, "a", &store).unwrap();
        assert_eq!(out, "peer=10.0.0.9 host=ns-abc123-a n=b-name");
    }

    #[test]
    fn unresolved_token_fails() {
        let store = VdurDatastore::new();
        store.add(&vdu("a", None), "x");
        store.add(&vdu("b", None), "y");
        let err = render("{{ vdu[b].mgmt.ip }}", "a", &store).unwrap_err();
        assert!(matches!(err, OrchestratorError::VduRecord { .. }));
        assert!(render("{{ nonsense }}", "a", &store).is_err());
    }

    #[test]
    fn cloud_init_variables_come_from_meta_data() {
        let mut v = vdu("a", None);
        v.supplemental_boot_data = Some(SupplementalBootData {
            custom_meta_data: vec![
                CustomMetaData {
                    name: "CI_PASS".into(),
                    value: "s3cret".into(),
                    destination: Some("CLOUD_INIT".into()),
                },
                CustomMetaData {
                    name: "CI_OTHER".into(),
                    value: "nope".into(),
                    destination: None,
                },
            ],
        });
        let store = VdurDatastore::new();
        store.add(&v, "x");
        assert_eq!(render("pw={{ CI_PASS }}", "a", &store).unwrap(), "pw=s3cret");
        assert!(render("{{ CI_OTHER }}", "a", &store).is_err());
    }

    fn ns_access() -> CloudConfigAccess {
        CloudConfigAccess {
            key_pairs: vec![KeyPair {
                name: "ops".into(),
                key: "ssh-rsa AAA ops".into(),
            }],
            users: vec![User {
                name: "fred".into(),
                user_info: Some("Fred".into()),
                key_pair: vec![KeyPair {
                    name: "fred-key".into(),
                    key: "ssh-rsa FFF fred".into(),
                }],
            }],
            ns_public_key: Some("ssh-ed25519 BBB ns".into()),
        }
    }

    fn parse(out: &str) -> Yaml {
        assert!(out.starts_with("#cloud-config\n"), "{}", out);
        serde_yaml::from_str(out).unwrap()
    }

    fn strings(value: &Yaml) -> Vec<String> {
        value
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn no_script_and_no_access_yields_nothing() {
        let script = read_script(&vdu("a", None), None).unwrap();
        assert!(script.is_none());
        assert!(add_access(script, &CloudConfigAccess::default()).is_none());
    }

    #[test]
    fn access_is_merged_into_script() {
        let out = add_access(Some("#cloud-config\npassword: x".into()), &ns_access()).unwrap();
        let doc = parse(&out);
        assert_eq!(doc["password"].as_str(), Some("x"));
        assert_eq!(
            strings(&doc["ssh_authorized_keys"]),
            vec!["ssh-rsa AAA ops", "ssh-ed25519 BBB ns"]
        );
        let fred = &doc["users"][0];
        assert_eq!(fred["name"].as_str(), Some("fred"));
        assert_eq!(fred["gecos"].as_str(), Some("Fred"));
        assert_eq!(fred["sudo"].as_str(), Some("ALL=(ALL) NOPASSWD:ALL"));
        assert_eq!(strings(&fred["ssh-authorized-keys"]), vec!["ssh-rsa FFF fred"]);
    }

    #[test]
    fn existing_lists_are_extended_not_redeclared() {
        let script = "#cloud-config\n\
                      ssh_authorized_keys:\n  - ssh-rsa EXISTING\n\
                      users:\n  - default\n";
        let out = add_access(Some(script.into()), &ns_access()).unwrap();
        assert_eq!(out.matches("ssh_authorized_keys:").count(), 1, "{}", out);
        assert_eq!(out.matches("users:").count(), 1, "{}", out);

        let doc = parse(&out);
        assert_eq!(
            strings(&doc["ssh_authorized_keys"]),
            vec!["ssh-rsa EXISTING", "ssh-rsa AAA ops", "ssh-ed25519 BBB ns"]
        );
        let users = doc["users"].as_sequence().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].as_str(), Some("default"));
        assert_eq!(users[1]["name"].as_str(), Some("fred"));
    }

    #[test]
    fn missing_script_gets_a_fresh_cloud_config() {
        let out = add_access(None, &ns_access()).unwrap();
        let doc = parse(&out);
        assert_eq!(strings(&doc["ssh_authorized_keys"]).len(), 2);

        let out = add_access(Some("#cloud-config\n".into()), &ns_access()).unwrap();
        assert_eq!(parse(&out)["users"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn non_yaml_scripts_are_left_alone() {
        let shell = "#!/bin/bash\necho hello > /tmp/boot\n";
        assert_eq!(add_access(Some(shell.into()), &ns_access()).as_deref(), Some(shell));

        let broken = "#cloud-config\nruncmd: [unclosed\n";
        assert_eq!(add_access(Some(broken.into()), &ns_access()).as_deref(), Some(broken));
    }

    #[test]
    fn missing_package_file_fails() {
        let mut v = vdu("a", None);
        v.cloud_init_file = Some("missing.cfg".into());
        let dir = tempfile::tempdir().unwrap();
        assert!(read_script(&v, Some(dir.path())).is_err());

        std::fs::write(dir.path().join("missing.cfg"), "#cloud-config\n").unwrap();
        let out = read_script(&v, Some(dir.path())).unwrap();
        assert_eq!(out.as_deref(), Some("#cloud-config\n"));
    }
}
