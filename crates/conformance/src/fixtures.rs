//! Descriptor and instance-config fixtures shared by the conformance tests.
//!
//! Fixtures are plain JSON so harnesses can feed them to any loader;
//! [`crate::tests::parse`] turns them into descriptor types.

use serde_json::{json, Value};

/// VDU id of [`single_vdu_vnfd`].
pub const WEB_VDU: &str = "web-vm";
/// VDU id of [`scaled_vnfd`].
pub const WORKER_VDU: &str = "worker-vm";
/// VDU whose cloud-init references [`DB_VDU`].
pub const APP_VDU: &str = "app-vm";
pub const DB_VDU: &str = "db-vm";
/// Scaling group of [`scaled_nsd`].
pub const WORKER_GROUP: &str = "workers";

/// A one-VDU VNF with a single external connection point `eth0`.
pub fn single_vdu_vnfd() -> Value {
    vnfd("web-vnfd", WEB_VDU)
}

/// The VNF added by each instance of [`WORKER_GROUP`].
pub fn scaled_vnfd() -> Value {
    vnfd("worker-vnfd", WORKER_VDU)
}

fn vnfd(id: &str, vdu: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "mgmt_interface": { "vdu_id": vdu, "port": 22 },
        "connection_point": [{ "name": "eth0" }],
        "vdu": [{
            "id": vdu,
            "name": vdu,
            "image": "ubuntu-22.04",
            "vm_flavor": { "vcpu_count": 1, "memory_mb": 1024, "storage_gb": 10 },
            "interface": [{
                "name": "eth0",
                "type": "EXTERNAL",
                "external_connection_point_ref": "eth0"
            }]
        }]
    })
}

/// Two VDUs; the app VDU's cloud-init needs the db VDU's management IP.
pub fn cloud_init_vnfd() -> Value {
    json!({
        "id": "app-db-vnfd",
        "name": "app-db",
        "mgmt_interface": { "vdu_id": APP_VDU, "port": 22 },
        "connection_point": [{ "name": "eth0" }],
        "vdu": [
            {
                "id": APP_VDU,
                "name": "app",
                "image": "app-image",
                "cloud_init": format!(
                    "#cloud-config\nwrite_files:\n  - path: /etc/app/db\n    content: {{{{ vdu[{}].mgmt.ip }}}}\n",
                    DB_VDU
                ),
                "interface": [{
                    "name": "eth0",
                    "type": "EXTERNAL",
                    "external_connection_point_ref": "eth0"
                }]
            },
            {
                "id": DB_VDU,
                "name": "db",
                "image": "db-image"
            }
        ]
    })
}

fn vld(id: &str, name: &str, members: &[(u32, &str)]) -> Value {
    let refs: Vec<Value> = members
        .iter()
        .map(|(index, vnfd)| {
            json!({
                "member_vnf_index_ref": index,
                "vnfd_id_ref": vnfd,
                "vnfd_connection_point_ref": "eth0"
            })
        })
        .collect();
    json!({ "id": id, "name": name, "vnfd_connection_point_ref": refs })
}

/// One VLD without an IP profile and one constituent VNF.
pub fn single_vnf_nsd() -> Value {
    json!({
        "id": "single-vnf-nsd",
        "name": "single-vnf",
        "constituent_vnfd": [{ "member_vnf_index": 1, "vnfd_id_ref": "web-vnfd" }],
        "vld": [vld("vl-mgmt", "mgmt", &[(1, "web-vnfd")])]
    })
}

/// Like [`single_vnf_nsd`] with a second VLD named `data`.
pub fn two_vl_nsd() -> Value {
    json!({
        "id": "two-vl-nsd",
        "name": "two-vl",
        "constituent_vnfd": [{ "member_vnf_index": 1, "vnfd_id_ref": "web-vnfd" }],
        "vld": [
            vld("vl-mgmt", "mgmt", &[(1, "web-vnfd")]),
            vld("vl-data", "data", &[])
        ]
    })
}

/// A fixed web VNF plus [`WORKER_GROUP`], whose instances each add one
/// worker VNF.
pub fn scaled_nsd(min_instances: u32, max_instances: u32) -> Value {
    json!({
        "id": "scaled-nsd",
        "name": "scaled",
        "constituent_vnfd": [
            { "member_vnf_index": 1, "vnfd_id_ref": "web-vnfd" },
            { "member_vnf_index": 2, "vnfd_id_ref": "worker-vnfd" }
        ],
        "vld": [vld("vl-mgmt", "mgmt", &[(1, "web-vnfd"), (2, "worker-vnfd")])],
        "scaling_group_descriptor": [{
            "name": WORKER_GROUP,
            "min_instance_count": min_instances,
            "max_instance_count": max_instances,
            "vnfd_member": [{ "member_vnf_index_ref": 2, "count": 1 }]
        }]
    })
}

pub fn cloud_init_nsd() -> Value {
    json!({
        "id": "app-db-nsd",
        "name": "app-db",
        "constituent_vnfd": [{ "member_vnf_index": 1, "vnfd_id_ref": "app-db-vnfd" }],
        "vld": [{
            "id": "vl-mgmt",
            "name": "mgmt",
            "vnfd_connection_point_ref": [{
                "member_vnf_index_ref": 1,
                "vnfd_id_ref": "app-db-vnfd",
                "vnfd_connection_point_ref": "eth0"
            }]
        }]
    })
}

/// An instance config carrying `nsd` inline.
pub fn ns_config(id: &str, nsd: Value) -> Value {
    json!({
        "id": id,
        "name": format!("{}-ns", id),
        "description": "conformance instance",
        "nsd": nsd
    })
}
